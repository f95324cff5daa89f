//! wgpu implementation of the render backend
//!
//! Every program is a render pipeline sharing one bind-group layout
//! (input texture, sampler, uniforms). Every pass renders in the non-sRGB
//! form of the surface format, so effects work on gamma-encoded values and
//! one pipeline draws both offscreen and on-screen passes.

use std::collections::HashMap;
use std::sync::Arc;

use winit::window::Window;

use super::{
    PassCommand, PassInput, PassOutput, ProgramHandle, QuadKind, RenderBackend, TargetHandle,
    TextureHandle,
};
use crate::effects::EffectUniforms;
use crate::image_source::DecodedImage;
use crate::pipeline::{PipelineError, Result};
use crate::viewport::{full_quad, QuadVertex, ViewportGeometry, QUAD_VERTEX_COUNT};

const QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

const QUAD_BUFFER_SIZE: wgpu::BufferAddress =
    (std::mem::size_of::<QuadVertex>() * QUAD_VERTEX_COUNT as usize) as wgpu::BufferAddress;

/// Pick the surface format and the non-sRGB format passes render in.
///
/// A non-sRGB surface format is preferred; otherwise the first one is viewed
/// without its sRGB suffix.
fn choose_formats(
    available: &[wgpu::TextureFormat],
) -> Option<(wgpu::TextureFormat, wgpu::TextureFormat)> {
    let surface = available
        .iter()
        .find(|f| !f.is_srgb())
        .or_else(|| available.first())
        .copied()?;
    Some((surface, surface.remove_srgb_suffix()))
}

/// A compiled effect program and its uniform buffer
struct Program {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
}

/// A texture the passes can sample (source image or intermediate target)
struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Render backend drawing to a winit window
pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    /// Format of targets, pipelines and the screen view
    render_format: wgpu::TextureFormat,
    /// Requested surface size; may be zero while minimized
    size: (u32, u32),
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    centered_quad: wgpu::Buffer,
    full_quad: wgpu::Buffer,
    programs: HashMap<ProgramHandle, Program>,
    targets: HashMap<TargetHandle, GpuTexture>,
    images: HashMap<TextureHandle, GpuTexture>,
    next_handle: u64,
    background: wgpu::Color,
}

impl WgpuBackend {
    /// Create a backend with a surface on `window`
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| PipelineError::Device(format!("failed to create surface: {}", e)))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| PipelineError::Device("no suitable GPU adapter".into()))?;

        log::info!("Using GPU: {}", adapter.get_info().name);
        log::info!("Backend: {:?}", adapter.get_info().backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("FX Viewer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| PipelineError::Device(format!("failed to create device: {}", e)))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let (surface_format, render_format) = choose_formats(&surface_caps.formats)
            .ok_or_else(|| PipelineError::Device("surface reports no formats".into()))?;
        let view_formats = if render_format == surface_format {
            vec![]
        } else {
            vec![render_format]
        };
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        log::info!("Surface format: {:?}, rendering as {:?}", surface_format, render_format);

        // Redraws are event-driven, so vsync costs nothing
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats,
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Effect Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Effect Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Effect Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let centered_quad = Self::create_quad_buffer(&device, "Centered Quad");
        let full_quad_buffer = Self::create_quad_buffer(&device, "Full Quad");
        queue.write_buffer(&centered_quad, 0, bytemuck::cast_slice(&full_quad()));
        queue.write_buffer(&full_quad_buffer, 0, bytemuck::cast_slice(&full_quad()));

        Ok(Self {
            surface,
            device,
            queue,
            config,
            render_format,
            size: (size.width, size.height),
            bind_group_layout,
            pipeline_layout,
            sampler,
            centered_quad,
            full_quad: full_quad_buffer,
            programs: HashMap::new(),
            targets: HashMap::new(),
            images: HashMap::new(),
            next_handle: 1,
            background: wgpu::Color::WHITE,
        })
    }

    /// Set the clear color of the visible surface (RGBA, 0.0-1.0)
    pub fn set_background(&mut self, rgba: [f32; 4]) {
        self.background = wgpu::Color {
            r: rgba[0] as f64,
            g: rgba[1] as f64,
            b: rgba[2] as f64,
            a: rgba[3] as f64,
        };
    }

    /// Format every pass renders in
    pub fn render_format(&self) -> wgpu::TextureFormat {
        self.render_format
    }

    fn create_quad_buffer(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: QUAD_BUFFER_SIZE,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn next(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn create_texture(
        &self,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> GpuTexture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuTexture {
            texture,
            view,
        }
    }

    fn check_texture_size(&self, width: u32, height: u32) -> std::result::Result<(), String> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 {
            return Err("zero-sized texture".into());
        }
        if width > max || height > max {
            return Err(format!("exceeds the device limit of {}", max));
        }
        Ok(())
    }

    fn input_view(&self, input: PassInput) -> Result<&wgpu::TextureView> {
        match input {
            PassInput::Source(handle) => self
                .images
                .get(&handle)
                .map(|t| &t.view)
                .ok_or_else(|| PipelineError::invalid(format!("unknown source texture {:?}", handle))),
            PassInput::Target(handle) => self.target_view(handle),
        }
    }

    fn target_view(&self, handle: TargetHandle) -> Result<&wgpu::TextureView> {
        self.targets
            .get(&handle)
            .map(|t| &t.view)
            .ok_or_else(|| PipelineError::invalid(format!("unknown render target {:?}", handle)))
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pass: &PassCommand,
        screen: &wgpu::TextureView,
    ) -> Result<()> {
        let program = self
            .programs
            .get(&pass.program)
            .ok_or_else(|| PipelineError::invalid(format!("unknown program {:?}", pass.program)))?;
        let input = self.input_view(pass.input)?;
        let (output, clear) = match pass.output {
            PassOutput::Target(handle) => (self.target_view(handle)?, wgpu::Color::TRANSPARENT),
            PassOutput::Screen => (screen, self.background),
        };
        let quad = match pass.quad {
            QuadKind::Centered => &self.centered_quad,
            QuadKind::Full => &self.full_quad,
        };

        self.queue
            .write_buffer(&program.uniform_buffer, 0, bytemuck::bytes_of(&pass.uniforms));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Effect Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: program.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Effect Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(&program.pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.set_vertex_buffer(0, quad.slice(..));
        render_pass.draw(0..QUAD_VERTEX_COUNT, 0..1);
        Ok(())
    }
}

impl RenderBackend for WgpuBackend {
    fn compile_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramHandle> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(vertex_source.into()),
        });
        let fragment = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(fragment_source.into()),
        });

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &QUAD_ATTRIBUTES,
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.render_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(PipelineError::Compile {
                label: label.to_string(),
                message: error.to_string(),
            });
        }

        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<EffectUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let handle = ProgramHandle(self.next());
        self.programs.insert(
            handle,
            Program {
                pipeline,
                uniform_buffer,
            },
        );
        tracing::debug!(program = handle.0, label, "Compiled program");
        Ok(handle)
    }

    fn release_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
    }

    fn write_uniforms(&mut self, program: ProgramHandle, uniforms: &EffectUniforms) {
        if let Some(program) = self.programs.get(&program) {
            self.queue
                .write_buffer(&program.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
        }
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetHandle> {
        let target_error = |message: String| PipelineError::RenderTarget {
            width,
            height,
            message,
        };
        self.check_texture_size(width, height).map_err(target_error)?;

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let target = self.create_texture(
            "Intermediate Target",
            width,
            height,
            self.render_format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        if let Some(error) = validation.or(out_of_memory) {
            return Err(target_error(error.to_string()));
        }

        let handle = TargetHandle(self.next());
        self.targets.insert(handle, target);
        Ok(handle)
    }

    fn release_target(&mut self, target: TargetHandle) {
        self.targets.remove(&target);
    }

    fn upload_image(&mut self, image: &DecodedImage) -> Result<TextureHandle> {
        let (width, height) = (image.width(), image.height());
        self.check_texture_size(width, height)
            .map_err(|e| PipelineError::ImageLoad(format!("{}x{} image {}", width, height, e)))?;

        let texture = self.create_texture(
            "Source Image",
            width,
            height,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.pixels(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(image.bytes_per_row()),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        let handle = TextureHandle(self.next());
        self.images.insert(handle, texture);
        Ok(handle)
    }

    fn release_image(&mut self, texture: TextureHandle) {
        self.images.remove(&texture);
    }

    fn set_geometry(&mut self, geometry: &ViewportGeometry) {
        self.queue.write_buffer(
            &self.centered_quad,
            0,
            bytemuck::cast_slice(&geometry.centered_quad()),
        );
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn submit_frame(&mut self, passes: &[PassCommand]) -> Result<()> {
        if self.size.0 == 0 || self.size.1 == 0 {
            return Err(PipelineError::Surface("surface has zero size".into()));
        }

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                self.surface.configure(&self.device, &self.config);
                return Err(PipelineError::Surface(e.to_string()));
            }
            Err(e) => return Err(PipelineError::Surface(e.to_string())),
        };
        let screen = frame.texture.create_view(&wgpu::TextureViewDescriptor {
            format: Some(self.render_format),
            ..Default::default()
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Effect Chain Encoder"),
            });
        for pass in passes {
            self.encode_pass(&mut encoder, pass, &screen)?;
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat;

    #[test]
    fn test_prefers_non_srgb_surface_format() {
        let formats = [TextureFormat::Bgra8UnormSrgb, TextureFormat::Bgra8Unorm];
        assert_eq!(
            choose_formats(&formats),
            Some((TextureFormat::Bgra8Unorm, TextureFormat::Bgra8Unorm))
        );
    }

    #[test]
    fn test_srgb_only_surface_renders_without_suffix() {
        let formats = [TextureFormat::Rgba8UnormSrgb];
        assert_eq!(
            choose_formats(&formats),
            Some((TextureFormat::Rgba8UnormSrgb, TextureFormat::Rgba8Unorm))
        );
        assert_eq!(choose_formats(&[]), None);
    }
}
