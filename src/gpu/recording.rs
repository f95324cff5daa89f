//! Recording backend for tests
//!
//! Keeps every resource in maps instead of on a GPU and remembers the frames
//! it was asked to draw. Failures can be injected per operation.

use std::collections::{HashMap, HashSet};

use super::{PassCommand, ProgramHandle, RenderBackend, TargetHandle, TextureHandle};
use crate::effects::EffectUniforms;
use crate::image_source::DecodedImage;
use crate::pipeline::{PipelineError, Result};
use crate::viewport::ViewportGeometry;

#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_handle: u64,
    /// Live programs and their labels
    pub programs: HashMap<ProgramHandle, String>,
    /// Last uniforms written per program
    pub uniforms: HashMap<ProgramHandle, EffectUniforms>,
    /// Live targets and their sizes
    pub targets: HashMap<TargetHandle, (u32, u32)>,
    /// Live source textures and their sizes
    pub images: HashMap<TextureHandle, (u32, u32)>,
    pub geometry: Option<ViewportGeometry>,
    pub surface: (u32, u32),
    /// Every submitted frame, oldest first
    pub frames: Vec<Vec<PassCommand>>,
    /// Fail compilation of programs whose fragment source contains one of these
    pub fail_compile: HashSet<String>,
    /// Fail every target allocation
    pub fail_targets: bool,
    /// Fail every frame submission
    pub fail_submit: bool,
    /// Fail every image upload
    pub fail_upload: bool,
    /// Total targets ever created
    pub targets_created: usize,
    /// Most targets alive at the same time
    pub peak_targets: usize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            surface: (800, 600),
            ..Default::default()
        }
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    pub fn last_frame(&self) -> Option<&[PassCommand]> {
        self.frames.last().map(|f| f.as_slice())
    }
}

impl RenderBackend for RecordingBackend {
    fn compile_program(
        &mut self,
        label: &str,
        _vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramHandle> {
        if self
            .fail_compile
            .iter()
            .any(|needle| fragment_source.contains(needle.as_str()))
        {
            return Err(PipelineError::Compile {
                label: label.to_string(),
                message: "injected failure".into(),
            });
        }
        let handle = ProgramHandle(self.next());
        self.programs.insert(handle, label.to_string());
        Ok(handle)
    }

    fn release_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        self.uniforms.remove(&program);
    }

    fn write_uniforms(&mut self, program: ProgramHandle, uniforms: &EffectUniforms) {
        self.uniforms.insert(program, *uniforms);
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetHandle> {
        if self.fail_targets || width == 0 || height == 0 {
            return Err(PipelineError::RenderTarget {
                width,
                height,
                message: "injected failure".into(),
            });
        }
        let handle = TargetHandle(self.next());
        self.targets.insert(handle, (width, height));
        self.targets_created += 1;
        self.peak_targets = self.peak_targets.max(self.targets.len());
        Ok(handle)
    }

    fn release_target(&mut self, target: TargetHandle) {
        self.targets.remove(&target);
    }

    fn upload_image(&mut self, image: &DecodedImage) -> Result<TextureHandle> {
        if self.fail_upload {
            return Err(PipelineError::ImageLoad("injected failure".into()));
        }
        let handle = TextureHandle(self.next());
        self.images.insert(handle, (image.width(), image.height()));
        Ok(handle)
    }

    fn release_image(&mut self, texture: TextureHandle) {
        self.images.remove(&texture);
    }

    fn set_geometry(&mut self, geometry: &ViewportGeometry) {
        self.geometry = Some(*geometry);
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.surface = (width, height);
    }

    fn surface_size(&self) -> (u32, u32) {
        self.surface
    }

    fn submit_frame(&mut self, passes: &[PassCommand]) -> Result<()> {
        if self.fail_submit {
            return Err(PipelineError::Surface("injected failure".into()));
        }
        self.frames.push(passes.to_vec());
        Ok(())
    }
}
