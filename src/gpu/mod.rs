//! GPU backend seam
//!
//! The pipeline describes each frame as a list of [`PassCommand`]s and owns
//! GPU resources only through opaque handles. [`WgpuBackend`] executes them
//! on a window surface; tests use a recording backend instead.

mod wgpu_backend;
#[cfg(test)]
pub(crate) mod recording;

pub use wgpu_backend::WgpuBackend;

use crate::effects::EffectUniforms;
use crate::image_source::DecodedImage;
use crate::pipeline::Result;
use crate::viewport::ViewportGeometry;

/// A compiled shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub(crate) u64);

/// An offscreen render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetHandle(pub(crate) u64);

/// An uploaded source image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u64);

/// Texture a pass samples from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassInput {
    /// The loaded source image
    Source(TextureHandle),
    /// A previous stage's output
    Target(TargetHandle),
}

/// Where a pass draws to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutput {
    Target(TargetHandle),
    /// The visible surface
    Screen,
}

/// Geometry a pass draws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadKind {
    /// Aspect-correct quad from the current [`ViewportGeometry`]
    Centered,
    /// `[-1, 1]` quad filling the output
    Full,
}

/// One fully-specified sub-pass. Nothing is carried over between passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassCommand {
    pub program: ProgramHandle,
    pub input: PassInput,
    pub output: PassOutput,
    pub quad: QuadKind,
    pub uniforms: EffectUniforms,
}

/// Operations the pipeline needs from a GPU
pub trait RenderBackend {
    /// Compile and link a program from WGSL sources
    fn compile_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramHandle>;

    fn release_program(&mut self, program: ProgramHandle);

    /// Replace the program's stored uniform block
    fn write_uniforms(&mut self, program: ProgramHandle, uniforms: &EffectUniforms);

    /// Allocate an offscreen color target
    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetHandle>;

    fn release_target(&mut self, target: TargetHandle);

    /// Upload a decoded image as a sampleable texture
    fn upload_image(&mut self, image: &DecodedImage) -> Result<TextureHandle>;

    fn release_image(&mut self, texture: TextureHandle);

    /// Update the centered quad
    fn set_geometry(&mut self, geometry: &ViewportGeometry);

    /// Resize the visible surface
    fn resize_surface(&mut self, width: u32, height: u32);

    /// Current size of the visible surface
    fn surface_size(&self) -> (u32, u32);

    /// Execute a frame's passes in order and present
    fn submit_frame(&mut self, passes: &[PassCommand]) -> Result<()>;
}
