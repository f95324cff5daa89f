//! FX Viewer Library
//!
//! Displays a single image through a reorderable chain of GPU shader effects.
//! Each active stage renders into an intermediate target that feeds the next;
//! the last active stage draws to the window with aspect-correct letterboxing.

pub mod effects;
pub mod gpu;
pub mod image_source;
pub mod pipeline;
pub mod settings;
pub mod shaders;
pub mod telemetry;
pub mod viewer;
pub mod viewport;

pub use effects::{EffectDescriptor, EffectKind, EffectLibrary, InstanceId, ParameterValue};
pub use gpu::{RenderBackend, WgpuBackend};
pub use image_source::{load_image, DecodedImage};
pub use pipeline::{PipelineError, PipelineRegistry, StageSummary};
pub use settings::ViewerSettings;
pub use viewer::{FrameOutcome, ImageViewer, StatusLevel, StatusMessage, ViewerEvent};
pub use viewport::ViewportGeometry;
