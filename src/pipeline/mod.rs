//! Multi-pass effect pipeline
//!
//! - **Registry** (`registry.rs`): ordered chain of effect instances
//! - **Targets** (`targets.rs`): intermediate render-target allocation
//! - **Compositor** (`compositor.rs`): per-frame pass planning
//!
//! Data flow: registry edits bump the revision, the target set notices it is
//! stale and rebuilds, and the compositor chains the active stages through it.

mod error;
mod registry;
mod targets;
pub mod compositor;

pub use error::{PipelineError, Result};
pub use registry::{PipelineRegistry, StageSummary};
pub use targets::{required_slots, RenderTarget, RenderTargetSet};
