//! Effect model
//!
//! - **Types** (`types.rs`): parameter metadata, values and the shared uniform block
//! - **Descriptors** (`descriptor.rs`): immutable per-type metadata
//! - **Instances** (`instance.rs`): runtime state of one effect in a pipeline
//! - **Library** (`library.rs`): registry of available effect types
//! - **Builtin** (`builtin.rs`): the built-in effect descriptors
//!
//! Every effect shares one uniform upload path, so an effect type is data
//! (an [`EffectDescriptor`]) rather than a trait implementation.

mod types;
mod descriptor;
mod instance;
mod library;
pub mod builtin;

pub use types::*;
pub use descriptor::*;
pub use instance::*;
pub use library::*;
