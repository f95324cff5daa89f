//! Built-in effect descriptors
//!
//! Ranges and defaults are raw slider units; see [`ParameterValue::to_uniform`]
//! for how they reach the shaders.
//!
//! [`ParameterValue::to_uniform`]: super::ParameterValue::to_uniform

use super::descriptor::{EffectDescriptor, EffectKind};
use super::library::EffectLibrary;
use super::types::ParameterSpec;

/// Vertex shader shared by every built-in effect
pub const DEFAULT_VERTEX_SHADER: &str = "default.vert.wgsl";

/// Register all built-in effects with the library
pub fn register_builtin_effects(library: &mut EffectLibrary) {
    for kind in EffectKind::all() {
        // Built-in descriptors are valid by construction; the test below keeps them that way.
        if let Err(e) = library.register(descriptor(*kind)) {
            tracing::error!(kind = %kind, "Built-in effect rejected: {}", e);
        }
    }
}

/// The descriptor for a built-in kind
pub fn descriptor(kind: EffectKind) -> EffectDescriptor {
    match kind {
        EffectKind::Base => base(),
        EffectKind::ColorCorrection => color_correction(),
        EffectKind::Sharpness => sharpness(),
        EffectKind::Posterize => posterize(),
        EffectKind::Invert => invert(),
        EffectKind::Pixelate => pixelate(),
        EffectKind::Crt => crt(),
    }
}

fn base() -> EffectDescriptor {
    EffectDescriptor::new(
        EffectKind::Base,
        "Base",
        "Source",
        DEFAULT_VERTEX_SHADER,
        "base.frag.wgsl",
    )
}

fn color_correction() -> EffectDescriptor {
    EffectDescriptor::new(
        EffectKind::ColorCorrection,
        "Color Correction",
        "Color",
        DEFAULT_VERTEX_SHADER,
        "correction.frag.wgsl",
    )
    .with_parameter(ParameterSpec::slider("exposure", "Exposure", -200, 200, 0))
    .with_parameter(ParameterSpec::slider("contrast", "Contrast", 0, 200, 100))
    .with_parameter(ParameterSpec::slider("temperature", "Temperature", -100, 100, 0))
    .with_parameter(ParameterSpec::slider("saturation", "Saturation", 0, 200, 100))
    .with_parameter(ParameterSpec::slider("brightness", "Brightness", -100, 100, 0))
    .with_parameter(ParameterSpec::color("tintColor", "Tint color"))
    .with_parameter(ParameterSpec::slider("tintIntensity", "Tint intensity", 0, 100, 0))
    .with_parameter(ParameterSpec::color("filterColor", "Filter color"))
    .with_parameter(ParameterSpec::slider("filterIntensity", "Filter intensity", 0, 100, 0))
}

fn sharpness() -> EffectDescriptor {
    EffectDescriptor::new(
        EffectKind::Sharpness,
        "Sharpness",
        "Detail",
        DEFAULT_VERTEX_SHADER,
        "sharpness.frag.wgsl",
    )
    .with_parameter(ParameterSpec::slider("strength", "Strength", 0, 100, 10))
}

fn posterize() -> EffectDescriptor {
    EffectDescriptor::new(
        EffectKind::Posterize,
        "Posterization",
        "Color",
        DEFAULT_VERTEX_SHADER,
        "posterize.frag.wgsl",
    )
    .with_parameter(ParameterSpec::slider("numColors", "Posterize levels", 2, 100, 30))
    .with_parameter(ParameterSpec::slider("gamma", "Gamma", 1, 200, 100))
}

fn invert() -> EffectDescriptor {
    EffectDescriptor::new(
        EffectKind::Invert,
        "Invert Colors",
        "Color",
        DEFAULT_VERTEX_SHADER,
        "invert.frag.wgsl",
    )
}

fn pixelate() -> EffectDescriptor {
    EffectDescriptor::new(
        EffectKind::Pixelate,
        "Pixelate",
        "Stylize",
        DEFAULT_VERTEX_SHADER,
        "pixelate.frag.wgsl",
    )
    .with_parameter(ParameterSpec::slider("pixelSize", "Pixel size", 1, 64, 4))
}

fn crt() -> EffectDescriptor {
    EffectDescriptor::new(
        EffectKind::Crt,
        "CRT Effect",
        "Stylize",
        DEFAULT_VERTEX_SHADER,
        "crt.frag.wgsl",
    )
}
