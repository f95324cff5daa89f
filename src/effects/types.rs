//! Core effect data types
//!
//! Parameter metadata, parameter values and the uniform block every effect
//! program receives. All effects share one uniform layout, so per-effect
//! behaviour is nothing more than the declarative parameter list.

use serde::{Deserialize, Serialize};

/// Maximum number of parameters a single effect may declare
pub const MAX_PARAMETERS: usize = 12;

/// Opaque white, the default of every color picker
pub const OPAQUE_WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// The UI control a parameter is edited with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlKind {
    /// Integer slider; uploaded as `raw / 100.0`
    Slider,
    /// RGBA color picker
    ColorPicker,
}

/// Declarative description of one effect parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Minimum raw slider value
    pub min: i32,
    /// Maximum raw slider value
    pub max: i32,
    /// Default raw slider value
    pub default: i32,
    /// Name the parameter is addressed by (matches the shader's documentation)
    pub uniform_name: String,
    /// Label shown by the parameter panel
    pub display_name: String,
    /// Control used to edit the parameter
    pub control: ControlKind,
}

impl ParameterSpec {
    /// Create a slider parameter
    pub fn slider(
        uniform_name: impl Into<String>,
        display_name: impl Into<String>,
        min: i32,
        max: i32,
        default: i32,
    ) -> Self {
        Self {
            min,
            max,
            default,
            uniform_name: uniform_name.into(),
            display_name: display_name.into(),
            control: ControlKind::Slider,
        }
    }

    /// Create a color picker parameter (range and default are unused)
    pub fn color(uniform_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            min: 0,
            max: 0,
            default: 0,
            uniform_name: uniform_name.into(),
            display_name: display_name.into(),
            control: ControlKind::ColorPicker,
        }
    }

    /// Whether the default lies within `[min, max]`
    pub fn is_valid(&self) -> bool {
        self.min <= self.max && (self.min..=self.max).contains(&self.default)
    }

    /// The value a fresh instance starts with
    pub fn default_value(&self) -> ParameterValue {
        match self.control {
            ControlKind::Slider => ParameterValue::Slider(self.default),
            ControlKind::ColorPicker => ParameterValue::Color(OPAQUE_WHITE),
        }
    }

    /// Clamp a value into this parameter's range.
    ///
    /// Returns `None` when the value's kind doesn't match the control.
    pub fn coerce(&self, value: ParameterValue) -> Option<ParameterValue> {
        match (self.control, value) {
            (ControlKind::Slider, ParameterValue::Slider(raw)) => {
                Some(ParameterValue::Slider(raw.clamp(self.min, self.max)))
            }
            (ControlKind::ColorPicker, ParameterValue::Color(rgba)) => {
                Some(ParameterValue::Color(rgba.map(|c| c.clamp(0.0, 1.0))))
            }
            _ => None,
        }
    }
}

/// Current value of one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValue {
    /// Raw integer slider position
    Slider(i32),
    /// RGBA color (0.0-1.0 per channel)
    Color([f32; 4]),
}

impl ParameterValue {
    /// The four floats written into the parameter's uniform slot
    pub fn to_uniform(self) -> [f32; 4] {
        match self {
            ParameterValue::Slider(raw) => [raw as f32 / 100.0, 0.0, 0.0, 0.0],
            ParameterValue::Color(rgba) => rgba,
        }
    }
}

/// Uniform block shared by every effect program.
///
/// Layout matches `EffectUniforms` in the WGSL sources: `scale_diff` in the
/// first 16-byte row, then one vec4 per parameter.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EffectUniforms {
    /// Displayed size over source pixel size
    pub scale_diff: f32,
    pub _padding: [f32; 3],
    /// Parameter slots, in descriptor order
    pub params: [[f32; 4]; MAX_PARAMETERS],
}

impl Default for EffectUniforms {
    fn default() -> Self {
        Self {
            scale_diff: 1.0,
            _padding: [0.0; 3],
            params: [[0.0; 4]; MAX_PARAMETERS],
        }
    }
}

impl EffectUniforms {
    /// Pack parameter values in slot order
    pub fn pack<I>(values: I) -> Self
    where
        I: IntoIterator<Item = ParameterValue>,
    {
        let mut uniforms = Self::default();
        for (slot, value) in uniforms.params.iter_mut().zip(values) {
            *slot = value.to_uniform();
        }
        uniforms
    }

    /// Copy of `self` with a different `scale_diff`
    pub fn with_scale_diff(mut self, scale_diff: f32) -> Self {
        self.scale_diff = scale_diff;
        self
    }
}
