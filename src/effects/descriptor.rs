//! Effect descriptors: immutable, per-type metadata

use serde::{Deserialize, Serialize};

use super::types::{ParameterSpec, MAX_PARAMETERS};

/// The type tag of an effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EffectKind {
    /// Raw source texture; always stage 0
    Base,
    ColorCorrection,
    Sharpness,
    Posterize,
    Invert,
    Pixelate,
    Crt,
}

impl EffectKind {
    /// Every kind, in menu order
    pub fn all() -> &'static [EffectKind] {
        &[
            EffectKind::Base,
            EffectKind::ColorCorrection,
            EffectKind::Sharpness,
            EffectKind::Posterize,
            EffectKind::Invert,
            EffectKind::Pixelate,
            EffectKind::Crt,
        ]
    }

    /// Stable identifier used in settings files
    pub fn key(self) -> &'static str {
        match self {
            EffectKind::Base => "base",
            EffectKind::ColorCorrection => "color_correction",
            EffectKind::Sharpness => "sharpness",
            EffectKind::Posterize => "posterize",
            EffectKind::Invert => "invert",
            EffectKind::Pixelate => "pixelate",
            EffectKind::Crt => "crt",
        }
    }

    /// Parse a settings key
    pub fn from_key(key: &str) -> Option<Self> {
        Self::all().iter().copied().find(|kind| kind.key() == key)
    }
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Static metadata for one effect type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectDescriptor {
    /// Type tag
    pub kind: EffectKind,
    /// Display name of the first instance ("Sharpness", "Color Correction", ...)
    pub title: String,
    /// UI grouping ("Color", "Stylize", ...)
    pub category: String,
    /// Name of the vertex shader source
    pub vertex_shader: String,
    /// Name of the fragment shader source
    pub fragment_shader: String,
    /// Parameters, in uniform slot order
    pub parameters: Vec<ParameterSpec>,
}

impl EffectDescriptor {
    pub fn new(
        kind: EffectKind,
        title: impl Into<String>,
        category: impl Into<String>,
        vertex_shader: impl Into<String>,
        fragment_shader: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            category: category.into(),
            vertex_shader: vertex_shader.into(),
            fragment_shader: fragment_shader.into(),
            parameters: Vec::new(),
        }
    }

    /// Builder-style parameter append
    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Look up a parameter and its slot index by name
    pub fn parameter(&self, name: &str) -> Option<(usize, &ParameterSpec)> {
        self.parameters
            .iter()
            .enumerate()
            .find(|(_, p)| p.uniform_name == name)
    }

    /// Check the descriptor's invariants, returning a description of the first violation
    pub fn validate(&self) -> Result<(), String> {
        if self.parameters.len() > MAX_PARAMETERS {
            return Err(format!(
                "{} declares {} parameters (max {})",
                self.title,
                self.parameters.len(),
                MAX_PARAMETERS
            ));
        }
        if let Some(bad) = self.parameters.iter().find(|p| !p.is_valid()) {
            return Err(format!(
                "{}: default {} of '{}' is outside [{}, {}]",
                self.title, bad.default, bad.uniform_name, bad.min, bad.max
            ));
        }
        for (i, p) in self.parameters.iter().enumerate() {
            if self.parameters[..i].iter().any(|q| q.uniform_name == p.uniform_name) {
                return Err(format!("{}: duplicate parameter '{}'", self.title, p.uniform_name));
            }
        }
        Ok(())
    }

    /// Program label used in GPU debug names and logs
    pub fn label(&self) -> String {
        format!("{} ({})", self.title, self.kind)
    }
}
