//! Effect instances: the runtime, stateful side of an effect

use std::collections::HashMap;
use std::sync::Arc;

use super::descriptor::{EffectDescriptor, EffectKind};
use super::types::{EffectUniforms, ParameterSpec, ParameterValue};
use crate::gpu::ProgramHandle;

/// Identity of an effect instance within a pipeline.
///
/// Stable across reorder, toggle and recompilation; never reused after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub(crate) u64);

impl InstanceId {
    /// Raw serial value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One effect in the pipeline
#[derive(Debug, Clone)]
pub struct EffectInstance {
    id: InstanceId,
    descriptor: Arc<EffectDescriptor>,
    program: ProgramHandle,
    active: bool,
    /// How many instances of this kind the pipeline created before this one
    ordinal: u32,
    /// Edited values only; everything else reads the descriptor default
    values: HashMap<String, ParameterValue>,
}

impl EffectInstance {
    pub(crate) fn new(
        id: InstanceId,
        descriptor: Arc<EffectDescriptor>,
        program: ProgramHandle,
        ordinal: u32,
        active: bool,
    ) -> Self {
        Self {
            id,
            descriptor,
            program,
            active,
            ordinal,
            values: HashMap::new(),
        }
    }

    /// A copy with a fresh identity and program, reset to descriptor defaults
    pub(crate) fn duplicate(&self, id: InstanceId, program: ProgramHandle, ordinal: u32) -> Self {
        Self::new(id, Arc::clone(&self.descriptor), program, ordinal, false)
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn kind(&self) -> EffectKind {
        self.descriptor.kind
    }

    pub fn descriptor(&self) -> &Arc<EffectDescriptor> {
        &self.descriptor
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    pub(crate) fn set_program(&mut self, program: ProgramHandle) {
        self.program = program;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Display title: the descriptor title, numbered for every instance after the first
    pub fn title(&self) -> String {
        if self.ordinal > 0 {
            format!("{} {}", self.descriptor.title, self.ordinal)
        } else {
            self.descriptor.title.clone()
        }
    }

    /// The declarative parameter list
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.descriptor.parameters
    }

    /// Current value of a parameter (edited or default)
    pub fn value(&self, name: &str) -> Option<ParameterValue> {
        let (_, spec) = self.descriptor.parameter(name)?;
        Some(self.value_of(spec))
    }

    fn value_of(&self, spec: &ParameterSpec) -> ParameterValue {
        self.values
            .get(&spec.uniform_name)
            .copied()
            .unwrap_or_else(|| spec.default_value())
    }

    /// Current values in slot order
    pub fn values(&self) -> Vec<ParameterValue> {
        self.descriptor
            .parameters
            .iter()
            .map(|spec| self.value_of(spec))
            .collect()
    }

    /// Store a value, clamped into range.
    ///
    /// Returns the stored value, or `None` if the name is unknown or the kind doesn't match.
    pub(crate) fn set_value(&mut self, name: &str, value: ParameterValue) -> Option<ParameterValue> {
        let (_, spec) = self.descriptor.parameter(name)?;
        let value = spec.coerce(value)?;
        self.values.insert(spec.uniform_name.clone(), value);
        Some(value)
    }

    /// Uniform block for the current values (`scale_diff` = 1.0)
    pub fn uniforms(&self) -> EffectUniforms {
        EffectUniforms::pack(self.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::builtin;
    use crate::effects::OPAQUE_WHITE;

    fn correction(ordinal: u32) -> EffectInstance {
        EffectInstance::new(
            InstanceId(7),
            Arc::new(builtin::descriptor(EffectKind::ColorCorrection)),
            ProgramHandle(1),
            ordinal,
            true,
        )
    }

    #[test]
    fn test_title_numbering() {
        assert_eq!(correction(0).title(), "Color Correction");
        assert_eq!(correction(2).title(), "Color Correction 2");
    }

    #[test]
    fn test_values_default_lazily() {
        let instance = correction(0);
        assert_eq!(instance.value("contrast"), Some(ParameterValue::Slider(100)));
        assert_eq!(instance.value("tintColor"), Some(ParameterValue::Color(OPAQUE_WHITE)));
        assert_eq!(instance.value("nope"), None);
    }

    #[test]
    fn test_set_value_clamps() {
        let mut instance = correction(0);
        assert_eq!(
            instance.set_value("exposure", ParameterValue::Slider(-999)),
            Some(ParameterValue::Slider(-200))
        );
        assert_eq!(instance.value("exposure"), Some(ParameterValue::Slider(-200)));
        assert_eq!(instance.set_value("exposure", ParameterValue::Color(OPAQUE_WHITE)), None);
    }

    #[test]
    fn test_uniforms_follow_slot_order() {
        let mut instance = correction(0);
        instance.set_value("saturation", ParameterValue::Slider(50));
        let uniforms = instance.uniforms();
        assert_eq!(uniforms.params[1][0], 1.0); // contrast default 100
        assert_eq!(uniforms.params[3][0], 0.5); // saturation
        assert_eq!(uniforms.params[5], OPAQUE_WHITE); // tint color
    }

    #[test]
    fn test_duplicate_resets_values() {
        let mut instance = correction(0);
        instance.set_value("brightness", ParameterValue::Slider(40));

        let copy = instance.duplicate(InstanceId(8), ProgramHandle(2), 1);
        assert_eq!(copy.id(), InstanceId(8));
        assert_eq!(copy.value("brightness"), Some(ParameterValue::Slider(0)));
        assert!(!copy.is_active());
        assert_eq!(copy.title(), "Color Correction 1");
    }
}
