//! Pipeline registry: the ordered chain of effect instances
//!
//! Index 0 always holds the base stage, which samples the source image. It
//! is created active and can never be moved, deactivated, copied or removed.

use std::collections::HashMap;
use std::sync::Arc;

use super::error::{PipelineError, Result};
use crate::effects::{
    EffectDescriptor, EffectInstance, EffectKind, EffectLibrary, InstanceId, ParameterSpec,
    ParameterValue,
};
use crate::gpu::{ProgramHandle, RenderBackend};
use crate::shaders::ShaderProvider;

/// What the UI panel needs to build one stage's controls
#[derive(Debug, Clone, PartialEq)]
pub struct StageSummary {
    pub id: InstanceId,
    pub title: String,
    pub kind: EffectKind,
    pub active: bool,
    pub parameters: Vec<ParameterSpec>,
    /// Current values, in parameter order
    pub values: Vec<ParameterValue>,
}

/// Owns every effect instance and its compiled program
pub struct PipelineRegistry {
    stages: Vec<EffectInstance>,
    base: InstanceId,
    next_id: u64,
    /// Instances created so far, per kind (drives title numbering)
    created: HashMap<EffectKind, u32>,
    /// Bumped on every topology or activity change
    revision: u64,
    shaders: Box<dyn ShaderProvider>,
}

impl PipelineRegistry {
    /// Create a pipeline holding only the base stage
    pub fn new<B: RenderBackend + ?Sized>(
        backend: &mut B,
        library: &EffectLibrary,
        shaders: Box<dyn ShaderProvider>,
    ) -> Result<Self> {
        let descriptor = library.get(EffectKind::Base).ok_or_else(|| {
            PipelineError::InvalidDescriptor("the effect library has no base effect".into())
        })?;

        let mut registry = Self {
            stages: Vec::new(),
            base: InstanceId(1),
            next_id: 1,
            created: HashMap::new(),
            revision: 0,
            shaders,
        };
        let base = registry.instantiate(backend, descriptor, true)?;
        registry.base = base.id();
        registry.stages.push(base);
        Ok(registry)
    }

    /// Compile a new instance and append it to the chain (inactive)
    pub fn add_effect<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        descriptor: Arc<EffectDescriptor>,
    ) -> Result<InstanceId> {
        if descriptor.kind == EffectKind::Base {
            return Err(PipelineError::invalid("the base stage cannot be added twice"));
        }

        let instance = self.instantiate(backend, descriptor, false)?;
        let id = instance.id();
        tracing::debug!(instance = %id, stage = %instance.title(), "Added effect");
        self.stages.push(instance);
        self.touch();
        Ok(id)
    }

    /// Swap a stage with its predecessor. Returns false at the boundary.
    pub fn move_up(&mut self, id: InstanceId) -> Result<bool> {
        let index = self.require_index(id)?;
        // Index 1 would swap with the base
        if index <= 1 {
            return Ok(false);
        }
        self.stages.swap(index, index - 1);
        tracing::debug!(instance = %id, from = index, to = index - 1, "Moved effect up");
        self.touch();
        Ok(true)
    }

    /// Swap a stage with its successor. Returns false at the boundary.
    pub fn move_down(&mut self, id: InstanceId) -> Result<bool> {
        let index = self.require_index(id)?;
        if index == 0 || index + 1 >= self.stages.len() {
            return Ok(false);
        }
        self.stages.swap(index, index + 1);
        tracing::debug!(instance = %id, from = index, to = index + 1, "Moved effect down");
        self.touch();
        Ok(true)
    }

    /// Insert a fresh copy (default values, inactive) right after `id`
    pub fn duplicate<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        id: InstanceId,
    ) -> Result<(InstanceId, usize)> {
        let index = self.require_index(id)?;
        if index == 0 {
            return Err(PipelineError::invalid("the base stage cannot be duplicated"));
        }

        let program = self.compile(backend, self.stages[index].descriptor())?;
        let (copy_id, ordinal) = self.allocate(self.stages[index].kind());
        let copy = self.stages[index].duplicate(copy_id, program, ordinal);
        backend.write_uniforms(program, &copy.uniforms());
        tracing::debug!(source = %id, instance = %copy_id, stage = %copy.title(), "Duplicated effect");
        self.stages.insert(index + 1, copy);
        self.touch();
        Ok((copy_id, index + 1))
    }

    /// Remove a stage and release its program
    pub fn remove<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, id: InstanceId) -> Result<()> {
        let index = self.require_index(id)?;
        if index == 0 {
            return Err(PipelineError::invalid("the base stage cannot be removed"));
        }

        let instance = self.stages.remove(index);
        backend.release_program(instance.program());
        tracing::debug!(instance = %id, stage = %instance.title(), "Removed effect");
        self.touch();
        Ok(())
    }

    /// Enable or disable a stage. Returns whether the flag changed.
    pub fn set_active(&mut self, id: InstanceId, active: bool) -> Result<bool> {
        let index = self.require_index(id)?;
        if index == 0 {
            if active {
                return Ok(false);
            }
            return Err(PipelineError::invalid("the base stage cannot be deactivated"));
        }

        let instance = &mut self.stages[index];
        if instance.is_active() == active {
            return Ok(false);
        }
        instance.set_active(active);
        tracing::debug!(instance = %id, active, "Toggled effect");
        self.touch();
        Ok(true)
    }

    /// Edit a parameter and re-upload the stage's uniforms.
    ///
    /// Sliders are clamped into range; the stored value is returned.
    pub fn set_parameter<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        id: InstanceId,
        name: &str,
        value: ParameterValue,
    ) -> Result<ParameterValue> {
        let index = self.require_index(id)?;
        let instance = &mut self.stages[index];
        let stored = instance.set_value(name, value).ok_or_else(|| {
            PipelineError::invalid(format!(
                "{} has no parameter '{}' accepting {:?}",
                instance.title(),
                name,
                value
            ))
        })?;
        backend.write_uniforms(instance.program(), &instance.uniforms());
        tracing::trace!(instance = %id, parameter = name, value = ?stored, "Parameter changed");
        Ok(stored)
    }

    /// Current value of a parameter (edited or default)
    pub fn parameter_value(&self, id: InstanceId, name: &str) -> Result<ParameterValue> {
        let instance = self.require(id)?;
        instance.value(name).ok_or_else(|| {
            PipelineError::invalid(format!("{} has no parameter '{}'", instance.title(), name))
        })
    }

    /// Every instance id in render order
    pub fn effective_order(&self) -> Vec<InstanceId> {
        self.stages.iter().map(EffectInstance::id).collect()
    }

    /// Number of active stages (at least 1: the base)
    pub fn active_count(&self) -> usize {
        self.stages.iter().filter(|s| s.is_active()).count()
    }

    /// Stages in render order
    pub fn stages(&self) -> &[EffectInstance] {
        &self.stages
    }

    pub fn get(&self, id: InstanceId) -> Option<&EffectInstance> {
        self.stages.iter().find(|s| s.id() == id)
    }

    pub fn index_of(&self, id: InstanceId) -> Option<usize> {
        self.stages.iter().position(|s| s.id() == id)
    }

    /// Id of the protected base stage
    pub fn base_id(&self) -> InstanceId {
        self.base
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// False until `release_all`: the base stage is never removed
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Counter that changes whenever targets may need rebuilding
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Stage list for the UI panel
    pub fn snapshot(&self) -> Vec<StageSummary> {
        self.stages
            .iter()
            .map(|s| StageSummary {
                id: s.id(),
                title: s.title(),
                kind: s.kind(),
                active: s.is_active(),
                parameters: s.parameters().to_vec(),
                values: s.values(),
            })
            .collect()
    }

    /// Swap the shader source used by later compilations
    pub fn set_shader_provider(&mut self, shaders: Box<dyn ShaderProvider>) {
        self.shaders = shaders;
    }

    /// Recompile every stage from fresh sources.
    ///
    /// Identity and values are kept. A stage that fails keeps its previous
    /// program; the failures are returned.
    pub fn recompile_all<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Vec<(InstanceId, PipelineError)> {
        let mut failures = Vec::new();
        for index in 0..self.stages.len() {
            let descriptor = Arc::clone(self.stages[index].descriptor());
            match self.compile(backend, &descriptor) {
                Ok(program) => {
                    let instance = &mut self.stages[index];
                    backend.release_program(instance.program());
                    instance.set_program(program);
                    backend.write_uniforms(program, &instance.uniforms());
                }
                Err(e) => {
                    let id = self.stages[index].id();
                    tracing::warn!(instance = %id, stage = %self.stages[index].title(), "Recompile failed: {}", e);
                    failures.push((id, e));
                }
            }
        }
        failures
    }

    /// Release every program; the registry is unusable afterwards
    pub fn release_all<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        for instance in self.stages.drain(..) {
            backend.release_program(instance.program());
        }
        self.touch();
    }

    fn instantiate<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        descriptor: Arc<EffectDescriptor>,
        active: bool,
    ) -> Result<EffectInstance> {
        let program = self.compile(backend, &descriptor)?;
        let (id, ordinal) = self.allocate(descriptor.kind);
        let instance = EffectInstance::new(id, descriptor, program, ordinal, active);
        backend.write_uniforms(program, &instance.uniforms());
        Ok(instance)
    }

    /// Next instance id and the title ordinal for `kind`
    fn allocate(&mut self, kind: EffectKind) -> (InstanceId, u32) {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        let created = self.created.entry(kind).or_insert(0);
        let ordinal = *created;
        *created += 1;
        (id, ordinal)
    }

    fn compile<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
        descriptor: &EffectDescriptor,
    ) -> Result<ProgramHandle> {
        let label = descriptor.label();
        let as_compile_error = |e: PipelineError| PipelineError::Compile {
            label: label.clone(),
            message: e.to_string(),
        };
        let vertex = self
            .shaders
            .source(&descriptor.vertex_shader)
            .map_err(as_compile_error)?;
        let fragment = self
            .shaders
            .source(&descriptor.fragment_shader)
            .map_err(as_compile_error)?;
        backend.compile_program(&label, &vertex, &fragment)
    }

    fn require_index(&self, id: InstanceId) -> Result<usize> {
        self.index_of(id)
            .ok_or_else(|| PipelineError::invalid(format!("unknown effect instance {}", id)))
    }

    fn require(&self, id: InstanceId) -> Result<&EffectInstance> {
        self.get(id)
            .ok_or_else(|| PipelineError::invalid(format!("unknown effect instance {}", id)))
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}
