//! Frame compositing
//!
//! Turns the chain into one pass per active stage. Every pass but the last
//! renders into its stage's target with the full quad; the last one draws
//! the centered quad on screen. Inactive stages are bridged over.

use super::error::{PipelineError, Result};
use super::registry::PipelineRegistry;
use super::targets::RenderTargetSet;
use crate::gpu::{PassCommand, PassInput, PassOutput, QuadKind, RenderBackend, TextureHandle};
use crate::viewport::ViewportGeometry;

/// Plan the passes for one frame
pub fn plan_frame(
    registry: &PipelineRegistry,
    targets: &RenderTargetSet,
    source: TextureHandle,
    geometry: &ViewportGeometry,
) -> Result<Vec<PassCommand>> {
    let stages = registry.stages();
    let Some(last_active) = stages.iter().rposition(|s| s.is_active()) else {
        return Err(PipelineError::invalid("no active stage to render"));
    };

    let mut passes = Vec::with_capacity(registry.active_count());
    let mut input = PassInput::Source(source);

    for (index, stage) in stages.iter().enumerate() {
        if !stage.is_active() {
            continue;
        }

        if index == last_active {
            passes.push(PassCommand {
                program: stage.program(),
                input,
                output: PassOutput::Screen,
                quad: QuadKind::Centered,
                uniforms: stage.uniforms().with_scale_diff(1.0),
            });
            break;
        }

        let target = targets.target_for(index).ok_or_else(|| PipelineError::RenderTarget {
            width: 0,
            height: 0,
            message: format!("no target allocated for stage {} ({})", index, stage.title()),
        })?;
        passes.push(PassCommand {
            program: stage.program(),
            input,
            output: PassOutput::Target(target.handle),
            quad: QuadKind::Full,
            uniforms: stage.uniforms().with_scale_diff(geometry.scale_diff),
        });
        input = PassInput::Target(target.handle);
    }

    Ok(passes)
}

/// Plan and submit one frame. Returns the number of passes drawn.
pub fn render_frame<B: RenderBackend + ?Sized>(
    backend: &mut B,
    registry: &PipelineRegistry,
    targets: &RenderTargetSet,
    source: TextureHandle,
    geometry: &ViewportGeometry,
) -> Result<usize> {
    let passes = plan_frame(registry, targets, source, geometry)?;
    backend.submit_frame(&passes)?;
    tracing::trace!(passes = passes.len(), "Frame composited");
    Ok(passes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{EffectKind, EffectLibrary, InstanceId, ParameterValue};
    use crate::gpu::recording::RecordingBackend;
    use crate::gpu::TargetHandle;
    use crate::shaders::BuiltinShaders;

    struct Chain {
        backend: RecordingBackend,
        registry: PipelineRegistry,
        targets: RenderTargetSet,
        source: TextureHandle,
        geometry: ViewportGeometry,
        ids: Vec<InstanceId>,
    }

    impl Chain {
        fn new(kinds: &[(EffectKind, bool)]) -> Self {
            let mut backend = RecordingBackend::new();
            let library = EffectLibrary::with_builtins();
            let mut registry =
                PipelineRegistry::new(&mut backend, &library, Box::new(BuiltinShaders)).unwrap();
            let mut ids = vec![registry.base_id()];
            for &(kind, active) in kinds {
                let id = registry
                    .add_effect(&mut backend, library.get(kind).unwrap())
                    .unwrap();
                registry.set_active(id, active).unwrap();
                ids.push(id);
            }
            let image = crate::image_source::DecodedImage::solid(400, 300, [255; 4]).unwrap();
            let source = backend.upload_image(&image).unwrap();
            Self {
                backend,
                registry,
                targets: RenderTargetSet::new(),
                source,
                geometry: ViewportGeometry::solve(1600, 900, 400, 300),
                ids,
            }
        }

        fn plan(&mut self) -> Vec<PassCommand> {
            self.targets
                .rebuild(&mut self.backend, &self.registry, 400, 300)
                .unwrap();
            plan_frame(&self.registry, &self.targets, self.source, &self.geometry).unwrap()
        }

        fn program(&self, index: usize) -> crate::gpu::ProgramHandle {
            self.registry.get(self.ids[index]).unwrap().program()
        }
    }

    /// Replace target handles with their order of appearance
    fn normalized(passes: &[PassCommand]) -> Vec<PassCommand> {
        let mut seen: Vec<TargetHandle> = Vec::new();
        let mut slot = |handle: TargetHandle| {
            let index = seen.iter().position(|&h| h == handle).unwrap_or_else(|| {
                seen.push(handle);
                seen.len() - 1
            });
            TargetHandle(index as u64)
        };
        passes
            .iter()
            .map(|p| {
                let mut p = *p;
                if let PassOutput::Target(h) = p.output {
                    p.output = PassOutput::Target(slot(h));
                }
                if let PassInput::Target(h) = p.input {
                    p.input = PassInput::Target(slot(h));
                }
                p
            })
            .collect()
    }

    #[test]
    fn test_single_stage_draws_centered_to_screen() {
        let mut chain = Chain::new(&[(EffectKind::Invert, false)]);
        let passes = chain.plan();

        assert_eq!(chain.targets.live_count(), 0);
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].program, chain.program(0));
        assert_eq!(passes[0].input, PassInput::Source(chain.source));
        assert_eq!(passes[0].output, PassOutput::Screen);
        assert_eq!(passes[0].quad, QuadKind::Centered);
        assert_eq!(passes[0].uniforms.scale_diff, 1.0);
    }

    #[test]
    fn test_inactive_stage_is_bridged() {
        // Base, Correction, Sharpness (off), Posterize
        let mut chain = Chain::new(&[
            (EffectKind::ColorCorrection, true),
            (EffectKind::Sharpness, false),
            (EffectKind::Posterize, true),
        ]);
        let passes = chain.plan();
        assert_eq!(chain.targets.live_count(), 2);
        assert_eq!(passes.len(), 3);

        let base_target = chain.targets.target_for(0).unwrap().handle;
        let correction_target = chain.targets.target_for(1).unwrap().handle;

        assert_eq!(passes[0].program, chain.program(0));
        assert_eq!(passes[0].input, PassInput::Source(chain.source));
        assert_eq!(passes[0].output, PassOutput::Target(base_target));
        assert_eq!(passes[0].quad, QuadKind::Full);

        assert_eq!(passes[1].program, chain.program(1));
        assert_eq!(passes[1].input, PassInput::Target(base_target));
        assert_eq!(passes[1].output, PassOutput::Target(correction_target));

        assert_eq!(passes[2].program, chain.program(3));
        assert_eq!(passes[2].input, PassInput::Target(correction_target));
        assert_eq!(passes[2].output, PassOutput::Screen);
        assert_eq!(passes[2].quad, QuadKind::Centered);

        assert!(passes.iter().all(|p| p.program != chain.program(2)));
    }

    #[test]
    fn test_scale_diff_only_on_intermediate_passes() {
        let mut chain = Chain::new(&[(EffectKind::Sharpness, true), (EffectKind::Pixelate, true)]);
        let passes = chain.plan();

        assert_eq!(passes[0].uniforms.scale_diff, chain.geometry.scale_diff);
        assert_eq!(passes[1].uniforms.scale_diff, chain.geometry.scale_diff);
        assert_eq!(passes[2].uniforms.scale_diff, 1.0);
        assert_eq!(chain.geometry.scale_diff, 3.0);
    }

    #[test]
    fn test_passes_carry_current_parameters() {
        let mut chain = Chain::new(&[(EffectKind::Sharpness, true)]);
        chain
            .registry
            .set_parameter(&mut chain.backend, chain.ids[1], "strength", ParameterValue::Slider(55))
            .unwrap();
        let passes = chain.plan();
        assert_eq!(passes[1].uniforms.params[0][0], 0.55);
    }

    #[test]
    fn test_toggle_round_trip_restores_frame() {
        let mut chain = Chain::new(&[
            (EffectKind::ColorCorrection, true),
            (EffectKind::Sharpness, true),
            (EffectKind::Crt, true),
        ]);
        let before = normalized(&chain.plan());

        chain.registry.set_active(chain.ids[2], false).unwrap();
        let toggled = normalized(&chain.plan());
        assert_eq!(toggled.len(), before.len() - 1);

        chain.registry.set_active(chain.ids[2], true).unwrap();
        let after = normalized(&chain.plan());
        assert_eq!(after, before);
    }

    #[test]
    fn test_missing_target_is_error() {
        let mut chain = Chain::new(&[(EffectKind::Invert, true)]);
        // No rebuild: the target set is still empty
        let result = plan_frame(&chain.registry, &chain.targets, chain.source, &chain.geometry);
        assert!(matches!(result, Err(PipelineError::RenderTarget { .. })));

        let passes = chain.plan();
        assert_eq!(passes.len(), 2);
    }

    #[test]
    fn test_render_frame_submits_plan() {
        let mut chain = Chain::new(&[(EffectKind::Invert, true)]);
        chain
            .targets
            .rebuild(&mut chain.backend, &chain.registry, 400, 300)
            .unwrap();

        let count = render_frame(
            &mut chain.backend,
            &chain.registry,
            &chain.targets,
            chain.source,
            &chain.geometry,
        )
        .unwrap();

        assert_eq!(count, 2);
        assert_eq!(chain.backend.frames.len(), 1);
        assert_eq!(chain.backend.last_frame().unwrap()[1].output, PassOutput::Screen);
    }
}
