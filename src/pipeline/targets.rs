//! Render-target allocation for the effect chain
//!
//! Slot `i` holds the output of stage `i` for the next active stage to read.
//! A slot is filled iff its stage is active and is not the last active stage,
//! which draws straight to the screen. Any change to the chain or the image
//! size rebuilds the whole set; same-sized targets from the old set are reused.

use super::error::{PipelineError, Result};
use super::registry::PipelineRegistry;
use crate::gpu::{RenderBackend, TargetHandle};

/// One intermediate color target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub handle: TargetHandle,
    pub width: u32,
    pub height: u32,
}

/// Which slots need a target, given each stage's active flag in chain order
pub fn required_slots(active: &[bool]) -> Vec<bool> {
    let last_active = active.iter().rposition(|&a| a);
    (0..active.len().saturating_sub(1))
        .map(|i| active[i] && Some(i) != last_active)
        .collect()
}

/// Intermediate targets for one pipeline
#[derive(Debug, Default)]
pub struct RenderTargetSet {
    slots: Vec<Option<RenderTarget>>,
    /// (registry revision, width, height) the set was built for
    built_for: Option<(u64, u32, u32)>,
}

impl RenderTargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the set no longer matches the chain or the image size
    pub fn is_stale(&self, registry: &PipelineRegistry, width: u32, height: u32) -> bool {
        self.built_for != Some((registry.revision(), width, height))
    }

    /// Rebuild every slot for an image of `width`x`height`.
    ///
    /// On failure every target is released and the set is left empty, so
    /// the next frame retries from scratch.
    pub fn rebuild<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        registry: &PipelineRegistry,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let active: Vec<bool> = registry.stages().iter().map(|s| s.is_active()).collect();
        let required = required_slots(&active);

        self.built_for = None;
        // Only same-size targets survive into the new set
        let mut spare = Vec::new();
        for target in self.slots.drain(..).flatten() {
            if target.width == width && target.height == height {
                spare.push(target);
            } else {
                backend.release_target(target.handle);
            }
        }

        let mut slots = Vec::with_capacity(required.len());
        for (index, needed) in required.into_iter().enumerate() {
            if !needed {
                slots.push(None);
                continue;
            }

            let target = match spare.pop() {
                Some(target) => target,
                None => match backend.create_target(width, height) {
                    Ok(handle) => RenderTarget {
                        handle,
                        width,
                        height,
                    },
                    Err(e) => {
                        tracing::error!(slot = index, width, height, "Render target allocation failed: {}", e);
                        for target in slots.into_iter().flatten().chain(spare) {
                            backend.release_target(target.handle);
                        }
                        return Err(match e {
                            PipelineError::RenderTarget { .. } => e,
                            other => PipelineError::RenderTarget {
                                width,
                                height,
                                message: other.to_string(),
                            },
                        });
                    }
                },
            };
            slots.push(Some(target));
        }

        for target in spare {
            backend.release_target(target.handle);
        }

        self.slots = slots;
        self.built_for = Some((registry.revision(), width, height));
        tracing::debug!(
            stages = registry.len(),
            targets = self.live_count(),
            width,
            height,
            "Rebuilt render targets"
        );
        Ok(())
    }

    /// Target holding stage `index`'s output, if it has one
    pub fn target_for(&self, index: usize) -> Option<&RenderTarget> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Number of allocated targets
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Number of slots (stage count - 1)
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Release every target and forget what the set was built for
    pub fn release_all<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        for target in self.slots.drain(..).flatten() {
            backend.release_target(target.handle);
        }
        self.built_for = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{EffectKind, EffectLibrary, InstanceId};
    use crate::gpu::recording::RecordingBackend;
    use crate::shaders::BuiltinShaders;

    fn setup(kinds: &[(EffectKind, bool)]) -> (RecordingBackend, PipelineRegistry, Vec<InstanceId>) {
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
        (backend, registry, ids)
    }

    #[test]
    fn test_required_slots() {
        assert_eq!(required_slots(&[true]), Vec::<bool>::new());
        assert_eq!(required_slots(&[true, false, false]), [false, false]);
        assert_eq!(required_slots(&[true, true, false, true]), [true, true, false]);
        assert_eq!(required_slots(&[true, true, true, false]), [true, true, false]);
    }

    #[test]
    fn test_single_active_stage_needs_no_targets() {
        let (mut backend, registry, _) = setup(&[(EffectKind::Invert, false)]);
        let mut targets = RenderTargetSet::new();
        targets.rebuild(&mut backend, &registry, 640, 480).unwrap();

        assert_eq!(targets.live_count(), 0);
        assert_eq!(targets.slot_count(), 1);
        assert!(backend.targets.is_empty());
    }

    #[test]
    fn test_mixed_chain_allocates_one_less_than_active() {
        let (mut backend, registry, _) = setup(&[
            (EffectKind::ColorCorrection, true),
            (EffectKind::Sharpness, false),
            (EffectKind::Posterize, true),
        ]);
        let mut targets = RenderTargetSet::new();
        targets.rebuild(&mut backend, &registry, 640, 480).unwrap();

        assert_eq!(targets.live_count(), 2);
        assert!(targets.target_for(0).is_some());
        assert!(targets.target_for(1).is_some());
        assert!(targets.target_for(2).is_none());
        assert!(targets.target_for(3).is_none());
        assert_eq!(backend.targets.len(), 2);
    }

    #[test]
    fn test_live_count_matches_active_minus_one() {
        let (mut backend, mut registry, ids) = setup(&[
            (EffectKind::ColorCorrection, false),
            (EffectKind::Sharpness, false),
            (EffectKind::Posterize, false),
            (EffectKind::Pixelate, false),
        ]);
        let mut targets = RenderTargetSet::new();

        for &id in &ids[1..] {
            registry.set_active(id, true).unwrap();
            targets.rebuild(&mut backend, &registry, 320, 240).unwrap();
            assert_eq!(targets.live_count(), registry.active_count() - 1);
            assert_eq!(backend.targets.len(), targets.live_count());
        }
        for &id in &ids[1..] {
            registry.set_active(id, false).unwrap();
            targets.rebuild(&mut backend, &registry, 320, 240).unwrap();
            assert_eq!(targets.live_count(), registry.active_count() - 1);
            assert_eq!(backend.targets.len(), targets.live_count());
        }
    }

    #[test]
    fn test_rebuild_reuses_same_size_targets() {
        let (mut backend, mut registry, ids) = setup(&[
            (EffectKind::ColorCorrection, true),
            (EffectKind::Sharpness, true),
        ]);
        let mut targets = RenderTargetSet::new();
        targets.rebuild(&mut backend, &registry, 320, 240).unwrap();
        assert_eq!(backend.targets_created, 2);

        registry.move_up(ids[2]).unwrap();
        targets.rebuild(&mut backend, &registry, 320, 240).unwrap();
        assert_eq!(backend.targets_created, 2);
        assert_eq!(targets.live_count(), 2);
    }

    #[test]
    fn test_resize_replaces_targets() {
        let (mut backend, registry, _) = setup(&[(EffectKind::Invert, true)]);
        let mut targets = RenderTargetSet::new();
        targets.rebuild(&mut backend, &registry, 320, 240).unwrap();
        let old = targets.target_for(0).unwrap().handle;

        assert!(targets.is_stale(&registry, 640, 480));
        targets.rebuild(&mut backend, &registry, 640, 480).unwrap();

        assert!(!backend.targets.contains_key(&old));
        assert_eq!(backend.targets[&targets.target_for(0).unwrap().handle], (640, 480));
        assert!(!targets.is_stale(&registry, 640, 480));
    }

    #[test]
    fn test_resize_frees_old_targets_before_allocating() {
        let (mut backend, registry, _) = setup(&[
            (EffectKind::ColorCorrection, true),
            (EffectKind::Sharpness, true),
        ]);
        let mut targets = RenderTargetSet::new();
        targets.rebuild(&mut backend, &registry, 320, 240).unwrap();
        assert_eq!(backend.peak_targets, 2);

        targets.rebuild(&mut backend, &registry, 640, 480).unwrap();

        assert_eq!(backend.targets_created, 4);
        assert_eq!(backend.peak_targets, registry.active_count() - 1);
        assert!(backend.targets.values().all(|&size| size == (640, 480)));
    }

    #[test]
    fn test_failed_allocation_releases_everything() {
        let (mut backend, registry, _) = setup(&[
            (EffectKind::ColorCorrection, true),
            (EffectKind::Sharpness, true),
        ]);
        let mut targets = RenderTargetSet::new();
        targets.rebuild(&mut backend, &registry, 320, 240).unwrap();

        backend.fail_targets = true;
        let result = targets.rebuild(&mut backend, &registry, 640, 480);

        assert!(matches!(result, Err(PipelineError::RenderTarget { .. })));
        assert_eq!(targets.live_count(), 0);
        assert!(backend.targets.is_empty());
        assert!(targets.is_stale(&registry, 640, 480));
    }

    #[test]
    fn test_topology_change_marks_stale() {
        let (mut backend, mut registry, ids) = setup(&[(EffectKind::Invert, false)]);
        let mut targets = RenderTargetSet::new();
        targets.rebuild(&mut backend, &registry, 320, 240).unwrap();
        assert!(!targets.is_stale(&registry, 320, 240));

        registry.set_active(ids[1], true).unwrap();
        assert!(targets.is_stale(&registry, 320, 240));
    }

    #[test]
    fn test_release_all() {
        let (mut backend, registry, _) = setup(&[(EffectKind::Invert, true)]);
        let mut targets = RenderTargetSet::new();
        targets.rebuild(&mut backend, &registry, 320, 240).unwrap();
        targets.release_all(&mut backend);
        assert!(backend.targets.is_empty());
        assert_eq!(targets.live_count(), 0);
    }
}
