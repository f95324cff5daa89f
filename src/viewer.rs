//! Image viewer facade
//!
//! [`ImageViewer`] is the single entry point the UI shell talks to. It wires
//! the effect library, pipeline registry, target allocator, compositor and
//! viewport solver together. Every command either succeeds and queues a
//! [`ViewerEvent::StagesChanged`], or fails, leaves the previous state intact
//! and queues a [`ViewerEvent::Status`]. Nothing here panics on bad input.

use std::path::Path;

use crate::effects::{EffectKind, EffectLibrary, InstanceId, ParameterValue};
use crate::gpu::{RenderBackend, TextureHandle};
use crate::image_source::{self, DecodedImage};
use crate::pipeline::{compositor, PipelineError, PipelineRegistry, RenderTargetSet, Result, StageSummary};
use crate::shaders::ShaderProvider;
use crate::viewport::ViewportGeometry;

/// Severity of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// A message for the status bar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            text: text.into(),
        }
    }
}

/// Notifications for the UI shell
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    /// The stage list changed; rebuild the parameter panels
    StagesChanged(Vec<StageSummary>),
    /// Something worth telling the user
    Status(StatusMessage),
    /// A new image was loaded
    ImageSizeChanged { width: u32, height: u32 },
}

/// Result of [`ImageViewer::render_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// No image loaded yet; nothing drawn
    Hidden,
    /// Rendering failed; the previous frame stays on screen
    Skipped,
    Presented { passes: usize },
}

/// The currently displayed source image
#[derive(Debug, Clone, Copy)]
struct LoadedImage {
    texture: TextureHandle,
    width: u32,
    height: u32,
}

pub struct ImageViewer<B: RenderBackend> {
    backend: B,
    library: EffectLibrary,
    registry: PipelineRegistry,
    targets: RenderTargetSet,
    image: Option<LoadedImage>,
    geometry: ViewportGeometry,
    events: Vec<ViewerEvent>,
    needs_redraw: bool,
}

impl<B: RenderBackend> ImageViewer<B> {
    /// Create a viewer whose pipeline holds only the base stage
    pub fn new(
        mut backend: B,
        library: EffectLibrary,
        shaders: Box<dyn ShaderProvider>,
    ) -> Result<Self> {
        let registry = PipelineRegistry::new(&mut backend, &library, shaders)?;
        let mut viewer = Self {
            backend,
            library,
            registry,
            targets: RenderTargetSet::new(),
            image: None,
            geometry: ViewportGeometry::default(),
            events: Vec::new(),
            needs_redraw: false,
        };
        viewer.emit_stages();
        Ok(viewer)
    }

    // Structural commands

    /// Append a new (inactive) effect of `kind`
    pub fn add_effect(&mut self, kind: EffectKind) -> Result<InstanceId> {
        let result = match self.library.get(kind) {
            Some(descriptor) => self.registry.add_effect(&mut self.backend, descriptor),
            None => Err(PipelineError::invalid(format!("effect '{}' is not registered", kind))),
        };
        self.structural(result)
    }

    pub fn move_up(&mut self, id: InstanceId) -> Result<bool> {
        let result = self.registry.move_up(id);
        self.structural_if_changed(result)
    }

    pub fn move_down(&mut self, id: InstanceId) -> Result<bool> {
        let result = self.registry.move_down(id);
        self.structural_if_changed(result)
    }

    /// Insert a copy of `id` right after it; returns the copy and its index
    pub fn duplicate(&mut self, id: InstanceId) -> Result<(InstanceId, usize)> {
        let result = self.registry.duplicate(&mut self.backend, id);
        self.structural(result)
    }

    pub fn remove(&mut self, id: InstanceId) -> Result<()> {
        let result = self.registry.remove(&mut self.backend, id);
        self.structural(result)
    }

    pub fn set_active(&mut self, id: InstanceId, active: bool) -> Result<()> {
        let result = self.registry.set_active(id, active);
        self.structural_if_changed(result).map(|_| ())
    }

    /// Edit a parameter; returns the stored (clamped) value
    pub fn set_parameter(
        &mut self,
        id: InstanceId,
        name: &str,
        value: ParameterValue,
    ) -> Result<ParameterValue> {
        match self
            .registry
            .set_parameter(&mut self.backend, id, name, value)
        {
            Ok(stored) => {
                self.needs_redraw = true;
                Ok(stored)
            }
            Err(e) => self.fail(e),
        }
    }

    // Display commands

    /// The window surface changed size
    pub fn resize(&mut self, width: u32, height: u32) {
        self.backend.resize_surface(width, height);
        self.update_geometry();
        self.needs_redraw = true;
    }

    /// Replace the displayed image.
    ///
    /// The new texture is uploaded before the old one is released, so a
    /// failed upload leaves the previous image on screen.
    pub fn load_image(&mut self, image: DecodedImage) -> Result<()> {
        let texture = match self.backend.upload_image(&image) {
            Ok(texture) => texture,
            Err(e) => return self.fail(e),
        };

        if let Some(previous) = self.image.replace(LoadedImage {
            texture,
            width: image.width(),
            height: image.height(),
        }) {
            self.backend.release_image(previous.texture);
        }

        let (width, height) = (image.width(), image.height());
        tracing::info!(width, height, "Image loaded");
        self.update_geometry();
        self.rebuild_targets();
        self.events.push(ViewerEvent::ImageSizeChanged { width, height });
        self.events.push(ViewerEvent::Status(StatusMessage::info(format!(
            "Loaded {}x{} image",
            width, height
        ))));
        self.needs_redraw = true;
        Ok(())
    }

    /// Decode and display an image file
    pub fn open_image(&mut self, path: &Path) -> Result<()> {
        match image_source::load_image(path) {
            Ok(image) => self.load_image(image),
            Err(e) => self.fail(e),
        }
    }

    /// Swap the shader source used for later compilations
    pub fn set_shader_provider(&mut self, shaders: Box<dyn ShaderProvider>) {
        self.registry.set_shader_provider(shaders);
    }

    /// Recompile every stage from fresh shader sources.
    ///
    /// Stages that fail keep their previous program and are reported as
    /// warnings; the first failure is returned.
    pub fn reload_shaders(&mut self) -> Result<()> {
        let failures = self.registry.recompile_all(&mut self.backend);
        self.needs_redraw = true;

        let total = failures.len();
        let mut first = None;
        // The stage keeps drawing with its previous program
        for (_, error) in failures {
            self.events.push(ViewerEvent::Status(StatusMessage::warning(format!(
                "{}; keeping the previous shader",
                error
            ))));
            first.get_or_insert(error);
        }
        match first {
            Some(error) => {
                tracing::warn!(failed = total, "Shader reload incomplete");
                Err(error)
            }
            None => {
                tracing::info!(stages = self.registry.len(), "Shaders reloaded");
                self.events
                    .push(ViewerEvent::Status(StatusMessage::info("Shaders reloaded")));
                Ok(())
            }
        }
    }

    /// Draw one frame.
    ///
    /// A skipped frame is not retried: the redraw flag is cleared and only
    /// the next resize, image load, parameter or chain edit sets it again.
    pub fn render_frame(&mut self) -> FrameOutcome {
        self.needs_redraw = false;
        let Some(image) = self.image else {
            return FrameOutcome::Hidden;
        };

        let (width, height) = self.backend.surface_size();
        if width == 0 || height == 0 {
            tracing::trace!("Surface has zero size, nothing to draw");
            return FrameOutcome::Skipped;
        }

        if self.targets.is_stale(&self.registry, image.width, image.height) && !self.rebuild_targets() {
            return FrameOutcome::Skipped;
        }

        let result = compositor::render_frame(
            &mut self.backend,
            &self.registry,
            &self.targets,
            image.texture,
            &self.geometry,
        );
        match result {
            Ok(passes) => FrameOutcome::Presented { passes },
            Err(e) => {
                tracing::warn!("Frame skipped: {}", e);
                self.report(&e);
                FrameOutcome::Skipped
            }
        }
    }

    // Queries

    /// Drain pending events
    pub fn take_events(&mut self) -> Vec<ViewerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Whether something changed since the last frame attempt
    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    pub fn stages(&self) -> Vec<StageSummary> {
        self.registry.snapshot()
    }

    pub fn registry(&self) -> &PipelineRegistry {
        &self.registry
    }

    pub fn library(&self) -> &EffectLibrary {
        &self.library
    }

    /// Size of the displayed image
    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image.map(|i| (i.width, i.height))
    }

    pub fn geometry(&self) -> &ViewportGeometry {
        &self.geometry
    }

    /// Number of allocated intermediate targets
    pub fn live_targets(&self) -> usize {
        self.targets.live_count()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    // Internals

    fn structural<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.topology_changed();
                Ok(value)
            }
            Err(e) => self.fail(e),
        }
    }

    fn structural_if_changed(&mut self, result: Result<bool>) -> Result<bool> {
        match result {
            Ok(true) => {
                self.topology_changed();
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => self.fail(e),
        }
    }

    fn topology_changed(&mut self) {
        if self.image.is_some() {
            self.rebuild_targets();
        }
        self.emit_stages();
        self.needs_redraw = true;
    }

    fn emit_stages(&mut self) {
        self.events
            .push(ViewerEvent::StagesChanged(self.registry.snapshot()));
    }

    /// Rebuild targets for the current image; reports failures
    fn rebuild_targets(&mut self) -> bool {
        let Some(image) = self.image else {
            return true;
        };
        match self
            .targets
            .rebuild(&mut self.backend, &self.registry, image.width, image.height)
        {
            Ok(()) => true,
            Err(e) => {
                self.report(&e);
                false
            }
        }
    }

    fn update_geometry(&mut self) {
        let Some(image) = self.image else {
            return;
        };
        let (width, height) = self.backend.surface_size();
        self.geometry = ViewportGeometry::solve(width, height, image.width, image.height);
        self.backend.set_geometry(&self.geometry);
        tracing::debug!(
            window_width = width,
            window_height = height,
            object_width = self.geometry.object_width,
            object_height = self.geometry.object_height,
            scale_diff = self.geometry.scale_diff,
            "Viewport updated"
        );
    }

    fn report(&mut self, error: &PipelineError) {
        self.events
            .push(ViewerEvent::Status(StatusMessage::error(error.to_string())));
    }

    fn fail<T>(&mut self, error: PipelineError) -> Result<T> {
        tracing::warn!("{}", error);
        self.report(&error);
        Err(error)
    }
}

impl<B: RenderBackend> Drop for ImageViewer<B> {
    fn drop(&mut self) {
        self.targets.release_all(&mut self.backend);
        if let Some(image) = self.image.take() {
            self.backend.release_image(image.texture);
        }
        self.registry.release_all(&mut self.backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::RecordingBackend;
    use crate::gpu::PassOutput;
    use crate::shaders::BuiltinShaders;

    fn viewer() -> ImageViewer<RecordingBackend> {
        ImageViewer::new(
            RecordingBackend::new(),
            EffectLibrary::with_builtins(),
            Box::new(BuiltinShaders),
        )
        .unwrap()
    }

    fn image(width: u32, height: u32) -> DecodedImage {
        DecodedImage::solid(width, height, [128, 64, 32, 255]).unwrap()
    }

    fn statuses(events: &[ViewerEvent]) -> Vec<&StatusMessage> {
        events
            .iter()
            .filter_map(|e| match e {
                ViewerEvent::Status(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_hidden_until_image_loaded() {
        let mut viewer = viewer();
        assert_eq!(viewer.render_frame(), FrameOutcome::Hidden);
        assert!(viewer.backend().frames.is_empty());

        viewer.load_image(image(400, 300)).unwrap();
        assert!(viewer.needs_redraw());
        assert_eq!(viewer.render_frame(), FrameOutcome::Presented { passes: 1 });
        assert!(!viewer.needs_redraw());
    }

    #[test]
    fn test_new_emits_initial_stage_list() {
        let mut viewer = viewer();
        let events = viewer.take_events();
        assert!(matches!(&events[0], ViewerEvent::StagesChanged(stages) if stages.len() == 1));
        assert!(viewer.take_events().is_empty());
    }

    #[test]
    fn test_structural_change_emits_stages_and_rebuilds() {
        let mut viewer = viewer();
        viewer.load_image(image(400, 300)).unwrap();
        let id = viewer.add_effect(EffectKind::Sharpness).unwrap();
        viewer.take_events();

        viewer.set_active(id, true).unwrap();
        assert_eq!(viewer.live_targets(), 1);

        let events = viewer.take_events();
        match events.as_slice() {
            [ViewerEvent::StagesChanged(stages)] => {
                assert_eq!(stages.len(), 2);
                assert!(stages[1].active);
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn test_scenario_mixed_chain() {
        let mut viewer = viewer();
        let correction = viewer.add_effect(EffectKind::ColorCorrection).unwrap();
        viewer.add_effect(EffectKind::Sharpness).unwrap();
        let posterize = viewer.add_effect(EffectKind::Posterize).unwrap();
        viewer.set_active(correction, true).unwrap();
        viewer.set_active(posterize, true).unwrap();
        viewer.load_image(image(640, 480)).unwrap();

        assert_eq!(viewer.render_frame(), FrameOutcome::Presented { passes: 3 });
        assert_eq!(viewer.live_targets(), 2);

        let frame = viewer.backend().last_frame().unwrap();
        let posterize_program = viewer.registry().get(posterize).unwrap().program();
        assert_eq!(frame[2].program, posterize_program);
        assert_eq!(frame[2].output, PassOutput::Screen);
    }

    #[test]
    fn test_failed_command_reports_status_and_keeps_state() {
        let mut viewer = viewer();
        viewer.take_events();
        let base = viewer.registry().base_id();

        assert!(viewer.remove(base).is_err());
        assert!(viewer.set_active(base, false).is_err());
        assert!(viewer.duplicate(base).is_err());
        assert!(viewer.add_effect(EffectKind::Base).is_err());

        let events = viewer.take_events();
        assert_eq!(statuses(&events).len(), 4);
        assert!(events.iter().all(|e| matches!(e, ViewerEvent::Status(_))));
        assert_eq!(viewer.registry().len(), 1);
    }

    #[test]
    fn test_noop_move_emits_nothing() {
        let mut viewer = viewer();
        let id = viewer.add_effect(EffectKind::Invert).unwrap();
        viewer.take_events();

        assert!(!viewer.move_up(id).unwrap());
        assert!(!viewer.move_down(id).unwrap());
        assert!(viewer.take_events().is_empty());
    }

    #[test]
    fn test_failed_image_load_keeps_previous_image() {
        let mut viewer = viewer();
        viewer.load_image(image(400, 300)).unwrap();
        viewer.take_events();

        viewer.backend_mut().fail_upload = true;
        assert!(matches!(
            viewer.load_image(image(10, 10)),
            Err(PipelineError::ImageLoad(_))
        ));
        assert_eq!(viewer.image_size(), Some((400, 300)));
        assert_eq!(viewer.backend().images.len(), 1);

        let events = viewer.take_events();
        assert_eq!(statuses(&events)[0].level, StatusLevel::Error);
        assert_eq!(viewer.render_frame(), FrameOutcome::Presented { passes: 1 });
    }

    #[test]
    fn test_open_missing_file_without_prior_image_stays_hidden() {
        let mut viewer = viewer();
        let result = viewer.open_image(Path::new("/nonexistent/fx-viewer/photo.png"));
        assert!(matches!(result, Err(PipelineError::ImageLoad(_))));
        assert_eq!(viewer.render_frame(), FrameOutcome::Hidden);
    }

    #[test]
    fn test_replacing_image_releases_old_texture() {
        let mut viewer = viewer();
        viewer.load_image(image(400, 300)).unwrap();
        viewer.load_image(image(800, 200)).unwrap();

        assert_eq!(viewer.backend().images.len(), 1);
        assert_eq!(viewer.image_size(), Some((800, 200)));
        let events = viewer.take_events();
        assert!(events.contains(&ViewerEvent::ImageSizeChanged {
            width: 800,
            height: 200
        }));
    }

    #[test]
    fn test_resize_updates_geometry() {
        let mut viewer = viewer();
        viewer.load_image(image(400, 300)).unwrap();
        viewer.render_frame();

        viewer.resize(1600, 900);
        assert!(viewer.needs_redraw());
        let geometry = *viewer.geometry();
        assert_eq!(geometry.object_height, 1.0);
        assert!(geometry.object_width < 1.0);
        assert_eq!(geometry.scale_diff, 3.0);
        assert_eq!(viewer.backend().geometry, Some(geometry));
    }

    #[test]
    fn test_target_failure_skips_frame_then_recovers() {
        let mut viewer = viewer();
        let id = viewer.add_effect(EffectKind::Invert).unwrap();
        viewer.load_image(image(400, 300)).unwrap();
        viewer.render_frame();
        viewer.take_events();

        viewer.backend_mut().fail_targets = true;
        viewer.set_active(id, true).unwrap();
        assert_eq!(viewer.render_frame(), FrameOutcome::Skipped);
        assert_eq!(viewer.backend().frames.len(), 1);
        assert!(!statuses(&viewer.take_events()).is_empty());

        viewer.backend_mut().fail_targets = false;
        assert_eq!(viewer.render_frame(), FrameOutcome::Presented { passes: 2 });
    }

    #[test]
    fn test_skipped_frame_is_not_retried() {
        let mut viewer = viewer();
        viewer.load_image(image(400, 300)).unwrap();
        viewer.take_events();
        viewer.backend_mut().fail_submit = true;

        assert_eq!(viewer.render_frame(), FrameOutcome::Skipped);
        assert!(!viewer.needs_redraw());
        assert_eq!(statuses(&viewer.take_events()).len(), 1);

        // Only a new edit asks for another frame
        viewer.resize(1024, 768);
        assert!(viewer.needs_redraw());
    }

    #[test]
    fn test_zero_size_surface_skips_quietly() {
        let mut viewer = viewer();
        viewer.load_image(image(400, 300)).unwrap();
        viewer.take_events();

        viewer.resize(0, 0);
        assert_eq!(viewer.render_frame(), FrameOutcome::Skipped);
        assert!(!viewer.needs_redraw());
        assert!(viewer.take_events().is_empty());
        assert!(viewer.backend().frames.is_empty());

        viewer.resize(800, 600);
        assert_eq!(viewer.render_frame(), FrameOutcome::Presented { passes: 1 });
    }

    #[test]
    fn test_set_parameter_requests_redraw() {
        let mut viewer = viewer();
        let id = viewer.add_effect(EffectKind::Posterize).unwrap();
        viewer.load_image(image(400, 300)).unwrap();
        viewer.render_frame();

        let stored = viewer
            .set_parameter(id, "numColors", ParameterValue::Slider(1))
            .unwrap();
        assert_eq!(stored, ParameterValue::Slider(2));
        assert!(viewer.needs_redraw());
    }

    #[test]
    fn test_reload_shaders_reports_failures() {
        let mut viewer = viewer();
        viewer.add_effect(EffectKind::Crt).unwrap();
        viewer.take_events();

        viewer.backend_mut().fail_compile.insert("CRT look".into());
        assert!(matches!(viewer.reload_shaders(), Err(PipelineError::Compile { .. })));
        let events = viewer.take_events();
        let reported = statuses(&events);
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].level, StatusLevel::Warning);

        viewer.backend_mut().fail_compile.clear();
        assert!(viewer.reload_shaders().is_ok());
    }

    #[test]
    fn test_remove_releases_targets_of_removed_stage() {
        let mut viewer = viewer();
        let a = viewer.add_effect(EffectKind::Invert).unwrap();
        let b = viewer.add_effect(EffectKind::Pixelate).unwrap();
        viewer.set_active(a, true).unwrap();
        viewer.set_active(b, true).unwrap();
        viewer.load_image(image(400, 300)).unwrap();
        assert_eq!(viewer.backend().targets.len(), 2);

        viewer.remove(b).unwrap();
        assert_eq!(viewer.live_targets(), 1);
        assert_eq!(viewer.backend().targets.len(), 1);
    }
}
