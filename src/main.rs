//! FX Viewer - Main Entry Point
//!
//! Opens an image in a window and runs it through the configured effect chain.
//! The chain is edited from the keyboard; stage lists and status messages go
//! to the log.

use std::path::PathBuf;
use std::sync::Arc;

use fx_viewer::effects::ControlKind;
use fx_viewer::gpu::WgpuBackend;
use fx_viewer::shaders::{BuiltinShaders, DirectoryShaders, ShaderProvider, ShaderWatcher};
use fx_viewer::telemetry::{init_logging, LogConfig};
use fx_viewer::{
    EffectKind, EffectLibrary, FrameOutcome, ImageViewer, ParameterValue, StatusLevel, ViewerEvent,
    ViewerSettings,
};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

const WINDOW_TITLE: &str = "FX Viewer";

/// Raw slider steps per `+`/`-` press
const SLIDER_STEP: i32 = 5;

/// Keyboard commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Select(usize),
    ToggleActive,
    MoveUp,
    MoveDown,
    Duplicate,
    Remove,
    Add(EffectKind),
    Nudge(i32),
    Quit,
}

fn command_for_key(key: KeyCode) -> Option<Command> {
    let command = match key {
        KeyCode::Digit1 => Command::Select(0),
        KeyCode::Digit2 => Command::Select(1),
        KeyCode::Digit3 => Command::Select(2),
        KeyCode::Digit4 => Command::Select(3),
        KeyCode::Digit5 => Command::Select(4),
        KeyCode::Digit6 => Command::Select(5),
        KeyCode::Digit7 => Command::Select(6),
        KeyCode::Digit8 => Command::Select(7),
        KeyCode::Digit9 => Command::Select(8),
        KeyCode::Space => Command::ToggleActive,
        KeyCode::ArrowUp => Command::MoveUp,
        KeyCode::ArrowDown => Command::MoveDown,
        KeyCode::KeyD => Command::Duplicate,
        KeyCode::Delete | KeyCode::Backspace => Command::Remove,
        KeyCode::KeyC => Command::Add(EffectKind::ColorCorrection),
        KeyCode::KeyS => Command::Add(EffectKind::Sharpness),
        KeyCode::KeyP => Command::Add(EffectKind::Posterize),
        KeyCode::KeyI => Command::Add(EffectKind::Invert),
        KeyCode::KeyX => Command::Add(EffectKind::Pixelate),
        KeyCode::KeyR => Command::Add(EffectKind::Crt),
        KeyCode::Equal | KeyCode::NumpadAdd => Command::Nudge(SLIDER_STEP),
        KeyCode::Minus | KeyCode::NumpadSubtract => Command::Nudge(-SLIDER_STEP),
        KeyCode::Escape => Command::Quit,
        _ => return None,
    };
    Some(command)
}

/// Everything that exists once the window is up
struct Running {
    window: Arc<Window>,
    viewer: ImageViewer<WgpuBackend>,
    watcher: Option<ShaderWatcher>,
    /// Index of the stage keyboard commands apply to
    selected: usize,
}

struct FxViewerApp {
    settings: ViewerSettings,
    initial_file: Option<PathBuf>,
    running: Option<Running>,
}

impl FxViewerApp {
    fn new(settings: ViewerSettings, initial_file: Option<PathBuf>) -> Self {
        Self {
            settings,
            initial_file,
            running: None,
        }
    }

    fn shader_provider(&self) -> Box<dyn ShaderProvider> {
        match self.settings.shader_dir() {
            Some(dir) => {
                tracing::info!(dir = %dir.display(), "Loading shader overrides");
                Box::new(DirectoryShaders::new(dir))
            }
            None => Box::new(BuiltinShaders),
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Option<Running> {
        let attributes = WindowAttributes::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(
                self.settings.window_width,
                self.settings.window_height,
            ));

        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                tracing::error!("Failed to create window: {}", e);
                return None;
            }
        };
        tracing::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let mut backend = match pollster::block_on(WgpuBackend::new(window.clone())) {
            Ok(backend) => backend,
            Err(e) => {
                tracing::error!("GPU initialization failed: {}", e);
                return None;
            }
        };
        backend.set_background(self.settings.background_rgba());

        let mut viewer =
            match ImageViewer::new(backend, EffectLibrary::with_builtins(), self.shader_provider()) {
                Ok(viewer) => viewer,
                Err(e) => {
                    tracing::error!("Failed to build the base stage: {}", e);
                    return None;
                }
            };

        for kind in self.settings.effect_kinds() {
            // Failures are already logged and queued as status
            let _ = viewer.add_effect(kind);
        }

        if let Some(path) = self.initial_file.take() {
            if viewer.open_image(&path).is_ok() {
                self.settings.set_last_opened(&path);
            }
        }

        let watcher = match (self.settings.shader_hot_reload, self.settings.shader_dir()) {
            (true, Some(dir)) => match ShaderWatcher::new(&dir) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), "Shader hot-reload unavailable: {}", e);
                    None
                }
            },
            (true, None) => {
                tracing::warn!("Shader hot-reload needs a shader directory");
                None
            }
            _ => None,
        };

        Some(Running {
            window,
            viewer,
            watcher,
            selected: 0,
        })
    }
}

impl Running {
    fn handle_command(&mut self, command: Command) {
        let stages = self.viewer.stages();
        let selected = stages.get(self.selected);

        match command {
            Command::Select(index) => {
                if let Some(stage) = stages.get(index) {
                    self.selected = index;
                    tracing::info!(index, stage = %stage.title, active = stage.active, "Selected stage");
                }
            }
            Command::ToggleActive => {
                if let Some(stage) = selected {
                    let _ = self.viewer.set_active(stage.id, !stage.active);
                }
            }
            Command::MoveUp | Command::MoveDown => {
                if let Some(stage) = selected {
                    let id = stage.id;
                    let moved = if command == Command::MoveUp {
                        self.viewer.move_up(id)
                    } else {
                        self.viewer.move_down(id)
                    };
                    if let (Ok(true), Some(index)) = (moved, self.viewer.registry().index_of(id)) {
                        self.selected = index;
                    }
                }
            }
            Command::Duplicate => {
                if let Some(stage) = selected {
                    if let Ok((_, index)) = self.viewer.duplicate(stage.id) {
                        self.selected = index;
                    }
                }
            }
            Command::Remove => {
                if let Some(stage) = selected {
                    if self.viewer.remove(stage.id).is_ok() {
                        self.selected = self.selected.min(self.viewer.registry().len() - 1);
                    }
                }
            }
            Command::Add(kind) => {
                if let Ok(id) = self.viewer.add_effect(kind) {
                    if let Some(index) = self.viewer.registry().index_of(id) {
                        self.selected = index;
                    }
                }
            }
            Command::Nudge(delta) => {
                let Some(stage) = selected else {
                    return;
                };
                let slider = stage
                    .parameters
                    .iter()
                    .zip(&stage.values)
                    .find(|(spec, _)| spec.control == ControlKind::Slider);
                if let Some((spec, ParameterValue::Slider(raw))) = slider {
                    let value = ParameterValue::Slider(raw.saturating_add(delta));
                    if let Ok(stored) = self.viewer.set_parameter(stage.id, &spec.uniform_name, value) {
                        tracing::info!(stage = %stage.title, parameter = %spec.display_name, value = ?stored, "Parameter changed");
                    }
                }
            }
            Command::Quit => {}
        }
    }

    /// Log pending viewer events and fit the window to newly loaded images
    fn drain_events(&mut self) {
        for event in self.viewer.take_events() {
            match event {
                ViewerEvent::StagesChanged(stages) => {
                    for (index, stage) in stages.iter().enumerate() {
                        let marker = if index == self.selected { '>' } else { ' ' };
                        let state = if stage.active { "on" } else { "off" };
                        tracing::info!("{} {} {} [{}]", marker, index + 1, stage.title, state);
                    }
                }
                ViewerEvent::Status(status) => match status.level {
                    StatusLevel::Info => tracing::info!("{}", status.text),
                    StatusLevel::Warning => tracing::warn!("{}", status.text),
                    StatusLevel::Error => tracing::error!("{}", status.text),
                },
                ViewerEvent::ImageSizeChanged { width, height } => {
                    let mut size = PhysicalSize::new(width, height);
                    if let Some(monitor) = self.window.current_monitor() {
                        let limit = monitor.size();
                        size.width = size.width.min(limit.width);
                        size.height = size.height.min(limit.height);
                    }
                    let _ = self.window.request_inner_size(size);
                }
            }
        }
    }
}

impl ApplicationHandler for FxViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        tracing::info!("Creating window...");
        match self.start(event_loop) {
            Some(running) => {
                running.window.request_redraw();
                self.running = Some(running);
            }
            None => event_loop.exit(),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(running) = self.running.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("Close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                running.viewer.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                if let FrameOutcome::Skipped = running.viewer.render_frame() {
                    tracing::debug!("Frame skipped");
                }
            }
            WindowEvent::DroppedFile(path) => {
                tracing::info!(path = %path.display(), "Opening dropped file");
                if running.viewer.open_image(&path).is_ok() {
                    self.settings.set_last_opened(&path);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match command_for_key(key) {
                Some(Command::Quit) => event_loop.exit(),
                Some(command) => running.handle_command(command),
                None => {}
            },
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(running) = self.running.as_mut() else {
            return;
        };

        if let Some(watcher) = running.watcher.as_mut() {
            if let Some(path) = watcher.poll() {
                tracing::info!(path = %path.display(), "Shader changed, reloading");
                let _ = running.viewer.reload_shaders();
            }
            // Keep polling the watcher while it is alive
            event_loop.set_control_flow(ControlFlow::WaitUntil(
                std::time::Instant::now() + std::time::Duration::from_millis(50),
            ));
        }

        running.drain_events();
        if running.viewer.needs_redraw() {
            running.window.request_redraw();
        }
    }
}

fn main() {
    let log_config = LogConfig::default();
    // Keep the guard alive for the program duration
    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("FX Viewer v{}", env!("CARGO_PKG_VERSION"));

    let settings = ViewerSettings::load();
    let initial_file = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| settings.last_opened());
    if let Some(path) = &initial_file {
        tracing::info!("Opening {}", path.display());
    }

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            tracing::error!("Failed to create event loop: {}", e);
            return;
        }
    };
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = FxViewerApp::new(settings, initial_file);
    if let Err(e) = event_loop.run_app(&mut app) {
        tracing::error!("Event loop error: {}", e);
    }
}
