//! Shader sources and hot-reload
//!
//! Built-in effect shaders are embedded in the binary. A user shader
//! directory can override any of them by file name, and [`ShaderWatcher`]
//! reports edits to that directory so programs can be recompiled live.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::{Duration, Instant};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::pipeline::{PipelineError, Result};

/// Embedded WGSL sources, by file name
const BUILTIN_SOURCES: &[(&str, &str)] = &[
    ("default.vert.wgsl", include_str!("default.vert.wgsl")),
    ("base.frag.wgsl", include_str!("base.frag.wgsl")),
    ("correction.frag.wgsl", include_str!("correction.frag.wgsl")),
    ("sharpness.frag.wgsl", include_str!("sharpness.frag.wgsl")),
    ("posterize.frag.wgsl", include_str!("posterize.frag.wgsl")),
    ("invert.frag.wgsl", include_str!("invert.frag.wgsl")),
    ("pixelate.frag.wgsl", include_str!("pixelate.frag.wgsl")),
    ("crt.frag.wgsl", include_str!("crt.frag.wgsl")),
];

/// Supplies shader source text by name
pub trait ShaderProvider {
    fn source(&self, name: &str) -> Result<String>;
}

/// The shaders compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinShaders;

impl BuiltinShaders {
    /// Names of every embedded shader
    pub fn names() -> impl Iterator<Item = &'static str> {
        BUILTIN_SOURCES.iter().map(|(name, _)| *name)
    }

    fn get(name: &str) -> Option<&'static str> {
        BUILTIN_SOURCES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, source)| *source)
    }
}

impl ShaderProvider for BuiltinShaders {
    fn source(&self, name: &str) -> Result<String> {
        Self::get(name)
            .map(str::to_string)
            .ok_or_else(|| PipelineError::ShaderSource {
                name: name.to_string(),
                message: "no built-in shader with this name".into(),
            })
    }
}

/// Shaders read from a directory, falling back to the built-ins
#[derive(Debug, Clone)]
pub struct DirectoryShaders {
    dir: PathBuf,
}

impl DirectoryShaders {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ShaderProvider for DirectoryShaders {
    fn source(&self, name: &str) -> Result<String> {
        let path = self.dir.join(name);
        if path.is_file() {
            return std::fs::read_to_string(&path).map_err(|e| PipelineError::ShaderSource {
                name: name.to_string(),
                message: format!("{}: {}", path.display(), e),
            });
        }
        BuiltinShaders.source(name)
    }
}

/// Holds the newest changed path until edits stop for `quiet`
#[derive(Debug)]
struct Debounce {
    quiet: Duration,
    pending: Option<(PathBuf, Instant)>,
}

impl Debounce {
    fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    fn note(&mut self, path: PathBuf, at: Instant) {
        self.pending = Some((path, at));
    }

    fn settled(&mut self, now: Instant) -> Option<PathBuf> {
        match &self.pending {
            Some((_, at)) if now.duration_since(*at) >= self.quiet => {
                self.pending.take().map(|(path, _)| path)
            }
            _ => None,
        }
    }
}

/// Reports edits to `.wgsl` files in one directory
pub struct ShaderWatcher {
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
    debounce: Debounce,
}

impl ShaderWatcher {
    /// Watch `dir` (not recursively)
    pub fn new(dir: &Path) -> notify::Result<Self> {
        let (tx, events) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |event| {
                let _ = tx.send(event);
            },
            Config::default(),
        )?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        tracing::info!(dir = %dir.display(), "Watching shader directory");

        Ok(Self {
            _watcher: watcher,
            events,
            debounce: Debounce::new(Duration::from_millis(100)),
        })
    }

    /// The last changed shader, once edits have been quiet for 100 ms
    pub fn poll(&mut self) -> Option<PathBuf> {
        for event in self.events.try_iter() {
            match event {
                Ok(event) => {
                    if let Some(path) = event.paths.into_iter().filter(|p| is_shader_file(p)).last() {
                        self.debounce.note(path, Instant::now());
                    }
                }
                Err(e) => tracing::warn!("Shader watch error: {}", e),
            }
        }

        let path = self.debounce.settled(Instant::now())?;
        tracing::debug!(path = %path.display(), "Shader edit settled");
        Some(path)
    }
}

fn is_shader_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "wgsl")
}
