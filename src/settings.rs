//! Viewer preferences
//!
//! Stored as XML in the platform config directory
//! (`<config>/FxViewer/settings.xml`).

use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};

use crate::effects::EffectKind;

/// Persisted viewer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "FxViewerSettings")]
pub struct ViewerSettings {
    /// Initial window width in pixels
    #[serde(rename = "windowWidth", default = "default_window_width")]
    pub window_width: u32,

    /// Initial window height in pixels
    #[serde(rename = "windowHeight", default = "default_window_height")]
    pub window_height: u32,

    /// Clear color of the visible surface (`#RRGGBB`)
    #[serde(rename = "background", default = "default_background")]
    pub background: String,

    /// Effects appended after the base stage at startup, by key
    #[serde(rename = "effect", default = "default_effects")]
    pub effects: Vec<String>,

    /// Directory whose `.wgsl` files override the built-in shaders
    #[serde(rename = "shaderDir", default, skip_serializing_if = "Option::is_none")]
    pub shader_dir: Option<String>,

    /// Recompile effects when files in `shader_dir` change
    #[serde(rename = "shaderHotReload", default)]
    pub shader_hot_reload: bool,

    /// Image shown at startup when none is given on the command line
    #[serde(rename = "lastOpenedFile", default, skip_serializing_if = "Option::is_none")]
    pub last_opened_file: Option<String>,
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

fn default_background() -> String {
    "#FFFFFF".to_string()
}

/// Every built-in effect once, in menu order
fn default_effects() -> Vec<String> {
    EffectKind::all()
        .iter()
        .filter(|kind| **kind != EffectKind::Base)
        .map(|kind| kind.key().to_string())
        .collect()
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            background: default_background(),
            effects: default_effects(),
            shader_dir: None,
            shader_hot_reload: false,
            last_opened_file: None,
        }
    }
}

/// Parse `#RRGGBB` (or `RRGGBB`) into an opaque RGBA color
pub fn parse_hex_color(value: &str) -> Option<[f32; 4]> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([
        channel(0)? as f32 / 255.0,
        channel(2)? as f32 / 255.0,
        channel(4)? as f32 / 255.0,
        1.0,
    ])
}

impl ViewerSettings {
    /// Default location of the settings file
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("FxViewer");
            p.push("settings.xml");
            p
        })
    }

    /// Load settings from the config directory, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from_file(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Ignoring unreadable settings: {}", e);
                Self::default()
            }
        }
    }

    /// Save settings to the config directory
    pub fn save(&self) -> Result<(), SettingsError> {
        let Some(path) = Self::settings_path() else {
            return Err(SettingsError::NoConfigDir);
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(SettingsError::Io)?;
        }
        self.save_to_file(&path)
    }

    /// Load settings from an XML file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(SettingsError::Io)?;
        let mut settings: Self = from_str(&contents).map_err(SettingsError::XmlParse)?;

        settings.window_width = settings.window_width.max(1);
        settings.window_height = settings.window_height.max(1);

        Ok(settings)
    }

    /// Save settings to an XML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        let xml = to_string(self).map_err(SettingsError::XmlWrite)?;
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);

        fs::write(path, formatted).map_err(SettingsError::Io)?;
        Ok(())
    }

    /// Startup effects; unknown keys and the base stage are skipped
    pub fn effect_kinds(&self) -> Vec<EffectKind> {
        self.effects
            .iter()
            .filter_map(|key| match EffectKind::from_key(key) {
                Some(EffectKind::Base) => {
                    tracing::warn!("Ignoring 'base' in the effect list: the base stage is implicit");
                    None
                }
                Some(kind) => Some(kind),
                None => {
                    tracing::warn!(key = %key, "Ignoring unknown effect in settings");
                    None
                }
            })
            .collect()
    }

    /// Background clear color; white if the setting doesn't parse
    pub fn background_rgba(&self) -> [f32; 4] {
        parse_hex_color(&self.background).unwrap_or_else(|| {
            tracing::warn!(value = %self.background, "Invalid background color, using white");
            [1.0; 4]
        })
    }

    pub fn shader_dir(&self) -> Option<PathBuf> {
        self.shader_dir.as_ref().map(PathBuf::from)
    }

    /// Remember `path` as the last opened image and save
    pub fn set_last_opened(&mut self, path: &Path) {
        self.last_opened_file = Some(path.to_string_lossy().to_string());
        if let Err(e) = self.save() {
            tracing::warn!("Failed to save settings: {:?}", e);
        }
    }

    /// The last opened image, if it still exists
    pub fn last_opened(&self) -> Option<PathBuf> {
        self.last_opened_file
            .as_ref()
            .map(PathBuf::from)
            .filter(|p| p.exists())
    }
}

/// Settings-related errors
#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    XmlParse(quick_xml::DeError),
    XmlWrite(quick_xml::SeError),
    NoConfigDir,
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "IO error: {}", e),
            SettingsError::XmlParse(e) => write!(f, "XML parse error: {}", e),
            SettingsError::XmlWrite(e) => write!(f, "XML write error: {}", e),
            SettingsError::NoConfigDir => write!(f, "Could not find config directory"),
        }
    }
}

impl std::error::Error for SettingsError {}
