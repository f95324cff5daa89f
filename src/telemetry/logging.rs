//! Logging setup
//!
//! Structured logging through `tracing`. `log` records (from wgpu and the
//! backend's adapter report) are forwarded into the same subscriber.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "FX_VIEWER_LOG";
/// Environment variable selecting the console format (`json` or anything else)
pub const LOG_FORMAT_ENV: &str = "FX_VIEWER_LOG_FORMAT";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Write to stderr (default: true)
    pub console_enabled: bool,
    /// Also write a daily-rotated log file (default: false)
    pub file_enabled: bool,
    /// Directory for log files (default: platform data dir)
    pub file_dir: Option<PathBuf>,
    /// JSON console output (default: false)
    pub json_format: bool,
    /// Filter used when no environment variable is set (default: "info")
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_enabled: false,
            file_dir: None,
            json_format: false,
            default_level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Directory log files are written to
    pub fn log_dir(&self) -> PathBuf {
        self.file_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("FxViewer")
                .join("logs")
        })
    }
}

/// Whether JSON output is selected, given the value of [`LOG_FORMAT_ENV`]
fn wants_json(format_var: Option<&str>, config: &LogConfig) -> bool {
    match format_var {
        Some(value) => value.eq_ignore_ascii_case("json"),
        None => config.json_format,
    }
}

/// Initialize the global subscriber
///
/// The filter comes from `FX_VIEWER_LOG`, then `RUST_LOG`, then
/// `config.default_level`. Keep the returned guard alive for the life of the
/// program so buffered file output is flushed.
pub fn init_logging(
    config: &LogConfig,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(&config.default_level))?;

    let format_var = std::env::var(LOG_FORMAT_ENV).ok();
    let use_json = wants_json(format_var.as_deref(), config);

    let console_layer = config.console_enabled.then(|| {
        if use_json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .boxed()
        } else {
            fmt::layer().with_target(true).compact().boxed()
        }
    });

    let mut guard = None;
    let file_layer = if config.file_enabled {
        let dir = config.log_dir();
        std::fs::create_dir_all(&dir)?;
        let appender = tracing_appender::rolling::daily(&dir, "fx-viewer.log");
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        guard = Some(file_guard);
        Some(
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_line_number(true)
                .with_ansi(false),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        json_format = use_json,
        file_enabled = config.file_enabled,
        "Logging initialized"
    );

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert!(config.console_enabled);
        assert!(!config.file_enabled);
        assert!(!config.json_format);
        assert_eq!(config.default_level, "info");
    }

    #[test]
    fn test_format_variable_overrides_config() {
        let config = LogConfig::default();
        assert!(wants_json(Some("JSON"), &config));
        assert!(!wants_json(Some("pretty"), &config));
        assert!(!wants_json(None, &config));

        let config = LogConfig {
            json_format: true,
            ..LogConfig::default()
        };
        assert!(wants_json(None, &config));
    }

    #[test]
    fn test_explicit_log_dir() {
        let config = LogConfig {
            file_dir: Some(PathBuf::from("/var/log/fx")),
            ..LogConfig::default()
        };
        assert_eq!(config.log_dir(), PathBuf::from("/var/log/fx"));
        assert!(LogConfig::default().log_dir().ends_with("FxViewer/logs"));
    }
}
