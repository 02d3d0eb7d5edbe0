//! Application configuration loading from file and environment variables.

use dbrig_config::{Configuration, MaxConnections, Runtime};
use serde::Deserialize;
use thiserror::Error;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Which environment to connect and how.
    #[serde(default)]
    pub app: AppConfig,

    /// Database environments and global database settings.
    #[serde(default)]
    pub database: Configuration,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Selection of the environment block and runtime.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Environment name, e.g. "development" or "production".
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Driver runtime: "native" or "jvm".
    #[serde(default)]
    pub runtime: Runtime,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "dbrig_db=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            runtime: Runtime::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// What happened while loading, for logging once tracing is installed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoadNotes {
    /// The requested file did not exist and defaults were used.
    pub file_missing: bool,
    /// Environment overrides that were rejected, as `(variable, reason)`.
    pub ignored_overrides: Vec<(&'static str, String)>,
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `DBRIG_ENV` overrides `app.environment`
/// - `DBRIG_RUNTIME` overrides `app.runtime` ("native" or "jvm")
/// - `DBRIG_MAX_CONNECTIONS` overrides `database.max_connections` (kept as
///   given when it is not an integer)
/// - `DBRIG_LOG_LEVEL` overrides `logging.level`
/// - `DBRIG_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
///
/// Runs before the tracing subscriber exists, so nothing is logged here;
/// the returned [`LoadNotes`] carry anything the caller should report.
pub fn load_config(path: Option<&str>) -> Result<(Config, LoadNotes), ConfigError> {
    let mut notes = LoadNotes::default();
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                notes.file_missing = true;
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    notes.ignored_overrides = apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok((config, notes))
}

/// Applies `DBRIG_*` overrides and returns the ones that were rejected.
fn apply_env_overrides(
    config: &mut Config,
    var: impl Fn(&str) -> Option<String>,
) -> Vec<(&'static str, String)> {
    let mut ignored = Vec::new();
    if let Some(env) = var("DBRIG_ENV") {
        config.app.environment = env;
    }
    if let Some(runtime) = var("DBRIG_RUNTIME") {
        match runtime.parse() {
            Ok(parsed) => config.app.runtime = parsed,
            Err(e) => ignored.push(("DBRIG_RUNTIME", e.to_string())),
        }
    }
    if let Some(max) = var("DBRIG_MAX_CONNECTIONS") {
        config.database.max_connections = max.parse::<MaxConnections>().ok();
    }
    if let Some(level) = var("DBRIG_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("DBRIG_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    // Defaults such as schema_dump follow the selected environment.
    let environment = config.app.environment.clone();
    config.database.set_app_env(environment);
    ignored
}
