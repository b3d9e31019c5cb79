//! Daemon configuration loading from file and environment variables.

use chanwatch_presence::LookupFailurePolicy;
use serde::Deserialize;
use thiserror::Error;

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Which channel to observe and how to seed it.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the channel observer.
#[derive(Debug, Clone, Deserialize)]
pub struct ObserverConfig {
    /// The channel to observe. Required.
    #[serde(default)]
    pub channel_id: String,

    /// JSON file holding the members currently in the channel, as an array
    /// of ids. When set, it is read once at startup in place of a platform
    /// query and `initial_members` is ignored.
    #[serde(default)]
    pub members_file: Option<String>,

    /// Members to pre-seed when no `members_file` is configured.
    #[serde(default)]
    pub initial_members: Vec<String>,

    /// What to do when `members_file` cannot be read.
    #[serde(default)]
    pub on_lookup_failure: LookupFailurePolicy,

    /// Occupancy levels whose crossings are logged.
    #[serde(default)]
    pub thresholds: Vec<usize>,

    /// Capacity of the queue between the transition source and the observer.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "chanwatch_presence=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_queue_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            channel_id: String::new(),
            members_file: None,
            initial_members: Vec::new(),
            on_lookup_failure: LookupFailurePolicy::default(),
            thresholds: Vec::new(),
            queue_capacity: default_queue_capacity(),
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

    /// The configuration parsed but cannot be used.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Checks the values that have no usable default.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.observer.channel_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "observer.channel_id must be set".to_string(),
            ));
        }
        if self.observer.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "observer.queue_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `CHANWATCH_CHANNEL_ID` overrides `observer.channel_id`
/// - `CHANWATCH_MEMBERS_FILE` overrides `observer.members_file`
/// - `CHANWATCH_LOG_LEVEL` overrides `logging.level`
/// - `CHANWATCH_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed,
/// or if the resulting configuration is invalid.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Applies `CHANWATCH_*` overrides read through `var`.
pub fn apply_overrides<F>(config: &mut Config, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(channel_id) = var("CHANWATCH_CHANNEL_ID") {
        config.observer.channel_id = channel_id;
    }
    if let Some(members_file) = var("CHANWATCH_MEMBERS_FILE") {
        config.observer.members_file = Some(members_file).filter(|p| !p.trim().is_empty());
    }
    if let Some(level) = var("CHANWATCH_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("CHANWATCH_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}
