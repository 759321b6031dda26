//! Configuration management for Ratekeeper.

use std::num::NonZeroUsize;
use std::path::Path;

use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{RatekeeperError, Result};
use crate::ratelimit::{Algorithm, LimiterOptions};

/// Prefix for environment variable overrides, e.g.
/// `RATEKEEPER__LIMITER__MAX_REQUESTS=50`.
const ENV_PREFIX: &str = "RATEKEEPER";
const ENV_SEPARATOR: &str = "__";

/// Main configuration for Ratekeeper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatekeeperConfig {
    /// Limiter configuration
    #[serde(default)]
    pub limiter: LimiterSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterSettings {
    /// Which algorithm to run
    #[serde(default)]
    pub algorithm: Algorithm,

    /// Measurement window in milliseconds
    #[serde(default = "default_window_size_ms")]
    pub window_size_ms: u64,

    /// Requests admitted per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,

    /// Optional bound on tracked keys
    #[serde(default)]
    pub max_keys: Option<usize>,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            window_size_ms: default_window_size_ms(),
            max_requests: default_max_requests(),
            max_keys: None,
        }
    }
}

fn default_window_size_ms() -> u64 {
    1000
}

fn default_max_requests() -> u64 {
    100
}

impl LimiterSettings {
    /// Validate these settings into limiter options.
    pub fn options(&self) -> Result<LimiterOptions> {
        let options = LimiterOptions::new(self.window_size_ms, self.max_requests)?;

        match self.max_keys {
            None => Ok(options),
            Some(max_keys) => NonZeroUsize::new(max_keys)
                .map(|max_keys| options.with_max_keys(max_keys))
                .ok_or_else(|| {
                    RatekeeperError::Config("max_keys must be greater than 0".to_string())
                }),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of human-readable ones
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RatekeeperConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| RatekeeperError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Load layered configuration: built-in defaults, then the optional YAML
    /// file, then `RATEKEEPER__*` environment variables.
    ///
    /// Does not log, so it can run before a subscriber is installed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            let file = File::from(path).format(FileFormat::Yaml).required(true);
            builder = builder.add_source(file);
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
