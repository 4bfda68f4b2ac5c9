//! Configuration management for the intake pipeline

use crate::Result;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use zunder_validator::{Preset, ValidatorConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Validation gate settings. Defaults to the `Server` preset when the section is absent.
    #[serde(default = "default_validation")]
    pub validation: ValidatorConfig,
    pub executor: ExecutorConfig,
    pub logging: LoggingConfig,
}

fn default_validation() -> ValidatorConfig {
    ValidatorConfig::preset(Preset::Server)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub mode: ExecutorMode,
    /// FHIR base URL the transaction is POSTed to (remote mode only).
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorMode {
    /// Commit into an in-process store.
    #[default]
    Memory,
    /// Forward to a FHIR server.
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON formatting for logs
    #[serde(default)]
    pub json: bool,

    /// Enable file logging in addition to stderr
    #[serde(default)]
    pub file_enabled: bool,

    /// Directory for log files (default: ./logs)
    #[serde(default = "default_log_directory")]
    pub file_directory: String,

    /// Log file prefix (default: bundle-intake)
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,

    /// Log rotation: daily, hourly, minutely, never (default: daily)
    #[serde(default = "default_log_rotation")]
    pub file_rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file_enabled: false,
            file_directory: default_log_directory(),
            file_prefix: default_log_file_prefix(),
            file_rotation: default_log_rotation(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_directory() -> String {
    "./logs".to_string()
}

fn default_log_file_prefix() -> String {
    "bundle-intake".to_string()
}

fn default_log_rotation() -> String {
    "daily".to_string()
}

const LOG_ROTATIONS: [&str; 4] = ["daily", "hourly", "minutely", "never"];

impl Config {
    /// Load configuration from defaults, a config file and the environment.
    ///
    /// Without an explicit `path`, an optional `config.{yaml,toml,json}` in the working
    /// directory is used. Environment variables override both, e.g.
    /// `FHIR__EXECUTOR__MODE=remote` → `executor.mode`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("config").required(false),
        };

        let config = config::Config::builder()
            // Start with defaults
            .set_default("executor.mode", "memory")?
            .set_default("executor.timeout_seconds", default_timeout_seconds())?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.json", false)?
            .set_default("logging.file_enabled", false)?
            .set_default("logging.file_directory", default_log_directory())?
            .set_default("logging.file_prefix", default_log_file_prefix())?
            .set_default("logging.file_rotation", default_log_rotation())?
            .add_source(file)
            // Override with environment variables
            // Uses double underscore (__) to map to nested config structure
            // Example: FHIR__EXECUTOR__BASE_URL → config.executor.base_url
            .add_source(
                config::Environment::with_prefix("FHIR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.validation
            .compile()
            .map_err(|e| format!("validation: {}", e))?;

        if self.executor.timeout_seconds == 0 {
            return Err("executor.timeout_seconds must be > 0".to_string());
        }
        if self.executor.mode == ExecutorMode::Remote {
            let base_url = self.executor.base_url.as_deref().unwrap_or_default();
            if base_url.is_empty() {
                return Err("executor.base_url must be set when executor.mode=remote".to_string());
            }
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                return Err(format!(
                    "executor.base_url must be an http(s) URL, got '{}'",
                    base_url
                ));
            }
        }

        if !LOG_ROTATIONS.contains(&self.logging.file_rotation.as_str()) {
            return Err(format!(
                "logging.file_rotation must be one of {}, got '{}'",
                LOG_ROTATIONS.join(", "),
                self.logging.file_rotation
            ));
        }
        if self.logging.file_enabled && self.logging.file_prefix.is_empty() {
            return Err("logging.file_prefix must not be empty".to_string());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            validation: default_validation(),
            executor: ExecutorConfig {
                mode: ExecutorMode::Memory,
                base_url: None,
                timeout_seconds: default_timeout_seconds(),
            },
            logging: LoggingConfig::default(),
        }
    }
}
