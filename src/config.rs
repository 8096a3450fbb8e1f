//! Application configuration module
//!
//! Handles loading and validating configuration from an optional settings
//! file and `SQLGATE_` environment variables.

use crate::error::AppError;
use crate::pipeline::rules::RulesEngine;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings file looked up in the working directory when `--config` is not given
const DEFAULT_CONFIG_NAME: &str = "sqlgate";
const ENV_PREFIX: &str = "SQLGATE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Configuration file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Fallback `EnvFilter` directive when `RUST_LOG` is unset
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Output directory layout
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub log_file: String,
    pub latest_file: String,
    pub backups_dir: String,
    /// Write history files via temp file + rename
    pub atomic_writes: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_file: "execution_log.json".to_string(),
            latest_file: "latest_run.json".to_string(),
            backups_dir: "backups".to_string(),
            atomic_writes: true,
        }
    }
}

/// Rule engine configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub disabled: Vec<String>,
}

/// Complete application settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub output: OutputConfig,
    pub rules: RulesConfig,
}

impl Settings {
    /// Load settings: defaults, then the settings file, then environment.
    ///
    /// An explicit `path` must exist; the implicit `sqlgate.{toml,json,...}`
    /// in the working directory is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let file_source = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::MissingFile(p.to_path_buf()));
                }
                config::File::from(p).required(true)
            }
            None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let settings: Settings = config::Config::builder()
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("rules.disabled")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would send artifacts outside the output directory
    /// or name rules the engine does not know.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("output.log_file", &self.output.log_file),
            ("output.latest_file", &self.output.latest_file),
            ("output.backups_dir", &self.output.backups_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue(format!("{} must not be empty", key)));
            }
            if value.contains('/') || value.contains('\\') || value == ".." {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be a plain file name, got '{}'",
                    key, value
                )));
            }
        }

        if self.output.log_file == self.output.latest_file {
            return Err(ConfigError::InvalidValue(
                "output.log_file and output.latest_file must differ".to_string(),
            ));
        }

        let engine = RulesEngine::new();
        for id in &self.rules.disabled {
            if !engine.list_rules().iter().any(|r| r.id == *id) {
                return Err(ConfigError::InvalidValue(format!("unknown rule id '{}'", id)));
            }
        }

        Ok(())
    }
}
