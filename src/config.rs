//! Configuration management for the scoring client.
//!
//! Layers, lowest first: built-in defaults, an optional TOML file, then the
//! `MODEL_SERVER_HOST` / `MODEL_SERVER_PORT` / `MODEL_SERVER_ENDPOINT`
//! environment variables.

use crate::models::classifier::THRESHOLD_DEFAULT;
use anyhow::{Context, Result};
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

pub const ENV_HOST: &str = "MODEL_SERVER_HOST";
pub const ENV_PORT: &str = "MODEL_SERVER_PORT";
pub const ENV_ENDPOINT: &str = "MODEL_SERVER_ENDPOINT";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub classification: ClassificationConfig,
    pub upload: UploadConfig,
    pub logging: LoggingConfig,
}

/// Scoring service location
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Scheme and host, e.g. `http://localhost`
    pub host: String,
    pub port: u16,
    /// Request path, e.g. `/predict`
    pub endpoint: String,
    /// Whole-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl ServerConfig {
    /// Effective endpoint: `{host}:{port}{path}`
    pub fn url(&self) -> String {
        format!("{}:{}{}", self.host, self.port, self.endpoint)
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// Threshold used when the caller does not pick one
#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationConfig {
    pub threshold: f64,
}

/// Batch upload parsing options
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Single-byte field delimiter for delimited text
    pub delimiter: String,
}

impl UploadConfig {
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes()[0]
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load from the default path and the process environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific path and the process environment
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Load from a path, reading overrides through `env`.
    ///
    /// A missing file is not an error; the defaults then apply.
    pub fn load_with_env<P, F>(path: P, env: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();
        let path = path.as_ref();

        let config = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("server.endpoint", defaults.server.endpoint)?
            .set_default("server.timeout_ms", defaults.server.timeout_ms as i64)?
            .set_default("classification.threshold", defaults.classification.threshold)?
            .set_default("upload.delimiter", defaults.upload.delimiter)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .set_override_option("server.host", env(ENV_HOST))?
            .set_override_option("server.port", env(ENV_PORT))?
            .set_override_option("server.endpoint", env(ENV_ENDPOINT))?
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        if config.upload.delimiter.len() != 1 || !config.upload.delimiter.is_ascii() {
            anyhow::bail!(
                "upload.delimiter must be a single ASCII character, got '{}'",
                config.upload.delimiter
            );
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "http://localhost".to_string(),
                port: 5000,
                endpoint: "/predict".to_string(),
                timeout_ms: default_timeout_ms(),
            },
            classification: ClassificationConfig {
                threshold: THRESHOLD_DEFAULT,
            },
            upload: UploadConfig {
                delimiter: ",".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
