//! Daemon configuration

use anyhow::{Context, Result};
use aura_core::EngineConfig;
use serde::Deserialize;

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "AURA_CONFIG_FILE";

/// Daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Service name attached to structured log events
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_service_name() -> String {
    "aura-engine".to_string()
}

fn default_api_port() -> u16 {
    8080
}

impl DaemonConfig {
    /// Load configuration from an optional file, then `AURA_*` environment variables
    ///
    /// Nested keys use `__`, e.g. `AURA_ENGINE__ARTIFACTS__ROOT=/models`.
    pub fn load(file: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("AURA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration sources")?;

        let daemon: Self = config
            .try_deserialize()
            .context("Invalid engine configuration")?;
        daemon
            .engine
            .validate()
            .context("Invalid engine configuration")?;
        Ok(daemon)
    }
}
