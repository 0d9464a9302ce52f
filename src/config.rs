//! Configuration management
//!
//! Loaded from a JSON file with environment-variable overrides; everything
//! has a sensible default so the engine starts with no config at all.

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub server: ServerConfig,
    pub reasoner: ReasonerConfig,
    pub retry: RetryConfig,
    pub limits: LimitsConfig,
    pub metadata: MetadataConfig,
    pub executor: ExecutorConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Base URL of the SQL-over-HTTP execution gateway
    pub base_url: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonerConfig {
    /// Base URL of the Ollama-compatible generation endpoint
    pub base_url: String,
    pub model: String,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per phase for transient failures
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Rows included in the final report's sample
    pub sample_rows: usize,
    /// Cap on rows an executor may return to the engine
    pub max_result_rows: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            sample_rows: 3,
            max_result_rows: 10_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Root of the file-backed metadata store
    pub storage_path: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            storage_path: "storage/metadata".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config {}", path.as_ref().display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Malformed config {}", path.as_ref().display()))
    }

    /// File config when `AUTOQUERY_CONFIG` points at one, defaults otherwise,
    /// then env overrides for the common deployment knobs.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("AUTOQUERY_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        if let Ok(port) = std::env::var("AUTOQUERY_PORT") {
            config.server.port = port.parse().context("AUTOQUERY_PORT must be a port number")?;
        }
        if let Ok(url) = std::env::var("AUTOQUERY_REASONER_URL") {
            config.reasoner.base_url = url;
        }
        if let Ok(model) = std::env::var("AUTOQUERY_REASONER_MODEL") {
            config.reasoner.model = model;
        }
        if let Ok(url) = std::env::var("AUTOQUERY_EXECUTOR_URL") {
            config.executor.base_url = url;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.retry.max_attempts >= 1, "retry.max_attempts must be >= 1");
        anyhow::ensure!(self.limits.max_result_rows > 0, "limits.max_result_rows must be > 0");
        anyhow::ensure!(
            !self.reasoner.base_url.is_empty(),
            "reasoner.base_url must not be empty"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_file_config_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"server": {"port": 9000}}"#).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.retry.max_attempts, 3);
    }
}
