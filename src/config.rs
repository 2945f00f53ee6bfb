//! Configuration management for the FIM prediction service

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject answering prediction requests
    pub predict_subject: String,
    /// Subject answering readiness queries
    pub health_subject: String,
    /// Subject answering recent prediction history queries
    #[serde(default = "default_history_subject")]
    pub history_subject: String,
    /// Subject answering prediction history statistics queries
    #[serde(default = "default_history_stats_subject")]
    pub history_stats_subject: String,
}

fn default_history_subject() -> String {
    "fim.history".to_string()
}

fn default_history_stats_subject() -> String {
    "fim.history.stats".to_string()
}

/// Model files configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing one ONNX file per model
    pub models_dir: String,
    /// File name overrides keyed by model identifier (e.g. `total = "all.onnx"`)
    #[serde(default)]
    pub files: HashMap<String, String>,
    /// Number of threads for ONNX inference per session (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
    /// Sessions kept per model so concurrent requests do not share one (default: 2)
    #[serde(default = "default_sessions_per_model")]
    pub sessions_per_model: usize,
}

fn default_onnx_threads() -> usize {
    1
}

fn default_sessions_per_model() -> usize {
    2
}

/// Request handling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of requests served concurrently
    pub workers: usize,
    /// Per-request processing timeout in milliseconds
    pub timeout_ms: u64,
    /// Interval between metrics summaries in seconds
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    60
}

/// Prediction history configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Record served predictions and answer history queries
    pub enabled: bool,
    /// SQLite database file
    pub database_path: String,
    /// Page size when a history query gives no limit
    pub default_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_path: "database.db".to_string(),
            default_limit: 50,
        }
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
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            models_dir: "models".to_string(),
            files: HashMap::new(),
            onnx_threads: default_onnx_threads(),
            sessions_per_model: default_sessions_per_model(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                predict_subject: "fim.predict".to_string(),
                health_subject: "fim.health".to_string(),
                history_subject: default_history_subject(),
                history_stats_subject: default_history_stats_subject(),
            },
            models: ModelsConfig::default(),
            pipeline: PipelineConfig {
                workers: 4,
                timeout_ms: 5000,
                metrics_interval_secs: default_metrics_interval(),
            },
            history: HistoryConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.nats.predict_subject, "fim.predict");
        assert_eq!(config.models.models_dir, "models");
        assert_eq!(config.models.onnx_threads, 1);
        assert!(config.models.files.is_empty());
        assert_eq!(config.pipeline.workers, 4);
        assert_eq!(config.models.sessions_per_model, 2);
        assert!(config.history.enabled);
        assert_eq!(config.history.default_limit, 50);
    }

    #[test]
    fn test_load_shipped_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/config.toml");
        let config = AppConfig::load_from_path(path).unwrap();

        assert_eq!(config.nats.health_subject, "fim.health");
        assert_eq!(config.models.models_dir, "r_models");
        assert!(config.pipeline.timeout_ms > 0);
        assert_eq!(config.nats.history_subject, "fim.history");
        assert_eq!(config.nats.history_stats_subject, "fim.history.stats");
        assert_eq!(config.history.database_path, "database.db");
    }
}
