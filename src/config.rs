//! Configuration management for the prediction service

use crate::types::prediction::PredictionKind;
use crate::types::schema::{BoundsPolicy, FeatureSchema};
use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// One entry per prediction front-end
    #[serde(default)]
    pub deployments: Vec<DeploymentConfig>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9457
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Model runtime configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Number of threads for ONNX inference per model (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            onnx_threads: default_onnx_threads(),
        }
    }
}

/// Periodic metrics summary configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between logged summaries; 0 disables the reporter
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
}

fn default_report_interval() -> u64 {
    60
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: default_report_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// One prediction front-end: schema, artifacts and presentation
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentConfig {
    /// URL segment, e.g. `/apps/<name>`
    pub name: String,
    /// Page heading; falls back to `name`
    #[serde(default)]
    pub title: Option<String>,
    pub kind: PredictionKind,
    /// Model artifact (`.json` or `.onnx`)
    pub model_path: PathBuf,
    /// Optional scaler artifact applied before the model
    #[serde(default)]
    pub scaler_path: Option<PathBuf>,
    /// Optional clustered reference data (cluster deployments only)
    #[serde(default)]
    pub dataset: Option<DatasetConfig>,
    #[serde(default)]
    pub bounds_policy: BoundsPolicy,
    /// Prefix of the result message, e.g. "Predicted Success Category"
    #[serde(default)]
    pub result_label: Option<String>,
    /// Display names for category values, keyed by the printed value
    #[serde(default)]
    pub categories: HashMap<String, String>,
    /// Ordered model inputs
    pub fields: FeatureSchema,
}

impl DeploymentConfig {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

/// Reference dataset location
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    pub path: PathBuf,
    #[serde(default = "default_cluster_column")]
    pub cluster_column: String,
}

fn default_cluster_column() -> String {
    "Cluster".to_string()
}

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a file, overridden by `PREDICT_FORMS__*` env vars
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("PREDICT_FORMS").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that could never serve a request correctly
    pub fn validate(&self) -> Result<()> {
        if self.deployments.is_empty() {
            bail!("No deployments configured");
        }

        let mut names = HashSet::new();
        for deployment in &self.deployments {
            let name = deployment.name.as_str();
            // Names become URL path segments and are matched exactly
            let path_safe = name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
            if name.is_empty() || !path_safe {
                bail!("Invalid deployment name '{}'", deployment.name);
            }
            if !names.insert(name) {
                bail!("Duplicate deployment name '{}'", name);
            }
            deployment
                .fields
                .validate()
                .map_err(|e| anyhow::anyhow!("Deployment '{}': {}", name, e))?;
            if deployment.dataset.is_some() && deployment.kind != PredictionKind::Cluster {
                bail!(
                    "Deployment '{}': a reference dataset is only used by cluster deployments",
                    name
                );
            }
        }
        Ok(())
    }

    pub fn deployment(&self, name: &str) -> Option<&DeploymentConfig> {
        self.deployments.iter().find(|d| d.name == name)
    }
}
