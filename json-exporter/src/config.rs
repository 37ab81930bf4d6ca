//! Configuration for the JSON exporter.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Outbound probe settings.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Flattened key filtering settings.
    #[serde(default)]
    pub filters: FilterConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (default: "0.0.0.0:9116").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for the probe endpoint (default: "/probe").
    #[serde(default = "default_probe_path")]
    pub probe_path: String,

    /// Path for the exporter's own metrics (default: "/metrics").
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

fn default_listen() -> String {
    "0.0.0.0:9116".to_string()
}

fn default_probe_path() -> String {
    "/probe".to_string()
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            probe_path: default_probe_path(),
            metrics_path: default_metrics_path(),
        }
    }
}

/// Settings for fetching and flattening target documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Upper bound for one fetch, including reading the body (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum JSON nesting depth accepted by the flattener.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Largest response body accepted from a target (bytes).
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Idle connections kept per target host, shared by all probes.
    #[serde(default = "default_max_idle_connections")]
    pub max_idle_connections: usize,

    /// Accept any TLS certificate presented by a target.
    ///
    /// Enabled by default: probed targets are commonly internal services
    /// with self-signed certificates. Only probe targets you trust.
    #[serde(default = "default_insecure_skip_verify")]
    pub insecure_skip_verify: bool,

    /// Rewrite metric names to the `[a-zA-Z0-9_:]` alphabet.
    #[serde(default)]
    pub sanitize_names: bool,
}

fn default_timeout() -> u64 {
    10
}

fn default_max_depth() -> usize {
    64
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_max_idle_connections() -> usize {
    100
}

fn default_insecure_skip_verify() -> bool {
    true
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_depth: default_max_depth(),
            max_body_bytes: default_max_body_bytes(),
            max_idle_connections: default_max_idle_connections(),
            insecure_skip_verify: default_insecure_skip_verify(),
            sanitize_names: false,
        }
    }
}

/// Flattened key filtering configuration.
///
/// Patterns are globs matched against the flattened key before any prefix
/// is applied, e.g. `"stats.*"` or `"*__0"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Glob patterns for keys to include (empty = all).
    #[serde(default)]
    pub include_keys: Vec<String>,

    /// Glob patterns for keys to exclude.
    #[serde(default)]
    pub exclude_keys: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.server.listen
            )));
        }

        for path in [&self.server.probe_path, &self.server.metrics_path] {
            if !path.starts_with('/') {
                return Err(ConfigError::Validation(format!(
                    "Endpoint path must start with /: {}",
                    path
                )));
            }
            if path == "/" || path == "/health" {
                return Err(ConfigError::Validation(format!(
                    "Endpoint path {} is reserved",
                    path
                )));
            }
        }

        if self.server.probe_path == self.server.metrics_path {
            return Err(ConfigError::Validation(
                "probe_path and metrics_path must differ".to_string(),
            ));
        }

        if self.probe.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        if self.probe.max_depth == 0 {
            return Err(ConfigError::Validation(
                "max_depth must be > 0".to_string(),
            ));
        }

        if self.probe.max_body_bytes == 0 {
            return Err(ConfigError::Validation(
                "max_body_bytes must be > 0".to_string(),
            ));
        }

        for pattern in self
            .filters
            .include_keys
            .iter()
            .chain(&self.filters.exclude_keys)
        {
            if let Err(e) = glob::Pattern::new(pattern) {
                return Err(ConfigError::Validation(format!(
                    "Invalid key pattern '{}': {}",
                    pattern, e
                )));
            }
        }

        Ok(())
    }
}
