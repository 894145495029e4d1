//! Configuration loading from TOML files.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serving-pipeline tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Admission queue capacity. Submissions beyond this are rejected
    /// immediately (drop-newest), never queued or blocked.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Seconds a cached quote stays servable. Entries are never returned at
    /// or past this age.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Maximum concurrent upstream fetches.
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    /// Bounded worker backlog: at most `worker_backlog_factor *
    /// worker_pool_size` fetches may wait for a pool slot.
    #[serde(default = "default_worker_backlog_factor")]
    pub worker_backlog_factor: usize,
    /// Per-fetch timeout so a hanging upstream call cannot hold a pool slot
    /// indefinitely.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_queue_capacity() -> usize {
    5
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_worker_pool_size() -> usize {
    4
}

fn default_worker_backlog_factor() -> usize {
    4
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
            worker_pool_size: default_worker_pool_size(),
            worker_backlog_factor: default_worker_backlog_factor(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Upstream chain-data source settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://chain-data.example.com".into()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Initialize the tracing subscriber with this logging configuration.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.queue_capacity",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if self.pipeline.worker_pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.worker_pool_size",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if self.pipeline.cache_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.cache_ttl_secs",
                reason: "must be at least 1 second".into(),
            }
            .into());
        }
        if url::Url::parse(&self.upstream.base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "upstream.base_url",
                reason: format!("not a valid URL: {}", self.upstream.base_url),
            }
            .into());
        }
        Ok(())
    }

    pub fn init_logging(&self) {
        self.logging.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.queue_capacity, 5);
        assert_eq!(config.pipeline.cache_ttl_secs, 60);
        // The default host is a placeholder: it must parse as a URL but not
        // name a provider whose wire format the client does not speak.
        assert_eq!(config.upstream.base_url, "https://chain-data.example.com");
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.pipeline.worker_pool_size, 4);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_section_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [pipeline]
            queue_capacity = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.pipeline.queue_capacity, 8);
        assert_eq!(config.pipeline.cache_ttl_secs, 60);
    }

    #[test]
    fn zero_capacity_rejected() {
        let config: Config = toml::from_str(
            r#"
            [pipeline]
            queue_capacity = 0
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_base_url_rejected() {
        let config: Config = toml::from_str(
            r#"
            [upstream]
            base_url = "not a url"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
