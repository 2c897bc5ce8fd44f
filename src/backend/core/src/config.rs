//! Configuration management.
//!
//! Values come from an optional file and `TEMPO__`-prefixed environment
//! variables, e.g. `TEMPO__WORKER__WORKERS=8` or `TEMPO__QUEUE__BACKEND=redis`.

use serde::Deserialize;

use crate::error::{Result, TempoError};
use crate::jobs::WorkerConfig;
use crate::telemetry::TelemetryConfig;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging and metrics
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Which store holds job records and the pending list.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackendKind {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: QueueBackendKind,

    /// Key prefix for the Redis backend
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Used when a dispatch does not set its own
    #[serde(default)]
    pub default_max_retry_count: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackendKind::default(),
            namespace: default_namespace(),
            default_max_retry_count: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Start the job scheduler alongside the workers
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,

    /// Register the built-in heartbeat job
    #[serde(default)]
    pub heartbeat: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            heartbeat: false,
        }
    }
}

// Default value functions
fn default_namespace() -> String { "tempo".to_string() }
fn default_redis_url() -> String { "redis://localhost:6379".to_string() }
fn default_scheduler_enabled() -> bool { true }

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("TEMPO").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides on top.
    pub fn from_file(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("TEMPO").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker.workers == 0 {
            return Err(TempoError::configuration("worker.workers must be at least 1"));
        }
        if self.worker.refresh_interval.is_zero() {
            return Err(TempoError::configuration("worker.refresh_interval must be non-zero"));
        }
        if self.queue.namespace.is_empty() {
            return Err(TempoError::configuration("queue.namespace must not be empty"));
        }
        Ok(())
    }
}
