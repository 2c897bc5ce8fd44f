//! Prometheus metrics for queue and schedule activity.
//!
//! Recording goes through the `metrics` facade, so calls are no-ops until
//! [`init_metrics`] installs a recorder.
//!
//! # Example
//!
//! ```rust,no_run
//! use tempo_core::telemetry::{JobMetrics, JobTimer};
//!
//! let timer = JobTimer::start("echo");
//! timer.success();
//!
//! JobMetrics::record_scheduled_run("heartbeat", true);
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Serve `/metrics` on this address when set (e.g. "0.0.0.0:9090")
    #[serde(default)]
    pub listen: Option<SocketAddr>,

    /// Histogram buckets for job durations (in seconds)
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,

    /// Labels added to every metric
    #[serde(default)]
    pub global_labels: HashMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen: None,
            duration_buckets: default_duration_buckets(),
            global_labels: HashMap::new(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_duration_buckets() -> Vec<f64> {
    vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]
}

/// Handle to the installed Prometheus recorder.
pub struct MetricsRegistry {
    prometheus_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("prometheus_handle", &self.prometheus_handle.is_some())
            .finish()
    }
}

impl MetricsRegistry {
    /// A registry with no recorder installed.
    pub fn disabled() -> Self {
        Self {
            prometheus_handle: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.prometheus_handle.is_some()
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.prometheus_handle
            .as_ref()
            .map(|h| h.render())
            .unwrap_or_default()
    }
}

/// Install the global Prometheus recorder.
///
/// Can succeed only once per process. With `listen` set this must run inside
/// a Tokio runtime, which drives the HTTP exporter.
pub fn init_metrics(config: &MetricsConfig, service_name: &str) -> anyhow::Result<MetricsRegistry> {
    if !config.enabled {
        return Ok(MetricsRegistry::disabled());
    }

    let mut builder = PrometheusBuilder::new().add_global_label("service", service_name);
    for (key, value) in &config.global_labels {
        builder = builder.add_global_label(key, value);
    }
    builder = builder.set_buckets(&config.duration_buckets)?;

    let handle = match config.listen {
        Some(addr) => {
            let (recorder, exporter) = builder.with_http_listener(addr).build()?;
            let handle = recorder.handle();
            metrics::set_global_recorder(recorder)
                .map_err(|_| anyhow::anyhow!("a metrics recorder is already installed"))?;
            tokio::spawn(async move {
                if let Err(e) = exporter.await {
                    tracing::error!(error = ?e, "Prometheus exporter stopped");
                }
            });
            handle
        }
        None => builder.install_recorder()?,
    };
    register_metric_descriptions();

    tracing::info!(service_name = %service_name, listen = ?config.listen, "Metrics initialized");

    Ok(MetricsRegistry {
        prometheus_handle: Some(handle),
    })
}

fn register_metric_descriptions() {
    describe_counter!("tempo_jobs_dispatched_total", "Jobs written to the queue");
    describe_counter!("tempo_jobs_dequeued_total", "Jobs popped and handed to a handler");
    describe_counter!("tempo_jobs_total", "Job attempts by outcome");
    describe_counter!("tempo_jobs_retried_total", "Failed attempts scheduled for retry");
    describe_counter!("tempo_jobs_deferred_total", "Popped jobs pushed back while delayed");
    describe_counter!("tempo_jobs_dropped_total", "Popped ids discarded without running");
    describe_histogram!("tempo_job_duration_seconds", "Duration of a single job attempt");

    describe_counter!("tempo_scheduled_runs_total", "Scheduled job firings by outcome");
    describe_counter!(
        "tempo_notification_failures_total",
        "Notification hooks that failed or panicked"
    );
    describe_counter!("tempo_errors_total", "Errors logged, by code and category");
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Metrics
// ═══════════════════════════════════════════════════════════════════════════════

/// Times a single job attempt.
#[derive(Debug)]
#[must_use = "call success() or failure() to record the attempt"]
pub struct JobTimer {
    job: String,
    start: Instant,
}

impl JobTimer {
    pub fn start(job: &str) -> Self {
        Self {
            job: job.to_string(),
            start: Instant::now(),
        }
    }

    pub fn success(self) {
        self.finish("success");
    }

    pub fn failure(self) {
        self.finish("failure");
    }

    fn finish(self, outcome: &'static str) {
        let elapsed = self.start.elapsed().as_secs_f64();
        histogram!("tempo_job_duration_seconds", "job" => self.job.clone(), "outcome" => outcome)
            .record(elapsed);
        counter!("tempo_jobs_total", "job" => self.job, "outcome" => outcome).increment(1);
    }
}

/// Counters for queue and scheduler events.
pub struct JobMetrics;

impl JobMetrics {
    pub fn record_dequeued(job: &str) {
        counter!("tempo_jobs_dequeued_total", "job" => job.to_string()).increment(1);
    }

    pub fn record_retried(job: &str) {
        counter!("tempo_jobs_retried_total", "job" => job.to_string()).increment(1);
    }

    pub fn record_deferred(job: &str) {
        counter!("tempo_jobs_deferred_total", "job" => job.to_string()).increment(1);
    }

    /// `reason` is a short static tag such as `missing_record`.
    pub fn record_dropped(reason: &'static str) {
        counter!("tempo_jobs_dropped_total", "reason" => reason).increment(1);
    }

    pub fn record_scheduled_run(job: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        counter!("tempo_scheduled_runs_total", "job" => job.to_string(), "outcome" => outcome)
            .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_config_defaults() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert!(config.listen.is_none());
        assert!(config.duration_buckets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_disabled_registry_renders_nothing() {
        let config = MetricsConfig {
            enabled: false,
            ..MetricsConfig::default()
        };
        let registry = init_metrics(&config, "tempo-test").unwrap();
        assert!(!registry.is_enabled());
        assert!(registry.render().is_empty());
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        JobTimer::start("echo").success();
        JobMetrics::record_dropped("missing_record");
        JobMetrics::record_scheduled_run("heartbeat", false);
    }
}
