//! Queue workers: pop, hydrate, execute, retry or fail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::notify::{JobEvent, NotificationHub};
use super::{HandlerRegistry, JobContext, JobId, Queue};
use crate::error::{ErrorCode, Result, TempoError};
use crate::telemetry::{JobMetrics, JobTimer};

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for the job worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent worker loops
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Wait between polls when the queue is empty
    #[serde(default = "default_refresh_interval", with = "humantime_serde")]
    pub refresh_interval: Duration,

    /// Worker name/identifier
    #[serde(default = "default_worker_name")]
    pub name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            refresh_interval: default_refresh_interval(),
            name: default_worker_name(),
        }
    }
}

/// Longest delay a retry can be pushed out by.
const MAX_RETRY_DELAY_SECS: i64 = 365 * 24 * 60 * 60;

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_worker_name() -> String {
    "tempo-worker".to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Statistics
// ═══════════════════════════════════════════════════════════════════════════════

/// Counters shared by every loop of a worker.
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    /// Records popped and hydrated
    pub processed: Arc<AtomicU64>,
    pub succeeded: Arc<AtomicU64>,
    /// Records that exhausted their retries or failed fatally
    pub failed: Arc<AtomicU64>,
    pub retried: Arc<AtomicU64>,
    /// Ids popped with no record or no handler
    pub dropped: Arc<AtomicU64>,
    /// Records pushed back because their delay had not elapsed
    pub deferred: Arc<AtomicU64>,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn retried(&self) -> u64 {
        self.retried.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn deferred(&self) -> u64 {
        self.deferred.load(Ordering::Relaxed)
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Single Step
// ═══════════════════════════════════════════════════════════════════════════════

/// What one call to [`QueueWorker::run_next`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkOutcome {
    /// The pending list was empty.
    Idle,
    /// The id had no record or no registered handler.
    Dropped(JobId),
    /// The record is still delayed and went back on the pending list.
    Deferred(JobId),
    Succeeded(JobId),
    /// The record was re-queued for a later attempt.
    Retried {
        id: JobId,
        attempt: u32,
        delay_until: Option<DateTime<Utc>>,
    },
    /// The record exhausted its retries or failed fatally.
    Failed(JobId),
}

/// Executes one pending record at a time against a [`Queue`].
#[derive(Clone)]
pub struct QueueWorker {
    name: String,
    queue: Arc<dyn Queue>,
    registry: Arc<HandlerRegistry>,
    hub: Arc<NotificationHub>,
    stats: WorkerStats,
}

impl QueueWorker {
    pub fn new(
        name: impl Into<String>,
        queue: Arc<dyn Queue>,
        registry: Arc<HandlerRegistry>,
        hub: Arc<NotificationHub>,
    ) -> Self {
        Self {
            name: name.into(),
            queue,
            registry,
            hub,
            stats: WorkerStats::new(),
        }
    }

    pub fn with_stats(mut self, stats: WorkerStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Pop the next pending id and drive its record to a terminal step.
    ///
    /// Retries with a negative `next_retry_in` run again inside this call;
    /// any other retry is written back to the queue and returned.
    ///
    /// A backend error after the pop puts the id back on the pending list
    /// before the error is returned, so the record is picked up again on a
    /// later cycle.
    pub async fn run_next(&self) -> Result<WorkOutcome> {
        let Some(id) = self.queue.pop().await? else {
            return Ok(WorkOutcome::Idle);
        };

        match self.process(id).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                match self.queue.push(id).await {
                    Ok(()) => tracing::warn!(
                        worker = %self.name,
                        job_id = %id,
                        error = %e,
                        "Backend error, job returned to the pending list"
                    ),
                    Err(push_error) => tracing::error!(
                        worker = %self.name,
                        job_id = %id,
                        error = %e,
                        push_error = %push_error,
                        "Backend error, job could not be returned to the pending list"
                    ),
                }
                Err(e)
            }
        }
    }

    async fn process(&self, id: JobId) -> Result<WorkOutcome> {
        let mut record = match self.queue.get(id).await {
            Ok(record) => record,
            Err(e) if e.code() == ErrorCode::RecordNotFound => {
                tracing::warn!(worker = %self.name, job_id = %id, "Popped id has no record, dropping");
                WorkerStats::bump(&self.stats.dropped);
                JobMetrics::record_dropped("missing_record");
                return Ok(WorkOutcome::Dropped(id));
            }
            Err(e) => return Err(e),
        };

        let Some(handler) = self.registry.get(&record.job_name) else {
            handler_not_found(id, &record.job_name).log();
            self.queue.clear(id).await?;
            WorkerStats::bump(&self.stats.dropped);
            JobMetrics::record_dropped("unknown_job");
            return Ok(WorkOutcome::Dropped(id));
        };

        if record.is_delayed(Utc::now()) {
            self.queue.push(id).await?;
            WorkerStats::bump(&self.stats.deferred);
            JobMetrics::record_deferred(&record.job_name);
            return Ok(WorkOutcome::Deferred(id));
        }

        WorkerStats::bump(&self.stats.processed);
        JobMetrics::record_dequeued(&record.job_name);
        self.hub.notify(&record, JobEvent::Dequeued).await;

        loop {
            let ctx = JobContext::for_record(&record, self.name.clone());
            let timer = JobTimer::start(&record.job_name);

            let error = match handler.dequeue(&ctx, &record.payload).await {
                Ok(()) => {
                    timer.success();
                    tracing::debug!(worker = %self.name, job_id = %id, attempt = ctx.attempt, "Job succeeded");
                    self.hub.notify(&record, JobEvent::Succeeded).await;
                    self.queue.clear(id).await?;
                    WorkerStats::bump(&self.stats.succeeded);
                    return Ok(WorkOutcome::Succeeded(id));
                }
                Err(error) => {
                    timer.failure();
                    error
                }
            };

            if error.retryable && record.remaining_attempts() > 0 {
                let retry_in = handler.next_retry_in(record.current_attempt());
                WorkerStats::bump(&self.stats.retried);
                JobMetrics::record_retried(&record.job_name);

                if retry_in < 0 {
                    record = record.retried(None);
                    tracing::debug!(
                        worker = %self.name,
                        job_id = %id,
                        attempt = record.current_attempt(),
                        error = %error,
                        "Retrying job in place"
                    );
                    continue;
                }

                let delay_until = retry_at(Utc::now(), retry_in);
                record = record.retried(Some(delay_until));
                tracing::info!(
                    worker = %self.name,
                    job_id = %id,
                    attempt = record.current_attempt(),
                    retry_in_secs = retry_in,
                    error = %error,
                    "Job failed, re-queued for retry"
                );

                self.queue.clear(id).await?;
                self.queue.set(id, &record).await?;
                self.queue.push(id).await?;
                return Ok(WorkOutcome::Retried {
                    id,
                    attempt: record.current_attempt(),
                    delay_until: Some(delay_until),
                });
            }

            tracing::error!(
                worker = %self.name,
                job_id = %id,
                job_name = %record.job_name,
                attempts = record.current_attempt(),
                retryable = error.retryable,
                error = %error,
                "Job failed permanently"
            );

            if let Err(hook_error) = handler.on_error(&ctx, &error, &record.payload).await {
                TempoError::with_internal(
                    ErrorCode::HandlerFailed,
                    format!("Error handler of {} failed", record.job_name),
                    format!("job {}: {}", id, hook_error),
                )
                .log();
            }
            self.hub.notify(&record, JobEvent::Failed(&error)).await;
            self.queue.clear(id).await?;
            WorkerStats::bump(&self.stats.failed);
            return Ok(WorkOutcome::Failed(id));
        }
    }
}

fn handler_not_found(id: JobId, job_name: &str) -> TempoError {
    TempoError::with_internal(
        ErrorCode::HandlerNotFound,
        format!("No handler registered for job {}", job_name),
        format!("dropping job {}", id),
    )
}

/// Instant a retry becomes eligible, with the delay capped at
/// [`MAX_RETRY_DELAY_SECS`].
fn retry_at(now: DateTime<Utc>, retry_in: i64) -> DateTime<Utc> {
    chrono::Duration::try_seconds(retry_in.clamp(0, MAX_RETRY_DELAY_SECS))
        .and_then(|delay| now.checked_add_signed(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Worker Pool
// ═══════════════════════════════════════════════════════════════════════════════

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    stats: WorkerStats,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Signal every loop to stop after its current record.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Get worker statistics.
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Signal shutdown and wait for every loop to exit.
    pub async fn shutdown_and_wait(self) {
        self.shutdown();
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Worker loop ended abnormally");
            }
        }
    }
}

/// Runs `workers` concurrent [`QueueWorker`] loops.
pub struct JobWorker {
    config: WorkerConfig,
    stats: WorkerStats,
}

impl JobWorker {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            stats: WorkerStats::new(),
        }
    }

    /// Start the worker loops, returning a handle for control.
    pub fn start(
        self,
        queue: Arc<dyn Queue>,
        registry: Arc<HandlerRegistry>,
        hub: Arc<NotificationHub>,
    ) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let workers = self.config.workers.max(1);

        tracing::info!(
            worker = %self.config.name,
            workers,
            refresh_interval = ?self.config.refresh_interval,
            "Job worker started"
        );

        let handles = (0..workers)
            .map(|index| {
                let worker = QueueWorker::new(
                    format!("{}-{}", self.config.name, index),
                    queue.clone(),
                    registry.clone(),
                    hub.clone(),
                )
                .with_stats(self.stats.clone());
                tokio::spawn(worker_loop(worker, self.config.refresh_interval, shutdown_rx.clone()))
            })
            .collect();

        WorkerHandle {
            shutdown: shutdown_tx,
            stats: self.stats,
            handles,
        }
    }
}

async fn worker_loop(worker: QueueWorker, refresh_interval: Duration, mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let wait = match worker.run_next().await {
            Ok(WorkOutcome::Idle) | Ok(WorkOutcome::Deferred(_)) => true,
            Ok(_) => false,
            Err(e) => {
                e.log();
                true
            }
        };

        if wait {
            tokio::select! {
                _ = shutdown.changed() => {}
                _ = tokio::time::sleep(refresh_interval) => {}
            }
        } else {
            tokio::task::yield_now().await;
        }
    }

    tracing::info!(worker = %worker.name(), "Worker stopped");
}
