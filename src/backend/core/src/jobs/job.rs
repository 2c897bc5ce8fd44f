//! Job definitions and persisted job records.
//!
//! - **JobRecord**: the unit of work stored in a [`Queue`](super::Queue)
//! - **Job trait**: typed job logic with a serde payload
//! - **JobError**: handler failures, retryable or fatal
//! - **BackoffStrategy**: helpers for computing retry delays

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::error::TempoError;

// ═══════════════════════════════════════════════════════════════════════════════
// Job Identification
// ═══════════════════════════════════════════════════════════════════════════════

/// Unique identifier for a job instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Create a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Record
// ═══════════════════════════════════════════════════════════════════════════════

/// A queued unit of work as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    /// Encoded job payload
    pub payload: Vec<u8>,
    pub job_name: String,
    pub max_retry_count: u32,
    /// Failed attempts so far
    pub attempts: u32,
    /// Not eligible to run before this instant
    pub delay_until: Option<DateTime<Utc>>,
    pub queued_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(job_name: impl Into<String>, payload: Vec<u8>, max_retry_count: u32) -> Self {
        Self {
            id: JobId::new(),
            payload,
            job_name: job_name.into(),
            max_retry_count,
            attempts: 0,
            delay_until: None,
            queued_at: Utc::now(),
        }
    }

    pub fn with_delay_until(mut self, at: DateTime<Utc>) -> Self {
        self.delay_until = Some(at);
        self
    }

    pub fn failure_count(&self) -> u32 {
        self.attempts
    }

    pub fn remaining_attempts(&self) -> u32 {
        self.max_retry_count.saturating_sub(self.attempts)
    }

    /// 1-based number of the attempt about to run.
    pub fn current_attempt(&self) -> u32 {
        self.attempts + 1
    }

    /// True while `delay_until` lies after `now`.
    pub fn is_delayed(&self, now: DateTime<Utc>) -> bool {
        self.delay_until.map_or(false, |at| at > now)
    }

    /// Copy of this record after one more failure, eligible at `delay_until`.
    pub fn retried(&self, delay_until: Option<DateTime<Utc>>) -> Self {
        Self {
            attempts: self.attempts + 1,
            delay_until,
            ..self.clone()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Error
// ═══════════════════════════════════════════════════════════════════════════════

/// Error type for job execution failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    /// Error message
    pub message: String,
    /// Whether this error is retryable
    pub retryable: bool,
    /// Optional error code
    pub code: Option<String>,
}

impl JobError {
    /// Create a new retryable error.
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
            code: None,
        }
    }

    /// Create a new non-retryable (fatal) error.
    ///
    /// Fatal errors skip any remaining attempts.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
            code: None,
        }
    }

    /// Add an error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(code) = &self.code {
            write!(f, " (code: {})", code)?;
        }
        Ok(())
    }
}

impl std::error::Error for JobError {}

impl From<TempoError> for JobError {
    fn from(error: TempoError) -> Self {
        Self {
            message: error.message().to_string(),
            retryable: error.is_retryable(),
            code: Some(error.code().to_string()),
        }
    }
}

/// Result type for job execution.
pub type JobResult = std::result::Result<(), JobError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Backoff Strategy
// ═══════════════════════════════════════════════════════════════════════════════

/// Strategy for calculating retry delays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed { delay_secs: u64 },
    /// Linear increase in delay (delay * attempt)
    Linear {
        initial_delay_secs: u64,
        increment_secs: u64,
    },
    /// Exponential increase in delay (initial * multiplier^attempt)
    Exponential {
        initial_delay_secs: u64,
        max_delay_secs: u64,
        multiplier: f64,
    },
    /// Exponential with random jitter
    ExponentialWithJitter {
        initial_delay_secs: u64,
        max_delay_secs: u64,
        multiplier: f64,
        jitter_factor: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            initial_delay_secs: 5,
            max_delay_secs: 3600,
            multiplier: 2.0,
        }
    }
}

impl BackoffStrategy {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = match self {
            Self::Fixed { delay_secs } => *delay_secs,
            Self::Linear {
                initial_delay_secs,
                increment_secs,
            } => initial_delay_secs.saturating_add(increment_secs.saturating_mul(attempt as u64)),
            Self::Exponential {
                initial_delay_secs,
                max_delay_secs,
                multiplier,
            } => {
                let delay = (*initial_delay_secs as f64) * multiplier.powi(exponent);
                delay.min(*max_delay_secs as f64) as u64
            }
            Self::ExponentialWithJitter {
                initial_delay_secs,
                max_delay_secs,
                multiplier,
                jitter_factor,
            } => {
                let base_delay = (*initial_delay_secs as f64) * multiplier.powi(exponent);
                let capped_delay = base_delay.min(*max_delay_secs as f64);
                let jitter_range = capped_delay * jitter_factor;
                let jitter = (rand_simple() * 2.0 - 1.0) * jitter_range;
                (capped_delay + jitter).max(1.0) as u64
            }
        };

        Duration::from_secs(secs)
    }

    /// Seconds to wait before the given 1-based attempt, in the form
    /// [`Job::next_retry_in`] expects.
    pub fn next_retry_in(&self, attempt: u32) -> i64 {
        let secs = self.delay_for_attempt(attempt.saturating_sub(1)).as_secs();
        i64::try_from(secs).unwrap_or(i64::MAX)
    }

    /// Create a fixed backoff strategy.
    pub fn fixed(delay_secs: u64) -> Self {
        Self::Fixed { delay_secs }
    }

    /// Create an exponential backoff strategy with sensible defaults.
    pub fn exponential() -> Self {
        Self::default()
    }

    /// Create an exponential backoff with jitter.
    pub fn exponential_with_jitter() -> Self {
        Self::ExponentialWithJitter {
            initial_delay_secs: 5,
            max_delay_secs: 3600,
            multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

/// Simple pseudo-random number generator for jitter (0.0 to 1.0).
fn rand_simple() -> f64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let state = RandomState::new();
    let mut hasher = state.build_hasher();
    hasher.write_u64(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64,
    );
    (hasher.finish() as f64) / (u64::MAX as f64)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Context
// ═══════════════════════════════════════════════════════════════════════════════

/// Context passed to jobs during execution.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: JobId,
    pub job_name: String,
    /// 1-based attempt number
    pub attempt: u32,
    pub queued_at: DateTime<Utc>,
    /// Name of the worker running the job
    pub worker: String,
}

impl JobContext {
    pub fn for_record(record: &JobRecord, worker: impl Into<String>) -> Self {
        Self {
            job_id: record.id,
            job_name: record.job_name.clone(),
            attempt: record.current_attempt(),
            queued_at: record.queued_at,
            worker: worker.into(),
        }
    }

    /// Log a message associated with this job.
    pub fn log_info(&self, message: &str) {
        tracing::info!(
            job_id = %self.job_id,
            job_name = %self.job_name,
            attempt = self.attempt,
            message
        );
    }

    /// Log a warning associated with this job.
    pub fn log_warn(&self, message: &str) {
        tracing::warn!(
            job_id = %self.job_id,
            job_name = %self.job_name,
            attempt = self.attempt,
            message
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// The trait that queue jobs implement.
///
/// Register an instance with
/// [`HandlerRegistry::register_job`](super::HandlerRegistry::register_job);
/// records carrying [`Job::NAME`] are then routed to it.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Name stored in [`JobRecord::job_name`].
    const NAME: &'static str;

    type Payload: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Execute the job.
    ///
    /// Return [`JobError::retryable`] for transient failures and
    /// [`JobError::fatal`] for failures no retry can fix.
    async fn dequeue(&self, ctx: &JobContext, payload: Self::Payload) -> JobResult;

    /// Called once after the final attempt fails.
    async fn on_error(&self, _ctx: &JobContext, _error: &JobError, _payload: Self::Payload) -> JobResult {
        Ok(())
    }

    /// Seconds to wait before `attempt`. Negative retries immediately on the
    /// same worker without re-queueing.
    fn next_retry_in(&self, _attempt: u32) -> i64 {
        -1
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_job_id() {
        let id1 = JobId::new();
        let id2 = JobId::new();
        assert_ne!(id1, id2);
        assert_eq!(JobId::parse(&id1.to_string()), Some(id1));
        assert_eq!(JobId::parse("not-a-uuid"), None);
    }

    #[test]
    fn test_record_derived_counts() {
        let mut record = JobRecord::new("echo", b"{}".to_vec(), 3);
        assert_eq!(record.failure_count(), 0);
        assert_eq!(record.remaining_attempts(), 3);
        assert_eq!(record.current_attempt(), 1);

        record.attempts = 5;
        assert_eq!(record.remaining_attempts(), 0);
        assert_eq!(record.current_attempt(), 6);
    }

    #[test]
    fn test_record_retried() {
        let record = JobRecord::new("echo", Vec::new(), 2);
        let at = Utc::now() + chrono::Duration::seconds(30);
        let retried = record.retried(Some(at));
        assert_eq!(retried.id, record.id);
        assert_eq!(retried.attempts, 1);
        assert_eq!(retried.delay_until, Some(at));
        assert!(retried.is_delayed(Utc::now()));
        assert!(!record.is_delayed(Utc::now()));
    }

    #[test]
    fn test_record_wire_shape() {
        let record = JobRecord::new("echo", vec![1, 2], 3);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["jobName"], "echo");
        assert_eq!(value["maxRetryCount"], 3);
        assert_eq!(value["attempts"], 0);
        assert!(value["delayUntil"].is_null());
        assert_eq!(value["id"], record.id.to_string());
        assert!(value.get("queuedAt").is_some());
    }

    #[test]
    fn test_backoff_fixed() {
        let backoff = BackoffStrategy::fixed(10);
        assert_eq!(backoff.delay_for_attempt(0), Duration::from_secs(10));
        assert_eq!(backoff.delay_for_attempt(5), Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_exponential() {
        let backoff = BackoffStrategy::Exponential {
            initial_delay_secs: 1,
            max_delay_secs: 100,
            multiplier: 2.0,
        };
        assert_eq!(backoff.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(backoff.delay_for_attempt(10), Duration::from_secs(100));

        assert_eq!(backoff.next_retry_in(1), 1);
        assert_eq!(backoff.next_retry_in(2), 2);
        assert_eq!(backoff.next_retry_in(4), 8);
    }

    #[test]
    fn test_backoff_linear() {
        let backoff = BackoffStrategy::Linear {
            initial_delay_secs: 5,
            increment_secs: 3,
        };
        assert_eq!(backoff.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_secs(11));
    }

    #[test]
    fn test_backoff_jitter_stays_near_base() {
        let backoff = BackoffStrategy::ExponentialWithJitter {
            initial_delay_secs: 100,
            max_delay_secs: 1000,
            multiplier: 1.0,
            jitter_factor: 0.1,
        };
        for _ in 0..20 {
            let secs = backoff.delay_for_attempt(3).as_secs();
            assert!((90..=110).contains(&secs), "{} out of range", secs);
        }
    }

    #[test]
    fn test_job_error_from_tempo_error() {
        let error: JobError = TempoError::backend("connection reset").into();
        assert!(error.retryable);
        assert_eq!(error.code.as_deref(), Some(ErrorCode::QueueBackendError.to_string().as_str()));

        let fatal = JobError::fatal("bad input").with_code("INPUT");
        assert!(!fatal.retryable);
        assert_eq!(fatal.to_string(), "bad input (code: INPUT)");
    }
}
