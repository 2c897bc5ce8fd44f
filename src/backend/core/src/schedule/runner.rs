//! Timer-driven execution of one schedule slot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::Instrument;

use super::ScheduleDescriptor;
use crate::jobs::JobError;
use crate::telemetry::JobMetrics;

/// Information handed to a scheduled job on each firing.
#[derive(Debug, Clone)]
pub struct ScheduleContext {
    /// Registered job name
    pub job_name: String,
    /// Index of the slot within the job's container
    pub slot: usize,
    /// The instant this firing was armed for
    pub scheduled_for: DateTime<Utc>,
    /// When the timer actually fired
    pub fired_at: DateTime<Utc>,
}

/// Work run directly on a timer, without going through the queue.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Name used to coalesce registrations.
    fn name(&self) -> &str;

    async fn run(&self, ctx: &ScheduleContext) -> Result<(), JobError>;
}

/// Observable state of a [`ScheduledJobRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Not started, or finished with no further occurrences
    Idle,
    /// Waiting for the timer to fire
    Armed { at: DateTime<Utc> },
    /// Running the job
    Firing,
}

/// Drives one slot: compute next date, arm, fire, repeat.
pub struct ScheduledJobRunner {
    job: Arc<dyn ScheduledJob>,
    slot: usize,
    descriptor: Mutex<ScheduleDescriptor>,
    state: Mutex<RunnerState>,
    firings: AtomicU64,
}

impl ScheduledJobRunner {
    pub fn new(job: Arc<dyn ScheduledJob>, slot: usize, descriptor: ScheduleDescriptor) -> Self {
        Self {
            job,
            slot,
            descriptor: Mutex::new(descriptor),
            state: Mutex::new(RunnerState::Idle),
            firings: AtomicU64::new(0),
        }
    }

    pub fn job_name(&self) -> &str {
        self.job.name()
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn state(&self) -> RunnerState {
        *self.state.lock()
    }

    /// Number of times the job has been fired by this runner.
    pub fn firings(&self) -> u64 {
        self.firings.load(Ordering::Relaxed)
    }

    /// Preview upcoming fire dates without disturbing the live descriptor.
    pub fn upcoming(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let descriptor = self.descriptor.lock().clone();
        descriptor.upcoming(from, count).unwrap_or_default()
    }

    fn set_state(&self, state: RunnerState) {
        *self.state.lock() = state;
    }

    /// Run until the schedule has no further dates or shutdown is signalled.
    ///
    /// A firing in progress always completes; the shutdown flag only stops the
    /// next re-arm.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let name = self.job.name().to_string();
        let mut current = Utc::now();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let resolved = self.descriptor.lock().next_date(current);
            let next = match resolved {
                Ok(Some(next)) => next,
                Ok(None) => {
                    tracing::debug!(schedule = %name, slot = self.slot, "No further occurrences");
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        schedule = %name,
                        slot = self.slot,
                        error = %e,
                        "Schedule cannot be resolved, runner going idle"
                    );
                    break;
                }
            };

            self.set_state(RunnerState::Armed { at: next });
            tracing::trace!(schedule = %name, slot = self.slot, at = %next, "Runner armed");
            if !wait_until(next, &mut shutdown).await {
                break;
            }

            self.set_state(RunnerState::Firing);
            self.firings.fetch_add(1, Ordering::Relaxed);
            let ctx = ScheduleContext {
                job_name: name.clone(),
                slot: self.slot,
                scheduled_for: next,
                fired_at: Utc::now(),
            };

            let span = tracing::info_span!("scheduled_job", schedule = %name, slot = self.slot);
            match self.job.run(&ctx).instrument(span).await {
                Ok(()) => {
                    JobMetrics::record_scheduled_run(&name, true);
                    tracing::debug!(schedule = %name, slot = self.slot, "Scheduled job completed");
                }
                Err(e) => {
                    JobMetrics::record_scheduled_run(&name, false);
                    tracing::warn!(schedule = %name, slot = self.slot, error = %e, "Scheduled job failed");
                }
            }

            current = next;
        }

        self.set_state(RunnerState::Idle);
    }
}

/// Sleep until `at`. Returns false if shutdown was signalled first.
async fn wait_until(at: DateTime<Utc>, shutdown: &mut watch::Receiver<bool>) -> bool {
    loop {
        let delay = (at - Utc::now()).to_std().unwrap_or_default();
        tokio::select! {
            _ = tokio::time::sleep(delay) => return true,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counting {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl ScheduledJob for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(&self, _ctx: &ScheduleContext) -> Result<(), JobError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_exact_in_past_goes_idle_without_firing() {
        let job = Arc::new(Counting { runs: AtomicUsize::new(0) });
        let runner = ScheduledJobRunner::new(
            job.clone(),
            0,
            ScheduleDescriptor::Exact(Utc::now() - chrono::Duration::seconds(5)),
        );
        let (_tx, rx) = watch::channel(false);

        runner.run(rx).await;

        assert_eq!(runner.state(), RunnerState::Idle);
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exact_fires_once() {
        let job = Arc::new(Counting { runs: AtomicUsize::new(0) });
        let runner = ScheduledJobRunner::new(
            job.clone(),
            0,
            ScheduleDescriptor::Exact(Utc::now() + chrono::Duration::milliseconds(20)),
        );
        let (_tx, rx) = watch::channel(false);

        runner.run(rx).await;

        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
        assert_eq!(runner.firings(), 1);
        assert_eq!(runner.state(), RunnerState::Idle);
    }
}
