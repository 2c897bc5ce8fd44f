//! Built-in jobs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{Job, JobContext, JobError, JobResult};
use crate::schedule::{ScheduleContext, ScheduledJob};

/// Payload for [`EchoJob`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoPayload {
    pub message: String,
}

/// Queue job: logs its message. Used to verify a deployment end to end.
#[derive(Debug, Clone, Default)]
pub struct EchoJob;

#[async_trait]
impl Job for EchoJob {
    const NAME: &'static str = "echo";
    type Payload = EchoPayload;

    async fn dequeue(&self, ctx: &JobContext, payload: EchoPayload) -> JobResult {
        if payload.message.is_empty() {
            return Err(JobError::fatal("echo payload has an empty message"));
        }
        ctx.log_info(&payload.message);
        Ok(())
    }

    fn next_retry_in(&self, attempt: u32) -> i64 {
        super::BackoffStrategy::exponential().next_retry_in(attempt)
    }
}

/// Scheduled job: logs a heartbeat on every firing.
#[derive(Debug, Default)]
pub struct HeartbeatJob {
    beats: AtomicU64,
}

impl HeartbeatJob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ScheduledJob for HeartbeatJob {
    fn name(&self) -> &str {
        "heartbeat"
    }

    async fn run(&self, ctx: &ScheduleContext) -> Result<(), JobError> {
        let beat = self.beats.fetch_add(1, Ordering::Relaxed) + 1;
        let lag_ms = (ctx.fired_at - ctx.scheduled_for).num_milliseconds();
        tracing::info!(beat, slot = ctx.slot, lag_ms, "Heartbeat");
        Ok(())
    }
}
