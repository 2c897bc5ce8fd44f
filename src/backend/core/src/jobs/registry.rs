//! Name-keyed table of job handlers.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{Job, JobContext, JobError, JobResult};

/// Type-erased job capability stored in the registry.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn dequeue(&self, ctx: &JobContext, payload: &[u8]) -> JobResult;

    async fn on_error(&self, ctx: &JobContext, error: &JobError, payload: &[u8]) -> JobResult;

    /// Seconds before `attempt`; negative means retry in place.
    fn next_retry_in(&self, attempt: u32) -> i64;
}

/// Adapts a typed [`Job`] to [`JobHandler`] by decoding JSON payloads.
pub struct TypedHandler<J: Job> {
    job: Arc<J>,
    _payload: PhantomData<fn() -> J::Payload>,
}

impl<J: Job> TypedHandler<J> {
    pub fn new(job: J) -> Self {
        Self {
            job: Arc::new(job),
            _payload: PhantomData,
        }
    }

    fn decode(payload: &[u8]) -> Result<J::Payload, JobError> {
        serde_json::from_slice(payload).map_err(|e| {
            JobError::fatal(format!("Failed to decode {} payload: {}", J::NAME, e)).with_code("DECODE")
        })
    }
}

#[async_trait]
impl<J: Job> JobHandler for TypedHandler<J> {
    async fn dequeue(&self, ctx: &JobContext, payload: &[u8]) -> JobResult {
        let payload = Self::decode(payload)?;
        self.job.dequeue(ctx, payload).await
    }

    async fn on_error(&self, ctx: &JobContext, error: &JobError, payload: &[u8]) -> JobResult {
        let payload = Self::decode(payload)?;
        self.job.on_error(ctx, error, payload).await
    }

    fn next_retry_in(&self, attempt: u32) -> i64 {
        self.job.next_retry_in(attempt)
    }
}

/// Instance-owned table from job name to handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn JobHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous handler.
    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn JobHandler>) {
        let name = name.into();
        if self.handlers.write().insert(name.clone(), handler).is_some() {
            tracing::warn!(job_name = %name, "Job handler registered twice, replacing previous handler");
        } else {
            tracing::debug!(job_name = %name, "Job handler registered");
        }
    }

    /// Register a typed job under [`Job::NAME`].
    pub fn register_job<J: Job>(&self, job: J) {
        self.register(J::NAME, Arc::new(TypedHandler::new(job)));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}
