//! Queue backends and the dispatch front.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::notify::{JobEvent, NotificationHub};
use super::{Job, JobId, JobRecord};
use crate::error::{ErrorCode, Result, TempoError};

// ═══════════════════════════════════════════════════════════════════════════════
// Backend Contract
// ═══════════════════════════════════════════════════════════════════════════════

/// Storage for job records plus a pending list of ids.
///
/// `pop` must never hand the same id to two callers, `get` returns the value
/// of the latest `set`, and `clear` is idempotent.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Fetch a record. Fails with [`ErrorCode::RecordNotFound`] when absent.
    async fn get(&self, id: JobId) -> Result<JobRecord>;

    async fn set(&self, id: JobId, record: &JobRecord) -> Result<()>;

    /// Remove a record. Clearing a missing record is not an error.
    async fn clear(&self, id: JobId) -> Result<()>;

    /// Make `id` available to [`pop`](Self::pop).
    async fn push(&self, id: JobId) -> Result<()>;

    /// Atomically take the next pending id.
    async fn pop(&self) -> Result<Option<JobId>>;

    /// Number of pending ids.
    async fn pending(&self) -> Result<usize>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-Memory Backend
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct MemoryState {
    records: HashMap<JobId, JobRecord>,
    pending: VecDeque<JobId>,
}

/// In-memory queue backend for tests and single-process use.
#[derive(Default)]
pub struct InMemoryQueue {
    state: RwLock<MemoryState>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Snapshot of the pending ids, next to pop first.
    pub async fn pending_ids(&self) -> Vec<JobId> {
        self.state.read().await.pending.iter().copied().collect()
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn get(&self, id: JobId) -> Result<JobRecord> {
        self.state
            .read()
            .await
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| TempoError::record_not_found(id))
    }

    async fn set(&self, id: JobId, record: &JobRecord) -> Result<()> {
        self.state.write().await.records.insert(id, record.clone());
        Ok(())
    }

    async fn clear(&self, id: JobId) -> Result<()> {
        self.state.write().await.records.remove(&id);
        Ok(())
    }

    async fn push(&self, id: JobId) -> Result<()> {
        self.state.write().await.pending.push_back(id);
        Ok(())
    }

    async fn pop(&self) -> Result<Option<JobId>> {
        Ok(self.state.write().await.pending.pop_front())
    }

    async fn pending(&self) -> Result<usize> {
        Ok(self.state.read().await.pending.len())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Redis Backend
// ═══════════════════════════════════════════════════════════════════════════════

/// Redis-backed queue.
///
/// Records are JSON strings at `{namespace}:job:{id}`; pending ids live in the
/// list `{namespace}:pending` (`LPUSH` to enqueue, `RPOP` to take).
pub struct RedisQueue {
    client: redis::Client,
    namespace: String,
}

impl RedisQueue {
    pub fn new(client: redis::Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    /// Open a client for `url`; no connection is made until first use.
    pub fn connect(url: &str, namespace: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self::new(client, namespace))
    }

    pub fn record_key(&self, id: JobId) -> String {
        format!("{}:job:{}", self.namespace, id)
    }

    pub fn pending_key(&self) -> String {
        format!("{}:pending", self.namespace)
    }

    async fn get_conn(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await.map_err(|e| {
            TempoError::with_internal(
                ErrorCode::QueueConnectionFailed,
                "Failed to get Redis connection for job queue",
                e.to_string(),
            )
        })
    }
}

#[async_trait]
impl Queue for RedisQueue {
    #[tracing::instrument(name = "redis_queue_get", skip_all, fields(job_id = %id))]
    async fn get(&self, id: JobId) -> Result<JobRecord> {
        let mut conn = self.get_conn().await?;
        let value: Option<String> = redis::cmd("GET")
            .arg(self.record_key(id))
            .query_async(&mut conn)
            .await?;

        match value {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Err(TempoError::record_not_found(id)),
        }
    }

    #[tracing::instrument(name = "redis_queue_set", skip_all, fields(job_id = %id))]
    async fn set(&self, id: JobId, record: &JobRecord) -> Result<()> {
        let serialized = serde_json::to_string(record)?;
        let mut conn = self.get_conn().await?;
        redis::cmd("SET")
            .arg(self.record_key(id))
            .arg(serialized)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    #[tracing::instrument(name = "redis_queue_clear", skip_all, fields(job_id = %id))]
    async fn clear(&self, id: JobId) -> Result<()> {
        let mut conn = self.get_conn().await?;
        redis::cmd("DEL")
            .arg(self.record_key(id))
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(())
    }

    #[tracing::instrument(name = "redis_queue_push", skip_all, fields(queue = %self.namespace))]
    async fn push(&self, id: JobId) -> Result<()> {
        let mut conn = self.get_conn().await?;
        redis::cmd("LPUSH")
            .arg(self.pending_key())
            .arg(id.to_string())
            .query_async::<_, i64>(&mut conn)
            .await?;
        tracing::debug!(queue = %self.namespace, job_id = %id, "Job id pushed");
        Ok(())
    }

    #[tracing::instrument(name = "redis_queue_pop", skip_all, fields(queue = %self.namespace))]
    async fn pop(&self) -> Result<Option<JobId>> {
        let mut conn = self.get_conn().await?;
        let value: Option<String> = redis::cmd("RPOP")
            .arg(self.pending_key())
            .query_async(&mut conn)
            .await?;

        match value {
            Some(raw) => match JobId::parse(&raw) {
                Some(id) => Ok(Some(id)),
                None => Err(TempoError::new(
                    ErrorCode::DeserializationError,
                    format!("Malformed job id in pending list: {}", raw),
                )),
            },
            None => Ok(None),
        }
    }

    async fn pending(&self) -> Result<usize> {
        let mut conn = self.get_conn().await?;
        let length: usize = redis::cmd("LLEN")
            .arg(self.pending_key())
            .query_async(&mut conn)
            .await?;
        Ok(length)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Dispatch
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-dispatch overrides.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Retries after the first failure; falls back to the queue default
    pub max_retry_count: Option<u32>,
    /// Earliest execution time
    pub delay_until: Option<DateTime<Utc>>,
}

impl DispatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_retry_count(mut self, count: u32) -> Self {
        self.max_retry_count = Some(count);
        self
    }

    pub fn delay_until(mut self, at: DateTime<Utc>) -> Self {
        self.delay_until = Some(at);
        self
    }

    /// Delay relative to the moment of dispatch.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay_until = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d));
        self
    }
}

/// Producer-side front over a [`Queue`].
#[derive(Clone)]
pub struct JobQueue {
    backend: Arc<dyn Queue>,
    hub: Arc<NotificationHub>,
    default_max_retry_count: u32,
}

impl JobQueue {
    pub fn new(backend: Arc<dyn Queue>, hub: Arc<NotificationHub>) -> Self {
        Self {
            backend,
            hub,
            default_max_retry_count: 0,
        }
    }

    /// In-memory queue with its own notification hub (for testing).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryQueue::new()), Arc::new(NotificationHub::new()))
    }

    pub fn with_default_max_retry_count(mut self, count: u32) -> Self {
        self.default_max_retry_count = count;
        self
    }

    pub fn backend(&self) -> &Arc<dyn Queue> {
        &self.backend
    }

    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    /// Encode `payload` and enqueue it for `J`.
    pub async fn dispatch<J: Job>(&self, payload: J::Payload, options: DispatchOptions) -> Result<JobId> {
        let bytes = serde_json::to_vec(&payload)?;
        let mut record = JobRecord::new(
            J::NAME,
            bytes,
            options.max_retry_count.unwrap_or(self.default_max_retry_count),
        );
        record.delay_until = options.delay_until;
        self.dispatch_record(record).await
    }

    /// Store and enqueue a prepared record.
    pub async fn dispatch_record(&self, record: JobRecord) -> Result<JobId> {
        let id = record.id;
        self.backend.set(id, &record).await?;
        self.backend.push(id).await?;

        counter!("tempo_jobs_dispatched_total", "job" => record.job_name.clone()).increment(1);
        tracing::debug!(job_id = %id, job_name = %record.job_name, "Job dispatched");

        self.hub.notify(&record, JobEvent::Dispatched).await;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_is_fifo() {
        let queue = InMemoryQueue::new();
        let a = JobId::new();
        let b = JobId::new();
        queue.push(a).await.unwrap();
        queue.push(b).await.unwrap();

        assert_eq!(queue.pending().await.unwrap(), 2);
        assert_eq!(queue.pop().await.unwrap(), Some(a));
        assert_eq!(queue.pop().await.unwrap(), Some(b));
        assert_eq!(queue.pop().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_after_set_and_idempotent_clear() {
        let queue = InMemoryQueue::new();
        let mut record = JobRecord::new("echo", Vec::new(), 1);
        let id = record.id;

        queue.set(id, &record).await.unwrap();
        record.attempts = 1;
        queue.set(id, &record).await.unwrap();
        assert_eq!(queue.get(id).await.unwrap().attempts, 1);

        queue.clear(id).await.unwrap();
        queue.clear(id).await.unwrap();
        assert_eq!(queue.record_count().await, 0);
        assert_eq!(queue.get(id).await.unwrap_err().code(), ErrorCode::RecordNotFound);
    }

    #[tokio::test]
    async fn test_dispatch_record_writes_then_pushes() {
        let backend = Arc::new(InMemoryQueue::new());
        let queue = JobQueue::new(backend.clone(), Arc::new(NotificationHub::new()));

        let record = JobRecord::new("echo", b"{}".to_vec(), 2);
        let id = queue.dispatch_record(record.clone()).await.unwrap();

        assert_eq!(backend.get(id).await.unwrap(), record);
        assert_eq!(backend.pending_ids().await, vec![id]);
    }

    #[test]
    fn test_redis_keys() {
        let client = redis::Client::open("redis://127.0.0.1/").unwrap();
        let queue = RedisQueue::new(client, "tempo");
        let id = JobId::new();
        assert_eq!(queue.record_key(id), format!("tempo:job:{}", id));
        assert_eq!(queue.pending_key(), "tempo:pending");
    }

    #[test]
    fn test_dispatch_options_delay() {
        let options = DispatchOptions::new()
            .max_retry_count(4)
            .delay(Duration::from_secs(60));
        assert_eq!(options.max_retry_count, Some(4));
        assert!(options.delay_until.unwrap() > Utc::now());
    }
}
