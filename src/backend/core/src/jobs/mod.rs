//! Background job queue for Tempo Core.
//!
//! - **Job**: typed job definitions with payload, error hook and retry delay
//! - **Registry**: name-keyed handlers, decoded from stored JSON payloads
//! - **Queue**: record store plus FIFO pending list (in-memory or Redis)
//! - **Worker**: pop, execute, retry or fail, with lifecycle notifications
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐ dispatch ┌──────────────┐  pop/get  ┌──────────────┐
//! │ JobQueue  │─────────▶│ Queue backend│◀─────────│ QueueWorker  │
//! └───────────┘ set+push └──────────────┘ set/push  └──────┬───────┘
//!       │                                                  │
//!       ▼                                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ NotificationHub: dispatched · dequeued · succeeded · failed      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use tempo_core::jobs::{DispatchOptions, HandlerRegistry, JobQueue, EchoJob, EchoPayload};
//!
//! let registry = HandlerRegistry::new();
//! registry.register_job(EchoJob);
//!
//! let queue = JobQueue::in_memory();
//! queue
//!     .dispatch::<EchoJob>(EchoPayload { message: "hi".into() }, DispatchOptions::new().max_retry_count(3))
//!     .await?;
//! ```

pub mod builtin;
pub mod job;
pub mod notify;
pub mod queue;
pub mod registry;
pub mod worker;

pub use builtin::{EchoJob, EchoPayload, HeartbeatJob};
pub use job::{BackoffStrategy, Job, JobContext, JobError, JobId, JobRecord, JobResult};
pub use notify::{JobEvent, NotificationError, NotificationHook, NotificationHub};
pub use queue::{DispatchOptions, InMemoryQueue, JobQueue, Queue, RedisQueue};
pub use registry::{HandlerRegistry, JobHandler, TypedHandler};
pub use worker::{JobWorker, QueueWorker, WorkOutcome, WorkerConfig, WorkerHandle, WorkerStats};
