#![allow(clippy::result_large_err)]
//! # Tempo Core
//!
//! Background job queue and calendar recurrence scheduling engine.
//!
//! ## Architecture
//!
//! - **Calendar**: time-unit constraints and recurrence rules resolved in any IANA time zone
//! - **Schedule**: fluent schedule builders, descriptors and timer-driven runners
//! - **Jobs**: queue backends (in-memory, Redis), handler registry, workers with retries
//! - **Telemetry**: structured logging and Prometheus metrics
//! - **Config**: file and environment driven configuration

pub mod calendar;
pub mod config;
pub mod error;
pub mod jobs;
pub mod schedule;
pub mod telemetry;

pub use error::{ErrorCode, ErrorContext, ErrorSeverity, Result, TempoError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::calendar::{RecurrenceRule, TimeConstraint, TimeUnit};
    pub use crate::error::{ErrorCode, ErrorContext, Result, TempoError};
    pub use crate::jobs::{
        DispatchOptions, HandlerRegistry, Job, JobContext, JobError, JobId, JobQueue, JobRecord,
        JobResult, JobWorker, NotificationHook, NotificationHub, Queue, WorkerConfig,
    };
    pub use crate::schedule::{
        Day, JobScheduler, ScheduleBuilder, ScheduleContainer, ScheduleContext, ScheduledJob, Time,
    };
}
