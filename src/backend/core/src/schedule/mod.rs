//! Recurring job declarations and timer-driven execution.
//!
//! - **ScheduleBuilder**: fluent declarations compiled into descriptors
//! - **ScheduleDescriptor**: exact, interval or calendar-component slots
//! - **ScheduledJobRunner**: `Idle → Armed → Firing` loop for one slot
//! - **JobScheduler**: name-keyed registry that owns the runners
//!
//! Scheduled jobs are called directly on their timer and never go through the
//! job queue.

mod builder;
mod descriptor;
mod runner;
mod scheduler;

pub use builder::{
    DailyBuilder, HourlyBuilder, MinutelyBuilder, MonthlyBuilder, ScheduleBuilder, WeeklyBuilder,
    YearlyBuilder,
};
pub use descriptor::{Components, Day, ScheduleContainer, ScheduleDescriptor, Time};
pub use runner::{RunnerState, ScheduleContext, ScheduledJob, ScheduledJobRunner};
pub use scheduler::JobScheduler;

use thiserror::Error;

use crate::calendar::{ConstraintError, ResolutionError};

/// Errors raised while declaring or resolving a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("last day of month cannot be expressed as a component schedule, use RecurrenceRule::at_last_day_of_month")]
    LastDayOfMonthUnsupported,

    #[error("invalid time of day: {0:?}")]
    InvalidTime(String),

    #[error("schedule declares no calendar components")]
    EmptyDescriptor,

    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}
