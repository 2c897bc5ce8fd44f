//! Calendar recurrence engine.
//!
//! - **TimeUnit**: the ten calendar fields a rule can restrict
//! - **TimeConstraint**: a set, range or step restriction on one field
//! - **RecurrenceRule**: composite constraints with next-date resolution
//!
//! # Usage
//!
//! ```rust,ignore
//! use tempo_core::calendar::RecurrenceRule;
//!
//! // Leap days at 00:25:01
//! let rule = RecurrenceRule::new()
//!     .at_month(2)?
//!     .at_day_of_month(29)?
//!     .at_minute(25)?
//!     .at_second(1)?;
//!
//! let next = rule.resolve_next_date(Utc::now())?;
//! ```

mod constraint;
mod rule;
mod unit;

pub use constraint::{ConstraintError, ConstraintKind, ConstraintOutcome, TimeConstraint};
pub use rule::{RecurrenceRule, ResolutionError, RuleEvaluation};
pub use unit::{days_in_month, max_days_in_month, week_of_month, DateComponents, TimeUnit, HORIZON_YEAR};
