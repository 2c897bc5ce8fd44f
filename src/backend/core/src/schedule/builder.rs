//! Fluent schedule declarations.
//!
//! ```rust,ignore
//! let daily = ScheduleBuilder::new().daily().at("17:30".parse()?).build()?;
//! let birthday = ScheduleBuilder::new()
//!     .yearly()
//!     .in_month(Month::May)
//!     .on(Day::Number(23))?
//!     .at(Time::noon())
//!     .build()?;
//! let pulse = ScheduleBuilder::new()
//!     .every(Duration::from_secs(10), Duration::from_secs(60))?
//!     .build()?;
//! ```

use chrono::{DateTime, Month, Utc, Weekday};
use chrono_tz::Tz;
use std::time::Duration;

use super::descriptor::{Components, Day, ScheduleContainer, ScheduleDescriptor, Time};
use super::ScheduleError;
use crate::calendar::{TimeConstraint, TimeUnit};

/// Accumulates one schedule declaration.
///
/// Calendar calls layer onto the current component descriptor; `every`
/// replaces it with interval slots.
#[derive(Debug, Clone, Default)]
pub struct ScheduleBuilder {
    container: ScheduleContainer,
    current: ScheduleDescriptor,
    time_zone: Option<Tz>,
}

impl ScheduleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn yearly(self) -> YearlyBuilder {
        YearlyBuilder { inner: self }
    }

    pub fn monthly(self) -> MonthlyBuilder {
        MonthlyBuilder { inner: self }
    }

    pub fn weekly(self) -> WeeklyBuilder {
        WeeklyBuilder { inner: self }
    }

    pub fn daily(self) -> DailyBuilder {
        DailyBuilder { inner: self }
    }

    pub fn hourly(self) -> HourlyBuilder {
        HourlyBuilder { inner: self }
    }

    pub fn minutely(self) -> MinutelyBuilder {
        MinutelyBuilder { inner: self }
    }

    /// Fire every second.
    pub fn every_second(self) -> Self {
        self.with_components(|c| c.every_second = true)
    }

    /// Fire once at `date`.
    pub fn at(mut self, date: DateTime<Utc>) -> Self {
        self.current = ScheduleDescriptor::Exact(date);
        self
    }

    /// Sub-second offset applied to calendar matches.
    pub fn nanosecond(self, nanos: u32) -> Result<Self, ScheduleError> {
        if nanos >= 1_000_000_000 {
            return Err(ScheduleError::InvalidTime(format!("{} nanoseconds", nanos)));
        }
        Ok(self.with_components(|c| c.nanosecond = Some(nanos)))
    }

    /// Read calendar fields in `time_zone` instead of UTC.
    pub fn in_time_zone(mut self, time_zone: Tz) -> Self {
        self.time_zone = Some(time_zone);
        self
    }

    /// Fire `interval / amount` times per `interval`, `amount` apart.
    pub fn every(self, amount: Duration, interval: Duration) -> Result<Self, ScheduleError> {
        self.every_with_options(amount, interval, Duration::ZERO, false)
    }

    /// Like [`every`](Self::every) with a start delay and a choice between
    /// rounding the slot count down (`underestimated_count`) or up.
    pub fn every_with_options(
        mut self,
        amount: Duration,
        interval: Duration,
        initial_delay: Duration,
        underestimated_count: bool,
    ) -> Result<Self, ScheduleError> {
        if amount.is_zero() {
            return Err(ScheduleError::InvalidInterval("amount must be positive".to_string()));
        }
        if amount > interval {
            return Err(ScheduleError::InvalidInterval(format!(
                "amount {:?} exceeds interval {:?}",
                amount, interval
            )));
        }

        let ratio = interval.as_nanos() / amount.as_nanos();
        let run_count = if underestimated_count || interval.as_nanos() % amount.as_nanos() == 0 {
            ratio
        } else {
            ratio + 1
        };

        let to_chrono = |d: Duration| {
            chrono::Duration::from_std(d)
                .map_err(|_| ScheduleError::InvalidInterval(format!("{:?} is too large", d)))
        };
        let period = to_chrono(interval)?;

        for slot in 0..run_count {
            let offset = amount
                .checked_mul(slot as u32)
                .and_then(|o| o.checked_add(initial_delay))
                .ok_or_else(|| ScheduleError::InvalidInterval("slot offset overflow".to_string()))?;
            let descriptor = ScheduleDescriptor::interval(to_chrono(offset)?, period);
            if slot == 0 {
                self.current = descriptor;
            } else {
                self.container.push(descriptor);
            }
        }
        Ok(self)
    }

    /// Finish the declaration, validating every slot.
    pub fn build(self) -> Result<ScheduleContainer, ScheduleError> {
        let time_zone = self.time_zone;
        let mut current = self.current;
        if let (ScheduleDescriptor::ComponentBased(components), Some(tz)) = (&mut current, time_zone) {
            components.time_zone = tz;
        }

        let mut container = ScheduleContainer::single(current);
        container.merge(self.container);
        for descriptor in container.descriptors() {
            descriptor.validate()?;
        }
        Ok(container)
    }

    fn with_components(mut self, apply: impl FnOnce(&mut Components)) -> Self {
        if !matches!(self.current, ScheduleDescriptor::ComponentBased(_)) {
            self.current = ScheduleDescriptor::default();
        }
        if let ScheduleDescriptor::ComponentBased(components) = &mut self.current {
            apply(components);
        }
        self
    }
}

fn check_unit(unit: TimeUnit, value: u32) -> Result<(), ScheduleError> {
    TimeConstraint::exact(unit, i32::try_from(value).unwrap_or(i32::MAX))?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Cadence builders
// ─────────────────────────────────────────────────────────────────────────────

pub struct YearlyBuilder {
    inner: ScheduleBuilder,
}

impl YearlyBuilder {
    pub fn in_month(self, month: Month) -> MonthlyBuilder {
        MonthlyBuilder {
            inner: self.inner.with_components(|c| c.month = Some(month)),
        }
    }
}

pub struct MonthlyBuilder {
    inner: ScheduleBuilder,
}

impl MonthlyBuilder {
    /// Pick the day of month. [`Day::Last`] is rejected here.
    pub fn on(self, day: impl Into<Day>) -> Result<DailyBuilder, ScheduleError> {
        match day.into() {
            Day::Last => Err(ScheduleError::LastDayOfMonthUnsupported),
            Day::Number(n) => {
                check_unit(TimeUnit::DayOfMonth, n)?;
                Ok(DailyBuilder {
                    inner: self.inner.with_components(|c| c.day = Some(n)),
                })
            }
        }
    }

    pub fn build(self) -> Result<ScheduleContainer, ScheduleError> {
        self.inner.build()
    }
}

pub struct WeeklyBuilder {
    inner: ScheduleBuilder,
}

impl WeeklyBuilder {
    pub fn on(self, weekday: Weekday) -> DailyBuilder {
        DailyBuilder {
            inner: self.inner.with_components(|c| c.weekday = Some(weekday)),
        }
    }
}

pub struct DailyBuilder {
    inner: ScheduleBuilder,
}

impl DailyBuilder {
    pub fn at(self, time: Time) -> ScheduleBuilder {
        self.inner.with_components(|c| c.time = Some(time))
    }

    /// Keep the day-level match and fire at midnight.
    pub fn build(self) -> Result<ScheduleContainer, ScheduleError> {
        self.inner
            .with_components(|c| {
                c.time.get_or_insert(Time::midnight());
            })
            .build()
    }
}

pub struct HourlyBuilder {
    inner: ScheduleBuilder,
}

impl HourlyBuilder {
    pub fn at(self, minute: u32) -> Result<ScheduleBuilder, ScheduleError> {
        check_unit(TimeUnit::Minute, minute)?;
        Ok(self.inner.with_components(|c| c.minute = Some(minute)))
    }
}

pub struct MinutelyBuilder {
    inner: ScheduleBuilder,
}

impl MinutelyBuilder {
    pub fn at(self, second: u32) -> Result<ScheduleBuilder, ScheduleError> {
        check_unit(TimeUnit::Second, second)?;
        Ok(self.inner.with_components(|c| c.second = Some(second)))
    }
}
