//! Schedule descriptors and their next-date computation.

use chrono::{DateTime, Duration, Month, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;

use super::ScheduleError;
use crate::calendar::{RecurrenceRule, TimeConstraint, TimeUnit};

// ═══════════════════════════════════════════════════════════════════════════════
// Time of Day
// ═══════════════════════════════════════════════════════════════════════════════

/// A wall-clock time with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time {
    hour: u32,
    minute: u32,
}

impl Time {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::InvalidTime(format!("{:02}:{:02}", hour, minute)));
        }
        Ok(Self { hour, minute })
    }

    pub const fn noon() -> Self {
        Self { hour: 12, minute: 0 }
    }

    pub const fn midnight() -> Self {
        Self { hour: 0, minute: 0 }
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for Time {
    type Err = ScheduleError;

    /// Accepts `17:30`, `5:30pm`, `5pm`, `noon` and `midnight`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScheduleError::InvalidTime(s.to_string());
        let text = s.trim().to_ascii_lowercase();

        match text.as_str() {
            "noon" => return Ok(Self::noon()),
            "midnight" => return Ok(Self::midnight()),
            _ => {}
        }

        let (clock, meridiem) = if let Some(rest) = text.strip_suffix("am") {
            (rest.trim_end(), Some(false))
        } else if let Some(rest) = text.strip_suffix("pm") {
            (rest.trim_end(), Some(true))
        } else {
            (text.as_str(), None)
        };

        let (hour, minute) = match clock.split_once(':') {
            Some((h, m)) => (h.parse::<u32>().map_err(|_| invalid())?, m.parse::<u32>().map_err(|_| invalid())?),
            None if meridiem.is_some() => (clock.parse::<u32>().map_err(|_| invalid())?, 0),
            None => return Err(invalid()),
        };

        let hour = match meridiem {
            Some(pm) => {
                if hour == 0 || hour > 12 {
                    return Err(invalid());
                }
                match (hour, pm) {
                    (12, false) => 0,
                    (12, true) => 12,
                    (h, true) => h + 12,
                    (h, false) => h,
                }
            }
            None => hour,
        };

        Self::new(hour, minute).map_err(|_| invalid())
    }
}

/// Day selector for monthly schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Day {
    Number(u32),
    /// Only expressible through [`RecurrenceRule::at_last_day_of_month`]
    Last,
}

impl From<u32> for Day {
    fn from(day: u32) -> Self {
        Self::Number(day)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Components
// ═══════════════════════════════════════════════════════════════════════════════

/// Calendar fields accumulated by the fluent builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Components {
    pub month: Option<Month>,
    pub day: Option<u32>,
    pub weekday: Option<Weekday>,
    pub time: Option<Time>,
    pub minute: Option<u32>,
    pub second: Option<u32>,
    pub nanosecond: Option<u32>,
    pub every_second: bool,
    pub time_zone: Tz,
}

impl Default for Components {
    fn default() -> Self {
        Self {
            month: None,
            day: None,
            weekday: None,
            time: None,
            minute: None,
            second: None,
            nanosecond: None,
            every_second: false,
            time_zone: chrono_tz::UTC,
        }
    }
}

impl Components {
    pub fn is_empty(&self) -> bool {
        self.month.is_none()
            && self.day.is_none()
            && self.weekday.is_none()
            && self.time.is_none()
            && self.minute.is_none()
            && self.second.is_none()
            && !self.every_second
    }

    /// Compile the populated fields into a recurrence rule.
    ///
    /// An explicit `minute` wins over the minute of `time`.
    pub fn to_rule(&self) -> Result<RecurrenceRule, ScheduleError> {
        if self.is_empty() {
            return Err(ScheduleError::EmptyDescriptor);
        }

        let mut rule = RecurrenceRule::new().in_time_zone(self.time_zone);
        if let Some(month) = self.month {
            rule = rule.at_month(month.number_from_month() as i32)?;
        }
        if let Some(day) = self.day {
            rule = rule.at_day_of_month(day as i32)?;
        }
        if let Some(weekday) = self.weekday {
            rule = rule.at_day_of_week(weekday.num_days_from_sunday() as i32 + 1)?;
        }
        if let Some(time) = self.time {
            rule = rule.at_hour(time.hour as i32)?.at_minute(time.minute as i32)?;
        }
        if let Some(minute) = self.minute {
            rule = rule.at_minute(minute as i32)?;
        }
        if self.every_second {
            rule = rule.with_constraint(TimeConstraint::step(TimeUnit::Second, 1)?);
        } else if let Some(second) = self.second {
            rule = rule.at_second(second as i32)?;
        }
        Ok(rule)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Descriptor
// ═══════════════════════════════════════════════════════════════════════════════

/// One schedule slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleDescriptor {
    /// Fire once at a fixed instant
    Exact(DateTime<Utc>),
    /// Fire `offset` after start, then every `interval`
    IntervalBased {
        offset: Duration,
        interval: Duration,
        first_cycle: bool,
    },
    /// Fire whenever the calendar matches the populated components
    ComponentBased(Components),
}

impl ScheduleDescriptor {
    pub fn interval(offset: Duration, interval: Duration) -> Self {
        Self::IntervalBased {
            offset,
            interval,
            first_cycle: true,
        }
    }

    /// Advance the descriptor and return the next fire date after `current`.
    ///
    /// On the first call an interval descriptor returns `current + offset`
    /// and leaves its first cycle; only the owning runner should call this.
    pub fn next_date(&mut self, current: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ScheduleError> {
        let next = self.peek_next_date(current)?;
        if let Self::IntervalBased { first_cycle, .. } = self {
            *first_cycle = false;
        }
        Ok(next)
    }

    /// Compute the next fire date without advancing the descriptor.
    pub fn peek_next_date(&self, current: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ScheduleError> {
        match self {
            Self::Exact(date) => Ok((*date > current).then_some(*date)),
            Self::IntervalBased {
                offset,
                interval,
                first_cycle,
            } => {
                let step = if *first_cycle { *offset } else { *interval };
                Ok(current.checked_add_signed(step))
            }
            Self::ComponentBased(components) => {
                let next = components.to_rule()?.resolve_next_date(current)?;
                let next = match components.nanosecond {
                    Some(nanos) => next.with_nanosecond(nanos).unwrap_or(next),
                    None => next,
                };
                Ok(Some(next))
            }
        }
    }

    /// Check the descriptor can produce dates at all.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        match self {
            Self::ComponentBased(components) => {
                components.to_rule()?.check_insatiable_constraints()?;
                Ok(())
            }
            Self::IntervalBased { interval, .. } if *interval <= Duration::zero() => Err(
                ScheduleError::InvalidInterval("interval must be positive".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Non-mutating preview of the next `count` fire dates after `from`.
    pub fn upcoming(&self, from: DateTime<Utc>, count: usize) -> Result<Vec<DateTime<Utc>>, ScheduleError> {
        let mut probe = self.clone();
        let mut dates = Vec::with_capacity(count);
        let mut cursor = from;
        while dates.len() < count {
            match probe.next_date(cursor)? {
                Some(next) => {
                    dates.push(next);
                    cursor = next;
                }
                None => break,
            }
        }
        Ok(dates)
    }
}

impl Default for ScheduleDescriptor {
    fn default() -> Self {
        Self::ComponentBased(Components::default())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Container
// ═══════════════════════════════════════════════════════════════════════════════

/// All slots produced by one declaration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleContainer {
    descriptors: Vec<ScheduleDescriptor>,
}

impl ScheduleContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(descriptor: ScheduleDescriptor) -> Self {
        Self {
            descriptors: vec![descriptor],
        }
    }

    pub fn push(&mut self, descriptor: ScheduleDescriptor) {
        self.descriptors.push(descriptor);
    }

    /// Absorb the slots of another container.
    pub fn merge(&mut self, other: ScheduleContainer) {
        self.descriptors.extend(other.descriptors);
    }

    pub fn descriptors(&self) -> &[ScheduleDescriptor] {
        &self.descriptors
    }

    pub fn into_descriptors(self) -> Vec<ScheduleDescriptor> {
        self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Earliest `count` fire dates across every slot.
    pub fn upcoming(&self, from: DateTime<Utc>, count: usize) -> Result<Vec<DateTime<Utc>>, ScheduleError> {
        let mut dates = Vec::new();
        for descriptor in &self.descriptors {
            dates.extend(descriptor.upcoming(from, count)?);
        }
        dates.sort();
        dates.truncate(count);
        Ok(dates)
    }
}
