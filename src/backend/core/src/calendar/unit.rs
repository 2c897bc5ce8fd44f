//! Calendar time units and date component extraction.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Latest year the recurrence engine will consider.
pub const HORIZON_YEAR: i32 = 3000;

/// A calendar field a [`TimeConstraint`](super::TimeConstraint) can restrict.
///
/// Variants are declared from the finest cadence (second) to the coarsest
/// (year), so the derived `Ord` is the cadence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    /// 1 = Sunday ... 7 = Saturday
    DayOfWeek,
    DayOfMonth,
    /// Sunday-start weeks, the week holding the 1st is week 1
    WeekOfMonth,
    /// ISO-8601 week number
    WeekOfYear,
    Month,
    Quarter,
    Year,
}

impl TimeUnit {
    /// All units, finest cadence first.
    pub const ALL: [TimeUnit; 10] = [
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
        TimeUnit::DayOfWeek,
        TimeUnit::DayOfMonth,
        TimeUnit::WeekOfMonth,
        TimeUnit::WeekOfYear,
        TimeUnit::Month,
        TimeUnit::Quarter,
        TimeUnit::Year,
    ];

    /// Order in which a rule checks a date, coarsest first.
    pub const EVALUATION_ORDER: [TimeUnit; 10] = [
        TimeUnit::Year,
        TimeUnit::Quarter,
        TimeUnit::Month,
        TimeUnit::WeekOfYear,
        TimeUnit::WeekOfMonth,
        TimeUnit::DayOfMonth,
        TimeUnit::DayOfWeek,
        TimeUnit::Hour,
        TimeUnit::Minute,
        TimeUnit::Second,
    ];

    /// Inclusive calendar bounds for values of this unit.
    pub const fn bounds(&self) -> (i32, i32) {
        match self {
            Self::Second | Self::Minute => (0, 59),
            Self::Hour => (0, 23),
            Self::DayOfWeek => (1, 7),
            Self::DayOfMonth => (1, 31),
            Self::WeekOfMonth => (1, 6),
            Self::WeekOfYear => (1, 53),
            Self::Month => (1, 12),
            Self::Quarter => (1, 4),
            Self::Year => (1970, HORIZON_YEAR),
        }
    }

    pub const fn lower_bound(&self) -> i32 {
        self.bounds().0
    }

    pub const fn upper_bound(&self) -> i32 {
        self.bounds().1
    }

    /// Check whether a value lies within this unit's calendar bounds.
    pub const fn contains(&self, value: i32) -> bool {
        let (lower, upper) = self.bounds();
        value >= lower && value <= upper
    }

    /// True for the units that select a day through weeks.
    pub const fn is_week_based(&self) -> bool {
        matches!(self, Self::DayOfWeek | Self::WeekOfMonth | Self::WeekOfYear)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::DayOfWeek => "day_of_week",
            Self::DayOfMonth => "day_of_month",
            Self::WeekOfMonth => "week_of_month",
            Self::WeekOfYear => "week_of_year",
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value of every [`TimeUnit`] for one local date-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateComponents {
    pub year: i32,
    pub quarter: i32,
    pub month: i32,
    pub week_of_year: i32,
    pub week_of_month: i32,
    pub day_of_month: i32,
    pub day_of_week: i32,
    pub hour: i32,
    pub minute: i32,
    pub second: i32,
}

impl DateComponents {
    pub fn from_naive(dt: &NaiveDateTime) -> Self {
        let date = dt.date();
        let month = date.month() as i32;
        Self {
            year: date.year(),
            quarter: (month - 1) / 3 + 1,
            month,
            week_of_year: date.iso_week().week() as i32,
            week_of_month: week_of_month(date),
            day_of_month: date.day() as i32,
            day_of_week: date.weekday().num_days_from_sunday() as i32 + 1,
            hour: dt.hour() as i32,
            minute: dt.minute() as i32,
            second: dt.second() as i32,
        }
    }

    pub fn get(&self, unit: TimeUnit) -> i32 {
        match unit {
            TimeUnit::Second => self.second,
            TimeUnit::Minute => self.minute,
            TimeUnit::Hour => self.hour,
            TimeUnit::DayOfWeek => self.day_of_week,
            TimeUnit::DayOfMonth => self.day_of_month,
            TimeUnit::WeekOfMonth => self.week_of_month,
            TimeUnit::WeekOfYear => self.week_of_year,
            TimeUnit::Month => self.month,
            TimeUnit::Quarter => self.quarter,
            TimeUnit::Year => self.year,
        }
    }
}

/// Sunday-start week of the month; the week containing the 1st is week 1.
pub fn week_of_month(date: NaiveDate) -> i32 {
    let offset = date
        .with_day(1)
        .map(|first| first.weekday().num_days_from_sunday())
        .unwrap_or(0);
    ((date.day() - 1 + offset) / 7 + 1) as i32
}

/// Number of days in the given month of the given year.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month >= 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// Most days a month can ever have, counting February in leap years.
pub const fn max_days_in_month(month: i32) -> i32 {
    match month {
        2 => 29,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_cadence_ordering() {
        assert!(TimeUnit::Second < TimeUnit::Minute);
        assert!(TimeUnit::DayOfWeek < TimeUnit::DayOfMonth);
        assert!(TimeUnit::Month < TimeUnit::Year);
        assert_eq!(TimeUnit::EVALUATION_ORDER[0], TimeUnit::Year);
    }

    #[test]
    fn test_bounds() {
        assert!(TimeUnit::Hour.contains(23));
        assert!(!TimeUnit::Hour.contains(24));
        assert!(!TimeUnit::Month.contains(0));
        assert!(TimeUnit::Year.contains(1970));
        assert!(!TimeUnit::Year.contains(3001));
    }

    #[test]
    fn test_components() {
        // 2019-02-01 was a Friday
        let c = DateComponents::from_naive(&at(2019, 2, 1, 3, 4, 5));
        assert_eq!(c.year, 2019);
        assert_eq!(c.quarter, 1);
        assert_eq!(c.month, 2);
        assert_eq!(c.day_of_month, 1);
        assert_eq!(c.day_of_week, 6);
        assert_eq!(c.week_of_month, 1);
        assert_eq!(c.week_of_year, 5);
        assert_eq!((c.hour, c.minute, c.second), (3, 4, 5));
    }

    #[test]
    fn test_week_of_month() {
        // June 2019 starts on a Saturday
        assert_eq!(week_of_month(NaiveDate::from_ymd_opt(2019, 6, 1).unwrap()), 1);
        assert_eq!(week_of_month(NaiveDate::from_ymd_opt(2019, 6, 2).unwrap()), 2);
        assert_eq!(week_of_month(NaiveDate::from_ymd_opt(2019, 6, 30).unwrap()), 6);
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2019, 2), 28);
        assert_eq!(days_in_month(2020, 2), 29);
        assert_eq!(days_in_month(2019, 12), 31);
        assert_eq!(days_in_month(2019, 4), 30);
    }
}
