//! Composite recurrence rules and next-date resolution.
//!
//! A [`RecurrenceRule`] holds at most one [`TimeConstraint`] per [`TimeUnit`]
//! plus the time zone its calendar fields are read in. Units that are not
//! constrained but are finer than the finest constrained unit are pinned to
//! their calendar default, so `at_hour(3)` fires once at 03:00:00 rather than
//! every second of that hour.
//!
//! Resolution walks forward from a start instant: the candidate is advanced by
//! one step of the finest constrained unit, evaluated, and on failure jumped
//! straight to the failing unit's next allowed value with every finer unit
//! reset. The walk is bounded by [`HORIZON_YEAR`].

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use thiserror::Error;

use super::unit::{days_in_month, max_days_in_month, DateComponents, HORIZON_YEAR};
use super::{ConstraintError, ConstraintOutcome, TimeConstraint, TimeUnit};

/// Upper bound on evaluation steps for a single resolution.
const MAX_SEARCH_STEPS: usize = 1_000_000;

/// Day numbers that encode "last day of the month".
const LAST_DAY_CANDIDATES: [i32; 4] = [28, 29, 30, 31];

/// Errors raised while searching for the next matching date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("recurrence rule has no constraints")]
    NoConstraintsSet,

    #[error("recurrence rule can never be satisfied: {reason}")]
    RuleInsatiable { reason: String },

    #[error("no matching date found before year {horizon}")]
    SearchExhausted { horizon: i32 },
}

impl ResolutionError {
    fn exhausted() -> Self {
        Self::SearchExhausted {
            horizon: HORIZON_YEAR,
        }
    }
}

/// Result of evaluating a full date against a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEvaluation {
    Pass,
    /// The first unit, in evaluation order, whose constraint rejected the date
    Fail(TimeUnit),
}

impl RuleEvaluation {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// A set of per-unit calendar constraints evaluated in one time zone.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrenceRule {
    constraints: BTreeMap<TimeUnit, TimeConstraint>,
    time_zone: Tz,
    last_day_of_month: bool,
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self::new()
    }
}

impl RecurrenceRule {
    /// Create an empty rule in UTC.
    pub fn new() -> Self {
        Self {
            constraints: BTreeMap::new(),
            time_zone: chrono_tz::UTC,
            last_day_of_month: false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutators
    // ─────────────────────────────────────────────────────────────────────────

    /// Store `constraint` as the constraint for `unit`, replacing any previous one.
    pub fn set_constraint(
        &mut self,
        unit: TimeUnit,
        constraint: TimeConstraint,
    ) -> Result<(), ConstraintError> {
        if constraint.unit() != unit {
            return Err(ConstraintError::IncompatibleTimeUnit {
                expected: unit,
                found: constraint.unit(),
            });
        }
        if unit == TimeUnit::DayOfMonth {
            self.last_day_of_month = false;
        }
        self.constraints.insert(unit, constraint);
        Ok(())
    }

    /// Add a constraint under its own unit.
    pub fn with_constraint(mut self, constraint: TimeConstraint) -> Self {
        if constraint.unit() == TimeUnit::DayOfMonth {
            self.last_day_of_month = false;
        }
        self.constraints.insert(constraint.unit(), constraint);
        self
    }

    pub fn in_time_zone(mut self, time_zone: Tz) -> Self {
        self.time_zone = time_zone;
        self
    }

    pub fn at(self, unit: TimeUnit, value: i32) -> Result<Self, ConstraintError> {
        Ok(self.with_constraint(TimeConstraint::exact(unit, value)?))
    }

    pub fn at_values(
        self,
        unit: TimeUnit,
        values: impl IntoIterator<Item = i32>,
    ) -> Result<Self, ConstraintError> {
        Ok(self.with_constraint(TimeConstraint::set(unit, values)?))
    }

    pub fn between(self, unit: TimeUnit, lower: i32, upper: i32) -> Result<Self, ConstraintError> {
        Ok(self.with_constraint(TimeConstraint::range(unit, lower, upper)?))
    }

    pub fn every(self, unit: TimeUnit, step: i32) -> Result<Self, ConstraintError> {
        Ok(self.with_constraint(TimeConstraint::step(unit, step)?))
    }

    pub fn at_second(self, second: i32) -> Result<Self, ConstraintError> {
        self.at(TimeUnit::Second, second)
    }

    pub fn at_minute(self, minute: i32) -> Result<Self, ConstraintError> {
        self.at(TimeUnit::Minute, minute)
    }

    pub fn at_hour(self, hour: i32) -> Result<Self, ConstraintError> {
        self.at(TimeUnit::Hour, hour)
    }

    /// 1 = Sunday ... 7 = Saturday.
    pub fn at_day_of_week(self, day: i32) -> Result<Self, ConstraintError> {
        self.at(TimeUnit::DayOfWeek, day)
    }

    pub fn at_day_of_month(self, day: i32) -> Result<Self, ConstraintError> {
        self.at(TimeUnit::DayOfMonth, day)
    }

    pub fn at_week_of_month(self, week: i32) -> Result<Self, ConstraintError> {
        self.at(TimeUnit::WeekOfMonth, week)
    }

    pub fn at_week_of_year(self, week: i32) -> Result<Self, ConstraintError> {
        self.at(TimeUnit::WeekOfYear, week)
    }

    pub fn at_month(self, month: i32) -> Result<Self, ConstraintError> {
        self.at(TimeUnit::Month, month)
    }

    pub fn at_quarter(self, quarter: i32) -> Result<Self, ConstraintError> {
        self.at(TimeUnit::Quarter, quarter)
    }

    pub fn at_year(self, year: i32) -> Result<Self, ConstraintError> {
        self.at(TimeUnit::Year, year)
    }

    pub fn every_seconds(self, step: i32) -> Result<Self, ConstraintError> {
        self.every(TimeUnit::Second, step)
    }

    pub fn every_minutes(self, step: i32) -> Result<Self, ConstraintError> {
        self.every(TimeUnit::Minute, step)
    }

    pub fn every_hours(self, step: i32) -> Result<Self, ConstraintError> {
        self.every(TimeUnit::Hour, step)
    }

    /// Monday through Friday.
    pub fn weekdays(self) -> Self {
        self.with_constraint(TimeConstraint::trusted_set(TimeUnit::DayOfWeek, &[2, 3, 4, 5, 6]))
    }

    /// Saturday and Sunday.
    pub fn weekends(self) -> Self {
        self.with_constraint(TimeConstraint::trusted_set(TimeUnit::DayOfWeek, &[1, 7]))
    }

    /// Fire on the last day of each allowed month.
    ///
    /// Stored as a day-of-month set of 28..=31; the month-length check is
    /// applied during resolution.
    pub fn at_last_day_of_month(mut self) -> Self {
        self.constraints.insert(
            TimeUnit::DayOfMonth,
            TimeConstraint::trusted_set(TimeUnit::DayOfMonth, &LAST_DAY_CANDIDATES),
        );
        self.last_day_of_month = true;
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn constraint(&self, unit: TimeUnit) -> Option<&TimeConstraint> {
        self.constraints.get(&unit)
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    pub fn is_last_day_of_month(&self) -> bool {
        self.last_day_of_month
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// The finest-cadence unit carrying an explicit constraint.
    pub fn lowest_constrained_unit(&self) -> Option<TimeUnit> {
        self.constraints.keys().next().copied()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Evaluation
    // ─────────────────────────────────────────────────────────────────────────

    /// Check whether `date` satisfies every explicit and implicit constraint.
    pub fn evaluate(&self, date: DateTime<Utc>) -> bool {
        self.evaluate_detailed(date).passed()
    }

    /// Like [`evaluate`](Self::evaluate) but reports the first failing unit.
    pub fn evaluate_detailed(&self, date: DateTime<Utc>) -> RuleEvaluation {
        let local = date.with_timezone(&self.time_zone).naive_local();
        let components = DateComponents::from_naive(&local);
        evaluate_components(&self.effective_constraints(), &components)
    }

    /// Constraints actually applied, explicit or implied, in evaluation order.
    fn effective_constraints(&self) -> Vec<TimeConstraint> {
        TimeUnit::EVALUATION_ORDER
            .iter()
            .filter_map(|unit| {
                self.constraints
                    .get(unit)
                    .cloned()
                    .or_else(|| self.implicit_constraint(*unit))
            })
            .collect()
    }

    /// Calendar default for an unconstrained unit finer than the finest
    /// constrained one.
    fn implicit_constraint(&self, unit: TimeUnit) -> Option<TimeConstraint> {
        let lowest = self.lowest_constrained_unit()?;
        if unit >= lowest || self.constraints.contains_key(&unit) {
            return None;
        }
        let week_constrained = self.constraints.keys().any(TimeUnit::is_week_based);
        match unit {
            TimeUnit::Second | TimeUnit::Minute | TimeUnit::Hour => {
                Some(TimeConstraint::trusted_set(unit, &[0]))
            }
            TimeUnit::DayOfMonth if !week_constrained => {
                Some(TimeConstraint::trusted_set(unit, &[1]))
            }
            TimeUnit::Month if self.constraints.contains_key(&TimeUnit::WeekOfYear) => None,
            TimeUnit::Month if self.constraints.contains_key(&TimeUnit::Quarter) => {
                Some(TimeConstraint::trusted_set(unit, &[1, 4, 7, 10]))
            }
            TimeUnit::Month => Some(TimeConstraint::trusted_set(unit, &[1])),
            _ => None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resolution
    // ─────────────────────────────────────────────────────────────────────────

    /// Find the first instant strictly after `from` that satisfies the rule.
    pub fn resolve_next_date(&self, from: DateTime<Utc>) -> Result<DateTime<Utc>, ResolutionError> {
        let lowest = self
            .lowest_constrained_unit()
            .ok_or(ResolutionError::NoConstraintsSet)?;
        self.check_insatiable_constraints()?;

        let effective = self.effective_constraints();
        let start = from.with_timezone(&self.time_zone).naive_local();
        let start = start.with_nanosecond(0).unwrap_or(start);
        let mut candidate = advance(start, lowest).ok_or_else(ResolutionError::exhausted)?;

        for _ in 0..MAX_SEARCH_STEPS {
            if candidate.year() > HORIZON_YEAR || !self.is_year_constraint_possible(candidate.year()) {
                return Err(ResolutionError::exhausted());
            }

            let components = DateComponents::from_naive(&candidate);
            match evaluate_components(&effective, &components) {
                RuleEvaluation::Fail(unit) => {
                    let current = components.get(unit);
                    let next = effective
                        .iter()
                        .find(|c| c.unit() == unit)
                        .map(|c| c.next_valid_value(current))
                        .ok_or_else(ResolutionError::exhausted)?;
                    candidate = jump(candidate, unit, current, next)
                        .ok_or_else(ResolutionError::exhausted)?;
                }
                RuleEvaluation::Pass => {
                    if self.last_day_of_month {
                        let last = days_in_month(components.year, components.month as u32) as i32;
                        if components.day_of_month < last {
                            candidate = jump(candidate, TimeUnit::DayOfMonth, components.day_of_month, last)
                                .ok_or_else(ResolutionError::exhausted)?;
                            continue;
                        }
                    }
                    match self.to_utc(&candidate) {
                        Some(found) if found > from => return Ok(found),
                        _ => {
                            candidate = advance(candidate, lowest).ok_or_else(ResolutionError::exhausted)?;
                        }
                    }
                }
            }
        }

        Err(ResolutionError::exhausted())
    }

    /// Resolve the next `count` matching instants after `from`.
    pub fn upcoming(&self, from: DateTime<Utc>, count: usize) -> Result<Vec<DateTime<Utc>>, ResolutionError> {
        let mut dates = Vec::with_capacity(count);
        let mut cursor = from;
        for _ in 0..count {
            cursor = self.resolve_next_date(cursor)?;
            dates.push(cursor);
        }
        Ok(dates)
    }

    /// Fail fast on day-of-month constraints that no allowed month can hold.
    pub fn check_insatiable_constraints(&self) -> Result<(), ResolutionError> {
        let Some(day) = self.constraints.get(&TimeUnit::DayOfMonth) else {
            return Ok(());
        };
        let needed = day.lowest_possible_value();
        if needed <= 28 {
            return Ok(());
        }

        let months = self.constraints.get(&TimeUnit::Month);
        let quarters = self.constraints.get(&TimeUnit::Quarter);
        let possible = (1..=12).any(|month| {
            let month_allowed = TimeConstraint::evaluate_optional(months, month) != ConstraintOutcome::Fail;
            let quarter_allowed =
                TimeConstraint::evaluate_optional(quarters, (month - 1) / 3 + 1) != ConstraintOutcome::Fail;
            month_allowed && quarter_allowed && max_days_in_month(month) >= needed
        });

        if possible {
            Ok(())
        } else {
            Err(ResolutionError::RuleInsatiable {
                reason: format!("no allowed month has a day {}", needed),
            })
        }
    }

    /// Whether an explicit year constraint still allows `year` or a later one.
    pub fn is_year_constraint_possible(&self, year: i32) -> bool {
        match self.constraints.get(&TimeUnit::Year) {
            Some(constraint) => year <= constraint.highest_possible_value(),
            None => true,
        }
    }

    fn to_utc(&self, local: &NaiveDateTime) -> Option<DateTime<Utc>> {
        match self.time_zone.from_local_datetime(local) {
            LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
            LocalResult::None => None,
        }
    }
}

fn evaluate_components(constraints: &[TimeConstraint], components: &DateComponents) -> RuleEvaluation {
    for constraint in constraints {
        let unit = constraint.unit();
        if constraint.evaluate(components.get(unit)) == ConstraintOutcome::Fail {
            return RuleEvaluation::Fail(unit);
        }
    }
    RuleEvaluation::Pass
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}

fn first_of_month(year: i32, month: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, 1).map(midnight)
}

fn first_of_next_month(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    if dt.month() == 12 {
        first_of_month(dt.year() + 1, 1)
    } else {
        first_of_month(dt.year(), dt.month() + 1)
    }
}

fn truncate_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0).unwrap_or(dt)
}

fn truncate_to_hour(dt: NaiveDateTime) -> NaiveDateTime {
    truncate_to_minute(dt).with_minute(0).unwrap_or(dt)
}

/// Move one step of `unit` forward, resetting finer fields.
fn advance(dt: NaiveDateTime, unit: TimeUnit) -> Option<NaiveDateTime> {
    match unit {
        TimeUnit::Second => dt.checked_add_signed(Duration::seconds(1)),
        TimeUnit::Minute => truncate_to_minute(dt).checked_add_signed(Duration::minutes(1)),
        TimeUnit::Hour => truncate_to_hour(dt).checked_add_signed(Duration::hours(1)),
        TimeUnit::DayOfWeek
        | TimeUnit::DayOfMonth
        | TimeUnit::WeekOfMonth
        | TimeUnit::WeekOfYear => dt.date().succ_opt().map(midnight),
        TimeUnit::Month => first_of_next_month(dt),
        TimeUnit::Quarter => {
            let next_quarter_month = ((dt.month() - 1) / 3 + 1) * 3 + 1;
            if next_quarter_month > 12 {
                first_of_month(dt.year() + 1, 1)
            } else {
                first_of_month(dt.year(), next_quarter_month)
            }
        }
        TimeUnit::Year => first_of_month(dt.year() + 1, 1),
    }
}

/// Move the candidate to the earliest instant where `unit` equals `next`,
/// carrying into the coarser unit when `next` wrapped around.
fn jump(dt: NaiveDateTime, unit: TimeUnit, current: i32, next: i32) -> Option<NaiveDateTime> {
    let wrapped = next <= current;
    match unit {
        TimeUnit::Second => {
            let base = if wrapped {
                truncate_to_minute(dt).checked_add_signed(Duration::minutes(1))?
            } else {
                dt
            };
            base.with_second(next as u32)
        }
        TimeUnit::Minute => {
            let base = if wrapped {
                truncate_to_hour(dt).checked_add_signed(Duration::hours(1))?
            } else {
                truncate_to_minute(dt)
            };
            base.with_minute(next as u32)
        }
        TimeUnit::Hour => {
            let day = if wrapped { dt.date().succ_opt()? } else { dt.date() };
            midnight(day).with_hour(next as u32)
        }
        TimeUnit::DayOfMonth => {
            let last = days_in_month(dt.year(), dt.month()) as i32;
            if wrapped || next > last {
                first_of_next_month(dt)
            } else {
                NaiveDate::from_ymd_opt(dt.year(), dt.month(), next as u32).map(midnight)
            }
        }
        TimeUnit::DayOfWeek => {
            let days = i64::from((next - current).rem_euclid(7));
            dt.date()
                .checked_add_signed(Duration::days(if days == 0 { 7 } else { days }))
                .map(midnight)
        }
        TimeUnit::WeekOfMonth => {
            if wrapped {
                return first_of_next_month(dt);
            }
            let week_start = dt.date()
                - Duration::days(i64::from(dt.weekday().num_days_from_sunday()));
            let target = week_start.checked_add_signed(Duration::weeks(i64::from(next - current)))?;
            if target.month() == dt.month() && target.year() == dt.year() {
                Some(midnight(target))
            } else {
                first_of_next_month(dt)
            }
        }
        TimeUnit::WeekOfYear => {
            if wrapped {
                let iso_year = dt.iso_week().year();
                return NaiveDate::from_isoywd_opt(iso_year + 1, 1, Weekday::Mon).map(midnight);
            }
            let monday = dt.date()
                - Duration::days(i64::from(dt.weekday().num_days_from_monday()));
            monday
                .checked_add_signed(Duration::weeks(i64::from(next - current)))
                .map(midnight)
        }
        TimeUnit::Month => {
            let year = if wrapped { dt.year() + 1 } else { dt.year() };
            first_of_month(year, next as u32)
        }
        TimeUnit::Quarter => {
            let year = if wrapped { dt.year() + 1 } else { dt.year() };
            first_of_month(year, ((next - 1) * 3 + 1) as u32)
        }
        TimeUnit::Year => {
            if wrapped {
                None
            } else {
                first_of_month(next, 1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_empty_rule_cannot_resolve() {
        let rule = RecurrenceRule::new();
        assert_eq!(
            rule.resolve_next_date(utc(2019, 1, 1, 0, 0, 0)),
            Err(ResolutionError::NoConstraintsSet)
        );
    }

    #[test]
    fn test_incompatible_unit_rejected() {
        let mut rule = RecurrenceRule::new();
        let hour = TimeConstraint::exact(TimeUnit::Hour, 3).unwrap();
        assert_eq!(
            rule.set_constraint(TimeUnit::Minute, hour),
            Err(ConstraintError::IncompatibleTimeUnit {
                expected: TimeUnit::Minute,
                found: TimeUnit::Hour,
            })
        );
    }

    #[test]
    fn test_implicit_defaults_below_lowest_unit() {
        let rule = RecurrenceRule::new().at_month(2).unwrap().at_hour(3).unwrap();
        assert!(rule.evaluate(utc(2019, 2, 1, 3, 0, 0)));
        assert!(rule.evaluate(utc(2019, 2, 17, 3, 0, 0)));
        assert_eq!(
            rule.evaluate_detailed(utc(2019, 2, 1, 3, 0, 1)),
            RuleEvaluation::Fail(TimeUnit::Second)
        );
        assert_eq!(
            rule.evaluate_detailed(utc(2019, 2, 1, 4, 0, 0)),
            RuleEvaluation::Fail(TimeUnit::Hour)
        );
    }

    #[test]
    fn test_month_only_rule_pins_day_and_time() {
        let rule = RecurrenceRule::new().at_month(6).unwrap();
        assert_eq!(
            rule.resolve_next_date(utc(2019, 1, 15, 8, 0, 0)).unwrap(),
            utc(2019, 6, 1, 0, 0, 0)
        );
        assert_eq!(
            rule.resolve_next_date(utc(2019, 6, 1, 0, 0, 0)).unwrap(),
            utc(2020, 6, 1, 0, 0, 0)
        );
    }

    #[test]
    fn test_quarter_rule_uses_quarter_start() {
        let rule = RecurrenceRule::new().at_quarter(3).unwrap();
        assert_eq!(
            rule.resolve_next_date(utc(2019, 1, 1, 0, 0, 0)).unwrap(),
            utc(2019, 7, 1, 0, 0, 0)
        );
    }

    #[test]
    fn test_year_wrap_exhausts_search() {
        let rule = RecurrenceRule::new().at_year(2018).unwrap();
        assert_eq!(
            rule.resolve_next_date(utc(2019, 1, 1, 0, 0, 0)),
            Err(ResolutionError::SearchExhausted { horizon: HORIZON_YEAR })
        );
    }

    #[test]
    fn test_time_zone_is_respected() {
        let rule = RecurrenceRule::new()
            .at_hour(9)
            .unwrap()
            .at_minute(0)
            .unwrap()
            .in_time_zone(chrono_tz::America::New_York);
        // 09:00 EST is 14:00 UTC in January
        assert_eq!(
            rule.resolve_next_date(utc(2019, 1, 10, 0, 0, 0)).unwrap(),
            utc(2019, 1, 10, 14, 0, 0)
        );
    }

    #[test]
    fn test_dst_gap_is_skipped() {
        // 2019-03-10 02:30 does not exist in New York
        let rule = RecurrenceRule::new()
            .at_hour(2)
            .unwrap()
            .at_minute(30)
            .unwrap()
            .in_time_zone(chrono_tz::America::New_York);
        assert_eq!(
            rule.resolve_next_date(utc(2019, 3, 10, 0, 0, 0)).unwrap(),
            utc(2019, 3, 11, 6, 30, 0)
        );
    }

    #[test]
    fn test_day_of_week_jump() {
        // Mondays at 09:30; 2019-02-01 is a Friday
        let rule = RecurrenceRule::new()
            .at_day_of_week(2)
            .unwrap()
            .at_hour(9)
            .unwrap()
            .at_minute(30)
            .unwrap();
        assert_eq!(
            rule.resolve_next_date(utc(2019, 2, 1, 12, 0, 0)).unwrap(),
            utc(2019, 2, 4, 9, 30, 0)
        );
    }

    #[test]
    fn test_week_of_year_jump() {
        // ISO week 10 of 2019 starts Monday March 4
        let rule = RecurrenceRule::new().at_week_of_year(10).unwrap();
        assert_eq!(
            rule.resolve_next_date(utc(2019, 1, 2, 0, 0, 0)).unwrap(),
            utc(2019, 3, 4, 0, 0, 0)
        );
    }

    #[test]
    fn test_week_of_month_jump() {
        // Second week of June 2019 starts Sunday June 2
        let rule = RecurrenceRule::new()
            .at_month(6)
            .unwrap()
            .at_week_of_month(2)
            .unwrap()
            .at_hour(8)
            .unwrap();
        assert_eq!(
            rule.resolve_next_date(utc(2019, 5, 20, 0, 0, 0)).unwrap(),
            utc(2019, 6, 2, 8, 0, 0)
        );
    }

    #[test]
    fn test_thirtieth_in_february_only_is_insatiable() {
        let rule = RecurrenceRule::new()
            .at_month(2)
            .unwrap()
            .at_day_of_month(30)
            .unwrap();
        assert!(matches!(
            rule.check_insatiable_constraints(),
            Err(ResolutionError::RuleInsatiable { .. })
        ));
    }

    #[test]
    fn test_upcoming_returns_consecutive_dates() {
        let rule = RecurrenceRule::new().every_minutes(15).unwrap();
        let dates = rule.upcoming(utc(2019, 1, 1, 0, 7, 0), 3).unwrap();
        assert_eq!(
            dates,
            vec![
                utc(2019, 1, 1, 0, 15, 0),
                utc(2019, 1, 1, 0, 30, 0),
                utc(2019, 1, 1, 0, 45, 0),
            ]
        );
    }

    #[test]
    fn test_overriding_day_clears_last_day_flag() {
        let rule = RecurrenceRule::new().at_last_day_of_month().at_day_of_month(5).unwrap();
        assert!(!rule.is_last_day_of_month());
    }
}
