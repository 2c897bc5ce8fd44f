//! Integration tests for constraints and recurrence rule resolution.
//!
//! Tests cover:
//! - Constraint construction bounds and evaluation
//! - Next-valid-value monotonicity
//! - Rule evaluation with implicit calendar defaults
//! - Searches across leap years, month ends and insatiable rules

use chrono::{DateTime, TimeZone, Utc};
use tempo_core::calendar::{
    ConstraintError, ConstraintOutcome, RecurrenceRule, ResolutionError, TimeConstraint, TimeUnit,
};

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

// ============================================================================
// Constraint Tests
// ============================================================================

#[test]
fn test_out_of_bounds_construction_fails() {
    for unit in TimeUnit::ALL {
        let (lower, upper) = unit.bounds();
        assert!(matches!(
            TimeConstraint::exact(unit, upper + 1),
            Err(ConstraintError::OutOfBounds { .. })
        ));
        assert!(matches!(
            TimeConstraint::range(unit, lower - 1, upper),
            Err(ConstraintError::OutOfBounds { .. })
        ));
        assert!(TimeConstraint::exact(unit, lower).is_ok());
    }
}

#[test]
fn test_evaluation_matches_variant() {
    let set = TimeConstraint::set(TimeUnit::Minute, [0, 15, 30]).unwrap();
    let range = TimeConstraint::range(TimeUnit::Hour, 9, 17).unwrap();
    let step = TimeConstraint::step(TimeUnit::Second, 10).unwrap();

    for v in 0..=59 {
        let expected_set = [0, 15, 30].contains(&v);
        assert_eq!(set.evaluate(v) == ConstraintOutcome::Pass, expected_set, "set {}", v);
        assert_eq!(step.evaluate(v) == ConstraintOutcome::Pass, v % 10 == 0, "step {}", v);
    }
    for v in 0..=23 {
        assert_eq!(range.evaluate(v) == ConstraintOutcome::Pass, (9..=17).contains(&v), "range {}", v);
    }
}

#[test]
fn test_next_valid_value_is_greater_or_wraps() {
    let constraints = [
        TimeConstraint::set(TimeUnit::Minute, [5, 20, 45]).unwrap(),
        TimeConstraint::range(TimeUnit::DayOfMonth, 10, 20).unwrap(),
        TimeConstraint::step(TimeUnit::Hour, 6).unwrap(),
        TimeConstraint::exact(TimeUnit::Month, 2).unwrap(),
    ];

    for constraint in &constraints {
        let (lower, upper) = constraint.unit().bounds();
        for v in lower..=upper {
            let next = constraint.next_valid_value(v);
            assert!(
                next > v || next == constraint.lowest_possible_value(),
                "{:?} at {} gave {}",
                constraint,
                v,
                next
            );
            assert_eq!(constraint.evaluate(next), ConstraintOutcome::Pass);
        }
    }
}

// ============================================================================
// Rule Evaluation Tests
// ============================================================================

#[test]
fn test_month_and_hour_rule_evaluation() {
    let rule = RecurrenceRule::new().at_month(2).unwrap().at_hour(3).unwrap();

    assert!(rule.evaluate(utc(2019, 2, 1, 3, 0, 0)));
    assert!(!rule.evaluate(utc(2019, 2, 1, 3, 0, 1)));
    assert!(!rule.evaluate(utc(2019, 2, 1, 4, 0, 0)));
}

#[test]
fn test_weekdays_rule() {
    let rule = RecurrenceRule::new().weekdays().at_hour(8).unwrap();
    // 2019-02-02 is a Saturday
    assert!(!rule.evaluate(utc(2019, 2, 2, 8, 0, 0)));
    assert_eq!(
        rule.resolve_next_date(utc(2019, 2, 2, 0, 0, 0)).unwrap(),
        utc(2019, 2, 4, 8, 0, 0)
    );
}

// ============================================================================
// Resolution Tests
// ============================================================================

#[test]
fn test_leap_year_search() {
    let rule = RecurrenceRule::new()
        .at_month(2)
        .unwrap()
        .at_day_of_month(29)
        .unwrap()
        .at_minute(25)
        .unwrap()
        .at_second(1)
        .unwrap();

    assert_eq!(
        rule.resolve_next_date(utc(2019, 2, 1, 3, 0, 0)).unwrap(),
        utc(2020, 2, 29, 0, 25, 1)
    );
}

#[test]
fn test_insatiable_rule_detected() {
    let rule = RecurrenceRule::new()
        .at_day_of_month(31)
        .unwrap()
        .at_month(2)
        .unwrap();

    assert!(matches!(
        rule.resolve_next_date(utc(2019, 1, 1, 0, 0, 0)),
        Err(ResolutionError::RuleInsatiable { .. })
    ));
}

#[test]
fn test_last_day_of_month() {
    let rule = RecurrenceRule::new().at_last_day_of_month();

    let first = rule.resolve_next_date(utc(2019, 1, 1, 0, 0, 0)).unwrap();
    assert_eq!(first, utc(2019, 1, 31, 0, 0, 0));

    let second = rule.resolve_next_date(first).unwrap();
    assert_eq!(second, utc(2019, 2, 28, 0, 0, 0));
}

#[test]
fn test_resolution_is_strictly_after_start() {
    let rule = RecurrenceRule::new().at_hour(12).unwrap();
    let noon = utc(2019, 5, 5, 12, 0, 0);
    assert!(rule.evaluate(noon));
    assert_eq!(rule.resolve_next_date(noon).unwrap(), utc(2019, 5, 6, 12, 0, 0));
}

#[test]
fn test_empty_rule_has_no_constraints() {
    assert_eq!(
        RecurrenceRule::new().resolve_next_date(utc(2019, 1, 1, 0, 0, 0)),
        Err(ResolutionError::NoConstraintsSet)
    );
}
