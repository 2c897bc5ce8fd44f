//! Single-unit calendar constraints.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use super::TimeUnit;

/// Errors raised while building constraints or rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintError {
    #[error("{value} is out of bounds for {unit} (allowed {lower}..={upper})")]
    OutOfBounds {
        unit: TimeUnit,
        value: i32,
        lower: i32,
        upper: i32,
    },

    #[error("constraint for {found} cannot be stored as a {expected} constraint")]
    IncompatibleTimeUnit { expected: TimeUnit, found: TimeUnit },

    #[error("{unit} constraint has no allowed values")]
    EmptyConstraint { unit: TimeUnit },
}

impl ConstraintError {
    fn out_of_bounds(unit: TimeUnit, value: i32) -> Self {
        let (lower, upper) = unit.bounds();
        Self::OutOfBounds {
            unit,
            value,
            lower,
            upper,
        }
    }
}

/// Outcome of checking one value against an optional constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOutcome {
    Pass,
    Fail,
    NoConstraint,
}

/// The rule a [`TimeConstraint`] applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Any of an explicit set of values
    Set(BTreeSet<i32>),
    /// Inclusive lower and upper bound
    Range { lower: i32, upper: i32 },
    /// Every multiple of the step, including 0
    Step(i32),
}

/// A validated restriction on one calendar unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeConstraint {
    unit: TimeUnit,
    kind: ConstraintKind,
}

impl TimeConstraint {
    /// Allow exactly one value.
    pub fn exact(unit: TimeUnit, value: i32) -> Result<Self, ConstraintError> {
        Self::set(unit, [value])
    }

    /// Allow any of the given values.
    pub fn set(
        unit: TimeUnit,
        values: impl IntoIterator<Item = i32>,
    ) -> Result<Self, ConstraintError> {
        let values: BTreeSet<i32> = values.into_iter().collect();
        if values.is_empty() {
            return Err(ConstraintError::EmptyConstraint { unit });
        }
        if let Some(&bad) = values.iter().find(|v| !unit.contains(**v)) {
            return Err(ConstraintError::out_of_bounds(unit, bad));
        }
        Ok(Self {
            unit,
            kind: ConstraintKind::Set(values),
        })
    }

    /// Allow every value between `lower` and `upper`, inclusive.
    pub fn range(unit: TimeUnit, lower: i32, upper: i32) -> Result<Self, ConstraintError> {
        for value in [lower, upper] {
            if !unit.contains(value) {
                return Err(ConstraintError::out_of_bounds(unit, value));
            }
        }
        if lower > upper {
            return Err(ConstraintError::EmptyConstraint { unit });
        }
        Ok(Self {
            unit,
            kind: ConstraintKind::Range { lower, upper },
        })
    }

    /// Allow every multiple of `step`.
    pub fn step(unit: TimeUnit, step: i32) -> Result<Self, ConstraintError> {
        if step < 1 || step > unit.upper_bound() {
            return Err(ConstraintError::out_of_bounds(unit, step));
        }
        Ok(Self {
            unit,
            kind: ConstraintKind::Step(step),
        })
    }

    /// Build a set constraint from values already known to be in bounds.
    pub(crate) fn trusted_set(unit: TimeUnit, values: &[i32]) -> Self {
        debug_assert!(values.iter().all(|v| unit.contains(*v)));
        Self {
            unit,
            kind: ConstraintKind::Set(values.iter().copied().collect()),
        }
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    pub fn lowest_possible_value(&self) -> i32 {
        match &self.kind {
            ConstraintKind::Set(values) => values.first().copied().unwrap_or(self.unit.lower_bound()),
            ConstraintKind::Range { lower, .. } => *lower,
            ConstraintKind::Step(step) => first_multiple_at_or_above(self.unit.lower_bound(), *step),
        }
    }

    pub fn highest_possible_value(&self) -> i32 {
        match &self.kind {
            ConstraintKind::Set(values) => values.last().copied().unwrap_or(self.unit.upper_bound()),
            ConstraintKind::Range { upper, .. } => *upper,
            ConstraintKind::Step(step) => self.unit.upper_bound().div_euclid(*step) * step,
        }
    }

    pub fn evaluate(&self, value: i32) -> ConstraintOutcome {
        let pass = match &self.kind {
            ConstraintKind::Set(values) => values.contains(&value),
            ConstraintKind::Range { lower, upper } => value >= *lower && value <= *upper,
            ConstraintKind::Step(step) => value.rem_euclid(*step) == 0,
        };
        if pass {
            ConstraintOutcome::Pass
        } else {
            ConstraintOutcome::Fail
        }
    }

    /// Evaluate against a constraint that may be absent.
    pub fn evaluate_optional(constraint: Option<&Self>, value: i32) -> ConstraintOutcome {
        constraint.map_or(ConstraintOutcome::NoConstraint, |c| c.evaluate(value))
    }

    /// Smallest allowed value strictly greater than `current`, wrapping to
    /// [`lowest_possible_value`](Self::lowest_possible_value) when none exists.
    ///
    /// Year steps are not capped by the calendar bound; the resolver's
    /// horizon check stops them instead.
    pub fn next_valid_value(&self, current: i32) -> i32 {
        match &self.kind {
            ConstraintKind::Set(values) => values
                .range(current.saturating_add(1)..)
                .next()
                .copied()
                .unwrap_or_else(|| self.lowest_possible_value()),
            ConstraintKind::Range { lower, upper } => {
                if current < *lower {
                    *lower
                } else if current < *upper {
                    current + 1
                } else {
                    *lower
                }
            }
            ConstraintKind::Step(step) => {
                let next = first_multiple_at_or_above(current.saturating_add(1), *step)
                    .max(self.lowest_possible_value());
                if self.unit == TimeUnit::Year || next <= self.unit.upper_bound() {
                    next
                } else {
                    self.lowest_possible_value()
                }
            }
        }
    }
}

fn first_multiple_at_or_above(value: i32, step: i32) -> i32 {
    let remainder = value.rem_euclid(step);
    if remainder == 0 {
        value
    } else {
        value + (step - remainder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_evaluation() {
        let c = TimeConstraint::set(TimeUnit::Hour, [3, 9, 17]).unwrap();
        assert_eq!(c.evaluate(9), ConstraintOutcome::Pass);
        assert_eq!(c.evaluate(10), ConstraintOutcome::Fail);
        assert_eq!(c.lowest_possible_value(), 3);
        assert_eq!(c.highest_possible_value(), 17);
    }

    #[test]
    fn test_range_evaluation() {
        let c = TimeConstraint::range(TimeUnit::DayOfWeek, 2, 6).unwrap();
        assert_eq!(c.evaluate(2), ConstraintOutcome::Pass);
        assert_eq!(c.evaluate(6), ConstraintOutcome::Pass);
        assert_eq!(c.evaluate(1), ConstraintOutcome::Fail);
        assert_eq!(c.evaluate(7), ConstraintOutcome::Fail);
    }

    #[test]
    fn test_step_evaluation_includes_zero() {
        let c = TimeConstraint::step(TimeUnit::Minute, 15).unwrap();
        assert_eq!(c.evaluate(0), ConstraintOutcome::Pass);
        assert_eq!(c.evaluate(45), ConstraintOutcome::Pass);
        assert_eq!(c.evaluate(50), ConstraintOutcome::Fail);
        assert_eq!(c.lowest_possible_value(), 0);
        assert_eq!(c.highest_possible_value(), 45);
    }

    #[test]
    fn test_step_lowest_respects_unit_lower_bound() {
        let c = TimeConstraint::step(TimeUnit::DayOfMonth, 10).unwrap();
        assert_eq!(c.lowest_possible_value(), 10);
        assert_eq!(c.highest_possible_value(), 30);
        assert_eq!(c.next_valid_value(30), 10);
    }

    #[test]
    fn test_out_of_bounds_construction() {
        assert!(matches!(
            TimeConstraint::exact(TimeUnit::Hour, 24),
            Err(ConstraintError::OutOfBounds { value: 24, .. })
        ));
        assert!(TimeConstraint::set(TimeUnit::Month, [0, 5]).is_err());
        assert!(TimeConstraint::range(TimeUnit::Second, 10, 60).is_err());
        assert!(TimeConstraint::step(TimeUnit::Minute, 0).is_err());
        assert!(TimeConstraint::step(TimeUnit::Minute, 60).is_err());
        assert!(TimeConstraint::exact(TimeUnit::Year, 1969).is_err());
    }

    #[test]
    fn test_empty_constraints_rejected() {
        assert_eq!(
            TimeConstraint::set(TimeUnit::Hour, Vec::new()),
            Err(ConstraintError::EmptyConstraint { unit: TimeUnit::Hour })
        );
        assert!(TimeConstraint::range(TimeUnit::Hour, 10, 5).is_err());
    }

    #[test]
    fn test_next_valid_value_wraps() {
        let set = TimeConstraint::set(TimeUnit::Minute, [5, 30]).unwrap();
        assert_eq!(set.next_valid_value(0), 5);
        assert_eq!(set.next_valid_value(5), 30);
        assert_eq!(set.next_valid_value(30), 5);

        let range = TimeConstraint::range(TimeUnit::Hour, 9, 17).unwrap();
        assert_eq!(range.next_valid_value(3), 9);
        assert_eq!(range.next_valid_value(9), 10);
        assert_eq!(range.next_valid_value(17), 9);
        assert_eq!(range.next_valid_value(20), 9);

        let step = TimeConstraint::step(TimeUnit::Second, 20).unwrap();
        assert_eq!(step.next_valid_value(1), 20);
        assert_eq!(step.next_valid_value(40), 0);
    }

    #[test]
    fn test_year_step_is_unbounded() {
        let c = TimeConstraint::step(TimeUnit::Year, 1000).unwrap();
        assert_eq!(c.lowest_possible_value(), 2000);
        assert_eq!(c.next_valid_value(2999), 3000);
        assert_eq!(c.next_valid_value(3000), 4000);
    }

    #[test]
    fn test_next_valid_value_is_monotonic_or_wraps() {
        let constraints = [
            TimeConstraint::set(TimeUnit::Hour, [1, 7, 13, 22]).unwrap(),
            TimeConstraint::range(TimeUnit::Hour, 4, 18).unwrap(),
            TimeConstraint::step(TimeUnit::Hour, 5).unwrap(),
        ];
        for c in &constraints {
            for v in 0..=23 {
                let next = c.next_valid_value(v);
                assert!(
                    next > v || next == c.lowest_possible_value(),
                    "{:?} from {} gave {}",
                    c,
                    v,
                    next
                );
                assert_eq!(c.evaluate(next), ConstraintOutcome::Pass);
            }
        }
    }

    #[test]
    fn test_evaluate_optional() {
        assert_eq!(
            TimeConstraint::evaluate_optional(None, 4),
            ConstraintOutcome::NoConstraint
        );
    }
}
