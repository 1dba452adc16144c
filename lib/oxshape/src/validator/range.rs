use serde_json::{Value, json};

use super::{Evaluation, EvaluationContext, Validator, json_type, present, value_nodes};
use crate::model::{ConstraintKey, ConstraintSet};

/// Checks numeric bounds. Every bound is checked, a value may fail several at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeValidator;

impl RangeValidator {
    fn check_number(number: f64, constraints: &ConstraintSet, evaluation: &mut Evaluation) {
        for (key, bound) in constraints {
            let Some(bound) = bound.as_f64() else {
                continue;
            };
            let ok = match key {
                ConstraintKey::MinInclusive => number >= bound,
                ConstraintKey::MaxInclusive => number <= bound,
                ConstraintKey::MinExclusive => number > bound,
                ConstraintKey::MaxExclusive => number < bound,
                _ => true,
            };
            if !ok {
                evaluation.violation(*key, bound, number);
            }
        }
    }
}

impl Validator for RangeValidator {
    fn name(&self) -> &str {
        "range"
    }

    fn capabilities(&self) -> &[ConstraintKey] {
        &[
            ConstraintKey::MinInclusive,
            ConstraintKey::MaxInclusive,
            ConstraintKey::MinExclusive,
            ConstraintKey::MaxExclusive,
        ]
    }

    fn evaluate(
        &self,
        value: Option<&Value>,
        constraints: &ConstraintSet,
        _: &EvaluationContext<'_>,
    ) -> Evaluation {
        let mut evaluation = Evaluation::pass();
        let Some(value) = present(value) else {
            return evaluation;
        };
        for node in value_nodes(value) {
            match node.as_f64() {
                Some(number) => Self::check_number(number, constraints, &mut evaluation),
                None => evaluation.fail(
                    "type_violation",
                    json!({ "expected": "number", "actual": json_type(node) }),
                ),
            }
        }
        evaluation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::rule_context;

    fn check(constraints: &ConstraintSet, value: &Value) -> Evaluation {
        rule_context(|context| RangeValidator.evaluate(Some(value), constraints, context))
    }

    #[test]
    fn test_inclusive_bounds_accept_equality() {
        let constraints = ConstraintSet::new()
            .with(ConstraintKey::MinInclusive, 0.0)
            .with(ConstraintKey::MaxInclusive, 1.0);
        assert!(check(&constraints, &json!(0.0)).valid);
        assert!(check(&constraints, &json!(1.0)).valid);
        assert!(check(&constraints, &json!(0.85)).valid);
        assert!(!check(&constraints, &json!(1.5)).valid);
    }

    #[test]
    fn test_exclusive_bounds_reject_equality() {
        let constraints = ConstraintSet::new()
            .with(ConstraintKey::MinExclusive, 0.0)
            .with(ConstraintKey::MaxExclusive, 1.0);
        assert!(!check(&constraints, &json!(0)).valid);
        assert!(!check(&constraints, &json!(1)).valid);
        assert!(check(&constraints, &json!(0.5)).valid);
    }

    #[test]
    fn test_all_violations_are_collected() {
        let constraints = ConstraintSet::new()
            .with(ConstraintKey::MaxInclusive, 1.0)
            .with(ConstraintKey::MaxExclusive, 2.0);
        let evaluation = check(&constraints, &json!(5));
        assert!(!evaluation.valid);
        assert!(evaluation.details.contains_key("max_inclusive_violation"));
        assert!(evaluation.details.contains_key("max_exclusive_violation"));
    }

    #[test]
    fn test_every_out_of_range_item_is_reported() {
        let constraints = ConstraintSet::new().with(ConstraintKey::MaxInclusive, 1.0);
        let evaluation = check(&constraints, &json!([0.5, 5, 7]));
        assert!(!evaluation.valid);
        let reported = evaluation.details["max_inclusive_violation"]
            .as_array()
            .unwrap();
        assert_eq!(reported.len(), 2);
        assert_eq!(reported[0]["actual"], 5.0);
        assert_eq!(reported[1]["actual"], 7.0);
    }

    #[test]
    fn test_non_numeric_fails() {
        let constraints = ConstraintSet::new().with(ConstraintKey::MinInclusive, 0.0);
        let evaluation = check(&constraints, &json!("high"));
        assert_eq!(evaluation.details["type_violation"]["actual"], "string");
    }
}
