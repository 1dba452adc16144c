use serde_json::Value;

use super::{Evaluation, EvaluationContext, Validator};
use crate::model::{ConstraintKey, ConstraintSet};

/// Checks the number of values of a property.
///
/// An array counts its items, `null` or a missing entry counts 0, anything else counts 1.
/// Qualified counts are checked against every value since the data carries no shapes
/// to qualify them with.
#[derive(Debug, Clone, Copy, Default)]
pub struct CardinalityValidator;

impl CardinalityValidator {
    pub fn count(value: Option<&Value>) -> usize {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Array(items)) => items.len(),
            Some(_) => 1,
        }
    }
}

impl Validator for CardinalityValidator {
    fn name(&self) -> &str {
        "cardinality"
    }

    fn capabilities(&self) -> &[ConstraintKey] {
        &[
            ConstraintKey::MinCount,
            ConstraintKey::MaxCount,
            ConstraintKey::QualifiedMinCount,
            ConstraintKey::QualifiedMaxCount,
        ]
    }

    fn evaluate(
        &self,
        value: Option<&Value>,
        constraints: &ConstraintSet,
        _: &EvaluationContext<'_>,
    ) -> Evaluation {
        let actual = Self::count(value);
        let mut evaluation = Evaluation::pass();
        for (key, bound) in constraints {
            let Some(bound) = bound.as_count() else {
                continue;
            };
            let failed = match key {
                ConstraintKey::MinCount | ConstraintKey::QualifiedMinCount => actual < bound,
                ConstraintKey::MaxCount | ConstraintKey::QualifiedMaxCount => actual > bound,
                _ => false,
            };
            if failed {
                evaluation.violation(*key, bound, actual);
            }
        }
        evaluation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::rule_context;
    use serde_json::json;

    fn check(value: Option<Value>, min: Option<i64>, max: Option<i64>) -> bool {
        let mut constraints = ConstraintSet::new();
        if let Some(min) = min {
            constraints.insert(ConstraintKey::MinCount, min);
        }
        if let Some(max) = max {
            constraints.insert(ConstraintKey::MaxCount, max);
        }
        rule_context(|context| {
            CardinalityValidator
                .evaluate(value.as_ref(), &constraints, context)
                .valid
        })
    }

    #[test]
    fn test_count() {
        assert_eq!(CardinalityValidator::count(None), 0);
        assert_eq!(CardinalityValidator::count(Some(&Value::Null)), 0);
        assert_eq!(CardinalityValidator::count(Some(&json!("a"))), 1);
        assert_eq!(CardinalityValidator::count(Some(&json!(["a", "b", "c"]))), 3);
        assert_eq!(CardinalityValidator::count(Some(&json!({ "k": 1 }))), 1);
    }

    #[test]
    fn test_fails_iff_count_out_of_bounds() {
        let values = [None, Some(json!("x")), Some(json!([1, 2])), Some(json!([1, 2, 3]))];
        for value in values {
            let count = i64::try_from(CardinalityValidator::count(value.as_ref())).unwrap();
            for min in 0..4 {
                for max in 0..4 {
                    let expected = count >= min && count <= max;
                    assert_eq!(check(value.clone(), Some(min), Some(max)), expected);
                }
            }
        }
    }

    #[test]
    fn test_violation_detail() {
        let constraints = ConstraintSet::new().with(ConstraintKey::MinCount, 1);
        let evaluation = rule_context(|context| {
            CardinalityValidator.evaluate(None, &constraints, context)
        });
        assert_eq!(
            evaluation.details["min_count_violation"],
            json!({ "expected": 1, "actual": 0 })
        );
    }
}
