use serde_json::Value;

use super::{
    CardinalityValidator, DatatypeValidator, Evaluation, EvaluationContext, RangeValidator,
    StringValidator, Validator,
};
use crate::model::{ConstraintKey, ConstraintSet};

/// The inline checks used when no registered validator claims a constraint.
///
/// Cardinality, datatype, string length and range checks run in that order, each
/// one attempted whatever the previous outcome. Other keys are ignored and pass.
#[derive(Debug, Default)]
pub struct LegacyValidatorBank {
    string: StringValidator,
}

impl LegacyValidatorBank {
    fn checks(&self) -> [(&'static [ConstraintKey], &dyn Validator); 4] {
        [
            (
                &[ConstraintKey::MinCount, ConstraintKey::MaxCount],
                &CardinalityValidator,
            ),
            (&[ConstraintKey::Datatype], &DatatypeValidator),
            (
                &[ConstraintKey::MinLength, ConstraintKey::MaxLength],
                &self.string,
            ),
            (
                &[
                    ConstraintKey::MinInclusive,
                    ConstraintKey::MaxInclusive,
                    ConstraintKey::MinExclusive,
                    ConstraintKey::MaxExclusive,
                ],
                &RangeValidator,
            ),
        ]
    }
}

impl Validator for LegacyValidatorBank {
    fn name(&self) -> &str {
        "legacy"
    }

    fn capabilities(&self) -> &[ConstraintKey] {
        &[
            ConstraintKey::MinCount,
            ConstraintKey::MaxCount,
            ConstraintKey::Datatype,
            ConstraintKey::MinLength,
            ConstraintKey::MaxLength,
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
        context: &EvaluationContext<'_>,
    ) -> Evaluation {
        let mut evaluation = Evaluation::pass();
        for (keys, check) in self.checks() {
            let subset: ConstraintSet = constraints
                .iter()
                .filter(|(key, _)| keys.contains(*key))
                .map(|(key, value)| (*key, value.clone()))
                .collect();
            if !subset.is_empty() {
                evaluation.merge(check.evaluate(value, &subset, context));
            }
        }
        evaluation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::rule_context;
    use oxrdf::vocab::xsd;
    use serde_json::json;

    #[test]
    fn test_every_check_runs() {
        let constraints = ConstraintSet::new()
            .with(ConstraintKey::MaxCount, 1)
            .with(ConstraintKey::Datatype, xsd::STRING.as_str())
            .with(ConstraintKey::MaxLength, 2);
        let evaluation = rule_context(|context| {
            LegacyValidatorBank::default().evaluate(
                Some(&json!(["abc", 4])),
                &constraints,
                context,
            )
        });
        assert!(!evaluation.valid);
        assert!(evaluation.details.contains_key("max_count_violation"));
        assert!(evaluation.details.contains_key("datatype_violation"));
        assert!(evaluation.details.contains_key("max_length_violation"));
    }

    #[test]
    fn test_unhandled_keys_pass() {
        let constraints = ConstraintSet::new()
            .with(ConstraintKey::Pattern, "^never$")
            .with(ConstraintKey::Equals, "http://example.org/other");
        let evaluation = rule_context(|context| {
            LegacyValidatorBank::default().evaluate(Some(&json!("text")), &constraints, context)
        });
        assert!(evaluation.valid);
        assert!(evaluation.details.is_empty());
    }
}
