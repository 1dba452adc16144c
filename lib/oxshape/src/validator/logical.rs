use serde_json::Value;

use super::{Evaluation, EvaluationContext, Validator};
use crate::model::{ConstraintKey, ConstraintSet};

/// Accepts `and`, `or`, `not`, `xone` and `node` constraints without evaluating them.
///
/// The referenced shapes are not resolved against JSON data, so every logical
/// constraint passes with a note in the details.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogicalValidator;

impl Validator for LogicalValidator {
    fn name(&self) -> &str {
        "logical"
    }

    fn capabilities(&self) -> &[ConstraintKey] {
        &[
            ConstraintKey::And,
            ConstraintKey::Or,
            ConstraintKey::Not,
            ConstraintKey::Xone,
            ConstraintKey::Node,
        ]
    }

    fn evaluate(
        &self,
        _: Option<&Value>,
        constraints: &ConstraintSet,
        _: &EvaluationContext<'_>,
    ) -> Evaluation {
        let keys: Vec<&str> = constraints.keys().map(ConstraintKey::as_str).collect();
        Evaluation::pass().with_detail(
            "note",
            format!(
                "logical constraints ({}) are not evaluated",
                keys.join(", ")
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConstraintValue;
    use crate::test_support::rule_context;
    use serde_json::json;

    #[test]
    fn test_always_valid_with_note() {
        let constraints = ConstraintSet::new().with(
            ConstraintKey::Or,
            ConstraintValue::List(vec!["ex:A".into(), "ex:B".into()]),
        );
        let evaluation = rule_context(|context| {
            LogicalValidator.evaluate(Some(&json!("anything")), &constraints, context)
        });
        assert!(evaluation.valid);
        assert_eq!(evaluation.details["note"], "logical constraints (or) are not evaluated");
    }
}
