use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::classify::ConstraintCategory;
use crate::model::{ConstraintSet, Severity};
use crate::rule::{RuleConstraint, ValidationRule};
use crate::validator::EvaluationContext;

pub(crate) fn rule_context<T>(f: impl FnOnce(&EvaluationContext<'_>) -> T) -> T {
    let rule = ValidationRule {
        rule_id: "Thing_value".to_owned(),
        target_class: "Thing".to_owned(),
        property_path: "value".to_owned(),
        constraint_type: ConstraintCategory::Unknown,
        constraint: RuleConstraint::Grouped(ConstraintSet::new()),
        severity: Severity::Violation,
        message: String::new(),
        metadata: BTreeMap::new(),
    };
    let data = Map::<String, Value>::new();
    f(&EvaluationContext {
        rule: &rule,
        data: &data,
    })
}
