//! Compiled validation rules.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::classify::ConstraintCategory;
use crate::model::{ConstraintKey, ConstraintSet, ConstraintValue, Severity};

/// The constraint carried by a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleConstraint {
    /// A single constraint key with its value.
    Single {
        key: ConstraintKey,
        value: ConstraintValue,
    },
    /// Several keys evaluated together, such as a whole property or `pattern` with its `flags`.
    Grouped(ConstraintSet),
}

impl RuleConstraint {
    /// Normalizes the constraint into a map keyed by constraint key.
    pub fn constraints(&self) -> ConstraintSet {
        match self {
            Self::Single { key, value } => ConstraintSet::new().with(*key, value.clone()),
            Self::Grouped(set) => set.clone(),
        }
    }
}

/// A compiled, addressable rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    /// Unique within a [`CompiledValidation`].
    pub rule_id: String,
    pub target_class: String,
    pub property_path: String,
    /// Primary category over every constraint of the property.
    pub constraint_type: ConstraintCategory,
    pub constraint: RuleConstraint,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Counts describing the compiled shapes graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationMetadata {
    pub shacl_triples: usize,
    pub node_shapes: usize,
    pub property_shapes: usize,
    /// Categories of every compiled rule.
    pub constraint_types: Vec<ConstraintCategory>,
}

/// The compiled rule set of a shapes graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledValidation {
    /// Rules grouped by target class, each list in emission order.
    pub target_classes: BTreeMap<String, Vec<ValidationRule>>,
    /// Number of constraints extracted from active shapes, not the number of rules.
    pub constraint_count: usize,
    /// Number of rules per severity.
    pub severity_levels: BTreeMap<Severity, usize>,
    pub metadata: CompilationMetadata,
}

impl CompiledValidation {
    /// Every rule, grouped by target class in class order.
    pub fn rules(&self) -> Vec<ValidationRule> {
        self.target_classes.values().flatten().cloned().collect()
    }

    /// Total number of rules.
    pub fn rule_count(&self) -> usize {
        self.target_classes.values().map(Vec::len).sum()
    }

    /// Looks a rule up by id.
    pub fn rule(&self, rule_id: &str) -> Option<&ValidationRule> {
        self.target_classes
            .values()
            .flatten()
            .find(|rule| rule.rule_id == rule_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_constraint_normalizes_to_set() {
        let constraint = RuleConstraint::Single {
            key: ConstraintKey::MinLength,
            value: ConstraintValue::Integer(10),
        };
        let set = constraint.constraints();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(ConstraintKey::MinLength), Some(&ConstraintValue::Integer(10)));
    }

    #[test]
    fn test_rule_serializes_with_snake_case_categories() {
        let rule = ValidationRule {
            rule_id: "UserInput_hasText_min_count".into(),
            target_class: "UserInput".into(),
            property_path: "hasText".into(),
            constraint_type: ConstraintCategory::Cardinality,
            constraint: RuleConstraint::Single {
                key: ConstraintKey::MinCount,
                value: ConstraintValue::Integer(1),
            },
            severity: Severity::Violation,
            message: "Property 'hasText' is required".into(),
            metadata: BTreeMap::new(),
        };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["constraint_type"], "cardinality");
        assert_eq!(json["constraint"]["key"], "min_count");
        assert_eq!(json["constraint"]["value"], 1);
        assert_eq!(json["severity"], "Violation");
    }
}
