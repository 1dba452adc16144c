//! Pluggable validators and their registry.
//!
//! A [`Validator`] evaluates the constraint keys it declares as capabilities
//! against one runtime JSON value. The [`ValidatorRegistry`] keeps validators in
//! registration order and dispatches each key to the first validator claiming it.

mod cardinality;
mod datatype;
mod legacy;
mod logical;
mod range;
mod string;

pub use cardinality::CardinalityValidator;
pub use datatype::DatatypeValidator;
pub use legacy::LegacyValidatorBank;
pub use logical::LogicalValidator;
pub use range::RangeValidator;
pub use string::StringValidator;

use serde::Serialize;
use serde_json::map::Entry;
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::model::{ConstraintKey, ConstraintSet};
use crate::rule::ValidationRule;

/// What a validator sees besides the value under test.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// The rule being evaluated.
    pub rule: &'a ValidationRule,
    /// The whole data map the value was resolved from.
    pub data: &'a Map<String, Value>,
}

/// Outcome of a validator call.
///
/// A detail reported more than once, by several value nodes or several validators,
/// holds an array of every reported value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub valid: bool,
    pub details: Map<String, Value>,
}

impl Evaluation {
    /// A passing evaluation without details.
    pub fn pass() -> Self {
        Self {
            valid: true,
            details: Map::new(),
        }
    }

    /// Records a failing check as `{key}_violation: {expected, actual}`.
    pub fn violation(
        &mut self,
        key: ConstraintKey,
        expected: impl Into<Value>,
        actual: impl Into<Value>,
    ) {
        self.fail(
            format!("{key}_violation"),
            json!({ "expected": expected.into(), "actual": actual.into() }),
        );
    }

    /// Marks the evaluation failed with an arbitrary detail.
    pub fn fail(&mut self, detail: impl Into<String>, value: impl Into<Value>) {
        self.valid = false;
        self.record(detail.into(), value.into());
    }

    /// Adds a detail without changing validity.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>, value: impl Into<Value>) -> Self {
        self.record(detail.into(), value.into());
        self
    }

    /// Combines two evaluations: failing if either fails, details of both kept.
    pub fn merge(&mut self, other: Self) {
        self.valid &= other.valid;
        for (detail, value) in other.details {
            self.record(detail, value);
        }
    }

    fn record(&mut self, detail: String, value: Value) {
        match self.details.entry(detail) {
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                let mut values = match existing.take() {
                    Value::Array(values) => values,
                    single => vec![single],
                };
                match value {
                    Value::Array(more) => values.extend(more),
                    single => values.push(single),
                }
                *existing = Value::Array(values);
            }
        }
    }
}

impl Default for Evaluation {
    fn default() -> Self {
        Self::pass()
    }
}

/// A pluggable constraint evaluator.
pub trait Validator: Send + Sync {
    /// Name reported in the `validator_usage` statistics.
    fn name(&self) -> &str;

    /// Constraint keys this validator evaluates.
    fn capabilities(&self) -> &[ConstraintKey];

    fn handles(&self, key: ConstraintKey) -> bool {
        self.capabilities().contains(&key)
    }

    /// Evaluates `constraints`, restricted to this validator's capabilities, against a value.
    ///
    /// `value` is `None` when the data has no entry for the rule's property.
    fn evaluate(
        &self,
        value: Option<&Value>,
        constraints: &ConstraintSet,
        context: &EvaluationContext<'_>,
    ) -> Evaluation;
}

/// Ordered list of validators with first-match dispatch.
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: Vec<Arc<dyn Validator>>,
}

impl ValidatorRegistry {
    /// A registry without any validator.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with the cardinality, datatype, string, range and logical validators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(CardinalityValidator));
        registry.register(Arc::new(DatatypeValidator));
        registry.register(Arc::new(StringValidator::default()));
        registry.register(Arc::new(RangeValidator));
        registry.register(Arc::new(LogicalValidator));
        registry
    }

    /// Appends a validator. Earlier validators keep precedence for shared capabilities.
    pub fn register(&mut self, validator: Arc<dyn Validator>) {
        self.validators.push(validator);
    }

    /// The first registered validator handling `key`, found by linear scan.
    pub fn dispatch(&self, key: ConstraintKey) -> Option<&Arc<dyn Validator>> {
        self.validators.iter().find(|validator| validator.handles(key))
    }

    pub fn validators(&self) -> impl Iterator<Item = &Arc<dyn Validator>> {
        self.validators.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.validators.iter().map(|v| v.name().to_owned()).collect()
    }

    /// Union of every capability set.
    pub fn constraint_types_supported(&self) -> BTreeSet<ConstraintKey> {
        self.validators
            .iter()
            .flat_map(|validator| validator.capabilities().iter().copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.validators.iter().map(|v| v.name()))
            .finish()
    }
}

/// The value nodes of a JSON value: array items, or the value itself.
pub(crate) fn value_nodes(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// The value, unless it is absent or null.
pub(crate) fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_null())
}

/// The string content of a plain or language-tagged (`{"@value", "@language"}`) string.
pub(crate) fn lexical_form(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(object) => object.get("@value").and_then(Value::as_str),
        _ => None,
    }
}

/// The language tag of a language-tagged string.
pub(crate) fn language_tag(value: &Value) -> Option<&str> {
    value.get("@language").and_then(Value::as_str)
}

/// A JSON value rendered the way constraint values are written.
pub(crate) fn render(value: &Value) -> String {
    match lexical_form(value) {
        Some(s) => s.to_owned(),
        None => value.to_string(),
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
