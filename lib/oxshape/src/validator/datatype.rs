use oxrdf::vocab::{rdf, xsd};
use serde_json::Value;

use super::{Evaluation, EvaluationContext, Validator, json_type, present, value_nodes};
use crate::model::{ConstraintKey, ConstraintSet, local_name};
use crate::vocab::sh;

/// Checks JSON value types against `datatype`, `node_kind` and `class`.
///
/// Datatypes without a JSON counterpart are accepted. `class` can only be checked
/// on objects carrying an `@type` entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatatypeValidator;

impl Validator for DatatypeValidator {
    fn name(&self) -> &str {
        "datatype"
    }

    fn capabilities(&self) -> &[ConstraintKey] {
        &[
            ConstraintKey::Datatype,
            ConstraintKey::NodeKind,
            ConstraintKey::Class,
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
        for (key, expected) in constraints {
            let expected = expected.to_string();
            let check: fn(&str, &Value) -> bool = match key {
                ConstraintKey::Datatype => matches_datatype,
                ConstraintKey::NodeKind => matches_node_kind,
                ConstraintKey::Class => matches_class,
                _ => continue,
            };
            for mismatch in value_nodes(value)
                .into_iter()
                .filter(|node| !check(&expected, node))
            {
                evaluation.violation(*key, local_name(&expected), json_type(mismatch));
            }
        }
        evaluation
    }
}

fn matches_datatype(datatype: &str, value: &Value) -> bool {
    if datatype == xsd::STRING.as_str() {
        value.is_string()
    } else if datatype == rdf::LANG_STRING.as_str() {
        value.get("@language").is_some()
    } else if [
        xsd::INTEGER,
        xsd::INT,
        xsd::LONG,
        xsd::SHORT,
        xsd::NON_NEGATIVE_INTEGER,
        xsd::POSITIVE_INTEGER,
    ]
    .iter()
    .any(|t| t.as_str() == datatype)
    {
        value.is_i64() || value.is_u64()
    } else if [xsd::FLOAT, xsd::DOUBLE, xsd::DECIMAL]
        .iter()
        .any(|t| t.as_str() == datatype)
    {
        value.is_number()
    } else if datatype == xsd::BOOLEAN.as_str() {
        value.is_boolean()
    } else {
        true
    }
}

fn matches_node_kind(node_kind: &str, value: &Value) -> bool {
    let is_iri = value.as_str().is_some_and(|s| s.starts_with("http"));
    let is_literal = !value.is_object() && !value.is_array();
    if node_kind == sh::IRI.as_str() {
        is_iri
    } else if node_kind == sh::LITERAL.as_str() || node_kind == sh::IRI_OR_LITERAL.as_str() {
        is_literal
    } else {
        // Blank nodes have no JSON representation and unknown kinds cannot be checked
        true
    }
}

fn matches_class(class: &str, value: &Value) -> bool {
    let Some(types) = value.get("@type") else {
        return true;
    };
    value_nodes(types)
        .into_iter()
        .filter_map(Value::as_str)
        .any(|t| t == class || t == local_name(class))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::rule_context;
    use serde_json::json;

    fn check(key: ConstraintKey, expected: &str, value: &Value) -> Evaluation {
        let constraints = ConstraintSet::new().with(key, expected);
        rule_context(|context| DatatypeValidator.evaluate(Some(value), &constraints, context))
    }

    #[test]
    fn test_datatype_mapping() {
        let string = xsd::STRING.as_str();
        assert!(check(ConstraintKey::Datatype, string, &json!("text")).valid);
        assert!(!check(ConstraintKey::Datatype, string, &json!(3)).valid);
        let integer = xsd::INTEGER.as_str();
        assert!(check(ConstraintKey::Datatype, integer, &json!(3)).valid);
        assert!(!check(ConstraintKey::Datatype, integer, &json!(3.5)).valid);
        assert!(check(ConstraintKey::Datatype, xsd::DOUBLE.as_str(), &json!(3)).valid);
        assert!(check(ConstraintKey::Datatype, xsd::BOOLEAN.as_str(), &json!(false)).valid);
        assert!(check(ConstraintKey::Datatype, xsd::DATE_TIME.as_str(), &json!(1)).valid);
    }

    #[test]
    fn test_datatype_violation_detail() {
        let evaluation = check(ConstraintKey::Datatype, xsd::STRING.as_str(), &json!(["a", 2]));
        assert_eq!(
            evaluation.details["datatype_violation"],
            json!({ "expected": "string", "actual": "integer" })
        );
    }

    #[test]
    fn test_node_kind() {
        assert!(check(ConstraintKey::NodeKind, sh::IRI.as_str(), &json!("http://example.org/a")).valid);
        assert!(!check(ConstraintKey::NodeKind, sh::IRI.as_str(), &json!("example")).valid);
        assert!(check(ConstraintKey::NodeKind, sh::LITERAL.as_str(), &json!(12)).valid);
        assert!(!check(ConstraintKey::NodeKind, sh::LITERAL.as_str(), &json!({ "a": 1 })).valid);
        assert!(check(ConstraintKey::NodeKind, sh::BLANK_NODE.as_str(), &json!({ "a": 1 })).valid);
    }

    #[test]
    fn test_unknown_node_kind_passes() {
        assert!(check(ConstraintKey::NodeKind, "IRI", &json!("example")).valid);
        assert!(check(ConstraintKey::NodeKind, "IRI", &json!([1, { "a": 1 }])).valid);
    }

    #[test]
    fn test_every_mismatching_item_is_reported() {
        let evaluation = check(ConstraintKey::Datatype, xsd::STRING.as_str(), &json!([1, "a", true]));
        assert_eq!(
            evaluation.details["datatype_violation"],
            json!([
                { "expected": "string", "actual": "integer" },
                { "expected": "string", "actual": "boolean" }
            ])
        );
    }

    #[test]
    fn test_class_uses_type_entry() {
        let class = "http://example.org/Person";
        assert!(check(ConstraintKey::Class, class, &json!({ "@type": "Person" })).valid);
        assert!(!check(ConstraintKey::Class, class, &json!({ "@type": ["Robot"] })).valid);
        assert!(check(ConstraintKey::Class, class, &json!("untyped")).valid);
    }

    #[test]
    fn test_absent_value_passes() {
        let constraints = ConstraintSet::new().with(ConstraintKey::Datatype, xsd::STRING.as_str());
        let evaluation =
            rule_context(|context| DatatypeValidator.evaluate(None, &constraints, context));
        assert!(evaluation.valid);
    }
}
