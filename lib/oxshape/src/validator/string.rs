use regex::Regex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::{Mutex, PoisonError};

use super::{
    Evaluation, EvaluationContext, Validator, json_type, language_tag, lexical_form, present,
    render, value_nodes,
};
use crate::model::{ConstraintKey, ConstraintSet, ConstraintValue};

/// Checks string lengths, patterns, language tags and enumerations.
///
/// Patterns are searched, not anchored: `b` matches `abc`. Compiled patterns are
/// cached per validator.
#[derive(Debug, Default)]
pub struct StringValidator {
    regex_cache: Mutex<FxHashMap<String, Regex>>,
}

impl StringValidator {
    fn regex(&self, pattern: &str, flags: Option<&str>) -> Result<Regex, regex::Error> {
        let flags = flags.unwrap_or_default();
        let key = format!("{flags}/{pattern}");
        let mut cache = self
            .regex_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(regex) = cache.get(&key) {
            return Ok(regex.clone());
        }
        let inline: String = flags
            .chars()
            .filter(|flag| matches!(flag, 'i' | 'm' | 's' | 'x'))
            .collect();
        let regex = if inline.is_empty() {
            Regex::new(pattern)?
        } else {
            Regex::new(&format!("(?{inline}){pattern}"))?
        };
        cache.insert(key, regex.clone());
        Ok(regex)
    }

    fn check_node(&self, node: &Value, constraints: &ConstraintSet, evaluation: &mut Evaluation) {
        let needs_text = [
            ConstraintKey::MinLength,
            ConstraintKey::MaxLength,
            ConstraintKey::Pattern,
        ]
        .into_iter()
        .any(|key| constraints.contains(key));
        if !needs_text {
            return;
        }
        let Some(text) = lexical_form(node) else {
            evaluation.fail(
                "type_violation",
                serde_json::json!({ "expected": "string", "actual": json_type(node) }),
            );
            return;
        };

        let length = text.chars().count();
        if let Some(min) = constraints
            .get(ConstraintKey::MinLength)
            .and_then(ConstraintValue::as_count)
        {
            if length < min {
                evaluation.violation(ConstraintKey::MinLength, min, length);
            }
        }
        if let Some(max) = constraints
            .get(ConstraintKey::MaxLength)
            .and_then(ConstraintValue::as_count)
        {
            if length > max {
                evaluation.violation(ConstraintKey::MaxLength, max, length);
            }
        }

        if let Some(pattern) = constraints.get(ConstraintKey::Pattern) {
            let pattern = pattern.to_string();
            let flags = constraints
                .get(ConstraintKey::Flags)
                .map(ToString::to_string);
            match self.regex(&pattern, flags.as_deref()) {
                Ok(regex) => {
                    if !regex.is_match(text) {
                        evaluation.violation(ConstraintKey::Pattern, pattern, text);
                    }
                }
                Err(e) => evaluation.fail("pattern_error", e.to_string()),
            }
        }
    }
}

impl Validator for StringValidator {
    fn name(&self) -> &str {
        "string"
    }

    fn capabilities(&self) -> &[ConstraintKey] {
        &[
            ConstraintKey::MinLength,
            ConstraintKey::MaxLength,
            ConstraintKey::Pattern,
            ConstraintKey::Flags,
            ConstraintKey::LanguageIn,
            ConstraintKey::UniqueLang,
            ConstraintKey::HasValue,
            ConstraintKey::In,
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
        let nodes = value_nodes(value);
        for node in &nodes {
            self.check_node(node, constraints, &mut evaluation);
        }

        if let Some(ranges) = constraints.get(ConstraintKey::LanguageIn) {
            let ranges = ranges.as_list();
            if let Some(node) = nodes.iter().find(|node| {
                !language_tag(node).is_some_and(|tag| ranges.iter().any(|r| lang_matches(tag, r)))
            }) {
                evaluation.violation(
                    ConstraintKey::LanguageIn,
                    ranges.clone(),
                    language_tag(node).map_or(Value::Null, Value::from),
                );
            }
        }

        if constraints
            .get(ConstraintKey::UniqueLang)
            .and_then(ConstraintValue::as_bool)
            .unwrap_or(false)
        {
            let mut seen = Vec::new();
            let mut duplicates = Vec::new();
            for tag in nodes.iter().filter_map(|node| language_tag(node)) {
                let tag = tag.to_ascii_lowercase();
                if seen.contains(&tag) {
                    if !duplicates.contains(&tag) {
                        duplicates.push(tag);
                    }
                } else {
                    seen.push(tag);
                }
            }
            if !duplicates.is_empty() {
                evaluation.violation(ConstraintKey::UniqueLang, true, duplicates);
            }
        }

        if let Some(expected) = constraints.get(ConstraintKey::HasValue) {
            let expected = expected.to_string();
            if !nodes.iter().any(|node| render(node) == expected) {
                evaluation.violation(ConstraintKey::HasValue, expected, value.clone());
            }
        }

        if let Some(allowed) = constraints.get(ConstraintKey::In) {
            let allowed = allowed.as_list();
            if let Some(node) = nodes.iter().find(|node| !allowed.contains(&render(node))) {
                evaluation.violation(ConstraintKey::In, allowed.clone(), (*node).clone());
            }
        }
        evaluation
    }
}

/// Basic language range matching: `*`, exact tag, or tag prefix followed by `-`.
fn lang_matches(tag: &str, range: &str) -> bool {
    if range == "*" {
        return !tag.is_empty();
    }
    let tag = tag.to_ascii_lowercase();
    let range = range.to_ascii_lowercase();
    tag == range || tag.strip_prefix(&range).is_some_and(|rest| rest.starts_with('-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::rule_context;
    use serde_json::json;

    fn check(constraints: &ConstraintSet, value: &Value) -> Evaluation {
        let validator = StringValidator::default();
        rule_context(|context| validator.evaluate(Some(value), constraints, context))
    }

    #[test]
    fn test_length_bounds() {
        let constraints = ConstraintSet::new()
            .with(ConstraintKey::MinLength, 10)
            .with(ConstraintKey::MaxLength, 1000);
        let short = check(&constraints, &json!("short"));
        assert!(!short.valid);
        assert_eq!(
            short.details["min_length_violation"],
            json!({ "expected": 10, "actual": 5 })
        );
        assert!(check(&constraints, &json!("this text has enough length")).valid);
    }

    #[test]
    fn test_length_counts_characters() {
        let constraints = ConstraintSet::new().with(ConstraintKey::MaxLength, 3);
        assert!(check(&constraints, &json!("été")).valid);
    }

    #[test]
    fn test_non_string_fails() {
        let constraints = ConstraintSet::new().with(ConstraintKey::MinLength, 1);
        let evaluation = check(&constraints, &json!(42));
        assert!(!evaluation.valid);
        assert_eq!(evaluation.details["type_violation"]["actual"], "integer");
    }

    #[test]
    fn test_pattern_is_searched() {
        let constraints = ConstraintSet::new().with(ConstraintKey::Pattern, "b+");
        assert!(check(&constraints, &json!("abbc")).valid);
        assert!(!check(&constraints, &json!("ac")).valid);
    }

    #[test]
    fn test_pattern_flags() {
        let constraints = ConstraintSet::new()
            .with(ConstraintKey::Pattern, "^hello")
            .with(ConstraintKey::Flags, "i");
        assert!(check(&constraints, &json!("HELLO world")).valid);
    }

    #[test]
    fn test_invalid_pattern_is_a_failure_not_an_error() {
        let constraints = ConstraintSet::new().with(ConstraintKey::Pattern, "(unclosed");
        let evaluation = check(&constraints, &json!("text"));
        assert!(!evaluation.valid);
        assert!(evaluation.details.contains_key("pattern_error"));
    }

    #[test]
    fn test_regex_cache_is_reused() {
        let validator = StringValidator::default();
        validator.regex("a+", Some("i")).unwrap();
        validator.regex("a+", Some("i")).unwrap();
        validator.regex("a+", None).unwrap();
        assert_eq!(validator.regex_cache.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_language_in() {
        let constraints = ConstraintSet::new().with(
            ConstraintKey::LanguageIn,
            ConstraintValue::List(vec!["en".into(), "fr".into()]),
        );
        assert!(check(&constraints, &json!({ "@value": "hi", "@language": "en-GB" })).valid);
        assert!(!check(&constraints, &json!({ "@value": "hallo", "@language": "de" })).valid);
        assert!(!check(&constraints, &json!("untagged")).valid);
    }

    #[test]
    fn test_unique_lang() {
        let constraints = ConstraintSet::new().with(ConstraintKey::UniqueLang, true);
        let values = json!([
            { "@value": "hi", "@language": "en" },
            { "@value": "salut", "@language": "fr" },
            { "@value": "hello", "@language": "EN" }
        ]);
        let evaluation = check(&constraints, &values);
        assert!(!evaluation.valid);
        assert_eq!(evaluation.details["unique_lang_violation"]["actual"], json!(["en"]));
    }

    #[test]
    fn test_has_value_and_in() {
        let constraints = ConstraintSet::new().with(ConstraintKey::HasValue, "draft");
        assert!(check(&constraints, &json!(["final", "draft"])).valid);
        assert!(!check(&constraints, &json!("final")).valid);

        let constraints = ConstraintSet::new().with(
            ConstraintKey::In,
            ConstraintValue::List(vec!["low".into(), "high".into()]),
        );
        assert!(check(&constraints, &json!("low")).valid);
        assert!(!check(&constraints, &json!("medium")).valid);
    }
}
