//! Signature definitions and the executable specification they are linked into.

use oxshape::{CompiledValidation, ValidationRule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named input or output of a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureField {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SignatureField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// The declaration of a task run by a [`SignatureRunner`](crate::SignatureRunner).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignatureDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default)]
    pub inputs: Vec<SignatureField>,
    #[serde(default)]
    pub outputs: Vec<SignatureField>,
}

impl SignatureDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_input(mut self, field: impl Into<String>) -> Self {
        self.inputs.push(SignatureField::new(field));
        self
    }

    #[must_use]
    pub fn with_output(mut self, field: impl Into<String>) -> Self {
        self.outputs.push(SignatureField::new(field));
        self
    }
}

/// Signatures with the validation rules guarding their inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutableSpecification {
    pub signatures: Vec<SignatureDefinition>,
    pub validation: CompiledValidation,
    /// Rule ids per input field, per signature name.
    ///
    /// Every signature has an entry. Fields no rule applies to are left out.
    pub bindings: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl ExecutableSpecification {
    /// Every validation rule.
    pub fn rules(&self) -> Vec<ValidationRule> {
        self.validation.rules()
    }

    /// The rules bound to the inputs of a signature.
    pub fn rules_for(&self, signature: &str) -> Vec<&ValidationRule> {
        self.bindings
            .get(signature)
            .into_iter()
            .flat_map(BTreeMap::values)
            .flatten()
            .filter_map(|rule_id| self.validation.rule(rule_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_from_json() {
        let definition: SignatureDefinition = serde_json::from_str(
            r#"{"name": "summarize", "inputs": [{"name": "hasText", "description": "Text"}]}"#,
        )
        .unwrap();
        assert_eq!(definition.name, "summarize");
        assert_eq!(definition.inputs[0].description.as_deref(), Some("Text"));
        assert!(definition.outputs.is_empty());
        assert_eq!(definition.instructions, None);
    }

    #[test]
    fn test_builder() {
        let definition = SignatureDefinition::new("classify")
            .with_input("hasText")
            .with_output("label");
        assert_eq!(definition.inputs, [SignatureField::new("hasText")]);
        assert_eq!(definition.outputs, [SignatureField::new("label")]);
    }
}
