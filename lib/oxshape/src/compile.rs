//! Rule compilation.
//!
//! Two flavors share the extraction and classification steps:
//! - [`ExtendedRuleCompiler`] emits one rule per constraint key (or per property
//!   with [`RuleGranularity::PerProperty`]) with a message per key.
//! - [`LegacyRuleCompiler`] emits one rule per property with a generic message.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::classify::{ConstraintCategory, resolve_primary_type};
use crate::extract::ExtractedShapes;
use crate::model::{
    ConstraintKey, ConstraintSet, ConstraintValue, NodeShapeRecord, PropertyShapeRecord, Severity,
    local_name,
};
use crate::rule::{CompilationMetadata, CompiledValidation, RuleConstraint, ValidationRule};

/// Which rule compiler to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompilerFlavor {
    #[default]
    Extended,
    Legacy,
}

impl CompilerFlavor {
    /// Builds the compiler of this flavor.
    pub fn compiler(self, granularity: RuleGranularity) -> Box<dyn RuleCompiler + Send + Sync> {
        match self {
            Self::Extended => Box::new(ExtendedRuleCompiler::new(granularity)),
            Self::Legacy => Box::new(LegacyRuleCompiler),
        }
    }
}

/// How many rules the extended compiler emits for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleGranularity {
    /// One rule per constraint key.
    #[default]
    PerConstraint,
    /// One rule per property, carrying every key.
    PerProperty,
}

/// Turns extracted shapes into validation rules.
pub trait RuleCompiler {
    /// Name recorded in the metadata of every emitted rule.
    fn name(&self) -> &'static str;

    /// Emits the rules of one property of an active node shape.
    fn property_rules(&self, shape: &ShapeContext<'_>, out: &mut Vec<ValidationRule>);

    /// Compiles the rules of every active node shape, with unique rule ids.
    fn compile_rules(&self, node_shapes: &[NodeShapeRecord]) -> Vec<ValidationRule> {
        let mut rules = Vec::new();
        for shape in node_shapes.iter().filter(|shape| !shape.deactivated) {
            let target_class = shape
                .target_class
                .as_deref()
                .map_or("Unknown", local_name);
            for property in &shape.properties {
                let Some(path) = property.path.as_deref() else {
                    debug!(shape = %property.shape_id, "skipping property shape without a path");
                    continue;
                };
                let context = ShapeContext {
                    node: shape,
                    property,
                    target_class,
                    property_path: local_name(path),
                    compiler: self.name(),
                };
                self.property_rules(&context, &mut rules);
            }
        }
        make_ids_unique(&mut rules);
        rules
    }

    /// Compiles a whole extraction into a [`CompiledValidation`].
    fn compile(&self, shapes: &ExtractedShapes) -> CompiledValidation {
        let rules = self.compile_rules(&shapes.node_shapes);
        let active = shapes.node_shapes.iter().filter(|shape| !shape.deactivated);
        let constraint_count = active
            .flat_map(|shape| &shape.properties)
            .map(|property| property.constraints.len())
            .sum();

        let mut severity_levels = BTreeMap::new();
        let mut constraint_types = Vec::new();
        let mut target_classes = BTreeMap::<String, Vec<ValidationRule>>::new();
        for rule in rules {
            *severity_levels.entry(rule.severity).or_insert(0) += 1;
            if !constraint_types.contains(&rule.constraint_type) {
                constraint_types.push(rule.constraint_type);
            }
            target_classes
                .entry(rule.target_class.clone())
                .or_default()
                .push(rule);
        }
        constraint_types.sort();

        let compiled = CompiledValidation {
            target_classes,
            constraint_count,
            severity_levels,
            metadata: CompilationMetadata {
                shacl_triples: shapes.triple_count,
                node_shapes: shapes.node_shapes.len(),
                property_shapes: shapes.property_shapes.len(),
                constraint_types,
            },
        };
        debug!(
            compiler = self.name(),
            rules = compiled.rule_count(),
            constraints = compiled.constraint_count,
            "compiled validation rules"
        );
        compiled
    }
}

/// A property being compiled, with its resolved names.
#[derive(Debug, Clone, Copy)]
pub struct ShapeContext<'a> {
    pub node: &'a NodeShapeRecord,
    pub property: &'a PropertyShapeRecord,
    /// Local name of the target class, `Unknown` when the shape has none.
    pub target_class: &'a str,
    /// Local name of the property path.
    pub property_path: &'a str,
    compiler: &'static str,
}

impl ShapeContext<'_> {
    /// A property shape's own non-violation severity wins over its node shape's.
    pub fn severity(&self) -> Severity {
        match self.property.severity {
            Some(severity) if severity != Severity::Violation => severity,
            _ => self.node.severity,
        }
    }

    pub fn primary_type(&self) -> ConstraintCategory {
        resolve_primary_type(self.property.constraints.keys())
    }

    /// Applies the `sh:message` override and the severity prefix to a generated message.
    fn message(&self, generated: String) -> String {
        let message = self
            .property
            .message
            .as_ref()
            .or(self.node.message.as_ref())
            .cloned()
            .unwrap_or(generated);
        format!("{}{message}", self.severity().message_prefix())
    }

    fn rule(&self, rule_id: String, constraint: RuleConstraint, message: String) -> ValidationRule {
        let mut metadata = BTreeMap::from([
            ("compiler".to_owned(), self.compiler.to_owned()),
            ("shape_id".to_owned(), self.node.shape_id.clone()),
            ("property_shape_id".to_owned(), self.property.shape_id.clone()),
        ]);
        if let Some(name) = self.property.name.as_ref().or(self.node.name.as_ref()) {
            metadata.insert("name".to_owned(), name.clone());
        }
        ValidationRule {
            rule_id,
            target_class: self.target_class.to_owned(),
            property_path: self.property_path.to_owned(),
            constraint_type: self.primary_type(),
            constraint,
            severity: self.severity(),
            message: self.message(message),
            metadata,
        }
    }
}

/// Compiler with per-key, schema driven messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtendedRuleCompiler {
    granularity: RuleGranularity,
}

impl ExtendedRuleCompiler {
    pub fn new(granularity: RuleGranularity) -> Self {
        Self { granularity }
    }
}

impl RuleCompiler for ExtendedRuleCompiler {
    fn name(&self) -> &'static str {
        "extended"
    }

    fn property_rules(&self, shape: &ShapeContext<'_>, out: &mut Vec<ValidationRule>) {
        let constraints = &shape.property.constraints;
        match self.granularity {
            RuleGranularity::PerConstraint => {
                for (key, value) in constraints {
                    if key.is_modifier() {
                        continue;
                    }
                    let constraint = match constraints.get(ConstraintKey::Flags) {
                        Some(flags) if *key == ConstraintKey::Pattern => RuleConstraint::Grouped(
                            ConstraintSet::new()
                                .with(ConstraintKey::Pattern, value.clone())
                                .with(ConstraintKey::Flags, flags.clone()),
                        ),
                        _ => RuleConstraint::Single {
                            key: *key,
                            value: value.clone(),
                        },
                    };
                    let mut rule = shape.rule(
                        format!("{}_{}_{key}", shape.target_class, shape.property_path),
                        constraint,
                        key_message(*key, shape.property_path, value),
                    );
                    rule.metadata
                        .insert("constraint_key".to_owned(), key.as_str().to_owned());
                    out.push(rule);
                }
            }
            RuleGranularity::PerProperty => {
                let messages: Vec<String> = constraints
                    .iter()
                    .filter(|(key, _)| !key.is_modifier())
                    .map(|(key, value)| key_message(*key, shape.property_path, value))
                    .collect();
                if messages.is_empty() {
                    return;
                }
                out.push(shape.rule(
                    format!(
                        "{}_{}_{}",
                        shape.target_class,
                        shape.property_path,
                        shape.primary_type()
                    ),
                    RuleConstraint::Grouped(constraints.clone()),
                    messages.join("; "),
                ));
            }
        }
    }
}

/// Compiler with one rule per property and a generic message per category.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyRuleCompiler;

impl RuleCompiler for LegacyRuleCompiler {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn property_rules(&self, shape: &ShapeContext<'_>, out: &mut Vec<ValidationRule>) {
        let constraints = &shape.property.constraints;
        if constraints.keys().all(ConstraintKey::is_modifier) {
            return;
        }
        let path = shape.property_path;
        let message = match shape.primary_type() {
            ConstraintCategory::Cardinality => format!("Property '{path}' has invalid cardinality"),
            ConstraintCategory::Datatype => format!("Property '{path}' has an invalid datatype"),
            ConstraintCategory::String => format!("Property '{path}' has an invalid value"),
            ConstraintCategory::Range => format!("Property '{path}' is out of range"),
            other => format!("Property '{path}' failed {other} validation"),
        };
        out.push(shape.rule(
            format!("{}_{path}", shape.target_class),
            RuleConstraint::Grouped(constraints.clone()),
            message,
        ));
    }
}

fn key_message(key: ConstraintKey, path: &str, value: &ConstraintValue) -> String {
    match key {
        ConstraintKey::MinCount => format!("Property '{path}' requires at least {value} value(s)"),
        ConstraintKey::MaxCount => format!("Property '{path}' allows at most {value} value(s)"),
        ConstraintKey::QualifiedMinCount => {
            format!("Property '{path}' requires at least {value} qualified value(s)")
        }
        ConstraintKey::QualifiedMaxCount => {
            format!("Property '{path}' allows at most {value} qualified value(s)")
        }
        ConstraintKey::Datatype => format!(
            "Property '{path}' must have datatype {}",
            local_name(&value.to_string())
        ),
        ConstraintKey::NodeKind => {
            format!("Property '{path}' must be a {}", local_name(&value.to_string()))
        }
        ConstraintKey::Class => format!(
            "Property '{path}' must be an instance of {}",
            local_name(&value.to_string())
        ),
        ConstraintKey::MinLength => {
            format!("Property '{path}' must be at least {value} characters long")
        }
        ConstraintKey::MaxLength => {
            format!("Property '{path}' must be at most {value} characters long")
        }
        ConstraintKey::Pattern => format!("Property '{path}' must match pattern '{value}'"),
        ConstraintKey::LanguageIn => {
            format!("Property '{path}' must use one of the languages {value}")
        }
        ConstraintKey::UniqueLang => format!("Property '{path}' must not repeat a language tag"),
        ConstraintKey::HasValue => format!("Property '{path}' must have value '{value}'"),
        ConstraintKey::In => format!("Property '{path}' must be one of {value}"),
        ConstraintKey::MinInclusive => format!("Property '{path}' must be at least {value}"),
        ConstraintKey::MaxInclusive => format!("Property '{path}' must be at most {value}"),
        ConstraintKey::MinExclusive => format!("Property '{path}' must be greater than {value}"),
        ConstraintKey::MaxExclusive => format!("Property '{path}' must be less than {value}"),
        _ => format!("Property '{path}' violates {key} constraint"),
    }
}

/// Suffixes colliding rule ids with `_2`, `_3`, ... in emission order.
fn make_ids_unique(rules: &mut [ValidationRule]) {
    let mut seen = FxHashSet::default();
    for rule in rules {
        if !seen.insert(rule.rule_id.clone()) {
            let mut suffix = 2;
            let unique = loop {
                let candidate = format!("{}_{suffix}", rule.rule_id);
                if !seen.contains(&candidate) {
                    break candidate;
                }
                suffix += 1;
            };
            debug!(rule_id = %rule.rule_id, %unique, "renamed colliding rule id");
            seen.insert(unique.clone());
            rule.rule_id = unique;
        }
    }
}
