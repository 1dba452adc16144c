//! Normalized shape records produced by the extractor.
//!
//! This module defines:
//! - [`Severity`] - Result severity of a shape
//! - [`ConstraintKey`] - The fixed constraint vocabulary and its predicate mapping
//! - [`ConstraintValue`] and [`ConstraintSet`] - Typed constraint values keyed by constraint
//! - [`NodeShapeRecord`], [`PropertyShapeRecord`], [`ConstraintRecord`] - Extraction output

use oxrdf::NamedNodeRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

use crate::classify::{ConstraintCategory, categorize_key};
use crate::vocab::sh;

/// Severity level of a shape and of the results it produces.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Severity {
    /// Hard failure.
    #[default]
    Violation,
    /// Warning.
    Warning,
    /// Informative result.
    Info,
}

impl Severity {
    /// Returns the IRI for this severity level.
    pub fn iri(self) -> NamedNodeRef<'static> {
        match self {
            Self::Violation => sh::VIOLATION,
            Self::Warning => sh::WARNING,
            Self::Info => sh::INFO,
        }
    }

    /// Parses a severity from an IRI.
    pub fn from_iri(iri: NamedNodeRef<'_>) -> Option<Self> {
        if iri == sh::VIOLATION {
            Some(Self::Violation)
        } else if iri == sh::WARNING {
            Some(Self::Warning)
        } else if iri == sh::INFO {
            Some(Self::Info)
        } else {
            None
        }
    }

    /// Prefix injected in front of generated messages.
    pub fn message_prefix(self) -> &'static str {
        match self {
            Self::Violation => "",
            Self::Warning => "WARNING: ",
            Self::Info => "INFO: ",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Violation => f.write_str("Violation"),
            Self::Warning => f.write_str("Warning"),
            Self::Info => f.write_str("Info"),
        }
    }
}

/// A single constraint facet known to the extractor.
///
/// The declaration order is the table order: it drives the iteration order of
/// [`ConstraintSet`] and therefore the order in which rules are emitted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKey {
    MinCount,
    MaxCount,
    QualifiedMinCount,
    QualifiedMaxCount,
    Datatype,
    NodeKind,
    Class,
    MinLength,
    MaxLength,
    Pattern,
    Flags,
    LanguageIn,
    UniqueLang,
    HasValue,
    In,
    MinInclusive,
    MaxInclusive,
    MinExclusive,
    MaxExclusive,
    And,
    Or,
    Not,
    Xone,
    Node,
    Equals,
    Disjoint,
    LessThan,
    LessThanOrEquals,
    Sparql,
    Js,
    Python,
}

impl ConstraintKey {
    /// Every key, in table order.
    pub const ALL: [Self; 31] = [
        Self::MinCount,
        Self::MaxCount,
        Self::QualifiedMinCount,
        Self::QualifiedMaxCount,
        Self::Datatype,
        Self::NodeKind,
        Self::Class,
        Self::MinLength,
        Self::MaxLength,
        Self::Pattern,
        Self::Flags,
        Self::LanguageIn,
        Self::UniqueLang,
        Self::HasValue,
        Self::In,
        Self::MinInclusive,
        Self::MaxInclusive,
        Self::MinExclusive,
        Self::MaxExclusive,
        Self::And,
        Self::Or,
        Self::Not,
        Self::Xone,
        Self::Node,
        Self::Equals,
        Self::Disjoint,
        Self::LessThan,
        Self::LessThanOrEquals,
        Self::Sparql,
        Self::Js,
        Self::Python,
    ];

    /// The snake case name used in rule ids and details.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MinCount => "min_count",
            Self::MaxCount => "max_count",
            Self::QualifiedMinCount => "qualified_min_count",
            Self::QualifiedMaxCount => "qualified_max_count",
            Self::Datatype => "datatype",
            Self::NodeKind => "node_kind",
            Self::Class => "class",
            Self::MinLength => "min_length",
            Self::MaxLength => "max_length",
            Self::Pattern => "pattern",
            Self::Flags => "flags",
            Self::LanguageIn => "language_in",
            Self::UniqueLang => "unique_lang",
            Self::HasValue => "has_value",
            Self::In => "in",
            Self::MinInclusive => "min_inclusive",
            Self::MaxInclusive => "max_inclusive",
            Self::MinExclusive => "min_exclusive",
            Self::MaxExclusive => "max_exclusive",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Xone => "xone",
            Self::Node => "node",
            Self::Equals => "equals",
            Self::Disjoint => "disjoint",
            Self::LessThan => "less_than",
            Self::LessThanOrEquals => "less_than_or_equals",
            Self::Sparql => "sparql",
            Self::Js => "js",
            Self::Python => "python",
        }
    }

    /// The SHACL predicate carrying this constraint.
    pub fn predicate(self) -> NamedNodeRef<'static> {
        match self {
            Self::MinCount => sh::MIN_COUNT,
            Self::MaxCount => sh::MAX_COUNT,
            Self::QualifiedMinCount => sh::QUALIFIED_MIN_COUNT,
            Self::QualifiedMaxCount => sh::QUALIFIED_MAX_COUNT,
            Self::Datatype => sh::DATATYPE,
            Self::NodeKind => sh::NODE_KIND,
            Self::Class => sh::CLASS,
            Self::MinLength => sh::MIN_LENGTH,
            Self::MaxLength => sh::MAX_LENGTH,
            Self::Pattern => sh::PATTERN,
            Self::Flags => sh::FLAGS,
            Self::LanguageIn => sh::LANGUAGE_IN,
            Self::UniqueLang => sh::UNIQUE_LANG,
            Self::HasValue => sh::HAS_VALUE,
            Self::In => sh::IN,
            Self::MinInclusive => sh::MIN_INCLUSIVE,
            Self::MaxInclusive => sh::MAX_INCLUSIVE,
            Self::MinExclusive => sh::MIN_EXCLUSIVE,
            Self::MaxExclusive => sh::MAX_EXCLUSIVE,
            Self::And => sh::AND,
            Self::Or => sh::OR,
            Self::Not => sh::NOT,
            Self::Xone => sh::XONE,
            Self::Node => sh::NODE,
            Self::Equals => sh::EQUALS,
            Self::Disjoint => sh::DISJOINT,
            Self::LessThan => sh::LESS_THAN,
            Self::LessThanOrEquals => sh::LESS_THAN_OR_EQUALS,
            Self::Sparql => sh::SPARQL,
            Self::Js => sh::JS,
            Self::Python => sh::PYTHON,
        }
    }

    /// Looks a key up by its snake case name or by its SHACL local name (`minCount`).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| {
            key.as_str() == name
                || key
                    .predicate()
                    .as_str()
                    .strip_prefix(sh::NAMESPACE)
                    .is_some_and(|local| local == name)
        })
    }

    /// Looks a key up by its SHACL predicate.
    pub fn from_predicate(predicate: NamedNodeRef<'_>) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.predicate() == predicate)
    }

    /// The category this key belongs to.
    pub fn category(self) -> ConstraintCategory {
        categorize_key(self)
    }

    /// Keys that only modify another key and never stand alone as a rule.
    pub fn is_modifier(self) -> bool {
        matches!(self, Self::Flags)
    }
}

impl fmt::Display for ConstraintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed constraint value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintValue {
    /// Counts and lengths.
    Integer(i64),
    /// Numeric bounds.
    Decimal(f64),
    /// Flags such as `unique_lang`.
    Boolean(bool),
    /// IRIs, patterns, flags and script bodies.
    Text(String),
    /// RDF lists such as `language_in` or the shapes of `or`.
    List(Vec<String>),
}

impl ConstraintValue {
    /// Returns the value as a non negative count, if it is one.
    pub fn as_count(&self) -> Option<usize> {
        match self {
            Self::Integer(n) => usize::try_from(*n).ok(),
            Self::Decimal(d) if d.fract() == 0.0 && *d >= 0.0 => Some(*d as usize),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the value as a number, if it is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(n) => Some(*n as f64),
            Self::Decimal(d) => Some(*d),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the value as text, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            Self::Text(s) => match s.as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Returns the value as a list of strings, wrapping scalars.
    pub fn as_list(&self) -> Vec<String> {
        match self {
            Self::List(items) => items.clone(),
            other => vec![other.to_string()],
        }
    }

    /// The JSON equivalent, used in result details.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Integer(n) => (*n).into(),
            Self::Decimal(d) => serde_json::Number::from_f64(*d)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Boolean(b) => (*b).into(),
            Self::Text(s) => s.as_str().into(),
            Self::List(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for ConstraintValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<i64> for ConstraintValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ConstraintValue {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl From<bool> for ConstraintValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for ConstraintValue {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

impl From<String> for ConstraintValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Constraints of a single property, keyed by constraint key in table order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintSet(BTreeMap<ConstraintKey, ConstraintValue>);

impl ConstraintSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a constraint, returning the previous value for this key.
    pub fn insert(
        &mut self,
        key: ConstraintKey,
        value: impl Into<ConstraintValue>,
    ) -> Option<ConstraintValue> {
        self.0.insert(key, value.into())
    }

    /// Adds a constraint, builder style.
    #[must_use]
    pub fn with(mut self, key: ConstraintKey, value: impl Into<ConstraintValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value of a key.
    pub fn get(&self, key: ConstraintKey) -> Option<&ConstraintValue> {
        self.0.get(&key)
    }

    /// Returns true if the key is present.
    pub fn contains(&self, key: ConstraintKey) -> bool {
        self.0.contains_key(&key)
    }

    /// Iterates over the keys in table order.
    pub fn keys(&self) -> impl Iterator<Item = ConstraintKey> + '_ {
        self.0.keys().copied()
    }

    /// Iterates over the constraints in table order.
    pub fn iter(&self) -> btree_map::Iter<'_, ConstraintKey, ConstraintValue> {
        self.0.iter()
    }

    /// Returns the number of constraints.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no constraints.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the subset of constraints belonging to a category.
    #[must_use]
    pub fn restricted_to(&self, category: ConstraintCategory) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(key, _)| key.category() == category)
                .map(|(key, value)| (*key, value.clone()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a ConstraintSet {
    type Item = (&'a ConstraintKey, &'a ConstraintValue);
    type IntoIter = btree_map::Iter<'a, ConstraintKey, ConstraintValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(ConstraintKey, ConstraintValue)> for ConstraintSet {
    fn from_iter<T: IntoIterator<Item = (ConstraintKey, ConstraintValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A node shape as read from the shapes graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeShapeRecord {
    /// IRI of the shape, or a canonical blank node label.
    pub shape_id: String,
    /// `sh:targetClass`, if any.
    pub target_class: Option<String>,
    /// Property shapes linked with `sh:property`, sorted by path.
    pub properties: Vec<PropertyShapeRecord>,
    /// `sh:deactivated`.
    pub deactivated: bool,
    /// `sh:severity`, defaulting to [`Severity::Violation`].
    pub severity: Severity,
    /// Constraints declared on the node shape itself, in their lexical form.
    pub constraints: BTreeMap<String, String>,
    /// `sh:name`.
    pub name: Option<String>,
    /// `sh:description`.
    pub description: Option<String>,
    /// `sh:message`.
    pub message: Option<String>,
}

/// A property shape as read from the shapes graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyShapeRecord {
    /// IRI of the shape, or a canonical blank node label.
    pub shape_id: String,
    /// `sh:path` when it is a plain predicate.
    pub path: Option<String>,
    /// Every known constraint declared on the shape.
    pub constraints: ConstraintSet,
    /// `sh:severity` when the property shape declares its own.
    pub severity: Option<Severity>,
    /// `sh:message`.
    pub message: Option<String>,
    /// `sh:name`.
    pub name: Option<String>,
}

/// Provenance attached to a flattened constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintMetadata {
    /// Where the constraint came from.
    pub source: String,
    /// Category of the constraint key.
    pub constraint_category: ConstraintCategory,
}

/// One (property, constraint key) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintRecord {
    #[serde(rename = "type")]
    pub constraint_type: ConstraintKey,
    pub value: ConstraintValue,
    pub property_path: Option<String>,
    pub shape_id: String,
    pub metadata: ConstraintMetadata,
}

/// Returns the local part of an IRI: after the last `#`, else after the last `/`.
pub(crate) fn local_name(iri: &str) -> &str {
    if let Some((_, fragment)) = iri.rsplit_once('#') {
        return fragment;
    }
    match iri.rsplit_once('/') {
        Some((_, last)) if !last.is_empty() => last,
        _ => iri,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_lookup_accepts_both_spellings() {
        assert_eq!(ConstraintKey::from_name("min_count"), Some(ConstraintKey::MinCount));
        assert_eq!(ConstraintKey::from_name("minCount"), Some(ConstraintKey::MinCount));
        assert_eq!(
            ConstraintKey::from_name("lessThanOrEquals"),
            Some(ConstraintKey::LessThanOrEquals)
        );
        assert_eq!(ConstraintKey::from_name("closed"), None);
    }

    #[test]
    fn test_key_predicate_round_trip() {
        for key in ConstraintKey::ALL {
            assert_eq!(ConstraintKey::from_predicate(key.predicate()), Some(key));
        }
    }

    #[test]
    fn test_constraint_set_iterates_in_table_order() {
        let set = ConstraintSet::new()
            .with(ConstraintKey::MaxLength, 10)
            .with(ConstraintKey::Datatype, "http://www.w3.org/2001/XMLSchema#string")
            .with(ConstraintKey::MinCount, 1);
        let keys: Vec<_> = set.keys().collect();
        assert_eq!(
            keys,
            [ConstraintKey::MinCount, ConstraintKey::Datatype, ConstraintKey::MaxLength]
        );
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(ConstraintValue::Integer(3).as_count(), Some(3));
        assert_eq!(ConstraintValue::Integer(-1).as_count(), None);
        assert_eq!(ConstraintValue::Text("0.5".into()).as_f64(), Some(0.5));
        assert_eq!(ConstraintValue::Text("true".into()).as_bool(), Some(true));
        assert_eq!(
            ConstraintValue::List(vec!["en".into(), "fr".into()]).to_string(),
            "[en, fr]"
        );
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("http://example.org/ns#hasText"), "hasText");
        assert_eq!(local_name("http://example.org/UserInput"), "UserInput");
        assert_eq!(local_name("plain"), "plain");
    }
}
