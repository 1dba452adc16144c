//! Constraint classification.
//!
//! Maps constraint keys to categories and resolves the primary category of a
//! property carrying several keys.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ConstraintKey;

/// A grouping of constraint keys.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintCategory {
    Cardinality,
    Datatype,
    Range,
    String,
    Logical,
    Comparison,
    Custom,
    Unknown,
}

impl ConstraintCategory {
    /// Resolution order of [`resolve_primary_type`]: structural constraints first.
    pub const PRIORITY: [Self; 7] = [
        Self::Cardinality,
        Self::Datatype,
        Self::Range,
        Self::String,
        Self::Logical,
        Self::Comparison,
        Self::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cardinality => "cardinality",
            Self::Datatype => "datatype",
            Self::Range => "range",
            Self::String => "string",
            Self::Logical => "logical",
            Self::Comparison => "comparison",
            Self::Custom => "custom",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ConstraintCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn categorize_key(key: ConstraintKey) -> ConstraintCategory {
    match key {
        ConstraintKey::MinCount
        | ConstraintKey::MaxCount
        | ConstraintKey::QualifiedMinCount
        | ConstraintKey::QualifiedMaxCount => ConstraintCategory::Cardinality,
        ConstraintKey::Datatype | ConstraintKey::NodeKind | ConstraintKey::Class => {
            ConstraintCategory::Datatype
        }
        ConstraintKey::MinLength
        | ConstraintKey::MaxLength
        | ConstraintKey::Pattern
        | ConstraintKey::Flags
        | ConstraintKey::LanguageIn
        | ConstraintKey::UniqueLang
        | ConstraintKey::HasValue
        | ConstraintKey::In => ConstraintCategory::String,
        ConstraintKey::MinInclusive
        | ConstraintKey::MaxInclusive
        | ConstraintKey::MinExclusive
        | ConstraintKey::MaxExclusive => ConstraintCategory::Range,
        ConstraintKey::And
        | ConstraintKey::Or
        | ConstraintKey::Not
        | ConstraintKey::Xone
        | ConstraintKey::Node => ConstraintCategory::Logical,
        ConstraintKey::Equals
        | ConstraintKey::Disjoint
        | ConstraintKey::LessThan
        | ConstraintKey::LessThanOrEquals => ConstraintCategory::Comparison,
        ConstraintKey::Sparql | ConstraintKey::Js | ConstraintKey::Python => {
            ConstraintCategory::Custom
        }
    }
}

/// Maps a constraint key name (`min_count` or `minCount`) to its category.
///
/// Unrecognized keys map to [`ConstraintCategory::Unknown`].
pub fn categorize(constraint_key: &str) -> ConstraintCategory {
    ConstraintKey::from_name(constraint_key).map_or(ConstraintCategory::Unknown, categorize_key)
}

/// Returns the first category of [`ConstraintCategory::PRIORITY`] with at least one key present.
pub fn resolve_primary_type(keys: impl IntoIterator<Item = ConstraintKey>) -> ConstraintCategory {
    let present: Vec<ConstraintCategory> = keys.into_iter().map(categorize_key).collect();
    ConstraintCategory::PRIORITY
        .into_iter()
        .find(|category| present.contains(category))
        .unwrap_or(ConstraintCategory::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_known_and_unknown() {
        assert_eq!(categorize("min_count"), ConstraintCategory::Cardinality);
        assert_eq!(categorize("maxInclusive"), ConstraintCategory::Range);
        assert_eq!(categorize("pattern"), ConstraintCategory::String);
        assert_eq!(categorize("sparql"), ConstraintCategory::Custom);
        assert_eq!(categorize("less_than"), ConstraintCategory::Comparison);
        assert_eq!(categorize("frobnicate"), ConstraintCategory::Unknown);
    }

    #[test]
    fn test_cardinality_wins_over_datatype() {
        let primary = resolve_primary_type([ConstraintKey::Datatype, ConstraintKey::MinCount]);
        assert_eq!(primary, ConstraintCategory::Cardinality);
    }

    #[test]
    fn test_range_wins_over_string() {
        let primary = resolve_primary_type([ConstraintKey::Pattern, ConstraintKey::MaxInclusive]);
        assert_eq!(primary, ConstraintCategory::Range);
    }

    #[test]
    fn test_empty_is_unknown() {
        assert_eq!(resolve_primary_type([]), ConstraintCategory::Unknown);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        for key in ConstraintKey::ALL {
            let keys = [key, ConstraintKey::Sparql, ConstraintKey::Equals];
            let first = resolve_primary_type(keys);
            for _ in 0..8 {
                assert_eq!(resolve_primary_type(keys), first);
            }
        }
    }

    #[test]
    fn test_every_key_has_a_known_category() {
        for key in ConstraintKey::ALL {
            assert_ne!(key.category(), ConstraintCategory::Unknown, "{key}");
        }
    }
}
