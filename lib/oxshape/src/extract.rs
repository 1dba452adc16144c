//! Extraction of normalized shape records from a shapes graph.
//!
//! The extractor reads, it never interprets: missing optional data falls back
//! to defaults and predicates outside [`ConstraintKey::ALL`] are ignored.

use oxrdf::vocab::rdf;
use oxrdf::{Graph, NamedNodeRef, NamedOrBlankNodeRef, TermRef};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::model::{
    ConstraintKey, ConstraintMetadata, ConstraintRecord, ConstraintSet, ConstraintValue,
    NodeShapeRecord, PropertyShapeRecord, Severity, local_name,
};
use crate::store::ShapeGraph;
use crate::vocab::sh;

/// Everything extracted from one shapes graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedShapes {
    pub node_shapes: Vec<NodeShapeRecord>,
    pub property_shapes: Vec<PropertyShapeRecord>,
    pub constraints: Vec<ConstraintRecord>,
    /// Number of triples of the source graph.
    pub triple_count: usize,
}

/// Walks a [`ShapeGraph`] and produces shape records.
///
/// The extractor itself only logs, [`ShaclProcessor::extract`](crate::ShaclProcessor::extract)
/// reports it as the `shacl.extract` span.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintExtractor<'a> {
    graph: &'a Graph,
}

impl<'a> ConstraintExtractor<'a> {
    pub fn new(shapes: &'a ShapeGraph) -> Self {
        Self {
            graph: shapes.graph(),
        }
    }

    /// Extracts every node shape, sorted by shape id.
    ///
    /// A node shape is any subject typed `sh:NodeShape` or carrying `sh:targetClass`.
    pub fn extract_node_shapes(&self) -> Vec<NodeShapeRecord> {
        let mut seen = FxHashSet::default();
        let mut shapes: Vec<NodeShapeRecord> = self
            .graph
            .subjects_for_predicate_object(rdf::TYPE, sh::NODE_SHAPE)
            .chain(
                self.graph
                    .triples_for_predicate(sh::TARGET_CLASS)
                    .map(|triple| triple.subject),
            )
            .filter(|node| seen.insert(*node))
            .map(|node| self.node_shape(node))
            .collect();
        shapes.sort_by(|a, b| a.shape_id.cmp(&b.shape_id));
        debug!(count = shapes.len(), "extracted node shapes");
        shapes
    }

    /// Extracts every property shape, linked or standalone, sorted by path.
    pub fn extract_property_shapes(&self) -> Vec<PropertyShapeRecord> {
        let mut seen = FxHashSet::default();
        let linked = self
            .graph
            .triples_for_predicate(sh::PROPERTY)
            .filter_map(|triple| as_subject(triple.object));
        let mut shapes: Vec<PropertyShapeRecord> = self
            .graph
            .subjects_for_predicate_object(rdf::TYPE, sh::PROPERTY_SHAPE)
            .chain(linked)
            .filter(|node| seen.insert(*node))
            .map(|node| self.property_shape(node))
            .collect();
        sort_properties(&mut shapes);
        debug!(count = shapes.len(), "extracted property shapes");
        shapes
    }

    /// Flattens property shape constraints into one record per (property, key) pair.
    pub fn extract_constraints(&self) -> Vec<ConstraintRecord> {
        flatten(&self.extract_property_shapes())
    }

    /// Runs every extraction at once.
    pub fn extract(&self) -> ExtractedShapes {
        let node_shapes = self.extract_node_shapes();
        let property_shapes = self.extract_property_shapes();
        let constraints = flatten(&property_shapes);
        debug!(
            node_shapes = node_shapes.len(),
            property_shapes = property_shapes.len(),
            constraints = constraints.len(),
            "extracted shapes graph"
        );
        ExtractedShapes {
            node_shapes,
            property_shapes,
            constraints,
            triple_count: self.graph.len(),
        }
    }

    fn node_shape(&self, node: NamedOrBlankNodeRef<'a>) -> NodeShapeRecord {
        let target_class = self
            .graph
            .objects_for_subject_predicate(node, sh::TARGET_CLASS)
            .filter_map(|term| match term {
                TermRef::NamedNode(class) => Some(class.as_str().to_owned()),
                _ => None,
            })
            .min();
        let shape_id = match node {
            NamedOrBlankNodeRef::NamedNode(n) => n.as_str().to_owned(),
            NamedOrBlankNodeRef::BlankNode(_) => match &target_class {
                Some(class) => format!("_:{}", local_name(class)),
                None => "_:anonymous".to_owned(),
            },
        };

        let mut properties: Vec<PropertyShapeRecord> = self
            .graph
            .objects_for_subject_predicate(node, sh::PROPERTY)
            .filter_map(as_subject)
            .map(|property| self.property_shape(property))
            .collect();
        sort_properties(&mut properties);

        let constraints = self
            .constraint_set(node)
            .iter()
            .map(|(key, value)| (key.as_str().to_owned(), value.to_string()))
            .collect::<BTreeMap<_, _>>();

        NodeShapeRecord {
            shape_id,
            target_class,
            properties,
            deactivated: self.boolean(node, sh::DEACTIVATED).unwrap_or(false),
            severity: self.severity(node).unwrap_or_default(),
            constraints,
            name: self.string(node, sh::NAME),
            description: self.string(node, sh::DESCRIPTION),
            message: self.string(node, sh::MESSAGE),
        }
    }

    fn property_shape(&self, node: NamedOrBlankNodeRef<'a>) -> PropertyShapeRecord {
        let path = match self.graph.object_for_subject_predicate(node, sh::PATH) {
            Some(TermRef::NamedNode(predicate)) => Some(predicate.as_str().to_owned()),
            _ => None,
        };
        let shape_id = match node {
            NamedOrBlankNodeRef::NamedNode(n) => n.as_str().to_owned(),
            NamedOrBlankNodeRef::BlankNode(_) => match &path {
                Some(path) => format!("_:{}", local_name(path)),
                None => "_:property".to_owned(),
            },
        };
        PropertyShapeRecord {
            shape_id,
            path,
            constraints: self.constraint_set(node),
            severity: self.severity(node),
            message: self.string(node, sh::MESSAGE),
            name: self.string(node, sh::NAME),
        }
    }

    fn constraint_set(&self, node: NamedOrBlankNodeRef<'a>) -> ConstraintSet {
        ConstraintKey::ALL
            .into_iter()
            .filter_map(|key| Some((key, self.constraint_value(node, key)?)))
            .collect()
    }

    fn constraint_value(
        &self,
        node: NamedOrBlankNodeRef<'a>,
        key: ConstraintKey,
    ) -> Option<ConstraintValue> {
        let object = self.graph.object_for_subject_predicate(node, key.predicate())?;
        Some(match key {
            ConstraintKey::MinCount
            | ConstraintKey::MaxCount
            | ConstraintKey::QualifiedMinCount
            | ConstraintKey::QualifiedMaxCount
            | ConstraintKey::MinLength
            | ConstraintKey::MaxLength => {
                let text = term_text(object);
                text.trim()
                    .parse()
                    .map_or(ConstraintValue::Text(text), ConstraintValue::Integer)
            }
            ConstraintKey::MinInclusive
            | ConstraintKey::MaxInclusive
            | ConstraintKey::MinExclusive
            | ConstraintKey::MaxExclusive => {
                let text = term_text(object);
                text.trim()
                    .parse()
                    .map_or(ConstraintValue::Text(text), ConstraintValue::Decimal)
            }
            ConstraintKey::UniqueLang => {
                let text = term_text(object);
                match text.as_str() {
                    "true" | "1" => ConstraintValue::Boolean(true),
                    "false" | "0" => ConstraintValue::Boolean(false),
                    _ => ConstraintValue::Text(text),
                }
            }
            ConstraintKey::LanguageIn
            | ConstraintKey::In
            | ConstraintKey::And
            | ConstraintKey::Or
            | ConstraintKey::Xone => ConstraintValue::List(self.list(object)),
            ConstraintKey::Sparql => {
                // SPARQL constraints are nodes holding the query in sh:select
                let query = as_subject(object)
                    .and_then(|constraint| self.string(constraint, sh::SELECT));
                ConstraintValue::Text(query.unwrap_or_else(|| term_text(object)))
            }
            _ => ConstraintValue::Text(term_text(object)),
        })
    }

    /// Reads an RDF list, stopping at the first malformed cell.
    fn list(&self, head: TermRef<'a>) -> Vec<String> {
        let mut items = Vec::new();
        let mut current = head;
        // Bounded by the graph size so that cyclic lists terminate
        for _ in 0..=self.graph.len() {
            if current == TermRef::from(rdf::NIL) {
                break;
            }
            let Some(cell) = as_subject(current) else {
                break;
            };
            let Some(first) = self.graph.object_for_subject_predicate(cell, rdf::FIRST) else {
                break;
            };
            items.push(term_text(first));
            let Some(rest) = self.graph.object_for_subject_predicate(cell, rdf::REST) else {
                break;
            };
            current = rest;
        }
        items
    }

    fn string(&self, node: NamedOrBlankNodeRef<'a>, predicate: NamedNodeRef<'_>) -> Option<String> {
        match self.graph.object_for_subject_predicate(node, predicate)? {
            TermRef::Literal(literal) => Some(literal.value().to_owned()),
            _ => None,
        }
    }

    fn boolean(&self, node: NamedOrBlankNodeRef<'a>, predicate: NamedNodeRef<'_>) -> Option<bool> {
        match self.string(node, predicate)?.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    fn severity(&self, node: NamedOrBlankNodeRef<'a>) -> Option<Severity> {
        match self.graph.object_for_subject_predicate(node, sh::SEVERITY)? {
            TermRef::NamedNode(iri) => Severity::from_iri(iri),
            _ => None,
        }
    }
}

fn flatten(property_shapes: &[PropertyShapeRecord]) -> Vec<ConstraintRecord> {
    property_shapes
        .iter()
        .flat_map(|shape| {
            shape.constraints.iter().map(|(key, value)| ConstraintRecord {
                constraint_type: *key,
                value: value.clone(),
                property_path: shape.path.clone(),
                shape_id: shape.shape_id.clone(),
                metadata: ConstraintMetadata {
                    source: key.predicate().as_str().to_owned(),
                    constraint_category: key.category(),
                },
            })
        })
        .collect()
}

fn sort_properties(shapes: &mut [PropertyShapeRecord]) {
    shapes.sort_by(|a, b| (&a.path, &a.shape_id).cmp(&(&b.path, &b.shape_id)));
}

fn as_subject(term: TermRef<'_>) -> Option<NamedOrBlankNodeRef<'_>> {
    match term {
        TermRef::NamedNode(n) => Some(n.into()),
        TermRef::BlankNode(b) => Some(b.into()),
        _ => None,
    }
}

fn term_text(term: TermRef<'_>) -> String {
    match term {
        TermRef::NamedNode(n) => n.as_str().to_owned(),
        TermRef::Literal(l) => l.value().to_owned(),
        _ => term.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ConstraintCategory;
    use crate::store::ShapeFormat;

    const SHAPES: &str = r#"
        @prefix sh: <http://www.w3.org/ns/shacl#> .
        @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
        @prefix ex: <http://example.org/ns#> .

        ex:UserInputShape a sh:NodeShape ;
            sh:targetClass ex:UserInput ;
            sh:name "User input" ;
            sh:property [
                sh:path ex:hasText ;
                sh:minCount 1 ;
                sh:maxCount 1 ;
                sh:datatype xsd:string ;
                sh:minLength 10 ;
                sh:maxLength 1000 ;
                sh:closed true
            ] ;
            sh:property [
                sh:path ex:hasConfidence ;
                sh:minInclusive 0.0 ;
                sh:maxInclusive 1.0 ;
                sh:severity sh:Warning
            ] .

        ex:LanguageShape a sh:NodeShape ;
            sh:deactivated true ;
            sh:severity sh:Info ;
            sh:property [
                sh:path ex:label ;
                sh:languageIn ( "en" "fr" ) ;
                sh:uniqueLang true ;
                sh:pattern "^[A-Z]" ;
                sh:flags "i"
            ] .

        ex:AgeShape a sh:PropertyShape ;
            sh:path ex:age ;
            sh:minInclusive 0 .
    "#;

    fn extract(text: &str) -> ExtractedShapes {
        let graph = ShapeGraph::parse(text, ShapeFormat::Turtle).unwrap();
        ConstraintExtractor::new(&graph).extract()
    }

    #[test]
    fn test_extract_node_shapes() {
        let extracted = extract(SHAPES);
        let ids: Vec<_> = extracted
            .node_shapes
            .iter()
            .map(|shape| shape.shape_id.as_str())
            .collect();
        assert_eq!(
            ids,
            [
                "http://example.org/ns#LanguageShape",
                "http://example.org/ns#UserInputShape"
            ]
        );

        let user = &extracted.node_shapes[1];
        assert_eq!(user.target_class.as_deref(), Some("http://example.org/ns#UserInput"));
        assert_eq!(user.severity, Severity::Violation);
        assert!(!user.deactivated);
        assert_eq!(user.name.as_deref(), Some("User input"));
        assert_eq!(user.properties.len(), 2);

        let language = &extracted.node_shapes[0];
        assert!(language.deactivated);
        assert_eq!(language.severity, Severity::Info);
        assert_eq!(language.target_class, None);
    }

    #[test]
    fn test_extract_typed_values() {
        let extracted = extract(SHAPES);
        let user = &extracted.node_shapes[1];
        let text = user
            .properties
            .iter()
            .find(|p| p.path.as_deref() == Some("http://example.org/ns#hasText"))
            .unwrap();
        assert_eq!(text.shape_id, "_:hasText");
        assert_eq!(text.constraints.len(), 5);
        assert_eq!(
            text.constraints.get(ConstraintKey::MinLength),
            Some(&ConstraintValue::Integer(10))
        );
        assert_eq!(
            text.constraints.get(ConstraintKey::Datatype),
            Some(&ConstraintValue::Text(
                "http://www.w3.org/2001/XMLSchema#string".into()
            ))
        );

        let confidence = &user.properties[0];
        assert_eq!(confidence.severity, Some(Severity::Warning));
        assert_eq!(
            confidence.constraints.get(ConstraintKey::MaxInclusive),
            Some(&ConstraintValue::Decimal(1.0))
        );

        let label = &extracted.node_shapes[0].properties[0];
        assert_eq!(
            label.constraints.get(ConstraintKey::LanguageIn),
            Some(&ConstraintValue::List(vec!["en".into(), "fr".into()]))
        );
        assert_eq!(
            label.constraints.get(ConstraintKey::UniqueLang),
            Some(&ConstraintValue::Boolean(true))
        );
        assert!(label.constraints.contains(ConstraintKey::Flags));
    }

    #[test]
    fn test_standalone_property_shapes_are_extracted() {
        let extracted = extract(SHAPES);
        assert_eq!(extracted.property_shapes.len(), 4);
        assert!(
            extracted
                .property_shapes
                .iter()
                .any(|p| p.shape_id == "http://example.org/ns#AgeShape")
        );
    }

    #[test]
    fn test_flattened_constraints() {
        let extracted = extract(SHAPES);
        assert_eq!(extracted.constraints.len(), 12);
        let pattern = extracted
            .constraints
            .iter()
            .find(|c| c.constraint_type == ConstraintKey::Pattern)
            .unwrap();
        assert_eq!(pattern.shape_id, "_:label");
        assert_eq!(pattern.metadata.source, "http://www.w3.org/ns/shacl#pattern");
        assert_eq!(pattern.metadata.constraint_category, ConstraintCategory::String);
    }

    #[test]
    fn test_missing_optional_data_defaults() {
        let extracted = extract(
            r#"
            @prefix sh: <http://www.w3.org/ns/shacl#> .
            [] a sh:NodeShape ; sh:severity "loud" ; sh:property [ sh:minCount "many" ] .
            "#,
        );
        let shape = &extracted.node_shapes[0];
        assert_eq!(shape.shape_id, "_:anonymous");
        assert_eq!(shape.severity, Severity::Violation);
        let property = &shape.properties[0];
        assert_eq!(property.path, None);
        assert_eq!(property.shape_id, "_:property");
        assert_eq!(
            property.constraints.get(ConstraintKey::MinCount),
            Some(&ConstraintValue::Text("many".into()))
        );
    }

    #[test]
    fn test_malformed_list_keeps_readable_items() {
        let extracted = extract(
            r#"
            @prefix sh: <http://www.w3.org/ns/shacl#> .
            @prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
            @prefix ex: <http://example.org/> .
            ex:S a sh:NodeShape ; sh:property [ sh:path ex:p ; sh:in ex:list ] .
            ex:list rdf:first "a" ; rdf:rest ex:broken .
            ex:broken rdf:rest rdf:nil .
            "#,
        );
        let property = &extracted.node_shapes[0].properties[0];
        assert_eq!(
            property.constraints.get(ConstraintKey::In),
            Some(&ConstraintValue::List(vec!["a".into()]))
        );
    }

    #[test]
    fn test_cyclic_list_terminates() {
        let extracted = extract(
            r#"
            @prefix sh: <http://www.w3.org/ns/shacl#> .
            @prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
            @prefix ex: <http://example.org/> .
            ex:S a sh:NodeShape ; sh:property [ sh:path ex:p ; sh:in ex:loop ] .
            ex:loop rdf:first "a" ; rdf:rest ex:loop .
            "#,
        );
        let property = &extracted.node_shapes[0].properties[0];
        assert!(matches!(
            property.constraints.get(ConstraintKey::In),
            Some(ConstraintValue::List(items)) if !items.is_empty()
        ));
    }

    #[test]
    fn test_extraction_is_idempotent_across_parses() {
        assert_eq!(extract(SHAPES), extract(SHAPES));
    }
}
