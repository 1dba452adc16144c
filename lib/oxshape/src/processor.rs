//! Instrumented entry points over a [`ValidationEngineContext`].

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

use crate::compile::{LegacyRuleCompiler, RuleCompiler};
use crate::context::ValidationEngineContext;
use crate::engine::ValidationResult;
use crate::error::ShapeError;
use crate::extract::{ConstraintExtractor, ExtractedShapes};
use crate::rule::{CompiledValidation, ValidationRule};
use crate::store::{ShapeGraph, ShapeSource};

const CATEGORY: &str = "shacl";

/// Parses, extracts, compiles and validates, emitting one telemetry span per call.
///
/// ```
/// use oxshape::{ShaclProcessor, ShapeFormat, ShapeSource, ValidationEngineContext};
///
/// let context = ValidationEngineContext::default();
/// let processor = ShaclProcessor::new(&context);
/// let compiled = processor.compile(&ShapeSource::new(
///     "@prefix sh: <http://www.w3.org/ns/shacl#> .
///      @prefix ex: <http://example.org/> .
///      ex:S sh:targetClass ex:Doc ; sh:property [ sh:path ex:title ; sh:minCount 1 ] .",
///     ShapeFormat::Turtle,
/// ))?;
/// let result = processor.validate_data(&serde_json::Map::new(), &compiled.rules());
/// assert!(!result.valid);
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ShaclProcessor<'a> {
    context: &'a ValidationEngineContext,
}

impl<'a> ShaclProcessor<'a> {
    pub fn new(context: &'a ValidationEngineContext) -> Self {
        Self { context }
    }

    /// Parses a shape source through the context's cache.
    pub fn parse(&self, source: &ShapeSource) -> Result<Arc<ShapeGraph>, ShapeError> {
        let mut span = self.context.telemetry().start_span("shacl.parse", CATEGORY);
        span.set_attribute("format", source.format.to_string());
        match self.context.store().parse(source) {
            Ok(graph) => {
                span.set_attribute("shacl_triples", graph.len());
                span.set_attribute("cache_hit_rate", self.context.store().cache_hit_rate());
                Ok(graph)
            }
            Err(e) => {
                span.fail(&e);
                Err(e.into())
            }
        }
    }

    /// Extracts shape records from a parsed graph.
    pub fn extract(&self, graph: &ShapeGraph) -> ExtractedShapes {
        let mut span = self.context.telemetry().start_span("shacl.extract", CATEGORY);
        let extracted = ConstraintExtractor::new(graph).extract();
        span.set_attribute("node_shapes", extracted.node_shapes.len());
        span.set_attribute("property_shapes", extracted.property_shapes.len());
        span.set_attribute("constraints", extracted.constraints.len());
        extracted
    }

    /// Compiles a shape source with the configured compiler.
    pub fn compile(&self, source: &ShapeSource) -> Result<CompiledValidation, ShapeError> {
        self.compile_with(source, self.context.compiler().as_ref())
    }

    /// Compiles a shape source with the legacy compiler, whatever the configuration.
    pub fn compile_legacy(&self, source: &ShapeSource) -> Result<CompiledValidation, ShapeError> {
        self.compile_with(source, &LegacyRuleCompiler)
    }

    pub fn compile_with(
        &self,
        source: &ShapeSource,
        compiler: &(dyn RuleCompiler + Send + Sync),
    ) -> Result<CompiledValidation, ShapeError> {
        let mut span = self.context.telemetry().start_span("shacl.compile", CATEGORY);
        span.set_attribute("compiler", compiler.name());
        let graph = match self.parse(source) {
            Ok(graph) => graph,
            Err(e) => {
                span.fail(&e);
                return Err(e);
            }
        };
        let extracted = self.extract(&graph);
        let compiled = compiler.compile(&extracted);
        span.set_attribute("rules_compiled", compiled.rule_count());
        span.set_attribute("constraint_count", compiled.constraint_count);
        span.set_attribute("target_classes", compiled.target_classes.len());
        info!(
            compiler = compiler.name(),
            rules = compiled.rule_count(),
            "compiled shapes graph"
        );
        Ok(compiled)
    }

    /// Validates a data map against rules. Failing rules are reported, never raised.
    pub fn validate_data(
        &self,
        data: &Map<String, Value>,
        rules: &[ValidationRule],
    ) -> ValidationResult {
        let telemetry = self.context.telemetry();
        let mut span = telemetry.start_span("shacl.validate", CATEGORY);
        let result = self.context.engine().validate(data, rules);
        span.set_attribute("rules_evaluated", result.performance.rules_evaluated);
        span.set_attribute("violations", result.violations.len());
        span.set_attribute("warnings", result.warnings.len());
        span.set_attribute("info", result.info.len());
        span.set_attribute("valid", result.valid);
        telemetry.record_metric(
            "validation.duration_ms",
            result.performance.validation_duration_ms,
        );
        telemetry.record_metric("validation.failures", result.failure_count() as f64);
        result
    }
}
