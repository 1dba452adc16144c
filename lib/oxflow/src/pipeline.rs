use oxshape::{
    EngineConfig, ExtractedShapes, ShaclProcessor, ShapeSource, SpanGuard, Telemetry,
    ValidationEngineContext,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::error::{PipelineError, Stage, StageFailure};
use crate::runner::{EchoRunner, SignatureRunner};
use crate::signature::{ExecutableSpecification, SignatureDefinition};
use crate::stages::{ExecutionOutcome, Executor, SignatureLinker, ValidationCompiler};

const CATEGORY: &str = "pipeline";

/// Pipeline options, all optional when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub engine: EngineConfig,
    /// Whether warning and info results stop execution like violations do.
    pub fail_on_warnings: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            fail_on_warnings: true,
        }
    }
}

/// Everything a full pipeline run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub shapes: ShapeSource,
    #[serde(default)]
    pub signatures: Vec<SignatureDefinition>,
    #[serde(default)]
    pub inputs: Map<String, Value>,
}

/// Runs the processor, compiler, linker and executor stages in order.
///
/// Each stage runs in its own telemetry span. A failing stage records the
/// `pipeline.failure` and `pipeline.failure.<stage>` metrics before its error is returned.
///
/// ```
/// use oxflow::{EchoRunner, Pipeline, PipelineConfig, PipelineRequest, SignatureDefinition};
/// use oxshape::{ShapeFormat, ShapeSource};
///
/// let pipeline = Pipeline::new(PipelineConfig::default(), EchoRunner);
/// let outcome = pipeline.run(PipelineRequest {
///     shapes: ShapeSource::new(
///         "@prefix sh: <http://www.w3.org/ns/shacl#> .
///          @prefix ex: <http://example.org/> .
///          ex:S sh:targetClass ex:Doc ; sh:property [ sh:path ex:title ; sh:minLength 3 ] .",
///         ShapeFormat::Turtle,
///     ),
///     signatures: vec![SignatureDefinition::new("summarize").with_input("title")],
///     inputs: serde_json::from_str(r#"{"title": "Dune"}"#)?,
/// })?;
/// assert_eq!(outcome.outputs["summarize"]["title"], "Dune");
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Debug)]
pub struct Pipeline<R = EchoRunner> {
    config: PipelineConfig,
    context: ValidationEngineContext,
    runner: R,
}

impl<R: SignatureRunner> Pipeline<R> {
    /// Creates the pipeline and its [`ValidationEngineContext`].
    pub fn new(config: PipelineConfig, runner: R) -> Self {
        info!(
            compiler = ?config.engine.compiler,
            legacy_mode = config.engine.legacy_mode,
            "pipeline initialized"
        );
        Self {
            context: ValidationEngineContext::new(config.engine),
            config,
            runner,
        }
    }

    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.context = self.context.with_telemetry(telemetry);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn context(&self) -> &ValidationEngineContext {
        &self.context
    }

    /// Mutable access to the context, to register validators.
    pub fn context_mut(&mut self) -> &mut ValidationEngineContext {
        &mut self.context
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Drops the cached shape graphs.
    pub fn clear(&self) {
        self.context.clear();
    }

    /// Runs the processor, compiler and linker stages.
    pub fn prepare(
        &self,
        shapes: &ShapeSource,
        signatures: Vec<SignatureDefinition>,
    ) -> Result<ExecutableSpecification, PipelineError> {
        let processor = ShaclProcessor::new(&self.context);
        let extracted = self.stage(Stage::Processor, |span| {
            // A blank source has no shapes, the compiler stage reports it
            if shapes.text.trim().is_empty() {
                span.set_attribute("shapes_processed", 0_usize);
                return Ok(ExtractedShapes::default());
            }
            let graph = processor
                .parse(shapes)
                .map_err(|e| StageFailure::from_shape_error(Stage::Processor, &e))?;
            let extracted = processor.extract(&graph);
            span.set_attribute("shapes_processed", extracted.node_shapes.len());
            span.set_attribute("property_shapes", extracted.property_shapes.len());
            Ok(extracted)
        })?;

        let validation = self.stage(Stage::Compiler, |span| {
            let compiled = ValidationCompiler::new(&self.context)
                .compile(shapes, &extracted)
                .map_err(|e| StageFailure::from_shape_error(Stage::Compiler, &e))?;
            span.set_attribute("rules_compiled", compiled.rule_count());
            span.set_attribute("constraint_count", compiled.constraint_count);
            Ok(compiled)
        })?;

        self.stage(Stage::Linker, |span| {
            let specification = SignatureLinker::new(validation)
                .link(signatures)
                .map_err(|e| StageFailure::new(Stage::Linker, "LinkError", e.to_string()))?;
            span.set_attribute("signatures_linked", specification.signatures.len());
            span.set_attribute(
                "bindings",
                specification
                    .bindings
                    .values()
                    .map(BTreeMap::len)
                    .sum::<usize>(),
            );
            Ok(specification)
        })
    }

    /// Runs the executor stage.
    pub fn execute(
        &self,
        specification: &ExecutableSpecification,
        inputs: &Map<String, Value>,
    ) -> Result<ExecutionOutcome, PipelineError> {
        self.stage(Stage::Executor, |span| {
            let outcome = Executor::new(&self.context, &self.runner, self.config.fail_on_warnings)
                .execute(specification, inputs)?;
            span.set_attribute("signatures_run", outcome.outputs.len());
            span.set_attribute(
                "rules_evaluated",
                outcome.validation.performance.rules_evaluated,
            );
            Ok(outcome)
        })
    }

    /// Runs every stage.
    pub fn run(&self, request: PipelineRequest) -> Result<ExecutionOutcome, PipelineError> {
        let mut span = self.context.telemetry().start_span("pipeline.run", CATEGORY);
        let result = self
            .prepare(&request.shapes, request.signatures)
            .and_then(|specification| self.execute(&specification, &request.inputs));
        if let Err(e) = &result {
            span.fail(e);
            span.set_attribute("failed_stage", e.stage().as_str());
        }
        result
    }

    fn stage<T>(
        &self,
        stage: Stage,
        run: impl FnOnce(&mut SpanGuard) -> Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let telemetry = self.context.telemetry();
        let mut span = telemetry.start_span(&format!("pipeline.{stage}"), CATEGORY);
        let result = run(&mut span);
        if let Err(e) = &result {
            span.fail(e);
            telemetry.record_metric("pipeline.failure", 1.);
            telemetry.record_metric(&format!("pipeline.failure.{stage}"), 1.);
            warn!(%stage, error = %e, "pipeline stage failed");
        }
        result
    }
}
