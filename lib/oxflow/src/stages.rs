//! The compiler, linker and executor stages.
//!
//! The processor stage is [`oxshape::ShaclProcessor`] itself.

use oxshape::{
    CompileError, CompiledValidation, ExtractedShapes, ShaclProcessor, ShapeError, ShapeSource,
    ValidationEngineContext, ValidationResult, ValidationRule,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{LinkError, PipelineError, Stage, StageFailure};
use crate::runner::SignatureRunner;
use crate::signature::{ExecutableSpecification, SignatureDefinition};

/// Compiles extracted shapes with the compiler configured in the context.
#[derive(Debug, Clone, Copy)]
pub struct ValidationCompiler<'a> {
    context: &'a ValidationEngineContext,
}

impl<'a> ValidationCompiler<'a> {
    pub fn new(context: &'a ValidationEngineContext) -> Self {
        Self { context }
    }

    /// Fails with [`CompileError::EmptySource`] when `source` holds only whitespace.
    pub fn compile(
        &self,
        source: &ShapeSource,
        shapes: &ExtractedShapes,
    ) -> Result<CompiledValidation, ShapeError> {
        if source.text.trim().is_empty() {
            return Err(CompileError::empty_source("the shapes graph source is blank").into());
        }
        let compiler = self.context.compiler();
        let compiled = compiler.compile(shapes);
        debug!(
            compiler = compiler.name(),
            rules = compiled.rule_count(),
            "compiled validation rules"
        );
        Ok(compiled)
    }
}

/// Binds each signature input field to the rules validating it.
#[derive(Debug, Clone)]
pub struct SignatureLinker {
    validation: CompiledValidation,
}

impl SignatureLinker {
    pub fn new(validation: CompiledValidation) -> Self {
        Self { validation }
    }

    /// Builds the executable specification.
    ///
    /// Signatures whose fields match no rule are kept with empty bindings.
    pub fn link(
        self,
        signatures: Vec<SignatureDefinition>,
    ) -> Result<ExecutableSpecification, LinkError> {
        let mut bindings = BTreeMap::new();
        for (index, signature) in signatures.iter().enumerate() {
            if signature.name.trim().is_empty() {
                return Err(LinkError::EmptySignatureName { index });
            }
            let mut fields = BTreeMap::new();
            for field in &signature.inputs {
                let rule_ids: Vec<String> = self
                    .validation
                    .target_classes
                    .values()
                    .flatten()
                    .filter(|rule| validates_field(rule, &field.name))
                    .map(|rule| rule.rule_id.clone())
                    .collect();
                if !rule_ids.is_empty() {
                    fields.insert(field.name.clone(), rule_ids);
                }
            }
            if bindings.insert(signature.name.clone(), fields).is_some() {
                return Err(LinkError::DuplicateSignature {
                    name: signature.name.clone(),
                });
            }
        }
        Ok(ExecutableSpecification {
            signatures,
            validation: self.validation,
            bindings,
        })
    }
}

fn validates_field(rule: &ValidationRule, field: &str) -> bool {
    rule.property_path == field
        || rule
            .property_path
            .rsplit_once('#')
            .is_some_and(|(_, fragment)| fragment == field)
}

/// Result of a successful execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub validation: ValidationResult,
    /// Outputs per signature name.
    pub outputs: BTreeMap<String, Map<String, Value>>,
}

/// Validates inputs against every rule of a specification, then runs its signatures.
#[derive(Debug)]
pub struct Executor<'a, R: ?Sized> {
    context: &'a ValidationEngineContext,
    runner: &'a R,
    fail_on_warnings: bool,
}

impl<'a, R: SignatureRunner + ?Sized> Executor<'a, R> {
    pub fn new(context: &'a ValidationEngineContext, runner: &'a R, fail_on_warnings: bool) -> Self {
        Self {
            context,
            runner,
            fail_on_warnings,
        }
    }

    /// Fails with [`PipelineError::ExecutionFailed`] on any violation, and on warnings or
    /// info results too when `fail_on_warnings` is set. No signature runs in that case.
    pub fn execute(
        &self,
        specification: &ExecutableSpecification,
        inputs: &Map<String, Value>,
    ) -> Result<ExecutionOutcome, PipelineError> {
        let validation =
            ShaclProcessor::new(self.context).validate_data(inputs, &specification.rules());
        if !validation.valid && (self.fail_on_warnings || !validation.violations.is_empty()) {
            return Err(PipelineError::ExecutionFailed {
                result: Box::new(validation),
            });
        }

        let mut outputs = BTreeMap::new();
        for signature in &specification.signatures {
            let output = self.runner.run(signature, inputs).map_err(|e| {
                StageFailure::new(Stage::Executor, "RunnerError", e.to_string())
            })?;
            debug!(signature = %signature.name, outputs = output.len(), "signature ran");
            outputs.insert(signature.name.clone(), output);
        }
        Ok(ExecutionOutcome {
            validation,
            outputs,
        })
    }
}
