use oxshape::{ShapeError, ValidationResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Parses the shapes graph and extracts its shapes.
    Processor,
    /// Compiles validation rules.
    Compiler,
    /// Binds signatures to rules.
    Linker,
    /// Validates inputs and runs the signatures.
    Executor,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processor => "processor",
            Self::Compiler => "compiler",
            Self::Linker => "linker",
            Self::Executor => "executor",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by [`Pipeline`](crate::Pipeline) operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// A stage raised an error.
    #[error(transparent)]
    Stage(#[from] StageFailure),
    /// The inputs did not pass validation. The full result is attached.
    #[error("Input validation failed with {count} failing rules", count = .result.failure_count())]
    ExecutionFailed { result: Box<ValidationResult> },
}

impl PipelineError {
    /// The stage the error was raised in.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Stage(failure) => failure.stage,
            Self::ExecutionFailed { .. } => Stage::Executor,
        }
    }

    /// The failing rules, violations first, when input validation failed.
    pub fn validation_result(&self) -> Option<&ValidationResult> {
        match self {
            Self::ExecutionFailed { result } => Some(result.as_ref()),
            Self::Stage(_) => None,
        }
    }
}

/// Stage-tagged record of a propagated error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{stage} stage failed with {error_type}: {message}")]
pub struct StageFailure {
    pub stage: Stage,
    /// Short name of the error kind, like `ParseError`.
    pub error_type: String,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: Stage, error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    pub(crate) fn from_shape_error(stage: Stage, error: &ShapeError) -> Self {
        Self::new(stage, error.kind(), error.to_string())
    }
}

/// Error raised when signatures cannot be linked to rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum LinkError {
    #[error("Signature #{index} has an empty name")]
    EmptySignatureName { index: usize },
    #[error("Signature '{name}' is defined twice")]
    DuplicateSignature { name: String },
}

/// Error returned by a [`SignatureRunner`](crate::SignatureRunner).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Signature '{signature}' failed: {message}")]
pub struct RunnerError {
    pub signature: String,
    pub message: String,
}

impl RunnerError {
    pub fn new(signature: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxshape::CompileError;

    #[test]
    fn test_stage_failure_from_shape_error() {
        let error = ShapeError::from(CompileError::empty_source("no shapes"));
        let failure = StageFailure::from_shape_error(Stage::Compiler, &error);
        assert_eq!(failure.error_type, "CompilationError");
        assert_eq!(failure.message, "Empty shape source: no shapes");
        assert_eq!(
            failure.to_string(),
            "compiler stage failed with CompilationError: Empty shape source: no shapes"
        );
    }

    #[test]
    fn test_execution_failure_message() {
        let error = PipelineError::ExecutionFailed {
            result: Box::default(),
        };
        assert_eq!(error.stage(), Stage::Executor);
        assert_eq!(error.to_string(), "Input validation failed with 0 failing rules");
        assert!(error.validation_result().is_some());
    }
}
