//! Error types for shape parsing and rule compilation.
//!
//! Validation failures are never errors: they are reported as data in a
//! [`ValidationResult`](crate::ValidationResult).

use oxrdfio::RdfParseError;

/// Main error type for oxshape operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ShapeError {
    /// Error parsing a shapes graph.
    #[error(transparent)]
    Parse(#[from] ShapeParseError),

    /// Error compiling validation rules.
    #[error(transparent)]
    Compilation(#[from] CompileError),
}

/// Error raised when shape source text cannot be parsed into a graph.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ShapeParseError {
    /// The RDF parser rejected the source.
    #[error("Invalid shapes graph: {0}")]
    Syntax(#[from] RdfParseError),

    /// The requested source format name is not supported.
    #[error("Unsupported shapes graph format '{format}'")]
    UnsupportedFormat { format: String },
}

/// Error raised when rules cannot be compiled from otherwise parseable input.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CompileError {
    /// No shape source was provided at all.
    #[error("Empty shape source: {message}")]
    EmptySource { message: String },
}

impl ShapeParseError {
    /// Creates an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }
}

impl CompileError {
    /// Creates an empty source error.
    pub fn empty_source(message: impl Into<String>) -> Self {
        Self::EmptySource {
            message: message.into(),
        }
    }
}

impl ShapeError {
    /// Short name of the error kind, used to tag stage failures.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => "ParseError",
            Self::Compilation(_) => "CompilationError",
        }
    }
}
