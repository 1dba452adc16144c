#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod classify;
mod compile;
mod context;
mod engine;
mod error;
mod extract;
mod model;
mod processor;
mod rule;
mod store;
mod telemetry;
#[cfg(test)]
mod test_support;
pub mod validator;
pub mod vocab;

pub use classify::{ConstraintCategory, categorize, resolve_primary_type};
pub use compile::{
    CompilerFlavor, ExtendedRuleCompiler, LegacyRuleCompiler, RuleCompiler, RuleGranularity,
    ShapeContext,
};
pub use context::{EngineConfig, ValidationEngineContext, ValidatorStats};
pub use engine::{Performance, ResultDetail, ValidationEngine, ValidationResult};
pub use error::{CompileError, ShapeError, ShapeParseError};
pub use extract::{ConstraintExtractor, ExtractedShapes};
pub use model::{
    ConstraintKey, ConstraintMetadata, ConstraintRecord, ConstraintSet, ConstraintValue,
    NodeShapeRecord, PropertyShapeRecord, Severity,
};
pub use processor::ShaclProcessor;
pub use rule::{CompilationMetadata, CompiledValidation, RuleConstraint, ValidationRule};
pub use store::{ShapeFormat, ShapeGraph, ShapeGraphStore, ShapeSource};
pub use telemetry::{
    AttributeValue, MetricsSink, NoopSink, SpanGuard, SpanRecord, Telemetry, TelemetrySink,
    TracingSink,
};
