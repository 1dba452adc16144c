#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
mod pipeline;
mod runner;
mod signature;
mod stages;

pub use error::{LinkError, PipelineError, RunnerError, Stage, StageFailure};
pub use pipeline::{Pipeline, PipelineConfig, PipelineRequest};
pub use runner::{EchoRunner, SignatureRunner};
pub use signature::{ExecutableSpecification, SignatureDefinition, SignatureField};
pub use stages::{ExecutionOutcome, Executor, SignatureLinker, ValidationCompiler};
