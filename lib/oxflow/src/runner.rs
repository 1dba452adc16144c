use serde_json::{Map, Value};

use crate::error::RunnerError;
use crate::signature::SignatureDefinition;

/// Executes signatures, typically by calling a language model backend.
pub trait SignatureRunner {
    /// Runs a signature on validated inputs and returns its outputs.
    fn run(
        &self,
        signature: &SignatureDefinition,
        inputs: &Map<String, Value>,
    ) -> Result<Map<String, Value>, RunnerError>;
}

impl<R: SignatureRunner + ?Sized> SignatureRunner for &R {
    fn run(
        &self,
        signature: &SignatureDefinition,
        inputs: &Map<String, Value>,
    ) -> Result<Map<String, Value>, RunnerError> {
        (**self).run(signature, inputs)
    }
}

/// Returns the inputs a signature declares as its outputs.
///
/// A signature declaring no input gets every input back. Useful to smoke-test
/// specifications without a model backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoRunner;

impl SignatureRunner for EchoRunner {
    fn run(
        &self,
        signature: &SignatureDefinition,
        inputs: &Map<String, Value>,
    ) -> Result<Map<String, Value>, RunnerError> {
        if signature.inputs.is_empty() {
            return Ok(inputs.clone());
        }
        Ok(signature
            .inputs
            .iter()
            .filter_map(|field| Some((field.name.clone(), inputs.get(&field.name)?.clone())))
            .collect())
    }
}
