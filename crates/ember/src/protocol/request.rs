use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tensor::HostTensor;
use crate::error::{Error, Result};

/// One request from the host: a set of named input tensors.
///
/// `InferenceRequest` wraps the host inputs with a unique identifier, used
/// to correlate log lines for a request through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// Unique identifier for this request
    id: Uuid,

    /// Named input tensors, in the order the host supplied them
    inputs: Vec<HostTensor>,
}

impl InferenceRequest {
    /// Creates a new `InferenceRequest` with a randomly generated id.
    pub fn new(inputs: Vec<HostTensor>) -> Self {
        Self {
            id: Uuid::new_v4(),
            inputs,
        }
    }

    /// Returns the unique identifier for this request.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn inputs(&self) -> &[HostTensor] {
        &self.inputs
    }

    /// Looks up an input tensor by name.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] if the request has no input called `name`.
    pub fn input_by_name(&self, name: &str) -> Result<&HostTensor> {
        self.inputs
            .iter()
            .find(|tensor| tensor.name() == name)
            .ok_or_else(|| Error::invalid_request(format!("missing input `{name}`")))
    }
}

impl PartialEq<Uuid> for InferenceRequest {
    fn eq(&self, other: &Uuid) -> bool {
        self.id == *other
    }
}

/// The answer to one [`InferenceRequest`]: output tensors, or an error
/// message reported to the host for that request alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    outputs: Vec<HostTensor>,
    error: Option<String>,
}

impl InferenceResponse {
    pub fn new(outputs: Vec<HostTensor>) -> Self {
        Self {
            outputs,
            error: None,
        }
    }

    /// A response that reports `error` in place of outputs.
    pub fn from_error(error: &Error) -> Self {
        Self {
            outputs: vec![],
            error: Some(error.to_string()),
        }
    }

    pub fn outputs(&self) -> &[HostTensor] {
        &self.outputs
    }

    pub fn output_by_name(&self, name: &str) -> Option<&HostTensor> {
        self.outputs.iter().find(|tensor| tensor.name() == name)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
