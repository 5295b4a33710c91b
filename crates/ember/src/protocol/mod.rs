//! # Host Tensor Protocol
//!
//! Types for the request/response protocol the host speaks: every request is
//! a set of named tensors, and every response is a set of named tensors or an
//! error.
//!
//! | Field         | Direction | Element type | Shape  |
//! |---------------|-----------|--------------|--------|
//! | `text_input`  | in        | bytes (UTF-8)| `1x1`  |
//! | `max_tokens`  | in        | int32/int64  | `1x1`  |
//! | `temperature` | in        | fp32/fp64    | `1x1`  |
//! | `text_output` | out       | bytes (UTF-8)| `1x1`  |

mod request;
mod tensor;

pub use request::{InferenceRequest, InferenceResponse};
pub use tensor::{HostTensor, TensorData};

/// Prompt text input
pub const TEXT_INPUT: &str = "text_input";

/// Token budget input
pub const MAX_TOKENS: &str = "max_tokens";

/// Sampling temperature input
pub const TEMPERATURE: &str = "temperature";

/// Generated text output
pub const TEXT_OUTPUT: &str = "text_output";
