//! # Inference Request Handler
//!
//! Turns batches of host requests into batches of host responses using the
//! model handle produced at initialization.
//!
//! * [`GenerationRequest`] - The decoded and validated form of one request
//! * [`RequestHandler`] - The per-request pipeline and the batch failure policy

mod executor;
mod generation;

pub use executor::RequestHandler;
pub use generation::{GenerationRequest, GenerationResult, TEMPERATURE_EPSILON};
