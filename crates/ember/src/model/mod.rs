//! # Model Lifecycle
//!
//! Acquires a tokenizer and a causal language model, places them on a
//! device, and hands them to the request handler as one shared, read-only
//! [`ModelHandle`].
//!
//! ## Key Components
//!
//! * [`TextTokenizer`], [`TextGenerator`] - The capabilities a loaded model exposes
//! * [`ModelLoader`] - Turns [`ModelSettings`](crate::config::ModelSettings) into a handle
//! * [`Placement`] - The binary accelerator/CPU policy
//! * [`ModelLifecycle`] - Drives bootstrap, cache preparation and loading, and owns teardown
//!
//! ## Feature Flags
//!
//! - `candle`: Enables [`CandleLoader`], a loader for llama-architecture chat
//!   models fetched from the HuggingFace hub

mod core_trait;
mod handle;
mod lifecycle;

#[cfg_attr(docsrs, doc(cfg(feature = "candle")))]
#[cfg(feature = "candle")]
mod chat_template;

#[cfg_attr(docsrs, doc(cfg(feature = "candle")))]
#[cfg(feature = "candle")]
/// Candle model backend.
///
/// This module is only available when the `candle` feature flag is enabled.
pub mod candle;

#[cfg(test)]
pub(crate) mod mock_model;

pub use core_trait::*;
pub use handle::{DeviceTag, ModelHandle, Placement, Precision};
pub use lifecycle::ModelLifecycle;

#[cfg(feature = "candle")]
pub use self::candle::{CandleGenerator, CandleLoader, CandleTokenizer};
#[cfg(feature = "candle")]
pub use chat_template::ChatTemplate;
