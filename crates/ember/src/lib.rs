//! # Ember
//!
//! A self-bootstrapping text-generation adapter for inference-server hosts.
//!
//! ## Overview
//!
//! Ember runs inside a host process that owns scheduling, batching and
//! transport. The host loads the adapter once, sends it batches of requests
//! in a tensor-based protocol, and shuts it down at the end. Ember in turn:
//!
//! - Installs the pinned runtime packages it needs, with bounded retries
//! - Loads a causal language model and its tokenizer onto the best available device
//! - Serves each request by templating, tokenizing, generating and decoding
//!
//! ## Architecture
//!
//! ### Dependency Bootstrap
//!
//! The [`Bootstrapper`](bootstrap::Bootstrapper) walks a fixed, ordered list
//! of [`PackageSpec`](bootstrap::PackageSpec)s. Missing packages are
//! installed through a [`PackageManager`](bootstrap::PackageManager), with up
//! to three attempts and a fixed backoff. The first package that cannot be
//! installed aborts initialization.
//!
//! ### Model Lifecycle
//!
//! The [`ModelLifecycle`](model::ModelLifecycle) turns configuration into one
//! shared, read-only [`ModelHandle`](model::ModelHandle). Device selection is
//! binary: half precision on an accelerator, full precision on the CPU.
//!
//! ### Request Handling
//!
//! The [`RequestHandler`](handler::RequestHandler) serves a batch one
//! request at a time, in order. Every request yields exactly one response.
//!
//! ## Features
//!
//! - **candle** - Enables the candle backend for llama-architecture models
//! - **cuda** - Enables the candle backend with CUDA kernels
//!
//! ## Example
//!
//! ```ignore
//! use ember::adapter::Adapter;
//! use ember::model::CandleLoader;
//! use ember::protocol::{HostTensor, InferenceRequest};
//!
//! let mut adapter = Adapter::with_pinned_packages(CandleLoader::default());
//! adapter.initialize(r#"{"name": "tinyllama"}"#).await?;
//!
//! let responses = adapter
//!     .execute(vec![InferenceRequest::new(vec![
//!         HostTensor::string("text_input", "Hello"),
//!         HostTensor::int32("max_tokens", 20),
//!         HostTensor::fp32("temperature", 0.0),
//!     ])])
//!     .await?;
//!
//! adapter.finalize();
//! ```

pub mod adapter;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handler;
pub mod model;
pub mod protocol;

pub use adapter::Adapter;
pub use config::{AdapterConfig, FailurePolicy};
pub use error::{Error, Result};

/// Convenient imports for hosts driving the adapter.
pub mod prelude {
    pub use crate::adapter::Adapter;
    pub use crate::bootstrap::{Bootstrapper, PINNED_PACKAGES, PackageManager, PackageSpec, PipPackageManager};
    pub use crate::config::{AdapterConfig, FailurePolicy};
    pub use crate::error::{Error, Result};
    pub use crate::model::{ModelLoader, TextGenerator, TextTokenizer};
    pub use crate::protocol::{
        HostTensor, InferenceRequest, InferenceResponse, MAX_TOKENS, TEMPERATURE, TEXT_INPUT, TEXT_OUTPUT,
    };

    #[cfg(feature = "candle")]
    pub use crate::model::CandleLoader;
}
