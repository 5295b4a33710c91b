//! # Adapter Configuration
//!
//! The host hands the adapter its model configuration as an opaque JSON
//! document. The adapter only ever reads it: the optional `parameters` map is
//! consulted for overrides, everything else (including fields the adapter
//! does not know about) is left alone.
//!
//! Parameter values follow the host's `{"string_value": "..."}` convention:
//!
//! ```json
//! {
//!     "name": "tinyllama",
//!     "parameters": {
//!         "model_id": { "string_value": "TinyLlama/TinyLlama-1.1B-Chat-v1.0" },
//!         "failure_policy": { "string_value": "abort_batch" }
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Model served when the host config does not name one
pub const DEFAULT_MODEL_ID: &str = "TinyLlama/TinyLlama-1.1B-Chat-v1.0";

/// Artifact revision fetched when none is configured
pub const DEFAULT_REVISION: &str = "main";

/// Cache directory for downloaded model artifacts
pub const DEFAULT_CACHE_DIR: &str = "/tmp/model_cache";

/// Prompts are truncated to this many tokens before generation
pub const DEFAULT_MAX_INPUT_TOKENS: usize = 512;

/// Seed for the sampling RNG of the first request; later requests continue from it
pub const DEFAULT_SEED: u64 = 299792458;

/// Sampled requests draw from this many most likely tokens; 0 samples the full vocabulary
pub const DEFAULT_TOP_K: usize = 50;

/// Errors raised while reading the host model configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("model config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parameter `{key}` has invalid value `{value}`: {reason}")]
    InvalidParameter {
        key: String,
        value: String,
        reason: String,
    },
}

/// What `execute` does when one request in a batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The failing request gets an error response; the rest of the batch proceeds
    #[default]
    Isolate,
    /// The first failure is returned from `execute` and later requests are skipped
    AbortBatch,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "isolate" => Ok(Self::Isolate),
            "abort_batch" => Ok(Self::AbortBatch),
            other => Err(format!("expected `isolate` or `abort_batch`, got `{other}`")),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Isolate => write!(f, "isolate"),
            Self::AbortBatch => write!(f, "abort_batch"),
        }
    }
}

/// Where and what to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Hub identifier of the model and its tokenizer
    pub model_id: String,
    /// Hub revision (branch, tag or commit)
    pub revision: String,
    /// Directory holding downloaded artifacts across restarts
    pub cache_dir: PathBuf,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            revision: DEFAULT_REVISION.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

/// Knobs applied to every request the handler serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerSettings {
    pub max_input_tokens: usize,
    pub seed: u64,
    pub top_k: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            max_input_tokens: DEFAULT_MAX_INPUT_TOKENS,
            seed: DEFAULT_SEED,
            top_k: DEFAULT_TOP_K,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Configuration the adapter derives from the host model config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Model name as registered with the host, used for log context
    pub name: Option<String>,
    pub model: ModelSettings,
    pub handler: HandlerSettings,
}

#[derive(Deserialize)]
struct HostModelConfig {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parameters: HashMap<String, HostParameter>,
}

#[derive(Deserialize)]
struct HostParameter {
    string_value: String,
}

impl AdapterConfig {
    /// Read the adapter configuration out of the host's model config JSON.
    ///
    /// Missing parameters fall back to their defaults; unknown parameters
    /// are ignored.
    pub fn from_model_config(json: &str) -> Result<Self, ConfigError> {
        let host: HostModelConfig = serde_json::from_str(json)?;
        let mut config = Self {
            name: host.name,
            ..Default::default()
        };

        for (key, value) in host.parameters {
            let value = value.string_value;
            match key.as_str() {
                "model_id" => config.model.model_id = non_empty(&key, value)?,
                "revision" => config.model.revision = non_empty(&key, value)?,
                "cache_dir" => config.model.cache_dir = PathBuf::from(non_empty(&key, value)?),
                "max_input_tokens" => {
                    config.handler.max_input_tokens = parse(&key, &value)?;
                    if config.handler.max_input_tokens == 0 {
                        return Err(invalid(&key, &value, "must be positive"));
                    }
                }
                "seed" => config.handler.seed = parse(&key, &value)?,
                "top_k" => config.handler.top_k = parse(&key, &value)?,
                "failure_policy" => config.handler.failure_policy = parse(&key, &value)?,
                _ => {}
            }
        }

        Ok(config)
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, value, e.to_string()))
}

fn non_empty(key: &str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        Err(invalid(key, &value, "must not be empty"))
    } else {
        Ok(value)
    }
}

fn invalid(key: &str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}
