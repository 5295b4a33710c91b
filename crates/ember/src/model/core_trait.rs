use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::handle::{ModelHandle, Placement};
use crate::config::ModelSettings;
use crate::error::Result;

/// A chat message in the role/content form chat templates consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

/// Token ids of a tokenized prompt, with the matching attention mask.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncodedPrompt {
    pub input_ids: Vec<u32>,
    /// One entry per id. Prompts are generated one at a time and never padded,
    /// so generators may ignore it; it is all ones for an unpadded prompt.
    pub attention_mask: Vec<u32>,
}

impl EncodedPrompt {
    pub fn new(input_ids: Vec<u32>) -> Self {
        let attention_mask = vec![1; input_ids.len()];
        Self {
            input_ids,
            attention_mask,
        }
    }

    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Arguments of a single generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub max_new_tokens: usize,
    /// Always positive; a requested temperature of zero arrives here as an epsilon
    pub temperature: f64,
    /// `false` selects greedy decoding regardless of `temperature`
    pub do_sample: bool,
    /// When sampling, only the `top_k` most likely tokens are candidates; 0 disables the cut
    pub top_k: usize,
    pub pad_token_id: u32,
    pub eos_token_id: u32,
    /// Seed for this call's sampling RNG
    pub seed: u64,
}

/// # TextTokenizer
///
/// The tokenizer capability of a loaded model: chat templating, encoding and
/// decoding, and the special token ids generation needs.
///
/// Implementations are read-only after loading, so one instance can serve
/// every request for the process lifetime.
pub trait TextTokenizer: Send + Sync {
    /// Render `messages` through the model's chat template without tokenizing.
    ///
    /// With `add_generation_prompt` the template's assistant-turn prefix is
    /// appended, so generation continues as the assistant.
    fn apply_chat_template(&self, messages: &[ChatMessage], add_generation_prompt: bool) -> Result<String>;

    /// Tokenize `text`, keeping at most `max_length` tokens.
    fn encode(&self, text: &str, max_length: usize) -> Result<EncodedPrompt>;

    /// Turn token ids back into text.
    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String>;

    fn eos_token_id(&self) -> u32;

    /// Padding id. Loaders set this to the eos id for models without a
    /// dedicated padding token.
    fn pad_token_id(&self) -> u32;
}

/// # TextGenerator
///
/// The generation capability of a loaded model.
///
/// Each call handles exactly one prompt. The returned sequence starts with
/// the prompt's own ids, followed by at most `params.max_new_tokens` new ids.
/// Generation stops early once `params.eos_token_id` is produced.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &EncodedPrompt, params: &GenerationParams) -> Result<Vec<u32>>;
}

/// # ModelLoader
///
/// Acquires a tokenizer and model and packages them as a [`ModelHandle`].
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Whether a hardware accelerator can be used on this machine.
    fn accelerator_available(&self) -> bool;

    /// Load the model described by `settings` under `placement`.
    ///
    /// The cache directory in `settings` already exists when this is called.
    async fn load(&self, settings: &ModelSettings, placement: Placement) -> Result<ModelHandle>;
}
