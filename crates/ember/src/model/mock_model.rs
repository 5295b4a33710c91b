use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::core_trait::{ChatMessage, EncodedPrompt, GenerationParams, ModelLoader, TextGenerator, TextTokenizer};
use super::handle::{ModelHandle, Placement};
use crate::config::ModelSettings;
use crate::error::{Error, Result};

pub const BOS: u32 = 1;
pub const EOS: u32 = 2;
const BYTE_OFFSET: u32 = 3;

const USER_PREFIX: &str = "<|user|>\n";
const USER_SUFFIX: &str = "</s>\n";
const ASSISTANT_PREFIX: &str = "<|assistant|>\n";

// A byte-level tokenizer: id 0 is unk, 1 bos, 2 eos, every other id is a byte + 3.
#[derive(Debug, Clone, Default)]
pub struct MockTokenizer;

impl TextTokenizer for MockTokenizer {
    fn apply_chat_template(&self, messages: &[ChatMessage], add_generation_prompt: bool) -> Result<String> {
        let mut rendered = String::new();
        for message in messages {
            if message.role != "user" {
                return Err(Error::Template(format!("unsupported role {}", message.role)));
            }
            rendered.push_str(USER_PREFIX);
            rendered.push_str(&message.content);
            rendered.push_str(USER_SUFFIX);
        }
        if add_generation_prompt {
            rendered.push_str(ASSISTANT_PREFIX);
        }
        Ok(rendered)
    }

    fn encode(&self, text: &str, max_length: usize) -> Result<EncodedPrompt> {
        let mut ids = vec![BOS];
        ids.extend(text.bytes().map(|b| u32::from(b) + BYTE_OFFSET));
        ids.truncate(max_length);
        Ok(EncodedPrompt::new(ids))
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        let bytes: Vec<u8> = ids
            .iter()
            .filter(|id| !(skip_special_tokens && **id < BYTE_OFFSET))
            .map(|id| id.saturating_sub(BYTE_OFFSET) as u8)
            .collect();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn eos_token_id(&self) -> u32 {
        EOS
    }

    fn pad_token_id(&self) -> u32 {
        EOS
    }
}

/// A generation call as observed by [`MockGenerator`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationCall {
    pub prompt: EncodedPrompt,
    pub params: GenerationParams,
}

// Replies with the upper-cased user message followed by eos, cut to the token budget.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator {
    pub calls: Arc<Mutex<Vec<GenerationCall>>>,
    pub fail_on: Option<String>,
}

impl MockGenerator {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_on: Some(marker.to_string()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<GenerationCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &EncodedPrompt, params: &GenerationParams) -> Result<Vec<u32>> {
        self.calls.lock().unwrap().push(GenerationCall {
            prompt: prompt.clone(),
            params: params.clone(),
        });

        let rendered = MockTokenizer.decode(&prompt.input_ids, true)?;
        if let Some(marker) = &self.fail_on {
            if rendered.contains(marker.as_str()) {
                return Err(Error::Generation(format!("prompt contains {marker}")));
            }
        }

        let content = rendered
            .strip_prefix(USER_PREFIX)
            .and_then(|rest| rest.split(USER_SUFFIX).next())
            .unwrap_or_default();

        let mut reply: Vec<u32> = content
            .to_uppercase()
            .bytes()
            .map(|b| u32::from(b) + BYTE_OFFSET)
            .collect();
        reply.push(params.eos_token_id);
        reply.truncate(params.max_new_tokens);

        let mut sequence = prompt.input_ids.clone();
        sequence.extend(reply);
        Ok(sequence)
    }
}

/// Loader handing out mock handles, recording every placement it was asked for.
#[derive(Debug, Clone, Default)]
pub struct MockLoader {
    pub accelerator: bool,
    pub fail: bool,
    pub generator: MockGenerator,
    pub loads: Arc<Mutex<Vec<(ModelSettings, Placement)>>>,
}

#[async_trait]
impl ModelLoader for MockLoader {
    fn accelerator_available(&self) -> bool {
        self.accelerator
    }

    async fn load(&self, settings: &ModelSettings, placement: Placement) -> Result<ModelHandle> {
        self.loads.lock().unwrap().push((settings.clone(), placement));
        if self.fail {
            return Err(Error::ModelLoad(format!("cannot load {}", settings.model_id)));
        }
        Ok(ModelHandle::new(
            Box::new(MockTokenizer),
            Box::new(self.generator.clone()),
            placement.device,
        ))
    }
}
