use std::path::Path;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::llama::{Cache, Config, Llama, LlamaConfig};
use hf_hub::api::tokio::ApiBuilder;
use hf_hub::{Repo, RepoType};
use serde::Deserialize;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task;
use tokenizers::{PaddingParams, Tokenizer, TruncationDirection};
use tracing::{debug, info};

use super::chat_template::ChatTemplate;
use super::core_trait::{ChatMessage, EncodedPrompt, GenerationParams, ModelLoader, TextGenerator, TextTokenizer};
use super::handle::{DeviceTag, ModelHandle, Placement, Precision};
use crate::config::ModelSettings;
use crate::error::{Error, Result};

const TOKENIZER_FILE: &str = "tokenizer.json";
const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";
const MODEL_CONFIG_FILE: &str = "config.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// Loads llama-architecture chat models from the hub into candle.
#[derive(Debug, Clone, Default)]
pub struct CandleLoader {
    cuda_ordinal: usize,
}

impl CandleLoader {
    pub fn new(cuda_ordinal: usize) -> Self {
        Self { cuda_ordinal }
    }

    fn device(&self, placement: &Placement) -> Result<Device> {
        match placement.device {
            DeviceTag::Cpu => Ok(Device::Cpu),
            DeviceTag::Cuda(_) => Ok(Device::new_cuda(self.cuda_ordinal)?),
        }
    }
}

#[async_trait]
impl ModelLoader for CandleLoader {
    fn accelerator_available(&self) -> bool {
        candle_core::utils::cuda_is_available() && Device::new_cuda(self.cuda_ordinal).is_ok()
    }

    async fn load(&self, settings: &ModelSettings, placement: Placement) -> Result<ModelHandle> {
        let device = self.device(&placement)?;
        let dtype = match placement.precision {
            Precision::F16 => DType::F16,
            Precision::F32 => DType::F32,
        };

        let api = ApiBuilder::new()
            .with_cache_dir(settings.cache_dir.clone())
            .with_progress(false)
            .build()?;
        let repo = api.repo(Repo::with_revision(
            settings.model_id.clone(),
            RepoType::Model,
            settings.revision.clone(),
        ));

        let tokenizer_file = repo.get(TOKENIZER_FILE).await?;
        let tokenizer_config_file = repo.get(TOKENIZER_CONFIG_FILE).await?;
        let tokenizer = CandleTokenizer::from_files(&tokenizer_file, &tokenizer_config_file)?;
        debug!(eos = tokenizer.eos_token_id, "tokenizer ready");

        let config_file = repo.get(MODEL_CONFIG_FILE).await?;
        let weights_file = repo.get(WEIGHTS_FILE).await?;
        let generator = CandleGenerator::load(&config_file, &weights_file, dtype, device)?;
        info!(model_id = %settings.model_id, ?dtype, "weights loaded");

        let device_tag = match placement.device {
            DeviceTag::Cpu => DeviceTag::Cpu,
            DeviceTag::Cuda(_) => DeviceTag::Cuda(self.cuda_ordinal),
        };
        Ok(ModelHandle::new(Box::new(tokenizer), Box::new(generator), device_tag))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SpecialToken {
    Plain(String),
    Added { content: String },
}

impl SpecialToken {
    fn into_content(self) -> String {
        match self {
            Self::Plain(content) | Self::Added { content } => content,
        }
    }
}

#[derive(Deserialize)]
struct TokenizerConfig {
    chat_template: Option<String>,
    bos_token: Option<SpecialToken>,
    eos_token: Option<SpecialToken>,
}

/// [`TextTokenizer`] over a HuggingFace `tokenizers` tokenizer and the chat
/// template from its `tokenizer_config.json`.
pub struct CandleTokenizer {
    inner: Tokenizer,
    template: ChatTemplate,
    eos_token_id: u32,
}

impl CandleTokenizer {
    pub fn from_files(tokenizer_file: &Path, config_file: &Path) -> Result<Self> {
        let inner = Tokenizer::from_file(tokenizer_file).map_err(|e| Error::Tokenizer(e.to_string()))?;
        let config = std::fs::read_to_string(config_file)?;
        Self::new(inner, &config)
    }

    /// Build from a loaded tokenizer and the text of its `tokenizer_config.json`.
    ///
    /// The padding token is set to the eos token: the chat models served here
    /// ship without a padding token of their own.
    pub fn new(mut inner: Tokenizer, config_json: &str) -> Result<Self> {
        let config: TokenizerConfig = serde_json::from_str(config_json)?;

        let eos_token = config
            .eos_token
            .map(SpecialToken::into_content)
            .ok_or_else(|| Error::Tokenizer("tokenizer config has no eos_token".to_string()))?;
        let bos_token = config.bos_token.map(SpecialToken::into_content).unwrap_or_default();
        let eos_token_id = inner
            .token_to_id(&eos_token)
            .ok_or_else(|| Error::Tokenizer(format!("eos token `{eos_token}` is not in the vocabulary")))?;

        inner.with_padding(Some(PaddingParams {
            pad_id: eos_token_id,
            pad_token: eos_token.clone(),
            ..Default::default()
        }));

        let source = config
            .chat_template
            .ok_or_else(|| Error::Template("tokenizer config has no chat_template".to_string()))?;
        let template = ChatTemplate::new(source, bos_token, eos_token)?;

        Ok(Self {
            inner,
            template,
            eos_token_id,
        })
    }
}

impl TextTokenizer for CandleTokenizer {
    fn apply_chat_template(&self, messages: &[ChatMessage], add_generation_prompt: bool) -> Result<String> {
        self.template.render(messages, add_generation_prompt)
    }

    fn encode(&self, text: &str, max_length: usize) -> Result<EncodedPrompt> {
        let mut encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| Error::Tokenizer(e.to_string()))?;
        encoding.truncate(max_length, 0, TruncationDirection::Right);

        Ok(EncodedPrompt {
            input_ids: encoding.get_ids().to_vec(),
            attention_mask: encoding.get_attention_mask().to_vec(),
        })
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        self.inner
            .decode(ids, skip_special_tokens)
            .map_err(|e| Error::Tokenizer(e.to_string()))
    }

    fn eos_token_id(&self) -> u32 {
        self.eos_token_id
    }

    fn pad_token_id(&self) -> u32 {
        self.inner
            .get_padding()
            .map(|padding| padding.pad_id)
            .unwrap_or(self.eos_token_id)
    }
}

/// [`TextGenerator`] running a candle llama model.
///
/// Weights are plain tensors without gradient tracking, so the model is in
/// inference mode from the moment it is loaded. Every call gets a fresh KV
/// cache, which keeps requests independent of one another.
pub struct CandleGenerator {
    model: Llama,
    config: Config,
    device: Device,
    dtype: DType,
}

impl CandleGenerator {
    pub fn load(config_file: &Path, weights_file: &Path, dtype: DType, device: Device) -> Result<Self> {
        let llama_config: LlamaConfig = serde_json::from_slice(&std::fs::read(config_file)?)?;
        let config = llama_config.into_config(false);

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_file], dtype, &device)? };
        Self::from_var_builder(vb, config, dtype, device)
    }

    pub fn from_var_builder(vb: VarBuilder, config: Config, dtype: DType, device: Device) -> Result<Self> {
        let model = Llama::load(vb, &config)?;
        Ok(Self {
            model,
            config,
            device,
            dtype,
        })
    }

    fn sampling(params: &GenerationParams) -> Sampling {
        let temperature = params.temperature;
        match (params.do_sample, params.top_k) {
            (false, _) => Sampling::ArgMax,
            (true, 0) => Sampling::All { temperature },
            (true, k) => Sampling::TopK { k, temperature },
        }
    }

    fn generate_blocking(&self, prompt: &EncodedPrompt, params: &GenerationParams) -> Result<Vec<u32>> {
        if prompt.is_empty() {
            return Err(Error::Generation("prompt encodes to no tokens".to_string()));
        }

        let mut cache = Cache::new(true, self.dtype, &self.config, &self.device)?;
        let mut logits_processor = LogitsProcessor::from_sampling(params.seed, Self::sampling(params));
        let mut tokens = prompt.input_ids.clone();
        let mut index_pos = 0;

        for step in 0..params.max_new_tokens {
            if tokens.len() >= self.config.max_position_embeddings {
                debug!(len = tokens.len(), "context window full");
                break;
            }

            // the whole prompt on the first step, then only the newest token
            let context = if step == 0 {
                &tokens[..]
            } else {
                &tokens[tokens.len() - 1..]
            };
            let input = Tensor::new(context, &self.device)?.unsqueeze(0)?;
            let logits = self.model.forward(&input, index_pos, &mut cache)?;
            index_pos += context.len();

            let logits = logits.squeeze(0)?.to_dtype(DType::F32)?;
            let next = logits_processor.sample(&logits)?;
            tokens.push(next);
            if next == params.eos_token_id {
                break;
            }
        }

        Ok(tokens)
    }
}

#[async_trait]
impl TextGenerator for CandleGenerator {
    /// Runs the token loop in place on a multi-threaded runtime, so the worker's
    /// other tasks move to another thread while the model computes.
    async fn generate(&self, prompt: &EncodedPrompt, params: &GenerationParams) -> Result<Vec<u32>> {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                task::block_in_place(|| self.generate_blocking(prompt, params))
            }
            _ => self.generate_blocking(prompt, params),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const TOKENIZER_JSON: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            {"id": 0, "content": "<unk>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
            {"id": 1, "content": "<s>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
            {"id": 2, "content": "</s>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
        ],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {"<unk>": 0, "<s>": 1, "</s>": 2, "hello": 3, "world": 4, "again": 5},
            "unk_token": "<unk>"
        }
    }"#;

    const TOKENIZER_CONFIG: &str = r#"{
        "bos_token": "<s>",
        "eos_token": {"content": "</s>", "lstrip": false, "rstrip": false},
        "chat_template": "{% for message in messages %}{{ bos_token }} {{ message['content'] }} {{ eos_token }}{% endfor %}"
    }"#;

    fn word_level() -> Tokenizer {
        Tokenizer::from_str(TOKENIZER_JSON).unwrap()
    }

    fn params(do_sample: bool, top_k: usize) -> GenerationParams {
        GenerationParams {
            max_new_tokens: 4,
            temperature: if do_sample { 0.7 } else { 1e-7 },
            do_sample,
            top_k,
            pad_token_id: 2,
            eos_token_id: 2,
            seed: 1,
        }
    }

    #[test]
    fn test_sampled_path_is_top_k() {
        assert!(matches!(
            CandleGenerator::sampling(&params(true, 50)),
            Sampling::TopK { k: 50, temperature } if temperature == 0.7
        ));
        assert!(matches!(
            CandleGenerator::sampling(&params(true, 0)),
            Sampling::All { temperature } if temperature == 0.7
        ));
    }

    #[test]
    fn test_greedy_path_ignores_epsilon_temperature() {
        assert!(matches!(CandleGenerator::sampling(&params(false, 50)), Sampling::ArgMax));
    }

    #[test]
    fn test_special_token_forms() {
        let config: TokenizerConfig = serde_json::from_str(
            r#"{"bos_token": "<s>", "eos_token": {"content": "</s>", "lstrip": false}}"#,
        )
        .unwrap();
        assert_eq!(config.bos_token.map(SpecialToken::into_content).as_deref(), Some("<s>"));
        assert_eq!(config.eos_token.map(SpecialToken::into_content).as_deref(), Some("</s>"));
        assert!(config.chat_template.is_none());
    }

    #[test]
    fn test_pad_token_is_eos() {
        let tokenizer = CandleTokenizer::new(word_level(), TOKENIZER_CONFIG).unwrap();
        assert_eq!(tokenizer.eos_token_id(), 2);
        assert_eq!(tokenizer.pad_token_id(), tokenizer.eos_token_id());
    }

    #[test]
    fn test_encode_truncates_from_the_right() {
        let tokenizer = CandleTokenizer::new(word_level(), TOKENIZER_CONFIG).unwrap();

        let full = tokenizer.encode("hello world again hello", 512).unwrap();
        assert_eq!(full.input_ids, vec![3, 4, 5, 3]);
        assert_eq!(full.attention_mask, vec![1; 4]);

        let cut = tokenizer.encode("hello world again hello", 3).unwrap();
        assert_eq!(cut.len(), 3);
        assert_eq!(cut.input_ids, vec![3, 4, 5]);
    }

    #[test]
    fn test_decode_skips_special_tokens() {
        let tokenizer = CandleTokenizer::new(word_level(), TOKENIZER_CONFIG).unwrap();

        assert_eq!(tokenizer.decode(&[1, 3, 4, 2], true).unwrap(), "hello world");
        assert!(tokenizer.decode(&[1, 3, 4, 2], false).unwrap().contains("</s>"));
    }

    #[test]
    fn test_chat_template_round_trip() {
        let tokenizer = CandleTokenizer::new(word_level(), TOKENIZER_CONFIG).unwrap();

        let rendered = tokenizer
            .apply_chat_template(&[ChatMessage::user("hello world")], true)
            .unwrap();
        assert_eq!(rendered, "<s> hello world </s>");
        assert_eq!(tokenizer.encode(&rendered, 512).unwrap().input_ids, vec![1, 3, 4, 2]);
    }

    #[test]
    fn test_unknown_eos_token_is_rejected() {
        let config = r#"{"eos_token": "<|eot|>", "chat_template": "x"}"#;
        let err = CandleTokenizer::new(word_level(), config).err().unwrap();
        assert!(matches!(err, Error::Tokenizer(ref m) if m.contains("<|eot|>")));
    }

    #[test]
    fn test_missing_chat_template_is_rejected() {
        let config = r#"{"eos_token": "</s>"}"#;
        let err = CandleTokenizer::new(word_level(), config).err().unwrap();
        assert!(matches!(err, Error::Template(_)));
    }

    fn tiny_generator(max_position_embeddings: usize) -> CandleGenerator {
        let llama_config: LlamaConfig = serde_json::from_value(serde_json::json!({
            "hidden_size": 8,
            "intermediate_size": 16,
            "vocab_size": 16,
            "num_hidden_layers": 1,
            "num_attention_heads": 2,
            "num_key_value_heads": 2,
            "rms_norm_eps": 1e-5,
            "max_position_embeddings": max_position_embeddings,
            "tie_word_embeddings": false
        }))
        .unwrap();
        let config = llama_config.into_config(false);
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        CandleGenerator::from_var_builder(vb, config, DType::F32, Device::Cpu).unwrap()
    }

    fn no_eos(max_new_tokens: usize) -> GenerationParams {
        GenerationParams {
            max_new_tokens,
            eos_token_id: u32::MAX,
            ..params(false, 50)
        }
    }

    #[tokio::test]
    async fn test_generation_keeps_prompt_prefix_and_budget() {
        let generator = tiny_generator(64);
        let prompt = EncodedPrompt::new(vec![1, 3, 4]);

        let sequence = generator.generate(&prompt, &no_eos(5)).await.unwrap();
        assert_eq!(sequence.len(), 8);
        assert_eq!(&sequence[..3], &[1, 3, 4]);
        assert!(sequence[3..].iter().all(|id| *id < 16));
    }

    #[tokio::test]
    async fn test_generation_stops_at_eos() {
        let generator = tiny_generator(64);
        let prompt = EncodedPrompt::new(vec![1, 3]);
        let first = generator.generate(&prompt, &no_eos(1)).await.unwrap()[2];

        let params = GenerationParams {
            eos_token_id: first,
            ..no_eos(10)
        };
        let sequence = generator.generate(&prompt, &params).await.unwrap();
        assert_eq!(sequence, vec![1, 3, first]);
    }

    #[tokio::test]
    async fn test_generation_stops_at_context_window() {
        let generator = tiny_generator(6);
        let sequence = generator
            .generate(&EncodedPrompt::new(vec![1, 3, 4, 5]), &no_eos(10))
            .await
            .unwrap();
        assert_eq!(sequence.len(), 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_generation_on_multi_thread_runtime() {
        let generator = tiny_generator(64);
        let sequence = generator
            .generate(&EncodedPrompt::new(vec![1]), &no_eos(2))
            .await
            .unwrap();
        assert_eq!(sequence.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_prompt_is_rejected() {
        let generator = tiny_generator(64);
        let err = generator.generate(&EncodedPrompt::default(), &no_eos(2)).await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }
}
