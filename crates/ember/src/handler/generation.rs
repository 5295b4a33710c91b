use crate::error::{Error, Result};
use crate::model::{GenerationParams, TextTokenizer};
use crate::protocol::{HostTensor, InferenceRequest, InferenceResponse, MAX_TOKENS, TEMPERATURE, TEXT_INPUT, TEXT_OUTPUT};

/// Stand-in for a requested temperature of zero. Generation backends divide
/// logits by the temperature, so it must stay strictly positive.
pub const TEMPERATURE_EPSILON: f64 = 1e-7;

/// The structured form of one host request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Always positive
    pub max_new_tokens: usize,
    /// Finite and non-negative; zero means greedy decoding
    pub temperature: f64,
}

impl GenerationRequest {
    /// Read the prompt, token budget and temperature out of `request`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] if a field is missing, has the wrong element
    /// type or is empty, if the prompt is not UTF-8, if the token budget is
    /// not positive, or if the temperature is negative or not finite.
    pub fn from_request(request: &InferenceRequest) -> Result<Self> {
        let prompt = request.input_by_name(TEXT_INPUT)?.first_str()?.to_string();

        let max_tokens = request.input_by_name(MAX_TOKENS)?.first_int()?;
        if max_tokens <= 0 {
            return Err(Error::invalid_request(format!(
                "`{MAX_TOKENS}` must be positive, got {max_tokens}"
            )));
        }
        let max_new_tokens = usize::try_from(max_tokens)
            .map_err(|_| Error::invalid_request(format!("`{MAX_TOKENS}` out of range: {max_tokens}")))?;

        let temperature = request.input_by_name(TEMPERATURE)?.first_float()?;
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(Error::invalid_request(format!(
                "`{TEMPERATURE}` must be finite and non-negative, got {temperature}"
            )));
        }

        Ok(Self {
            prompt,
            max_new_tokens,
            temperature,
        })
    }

    /// Whether this request asks for sampling rather than greedy decoding.
    pub fn do_sample(&self) -> bool {
        self.temperature > 0.0
    }

    /// The arguments for the generation call serving this request.
    pub fn params(&self, tokenizer: &dyn TextTokenizer, top_k: usize, seed: u64) -> GenerationParams {
        let temperature = if self.temperature == 0.0 {
            TEMPERATURE_EPSILON
        } else {
            self.temperature
        };

        GenerationParams {
            max_new_tokens: self.max_new_tokens,
            temperature,
            do_sample: self.do_sample(),
            top_k,
            pad_token_id: tokenizer.pad_token_id(),
            eos_token_id: tokenizer.eos_token_id(),
            seed,
        }
    }
}

/// Text generated for one [`GenerationRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub text: String,
}

impl GenerationResult {
    pub fn into_response(self) -> InferenceResponse {
        InferenceResponse::new(vec![HostTensor::string(TEXT_OUTPUT, &self.text)])
    }
}
