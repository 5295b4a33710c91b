use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{Instrument, debug, info_span, warn};

use super::generation::{GenerationRequest, GenerationResult};
use crate::config::{FailurePolicy, HandlerSettings};
use crate::error::Result;
use crate::model::{ChatMessage, ModelHandle};
use crate::protocol::{InferenceRequest, InferenceResponse};

/// # RequestHandler
///
/// Serves batches of host requests against a loaded [`ModelHandle`].
///
/// Every request goes through the same pipeline: decode the host tensors,
/// render the prompt as a single user turn of the model's chat template,
/// tokenize with truncation, generate, strip the prompt from the output and
/// decode the new tokens into a `text_output` tensor.
///
/// Requests in a batch are independent and are served one at a time, in
/// order. What happens when one of them fails is decided by the
/// [`FailurePolicy`] in [`HandlerSettings`].
///
/// The configured seed starts a sequence: every generation call takes the
/// next seed, so repeated sampled requests draw different tokens while a
/// fresh handler replays the same sequence.
pub struct RequestHandler {
    handle: Arc<ModelHandle>,
    settings: HandlerSettings,
    next_seed: AtomicU64,
}

impl RequestHandler {
    pub fn new(handle: Arc<ModelHandle>, settings: HandlerSettings) -> Self {
        let next_seed = AtomicU64::new(settings.seed);
        Self {
            handle,
            settings,
            next_seed,
        }
    }

    pub fn settings(&self) -> &HandlerSettings {
        &self.settings
    }

    /// Serve a batch; response `i` answers `requests[i]`.
    ///
    /// # Errors
    ///
    /// Only with [`FailurePolicy::AbortBatch`]: the first request that fails
    /// ends the batch and its error is returned. With
    /// [`FailurePolicy::Isolate`] failures become error responses in place.
    pub async fn execute(&self, requests: Vec<InferenceRequest>) -> Result<Vec<InferenceResponse>> {
        let batch_size = requests.len();
        debug!(batch_size, "executing batch");

        let responses = stream::iter(requests).then(|request| async move {
            let result = self.respond(&request).await;
            (request.id(), result)
        });

        match self.settings.failure_policy {
            FailurePolicy::AbortBatch => {
                responses
                    .map(|(_, result)| result)
                    .try_collect()
                    .await
            }
            FailurePolicy::Isolate => Ok(responses
                .map(|(id, result)| {
                    result.unwrap_or_else(|e| {
                        warn!(request_id = %id, error = %e, "request failed");
                        InferenceResponse::from_error(&e)
                    })
                })
                .collect::<Vec<_>>()
                .await),
        }
    }

    /// Run one request through the full pipeline.
    pub async fn respond(&self, request: &InferenceRequest) -> Result<InferenceResponse> {
        let span = info_span!("request", request_id = %request.id());
        async move {
            let generation = GenerationRequest::from_request(request)?;
            let result = self.generate(&generation).await?;
            Ok(result.into_response())
        }
        .instrument(span)
        .await
    }

    /// Generate text for an already decoded request.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let tokenizer = self.handle.tokenizer();

        let prompt = tokenizer.apply_chat_template(&[ChatMessage::user(request.prompt.as_str())], true)?;
        let encoded = tokenizer.encode(&prompt, self.settings.max_input_tokens)?;
        // fetch_add wraps on overflow
        let seed = self.next_seed.fetch_add(1, Ordering::Relaxed);
        let params = request.params(tokenizer, self.settings.top_k, seed);
        debug!(
            prompt_tokens = encoded.len(),
            max_new_tokens = params.max_new_tokens,
            do_sample = params.do_sample,
            seed,
            device = %self.handle.device(),
            "generating"
        );

        let sequence = self.handle.generator().generate(&encoded, &params).await?;
        let new_tokens = sequence.get(encoded.len()..).unwrap_or_default();
        let text = tokenizer.decode(new_tokens, true)?;
        debug!(new_tokens = new_tokens.len(), "generation finished");

        Ok(GenerationResult { text })
    }
}
