//! Vision model served by an edgequake-llm provider.
//!
//! The weights run elsewhere (vLLM, Ollama, an OpenAI-compatible endpoint);
//! this adapter sends the instruction and the processed page image as one
//! chat request per requested sequence, then re-tokenises each completion so
//! the result has the causal-LM shape `prompt ids ++ generated ids`.
//!
//! `generate` is called from the blocking pool, so it drives the async
//! provider through a captured runtime [`Handle`].

use crate::config::SamplingParams;
use crate::error::AnalyzerError;
use crate::pipeline::inference::{ModelInputs, VisionModel};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Duration;
use tokenizers::Tokenizer;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Model requested when none is configured.
pub const DEFAULT_MODEL: &str = "allenai/olmOCR-7B-0225-preview";

/// [`VisionModel`] that forwards generation to an LLM provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    tokenizer: Arc<Tokenizer>,
    handle: Handle,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl ProviderModel {
    /// Must be called inside a tokio runtime.
    pub fn new(provider: Arc<dyn LLMProvider>, tokenizer: Arc<Tokenizer>) -> Self {
        Self {
            provider,
            tokenizer,
            handle: Handle::current(),
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }

    pub fn with_retries(mut self, max_retries: u32, backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff_ms = backoff_ms;
        self
    }

    /// One completion, retried with exponential backoff.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, AnalyzerError> {
        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!("Retry {}/{} after {}ms", attempt, self.max_retries, backoff);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(messages, Some(options)).await {
                Ok(response) => {
                    debug!(
                        "{} input tokens, {} output tokens",
                        response.prompt_tokens, response.completion_tokens
                    );
                    return Ok(response.content);
                }
                Err(e) => {
                    warn!("Attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(e.to_string());
                }
            }
        }
        Err(AnalyzerError::InferenceFailed(
            last_err.unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }
}

impl VisionModel for ProviderModel {
    fn generate(
        &self,
        inputs: &ModelInputs,
        params: &SamplingParams,
    ) -> Result<Vec<Vec<u32>>, AnalyzerError> {
        let instruction = inputs
            .messages
            .iter()
            .map(|m| m.text())
            .collect::<Vec<_>>()
            .join("\n");
        let messages = vec![ChatMessage::user_with_images(
            &instruction,
            vec![ImageData::new(inputs.image_png_b64.clone(), "image/png")],
        )];
        let options = build_options(params);

        let mut sequences = Vec::with_capacity(params.num_return_sequences);
        for i in 0..params.num_return_sequences {
            let completion = self.handle.block_on(self.complete(&messages, &options))?;
            debug!("Sequence {}: {} chars", i, completion.len());

            let generated = self
                .tokenizer
                .encode(completion, false)
                .map_err(|e| AnalyzerError::InferenceFailed(format!("tokenization failed: {e}")))?;
            sequences.push(stitch_sequence(&inputs.input_ids, generated.get_ids()));
        }
        Ok(sequences)
    }
}

/// Greedy decoding is temperature 0 on a chat API.
pub fn effective_temperature(params: &SamplingParams) -> f32 {
    if params.do_sample {
        params.temperature
    } else {
        0.0
    }
}

fn build_options(params: &SamplingParams) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(effective_temperature(params)),
        max_tokens: Some(params.max_new_tokens),
        ..Default::default()
    }
}

/// `prompt ++ generated`.
pub fn stitch_sequence(prompt: &[u32], generated: &[u32]) -> Vec<u32> {
    let mut seq = Vec::with_capacity(prompt.len() + generated.len());
    seq.extend_from_slice(prompt);
    seq.extend_from_slice(generated);
    seq
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, AnalyzerError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AnalyzerError::ModelLoad {
            backend: provider_name.to_string(),
            detail: format!("{e}"),
        }
    })
}

/// Resolve the provider, from most-specific to least-specific:
///
/// 1. explicit provider name (model defaults to [`DEFAULT_MODEL`]),
/// 2. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set,
/// 3. `OPENAI_API_KEY` present → the `openai` provider,
/// 4. full auto-detection via `ProviderFactory::from_env`.
pub fn resolve_provider(
    provider_name: Option<&str>,
    model: Option<&str>,
) -> Result<Arc<dyn LLMProvider>, AnalyzerError> {
    let model_or_default = model.unwrap_or(DEFAULT_MODEL);

    if let Some(name) = provider_name {
        return create_vision_provider(name, model_or_default);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, model.unwrap_or(&env_model));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", model_or_default);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AnalyzerError::ModelLoad {
            backend: "auto".to_string(),
            detail: format!(
                "No LLM provider could be auto-detected from environment.\n\
                 Set --provider, EDGEQUAKE_LLM_PROVIDER, or OPENAI_API_KEY.\n\
                 Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
