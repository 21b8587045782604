//! Inference invocation: one image plus one instruction in, one string out.
//!
//! The model and its processor are opaque collaborators behind the
//! [`Processor`] and [`VisionModel`] traits. [`InferenceEngine`] owns the
//! request flow around them:
//!
//! 1. build a single user turn holding the instruction then the image,
//! 2. render it through the chat template with a generation prompt,
//! 3. encode text and image into model inputs,
//! 4. generate under the session lock,
//! 5. cut every sequence at the prompt length and decode with special
//!    tokens skipped,
//! 6. return sequence 0.
//!
//! However many sequences the model produces, only the first is returned.

use crate::config::SamplingParams;
use crate::error::AnalyzerError;
use crate::pipeline::encode::{encode_png_base64, to_data_uri};
use image::DynamicImage;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// One element of a chat turn's content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: String },
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: Vec<ContentPart>,
}

impl ChatTurn {
    pub fn user(content: Vec<ContentPart>) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }

    /// Concatenated text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ImageUrl { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Processor output for one templated prompt and one image.
#[derive(Debug, Clone)]
pub struct EncodedPrompt {
    /// Prompt token ids, image placeholders expanded.
    pub input_ids: Vec<u32>,
    /// The image as the model will see it, base64 PNG.
    pub image_png_b64: String,
}

/// Everything handed to [`VisionModel::generate`].
#[derive(Debug, Clone)]
pub struct ModelInputs {
    /// Templated prompt text.
    pub text: String,
    pub input_ids: Vec<u32>,
    pub image_png_b64: String,
    /// The chat turns the template was rendered from.
    pub messages: Vec<ChatTurn>,
}

/// Tokenizer plus image preprocessor.
pub trait Processor: Send + Sync {
    fn apply_chat_template(&self, messages: &[ChatTurn], add_generation_prompt: bool) -> String;

    fn encode(&self, text: &str, image: &DynamicImage) -> Result<EncodedPrompt, AnalyzerError>;

    fn batch_decode(
        &self,
        sequences: &[Vec<u32>],
        skip_special_tokens: bool,
    ) -> Result<Vec<String>, AnalyzerError>;
}

/// A generative vision-language model.
///
/// Each returned sequence starts with the prompt ids followed by the
/// generated ids, the way causal LMs report their output.
pub trait VisionModel: Send + Sync {
    fn generate(
        &self,
        inputs: &ModelInputs,
        params: &SamplingParams,
    ) -> Result<Vec<Vec<u32>>, AnalyzerError>;
}

/// Loaded model session shared by every request.
///
/// Generation holds a lock for its whole duration: the app serves one
/// interactive request at a time.
pub struct InferenceEngine {
    processor: Arc<dyn Processor>,
    model: Arc<dyn VisionModel>,
    session: Mutex<()>,
}

impl std::fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceEngine").finish_non_exhaustive()
    }
}

impl InferenceEngine {
    pub fn new(processor: Arc<dyn Processor>, model: Arc<dyn VisionModel>) -> Self {
        Self {
            processor,
            model,
            session: Mutex::new(()),
        }
    }

    /// Run the model on one image. Blocking.
    pub fn run(
        &self,
        image: &DynamicImage,
        prompt: &str,
        params: &SamplingParams,
    ) -> Result<String, AnalyzerError> {
        let params = params.clamped();
        let png_b64 = encode_png_base64(image)?;

        let messages = vec![ChatTurn::user(vec![
            ContentPart::Text {
                text: prompt.to_string(),
            },
            ContentPart::ImageUrl {
                image_url: to_data_uri(&png_b64),
            },
        ])];

        let text = self.processor.apply_chat_template(&messages, true);
        let encoded = self.processor.encode(&text, image)?;
        let prompt_len = encoded.input_ids.len();
        debug!("Prompt encoded: {} tokens", prompt_len);

        let inputs = ModelInputs {
            text,
            input_ids: encoded.input_ids,
            image_png_b64: encoded.image_png_b64,
            messages,
        };

        let sequences = {
            let _session = self
                .session
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            info!(
                "Generating: temperature={} max_new_tokens={} sequences={} do_sample={}",
                params.temperature,
                params.max_new_tokens,
                params.num_return_sequences,
                params.do_sample
            );
            self.model.generate(&inputs, &params)?
        };

        let new_tokens = strip_prompt(&sequences, prompt_len);
        let decoded = self.processor.batch_decode(&new_tokens, true)?;

        decoded
            .into_iter()
            .next()
            .ok_or_else(|| AnalyzerError::InferenceFailed("model returned no sequences".into()))
    }
}

/// Keep only the ids generated after the first `prompt_len` positions.
pub fn strip_prompt(sequences: &[Vec<u32>], prompt_len: usize) -> Vec<Vec<u32>> {
    sequences
        .iter()
        .map(|s| s.get(prompt_len..).unwrap_or_default().to_vec())
        .collect()
}
