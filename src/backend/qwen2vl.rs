//! Qwen2-VL processor.
//!
//! Qwen2-VL splits an image into 14 px patches and merges them 2×2, so every
//! 28×28 block of the resized image becomes one `<|image_pad|>` token. The
//! processor resizes the image to a multiple of 28 within a pixel budget,
//! then expands the single placeholder in the templated prompt to the
//! matching token count before tokenising.

use crate::error::AnalyzerError;
use crate::pipeline::encode::encode_png_base64;
use crate::pipeline::inference::{ChatTurn, ContentPart, EncodedPrompt, Processor};
use image::imageops::FilterType;
use image::DynamicImage;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::debug;

/// Side of the square covered by one merged vision token.
pub const PATCH_FACTOR: u32 = 28;
/// Lower pixel budget for a resized image.
pub const MIN_PIXELS: u32 = 56 * 56;
/// Upper pixel budget for a resized image.
pub const MAX_PIXELS: u32 = 28 * 28 * 1280;

const DEFAULT_SYSTEM: &str = "You are a helpful assistant.";
const IMAGE_PAD: &str = "<|image_pad|>";
const VISION_BLOCK: &str = "<|vision_start|><|image_pad|><|vision_end|>";

/// Render chat turns the way Qwen2-VL's chat template does.
///
/// A default system turn is prepended when the first turn is not a system
/// turn. Each image part becomes one vision block with a single placeholder.
pub fn render_chat_template(messages: &[ChatTurn], add_generation_prompt: bool) -> String {
    let mut out = String::new();
    if messages.first().map(|m| m.role.as_str()) != Some("system") {
        out.push_str(&format!("<|im_start|>system\n{DEFAULT_SYSTEM}<|im_end|>\n"));
    }
    for message in messages {
        out.push_str("<|im_start|>");
        out.push_str(&message.role);
        out.push('\n');
        for part in &message.content {
            match part {
                ContentPart::Text { text } => out.push_str(text),
                ContentPart::ImageUrl { .. } => out.push_str(VISION_BLOCK),
            }
        }
        out.push_str("<|im_end|>\n");
    }
    if add_generation_prompt {
        out.push_str("<|im_start|>assistant\n");
    }
    out
}

/// Resize `(height, width)` so both are multiples of [`PATCH_FACTOR`] and
/// the area lies within [`MIN_PIXELS`]..=[`MAX_PIXELS`], keeping the aspect
/// ratio as close as possible.
pub fn smart_resize(height: u32, width: u32) -> (u32, u32) {
    let factor = PATCH_FACTOR as f64;
    let (h, w) = (height.max(1) as f64, width.max(1) as f64);

    let mut h_bar = factor.max((h / factor).round() * factor);
    let mut w_bar = factor.max((w / factor).round() * factor);

    if h_bar * w_bar > MAX_PIXELS as f64 {
        let beta = (h * w / MAX_PIXELS as f64).sqrt();
        h_bar = factor.max((h / beta / factor).floor() * factor);
        w_bar = factor.max((w / beta / factor).floor() * factor);
    } else if h_bar * w_bar < MIN_PIXELS as f64 {
        let beta = (MIN_PIXELS as f64 / (h * w)).sqrt();
        h_bar = (h * beta / factor).ceil() * factor;
        w_bar = (w * beta / factor).ceil() * factor;
    }

    (h_bar as u32, w_bar as u32)
}

/// Number of `<|image_pad|>` tokens for an image resized to `(height, width)`.
pub fn image_token_count(height: u32, width: u32) -> usize {
    ((height / PATCH_FACTOR) * (width / PATCH_FACTOR)) as usize
}

/// Replace every single placeholder with `count` copies.
pub fn expand_image_pads(text: &str, count: usize) -> String {
    text.replace(IMAGE_PAD, &IMAGE_PAD.repeat(count))
}

/// Processor backed by a HuggingFace `tokenizer.json`.
#[derive(Clone)]
pub struct Qwen2VlProcessor {
    tokenizer: Arc<Tokenizer>,
}

impl Qwen2VlProcessor {
    pub fn new(tokenizer: Arc<Tokenizer>) -> Self {
        Self { tokenizer }
    }

    pub fn tokenizer(&self) -> &Arc<Tokenizer> {
        &self.tokenizer
    }
}

impl Processor for Qwen2VlProcessor {
    fn apply_chat_template(&self, messages: &[ChatTurn], add_generation_prompt: bool) -> String {
        render_chat_template(messages, add_generation_prompt)
    }

    fn encode(&self, text: &str, image: &DynamicImage) -> Result<EncodedPrompt, AnalyzerError> {
        let (h, w) = smart_resize(image.height(), image.width());
        let resized = image.resize_exact(w, h, FilterType::CatmullRom);
        let pads = image_token_count(h, w);
        debug!(
            "Image {}x{} → {}x{} ({} vision tokens)",
            image.width(),
            image.height(),
            w,
            h,
            pads
        );

        let expanded = expand_image_pads(text, pads);
        let encoding = self
            .tokenizer
            .encode(expanded, false)
            .map_err(|e| AnalyzerError::InferenceFailed(format!("tokenization failed: {e}")))?;

        Ok(EncodedPrompt {
            input_ids: encoding.get_ids().to_vec(),
            image_png_b64: encode_png_base64(&resized)?,
        })
    }

    fn batch_decode(
        &self,
        sequences: &[Vec<u32>],
        skip_special_tokens: bool,
    ) -> Result<Vec<String>, AnalyzerError> {
        sequences
            .iter()
            .map(|ids| {
                self.tokenizer
                    .decode(ids, skip_special_tokens)
                    .map_err(|e| AnalyzerError::InferenceFailed(format!("decode failed: {e}")))
            })
            .collect()
    }
}
