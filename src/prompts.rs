//! Prompt construction for the document model.
//!
//! The model was fine-tuned on one fixed instruction template, so the only
//! variable part is the anchor text: raw text previously extracted from the
//! page that grounds the transcription. When no anchor is available (raw
//! images, empty pages) a short generic sentence takes its place.

/// Fallback anchor for inputs with no PDF context (raw base64 images).
pub const DEFAULT_ANCHOR_TEXT: &str = "Document analysis.";

/// Fallback anchor for uploaded image files.
pub const IMAGE_ANCHOR_TEXT: &str = "Image analysis.";

/// Build the fine-tuning prompt around `anchor_text`.
pub fn build_finetuning_prompt(anchor_text: &str) -> String {
    format!(
        "Below is the image of one page of a document, as well as some raw textual content that \
         was previously extracted for it. Just return the plain text representation of this \
         document as if you were reading it naturally.\n\
         Do not hallucinate.\n\
         RAW_TEXT_START\n{anchor_text}\nRAW_TEXT_END"
    )
}

/// Pick the extracted anchor when it has content, otherwise `fallback`.
pub fn resolve_anchor(anchor: Option<String>, fallback: &str) -> String {
    match anchor {
        Some(text) if !text.trim().is_empty() => text,
        _ => fallback.to_string(),
    }
}
