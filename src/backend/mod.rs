//! Concrete model collaborators.
//!
//! * [`qwen2vl`] — the Qwen2-VL processor: chat template, image sizing,
//!   tokenisation with expanded image placeholders.
//! * [`provider`] — a [`crate::pipeline::inference::VisionModel`] served by
//!   any edgequake-llm provider (vLLM, Ollama, OpenAI-compatible endpoints).

pub mod provider;
pub mod qwen2vl;

pub use provider::{resolve_provider, ProviderModel, DEFAULT_MODEL};
pub use qwen2vl::Qwen2VlProcessor;

use crate::error::AnalyzerError;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;

/// Load a `tokenizer.json` file.
pub fn load_tokenizer(path: &Path) -> Result<Arc<Tokenizer>, AnalyzerError> {
    Tokenizer::from_file(path)
        .map(Arc::new)
        .map_err(|e| AnalyzerError::ModelLoad {
            backend: "tokenizer".into(),
            detail: format!("{}: {e}", path.display()),
        })
}
