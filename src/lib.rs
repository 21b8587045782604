//! # doc-analyzer
//!
//! Two small utilities around a vision-language OCR model:
//!
//! * a document analyzer that takes a PDF (by URL or upload) or an image,
//!   renders one page, grounds the prompt with the page's raw text layer and
//!   asks the model for a natural-reading transcription, served through a
//!   browser UI;
//! * [`envcheck`], an environment verifier that reports which GPU drivers,
//!   Python packages and developer tools are present.
//!
//! ## Request Flow
//!
//! ```text
//! URL / upload / base64
//!  │
//!  ├─ 1. Acquire  stage the source in a per-request temp dir, PDF or image?
//!  ├─ 2. Render   rasterise the page via pdfium (spawn_blocking)
//!  ├─ 3. Anchor   page text layer → fine-tuning prompt
//!  ├─ 4. Infer    chat template → encode → generate → strip prompt → decode
//!  └─ 5. Display  first sequence + the image the model saw
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc_analyzer::backend::{load_tokenizer, resolve_provider, ProviderModel, Qwen2VlProcessor};
//! use doc_analyzer::pipeline::inference::InferenceEngine;
//! use doc_analyzer::{Analyzer, AnalyzerConfig, SamplingParams};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tokenizer = load_tokenizer("tokenizer.json".as_ref())?;
//!     let provider = resolve_provider(None, None)?;
//!     let engine = InferenceEngine::new(
//!         Arc::new(Qwen2VlProcessor::new(tokenizer.clone())),
//!         Arc::new(ProviderModel::new(provider, tokenizer)),
//!     );
//!     let analyzer = Analyzer::with_pdfium(AnalyzerConfig::default(), Arc::new(engine))?;
//!
//!     let outcome = analyzer
//!         .analyze_url("https://molmo.allenai.org/paper.pdf", 1, SamplingParams::default())
//!         .await;
//!     println!("{}", outcome.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc-analyzer` and `envcheck` binaries |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod backend;
pub mod config;
pub mod envcheck;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{AnalysisOutcome, AnalysisRequest, AnalysisSource, Analyzer};
pub use config::{AnalyzerConfig, AnalyzerConfigBuilder, AnchorEngine, SamplingParams};
pub use error::AnalyzerError;
