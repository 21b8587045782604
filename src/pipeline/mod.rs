//! Pipeline stages for single-page document analysis.
//!
//! Each submodule implements one step of a request. The PDF and model
//! stages sit behind traits so the request flow in [`crate::analyze`] can be
//! exercised without a pdfium library or model weights.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ anchor ──▶ encode ──▶ inference
//! (URL/upload) (pdfium)  (page text) (base64)   (processor + model)
//! ```
//!
//! 1. [`input`]  — stage a URL or uploaded file in a per-request temp dir and
//!    decide whether it is a PDF or an image
//! 2. [`render`] — rasterise one PDF page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`anchor`] — pull the raw text of the same page to ground the prompt
//! 4. [`encode`] — PNG/base64 conversions for previews and model input
//! 5. [`inference`] — chat template, encode, generate, strip the prompt,
//!    decode the first sequence

pub mod anchor;
pub mod encode;
pub mod inference;
pub mod input;
pub mod render;
