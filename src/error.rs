//! Error types for the doc-analyzer library.
//!
//! [`AnalyzerError`] covers every way a single analysis request can fail, from
//! fetching the source to decoding the model output. It never escapes the
//! public entry points in [`crate::analyze`]: those convert it into an
//! [`crate::analyze::AnalysisOutcome`] carrying a readable message and no
//! image, so one bad request cannot take the interactive server down.
//!
//! The variants are grouped by pipeline stage. Four of them form the
//! user-facing taxonomy: download failures, unsupported formats, decode
//! failures and inference failures; the rest are the finer-grained causes
//! that surface from the PDF collaborators and configuration.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced while analyzing one request.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    // ── Acquisition errors ────────────────────────────────────────────────
    /// The URL was fetched but the transfer did not complete successfully.
    #[error("Failed to download '{url}': {reason}\nCheck the URL and your internet connection.")]
    DownloadFailed {
        url: String,
        reason: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The input is neither a PDF nor one of the supported image formats.
    #[error("Unsupported file format: {extension}. Please use PDF or images (JPG, PNG, etc.)")]
    UnsupportedFormat { extension: String },

    /// Base64 text or image bytes could not be decoded into a bitmap.
    #[error("Could not decode image: {detail}")]
    Decode { detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The PDF could not be opened by the renderer.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Requested page does not exist in the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// The renderer failed on a page that exists.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The context extractor failed to read the page text.
    #[error("Anchor text extraction failed for page {page}: {detail}")]
    AnchorExtractionFailed { page: usize, detail: String },

    /// No pdfium library could be bound.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
         Set PDFIUM_LIB_PATH=/path/to/libpdfium or install libpdfium on the library path."
    )]
    PdfiumBindingFailed(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// Encoding, generation or decoding failed inside the model collaborators.
    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    /// The model, tokenizer or provider could not be initialised.
    #[error("Model backend '{backend}' could not be loaded: {detail}")]
    ModelLoad { backend: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (I/O on temp files, panicked blocking task).
    #[error("Internal error: {context}")]
    Internal {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl AnalyzerError {
    /// Short machine-readable category, used in logs and HTTP payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyzerError::DownloadFailed { .. } | AnalyzerError::DownloadTimeout { .. } => {
                "download_error"
            }
            AnalyzerError::UnsupportedFormat { .. } => "unsupported_format",
            AnalyzerError::Decode { .. } => "decode_error",
            AnalyzerError::InferenceFailed(_) | AnalyzerError::ModelLoad { .. } => {
                "inference_error"
            }
            AnalyzerError::CorruptPdf { .. }
            | AnalyzerError::PageOutOfRange { .. }
            | AnalyzerError::RasterisationFailed { .. }
            | AnalyzerError::AnchorExtractionFailed { .. }
            | AnalyzerError::PdfiumBindingFailed(_) => "pdf_error",
            AnalyzerError::InvalidConfig(_) => "config_error",
            AnalyzerError::Internal { .. } => "internal_error",
        }
    }

    pub(crate) fn internal<E>(context: &str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AnalyzerError::Internal {
            context: context.to_string(),
            source: Box::new(err),
        }
    }

    pub(crate) fn download_failed(url: &str, reason: impl Into<String>) -> Self {
        AnalyzerError::DownloadFailed {
            url: url.to_string(),
            reason: reason.into(),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_message_names_extension() {
        let e = AnalyzerError::UnsupportedFormat {
            extension: ".docx".into(),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("Unsupported file format: .docx"), "got: {msg}");
        assert!(msg.contains("PDF or images"));
    }

    #[test]
    fn download_failed_display() {
        let e = AnalyzerError::DownloadFailed {
            url: "https://example.com/a.pdf".into(),
            reason: "HTTP 404 Not Found".into(),
            source: None,
        };
        assert!(e.to_string().contains("HTTP 404"));
        assert_eq!(e.kind(), "download_error");
    }

    #[test]
    fn page_out_of_range_display() {
        let e = AnalyzerError::PageOutOfRange { page: 9, total: 3 };
        assert!(e.to_string().contains("Page 9"));
        assert!(e.to_string().contains("3 pages"));
    }

    #[test]
    fn kinds_group_model_failures() {
        assert_eq!(
            AnalyzerError::InferenceFailed("boom".into()).kind(),
            "inference_error"
        );
        assert_eq!(
            AnalyzerError::ModelLoad {
                backend: "openai".into(),
                detail: "no key".into()
            }
            .kind(),
            "inference_error"
        );
        assert_eq!(
            AnalyzerError::Decode {
                detail: "bad".into()
            }
            .kind(),
            "decode_error"
        );
    }

    #[test]
    fn internal_keeps_its_cause() {
        use std::error::Error as _;
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only fs");
        let e = AnalyzerError::internal("Failed to write temp file", io);
        assert_eq!(e.to_string(), "Internal error: Failed to write temp file");
        assert_eq!(e.source().map(|c| c.to_string()).as_deref(), Some("read-only fs"));
        assert_eq!(e.kind(), "internal_error");
    }
}
