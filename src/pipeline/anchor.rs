//! Anchor text: the raw text layer of a PDF page, used to ground the prompt.

use crate::config::AnchorEngine;
use crate::error::AnalyzerError;
use crate::pipeline::render::{bind_pdfium, open_document, page_at};
use std::path::Path;
use tracing::debug;

/// Extracts raw page text from a PDF. Blocking.
pub trait AnchorExtractor: Send + Sync {
    fn anchor_text(
        &self,
        pdf: &Path,
        page: usize,
        engine: AnchorEngine,
        target_length: usize,
    ) -> Result<String, AnalyzerError>;
}

/// Reads the text layer through pdfium.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumAnchorExtractor;

impl AnchorExtractor for PdfiumAnchorExtractor {
    fn anchor_text(
        &self,
        pdf: &Path,
        page: usize,
        engine: AnchorEngine,
        target_length: usize,
    ) -> Result<String, AnalyzerError> {
        let pdfium = bind_pdfium()?;
        let document = open_document(&pdfium, pdf)?;
        let pdf_page = page_at(&document, page)?;

        let raw = pdf_page
            .text()
            .map(|t| t.all())
            .map_err(|e| AnalyzerError::AnchorExtractionFailed {
                page,
                detail: format!("{:?}", e),
            })?;

        let text = match engine {
            AnchorEngine::PdfReport => format_report(
                pdf_page.width().value,
                pdf_page.height().value,
                &raw,
            ),
            AnchorEngine::PdfToText => raw,
        };

        let anchor = truncate_chars(&text, target_length);
        debug!(
            "Anchor for page {} via {}: {} chars",
            page,
            engine.name(),
            anchor.chars().count()
        );
        Ok(anchor)
    }
}

/// Page-dimension header followed by the non-empty, whitespace-normalised
/// text lines of the page.
pub fn format_report(width: f32, height: f32, raw: &str) -> String {
    let mut out = format!("Page dimensions: {width:.1}x{height:.1}\n");
    for line in raw.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

/// Keep at most `max` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
