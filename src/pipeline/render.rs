//! PDF rasterisation: render one page to a `DynamicImage` via pdfium.
//!
//! The longest edge of the output is capped at the configured target
//! dimension regardless of the page's physical size, which keeps memory
//! bounded and matches the resolution the model was trained on.

use crate::error::AnalyzerError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming an explicit pdfium library file.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Rasteriser for single PDF pages.
///
/// Implementations are blocking; callers run them on the blocking pool.
pub trait PageRenderer: Send + Sync {
    /// Render 1-based `page` of `pdf` so its longest edge is `longest_dim` px.
    fn render_page(
        &self,
        pdf: &Path,
        page: usize,
        longest_dim: u32,
    ) -> Result<DynamicImage, AnalyzerError>;
}

/// Bind pdfium: `PDFIUM_LIB_PATH` first, then the working directory, then the
/// system library search path.
pub fn bind_pdfium() -> Result<Pdfium, AnalyzerError> {
    if let Ok(path) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        debug!(path = %path, "Loading pdfium from env var");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            AnalyzerError::PdfiumBindingFailed(format!("{path}: {e:?}"))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| AnalyzerError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// Open `pdf`, mapping load failures to [`AnalyzerError::CorruptPdf`].
pub(crate) fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf: &Path,
) -> Result<PdfDocument<'a>, AnalyzerError> {
    pdfium
        .load_pdf_from_file(pdf, None)
        .map_err(|e| AnalyzerError::CorruptPdf {
            path: pdf.to_path_buf(),
            detail: format!("{:?}", e),
        })
}

/// Fetch 1-based `page` from `document`.
pub(crate) fn page_at<'a>(
    document: &PdfDocument<'a>,
    page: usize,
) -> Result<PdfPage<'a>, AnalyzerError> {
    let pages = document.pages();
    let total = pages.len() as usize;
    if page == 0 || page > total {
        return Err(AnalyzerError::PageOutOfRange { page, total });
    }

    pages
        .get((page - 1) as u16)
        .map_err(|e| AnalyzerError::RasterisationFailed {
            page,
            detail: format!("{:?}", e),
        })
}

/// pdfium-backed renderer. Binds the library once per render call so a
/// renderer value can be shared across threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumRenderer;

impl PdfiumRenderer {
    /// Create a renderer after checking that pdfium can be bound.
    pub fn new() -> Result<Self, AnalyzerError> {
        bind_pdfium()?;
        Ok(Self)
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render_page(
        &self,
        pdf: &Path,
        page: usize,
        longest_dim: u32,
    ) -> Result<DynamicImage, AnalyzerError> {
        let pdfium = bind_pdfium()?;
        let document = open_document(&pdfium, pdf)?;
        info!("PDF loaded: {} pages", document.pages().len());

        let pdf_page = page_at(&document, page)?;

        let render_config = PdfRenderConfig::new()
            .set_target_width(longest_dim as i32)
            .set_maximum_height(longest_dim as i32);

        let bitmap = pdf_page.render_with_config(&render_config).map_err(|e| {
            AnalyzerError::RasterisationFailed {
                page,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}
