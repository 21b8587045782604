//! Request entry points: URL, uploaded file, raw base64.
//!
//! Each entry point normalises its input into an image, an anchor and the
//! sampling parameters, runs the model, and returns an [`AnalysisOutcome`].
//! None of them return `Err`: every failure becomes a readable message with
//! no image, so the interactive server keeps running whatever the input.

use crate::config::{AnalyzerConfig, SamplingParams};
use crate::error::AnalyzerError;
use crate::pipeline::anchor::{AnchorExtractor, PdfiumAnchorExtractor};
use crate::pipeline::encode::{decode_base64_image, load_image_file};
use crate::pipeline::inference::InferenceEngine;
use crate::pipeline::input::{self, AcquiredSource, SourceKind};
use crate::pipeline::render::{PageRenderer, PdfiumRenderer};
use crate::prompts::{
    build_finetuning_prompt, resolve_anchor, DEFAULT_ANCHOR_TEXT, IMAGE_ANCHOR_TEXT,
};
use image::DynamicImage;
use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of one request: the text shown to the user and, on success, the
/// image the model saw.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub text: String,
    pub image: Option<DynamicImage>,
    /// Error category when the request failed, see [`AnalyzerError::kind`].
    pub error_kind: Option<&'static str>,
}

impl AnalysisOutcome {
    pub fn success(text: String, image: DynamicImage) -> Self {
        Self {
            text,
            image: Some(image),
            error_kind: None,
        }
    }

    /// Format a failure for display.
    ///
    /// Unsupported formats read as a plain notice; everything else is
    /// prefixed with `Error:` and followed by its cause chain.
    pub fn from_error(err: &AnalyzerError) -> Self {
        let text = match err {
            AnalyzerError::UnsupportedFormat { .. } => err.to_string(),
            _ => {
                let mut text = format!("Error: {err}");
                let mut source = err.source();
                while let Some(cause) = source {
                    text.push_str(&format!("\nCaused by: {cause}"));
                    source = cause.source();
                }
                text
            }
        };
        Self {
            text,
            image: None,
            error_kind: Some(err.kind()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_kind.is_some()
    }
}

/// Where a request's document comes from.
#[derive(Debug, Clone)]
pub enum AnalysisSource {
    Url(String),
    Upload { file_name: String, bytes: Vec<u8> },
    File(PathBuf),
    Base64(String),
}

/// One analysis request. `page` is 1-based and ignored for images.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub source: AnalysisSource,
    pub page: usize,
    pub params: SamplingParams,
}

impl AnalysisRequest {
    pub fn new(source: AnalysisSource) -> Self {
        Self {
            source,
            page: 1,
            params: SamplingParams::default(),
        }
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn params(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }
}

/// The document analyzer: PDF collaborators plus a loaded model session.
#[derive(Clone)]
pub struct Analyzer {
    config: AnalyzerConfig,
    renderer: Arc<dyn PageRenderer>,
    anchors: Arc<dyn AnchorExtractor>,
    engine: Arc<InferenceEngine>,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Analyzer {
    pub fn new(
        config: AnalyzerConfig,
        renderer: Arc<dyn PageRenderer>,
        anchors: Arc<dyn AnchorExtractor>,
        engine: Arc<InferenceEngine>,
    ) -> Self {
        Self {
            config,
            renderer,
            anchors,
            engine,
        }
    }

    /// Analyzer using pdfium for both rendering and anchor text.
    pub fn with_pdfium(
        config: AnalyzerConfig,
        engine: Arc<InferenceEngine>,
    ) -> Result<Self, AnalyzerError> {
        let renderer = PdfiumRenderer::new()?;
        Ok(Self::new(
            config,
            Arc::new(renderer),
            Arc::new(PdfiumAnchorExtractor),
            engine,
        ))
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Dispatch a request to the matching entry point.
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisOutcome {
        let AnalysisRequest {
            source,
            page,
            params,
        } = request;
        match source {
            AnalysisSource::Url(url) => self.analyze_url(&url, page, params).await,
            AnalysisSource::Upload { file_name, bytes } => {
                self.analyze_upload(&file_name, &bytes, page, params).await
            }
            AnalysisSource::File(path) => self.analyze_file(&path, page, params).await,
            AnalysisSource::Base64(b64) => self.analyze_base64(&b64, params).await,
        }
    }

    /// Download a PDF or image and analyze `page` (1-based, PDFs only).
    pub async fn analyze_url(
        &self,
        url: &str,
        page: usize,
        params: SamplingParams,
    ) -> AnalysisOutcome {
        let start = Instant::now();
        info!("Analyzing URL: {} (page {})", url, page);
        let result = async {
            let source = input::download_url(
                url,
                self.config.download_timeout_secs,
                self.config.max_download_bytes,
                self.config.temp_root.as_deref(),
            )
            .await?;
            self.process_source(&source, page, params).await
        }
        .await;
        Self::contain(result, start)
    }

    /// Analyze an uploaded file, routed by its extension.
    pub async fn analyze_upload(
        &self,
        file_name: &str,
        bytes: &[u8],
        page: usize,
        params: SamplingParams,
    ) -> AnalysisOutcome {
        let start = Instant::now();
        info!("Analyzing upload: {} ({} bytes)", file_name, bytes.len());
        let result = async {
            let source =
                input::stage_upload(file_name, bytes, self.config.temp_root.as_deref()).await?;
            self.process_source(&source, page, params).await
        }
        .await;
        Self::contain(result, start)
    }

    /// Analyze a file on the local disk. The file is copied into a temp dir
    /// first so the original is never touched.
    pub async fn analyze_file(
        &self,
        path: &Path,
        page: usize,
        params: SamplingParams,
    ) -> AnalysisOutcome {
        let start = Instant::now();
        info!("Analyzing file: {}", path.display());
        let result = async {
            let source = input::stage_local_file(path, self.config.temp_root.as_deref()).await?;
            self.process_source(&source, page, params).await
        }
        .await;
        Self::contain(result, start)
    }

    /// Analyze a pasted base64 image, with the generic document anchor.
    pub async fn analyze_base64(&self, image_b64: &str, params: SamplingParams) -> AnalysisOutcome {
        let start = Instant::now();
        info!("Analyzing base64 image ({} chars)", image_b64.len());
        let result = async {
            let encoded = image_b64.to_string();
            let image = tokio::task::spawn_blocking(move || decode_base64_image(&encoded))
                .await
                .map_err(|e| AnalyzerError::internal("Decode task panicked", e))??;
            let prompt = build_finetuning_prompt(DEFAULT_ANCHOR_TEXT);
            self.infer(image, prompt, params).await
        }
        .await;
        Self::contain(result, start)
    }

    fn contain(
        result: Result<(String, DynamicImage), AnalyzerError>,
        start: Instant,
    ) -> AnalysisOutcome {
        match result {
            Ok((text, image)) => {
                info!(
                    "Analysis complete: {} chars in {}ms",
                    text.len(),
                    start.elapsed().as_millis()
                );
                AnalysisOutcome::success(text, image)
            }
            Err(e) => {
                warn!(kind = e.kind(), "Analysis failed: {}", e);
                AnalysisOutcome::from_error(&e)
            }
        }
    }

    async fn process_source(
        &self,
        source: &AcquiredSource,
        page: usize,
        params: SamplingParams,
    ) -> Result<(String, DynamicImage), AnalyzerError> {
        match source.kind() {
            SourceKind::Pdf => self.process_pdf(source.path(), page, params).await,
            SourceKind::Image => self.process_image(source.path(), params).await,
        }
    }

    async fn process_pdf(
        &self,
        pdf: &Path,
        page: usize,
        params: SamplingParams,
    ) -> Result<(String, DynamicImage), AnalyzerError> {
        let renderer = Arc::clone(&self.renderer);
        let anchors = Arc::clone(&self.anchors);
        let path = pdf.to_path_buf();
        let longest_dim = self.config.target_longest_image_dim;
        let engine_kind = self.config.anchor_engine;
        let target_length = self.config.anchor_target_length;

        let (image, anchor) = tokio::task::spawn_blocking(move || {
            let image = renderer.render_page(&path, page, longest_dim)?;
            let anchor = match anchors.anchor_text(&path, page, engine_kind, target_length) {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("Anchor extraction failed, using generic anchor: {}", e);
                    None
                }
            };
            Ok::<_, AnalyzerError>((image, anchor))
        })
        .await
        .map_err(|e| AnalyzerError::internal("Render task panicked", e))??;

        let prompt = build_finetuning_prompt(&resolve_anchor(anchor, DEFAULT_ANCHOR_TEXT));
        self.infer(image, prompt, params).await
    }

    async fn process_image(
        &self,
        path: &Path,
        params: SamplingParams,
    ) -> Result<(String, DynamicImage), AnalyzerError> {
        let path = path.to_path_buf();
        let image = tokio::task::spawn_blocking(move || load_image_file(&path))
            .await
            .map_err(|e| AnalyzerError::internal("Decode task panicked", e))??;

        let prompt = build_finetuning_prompt(IMAGE_ANCHOR_TEXT);
        self.infer(image, prompt, params).await
    }

    async fn infer(
        &self,
        image: DynamicImage,
        prompt: String,
        params: SamplingParams,
    ) -> Result<(String, DynamicImage), AnalyzerError> {
        debug!("Prompt: {} chars, image {}x{}", prompt.len(), image.width(), image.height());
        let engine = Arc::clone(&self.engine);
        let (result, image) = tokio::task::spawn_blocking(move || {
            let result = engine.run(&image, &prompt, &params);
            (result, image)
        })
        .await
        .map_err(|e| AnalyzerError::internal("Inference task panicked", e))?;

        Ok((result?, image))
    }
}
