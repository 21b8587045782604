//! Stub collaborators shared by the integration tests.

#![allow(dead_code)]

use doc_analyzer::config::AnchorEngine;
use doc_analyzer::pipeline::anchor::AnchorExtractor;
use doc_analyzer::pipeline::inference::{
    ChatTurn, EncodedPrompt, InferenceEngine, ModelInputs, Processor, VisionModel,
};
use doc_analyzer::pipeline::render::PageRenderer;
use doc_analyzer::{Analyzer, AnalyzerConfig, AnalyzerConfigBuilder, AnalyzerError, SamplingParams};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const PAGE_COUNT: usize = 2;
pub const RENDERED_SIZE: (u32, u32) = (20, 10);
pub const ANCHOR: &str = "Page dimensions: 612.0x792.0\nHello from the text layer\n";

/// Renders a blank page for pages 1..=PAGE_COUNT, ignoring file contents.
pub struct StubRenderer;

impl PageRenderer for StubRenderer {
    fn render_page(&self, _pdf: &Path, page: usize, _dim: u32) -> Result<DynamicImage, AnalyzerError> {
        if page == 0 || page > PAGE_COUNT {
            return Err(AnalyzerError::PageOutOfRange {
                page,
                total: PAGE_COUNT,
            });
        }
        let (w, h) = RENDERED_SIZE;
        Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255; 4]))))
    }
}

pub struct StubAnchors {
    pub fail: bool,
}

impl AnchorExtractor for StubAnchors {
    fn anchor_text(
        &self,
        _pdf: &Path,
        page: usize,
        _engine: AnchorEngine,
        _target_length: usize,
    ) -> Result<String, AnalyzerError> {
        if self.fail {
            Err(AnalyzerError::AnchorExtractionFailed {
                page,
                detail: "no text layer".into(),
            })
        } else {
            Ok(ANCHOR.to_string())
        }
    }
}

/// Records every templated prompt; prompt ids are always `[1, 2, 3, 4]`.
#[derive(Default)]
pub struct StubProcessor {
    pub prompts: Mutex<Vec<String>>,
}

impl Processor for StubProcessor {
    fn apply_chat_template(&self, messages: &[ChatTurn], _add: bool) -> String {
        messages.iter().map(|m| m.text()).collect::<Vec<_>>().join("\n")
    }

    fn encode(&self, text: &str, _image: &DynamicImage) -> Result<EncodedPrompt, AnalyzerError> {
        self.prompts.lock().unwrap().push(text.to_string());
        Ok(EncodedPrompt {
            input_ids: vec![1, 2, 3, 4],
            image_png_b64: String::new(),
        })
    }

    fn batch_decode(&self, seqs: &[Vec<u32>], _skip: bool) -> Result<Vec<String>, AnalyzerError> {
        Ok(seqs
            .iter()
            .map(|s| s.iter().map(|id| format!("t{id}")).collect::<Vec<_>>().join(" "))
            .collect())
    }
}

/// Sequence `i` is the prompt followed by `100 + i`.
#[derive(Default)]
pub struct StubModel {
    pub calls: Mutex<Vec<SamplingParams>>,
}

impl VisionModel for StubModel {
    fn generate(&self, inputs: &ModelInputs, p: &SamplingParams) -> Result<Vec<Vec<u32>>, AnalyzerError> {
        self.calls.lock().unwrap().push(*p);
        Ok((0..p.num_return_sequences as u32)
            .map(|i| {
                let mut s = inputs.input_ids.clone();
                s.push(100 + i);
                s
            })
            .collect())
    }
}

pub struct Harness {
    pub analyzer: Arc<Analyzer>,
    pub processor: Arc<StubProcessor>,
    pub model: Arc<StubModel>,
    pub temp_root: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_anchor_failure(false)
    }

    pub fn with_anchor_failure(fail: bool) -> Self {
        Self::build(fail, |b| b)
    }

    /// Harness whose analyzer config is adjusted by `configure`.
    pub fn with_config(configure: impl FnOnce(AnalyzerConfigBuilder) -> AnalyzerConfigBuilder) -> Self {
        Self::build(false, configure)
    }

    fn build(
        fail: bool,
        configure: impl FnOnce(AnalyzerConfigBuilder) -> AnalyzerConfigBuilder,
    ) -> Self {
        let temp_root = tempfile::tempdir().unwrap();
        let processor = Arc::new(StubProcessor::default());
        let model = Arc::new(StubModel::default());
        let engine = Arc::new(InferenceEngine::new(processor.clone(), model.clone()));
        let config = configure(AnalyzerConfig::builder().temp_root(temp_root.path()))
            .build()
            .unwrap();
        let analyzer = Arc::new(Analyzer::new(
            config,
            Arc::new(StubRenderer),
            Arc::new(StubAnchors { fail }),
            engine,
        ));
        Self {
            analyzer,
            processor,
            model,
            temp_root,
        }
    }

    pub fn last_prompt(&self) -> String {
        self.processor.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }

    /// Number of entries left in the temp root.
    pub fn leftovers(&self) -> usize {
        std::fs::read_dir(self.temp_root.path()).unwrap().count()
    }
}

pub fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([0, 128, 255, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}

pub const FAKE_PDF: &[u8] = b"%PDF-1.4\n% stub document\n%%EOF\n";

/// Encode `img` in `format`.
pub fn image_bytes(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}
