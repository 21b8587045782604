//! Configuration types for document analysis.
//!
//! Two structs hold every knob:
//!
//! * [`SamplingParams`] — the per-request generation controls exposed in the
//!   UI (temperature, token budget, sequence count, sampling flag).
//! * [`AnalyzerConfig`] — process-wide settings fixed at startup (render size,
//!   anchor extraction, download timeout, where temp files live).
//!
//! Both are built through builders whose setters clamp to the supported
//! ranges, so values coming straight from a form or a CLI flag can be fed in
//! without pre-validation.

use crate::error::AnalyzerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Lowest accepted `max_new_tokens`.
pub const MIN_NEW_TOKENS: usize = 10;
/// Highest accepted `max_new_tokens`.
pub const MAX_NEW_TOKENS: usize = 5000;
/// Highest accepted `num_return_sequences`.
pub const MAX_RETURN_SEQUENCES: usize = 5;

/// Generation controls for one inference call.
///
/// # Example
/// ```rust
/// use doc_analyzer::SamplingParams;
///
/// let params = SamplingParams::builder()
///     .temperature(0.2)
///     .max_new_tokens(512)
///     .build()
///     .unwrap();
/// assert_eq!(params.num_return_sequences, 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Sampling temperature, 0.0–1.0. Default: 0.8.
    pub temperature: f32,

    /// Upper bound on generated tokens, 10–5000. Default: 50.
    pub max_new_tokens: usize,

    /// Number of sequences the model generates, 1–5. Default: 1.
    ///
    /// Only sequence 0 is ever returned to the caller.
    pub num_return_sequences: usize,

    /// Sample from the distribution instead of greedy decoding. Default: true.
    pub do_sample: bool,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_new_tokens: 50,
            num_return_sequences: 1,
            do_sample: true,
        }
    }
}

impl SamplingParams {
    /// Create a new builder starting from the defaults.
    pub fn builder() -> SamplingParamsBuilder {
        SamplingParamsBuilder {
            params: Self::default(),
        }
    }

    /// Force every field into its supported range.
    pub fn clamped(self) -> Self {
        Self {
            temperature: if self.temperature.is_finite() {
                self.temperature.clamp(0.0, 1.0)
            } else {
                Self::default().temperature
            },
            max_new_tokens: self.max_new_tokens.clamp(MIN_NEW_TOKENS, MAX_NEW_TOKENS),
            num_return_sequences: self.num_return_sequences.clamp(1, MAX_RETURN_SEQUENCES),
            do_sample: self.do_sample,
        }
    }
}

/// Builder for [`SamplingParams`].
#[derive(Debug)]
pub struct SamplingParamsBuilder {
    params: SamplingParams,
}

impl SamplingParamsBuilder {
    pub fn temperature(mut self, t: f32) -> Self {
        self.params.temperature = t;
        self
    }

    pub fn max_new_tokens(mut self, n: usize) -> Self {
        self.params.max_new_tokens = n;
        self
    }

    pub fn num_return_sequences(mut self, n: usize) -> Self {
        self.params.num_return_sequences = n;
        self
    }

    pub fn do_sample(mut self, v: bool) -> Self {
        self.params.do_sample = v;
        self
    }

    /// Build the parameters, rejecting values outside the supported ranges.
    pub fn build(self) -> Result<SamplingParams, AnalyzerError> {
        let p = &self.params;
        if !(0.0..=1.0).contains(&p.temperature) {
            return Err(AnalyzerError::InvalidConfig(format!(
                "temperature must be 0.0–1.0, got {}",
                p.temperature
            )));
        }
        if !(MIN_NEW_TOKENS..=MAX_NEW_TOKENS).contains(&p.max_new_tokens) {
            return Err(AnalyzerError::InvalidConfig(format!(
                "max_new_tokens must be {MIN_NEW_TOKENS}–{MAX_NEW_TOKENS}, got {}",
                p.max_new_tokens
            )));
        }
        if !(1..=MAX_RETURN_SEQUENCES).contains(&p.num_return_sequences) {
            return Err(AnalyzerError::InvalidConfig(format!(
                "num_return_sequences must be 1–{MAX_RETURN_SEQUENCES}, got {}",
                p.num_return_sequences
            )));
        }
        Ok(self.params)
    }
}

/// Default cap on URL downloads.
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 128 * 1024 * 1024;

/// Process-wide analysis settings.
#[derive(Clone)]
pub struct AnalyzerConfig {
    /// Longest edge, in pixels, of a rendered PDF page. Default: 1024.
    pub target_longest_image_dim: u32,

    /// Engine used to extract anchor text from PDF pages. Default: `PdfReport`.
    pub anchor_engine: AnchorEngine,

    /// Character budget for anchor text. Default: 4000.
    pub anchor_target_length: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Largest URL download accepted, in bytes. Default: 128 MiB.
    pub max_download_bytes: u64,

    /// Directory in which per-request temp directories are created.
    /// `None` uses the system temp dir.
    pub temp_root: Option<PathBuf>,

    /// Sampling parameters used when a request leaves a field unset.
    pub default_sampling: SamplingParams,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            target_longest_image_dim: 1024,
            anchor_engine: AnchorEngine::default(),
            anchor_target_length: 4000,
            download_timeout_secs: 120,
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
            temp_root: None,
            default_sampling: SamplingParams::default(),
        }
    }
}

impl fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("target_longest_image_dim", &self.target_longest_image_dim)
            .field("anchor_engine", &self.anchor_engine)
            .field("anchor_target_length", &self.anchor_target_length)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("max_download_bytes", &self.max_download_bytes)
            .field("temp_root", &self.temp_root)
            .field("default_sampling", &self.default_sampling)
            .finish()
    }
}

impl AnalyzerConfig {
    /// Create a new builder for `AnalyzerConfig`.
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalyzerConfig`].
#[derive(Debug)]
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl AnalyzerConfigBuilder {
    pub fn target_longest_image_dim(mut self, px: u32) -> Self {
        self.config.target_longest_image_dim = px.clamp(64, 4096);
        self
    }

    pub fn anchor_engine(mut self, engine: AnchorEngine) -> Self {
        self.config.anchor_engine = engine;
        self
    }

    pub fn anchor_target_length(mut self, chars: usize) -> Self {
        self.config.anchor_target_length = chars;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn max_download_bytes(mut self, bytes: u64) -> Self {
        self.config.max_download_bytes = bytes;
        self
    }

    pub fn temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_root = Some(dir.into());
        self
    }

    pub fn default_sampling(mut self, params: SamplingParams) -> Self {
        self.config.default_sampling = params.clamped();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalyzerConfig, AnalyzerError> {
        let c = &self.config;
        if c.anchor_target_length == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "anchor target length must be ≥ 1".into(),
            ));
        }
        if c.max_download_bytes == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "download limit must be ≥ 1 byte".into(),
            ));
        }
        if let Some(ref root) = c.temp_root {
            if !root.is_dir() {
                return Err(AnalyzerError::InvalidConfig(format!(
                    "temp root '{}' is not a directory",
                    root.display()
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How anchor text is pulled out of a PDF page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorEngine {
    /// Page-dimension header followed by the page's text lines. (default)
    #[default]
    PdfReport,
    /// Plain page text only.
    PdfToText,
}

impl AnchorEngine {
    /// Engine name as accepted on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            AnchorEngine::PdfReport => "pdfreport",
            AnchorEngine::PdfToText => "pdftotext",
        }
    }
}

impl std::str::FromStr for AnchorEngine {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdfreport" => Ok(AnchorEngine::PdfReport),
            "pdftotext" => Ok(AnchorEngine::PdfToText),
            other => Err(AnalyzerError::InvalidConfig(format!(
                "unknown anchor engine '{other}' (expected pdfreport or pdftotext)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_defaults_match_ui() {
        let p = SamplingParams::default();
        assert_eq!(p.temperature, 0.8);
        assert_eq!(p.max_new_tokens, 50);
        assert_eq!(p.num_return_sequences, 1);
        assert!(p.do_sample);
    }

    #[test]
    fn sampling_builder_rejects_out_of_range() {
        assert!(SamplingParams::builder().temperature(1.5).build().is_err());
        assert!(SamplingParams::builder().max_new_tokens(5).build().is_err());
        assert!(SamplingParams::builder()
            .num_return_sequences(0)
            .build()
            .is_err());
        assert!(SamplingParams::builder()
            .num_return_sequences(5)
            .build()
            .is_ok());
    }

    #[test]
    fn clamped_forces_ranges() {
        let p = SamplingParams {
            temperature: -3.0,
            max_new_tokens: 1,
            num_return_sequences: 40,
            do_sample: false,
        }
        .clamped();
        assert_eq!(p.temperature, 0.0);
        assert_eq!(p.max_new_tokens, MIN_NEW_TOKENS);
        assert_eq!(p.num_return_sequences, MAX_RETURN_SEQUENCES);
        assert!(!p.do_sample);

        let nan = SamplingParams {
            temperature: f32::NAN,
            ..SamplingParams::default()
        }
        .clamped();
        assert_eq!(nan.temperature, 0.8);
    }

    #[test]
    fn analyzer_defaults() {
        let c = AnalyzerConfig::default();
        assert_eq!(c.target_longest_image_dim, 1024);
        assert_eq!(c.anchor_target_length, 4000);
        assert_eq!(c.anchor_engine, AnchorEngine::PdfReport);
        assert_eq!(c.max_download_bytes, 128 * 1024 * 1024);
    }

    #[test]
    fn analyzer_builder_rejects_zero_download_limit() {
        let err = AnalyzerConfig::builder()
            .max_download_bytes(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("download limit"));
    }

    #[test]
    fn analyzer_builder_rejects_missing_temp_root() {
        let err = AnalyzerConfig::builder()
            .temp_root("/definitely/not/a/dir")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn anchor_engine_parses_names() {
        assert_eq!("pdfreport".parse::<AnchorEngine>().unwrap(), AnchorEngine::PdfReport);
        assert_eq!("PdfToText".parse::<AnchorEngine>().unwrap(), AnchorEngine::PdfToText);
        assert!("pymupdf".parse::<AnchorEngine>().is_err());
        assert_eq!(AnchorEngine::PdfReport.name(), "pdfreport");
    }
}
