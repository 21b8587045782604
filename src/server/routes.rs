//! Request handlers: one per input tab, plus the page and a health check.

use super::error::ApiError;
use super::AppState;
use crate::analyze::AnalysisOutcome;
use crate::config::SamplingParams;
use crate::pipeline::encode::{encode_png_base64, to_data_uri};
use axum::extract::{Multipart, State};
use axum::response::Html;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const INDEX_HTML: &str = include_str!("index.html");

/// Sampling controls as sent by the form; unset fields take the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct SamplingForm {
    pub temperature: Option<f32>,
    pub max_new_tokens: Option<usize>,
    pub num_return_sequences: Option<usize>,
    pub do_sample: Option<bool>,
}

impl SamplingForm {
    pub fn resolve(&self, defaults: SamplingParams) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_new_tokens: self.max_new_tokens.unwrap_or(defaults.max_new_tokens),
            num_return_sequences: self
                .num_return_sequences
                .unwrap_or(defaults.num_return_sequences),
            do_sample: self.do_sample.unwrap_or(defaults.do_sample),
        }
        .clamped()
    }
}

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub url: String,
    pub page_number: Option<usize>,
    #[serde(flatten)]
    pub sampling: SamplingForm,
}

#[derive(Debug, Deserialize)]
pub struct Base64Request {
    #[serde(alias = "image")]
    pub image_base64: String,
    #[serde(flatten)]
    pub sampling: SamplingForm,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    /// Model output, or the error message when the analysis failed.
    pub result: String,
    /// PNG data URI of the analyzed image; `null` on failure.
    pub image: Option<String>,
    /// Error category when the analysis failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub version: &'static str,
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: state.model_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn page_or_first(page: Option<usize>) -> usize {
    page.unwrap_or(1).max(1)
}

pub async fn analyze_url(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UrlRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let params = req.sampling.resolve(state.analyzer.config().default_sampling);
    let outcome = state
        .analyzer
        .analyze_url(req.url.trim(), page_or_first(req.page_number), params)
        .await;
    respond(outcome).await
}

pub async fn analyze_base64(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Base64Request>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let params = req.sampling.resolve(state.analyzer.config().default_sampling);
    let outcome = state.analyzer.analyze_base64(&req.image_base64, params).await;
    respond(outcome).await
}

/// Multipart upload: `file` plus optional `page_number` and sampling fields.
pub async fn analyze_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut page = None;
    let mut sampling = SamplingForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("failed to read file data: {e}")))?;
            file = Some((filename, bytes.to_vec()));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read field {name}: {e}")))?;
        let value = value.trim();
        match name.as_str() {
            "page_number" => page = Some(parse_field(&name, value)?),
            "temperature" => sampling.temperature = Some(parse_field(&name, value)?),
            "max_new_tokens" => sampling.max_new_tokens = Some(parse_field(&name, value)?),
            "num_return_sequences" => {
                sampling.num_return_sequences = Some(parse_field(&name, value)?)
            }
            "do_sample" => sampling.do_sample = Some(parse_bool(value)),
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or_else(|| ApiError::BadRequest("No file provided.".into()))?;
    let params = sampling.resolve(state.analyzer.config().default_sampling);
    let outcome = state
        .analyzer
        .analyze_upload(&filename, &bytes, page_or_first(page), params)
        .await;
    respond(outcome).await
}

fn parse_field<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid value for {name}: '{value}'")))
}

/// HTML checkboxes send `on`; API clients send `true`/`1`.
fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

async fn respond(outcome: AnalysisOutcome) -> Result<Json<AnalyzeResponse>, ApiError> {
    let image = match outcome.image {
        Some(img) => {
            let b64 = tokio::task::spawn_blocking(move || encode_png_base64(&img))
                .await
                .map_err(|e| ApiError::Internal(format!("preview task panicked: {e}")))?
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            Some(to_data_uri(&b64))
        }
        None => None,
    };

    Ok(Json(AnalyzeResponse {
        result: outcome.text,
        image,
        error: outcome.error_kind,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_defaults_and_clamping() {
        let form = SamplingForm {
            temperature: Some(4.0),
            max_new_tokens: None,
            num_return_sequences: Some(9),
            do_sample: None,
        };
        let p = form.resolve(SamplingParams::default());
        assert_eq!(p.temperature, 1.0);
        assert_eq!(p.max_new_tokens, 50);
        assert_eq!(p.num_return_sequences, 5);
        assert!(p.do_sample);
    }

    #[test]
    fn checkbox_values() {
        assert!(parse_bool("on"));
        assert!(parse_bool("TRUE"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn page_defaults_to_first() {
        assert_eq!(page_or_first(None), 1);
        assert_eq!(page_or_first(Some(0)), 1);
        assert_eq!(page_or_first(Some(4)), 4);
    }

    #[test]
    fn url_request_accepts_flattened_sampling() {
        let req: UrlRequest = serde_json::from_str(
            r#"{"url":"https://molmo.allenai.org/paper.pdf","page_number":2,"temperature":0.1,"do_sample":false}"#,
        )
        .unwrap();
        assert_eq!(req.page_number, Some(2));
        assert_eq!(req.sampling.temperature, Some(0.1));
        assert_eq!(req.sampling.do_sample, Some(false));
        assert!(req.sampling.max_new_tokens.is_none());
    }
}
