//! Image encoding: `DynamicImage` ⇄ base64 PNG.
//!
//! PNG is used everywhere a page leaves the process (model input, preview
//! data URI) because it is lossless; JPEG artefacts on rendered text degrade
//! transcription quality.

use crate::error::AnalyzerError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ColorType, DynamicImage};
use std::borrow::Cow;
use std::io::Cursor;
use tracing::debug;

/// PNG stores 8- and 16-bit integer samples only; anything else (float
/// TIFFs, HDR) is converted to 8-bit RGB, keeping alpha when present.
fn png_compatible(img: &DynamicImage) -> Cow<'_, DynamicImage> {
    match img.color() {
        ColorType::L8
        | ColorType::La8
        | ColorType::Rgb8
        | ColorType::Rgba8
        | ColorType::L16
        | ColorType::La16
        | ColorType::Rgb16
        | ColorType::Rgba16 => Cow::Borrowed(img),
        color if color.has_alpha() => Cow::Owned(DynamicImage::ImageRgba8(img.to_rgba8())),
        _ => Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8())),
    }
}

/// Encode an image as base64 PNG.
pub fn encode_png_base64(img: &DynamicImage) -> Result<String, AnalyzerError> {
    let mut buf = Vec::new();
    png_compatible(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| AnalyzerError::InferenceFailed(format!("PNG encode failed: {e}")))?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());
    Ok(b64)
}

/// Wrap base64 PNG data in a `data:` URI for the browser preview.
pub fn to_data_uri(png_b64: &str) -> String {
    format!("data:image/png;base64,{png_b64}")
}

/// Decode pasted base64 text into an image.
///
/// Accepts bare base64 or a full `data:<mime>;base64,` URI, and ignores
/// whitespace and line breaks that come with copy-paste.
pub fn decode_base64_image(input: &str) -> Result<DynamicImage, AnalyzerError> {
    let trimmed = input.trim();
    let payload = match trimmed.strip_prefix("data:") {
        Some(rest) => match rest.split_once(',') {
            Some((_, data)) => data,
            None => {
                return Err(AnalyzerError::Decode {
                    detail: "data URI has no ',' separator".into(),
                })
            }
        },
        None => trimmed,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(AnalyzerError::Decode {
            detail: "empty input".into(),
        });
    }

    let bytes = STANDARD.decode(compact.as_bytes()).map_err(|e| AnalyzerError::Decode {
        detail: format!("invalid base64: {e}"),
    })?;

    image::load_from_memory(&bytes).map_err(|e| AnalyzerError::Decode {
        detail: e.to_string(),
    })
}

/// Decode an image file already on disk.
pub fn load_image_file(path: &std::path::Path) -> Result<DynamicImage, AnalyzerError> {
    image::open(path).map_err(|e| AnalyzerError::Decode {
        detail: e.to_string(),
    })
}
