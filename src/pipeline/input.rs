//! Source acquisition: turn a URL or an uploaded file into a local file whose
//! kind (PDF or image) is known.
//!
//! Every acquired source lives in its own [`TempDir`]. The directory is owned
//! by [`AcquiredSource`] and removed when it is dropped, so no request can
//! leave files behind, whether it succeeds, fails or panics half-way.

use crate::error::AnalyzerError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Extensions routed to PDF handling.
pub const PDF_EXTENSIONS: &[&str] = &[".pdf"];

/// Extensions routed to image handling.
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".bmp", ".tiff", ".tif", ".webp"];

/// What an acquired file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Image,
}

/// A staged input file plus the temp directory that owns it.
#[derive(Debug)]
pub struct AcquiredSource {
    kind: SourceKind,
    path: PathBuf,
    temp_dir: TempDir,
}

impl AcquiredSource {
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Path to the staged file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory removed when this source is dropped.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Lower-cased extension of `name` including the leading dot, or `""`.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Route a file name to PDF or image handling by its extension.
pub fn classify_file_name(name: &str) -> Result<SourceKind, AnalyzerError> {
    let ext = extension_of(name);
    if PDF_EXTENSIONS.contains(&ext.as_str()) {
        Ok(SourceKind::Pdf)
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(SourceKind::Image)
    } else {
        Err(AnalyzerError::UnsupportedFormat {
            extension: if ext.is_empty() {
                "(none)".to_string()
            } else {
                ext
            },
        })
    }
}

/// Sniff content: `%PDF` magic, then the image header table.
///
/// Images whose format has no decoder in this build (GIF, ICO, AVIF, ...)
/// are rejected here rather than failing later in the decoder.
fn sniff_kind(bytes: &[u8]) -> Result<Option<SourceKind>, AnalyzerError> {
    if bytes.starts_with(b"%PDF") {
        return Ok(Some(SourceKind::Pdf));
    }
    let Ok(format) = image::guess_format(bytes) else {
        return Ok(None);
    };
    let extension = format
        .extensions_str()
        .first()
        .map(|e| format!(".{e}"))
        .unwrap_or_else(|| format!(".{format:?}").to_ascii_lowercase());
    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Ok(Some(SourceKind::Image))
    } else {
        Err(AnalyzerError::UnsupportedFormat { extension })
    }
}

/// Create the per-request staging directory.
pub fn staging_dir(temp_root: Option<&Path>) -> Result<TempDir, AnalyzerError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("doc-analyzer-");
    match temp_root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
    .map_err(|e| AnalyzerError::internal("Failed to create temp dir", e))
}

/// Stage uploaded bytes under their original file name.
///
/// The extension is checked before anything touches the disk.
pub async fn stage_upload(
    file_name: &str,
    bytes: &[u8],
    temp_root: Option<&Path>,
) -> Result<AcquiredSource, AnalyzerError> {
    let kind = classify_file_name(file_name)?;
    let temp_dir = staging_dir(temp_root)?;
    let path = temp_dir
        .path()
        .join(format!("upload{}", extension_of(file_name)));

    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| AnalyzerError::internal("Failed to write temp file", e))?;

    debug!("Staged upload '{}' ({} bytes) as {:?}", file_name, bytes.len(), kind);
    Ok(AcquiredSource {
        kind,
        path,
        temp_dir,
    })
}

/// Copy a local file into a staging directory.
pub async fn stage_local_file(
    source: &Path,
    temp_root: Option<&Path>,
) -> Result<AcquiredSource, AnalyzerError> {
    let name = source.to_string_lossy();
    let kind = classify_file_name(&name)?;
    let temp_dir = staging_dir(temp_root)?;
    let path = temp_dir.path().join(format!("upload{}", extension_of(&name)));

    tokio::fs::copy(source, &path).await.map_err(|e| {
        AnalyzerError::internal(&format!("Failed to copy '{}'", source.display()), e)
    })?;

    Ok(AcquiredSource {
        kind,
        path,
        temp_dir,
    })
}

/// Header bytes kept aside for content sniffing.
const SNIFF_LEN: usize = 64;

fn transfer_error(url: &str, timeout_secs: u64, e: reqwest::Error) -> AnalyzerError {
    if e.is_timeout() {
        AnalyzerError::DownloadTimeout {
            url: url.to_string(),
            secs: timeout_secs,
        }
    } else {
        AnalyzerError::DownloadFailed {
            url: url.to_string(),
            reason: "transfer failed".to_string(),
            source: Some(e),
        }
    }
}

/// Download a URL into a staging directory.
///
/// The body is streamed to disk and aborted once it passes `max_bytes`. The
/// kind is decided from the content (`%PDF` magic or a recognised image
/// header) and, failing that, from the URL's file extension.
pub async fn download_url(
    url: &str,
    timeout_secs: u64,
    max_bytes: u64,
    temp_root: Option<&Path>,
) -> Result<AcquiredSource, AnalyzerError> {
    if !is_url(url) {
        return Err(AnalyzerError::download_failed(url, "not an HTTP/HTTPS URL"));
    }
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AnalyzerError::DownloadFailed {
            url: url.to_string(),
            reason: "could not build HTTP client".to_string(),
            source: Some(e),
        })?;

    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| transfer_error(url, timeout_secs, e))?;

    if !response.status().is_success() {
        return Err(AnalyzerError::download_failed(
            url,
            format!("HTTP {}", response.status()),
        ));
    }
    if let Some(len) = response.content_length() {
        if len > max_bytes {
            return Err(AnalyzerError::download_failed(
                url,
                format!("response is {len} bytes, over the {max_bytes}-byte limit"),
            ));
        }
    }

    let filename = extract_filename(url);
    let temp_dir = staging_dir(temp_root)?;
    let partial = temp_dir.path().join("download.part");
    let mut file = tokio::fs::File::create(&partial)
        .await
        .map_err(|e| AnalyzerError::internal("Failed to create temp file", e))?;

    let mut head = Vec::with_capacity(SNIFF_LEN);
    let mut total: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| transfer_error(url, timeout_secs, e))?
    {
        total += chunk.len() as u64;
        if total > max_bytes {
            return Err(AnalyzerError::download_failed(
                url,
                format!("response exceeds the {max_bytes}-byte limit"),
            ));
        }
        if head.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - head.len()).min(chunk.len());
            head.extend_from_slice(&chunk[..take]);
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| AnalyzerError::internal("Failed to write temp file", e))?;
    }
    file.flush()
        .await
        .map_err(|e| AnalyzerError::internal("Failed to write temp file", e))?;
    drop(file);

    let kind = match sniff_kind(&head)? {
        Some(kind) => kind,
        None => classify_file_name(&filename)?,
    };

    let ext = match kind {
        SourceKind::Pdf => ".pdf".to_string(),
        SourceKind::Image => {
            let ext = extension_of(&filename);
            if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                ext
            } else {
                // The decoder picks its format from the file extension.
                image::guess_format(&head)
                    .ok()
                    .and_then(|f| f.extensions_str().first())
                    .map(|e| format!(".{e}"))
                    .unwrap_or_else(|| ".png".to_string())
            }
        }
    };
    let path = temp_dir.path().join(format!("download{ext}"));
    tokio::fs::rename(&partial, &path)
        .await
        .map_err(|e| AnalyzerError::internal("Failed to stage download", e))?;

    info!("Downloaded {} bytes to: {}", total, path.display());

    Ok(AcquiredSource {
        kind,
        path,
        temp_dir,
    })
}

/// Extract the last path segment of the URL when it looks like a file name.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "download".to_string()
}
