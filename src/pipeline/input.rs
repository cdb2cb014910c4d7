//! Input resolution: turn a path or URL into a local, size-checked PDF.
//!
//! URL inputs are downloaded into a `TempDir` owned by the returned
//! [`ResolvedInput`], so the file disappears when the extraction finishes.
//! Both paths check the `%PDF` magic bytes and the configured size limit
//! before anything heavier opens the file.

use crate::error::InvoiceError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

/// A PDF ready for text acquisition.
#[derive(Debug)]
pub struct ResolvedInput {
    path: PathBuf,
    /// Name reported in the processing notes.
    filename: String,
    size: u64,
    /// Keeps a downloaded file alive until the extraction is done.
    _temp_dir: Option<TempDir>,
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// File size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_downloaded(&self) -> bool {
        self._temp_dir.is_some()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
    max_size: u64,
) -> Result<ResolvedInput, InvoiceError> {
    if input.trim().is_empty() {
        return Err(InvoiceError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs, max_size).await
    } else {
        resolve_local(Path::new(input), max_size)
    }
}

/// Validate a local file: existence, permission, size, then magic bytes.
pub fn resolve_local(path: &Path, max_size: u64) -> Result<ResolvedInput, InvoiceError> {
    let path = path.to_path_buf();

    if !path.is_file() {
        return Err(InvoiceError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(InvoiceError::PermissionDenied { path });
        }
        Err(_) => return Err(InvoiceError::FileNotFound { path }),
    };

    let size = file
        .metadata()
        .map_err(|e| InvoiceError::Internal(format!("Failed to stat '{}': {}", path.display(), e)))?
        .len();
    check_size(&path, size, max_size)?;

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
        return Err(InvoiceError::NotAPdf { path, magic });
    }

    let filename = display_name(&path);
    debug!("Resolved local PDF: {} ({} bytes)", path.display(), size);

    Ok(ResolvedInput {
        path,
        filename,
        size,
        _temp_dir: None,
    })
}

fn check_size(path: &Path, size: u64, max: u64) -> Result<(), InvoiceError> {
    if size > max {
        return Err(InvoiceError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            max,
        });
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Download a URL into a temporary directory.
async fn download_url(
    url: &str,
    timeout_secs: u64,
    max_size: u64,
) -> Result<ResolvedInput, InvoiceError> {
    info!("Downloading invoice from: {}", url);

    let failed = |reason: String| InvoiceError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let timed_out = |e: reqwest::Error| {
        if e.is_timeout() {
            InvoiceError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    };

    let mut response = client.get(url).send().await.map_err(timed_out)?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let filename = filename_from_url(url);
    let temp_dir = TempDir::new().map_err(|e| InvoiceError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    if let Some(declared) = response.content_length() {
        check_size(&file_path, declared, max_size)?;
    }

    // Content-Length may be absent; the limit holds per chunk.
    let mut bytes: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(timed_out)? {
        check_size(&file_path, (bytes.len() + chunk.len()) as u64, max_size)?;
        bytes.extend_from_slice(&chunk);
    }
    let size = bytes.len() as u64;

    if !bytes.starts_with(b"%PDF") {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(InvoiceError::NotAPdf {
            path: file_path,
            magic,
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| InvoiceError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", size, file_path.display());

    Ok(ResolvedInput {
        path: file_path,
        filename,
        size,
        _temp_dir: Some(temp_dir),
    })
}

/// Last path segment of the URL when it looks like a filename.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}
