//! Error types for the factura-extract library.
//!
//! There is a single fatal error type, [`InvoiceError`]. Every variant means
//! the request produced no record at all: the input could not be read, the
//! text was too thin to bother the model with, the model call failed, or its
//! reply could not be parsed.
//!
//! Field-level problems are deliberately *not* represented here. A total of
//! `"N/A"` or a quantity of `"dos"` degrades to `0.0` inside
//! [`crate::pipeline::normalize`] and is only visible in the logs, so a
//! slightly sloppy completion still yields a usable record.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the factura-extract library.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Invoice file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The file is larger than the configured upload limit.
    #[error("File '{path}' is {size} bytes; the maximum allowed is {max} bytes")]
    FileTooLarge { path: PathBuf, size: u64, max: u64 },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt, or the document has no pages.
    #[error("PDF '{path}' is corrupt or empty: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Every text-extraction strategy failed on the document.
    #[error("No text could be extracted from '{path}': {detail}")]
    PdfUnreadable { path: PathBuf, detail: String },

    // ── Text errors ───────────────────────────────────────────────────────
    /// Extracted text is missing or too short to be worth a model call.
    #[error(
        "Extracted text is empty or insufficient: {chars} characters (minimum {min}).\n\
Scanned invoices need OCR before extraction."
    )]
    EmptyOrInsufficientText { chars: usize, min: usize },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model call errored or returned no content. Never retried.
    #[error("Model invocation failed: {message}")]
    ModelInvocationFailure { message: String },

    /// The JSON recovered from the completion could not be parsed.
    ///
    /// `content` holds the full, unmodified completion for diagnostics.
    #[error("Model returned malformed JSON: {detail}")]
    MalformedModelOutput { detail: String, content: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InvoiceError {
    /// The raw model completion attached to a parse failure, if any.
    pub fn model_output(&self) -> Option<&str> {
        match self {
            InvoiceError::MalformedModelOutput { content, .. } => Some(content),
            _ => None,
        }
    }
}
