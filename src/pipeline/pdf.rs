//! Text acquisition and structural checks for invoice PDFs.
//!
//! Electronic invoices are generated documents with a real text layer, so no
//! rendering or OCR is involved. Two extractors are tried in order:
//!
//! 1. **pdfium** (`pdfium-render`): best reading order on DIAN-style layouts.
//!    Needs the pdfium shared library; set `PDFIUM_LIB_PATH` to a file or
//!    directory, otherwise the system library path is searched.
//! 2. **pdf-extract**: pure Rust, always available.
//!
//! The first output longer than [`ACCEPT_CHARS`] trimmed characters wins.
//! Both extractors call into code that is not async-aware and occasionally
//! panics on odd fonts, so each runs in `spawn_blocking` and a panic is
//! treated like any other strategy failure.

use crate::error::InvoiceError;
use crate::output::DocumentMetadata;
use lopdf::{Document, Object};
use pdfium_render::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Trimmed length above which a strategy's output is accepted outright.
pub const ACCEPT_CHARS: usize = 50;

/// A text-extraction backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStrategy {
    Pdfium,
    PdfExtract,
}

impl TextStrategy {
    const ORDER: [TextStrategy; 2] = [TextStrategy::Pdfium, TextStrategy::PdfExtract];

    fn run(self, path: &Path) -> Result<(String, usize), String> {
        match self {
            TextStrategy::Pdfium => pdfium_text(path),
            TextStrategy::PdfExtract => pdf_extract_text(path),
        }
    }
}

impl fmt::Display for TextStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TextStrategy::Pdfium => "pdfium",
            TextStrategy::PdfExtract => "pdf-extract",
        })
    }
}

/// Text pulled from a PDF and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub strategy: TextStrategy,
    /// Page count as seen by the winning strategy (0 when unknown).
    pub pages: usize,
}

impl ExtractedText {
    /// Character count of the text, untrimmed.
    pub fn chars(&self) -> usize {
        self.text.chars().count()
    }
}

/// Check the document structure parses and has at least one page.
pub async fn validate_pdf(path: &Path) -> Result<usize, InvoiceError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || validate_blocking(&owned))
        .await
        .map_err(|e| InvoiceError::Internal(format!("Validation task panicked: {}", e)))?
}

fn validate_blocking(path: &Path) -> Result<usize, InvoiceError> {
    let doc = load_document(path)?;
    let pages = doc.get_pages().len();
    if pages == 0 {
        return Err(InvoiceError::CorruptPdf {
            path: path.to_path_buf(),
            detail: "document has no pages".into(),
        });
    }
    debug!("Validated PDF {}: {} pages", path.display(), pages);
    Ok(pages)
}

fn trimmed_chars(text: &str) -> usize {
    text.trim().chars().count()
}

/// Extract the text layer, falling back across strategies.
pub async fn extract_text(path: &Path) -> Result<ExtractedText, InvoiceError> {
    let mut best: Option<ExtractedText> = None;
    let mut failures = Vec::new();

    for strategy in TextStrategy::ORDER {
        let owned = path.to_path_buf();
        let outcome = tokio::task::spawn_blocking(move || strategy.run(&owned))
            .await
            .unwrap_or_else(|e| Err(format!("extractor panicked: {}", e)));

        match outcome {
            Ok((text, pages)) => {
                let trimmed = trimmed_chars(&text);
                debug!("{} produced {} trimmed chars", strategy, trimmed);
                let candidate = ExtractedText {
                    text,
                    strategy,
                    pages,
                };
                if trimmed > ACCEPT_CHARS {
                    info!("Text extracted with {}: {} chars", strategy, candidate.chars());
                    return Ok(candidate);
                }
                if best
                    .as_ref()
                    .map_or(true, |b| trimmed_chars(&b.text) < trimmed)
                {
                    best = Some(candidate);
                }
            }
            Err(detail) => {
                warn!("{} failed on {}: {}", strategy, path.display(), detail);
                failures.push(format!("{}: {}", strategy, detail));
            }
        }
    }

    match best {
        Some(text) => {
            warn!(
                "No strategy produced more than {} chars; using {} output ({} chars)",
                ACCEPT_CHARS,
                text.strategy,
                text.chars()
            );
            Ok(text)
        }
        None => Err(InvoiceError::PdfUnreadable {
            path: path.to_path_buf(),
            detail: failures.join("; "),
        }),
    }
}

fn pdfium_text(path: &Path) -> Result<(String, usize), String> {
    let bindings = match std::env::var_os("PDFIUM_LIB_PATH") {
        Some(p) => {
            let p = PathBuf::from(p);
            let lib = if p.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&p)
            } else {
                p
            };
            Pdfium::bind_to_library(lib)
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| format!("pdfium library unavailable: {:?}", e))?;

    let pdfium = Pdfium::new(bindings);
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| format!("{:?}", e))?;

    let pages = document.pages();
    let mut parts = Vec::with_capacity(pages.len() as usize);
    for page in pages.iter() {
        // Pages without a text layer contribute an empty string.
        parts.push(page.text().map(|t| t.all()).unwrap_or_default());
    }

    Ok((parts.join("\n"), parts.len()))
}

fn pdf_extract_text(path: &Path) -> Result<(String, usize), String> {
    let text = pdf_extract::extract_text(path).map_err(|e| e.to_string())?;
    Ok((text, 0))
}

/// Structural metadata from the trailer's Info dictionary.
pub async fn extract_metadata(path: &Path) -> Result<DocumentMetadata, InvoiceError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || metadata_blocking(&owned))
        .await
        .map_err(|e| InvoiceError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn metadata_blocking(path: &Path) -> Result<DocumentMetadata, InvoiceError> {
    let doc = load_document(path)?;

    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| doc.dereference(obj).ok())
        .and_then(|(_, obj)| obj.as_dict().ok());

    let get_meta = |key: &[u8]| -> Option<String> {
        let (_, value) = doc.dereference(info?.get(key).ok()?).ok()?;
        match value {
            Object::String(bytes, _) => {
                let s = decode_pdf_string(bytes);
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            _ => None,
        }
    };

    Ok(DocumentMetadata {
        page_count: doc.get_pages().len(),
        pdf_version: doc.version.clone(),
        title: get_meta(b"Title"),
        author: get_meta(b"Author"),
        subject: get_meta(b"Subject"),
        creator: get_meta(b"Creator"),
        producer: get_meta(b"Producer"),
    })
}

fn load_document(path: &Path) -> Result<Document, InvoiceError> {
    Document::load(path).map_err(|e| InvoiceError::CorruptPdf {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Text strings are UTF-16BE with a BOM or PDFDocEncoding (Latin-1 superset).
fn decode_pdf_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
            char::decode_utf16(units)
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
        _ => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => bytes.iter().map(|&b| b as char).collect(),
        },
    }
}
