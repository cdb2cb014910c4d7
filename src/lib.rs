//! # factura-extract
//!
//! Turn Colombian electronic invoices (PDF) into structured JSON records with
//! a single LLM call.
//!
//! ## Why this crate?
//!
//! DIAN electronic invoices are generated PDFs with a real text layer, but
//! every issuer lays them out differently. Instead of per-issuer templates,
//! this crate hands the extracted text to a chat model with a fixed JSON
//! schema, then recovers, coerces and scores whatever comes back. A sloppy
//! completion still yields a usable record; only an unreadable input or an
//! unparseable reply is fatal.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input       resolve local file or download from URL, size + magic checks
//!  ├─ 2. Text        pdfium, falling back to pdf-extract (spawn_blocking)
//!  ├─ 3. Prompt      fixed template with the JSON shape
//!  ├─ 4. Model       one completion, no retries
//!  ├─ 5. Recover     brace span → line scan → whole text
//!  ├─ 6. Score       weighted presence of key fields
//!  └─ 7. Normalise   numbers, dates, defaults → InvoiceRecord
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use factura_extract::{extract_invoice, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / EDGEQUAKE_LLM_PROVIDER / …
//!     let config = ExtractionConfig::default();
//!     let record = extract_invoice("factura.pdf", &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&record)?);
//!     eprintln!("confidence: {:.2}", record.confidence_score);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `factura-extract` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! factura-extract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::InvoiceError;
pub use extract::{
    extract_from_text, extract_invoice, extract_invoice_from_bytes, extract_sync,
    extract_to_file, inspect, spawn_extraction, DetachedExtraction,
};
pub use output::{
    DocumentMetadata, InvoiceRecord, InvoiceTotals, LineItem, ProcessingState, ProcessingStatus,
    Supplier, TaxBreakdown,
};
pub use pipeline::llm::{ChatModel, ModelReply, ModelRequest, ProviderModel};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::{build_prompt, DEFAULT_SYSTEM_PROMPT};
