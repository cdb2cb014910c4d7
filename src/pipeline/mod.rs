//! Pipeline stages for invoice extraction.
//!
//! Each submodule implements one step; only [`llm`] does network I/O and only
//! [`pdf`] touches native code.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ pdf ──▶ llm ──▶ json ──▶ confidence ──▶ normalize
//! (path/URL) (text)  (1 call) (recover)  (score)      (record)
//! ```
//!
//! 1. [`input`]  — resolve a path or URL to a local, size-checked PDF
//! 2. [`pdf`]    — validate structure and pull the text layer; blocking work
//!    runs in `spawn_blocking`
//! 3. [`llm`]    — one completion through the [`llm::ChatModel`] seam
//! 4. [`json`]   — locate and parse the JSON object in the completion
//! 5. [`confidence`] — weighted presence score over the uncoerced object
//! 6. [`normalize`]  — coerce fields and assemble the record, with
//!    [`dates`] rewriting day-first dates

pub mod confidence;
pub mod dates;
pub mod input;
pub mod json;
pub mod llm;
pub mod normalize;
pub mod pdf;
