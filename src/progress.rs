//! Progress-callback trait for extraction stage events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves from text acquisition to the model call to
//! the finished record.
//!
//! # Example
//!
//! ```rust
//! use factura_extract::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ExtractionProgressCallback for Printer {
//!     fn on_extraction_complete(&self, confidence: f64) {
//!         eprintln!("done, confidence {confidence:.2}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline at each stage boundary.
///
/// Implementations must be `Send + Sync`: callers may run many extractions
/// concurrently with a shared callback. All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once when an extraction begins.
    fn on_extraction_start(&self, input: &str) {
        let _ = input;
    }

    /// Called after text acquisition.
    ///
    /// # Arguments
    /// * `chars`    — character count of the extracted text
    /// * `strategy` — name of the extraction strategy that produced it
    fn on_text_extracted(&self, chars: usize, strategy: &str) {
        let _ = (chars, strategy);
    }

    /// Called just before the model request is sent.
    fn on_model_request(&self, prompt_chars: usize) {
        let _ = prompt_chars;
    }

    /// Called when the model returns a completion.
    fn on_model_response(&self, completion_chars: usize, completion_tokens: usize) {
        let _ = (completion_chars, completion_tokens);
    }

    /// Called once a record has been assembled.
    fn on_extraction_complete(&self, confidence: f64) {
        let _ = confidence;
    }

    /// Called when the extraction fails with a fatal error.
    fn on_extraction_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
