//! Configuration types for invoice extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The config is an explicit value handed
//! to every entry point; there is no global client or settings object.

use crate::error::InvoiceError;
use crate::pipeline::llm::ChatModel;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Canonical minimum length, in characters of trimmed text, before the model
/// is invoked at all.
pub const DEFAULT_MIN_TEXT_CHARS: usize = 50;

/// Upper bound accepted for `max_tokens`.
pub const MAX_TOKENS_LIMIT: usize = 16_000;

/// Default model when only an OpenAI key is available.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for invoice extraction.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use factura_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gpt-4o-mini")
///     .max_tokens(1500)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// LLM model identifier, e.g. "gpt-4o", "claude-sonnet-4-20250514".
    /// If None, uses [`DEFAULT_MODEL`] or the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `chat_model`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed model backend. Takes precedence over `provider_name`.
    pub chat_model: Option<Arc<dyn ChatModel>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 2000.
    ///
    /// Too low a value truncates the JSON and the reply then fails to parse.
    pub max_tokens: usize,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Minimum trimmed character count of the extracted text. Default: 50.
    pub min_text_chars: usize,

    /// Characters of extracted text kept in `raw_text`. Default: 1000.
    pub raw_text_limit: usize,

    /// Currency used when the model reports none. Default: "COP".
    pub default_currency: String,

    /// Rewrite recognisable non-ISO dates to `YYYY-MM-DD`. Default: true.
    pub normalize_dates: bool,

    /// Largest accepted input file in bytes. Default: 10 MiB.
    pub max_file_size: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional stage-event callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            chat_model: None,
            temperature: 0.1,
            max_tokens: 2000,
            system_prompt: None,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            raw_text_limit: 1000,
            default_currency: "COP".to_string(),
            normalize_dates: true,
            max_file_size: 10 * 1024 * 1024,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("chat_model", &self.chat_model.as_ref().map(|_| "<dyn ChatModel>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("min_text_chars", &self.min_text_chars)
            .field("raw_text_limit", &self.raw_text_limit)
            .field("default_currency", &self.default_currency)
            .field("normalize_dates", &self.normalize_dates)
            .field("max_file_size", &self.max_file_size)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn chat_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.config.chat_model = Some(model);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn min_text_chars(mut self, n: usize) -> Self {
        self.config.min_text_chars = n;
        self
    }

    pub fn raw_text_limit(mut self, n: usize) -> Self {
        self.config.raw_text_limit = n;
        self
    }

    pub fn default_currency(mut self, code: impl Into<String>) -> Self {
        self.config.default_currency = code.into();
        self
    }

    pub fn normalize_dates(mut self, v: bool) -> Self {
        self.config.normalize_dates = v;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, InvoiceError> {
        let c = &self.config;
        if c.max_tokens == 0 || c.max_tokens > MAX_TOKENS_LIMIT {
            return Err(InvoiceError::InvalidConfig(format!(
                "max_tokens must be between 1 and {}",
                MAX_TOKENS_LIMIT
            )));
        }
        if c.max_file_size == 0 {
            return Err(InvoiceError::InvalidConfig(
                "max_file_size must be ≥ 1 byte".into(),
            ));
        }
        if c.default_currency.trim().is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "default_currency must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
