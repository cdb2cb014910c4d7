//! Extraction entry points.
//!
//! Every entry point funnels into the same text stage: length gate, prompt,
//! one model call, JSON recovery, confidence, normalisation. The PDF-facing
//! functions add input resolution and text acquisition in front of it and
//! provenance notes to the record.
//!
//! Nothing here keeps state between calls. Any number of extractions may
//! run concurrently with the same [`ExtractionConfig`].

use crate::config::{ExtractionConfig, DEFAULT_MODEL};
use crate::error::InvoiceError;
use crate::output::{DocumentMetadata, InvoiceRecord, ProcessingState, ProcessingStatus};
use crate::pipeline::llm::{self, ChatModel, ProviderModel};
use crate::pipeline::normalize::{self, NormalizeOptions};
use crate::pipeline::{confidence, input, json, pdf};
use crate::prompts::build_prompt;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Extract an invoice record from already-extracted text.
///
/// Fails with [`InvoiceError::EmptyOrInsufficientText`] before any model
/// call when the trimmed text is empty or shorter than `config.min_text_chars`.
pub async fn extract_from_text(
    text: &str,
    config: &ExtractionConfig,
) -> Result<InvoiceRecord, InvoiceError> {
    notify_start(config, "<text>");
    let notes = vec![extracted_note(text)];
    let result = text_stage(text, notes, new_invoice_id(), config).await;
    report(config, result)
}

/// Extract an invoice record from a PDF path or HTTP(S) URL.
///
/// # Example
/// ```rust,no_run
/// use factura_extract::{extract_invoice, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let record = extract_invoice("factura.pdf", &ExtractionConfig::default()).await?;
/// println!("{:?} total={:?}", record.number, record.totals.map(|t| t.total));
/// # Ok(())
/// # }
/// ```
pub async fn extract_invoice(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<InvoiceRecord, InvoiceError> {
    let input_str = input_str.as_ref();
    notify_start(config, input_str);
    let result = extract_invoice_with_id(input_str, new_invoice_id(), config).await;
    report(config, result)
}

/// Extract an invoice record from PDF bytes held in memory.
///
/// `filename` is only used for the processing notes and error messages.
/// The bytes are written to a managed temp file that is removed on return.
pub async fn extract_invoice_from_bytes(
    bytes: &[u8],
    filename: &str,
    config: &ExtractionConfig,
) -> Result<InvoiceRecord, InvoiceError> {
    notify_start(config, filename);
    let result = from_bytes(bytes, filename, config).await;
    report(config, result)
}

async fn from_bytes(
    bytes: &[u8],
    filename: &str,
    config: &ExtractionConfig,
) -> Result<InvoiceRecord, InvoiceError> {
    let size = bytes.len() as u64;
    if size > config.max_file_size {
        return Err(InvoiceError::FileTooLarge {
            path: filename.into(),
            size,
            max: config.max_file_size,
        });
    }
    if !bytes.starts_with(b"%PDF") {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(InvoiceError::NotAPdf {
            path: filename.into(),
            magic,
        });
    }

    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| InvoiceError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| InvoiceError::Internal(format!("tempfile write: {e}")))?;

    // `tmp` is dropped (and the file deleted) when this returns
    pdf_stage(tmp.path(), filename, size, new_invoice_id(), config).await
}

/// Extract an invoice and write it as pretty JSON to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<InvoiceRecord, InvoiceError> {
    let record = extract_invoice(input_str, config).await?;
    let path = output_path.as_ref();

    let json = serde_json::to_string_pretty(&record)
        .map_err(|e| InvoiceError::Internal(format!("Failed to serialise record: {e}")))?;
    write_atomic(path, json.as_bytes()).await?;

    info!("Wrote invoice {} to {}", record.invoice_id, path.display());
    Ok(record)
}

/// Synchronous wrapper around [`extract_invoice`].
///
/// Creates a temporary tokio runtime internally; do not call from async code.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<InvoiceRecord, InvoiceError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| InvoiceError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_invoice(input_str, config))
}

/// Read PDF metadata without extracting anything.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, InvoiceError> {
    let defaults = ExtractionConfig::default();
    let resolved = input::resolve_input(
        input_str.as_ref(),
        defaults.download_timeout_secs,
        defaults.max_file_size,
    )
    .await?;
    pdf::extract_metadata(resolved.path()).await
}

/// A background extraction started by [`spawn_extraction`].
#[derive(Debug)]
pub struct DetachedExtraction {
    /// Acknowledgement in the `processing` state; its `invoice_id` is the
    /// id the finished record will carry.
    pub status: ProcessingStatus,
    /// Awaiting it is optional. Dropping it leaves the task running.
    pub handle: JoinHandle<Result<InvoiceRecord, InvoiceError>>,
}

/// Start an extraction in the background and return immediately.
///
/// The outcome is logged when the task finishes. There is no polling API;
/// callers that care can await the returned handle.
///
/// Must be called from within a tokio runtime.
pub fn spawn_extraction(input_str: impl Into<String>, config: ExtractionConfig) -> DetachedExtraction {
    let input_str = input_str.into();
    let invoice_id = new_invoice_id();

    let status = ProcessingStatus::processing(&invoice_id, &input_str);

    let handle = tokio::spawn(async move {
        notify_start(&config, &input_str);
        let result = extract_invoice_with_id(&input_str, invoice_id.clone(), &config).await;
        let finished = ProcessingStatus::finished(&invoice_id, &result);
        match finished.status {
            ProcessingState::Failed => error!(
                "Background extraction {} of '{}' failed: {}",
                invoice_id,
                input_str,
                finished.error_details.as_deref().unwrap_or_default()
            ),
            _ => info!("Background extraction {}: {}", invoice_id, finished.message),
        }
        report(&config, result)
    });

    DetachedExtraction { status, handle }
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn extract_invoice_with_id(
    input_str: &str,
    invoice_id: String,
    config: &ExtractionConfig,
) -> Result<InvoiceRecord, InvoiceError> {
    info!("Starting extraction: {}", input_str);
    let resolved =
        input::resolve_input(input_str, config.download_timeout_secs, config.max_file_size)
            .await?;
    pdf_stage(
        resolved.path(),
        resolved.filename(),
        resolved.size(),
        invoice_id,
        config,
    )
    .await
}

/// Validate, acquire text, then hand over to the text stage with provenance notes.
async fn pdf_stage(
    path: &Path,
    filename: &str,
    size: u64,
    invoice_id: String,
    config: &ExtractionConfig,
) -> Result<InvoiceRecord, InvoiceError> {
    let pages = pdf::validate_pdf(path).await?;
    debug!("{} has {} pages", filename, pages);

    let extracted = pdf::extract_text(path).await?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_text_extracted(extracted.chars(), &extracted.strategy.to_string());
    }

    let notes = vec![
        format!("Original file: {}", filename),
        format!("Size: {} bytes", size),
        extracted_note(&extracted.text),
    ];
    text_stage(&extracted.text, notes, invoice_id, config).await
}

/// Length gate, prompt, model, recovery, scoring, normalisation.
async fn text_stage(
    text: &str,
    notes: Vec<String>,
    invoice_id: String,
    config: &ExtractionConfig,
) -> Result<InvoiceRecord, InvoiceError> {
    let start = Instant::now();

    let chars = text.trim().chars().count();
    if chars == 0 || chars < config.min_text_chars {
        return Err(InvoiceError::EmptyOrInsufficientText {
            chars,
            min: config.min_text_chars,
        });
    }

    let model = resolve_model(config)?;

    let prompt = build_prompt(text);
    if let Some(ref cb) = config.progress_callback {
        cb.on_model_request(prompt.chars().count());
    }
    let request = llm::build_request(prompt, config);
    info!("Requesting structured extraction ({} chars of text)", chars);

    let reply = llm::invoke(model.as_ref(), &request).await?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_model_response(reply.content.chars().count(), reply.completion_tokens);
    }

    let parsed = json::recover_object(&reply.content)?;
    let score = confidence::confidence_score(&parsed);
    let record = normalize::normalize(
        &parsed,
        invoice_id,
        text,
        score,
        notes,
        &normalize_options(config),
    );

    info!(
        "Extracted invoice {} ({} items, confidence {:.2}) in {}ms",
        record.invoice_id,
        record.items.len(),
        record.confidence_score,
        start.elapsed().as_millis()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(record.confidence_score);
    }
    Ok(record)
}

fn normalize_options(config: &ExtractionConfig) -> NormalizeOptions {
    NormalizeOptions {
        default_currency: config.default_currency.clone(),
        raw_text_limit: config.raw_text_limit,
        normalize_dates: config.normalize_dates,
    }
}

fn new_invoice_id() -> String {
    Uuid::new_v4().to_string()
}

fn extracted_note(text: &str) -> String {
    format!("Extracted text: {} characters", text.chars().count())
}

fn notify_start(config: &ExtractionConfig, input: &str) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(input);
    }
}

/// Forward a fatal error to the progress callback before returning it.
fn report<T>(config: &ExtractionConfig, result: Result<T, InvoiceError>) -> Result<T, InvoiceError> {
    if let (Err(e), Some(cb)) = (&result, &config.progress_callback) {
        cb.on_extraction_error(&e.to_string());
    }
    result
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), InvoiceError> {
    let write_failed = |source: std::io::Error| InvoiceError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_failed)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, InvoiceError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        InvoiceError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Pick the model backend, most specific source first.
///
/// 1. `config.chat_model`, used as-is (tests, custom middleware).
/// 2. `config.provider_name` with `config.model` (or [`DEFAULT_MODEL`]).
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, both non-empty.
/// 4. `OPENAI_API_KEY` present: OpenAI with `config.model` or [`DEFAULT_MODEL`].
/// 5. Whatever `ProviderFactory::from_env` detects.
fn resolve_model(config: &ExtractionConfig) -> Result<Arc<dyn ChatModel>, InvoiceError> {
    if let Some(ref model) = config.chat_model {
        return Ok(Arc::clone(model));
    }
    let provider = resolve_provider(config)?;
    Ok(Arc::new(ProviderModel::new(provider)))
}

fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, InvoiceError> {
    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| InvoiceError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be detected from the environment.\n\
                Set OPENAI_API_KEY (or another provider key) or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
