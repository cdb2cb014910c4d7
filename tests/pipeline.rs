//! Offline integration tests for the extraction pipeline.
//!
//! The model boundary is replaced by [`ScriptedModel`], which returns a fixed
//! completion and counts how often it was asked. No network, no API key, no
//! pdfium needed.

use async_trait::async_trait;
use factura_extract::{
    extract_from_text, inspect, spawn_extraction, ChatModel, ExtractionConfig,
    ExtractionProgressCallback, InvoiceError, ModelReply, ModelRequest, ProcessingState,
};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library logs to the test harness; `RUST_LOG=debug` shows them.
fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct ScriptedModel {
    reply: String,
    calls: AtomicUsize,
    last_request: Mutex<Option<ModelRequest>>,
}

impl ScriptedModel {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply, InvoiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(ModelReply {
            content: self.reply.clone(),
            prompt_tokens: 900,
            completion_tokens: 120,
        })
    }
}

struct FailingModel;

#[async_trait]
impl ChatModel for FailingModel {
    async fn complete(&self, _request: &ModelRequest) -> Result<ModelReply, InvoiceError> {
        Err(InvoiceError::ModelInvocationFailure {
            message: "HTTP 429 Too Many Requests".into(),
        })
    }
}

fn config_for(model: Arc<dyn ChatModel>) -> ExtractionConfig {
    ExtractionConfig::builder().chat_model(model).build().unwrap()
}

const INVOICE_TEXT: &str = "FACTURA ELECTRONICA DE VENTA No. FE-100\n\
Fecha de emision: 24/07/2025  Vencimiento: 23/08/2025\n\
ACME S.A.S.  NIT 900.123.456-7  Calle 10 # 20-30 Bogota\n\
Tornillo hexagonal x 12   1.500   18.000\n\
Subtotal 18.000  IVA 19% 3.420  Total 21.420";

const FULL_REPLY: &str = r#"{
  "document_type": "FACTURA ELECTRONICA DE VENTA",
  "series": "FE",
  "number": "FE-100",
  "issue_date": "24/07/2025",
  "due_date": "2025-08-23",
  "supplier": {"name": "ACME S.A.S.", "tax_id": "900123456-7", "address": "Calle 10 # 20-30 Bogota", "phone": null, "email": null},
  "currency": "COP",
  "items": [
    {"description": "Tornillo hexagonal", "quantity": 12, "unit_price": "1,500", "discount_percentage": 0, "subtotal": "18,000", "tax_amount": 3420}
  ],
  "taxes": {"ica_percentage": null, "ica_amount": null, "fuente_percentage": null, "fuente_amount": null, "iva_percentage": 19.0, "iva_amount": "3,420"},
  "totals": {"subtotal": 18000, "discount_total": 0, "tax_total": 3420, "retention_total": 0, "total": "21,420.00"}
}"#;

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn short_text_fails_fast_without_model_call() {
    init_logs();
    let model = ScriptedModel::new(FULL_REPLY);
    let err = extract_from_text("FACTURA 1", &config_for(model.clone()))
        .await
        .unwrap_err();

    assert!(
        matches!(err, InvoiceError::EmptyOrInsufficientText { .. }),
        "got {err:?}"
    );
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn whitespace_only_text_is_insufficient() {
    let model = ScriptedModel::new(FULL_REPLY);
    let padded = format!("{}FACTURA{}", " ".repeat(40), "\n".repeat(40));
    let err = extract_from_text(&padded, &config_for(model.clone()))
        .await
        .unwrap_err();
    match err {
        InvoiceError::EmptyOrInsufficientText { chars, min } => {
            assert_eq!(chars, 7);
            assert_eq!(min, 50);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn empty_text_is_rejected_even_without_a_threshold() {
    let model = ScriptedModel::new(FULL_REPLY);
    let config = ExtractionConfig::builder()
        .chat_model(model.clone())
        .min_text_chars(0)
        .build()
        .unwrap();

    for text in ["", "  \n\t "] {
        let err = extract_from_text(text, &config).await.unwrap_err();
        assert!(
            matches!(err, InvoiceError::EmptyOrInsufficientText { chars: 0, min: 0 }),
            "got {err:?}"
        );
    }
    assert_eq!(model.calls(), 0);

    extract_from_text("FE-100", &config).await.unwrap();
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn minimal_reply_is_coerced_and_scored() {
    init_logs();
    let model = ScriptedModel::new(
        r#"{"document_type":"FACTURA ELECTRONICA","number":"FE-100","totals":{"total":"1,000.00"}}"#,
    );
    let record = extract_from_text(INVOICE_TEXT, &config_for(model.clone()))
        .await
        .unwrap();

    assert_eq!(model.calls(), 1);
    assert_eq!(record.document_type.as_deref(), Some("FACTURA ELECTRONICA"));
    assert_eq!(record.number.as_deref(), Some("FE-100"));
    assert_eq!(record.totals.as_ref().unwrap().total, 1000.00);
    assert!(record.items.is_empty());
    assert_eq!(record.confidence_score, 0.45);
    assert_eq!(record.currency.as_deref(), Some("COP"));

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["items"], serde_json::json!([]));
    assert!(json["totals"]["total"].is_f64());
}

#[tokio::test]
async fn prose_around_json_is_discarded() {
    let reply = format!(
        "Claro, aquí tienes la factura estructurada:\n\n{}\n\nAvísame si necesitas algo más.",
        r#"{"number": "FE-100", "currency": "USD"}"#
    );
    let model = ScriptedModel::new(&reply);
    let record = extract_from_text(INVOICE_TEXT, &config_for(model))
        .await
        .unwrap();

    assert_eq!(record.number.as_deref(), Some("FE-100"));
    assert_eq!(record.currency.as_deref(), Some("USD"));
    let json = serde_json::to_string(&record).unwrap();
    assert!(!json.contains("Claro"));
    assert!(!json.contains("Avísame"));
}

#[tokio::test]
async fn reply_without_braces_is_malformed() {
    init_logs();
    let reply = "Lo siento, no puedo leer esta factura.";
    let model = ScriptedModel::new(reply);
    let err = extract_from_text(INVOICE_TEXT, &config_for(model))
        .await
        .unwrap_err();

    assert!(matches!(err, InvoiceError::MalformedModelOutput { .. }));
    assert_eq!(err.model_output(), Some(reply));
}

#[tokio::test]
async fn provider_failure_is_not_retried() {
    let err = extract_from_text(INVOICE_TEXT, &config_for(Arc::new(FailingModel)))
        .await
        .unwrap_err();
    match err {
        InvoiceError::ModelInvocationFailure { message } => assert!(message.contains("429")),
        other => panic!("unexpected error: {other:?}"),
    }
}

// ── Record properties ────────────────────────────────────────────────────────

#[tokio::test]
async fn full_reply_produces_complete_record() {
    init_logs();
    let model = ScriptedModel::new(FULL_REPLY);
    let record = extract_from_text(INVOICE_TEXT, &config_for(model))
        .await
        .unwrap();

    assert_eq!(record.confidence_score, 1.0);
    assert_eq!(record.issue_date.as_deref(), Some("2025-07-24"));
    assert_eq!(record.due_date.as_deref(), Some("2025-08-23"));

    let item = &record.items[0];
    assert_eq!(item.quantity, 12.0);
    assert_eq!(item.unit_price, 1500.0);
    assert_eq!(item.subtotal, 18000.0);

    let taxes = record.taxes.as_ref().unwrap();
    assert_eq!(taxes.iva_amount, Some(3420.0));
    assert_eq!(taxes.ica_amount, None);

    let totals = record.totals.as_ref().unwrap();
    assert_eq!(totals.total, 21420.0);
    assert_eq!(totals.retention_total, 0.0);

    let supplier = record.supplier.as_ref().unwrap();
    assert_eq!(supplier.name.as_deref(), Some("ACME S.A.S."));
    assert_eq!(supplier.phone, None);
}

#[tokio::test]
async fn request_carries_text_and_sampling_settings() {
    let model = ScriptedModel::new(FULL_REPLY);
    let config = ExtractionConfig::builder()
        .chat_model(model.clone())
        .temperature(0.0)
        .max_tokens(1200)
        .build()
        .unwrap();
    extract_from_text(INVOICE_TEXT, &config).await.unwrap();

    let request = model.last_request.lock().unwrap().clone().unwrap();
    assert!(request.user_prompt.contains(INVOICE_TEXT));
    assert!(request.system_prompt.contains("JSON"));
    assert_eq!(request.temperature, 0.0);
    assert_eq!(request.max_tokens, 1200);
}

#[tokio::test]
async fn same_reply_gives_same_record_apart_from_id() {
    let model = ScriptedModel::new(FULL_REPLY);
    let config = config_for(model);
    let mut a = extract_from_text(INVOICE_TEXT, &config).await.unwrap();
    let b = extract_from_text(INVOICE_TEXT, &config).await.unwrap();

    assert_ne!(a.invoice_id, b.invoice_id);
    a.invoice_id = b.invoice_id.clone();
    assert_eq!(a, b);
}

#[tokio::test]
async fn confidence_stays_in_range_for_odd_replies() {
    init_logs();
    let replies = [
        "{}",
        r#"{"items": "not a list"}"#,
        r#"{"totals": 5, "supplier": [1,2]}"#,
        r#"{"number": 0, "document_type": false, "items": [{}]}"#,
        FULL_REPLY,
    ];
    for reply in replies {
        let record = extract_from_text(INVOICE_TEXT, &config_for(ScriptedModel::new(reply)))
            .await
            .unwrap();
        assert!(
            (0.0..=1.0).contains(&record.confidence_score),
            "{reply}: {}",
            record.confidence_score
        );
        assert_eq!(
            record.confidence_score,
            (record.confidence_score * 100.0).round() / 100.0
        );
    }
}

#[tokio::test]
async fn custom_currency_default_and_date_passthrough() {
    let config = ExtractionConfig::builder()
        .chat_model(ScriptedModel::new(r#"{"issue_date": "24/07/2025"}"#))
        .default_currency("USD")
        .normalize_dates(false)
        .build()
        .unwrap();
    let record = extract_from_text(INVOICE_TEXT, &config).await.unwrap();
    assert_eq!(record.currency.as_deref(), Some("USD"));
    assert_eq!(record.issue_date.as_deref(), Some("24/07/2025"));
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl ExtractionProgressCallback for Recorder {
    fn on_extraction_start(&self, _input: &str) {
        self.events.lock().unwrap().push("start".into());
    }
    fn on_model_request(&self, _prompt_chars: usize) {
        self.events.lock().unwrap().push("request".into());
    }
    fn on_model_response(&self, _chars: usize, tokens: usize) {
        self.events.lock().unwrap().push(format!("response:{tokens}"));
    }
    fn on_extraction_complete(&self, confidence: f64) {
        self.events.lock().unwrap().push(format!("complete:{confidence}"));
    }
    fn on_extraction_error(&self, _error: &str) {
        self.events.lock().unwrap().push("error".into());
    }
}

#[tokio::test]
async fn progress_events_follow_the_stages() {
    let recorder = Arc::new(Recorder::default());
    let config = ExtractionConfig::builder()
        .chat_model(ScriptedModel::new(FULL_REPLY))
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    extract_from_text(INVOICE_TEXT, &config).await.unwrap();

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["start", "request", "response:120", "complete:1"]
    );
}

#[tokio::test]
async fn progress_reports_fatal_errors() {
    let recorder = Arc::new(Recorder::default());
    let config = ExtractionConfig::builder()
        .chat_model(ScriptedModel::new("{}"))
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    extract_from_text("short", &config).await.unwrap_err();

    assert_eq!(*recorder.events.lock().unwrap(), vec!["start", "error"]);
}

// ── Other entry points ───────────────────────────────────────────────────────

#[tokio::test]
async fn background_extraction_acknowledges_then_fails_on_missing_file() {
    let config = config_for(ScriptedModel::new(FULL_REPLY));
    let detached = spawn_extraction("/nonexistent/factura.pdf", config);

    assert_eq!(detached.status.status, ProcessingState::Processing);
    assert!(detached.status.invoice_id.is_some());
    assert!(detached.status.error_details.is_none());

    let outcome = detached.handle.await.unwrap();
    assert!(matches!(outcome, Err(InvoiceError::FileNotFound { .. })));
}

#[tokio::test]
async fn inspect_rejects_non_pdf() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(b"<html>not a pdf</html>").unwrap();
    f.flush().unwrap();

    let err = inspect(f.path().to_string_lossy()).await.unwrap_err();
    assert!(matches!(err, InvoiceError::NotAPdf { .. }));
}

#[tokio::test]
async fn inspect_reports_missing_file() {
    let err = inspect("/nonexistent/factura.pdf").await.unwrap_err();
    assert!(matches!(err, InvoiceError::FileNotFound { .. }));
}
