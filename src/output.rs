//! Output types produced by the extraction pipeline.
//!
//! Field names serialise in snake_case, matching the JSON shape the model is
//! asked to produce and the shape existing consumers of the HTTP service
//! already read.

use crate::error::InvoiceError;
use serde::{Deserialize, Serialize};

/// A normalised invoice, built once per successful pipeline run.
///
/// Every numeric field holds a real `f64` even when the model answered with
/// a string such as `"1,234.50"`. `items` is never absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Fresh UUID minted for this processing attempt. Not a storage key.
    pub invoice_id: String,
    pub document_type: Option<String>,
    pub series: Option<String>,
    pub number: Option<String>,
    /// `YYYY-MM-DD` when the model (or date normalisation) produced one.
    pub issue_date: Option<String>,
    pub due_date: Option<String>,
    pub supplier: Option<Supplier>,
    /// ISO currency code. `"COP"` when the model gave none.
    pub currency: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub taxes: Option<TaxBreakdown>,
    pub totals: Option<InvoiceTotals>,
    /// First 1000 characters of the extracted text, kept for auditing.
    pub raw_text: Option<String>,
    /// Heuristic completeness score in `[0, 1]`, two decimals.
    pub confidence_score: f64,
    /// Provenance: original filename, byte size, extracted character count.
    #[serde(default)]
    pub processing_notes: Vec<String>,
}

/// Issuer of the invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub name: Option<String>,
    /// NIT or other tax identifier.
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// One billed product or service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    #[serde(default)]
    pub discount_percentage: f64,
    pub subtotal: f64,
    pub tax_amount: Option<f64>,
}

/// Colombian tax lines: ICA, withholding at source (retefuente) and IVA.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub ica_percentage: Option<f64>,
    pub ica_amount: Option<f64>,
    pub fuente_percentage: Option<f64>,
    pub fuente_amount: Option<f64>,
    pub iva_percentage: Option<f64>,
    pub iva_amount: Option<f64>,
}

/// Invoice totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: f64,
    #[serde(default)]
    pub discount_total: f64,
    #[serde(default)]
    pub tax_total: f64,
    #[serde(default)]
    pub retention_total: f64,
    pub total: f64,
}

/// State reported by the detached (fire-and-forget) variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    Processing,
    Completed,
    Failed,
}

/// Acknowledgement returned by [`crate::extract::spawn_extraction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub status: ProcessingState,
    pub message: String,
    pub invoice_id: Option<String>,
    pub error_details: Option<String>,
}

impl ProcessingStatus {
    /// Acknowledgement for a job that has just been handed to the runtime.
    pub fn processing(invoice_id: &str, input: &str) -> Self {
        Self {
            status: ProcessingState::Processing,
            message: format!("Processing '{}' in the background", input),
            invoice_id: Some(invoice_id.to_string()),
            error_details: None,
        }
    }

    /// Final state of a finished job.
    pub fn finished(invoice_id: &str, result: &Result<InvoiceRecord, InvoiceError>) -> Self {
        match result {
            Ok(record) => Self {
                status: ProcessingState::Completed,
                message: format!(
                    "Invoice extracted with confidence {:.2}",
                    record.confidence_score
                ),
                invoice_id: Some(invoice_id.to_string()),
                error_details: None,
            },
            Err(e) => Self {
                status: ProcessingState::Failed,
                message: "Invoice extraction failed".to_string(),
                invoice_id: Some(invoice_id.to_string()),
                error_details: Some(e.to_string()),
            },
        }
    }
}

/// Structural metadata of a PDF, available without any model call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub page_count: usize,
    pub pdf_version: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}
