//! Field coercion and record assembly.
//!
//! The model is asked for plain numbers but regularly answers with
//! `"1,234.50"`, `"19%"`-style leftovers, or `"N/A"`. Every numeric schema
//! field goes through [`coerce_number`], which never fails: anything it
//! cannot read becomes `0.0` and a `warn!` line. A record with one bad
//! number is far more useful than no record.
//!
//! [`normalize`] is pure. Given the same parsed object and the same
//! identifier it always returns the same record.

use crate::output::{InvoiceRecord, InvoiceTotals, LineItem, Supplier, TaxBreakdown};
use crate::pipeline::dates::{normalize_date, DateOutcome};
use serde_json::{Map, Value};
use tracing::warn;

/// Knobs for record assembly that come from the extraction config.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    pub default_currency: String,
    pub raw_text_limit: usize,
    pub normalize_dates: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            default_currency: "COP".to_string(),
            raw_text_limit: 1000,
            normalize_dates: true,
        }
    }
}

/// Build an [`InvoiceRecord`] from the parsed model object.
///
/// `confidence_score` is computed separately (over the same, uncoerced
/// object) and passed in so this function stays a plain transformation.
pub fn normalize(
    data: &Map<String, Value>,
    invoice_id: String,
    raw_text: &str,
    confidence_score: f64,
    processing_notes: Vec<String>,
    options: &NormalizeOptions,
) -> InvoiceRecord {
    let currency = coerce_string(data.get("currency"))
        .unwrap_or_else(|| options.default_currency.clone());

    InvoiceRecord {
        invoice_id,
        document_type: coerce_string(data.get("document_type")),
        series: coerce_string(data.get("series")),
        number: coerce_string(data.get("number")),
        issue_date: coerce_date(data.get("issue_date"), "issue_date", options),
        due_date: coerce_date(data.get("due_date"), "due_date", options),
        supplier: nested(data, "supplier").map(build_supplier),
        currency: Some(currency),
        items: build_items(data.get("items")),
        taxes: nested(data, "taxes").map(build_taxes),
        totals: nested(data, "totals").map(build_totals),
        raw_text: truncate_chars(raw_text, options.raw_text_limit),
        confidence_score,
        processing_notes,
    }
}

/// Coerce a loosely-typed value to `f64`, degrading to `0.0`.
///
/// * numbers are accepted as-is
/// * strings lose commas and spaces, are trimmed, then parse; empty ⇒ `0.0`
/// * anything else, or an unparseable string, ⇒ `0.0`
pub fn coerce_number(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| *c != ',' && *c != ' ').collect();
            let cleaned = cleaned.trim();
            if cleaned.is_empty() {
                Some(0.0)
            } else {
                cleaned.parse::<f64>().ok()
            }
        }
        _ => None,
    };

    match parsed {
        Some(n) if n.is_finite() => n,
        _ => {
            warn!("Could not convert {} to a number, using 0.0", value);
            0.0
        }
    }
}

/// Numeric field that stays `None` when the model gave null or nothing.
fn optional_number(map: &Map<String, Value>, key: &str) -> Option<f64> {
    match map.get(key) {
        None | Some(Value::Null) => None,
        Some(v) => Some(coerce_number(v)),
    }
}

/// Numeric field that defaults to `0.0` when absent or null.
fn number_or_zero(map: &Map<String, Value>, key: &str) -> f64 {
    optional_number(map, key).unwrap_or(0.0)
}

fn coerce_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn coerce_date(value: Option<&Value>, field: &str, options: &NormalizeOptions) -> Option<String> {
    let raw = coerce_string(value)?;
    if !options.normalize_dates {
        return Some(raw);
    }
    match normalize_date(&raw) {
        DateOutcome::Iso => Some(raw),
        DateOutcome::Rewritten(iso) => Some(iso),
        DateOutcome::Unrecognised => {
            warn!("{} '{}' is not a recognisable date, keeping it verbatim", field, raw);
            Some(raw)
        }
    }
}

/// A nested section, present only when its key holds an object.
fn nested<'a>(data: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    match data.get(key)? {
        Value::Object(map) => Some(map),
        Value::Null => None,
        other => {
            warn!("Ignoring '{}': expected an object, got {}", key, other);
            None
        }
    }
}

fn build_supplier(map: &Map<String, Value>) -> Supplier {
    Supplier {
        name: coerce_string(map.get("name")),
        tax_id: coerce_string(map.get("tax_id")),
        address: coerce_string(map.get("address")),
        phone: coerce_string(map.get("phone")),
        email: coerce_string(map.get("email")),
    }
}

fn build_items(value: Option<&Value>) -> Vec<LineItem> {
    let Some(Value::Array(entries)) = value else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::Object(map) => Some(build_item(map)),
            other => {
                warn!("Skipping line item that is not an object: {}", other);
                None
            }
        })
        .collect()
}

fn build_item(map: &Map<String, Value>) -> LineItem {
    let description = coerce_string(map.get("description")).unwrap_or_else(|| {
        warn!("Line item has no description");
        String::new()
    });

    LineItem {
        description,
        quantity: number_or_zero(map, "quantity"),
        unit_price: number_or_zero(map, "unit_price"),
        discount_percentage: number_or_zero(map, "discount_percentage"),
        subtotal: number_or_zero(map, "subtotal"),
        tax_amount: optional_number(map, "tax_amount"),
    }
}

fn build_taxes(map: &Map<String, Value>) -> TaxBreakdown {
    TaxBreakdown {
        ica_percentage: optional_number(map, "ica_percentage"),
        ica_amount: optional_number(map, "ica_amount"),
        fuente_percentage: optional_number(map, "fuente_percentage"),
        fuente_amount: optional_number(map, "fuente_amount"),
        iva_percentage: optional_number(map, "iva_percentage"),
        iva_amount: optional_number(map, "iva_amount"),
    }
}

fn build_totals(map: &Map<String, Value>) -> InvoiceTotals {
    InvoiceTotals {
        subtotal: number_or_zero(map, "subtotal"),
        discount_total: number_or_zero(map, "discount_total"),
        tax_total: number_or_zero(map, "tax_total"),
        retention_total: number_or_zero(map, "retention_total"),
        total: number_or_zero(map, "total"),
    }
}

/// First `limit` characters (not bytes) of `text`, or `None` when empty.
fn truncate_chars(text: &str, limit: usize) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(limit).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    fn run(v: Value) -> InvoiceRecord {
        normalize(
            &object(v),
            "id-1".into(),
            "texto",
            0.5,
            Vec::new(),
            &NormalizeOptions::default(),
        )
    }

    #[test]
    fn thousands_separators_are_stripped() {
        assert_eq!(coerce_number(&json!("1,234.50")), 1234.50);
        assert_eq!(coerce_number(&json!("1 500 000")), 1_500_000.0);
    }

    #[test]
    fn unparseable_values_degrade_to_zero() {
        assert_eq!(coerce_number(&json!("N/A")), 0.0);
        assert_eq!(coerce_number(&json!("$ 100")), 0.0);
        assert_eq!(coerce_number(&json!(true)), 0.0);
        assert_eq!(coerce_number(&json!({"v": 1})), 0.0);
        assert_eq!(coerce_number(&json!("NaN")), 0.0);
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(coerce_number(&json!("12\n")), 12.0);
        assert_eq!(coerce_number(&json!("\t5")), 5.0);
        assert_eq!(coerce_number(&json!("\r\n1,000.5\t")), 1000.5);
    }

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(coerce_number(&json!("")), 0.0);
        assert_eq!(coerce_number(&json!(" , ")), 0.0);
    }

    #[test]
    fn numbers_pass_through() {
        assert_eq!(coerce_number(&json!(19)), 19.0);
        assert_eq!(coerce_number(&json!(19.5)), 19.5);
        assert_eq!(coerce_number(&json!("-3.25")), -3.25);
    }

    #[test]
    fn missing_items_become_empty_vec() {
        let record = run(json!({"number": "FE-1"}));
        assert!(record.items.is_empty());
        let record = run(json!({"items": null}));
        assert!(record.items.is_empty());
    }

    #[test]
    fn items_are_coerced() {
        let record = run(json!({
            "items": [
                {"description": "Tornillo", "quantity": "12", "unit_price": "1,500.00",
                 "discount_percentage": null, "subtotal": 18000, "tax_amount": "3,420"},
                "garbage",
                {"quantity": 1}
            ]
        }));
        assert_eq!(record.items.len(), 2);
        let first = &record.items[0];
        assert_eq!(first.description, "Tornillo");
        assert_eq!(first.quantity, 12.0);
        assert_eq!(first.unit_price, 1500.0);
        assert_eq!(first.discount_percentage, 0.0);
        assert_eq!(first.subtotal, 18000.0);
        assert_eq!(first.tax_amount, Some(3420.0));
        assert_eq!(record.items[1].description, "");
        assert_eq!(record.items[1].tax_amount, None);
    }

    #[test]
    fn nested_sections_only_when_present() {
        let record = run(json!({"supplier": null}));
        assert!(record.supplier.is_none());
        assert!(record.taxes.is_none());
        assert!(record.totals.is_none());

        let record = run(json!({
            "supplier": {"name": "ACME S.A.S.", "tax_id": 900123456},
            "taxes": {"iva_percentage": "19", "ica_amount": null},
            "totals": {"total": "1,000.00"}
        }));
        let supplier = record.supplier.unwrap();
        assert_eq!(supplier.name.as_deref(), Some("ACME S.A.S."));
        assert_eq!(supplier.tax_id.as_deref(), Some("900123456"));
        let taxes = record.taxes.unwrap();
        assert_eq!(taxes.iva_percentage, Some(19.0));
        assert_eq!(taxes.ica_amount, None);
        let totals = record.totals.unwrap();
        assert_eq!(totals.total, 1000.0);
        assert_eq!(totals.subtotal, 0.0);
        assert_eq!(totals.retention_total, 0.0);
    }

    #[test]
    fn currency_defaults_to_cop() {
        assert_eq!(run(json!({})).currency.as_deref(), Some("COP"));
        assert_eq!(run(json!({"currency": null})).currency.as_deref(), Some("COP"));
        assert_eq!(run(json!({"currency": "USD"})).currency.as_deref(), Some("USD"));
    }

    #[test]
    fn blank_strings_become_none() {
        let record = run(json!({"series": "  ", "number": "FE-9"}));
        assert_eq!(record.series, None);
        assert_eq!(record.number.as_deref(), Some("FE-9"));
    }

    #[test]
    fn dates_are_normalised_when_enabled() {
        let record = run(json!({"issue_date": "24/07/2025", "due_date": "2025-08-23"}));
        assert_eq!(record.issue_date.as_deref(), Some("2025-07-24"));
        assert_eq!(record.due_date.as_deref(), Some("2025-08-23"));

        let options = NormalizeOptions {
            normalize_dates: false,
            ..NormalizeOptions::default()
        };
        let record = normalize(
            &object(json!({"issue_date": "24/07/2025"})),
            "id".into(),
            "",
            0.0,
            Vec::new(),
            &options,
        );
        assert_eq!(record.issue_date.as_deref(), Some("24/07/2025"));
    }

    #[test]
    fn raw_text_is_limited_by_characters() {
        let text = "ñ".repeat(1500);
        let record = normalize(
            &Map::new(),
            "id".into(),
            &text,
            0.0,
            Vec::new(),
            &NormalizeOptions::default(),
        );
        assert_eq!(record.raw_text.unwrap().chars().count(), 1000);
    }

    #[test]
    fn normalisation_is_idempotent() {
        let data = object(json!({
            "document_type": "FACTURA ELECTRONICA",
            "items": [{"description": "a", "quantity": "1", "unit_price": "2", "subtotal": "2"}],
            "totals": {"total": "2"}
        }));
        let opts = NormalizeOptions::default();
        let a = normalize(&data, "same".into(), "t", 0.5, vec!["n".into()], &opts);
        let b = normalize(&data, "same".into(), "t", 0.5, vec!["n".into()], &opts);
        assert_eq!(a, b);
    }
}
