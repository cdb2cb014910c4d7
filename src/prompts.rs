//! Prompts for LLM-based invoice extraction.
//!
//! The JSON shape in [`build_prompt`] must stay in step with the fields
//! [`crate::pipeline::normalize`] reads. Its formatting rules are requests,
//! not guarantees: coercion downstream is what keeps the record well-typed.
//!
//! The system prompt can be replaced through
//! [`crate::config::ExtractionConfig::system_prompt`].

/// Default system prompt framing the model as an invoice specialist.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert in processing Colombian electronic \
invoices (facturas electrónicas DIAN). Extract information precisely and return only valid JSON.";

/// Target object shape, field by field.
const JSON_SHAPE: &str = r#"{
    "document_type": "document type (e.g. FACTURA ELECTRONICA, NOTA DEBITO, NOTA CREDITO)",
    "series": "invoice series / prefix",
    "number": "invoice number",
    "issue_date": "issue date in YYYY-MM-DD format",
    "due_date": "due date in YYYY-MM-DD format",
    "supplier": {
        "name": "supplier / issuer name",
        "tax_id": "NIT or tax identification",
        "address": "address",
        "phone": "phone",
        "email": "email"
    },
    "currency": "currency code (COP, USD, etc.)",
    "items": [
        {
            "description": "product / service description",
            "quantity": numeric_quantity,
            "unit_price": numeric_unit_price,
            "discount_percentage": numeric_discount_percentage,
            "subtotal": numeric_subtotal,
            "tax_amount": numeric_tax_amount
        }
    ],
    "taxes": {
        "ica_percentage": numeric_ica_percentage,
        "ica_amount": numeric_ica_amount,
        "fuente_percentage": numeric_retefuente_percentage,
        "fuente_amount": numeric_retefuente_amount,
        "iva_percentage": numeric_iva_percentage,
        "iva_amount": numeric_iva_amount
    },
    "totals": {
        "subtotal": numeric_subtotal,
        "discount_total": numeric_discount_total,
        "tax_total": numeric_tax_total,
        "retention_total": numeric_retention_total,
        "total": numeric_grand_total
    }
}"#;

/// Rules appended after the shape.
const INSTRUCTIONS: &str = r#"IMPORTANT INSTRUCTIONS:
1. Return ONLY the valid JSON object, with no additional text or commentary
2. Use null for values that are not found
3. Convert every monetary value to a plain number (no currency symbols, no thousands separators)
4. Dates must use the YYYY-MM-DD format
5. If a field is not found, use null instead of an empty string
6. For empty lists, use []
7. For percentages, use the bare numeric value (e.g. 19.0 for 19%)"#;

/// Render the extraction prompt for one invoice's text.
///
/// Pure and infallible: the same text always yields the same prompt, and an
/// empty text still produces a complete template.
pub fn build_prompt(text: &str) -> String {
    format!(
        "Analyse the following invoice text and extract its information as JSON.\n\
The text may be in Spanish and may come from a Colombian electronic invoice.\n\n\
INVOICE TEXT:\n{text}\n\n\
Extract the following information and return it as valid JSON:\n\n\
{JSON_SHAPE}\n\n\
{INSTRUCTIONS}\n\n\
JSON:\n"
    )
}
