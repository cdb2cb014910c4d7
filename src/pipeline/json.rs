//! JSON recovery: find the object inside a free-text completion and parse it.
//!
//! Models asked for "ONLY JSON" still wrap it in prose, fences or thinking
//! text often enough that parsing the raw reply is a losing game. Recovery is
//! an ordered list of substring strategies; the first one that yields a
//! candidate wins and the rest never run.
//!
//! No repair is attempted beyond picking a substring. A candidate with a
//! trailing comma is reported as malformed.

use crate::error::InvoiceError;
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// The strategy that produced a JSON candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// First `{` through last `}`, across lines.
    BraceSpan,
    /// Lines from the first one opening with `{` to the first one closing with `}`.
    LineScan,
    /// The whole completion, unchanged.
    WholeText,
}

impl RecoveryStrategy {
    /// Strategies that search for a candidate, in priority order.
    const SEARCHES: [RecoveryStrategy; 2] = [RecoveryStrategy::BraceSpan, RecoveryStrategy::LineScan];

    fn apply(self, raw: &str) -> Option<String> {
        match self {
            RecoveryStrategy::BraceSpan => brace_span(raw),
            RecoveryStrategy::LineScan => line_scan(raw),
            RecoveryStrategy::WholeText => Some(raw.to_string()),
        }
    }
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryStrategy::BraceSpan => "brace-span",
            RecoveryStrategy::LineScan => "line-scan",
            RecoveryStrategy::WholeText => "whole-text",
        };
        f.write_str(name)
    }
}

/// A best-effort JSON candidate and how it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredJson {
    pub text: String,
    pub strategy: RecoveryStrategy,
}

/// Locate the JSON object in a model completion.
///
/// Always returns something: when neither search finds a candidate, the whole
/// completion is returned so that the parse error carries the original text.
pub fn extract_json(raw: &str) -> RecoveredJson {
    let recovered = RecoveryStrategy::SEARCHES
        .into_iter()
        .find_map(|strategy| strategy.apply(raw).map(|text| RecoveredJson { text, strategy }))
        .unwrap_or_else(|| RecoveredJson {
            text: raw.to_string(),
            strategy: RecoveryStrategy::WholeText,
        });
    debug!(
        "Recovered {} chars of JSON via {}",
        recovered.text.len(),
        recovered.strategy
    );
    recovered
}

/// Parse a candidate into a JSON object.
///
/// `raw` is the full completion; it is attached to the error so callers can
/// see exactly what the model said.
pub fn parse_object(candidate: &str, raw: &str) -> Result<Map<String, Value>, InvoiceError> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(InvoiceError::MalformedModelOutput {
            detail: format!("expected a JSON object, got {}", json_kind(&other)),
            content: raw.to_string(),
        }),
        Err(e) => Err(InvoiceError::MalformedModelOutput {
            detail: e.to_string(),
            content: raw.to_string(),
        }),
    }
}

/// Recover and parse in one step.
pub fn recover_object(raw: &str) -> Result<Map<String, Value>, InvoiceError> {
    let recovered = extract_json(raw);
    parse_object(&recovered.text, raw)
}

// ── Strategy 1: brace span ──────────────────────────────────────────────────

fn brace_span(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| raw[start..=end].to_string())
}

// ── Strategy 2: line scan ───────────────────────────────────────────────────

fn line_scan(raw: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut in_json = false;

    for line in raw.split('\n') {
        let trimmed = line.trim();
        if !in_json && trimmed.starts_with('{') {
            in_json = true;
        }
        if in_json {
            lines.push(line);
            if trimmed.ends_with('}') {
                break;
            }
        }
    }

    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
