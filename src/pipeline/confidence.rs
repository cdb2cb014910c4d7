//! Heuristic completeness score.
//!
//! Scored over the parsed object *before* coercion, so a total of `"N/A"`
//! still counts as present. Presence follows JSON truthiness: `null`,
//! `false`, `0`, `""`, `[]` and `{}` are absent.

use serde_json::{Map, Value};

/// A field whose presence contributes to the score.
struct Signal {
    path: &'static [&'static str],
    weight: f64,
}

const SIGNALS: &[Signal] = &[
    Signal { path: &["document_type"], weight: 1.0 },
    Signal { path: &["number"], weight: 1.5 },
    Signal { path: &["issue_date"], weight: 1.0 },
    Signal { path: &["supplier", "name"], weight: 1.5 },
    Signal { path: &["totals", "total"], weight: 2.0 },
    Signal { path: &["items"], weight: 2.0 },
    Signal { path: &["currency"], weight: 0.5 },
    Signal { path: &["taxes"], weight: 0.5 },
];

const MAX_SCORE: f64 = 10.0;

/// Weighted presence score in `[0, 1]`, rounded to two decimals.
pub fn confidence_score(data: &Map<String, Value>) -> f64 {
    let sum: f64 = SIGNALS
        .iter()
        .filter(|s| lookup(data, s.path).is_some_and(is_truthy))
        .map(|s| s.weight)
        .sum();

    let score = (sum / MAX_SCORE).min(1.0);
    (score * 100.0).round() / 100.0
}

fn lookup<'a>(data: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter()
        .try_fold(data.get(*first)?, |value, key| value.as_object()?.get(*key))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
