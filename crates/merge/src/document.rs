//! DOCUMENT handler: recursive dot-flattening into tabular rows.

use mosaiq_common::models::{QueryResult, Row};
use serde_json::Value;

pub(crate) fn combine(results: &[&QueryResult]) -> Vec<Row> {
    results
        .iter()
        .flat_map(|result| result.rows.iter().map(flatten_row))
        .collect()
}

/// Flatten nested objects into dot-separated columns (`a.b.c`); arrays are
/// stringified as compact JSON so every cell is scalar.
pub fn flatten_row(row: &Row) -> Row {
    let mut flat = Row::new();
    for (key, value) in row {
        flatten_into(&mut flat, key, value);
    }
    flat
}

pub(crate) fn flatten_into(out: &mut Row, prefix: &str, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten_into(out, &format!("{prefix}.{key}"), nested);
            }
        }
        Value::Array(_) => {
            out.insert(prefix.to_string(), Value::String(value.to_string()));
        }
        other => {
            out.insert(prefix.to_string(), other.clone());
        }
    }
}
