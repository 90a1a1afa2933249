//! OBJECT_STORE handler: metadata and content collapse into one row.

use mosaiq_common::models::{QueryResult, Row};
use serde_json::Value;

pub(crate) fn combine(results: &[&QueryResult]) -> Vec<Row> {
    results
        .iter()
        .flat_map(|result| result.rows.iter().map(merge_object))
        .collect()
}

/// `key` passes through; `metadata` then `content` maps are shallow-merged,
/// so content keys win on collision. A non-object `content` (a raw body)
/// stays under its own column, and any other top-level field is carried
/// unless a merged key already claimed its name.
fn merge_object(row: &Row) -> Row {
    let mut out = Row::new();
    if let Some(key) = row.get("key") {
        out.insert("key".to_string(), key.clone());
    }

    for field in ["metadata", "content"] {
        match row.get(field) {
            Some(Value::Object(map)) => {
                for (k, v) in map {
                    out.insert(k.clone(), v.clone());
                }
            }
            Some(other) => {
                out.insert(field.to_string(), other.clone());
            }
            None => {}
        }
    }

    for (k, v) in row {
        if matches!(k.as_str(), "key" | "metadata" | "content") {
            continue;
        }
        out.entry(k.clone()).or_insert_with(|| v.clone());
    }

    out
}
