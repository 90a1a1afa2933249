//! Ordering, filtering and dedup over the merged working table.

use crate::config::{FilterOp, MergeFilter};
use mosaiq_common::models::Row;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Total order over JSON values: Null < Bool < Number < String < Array <
/// Object, with numbers compared by `total_cmp` and arrays element-wise.
pub fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(f64::NAN)
            .total_cmp(&y.as_f64().unwrap_or(f64::NAN)),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (xa, ya) in x.iter().zip(y) {
                let ord = cmp_values(xa, ya);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Composite key over the given columns; missing cells read as null.
pub(crate) fn row_key(row: &Row, columns: &[String]) -> String {
    let key: Vec<Value> = columns
        .iter()
        .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
        .collect();
    Value::Array(key).to_string()
}

/// Drop rows failing any per-column predicate. A row missing a filtered
/// column fails that filter.
pub fn apply_filters(mut rows: Vec<Row>, filters: &BTreeMap<String, MergeFilter>) -> Vec<Row> {
    if filters.is_empty() {
        return rows;
    }
    rows.retain(|row| {
        filters
            .iter()
            .all(|(column, filter)| filter_matches(row.get(column), filter))
    });
    rows
}

fn filter_matches(actual: Option<&Value>, filter: &MergeFilter) -> bool {
    let Some(actual) = actual else {
        return false;
    };
    match filter.op {
        FilterOp::Eq => actual == &filter.value,
        FilterOp::Ne => actual != &filter.value,
        FilterOp::Gt => cmp_values(actual, &filter.value) == Ordering::Greater,
        FilterOp::Gte => cmp_values(actual, &filter.value) != Ordering::Less,
        FilterOp::Lt => cmp_values(actual, &filter.value) == Ordering::Less,
        FilterOp::Lte => cmp_values(actual, &filter.value) != Ordering::Greater,
        FilterOp::In => filter
            .value
            .as_array()
            .is_some_and(|arr| arr.contains(actual)),
        FilterOp::Contains => value_contains(actual, &filter.value),
    }
}

fn value_contains(actual: &Value, needle: &Value) -> bool {
    match actual {
        Value::String(s) => needle.as_str().is_some_and(|n| s.contains(n)),
        Value::Array(items) => items.contains(needle),
        _ => false,
    }
}

/// Stable multi-key ascending sort; missing cells sort first (as null).
pub fn sort_rows(rows: &mut [Row], sort_columns: &[String]) {
    if sort_columns.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for column in sort_columns {
            let ord = cmp_values(
                a.get(column).unwrap_or(&Value::Null),
                b.get(column).unwrap_or(&Value::Null),
            );
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Keep-first dedup over a composite column key.
pub fn dedup_rows(rows: Vec<Row>, dedup_columns: &[String]) -> Vec<Row> {
    if dedup_columns.is_empty() {
        return rows;
    }
    let mut seen: HashSet<String> = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row_key(row, dedup_columns)))
        .collect()
}
