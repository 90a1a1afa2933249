//! RELATIONAL handler: concatenation and key-based joins.

use crate::config::{MergeConfig, MergeStrategy};
use mosaiq_common::models::{QueryResult, Row};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

pub(crate) fn combine(results: &[&QueryResult], config: &MergeConfig) -> Vec<Row> {
    if config.strategy.is_join() && !config.key_columns.is_empty() {
        return join_all(results, config);
    }
    // UNION / CONCAT / default: plain concatenation, no dedup
    results
        .iter()
        .flat_map(|result| result.rows.iter().cloned())
        .collect()
}

/// Successively join each source's row set onto the accumulated table.
fn join_all(results: &[&QueryResult], config: &MergeConfig) -> Vec<Row> {
    let mut iter = results.iter();
    let Some(first) = iter.next() else {
        return Vec::new();
    };

    let mut acc: Vec<Row> = first.rows.clone();
    for next in iter {
        acc = join_pair(&acc, &next.rows, &config.key_columns, config.strategy);
    }
    acc
}

fn join_pair(
    left: &[Row],
    right: &[Row],
    key_columns: &[String],
    strategy: MergeStrategy,
) -> Vec<Row> {
    let mut right_index: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, row) in right.iter().enumerate() {
        if let Some(key) = join_key(row, key_columns) {
            right_index.entry(key).or_default().push(idx);
        }
    }

    let mut out: Vec<Row> = Vec::new();
    let mut matched_right: HashSet<usize> = HashSet::new();

    for left_row in left {
        let matches = join_key(left_row, key_columns)
            .and_then(|key| right_index.get(&key))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        if matches.is_empty() {
            if matches!(strategy, MergeStrategy::LeftJoin | MergeStrategy::OuterJoin) {
                out.push(left_row.clone());
            }
            continue;
        }
        for &idx in matches {
            matched_right.insert(idx);
            out.push(overlay(left_row, &right[idx]));
        }
    }

    if matches!(strategy, MergeStrategy::RightJoin | MergeStrategy::OuterJoin) {
        for (idx, row) in right.iter().enumerate() {
            if !matched_right.contains(&idx) {
                out.push(row.clone());
            }
        }
    }

    out
}

/// Composite join key; `None` when any key column is missing, which keeps
/// the row out of matching entirely (it still surfaces on the outer sides).
fn join_key(row: &Row, columns: &[String]) -> Option<String> {
    let mut key = Vec::with_capacity(columns.len());
    for column in columns {
        key.push(row.get(column)?.clone());
    }
    Some(Value::Array(key).to_string())
}

/// Left row with the right row's columns layered on top; the right side
/// wins on collision.
fn overlay(left: &Row, right: &Row) -> Row {
    let mut merged = left.clone();
    for (key, value) in right {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaiq_common::models::SourceKind;
    use serde_json::json;

    fn result(rows: Value) -> QueryResult {
        let rows = match rows {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        QueryResult::ok("db", SourceKind::Relational, rows)
    }

    #[test]
    fn test_union_concatenates_without_dedup() {
        let a = result(json!([{"id": 1}, {"id": 2}, {"id": 2}]));
        let b = result(json!([{"id": 2}, {"id": 3}]));
        let config = MergeConfig::new(MergeStrategy::Union);

        let rows = combine(&[&a, &b], &config);
        assert_eq!(rows.len(), 5);
    }

    #[test]
    fn test_left_join_keeps_left_and_overlays_right() {
        let left = result(json!([{"id": 1, "a": "x"}]));
        let right = result(json!([{"id": 1, "b": "y"}, {"id": 2, "b": "z"}]));
        let config = MergeConfig::new(MergeStrategy::LeftJoin).with_key_columns(["id"]);

        let rows = combine(&[&left, &right], &config);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["a"], json!("x"));
        assert_eq!(rows[0]["b"], json!("y"));
    }

    #[test]
    fn test_intersection_is_inner_join() {
        let a = result(json!([{"id": 1, "a": 1}, {"id": 2, "a": 2}]));
        let b = result(json!([{"id": 2, "b": 2}, {"id": 3, "b": 3}]));
        let config = MergeConfig::new(MergeStrategy::Intersection).with_key_columns(["id"]);

        let rows = combine(&[&a, &b], &config);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(2));
    }

    #[test]
    fn test_outer_join_keeps_both_unmatched_sides() {
        let a = result(json!([{"id": 1, "a": 1}, {"id": 2, "a": 2}]));
        let b = result(json!([{"id": 2, "b": 2}, {"id": 3, "b": 3}]));
        let config = MergeConfig::new(MergeStrategy::OuterJoin).with_key_columns(["id"]);

        let rows = combine(&[&a, &b], &config);
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_right_side_wins_on_column_collision() {
        let a = result(json!([{"id": 1, "v": "left"}]));
        let b = result(json!([{"id": 1, "v": "right"}]));
        let config = MergeConfig::new(MergeStrategy::Intersection).with_key_columns(["id"]);

        let rows = combine(&[&a, &b], &config);
        assert_eq!(rows[0]["v"], json!("right"));
    }

    #[test]
    fn test_row_missing_key_column_never_matches() {
        let a = result(json!([{"id": 1, "a": 1}, {"a": 99}]));
        let b = result(json!([{"id": 1, "b": 1}]));
        let config = MergeConfig::new(MergeStrategy::LeftJoin).with_key_columns(["id"]);

        let rows = combine(&[&a, &b], &config);
        // keyless left row survives a left join unmatched
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.get("a") == Some(&json!(99))));
    }
}
