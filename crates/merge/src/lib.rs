//! Result merging for the Mosaiq federation engine.
//!
//! Takes the executor's per-source [`QueryResult`]s and produces one tabular
//! row list: errored results are excluded, surviving results run through a
//! handler per backend family (relational joins, document flattening, graph
//! expansion, object-store collapse, time-series resampling), and the
//! combined table gets the configured filters, sort and dedup applied.
//!
//! Handlers return finite owned tables; nothing here is lazy.

pub mod config;
pub mod document;
pub mod graph;
pub mod object_store;
pub mod relational;
pub mod table;
pub mod timeseries;

pub use config::{Aggregation, FilterOp, MergeConfig, MergeFilter, MergeStrategy};
pub use document::flatten_row;

use mosaiq_common::models::{QueryResult, Row, SourceKind};
use mosaiq_common::warnings::add_warning;
use mosaiq_error::{ErrorCode, ErrorContext, MosaiqError};
use std::collections::BTreeMap;

/// Failures that abort a merge call.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("merge strategy '{strategy}' requires key_columns")]
    MissingKeyColumns { strategy: MergeStrategy },
}

impl From<MergeError> for MosaiqError {
    fn from(err: MergeError) -> Self {
        match &err {
            MergeError::MissingKeyColumns { strategy } => {
                MosaiqError::new(ErrorCode::MissingKeyColumns, err.to_string())
                    .with_context(ErrorContext::MergeKeys {
                        strategy: strategy.to_string(),
                        key_columns: Vec::new(),
                    })
                    .with_hint(
                        "Set merge.key_columns to the shared column(s) to join on".to_string(),
                    )
            }
        }
    }
}

/// Merge per-source results into one ordered row table.
pub fn merge(results: &[QueryResult], config: &MergeConfig) -> Result<Vec<Row>, MergeError> {
    if config.strategy.is_join() && config.key_columns.is_empty() {
        return Err(MergeError::MissingKeyColumns {
            strategy: config.strategy,
        });
    }

    let mut by_kind: BTreeMap<SourceKind, Vec<&QueryResult>> = BTreeMap::new();
    let mut skipped = 0usize;
    for result in results {
        if result.is_ok() {
            by_kind.entry(result.kind).or_default().push(result);
        } else {
            skipped += 1;
        }
    }
    if skipped > 0 {
        add_warning(format!("merge excluded {skipped} errored result(s)"));
    }

    let mut combined: Vec<Row> = Vec::new();
    for (kind, group) in &by_kind {
        let handled = match kind {
            SourceKind::Relational => relational::combine(group, config),
            SourceKind::Document => document::combine(group),
            SourceKind::Graph => graph::combine(group),
            SourceKind::ObjectStore => object_store::combine(group),
            SourceKind::TimeSeries => timeseries::combine(group, config),
        };
        tracing::debug!(
            target: "merge",
            kind = %kind,
            results = group.len(),
            rows = handled.len(),
            "handler combined"
        );
        combined.extend(handled);
    }

    let mut working = table::apply_filters(combined, &config.filters);
    table::sort_rows(&mut working, &config.sort_columns);
    Ok(table::dedup_rows(working, &config.dedup_columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn rows(value: Value) -> Vec<Row> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_errored_results_are_excluded() {
        let good = QueryResult::ok(
            "db1",
            SourceKind::Relational,
            rows(json!([{"id": 1}, {"id": 2}])),
        );
        let bad = QueryResult::failed("db2", SourceKind::Relational, "connection refused");

        let merged = merge(
            &[good, bad],
            &MergeConfig::new(MergeStrategy::Union),
        )
        .unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_join_without_keys_is_rejected() {
        let err = merge(&[], &MergeConfig::new(MergeStrategy::LeftJoin)).unwrap_err();
        let mosaiq: MosaiqError = err.into();
        assert_eq!(mosaiq.code, ErrorCode::MissingKeyColumns);
    }

    #[test]
    fn test_mixed_kinds_concatenate_per_handler() {
        let relational = QueryResult::ok("db1", SourceKind::Relational, rows(json!([{"id": 1}])));
        let document = QueryResult::ok(
            "doc1",
            SourceKind::Document,
            rows(json!([{"meta": {"owner": "alice"}}])),
        );

        let merged = merge(
            &[relational, document],
            &MergeConfig::new(MergeStrategy::Concat),
        )
        .unwrap();

        assert_eq!(merged.len(), 2);
        assert!(merged
            .iter()
            .any(|r| r.get("meta.owner") == Some(&json!("alice"))));
    }

    #[test]
    fn test_filters_sort_and_dedup_run_in_order() {
        let result = QueryResult::ok(
            "db1",
            SourceKind::Relational,
            rows(json!([
                {"id": 2, "score": 80},
                {"id": 1, "score": 95},
                {"id": 1, "score": 95},
                {"id": 3, "score": 10},
            ])),
        );

        let config = MergeConfig::new(MergeStrategy::Union)
            .with_filter("score", MergeFilter::new(config::FilterOp::Gte, json!(50)))
            .with_sort(["id"])
            .with_dedup(["id"]);

        let merged = merge(&[result], &config).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0]["id"], json!(1));
        assert_eq!(merged[1]["id"], json!(2));
    }
}
