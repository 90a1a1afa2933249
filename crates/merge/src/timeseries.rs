//! TIME_SERIES handler: timestamp indexing, ordering and resampling.

use crate::config::{Aggregation, MergeConfig};
use crate::table::cmp_values;
use chrono::{DateTime, TimeZone, Utc};
use mosaiq_common::models::{QueryResult, Row};
use mosaiq_common::warnings::add_warning;
use serde_json::Value;
use std::collections::BTreeMap;

const RESAMPLE_BUCKET_SECONDS: i64 = 60;

/// Epoch values at or above this are read as milliseconds.
const EPOCH_MILLIS_FLOOR: i64 = 1_000_000_000_000;

pub(crate) fn combine(results: &[&QueryResult], config: &MergeConfig) -> Vec<Row> {
    let mut stamped: Vec<(DateTime<Utc>, Row)> = Vec::new();
    let mut unstamped: Vec<Row> = Vec::new();

    for result in results {
        for row in &result.rows {
            match row.get("timestamp").and_then(parse_timestamp) {
                Some(ts) => stamped.push((ts, row.clone())),
                None => unstamped.push(row.clone()),
            }
        }
    }
    stamped.sort_by_key(|(ts, _)| *ts);

    if config.aggregations.is_empty() {
        let mut rows: Vec<Row> = stamped.into_iter().map(|(_, row)| row).collect();
        rows.extend(unstamped);
        return rows;
    }

    if !unstamped.is_empty() {
        add_warning(format!(
            "time-series resample dropped {} row(s) without a parseable timestamp",
            unstamped.len()
        ));
    }
    resample(stamped, &config.aggregations)
}

/// Accepts RFC 3339 strings, epoch seconds, or epoch milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => {
            let secs = if let Some(int) = n.as_i64() {
                if int >= EPOCH_MILLIS_FLOOR {
                    return Utc.timestamp_millis_opt(int).single();
                }
                int
            } else {
                n.as_f64()? as i64
            };
            Utc.timestamp_opt(secs, 0).single()
        }
        _ => None,
    }
}

/// Fixed one-minute buckets; each configured column collapses to one
/// aggregated value per bucket, everything else is dropped.
fn resample(
    stamped: Vec<(DateTime<Utc>, Row)>,
    aggregations: &BTreeMap<String, Aggregation>,
) -> Vec<Row> {
    let mut buckets: BTreeMap<i64, Vec<Row>> = BTreeMap::new();
    for (ts, row) in stamped {
        let bucket = ts.timestamp().div_euclid(RESAMPLE_BUCKET_SECONDS);
        buckets.entry(bucket).or_default().push(row);
    }

    buckets
        .into_iter()
        .map(|(bucket, rows)| {
            let start = bucket * RESAMPLE_BUCKET_SECONDS;
            let mut out = Row::new();
            out.insert(
                "timestamp".to_string(),
                Utc.timestamp_opt(start, 0)
                    .single()
                    .map(|dt| Value::String(dt.to_rfc3339()))
                    .unwrap_or(Value::Number(start.into())),
            );
            for (column, agg) in aggregations {
                out.insert(column.clone(), aggregate(&rows, column, *agg));
            }
            out
        })
        .collect()
}

fn aggregate(rows: &[Row], column: &str, agg: Aggregation) -> Value {
    let values: Vec<&Value> = rows
        .iter()
        .filter_map(|row| row.get(column))
        .filter(|v| !v.is_null())
        .collect();

    match agg {
        Aggregation::Count => Value::from(values.len()),
        Aggregation::First => values.first().map(|v| (*v).clone()).unwrap_or(Value::Null),
        Aggregation::Last => values.last().map(|v| (*v).clone()).unwrap_or(Value::Null),
        Aggregation::Min => values
            .iter()
            .copied()
            .min_by(|a, b| cmp_values(a, b))
            .cloned()
            .unwrap_or(Value::Null),
        Aggregation::Max => values
            .iter()
            .copied()
            .max_by(|a, b| cmp_values(a, b))
            .cloned()
            .unwrap_or(Value::Null),
        Aggregation::Sum => Value::from(numeric(&values).iter().sum::<f64>()),
        Aggregation::Avg => {
            let nums = numeric(&values);
            if nums.is_empty() {
                Value::Null
            } else {
                Value::from(nums.iter().sum::<f64>() / nums.len() as f64)
            }
        }
    }
}

fn numeric(values: &[&Value]) -> Vec<f64> {
    values.iter().filter_map(|v| v.as_f64()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergeStrategy;
    use mosaiq_common::models::SourceKind;
    use serde_json::json;

    fn ts_result(rows: Value) -> QueryResult {
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
        QueryResult::ok("metrics", SourceKind::TimeSeries, rows)
    }

    #[test]
    fn test_rows_sort_by_parsed_timestamp() {
        let a = ts_result(json!([
            {"timestamp": "2024-01-01T00:02:00Z", "v": 2},
            {"timestamp": 1704067200, "v": 1}, // 2024-01-01T00:00:00Z as epoch seconds
        ]));
        let b = ts_result(json!([
            {"timestamp": 1704067260000i64, "v": 3}, // epoch millis, 00:01:00
        ]));

        let config = MergeConfig::new(MergeStrategy::Union);
        let rows = combine(&[&a, &b], &config);
        let values: Vec<_> = rows.iter().map(|r| r["v"].clone()).collect();
        assert_eq!(values, vec![json!(1), json!(3), json!(2)]);
    }

    #[test]
    fn test_unparseable_timestamps_append_without_resample() {
        let a = ts_result(json!([
            {"timestamp": "not-a-time", "v": 9},
            {"timestamp": "2024-01-01T00:00:00Z", "v": 1},
        ]));

        let config = MergeConfig::new(MergeStrategy::Union);
        let rows = combine(&[&a], &config);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["v"], json!(9));
    }

    #[test]
    fn test_resample_into_minute_buckets() {
        let a = ts_result(json!([
            {"timestamp": "2024-01-01T00:00:10Z", "cpu": 10.0},
            {"timestamp": "2024-01-01T00:00:40Z", "cpu": 30.0},
            {"timestamp": "2024-01-01T00:01:05Z", "cpu": 50.0},
        ]));

        let config =
            MergeConfig::new(MergeStrategy::Union).with_aggregation("cpu", Aggregation::Avg);
        let rows = combine(&[&a], &config);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["timestamp"], json!("2024-01-01T00:00:00+00:00"));
        assert_eq!(rows[0]["cpu"], json!(20.0));
        assert_eq!(rows[1]["cpu"], json!(50.0));
    }

    #[test]
    fn test_aggregations_per_kind() {
        let rows = vec![
            match json!({"v": 1, "s": "a"}) {
                Value::Object(map) => map,
                _ => unreachable!(),
            },
            match json!({"v": 3, "s": "b"}) {
                Value::Object(map) => map,
                _ => unreachable!(),
            },
        ];

        assert_eq!(aggregate(&rows, "v", Aggregation::Sum), json!(4.0));
        assert_eq!(aggregate(&rows, "v", Aggregation::Count), json!(2));
        assert_eq!(aggregate(&rows, "v", Aggregation::Min), json!(1));
        assert_eq!(aggregate(&rows, "s", Aggregation::Last), json!("b"));
        assert_eq!(aggregate(&rows, "missing", Aggregation::Avg), json!(null));
    }

    #[test]
    fn test_resample_drops_unparseable_rows() {
        let a = ts_result(json!([
            {"timestamp": "2024-01-01T00:00:10Z", "cpu": 10.0},
            {"cpu": 99.0},
        ]));

        let config =
            MergeConfig::new(MergeStrategy::Union).with_aggregation("cpu", Aggregation::Sum);
        let rows = combine(&[&a], &config);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["cpu"], json!(10.0));
    }
}
