//! Canonical query fingerprinting for the result cache.
//!
//! Two structurally identical queries against the same source must produce
//! the same fingerprint regardless of the order their clauses were written
//! in. Canonicalization sorts everything whose order carries no meaning
//! (tables, conjunctive conditions, joins, group-by keys, in-lists) and
//! preserves everything whose order does (projection, order-by).

use crate::ast::{CondValue, Condition, ConditionOp, Join, LogicalQuery};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Cache identity of one sub-query: the source name plus a SHA-256 digest
/// of the canonical query encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub source: String,
    pub hash: String,
}

impl Fingerprint {
    pub fn new(source: &str, query: &LogicalQuery) -> Self {
        let canonical = canonical_encoding(query);

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        Self {
            source: source.to_string(),
            hash,
        }
    }

    /// Key used in the result cache and in-flight table.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.source, self.hash)
    }

    /// Truncated digest for log lines.
    pub fn short(&self) -> &str {
        &self.hash[..12]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.short())
    }
}

/// Canonical, order-independent text encoding of a query.
///
/// `serde_json::Map` is BTree-backed, so object keys serialize in sorted
/// order and the resulting string is byte-stable.
pub fn canonical_encoding(query: &LogicalQuery) -> String {
    canonical_value(query).to_string()
}

fn canonical_value(query: &LogicalQuery) -> Value {
    match query {
        LogicalQuery::Select(select) => {
            let mut tables = select.tables.clone();
            tables.sort();
            let mut group_by = select.group_by.clone();
            group_by.sort();

            json!({
                "select": {
                    "tables": tables,
                    "columns": select.columns,
                    "conditions": canonical_conditions(&select.conditions),
                    "joins": canonical_joins(&select.joins),
                    "group_by": group_by,
                    "having": canonical_conditions(&select.having),
                    "order_by": select.order_by.iter()
                        .map(|o| json!([o.column, o.descending]))
                        .collect::<Vec<_>>(),
                    "limit": select.limit,
                }
            })
        }
        LogicalQuery::Vector(vector) => json!({
            "vector": {
                "table": vector.table,
                "column": vector.column,
                "vector": vector.vector,
                "limit": vector.limit,
                "conditions": canonical_conditions(&vector.conditions),
            }
        }),
        LogicalQuery::TimeSeries(ts) => json!({
            "time_series": {
                "table": ts.table,
                "range": ts.range.map(|r| json!([r.start.to_rfc3339(), r.end.to_rfc3339()])),
                "conditions": canonical_conditions(&ts.conditions),
                "columns": ts.columns,
                "window_seconds": ts.window_seconds,
            }
        }),
    }
}

fn canonical_conditions(conditions: &[Condition]) -> Vec<Value> {
    let mut encoded: Vec<Value> = conditions.iter().map(canonical_condition).collect();
    encoded.sort_by_key(|v| v.to_string());
    encoded
}

fn canonical_condition(condition: &Condition) -> Value {
    let value = match &condition.value {
        CondValue::Literal(v) => {
            // In-list element order is not semantic
            if condition.op == ConditionOp::In {
                if let Value::Array(items) = v {
                    let mut sorted = items.clone();
                    sorted.sort_by_key(|item| item.to_string());
                    json!({ "lit": sorted })
                } else {
                    json!({ "lit": v })
                }
            } else {
                json!({ "lit": v })
            }
        }
        CondValue::Upstream { query, column } => json!({ "upstream": [query.0, column] }),
    };

    json!([condition.column, condition.op.as_str(), value])
}

fn canonical_joins(joins: &[Join]) -> Vec<Value> {
    let mut encoded: Vec<Value> = joins
        .iter()
        .map(|j| {
            json!([
                j.left_table,
                j.left_column,
                j.right_table,
                j.right_column,
                j.kind,
            ])
        })
        .collect();
    encoded.sort_by_key(|v| v.to_string());
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{OrderBy, SelectQuery};
    use serde_json::json;

    fn select(f: impl FnOnce(&mut SelectQuery)) -> LogicalQuery {
        let mut query = SelectQuery {
            tables: vec!["users".to_string()],
            ..Default::default()
        };
        f(&mut query);
        LogicalQuery::Select(query)
    }

    #[test]
    fn test_table_order_is_canonicalized() {
        let a = select(|q| q.tables = vec!["users".to_string(), "orders".to_string()]);
        let b = select(|q| q.tables = vec!["orders".to_string(), "users".to_string()]);
        assert_eq!(Fingerprint::new("db1", &a), Fingerprint::new("db1", &b));
    }

    #[test]
    fn test_condition_order_is_canonicalized() {
        let c1 = Condition::new("age", ConditionOp::Gt, json!(30));
        let c2 = Condition::new("country", ConditionOp::Eq, json!("de"));

        let a = select(|q| q.conditions = vec![c1.clone(), c2.clone()]);
        let b = select(|q| q.conditions = vec![c2, c1]);
        assert_eq!(Fingerprint::new("db1", &a), Fingerprint::new("db1", &b));
    }

    #[test]
    fn test_in_list_order_is_canonicalized() {
        let a = select(|q| {
            q.conditions = vec![Condition::new("id", ConditionOp::In, json!([3, 1, 2]))]
        });
        let b = select(|q| {
            q.conditions = vec![Condition::new("id", ConditionOp::In, json!([1, 2, 3]))]
        });
        assert_eq!(Fingerprint::new("db1", &a), Fingerprint::new("db1", &b));
    }

    #[test]
    fn test_order_by_order_is_semantic() {
        let o1 = OrderBy {
            column: "name".to_string(),
            descending: false,
        };
        let o2 = OrderBy {
            column: "age".to_string(),
            descending: true,
        };

        let a = select(|q| q.order_by = vec![o1.clone(), o2.clone()]);
        let b = select(|q| q.order_by = vec![o2, o1]);
        assert_ne!(
            Fingerprint::new("db1", &a).hash,
            Fingerprint::new("db1", &b).hash
        );
    }

    #[test]
    fn test_projection_order_is_semantic() {
        let a = select(|q| q.columns = vec!["name".to_string(), "age".to_string()]);
        let b = select(|q| q.columns = vec!["age".to_string(), "name".to_string()]);
        assert_ne!(
            Fingerprint::new("db1", &a).hash,
            Fingerprint::new("db1", &b).hash
        );
    }

    #[test]
    fn test_source_distinguishes_cache_keys() {
        let query = select(|_| {});
        let a = Fingerprint::new("db1", &query);
        let b = Fingerprint::new("db2", &query);
        assert_eq!(a.hash, b.hash);
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_different_filter_values_differ() {
        let a = select(|q| {
            q.conditions = vec![Condition::new("age", ConditionOp::Gt, json!(30))]
        });
        let b = select(|q| {
            q.conditions = vec![Condition::new("age", ConditionOp::Gt, json!(31))]
        });
        assert_ne!(
            Fingerprint::new("db1", &a).hash,
            Fingerprint::new("db1", &b).hash
        );
    }
}
