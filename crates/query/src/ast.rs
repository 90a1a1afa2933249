//! The logical query AST.
//!
//! A closed sum type with one variant per query family; planners and merge
//! handlers dispatch exhaustively instead of sniffing loose key-value
//! payloads. Everything is serde round-trippable so queries can travel over
//! APIs and into cache keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Stable identifier of a planned sub-query.
///
/// Assigned by the planner in creation order. Dependency edges and
/// upstream value bindings refer to sub-queries by this id, never by
/// structural equality.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SubQueryId(pub u32);

impl fmt::Display for SubQueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sq-{}", self.0)
    }
}

/// A logical query as produced by an upstream parser or API layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogicalQuery {
    Select(SelectQuery),
    Vector(VectorQuery),
    TimeSeries(TimeSeriesQuery),
}

impl LogicalQuery {
    /// Tables (or table-like collections) this query touches.
    pub fn tables(&self) -> Vec<&str> {
        match self {
            LogicalQuery::Select(q) => q.tables.iter().map(String::as_str).collect(),
            LogicalQuery::Vector(q) => vec![q.table.as_str()],
            LogicalQuery::TimeSeries(q) => vec![q.table.as_str()],
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        match self {
            LogicalQuery::Select(q) => &q.conditions,
            LogicalQuery::Vector(q) => &q.conditions,
            LogicalQuery::TimeSeries(q) => &q.conditions,
        }
    }

    pub fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        match self {
            LogicalQuery::Select(q) => &mut q.conditions,
            LogicalQuery::Vector(q) => &mut q.conditions,
            LogicalQuery::TimeSeries(q) => &mut q.conditions,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            LogicalQuery::Select(_) => "select",
            LogicalQuery::Vector(_) => "vector",
            LogicalQuery::TimeSeries(_) => "time_series",
        }
    }
}

/// A tabular selection, the workhorse query shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectQuery {
    pub tables: Vec<String>,

    /// Projected columns; empty means "all". Order is semantic.
    #[serde(default)]
    pub columns: Vec<String>,

    /// Conjunctive filter conditions (implicit AND)
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default)]
    pub joins: Vec<Join>,

    #[serde(default)]
    pub group_by: Vec<String>,

    /// Post-grouping conditions
    #[serde(default)]
    pub having: Vec<Condition>,

    #[serde(default)]
    pub order_by: Vec<OrderBy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// A nearest-neighbor search over an embedding column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VectorQuery {
    pub table: String,
    pub column: String,
    pub vector: Vec<f64>,
    pub limit: usize,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// A range scan over a timestamped metric table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSeriesQuery {
    pub table: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<TimeRange>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default)]
    pub columns: Vec<String>,

    /// Downsampling window; set means the source should aggregate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// An equi-join clause between two tables.
///
/// When both tables land in the same planned fragment the adapter executes
/// the join natively; when they land in different fragments the planner
/// turns the clause into a dependency edge plus an upstream-bound semi-join
/// condition, and the merge layer applies the final join semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
    #[serde(default)]
    pub kind: JoinKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Outer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub descending: bool,
}

/// One conjunctive filter condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub op: ConditionOp,
    pub value: CondValue,
}

impl Condition {
    pub fn new(column: impl Into<String>, op: ConditionOp, value: Value) -> Self {
        Self {
            column: column.into(),
            op,
            value: CondValue::Literal(value),
        }
    }

    /// A semi-join condition whose value list is produced by another
    /// planned sub-query and bound by the executor.
    pub fn upstream(
        column: impl Into<String>,
        query: SubQueryId,
        upstream_column: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            op: ConditionOp::In,
            value: CondValue::Upstream {
                query,
                column: upstream_column.into(),
            },
        }
    }
}

/// Condition operators.
///
/// Open-ended on purpose: operators the engine does not know about are
/// carried as `Other` and passed through to adapters untouched; they
/// contribute no capability requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ConditionOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Like,
    Regex,
    GeoWithin,
    GeoIntersects,
    Other(String),
}

impl ConditionOp {
    pub fn as_str(&self) -> &str {
        match self {
            ConditionOp::Eq => "eq",
            ConditionOp::Ne => "ne",
            ConditionOp::Lt => "lt",
            ConditionOp::Lte => "lte",
            ConditionOp::Gt => "gt",
            ConditionOp::Gte => "gte",
            ConditionOp::In => "in",
            ConditionOp::Like => "like",
            ConditionOp::Regex => "regex",
            ConditionOp::GeoWithin => "geo_within",
            ConditionOp::GeoIntersects => "geo_intersects",
            ConditionOp::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for ConditionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ConditionOp> for String {
    fn from(op: ConditionOp) -> String {
        op.as_str().to_string()
    }
}

impl From<String> for ConditionOp {
    fn from(s: String) -> Self {
        match s.as_str() {
            "eq" => ConditionOp::Eq,
            "ne" => ConditionOp::Ne,
            "lt" => ConditionOp::Lt,
            "lte" => ConditionOp::Lte,
            "gt" => ConditionOp::Gt,
            "gte" => ConditionOp::Gte,
            "in" => ConditionOp::In,
            "like" => ConditionOp::Like,
            "regex" => ConditionOp::Regex,
            "geo_within" => ConditionOp::GeoWithin,
            "geo_intersects" => ConditionOp::GeoIntersects,
            _ => ConditionOp::Other(s),
        }
    }
}

/// The right-hand side of a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CondValue {
    /// A concrete JSON value
    Literal(Value),
    /// Values of `column` in the result of another sub-query; rewritten to
    /// a literal array by the executor after the upstream level completes
    Upstream { query: SubQueryId, column: String },
}

impl CondValue {
    pub fn is_upstream(&self) -> bool {
        matches!(self, CondValue::Upstream { .. })
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            CondValue::Literal(v) => Some(v),
            CondValue::Upstream { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_query_serde_roundtrip() {
        let query = LogicalQuery::Select(SelectQuery {
            tables: vec!["users".to_string()],
            columns: vec!["users.name".to_string()],
            conditions: vec![Condition::new("users.age", ConditionOp::Gt, json!(30))],
            order_by: vec![OrderBy {
                column: "users.name".to_string(),
                descending: false,
            }],
            limit: Some(10),
            ..Default::default()
        });

        let encoded = serde_json::to_string(&query).unwrap();
        assert!(encoded.contains("\"type\":\"select\""));

        let decoded: LogicalQuery = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, query);
    }

    #[test]
    fn test_condition_op_string_mapping() {
        assert_eq!(ConditionOp::from("gte".to_string()), ConditionOp::Gte);
        assert_eq!(
            ConditionOp::from("geo_within".to_string()),
            ConditionOp::GeoWithin
        );
        assert_eq!(
            ConditionOp::from("fuzzy_phonesque".to_string()),
            ConditionOp::Other("fuzzy_phonesque".to_string())
        );
        assert_eq!(ConditionOp::Gte.as_str(), "gte");
    }

    #[test]
    fn test_unknown_op_survives_roundtrip() {
        let cond = Condition::new("name", ConditionOp::Other("soundex".to_string()), json!("x"));
        let encoded = serde_json::to_string(&cond).unwrap();
        assert!(encoded.contains("\"op\":\"soundex\""));
        let decoded: Condition = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, cond);
    }

    #[test]
    fn test_upstream_condition_shape() {
        let cond = Condition::upstream("orders.user_id", SubQueryId(2), "users.id");
        assert_eq!(cond.op, ConditionOp::In);
        assert!(cond.value.is_upstream());
        assert!(cond.value.as_literal().is_none());

        let encoded = serde_json::to_value(&cond).unwrap();
        assert_eq!(encoded["value"]["upstream"]["query"], json!(2));
    }

    #[test]
    fn test_tables_accessor_across_variants() {
        let select = LogicalQuery::Select(SelectQuery {
            tables: vec!["a".to_string(), "b".to_string()],
            ..Default::default()
        });
        assert_eq!(select.tables(), vec!["a", "b"]);

        let vector = LogicalQuery::Vector(VectorQuery {
            table: "embeddings".to_string(),
            column: "vec".to_string(),
            vector: vec![0.1, 0.2],
            limit: 5,
            conditions: vec![],
        });
        assert_eq!(vector.tables(), vec!["embeddings"]);
        assert_eq!(vector.kind_name(), "vector");
    }
}
