//! In-memory adapter backed by static tables.
//!
//! Doubles as the adapter used in integration tests and as a reference
//! implementation of the [`SourceAdapter`] contract for backend authors.
//! Select fragments get condition filtering, ordering, limit and projection;
//! multi-table fragments concatenate their tables' rows (native join
//! semantics are a real backend's job). Time-series fragments get condition
//! filtering only; vector search is refused.

use crate::adapter::{AdapterError, ColumnSchema, SourceAdapter, TableSchema};
use async_trait::async_trait;
use mosaiq_common::models::Row;
use mosaiq_query::{Capability, CondValue, Condition, ConditionOp, LogicalQuery, SelectQuery};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub struct StaticAdapter {
    name: String,
    tables: HashMap<String, Vec<Row>>,
    capabilities: BTreeSet<Capability>,
}

impl StaticAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: HashMap::new(),
            capabilities: BTreeSet::from([Capability::Select, Capability::Order]),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>, rows: Vec<Row>) -> Self {
        self.tables.insert(table.into(), rows);
        self
    }

    /// Replace the default `{select, order}` capability set.
    pub fn with_capabilities(mut self, caps: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities = caps.into_iter().collect();
        self
    }

    fn rows_for(&self, table: &str) -> Result<&[Row], AdapterError> {
        self.tables
            .get(table)
            .map(Vec::as_slice)
            .ok_or_else(|| AdapterError::Query {
                source_name: self.name.clone(),
                message: format!("unknown table '{table}'"),
            })
    }

    fn run_select(&self, select: &SelectQuery) -> Result<Vec<Row>, AdapterError> {
        let mut rows: Vec<Row> = Vec::new();
        for table in &select.tables {
            rows.extend(self.rows_for(table)?.iter().cloned());
        }

        rows.retain(|row| select.conditions.iter().all(|c| condition_matches(row, c)));

        // Stable sorts applied in reverse give multi-key ordering.
        for order in select.order_by.iter().rev() {
            rows.sort_by(|a, b| {
                let ord = compare_values(lookup(a, &order.column), lookup(b, &order.column));
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        if let Some(limit) = select.limit {
            rows.truncate(limit);
        }

        if !select.columns.is_empty() {
            rows = rows
                .into_iter()
                .map(|row| project(row, &select.columns))
                .collect();
        }

        Ok(rows)
    }
}

#[async_trait]
impl SourceAdapter for StaticAdapter {
    async fn connect(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn execute(&self, query: &LogicalQuery) -> Result<Vec<Row>, AdapterError> {
        match query {
            LogicalQuery::Select(select) => self.run_select(select),
            LogicalQuery::TimeSeries(ts) => {
                let mut rows = self.rows_for(&ts.table)?.to_vec();
                rows.retain(|row| ts.conditions.iter().all(|c| condition_matches(row, c)));
                Ok(rows)
            }
            LogicalQuery::Vector(_) => Err(AdapterError::Query {
                source_name: self.name.clone(),
                message: "vector search is not available on a static table".to_string(),
            }),
        }
    }

    fn capabilities(&self) -> BTreeSet<Capability> {
        self.capabilities.clone()
    }

    async fn schema(&self) -> Result<BTreeMap<String, TableSchema>, AdapterError> {
        let mut out = BTreeMap::new();
        for (table, rows) in &self.tables {
            let columns = rows
                .first()
                .map(|row| {
                    row.iter()
                        .map(|(name, value)| ColumnSchema {
                            name: name.clone(),
                            data_type: json_type_name(value).to_string(),
                            nullable: true,
                        })
                        .collect()
                })
                .unwrap_or_default();
            out.insert(table.clone(), TableSchema { columns });
        }
        Ok(out)
    }
}

/// Convert a JSON array of objects into rows; non-object elements are
/// skipped, a single object becomes a one-row table.
pub fn rows_from_json(value: Value) -> Vec<Row> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        Value::Object(map) => vec![map],
        _ => Vec::new(),
    }
}

/// Column lookup with a qualified-name fallback: a condition written
/// against `users.name` still matches a row keyed `name`.
fn lookup<'a>(row: &'a Row, column: &str) -> Option<&'a Value> {
    row.get(column)
        .or_else(|| column.rsplit_once('.').and_then(|(_, bare)| row.get(bare)))
}

fn project(row: Row, columns: &[String]) -> Row {
    let mut out = Row::new();
    for column in columns {
        if let Some(value) = lookup(&row, column) {
            out.insert(column.clone(), value.clone());
        }
    }
    out
}

fn condition_matches(row: &Row, condition: &Condition) -> bool {
    let Some(actual) = lookup(row, &condition.column) else {
        return false;
    };
    let CondValue::Literal(expected) = &condition.value else {
        // unbound upstream reference, nothing to compare against
        return false;
    };

    match condition.op {
        ConditionOp::Eq => actual == expected,
        ConditionOp::Ne => actual != expected,
        ConditionOp::Lt => compare_values(Some(actual), Some(expected)) == Ordering::Less,
        ConditionOp::Lte => compare_values(Some(actual), Some(expected)) != Ordering::Greater,
        ConditionOp::Gt => compare_values(Some(actual), Some(expected)) == Ordering::Greater,
        ConditionOp::Gte => compare_values(Some(actual), Some(expected)) != Ordering::Less,
        ConditionOp::In => expected.as_array().is_some_and(|arr| arr.contains(actual)),
        ConditionOp::Like => like_matches(actual, expected),
        _ => false,
    }
}

fn like_matches(actual: &Value, pattern: &Value) -> bool {
    let (Some(actual), Some(pattern)) = (actual.as_str(), pattern.as_str()) else {
        return false;
    };

    let starts = pattern.starts_with('%');
    let ends = pattern.ends_with('%') && pattern.len() > 1;
    let needle = pattern.trim_matches('%');
    match (starts, ends) {
        (true, true) => actual.contains(needle),
        (false, true) => actual.starts_with(needle),
        (true, false) => actual.ends_with(needle),
        (false, false) => actual == needle,
    }
}

/// Total order over JSON values good enough for order-by on homogeneous
/// columns: null < everything, numbers by value, strings and booleans
/// natively, mixed shapes by serialized text.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .unwrap_or(f64::NAN)
                .total_cmp(&y.as_f64().unwrap_or(f64::NAN)),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
