//! Shared data contracts for the Mosaiq engine.
//!
//! Rows are JSON objects rather than a columnar format: the five backend
//! families (relational, document, graph, object store, time series) return
//! heterogeneous shapes, and a key-value row is the common denominator the
//! merge layer can work over.

use mosaiq_error::{closest_match, ErrorCode, MosaiqError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single result row: column name to JSON value.
///
/// `serde_json::Map` is BTree-backed by default, so key order is
/// deterministic, which the fingerprinting and merge layers rely on.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// The family of backend a source belongs to.
///
/// Drives which merge handler processes the source's results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Relational,
    Document,
    Graph,
    ObjectStore,
    TimeSeries,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Relational,
        SourceKind::Document,
        SourceKind::Graph,
        SourceKind::ObjectStore,
        SourceKind::TimeSeries,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Relational => "relational",
            SourceKind::Document => "document",
            SourceKind::Graph => "graph",
            SourceKind::ObjectStore => "object_store",
            SourceKind::TimeSeries => "time_series",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = MosaiqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relational" => Ok(SourceKind::Relational),
            "document" => Ok(SourceKind::Document),
            "graph" => Ok(SourceKind::Graph),
            "object_store" => Ok(SourceKind::ObjectStore),
            "time_series" => Ok(SourceKind::TimeSeries),
            other => {
                let known: Vec<String> =
                    SourceKind::ALL.iter().map(|k| k.as_str().to_string()).collect();
                let mut err = MosaiqError::new(
                    ErrorCode::UnsupportedSourceKind,
                    format!("Unknown source kind '{}'", other),
                );
                if let Some(closest) = closest_match(other, &known) {
                    err = err.with_hint(format!("Did you mean '{}'?", closest));
                }
                Err(err)
            }
        }
    }
}

/// The outcome of executing one planned sub-query against one source.
///
/// Exactly one of `rows` (possibly empty) or a populated `error` is
/// meaningful. Errored results are carried through to the caller for
/// failure enumeration but excluded from merging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Name of the source that produced (or failed to produce) this result
    pub source: String,

    /// Backend family of the source, used to pick a merge handler
    pub kind: SourceKind,

    /// Result rows; empty when `error` is set
    #[serde(default)]
    pub rows: Vec<Row>,

    /// Execution metadata (`execution_time_ms`, `cached`, `level`, ...)
    #[serde(default)]
    pub metadata: Row,

    /// Failure description when the sub-query did not complete
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    pub fn ok(source: impl Into<String>, kind: SourceKind, rows: Vec<Row>) -> Self {
        Self {
            source: source.into(),
            kind,
            rows,
            metadata: Row::new(),
            error: None,
        }
    }

    pub fn failed(source: impl Into<String>, kind: SourceKind, error: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind,
            rows: Vec::new(),
            metadata: Row::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn set_meta(&mut self, key: &str, value: serde_json::Value) {
        self.metadata.insert(key.to_string(), value);
    }
}
