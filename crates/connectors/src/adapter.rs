//! The adapter contract every concrete backend implements.
//!
//! An adapter is a flat async interface: lifecycle (`connect`/`disconnect`),
//! one execution entry point taking a [`LogicalQuery`] fragment, a capability
//! set, and schema discovery. What a backend can do is expressed through the
//! capability set it advertises, never through the type hierarchy.

use async_trait::async_trait;
use mosaiq_common::models::Row;
use mosaiq_error::{ErrorCode, ErrorContext, MosaiqError};
use mosaiq_query::{Capability, LogicalQuery};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Failures raised by adapter I/O.
///
/// The executor catches these at the sub-query boundary and downgrades them
/// to a per-result error string, so one misbehaving backend never aborts its
/// siblings.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("connection to '{source_name}' failed: {message}")]
    Connection { source_name: String, message: String },

    #[error("query against '{source_name}' failed: {message}")]
    Query { source_name: String, message: String },

    #[error("schema discovery on '{source_name}' failed: {message}")]
    Schema { source_name: String, message: String },

    #[error("'{source_name}' did not answer within {limit_ms}ms")]
    Timeout { source_name: String, limit_ms: u64 },
}

impl AdapterError {
    pub fn source_name(&self) -> &str {
        match self {
            AdapterError::Connection { source_name, .. }
            | AdapterError::Query { source_name, .. }
            | AdapterError::Schema { source_name, .. }
            | AdapterError::Timeout { source_name, .. } => source_name,
        }
    }
}

impl From<AdapterError> for MosaiqError {
    fn from(err: AdapterError) -> Self {
        let code = match &err {
            AdapterError::Connection { .. } => ErrorCode::ConnectionFailed,
            AdapterError::Query { .. } | AdapterError::Schema { .. } => {
                ErrorCode::AdapterQueryFailed
            }
            AdapterError::Timeout { .. } => ErrorCode::AdapterTimeout,
        };
        let limit_ms = match &err {
            AdapterError::Timeout { limit_ms, .. } => Some(*limit_ms),
            _ => None,
        };
        let context = ErrorContext::Adapter {
            source_name: err.source_name().to_string(),
            source_kind: None,
            elapsed_ms: None,
            limit_ms,
        };
        MosaiqError::new(code, err.to_string()).with_context(context)
    }
}

/// Column layout reported by schema discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
}

/// One table's layout, keyed by table name in the schema map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnSchema>,
}

/// The async contract one concrete backend implements.
///
/// Implementations must be cheap to share (`Arc<dyn SourceAdapter>`) and safe
/// to call concurrently; the executor issues overlapping `execute` calls from
/// its worker pool.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Establish the underlying connection. Must be idempotent.
    async fn connect(&self) -> Result<(), AdapterError>;

    /// Tear down the underlying connection.
    async fn disconnect(&self) -> Result<(), AdapterError>;

    /// Execute one query fragment and return its rows.
    async fn execute(&self, query: &LogicalQuery) -> Result<Vec<Row>, AdapterError>;

    /// Capability tags this backend satisfies natively.
    fn capabilities(&self) -> BTreeSet<Capability>;

    /// Table layouts this backend exposes, keyed by table name.
    async fn schema(&self) -> Result<BTreeMap<String, TableSchema>, AdapterError>;
}

/// The adapter instances available to one `execute` call.
///
/// Built by the caller and passed in, never looked up from a global table, so
/// two concurrent plan executions can run against distinct backends.
#[derive(Default, Clone)]
pub struct AdapterSet {
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an adapter to the source name the registry knows it by.
    pub fn register(&mut self, source_name: impl Into<String>, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(source_name.into(), adapter);
    }

    pub fn get(&self, source_name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(source_name).cloned()
    }

    pub fn contains(&self, source_name: &str) -> bool {
        self.adapters.contains_key(source_name)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Connect every adapter, failing on the first refusal.
    pub async fn connect_all(&self) -> Result<(), AdapterError> {
        for (name, adapter) in &self.adapters {
            adapter.connect().await?;
            tracing::debug!(target: "executor", source = %name, "adapter connected");
        }
        Ok(())
    }

    /// Disconnect every adapter; failures are logged, not propagated.
    pub async fn disconnect_all(&self) {
        for (name, adapter) in &self.adapters {
            if let Err(err) = adapter.disconnect().await {
                tracing::warn!(target: "executor", source = %name, error = %err, "disconnect failed");
            }
        }
    }
}
