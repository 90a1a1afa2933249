//! # Error Contexts
//!
//! Structured metadata for errors to enable programmatic analysis.

use serde::{Deserialize, Serialize};

/// Structured context attached to a [`crate::MosaiqError`].
///
/// Each variant provides specific fields relevant to that error type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorContext {
    /// Context for MOSAIQ-1001 (SourceNotFound)
    SourceNotFound {
        source_name: String,
        available_sources: Vec<String>,
    },

    /// Context for MOSAIQ-1003 (TableConflict)
    TableConflict {
        table: String,
        registered_to: String,
        attempted: String,
    },

    /// Context for MOSAIQ-1006 (UnknownCapability)
    UnknownCapability {
        capability: String,
        known_capabilities: Vec<String>,
    },

    /// Context for MOSAIQ-2001 (CircularDependency)
    CircularDependency {
        /// Ids of the sub-queries that could not be leveled
        cycle_members: Vec<String>,
    },

    /// Context for MOSAIQ-2002 (NoCapableSource)
    NoCapableSource {
        source_name: String,
        required: Vec<String>,
        missing: Vec<String>,
    },

    /// Context for MOSAIQ-2003 (UnresolvedTable)
    UnresolvedTable {
        table: String,
        known_tables: Vec<String>,
    },

    /// Context for adapter errors (MOSAIQ-1002, 3001, 3002)
    Adapter {
        source_name: String,
        source_kind: Option<String>,
        elapsed_ms: Option<u64>,
        limit_ms: Option<u64>,
    },

    /// Context for MOSAIQ-4002 (MissingKeyColumns)
    MergeKeys {
        strategy: String,
        key_columns: Vec<String>,
    },

    /// Context for MOSAIQ-5001/5002 (config errors)
    Config {
        file_path: Option<String>,
        field: Option<String>,
    },

    /// Generic key-value context for extensibility
    Generic {
        #[serde(flatten)]
        data: std::collections::HashMap<String, serde_json::Value>,
    },
}
