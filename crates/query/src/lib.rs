//! # mosaiq-query
//!
//! The logical query model for the Mosaiq federated engine: a closed AST
//! consumed by the planner, the capability vocabulary that matches queries
//! to sources, and canonical fingerprinting for result caching.
//!
//! The AST is deliberately small. Upstream parsers produce it; adapters
//! translate it into their native dialect. Nothing here executes anything.

pub mod ast;
pub mod capability;
pub mod fingerprint;

pub use ast::{
    CondValue, Condition, ConditionOp, Join, JoinKind, LogicalQuery, OrderBy, SelectQuery,
    SubQueryId, TimeRange, TimeSeriesQuery, VectorQuery,
};
pub use capability::{required_capabilities, Capability};
pub use fingerprint::Fingerprint;
