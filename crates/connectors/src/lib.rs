//! Source abstractions for the Mosaiq federation engine.
//!
//! Every backend family plugs in through the same two seams:
//!
//! - [`SourceAdapter`]: the async I/O contract one concrete backend
//!   implements (connect, execute a query fragment, report capabilities).
//! - [`SourceRegistry`]: the planning-time view of which sources exist, what
//!   they can do, how expensive they are, and which tables they own.
//!
//! Adapters are grouped into an [`AdapterSet`] that is handed to the executor
//! per call, so concurrent plan executions stay isolated from each other.

pub mod adapter;
pub mod catalog;
pub mod memory;

pub use adapter::{AdapterError, AdapterSet, ColumnSchema, SourceAdapter, TableSchema};
pub use catalog::{DataSource, QueryOptimizer, SourceRegistry};
pub use memory::{rows_from_json, StaticAdapter};
