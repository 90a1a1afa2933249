//! Mosaiq runtime: planning and execution for federated queries.
//!
//! One logical query fans out across heterogeneous sources and comes back
//! as a single merged row set:
//!
//! ```text
//! ┌──────────┐    ┌───────────┐    ┌─────────┐
//! │ Planner  │───▶│ Executor  │───▶│ Merger  │
//! └──────────┘    └───────────┘    └─────────┘
//!   leveled DAG     level barrier     per-kind
//!   of sub-queries  + result cache    strategies
//! ```
//!
//! [`federation::FederationEngine`] ties the stages together behind one
//! entry point; the stages stay usable on their own for callers that want
//! to plan without executing or execute a hand-built plan.

pub mod cache;
pub mod executor;
pub mod federation;
pub mod planner;
pub mod report;

pub use cache::{CachePolicy, CacheStats, ResultCache};
pub use executor::Executor;
pub use federation::{FederatedOutcome, FederationEngine, OutcomeStats, SourceFailure};
pub use planner::{level_sub_queries, Planner, QueryPlan, SubQuery};
pub use report::{format_plan, format_report, PlanFormatter};
