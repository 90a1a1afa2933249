//! The federation engine facade.
//!
//! Owns the source registry, the shared result cache and the executor, and
//! drives the full pipeline for one call: plan, execute level by level,
//! merge. Adapters are passed per call so the same engine can serve callers
//! with different connection sets.
//!
//! A global semaphore budgets concurrently federated queries across all
//! callers; per-plan concurrency is the executor's worker pool.

use crate::cache::{CacheStats, ResultCache};
use crate::executor::Executor;
use crate::planner::{Planner, QueryPlan};
use crate::report;
use mosaiq_common::config::EngineConfig;
use mosaiq_common::models::Row;
use mosaiq_common::warnings::with_warning_scope;
use mosaiq_connectors::{AdapterSet, DataSource, QueryOptimizer, SourceRegistry};
use mosaiq_error::{ErrorCode, MosaiqError};
use mosaiq_merge::{merge, MergeConfig};
use mosaiq_query::LogicalQuery;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// One sub-query that produced no usable rows.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutcomeStats {
    pub sub_queries: usize,
    pub levels: usize,
    pub failed_sub_queries: usize,
    pub cache_hits: usize,
    pub duration_ms: u64,
}

/// The merged result of one federated query.
///
/// Failures are per source and already excluded from `rows`; an outcome
/// with failures is partial, not invalid. Callers decide whether partial is
/// acceptable via [`FederatedOutcome::is_complete`].
#[derive(Debug, Clone, Serialize)]
pub struct FederatedOutcome {
    pub rows: Vec<Row>,
    pub failures: Vec<SourceFailure>,
    pub warnings: Vec<String>,
    pub stats: OutcomeStats,
}

impl FederatedOutcome {
    /// Merged rows in merge order.
    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    /// True when every planned sub-query produced usable rows.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Planner, executor, cache and registry behind one entry point.
pub struct FederationEngine {
    registry: SourceRegistry,
    cache: Arc<ResultCache>,
    executor: Executor,
    active_queries: Arc<AtomicUsize>,
    query_budget: Arc<Semaphore>,
    config: EngineConfig,
}

impl fmt::Debug for FederationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FederationEngine")
            .field("sources", &self.registry.len())
            .field("active_queries", &self.active_queries())
            .finish_non_exhaustive()
    }
}

impl FederationEngine {
    /// Build an engine from configuration, registering its declared sources
    /// and table claims.
    pub fn new(config: EngineConfig) -> Result<Self, MosaiqError> {
        let mut registry = SourceRegistry::new();
        for entry in &config.sources {
            registry.register_entry(entry)?;
        }

        let cache = Arc::new(ResultCache::new(&config.cache)?);
        let executor = Executor::new(cache.clone(), &config.engine);
        let query_budget = Arc::new(Semaphore::new(config.engine.query_budget));

        info!(
            target: "queries",
            sources = registry.len(),
            max_workers = config.engine.max_workers,
            query_budget = config.engine.query_budget,
            cache_enabled = config.cache.enabled,
            "federation engine ready"
        );

        Ok(Self {
            registry,
            cache,
            executor,
            active_queries: Arc::new(AtomicUsize::new(0)),
            query_budget,
            config,
        })
    }

    pub fn register_source(&mut self, source: DataSource) {
        self.registry.register_source(source);
    }

    pub fn register_tables<S: AsRef<str>>(
        &mut self,
        source_name: &str,
        tables: &[S],
    ) -> Result<(), MosaiqError> {
        self.registry.register_tables(source_name, tables)
    }

    pub fn register_optimizer(
        &mut self,
        source_name: impl Into<String>,
        optimizer: Arc<dyn QueryOptimizer>,
    ) {
        self.registry.register_optimizer(source_name, optimizer);
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Queries currently inside [`FederationEngine::federate`] and friends.
    pub fn active_queries(&self) -> usize {
        self.active_queries.load(Ordering::Relaxed)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Plan without executing.
    pub fn plan(&self, query: &LogicalQuery) -> Result<QueryPlan, MosaiqError> {
        Planner::new(&self.registry).plan(query)
    }

    /// Render the leveled plan for a query as an ASCII tree.
    pub fn explain(&self, query: &LogicalQuery) -> Result<String, MosaiqError> {
        Ok(report::format_plan(&self.plan(query)?))
    }

    /// Plan, execute and merge one logical query.
    pub async fn federate(
        &self,
        query: &LogicalQuery,
        merge_config: &MergeConfig,
        adapters: &AdapterSet,
    ) -> Result<FederatedOutcome, MosaiqError> {
        self.active_queries.fetch_add(1, Ordering::Relaxed);
        let result = self.run_pipeline(query, merge_config, adapters, None).await;
        self.active_queries.fetch_sub(1, Ordering::Relaxed);
        result.map(|(outcome, _)| outcome)
    }

    /// Like [`FederationEngine::federate`] with a hard wall-clock deadline;
    /// sub-queries past it come back as failures on the outcome.
    pub async fn federate_with_deadline(
        &self,
        query: &LogicalQuery,
        merge_config: &MergeConfig,
        adapters: &AdapterSet,
        timeout: Duration,
    ) -> Result<FederatedOutcome, MosaiqError> {
        self.active_queries.fetch_add(1, Ordering::Relaxed);
        let result = self
            .run_pipeline(query, merge_config, adapters, Some(timeout))
            .await;
        self.active_queries.fetch_sub(1, Ordering::Relaxed);
        result.map(|(outcome, _)| outcome)
    }

    /// Federate and render the full query report alongside the outcome.
    pub async fn federate_with_report(
        &self,
        query: &LogicalQuery,
        merge_config: &MergeConfig,
        adapters: &AdapterSet,
    ) -> Result<(FederatedOutcome, String), MosaiqError> {
        self.active_queries.fetch_add(1, Ordering::Relaxed);
        let result = self.run_pipeline(query, merge_config, adapters, None).await;
        self.active_queries.fetch_sub(1, Ordering::Relaxed);
        result.map(|(outcome, plan)| {
            let rendered = report::format_report(&plan, &outcome);
            (outcome, rendered)
        })
    }

    async fn run_pipeline(
        &self,
        query: &LogicalQuery,
        merge_config: &MergeConfig,
        adapters: &AdapterSet,
        timeout: Option<Duration>,
    ) -> Result<(FederatedOutcome, QueryPlan), MosaiqError> {
        let started = Instant::now();

        let _permit = self
            .query_budget
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| MosaiqError::new(ErrorCode::BudgetExhausted, "query budget is closed"))?;

        let (pipeline, warnings) = with_warning_scope(async {
            let plan = Planner::new(&self.registry).plan(query)?;
            let results = match timeout {
                Some(timeout) => {
                    self.executor
                        .execute_with_deadline(&plan, adapters, timeout)
                        .await
                }
                None => self.executor.execute(&plan, adapters).await,
            };
            let rows = merge(&results, merge_config)?;
            Ok::<_, MosaiqError>((plan, results, rows))
        })
        .await;

        let (plan, results, rows) = match pipeline {
            Ok(parts) => parts,
            Err(err) => {
                warn!(
                    target: "queries",
                    query_kind = query.kind_name(),
                    error = %err,
                    success = false,
                    "federated query failed"
                );
                return Err(err);
            }
        };

        let failures: Vec<SourceFailure> = results
            .iter()
            .filter(|result| !result.is_ok())
            .map(|result| SourceFailure {
                source: result.source.clone(),
                error: result.error.clone().unwrap_or_default(),
            })
            .collect();

        let cache_hits = results
            .iter()
            .filter(|result| result.metadata.get("cached") == Some(&Value::Bool(true)))
            .count();

        let stats = OutcomeStats {
            sub_queries: plan.sub_query_count(),
            levels: plan.levels().len(),
            failed_sub_queries: failures.len(),
            cache_hits,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            target: "queries",
            query_kind = query.kind_name(),
            duration_ms = stats.duration_ms,
            sub_queries = stats.sub_queries,
            rows_returned = rows.len(),
            failed_sources = stats.failed_sub_queries,
            cache_hits = stats.cache_hits,
            success = true
        );

        Ok((
            FederatedOutcome {
                rows,
                failures,
                warnings,
                stats,
            },
            plan,
        ))
    }
}
