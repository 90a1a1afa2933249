//! Level-by-level plan execution.
//!
//! The executor runs one level at a time with a hard barrier in between:
//! everything in level N completes or fails before level N+1 binds its
//! upstream values and starts. Within a level, sub-queries run concurrently
//! under a worker semaphore, each adapter call bounded by a timeout.
//!
//! Failure is isolated per sub-query. A failing adapter call becomes an
//! errored [`QueryResult`] that the merge step excludes; it never aborts
//! siblings or later levels. The executor itself does not retry; adapters
//! that want retry semantics compose the shared retry helper internally.

use crate::cache::ResultCache;
use crate::planner::{QueryPlan, SubQuery};
use futures::future::join_all;
use mosaiq_common::config::EngineSettings;
use mosaiq_common::models::{QueryResult, Row};
use mosaiq_common::warnings::add_warning;
use mosaiq_connectors::AdapterSet;
use mosaiq_merge::table::cmp_values;
use mosaiq_query::{CondValue, Fingerprint, LogicalQuery, SubQueryId};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Executes leveled plans against a set of registered adapters.
pub struct Executor {
    cache: Arc<ResultCache>,
    max_workers: usize,
    adapter_timeout: Duration,
}

impl Executor {
    pub fn new(cache: Arc<ResultCache>, settings: &EngineSettings) -> Self {
        Self {
            cache,
            max_workers: settings.max_workers,
            adapter_timeout: Duration::from_millis(settings.adapter_timeout_ms),
        }
    }

    /// Run every sub-query of the plan, one result per sub-query.
    ///
    /// Results come back in plan order: by level, then by position within
    /// the level.
    pub async fn execute(&self, plan: &QueryPlan, adapters: &AdapterSet) -> Vec<QueryResult> {
        self.execute_until(plan, adapters, None).await
    }

    /// Like [`Executor::execute`], but with a hard deadline for the whole
    /// plan.
    ///
    /// When the deadline passes, the running level is cancelled and every
    /// sub-query that never produced a result is reported as a synthetic
    /// failure; results from already completed levels are kept.
    pub async fn execute_with_deadline(
        &self,
        plan: &QueryPlan,
        adapters: &AdapterSet,
        timeout: Duration,
    ) -> Vec<QueryResult> {
        self.execute_until(plan, adapters, Some(Instant::now() + timeout))
            .await
    }

    async fn execute_until(
        &self,
        plan: &QueryPlan,
        adapters: &AdapterSet,
        deadline: Option<Instant>,
    ) -> Vec<QueryResult> {
        let workers = Arc::new(Semaphore::new(self.max_workers));
        let mut completed: HashMap<SubQueryId, QueryResult> = HashMap::new();
        let mut results: Vec<QueryResult> = Vec::with_capacity(plan.sub_query_count());

        for (level_idx, level) in plan.levels().iter().enumerate() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                cancel_from(plan, level_idx, &mut results);
                break;
            }

            let futures = level
                .iter()
                .map(|sub| self.run_sub_query(sub, adapters, &completed, &workers, level_idx));

            let level_results = match deadline {
                Some(d) => match tokio::time::timeout_at(d, join_all(futures)).await {
                    Ok(level_results) => level_results,
                    Err(_) => {
                        warn!(
                            target: "executor",
                            level = level_idx,
                            "plan deadline reached; cancelling in-flight sub-queries"
                        );
                        for sub in level {
                            results.push(synthetic_failure(
                                sub,
                                level_idx,
                                "cancelled at the plan deadline",
                            ));
                        }
                        cancel_from(plan, level_idx + 1, &mut results);
                        return results;
                    }
                },
                None => join_all(futures).await,
            };

            for (sub, result) in level.iter().zip(level_results) {
                completed.insert(sub.id, result.clone());
                results.push(result);
            }
        }

        results
    }

    async fn run_sub_query(
        &self,
        sub: &SubQuery,
        adapters: &AdapterSet,
        completed: &HashMap<SubQueryId, QueryResult>,
        workers: &Semaphore,
        level: usize,
    ) -> QueryResult {
        let Ok(_permit) = workers.acquire().await else {
            return synthetic_failure(sub, level, "executor worker pool closed");
        };

        let kind = sub.source.kind;
        let query = bind_upstream_values(&sub.query, completed);
        let fingerprint = Fingerprint::new(&sub.source.name, &query);
        let key = fingerprint.cache_key();

        let Some(adapter) = adapters.get(&sub.source.name) else {
            warn!(
                target: "executor",
                source = %sub.source.name,
                sub_query = %sub.id,
                "no adapter registered for source"
            );
            return synthetic_failure(
                sub,
                level,
                format!("no adapter registered for source '{}'", sub.source.name),
            );
        };

        let started = Instant::now();
        let timeout = self.adapter_timeout;
        let (outcome, cached) = self
            .cache
            .get_or_execute(&key, kind, || async {
                match tokio::time::timeout(timeout, adapter.execute(&query)).await {
                    Ok(Ok(rows)) => Ok(rows),
                    Ok(Err(err)) => Err(err.to_string()),
                    Err(_) => Err(format!(
                        "adapter call timed out after {} ms",
                        timeout.as_millis()
                    )),
                }
            })
            .await;
        let execution_time_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(rows) => {
                let mut result = QueryResult::ok(&sub.source.name, kind, rows.as_ref().clone());
                result.set_meta("execution_time_ms", json!(execution_time_ms));
                result.set_meta("cached", json!(cached));
                result.set_meta("level", json!(level));
                if cached {
                    add_warning(format!(
                        "x-mosaiq-cache: hit for {} ({})",
                        sub.source.name,
                        fingerprint.short()
                    ));
                }
                debug!(
                    target: "executor",
                    source = %sub.source.name,
                    sub_query = %sub.id,
                    level,
                    rows = result.rows.len(),
                    duration_ms = execution_time_ms,
                    cache_hit = cached,
                    "sub-query completed"
                );
                result
            }
            Err(message) => {
                warn!(
                    target: "executor",
                    source = %sub.source.name,
                    sub_query = %sub.id,
                    level,
                    error = %message,
                    "sub-query failed"
                );
                let mut result = QueryResult::failed(&sub.source.name, kind, message);
                result.set_meta("execution_time_ms", json!(execution_time_ms));
                result.set_meta("cached", json!(false));
                result.set_meta("level", json!(level));
                result
            }
        }
    }
}

/// Synthetic failures for every sub-query from `from_level` onward.
fn cancel_from(plan: &QueryPlan, from_level: usize, results: &mut Vec<QueryResult>) {
    for (idx, level) in plan.levels().iter().enumerate().skip(from_level) {
        for sub in level {
            results.push(synthetic_failure(sub, idx, "cancelled before execution"));
        }
    }
}

fn synthetic_failure(sub: &SubQuery, level: usize, message: impl Into<String>) -> QueryResult {
    let mut result = QueryResult::failed(&sub.source.name, sub.source.kind, message);
    result.set_meta("level", json!(level));
    result
}

/// Rewrite upstream-bound conditions into literal value lists.
///
/// The list holds the distinct values of the named column across the
/// upstream result, in a stable total order so the bound query fingerprints
/// deterministically. A failed or absent upstream binds an empty list with
/// a warning; the dependent sub-query still runs and matches nothing.
fn bind_upstream_values(
    query: &LogicalQuery,
    completed: &HashMap<SubQueryId, QueryResult>,
) -> LogicalQuery {
    let mut bound = query.clone();
    for condition in bound.conditions_mut() {
        let CondValue::Upstream {
            query: upstream_id,
            column,
        } = &condition.value
        else {
            continue;
        };

        let values = match completed.get(upstream_id) {
            Some(result) if result.is_ok() => column_values(&result.rows, column),
            _ => {
                add_warning(format!(
                    "upstream {} produced no usable result; '{}' bound to an empty list",
                    upstream_id, condition.column
                ));
                Vec::new()
            }
        };
        condition.value = CondValue::Literal(Value::Array(values));
    }
    bound
}

/// Distinct non-null values of a column, deterministically ordered.
fn column_values(rows: &[Row], column: &str) -> Vec<Value> {
    let mut values: Vec<Value> = rows
        .iter()
        .filter_map(|row| lookup(row, column))
        .filter(|value| !value.is_null())
        .cloned()
        .collect();
    values.sort_by(cmp_values);
    values.dedup();
    values
}

/// Column lookup with a qualified-name fallback: an upstream that selected
/// `users.id` may have produced rows keyed by the bare `id`.
fn lookup<'a>(row: &'a Row, column: &str) -> Option<&'a Value> {
    row.get(column)
        .or_else(|| column.split_once('.').and_then(|(_, bare)| row.get(bare)))
}
