//! Federated query planning.
//!
//! The planner splits a logical query into per-source sub-queries using the
//! registry's table catalog, turns cross-source joins into dependency edges
//! with upstream-bound semi-join conditions, and levels the resulting DAG so
//! that everything in one level can run concurrently once the previous level
//! has finished.
//!
//! Planning is deterministic: table groups are visited in source-name order,
//! so the same query against the same catalog always yields the same
//! sub-query ids, costs and levels.

use mosaiq_common::warnings::add_warning;
use mosaiq_connectors::{DataSource, SourceRegistry};
use mosaiq_error::{ErrorCode, ErrorContext, MosaiqError};
use mosaiq_query::{required_capabilities, Condition, LogicalQuery, SelectQuery, SubQueryId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// One per-source fragment of a federated plan.
#[derive(Debug, Clone, Serialize)]
pub struct SubQuery {
    pub id: SubQueryId,
    pub source: Arc<DataSource>,
    pub query: LogicalQuery,

    /// Deterministic planner estimate; a scheduling hint within a level.
    pub estimated_cost: f64,

    /// Sub-queries whose results must exist before this one can run.
    pub dependencies: Vec<SubQueryId>,

    /// Estimated result rows from source statistics, 0 when unknown.
    pub result_size: usize,
}

/// A leveled execution plan.
///
/// Level N may only depend on results from levels strictly below N; the
/// executor runs one level at a time and everything within a level
/// concurrently.
#[derive(Debug, Clone, Serialize)]
pub struct QueryPlan {
    levels: Vec<Vec<SubQuery>>,
}

impl QueryPlan {
    pub fn levels(&self) -> &[Vec<SubQuery>] {
        &self.levels
    }

    pub fn sub_query_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Sub-queries in execution order: by level, then by position within it.
    pub fn iter(&self) -> impl Iterator<Item = &SubQuery> {
        self.levels.iter().flatten()
    }

    pub fn find(&self, id: SubQueryId) -> Option<&SubQuery> {
        self.iter().find(|sq| sq.id == id)
    }
}

/// Splits logical queries into per-source sub-queries against a registry.
///
/// Holds the registry read-only for its lifetime; registration changes
/// between plans are picked up by constructing a fresh planner.
pub struct Planner<'a> {
    registry: &'a SourceRegistry,
}

/// Build-time state for one table group before costing.
struct Fragment {
    id: SubQueryId,
    source: Arc<DataSource>,
    select: SelectQuery,
    dependencies: Vec<SubQueryId>,
}

impl<'a> Planner<'a> {
    pub fn new(registry: &'a SourceRegistry) -> Self {
        Self { registry }
    }

    /// Plan a logical query into a leveled set of per-source sub-queries.
    pub fn plan(&self, query: &LogicalQuery) -> Result<QueryPlan, MosaiqError> {
        let sub_queries = match query {
            LogicalQuery::Select(select) => self.plan_select(select)?,
            LogicalQuery::Vector(_) | LogicalQuery::TimeSeries(_) => {
                vec![self.plan_single_table(query)?]
            }
        };

        let levels = level_sub_queries(sub_queries)?;

        debug!(
            target: "planner",
            levels = levels.len(),
            sub_queries = levels.iter().map(Vec::len).sum::<usize>(),
            "plan ready"
        );

        Ok(QueryPlan { levels })
    }

    /// Vector and time-series queries target exactly one table, so they plan
    /// into a single fragment with no dependencies.
    fn plan_single_table(&self, query: &LogicalQuery) -> Result<SubQuery, MosaiqError> {
        let table = match query.tables().first().copied() {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => {
                return Err(MosaiqError::new(
                    ErrorCode::UnsupportedQuery,
                    format!("a {} query must name a non-empty table", query.kind_name()),
                ))
            }
        };

        let source = self.registry.source_for_table(&table)?;
        self.finish_fragment(SubQueryId(0), source, query.clone(), Vec::new())
    }

    fn plan_select(&self, select: &SelectQuery) -> Result<Vec<SubQuery>, MosaiqError> {
        if select.tables.is_empty() || select.tables.iter().any(String::is_empty) {
            return Err(MosaiqError::new(
                ErrorCode::UnsupportedQuery,
                "a select query must name at least one non-empty table",
            ));
        }

        // Group tables by owning source, keyed by source name so sub-query
        // ids are stable for a given query and catalog.
        let mut groups: BTreeMap<String, (Arc<DataSource>, Vec<String>)> = BTreeMap::new();
        for table in &select.tables {
            let source = self.registry.source_for_table(table)?;
            groups
                .entry(source.name.clone())
                .or_insert_with(|| (source, Vec::new()))
                .1
                .push(table.clone());
        }

        let mut fragments: Vec<Fragment> = Vec::with_capacity(groups.len());
        let mut table_to_fragment: HashMap<String, usize> = HashMap::new();
        for (idx, (_, (source, tables))) in groups.into_iter().enumerate() {
            for table in &tables {
                table_to_fragment.insert(table.clone(), idx);
            }
            fragments.push(Fragment {
                id: SubQueryId(idx as u32),
                source,
                select: SelectQuery {
                    tables,
                    ..Default::default()
                },
                dependencies: Vec::new(),
            });
        }

        // Qualified columns and conditions go to the fragment owning their
        // table prefix; unqualified ones cannot be attributed and are copied
        // to every fragment.
        for column in &select.columns {
            match owning_fragment(column, &table_to_fragment) {
                Some(idx) => fragments[idx].select.columns.push(column.clone()),
                None => {
                    for fragment in &mut fragments {
                        fragment.select.columns.push(column.clone());
                    }
                }
            }
        }

        for condition in &select.conditions {
            match owning_fragment(&condition.column, &table_to_fragment) {
                Some(idx) => fragments[idx].select.conditions.push(condition.clone()),
                None => {
                    for fragment in &mut fragments {
                        fragment.select.conditions.push(condition.clone());
                    }
                }
            }
        }

        for join in &select.joins {
            let left = resolve_join_table(&join.left_table, &table_to_fragment)?;
            let right = resolve_join_table(&join.right_table, &table_to_fragment)?;

            if left == right {
                fragments[left].select.joins.push(join.clone());
                continue;
            }

            // Cross-source join: the left side waits for the right side and
            // semi-joins on the values the right side produced.
            let upstream_id = fragments[right].id;
            if !fragments[left].dependencies.contains(&upstream_id) {
                fragments[left].dependencies.push(upstream_id);
            }
            fragments[left].select.conditions.push(Condition::upstream(
                join.left_column.clone(),
                upstream_id,
                join.right_column.clone(),
            ));
            debug!(
                target: "planner",
                left = %fragments[left].source.name,
                right = %fragments[right].source.name,
                left_column = %join.left_column,
                right_column = %join.right_column,
                "cross-source join planned as dependency edge"
            );
        }

        // Shaping clauses push down only when one source serves the whole
        // query; across sources they would shape partial inputs, so they are
        // deferred to the merge step.
        if fragments.len() == 1 {
            if let Some(fragment) = fragments.first_mut() {
                fragment.select.group_by = select.group_by.clone();
                fragment.select.having = select.having.clone();
                fragment.select.order_by = select.order_by.clone();
                fragment.select.limit = select.limit;
            }
        } else {
            let mut deferred = Vec::new();
            if !select.group_by.is_empty() {
                deferred.push("group_by");
            }
            if !select.having.is_empty() {
                deferred.push("having");
            }
            if !select.order_by.is_empty() {
                deferred.push("order_by");
            }
            if select.limit.is_some() {
                deferred.push("limit");
            }
            if !deferred.is_empty() {
                add_warning(format!(
                    "{} not pushed down: the plan spans {} sources; apply them in the merge configuration",
                    deferred.join("/"),
                    fragments.len()
                ));
            }
        }

        let mut sub_queries = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            // A group with no tables has nothing to execute.
            if fragment.select.tables.is_empty() {
                continue;
            }
            sub_queries.push(self.finish_fragment(
                fragment.id,
                fragment.source,
                LogicalQuery::Select(fragment.select),
                fragment.dependencies,
            )?);
        }

        Ok(sub_queries)
    }

    /// Optimizer rewrite, capability validation and costing for one fragment.
    fn finish_fragment(
        &self,
        id: SubQueryId,
        source: Arc<DataSource>,
        mut query: LogicalQuery,
        dependencies: Vec<SubQueryId>,
    ) -> Result<SubQuery, MosaiqError> {
        if let Some(optimizer) = self.registry.optimizer_for(&source.name) {
            query = optimizer.rewrite(query, &source);
            debug!(
                target: "planner",
                source = %source.name,
                optimizer = optimizer.name(),
                "fragment rewritten by source optimizer"
            );
        }

        let required = required_capabilities(&query);
        if !source.covers(&required) {
            let missing = source.missing(&required);
            let missing_names: Vec<String> =
                missing.iter().map(|c| c.as_str().to_string()).collect();
            return Err(MosaiqError::new(
                ErrorCode::NoCapableSource,
                format!(
                    "source '{}' owns [{}] but cannot serve the fragment: missing capabilities [{}]",
                    source.name,
                    query.tables().join(", "),
                    missing_names.join(", ")
                ),
            )
            .with_context(ErrorContext::NoCapableSource {
                source_name: source.name.clone(),
                required: required.iter().map(|c| c.as_str().to_string()).collect(),
                missing: missing_names,
            })
            .with_hint(
                "Advertise the missing capabilities on the source or move the unsupported clauses into the merge configuration"
                    .to_string(),
            ));
        }

        let estimated_cost = source.estimate_cost(&required);
        let result_size = source
            .statistics
            .get("row_count")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;

        debug!(
            target: "planner",
            sub_query = %id,
            source = %source.name,
            cost = estimated_cost,
            dependencies = dependencies.len(),
            "fragment planned"
        );

        Ok(SubQuery {
            id,
            source,
            query,
            estimated_cost,
            dependencies,
            result_size,
        })
    }
}

/// Fragment owning a qualified column, `None` when the column is unqualified
/// or its prefix names an unknown table.
fn owning_fragment(column: &str, table_to_fragment: &HashMap<String, usize>) -> Option<usize> {
    let (table, _) = column.split_once('.')?;
    table_to_fragment.get(table).copied()
}

fn resolve_join_table(
    table: &str,
    table_to_fragment: &HashMap<String, usize>,
) -> Result<usize, MosaiqError> {
    table_to_fragment.get(table).copied().ok_or_else(|| {
        MosaiqError::new(
            ErrorCode::UnsupportedQuery,
            format!("join references table '{table}' that the query does not select from"),
        )
        .with_hint("Add the table to the query's table list".to_string())
    })
}

/// Group sub-queries into dependency levels.
///
/// Everything in level N depends only on sub-queries placed in levels below
/// N. Within a level, higher estimated cost sorts first so a scheduler can
/// start the expensive work early; that order is a hint, not a contract.
///
/// A round in which nothing becomes ready means the remaining dependencies
/// can never be satisfied; no partial plan is produced in that case.
pub fn level_sub_queries(sub_queries: Vec<SubQuery>) -> Result<Vec<Vec<SubQuery>>, MosaiqError> {
    let mut pending = sub_queries;
    let mut placed: BTreeSet<SubQueryId> = BTreeSet::new();
    let mut levels: Vec<Vec<SubQuery>> = Vec::new();

    while !pending.is_empty() {
        let (mut ready, blocked): (Vec<SubQuery>, Vec<SubQuery>) = pending
            .into_iter()
            .partition(|sq| sq.dependencies.iter().all(|dep| placed.contains(dep)));

        if ready.is_empty() {
            let cycle_members: Vec<String> = blocked.iter().map(|sq| sq.id.to_string()).collect();
            return Err(MosaiqError::new(
                ErrorCode::CircularDependency,
                format!(
                    "cannot level the plan: {} sub-queries form a dependency cycle",
                    blocked.len()
                ),
            )
            .with_context(ErrorContext::CircularDependency { cycle_members })
            .with_hint(
                "Break the cycle by removing one of the mutually dependent joins".to_string(),
            ));
        }

        ready.sort_by(|a, b| {
            b.estimated_cost
                .total_cmp(&a.estimated_cost)
                .then_with(|| a.id.cmp(&b.id))
        });
        placed.extend(ready.iter().map(|sq| sq.id));
        levels.push(ready);
        pending = blocked;
    }

    Ok(levels)
}
