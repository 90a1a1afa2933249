use mosaiq_common::models::SourceKind;
use mosaiq_connectors::DataSource;
use mosaiq_error::ErrorCode;
use mosaiq_query::{Capability, LogicalQuery, SelectQuery, SubQueryId};
use mosaiq_runtime::{level_sub_queries, SubQuery};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

fn shared_source() -> Arc<DataSource> {
    Arc::new(
        DataSource::new("db1", SourceKind::Relational).with_capabilities([Capability::Select]),
    )
}

fn sub_query(
    source: &Arc<DataSource>,
    id: u32,
    cost: f64,
    dependencies: Vec<SubQueryId>,
) -> SubQuery {
    SubQuery {
        id: SubQueryId(id),
        source: source.clone(),
        query: LogicalQuery::Select(SelectQuery {
            tables: vec!["users".to_string()],
            ..Default::default()
        }),
        estimated_cost: cost,
        dependencies,
        result_size: 0,
    }
}

/// Node j depends on the subset of nodes below j selected by its mask bits,
/// so every generated graph is acyclic by construction.
fn acyclic_dag(source: &Arc<DataSource>, nodes: &[(u16, f64)]) -> Vec<SubQuery> {
    nodes
        .iter()
        .enumerate()
        .map(|(j, (mask, cost))| {
            let dependencies = (0..j)
                .filter(|i| mask & (1 << i) != 0)
                .map(|i| SubQueryId(i as u32))
                .collect();
            sub_query(source, j as u32, *cost, dependencies)
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_every_dependency_lands_in_a_strictly_earlier_level(
        nodes in prop::collection::vec((any::<u16>(), 0.0f64..100.0), 1..12),
    ) {
        let source = shared_source();
        let sub_queries = acyclic_dag(&source, &nodes);
        let expected = sub_queries.len();

        let levels = level_sub_queries(sub_queries).unwrap();

        let mut level_of: HashMap<SubQueryId, usize> = HashMap::new();
        for (idx, level) in levels.iter().enumerate() {
            for sq in level {
                prop_assert!(
                    level_of.insert(sq.id, idx).is_none(),
                    "{} was placed twice",
                    sq.id
                );
            }
        }
        prop_assert_eq!(level_of.len(), expected);

        for level in &levels {
            for sq in level {
                for dep in &sq.dependencies {
                    prop_assert!(
                        level_of[dep] < level_of[&sq.id],
                        "{} at level {} does not come after its dependency {} at level {}",
                        sq.id, level_of[&sq.id], dep, level_of[dep]
                    );
                }
            }
        }
    }

    #[test]
    fn test_levels_order_by_cost_descending_then_id(
        nodes in prop::collection::vec((any::<u16>(), 0.0f64..100.0), 1..12),
    ) {
        let source = shared_source();
        let levels = level_sub_queries(acyclic_dag(&source, &nodes)).unwrap();

        for level in &levels {
            for pair in level.windows(2) {
                let ordered = pair[0].estimated_cost > pair[1].estimated_cost
                    || (pair[0].estimated_cost == pair[1].estimated_cost
                        && pair[0].id < pair[1].id);
                prop_assert!(
                    ordered,
                    "within-level order broken between {} (cost {}) and {} (cost {})",
                    pair[0].id, pair[0].estimated_cost, pair[1].id, pair[1].estimated_cost
                );
            }
        }
    }

    #[test]
    fn test_injected_cycle_always_rejected(
        nodes in prop::collection::vec((any::<u16>(), 0.0f64..100.0), 2..12),
        pick in any::<(u8, u8)>(),
    ) {
        let source = shared_source();
        let mut sub_queries = acyclic_dag(&source, &nodes);

        // Force a two-node cycle between two distinct sub-queries.
        let a = pick.0 as usize % sub_queries.len();
        let mut b = pick.1 as usize % sub_queries.len();
        if a == b {
            b = (b + 1) % sub_queries.len();
        }
        let (id_a, id_b) = (sub_queries[a].id, sub_queries[b].id);
        if !sub_queries[a].dependencies.contains(&id_b) {
            sub_queries[a].dependencies.push(id_b);
        }
        if !sub_queries[b].dependencies.contains(&id_a) {
            sub_queries[b].dependencies.push(id_a);
        }

        let err = level_sub_queries(sub_queries).unwrap_err();
        prop_assert_eq!(err.code, ErrorCode::CircularDependency);
    }
}
