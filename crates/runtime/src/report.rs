//! Plan and outcome rendering.
//!
//! ASCII output for `explain` and the post-execution query report; meant
//! for terminals and log files, not for machine parsing.

use crate::federation::FederatedOutcome;
use crate::planner::QueryPlan;
use std::fmt::Write;

/// Formats a leveled plan as an ASCII tree.
pub struct PlanFormatter {
    /// Show estimated costs and result sizes
    show_costs: bool,
    /// Show the tables each fragment scans
    show_tables: bool,
}

impl Default for PlanFormatter {
    fn default() -> Self {
        Self {
            show_costs: true,
            show_tables: true,
        }
    }
}

impl PlanFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(&self, plan: &QueryPlan) -> String {
        let mut output = String::new();
        let _ = writeln!(
            output,
            "\n╔══════════════════════════════════════════════════════════════╗"
        );
        let _ = writeln!(
            output,
            "║                    FEDERATED QUERY PLAN                      ║"
        );
        let _ = writeln!(
            output,
            "╚══════════════════════════════════════════════════════════════╝\n"
        );

        if plan.is_empty() {
            let _ = writeln!(output, "(empty plan)");
            return output;
        }

        for (level_idx, level) in plan.levels().iter().enumerate() {
            let _ = writeln!(output, "Level {level_idx}");
            for (idx, sub) in level.iter().enumerate() {
                let is_last = idx == level.len() - 1;
                let connector = if is_last { "└─" } else { "├─" };
                let child_prefix = if is_last { "  " } else { "│ " };

                let _ = write!(
                    output,
                    "{} {}  {} ({})",
                    connector, sub.id, sub.source.name, sub.source.kind
                );
                if self.show_costs {
                    let _ = write!(output, "  cost {:.2}", sub.estimated_cost);
                    if sub.result_size > 0 {
                        let _ = write!(output, "  rows ~{}", sub.result_size);
                    }
                }
                if !sub.dependencies.is_empty() {
                    let deps: Vec<String> =
                        sub.dependencies.iter().map(|d| d.to_string()).collect();
                    let _ = write!(output, "  after [{}]", deps.join(", "));
                }
                let _ = writeln!(output);

                if self.show_tables {
                    let tables = sub.query.tables();
                    if !tables.is_empty() {
                        let _ =
                            writeln!(output, "{}   tables: {}", child_prefix, tables.join(", "));
                    }
                }
            }
        }

        output
    }
}

/// Format a plan with the default formatter.
pub fn format_plan(plan: &QueryPlan) -> String {
    PlanFormatter::new().format(plan)
}

/// Render a full post-execution report: plan, outcome summary, failures and
/// warnings.
pub fn format_report(plan: &QueryPlan, outcome: &FederatedOutcome) -> String {
    let mut report = String::new();

    let _ = writeln!(report, "\n{}", "=".repeat(80));
    let _ = writeln!(report, "MOSAIQ QUERY REPORT");
    let _ = writeln!(report, "{}", "=".repeat(80));

    let _ = writeln!(report, "\n[1/2] Federated Plan");
    let _ = writeln!(report, "{}", "-".repeat(30));
    let _ = write!(report, "{}", format_plan(plan));

    let _ = writeln!(report, "\n[2/2] Outcome Summary");
    let _ = writeln!(report, "{}", "-".repeat(30));
    let _ = writeln!(report, "Sub-queries:      {}", outcome.stats.sub_queries);
    let _ = writeln!(report, "Levels:           {}", outcome.stats.levels);
    let _ = writeln!(report, "Merged Rows:      {}", outcome.rows.len());
    let _ = writeln!(report, "Failed Sources:   {}", outcome.failures.len());
    let _ = writeln!(report, "Duration:         {} ms", outcome.stats.duration_ms);

    if !outcome.failures.is_empty() {
        let _ = writeln!(report, "\nFailures:");
        for failure in &outcome.failures {
            let _ = writeln!(report, "  - {}: {}", failure.source, failure.error);
        }
    }

    if !outcome.warnings.is_empty() {
        let _ = writeln!(report, "\nWarnings:");
        for warning in &outcome.warnings {
            let _ = writeln!(report, "  - {warning}");
        }
    }

    let _ = writeln!(report, "{}\n", "=".repeat(80));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::Planner;
    use mosaiq_common::models::SourceKind;
    use mosaiq_connectors::{DataSource, SourceRegistry};
    use mosaiq_query::{Capability, Join, LogicalQuery, SelectQuery};

    fn plan_with_dependency() -> QueryPlan {
        let mut registry = SourceRegistry::new();
        registry.register_source(
            DataSource::new("db1", SourceKind::Relational)
                .with_capabilities([Capability::Select, Capability::Join])
                .with_statistic("row_count", serde_json::json!(1200)),
        );
        registry.register_source(
            DataSource::new("doc1", SourceKind::Document).with_capabilities([Capability::Select]),
        );
        registry.register_tables("db1", &["users"]).unwrap();
        registry.register_tables("doc1", &["profiles"]).unwrap();

        let query = LogicalQuery::Select(SelectQuery {
            tables: vec!["profiles".to_string(), "users".to_string()],
            joins: vec![Join {
                left_table: "profiles".to_string(),
                left_column: "user_id".to_string(),
                right_table: "users".to_string(),
                right_column: "id".to_string(),
                kind: Default::default(),
            }],
            ..Default::default()
        });
        Planner::new(&registry).plan(&query).unwrap()
    }

    #[test]
    fn test_plan_tree_shows_levels_and_dependencies() {
        let rendered = format_plan(&plan_with_dependency());

        assert!(rendered.contains("FEDERATED QUERY PLAN"));
        assert!(rendered.contains("Level 0"));
        assert!(rendered.contains("Level 1"));
        assert!(rendered.contains("db1 (relational)"));
        assert!(rendered.contains("doc1 (document)"));
        assert!(rendered.contains("after [sq-0]"));
        assert!(rendered.contains("tables: profiles"));
        assert!(rendered.contains("rows ~1200"));
    }

    #[test]
    fn test_formatter_defaults() {
        let formatter = PlanFormatter::new();
        assert!(formatter.show_costs);
        assert!(formatter.show_tables);
    }
}
