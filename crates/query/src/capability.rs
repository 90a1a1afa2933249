//! The capability vocabulary.
//!
//! Sources advertise a capability set; the planner derives the set a query
//! fragment requires and only assigns the fragment to a source that covers
//! it entirely. Partial matches are rejected, not decomposed further.

use crate::ast::{Condition, ConditionOp, LogicalQuery};
use mosaiq_error::{closest_match, ErrorCode, ErrorContext, MosaiqError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "String", try_from = "String")]
pub enum Capability {
    Select,
    Join,
    Group,
    Order,
    Having,
    TextSearch,
    Geospatial,
    VectorSearch,
    TimeSeries,
}

impl Capability {
    pub const ALL: [Capability; 9] = [
        Capability::Select,
        Capability::Join,
        Capability::Group,
        Capability::Order,
        Capability::Having,
        Capability::TextSearch,
        Capability::Geospatial,
        Capability::VectorSearch,
        Capability::TimeSeries,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Select => "select",
            Capability::Join => "join",
            Capability::Group => "group",
            Capability::Order => "order",
            Capability::Having => "having",
            Capability::TextSearch => "text_search",
            Capability::Geospatial => "geospatial",
            Capability::VectorSearch => "vector_search",
            Capability::TimeSeries => "time_series",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Capability {
    type Err = MosaiqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for cap in Capability::ALL {
            if cap.as_str() == s {
                return Ok(cap);
            }
        }

        let known: Vec<String> = Capability::ALL
            .iter()
            .map(|c| c.as_str().to_string())
            .collect();
        let mut err = MosaiqError::new(
            ErrorCode::UnknownCapability,
            format!("Unknown capability '{}'", s),
        )
        .with_context(ErrorContext::UnknownCapability {
            capability: s.to_string(),
            known_capabilities: known.clone(),
        });
        if let Some(closest) = closest_match(s, &known) {
            err = err.with_hint(format!("Did you mean '{}'?", closest));
        }
        Err(err)
    }
}

impl From<Capability> for String {
    fn from(cap: Capability) -> String {
        cap.as_str().to_string()
    }
}

impl TryFrom<String> for Capability {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse().map_err(|e: MosaiqError| e.message)
    }
}

/// Capability a single condition operator demands, if any.
///
/// Unknown operators demand nothing: they pass through to the adapter,
/// which may or may not understand them.
fn condition_capability(op: &ConditionOp) -> Option<Capability> {
    match op {
        ConditionOp::Like | ConditionOp::Regex => Some(Capability::TextSearch),
        ConditionOp::GeoWithin | ConditionOp::GeoIntersects => Some(Capability::Geospatial),
        _ => None,
    }
}

fn extend_from_conditions(required: &mut BTreeSet<Capability>, conditions: &[Condition]) {
    for condition in conditions {
        if let Some(cap) = condition_capability(&condition.op) {
            required.insert(cap);
        }
    }
}

/// Derive the capability set a query requires of a source.
pub fn required_capabilities(query: &LogicalQuery) -> BTreeSet<Capability> {
    let mut required = BTreeSet::new();

    match query {
        LogicalQuery::Select(select) => {
            required.insert(Capability::Select);
            if !select.joins.is_empty() {
                required.insert(Capability::Join);
            }
            if !select.group_by.is_empty() {
                required.insert(Capability::Group);
            }
            if !select.having.is_empty() {
                required.insert(Capability::Having);
            }
            if !select.order_by.is_empty() {
                required.insert(Capability::Order);
            }
            extend_from_conditions(&mut required, &select.conditions);
            extend_from_conditions(&mut required, &select.having);
        }
        LogicalQuery::Vector(vector) => {
            required.insert(Capability::VectorSearch);
            extend_from_conditions(&mut required, &vector.conditions);
        }
        LogicalQuery::TimeSeries(ts) => {
            required.insert(Capability::TimeSeries);
            if ts.window_seconds.is_some() {
                required.insert(Capability::Group);
            }
            extend_from_conditions(&mut required, &ts.conditions);
        }
    }

    required
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Join, OrderBy, SelectQuery, TimeSeriesQuery};
    use serde_json::json;

    fn caps(items: &[Capability]) -> BTreeSet<Capability> {
        items.iter().copied().collect()
    }

    #[test]
    fn test_plain_select_requires_only_select() {
        let query = LogicalQuery::Select(SelectQuery {
            tables: vec!["users".to_string()],
            ..Default::default()
        });
        assert_eq!(required_capabilities(&query), caps(&[Capability::Select]));
    }

    #[test]
    fn test_clauses_add_capabilities() {
        let query = LogicalQuery::Select(SelectQuery {
            tables: vec!["users".to_string(), "orders".to_string()],
            joins: vec![Join {
                left_table: "orders".to_string(),
                left_column: "user_id".to_string(),
                right_table: "users".to_string(),
                right_column: "id".to_string(),
                kind: Default::default(),
            }],
            group_by: vec!["users.country".to_string()],
            having: vec![Condition::new("count", ConditionOp::Gt, json!(5))],
            order_by: vec![OrderBy {
                column: "count".to_string(),
                descending: true,
            }],
            ..Default::default()
        });

        assert_eq!(
            required_capabilities(&query),
            caps(&[
                Capability::Select,
                Capability::Join,
                Capability::Group,
                Capability::Having,
                Capability::Order,
            ])
        );
    }

    #[test]
    fn test_operator_driven_capabilities() {
        let query = LogicalQuery::Select(SelectQuery {
            tables: vec!["places".to_string()],
            conditions: vec![
                Condition::new("name", ConditionOp::Like, json!("%cafe%")),
                Condition::new("geom", ConditionOp::GeoWithin, json!({"bbox": [0, 0, 1, 1]})),
            ],
            ..Default::default()
        });

        assert_eq!(
            required_capabilities(&query),
            caps(&[
                Capability::Select,
                Capability::TextSearch,
                Capability::Geospatial,
            ])
        );
    }

    #[test]
    fn test_unknown_operator_contributes_nothing() {
        let query = LogicalQuery::Select(SelectQuery {
            tables: vec!["users".to_string()],
            conditions: vec![Condition::new(
                "name",
                ConditionOp::Other("soundex".to_string()),
                json!("smith"),
            )],
            ..Default::default()
        });
        assert_eq!(required_capabilities(&query), caps(&[Capability::Select]));
    }

    #[test]
    fn test_time_series_window_requires_group() {
        let plain = LogicalQuery::TimeSeries(TimeSeriesQuery {
            table: "cpu".to_string(),
            ..Default::default()
        });
        assert_eq!(
            required_capabilities(&plain),
            caps(&[Capability::TimeSeries])
        );

        let windowed = LogicalQuery::TimeSeries(TimeSeriesQuery {
            table: "cpu".to_string(),
            window_seconds: Some(60),
            ..Default::default()
        });
        assert_eq!(
            required_capabilities(&windowed),
            caps(&[Capability::TimeSeries, Capability::Group])
        );
    }

    #[test]
    fn test_capability_parse_with_hint() {
        let err = "geo_spatial".parse::<Capability>().unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownCapability);
        assert_eq!(err.hint, Some("Did you mean 'geospatial'?".to_string()));
    }

    #[test]
    fn test_capability_serde_as_string() {
        let encoded = serde_json::to_string(&Capability::TextSearch).unwrap();
        assert_eq!(encoded, "\"text_search\"");
        let decoded: Capability = serde_json::from_str("\"vector_search\"").unwrap();
        assert_eq!(decoded, Capability::VectorSearch);
    }
}
