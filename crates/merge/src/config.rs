//! Merge configuration: strategy, aggregation and filter vocabulary.
//!
//! One [`MergeConfig`] is immutable per merge invocation. The enums parse
//! from the snake_case strings callers put in config files; typos surface as
//! structured errors with suggestions.

use mosaiq_error::{closest_match, ErrorCode, MosaiqError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How per-source result sets are combined into one table.
///
/// `Union` and `Concat` both concatenate without deduplication; the join
/// strategies require `key_columns` and `Intersection` is an inner join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    #[default]
    Union,
    Intersection,
    LeftJoin,
    RightJoin,
    OuterJoin,
    Concat,
}

impl MergeStrategy {
    pub const ALL: [MergeStrategy; 6] = [
        MergeStrategy::Union,
        MergeStrategy::Intersection,
        MergeStrategy::LeftJoin,
        MergeStrategy::RightJoin,
        MergeStrategy::OuterJoin,
        MergeStrategy::Concat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Union => "union",
            MergeStrategy::Intersection => "intersection",
            MergeStrategy::LeftJoin => "left_join",
            MergeStrategy::RightJoin => "right_join",
            MergeStrategy::OuterJoin => "outer_join",
            MergeStrategy::Concat => "concat",
        }
    }

    /// Whether this strategy matches rows on `key_columns`.
    pub fn is_join(&self) -> bool {
        matches!(
            self,
            MergeStrategy::Intersection
                | MergeStrategy::LeftJoin
                | MergeStrategy::RightJoin
                | MergeStrategy::OuterJoin
        )
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = MosaiqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase();
        for strategy in MergeStrategy::ALL {
            if strategy.as_str() == normalized {
                return Ok(strategy);
            }
        }

        let known: Vec<String> = MergeStrategy::ALL
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let mut err = MosaiqError::new(
            ErrorCode::UnsupportedStrategy,
            format!("Unknown merge strategy '{s}'"),
        );
        if let Some(suggestion) = closest_match(&normalized, &known) {
            err = err.with_hint(format!("Did you mean '{suggestion}'?"));
        }
        Err(err)
    }
}

/// Per-column aggregation applied when resampling a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Avg,
    Min,
    Max,
    Count,
    First,
    Last,
}

impl Aggregation {
    pub const ALL: [Aggregation; 7] = [
        Aggregation::Sum,
        Aggregation::Avg,
        Aggregation::Min,
        Aggregation::Max,
        Aggregation::Count,
        Aggregation::First,
        Aggregation::Last,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Avg => "avg",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Count => "count",
            Aggregation::First => "first",
            Aggregation::Last => "last",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = MosaiqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase();
        for agg in Aggregation::ALL {
            if agg.as_str() == normalized {
                return Ok(agg);
            }
        }

        let known: Vec<String> = Aggregation::ALL
            .iter()
            .map(|a| a.as_str().to_string())
            .collect();
        let mut err = MosaiqError::new(
            ErrorCode::UnknownAggregation,
            format!("Unknown aggregation '{s}'"),
        );
        if let Some(suggestion) = closest_match(&normalized, &known) {
            err = err.with_hint(format!("Did you mean '{suggestion}'?"));
        }
        Err(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Contains,
}

/// A typed per-column predicate applied to the merged working table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeFilter {
    pub op: FilterOp,
    pub value: serde_json::Value,
}

impl MergeFilter {
    pub fn new(op: FilterOp, value: serde_json::Value) -> Self {
        Self { op, value }
    }
}

/// Immutable description of one merge invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub strategy: MergeStrategy,

    /// Join keys, required by the join strategies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_columns: Vec<String>,

    /// Per-column aggregation for the time-series resample path.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aggregations: BTreeMap<String, Aggregation>,

    /// Per-column predicates applied after the per-kind handlers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, MergeFilter>,

    /// Stable multi-key sort applied after filtering.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort_columns: Vec<String>,

    /// Keep-first dedup keys applied last.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dedup_columns: Vec<String>,
}

impl MergeConfig {
    pub fn new(strategy: MergeStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    pub fn with_key_columns<S: Into<String>>(
        mut self,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.key_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_aggregation(mut self, column: impl Into<String>, agg: Aggregation) -> Self {
        self.aggregations.insert(column.into(), agg);
        self
    }

    pub fn with_filter(mut self, column: impl Into<String>, filter: MergeFilter) -> Self {
        self.filters.insert(column.into(), filter);
        self
    }

    pub fn with_sort<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.sort_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dedup<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.dedup_columns = columns.into_iter().map(Into::into).collect();
        self
    }
}
