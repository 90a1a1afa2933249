//! Planning-time source registry and table catalog.
//!
//! The registry is the planner's whole view of the federation: which sources
//! exist, what each can do and at what relative cost, and which tables each
//! owns. Table ownership is explicit: registering a table under two sources
//! is rejected at registration time, not resolved by precedence later.

use mosaiq_common::config::SourceEntry;
use mosaiq_common::models::SourceKind;
use mosaiq_error::{closest_match, ErrorCode, ErrorContext, MosaiqError};
use mosaiq_query::{Capability, LogicalQuery};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::Arc;

/// Everything the planner knows about one registered backend.
///
/// Registered once and read-only during planning; `statistics` may be
/// refreshed out-of-band by re-registering the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub name: String,
    pub kind: SourceKind,

    /// Capability tags this source advertises.
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,

    /// Relative cost weight per capability; missing entries weigh 1.0.
    #[serde(default)]
    pub cost_factors: HashMap<Capability, f64>,

    /// Out-of-band statistics ("data_size", "row_count", ...).
    #[serde(default)]
    pub statistics: BTreeMap<String, serde_json::Value>,
}

impl DataSource {
    pub fn new(name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            capabilities: BTreeSet::new(),
            cost_factors: HashMap::new(),
            statistics: BTreeMap::new(),
        }
    }

    pub fn with_capabilities(mut self, caps: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(caps);
        self
    }

    pub fn with_cost_factor(mut self, cap: Capability, factor: f64) -> Self {
        self.cost_factors.insert(cap, factor);
        self
    }

    pub fn with_statistic(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.statistics.insert(key.into(), value);
        self
    }

    /// Build from a config entry, parsing the kind and capability strings.
    pub fn from_entry(entry: &SourceEntry) -> Result<Self, MosaiqError> {
        let kind = SourceKind::from_str(&entry.kind)?;

        let mut capabilities = BTreeSet::new();
        for cap in &entry.capabilities {
            capabilities.insert(Capability::from_str(cap)?);
        }

        let mut cost_factors = HashMap::new();
        for (cap, factor) in &entry.cost_factors {
            cost_factors.insert(Capability::from_str(cap)?, *factor);
        }

        Ok(Self {
            name: entry.name.clone(),
            kind,
            capabilities,
            cost_factors,
            statistics: entry.statistics.clone(),
        })
    }

    /// Strict subset test: can this source serve all `required` capabilities?
    pub fn covers(&self, required: &BTreeSet<Capability>) -> bool {
        required.is_subset(&self.capabilities)
    }

    pub fn missing(&self, required: &BTreeSet<Capability>) -> Vec<Capability> {
        required.difference(&self.capabilities).copied().collect()
    }

    /// The `data_size` statistic, 0 when absent or non-numeric.
    pub fn data_size(&self) -> f64 {
        self.statistics
            .get("data_size")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
    }

    /// Deterministic cost estimate for serving `required` on this source.
    ///
    /// Sum of the cost factors for the capabilities actually involved, scaled
    /// by data size; strictly increasing in `data_size` for a fixed set.
    pub fn estimate_cost(&self, required: &BTreeSet<Capability>) -> f64 {
        let base: f64 = required
            .intersection(&self.capabilities)
            .map(|cap| self.cost_factors.get(cap).copied().unwrap_or(1.0))
            .sum();
        base * (1.0 + self.data_size() / 1_000_000.0)
    }
}

/// A per-source rewrite applied to each plan fragment before its cost is
/// finalized. Implementations must be pure with respect to the registry;
/// they run while planning holds the registry read-only.
pub trait QueryOptimizer: Send + Sync {
    fn name(&self) -> &str;

    fn rewrite(&self, query: LogicalQuery, source: &DataSource) -> LogicalQuery;
}

/// Registered sources, the table catalog, and per-source optimizers.
#[derive(Default)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<DataSource>>,
    /// table name -> owning source name
    catalog: HashMap<String, String>,
    optimizers: HashMap<String, Arc<dyn QueryOptimizer>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or refresh a source. Re-registration under the same name
    /// replaces the metadata (the statistics-refresh path); table ownership
    /// is untouched.
    pub fn register_source(&mut self, source: DataSource) {
        tracing::debug!(
            target: "planner",
            source = %source.name,
            kind = %source.kind,
            capabilities = source.capabilities.len(),
            "source registered"
        );
        self.sources.insert(source.name.clone(), Arc::new(source));
    }

    /// Register a config entry: source metadata plus its table claims.
    pub fn register_entry(&mut self, entry: &SourceEntry) -> Result<(), MosaiqError> {
        let source = DataSource::from_entry(entry)?;
        let name = source.name.clone();
        self.register_source(source);
        self.register_tables(&name, &entry.tables)
    }

    /// Claim tables for a source. A table already owned by a different
    /// source is a conflict; claiming it again for the same source is a
    /// no-op.
    pub fn register_tables<S: AsRef<str>>(
        &mut self,
        source_name: &str,
        tables: &[S],
    ) -> Result<(), MosaiqError> {
        if !self.sources.contains_key(source_name) {
            let available: Vec<String> = self.source_names();
            let mut err = MosaiqError::new(
                ErrorCode::SourceNotFound,
                format!("cannot register tables: source '{source_name}' is not registered"),
            )
            .with_context(ErrorContext::SourceNotFound {
                source_name: source_name.to_string(),
                available_sources: available.clone(),
            });
            if let Some(suggestion) = closest_match(source_name, &available) {
                err = err.with_hint(format!("Did you mean '{suggestion}'?"));
            }
            return Err(err);
        }

        for table in tables {
            let table = table.as_ref();
            match self.catalog.get(table) {
                Some(owner) if owner != source_name => {
                    return Err(MosaiqError::new(
                        ErrorCode::TableConflict,
                        format!(
                            "table '{table}' is already registered to source '{owner}'"
                        ),
                    )
                    .with_context(ErrorContext::TableConflict {
                        table: table.to_string(),
                        registered_to: owner.clone(),
                        attempted: source_name.to_string(),
                    })
                    .with_hint(
                        "Each table resolves to exactly one source; unregister it first or use a distinct table name".to_string(),
                    ));
                }
                _ => {
                    self.catalog
                        .insert(table.to_string(), source_name.to_string());
                }
            }
        }
        Ok(())
    }

    pub fn register_optimizer(
        &mut self,
        source_name: impl Into<String>,
        optimizer: Arc<dyn QueryOptimizer>,
    ) {
        self.optimizers.insert(source_name.into(), optimizer);
    }

    pub fn get(&self, name: &str) -> Option<Arc<DataSource>> {
        self.sources.get(name).cloned()
    }

    /// Resolve a table to its owning source.
    pub fn source_for_table(&self, table: &str) -> Result<Arc<DataSource>, MosaiqError> {
        let owner = self.catalog.get(table).ok_or_else(|| {
            let known = self.table_names();
            let mut err = MosaiqError::new(
                ErrorCode::UnresolvedTable,
                format!("table '{table}' is not mapped to any registered source"),
            )
            .with_context(ErrorContext::UnresolvedTable {
                table: table.to_string(),
                known_tables: known.clone(),
            });
            if let Some(suggestion) = closest_match(table, &known) {
                err = err.with_hint(format!("Did you mean '{suggestion}'?"));
            }
            err
        })?;

        self.sources.get(owner).cloned().ok_or_else(|| {
            MosaiqError::new(
                ErrorCode::SourceNotFound,
                format!("catalog entry for '{table}' points at unregistered source '{owner}'"),
            )
        })
    }

    pub fn optimizer_for(&self, source_name: &str) -> Option<&Arc<dyn QueryOptimizer>> {
        self.optimizers.get(source_name)
    }

    pub fn sources(&self) -> impl Iterator<Item = &Arc<DataSource>> {
        self.sources.values()
    }

    pub fn source_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut tables: Vec<String> = self.catalog.keys().cloned().collect();
        tables.sort();
        tables
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
