use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

// Default constants
pub const DEFAULT_MAX_WORKERS: usize = 16;
pub const DEFAULT_ADAPTER_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_QUERY_BUDGET: usize = 64;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 60_000;

pub const DEFAULT_CACHE_ENABLED: bool = true;
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 10_000;
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;
pub const DEFAULT_CACHE_MIN_ROWS: usize = 1;

// Custom Serde logic for SecretString
fn serialize_secret<S>(secret: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match secret {
        Some(_) => serializer.serialize_str("[REDACTED]"),
        None => serializer.serialize_none(),
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.map(SecretString::from))
}

/// Top-level engine configuration.
///
/// Loaded from an optional file plus `MOSAIQ`-prefixed environment variables
/// (`MOSAIQ_ENGINE__MAX_WORKERS` maps to `engine.max_workers`, etc.).
#[derive(Debug, Deserialize, Default, Clone, Validate)]
pub struct EngineConfig {
    #[serde(default)]
    #[validate(nested)]
    pub engine: EngineSettings,

    #[serde(default)]
    #[validate(nested)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    #[validate(nested)]
    pub sources: Vec<SourceEntry>,
}

impl EngineConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = config::Config::builder();

        let builder = if std::path::Path::new(path).exists() {
            builder.add_source(config::File::with_name(path))
        } else {
            builder
        };

        // Map MOSAIQ_ENGINE__MAX_WORKERS to engine.max_workers, etc.
        let builder = builder.add_source(
            config::Environment::with_prefix("MOSAIQ")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().context("Failed to build configuration")?;

        let engine_config: EngineConfig = cfg
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        engine_config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {:?}", e))?;

        Ok(engine_config)
    }
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct EngineSettings {
    /// Upper bound on concurrently executing sub-queries within a plan
    #[serde(default = "default_max_workers")]
    #[validate(range(min = 1))]
    pub max_workers: usize,

    /// Per-adapter-call timeout; a call past this limit fails that sub-query
    #[serde(default = "default_adapter_timeout_ms")]
    #[validate(range(min = 1))]
    pub adapter_timeout_ms: u64,

    /// Global budget of concurrently federated queries
    #[serde(default = "default_query_budget")]
    #[validate(range(min = 1))]
    pub query_budget: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            adapter_timeout_ms: default_adapter_timeout_ms(),
            query_budget: default_query_budget(),
        }
    }
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_adapter_timeout_ms() -> u64 {
    DEFAULT_ADAPTER_TIMEOUT_MS
}

fn default_query_budget() -> usize {
    DEFAULT_QUERY_BUDGET
}

/// Result cache behavior.
///
/// `min_rows`/`max_rows` bound which results are worth storing;
/// `exclude_kinds` opts whole source families out (e.g. `time_series`
/// sources whose data is append-heavy and goes stale immediately).
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CacheSettings {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    #[serde(default = "default_cache_max_entries")]
    pub max_entries: u64,

    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,

    #[serde(default = "default_cache_min_rows")]
    pub min_rows: usize,

    #[serde(default)]
    pub max_rows: Option<usize>,

    #[serde(default)]
    pub exclude_kinds: Vec<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            max_entries: default_cache_max_entries(),
            ttl_seconds: default_cache_ttl_seconds(),
            min_rows: default_cache_min_rows(),
            max_rows: None,
            exclude_kinds: Vec::new(),
        }
    }
}

fn default_cache_enabled() -> bool {
    DEFAULT_CACHE_ENABLED
}

fn default_cache_max_entries() -> u64 {
    DEFAULT_CACHE_MAX_ENTRIES
}

fn default_cache_ttl_seconds() -> u64 {
    DEFAULT_CACHE_TTL_SECONDS
}

fn default_cache_min_rows() -> usize {
    DEFAULT_CACHE_MIN_ROWS
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

/// Declarative description of one data source.
///
/// `kind` and `capabilities` stay as strings at this layer; the registry
/// parses them into typed values at registration so that typos surface as
/// structured errors with suggestions.
#[derive(Debug, Default, Serialize, Deserialize, Clone, Validate)]
pub struct SourceEntry {
    #[validate(length(min = 1))]
    pub name: String,

    /// Backend family: relational, document, graph, object_store, time_series
    #[validate(length(min = 1))]
    pub kind: String,

    /// Capability tags this source advertises (e.g. "select", "join")
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Relative cost weight per capability, used by the planner's estimator
    #[serde(default)]
    pub cost_factors: BTreeMap<String, f64>,

    /// Out-of-band statistics ("data_size", "row_count", ...)
    #[serde(default)]
    pub statistics: BTreeMap<String, serde_json::Value>,

    /// Tables this source owns in the federation catalog
    #[serde(default)]
    pub tables: Vec<String>,

    #[validate(custom(function = "validate_source_url"))]
    pub url: Option<String>,

    pub username: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub password: Option<SecretString>,

    // Flatten other loose adapter-specific config
    #[serde(flatten)]
    pub options: serde_json::Value,
}

fn validate_source_url(url: &str) -> Result<(), validator::ValidationError> {
    if url.is_empty() {
        return Ok(());
    }

    match url::Url::parse(url) {
        Ok(_) => Ok(()),
        Err(_) => Err(validator::ValidationError::new("invalid_url")),
    }
}
