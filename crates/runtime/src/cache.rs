//! Fingerprint-keyed result cache with single-flight execution.
//!
//! Backed by a `moka` TTL cache weighted by row count. Concurrent executions
//! of the same fingerprint are coalesced through a per-key `OnceCell`: at
//! most one runs the adapter call, everyone else shares the produced rows.
//! Failed executions are never stored, so errors stay transient.

use dashmap::DashMap;
use moka::future::Cache;
use mosaiq_common::config::CacheSettings;
use mosaiq_common::models::{Row, SourceKind};
use mosaiq_error::MosaiqError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

/// Which results are worth storing.
///
/// Derived from [`CacheSettings`]; `min_rows` of 1 keeps empty results out
/// of the cache so a flaky source can recover on the next attempt.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub enabled: bool,
    pub min_rows: usize,
    pub max_rows: Option<usize>,
    pub exclude_kinds: BTreeSet<SourceKind>,
}

impl CachePolicy {
    pub fn from_settings(settings: &CacheSettings) -> Result<Self, MosaiqError> {
        let mut exclude_kinds = BTreeSet::new();
        for kind in &settings.exclude_kinds {
            exclude_kinds.insert(SourceKind::from_str(kind)?);
        }
        Ok(Self {
            enabled: settings.enabled,
            min_rows: settings.min_rows,
            max_rows: settings.max_rows,
            exclude_kinds,
        })
    }

    pub fn should_store(&self, kind: SourceKind, row_count: usize) -> bool {
        if !self.enabled || self.exclude_kinds.contains(&kind) {
            return false;
        }
        if row_count < self.min_rows {
            return false;
        }
        if let Some(max_rows) = self.max_rows {
            if row_count > max_rows {
                return false;
            }
        }
        true
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub entry_count: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Shared result cache for executed sub-queries.
pub struct ResultCache {
    store: Cache<String, Arc<Vec<Row>>>,
    in_flight: DashMap<String, Arc<OnceCell<Arc<Vec<Row>>>>>,
    policy: CachePolicy,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new(settings: &CacheSettings) -> Result<Self, MosaiqError> {
        let policy = CachePolicy::from_settings(settings)?;

        let store = Cache::builder()
            .max_capacity(settings.max_entries)
            .time_to_live(Duration::from_secs(settings.ttl_seconds))
            .weigher(|_key: &String, rows: &Arc<Vec<Row>>| -> u32 {
                rows.len().max(1).try_into().unwrap_or(u32::MAX)
            })
            .eviction_listener(|key, rows: Arc<Vec<Row>>, cause| {
                debug!(
                    target: "cache",
                    key = %key,
                    rows = rows.len(),
                    cause = ?cause,
                    "evicting cached result"
                );
            })
            .build();

        Ok(Self {
            store,
            in_flight: DashMap::new(),
            policy,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Look up previously stored rows for a fingerprint key.
    pub async fn get(&self, key: &str) -> Option<Arc<Vec<Row>>> {
        if !self.policy.enabled {
            return None;
        }

        match self.store.get(key).await {
            Some(rows) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(target: "cache", key = %key, rows = rows.len(), "cache hit");
                Some(rows)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store rows under a fingerprint key, subject to the policy.
    pub async fn insert(&self, key: &str, kind: SourceKind, rows: Arc<Vec<Row>>) {
        if !self.policy.should_store(kind, rows.len()) {
            return;
        }
        self.store.insert(key.to_string(), rows.clone()).await;
        debug!(target: "cache", key = %key, rows = rows.len(), "stored result");
    }

    /// Fetch from the cache, or execute with single-flight coalescing.
    ///
    /// The second element of the result is true when the rows were served
    /// without running `execute` here: either a store hit or a coalesced
    /// in-flight execution. Errors propagate to their caller and leave
    /// nothing behind in the store.
    pub async fn get_or_execute<F, Fut>(
        &self,
        key: &str,
        kind: SourceKind,
        execute: F,
    ) -> (Result<Arc<Vec<Row>>, String>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Row>, String>>,
    {
        if !self.policy.enabled {
            return (execute().await.map(Arc::new), false);
        }

        if let Some(rows) = self.get(key).await {
            return (Ok(rows), true);
        }

        let cell = self
            .in_flight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let mut ran_here = false;
        let outcome = cell
            .get_or_try_init(|| async {
                ran_here = true;
                let rows = Arc::new(execute().await?);
                self.insert(key, kind, rows.clone()).await;
                Ok(rows)
            })
            .await
            .map(Arc::clone);

        // Retire the flight slot once settled; only the cell we joined, a
        // later execution may already have replaced it.
        self.in_flight
            .remove_if(key, |_, current| Arc::ptr_eq(current, &cell));

        (outcome, !ran_here)
    }

    /// Drop all stored results and in-flight markers.
    pub fn clear(&self) {
        self.store.invalidate_all();
        self.in_flight.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: self.policy.enabled,
            entry_count: self.store.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
