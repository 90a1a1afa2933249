//! # Query Warnings
//!
//! Task-local warning collection for federated execution.
//!
//! Non-fatal conditions (cache misses, dropped clauses, upstream bindings
//! resolved as empty) are collected during a query and propagated back on
//! the outcome rather than interleaved into the result rows.

use std::future::Future;
use std::sync::{Arc, Mutex};

tokio::task_local! {
    pub static QUERY_WARNINGS: Arc<Mutex<Vec<String>>>;
}

/// Helper to add a warning to the current task's warning list, if active.
pub fn add_warning(warning: String) {
    if let Ok(warnings) = QUERY_WARNINGS.try_with(|w: &Arc<Mutex<Vec<String>>>| w.clone()) {
        if let Ok(mut lock) = warnings.lock() {
            lock.push(warning);
        }
    }
}

/// Run a future with a fresh warning scope and return its collected warnings.
pub async fn with_warning_scope<F, T>(fut: F) -> (T, Vec<String>)
where
    F: Future<Output = T>,
{
    let collector = Arc::new(Mutex::new(Vec::new()));
    let output = QUERY_WARNINGS.scope(collector.clone(), fut).await;
    let warnings = collector.lock().map(|w| w.clone()).unwrap_or_default();
    (output, warnings)
}
