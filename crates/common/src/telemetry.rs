//! Tracing subscriber initialization for the Mosaiq engine.
//!
//! Events are emitted under stable targets (`planner`, `executor`, `cache`,
//! `merge`, `queries`) so deployments can route them to separate sinks.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable controlling the log filter (e.g. `executor=debug`).
pub const LOG_ENV_VAR: &str = "MOSAIQ_LOG";

/// Initialize the global tracing subscriber.
///
/// The filter comes from `MOSAIQ_LOG` when set, otherwise `default_filter`.
/// `json` switches the stdout layer to JSON lines for log shippers.
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()?;
    }

    Ok(())
}
