//! Tracing initialization (fmt subscriber with env-filter).
//!
//! Log verbosity is controlled via the standard `RUST_LOG` environment
//! variable, defaulting to `info` when unset. For example:
//!
//! ```bash
//! RUST_LOG=entctl=debug,sqlx=warn
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the tracing subscriber for the process.
///
/// Safe to call only once; subsequent calls return an error from the
/// underlying subscriber registry.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
