//! Logger setup, wiring the [`log`] facade used throughout the engine
//! crates to a `tracing-subscriber` backend.

use anyhow::{Context, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Installs a global logger filtered by `filter` (an `env_logger`-style
/// directive string), defaulting to `warn` when empty.
///
/// # Errors
///
/// Returns an error if `filter` fails to parse.
pub fn init(filter: &str) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse(filter)
        .with_context(|| format!("failed to parse log filter: {filter:?}"))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    Ok(())
}
