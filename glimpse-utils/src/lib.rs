//! Common helpers shared across glimpse crates.

/// Application configuration and settings management.
pub mod config;
/// Rolling frame-rate accounting for the pipeline worker.
pub mod fps;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;

use anyhow::Result;
use log::LevelFilter;

pub use fps::{FpsReporter, FpsWindow};
pub use telemetry::{
    configure as configure_telemetry, telemetry_allows, telemetry_enabled, telemetry_level,
    timing_guard, timing_guard_if, TimingGuard,
};

/// Initialize logging once for the CLI and for test binaries.
///
/// This function respects the `RUST_LOG` environment variable if it is set.
/// Otherwise, it falls back to the provided default filter level.
///
/// # Arguments
///
/// * `default_filter` - The `LevelFilter` to use if `RUST_LOG` is not set.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module("glimpse::telemetry", LevelFilter::Trace);

    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
    Ok(())
}
