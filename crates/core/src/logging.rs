//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the logging system with tracing.
///
/// This sets up tracing-subscriber with:
/// - Environment-based filtering (RUST_LOG)
/// - Pretty printing for development
///
/// # Example
/// ```
/// tome_core::init_logging();
/// tracing::info!("Engine starting");
/// ```
pub fn init_logging() {
    let from_env = EnvFilter::try_from_default_env();
    let explicit = from_env.is_ok();
    let filter =
        from_env.unwrap_or_else(|_| EnvFilter::new("info,tome_engine=debug,tome_rhi=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();

    tracing::debug!(
        "Logging initialized ({} filter)",
        if explicit { "RUST_LOG" } else { "default" }
    );
}
