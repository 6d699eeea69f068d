//! Tracing initialization shared by the export service's binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str =
    "export_server=info,export_pipeline=info,export_db=info,export_csv=info";

/// Initialize a stderr `tracing` subscriber honoring `RUST_LOG`, falling
/// back to a sensible per-crate default when the variable is unset.
///
/// Call once, at process start, before spawning any pipeline or serving any
/// request.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(filter)
        .init();
}
