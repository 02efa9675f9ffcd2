//! Structured logging.
//!
//! tracing + env-filter; the configured level is the default and `RUST_LOG`
//! overrides it. Safe to call more than once (later calls are no-ops), so
//! tests can initialize freely.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ObservabilityConfig;

pub fn init(config: &ObservabilityConfig) {
    let default_filter = format!("wayfarer={}", config.log_level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
