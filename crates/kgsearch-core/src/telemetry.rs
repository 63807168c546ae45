//! Tracing setup for embedders of this library. Kept minimal relative to
//! the platform's service-wide `shared/observability` crate: this is a
//! library, not a binary, so it only offers an opt-in initializer rather
//! than owning process-wide logging configuration.

use std::env;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub level: String,
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            json: env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false),
        }
    }
}

/// Installs a global tracing subscriber. Safe to call at most once per
/// process; intended for binaries embedding this crate directly (tests use
/// their own per-test subscriber, if any).
pub fn init(config: TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        let layer = fmt::layer().json().with_target(true);
        let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
    } else {
        let layer = fmt::layer().with_target(true);
        let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
    }
}
