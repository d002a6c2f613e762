//! Structured logging.
//!
//! `RUST_LOG` wins over the configured level when set. JSON output is
//! for log shippers, the default text format for terminals.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::ObservabilityConfig;

/// Directive used when neither `RUST_LOG` nor the config gives a valid one.
const FALLBACK_DIRECTIVE: &str = "node_server=info,tower_http=info";

/// Build the filter: environment first, then the configured level.
pub fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("node_server={level},tower_http={level}")))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_DIRECTIVE))
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(config: &ObservabilityConfig) {
    let layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_filter(build_env_filter(&config.log_level))
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(build_env_filter(&config.log_level))
            .boxed()
    };

    if tracing_subscriber::registry().with(layer).try_init().is_err() {
        tracing::debug!("Logging already initialized");
    }
}
