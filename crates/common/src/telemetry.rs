//! Logging setup shared by both binaries

use crate::config::ObservabilityConfig;
use crate::errors::{AppError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Build the env filter: `RUST_LOG` wins, then the configured level.
fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global tracing subscriber.
///
/// JSON lines when `json_logging` is set, human-readable output otherwise.
/// Must only be called once per process.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = env_filter(&config.log_level);
    let registry = Registry::default().with(filter);

    let installed = if config.json_logging {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    installed.map_err(|e| AppError::Internal {
        message: format!("Failed to install tracing subscriber: {}", e),
    })
}
