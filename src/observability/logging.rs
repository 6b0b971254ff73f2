//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Select level and format from configuration
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level when set
//! - Pretty output for terminals, compact for log collectors

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Default filter directive for `level`.
pub fn default_directive(level: &str) -> String {
    format!("resilient_http={level},warn")
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.log_level)));

    let (pretty, compact) = match config.log_format {
        LogFormat::Pretty => (Some(fmt::layer().pretty()), None),
        LogFormat::Compact => (None, Some(fmt::layer().compact())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(compact)
        .try_init()
}
