//! Structured logging (spec §10 ambient stack addendum).
//!
//! `tracing` spans live at every `StorageAdapter` method and Coordinator
//! orchestration entry point (see `#[tracing::instrument]` call sites in
//! `storage`, `coordinator`, and `retrieval`); this module is only the
//! process-wide subscriber wiring, initialized once at startup from
//! [`RagConfig`]. No metrics/OTLP exporter is in scope here — log
//! transport sinks are external per spec §1, only the instrumentation
//! call sites and the stdout subscriber setup are.

mod logging;

pub use logging::{LogFormat, LoggingConfig};

use crate::{Error, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global `tracing` subscriber for the process.
///
/// Callers invoke this exactly once from `main`; `tracing`'s global
/// subscriber can only be set once per process.
///
/// # Errors
///
/// Returns [`Error::Conflict`] if a global subscriber has already been
/// installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };

    result.map_err(|e| Error::Conflict(format!("tracing subscriber already installed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_config_defaults_to_pretty_info() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
    }
}
