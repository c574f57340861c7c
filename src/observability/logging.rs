//! Logging configuration (spec §10 ambient stack addendum).

/// Output shape for the process's log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, `tracing_subscriber::fmt`'s default compact form.
    #[default]
    Pretty,
    /// Newline-delimited JSON, one object per event.
    Json,
}

/// Subscriber configuration, independent of [`crate::config::RagConfig`]
/// so logging can be initialized before the rest of config is parsed.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingConfig {
    /// Reads `RAGSTORE_LOG_FORMAT` (`json` or `pretty`) and `RAGSTORE_LOG_LEVEL`
    /// from the environment, falling back to defaults. `RUST_LOG` still
    /// takes precedence inside [`super::init`] when set.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(level) = std::env::var("RAGSTORE_LOG_LEVEL") {
            config.level = level;
        }
        if let Ok(format) = std::env::var("RAGSTORE_LOG_FORMAT")
            && format.eq_ignore_ascii_case("json")
        {
            config.format = LogFormat::Json;
        }
        config
    }
}
