//! Typed configuration (spec §6).
//!
//! Models every environment variable named in the external-interfaces
//! section as a typed struct with sensible defaults. `.env` file discovery,
//! CLI flag parsing, and config-file precedence are out of scope per
//! spec §1 — [`RagConfig::from_env`] only reads `std::env::var` for the
//! names below.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::PathBuf;
use std::time::Duration;

/// Expands `${VAR_NAME}` references in a string against the process
/// environment. Unset variables are left untouched.
#[must_use]
pub fn expand_env_vars(input: &str) -> Cow<'_, str> {
    if !input.contains("${") {
        return Cow::Borrowed(input);
    }

    let mut result = input.to_string();
    let mut start = 0;

    while let Some(var_start) = result[start..].find("${") {
        let var_start = start + var_start;
        if let Some(var_end) = result[var_start..].find('}') {
            let var_end = var_start + var_end;
            let var_name = &result[var_start + 2..var_end];
            if let Ok(value) = std::env::var(var_name) {
                result.replace_range(var_start..=var_end, &value);
                start = var_start + value.len();
            } else {
                start = var_end + 1;
            }
        } else {
            break;
        }
    }

    Cow::Owned(result)
}

/// Which storage backend to run against (`DB_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    /// Embedded, single-file backend (the default).
    #[default]
    Sqlite,
    /// Client-server backend.
    Postgresql,
}

impl DbType {
    fn from_env_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("postgresql") || s.eq_ignore_ascii_case("postgres") {
            Self::Postgresql
        } else {
            Self::Sqlite
        }
    }
}

/// TLS configuration for the server backend (`PG_SSL*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PgSslConfig {
    /// Whether TLS is requested at all.
    pub enabled: bool,
    /// Path to a custom CA bundle.
    pub ca_file: Option<PathBuf>,
    /// Path to a client certificate.
    pub cert_file: Option<PathBuf>,
    /// Path to a client key.
    pub key_file: Option<PathBuf>,
    /// Whether to reject connections presenting an unverifiable certificate.
    pub reject_unauthorized: bool,
}

/// Embedded-backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Path to the database file, absolute or relative to the server binary.
    pub db_file_path: PathBuf,
    /// Whether to enable WAL mode (`SQLITE_ENABLE_WAL`, default true).
    pub enable_wal: bool,
    /// `busy_timeout` pragma, milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            db_file_path: PathBuf::from("ragstore.db"),
            enable_wal: true,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Connection pool floor for the server backend (spec §5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Minimum idle connections to keep open.
    pub min: usize,
    /// Maximum connections the pool may open.
    pub max: usize,
    /// How long an idle connection may sit before being closed.
    pub idle_timeout: Duration,
    /// How long to wait for a checkout before failing.
    pub connection_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min: 1,
            max: 10,
            idle_timeout: Duration::from_secs(300),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

/// Server-backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// `PG_HOST`.
    pub host: String,
    /// `PG_PORT`.
    pub port: u16,
    /// `PG_DATABASE`.
    pub database: String,
    /// `PG_USERNAME`.
    pub username: String,
    /// `PG_PASSWORD`.
    pub password: String,
    /// `PG_SSL*`.
    pub ssl: PgSslConfig,
    /// Pool knobs.
    pub pool: PoolConfig,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "ragstore".to_string(),
            username: "postgres".to_string(),
            password: String::new(),
            ssl: PgSslConfig::default(),
            pool: PoolConfig::default(),
        }
    }
}

/// Top-level configuration (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Which backend to run against.
    pub db_type: DbType,
    /// Embedded-backend settings (used when `db_type == Sqlite`).
    pub sqlite: SqliteConfig,
    /// Server-backend settings (used when `db_type == Postgresql`).
    pub postgres: PostgresConfig,
    /// Embedding dimension, shared by both backends (`VECTOR_DIMENSIONS`).
    pub vector_dimensions: usize,
    /// Deadline for any single operation crossing the RPC boundary
    /// (`QUERY_TIMEOUT`, milliseconds).
    pub query_timeout_ms: u64,
    /// Whether to emit verbose per-statement logging (`ENABLE_DB_LOGGING`).
    pub enable_db_logging: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            db_type: DbType::default(),
            sqlite: SqliteConfig::default(),
            postgres: PostgresConfig::default(),
            vector_dimensions: 384,
            query_timeout_ms: 30_000,
            enable_db_logging: false,
        }
    }
}

impl RagConfig {
    /// Reads the configuration from the process environment, falling back
    /// to defaults for anything unset. Does not load `.env` files or any
    /// other config source; that's the out-of-scope env loader (spec §1).
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("DB_TYPE") {
            config.db_type = DbType::from_env_str(&v);
        }
        if let Ok(v) = std::env::var("DB_FILE_PATH") {
            config.sqlite.db_file_path = PathBuf::from(expand_env_vars(&v).into_owned());
        }
        if let Ok(v) = std::env::var("SQLITE_ENABLE_WAL") {
            config.sqlite.enable_wal = parse_bool(&v, config.sqlite.enable_wal);
        }
        if let Ok(v) = std::env::var("PG_HOST") {
            config.postgres.host = v;
        }
        if let Ok(v) = std::env::var("PG_PORT")
            && let Ok(port) = v.parse()
        {
            config.postgres.port = port;
        }
        if let Ok(v) = std::env::var("PG_DATABASE") {
            config.postgres.database = v;
        }
        if let Ok(v) = std::env::var("PG_USERNAME") {
            config.postgres.username = v;
        }
        if let Ok(v) = std::env::var("PG_PASSWORD") {
            config.postgres.password = v;
        }
        if let Ok(v) = std::env::var("PG_SSL") {
            config.postgres.ssl.enabled = parse_bool(&v, false);
        }
        if let Ok(v) = std::env::var("PG_SSL_CA_FILE") {
            config.postgres.ssl.ca_file = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("PG_SSL_CERT_FILE") {
            config.postgres.ssl.cert_file = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("PG_SSL_KEY_FILE") {
            config.postgres.ssl.key_file = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("PG_SSL_REJECT_UNAUTHORIZED") {
            config.postgres.ssl.reject_unauthorized = parse_bool(&v, true);
        }
        if let Ok(v) = std::env::var("VECTOR_DIMENSIONS")
            && let Ok(dims) = v.parse()
        {
            config.vector_dimensions = dims;
        }
        if let Ok(v) = std::env::var("QUERY_TIMEOUT")
            && let Ok(ms) = v.parse()
        {
            config.query_timeout_ms = ms;
        }
        if let Ok(v) = std::env::var("ENABLE_DB_LOGGING") {
            config.enable_db_logging = parse_bool(&v, false);
        }

        config
    }

    /// The configured query timeout as a [`Duration`].
    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let config = RagConfig::default();
        assert_eq!(config.db_type, DbType::Sqlite);
        assert!(config.sqlite.enable_wal);
        assert_eq!(config.vector_dimensions, 384);
        assert_eq!(config.query_timeout_ms, 30_000);
        assert!(!config.enable_db_logging);
    }

    #[test]
    fn expand_env_vars_substitutes_known_vars() {
        // SAFETY: test runs single-threaded within this process; no other
        // test reads this variable name.
        unsafe {
            std::env::set_var("RAGSTORE_TEST_VAR", "value");
        }
        assert_eq!(
            expand_env_vars("prefix-${RAGSTORE_TEST_VAR}-suffix"),
            "prefix-value-suffix"
        );
        unsafe {
            std::env::remove_var("RAGSTORE_TEST_VAR");
        }
    }

    #[test]
    fn expand_env_vars_leaves_missing_vars_untouched() {
        assert_eq!(
            expand_env_vars("${RAGSTORE_DEFINITELY_UNSET_VAR}"),
            "${RAGSTORE_DEFINITELY_UNSET_VAR}"
        );
    }

    #[test]
    fn expand_env_vars_fast_path_avoids_allocation_markers() {
        assert!(matches!(expand_env_vars("no vars here"), Cow::Borrowed(_)));
    }
}
