//! Binary entry point for ragstore.
//!
//! Wires typed configuration into an embedder, a chunker, a storage
//! adapter, the schema-migration manager, the Coordinator, and the
//! tool-call dispatch layer, then blocks until interrupted (spec §6).
//! CLI flags here only override the handful of settings an operator is
//! likely to want to flip without exporting an environment variable;
//! [`ragstore::config::RagConfig::from_env`] remains the source of truth
//! for everything else.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI/startup diagnostics.
#![allow(clippy::print_stderr)]

use clap::Parser;
use ragstore::chunker::SentenceBoundedChunker;
use ragstore::config::{DbType, RagConfig};
use ragstore::coordinator::Coordinator;
use ragstore::embedding::{Embedder, HashedFallbackEmbedder};
use ragstore::mcp::{McpServer, ToolRegistry};
use ragstore::observability::{self, LoggingConfig};
use ragstore::storage::{self, MigrationManager, SqliteStorage, StorageAdapter};
use std::process::ExitCode;
use std::sync::Arc;

/// Command-line overrides for the handful of settings worth flipping
/// without an environment variable.
#[derive(Debug, Parser)]
#[command(name = "ragstore", about = "Persistent retrieval-augmented knowledge store")]
struct Cli {
    /// Overrides `DB_FILE_PATH` for this run.
    #[arg(long, env = "DB_FILE_PATH")]
    db_file_path: Option<std::path::PathBuf>,

    /// Overrides `RAGSTORE_LOG_LEVEL` for this run.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON logs instead of the default human-readable format.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if let Some(level) = cli.log_level.clone() {
        logging.level = level;
    }
    if cli.json_logs {
        logging.format = ragstore::observability::LogFormat::Json;
    }
    if let Err(e) = observability::init(&logging) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let mut config = RagConfig::from_env();
    if let Some(path) = cli.db_file_path {
        config.sqlite.db_file_path = path;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "ragstore exited with an error");
            ExitCode::FAILURE
        },
    }
}

async fn run(config: RagConfig) -> ragstore::Result<()> {
    let embedder: Arc<dyn Embedder> = Arc::new(HashedFallbackEmbedder::new());
    let chunker = Arc::new(SentenceBoundedChunker::new());

    let storage: Arc<dyn StorageAdapter> = match config.db_type {
        DbType::Sqlite => {
            tracing::info!(path = %config.sqlite.db_file_path.display(), "opening embedded storage");
            Arc::new(SqliteStorage::open(
                config.sqlite.db_file_path.clone(),
                chunker,
                embedder.clone(),
            )?)
        },
        DbType::Postgresql => {
            #[cfg(feature = "postgres")]
            {
                tracing::info!(host = %config.postgres.host, port = config.postgres.port, "connecting to postgres storage");
                Arc::new(
                    ragstore::storage::PostgresStorage::connect(
                        &config.postgres,
                        embedder.dimensions(),
                        chunker,
                        embedder.clone(),
                    )
                    .await?,
                )
            }
            #[cfg(not(feature = "postgres"))]
            {
                return Err(ragstore::Error::Validation(
                    "DB_TYPE=postgresql requires a build with --features postgres".to_string(),
                ));
            }
        },
    };

    let migrations = Arc::new(MigrationManager::new(
        storage.clone(),
        storage::default_migrations(),
    )?);
    let status = migrations.run_migrations().await?;
    tracing::info!(
        current_version = status.current_version,
        pending_count = status.pending_count,
        "migrations applied"
    );

    let coordinator = Arc::new(Coordinator::new(storage, embedder));
    let tools = Arc::new(ToolRegistry::new(coordinator, migrations));
    let _server = McpServer::new(tools);

    tracing::info!("ragstore ready; awaiting shutdown signal");
    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, exiting");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = std::sync::Mutex::new(Some(tx));
    let handler_result = ctrlc::set_handler(move || {
        if let Ok(mut guard) = tx.lock()
            && let Some(tx) = guard.take()
        {
            let _ = tx.send(());
        }
    });
    if let Err(e) = handler_result {
        tracing::warn!(error = %e, "failed to install signal handler; exiting immediately");
        return;
    }
    let _ = rx.await;
}
