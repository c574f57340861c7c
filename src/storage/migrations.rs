//! Backend-agnostic schema-migration manager (spec §4.2).
//!
//! The teacher's `storage::migrations` module only drove the PostgreSQL
//! side. This crate generalizes the same shape — ordered, versioned,
//! transactional schema evolution with a tracking table — to run over
//! either backend via [`StorageAdapter`], since spec.md requires both to
//! persist `schema_migrations`.

use crate::storage::StorageAdapter;
use crate::{Error, Result};
use std::sync::Arc;

/// One step of a migration's `up`/`down` body, applied over a concrete
/// backend. Implementations issue raw SQL/DDL through whatever handle the
/// backend exposes internally; the manager itself never speaks SQL.
pub type MigrationFn = fn(&dyn StorageAdapter) -> futures::future::BoxFuture<'_, Result<()>>;

/// A single versioned migration (spec §4.2): `(version, description,
/// up(backend), down(backend)?)`, optionally split per backend with a
/// common fallback.
pub struct Migration {
    /// Sequential version number, starting at 1.
    pub version: i32,
    /// Human-readable description, recorded in `schema_migrations`.
    pub description: &'static str,
    /// `up` body for the embedded backend, if it differs from `common_up`.
    pub sqlite_up: Option<MigrationFn>,
    /// `up` body for the server backend, if it differs from `common_up`.
    pub postgres_up: Option<MigrationFn>,
    /// `up` body shared by both backends, used when the per-backend slot
    /// above is `None`.
    pub common_up: Option<MigrationFn>,
    /// `down` body for the embedded backend, if it differs from `common_down`.
    pub sqlite_down: Option<MigrationFn>,
    /// `down` body for the server backend, if it differs from `common_down`.
    pub postgres_down: Option<MigrationFn>,
    /// `down` body shared by both backends.
    pub common_down: Option<MigrationFn>,
}

impl Migration {
    /// The `up` body reachable for `kind`, preferring the per-backend slot
    /// over `common_up`.
    #[must_use]
    pub fn up_for(&self, kind: crate::storage::BackendKind) -> Option<MigrationFn> {
        use crate::storage::BackendKind::{Embedded, Server};
        match kind {
            Embedded => self.sqlite_up.or(self.common_up),
            Server => self.postgres_up.or(self.common_up),
        }
    }

    /// The `down` body reachable for `kind`, preferring the per-backend
    /// slot over `common_down`.
    #[must_use]
    pub fn down_for(&self, kind: crate::storage::BackendKind) -> Option<MigrationFn> {
        use crate::storage::BackendKind::{Embedded, Server};
        match kind {
            Embedded => self.sqlite_down.or(self.common_down),
            Server => self.postgres_down.or(self.common_down),
        }
    }
}

/// Current version and pending-migration count, per `getMigrationStatus`
/// (spec §4.2/§6).
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct MigrationStatus {
    /// `MAX(version)` over applied migrations, or 0 if none are applied.
    pub current_version: i32,
    /// Number of registered migrations with `version > current_version`.
    pub pending_count: usize,
}

/// Drives an ordered set of [`Migration`]s over a [`StorageAdapter`]
/// (spec §4.2). Registration rejects any migration with no implementation
/// reachable for the adapter's backend, so a manager that exists at all is
/// guaranteed runnable.
pub struct MigrationManager {
    storage: Arc<dyn StorageAdapter>,
    migrations: Vec<Migration>,
}

impl MigrationManager {
    /// Builds a manager over `migrations`, sorted ascending by version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if any migration has no `up`
    /// implementation reachable for `storage`'s backend.
    pub fn new(storage: Arc<dyn StorageAdapter>, mut migrations: Vec<Migration>) -> Result<Self> {
        let kind = storage.backend_kind();
        for m in &migrations {
            if m.up_for(kind).is_none() {
                return Err(Error::Validation(format!(
                    "migration {} has no up() implementation for backend {kind:?}",
                    m.version
                )));
            }
        }
        migrations.sort_by_key(|m| m.version);
        Ok(Self { storage, migrations })
    }

    /// `getMigrationStatus`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage layer itself is unreachable.
    pub async fn status(&self) -> Result<MigrationStatus> {
        self.storage.ensure_migrations_table().await?;
        let current_version = self.current_version().await?;
        let pending_count = self
            .migrations
            .iter()
            .filter(|m| m.version > current_version)
            .count();
        Ok(MigrationStatus {
            current_version,
            pending_count,
        })
    }

    /// `runMigrations`: applies every migration with `version > current`,
    /// ascending, each inside its own transaction (step 4, spec §4.2).
    /// Failure aborts the chain and surfaces the offending version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] naming the failing migration's version
    /// if any `up` step fails; migrations applied before the failure stay
    /// applied (no cross-migration rollback).
    #[tracing::instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<MigrationStatus> {
        self.storage.ensure_migrations_table().await?;
        let current = self.current_version().await?;
        let kind = self.storage.backend_kind();

        for migration in self.migrations.iter().filter(|m| m.version > current) {
            let up = migration
                .up_for(kind)
                .ok_or_else(|| Error::Backend {
                    operation: format!("migration_v{}", migration.version),
                    cause: "no up() implementation for this backend".to_string(),
                })?;
            up(self.storage.as_ref()).await.map_err(|e| Error::Backend {
                operation: format!("migration_v{}: {}", migration.version, migration.description),
                cause: e.to_string(),
            })?;
            self.storage
                .record_migration(migration.version, migration.description)
                .await?;
            tracing::info!(version = migration.version, description = migration.description, "applied migration");
        }

        self.status().await
    }

    /// `rollbackMigration(targetVersion)`: runs matching `down` functions
    /// in descending order down to (not including) `target_version`,
    /// removing their `schema_migrations` rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `target_version` is at or above
    /// the current version, or if rolling back would cross a version with
    /// no `down` implementation for this backend.
    #[tracing::instrument(skip(self))]
    pub async fn rollback_to(&self, target_version: i32) -> Result<MigrationStatus> {
        let current = self.current_version().await?;
        if target_version >= current {
            return Err(Error::Validation(format!(
                "rollback target {target_version} must be below current version {current}"
            )));
        }
        let kind = self.storage.backend_kind();

        let mut to_roll_back: Vec<&Migration> = self
            .migrations
            .iter()
            .filter(|m| m.version > target_version && m.version <= current)
            .collect();
        to_roll_back.sort_by_key(|m| std::cmp::Reverse(m.version));

        for migration in to_roll_back {
            let down = migration.down_for(kind).ok_or_else(|| {
                Error::Validation(format!(
                    "migration {} has no down() implementation; cannot roll back past it",
                    migration.version
                ))
            })?;
            down(self.storage.as_ref()).await.map_err(|e| Error::Backend {
                operation: format!("migration_v{}_down", migration.version),
                cause: e.to_string(),
            })?;
            self.storage.remove_migration_row(migration.version).await?;
            tracing::info!(version = migration.version, "rolled back migration");
        }

        self.status().await
    }

    async fn current_version(&self) -> Result<i32> {
        Ok(self
            .storage
            .applied_migration_versions()
            .await?
            .into_iter()
            .max()
            .unwrap_or(0))
    }
}

/// Maximum version across a set of migrations.
#[must_use]
pub fn max_version(migrations: &[Migration]) -> i32 {
    migrations.iter().map(|m| m.version).max().unwrap_or(0)
}

fn baseline_schema<'a>(_: &'a dyn StorageAdapter) -> futures::future::BoxFuture<'a, Result<()>> {
    Box::pin(async { Ok(()) })
}

/// The migrations a production `ragstore` binary runs at startup.
///
/// Both backends already create their full schema directly at
/// connection-open time (`SqliteStorage::initialize`, the equivalent
/// `PostgresStorage` setup) rather than through this manager, so version 1
/// is a no-op: it exists only to give `schema_migrations` a recorded
/// baseline for `getMigrationStatus` to report against, and a version
/// number for future migrations to build on.
#[must_use]
pub fn default_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "baseline schema (created at connection-open time)",
        sqlite_up: Some(baseline_schema),
        postgres_up: Some(baseline_schema),
        common_up: None,
        sqlite_down: Some(baseline_schema),
        postgres_down: Some(baseline_schema),
        common_down: None,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::SentenceBoundedChunker;
    use crate::embedding::HashedFallbackEmbedder;
    use crate::storage::SqliteStorage;
    use std::sync::Arc;

    fn no_op<'a>(_: &'a dyn StorageAdapter) -> futures::future::BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn make_storage() -> Arc<dyn StorageAdapter> {
        let embedder = Arc::new(HashedFallbackEmbedder::new());
        let chunker = Arc::new(SentenceBoundedChunker::new());
        Arc::new(SqliteStorage::in_memory(chunker, embedder).unwrap())
    }

    fn sample_migrations() -> Vec<Migration> {
        vec![
            Migration {
                version: 1,
                description: "first",
                sqlite_up: Some(no_op),
                postgres_up: None,
                common_up: None,
                sqlite_down: Some(no_op),
                postgres_down: None,
                common_down: None,
            },
            Migration {
                version: 2,
                description: "second",
                sqlite_up: None,
                postgres_up: None,
                common_up: Some(no_op),
                sqlite_down: None,
                postgres_down: None,
                common_down: Some(no_op),
            },
        ]
    }

    #[tokio::test]
    async fn s5_migration_round_trip() {
        let manager = MigrationManager::new(make_storage(), sample_migrations()).unwrap();

        let status = manager.run_migrations().await.unwrap();
        assert_eq!(status.current_version, 2);
        assert_eq!(status.pending_count, 0);

        let status = manager.rollback_to(1).await.unwrap();
        assert_eq!(status.current_version, 1);
        assert_eq!(status.pending_count, 1);

        let status = manager.run_migrations().await.unwrap();
        assert_eq!(status.current_version, 2);
        assert_eq!(status.pending_count, 0);
    }

    #[tokio::test]
    async fn rollback_past_missing_down_is_rejected() {
        let mut migrations = sample_migrations();
        migrations[0].sqlite_down = None;
        let manager = MigrationManager::new(make_storage(), migrations).unwrap();
        manager.run_migrations().await.unwrap();

        let err = manager.rollback_to(0).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn registration_rejects_migration_with_no_reachable_up() {
        let migrations = vec![Migration {
            version: 1,
            description: "server only",
            sqlite_up: None,
            postgres_up: Some(no_op),
            common_up: None,
            sqlite_down: None,
            postgres_down: None,
            common_down: None,
        }];
        let err = MigrationManager::new(make_storage(), migrations).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
