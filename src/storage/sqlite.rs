//! Embedded `SQLite` backend (spec §4.1, "Embedded variant").
//!
//! A single file with an in-process vector index reached through
//! approximate-nearest-neighbor match (spec). Writes run under the
//! connection's mutex (global serialization); reads may run concurrently
//! with each other but still take the same mutex here, since
//! `rusqlite::Connection` is `!Sync` — the teacher's established idiom
//! (`Mutex<Connection>` + WAL mode + `busy_timeout`) is reused unchanged.
//! Foreign-key enforcement is left off; cascades are executed explicitly
//! in code (spec).

use crate::chunker::{ChunkOptions, Chunker};
use crate::embedding::Embedder;
use crate::models::{
    BatchResult, Chunk, ChunkKind, Document, Entity, EntityId, KnowledgeGraphStats, Relation,
    RelationId, TypeCount,
};
use crate::storage::vector_index::{BruteForceIndex, VectorIndex, VectorMatch};
use crate::storage::{BackendKind, NewEntity, RelationTriple, StorageAdapter};
use crate::{Error, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::instrument;

/// Embedded `SQLite`-backed [`StorageAdapter`].
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn Embedder>,
    db_path: Option<PathBuf>,
}

impl SqliteStorage {
    /// Opens (or creates) a database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema cannot
    /// be initialized.
    pub fn open(
        path: impl Into<PathBuf>,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let db_path = path.into();
        let conn = Connection::open(&db_path).map_err(|e| Error::Backend {
            operation: "sqlite_open".to_string(),
            cause: e.to_string(),
        })?;
        let storage = Self {
            conn: Mutex::new(conn),
            chunker,
            embedder,
            db_path: Some(db_path),
        };
        storage.initialize()?;
        Ok(storage)
    }

    /// Opens an in-memory database (tests, ephemeral tools).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be initialized.
    pub fn in_memory(chunker: Arc<dyn Chunker>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Backend {
            operation: "sqlite_open_in_memory".to_string(),
            cause: e.to_string(),
        })?;
        let storage = Self {
            conn: Mutex::new(conn),
            chunker,
            embedder,
            db_path: None,
        };
        storage.initialize()?;
        Ok(storage)
    }

    /// The database file path, if not in-memory.
    #[must_use]
    pub fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("sqlite mutex was poisoned, recovering");
                poisoned.into_inner()
            },
        }
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.lock();
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        let _ = conn.pragma_update(None, "busy_timeout", "5000");
        let _ = conn.pragma_update(None, "foreign_keys", "OFF");

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS entities (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                entity_type TEXT NOT NULL,
                observations TEXT NOT NULL,
                mentions INTEGER NOT NULL DEFAULT 0,
                metadata TEXT NOT NULL,
                embedding_text TEXT,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS entity_vectors (
                entity_id TEXT PRIMARY KEY,
                vector BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS relations (
                id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                relation_type TEXT NOT NULL,
                confidence REAL NOT NULL,
                metadata TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS chunks (
                chunk_id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                document_id TEXT,
                chunk_index INTEGER,
                entity_id TEXT,
                relationship_id TEXT,
                text TEXT NOT NULL,
                start_pos INTEGER NOT NULL,
                end_pos INTEGER NOT NULL,
                metadata TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS chunk_vectors (
                chunk_id TEXT PRIMARY KEY,
                vector BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS chunk_entity_links (
                chunk_id TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                PRIMARY KEY (chunk_id, entity_id)
            );
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id, chunk_index);
            CREATE INDEX IF NOT EXISTS idx_relations_source ON relations(source_id);
            CREATE INDEX IF NOT EXISTS idx_relations_target ON relations(target_id);
            CREATE INDEX IF NOT EXISTS idx_links_entity ON chunk_entity_links(entity_id);
            ",
        )
        .map_err(|e| Error::Backend {
            operation: "sqlite_init_schema".to_string(),
            cause: e.to_string(),
        })?;

        Ok(())
    }

    // --- row <-> model mapping ------------------------------------------

    fn row_to_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entity> {
        let observations_json: String = row.get(3)?;
        let metadata_json: String = row.get(5)?;
        Ok(Entity {
            id: EntityId::from_raw(row.get::<_, String>(0)?),
            name: row.get(1)?,
            entity_type: row.get(2)?,
            observations: serde_json::from_str(&observations_json).unwrap_or_default(),
            mentions: row.get::<_, i64>(4)? as u64,
            metadata: serde_json::from_str(&metadata_json).unwrap_or(serde_json::Value::Null),
            created_at: row.get::<_, i64>(7)? as u64,
        })
    }

    const ENTITY_COLUMNS: &'static str =
        "id, name, entity_type, observations, mentions, metadata, embedding_text, created_at";

    fn fetch_entity_by_name(conn: &Connection, name: &str) -> Result<Option<Entity>> {
        conn.query_row(
            &format!("SELECT {} FROM entities WHERE name = ?1", Self::ENTITY_COLUMNS),
            params![name],
            Self::row_to_entity,
        )
        .optional()
        .map_err(|e| Error::Backend {
            operation: "get_entity".to_string(),
            cause: e.to_string(),
        })
    }

    fn fetch_entity_by_id(conn: &Connection, id: &EntityId) -> Result<Option<Entity>> {
        conn.query_row(
            &format!("SELECT {} FROM entities WHERE id = ?1", Self::ENTITY_COLUMNS),
            params![id.as_str()],
            Self::row_to_entity,
        )
        .optional()
        .map_err(|e| Error::Backend {
            operation: "get_entity_by_id".to_string(),
            cause: e.to_string(),
        })
    }

    fn insert_entity_row(conn: &Connection, entity: &Entity) -> Result<()> {
        conn.execute(
            "INSERT INTO entities (id, name, entity_type, observations, mentions, metadata, embedding_text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entity.id.as_str(),
                entity.name,
                entity.entity_type,
                serde_json::to_string(&entity.observations).unwrap_or_default(),
                entity.mentions as i64,
                entity.metadata.to_string(),
                entity.embedding_text(),
                entity.created_at as i64,
            ],
        )
        .map_err(|e| Error::Backend {
            operation: "insert_entity".to_string(),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    fn update_entity_observations(conn: &Connection, entity: &Entity) -> Result<()> {
        conn.execute(
            "UPDATE entities SET observations = ?2, embedding_text = ?3 WHERE id = ?1",
            params![
                entity.id.as_str(),
                serde_json::to_string(&entity.observations).unwrap_or_default(),
                entity.embedding_text(),
            ],
        )
        .map_err(|e| Error::Backend {
            operation: "update_entity_observations".to_string(),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    fn row_to_relation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Relation> {
        let metadata_json: String = row.get(5)?;
        Ok(Relation {
            id: RelationId::from_raw(row.get::<_, String>(0)?),
            source_id: EntityId::from_raw(row.get::<_, String>(1)?),
            target_id: EntityId::from_raw(row.get::<_, String>(2)?),
            relation_type: row.get(3)?,
            confidence: row.get(4)?,
            metadata: serde_json::from_str(&metadata_json).unwrap_or(serde_json::Value::Null),
            created_at: row.get::<_, i64>(6)? as u64,
        })
    }

    fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
        let kind_label: String = row.get(1)?;
        let document_id: Option<String> = row.get(2)?;
        let chunk_index: Option<i64> = row.get(3)?;
        let entity_id: Option<String> = row.get(4)?;
        let relationship_id: Option<String> = row.get(5)?;
        let metadata_json: String = row.get(9)?;

        let kind = match kind_label.as_str() {
            "entity" => ChunkKind::Entity {
                entity_id: EntityId::from_raw(entity_id.unwrap_or_default()),
            },
            "relationship" => ChunkKind::Relationship {
                relationship_id: RelationId::from_raw(relationship_id.unwrap_or_default()),
            },
            _ => ChunkKind::Document {
                document_id: document_id.unwrap_or_default(),
                chunk_index: chunk_index.unwrap_or(0) as usize,
            },
        };

        Ok(Chunk {
            chunk_id: row.get(0)?,
            kind,
            text: row.get(6)?,
            start_pos: row.get::<_, i64>(7)? as usize,
            end_pos: row.get::<_, i64>(8)? as usize,
            metadata: serde_json::from_str(&metadata_json).unwrap_or(serde_json::Value::Null),
            created_at: row.get::<_, i64>(10)? as u64,
        })
    }

    const CHUNK_COLUMNS: &'static str = "chunk_id, kind, document_id, chunk_index, entity_id, \
         relationship_id, text, start_pos, end_pos, metadata, created_at";

    fn insert_chunk_row(conn: &Connection, chunk: &Chunk) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO chunks (chunk_id, kind, document_id, chunk_index, entity_id, relationship_id, text, start_pos, end_pos, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                chunk.chunk_id,
                chunk.kind.label(),
                chunk.kind.document_id(),
                chunk.kind.chunk_index().map(|i| i as i64),
                chunk.kind.entity_id().map(EntityId::as_str),
                chunk.kind.relationship_id().map(RelationId::as_str),
                chunk.text,
                chunk.start_pos as i64,
                chunk.end_pos as i64,
                chunk.metadata.to_string(),
                chunk.created_at as i64,
            ],
        )
        .map_err(|e| Error::Backend {
            operation: "insert_chunk".to_string(),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
        vector.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
        blob.chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    fn store_vector_row(conn: &Connection, table: &str, key_col: &str, key: &str, vector: &[f32]) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {table} ({key_col}, vector) VALUES (?1, ?2)"
            ),
            params![key, Self::vector_to_blob(vector)],
        )
        .map_err(|e| Error::Backend {
            operation: format!("store_vector_{table}"),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    /// Deletes a document's chunks, their vectors, and their links. Used by
    /// both `chunkDocument` (idempotent re-chunk) and the document delete
    /// cascade.
    fn delete_document_chunks(conn: &Connection, document_id: &str) -> Result<()> {
        let chunk_ids: Vec<String> = conn
            .prepare("SELECT chunk_id FROM chunks WHERE document_id = ?1")
            .and_then(|mut stmt| {
                stmt.query_map(params![document_id], |r| r.get(0))
                    .and_then(Iterator::collect)
            })
            .map_err(|e| Error::Backend {
                operation: "list_document_chunk_ids".to_string(),
                cause: e.to_string(),
            })?;

        for chunk_id in &chunk_ids {
            conn.execute("DELETE FROM chunk_vectors WHERE chunk_id = ?1", params![chunk_id])
                .ok();
            conn.execute("DELETE FROM chunk_entity_links WHERE chunk_id = ?1", params![chunk_id])
                .ok();
        }
        conn.execute("DELETE FROM chunks WHERE document_id = ?1", params![document_id])
            .map_err(|e| Error::Backend {
                operation: "delete_document_chunks".to_string(),
                cause: e.to_string(),
            })?;
        Ok(())
    }

    fn delete_entity_cascade(conn: &Connection, entity: &Entity) -> Result<()> {
        let entity_chunk_id = Chunk::entity_chunk_id(&entity.id);
        conn.execute("DELETE FROM entity_vectors WHERE entity_id = ?1", params![entity.id.as_str()]).ok();
        conn.execute("DELETE FROM chunk_vectors WHERE chunk_id = ?1", params![entity_chunk_id]).ok();
        conn.execute("DELETE FROM chunks WHERE chunk_id = ?1", params![entity_chunk_id]).ok();
        conn.execute(
            "DELETE FROM chunk_entity_links WHERE entity_id = ?1",
            params![entity.id.as_str()],
        )
        .ok();

        let touching: Vec<(String, String, String)> = conn
            .prepare("SELECT id, source_id, target_id FROM relations WHERE source_id = ?1 OR target_id = ?1")
            .and_then(|mut stmt| {
                stmt.query_map(params![entity.id.as_str()], |r| {
                    Ok((r.get(0)?, r.get(1)?, r.get(2)?))
                })
                .and_then(Iterator::collect)
            })
            .map_err(|e| Error::Backend {
                operation: "list_touching_relations".to_string(),
                cause: e.to_string(),
            })?;

        for (rel_id, _src, _dst) in &touching {
            let rel_chunk_id = format!("kg_relationship_{rel_id}");
            conn.execute("DELETE FROM chunk_vectors WHERE chunk_id = ?1", params![rel_chunk_id]).ok();
            conn.execute("DELETE FROM chunks WHERE chunk_id = ?1", params![rel_chunk_id]).ok();
            conn.execute("DELETE FROM relations WHERE id = ?1", params![rel_id]).ok();
        }

        conn.execute("DELETE FROM entities WHERE id = ?1", params![entity.id.as_str()])
            .map_err(|e| Error::Backend {
                operation: "delete_entity".to_string(),
                cause: e.to_string(),
            })?;
        Ok(())
    }

    fn insert_relation_row(conn: &Connection, relation: &Relation) -> Result<()> {
        conn.execute(
            "INSERT INTO relations (id, source_id, target_id, relation_type, confidence, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                relation.id.as_str(),
                relation.source_id.as_str(),
                relation.target_id.as_str(),
                relation.relation_type,
                relation.confidence,
                relation.metadata.to_string(),
                relation.created_at as i64,
            ],
        )
        .map_err(|e| Error::Backend {
            operation: "insert_relation".to_string(),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    fn relation_exists(conn: &Connection, id: &RelationId) -> Result<bool> {
        conn.query_row(
            "SELECT 1 FROM relations WHERE id = ?1",
            params![id.as_str()],
            |_| Ok(true),
        )
        .optional()
        .map_err(|e| Error::Backend {
            operation: "relation_exists".to_string(),
            cause: e.to_string(),
        })
        .map(|v| v.unwrap_or(false))
    }

    /// Ensures an entity named `name` exists, creating a `CONCEPT`
    /// placeholder if not (Open Question (b): uniform across backends —
    /// see DESIGN.md). Returns the resolved entity and whether it was
    /// newly inserted by this call.
    fn ensure_entity(conn: &Connection, name: &str) -> Result<(Entity, bool)> {
        if let Some(existing) = Self::fetch_entity_by_name(conn, name)? {
            return Ok((existing, false));
        }
        let placeholder = Entity::new(name, "CONCEPT", Vec::new());
        Self::insert_entity_row(conn, &placeholder)?;
        Ok((placeholder, true))
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Embedded
    }

    #[instrument(skip(self, entities), fields(backend = "sqlite", count = entities.len()))]
    async fn create_entities(&self, entities: &[NewEntity]) -> Result<BatchResult<Entity>> {
        let mut result = BatchResult::new();
        let embeds: Vec<EntityId>;
        {
            let conn = self.lock();
            let mut created_ids = Vec::new();
            for new_entity in entities {
                let entity_type = if new_entity.entity_type.trim().is_empty() {
                    crate::models::DEFAULT_ENTITY_TYPE
                } else {
                    new_entity.entity_type.as_str()
                };
                let entity = Entity::new(&new_entity.name, entity_type, new_entity.observations.clone());
                if Self::fetch_entity_by_id(&conn, &entity.id)?.is_some() {
                    continue;
                }
                match Self::insert_entity_row(&conn, &entity) {
                    Ok(()) => {
                        created_ids.push(entity.id.clone());
                        result.push_success(entity);
                    },
                    Err(e) => result.push_error(new_entity.name.clone(), e),
                }
            }
            embeds = created_ids;
        }
        for id in embeds {
            if let Err(e) = self.embed_entity(&id).await {
                tracing::warn!(entity_id = %id, error = %e, "embed_entity failed after create");
            }
        }
        Ok(result)
    }

    #[instrument(skip(self, updates), fields(backend = "sqlite", count = updates.len()))]
    async fn add_observations(
        &self,
        updates: &[(String, Vec<String>)],
    ) -> Result<BatchResult<(String, Vec<String>)>> {
        let mut result = BatchResult::new();
        let mut to_embed = Vec::new();
        {
            let conn = self.lock();
            for (name, contents) in updates {
                match Self::fetch_entity_by_name(&conn, name)? {
                    None => result.push_error(name.clone(), "entity not found"),
                    Some(mut entity) => {
                        let added = entity.add_observations(contents);
                        if !added.is_empty() {
                            Self::update_entity_observations(&conn, &entity)?;
                            to_embed.push(entity.id.clone());
                        }
                        result.push_success((name.clone(), added));
                    },
                }
            }
        }
        for id in to_embed {
            if let Err(e) = self.embed_entity(&id).await {
                tracing::warn!(entity_id = %id, error = %e, "re-embed after add_observations failed");
            }
        }
        Ok(result)
    }

    #[instrument(skip(self, deletions), fields(backend = "sqlite"))]
    async fn delete_observations(&self, deletions: &[(String, Vec<String>)]) -> Result<()> {
        let conn = self.lock();
        for (name, contents) in deletions {
            if let Some(mut entity) = Self::fetch_entity_by_name(&conn, name)? {
                entity.remove_observations(contents);
                Self::update_entity_observations(&conn, &entity)?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self, relations), fields(backend = "sqlite", count = relations.len()))]
    async fn create_relations(&self, relations: &[RelationTriple]) -> Result<BatchResult<Relation>> {
        let mut result = BatchResult::new();
        let mut to_embed = Vec::new();
        {
            let conn = self.lock();
            for triple in relations {
                let (source, source_created) = match Self::ensure_entity(&conn, &triple.from) {
                    Ok(e) => e,
                    Err(e) => {
                        result.push_error(triple.from.clone(), e);
                        continue;
                    },
                };
                let (target, target_created) = match Self::ensure_entity(&conn, &triple.to) {
                    Ok(e) => e,
                    Err(e) => {
                        result.push_error(triple.to.clone(), e);
                        continue;
                    },
                };
                if source_created {
                    to_embed.push(source.id.clone());
                }
                if target_created {
                    to_embed.push(target.id.clone());
                }
                let relation = Relation::new(source.id, target.id, triple.relation_type.clone());
                match Self::relation_exists(&conn, &relation.id) {
                    Ok(true) => {},
                    Ok(false) => match Self::insert_relation_row(&conn, &relation) {
                        Ok(()) => result.push_success(relation),
                        Err(e) => result.push_error(relation.id.to_string(), e),
                    },
                    Err(e) => result.push_error(relation.id.to_string(), e),
                }
            }
        }
        for id in to_embed {
            if let Err(e) = self.embed_entity(&id).await {
                tracing::warn!(entity_id = %id, error = %e, "embed_entity failed for auto-created relation endpoint");
            }
        }
        Ok(result)
    }

    #[instrument(skip(self, relations), fields(backend = "sqlite"))]
    async fn delete_relations(&self, relations: &[RelationTriple]) -> Result<usize> {
        let conn = self.lock();
        let mut removed = 0usize;
        for triple in relations {
            let id = super::relation_id_for(&triple.from, &triple.relation_type, &triple.to);
            let rel_chunk_id = Chunk::relationship_chunk_id(&id);
            conn.execute("DELETE FROM chunk_vectors WHERE chunk_id = ?1", params![rel_chunk_id]).ok();
            conn.execute("DELETE FROM chunks WHERE chunk_id = ?1", params![rel_chunk_id]).ok();
            let n = conn
                .execute("DELETE FROM relations WHERE id = ?1", params![id.as_str()])
                .map_err(|e| Error::Backend {
                    operation: "delete_relation".to_string(),
                    cause: e.to_string(),
                })?;
            removed += n;
        }
        Ok(removed)
    }

    #[instrument(skip(self, names), fields(backend = "sqlite", count = names.len()))]
    async fn delete_entities(&self, names: &[String]) -> Result<BatchResult<String>> {
        let conn = self.lock();
        let mut result = BatchResult::new();
        for name in names {
            match Self::fetch_entity_by_name(&conn, name)? {
                None => result.push_error(name.clone(), "entity not found"),
                Some(entity) => match Self::delete_entity_cascade(&conn, &entity) {
                    Ok(()) => result.push_success(name.clone()),
                    Err(e) => result.push_error(name.clone(), e),
                },
            }
        }
        Ok(result)
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn read_graph(&self) -> Result<(Vec<Entity>, Vec<Relation>)> {
        let conn = self.lock();
        let entities = Self::list_entities(&conn)?;
        let relations = Self::list_relations(&conn)?;
        Ok((entities, relations))
    }

    #[instrument(skip(self, names), fields(backend = "sqlite"))]
    async fn open_nodes(&self, names: &[String]) -> Result<(Vec<Entity>, Vec<Relation>)> {
        let conn = self.lock();
        let mut entities = Vec::new();
        for name in names {
            if let Some(e) = Self::fetch_entity_by_name(&conn, name)? {
                entities.push(e);
            }
        }
        let ids: std::collections::HashSet<&str> =
            entities.iter().map(|e| e.id.as_str()).collect();
        let all_relations = Self::list_relations(&conn)?;
        let relations = all_relations
            .into_iter()
            .filter(|r| ids.contains(r.source_id.as_str()) && ids.contains(r.target_id.as_str()))
            .collect();
        Ok((entities, relations))
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn get_entity(&self, name: &str) -> Result<Option<Entity>> {
        let conn = self.lock();
        Self::fetch_entity_by_name(&conn, name)
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn neighbors(&self, name: &str) -> Result<Vec<String>> {
        let conn = self.lock();
        let Some(entity) = Self::fetch_entity_by_name(&conn, name)? else {
            return Ok(Vec::new());
        };
        let relations = Self::list_relations(&conn)?;
        let mut names = Vec::new();
        for r in relations {
            if r.source_id == entity.id
                && let Some(other) = Self::fetch_entity_by_id(&conn, &r.target_id)?
            {
                names.push(other.name);
            } else if r.target_id == entity.id
                && let Some(other) = Self::fetch_entity_by_id(&conn, &r.source_id)?
            {
                names.push(other.name);
            }
        }
        Ok(names)
    }

    #[instrument(skip(self, document), fields(backend = "sqlite", document.id = %document.id))]
    async fn store_document(&self, document: &Document) -> Result<()> {
        let conn = self.lock();
        Self::delete_document_chunks(&conn, &document.id)?;
        conn.execute("DELETE FROM documents WHERE id = ?1", params![document.id]).ok();
        conn.execute(
            "INSERT INTO documents (id, content, metadata, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                document.id,
                document.content,
                document.metadata.to_string(),
                document.created_at as i64,
            ],
        )
        .map_err(|e| Error::Backend {
            operation: "store_document".to_string(),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT id, content, metadata, created_at FROM documents WHERE id = ?1",
            params![id],
            Self::row_to_document,
        )
        .optional()
        .map_err(|e| Error::Backend {
            operation: "get_document".to_string(),
            cause: e.to_string(),
        })
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn list_documents(&self, _include_metadata: bool) -> Result<Vec<Document>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT id, content, metadata, created_at FROM documents ORDER BY created_at DESC")
            .map_err(|e| Error::Backend {
                operation: "prepare_list_documents".to_string(),
                cause: e.to_string(),
            })?;
        let docs = stmt
            .query_map([], Self::row_to_document)
            .map_err(|e| Error::Backend {
                operation: "list_documents".to_string(),
                cause: e.to_string(),
            })?
            .filter_map(std::result::Result::ok)
            .collect();
        Ok(docs)
    }

    #[instrument(skip(self, ids), fields(backend = "sqlite", count = ids.len()))]
    async fn delete_documents(&self, ids: &[String]) -> Result<BatchResult<String>> {
        let conn = self.lock();
        let mut result = BatchResult::new();
        for id in ids {
            let exists = conn
                .query_row("SELECT 1 FROM documents WHERE id = ?1", params![id], |_| Ok(true))
                .optional()
                .map_err(|e| Error::Backend {
                    operation: "document_exists".to_string(),
                    cause: e.to_string(),
                })?
                .unwrap_or(false);
            if !exists {
                result.push_error(id.clone(), "document not found");
                continue;
            }
            match Self::delete_document_chunks(&conn, id)
                .and_then(|()| {
                    conn.execute("DELETE FROM documents WHERE id = ?1", params![id])
                        .map_err(|e| Error::Backend {
                            operation: "delete_document".to_string(),
                            cause: e.to_string(),
                        })
                })
            {
                Ok(_) => result.push_success(id.clone()),
                Err(e) => result.push_error(id.clone(), e),
            }
        }
        Ok(result)
    }

    #[instrument(skip(self), fields(backend = "sqlite", document_id = %document_id))]
    async fn chunk_document(&self, document_id: &str, options: ChunkOptions) -> Result<usize> {
        let content = {
            let conn = self.lock();
            let doc = conn
                .query_row(
                    "SELECT id, content, metadata, created_at FROM documents WHERE id = ?1",
                    params![document_id],
                    Self::row_to_document,
                )
                .optional()
                .map_err(|e| Error::Backend {
                    operation: "get_document_for_chunk".to_string(),
                    cause: e.to_string(),
                })?;
            let Some(doc) = doc else {
                return Err(Error::NotFound(format!("document {document_id}")));
            };
            doc.content
        };

        let chunks = self.chunker.chunk(document_id, &content, options);
        let conn = self.lock();
        Self::delete_document_chunks(&conn, document_id)?;
        for chunk in &chunks {
            Self::insert_chunk_row(&conn, chunk)?;
        }
        Ok(chunks.len())
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn get_document_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM chunks WHERE document_id = ?1 ORDER BY chunk_index ASC",
                Self::CHUNK_COLUMNS
            ))
            .map_err(|e| Error::Backend {
                operation: "prepare_document_chunks".to_string(),
                cause: e.to_string(),
            })?;
        let chunks = stmt
            .query_map(params![document_id], Self::row_to_chunk)
            .map_err(|e| Error::Backend {
                operation: "document_chunks".to_string(),
                cause: e.to_string(),
            })?
            .filter_map(std::result::Result::ok)
            .collect();
        Ok(chunks)
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn get_chunk(&self, chunk_id: &str) -> Result<Option<Chunk>> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {} FROM chunks WHERE chunk_id = ?1", Self::CHUNK_COLUMNS),
            params![chunk_id],
            Self::row_to_chunk,
        )
        .optional()
        .map_err(|e| Error::Backend {
            operation: "get_chunk".to_string(),
            cause: e.to_string(),
        })
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn chunk_neighbors(
        &self,
        document_id: &str,
        chunk_index: usize,
    ) -> Result<(Option<Chunk>, Option<Chunk>)> {
        let conn = self.lock();
        let before = if chunk_index == 0 {
            None
        } else {
            conn.query_row(
                &format!(
                    "SELECT {} FROM chunks WHERE document_id = ?1 AND chunk_index = ?2",
                    Self::CHUNK_COLUMNS
                ),
                params![document_id, (chunk_index - 1) as i64],
                Self::row_to_chunk,
            )
            .optional()
            .map_err(|e| Error::Backend {
                operation: "chunk_before".to_string(),
                cause: e.to_string(),
            })?
        };
        let after = conn
            .query_row(
                &format!(
                    "SELECT {} FROM chunks WHERE document_id = ?1 AND chunk_index = ?2",
                    Self::CHUNK_COLUMNS
                ),
                params![document_id, (chunk_index + 1) as i64],
                Self::row_to_chunk,
            )
            .optional()
            .map_err(|e| Error::Backend {
                operation: "chunk_after".to_string(),
                cause: e.to_string(),
            })?;
        Ok((before, after))
    }

    #[instrument(skip(self), fields(backend = "sqlite", document_id = %document_id))]
    async fn embed_chunks(&self, document_id: &str) -> Result<usize> {
        let pending: Vec<(String, String)> = {
            let conn = self.lock();
            let mut stmt = conn
                .prepare(
                    "SELECT c.chunk_id, c.text FROM chunks c
                     LEFT JOIN chunk_vectors v ON v.chunk_id = c.chunk_id
                     WHERE c.document_id = ?1 AND v.chunk_id IS NULL",
                )
                .map_err(|e| Error::Backend {
                    operation: "prepare_pending_chunks".to_string(),
                    cause: e.to_string(),
                })?;
            stmt.query_map(params![document_id], |r| Ok((r.get(0)?, r.get(1)?)))
                .map_err(|e| Error::Backend {
                    operation: "pending_chunks".to_string(),
                    cause: e.to_string(),
                })?
                .filter_map(std::result::Result::ok)
                .collect()
        };

        let mut embedded = 0usize;
        for (chunk_id, text) in pending {
            let vector = self.embedder.embed(&text)?;
            let conn = self.lock();
            Self::store_vector_row(&conn, "chunk_vectors", "chunk_id", &chunk_id, &vector)?;
            embedded += 1;
        }
        Ok(embedded)
    }

    #[instrument(skip(self), fields(backend = "sqlite", entity_id = %entity_id))]
    async fn embed_entity(&self, entity_id: &EntityId) -> Result<()> {
        let entity = {
            let conn = self.lock();
            Self::fetch_entity_by_id(&conn, entity_id)?
        };
        let Some(entity) = entity else {
            return Err(Error::NotFound(format!("entity {entity_id}")));
        };
        let vector = self.embedder.embed(&entity.embedding_text())?;
        let conn = self.lock();
        Self::store_vector_row(&conn, "entity_vectors", "entity_id", entity_id.as_str(), &vector)?;
        Ok(())
    }

    #[instrument(skip(self, entity_names), fields(backend = "sqlite", document_id = %document_id))]
    async fn link_entities_to_document(
        &self,
        document_id: &str,
        entity_names: &[String],
    ) -> Result<usize> {
        let conn = self.lock();
        let chunk_ids: Vec<String> = conn
            .prepare("SELECT chunk_id FROM chunks WHERE document_id = ?1")
            .and_then(|mut stmt| {
                stmt.query_map(params![document_id], |r| r.get(0))
                    .and_then(Iterator::collect)
            })
            .map_err(|e| Error::Backend {
                operation: "list_chunk_ids_for_link".to_string(),
                cause: e.to_string(),
            })?;

        let mut touched = 0usize;
        for name in entity_names {
            let (entity, _created) = Self::ensure_entity(&conn, name)?;
            for chunk_id in &chunk_ids {
                let n = conn
                    .execute(
                        "INSERT OR IGNORE INTO chunk_entity_links (chunk_id, entity_id) VALUES (?1, ?2)",
                        params![chunk_id, entity.id.as_str()],
                    )
                    .map_err(|e| Error::Backend {
                        operation: "link_entity_to_chunk".to_string(),
                        cause: e.to_string(),
                    })?;
                touched += n;
            }
        }
        Ok(touched)
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn entities_for_chunk(&self, chunk_id: &str) -> Result<Vec<Entity>> {
        let conn = self.lock();
        let Some(chunk) = conn
            .query_row(
                &format!("SELECT {} FROM chunks WHERE chunk_id = ?1", Self::CHUNK_COLUMNS),
                params![chunk_id],
                Self::row_to_chunk,
            )
            .optional()
            .map_err(|e| Error::Backend {
                operation: "get_chunk_for_entities".to_string(),
                cause: e.to_string(),
            })?
        else {
            return Ok(Vec::new());
        };

        match &chunk.kind {
            ChunkKind::Entity { entity_id } => {
                Ok(Self::fetch_entity_by_id(&conn, entity_id)?.into_iter().collect())
            },
            ChunkKind::Relationship { relationship_id } => {
                let Some(relation) = conn
                    .query_row(
                        "SELECT id, source_id, target_id, relation_type, confidence, metadata, created_at \
                         FROM relations WHERE id = ?1",
                        params![relationship_id.as_str()],
                        Self::row_to_relation,
                    )
                    .optional()
                    .map_err(|e| Error::Backend {
                        operation: "get_relation_for_entities".to_string(),
                        cause: e.to_string(),
                    })?
                else {
                    return Ok(Vec::new());
                };
                let mut out = Vec::new();
                if let Some(e) = Self::fetch_entity_by_id(&conn, &relation.source_id)? {
                    out.push(e);
                }
                if let Some(e) = Self::fetch_entity_by_id(&conn, &relation.target_id)? {
                    out.push(e);
                }
                Ok(out)
            },
            ChunkKind::Document { .. } => {
                let mut stmt = conn
                    .prepare(
                        "SELECT e.id, e.name, e.entity_type, e.observations, e.mentions, e.metadata, e.embedding_text, e.created_at
                         FROM chunk_entity_links l JOIN entities e ON e.id = l.entity_id
                         WHERE l.chunk_id = ?1",
                    )
                    .map_err(|e| Error::Backend {
                        operation: "prepare_entities_for_chunk".to_string(),
                        cause: e.to_string(),
                    })?;
                let entities = stmt
                    .query_map(params![chunk_id], Self::row_to_entity)
                    .map_err(|e| Error::Backend {
                        operation: "entities_for_chunk".to_string(),
                        cause: e.to_string(),
                    })?
                    .filter_map(std::result::Result::ok)
                    .collect();
                Ok(entities)
            },
        }
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn chunk_context(&self, chunk_id: &str) -> Result<Option<(Chunk, Option<String>)>> {
        let conn = self.lock();
        let Some(chunk) = conn
            .query_row(
                &format!("SELECT {} FROM chunks WHERE chunk_id = ?1", Self::CHUNK_COLUMNS),
                params![chunk_id],
                Self::row_to_chunk,
            )
            .optional()
            .map_err(|e| Error::Backend {
                operation: "get_chunk_context".to_string(),
                cause: e.to_string(),
            })?
        else {
            return Ok(None);
        };
        let title = match chunk.kind.document_id() {
            Some(document_id) => conn
                .query_row(
                    "SELECT metadata FROM documents WHERE id = ?1",
                    params![document_id],
                    |r| r.get::<_, String>(0),
                )
                .optional()
                .ok()
                .flatten()
                .and_then(|m| serde_json::from_str::<serde_json::Value>(&m).ok())
                .and_then(|v| v.get("title").and_then(|t| t.as_str()).map(str::to_string))
                .or_else(|| Some(document_id.to_string())),
            None => None,
        };
        Ok(Some((chunk, title)))
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn generate_knowledge_graph_chunks(&self) -> Result<usize> {
        let conn = self.lock();

        let graph_chunk_ids: Vec<String> = conn
            .prepare("SELECT chunk_id FROM chunks WHERE kind IN ('entity', 'relationship')")
            .and_then(|mut stmt| stmt.query_map([], |r| r.get(0)).and_then(Iterator::collect))
            .map_err(|e| Error::Backend {
                operation: "list_graph_chunk_ids".to_string(),
                cause: e.to_string(),
            })?;
        for id in &graph_chunk_ids {
            conn.execute("DELETE FROM chunk_vectors WHERE chunk_id = ?1", params![id]).ok();
        }
        conn.execute("DELETE FROM chunks WHERE kind IN ('entity', 'relationship')", [])
            .map_err(|e| Error::Backend {
                operation: "delete_graph_chunks".to_string(),
                cause: e.to_string(),
            })?;

        let entities = Self::list_entities(&conn)?;
        let mut created = 0usize;
        for entity in &entities {
            let chunk = Chunk::new_entity(entity.id.clone(), entity.graph_chunk_text());
            Self::insert_chunk_row(&conn, &chunk)?;
            created += 1;
        }

        let relations = Self::list_relations(&conn)?;
        for relation in &relations {
            let source_name = Self::fetch_entity_by_id(&conn, &relation.source_id)?
                .map_or_else(|| relation.source_id.to_string(), |e| e.name);
            let target_name = Self::fetch_entity_by_id(&conn, &relation.target_id)?
                .map_or_else(|| relation.target_id.to_string(), |e| e.name);
            let text = Relation::render_text(&source_name, &relation.relation_type, &target_name);
            let chunk = Chunk::new_relationship(relation.id.clone(), text);
            Self::insert_chunk_row(&conn, &chunk)?;
            created += 1;
        }

        Ok(created)
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn embed_knowledge_graph_chunks(&self) -> Result<usize> {
        let chunks: Vec<(String, String)> = {
            let conn = self.lock();
            let mut stmt = conn
                .prepare("SELECT chunk_id, text FROM chunks WHERE kind IN ('entity', 'relationship')")
                .map_err(|e| Error::Backend {
                    operation: "prepare_graph_chunks".to_string(),
                    cause: e.to_string(),
                })?;
            stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
                .map_err(|e| Error::Backend {
                    operation: "graph_chunks".to_string(),
                    cause: e.to_string(),
                })?
                .filter_map(std::result::Result::ok)
                .collect()
        };

        let mut embedded = 0usize;
        for (chunk_id, text) in chunks {
            let vector = self.embedder.embed(&text)?;
            let conn = self.lock();
            Self::store_vector_row(&conn, "chunk_vectors", "chunk_id", &chunk_id, &vector)?;
            embedded += 1;
        }
        Ok(embedded)
    }

    #[instrument(skip(self, query_vector), fields(backend = "sqlite", limit = limit))]
    async fn search_chunks(&self, query_vector: &[f32], limit: usize) -> Result<Vec<VectorMatch>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT c.{cols_without_prefix}, v.vector FROM chunks c JOIN chunk_vectors v ON v.chunk_id = c.chunk_id",
                cols_without_prefix = Self::CHUNK_COLUMNS.replace(", ", ", c."),
            ))
            .map_err(|e| Error::Backend {
                operation: "prepare_search_chunks".to_string(),
                cause: e.to_string(),
            })?;
        let entries: Vec<(Chunk, Vec<f32>)> = stmt
            .query_map([], |row| {
                let chunk = Self::row_to_chunk(row)?;
                let blob: Vec<u8> = row.get(11)?;
                Ok((chunk, Self::blob_to_vector(&blob)))
            })
            .map_err(|e| Error::Backend {
                operation: "search_chunks".to_string(),
                cause: e.to_string(),
            })?
            .filter_map(std::result::Result::ok)
            .collect();

        let index = BruteForceIndex::new(entries);
        Ok(index.search(query_vector, limit))
    }

    #[instrument(skip(self, query_vector), fields(backend = "sqlite", limit = limit))]
    async fn search_entities(&self, query_vector: &[f32], limit: usize) -> Result<Vec<(Entity, f32)>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT e.{cols}, v.vector FROM entities e JOIN entity_vectors v ON v.entity_id = e.id",
                cols = Self::ENTITY_COLUMNS.replace(", ", ", e."),
            ))
            .map_err(|e| Error::Backend {
                operation: "prepare_search_entities".to_string(),
                cause: e.to_string(),
            })?;
        let mut entries: Vec<(Entity, f32)> = stmt
            .query_map([], |row| {
                let entity = Self::row_to_entity(row)?;
                let blob: Vec<u8> = row.get(8)?;
                let vector = Self::blob_to_vector(&blob);
                Ok((entity, vector))
            })
            .map_err(|e| Error::Backend {
                operation: "search_entities".to_string(),
                cause: e.to_string(),
            })?
            .filter_map(std::result::Result::ok)
            .map(|(e, v)| {
                let d = crate::embedding::cosine_distance(query_vector, &v);
                (e, d)
            })
            .collect();
        entries.sort_by(|a, b| a.1.total_cmp(&b.1));
        entries.truncate(limit);
        Ok(entries)
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn stats(&self) -> Result<KnowledgeGraphStats> {
        let conn = self.lock();
        let total_entities: i64 = conn
            .query_row("SELECT COUNT(*) FROM entities", [], |r| r.get(0))
            .unwrap_or(0);
        let total_relations: i64 = conn
            .query_row("SELECT COUNT(*) FROM relations", [], |r| r.get(0))
            .unwrap_or(0);
        let total_documents: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))
            .unwrap_or(0);
        let total_chunks: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0))
            .unwrap_or(0);

        let entities_by_type = Self::group_counts(&conn, "entities", "entity_type")?;
        let relations_by_type = Self::group_counts(&conn, "relations", "relation_type")?;

        Ok(KnowledgeGraphStats {
            total_entities: total_entities as u64,
            total_relations: total_relations as u64,
            total_documents: total_documents as u64,
            total_chunks: total_chunks as u64,
            entities_by_type,
            relations_by_type,
        })
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn all_document_ids(&self) -> Result<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT id FROM documents")
            .map_err(|e| Error::Backend {
                operation: "prepare_all_document_ids".to_string(),
                cause: e.to_string(),
            })?;
        let ids = stmt
            .query_map([], |r| r.get(0))
            .map_err(|e| Error::Backend {
                operation: "all_document_ids".to_string(),
                cause: e.to_string(),
            })?
            .filter_map(std::result::Result::ok)
            .collect();
        Ok(ids)
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn all_entity_ids(&self) -> Result<Vec<EntityId>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT id FROM entities")
            .map_err(|e| Error::Backend {
                operation: "prepare_all_entity_ids".to_string(),
                cause: e.to_string(),
            })?;
        let ids = stmt
            .query_map([], |r| r.get::<_, String>(0))
            .map_err(|e| Error::Backend {
                operation: "all_entity_ids".to_string(),
                cause: e.to_string(),
            })?
            .filter_map(std::result::Result::ok)
            .map(EntityId::from_raw)
            .collect();
        Ok(ids)
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn ensure_migrations_table(&self) -> Result<()> {
        // Already created by `initialize`; kept as an explicit, idempotent
        // operation so the migration manager can call it on any backend.
        let conn = self.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at INTEGER NOT NULL
            )",
        )
        .map_err(|e| Error::Backend {
            operation: "ensure_migrations_table".to_string(),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn applied_migration_versions(&self) -> Result<Vec<i32>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT version FROM schema_migrations ORDER BY version ASC")
            .map_err(|e| Error::Backend {
                operation: "prepare_applied_migrations".to_string(),
                cause: e.to_string(),
            })?;
        let versions = stmt
            .query_map([], |r| r.get(0))
            .map_err(|e| Error::Backend {
                operation: "applied_migrations".to_string(),
                cause: e.to_string(),
            })?
            .filter_map(std::result::Result::ok)
            .collect();
        Ok(versions)
    }

    #[instrument(skip(self), fields(backend = "sqlite", version = version))]
    async fn record_migration(&self, version: i32, description: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            params![version, description, crate::current_timestamp() as i64],
        )
        .map_err(|e| Error::Backend {
            operation: "record_migration".to_string(),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "sqlite", version = version))]
    async fn remove_migration_row(&self, version: i32) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM schema_migrations WHERE version = ?1", params![version])
            .map_err(|e| Error::Backend {
                operation: "remove_migration_row".to_string(),
                cause: e.to_string(),
            })?;
        Ok(())
    }
}

impl SqliteStorage {
    fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
        let metadata_json: String = row.get(2)?;
        Ok(Document {
            id: row.get(0)?,
            content: row.get(1)?,
            metadata: serde_json::from_str(&metadata_json).unwrap_or(serde_json::Value::Null),
            created_at: row.get::<_, i64>(3)? as u64,
        })
    }

    fn list_entities(conn: &Connection) -> Result<Vec<Entity>> {
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM entities", Self::ENTITY_COLUMNS))
            .map_err(|e| Error::Backend {
                operation: "prepare_list_entities".to_string(),
                cause: e.to_string(),
            })?;
        let entities = stmt
            .query_map([], Self::row_to_entity)
            .map_err(|e| Error::Backend {
                operation: "list_entities".to_string(),
                cause: e.to_string(),
            })?
            .filter_map(std::result::Result::ok)
            .collect();
        Ok(entities)
    }

    fn list_relations(conn: &Connection) -> Result<Vec<Relation>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, source_id, target_id, relation_type, confidence, metadata, created_at FROM relations",
            )
            .map_err(|e| Error::Backend {
                operation: "prepare_list_relations".to_string(),
                cause: e.to_string(),
            })?;
        let relations = stmt
            .query_map([], Self::row_to_relation)
            .map_err(|e| Error::Backend {
                operation: "list_relations".to_string(),
                cause: e.to_string(),
            })?
            .filter_map(std::result::Result::ok)
            .collect();
        Ok(relations)
    }

    fn group_counts(conn: &Connection, table: &str, column: &str) -> Result<Vec<TypeCount>> {
        let sql = format!("SELECT {column}, COUNT(*) FROM {table} GROUP BY {column}");
        let mut stmt = conn.prepare(&sql).map_err(|e| Error::Backend {
            operation: format!("prepare_group_counts_{table}"),
            cause: e.to_string(),
        })?;
        let counts = stmt
            .query_map([], |row| {
                Ok(TypeCount {
                    type_name: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })
            .map_err(|e| Error::Backend {
                operation: format!("group_counts_{table}"),
                cause: e.to_string(),
            })?
            .filter_map(std::result::Result::ok)
            .collect();
        Ok(counts)
    }
}
