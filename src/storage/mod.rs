//! The storage-backend abstraction (spec §4.1) and the schema-migration
//! manager that keeps its two implementations in lockstep (spec §4.2).
//!
//! [`StorageAdapter`] is the one interface both backends implement
//! (REDESIGN FLAGS §9, "duck-typed adapter → interface abstraction"): the
//! Coordinator and the Graph Store depend only on `Arc<dyn StorageAdapter>`,
//! never on `SqliteStorage`/`PostgresStorage` directly.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::significant_drop_tightening)]

mod migrations;
pub mod sqlite;
mod vector_index;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use migrations::{default_migrations, Migration, MigrationManager, MigrationStatus};
pub use sqlite::SqliteStorage;
pub use vector_index::{BruteForceIndex, VectorIndex, VectorMatch};

#[cfg(feature = "postgres")]
pub use postgres::PostgresStorage;

use crate::models::{
    BatchResult, Chunk, Document, Entity, EntityId, KnowledgeGraphStats, Relation, RelationId,
};
use crate::{chunker::ChunkOptions, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which concrete backend a [`StorageAdapter`] is running (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Embedded, single-file engine with an in-process vector index.
    Embedded,
    /// Client-server relational engine with a vector extension and pool.
    Server,
}

/// A caller-supplied entity to insert (`createEntities` input row).
#[derive(Debug, Clone)]
pub struct NewEntity {
    /// Entity name (globally unique).
    pub name: String,
    /// Entity type (defaults to `CONCEPT` if empty).
    pub entity_type: String,
    /// Observation strings to seed the entity with.
    pub observations: Vec<String>,
}

/// A caller-supplied relation endpoint triple (`createRelations`/
/// `deleteRelations` input row).
#[derive(Debug, Clone)]
pub struct RelationTriple {
    /// Source entity name.
    pub from: String,
    /// Target entity name.
    pub to: String,
    /// Relation type.
    pub relation_type: String,
}

/// The key a stored vector is reachable from (invariant 3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VectorKey {
    /// Keyed by chunk id.
    Chunk(String),
    /// Keyed by entity id.
    Entity(EntityId),
}

/// Counts returned by `storeDocument` (spec §4.1/§4.8).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StoreDocumentOutcome {
    /// Whether the document row itself was persisted.
    pub stored: bool,
    /// Number of chunks created by `chunkDocument`.
    pub chunks_created: usize,
    /// Number of chunks embedded by `embedChunks`.
    pub chunks_embedded: usize,
}

/// Per-category counts returned by `reEmbedEverything` (spec §4.1/§4.8).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReEmbedOutcome {
    /// Entities re-embedded.
    pub entities: usize,
    /// Document chunks re-embedded, across every document.
    pub document_chunks: usize,
    /// Graph (entity + relationship) chunks re-embedded.
    pub graph_chunks: usize,
    /// Documents whose chunk re-embedding failed (logged, not fatal).
    pub failed_documents: usize,
}

/// The uniform, operation-level contract both backends implement (spec
/// §4.1). Object-safe so the Coordinator and Graph Store can hold it as
/// `Arc<dyn StorageAdapter>`.
///
/// The embedded backend's methods never actually suspend (spec §5: "No
/// explicit async suspension is required; blocking I/O on the handle is
/// acceptable") — its `async fn` bodies run synchronously to completion.
/// The server backend genuinely awaits pool checkouts and query I/O.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Which concrete backend this is.
    fn backend_kind(&self) -> BackendKind;

    // --- Graph -----------------------------------------------------

    /// Inserts-or-ignores entities by name; returns the set actually
    /// inserted (already-existing names are silently skipped, not errors).
    async fn create_entities(&self, entities: &[NewEntity]) -> Result<BatchResult<Entity>>;

    /// Appends observations not already present, per named entity.
    /// Returns, per entity, the subset actually added.
    async fn add_observations(
        &self,
        updates: &[(String, Vec<String>)],
    ) -> Result<BatchResult<(String, Vec<String>)>>;

    /// Removes matching observation strings; absent entries are not errors.
    async fn delete_observations(&self, deletions: &[(String, Vec<String>)]) -> Result<()>;

    /// Inserts-or-ignores relations by id, auto-creating missing endpoint
    /// entities as placeholders (always typed `CONCEPT`, per Open
    /// Question (b) resolution — see DESIGN.md).
    async fn create_relations(&self, relations: &[RelationTriple]) -> Result<BatchResult<Relation>>;

    /// Removes relations matching the given `(from, to, type)` triples.
    async fn delete_relations(&self, relations: &[RelationTriple]) -> Result<usize>;

    /// Cascades per invariant 4: embedding, graph-chunk, touching relations
    /// and their graph-chunks, and chunk↔entity links. Missing names are
    /// logged, not fatal.
    async fn delete_entities(&self, names: &[String]) -> Result<BatchResult<String>>;

    /// All entities and all relations (by name, not id).
    async fn read_graph(&self) -> Result<(Vec<Entity>, Vec<Relation>)>;

    /// Entities with exactly these names, plus relations strictly between
    /// them.
    async fn open_nodes(&self, names: &[String]) -> Result<(Vec<Entity>, Vec<Relation>)>;

    /// Fetches a single entity by its display name.
    async fn get_entity(&self, name: &str) -> Result<Option<Entity>>;

    /// Entity names one hop away from `name` in either direction.
    async fn neighbors(&self, name: &str) -> Result<Vec<String>>;

    // --- Documents & chunks -----------------------------------------

    /// Replaces any prior document with this id (and its chunks/vectors/
    /// links) then persists the new row. Chunking/embedding are driven by
    /// the Coordinator as separate steps (spec §4.8).
    async fn store_document(&self, document: &Document) -> Result<()>;

    /// Fetches a document by id.
    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// All documents, newest first.
    async fn list_documents(&self, include_metadata: bool) -> Result<Vec<Document>>;

    /// Cascades per invariant 4. Per-id success is reported, not fatal to
    /// the batch.
    async fn delete_documents(&self, ids: &[String]) -> Result<BatchResult<String>>;

    /// Deletes every existing chunk/vector/link for `document_id`, then
    /// splits its current content into a fresh, contiguous chunk set.
    /// Returns the number of chunks created.
    async fn chunk_document(&self, document_id: &str, options: ChunkOptions) -> Result<usize>;

    /// All chunks belonging to a document, ordered by `chunk_index`.
    async fn get_document_chunks(&self, document_id: &str) -> Result<Vec<Chunk>>;

    /// A single chunk by id, of any kind.
    async fn get_chunk(&self, chunk_id: &str) -> Result<Option<Chunk>>;

    /// The chunks immediately before/after `chunk_index` in `document_id`,
    /// if present.
    async fn chunk_neighbors(
        &self,
        document_id: &str,
        chunk_index: usize,
    ) -> Result<(Option<Chunk>, Option<Chunk>)>;

    /// Embeds every not-yet-embedded chunk of a document. Returns the
    /// number embedded.
    async fn embed_chunks(&self, document_id: &str) -> Result<usize>;

    /// Embeds (or re-embeds) a single entity.
    async fn embed_entity(&self, entity_id: &EntityId) -> Result<()>;

    /// Links every named entity to every chunk of a document (auto-
    /// creating placeholder entities for unknown names). Idempotent.
    /// Returns the number of (chunk, entity) link rows touched.
    async fn link_entities_to_document(
        &self,
        document_id: &str,
        entity_names: &[String],
    ) -> Result<usize>;

    /// Entities linked to a given chunk.
    async fn entities_for_chunk(&self, chunk_id: &str) -> Result<Vec<Entity>>;

    /// Full text, document title, and associated entities for
    /// `getDetailedContext`, prior to surrounding-context expansion (which
    /// the Retrieval Engine layers on via [`Self::chunk_neighbors`]).
    async fn chunk_context(&self, chunk_id: &str) -> Result<Option<(Chunk, Option<String>)>>;

    // --- Graph chunks -------------------------------------------------

    /// Deletes all existing entity/relationship chunks (and their
    /// vectors), then inserts a fresh rendered chunk for every entity and
    /// relation currently in the graph. Returns the number created.
    async fn generate_knowledge_graph_chunks(&self) -> Result<usize>;

    /// Embeds every entity/relationship graph chunk. Returns the number
    /// embedded.
    async fn embed_knowledge_graph_chunks(&self) -> Result<usize>;

    // --- Vector search --------------------------------------------------

    /// Vector k-NN over the union of all chunks (document, entity,
    /// relationship), ascending by cosine distance.
    async fn search_chunks(&self, query_vector: &[f32], limit: usize) -> Result<Vec<VectorMatch>>;

    /// Vector k-NN over entity embeddings only (used by `searchNodes`).
    async fn search_entities(&self, query_vector: &[f32], limit: usize) -> Result<Vec<(Entity, f32)>>;

    // --- Stats & re-embed -----------------------------------------------

    /// Totals and per-type breakdowns over the current graph/corpus.
    async fn stats(&self) -> Result<KnowledgeGraphStats>;

    /// All document ids currently stored (used to drive `reEmbedEverything`).
    async fn all_document_ids(&self) -> Result<Vec<String>>;

    /// All entity ids currently stored.
    async fn all_entity_ids(&self) -> Result<Vec<EntityId>>;

    // --- Migrations -------------------------------------------------

    /// Ensures the `schema_migrations` table exists.
    async fn ensure_migrations_table(&self) -> Result<()>;

    /// Currently applied migration versions, ascending.
    async fn applied_migration_versions(&self) -> Result<Vec<i32>>;

    /// Records a migration as applied.
    async fn record_migration(&self, version: i32, description: &str) -> Result<()>;

    /// Removes a migration's applied-row (used by rollback).
    async fn remove_migration_row(&self, version: i32) -> Result<()>;
}

/// Derives the relation id for a triple, resolving through [`EntityId`].
#[must_use]
pub fn relation_id_for(from: &str, relation_type: &str, to: &str) -> RelationId {
    RelationId::new(
        &EntityId::for_name(from),
        relation_type,
        &EntityId::for_name(to),
    )
}
