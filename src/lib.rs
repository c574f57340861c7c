//! # RagStore
//!
//! A persistent retrieval-augmented knowledge store.
//!
//! RagStore unifies a typed property graph (entities, relations,
//! observations) with a document/chunk corpus and a vector index. Given a
//! free-text query it returns ranked evidence that blends semantic
//! similarity with graph proximity ("hybrid search"), and it can return the
//! surrounding textual context for any retrieved fragment.
//!
//! ## Architecture
//!
//! - [`storage`] — the backend abstraction (`StorageAdapter`) with an
//!   embedded `SQLite` implementation and an optional `PostgreSQL` server
//!   implementation, plus the schema migration manager.
//! - [`graph`] — entity/relation CRUD and graph traversal, layered on the
//!   storage adapter.
//! - [`chunker`] — token-window text splitting for document ingestion.
//! - [`embedding`] — text-to-vector embedding, with a deterministic
//!   fallback when no model is configured.
//! - [`synthesizer`] — renders graph entities/relations into searchable
//!   chunks, and extracts candidate terms from free text.
//! - [`retrieval`] — the hybrid search engine (vector k-NN + graph boost +
//!   extractive summarization).
//! - [`coordinator`] — orchestrates the multi-step operations
//!   (`storeDocument`, `reEmbedEverything`, deletion cascades) and owns
//!   partial-failure semantics.
//! - [`mcp`] — tool-call argument parsing and response shaping for the
//!   ~20 operations exposed to an agent front end.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod chunker;
pub mod config;
pub mod coordinator;
pub mod embedding;
pub mod graph;
pub mod mcp;
pub mod models;
pub mod observability;
pub mod retrieval;
pub mod storage;
pub mod synthesizer;

pub use chunker::{Chunker, SentenceBoundedChunker};
pub use config::RagConfig;
pub use coordinator::Coordinator;
pub use embedding::{Embedder, HashedFallbackEmbedder};
pub use graph::GraphStore;
pub use models::{Chunk, ChunkKind, Document, Entity, EntityId, Relation, RelationId, SearchKind};
pub use retrieval::RetrievalEngine;
pub use storage::{SqliteStorage, StorageAdapter};

/// Error type for `RagStore` operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
/// Reifies the conceptual error taxonomy: `ValidationError`, `NotFound`,
/// `Conflict`, `BackendError`, `Timeout`, and `Transient`. `IntegrityWarning`
/// is intentionally not a variant here — it is a non-fatal, logged-and-counted
/// event carried in batch result structs (see [`models::BatchResult`]).
#[derive(Debug, ThisError)]
pub enum Error {
    /// Malformed arguments at the tool boundary. Fails fast, never retried.
    #[error("invalid input: {0}")]
    Validation(String),

    /// An entity, document, chunk, or relation required by the operation
    /// does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness or state conflict (e.g. a migration version collision).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The underlying storage engine reported a failure.
    #[error("operation '{operation}' failed: {cause}")]
    Backend {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The operation exceeded its configured `queryTimeout`.
    #[error("operation timed out after {0}ms")]
    Timeout(u64),

    /// A transient condition (lost connection, pool exhaustion) that the
    /// caller's retry policy should absorb.
    #[error("transient failure: {0}")]
    Transient(String),
}

/// Result type alias for `RagStore` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Centralized so every model's `created_at` stamp goes through one call
/// site. Falls back to 0 if the system clock precedes the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Validation("empty query".to_string());
        assert_eq!(err.to_string(), "invalid input: empty query");

        let err = Error::NotFound("chunk doc1_chunk_9".to_string());
        assert_eq!(err.to_string(), "not found: chunk doc1_chunk_9");

        let err = Error::Backend {
            operation: "store_document".to_string(),
            cause: "disk full".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "operation 'store_document' failed: disk full"
        );
    }

    #[test]
    fn test_current_timestamp_is_reasonable() {
        let ts = current_timestamp();
        assert!(ts > 1_700_000_000);
    }
}
