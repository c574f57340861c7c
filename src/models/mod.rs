//! Data models for the unified storage model (spec §3).
//!
//! Entities, relations, documents and chunks are the four persisted record
//! types; vectors and chunk↔entity links are plain columns/join rows owned
//! by the storage adapters, not public types, since nothing outside the
//! storage layer ever needs to hold one on its own.

mod batch;
mod chunk;
mod document;
mod entity;
mod relation;
mod search;

pub use batch::{BatchResult, ItemError};
pub use chunk::{Chunk, ChunkKind};
pub use document::Document;
pub use entity::{DEFAULT_ENTITY_TYPE, Entity, EntityId};
pub use relation::{Relation, RelationId};
pub use search::{DetailedContext, HybridSearchResult, KnowledgeGraphStats, SearchKind, TypeCount};
