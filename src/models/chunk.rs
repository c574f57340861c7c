//! Chunk records (spec §3) and the tagged `chunk_type` sum type.
//!
//! The source system represents a chunk's owner as three nullable columns
//! (`document_id`, `entity_id`, `relationship_id`) with a separate `kind`
//! discriminator, requiring a runtime "which field is actually set" check
//! at every call site. Per REDESIGN FLAGS §9 ("Tagged chunk variant"), this
//! is represented here as a proper sum type: [`ChunkKind`] carries the
//! owner data for the variant it names, so there is no representable
//! invalid state (e.g. a `Document` kind with an `entity_id` set).

use super::{EntityId, RelationId};
use serde::{Deserialize, Serialize};

/// The kind of a chunk, carrying the owner reference for that kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChunkKind {
    /// A slice of a document's text. `chunk_index` is 0-based and
    /// contiguous within the owning document.
    Document {
        /// Owning document id.
        document_id: String,
        /// 0-based, contiguous position within the document.
        chunk_index: usize,
    },
    /// A synthesized description of a graph entity.
    Entity {
        /// The entity this chunk describes.
        entity_id: EntityId,
    },
    /// A synthesized description of a graph relation.
    Relationship {
        /// The relation this chunk describes.
        relationship_id: RelationId,
    },
}

impl ChunkKind {
    /// Short name used in `chunk_type` response fields (`document`,
    /// `entity`, `relationship`).
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Document { .. } => "document",
            Self::Entity { .. } => "entity",
            Self::Relationship { .. } => "relationship",
        }
    }

    /// The owning document id, if this is a document chunk.
    #[must_use]
    pub fn document_id(&self) -> Option<&str> {
        match self {
            Self::Document { document_id, .. } => Some(document_id),
            Self::Entity { .. } | Self::Relationship { .. } => None,
        }
    }

    /// The chunk's position within its document, if this is a document chunk.
    #[must_use]
    pub const fn chunk_index(&self) -> Option<usize> {
        match self {
            Self::Document { chunk_index, .. } => Some(*chunk_index),
            Self::Entity { .. } | Self::Relationship { .. } => None,
        }
    }

    /// The described entity id, if this is an entity chunk.
    #[must_use]
    pub const fn entity_id(&self) -> Option<&EntityId> {
        match self {
            Self::Entity { entity_id } => Some(entity_id),
            Self::Document { .. } | Self::Relationship { .. } => None,
        }
    }

    /// The described relation id, if this is a relationship chunk.
    #[must_use]
    pub const fn relationship_id(&self) -> Option<&RelationId> {
        match self {
            Self::Relationship { relationship_id } => Some(relationship_id),
            Self::Document { .. } | Self::Entity { .. } => None,
        }
    }
}

/// A contiguous, embeddable fragment of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier; see [`Self::document_chunk_id`],
    /// [`Self::entity_chunk_id`], [`Self::relationship_chunk_id`].
    pub chunk_id: String,
    /// The chunk's kind and owner reference.
    pub kind: ChunkKind,
    /// The chunk's text content.
    pub text: String,
    /// Half-open `[start, end)` offset into the owning document. `0..len`
    /// for graph chunks, which have no owning document.
    pub start_pos: usize,
    /// See `start_pos`.
    pub end_pos: usize,
    /// Free-form metadata, opaque to the storage layer.
    pub metadata: serde_json::Value,
    /// Unix timestamp (seconds) of creation.
    pub created_at: u64,
}

impl Chunk {
    /// `chunk_id` for a document chunk: `{document_id}_chunk_{index}`.
    #[must_use]
    pub fn document_chunk_id(document_id: &str, chunk_index: usize) -> String {
        format!("{document_id}_chunk_{chunk_index}")
    }

    /// `chunk_id` for an entity graph-chunk: `kg_entity_{entity_id}`.
    #[must_use]
    pub fn entity_chunk_id(entity_id: &EntityId) -> String {
        format!("kg_entity_{entity_id}")
    }

    /// `chunk_id` for a relationship graph-chunk: `kg_relationship_{relation_id}`.
    #[must_use]
    pub fn relationship_chunk_id(relation_id: &RelationId) -> String {
        format!("kg_relationship_{relation_id}")
    }

    /// Builds a document chunk.
    #[must_use]
    pub fn new_document(
        document_id: impl Into<String>,
        chunk_index: usize,
        text: impl Into<String>,
        start_pos: usize,
        end_pos: usize,
    ) -> Self {
        let document_id = document_id.into();
        let chunk_id = Self::document_chunk_id(&document_id, chunk_index);
        Self {
            chunk_id,
            kind: ChunkKind::Document {
                document_id,
                chunk_index,
            },
            text: text.into(),
            start_pos,
            end_pos,
            metadata: serde_json::Value::Null,
            created_at: crate::current_timestamp(),
        }
    }

    /// Builds an entity graph-chunk. `start_pos`/`end_pos` are `0..len(text)`
    /// per spec (undefined/meaningless for graph chunks).
    #[must_use]
    pub fn new_entity(entity_id: EntityId, text: impl Into<String>) -> Self {
        let text = text.into();
        let len = text.chars().count();
        Self {
            chunk_id: Self::entity_chunk_id(&entity_id),
            kind: ChunkKind::Entity { entity_id },
            text,
            start_pos: 0,
            end_pos: len,
            metadata: serde_json::Value::Null,
            created_at: crate::current_timestamp(),
        }
    }

    /// Builds a relationship graph-chunk.
    #[must_use]
    pub fn new_relationship(relation_id: RelationId, text: impl Into<String>) -> Self {
        let text = text.into();
        let len = text.chars().count();
        Self {
            chunk_id: Self::relationship_chunk_id(&relation_id),
            kind: ChunkKind::Relationship {
                relationship_id: relation_id,
            },
            text,
            start_pos: 0,
            end_pos: len,
            metadata: serde_json::Value::Null,
            created_at: crate::current_timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_chunk_id_matches_spec_template() {
        assert_eq!(Chunk::document_chunk_id("doc1", 3), "doc1_chunk_3");
    }

    #[test]
    fn entity_chunk_id_matches_spec_template() {
        let id = EntityId::for_name("Machine Learning");
        assert_eq!(
            Chunk::entity_chunk_id(&id),
            "kg_entity_entity_machine_learning"
        );
    }

    #[test]
    fn chunk_kind_exposes_only_the_relevant_owner() {
        let c = Chunk::new_document("doc1", 0, "hello", 0, 5);
        assert_eq!(c.kind.document_id(), Some("doc1"));
        assert_eq!(c.kind.chunk_index(), Some(0));
        assert_eq!(c.kind.entity_id(), None);
        assert_eq!(c.kind.label(), "document");
    }
}
