//! Search/retrieval result types (spec §4.3, §4.7).

use serde::{Deserialize, Serialize};

/// The kinds of result `searchNodes` may be asked to return (spec §4.1/§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchKind {
    /// Entity vector search.
    Entity,
    /// Document-chunk vector search.
    DocumentChunk,
}

/// One ranked result from [`crate::retrieval::RetrievalEngine::hybrid_search`]
/// (spec §4.7 step 7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridSearchResult {
    /// Final fused score: `max(vec_sim, best_sentence_similarity) + graph_boost`.
    pub relevance_score: f32,
    /// The single highest-scoring sentence from the chunk.
    pub key_highlight: String,
    /// Selected sentences, re-ordered to document order and joined with
    /// `" [...] "`.
    pub content_summary: String,
    /// The matched chunk's id.
    pub chunk_id: String,
    /// Title of the owning document, or the chunk's own rendered name for
    /// graph chunks.
    pub document_title: String,
    /// Names of entities associated with this chunk.
    pub entities: Vec<String>,
    /// Raw vector similarity, before the graph boost.
    pub vector_similarity: f32,
    /// Additive graph-proximity boost, if `useGraph` was set.
    pub graph_boost: Option<f32>,
    /// Whether `getDetailedContext` can return surrounding chunks for this
    /// result (true only for document chunks).
    pub full_context_available: bool,
    /// `document`, `entity`, or `relationship`.
    pub chunk_type: String,
    /// The id of the chunk's owner: document id, entity id, or relation id.
    pub source_id: String,
}

/// Result of `getDetailedContext` (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedContext {
    /// The requested chunk's id.
    pub chunk_id: String,
    /// The requested chunk's full text.
    pub text: String,
    /// `document`, `entity`, or `relationship`.
    pub chunk_type: String,
    /// Title of the owning document, if any.
    pub document_title: Option<String>,
    /// Names of entities associated with the chunk.
    pub entities: Vec<String>,
    /// The chunk at `chunk_index - 1` in the same document, if requested,
    /// present, and this is a document chunk.
    pub before: Option<String>,
    /// The chunk at `chunk_index + 1` in the same document, if requested,
    /// present, and this is a document chunk.
    pub after: Option<String>,
}

/// Per-type count, used in [`KnowledgeGraphStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeCount {
    /// The bucket name (entity type, relation type).
    pub type_name: String,
    /// Number of rows in that bucket.
    pub count: u64,
}

/// Result of `getKnowledgeGraphStats` (spec §4.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraphStats {
    /// Total entity count.
    pub total_entities: u64,
    /// Total relation count.
    pub total_relations: u64,
    /// Total document count.
    pub total_documents: u64,
    /// Total chunk count, all kinds.
    pub total_chunks: u64,
    /// Entity type → count.
    pub entities_by_type: Vec<TypeCount>,
    /// Relation type → count.
    pub relations_by_type: Vec<TypeCount>,
}
