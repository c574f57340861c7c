//! The Coordinator (spec §4.8): orchestrates the multi-step operations
//! (`storeDocument`, `reEmbedEverything`, deletion cascades) and owns
//! partial-failure semantics. Depends only on `Arc<dyn StorageAdapter>`,
//! `GraphStore`, and `RetrievalEngine` — never on a concrete backend.

use crate::chunker::ChunkOptions;
use crate::graph::GraphStore;
use crate::models::{BatchResult, Document, KnowledgeGraphStats};
use crate::retrieval::RetrievalEngine;
use crate::storage::{ReEmbedOutcome, StorageAdapter, StoreDocumentOutcome};
use crate::Result;
use std::sync::Arc;

/// Orchestrates ingestion, re-embedding, and deletion cascades.
pub struct Coordinator {
    storage: Arc<dyn StorageAdapter>,
    graph: Arc<GraphStore>,
    retrieval: Arc<RetrievalEngine>,
}

impl Coordinator {
    /// Builds a coordinator over the given storage adapter, constructing
    /// its own [`GraphStore`] and [`RetrievalEngine`].
    #[must_use]
    pub fn new(storage: Arc<dyn StorageAdapter>, embedder: Arc<dyn crate::embedding::Embedder>) -> Self {
        let graph = Arc::new(GraphStore::new(storage.clone(), embedder.clone()));
        let retrieval = Arc::new(RetrievalEngine::new(storage.clone(), graph.clone(), embedder));
        Self {
            storage,
            graph,
            retrieval,
        }
    }

    /// The underlying graph store (entity/relation CRUD + traversal).
    #[must_use]
    pub fn graph(&self) -> &Arc<GraphStore> {
        &self.graph
    }

    /// The underlying retrieval engine (hybrid search + detailed context).
    #[must_use]
    pub fn retrieval(&self) -> &Arc<RetrievalEngine> {
        &self.retrieval
    }

    /// The underlying storage adapter, for operations the Coordinator
    /// doesn't wrap itself (listDocuments, getKnowledgeGraphStats, ...).
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    /// `storeDocument` = cleanup prior -> persist row -> chunk -> embed
    /// (spec §4.8). The document is considered stored even if chunking or
    /// embedding fails partway; the outcome reports the counts actually
    /// achieved, never an error for that reason.
    ///
    /// # Errors
    ///
    /// Returns an error only if persisting the document row itself fails
    /// (a single-target operation per spec §7's propagation policy).
    #[tracing::instrument(skip(self, document), fields(document_id = %document.id))]
    pub async fn store_document(
        &self,
        document: &Document,
        chunk_options: ChunkOptions,
    ) -> Result<StoreDocumentOutcome> {
        self.storage.store_document(document).await?;

        let chunks_created = match self.storage.chunk_document(&document.id, chunk_options).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(document_id = %document.id, error = %e, "chunkDocument failed during storeDocument");
                0
            },
        };

        let chunks_embedded = if chunks_created == 0 {
            0
        } else {
            match self.storage.embed_chunks(&document.id).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(document_id = %document.id, error = %e, "embedChunks failed during storeDocument");
                    0
                },
            }
        };

        Ok(StoreDocumentOutcome {
            stored: true,
            chunks_created,
            chunks_embedded,
        })
    }

    /// `reEmbedEverything` = embed all entities; then, per document, embed
    /// all not-yet-embedded chunks (no re-chunking); then regenerate and
    /// embed graph chunks. Per-document failures are logged and counted,
    /// never abort the batch (spec §4.8).
    ///
    /// # Errors
    ///
    /// Returns an error only if listing entities/documents itself fails;
    /// individual embed failures are absorbed into the outcome counts.
    #[tracing::instrument(skip(self))]
    pub async fn re_embed_everything(&self) -> Result<ReEmbedOutcome> {
        let mut outcome = ReEmbedOutcome::default();

        for entity_id in self.storage.all_entity_ids().await? {
            match self.storage.embed_entity(&entity_id).await {
                Ok(()) => outcome.entities += 1,
                Err(e) => tracing::warn!(entity_id = %entity_id, error = %e, "reEmbedEverything: entity embed failed"),
            }
        }

        for document_id in self.storage.all_document_ids().await? {
            match self.storage.embed_chunks(&document_id).await {
                Ok(n) => outcome.document_chunks += n,
                Err(e) => {
                    tracing::warn!(document_id = %document_id, error = %e, "reEmbedEverything: chunk embed failed");
                    outcome.failed_documents += 1;
                },
            }
        }

        if let Err(e) = self.storage.generate_knowledge_graph_chunks().await {
            tracing::warn!(error = %e, "reEmbedEverything: graph chunk regeneration failed");
        } else {
            match self.storage.embed_knowledge_graph_chunks().await {
                Ok(n) => outcome.graph_chunks = n,
                Err(e) => tracing::warn!(error = %e, "reEmbedEverything: graph chunk embed failed"),
            }
        }

        Ok(outcome)
    }

    /// `deleteEntities`, cascading per invariant 4. Per-target errors are
    /// logged and the next target proceeds (spec §4.8).
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage layer itself is unreachable.
    pub async fn delete_entities(&self, names: &[String]) -> Result<BatchResult<String>> {
        self.graph.delete_entities(names).await
    }

    /// `deleteDocuments`, cascading per invariant 4.
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage layer itself is unreachable.
    pub async fn delete_documents(&self, ids: &[String]) -> Result<BatchResult<String>> {
        self.storage.delete_documents(ids).await
    }

    /// `linkEntitiesToDocument`: links each named entity to every chunk of
    /// the document (auto-creating placeholder entities for unknown
    /// names). Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage layer itself is unreachable.
    pub async fn link_entities_to_document(
        &self,
        document_id: &str,
        entity_names: &[String],
    ) -> Result<usize> {
        self.storage.link_entities_to_document(document_id, entity_names).await
    }

    /// `getKnowledgeGraphStats`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage layer itself is unreachable.
    pub async fn knowledge_graph_stats(&self) -> Result<KnowledgeGraphStats> {
        self.storage.stats().await
    }

    /// `listDocuments`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage layer itself is unreachable.
    pub async fn list_documents(&self, include_metadata: bool) -> Result<Vec<Document>> {
        self.storage.list_documents(include_metadata).await
    }

    /// `extractTerms`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if the document does not exist.
    pub async fn extract_terms(
        &self,
        document_id: &str,
        options: &crate::synthesizer::ExtractOptions,
    ) -> Result<crate::synthesizer::ExtractedTerms> {
        let Some(document) = self.storage.get_document(document_id).await? else {
            return Err(crate::Error::NotFound(format!("document {document_id}")));
        };
        Ok(crate::synthesizer::extract_terms(&document.content, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::SentenceBoundedChunker;
    use crate::embedding::HashedFallbackEmbedder;
    use crate::storage::SqliteStorage;
    use std::sync::Arc;

    fn make_coordinator() -> Coordinator {
        let embedder: Arc<dyn crate::embedding::Embedder> = Arc::new(HashedFallbackEmbedder::new());
        let chunker = Arc::new(SentenceBoundedChunker::new());
        let storage: Arc<dyn StorageAdapter> =
            Arc::new(SqliteStorage::in_memory(chunker, embedder.clone()).unwrap());
        Coordinator::new(storage, embedder)
    }

    #[tokio::test]
    async fn store_document_replaces_prior_chunks_and_vectors() {
        let coordinator = make_coordinator();
        let long_text = "Sentence one is here. ".repeat(60);
        let doc = Document::new("doc1", long_text, serde_json::Value::Null);
        let outcome = coordinator
            .store_document(&doc, ChunkOptions::default())
            .await
            .unwrap();
        assert!(outcome.stored);
        assert!(outcome.chunks_created >= 2);
        assert_eq!(outcome.chunks_embedded, outcome.chunks_created);

        let shorter = Document::new("doc1", "Just one short sentence.", serde_json::Value::Null);
        let outcome2 = coordinator
            .store_document(&shorter, ChunkOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome2.chunks_created, 1);

        let chunks = coordinator.storage().get_document_chunks("doc1").await.unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn re_embed_everything_covers_entities_documents_and_graph_chunks() {
        let coordinator = make_coordinator();
        coordinator
            .graph()
            .create_entities(&[crate::storage::NewEntity {
                name: "A".into(),
                entity_type: "CONCEPT".into(),
                observations: vec![],
            }])
            .await
            .unwrap();
        let doc = Document::new("doc1", "A short document about A.", serde_json::Value::Null);
        coordinator.store_document(&doc, ChunkOptions::default()).await.unwrap();

        let outcome = coordinator.re_embed_everything().await.unwrap();
        assert_eq!(outcome.entities, 1);
        assert_eq!(outcome.failed_documents, 0);
    }
}
