//! Graph Store (spec §4.3): a thin layer over [`StorageAdapter`] exposing
//! entity/relation CRUD and the two graph-traversal read paths
//! (`readGraph`, `openNodes`), plus the split vector search behind
//! `searchNodes`.

use crate::embedding::Embedder;
use crate::models::{BatchResult, Entity, Relation, SearchKind};
use crate::storage::{NewEntity, RelationTriple, StorageAdapter};
use crate::Result;
use std::sync::Arc;

/// One hit from [`GraphStore::search_nodes`]: either an entity or a
/// document-chunk id, with its similarity score.
#[derive(Debug, Clone)]
pub enum NodeSearchHit {
    /// An entity matched by its embedding.
    Entity(Entity, f32),
    /// A document chunk matched by its embedding, identified by id.
    DocumentChunk(String, f32),
}

/// Entity/relation CRUD and graph traversal, layered on a
/// [`StorageAdapter`] (spec §4.3). The Coordinator and `mcp` dispatch
/// layer depend on this, never on a concrete backend.
pub struct GraphStore {
    storage: Arc<dyn StorageAdapter>,
    embedder: Arc<dyn Embedder>,
}

impl GraphStore {
    /// Creates a graph store over the given storage adapter.
    #[must_use]
    pub const fn new(storage: Arc<dyn StorageAdapter>, embedder: Arc<dyn Embedder>) -> Self {
        Self { storage, embedder }
    }

    /// `createEntities`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage layer itself is unreachable;
    /// per-entity failures are reported in the returned [`BatchResult`].
    pub async fn create_entities(&self, entities: &[NewEntity]) -> Result<BatchResult<Entity>> {
        self.storage.create_entities(entities).await
    }

    /// `addObservations`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage layer itself is unreachable.
    pub async fn add_observations(
        &self,
        updates: &[(String, Vec<String>)],
    ) -> Result<BatchResult<(String, Vec<String>)>> {
        self.storage.add_observations(updates).await
    }

    /// `deleteObservations`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage layer itself is unreachable.
    pub async fn delete_observations(&self, deletions: &[(String, Vec<String>)]) -> Result<()> {
        self.storage.delete_observations(deletions).await
    }

    /// `createRelations`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage layer itself is unreachable.
    pub async fn create_relations(&self, relations: &[RelationTriple]) -> Result<BatchResult<Relation>> {
        self.storage.create_relations(relations).await
    }

    /// `deleteRelations`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage layer itself is unreachable.
    pub async fn delete_relations(&self, relations: &[RelationTriple]) -> Result<usize> {
        self.storage.delete_relations(relations).await
    }

    /// `deleteEntities`, cascading per invariant 4.
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage layer itself is unreachable.
    pub async fn delete_entities(&self, names: &[String]) -> Result<BatchResult<String>> {
        self.storage.delete_entities(names).await
    }

    /// `readGraph`: every entity and every relation, by name.
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage layer itself is unreachable.
    pub async fn read_graph(&self) -> Result<(Vec<Entity>, Vec<Relation>)> {
        self.storage.read_graph().await
    }

    /// `openNodes`: entities with exactly these names, plus relations
    /// strictly between them.
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage layer itself is unreachable.
    pub async fn open_nodes(&self, names: &[String]) -> Result<(Vec<Entity>, Vec<Relation>)> {
        if names.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        self.storage.open_nodes(names).await
    }

    /// Entity names one hop from `name`, in either direction (used by the
    /// Retrieval Engine's graph boost, spec §4.7 step 3/4).
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage layer itself is unreachable.
    pub async fn neighbors(&self, name: &str) -> Result<Vec<String>> {
        self.storage.neighbors(name).await
    }

    /// `searchNodes(query, limit, kinds)` (spec §4.3): splits `limit`
    /// between an entity vector search and a document-chunk vector
    /// search. When both kinds are requested, entities are drawn first and
    /// the *remaining* budget goes to document chunks (Open Question (a):
    /// if entities alone saturate `limit`, zero chunks come back — this is
    /// preserved as specified, not treated as a bug).
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be embedded or the storage
    /// layer is unreachable.
    pub async fn search_nodes(
        &self,
        query: &str,
        limit: usize,
        kinds: &[SearchKind],
    ) -> Result<Vec<NodeSearchHit>> {
        if limit == 0 || kinds.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query)?;
        let mut hits = Vec::new();
        let mut remaining = limit;

        if kinds.contains(&SearchKind::Entity) {
            let entities = self.storage.search_entities(&query_vector, remaining).await?;
            remaining = remaining.saturating_sub(entities.len());
            for (entity, distance) in entities {
                hits.push(NodeSearchHit::Entity(entity, 1.0 / (1.0 + distance)));
            }
        }

        if kinds.contains(&SearchKind::DocumentChunk) && remaining > 0 {
            let matches = self.storage.search_chunks(&query_vector, remaining * 3).await?;
            for m in matches {
                if m.chunk.kind.document_id().is_none() {
                    continue;
                }
                hits.push(NodeSearchHit::DocumentChunk(
                    m.chunk.chunk_id,
                    1.0 / (1.0 + m.distance),
                ));
                if hits.len() >= limit {
                    break;
                }
            }
        }

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashedFallbackEmbedder;
    use crate::storage::SqliteStorage;
    use crate::chunker::SentenceBoundedChunker;

    fn make_store() -> GraphStore {
        let embedder = Arc::new(HashedFallbackEmbedder::new());
        let chunker = Arc::new(SentenceBoundedChunker::new());
        let storage: Arc<dyn StorageAdapter> =
            Arc::new(SqliteStorage::in_memory(chunker, embedder.clone()).unwrap());
        GraphStore::new(storage, embedder)
    }

    #[tokio::test]
    async fn open_nodes_on_empty_list_returns_empty() {
        let store = make_store();
        let (entities, relations) = store.open_nodes(&[]).await.unwrap();
        assert!(entities.is_empty());
        assert!(relations.is_empty());
    }

    #[tokio::test]
    async fn entity_lifecycle_matches_s1_scenario() {
        let store = make_store();
        store
            .create_entities(&[
                NewEntity {
                    name: "JavaScript".into(),
                    entity_type: "TECHNOLOGY".into(),
                    observations: vec!["Programming language".into(), "Web development".into()],
                },
                NewEntity {
                    name: "React".into(),
                    entity_type: "TECHNOLOGY".into(),
                    observations: vec!["JavaScript library".into()],
                },
            ])
            .await
            .unwrap();

        store
            .create_relations(&[RelationTriple {
                from: "React".into(),
                to: "JavaScript".into(),
                relation_type: "USES".into(),
            }])
            .await
            .unwrap();

        let (entities, relations) = store.read_graph().await.unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(relations.len(), 1);

        store.delete_entities(&["JavaScript".to_string()]).await.unwrap();
        let (entities, relations) = store.read_graph().await.unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "React");
        assert!(relations.is_empty());
    }
}
