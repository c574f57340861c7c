//! Embedded-backend durability (spec §4.1): data written to a file-backed
//! `SqliteStorage` survives the process reopening the same file, including
//! entities, relations, and document chunks with their embeddings.

use ragstore::chunker::SentenceBoundedChunker;
use ragstore::coordinator::Coordinator;
use ragstore::embedding::{Embedder, HashedFallbackEmbedder};
use ragstore::models::Document;
use ragstore::storage::{NewEntity, RelationTriple, SqliteStorage, StorageAdapter};
use std::sync::Arc;

fn make_embedder() -> Arc<dyn Embedder> {
    Arc::new(HashedFallbackEmbedder::new())
}

#[tokio::test]
async fn entities_relations_and_documents_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ragstore.db");

    {
        let embedder = make_embedder();
        let chunker = Arc::new(SentenceBoundedChunker::new());
        let storage: Arc<dyn StorageAdapter> =
            Arc::new(SqliteStorage::open(db_path.clone(), chunker, embedder.clone()).unwrap());
        let coordinator = Coordinator::new(storage.clone(), embedder);

        coordinator
            .graph()
            .create_entities(&[
                NewEntity { name: "Go".into(), entity_type: "LANGUAGE".into(), observations: vec!["Compiled".into()] },
                NewEntity { name: "Goroutines".into(), entity_type: "CONCEPT".into(), observations: vec![] },
            ])
            .await
            .unwrap();
        coordinator
            .graph()
            .create_relations(&[RelationTriple { from: "Go".into(), to: "Goroutines".into(), relation_type: "PROVIDES".into() }])
            .await
            .unwrap();

        let document = Document::new("go-intro", "Go provides goroutines for concurrency.", serde_json::Value::Null);
        let outcome = coordinator
            .store_document(&document, ragstore::chunker::ChunkOptions::default())
            .await
            .unwrap();
        assert!(outcome.chunks_created >= 1);
        assert_eq!(outcome.chunks_embedded, outcome.chunks_created);
    }

    {
        let embedder = make_embedder();
        let chunker = Arc::new(SentenceBoundedChunker::new());
        let storage: Arc<dyn StorageAdapter> =
            Arc::new(SqliteStorage::open(db_path.clone(), chunker, embedder.clone()).unwrap());
        let coordinator = Coordinator::new(storage, embedder);

        let (entities, relations) = coordinator.graph().read_graph().await.unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(relations.len(), 1);

        let documents = coordinator.list_documents(false).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, "go-intro");

        let results = coordinator.retrieval().hybrid_search("goroutines concurrency", 5, true).await.unwrap();
        assert!(!results.is_empty());
    }
}
