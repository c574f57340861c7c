//! Table-driven boundary-condition tests (spec §8): empty corpus, empty
//! query, and not-found lookups must return empty results or typed
//! [`ragstore::Error`] variants, never panic.

use ragstore::chunker::SentenceBoundedChunker;
use ragstore::coordinator::Coordinator;
use ragstore::embedding::{Embedder, HashedFallbackEmbedder};
use ragstore::storage::{SqliteStorage, StorageAdapter};
use ragstore::Error;
use std::sync::Arc;
use test_case::test_case;

fn make_coordinator() -> Coordinator {
    let embedder: Arc<dyn Embedder> = Arc::new(HashedFallbackEmbedder::new());
    let chunker = Arc::new(SentenceBoundedChunker::new());
    let storage: Arc<dyn StorageAdapter> =
        Arc::new(SqliteStorage::in_memory(chunker, embedder.clone()).unwrap());
    Coordinator::new(storage, embedder)
}

#[test_case("" ; "empty query")]
#[test_case("   " ; "whitespace-only query")]
#[test_case("a" ; "single character query")]
#[tokio::test]
async fn hybrid_search_on_empty_corpus_never_errors(query: &str) {
    let coordinator = make_coordinator();
    let results = coordinator.retrieval().hybrid_search(query, 5, true).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn search_nodes_with_zero_limit_returns_empty_without_querying_storage() {
    let coordinator = make_coordinator();
    let hits = coordinator
        .graph()
        .search_nodes("anything", 0, &[ragstore::models::SearchKind::Entity])
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn get_detailed_context_on_missing_chunk_is_not_found() {
    let coordinator = make_coordinator();
    let err = coordinator
        .retrieval()
        .get_detailed_context("chunk-does-not-exist", false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn extract_terms_on_missing_document_is_not_found() {
    let coordinator = make_coordinator();
    let err = coordinator
        .extract_terms("missing-doc", &ragstore::synthesizer::ExtractOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn open_nodes_with_unknown_names_returns_empty_not_an_error() {
    let coordinator = make_coordinator();
    let (entities, relations) = coordinator.graph().open_nodes(&["does-not-exist".to_string()]).await.unwrap();
    assert!(entities.is_empty());
    assert!(relations.is_empty());
}

#[tokio::test]
async fn delete_entities_on_unknown_name_is_recorded_as_a_batch_error() {
    let coordinator = make_coordinator();
    let result = coordinator.delete_entities(&["does-not-exist".to_string()]).await.unwrap();
    assert!(result.succeeded.is_empty() || !result.errors.is_empty());
}
