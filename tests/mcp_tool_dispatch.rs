//! Exercises the tool-call dispatch layer end-to-end (spec §6/§7):
//! argument parsing, Coordinator orchestration, and the JSON-or-error-text
//! response contract, all through the public [`ragstore::mcp`] surface
//! rather than any single module's internals.

use ragstore::chunker::SentenceBoundedChunker;
use ragstore::coordinator::Coordinator;
use ragstore::embedding::{Embedder, HashedFallbackEmbedder};
use ragstore::mcp::{McpServer, ToolRegistry};
use ragstore::storage::{default_migrations, MigrationManager, SqliteStorage, StorageAdapter};
use std::sync::Arc;

fn make_server() -> McpServer {
    let embedder: Arc<dyn Embedder> = Arc::new(HashedFallbackEmbedder::new());
    let chunker = Arc::new(SentenceBoundedChunker::new());
    let storage: Arc<dyn StorageAdapter> =
        Arc::new(SqliteStorage::in_memory(chunker, embedder.clone()).unwrap());
    let migrations = Arc::new(MigrationManager::new(storage.clone(), default_migrations()).unwrap());
    let coordinator = Arc::new(Coordinator::new(storage, embedder));
    McpServer::new(Arc::new(ToolRegistry::new(coordinator, migrations)))
}

#[tokio::test]
async fn full_ingestion_and_search_tool_call_sequence() {
    let server = make_server();

    let create = server
        .handle(
            "createEntities",
            serde_json::json!({ "entities": [
                { "name": "Rust", "entityType": "LANGUAGE", "observations": ["Systems programming language"] },
                { "name": "Cargo", "entityType": "TOOL", "observations": ["Rust's build tool"] },
            ]}),
        )
        .await;
    assert!(create.is_ok());

    let relate = server
        .handle(
            "createRelations",
            serde_json::json!({ "relations": [{ "from": "Cargo", "to": "Rust", "relationType": "BUILDS" }]}),
        )
        .await;
    assert!(relate.is_ok());

    let store = server
        .handle(
            "storeDocument",
            serde_json::json!({
                "id": "rust-intro",
                "content": "Rust is a systems programming language. Cargo manages Rust's dependencies and builds.",
            }),
        )
        .await;
    assert!(store.is_ok());

    let search = server
        .handle("hybridSearch", serde_json::json!({ "query": "Rust build tool", "limit": 3 }))
        .await;
    let ragstore::mcp::ToolResponse::Ok(body) = search else {
        panic!("expected a successful hybridSearch response");
    };
    assert!(!body["results"].as_array().unwrap().is_empty());

    let stats = server.handle("getKnowledgeGraphStats", serde_json::json!({})).await;
    let ragstore::mcp::ToolResponse::Ok(stats) = stats else {
        panic!("expected a successful getKnowledgeGraphStats response");
    };
    assert_eq!(stats["total_entities"], 2);
    assert_eq!(stats["total_relations"], 1);
    assert_eq!(stats["total_documents"], 1);
}

#[tokio::test]
async fn migration_lifecycle_through_tool_calls() {
    let server = make_server();

    let applied = server.handle("runMigrations", serde_json::json!({})).await;
    let ragstore::mcp::ToolResponse::Ok(status) = applied else {
        panic!("expected runMigrations to succeed");
    };
    assert_eq!(status["current_version"], 1);
    assert_eq!(status["pending_count"], 0);

    let status_again = server.handle("getMigrationStatus", serde_json::json!({})).await;
    let ragstore::mcp::ToolResponse::Ok(status_again) = status_again else {
        panic!("expected getMigrationStatus to succeed");
    };
    assert_eq!(status_again["current_version"], 1);
}

#[tokio::test]
async fn malformed_arguments_render_as_error_text_not_a_panic() {
    let server = make_server();
    let response = server
        .handle("createEntities", serde_json::json!({ "entities": "not-a-list" }))
        .await;
    let ragstore::mcp::ToolResponse::Err(message) = response else {
        panic!("expected a validation error response");
    };
    assert!(message.starts_with("Error: "));
}

#[tokio::test]
async fn delete_entities_cascades_to_relations() {
    let server = make_server();
    server
        .handle(
            "createEntities",
            serde_json::json!({ "entities": [
                { "name": "JavaScript", "entityType": "TECHNOLOGY", "observations": [] },
                { "name": "React", "entityType": "TECHNOLOGY", "observations": [] },
            ]}),
        )
        .await;
    server
        .handle(
            "createRelations",
            serde_json::json!({ "relations": [{ "from": "React", "to": "JavaScript", "relationType": "USES" }]}),
        )
        .await;

    server
        .handle("deleteEntities", serde_json::json!({ "entityNames": ["JavaScript"] }))
        .await;

    let graph = server.handle("readGraph", serde_json::json!({})).await;
    let ragstore::mcp::ToolResponse::Ok(graph) = graph else {
        panic!("expected readGraph to succeed");
    };
    assert_eq!(graph["entities"].as_array().unwrap().len(), 1);
    assert!(graph["relations"].as_array().unwrap().is_empty());
}
