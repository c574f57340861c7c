//! Tool dispatch (spec §6): maps a tool name and JSON arguments to a
//! Coordinator/GraphStore/RetrievalEngine/MigrationManager call and a
//! JSON response. This is the argument-parsing/validation and
//! response-shaping half of the MCP surface; the wire transport
//! (stdio/http framing, JSON-RPC envelope) is out of scope (spec §1) and
//! is not wired up here.

use crate::chunker::ChunkOptions;
use crate::coordinator::Coordinator;
use crate::models::{Document, SearchKind};
use crate::storage::{MigrationManager, NewEntity, RelationTriple};
use crate::synthesizer::ExtractOptions;
use crate::{Error, Result};
use std::sync::Arc;

use super::tool_types::{
    AddObservationsArgs, CreateEntitiesArgs, CreateRelationsArgs, DeleteDocumentsArgs,
    DeleteEntitiesArgs, DeleteObservationsArgs, DeleteRelationsArgs, ExtractTermsArgs,
    GetDetailedContextArgs, HybridSearchArgs, LinkEntitiesToDocumentArgs, ListDocumentsArgs,
    OpenNodesArgs, RollbackMigrationArgs, SearchNodesArgs, StoreDocumentArgs,
};

fn parse_args<T: serde::de::DeserializeOwned>(name: &str, args: serde_json::Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| {
        Error::Validation(format!("{name}: invalid arguments: {e}"))
    })
}

/// Serializes a response value, wrapping the (practically unreachable for
/// our own types) serialization failure as a backend error rather than
/// panicking at the tool boundary.
fn to_json<T: serde::Serialize>(operation: &str, value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| Error::Backend {
        operation: operation.to_string(),
        cause: format!("response serialization failed: {e}"),
    })
}

/// The fixed set of tool-call operations a RagStore instance exposes
/// (spec §6), dispatched by name against a [`Coordinator`] and a
/// [`MigrationManager`].
pub struct ToolRegistry {
    coordinator: Arc<Coordinator>,
    migrations: Arc<MigrationManager>,
}

impl ToolRegistry {
    /// Builds a registry over the given coordinator and migration manager.
    #[must_use]
    pub const fn new(coordinator: Arc<Coordinator>, migrations: Arc<MigrationManager>) -> Self {
        Self {
            coordinator,
            migrations,
        }
    }

    /// Dispatches `name` with `args` to its handler, returning the JSON
    /// response body on success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an unknown tool name or
    /// malformed arguments; otherwise propagates whatever error the
    /// underlying operation returns.
    pub async fn call(&self, name: &str, args: serde_json::Value) -> Result<serde_json::Value> {
        match name {
            "createEntities" => self.create_entities(args).await,
            "createRelations" => self.create_relations(args).await,
            "addObservations" => self.add_observations(args).await,
            "deleteEntities" => self.delete_entities(args).await,
            "deleteObservations" => self.delete_observations(args).await,
            "deleteRelations" => self.delete_relations(args).await,
            "readGraph" => self.read_graph().await,
            "searchNodes" => self.search_nodes(args).await,
            "openNodes" => self.open_nodes(args).await,
            "storeDocument" => self.store_document(args).await,
            "extractTerms" => self.extract_terms(args).await,
            "linkEntitiesToDocument" => self.link_entities_to_document(args).await,
            "hybridSearch" => self.hybrid_search(args).await,
            "getDetailedContext" => self.get_detailed_context(args).await,
            "getKnowledgeGraphStats" => self.get_knowledge_graph_stats().await,
            "deleteDocuments" => self.delete_documents(args).await,
            "listDocuments" => self.list_documents(args).await,
            "reEmbedEverything" => self.re_embed_everything().await,
            "getMigrationStatus" => self.get_migration_status().await,
            "runMigrations" => self.run_migrations().await,
            "rollbackMigration" => self.rollback_migration(args).await,
            other => Err(Error::Validation(format!("unknown tool: {other}"))),
        }
    }

    async fn create_entities(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let args: CreateEntitiesArgs = parse_args("createEntities", args)?;
        let entities: Vec<NewEntity> = args
            .entities
            .into_iter()
            .map(|e| NewEntity {
                name: e.name,
                entity_type: e.entity_type,
                observations: e.observations,
            })
            .collect();
        let result = self.coordinator.graph().create_entities(&entities).await?;
        to_json("createEntities", &result)
    }

    async fn create_relations(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let args: CreateRelationsArgs = parse_args("createRelations", args)?;
        let relations: Vec<RelationTriple> = args
            .relations
            .into_iter()
            .map(|r| RelationTriple {
                from: r.from,
                to: r.to,
                relation_type: r.relation_type,
            })
            .collect();
        let result = self.coordinator.graph().create_relations(&relations).await?;
        to_json("createRelations", &result)
    }

    async fn add_observations(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let args: AddObservationsArgs = parse_args("addObservations", args)?;
        let updates: Vec<(String, Vec<String>)> = args
            .observations
            .into_iter()
            .map(|o| (o.entity_name, o.contents))
            .collect();
        let result = self.coordinator.graph().add_observations(&updates).await?;
        to_json("addObservations", &result)
    }

    async fn delete_entities(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let args: DeleteEntitiesArgs = parse_args("deleteEntities", args)?;
        let result = self.coordinator.delete_entities(&args.entity_names).await?;
        to_json("deleteEntities", &result)
    }

    async fn delete_observations(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let args: DeleteObservationsArgs = parse_args("deleteObservations", args)?;
        let deletions: Vec<(String, Vec<String>)> = args
            .deletions
            .into_iter()
            .map(|d| (d.entity_name, d.observations))
            .collect();
        self.coordinator.graph().delete_observations(&deletions).await?;
        Ok(serde_json::json!({ "deleted": true }))
    }

    async fn delete_relations(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let args: DeleteRelationsArgs = parse_args("deleteRelations", args)?;
        let relations: Vec<RelationTriple> = args
            .relations
            .into_iter()
            .map(|r| RelationTriple {
                from: r.from,
                to: r.to,
                relation_type: r.relation_type,
            })
            .collect();
        let removed = self.coordinator.graph().delete_relations(&relations).await?;
        Ok(serde_json::json!({ "removed": removed }))
    }

    async fn read_graph(&self) -> Result<serde_json::Value> {
        let (entities, relations) = self.coordinator.graph().read_graph().await?;
        Ok(serde_json::json!({ "entities": entities, "relations": relations }))
    }

    async fn search_nodes(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let args: SearchNodesArgs = parse_args("searchNodes", args)?;
        let limit = args.limit.unwrap_or(10);
        let hits = self
            .coordinator
            .graph()
            .search_nodes(&args.query, limit, &[SearchKind::Entity, SearchKind::DocumentChunk])
            .await?;
        let rendered: Vec<serde_json::Value> = hits
            .into_iter()
            .map(|hit| match hit {
                crate::graph::NodeSearchHit::Entity(entity, score) => {
                    serde_json::json!({ "kind": "entity", "entity": entity, "score": score })
                },
                crate::graph::NodeSearchHit::DocumentChunk(chunk_id, score) => {
                    serde_json::json!({ "kind": "documentChunk", "chunkId": chunk_id, "score": score })
                },
            })
            .collect();
        Ok(serde_json::json!({ "results": rendered }))
    }

    async fn open_nodes(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let args: OpenNodesArgs = parse_args("openNodes", args)?;
        let (entities, relations) = self.coordinator.graph().open_nodes(&args.names).await?;
        Ok(serde_json::json!({ "entities": entities, "relations": relations }))
    }

    async fn store_document(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let args: StoreDocumentArgs = parse_args("storeDocument", args)?;
        let document = Document::new(args.id, args.content, args.metadata);
        let options = ChunkOptions {
            max_tokens: args.max_tokens.unwrap_or_else(|| ChunkOptions::default().max_tokens),
            overlap: args.overlap.unwrap_or_else(|| ChunkOptions::default().overlap),
        };
        let outcome = self.coordinator.store_document(&document, options).await?;
        to_json("storeDocument", &outcome)
    }

    async fn extract_terms(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let args: ExtractTermsArgs = parse_args("extractTerms", args)?;
        let options = ExtractOptions {
            min_length: args.min_length.unwrap_or(3),
            include_capitalized: args.include_capitalized.unwrap_or(true),
            custom_patterns: args.custom_patterns.unwrap_or_default(),
        };
        let extracted = self.coordinator.extract_terms(&args.document_id, &options).await?;
        Ok(serde_json::json!({
            "terms": extracted.terms,
            "invalidPatterns": extracted
                .invalid_patterns
                .into_iter()
                .map(|p| serde_json::json!({ "pattern": p.pattern, "error": p.error }))
                .collect::<Vec<_>>(),
        }))
    }

    async fn link_entities_to_document(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let args: LinkEntitiesToDocumentArgs = parse_args("linkEntitiesToDocument", args)?;
        let linked = self
            .coordinator
            .link_entities_to_document(&args.document_id, &args.entity_names)
            .await?;
        Ok(serde_json::json!({ "linked": linked }))
    }

    async fn hybrid_search(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let args: HybridSearchArgs = parse_args("hybridSearch", args)?;
        let limit = args.limit.unwrap_or(5);
        let use_graph = args.use_graph.unwrap_or(true);
        let results = self
            .coordinator
            .retrieval()
            .hybrid_search(&args.query, limit, use_graph)
            .await?;
        Ok(serde_json::json!({ "results": results }))
    }

    async fn get_detailed_context(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let args: GetDetailedContextArgs = parse_args("getDetailedContext", args)?;
        let include_surrounding = args.include_surrounding.unwrap_or(false);
        let context = self
            .coordinator
            .retrieval()
            .get_detailed_context(&args.chunk_id, include_surrounding)
            .await?;
        to_json("getDetailedContext", &context)
    }

    async fn get_knowledge_graph_stats(&self) -> Result<serde_json::Value> {
        let stats = self.coordinator.knowledge_graph_stats().await?;
        to_json("getKnowledgeGraphStats", &stats)
    }

    async fn delete_documents(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let args: DeleteDocumentsArgs = parse_args("deleteDocuments", args)?;
        let ids = args.document_ids.into_vec();
        let result = self.coordinator.delete_documents(&ids).await?;
        to_json("deleteDocuments", &result)
    }

    async fn list_documents(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let args: ListDocumentsArgs = parse_args("listDocuments", args)?;
        let documents = self
            .coordinator
            .list_documents(args.include_metadata.unwrap_or(false))
            .await?;
        Ok(serde_json::json!({ "documents": documents }))
    }

    async fn re_embed_everything(&self) -> Result<serde_json::Value> {
        let outcome = self.coordinator.re_embed_everything().await?;
        to_json("reEmbedEverything", &outcome)
    }

    async fn get_migration_status(&self) -> Result<serde_json::Value> {
        let status = self.migrations.status().await?;
        to_json("getMigrationStatus", &status)
    }

    async fn run_migrations(&self) -> Result<serde_json::Value> {
        let status = self.migrations.run_migrations().await?;
        to_json("runMigrations", &status)
    }

    async fn rollback_migration(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let args: RollbackMigrationArgs = parse_args("rollbackMigration", args)?;
        let status = self.migrations.rollback_to(args.target_version).await?;
        to_json("rollbackMigration", &status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::SentenceBoundedChunker;
    use crate::embedding::HashedFallbackEmbedder;
    use crate::storage::{SqliteStorage, StorageAdapter};

    fn make_registry() -> ToolRegistry {
        let embedder: Arc<dyn crate::embedding::Embedder> = Arc::new(HashedFallbackEmbedder::new());
        let chunker = Arc::new(SentenceBoundedChunker::new());
        let storage: Arc<dyn StorageAdapter> =
            Arc::new(SqliteStorage::in_memory(chunker, embedder.clone()).unwrap());
        let coordinator = Arc::new(Coordinator::new(storage.clone(), embedder));
        let migrations = Arc::new(MigrationManager::new(storage, Vec::new()).unwrap());
        ToolRegistry::new(coordinator, migrations)
    }

    #[tokio::test]
    async fn unknown_tool_name_is_a_validation_error() {
        let registry = make_registry();
        let err = registry.call("notARealTool", serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn create_entities_then_read_graph_round_trips() {
        let registry = make_registry();
        let created = registry
            .call(
                "createEntities",
                serde_json::json!({ "entities": [{ "name": "Rust", "entityType": "LANGUAGE", "observations": ["Systems language"] }] }),
            )
            .await
            .unwrap();
        assert_eq!(created["succeeded"].as_array().unwrap().len(), 1);

        let graph = registry.call("readGraph", serde_json::json!({})).await.unwrap();
        assert_eq!(graph["entities"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn store_document_then_hybrid_search_finds_it() {
        let registry = make_registry();
        registry
            .call(
                "storeDocument",
                serde_json::json!({ "id": "doc1", "content": "Rust is a systems programming language focused on safety." }),
            )
            .await
            .unwrap();

        let result = registry
            .call("hybridSearch", serde_json::json!({ "query": "Rust safety" }))
            .await
            .unwrap();
        assert!(!result["results"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_documents_accepts_single_string_or_list() {
        let registry = make_registry();
        registry
            .call("storeDocument", serde_json::json!({ "id": "doc1", "content": "Some content here." }))
            .await
            .unwrap();
        let result = registry
            .call("deleteDocuments", serde_json::json!({ "documentIds": "doc1" }))
            .await
            .unwrap();
        assert_eq!(result["succeeded"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn migration_status_reports_zero_pending_with_no_registered_migrations() {
        let registry = make_registry();
        let status = registry.call("getMigrationStatus", serde_json::json!({})).await.unwrap();
        assert_eq!(status["current_version"], 0);
        assert_eq!(status["pending_count"], 0);
    }
}
