//! Thin response-shaping wrapper over [`super::tools::ToolRegistry`]
//! (spec §7): every tool call returns either the JSON result on success,
//! or the text `Error: <message>` on failure — the response contract the
//! spec gives the tool-call boundary, independent of whatever transport
//! eventually frames it.

use super::tools::ToolRegistry;
use std::sync::Arc;

/// One rendered tool-call response (spec §7): either the successful JSON
/// body, or an `Error: <message>` text payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResponse {
    /// A successful call's JSON result.
    Ok(serde_json::Value),
    /// A failed call's caller-facing message, already formatted per spec.
    Err(String),
}

impl ToolResponse {
    /// Whether the underlying call succeeded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Dispatches named tool calls to a [`ToolRegistry`] and shapes the result
/// per spec §7. Owns no transport: callers (an eventual stdio/http
/// front end) are responsible for framing [`ToolResponse`] onto the wire.
pub struct McpServer {
    tools: Arc<ToolRegistry>,
}

impl McpServer {
    /// Wraps a tool registry.
    #[must_use]
    pub const fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }

    /// Dispatches one tool call, converting any error into the spec §7
    /// `Error: <message>` text contract rather than propagating it.
    pub async fn handle(&self, name: &str, args: serde_json::Value) -> ToolResponse {
        match self.tools.call(name, args).await {
            Ok(value) => ToolResponse::Ok(value),
            Err(e) => ToolResponse::Err(format!("Error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::SentenceBoundedChunker;
    use crate::coordinator::Coordinator;
    use crate::embedding::HashedFallbackEmbedder;
    use crate::storage::{MigrationManager, SqliteStorage, StorageAdapter};

    fn make_server() -> McpServer {
        let embedder: Arc<dyn crate::embedding::Embedder> = Arc::new(HashedFallbackEmbedder::new());
        let chunker = Arc::new(SentenceBoundedChunker::new());
        let storage: Arc<dyn StorageAdapter> =
            Arc::new(SqliteStorage::in_memory(chunker, embedder.clone()).unwrap());
        let coordinator = Arc::new(Coordinator::new(storage.clone(), embedder));
        let migrations = Arc::new(MigrationManager::new(storage, Vec::new()).unwrap());
        McpServer::new(Arc::new(ToolRegistry::new(coordinator, migrations)))
    }

    #[tokio::test]
    async fn unknown_tool_renders_as_error_text_not_a_propagated_error() {
        let server = make_server();
        let response = server.handle("notARealTool", serde_json::json!({})).await;
        match response {
            ToolResponse::Err(message) => assert!(message.starts_with("Error: ")),
            ToolResponse::Ok(_) => panic!("expected an error response"),
        }
    }

    #[tokio::test]
    async fn successful_call_renders_as_ok() {
        let server = make_server();
        let response = server.handle("readGraph", serde_json::json!({})).await;
        assert!(response.is_ok());
    }
}
