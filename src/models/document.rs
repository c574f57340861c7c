//! Document records (spec §3).

use serde::{Deserialize, Serialize};

/// A caller-supplied text document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Caller-supplied, unique identifier.
    pub id: String,
    /// Full document text.
    pub content: String,
    /// Free-form metadata (e.g. a `title` field used by search results).
    pub metadata: serde_json::Value,
    /// Unix timestamp (seconds) of creation.
    pub created_at: u64,
}

impl Document {
    /// Creates a new document.
    #[must_use]
    pub fn new(id: impl Into<String>, content: impl Into<String>, metadata: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
            created_at: crate::current_timestamp(),
        }
    }

    /// Returns the `title` metadata field, falling back to the document id.
    #[must_use]
    pub fn title(&self) -> &str {
        self.metadata
            .get("title")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(&self.id)
    }
}
