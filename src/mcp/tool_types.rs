//! Argument types for MCP tools (spec §6).
//!
//! One `Deserialize` struct per tool argument shape, matching the
//! camelCase field names spec §6 gives each RPC. Unknown fields are
//! rejected (`deny_unknown_fields`) per REDESIGN FLAGS §9's "dynamic opts
//! dictionaries -> enumerated option structs": the RPC boundary is the
//! one place a malformed/extra field should fail fast as a
//! [`crate::Error::Validation`], not be silently ignored.

use serde::Deserialize;

/// One row of `createEntities({entities:[...]})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EntityArg {
    /// Entity display name.
    pub name: String,
    /// Entity type (defaults to `CONCEPT` if omitted/empty).
    #[serde(default)]
    pub entity_type: String,
    /// Observation strings to seed the entity with.
    #[serde(default)]
    pub observations: Vec<String>,
}

/// `createEntities({entities:[{name,entityType,observations[]}]})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateEntitiesArgs {
    /// Entities to insert-or-ignore.
    pub entities: Vec<EntityArg>,
}

/// One row of `createRelations`/`deleteRelations`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelationArg {
    /// Source entity name.
    pub from: String,
    /// Target entity name.
    pub to: String,
    /// Relation type.
    pub relation_type: String,
}

/// `createRelations({relations:[{from,to,relationType}]})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateRelationsArgs {
    /// Relation triples to insert-or-ignore.
    pub relations: Vec<RelationArg>,
}

/// `deleteRelations({relations:[...]})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeleteRelationsArgs {
    /// Relation triples to remove.
    pub relations: Vec<RelationArg>,
}

/// One row of `addObservations`/`deleteObservations`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ObservationArg {
    /// The entity these observations belong to.
    pub entity_name: String,
    /// Observation strings to add or remove.
    #[serde(default)]
    pub contents: Vec<String>,
}

/// `addObservations({observations:[{entityName,contents[]}]})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddObservationsArgs {
    /// Per-entity observation additions.
    pub observations: Vec<ObservationArg>,
}

/// `deleteObservations({deletions:[{entityName,observations[]}]})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeleteObservationsArgs {
    /// Per-entity observation removals. Field is `observations` here (per
    /// spec §6), distinct from `AddObservationsArgs`'s `contents`.
    pub deletions: Vec<DeletionArg>,
}

/// One row of `deleteObservations({deletions:[...]})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeletionArg {
    /// The entity these observations belong to.
    pub entity_name: String,
    /// Observation strings to remove.
    #[serde(default)]
    pub observations: Vec<String>,
}

/// `deleteEntities({entityNames:[...]})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeleteEntitiesArgs {
    /// Names of entities to cascade-delete.
    pub entity_names: Vec<String>,
}

/// `searchNodes({query, limit?})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchNodesArgs {
    /// Free-text query.
    pub query: String,
    /// Result budget, split between entities and document chunks.
    pub limit: Option<usize>,
}

/// `openNodes({names:[...]})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OpenNodesArgs {
    /// Exact entity names to look up.
    pub names: Vec<String>,
}

/// `storeDocument({id, content, metadata?})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoreDocumentArgs {
    /// Caller-supplied document id.
    pub id: String,
    /// Full document text.
    pub content: String,
    /// Free-form metadata (e.g. `{"title": "..."}`).
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Chunker `maxTokens` override.
    pub max_tokens: Option<usize>,
    /// Chunker `overlap` override.
    pub overlap: Option<usize>,
}

/// `extractTerms({documentId, minLength?, includeCapitalized?, customPatterns?})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExtractTermsArgs {
    /// The document to extract terms from.
    pub document_id: String,
    /// Minimum candidate-term length (default 3).
    pub min_length: Option<usize>,
    /// Whether to extract capitalized-phrase matches (default true).
    pub include_capitalized: Option<bool>,
    /// Additional case-insensitive user regex patterns.
    pub custom_patterns: Option<Vec<String>>,
}

/// `linkEntitiesToDocument({documentId, entityNames[]})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LinkEntitiesToDocumentArgs {
    /// The document whose chunks get linked.
    pub document_id: String,
    /// Entity names to link to every chunk of the document.
    pub entity_names: Vec<String>,
}

/// `hybridSearch({query, limit?, useGraph?})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HybridSearchArgs {
    /// Free-text query.
    pub query: String,
    /// Result count (default 5).
    pub limit: Option<usize>,
    /// Whether to apply the graph-proximity boost (default true).
    pub use_graph: Option<bool>,
}

/// `getDetailedContext({chunkId, includeSurrounding?})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GetDetailedContextArgs {
    /// The chunk to fetch.
    pub chunk_id: String,
    /// Whether to include `chunk_index ± 1` neighbors (default false).
    pub include_surrounding: Option<bool>,
}

/// `deleteDocuments({documentIds})`: either a single id or a list (spec §6).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DocumentIds {
    /// A single document id.
    One(String),
    /// Several document ids.
    Many(Vec<String>),
}

impl DocumentIds {
    /// Normalizes to a flat list of ids.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(id) => vec![id],
            Self::Many(ids) => ids,
        }
    }
}

/// `deleteDocuments({documentIds})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeleteDocumentsArgs {
    /// A document id, or a list of document ids, to cascade-delete.
    pub document_ids: DocumentIds,
}

/// `listDocuments({includeMetadata?})`.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListDocumentsArgs {
    /// Whether to include each document's metadata in the result rows.
    pub include_metadata: Option<bool>,
}

/// `rollbackMigration({targetVersion})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RollbackMigrationArgs {
    /// The version to roll back to.
    pub target_version: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_ids_accepts_single_string_or_list() {
        let one: DocumentIds = serde_json::from_str(r#""doc1""#).unwrap();
        assert_eq!(one.into_vec(), vec!["doc1".to_string()]);

        let many: DocumentIds = serde_json::from_str(r#"["doc1","doc2"]"#).unwrap();
        assert_eq!(many.into_vec(), vec!["doc1".to_string(), "doc2".to_string()]);
    }

    #[test]
    fn create_entities_args_rejects_unknown_fields() {
        let raw = r#"{"entities":[{"name":"A","entityType":"X","observations":[],"bogus":1}]}"#;
        let result: Result<CreateEntitiesArgs, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }

    #[test]
    fn extract_terms_args_parses_camel_case() {
        let raw = r#"{"documentId":"doc1","minLength":4,"includeCapitalized":false,"customPatterns":["\\d+"]}"#;
        let args: ExtractTermsArgs = serde_json::from_str(raw).unwrap();
        assert_eq!(args.document_id, "doc1");
        assert_eq!(args.min_length, Some(4));
        assert_eq!(args.include_capitalized, Some(false));
        assert_eq!(args.custom_patterns, Some(vec![r"\d+".to_string()]));
    }
}
