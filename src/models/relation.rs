//! Relation records (spec §3).

use super::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deterministic relation identifier: `rel_{source_id}_{type_lowercased}_{target_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationId(String);

impl RelationId {
    /// Derives the id for a `(source, type, target)` triple, given the
    /// already-normalized source/target entity ids.
    #[must_use]
    pub fn new(source_id: &EntityId, relation_type: &str, target_id: &EntityId) -> Self {
        Self(format!(
            "rel_{}_{}_{}",
            source_id.as_str(),
            relation_type.to_lowercase(),
            target_id.as_str()
        ))
    }

    /// Returns the id as a plain string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wraps an already-computed id string verbatim.
    #[must_use]
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A directed edge in the property graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Deterministic id, derived from `(source_id, relation_type, target_id)`.
    pub id: RelationId,
    /// Source entity id.
    pub source_id: EntityId,
    /// Target entity id.
    pub target_id: EntityId,
    /// Free-form relation type (e.g. `USES`, `IS_A`).
    pub relation_type: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Free-form metadata, opaque to the storage layer.
    pub metadata: serde_json::Value,
    /// Unix timestamp (seconds) of creation.
    pub created_at: u64,
}

impl Relation {
    /// Creates a new relation between two (already-resolved) entity ids.
    #[must_use]
    pub fn new(source_id: EntityId, target_id: EntityId, relation_type: impl Into<String>) -> Self {
        let relation_type = relation_type.into();
        let id = RelationId::new(&source_id, &relation_type, &target_id);
        Self {
            id,
            source_id,
            target_id,
            relation_type,
            confidence: 1.0,
            metadata: serde_json::Value::Null,
            created_at: crate::current_timestamp(),
        }
    }

    /// Rendered text for the graph-chunk synthesizer and the embedding text
    /// (spec §4.5/§4.6): `"{source_name} {type_lowercased_spaces} {target_name}"`.
    #[must_use]
    pub fn render_text(source_name: &str, relation_type: &str, target_name: &str) -> String {
        format!(
            "{source_name} {} {target_name}",
            relation_type.to_lowercase().replace('_', " ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_derived_from_endpoints_and_type() {
        let src = EntityId::for_name("React");
        let dst = EntityId::for_name("JavaScript");
        let id = RelationId::new(&src, "USES", &dst);
        assert_eq!(id.as_str(), "rel_entity_react_uses_entity_javascript");
    }

    #[test]
    fn render_text_lowercases_and_spaces_the_type() {
        assert_eq!(
            Relation::render_text("Deep Learning", "IS_A", "Machine Learning"),
            "Deep Learning is a Machine Learning"
        );
    }
}
