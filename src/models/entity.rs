//! Entity records (spec §3).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Deterministic, newtype-wrapped entity identifier.
///
/// Derived from the entity name: `entity_` followed by the lowercased name
/// with every non-alphanumeric byte replaced by `_`. Two names that
/// normalize to the same id are, by contract, the same entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    /// Derives the id for a given entity name.
    #[must_use]
    pub fn for_name(name: &str) -> Self {
        let mut id = String::with_capacity(name.len() + 7);
        id.push_str("entity_");
        for ch in name.chars() {
            if ch.is_ascii_alphanumeric() {
                id.push(ch.to_ascii_lowercase());
            } else if !ch.is_ascii() {
                // Non-ASCII letters are still "alphanumeric" under Unicode;
                // normalize case but keep the character rather than collapsing
                // it to `_`, so distinct non-ASCII names stay distinguishable.
                if ch.is_alphanumeric() {
                    id.extend(ch.to_lowercase());
                } else {
                    id.push('_');
                }
            } else {
                id.push('_');
            }
        }
        Self(id)
    }

    /// Returns the id as a plain string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wraps an already-computed id string verbatim (used when reading rows
    /// back from storage, where the id is already normalized).
    #[must_use]
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Default entity type when none is supplied.
pub const DEFAULT_ENTITY_TYPE: &str = "CONCEPT";

/// A node in the property graph.
///
/// `observations` is an ordered set under string equality (invariant 5):
/// duplicates are silently dropped on insert, and insertion order is
/// preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Deterministic id, derived from `name`.
    pub id: EntityId,
    /// Globally unique display name.
    pub name: String,
    /// Free-form type, used for statistics bucketing. Defaults to `CONCEPT`.
    pub entity_type: String,
    /// Ordered, deduplicated observation strings.
    pub observations: Vec<String>,
    /// Number of chunks this entity has been linked to via
    /// `linkEntitiesToDocument`, plus graph-chunk generation. Best-effort
    /// usage counter; not part of any invariant.
    pub mentions: u64,
    /// Free-form metadata, opaque to the storage layer.
    pub metadata: serde_json::Value,
    /// Unix timestamp (seconds) of creation.
    pub created_at: u64,
}

impl Entity {
    /// Creates a new entity with the given name, type and observations.
    ///
    /// Observations are deduplicated (first occurrence wins) before being
    /// stored, per invariant 5.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        entity_type: impl Into<String>,
        observations: Vec<String>,
    ) -> Self {
        let name = name.into();
        let id = EntityId::for_name(&name);
        Self {
            id,
            name,
            entity_type: entity_type.into(),
            observations: dedupe_preserving_order(observations),
            mentions: 0,
            metadata: serde_json::Value::Null,
            created_at: crate::current_timestamp(),
        }
    }

    /// Appends observations that are not already present.
    ///
    /// Returns the subset that was actually added (may be empty).
    pub fn add_observations(&mut self, contents: &[String]) -> Vec<String> {
        let mut added = Vec::new();
        for content in contents {
            if !self.observations.contains(content) {
                self.observations.push(content.clone());
                added.push(content.clone());
            }
        }
        added
    }

    /// Removes observations matching any of `contents`, if present.
    ///
    /// Never errors when an entry is absent.
    pub fn remove_observations(&mut self, contents: &[String]) {
        self.observations.retain(|o| !contents.contains(o));
    }

    /// Canonical text used to synthesize this entity's embedding (spec §4.5):
    /// `"{name}. Type: {type}. {observations joined by '. '}"`.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        if self.observations.is_empty() {
            format!("{}. Type: {}. ", self.name, self.entity_type)
        } else {
            format!(
                "{}. Type: {}. {}",
                self.name,
                self.entity_type,
                self.observations.join(". ")
            )
        }
    }

    /// Rendered text for the graph-chunk synthesizer (spec §4.6):
    /// `"{name} is a {type}. {observations}"`.
    #[must_use]
    pub fn graph_chunk_text(&self) -> String {
        format!(
            "{} is a {}. {}",
            self.name,
            self.entity_type,
            self.observations.join(". ")
        )
    }
}

/// Deduplicates while keeping the first occurrence's position.
pub(crate) fn dedupe_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if seen.insert(item.clone()) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_normalizes_case_and_punctuation() {
        assert_eq!(
            EntityId::for_name("Machine Learning").as_str(),
            "entity_machine_learning"
        );
        assert_eq!(
            EntityId::for_name("C++").as_str(),
            EntityId::for_name("c++").as_str()
        );
    }

    #[test]
    fn collisions_on_normalization_share_an_id() {
        let a = EntityId::for_name("Node.js");
        let b = EntityId::for_name("node js");
        // Both normalize punctuation/whitespace to `_`.
        assert_eq!(a.as_str(), "entity_node_js");
        assert_eq!(b.as_str(), "entity_node_js");
    }

    #[test]
    fn new_entity_dedupes_observations_preserving_order() {
        let e = Entity::new(
            "A",
            "CONCEPT",
            vec!["x".into(), "y".into(), "x".into(), "z".into()],
        );
        assert_eq!(e.observations, vec!["x", "y", "z"]);
    }

    #[test]
    fn add_observations_returns_only_new_ones() {
        let mut e = Entity::new("A", "CONCEPT", vec!["x".into(), "y".into()]);
        let added = e.add_observations(&["y".to_string(), "z".to_string()]);
        assert_eq!(added, vec!["z".to_string()]);
        assert_eq!(e.observations, vec!["x", "y", "z"]);
    }

    #[test]
    fn remove_observations_is_noop_when_absent() {
        let mut e = Entity::new("A", "CONCEPT", vec!["x".into()]);
        e.remove_observations(&["not-present".to_string()]);
        assert_eq!(e.observations, vec!["x".to_string()]);
    }

    #[test]
    fn embedding_text_matches_spec_template() {
        let e = Entity::new(
            "JavaScript",
            "TECHNOLOGY",
            vec!["Programming language".into()],
        );
        assert_eq!(
            e.embedding_text(),
            "JavaScript. Type: TECHNOLOGY. Programming language"
        );
    }
}
