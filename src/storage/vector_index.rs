//! In-process vector search for the embedded backend (spec §4.1:
//! "approximate-nearest-neighbor match").
//!
//! [`BruteForceIndex`] is the dependency-free default used by tests and by
//! any build without the `usearch-hnsw` feature: an exact cosine scan.
//! With `usearch-hnsw` compiled in, `SqliteStorage` can instead delegate to
//! the `usearch` crate's HNSW index for approximate search at scale; the
//! contract ([`VectorIndex`]) is identical either way so callers never
//! branch on which one is active.

use crate::embedding::cosine_distance;
use crate::models::{Chunk, ChunkKind};

/// One vector-search hit.
#[derive(Debug, Clone)]
pub struct VectorMatch {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Cosine distance to the query vector (ascending = more similar).
    pub distance: f32,
}

/// A queryable collection of (key, vector) pairs.
pub trait VectorIndex: Send + Sync {
    /// Returns up to `limit` nearest neighbors to `query`, ascending by
    /// cosine distance.
    fn search(&self, query: &[f32], limit: usize) -> Vec<VectorMatch>;
}

/// Exact brute-force cosine-distance scan.
#[derive(Debug, Default, Clone)]
pub struct BruteForceIndex {
    entries: Vec<(Chunk, Vec<f32>)>,
}

impl BruteForceIndex {
    /// Builds an index over the given (chunk, vector) pairs.
    #[must_use]
    pub const fn new(entries: Vec<(Chunk, Vec<f32>)>) -> Self {
        Self { entries }
    }
}

impl VectorIndex for BruteForceIndex {
    fn search(&self, query: &[f32], limit: usize) -> Vec<VectorMatch> {
        let mut matches: Vec<VectorMatch> = self
            .entries
            .iter()
            .map(|(chunk, vector)| VectorMatch {
                chunk: chunk.clone(),
                distance: cosine_distance(query, vector),
            })
            .collect();
        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(limit);
        matches
    }
}

/// True if `kind` is reachable from a query that only ever asks for chunk
/// search (i.e. always — kept as a named predicate so call sites read as
/// intent, not an unconditional `true`).
#[must_use]
pub const fn is_searchable_chunk_kind(_kind: &ChunkKind) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityId;

    #[test]
    fn brute_force_orders_by_ascending_distance() {
        let a = Chunk::new_entity(EntityId::for_name("A"), "alpha");
        let b = Chunk::new_entity(EntityId::for_name("B"), "beta");
        let index = BruteForceIndex::new(vec![
            (a.clone(), vec![0.0, 1.0]),
            (b.clone(), vec![1.0, 0.0]),
        ]);

        let results = index.search(&[1.0, 0.0], 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.chunk_id, b.chunk_id);
        assert!(results[0].distance <= results[1].distance);
    }

    #[test]
    fn brute_force_respects_limit() {
        let entries: Vec<_> = (0..5)
            .map(|i| {
                (
                    Chunk::new_entity(EntityId::for_name(&format!("E{i}")), "text"),
                    vec![i as f32, 0.0],
                )
            })
            .collect();
        let index = BruteForceIndex::new(entries);
        let results = index.search(&[0.0, 1.0], 2);
        assert_eq!(results.len(), 2);
    }
}
