//! Deterministic fallback embedder (spec §4.5, Open Question (c)).
//!
//! Used whenever the embedding oracle is unavailable (no model configured,
//! or the `fastembed-embeddings` feature is not compiled in). A hashed
//! bag-of-features scheme: word unigrams and bigrams plus character
//! trigrams, each hashed into a fixed-width vector with a positional
//! decay, then L2-normalized. The spec only requires this be
//! deterministic and unit-norm (Open Question (c): its cosine geometry is
//! not guaranteed to be semantically meaningful), which both this scheme
//! and its tests rely on exclusively.

use super::{Embedder, l2_normalize};
use crate::Result;

/// Hashed bag-of-features fallback embedder.
pub struct HashedFallbackEmbedder {
    dimensions: usize,
}

impl HashedFallbackEmbedder {
    /// Default embedding dimension, matching the spec's default
    /// `VECTOR_DIMENSIONS`.
    pub const DEFAULT_DIMENSIONS: usize = 384;

    /// Creates a fallback embedder at the default dimension.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dimensions: Self::DEFAULT_DIMENSIONS,
        }
    }

    /// Creates a fallback embedder at a caller-chosen dimension (to match
    /// a non-default `VECTOR_DIMENSIONS`).
    #[must_use]
    pub const fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashedFallbackEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

/// FNV-1a, chosen over `DefaultHasher` so the mapping from feature string
/// to index is documented and stable across toolchain versions rather
/// than relying on unspecified standard-library behavior.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01B3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

impl Embedder for HashedFallbackEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; self.dimensions.max(1)];
        let normalized = text.to_lowercase();
        let tokens: Vec<&str> = normalized.split_whitespace().collect();

        for (position, token) in tokens.iter().enumerate() {
            let decay = 1.0 / (1.0 + position as f32 * 0.02);
            add_feature(&mut v, token.as_bytes(), decay);
        }

        for pair in tokens.windows(2) {
            let combined = format!("{} {}", pair[0], pair[1]);
            add_feature(&mut v, combined.as_bytes(), 0.5);
        }

        let chars: Vec<char> = normalized.chars().collect();
        if chars.len() >= 3 {
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                add_feature(&mut v, trigram.as_bytes(), 0.2);
            }
        }

        l2_normalize(&mut v);
        Ok(v)
    }
}

/// Hashes `feature` into the vector twice: once to pick an index, once
/// (from a different bit range of the same hash) to pick a sign, so
/// unrelated features partially cancel instead of only ever adding.
fn add_feature(v: &mut [f32], feature: &[u8], weight: f32) {
    let hash = fnv1a(feature);
    let len = v.len() as u64;
    let idx = (hash % len) as usize;
    let sign = if (hash >> 17) & 1 == 0 { 1.0 } else { -1.0 };
    v[idx] += sign * weight;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_is_deterministic() {
        let embedder = HashedFallbackEmbedder::new();
        let a = embedder.embed("machine learning is great").unwrap();
        let b = embedder.embed("machine learning is great").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn embed_produces_unit_norm_vectors() {
        let embedder = HashedFallbackEmbedder::new();
        let v = embedder.embed("some arbitrary text to embed").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4, "norm was {norm}");
    }

    #[test]
    fn embed_respects_configured_dimensions() {
        let embedder = HashedFallbackEmbedder::with_dimensions(64);
        let v = embedder.embed("hello world").unwrap();
        assert_eq!(v.len(), 64);
    }

    #[test]
    fn different_texts_usually_differ() {
        let embedder = HashedFallbackEmbedder::new();
        let a = embedder.embed("artificial intelligence").unwrap();
        let b = embedder.embed("completely unrelated sentence about cats").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_text_is_still_unit_norm_or_zero() {
        let embedder = HashedFallbackEmbedder::new();
        let v = embedder.embed("").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!(norm < 1e-6 || (norm - 1.0).abs() < 1e-4);
    }
}
