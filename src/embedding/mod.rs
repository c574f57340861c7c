//! Text-to-vector embedding (spec §4.5).
//!
//! Two implementations share the [`Embedder`] trait: [`FastEmbedder`],
//! feature-gated on an ONNX runtime (the external "text → vector" oracle
//! per spec §1, stubbed here since shipping model weights is out of
//! scope), and [`HashedFallbackEmbedder`], the always-available
//! deterministic fallback the spec requires so the rest of the pipeline —
//! including tests — keeps working without a model download.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

mod fallback;
mod fastembed;

pub use fallback::HashedFallbackEmbedder;
pub use fastembed::FastEmbedder;

use crate::Result;

/// Maps text to a fixed-dimension, L2-normalized vector.
///
/// All vectors stored in the system are unit-norm; cosine distance is the
/// only similarity measure (spec §4.5).
pub trait Embedder: Send + Sync {
    /// The dimension `D` of every vector this embedder produces.
    fn dimensions(&self) -> usize;

    /// Embeds a single text, returning a unit-norm vector of length
    /// [`Self::dimensions`].
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying model fails. The fallback
    /// embedder never errors.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds a batch of texts. The default implementation calls
    /// [`Self::embed`] per item; implementations backed by a batching
    /// oracle should override this.
    ///
    /// # Errors
    ///
    /// Returns an error if any individual embed call fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// L2-normalizes a vector in place. A zero vector is left unchanged
/// (dividing by zero would produce NaNs).
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine distance between two equal-length vectors: `1 - dot(a, b)` for
/// unit-norm inputs.
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Cosine similarity between two equal-length vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_normalize_produces_unit_vectors() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![0.6, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_similarity_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_is_one_minus_similarity() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
    }
}
