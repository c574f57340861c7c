//! `FastEmbed`-backed embedder (feature-gated embedding oracle).
//!
//! The embedding oracle itself is an external collaborator per spec §1
//! ("text → fixed-dimension unit vector"); this wraps the teacher's
//! chosen `fastembed` crate as that oracle when the `fastembed-embeddings`
//! feature is compiled in. Without the feature, [`super::HashedFallbackEmbedder`]
//! is the only embedder available, which is also the crate's default.

use super::Embedder;
use crate::Result;

/// `all-MiniLM-L6-v2`-backed embedder via `fastembed`/onnxruntime.
pub struct FastEmbedder {
    dimensions: usize,
    #[cfg(feature = "fastembed-embeddings")]
    inner: std::sync::Mutex<::fastembed::TextEmbedding>,
}

impl FastEmbedder {
    /// Dimension of `all-MiniLM-L6-v2`, the teacher's default model.
    pub const DEFAULT_DIMENSIONS: usize = 384;

    /// Initializes the embedding model.
    ///
    /// # Errors
    ///
    /// Returns an error if the ONNX runtime or model weights cannot be
    /// loaded (network access, missing cache, unsupported platform).
    #[cfg(feature = "fastembed-embeddings")]
    pub fn new() -> Result<Self> {
        use fastembed::{InitOptions, TextEmbedding};

        let inner = TextEmbedding::try_new(InitOptions::default()).map_err(|e| {
            crate::Error::Backend {
                operation: "fastembed_init".to_string(),
                cause: e.to_string(),
            }
        })?;

        Ok(Self {
            dimensions: Self::DEFAULT_DIMENSIONS,
            inner: std::sync::Mutex::new(inner),
        })
    }

    /// Stub constructor used when the `fastembed-embeddings` feature is
    /// not compiled in; the embedding oracle is external and this build
    /// carries no model weights.
    #[cfg(not(feature = "fastembed-embeddings"))]
    pub const fn new() -> Result<Self> {
        Ok(Self {
            dimensions: Self::DEFAULT_DIMENSIONS,
        })
    }
}

impl Embedder for FastEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[cfg(feature = "fastembed-embeddings")]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text])?;
        Ok(vectors.pop().unwrap_or_default())
    }

    #[cfg(feature = "fastembed-embeddings")]
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut inner = self.inner.lock().map_err(|_| crate::Error::Backend {
            operation: "fastembed_embed".to_string(),
            cause: "embedding model mutex poisoned".to_string(),
        })?;

        let documents: Vec<String> = texts.iter().map(|t| (*t).to_string()).collect();
        let mut embeddings =
            inner
                .embed(documents, None)
                .map_err(|e| crate::Error::Backend {
                    operation: "fastembed_embed".to_string(),
                    cause: e.to_string(),
                })?;

        for v in &mut embeddings {
            super::l2_normalize(v);
        }
        Ok(embeddings)
    }

    #[cfg(not(feature = "fastembed-embeddings"))]
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(crate::Error::Backend {
            operation: "fastembed_embed".to_string(),
            cause: "built without the fastembed-embeddings feature; use HashedFallbackEmbedder"
                .to_string(),
        })
    }
}
