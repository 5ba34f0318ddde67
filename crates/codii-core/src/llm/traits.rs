//! Model trait definitions
//!
//! The embedding and cross-encoder models are external collaborators: the
//! core consumes them as pure functions behind these traits.

use crate::error::Result;

/// Embedding generation
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts. Output vectors are L2-normalized and all have
    /// `dimensions()` components; callers must never mix dimensions.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| crate::error::CodiiError::Embedding("no embedding returned".into()))
    }

    /// Fixed output dimension
    fn dimensions(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Cross-encoder relevance scoring for reranking
pub trait CrossEncoder: Send + Sync {
    /// Score each `(query, text)` pair; higher is more relevant, normalized
    /// to [0, 1]
    fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>>;

    fn model_name(&self) -> &str;
}

/// Scale a vector to unit length. Zero vectors are left unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}
