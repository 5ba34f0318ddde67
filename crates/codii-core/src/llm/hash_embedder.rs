//! Deterministic offline embedder
//!
//! Hashes each whitespace/identifier token of the input into a fixed-size
//! bag-of-words vector and L2-normalizes it. Texts sharing tokens get
//! cosine-similar vectors, which is enough for hybrid search to function
//! without an embedding service and gives tests fixed vectors per text.

use super::traits::{l2_normalize, Embedder};
use crate::error::Result;
use sha2::{Digest, Sha256};

pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes(digest[..8].try_into().unwrap()) as usize;
            // Sign bit decorrelates colliding tokens
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket % self.dimensions] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(crate::DEFAULT_EMBEDDING_DIM)
    }
}

impl Embedder for HashEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "hash-bow"
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("fn quicksort(xs: &mut [i32])").unwrap();
        let b = embedder.embed("fn quicksort(xs: &mut [i32])").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_normalized() {
        let embedder = HashEmbedder::new(64);
        let v = embedder.embed("some text with several tokens").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_token_overlap_raises_similarity() {
        let embedder = HashEmbedder::new(128);
        let query = embedder.embed("sort an array").unwrap();
        let related = embedder.embed("// sort an array in place").unwrap();
        let unrelated = embedder.embed("open database connection pool").unwrap();

        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(16);
        let v = embedder.embed("").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
