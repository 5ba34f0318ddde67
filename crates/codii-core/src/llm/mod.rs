//! Model adapters
//!
//! One heavy embedder per process: `shared_embedder` lazily builds the
//! configured implementation on first use and every caller shares it.

mod hash_embedder;
mod http_embedder;
mod http_reranker;
mod traits;

pub use hash_embedder::HashEmbedder;
pub use http_embedder::HttpEmbedder;
pub use http_reranker::HttpCrossEncoder;
pub use traits::{l2_normalize, CrossEncoder, Embedder};

use std::sync::{Arc, OnceLock};

static SHARED_EMBEDDER: OnceLock<Arc<dyn Embedder>> = OnceLock::new();

/// Process-wide embedder handle. Uses the HTTP service when
/// `CODII_EMBEDDING_URL` is configured, otherwise the deterministic offline
/// embedder.
pub fn shared_embedder() -> Arc<dyn Embedder> {
    SHARED_EMBEDDER
        .get_or_init(|| match HttpEmbedder::from_env() {
            Ok(embedder) => {
                tracing::info!(model = embedder.model_name(), "using HTTP embedding service");
                Arc::new(embedder)
            }
            Err(_) => {
                tracing::info!("no embedding service configured, using offline hash embedder");
                Arc::new(HashEmbedder::default())
            }
        })
        .clone()
}

/// Cross-encoder handle, if a rerank service is configured
pub fn load_reranker() -> Option<Arc<dyn CrossEncoder>> {
    match HttpCrossEncoder::from_env() {
        Ok(reranker) => Some(Arc::new(reranker)),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_embedder_is_singleton() {
        let a = shared_embedder();
        let b = shared_embedder();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
