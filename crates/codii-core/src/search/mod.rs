//! Search engine module
//!
//! - FTS query construction with code-aware expansion (`query`)
//! - HNSW vector index (`ann_index`)
//! - hybrid lexical + vector retrieval with RRF fusion (`hybrid`)

pub mod ann_index;
pub mod hybrid;
pub mod query;

pub use ann_index::{HnswParams, VectorIndex};
pub use hybrid::HybridSearcher;
pub use query::{process_query, ProcessedQuery};

use serde::Serialize;

/// A ranked search hit with file/line provenance
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: i64,
    pub content: String,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub language: String,
    pub chunk_type: String,
    /// RRF contribution from the lexical ranking
    pub bm25_score: f64,
    /// RRF contribution from the vector ranking
    pub vector_score: f64,
    pub combined_score: f64,
    /// Cross-encoder score when reranking ran, else 0
    pub rerank_score: f64,
    /// 1-based position in the final ordering
    pub rank: usize,
}
