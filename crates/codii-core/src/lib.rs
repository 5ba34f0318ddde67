//! Codii Core Library
//!
//! Indexing and retrieval core for local code search.
//!
//! # Features
//! - AST-guided semantic chunking via tree-sitter, with a text fallback
//! - SQLite FTS5 full-text search with BM25 scoring
//! - usearch HNSW vector index with incremental add and soft deletion
//! - Hybrid search with Reciprocal Rank Fusion (RRF)
//! - Merkle-style file-hash tree for incremental re-indexing

pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod llm;
pub mod search;
pub mod snapshot;

pub use config::{repo_id, CodiiConfig};
pub use db::Database;
pub use error::{CodiiError, Error, Result};
pub use index::{Chunk, ChunkType, Chunker, IndexOutcome, IndexRequest, Indexer, Splitter};
pub use llm::{CrossEncoder, Embedder, HashEmbedder, HttpCrossEncoder, HttpEmbedder};
pub use search::{HnswParams, HybridSearcher, SearchResult, VectorIndex};
pub use snapshot::{CodebaseStatus, IndexStatus, SnapshotStore, Stage};

/// Default base directory name under the home directory
pub const BASE_DIR_NAME: &str = ".codii";

/// Output dimension of the default embedding model (all-MiniLM-L6-v2)
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
