//! Indexing pipeline
//!
//! - `scanner`: candidate file discovery and content hashing
//! - `merkle`: change detection between runs
//! - `chunker`: AST and text chunking
//! - `orchestrator`: the staged background pipeline tying it together

pub mod chunker;
pub mod merkle;
pub mod orchestrator;
pub mod scanner;

pub use chunker::{Chunk, ChunkType, Chunker, Splitter};
pub use merkle::{diff, MerkleTree, TreeDiff};
pub use orchestrator::{IndexOutcome, IndexRequest, Indexer};
pub use scanner::{scan_repository, ScanOptions};
