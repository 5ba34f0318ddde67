//! Chunk store
//!
//! SQLite-backed storage with:
//! - the `chunks` primary table and a path index
//! - `chunks_fts`, a trigger-synced FTS5 index with BM25 ranking
//! - the `files` table of observed content hashes

mod chunks;
mod files;
mod schema;

pub use chunks::{ChunkRow, FtsMatch};
pub use schema::Database;
