//! Database schema and initialization

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;

/// Main database handle. One per repository index; not shared across
/// threads (each worker opens its own).
pub struct Database {
    pub(crate) conn: Connection,
}

const CREATE_TABLES: &str = r#"
-- Unit of retrieval
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content TEXT NOT NULL,
    path TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    language TEXT NOT NULL DEFAULT '',
    chunk_type TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_path ON chunks(path);

-- Full-text index over chunks, kept in sync by triggers
CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    content,
    path,
    language,
    content='chunks',
    content_rowid='id'
);

-- Observed file hashes; last_modified is the time of last observation
CREATE TABLE IF NOT EXISTS files (
    path TEXT PRIMARY KEY,
    hash TEXT NOT NULL,
    last_modified TEXT NOT NULL
);
"#;

const CREATE_TRIGGERS: &str = r#"
CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
    INSERT INTO chunks_fts(rowid, content, path, language)
    VALUES (new.id, new.content, new.path, new.language);
END;

CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, content, path, language)
    VALUES ('delete', old.id, old.content, old.path, old.language);
END;

CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, content, path, language)
    VALUES ('delete', old.id, old.content, old.path, old.language);
    INSERT INTO chunks_fts(rowid, content, path, language)
    VALUES (new.id, new.content, new.path, new.language);
END;
"#;

impl Database {
    /// Open database at path, creating parent directories if necessary
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        self.conn.execute_batch(CREATE_TABLES)?;
        self.conn.execute_batch(CREATE_TRIGGERS)?;

        self.check_fts_consistency()?;
        Ok(())
    }

    /// Verify the FTS mirror matches the primary table; rebuild it if not.
    /// A mismatch can only come from a crash between trigger firings.
    fn check_fts_consistency(&self) -> Result<()> {
        let chunks: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        let fts: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks_fts", [], |row| row.get(0))
            .unwrap_or(-1);

        if chunks != fts {
            tracing::warn!(chunks, fts, "FTS index out of sync, rebuilding");
            self.conn
                .execute("INSERT INTO chunks_fts(chunks_fts) VALUES ('rebuild')", [])?;
        }
        Ok(())
    }
}
