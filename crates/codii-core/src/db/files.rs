//! Observed file records

use super::Database;
use crate::error::Result;
use chrono::Utc;
use rusqlite::params;

impl Database {
    /// Record (or refresh) a file's content hash. `last_modified` is the
    /// time of last observation, so it updates on every call.
    pub fn upsert_file(&self, path: &str, hash: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO files (path, hash, last_modified) VALUES (?1, ?2, ?3)
             ON CONFLICT(path) DO UPDATE SET hash = excluded.hash, last_modified = excluded.last_modified",
            params![path, hash, now],
        )?;
        Ok(())
    }

    pub fn delete_file(&self, path: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM files WHERE path = ?1", params![path])?;
        Ok(())
    }

    pub fn file_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn clear_all_files(&self) -> Result<()> {
        self.conn.execute("DELETE FROM files", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_hash(db: &Database, path: &str) -> Option<String> {
        db.conn
            .query_row(
                "SELECT hash FROM files WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .ok()
    }

    #[test]
    fn test_upsert_keeps_one_record_per_path() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_file("a.py", "hash1").unwrap();
        db.upsert_file("a.py", "hash2").unwrap();

        assert_eq!(db.file_count().unwrap(), 1);
        assert_eq!(stored_hash(&db, "a.py").as_deref(), Some("hash2"));
    }

    #[test]
    fn test_delete_and_clear() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_file("a.py", "h1").unwrap();
        db.upsert_file("b.py", "h2").unwrap();

        db.delete_file("a.py").unwrap();
        assert_eq!(stored_hash(&db, "a.py"), None);
        assert_eq!(db.file_count().unwrap(), 1);

        db.clear_all_files().unwrap();
        assert_eq!(db.file_count().unwrap(), 0);
    }
}
