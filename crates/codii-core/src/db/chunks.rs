//! Chunk storage, retrieval and lexical search

use super::Database;
use crate::config::normalize_extension;
use crate::error::Result;
use crate::index::chunker::Chunk;
use chrono::Utc;
use rusqlite::params;

/// A chunk as stored
#[derive(Debug, Clone)]
pub struct ChunkRow {
    pub id: i64,
    pub content: String,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub language: String,
    pub chunk_type: String,
    pub created_at: String,
}

/// One lexical search hit: 1-based rank and raw BM25 score (lower is better)
#[derive(Debug, Clone, Copy)]
pub struct FtsMatch {
    pub id: i64,
    pub rank: usize,
    pub score: f64,
}

impl Database {
    /// Batch-insert chunks, returning their assigned ids in order. Atomic:
    /// either every chunk lands (with its FTS mirror row, via trigger) or
    /// none do.
    pub fn insert_chunks(&self, chunks: &[Chunk]) -> Result<Vec<i64>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let now = Utc::now().to_rfc3339();

        self.conn.execute("BEGIN IMMEDIATE", [])?;
        let result = (|| {
            let mut ids = Vec::with_capacity(chunks.len());
            let mut stmt = self.conn.prepare_cached(
                "INSERT INTO chunks (content, path, start_line, end_line, language, chunk_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for chunk in chunks {
                stmt.execute(params![
                    chunk.content,
                    chunk.path,
                    chunk.start_line as i64,
                    chunk.end_line as i64,
                    chunk.language,
                    chunk.chunk_type.as_str(),
                    now,
                ])?;
                ids.push(self.conn.last_insert_rowid());
            }
            Ok(ids)
        })();

        if result.is_ok() {
            self.conn.execute("COMMIT", [])?;
        } else {
            let _ = self.conn.execute("ROLLBACK", []);
        }
        result
    }

    /// Remove all chunks for a path, returning the removed ids so the caller
    /// can cascade to the vector index. FTS rows go via the delete trigger.
    pub fn delete_chunks_by_path(&self, path: &str) -> Result<Vec<i64>> {
        self.conn.execute("BEGIN IMMEDIATE", [])?;
        let result = (|| {
            let mut stmt = self
                .conn
                .prepare_cached("SELECT id FROM chunks WHERE path = ?1")?;
            let ids = stmt
                .query_map(params![path], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            self.conn
                .execute("DELETE FROM chunks WHERE path = ?1", params![path])?;
            Ok(ids)
        })();

        if result.is_ok() {
            self.conn.execute("COMMIT", [])?;
        } else {
            let _ = self.conn.execute("ROLLBACK", []);
        }
        result
    }

    /// Fetch chunks in the order of the given ids; missing ids are omitted
    pub fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<ChunkRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, content, path, start_line, end_line, language, chunk_type, created_at
             FROM chunks WHERE id = ?1",
        )?;

        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            let row = stmt.query_row(params![id], |row| {
                Ok(ChunkRow {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    path: row.get(2)?,
                    start_line: row.get::<_, i64>(3)? as usize,
                    end_line: row.get::<_, i64>(4)? as usize,
                    language: row.get(5)?,
                    chunk_type: row.get(6)?,
                    created_at: row.get(7)?,
                })
            });
            match row {
                Ok(r) => rows.push(r),
                Err(rusqlite::Error::QueryReturnedNoRows) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(rows)
    }

    /// BM25 lexical search. `query` must already be a valid FTS5 expression
    /// (see `search::query`). Results come back best-first with 1-based
    /// ranks. With an extension filter, only matching paths are returned.
    pub fn search_fts(
        &self,
        query: &str,
        limit: usize,
        extension_filter: Option<&[String]>,
    ) -> Result<Vec<FtsMatch>> {
        let mut sql = String::from(
            "SELECT c.id, bm25(chunks_fts) AS score
             FROM chunks_fts
             JOIN chunks c ON chunks_fts.rowid = c.id
             WHERE chunks_fts MATCH ?1",
        );

        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(query.to_string())];

        if let Some(exts) = extension_filter {
            if !exts.is_empty() {
                let mut clauses = Vec::with_capacity(exts.len());
                for ext in exts {
                    params_vec.push(Box::new(format!("%{}", normalize_extension(ext))));
                    clauses.push(format!("c.path LIKE ?{}", params_vec.len()));
                }
                sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
            }
        }

        params_vec.push(Box::new(limit as i64));
        sql.push_str(&format!(" ORDER BY score LIMIT ?{}", params_vec.len()));

        let mut stmt = self.conn.prepare(&sql)?;
        let hits = stmt
            .query_map(
                rusqlite::params_from_iter(params_vec.iter().map(|p| p.as_ref())),
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?)),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(i, (id, score))| FtsMatch {
                id,
                rank: i + 1,
                score,
            })
            .collect())
    }

    pub fn chunk_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn all_chunk_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare("SELECT id FROM chunks ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn clear_all_chunks(&self) -> Result<usize> {
        let count = self.conn.execute("DELETE FROM chunks", [])?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::chunker::{Chunk, ChunkType};

    fn chunk(content: &str, path: &str, start: usize, end: usize) -> Chunk {
        Chunk {
            content: content.to_string(),
            path: path.to_string(),
            start_line: start,
            end_line: end,
            language: "python".to_string(),
            chunk_type: ChunkType::Function,
        }
    }

    fn fts_count(db: &Database) -> i64 {
        db.conn
            .query_row("SELECT COUNT(*) FROM chunks_fts", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_insert_returns_monotonic_ids() {
        let db = Database::open_in_memory().unwrap();
        let ids = db
            .insert_chunks(&[
                chunk("def a(): pass", "a.py", 1, 1),
                chunk("def b(): pass", "a.py", 3, 3),
            ])
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids[1] > ids[0]);
    }

    #[test]
    fn test_fts_mirrors_primary_table() {
        let db = Database::open_in_memory().unwrap();
        db.insert_chunks(&[
            chunk("def alpha(): pass", "a.py", 1, 1),
            chunk("def beta(): pass", "b.py", 1, 1),
        ])
        .unwrap();
        assert_eq!(fts_count(&db), 2);

        db.delete_chunks_by_path("a.py").unwrap();
        assert_eq!(fts_count(&db), 1);
        assert_eq!(db.chunk_count().unwrap(), 1);
    }

    #[test]
    fn test_delete_returns_removed_ids() {
        let db = Database::open_in_memory().unwrap();
        let ids = db
            .insert_chunks(&[
                chunk("one", "x.py", 1, 1),
                chunk("two", "x.py", 2, 2),
                chunk("three", "y.py", 1, 1),
            ])
            .unwrap();

        let removed = db.delete_chunks_by_path("x.py").unwrap();
        assert_eq!(removed, vec![ids[0], ids[1]]);
    }

    #[test]
    fn test_get_by_ids_preserves_order_and_omits_missing() {
        let db = Database::open_in_memory().unwrap();
        let ids = db
            .insert_chunks(&[chunk("first", "a.py", 1, 1), chunk("second", "a.py", 2, 2)])
            .unwrap();

        let rows = db.get_by_ids(&[ids[1], 9999, ids[0]]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].content, "second");
        assert_eq!(rows[1].content, "first");
    }

    #[test]
    fn test_search_fts_ranks_best_first() {
        let db = Database::open_in_memory().unwrap();
        db.insert_chunks(&[
            chunk("def parse_config(): load the config file", "cfg.py", 1, 2),
            chunk("def unrelated(): nothing here", "other.py", 1, 1),
            chunk("config config config everywhere", "cfg2.py", 1, 1),
        ])
        .unwrap();

        let hits = db.search_fts("config*", 10, None).unwrap();
        assert!(hits.len() >= 2);
        assert_eq!(hits[0].rank, 1);
        // BM25 scores come back ascending (more negative = better match)
        assert!(hits[0].score <= hits[hits.len() - 1].score);
    }

    #[test]
    fn test_search_fts_extension_filter() {
        let db = Database::open_in_memory().unwrap();
        db.insert_chunks(&[
            chunk("shared_token python side", "a.py", 1, 1),
            chunk("shared_token rust side", "b.rs", 1, 1),
        ])
        .unwrap();

        let hits = db
            .search_fts("shared_token*", 10, Some(&["py".to_string()]))
            .unwrap();
        assert_eq!(hits.len(), 1);
        let rows = db.get_by_ids(&[hits[0].id]).unwrap();
        assert_eq!(rows[0].path, "a.py");
    }

    #[test]
    fn test_clear_all_chunks_empties_fts() {
        let db = Database::open_in_memory().unwrap();
        db.insert_chunks(&[chunk("def gone(): pass", "a.py", 1, 1)])
            .unwrap();
        db.clear_all_chunks().unwrap();
        assert_eq!(db.chunk_count().unwrap(), 0);
        assert_eq!(fts_count(&db), 0);
        assert!(db.search_fts("gone*", 10, None).unwrap().is_empty());
    }
}
