//! Snapshot store: cross-repository indexing status
//!
//! One JSON file maps each repository path to its status. Every mutation is
//! a read-modify-write under an exclusive advisory file lock, written to a
//! sibling temp file and renamed atomically over the target.

use crate::error::Result;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    NotFound,
    Indexing,
    Indexed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Preparing,
    Deleting,
    Chunking,
    Embedding,
    Indexing,
    Complete,
}

/// Status entry for a single repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodebaseStatus {
    pub path: String,
    pub status: IndexStatus,
    pub progress: u8,
    pub current_stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merkle_root: Option<String>,
    pub indexed_files: usize,
    pub total_chunks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl CodebaseStatus {
    pub fn not_found(path: &str) -> Self {
        Self {
            path: path.to_string(),
            status: IndexStatus::NotFound,
            progress: 0,
            current_stage: Stage::Preparing,
            merkle_root: None,
            indexed_files: 0,
            total_chunks: 0,
            last_updated: None,
            error_message: None,
        }
    }

    pub fn indexing(path: &str) -> Self {
        Self {
            status: IndexStatus::Indexing,
            ..Self::not_found(path)
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotFile {
    codebases: BTreeMap<String, CodebaseStatus>,
}

/// Registry of per-repository indexing state, shared across processes
pub struct SnapshotStore {
    path: PathBuf,
    // Serializes writers within this process; the file lock covers others
    guard: Mutex<()>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Status for a repository; unknown paths get `not_found`
    pub fn get(&self, repo_path: &str) -> Result<CodebaseStatus> {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let _lock = self.lock_file()?;
        let snapshot = self.read_unlocked();
        Ok(snapshot
            .codebases
            .get(repo_path)
            .cloned()
            .unwrap_or_else(|| CodebaseStatus::not_found(repo_path)))
    }

    /// Insert or replace a status entry, stamping `last_updated`
    pub fn upsert(&self, mut status: CodebaseStatus) -> Result<()> {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let _lock = self.lock_file()?;
        let mut snapshot = self.read_unlocked();
        status.last_updated = Some(chrono::Utc::now().to_rfc3339());
        snapshot.codebases.insert(status.path.clone(), status);
        self.write_unlocked(&snapshot)
    }

    /// Remove a repository's entry; absent entries are not an error
    pub fn remove(&self, repo_path: &str) -> Result<bool> {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let _lock = self.lock_file()?;
        let mut snapshot = self.read_unlocked();
        let existed = snapshot.codebases.remove(repo_path).is_some();
        if existed {
            self.write_unlocked(&snapshot)?;
        }
        Ok(existed)
    }

    /// All tracked codebases, sorted by path
    pub fn list(&self) -> Result<Vec<CodebaseStatus>> {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let _lock = self.lock_file()?;
        Ok(self.read_unlocked().codebases.into_values().collect())
    }

    fn lock_file(&self) -> Result<std::fs::File> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;
        Ok(file)
    }

    fn read_unlocked(&self) -> SnapshotFile {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if !content.trim().is_empty() => serde_json::from_str(&content)
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "corrupt snapshot file, starting fresh");
                    SnapshotFile::default()
                }),
            _ => SnapshotFile::default(),
        }
    }

    fn write_unlocked(&self, snapshot: &SnapshotFile) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(serde_json::to_string_pretty(snapshot)?.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Ok(())
    }
}
