//! File-hash tree for change detection
//!
//! A flat map of repo-relative path to content hash, plus a root digest over
//! the sorted entries. Persisted per repository and diffed between indexing
//! runs to compute the added/modified/removed sets.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MerkleTree {
    pub root: String,
    pub files: BTreeMap<String, String>,
}

/// Disjoint change sets between two trees
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    pub added: BTreeSet<String>,
    pub modified: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

impl MerkleTree {
    /// Build a tree from scanned files, computing the root
    pub fn from_files(files: BTreeMap<String, String>) -> Self {
        let root = compute_root(&files);
        Self { root, files }
    }

    /// Load a persisted tree; a missing or unreadable file is an empty tree
    pub fn load(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::from_files(BTreeMap::new());
        };
        match serde_json::from_str::<MerkleTree>(&content) {
            Ok(tree) => tree,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt merkle cache, treating as empty");
                Self::from_files(BTreeMap::new())
            }
        }
    }

    /// Persist via a sibling temp file and atomic rename
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(serde_json::to_string_pretty(self)?.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(path)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Root digest: SHA-256 over the sorted concatenation `path:hash\n`
fn compute_root(files: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (path, hash) in files {
        hasher.update(path.as_bytes());
        hasher.update(b":");
        hasher.update(hash.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Per-file comparison of two trees; root hashes play no part here
pub fn diff(old: &MerkleTree, new: &MerkleTree) -> TreeDiff {
    let mut out = TreeDiff::default();

    for (path, hash) in &new.files {
        match old.files.get(path) {
            None => {
                out.added.insert(path.clone());
            }
            Some(old_hash) if old_hash != hash => {
                out.modified.insert(path.clone());
            }
            Some(_) => {}
        }
    }
    for path in old.files.keys() {
        if !new.files.contains_key(path) {
            out.removed.insert(path.clone());
        }
    }

    out
}
