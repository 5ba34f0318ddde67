//! Repository file scanning
//!
//! Walks a repository root and yields `(relative_path, content_hash)` pairs
//! for every candidate file: extension on the allow-list, not matched by any
//! ignore pattern (built-in defaults + user patterns + `.gitignore`, with
//! full gitignore semantics), not binary. Traversal does not descend into
//! ignored directories. Symlinks resolving outside the root are skipped.

use crate::config::normalize_extension;
use crate::error::Result;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Bytes inspected for NUL when sniffing binaries
const BINARY_SNIFF_LEN: usize = 8192;

/// Scan options
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Extension allow-list (normalized, with leading dot)
    pub extensions: Vec<String>,
    /// Ignore patterns, gitignore syntax
    pub ignore_patterns: Vec<String>,
}

impl ScanOptions {
    pub fn new(extensions: &[String], ignore_patterns: &[String]) -> Self {
        Self {
            extensions: extensions.iter().map(|e| normalize_extension(e)).collect(),
            ignore_patterns: ignore_patterns.to_vec(),
        }
    }
}

/// Scan a repository and hash every candidate file.
///
/// Returns repo-relative paths mapped to SHA-256 content hashes, sorted by
/// path.
pub fn scan_repository(root: &Path, options: &ScanOptions) -> Result<BTreeMap<String, String>> {
    let matcher = build_ignore_matcher(root, &options.ignore_patterns)?;
    let mut files = BTreeMap::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_ignored_dir(e, root, &matcher));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if entry.file_type().is_symlink() {
            if !symlink_stays_inside(entry.path(), root) {
                continue;
            }
        } else if !entry.file_type().is_file() {
            continue;
        }

        let rel = match entry.path().strip_prefix(root) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let rel_str = rel.to_string_lossy().replace('\\', "/");

        if matcher.matched(rel, false).is_ignore() {
            continue;
        }
        if !has_allowed_extension(&rel_str, &options.extensions) {
            continue;
        }

        match hash_text_file(entry.path()) {
            Ok(Some(hash)) => {
                files.insert(rel_str, hash);
            }
            Ok(None) => {} // binary
            Err(e) => {
                tracing::warn!(path = %rel_str, error = %e, "cannot read file, skipping");
            }
        }
    }

    Ok(files)
}

/// Compose default/user patterns with the repo's `.gitignore`
fn build_ignore_matcher(root: &Path, patterns: &[String]) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        builder.add_line(None, pattern)?;
    }
    let gitignore = root.join(".gitignore");
    if gitignore.exists() {
        if let Some(e) = builder.add(&gitignore) {
            tracing::warn!(error = %e, "failed to parse .gitignore");
        }
    }
    Ok(builder.build()?)
}

fn is_ignored_dir(entry: &DirEntry, root: &Path, matcher: &Gitignore) -> bool {
    if !entry.file_type().is_dir() || entry.path() == root {
        return false;
    }
    match entry.path().strip_prefix(root) {
        Ok(rel) => matcher.matched(rel, true).is_ignore(),
        Err(_) => false,
    }
}

/// A symlinked file is only indexed when its target resolves under the root
fn symlink_stays_inside(path: &Path, root: &Path) -> bool {
    let Ok(target) = std::fs::canonicalize(path) else {
        return false;
    };
    let Ok(canonical_root) = std::fs::canonicalize(root) else {
        return false;
    };
    target.starts_with(&canonical_root) && target.is_file()
}

fn has_allowed_extension(path: &str, extensions: &[String]) -> bool {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default();
    extensions.iter().any(|allowed| *allowed == ext)
}

/// Hash a file's bytes with SHA-256, streaming. Returns `None` for binary
/// content (NUL byte within the first 8 KiB).
pub fn hash_text_file(path: &Path) -> std::io::Result<Option<String>> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; BINARY_SNIFF_LEN];
    let mut sniffed = 0usize;

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        if sniffed < BINARY_SNIFF_LEN {
            let check = (BINARY_SNIFF_LEN - sniffed).min(n);
            if buf[..check].contains(&0) {
                return Ok(None);
            }
            sniffed += check;
        }
        hasher.update(&buf[..n]);
    }

    let digest = hasher.finalize();
    Ok(Some(digest.iter().map(|b| format!("{b:02x}")).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn options() -> ScanOptions {
        ScanOptions::new(
            &[".py".into(), ".rs".into(), ".txt".into()],
            &[".git/".into(), "target/".into(), "*.log".into()],
        )
    }

    #[test]
    fn test_scan_filters_extensions() {
        let temp = tempfile::TempDir::new().unwrap();
        fs::write(temp.path().join("a.py"), "print('hi')").unwrap();
        fs::write(temp.path().join("b.exe"), "MZ").unwrap();

        let files = scan_repository(temp.path(), &options()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files.contains_key("a.py"));
    }

    #[test]
    fn test_scan_does_not_descend_into_ignored_dirs() {
        let temp = tempfile::TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("target/debug")).unwrap();
        fs::write(temp.path().join("target/debug/out.rs"), "fn x() {}").unwrap();
        fs::write(temp.path().join("main.rs"), "fn main() {}").unwrap();

        let files = scan_repository(temp.path(), &options()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files.contains_key("main.rs"));
    }

    #[test]
    fn test_gitignore_respected_with_negation() {
        let temp = tempfile::TempDir::new().unwrap();
        fs::write(temp.path().join(".gitignore"), "*.txt\n!keep.txt\n").unwrap();
        fs::write(temp.path().join("drop.txt"), "dropped").unwrap();
        fs::write(temp.path().join("keep.txt"), "kept").unwrap();

        let files = scan_repository(temp.path(), &options()).unwrap();
        assert!(files.contains_key("keep.txt"));
        assert!(!files.contains_key("drop.txt"));
    }

    #[test]
    fn test_binary_files_skipped() {
        let temp = tempfile::TempDir::new().unwrap();
        fs::write(temp.path().join("data.txt"), b"text\x00with nul").unwrap();
        fs::write(temp.path().join("real.txt"), "plain text").unwrap();

        let files = scan_repository(temp.path(), &options()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files.contains_key("real.txt"));
    }

    #[test]
    fn test_hash_matches_content() {
        let temp = tempfile::TempDir::new().unwrap();
        let path_a = temp.path().join("a.txt");
        let path_b = temp.path().join("b.txt");
        fs::write(&path_a, "same content").unwrap();
        fs::write(&path_b, "same content").unwrap();

        let ha = hash_text_file(&path_a).unwrap().unwrap();
        let hb = hash_text_file(&path_b).unwrap().unwrap();
        assert_eq!(ha, hb);
        assert_eq!(ha.len(), 64);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_outside_root_skipped() {
        let outside = tempfile::TempDir::new().unwrap();
        let secret = outside.path().join("secret.txt");
        fs::write(&secret, "outside content").unwrap();

        let temp = tempfile::TempDir::new().unwrap();
        std::os::unix::fs::symlink(&secret, temp.path().join("link.txt")).unwrap();
        fs::write(temp.path().join("inside.txt"), "inside").unwrap();

        let files = scan_repository(temp.path(), &options()).unwrap();
        assert!(files.contains_key("inside.txt"));
        assert!(!files.contains_key("link.txt"));
    }
}
