//! Configuration management
//!
//! Built-in defaults, an optional per-repository `.codii.yaml` overlay, and
//! the `CODII_BASE_DIR` environment override. List-valued keys
//! (`ignore_patterns`, `extensions`) are additive; scalar keys replace the
//! default.

use crate::error::{CodiiError, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Ignore patterns applied to every repository
const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git/",
    "__pycache__/",
    "node_modules/",
    ".venv/",
    "venv/",
    ".env/",
    "*.pyc",
    "*.pyo",
    "*.so",
    "*.dll",
    "*.dylib",
    "*.exe",
    "*.bin",
    "*.jpg",
    "*.jpeg",
    "*.png",
    "*.gif",
    "*.svg",
    "*.ico",
    "*.pdf",
    "*.zip",
    "*.tar",
    "*.gz",
    "*.rar",
    "*.7z",
    ".DS_Store",
    "Thumbs.db",
    "*.log",
    "*.tmp",
    ".idea/",
    ".vscode/",
    "*.swp",
    "*.swo",
    "dist/",
    "build/",
    "target/",
    ".tox/",
    ".pytest_cache/",
    ".mypy_cache/",
    ".ruff_cache/",
    "coverage/",
    "*.egg-info/",
];

/// File extensions indexed by default
const DEFAULT_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".jsx", ".ts", ".tsx", ".go", ".rs", ".java", ".c", ".cpp", ".cc", ".cxx", ".h",
    ".hpp", ".hxx", ".json", ".yaml", ".yml", ".toml", ".md", ".rst", ".txt", ".sh", ".bash",
    ".zsh", ".sql", ".proto", ".html", ".css", ".scss", ".less",
];

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct CodiiConfig {
    pub base_dir: PathBuf,
    pub ignore_patterns: Vec<String>,
    pub extensions: Vec<String>,
    pub embedding_model: String,
    pub embedding_batch_size: usize,
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    pub chunk_overlap: usize,
    pub default_search_limit: usize,
    pub max_search_limit: usize,
    pub bm25_weight: f64,
    pub vector_weight: f64,
}

/// Raw shape of a `.codii.yaml` file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_dir: Option<PathBuf>,
    #[serde(default)]
    ignore_patterns: Vec<String>,
    #[serde(default)]
    extensions: Vec<String>,
    embedding_model: Option<String>,
    embedding_batch_size: Option<usize>,
    hnsw_m: Option<usize>,
    hnsw_ef_construction: Option<usize>,
    hnsw_ef_search: Option<usize>,
    max_chunk_size: Option<usize>,
    min_chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    default_search_limit: Option<usize>,
    max_search_limit: Option<usize>,
    bm25_weight: Option<f64>,
    vector_weight: Option<f64>,
}

impl Default for CodiiConfig {
    fn default() -> Self {
        Self {
            base_dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(crate::BASE_DIR_NAME),
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            embedding_batch_size: 32,
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 100,
            max_chunk_size: 1500,
            min_chunk_size: 100,
            chunk_overlap: 200,
            default_search_limit: 10,
            max_search_limit: 50,
            bm25_weight: 0.5,
            vector_weight: 0.5,
        }
    }
}

impl CodiiConfig {
    /// Load configuration for a repository, merging `.codii.yaml` from its
    /// root over the defaults. A malformed file is a hard error: it is
    /// surfaced before any state is touched.
    pub fn load(repo_root: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(root) = repo_root {
            let config_path = root.join(".codii.yaml");
            if config_path.exists() {
                let content = std::fs::read_to_string(&config_path)?;
                let file: ConfigFile = serde_yaml::from_str(&content).map_err(|e| {
                    CodiiError::Config(format!("malformed {}: {}", config_path.display(), e))
                })?;
                config.apply(file)?;
            }
        }

        if let Ok(dir) = std::env::var("CODII_BASE_DIR") {
            config.base_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Clone this configuration with a repository's `.codii.yaml` (if any)
    /// merged on top. The base directory and its env override are kept.
    pub fn with_repo_overlay(&self, repo_root: &Path) -> Result<Self> {
        let mut config = self.clone();
        let config_path = repo_root.join(".codii.yaml");
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let file: ConfigFile = serde_yaml::from_str(&content).map_err(|e| {
                CodiiError::Config(format!("malformed {}: {}", config_path.display(), e))
            })?;
            let base_dir = config.base_dir.clone();
            config.apply(file)?;
            config.base_dir = base_dir;
        }
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, file: ConfigFile) -> Result<()> {
        if let Some(dir) = file.base_dir {
            self.base_dir = dir;
        }
        self.ignore_patterns.extend(file.ignore_patterns);
        self.extensions
            .extend(file.extensions.into_iter().map(|e| normalize_extension(&e)));

        if let Some(v) = file.embedding_model {
            self.embedding_model = v;
        }
        if let Some(v) = file.embedding_batch_size {
            self.embedding_batch_size = v;
        }
        if let Some(v) = file.hnsw_m {
            self.hnsw_m = v;
        }
        if let Some(v) = file.hnsw_ef_construction {
            self.hnsw_ef_construction = v;
        }
        if let Some(v) = file.hnsw_ef_search {
            self.hnsw_ef_search = v;
        }
        if let Some(v) = file.max_chunk_size {
            self.max_chunk_size = v;
        }
        if let Some(v) = file.min_chunk_size {
            self.min_chunk_size = v;
        }
        if let Some(v) = file.chunk_overlap {
            self.chunk_overlap = v;
        }
        if let Some(v) = file.default_search_limit {
            self.default_search_limit = v;
        }
        if let Some(v) = file.max_search_limit {
            self.max_search_limit = v;
        }
        if let Some(v) = file.bm25_weight {
            self.bm25_weight = v;
        }
        if let Some(v) = file.vector_weight {
            self.vector_weight = v;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.min_chunk_size >= self.max_chunk_size {
            return Err(CodiiError::Config(format!(
                "min_chunk_size ({}) must be smaller than max_chunk_size ({})",
                self.min_chunk_size, self.max_chunk_size
            )));
        }
        if self.chunk_overlap >= self.max_chunk_size {
            return Err(CodiiError::Config(format!(
                "chunk_overlap ({}) must be smaller than max_chunk_size ({})",
                self.chunk_overlap, self.max_chunk_size
            )));
        }
        if self.embedding_batch_size == 0 {
            return Err(CodiiError::Config(
                "embedding_batch_size must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn indexes_dir(&self) -> PathBuf {
        self.base_dir.join("indexes")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.base_dir.join("snapshots")
    }

    pub fn merkle_dir(&self) -> PathBuf {
        self.base_dir.join("merkle")
    }

    pub fn snapshot_file(&self) -> PathBuf {
        self.snapshots_dir().join("snapshot.json")
    }

    pub fn index_dir(&self, repo_id: &str) -> PathBuf {
        self.indexes_dir().join(repo_id)
    }

    pub fn db_path(&self, repo_id: &str) -> PathBuf {
        self.index_dir(repo_id).join("chunks.db")
    }

    pub fn vectors_path(&self, repo_id: &str) -> PathBuf {
        self.index_dir(repo_id).join("vectors.hnsw")
    }

    pub fn merkle_path(&self, repo_id: &str) -> PathBuf {
        self.merkle_dir().join(format!("{repo_id}.json"))
    }
}

/// Stable short identifier for a repository: the first 16 hex characters of
/// the SHA-256 of its canonical path. Used only to name storage locations.
pub fn repo_id(canonical_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_path.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..16].to_string()
}

/// Normalize an extension to `.lowercase` form
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}
