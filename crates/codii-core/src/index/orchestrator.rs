//! Indexing orchestrator
//!
//! Entry points for the four public operations. `index` scans and diffs in
//! the foreground, then hands the staged pipeline (delete, chunk, embed,
//! index, persist) to a background worker thread. Progress is written to the
//! snapshot store, throttled to every 500 ms or 5% delta. Cancellation is
//! cooperative: the worker checks a flag at stage and file boundaries.

use crate::config::{normalize_extension, repo_id, CodiiConfig};
use crate::db::Database;
use crate::error::{CodiiError, Result};
use crate::index::chunker::{detect_language, Chunk, Chunker, Splitter};
use crate::index::merkle::{diff, MerkleTree, TreeDiff};
use crate::index::scanner::{scan_repository, ScanOptions};
use crate::llm::{CrossEncoder, Embedder};
use crate::search::ann_index::meta_path_for;
use crate::search::{HnswParams, HybridSearcher, SearchResult, VectorIndex};
use crate::snapshot::{CodebaseStatus, IndexStatus, SnapshotStore, Stage};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Immediate result of an `index` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Background indexing started
    Accepted,
    /// Nothing to do; the index already matches the tree
    NoChanges,
}

/// Options for an indexing run
#[derive(Debug, Clone, Default)]
pub struct IndexRequest {
    pub force: bool,
    pub splitter: Splitter,
    pub custom_extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,
}

pub struct Indexer {
    config: CodiiConfig,
    snapshot: Arc<SnapshotStore>,
    embedder: Arc<dyn Embedder>,
    reranker: Option<Arc<dyn CrossEncoder>>,
    cancel_flags: Mutex<HashMap<String, Arc<AtomicBool>>>,
    workers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl Indexer {
    pub fn new(config: CodiiConfig) -> Self {
        let embedder = crate::llm::shared_embedder();
        let reranker = crate::llm::load_reranker();
        Self::with_models(config, embedder, reranker)
    }

    /// Construct with explicit model adapters (tests inject deterministic
    /// stubs here)
    pub fn with_models(
        config: CodiiConfig,
        embedder: Arc<dyn Embedder>,
        reranker: Option<Arc<dyn CrossEncoder>>,
    ) -> Self {
        let snapshot = Arc::new(SnapshotStore::new(config.snapshot_file()));
        Self {
            config,
            snapshot,
            embedder,
            reranker,
            cancel_flags: Mutex::new(HashMap::new()),
            workers: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CodiiConfig {
        &self.config
    }

    /// Index a repository, incrementally unless `force` is set.
    pub fn index(&self, repo_path: &Path, request: IndexRequest) -> Result<IndexOutcome> {
        let repo_root = repo_path
            .canonicalize()
            .map_err(|_| CodiiError::InvalidInput(format!("path does not exist: {}", repo_path.display())))?;
        if !repo_root.is_dir() {
            return Err(CodiiError::InvalidInput(format!(
                "path is not a directory: {}",
                repo_root.display()
            )));
        }
        let repo_key = repo_root.to_string_lossy().to_string();
        let id = repo_id(&repo_key);

        let config = self.config.with_repo_overlay(&repo_root)?;

        if self.snapshot.get(&repo_key)?.status == IndexStatus::Indexing {
            return Err(CodiiError::Index(format!(
                "codebase is already being indexed: {repo_key}"
            )));
        }

        self.snapshot.upsert(CodebaseStatus::indexing(&repo_key))?;

        let outcome = self.prepare_and_spawn(&repo_root, repo_key.clone(), id, config, request);
        if let Err(ref e) = outcome {
            self.mark_failed(&repo_key, &e.to_string());
        }
        outcome
    }

    fn prepare_and_spawn(
        &self,
        repo_root: &Path,
        repo_key: String,
        id: String,
        config: CodiiConfig,
        request: IndexRequest,
    ) -> Result<IndexOutcome> {
        let mut extensions = config.extensions.clone();
        extensions.extend(request.custom_extensions.iter().map(|e| normalize_extension(e)));
        let mut ignore_patterns = config.ignore_patterns.clone();
        ignore_patterns.extend(request.ignore_patterns.iter().cloned());

        let scan_options = ScanOptions::new(&extensions, &ignore_patterns);
        let files = scan_repository(repo_root, &scan_options)?;

        if request.force {
            self.reset_stored_index(&config, &id)?;
        }

        let merkle_path = config.merkle_path(&id);
        let old_tree = MerkleTree::load(&merkle_path);
        let new_tree = MerkleTree::from_files(files);
        let changes = diff(&old_tree, &new_tree);

        if changes.is_empty() && !request.force {
            let (indexed_files, total_chunks) = match Database::open(config.db_path(&id)) {
                Ok(db) => (
                    db.file_count().unwrap_or(new_tree.len()),
                    db.chunk_count().unwrap_or(0),
                ),
                Err(_) => (new_tree.len(), 0),
            };
            self.snapshot.upsert(CodebaseStatus {
                status: IndexStatus::Indexed,
                progress: 100,
                current_stage: Stage::Complete,
                merkle_root: Some(new_tree.root.clone()),
                indexed_files,
                total_chunks,
                ..CodebaseStatus::not_found(&repo_key)
            })?;
            return Ok(IndexOutcome::NoChanges);
        }

        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel_flags
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(repo_key.clone(), cancel.clone());

        let snapshot = self.snapshot.clone();
        let embedder = self.embedder.clone();
        let repo_root = repo_root.to_path_buf();
        let splitter = request.splitter;
        let worker_key = repo_key.clone();

        let handle = std::thread::spawn(move || {
            let result = run_pipeline(
                &config,
                &snapshot,
                embedder.as_ref(),
                &repo_root,
                &worker_key,
                &id,
                new_tree,
                changes,
                splitter,
                &cancel,
            );
            if let Err(e) = result {
                let message = match e {
                    CodiiError::Cancelled => "cancelled".to_string(),
                    e @ CodiiError::DimensionMismatch { .. } => {
                        format!("{e}; re-index with force to rebuild the vector index")
                    }
                    other => other.to_string(),
                };
                tracing::warn!(repo = %worker_key, error = %message, "indexing failed");
                let _ = snapshot.upsert(CodebaseStatus {
                    status: IndexStatus::Failed,
                    error_message: Some(message),
                    ..CodebaseStatus::not_found(&worker_key)
                });
            }
        });

        self.workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(repo_key, handle);

        Ok(IndexOutcome::Accepted)
    }

    /// Block until the background worker for this repository finishes.
    pub fn wait(&self, repo_path: &Path) -> Result<()> {
        let repo_key = canonical_key(repo_path);
        let handle = self
            .workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&repo_key);
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| CodiiError::Index("indexing worker panicked".into()))?;
        }
        Ok(())
    }

    /// Request cooperative cancellation of an in-flight indexing run.
    pub fn cancel(&self, repo_path: &Path) {
        let repo_key = canonical_key(repo_path);
        if let Some(flag) = self
            .cancel_flags
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&repo_key)
        {
            flag.store(true, Ordering::Relaxed);
        }
    }

    /// Hybrid search over an indexed repository.
    pub fn search(
        &self,
        repo_path: &Path,
        query: &str,
        limit: usize,
        extension_filter: Option<&[String]>,
        rerank: bool,
    ) -> Result<Vec<SearchResult>> {
        let repo_key = canonical_key(repo_path);
        let id = repo_id(&repo_key);

        let config = if let Ok(root) = repo_path.canonicalize() {
            self.config.with_repo_overlay(&root)?
        } else {
            self.config.clone()
        };

        if limit == 0 || limit > config.max_search_limit {
            return Err(CodiiError::InvalidInput(format!(
                "limit must be between 1 and {}",
                config.max_search_limit
            )));
        }

        let status = self.snapshot.get(&repo_key)?;
        match status.status {
            IndexStatus::NotFound => return Err(CodiiError::NotIndexed(repo_key)),
            IndexStatus::Failed => {
                return Err(CodiiError::Index(format!(
                    "indexing failed for {repo_key}: {}; retry with index_codebase",
                    status.error_message.as_deref().unwrap_or("unknown error")
                )))
            }
            IndexStatus::Indexing | IndexStatus::Indexed => {}
        }

        let db_path = config.db_path(&id);
        if !db_path.exists() {
            return Err(CodiiError::NotIndexed(repo_key));
        }

        let db = Database::open(db_path)?;
        let vectors = VectorIndex::open(
            &config.vectors_path(&id),
            self.embedder.dimensions(),
            HnswParams::from(&config),
            1024,
        )?;

        let searcher = HybridSearcher::new(
            &db,
            &vectors,
            self.embedder.as_ref(),
            self.reranker.as_deref(),
            config.bm25_weight,
            config.vector_weight,
        );
        searcher.search(query, limit, extension_filter, rerank)
    }

    /// Current status; unknown paths report `not_found`.
    pub fn status(&self, repo_path: &Path) -> Result<CodebaseStatus> {
        self.snapshot.get(&canonical_key(repo_path))
    }

    /// All tracked codebases.
    pub fn list_statuses(&self) -> Result<Vec<CodebaseStatus>> {
        self.snapshot.list()
    }

    /// Drop a repository's index, vectors, merkle cache and status entry.
    /// Clearing something that was never indexed is not an error.
    pub fn clear(&self, repo_path: &Path) -> Result<()> {
        let repo_key = canonical_key(repo_path);
        let id = repo_id(&repo_key);
        self.clear_stored_index(&id)?;
        self.snapshot.remove(&repo_key)?;
        Ok(())
    }

    /// Empty the chunk store tables and drop the vector and merkle files,
    /// keeping the database file itself (force re-index).
    fn reset_stored_index(&self, config: &CodiiConfig, id: &str) -> Result<()> {
        let db_path = config.db_path(id);
        if db_path.exists() {
            let db = Database::open(&db_path)?;
            db.clear_all_chunks()?;
            db.clear_all_files()?;
        }
        for path in [
            config.vectors_path(id),
            meta_path_for(&config.vectors_path(id)),
            config.merkle_path(id),
        ] {
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Remove every stored artifact for a repository, file by file
    fn clear_stored_index(&self, id: &str) -> Result<()> {
        let db_path = self.config.db_path(id);
        let vectors_path = self.config.vectors_path(id);
        for path in [
            db_path.clone(),
            with_suffix(&db_path, "-wal"),
            with_suffix(&db_path, "-shm"),
            meta_path_for(&vectors_path),
            vectors_path,
            self.config.merkle_path(id),
        ] {
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn mark_failed(&self, repo_key: &str, message: &str) {
        let _ = self.snapshot.upsert(CodebaseStatus {
            status: IndexStatus::Failed,
            error_message: Some(message.to_string()),
            ..CodebaseStatus::not_found(repo_key)
        });
    }
}

fn canonical_key(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string()
}

fn with_suffix(path: &Path, suffix: &str) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    std::path::PathBuf::from(name)
}

/// Throttled progress writer: at most one snapshot write per 500 ms unless
/// the stage changes or progress jumps by 5%
struct ProgressWriter<'a> {
    snapshot: &'a SnapshotStore,
    repo_key: &'a str,
    last_write: Instant,
    last_progress: u8,
    last_stage: Stage,
}

impl<'a> ProgressWriter<'a> {
    fn new(snapshot: &'a SnapshotStore, repo_key: &'a str) -> Self {
        Self {
            snapshot,
            repo_key,
            last_write: Instant::now(),
            last_progress: 0,
            last_stage: Stage::Preparing,
        }
    }

    fn report(&mut self, stage: Stage, progress: u8, indexed_files: usize, total_chunks: usize) {
        let stage_changed = stage != self.last_stage;
        let elapsed = self.last_write.elapsed() >= Duration::from_millis(500);
        let jumped = progress.saturating_sub(self.last_progress) >= 5;
        if !stage_changed && !elapsed && !jumped {
            return;
        }
        // Progress is advisory and monotonic within a stage
        let progress = progress.max(if stage_changed { 0 } else { self.last_progress });
        let _ = self.snapshot.upsert(CodebaseStatus {
            status: IndexStatus::Indexing,
            progress,
            current_stage: stage,
            indexed_files,
            total_chunks,
            ..CodebaseStatus::not_found(self.repo_key)
        });
        self.last_write = Instant::now();
        self.last_progress = progress;
        self.last_stage = stage;
    }
}

fn check_cancel(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        Err(CodiiError::Cancelled)
    } else {
        Ok(())
    }
}

/// The staged background pipeline. Stages are strictly sequential; deletes
/// land before adds so a modified file never has two generations of chunks.
#[allow(clippy::too_many_arguments)]
fn run_pipeline(
    config: &CodiiConfig,
    snapshot: &SnapshotStore,
    embedder: &dyn Embedder,
    repo_root: &Path,
    repo_key: &str,
    id: &str,
    new_tree: MerkleTree,
    changes: TreeDiff,
    splitter: Splitter,
    cancel: &AtomicBool,
) -> Result<()> {
    let mut progress = ProgressWriter::new(snapshot, repo_key);
    progress.report(Stage::Preparing, 5, 0, 0);

    let db = Database::open(config.db_path(id))?;
    let mut vectors = VectorIndex::open(
        &config.vectors_path(id),
        embedder.dimensions(),
        HnswParams::from(config),
        (new_tree.len() * 2).max(1024),
    )?;

    // Stage: deleting (10%)
    // Added paths are swept too: insert batches commit individually, and a
    // run that failed between a commit and the merkle write leaves rows
    // behind that the retry would otherwise duplicate (the retry re-runs
    // the same diff against the old tree).
    check_cancel(cancel)?;
    let to_delete: Vec<&str> = changes
        .added
        .iter()
        .chain(changes.modified.iter())
        .chain(changes.removed.iter())
        .map(String::as_str)
        .collect();
    if !to_delete.is_empty() {
        progress.report(Stage::Deleting, 10, 0, 0);
        for path in to_delete {
            check_cancel(cancel)?;
            let removed_ids = db.delete_chunks_by_path(path)?;
            for chunk_id in removed_ids {
                vectors.mark_deleted(chunk_id);
            }
            if changes.removed.contains(path) {
                db.delete_file(path)?;
            }
        }
    }

    // Stage: chunking (10 -> 40)
    check_cancel(cancel)?;
    let to_add: Vec<&str> = changes
        .added
        .iter()
        .chain(changes.modified.iter())
        .map(String::as_str)
        .collect();
    let chunker = Chunker::new(splitter, config);
    let mut all_chunks: Vec<Chunk> = Vec::new();

    progress.report(Stage::Chunking, 10, 0, 0);
    for (i, path) in to_add.iter().copied().enumerate() {
        check_cancel(cancel)?;
        let absolute = repo_root.join(path);
        let content = match std::fs::read(&absolute) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                tracing::warn!(path, error = %e, "cannot read file, skipping");
                continue;
            }
        };
        let language = detect_language(path);
        all_chunks.extend(chunker.chunk(path, &content, language));

        if let Some(hash) = new_tree.files.get(path) {
            db.upsert_file(path, hash)?;
        }

        let pct = 10 + ((i + 1) * 30 / to_add.len().max(1)) as u8;
        progress.report(Stage::Chunking, pct, i + 1, all_chunks.len());
    }

    // Stage: embedding (40 -> 80)
    check_cancel(cancel)?;
    progress.report(Stage::Embedding, 40, to_add.len(), all_chunks.len());
    let batch_size = config.embedding_batch_size;
    let mut embedded: Vec<Vec<f32>> = Vec::with_capacity(all_chunks.len());
    let total_batches = all_chunks.len().div_ceil(batch_size).max(1);
    for (batch_idx, batch) in all_chunks.chunks(batch_size).enumerate() {
        check_cancel(cancel)?;
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        embedded.extend(embedder.embed_batch(&texts)?);
        let pct = 40 + ((batch_idx + 1) * 40 / total_batches) as u8;
        progress.report(Stage::Embedding, pct, to_add.len(), all_chunks.len());
    }

    // Stage: indexing (80 -> 99)
    check_cancel(cancel)?;
    progress.report(Stage::Indexing, 80, to_add.len(), all_chunks.len());
    for (batch_idx, (chunk_batch, vector_batch)) in all_chunks
        .chunks(batch_size)
        .zip(embedded.chunks(batch_size))
        .enumerate()
    {
        check_cancel(cancel)?;
        let ids = db.insert_chunks(chunk_batch)?;
        vectors.add_batch(&ids, vector_batch)?;
        let pct = 80 + ((batch_idx + 1) * 19 / total_batches) as u8;
        progress.report(Stage::Indexing, pct.min(99), to_add.len(), all_chunks.len());
    }

    // Persist: vector index first, then the merkle cache. The merkle file is
    // only written after every stage succeeded, so a failed run retries the
    // same diff.
    vectors.save(&config.vectors_path(id))?;
    new_tree.save(&config.merkle_path(id))?;

    snapshot.upsert(CodebaseStatus {
        status: IndexStatus::Indexed,
        progress: 100,
        current_stage: Stage::Complete,
        merkle_root: Some(new_tree.root.clone()),
        indexed_files: db.file_count()?,
        total_chunks: db.chunk_count()?,
        ..CodebaseStatus::not_found(repo_key)
    })?;

    Ok(())
}
