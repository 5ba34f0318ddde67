//! HNSW approximate nearest-neighbor index
//!
//! usearch-backed cosine index keyed by chunk id. Supports incremental add,
//! soft deletion (marked ids are filtered out of results without touching
//! the graph), k-NN search with a per-query `ef` override, and single-file
//! persistence with a sibling metadata file.

use crate::config::CodiiConfig;
use crate::error::{CodiiError, Result};
use crate::llm::l2_normalize;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use usearch::ffi::{IndexOptions, MetricKind, ScalarKind};

/// Graph parameters; rationale for the defaults: a larger search width
/// materially improves recall for disjunctive multi-word queries.
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 100,
        }
    }
}

impl From<&CodiiConfig> for HnswParams {
    fn from(config: &CodiiConfig) -> Self {
        Self {
            m: config.hnsw_m,
            ef_construction: config.hnsw_ef_construction,
            ef_search: config.hnsw_ef_search,
        }
    }
}

/// Sidecar metadata persisted next to the graph file
#[derive(Debug, Serialize, Deserialize)]
struct IndexMeta {
    dimensions: usize,
    max_elements: usize,
    size: usize,
    deleted: Vec<i64>,
}

pub struct VectorIndex {
    index: usearch::Index,
    dimensions: usize,
    deleted: HashSet<i64>,
    params: HnswParams,
}

impl VectorIndex {
    /// Create an empty index. `initial_capacity` is a hint; the graph grows
    /// by doubling on overflow.
    pub fn create(dimensions: usize, params: HnswParams, initial_capacity: usize) -> Result<Self> {
        let index = usearch::Index::new(&index_options(dimensions, &params))
            .map_err(|e| CodiiError::Vector(e.to_string()))?;
        index
            .reserve(initial_capacity.max(1024))
            .map_err(|e| CodiiError::Vector(e.to_string()))?;
        Ok(Self {
            index,
            dimensions,
            deleted: HashSet::new(),
            params,
        })
    }

    /// Load a persisted index, or create an empty one when no files exist.
    /// A dimension mismatch against `dimensions` is fatal.
    pub fn open(
        path: &Path,
        dimensions: usize,
        params: HnswParams,
        initial_capacity: usize,
    ) -> Result<Self> {
        let meta_path = meta_path_for(path);
        if !path.exists() || !meta_path.exists() {
            return Self::create(dimensions, params, initial_capacity);
        }

        let meta: IndexMeta = serde_json::from_str(&std::fs::read_to_string(&meta_path)?)?;
        if meta.dimensions != dimensions {
            return Err(CodiiError::DimensionMismatch {
                expected: dimensions,
                actual: meta.dimensions,
            });
        }

        let index = usearch::Index::new(&index_options(dimensions, &params))
            .map_err(|e| CodiiError::Vector(e.to_string()))?;
        index
            .load(&path.to_string_lossy())
            .map_err(|e| CodiiError::Vector(format!("failed to load {}: {e}", path.display())))?;
        index
            .reserve(meta.max_elements.max(meta.size).max(1024))
            .map_err(|e| CodiiError::Vector(e.to_string()))?;

        Ok(Self {
            index,
            dimensions,
            deleted: meta.deleted.into_iter().collect(),
            params,
        })
    }

    /// Insert or replace a vector. Re-inserting a soft-deleted id revives it.
    pub fn add(&mut self, id: i64, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(CodiiError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }

        let key = id as u64;
        if self.index.contains(key) {
            self.index
                .remove(key)
                .map_err(|e| CodiiError::Vector(e.to_string()))?;
        }
        self.deleted.remove(&id);

        self.ensure_capacity(1)?;
        let mut normalized = vector.to_vec();
        l2_normalize(&mut normalized);
        self.index
            .add(key, &normalized)
            .map_err(|e| CodiiError::Vector(e.to_string()))?;
        Ok(())
    }

    pub fn add_batch(&mut self, ids: &[i64], vectors: &[Vec<f32>]) -> Result<()> {
        if ids.len() != vectors.len() {
            return Err(CodiiError::Vector(format!(
                "id/vector count mismatch: {} vs {}",
                ids.len(),
                vectors.len()
            )));
        }
        self.ensure_capacity(ids.len())?;
        for (id, vector) in ids.iter().zip(vectors) {
            self.add(*id, vector)?;
        }
        Ok(())
    }

    /// Logical delete: the id stops appearing in results but stays in the
    /// graph until enough deletions accumulate to justify compaction.
    pub fn mark_deleted(&mut self, id: i64) {
        if self.index.contains(id as u64) {
            self.deleted.insert(id);
            self.maybe_compact();
        }
    }

    /// Physically drop soft-deleted entries once they outnumber the living
    fn maybe_compact(&mut self) {
        let total = self.index.size();
        if total == 0 || self.deleted.len() * 2 <= total {
            return;
        }
        tracing::debug!(
            deleted = self.deleted.len(),
            total,
            "compacting vector index"
        );
        for id in self.deleted.drain() {
            let _ = self.index.remove(id as u64);
        }
    }

    /// k-NN by cosine similarity, best first. Soft-deleted ids never appear.
    /// `ef` overrides the configured search width for this query.
    pub fn search(&self, vector: &[f32], k: usize, ef: Option<usize>) -> Result<Vec<(i64, f32)>> {
        if self.index.size() == 0 || k == 0 {
            return Ok(Vec::new());
        }
        if vector.len() != self.dimensions {
            return Err(CodiiError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }

        if let Some(ef) = ef {
            self.index.change_expansion_search(ef);
        }

        let mut query = vector.to_vec();
        l2_normalize(&mut query);

        // Over-fetch so post-filtering soft deletes still fills k
        let fetch = (k + self.deleted.len()).min(self.index.size());
        let matches = self
            .index
            .search(&query, fetch)
            .map_err(|e| CodiiError::Vector(e.to_string()))?;

        if ef.is_some() {
            let _ = self.index.change_expansion_search(self.params.ef_search);
        }

        let results = matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .map(|(key, distance)| (*key as i64, 1.0 - distance))
            .filter(|(id, _)| !self.deleted.contains(id))
            .take(k)
            .collect();
        Ok(results)
    }

    /// True when the id is present and not soft-deleted
    pub fn contains(&self, id: i64) -> bool {
        self.index.contains(id as u64) && !self.deleted.contains(&id)
    }

    /// Number of live (non-deleted) vectors
    pub fn len(&self) -> usize {
        self.index.size().saturating_sub(self.deleted.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Persist the graph plus sidecar metadata
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.index
            .save(&path.to_string_lossy())
            .map_err(|e| CodiiError::Vector(format!("failed to save {}: {e}", path.display())))?;

        let meta = IndexMeta {
            dimensions: self.dimensions,
            max_elements: self.index.capacity(),
            size: self.index.size(),
            deleted: self.deleted.iter().copied().collect(),
        };
        std::fs::write(meta_path_for(path), serde_json::to_string_pretty(&meta)?)?;
        Ok(())
    }

    fn ensure_capacity(&self, incoming: usize) -> Result<()> {
        let needed = self.index.size() + incoming;
        let capacity = self.index.capacity();
        if needed > capacity {
            self.index
                .reserve((capacity * 2).max(needed))
                .map_err(|e| CodiiError::Vector(e.to_string()))?;
        }
        Ok(())
    }
}

fn index_options(dimensions: usize, params: &HnswParams) -> IndexOptions {
    let mut options = IndexOptions::default();
    options.dimensions = dimensions;
    options.metric = MetricKind::Cos;
    options.quantization = ScalarKind::F32;
    options.connectivity = params.m;
    options.expansion_add = params.ef_construction;
    options.expansion_search = params.ef_search;
    options.multi = false;
    options
}

pub(crate) fn meta_path_for(path: &Path) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".meta");
    std::path::PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dim: usize, axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[axis] = 1.0;
        v
    }

    fn small_index() -> VectorIndex {
        VectorIndex::create(4, HnswParams::default(), 1024).unwrap()
    }

    #[test]
    fn test_add_and_search() {
        let mut index = small_index();
        index.add(1, &unit(4, 0)).unwrap();
        index.add(2, &unit(4, 1)).unwrap();
        index.add(3, &[0.9, 0.1, 0.0, 0.0]).unwrap();

        let results = index.search(&unit(4, 0), 2, None).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 1);
        assert!(results[0].1 > results[1].1);
        assert_eq!(results[1].0, 3);
    }

    #[test]
    fn test_soft_delete_hides_id() {
        let mut index = small_index();
        index.add(1, &unit(4, 0)).unwrap();
        index.add(2, &unit(4, 1)).unwrap();

        index.mark_deleted(1);
        assert!(!index.contains(1));
        assert_eq!(index.len(), 1);

        let results = index.search(&unit(4, 0), 5, None).unwrap();
        assert!(results.iter().all(|(id, _)| *id != 1));
    }

    #[test]
    fn test_reinsert_revives_deleted_id() {
        let mut index = small_index();
        index.add(1, &unit(4, 0)).unwrap();
        index.mark_deleted(1);
        index.add(1, &unit(4, 2)).unwrap();

        assert!(index.contains(1));
        let results = index.search(&unit(4, 2), 1, None).unwrap();
        assert_eq!(results[0].0, 1);
    }

    #[test]
    fn test_replace_updates_vector() {
        let mut index = small_index();
        index.add(7, &unit(4, 0)).unwrap();
        index.add(7, &unit(4, 3)).unwrap();

        assert_eq!(index.len(), 1);
        let results = index.search(&unit(4, 3), 1, None).unwrap();
        assert_eq!(results[0].0, 7);
        assert!(results[0].1 > 0.99);
    }

    #[test]
    fn test_vectors_normalized_on_insert() {
        let mut index = small_index();
        // Same direction, very different magnitude
        index.add(1, &[10.0, 0.0, 0.0, 0.0]).unwrap();
        let results = index.search(&[0.5, 0.0, 0.0, 0.0], 1, None).unwrap();
        assert!((results[0].1 - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut index = small_index();
        assert!(matches!(
            index.add(1, &[1.0, 0.0]),
            Err(CodiiError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_capacity_doubles_on_overflow() {
        let mut index = VectorIndex::create(4, HnswParams::default(), 1024).unwrap();
        for i in 0..2000i64 {
            let mut v = unit(4, (i % 4) as usize);
            v[(i / 4) as usize % 4] += 0.01 * (i as f32 % 7.0);
            index.add(i, &v).unwrap();
        }
        assert_eq!(index.len(), 2000);
    }

    #[test]
    fn test_save_and_open_roundtrip() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("vectors.hnsw");

        let mut index = small_index();
        index.add(1, &unit(4, 0)).unwrap();
        index.add(2, &unit(4, 1)).unwrap();
        index.mark_deleted(2);
        index.save(&path).unwrap();
        assert!(path.exists());
        assert!(temp.path().join("vectors.hnsw.meta").exists());

        let reloaded = VectorIndex::open(&path, 4, HnswParams::default(), 1024).unwrap();
        assert!(reloaded.contains(1));
        assert!(!reloaded.contains(2));
        let results = reloaded.search(&unit(4, 1), 5, None).unwrap();
        assert!(results.iter().all(|(id, _)| *id != 2));
    }

    #[test]
    fn test_open_with_wrong_dimension_fails() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("vectors.hnsw");

        let mut index = small_index();
        index.add(1, &unit(4, 0)).unwrap();
        index.save(&path).unwrap();

        let result = VectorIndex::open(&path, 8, HnswParams::default(), 1024);
        assert!(matches!(
            result,
            Err(CodiiError::DimensionMismatch {
                expected: 8,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_open_missing_creates_empty() {
        let temp = tempfile::TempDir::new().unwrap();
        let index = VectorIndex::open(
            &temp.path().join("vectors.hnsw"),
            4,
            HnswParams::default(),
            1024,
        )
        .unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_compaction_after_majority_deleted() {
        let mut index = small_index();
        for i in 0..10 {
            let mut v = unit(4, (i % 4) as usize);
            v[3] = i as f32 * 0.05;
            index.add(i, &v).unwrap();
        }
        for i in 0..6 {
            index.mark_deleted(i);
        }
        // Live set survives compaction, deleted ids stay gone
        assert_eq!(index.len(), 4);
        for i in 0..6 {
            assert!(!index.contains(i));
        }
        for i in 6..10 {
            assert!(index.contains(i));
        }
    }

    #[test]
    fn test_search_empty_index() {
        let index = small_index();
        assert!(index.search(&unit(4, 0), 5, None).unwrap().is_empty());
    }

    #[test]
    fn test_ef_override() {
        let mut index = small_index();
        for i in 0..50 {
            let mut v = vec![0.1; 4];
            v[(i % 4) as usize] = 1.0 + (i as f32) * 0.01;
            index.add(i, &v).unwrap();
        }
        let results = index.search(&unit(4, 0), 10, Some(200)).unwrap();
        assert_eq!(results.len(), 10);
    }
}
