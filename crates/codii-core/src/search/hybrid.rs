//! Hybrid search with Reciprocal Rank Fusion
//!
//! Runs the lexical and vector searches, fuses their rankings with
//! `score = w_L / (k + r_L) + w_V / (k + r_V)` (1-based ranks, k = 60),
//! optionally re-scores the head of the fused list with a cross-encoder,
//! and returns ranked results with provenance. When either subsearch comes
//! back empty the other's ordering is preserved unchanged.

use super::ann_index::VectorIndex;
use super::query::process_query;
use super::SearchResult;
use crate::config::normalize_extension;
use crate::db::Database;
use crate::error::Result;
use crate::llm::{CrossEncoder, Embedder};
use std::collections::HashMap;

/// RRF constant (standard value)
const RRF_K: f64 = 60.0;

/// Cap on cross-encoder input
const MAX_RERANK_DOCS: usize = 30;

struct Candidate {
    lexical_rank: Option<usize>,
    vector_rank: Option<usize>,
}

pub struct HybridSearcher<'a> {
    db: &'a Database,
    vectors: &'a VectorIndex,
    embedder: &'a dyn Embedder,
    reranker: Option<&'a dyn CrossEncoder>,
    bm25_weight: f64,
    vector_weight: f64,
}

impl<'a> HybridSearcher<'a> {
    pub fn new(
        db: &'a Database,
        vectors: &'a VectorIndex,
        embedder: &'a dyn Embedder,
        reranker: Option<&'a dyn CrossEncoder>,
        bm25_weight: f64,
        vector_weight: f64,
    ) -> Self {
        Self {
            db,
            vectors,
            embedder,
            reranker,
            bm25_weight,
            vector_weight,
        }
    }

    pub fn search(
        &self,
        query: &str,
        limit: usize,
        extension_filter: Option<&[String]>,
        rerank: bool,
    ) -> Result<Vec<SearchResult>> {
        let processed = process_query(query)?;
        // The query vector embeds the user's original text, not the
        // expanded expression
        let query_vector = self.embedder.embed(query)?;

        let candidates_count = (limit * 5).max(50);

        let lexical = self
            .db
            .search_fts(&processed.fts_expression, candidates_count, extension_filter)?;
        let vector = self.vectors.search(&query_vector, candidates_count, None)?;

        // Fuse 1-based ranks from both lists
        let mut fused: HashMap<i64, Candidate> = HashMap::new();
        for hit in &lexical {
            fused
                .entry(hit.id)
                .or_insert(Candidate {
                    lexical_rank: None,
                    vector_rank: None,
                })
                .lexical_rank = Some(hit.rank);
        }
        for (rank0, (id, _similarity)) in vector.iter().enumerate() {
            let entry = fused.entry(*id).or_insert(Candidate {
                lexical_rank: None,
                vector_rank: None,
            });
            entry.vector_rank = Some(rank0 + 1);
        }

        let mut scored: Vec<(i64, f64, f64, f64)> = fused
            .into_iter()
            .map(|(id, c)| {
                let bm25_score = c
                    .lexical_rank
                    .map(|r| self.bm25_weight / (RRF_K + r as f64))
                    .unwrap_or(0.0);
                let vector_score = c
                    .vector_rank
                    .map(|r| self.vector_weight / (RRF_K + r as f64))
                    .unwrap_or(0.0);
                (id, bm25_score, vector_score, bm25_score + vector_score)
            })
            .collect();

        // Descending combined score; ties go to the better lexical rank,
        // then the lower id, keeping the ordering deterministic
        let lexical_ranks: HashMap<i64, usize> =
            lexical.iter().map(|h| (h.id, h.rank)).collect();
        scored.sort_by(|a, b| {
            b.3.partial_cmp(&a.3)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let ra = lexical_ranks.get(&a.0).copied().unwrap_or(usize::MAX);
                    let rb = lexical_ranks.get(&b.0).copied().unwrap_or(usize::MAX);
                    ra.cmp(&rb)
                })
                .then_with(|| a.0.cmp(&b.0))
        });

        // Materialize rows; the lexical side already honored the filter,
        // vector-only hits are checked here
        let ids: Vec<i64> = scored.iter().map(|(id, ..)| *id).collect();
        let rows = self.db.get_by_ids(&ids)?;
        let row_by_id: HashMap<i64, _> = rows.into_iter().map(|r| (r.id, r)).collect();

        let mut results: Vec<SearchResult> = Vec::with_capacity(scored.len());
        for (id, bm25_score, vector_score, combined) in scored {
            let Some(row) = row_by_id.get(&id) else {
                continue;
            };
            if let Some(filter) = extension_filter {
                if !path_matches_extension(&row.path, filter) {
                    continue;
                }
            }
            results.push(SearchResult {
                id,
                content: row.content.clone(),
                path: row.path.clone(),
                start_line: row.start_line,
                end_line: row.end_line,
                language: row.language.clone(),
                chunk_type: row.chunk_type.clone(),
                bm25_score,
                vector_score,
                combined_score: combined,
                rerank_score: 0.0,
                rank: 0,
            });
        }

        let mut results = match (rerank, self.reranker) {
            (true, Some(cross_encoder)) => {
                self.rerank(query, results, limit, cross_encoder)?
            }
            _ => {
                results.truncate(limit);
                results
            }
        };

        for (i, result) in results.iter_mut().enumerate() {
            result.rank = i + 1;
        }
        Ok(results)
    }

    /// Re-score the head of the fused list with the cross-encoder and keep
    /// the best `limit`
    fn rerank(
        &self,
        query: &str,
        mut candidates: Vec<SearchResult>,
        limit: usize,
        cross_encoder: &dyn CrossEncoder,
    ) -> Result<Vec<SearchResult>> {
        let pool = (limit * 3).min(MAX_RERANK_DOCS);
        candidates.truncate(pool);
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let texts: Vec<String> = candidates.iter().map(|c| c.content.clone()).collect();
        match cross_encoder.score(query, &texts) {
            Ok(scores) => {
                for (candidate, score) in candidates.iter_mut().zip(scores) {
                    candidate.rerank_score = score as f64;
                }
                candidates.sort_by(|a, b| {
                    b.rerank_score
                        .partial_cmp(&a.rerank_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
            Err(e) => {
                // Fused ordering is still a good answer
                tracing::warn!(error = %e, "reranking failed, keeping RRF order");
            }
        }
        candidates.truncate(limit);
        Ok(candidates)
    }
}

fn path_matches_extension(path: &str, filter: &[String]) -> bool {
    if filter.is_empty() {
        return true;
    }
    let lower = path.to_lowercase();
    filter
        .iter()
        .any(|ext| lower.ends_with(&normalize_extension(ext)))
}
