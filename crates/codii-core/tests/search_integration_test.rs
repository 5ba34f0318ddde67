//! End-to-end search behavior tests

use codii_core::{
    CodiiConfig, CrossEncoder, HashEmbedder, IndexRequest, Indexer, Result, SearchResult,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn build_indexer(base: &Path, reranker: Option<Arc<dyn CrossEncoder>>) -> Indexer {
    let config = CodiiConfig {
        base_dir: base.join("codii-home"),
        ..CodiiConfig::default()
    };
    Indexer::with_models(config, Arc::new(HashEmbedder::new(64)), reranker)
}

fn index_repo(indexer: &Indexer, repo: &Path) {
    indexer.index(repo, IndexRequest::default()).unwrap();
    indexer.wait(repo).unwrap();
}

#[test]
fn test_query_expansion_finds_kernel_allocate() {
    let temp = tempfile::TempDir::new().unwrap();
    let repo = temp.path().join("repo");
    fs::create_dir_all(&repo).unwrap();
    fs::write(
        repo.join("mm.py"),
        "def kernel_allocate(size):\n    return reserve_pages(size)\n",
    )
    .unwrap();
    fs::write(
        repo.join("fmt.py"),
        "def format_report(entries):\n    return '\\n'.join(entries)\n",
    )
    .unwrap();

    let indexer = build_indexer(temp.path(), None);
    index_repo(&indexer, &repo);

    let results = indexer.search(&repo, "kalloc", 5, None, false).unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].path, "mm.py");
    assert_eq!(results[0].rank, 1);
    assert!(results[0].content.contains("kernel_allocate"));
}

struct PreferComments;

impl CrossEncoder for PreferComments {
    fn score(&self, _query: &str, texts: &[String]) -> Result<Vec<f32>> {
        Ok(texts
            .iter()
            .map(|t| if t.trim_start().starts_with("//") { 0.95 } else { 0.3 })
            .collect())
    }

    fn model_name(&self) -> &str {
        "prefer-comments"
    }
}

#[test]
fn test_hybrid_complementarity_with_rerank() {
    let temp = tempfile::TempDir::new().unwrap();
    let repo = temp.path().join("repo");
    fs::create_dir_all(&repo).unwrap();
    let comment: String = [
        "// sort an array with a pivot-based partition scheme",
        "// the helper below picks the median of three candidates",
        "// and recurses on both halves until runs become trivial",
    ]
    .join("\n");
    fs::write(
        repo.join("sort.js"),
        format!("{comment}\n\nfunction quicksort(xs) {{\n    return partition_all(xs);\n}}\n"),
    )
    .unwrap();

    let indexer = build_indexer(temp.path(), Some(Arc::new(PreferComments)));
    index_repo(&indexer, &repo);

    // Without reranking both chunks surface
    let plain = indexer.search(&repo, "sort an array", 5, None, false).unwrap();
    let has = |rs: &[SearchResult], f: &dyn Fn(&SearchResult) -> bool| rs.iter().any(|r| f(r));
    assert!(has(&plain, &|r| r.chunk_type == "comment"));
    assert!(has(&plain, &|r| r.content.contains("quicksort")));

    // With reranking the comment-bearing chunk wins
    let reranked = indexer.search(&repo, "sort an array", 5, None, true).unwrap();
    assert_eq!(reranked[0].chunk_type, "comment");
    assert!(reranked[0].rerank_score > 0.9);
}

#[test]
fn test_search_determinism() {
    let temp = tempfile::TempDir::new().unwrap();
    let repo = temp.path().join("repo");
    fs::create_dir_all(&repo).unwrap();
    for i in 0..12 {
        fs::write(
            repo.join(format!("worker_{i}.py")),
            format!("def process_queue_{i}(items):\n    return [dispatch(x) for x in items]\n"),
        )
        .unwrap();
    }

    let indexer = build_indexer(temp.path(), None);
    index_repo(&indexer, &repo);

    let first = indexer.search(&repo, "process queue dispatch", 10, None, false).unwrap();
    for _ in 0..3 {
        let again = indexer.search(&repo, "process queue dispatch", 10, None, false).unwrap();
        let ids = |rs: &[SearchResult]| rs.iter().map(|r| r.id).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&again));
    }
}

#[test]
fn test_extension_filter_end_to_end() {
    let temp = tempfile::TempDir::new().unwrap();
    let repo = temp.path().join("repo");
    fs::create_dir_all(&repo).unwrap();
    fs::write(repo.join("impl.py"), "def shared_symbol():\n    return 'python'\n").unwrap();
    fs::write(
        repo.join("impl.rs"),
        "fn shared_symbol() -> &'static str {\n    \"rust\"\n}\n",
    )
    .unwrap();

    let indexer = build_indexer(temp.path(), None);
    index_repo(&indexer, &repo);

    let results = indexer
        .search(&repo, "shared_symbol", 10, Some(&[".py".to_string()]), false)
        .unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.path.ends_with(".py")));
}

#[test]
fn test_query_validation_errors() {
    let temp = tempfile::TempDir::new().unwrap();
    let repo = temp.path().join("repo");
    fs::create_dir_all(&repo).unwrap();
    fs::write(repo.join("a.py"), "def anything():\n    return 0\n").unwrap();

    let indexer = build_indexer(temp.path(), None);
    index_repo(&indexer, &repo);

    // Too-short query
    assert!(indexer.search(&repo, "ab", 5, None, false).is_err());
    // Limit out of range
    assert!(indexer.search(&repo, "anything", 0, None, false).is_err());
    assert!(indexer.search(&repo, "anything", 51, None, false).is_err());
}

#[test]
fn test_scores_expose_rrf_contributions() {
    let temp = tempfile::TempDir::new().unwrap();
    let repo = temp.path().join("repo");
    fs::create_dir_all(&repo).unwrap();
    fs::write(
        repo.join("engine.py"),
        "def spin_turbine(rpm):\n    return rpm * blades\n",
    )
    .unwrap();

    let indexer = build_indexer(temp.path(), None);
    index_repo(&indexer, &repo);

    let results = indexer.search(&repo, "spin turbine", 5, None, false).unwrap();
    let top = &results[0];
    // Matched both lexically and semantically: both contributions present,
    // and the combined score is exactly their sum
    assert!(top.bm25_score > 0.0);
    assert!(top.vector_score > 0.0);
    assert!((top.combined_score - top.bm25_score - top.vector_score).abs() < 1e-12);
}
