//! HTTP-based cross-encoder for reranking
//!
//! Speaks the TEI/Jina-style `/rerank` protocol: the service scores each
//! `(query, document)` pair and returns per-index relevance scores.

use super::traits::CrossEncoder;
use crate::error::{CodiiError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankItem>,
}

#[derive(Deserialize)]
struct RerankItem {
    index: usize,
    relevance_score: f32,
}

pub struct HttpCrossEncoder {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpCrossEncoder {
    pub fn new(url: &str, model: &str, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    /// Create from `CODII_RERANK_URL`, `CODII_RERANK_MODEL` and optional
    /// `CODII_API_KEY`. Absent configuration means reranking is unavailable.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("CODII_RERANK_URL")
            .map_err(|_| CodiiError::Config("CODII_RERANK_URL not set".into()))?;
        let model = std::env::var("CODII_RERANK_MODEL")
            .unwrap_or_else(|_| "cross-encoder/ms-marco-MiniLM-L-6-v2".to_string());
        let api_key = std::env::var("CODII_API_KEY").ok();
        Self::new(&url, &model, api_key)
    }
}

impl CrossEncoder for HttpCrossEncoder {
    fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/rerank", self.url);
        let request = RerankRequest {
            model: &self.model,
            query,
            documents: texts,
        };

        let mut req = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send()?;
        if !response.status().is_success() {
            return Err(CodiiError::Search(format!(
                "rerank service returned {}",
                response.status()
            )));
        }

        let body: RerankResponse = response.json()?;
        let mut scores = vec![0.0f32; texts.len()];
        for item in body.results {
            if item.index < scores.len() {
                scores[item.index] = item.relevance_score;
            }
        }
        Ok(scores)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
