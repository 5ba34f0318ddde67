//! HTTP-based embedder using an external inference service
//!
//! Speaks the OpenAI-style `/v1/embeddings` protocol (vLLM, TEI, OpenAI).

use super::traits::{l2_normalize, Embedder};
use crate::error::{CodiiError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    index: usize,
    embedding: Vec<f32>,
}

pub struct HttpEmbedder {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
}

impl HttpEmbedder {
    pub fn new(url: &str, model: &str, dimensions: usize, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            dimensions,
        })
    }

    /// Create from `CODII_EMBEDDING_URL`, `CODII_EMBEDDING_MODEL`,
    /// `CODII_EMBEDDING_DIMS` and optional `CODII_API_KEY`
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("CODII_EMBEDDING_URL")
            .map_err(|_| CodiiError::Config("CODII_EMBEDDING_URL not set".into()))?;
        let model = std::env::var("CODII_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "all-MiniLM-L6-v2".to_string());
        let dimensions = std::env::var("CODII_EMBEDDING_DIMS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(crate::DEFAULT_EMBEDDING_DIM);
        let api_key = std::env::var("CODII_API_KEY").ok();
        Self::new(&url, &model, dimensions, api_key)
    }
}

impl Embedder for HttpEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.url);
        let request = EmbedRequest {
            input: texts,
            model: &self.model,
        };

        let mut req = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send()?;
        if !response.status().is_success() {
            return Err(CodiiError::Embedding(format!(
                "embedding service returned {}",
                response.status()
            )));
        }

        let body: EmbedResponse = response.json()?;
        if body.data.len() != texts.len() {
            return Err(CodiiError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.data.len()
            )));
        }

        let mut vectors = vec![Vec::new(); texts.len()];
        for item in body.data {
            if item.embedding.len() != self.dimensions {
                return Err(CodiiError::DimensionMismatch {
                    expected: self.dimensions,
                    actual: item.embedding.len(),
                });
            }
            let mut v = item.embedding;
            l2_normalize(&mut v);
            if item.index < vectors.len() {
                vectors[item.index] = v;
            }
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
