// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Text → vector capability.
//!
//! Addressed in batch and treated as lazy and idempotent by callers: a
//! failed batch fails whole (never partial results), and the index writer
//! must not persist embeddings from a failed call.

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

/// Connection attempts before a batch is reported as failed.
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name for status display and cache keying.
    fn name(&self) -> &str;
    /// Model identifier, part of every cache key.
    fn model_name(&self) -> &str;
    /// Vector dimensionality this model produces.
    fn dimensions(&self) -> usize;
    /// Embed a batch of texts.  Either every text succeeds or the whole
    /// batch fails.
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Cosine similarity between two vectors; 0.0 for mismatched or zero-norm
/// inputs so a degenerate vector can never poison a ranking with NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

// ─── OpenAI-compatible embedder ───────────────────────────────────────────────

/// Embedder speaking the OpenAI-compatible `/embeddings` wire format.
///
/// Covers both remote APIs (key via config) and local inference servers
/// (no key) — they differ only in endpoint and auth.
pub struct OpenAICompatEmbedder {
    name: &'static str,
    model: String,
    dimensions: usize,
    api_key: Option<String>,
    embeddings_url: String,
    client: reqwest::Client,
}

impl OpenAICompatEmbedder {
    /// Remote API endpoint with bearer auth.
    pub fn remote(
        model: impl Into<String>,
        base_url: &str,
        dimensions: usize,
        api_key: String,
    ) -> Self {
        Self::build("embed-remote", model, base_url, dimensions, Some(api_key))
    }

    /// Local inference server: same wire shape, no auth.
    pub fn local(model: impl Into<String>, base_url: &str, dimensions: usize) -> Self {
        Self::build("embed-local", model, base_url, dimensions, None)
    }

    fn build(
        name: &'static str,
        model: impl Into<String>,
        base_url: &str,
        dimensions: usize,
        api_key: Option<String>,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            name,
            model: model.into(),
            dimensions,
            api_key,
            embeddings_url: format!("{base}/embeddings"),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAICompatEmbedder {
    fn name(&self) -> &str {
        self.name
    }
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({ "model": self.model, "input": texts });

        let mut last_err: Option<anyhow::Error> = None;
        for attempt in 1..=MAX_ATTEMPTS {
            let mut req = self.client.post(&self.embeddings_url).json(&body);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }
            match req.send().await {
                Ok(resp) if resp.status().is_success() => {
                    let v: Value = resp
                        .json()
                        .await
                        .context("decoding embeddings response")?;
                    return parse_embeddings(&v, texts.len(), self.dimensions);
                }
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_server_error() && attempt < MAX_ATTEMPTS {
                        warn!(%status, attempt, "embedding endpoint error; retrying");
                        last_err =
                            Some(anyhow::anyhow!("embedding endpoint error {status}: {text}"));
                    } else {
                        bail!("embedding endpoint error {status}: {text}");
                    }
                }
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!(error = %e, attempt, "embedding request failed; retrying");
                    last_err = Some(e.into());
                }
                Err(e) => return Err(e).context("embedding request failed"),
            }
            tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt - 1)).await;
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("embedding attempts exhausted")))
    }
}

/// Decode the `data[].embedding` arrays, validating count and dimensions so
/// a short or reordered response can never be persisted against the wrong
/// chunk.
fn parse_embeddings(v: &Value, expected: usize, dims: usize) -> anyhow::Result<Vec<Vec<f32>>> {
    let data = v["data"]
        .as_array()
        .context("embeddings response missing 'data'")?;
    if data.len() != expected {
        bail!(
            "embedding count mismatch: sent {expected} texts, got {} vectors",
            data.len()
        );
    }
    // Providers may return entries out of order; `index` restores it.
    let mut out: Vec<Vec<f32>> = vec![Vec::new(); expected];
    for item in data {
        let idx = item["index"].as_u64().context("embedding missing index")? as usize;
        if idx >= expected {
            bail!("embedding index {idx} out of range");
        }
        let vec: Vec<f32> = item["embedding"]
            .as_array()
            .context("embedding missing vector")?
            .iter()
            .filter_map(|x| x.as_f64().map(|f| f as f32))
            .collect();
        if vec.len() != dims {
            bail!(
                "embedding dimension mismatch: expected {dims}, got {}",
                vec.len()
            );
        }
        out[idx] = vec;
    }
    Ok(out)
}

// ─── Null embedder ────────────────────────────────────────────────────────────

/// No vectors at all.  Retrieval degrades to BM25-only ranking; callers
/// should not invoke `embed` (it reports zero dimensions).
#[derive(Debug, Default)]
pub struct NullEmbedder;

#[async_trait]
impl EmbeddingProvider for NullEmbedder {
    fn name(&self) -> &str {
        "embed-null"
    }
    fn model_name(&self) -> &str {
        "none"
    }
    fn dimensions(&self) -> usize {
        0
    }
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(vec![Vec::new(); texts.len()])
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
