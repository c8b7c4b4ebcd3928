// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Walks the markdown workspace into the index store.
//!
//! Per file: hash, skip-if-unchanged, chunk, batch-embed through the cache,
//! transactional replace.  A failure on one file logs and moves on — one
//! corrupt or unreadable file must never block the rest of the memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, warn};

use arvid_config::MemoryConfig;

use crate::chunker::{chunk_markdown, Chunk};
use crate::embedding::EmbeddingProvider;
use crate::store::{content_hash, sha256_hex, IndexStore};

pub struct Indexer {
    store: Arc<IndexStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    embed_endpoint: String,
    chunk_tokens: usize,
    overlap_tokens: usize,
    /// Workspace root; indexed paths are recorded relative to it so the
    /// index stays valid when the workspace directory moves.
    workspace_dir: PathBuf,
    extra_paths: Vec<PathBuf>,
}

impl Indexer {
    pub fn new(
        store: Arc<IndexStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        embed_endpoint: String,
        workspace_dir: PathBuf,
        cfg: &MemoryConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            embed_endpoint,
            chunk_tokens: cfg.chunk_tokens,
            overlap_tokens: cfg.overlap_tokens,
            workspace_dir,
            extra_paths: cfg.extra_paths.clone(),
        }
    }

    /// Index every markdown file under the workspace: the long-term file,
    /// the daily logs, and any configured extra paths.  Files that vanished
    /// since the last run are dropped from the index.
    pub async fn index_all(&self) -> anyhow::Result<usize> {
        let mut files = self.discover_files();
        files.sort();
        files.dedup();

        let mut indexed = 0usize;
        let mut seen: Vec<String> = Vec::with_capacity(files.len());
        for path in &files {
            let rel = self.relative_key(path);
            seen.push(rel.clone());
            match self.index_file(path).await {
                Ok(true) => indexed += 1,
                Ok(false) => {}
                Err(e) => warn!(file = %path.display(), error = %e, "indexing failed; continuing"),
            }
        }

        // Drop index entries whose source file is gone.
        match self.store.indexed_files() {
            Ok(known) => {
                for stale in known.into_iter().filter(|f| !seen.contains(f)) {
                    debug!(file = %stale, "removing vanished file from index");
                    if let Err(e) = self.store.delete_file(&stale) {
                        warn!(file = %stale, error = %e, "failed to remove stale index entry");
                    }
                }
            }
            Err(e) => warn!(error = %e, "could not enumerate indexed files"),
        }

        if indexed > 0 {
            info!(files = indexed, "memory index refreshed");
        }
        Ok(indexed)
    }

    /// Index one file.  Returns `Ok(false)` when the content hash matches
    /// the recorded one and nothing was done.
    pub async fn index_file(&self, path: &Path) -> anyhow::Result<bool> {
        let rel = self.relative_key(path);
        let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let hash = sha256_hex(&data);

        if self.store.file_hash(&rel)?.as_deref() == Some(hash.as_str()) {
            return Ok(false);
        }

        let text = String::from_utf8_lossy(&data);
        let chunks = chunk_markdown(&rel, &text, self.chunk_tokens, self.overlap_tokens);

        let vectors = self.embed_with_cache(&chunks).await;
        let entries: Vec<(Chunk, Option<Vec<f32>>)> =
            chunks.into_iter().zip(vectors).collect();

        self.store.replace_file(
            &rel,
            &hash,
            &entries,
            self.embedder.name(),
            self.embedder.model_name(),
            &self.embed_endpoint,
        )?;
        debug!(file = %rel, chunks = entries.len(), "file indexed");
        Ok(true)
    }

    /// Batch-embed chunk contents through the cache.
    ///
    /// Cache hits skip the provider; only misses go out in one batch.  When
    /// the provider call fails, every miss stays vector-less (the keyword
    /// index still works) — partial embeddings are never persisted.  Cache
    /// writes are best-effort.
    async fn embed_with_cache(&self, chunks: &[Chunk]) -> Vec<Option<Vec<f32>>> {
        if self.embedder.dimensions() == 0 || chunks.is_empty() {
            return vec![None; chunks.len()];
        }
        let provider = self.embedder.name();
        let model = self.embedder.model_name();

        let mut out: Vec<Option<Vec<f32>>> = vec![None; chunks.len()];
        let mut miss_texts: Vec<String> = Vec::new();
        let mut miss_index: Vec<usize> = Vec::new();
        let mut hashes: HashMap<usize, String> = HashMap::new();

        for (i, chunk) in chunks.iter().enumerate() {
            let key = content_hash(&chunk.content, provider, model);
            match self.store.cache_get(&key) {
                Ok(Some(vec)) => {
                    out[i] = Some(vec);
                }
                Ok(None) => {
                    miss_texts.push(chunk.content.clone());
                    miss_index.push(i);
                }
                Err(e) => {
                    warn!(error = %e, "embedding cache lookup failed");
                    miss_texts.push(chunk.content.clone());
                    miss_index.push(i);
                }
            }
            hashes.insert(i, key);
        }

        if miss_texts.is_empty() {
            return out;
        }

        match self.embedder.embed(&miss_texts).await {
            Ok(vectors) => {
                for (slot, vec) in miss_index.into_iter().zip(vectors) {
                    if let Some(key) = hashes.get(&slot) {
                        if let Err(e) = self.store.cache_put(key, provider, model, &vec) {
                            warn!(error = %e, "embedding cache write failed");
                        }
                    }
                    out[slot] = Some(vec);
                }
            }
            Err(e) => {
                warn!(error = %e, "batch embedding failed; indexing without vectors");
            }
        }
        out
    }

    fn discover_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let long_term = self.workspace_dir.join("MEMORY.md");
        if long_term.is_file() {
            files.push(long_term);
        }

        let daily = self.workspace_dir.join("memory");
        collect_markdown(&daily, &mut files);

        for extra in &self.extra_paths {
            if extra.is_file() {
                files.push(extra.clone());
            } else {
                collect_markdown(extra, &mut files);
            }
        }
        files
    }

    /// Path key recorded in the store: workspace-relative when possible.
    fn relative_key(&self, path: &Path) -> String {
        path.strip_prefix(&self.workspace_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }
}

fn collect_markdown(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_file() && path.extension().map(|e| e == "md").unwrap_or(false) {
            out.push(path);
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
