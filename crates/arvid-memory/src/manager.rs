// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! One handle over the whole memory subsystem.
//!
//! Owns the store, indexer, retriever, writer, pending queue and watcher,
//! and exposes the small read/write API the rest of the process (agent
//! tools, admin surface) talks to: `memory_search`, `memory_get`,
//! `write_today`, `write_long_term`, `save_pending`, `re_index`,
//! `chunk_count`, `close`.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::Mutex;
use tracing::{info, warn};

use arvid_config::{Config, EmbeddingKind};

use crate::embedding::{EmbeddingProvider, NullEmbedder, OpenAICompatEmbedder};
use crate::indexer::Indexer;
use crate::pending::PendingMode;
use crate::retriever::{MemoryHit, Retriever};
use crate::store::{IndexStore, StoredChunk};
use crate::watcher::FileWatcher;
use crate::writer::MemoryWriter;

pub struct MemoryManager {
    store: Arc<IndexStore>,
    indexer: Arc<Indexer>,
    retriever: Retriever,
    writer: MemoryWriter,
    watcher: Mutex<Option<FileWatcher>>,
    flush_threshold: usize,
    ttl_days: i64,
    top_k: usize,
}

impl MemoryManager {
    /// Open the store and start the watcher.  A store that cannot be opened
    /// is fatal; an unreadable workspace surfaces on the first index pass.
    pub async fn start(cfg: &Config) -> anyhow::Result<Self> {
        let store =
            Arc::new(IndexStore::open(&cfg.paths.db_file()).context("opening memory store")?);
        let embedder = build_embedder(cfg);
        let dirty = Arc::new(AtomicBool::new(false));

        let indexer = Arc::new(Indexer::new(
            Arc::clone(&store),
            Arc::clone(&embedder),
            cfg.embedding.endpoint.clone(),
            cfg.paths.workspace_dir.clone(),
            &cfg.memory,
        ));

        let retriever = Retriever::new(
            Arc::clone(&store),
            Arc::clone(&embedder),
            cfg.memory.clone(),
        );

        let writer = MemoryWriter::new(
            cfg.paths.long_term_file(),
            cfg.paths.daily_dir(),
            cfg.paths.backup_dir(),
            cfg.memory.backup_keep,
            Arc::clone(&dirty),
        );

        // Startup pass: index everything, then purge stale pending entries.
        if let Err(e) = indexer.index_all().await {
            warn!(error = %e, "startup indexing failed; retrieval may be stale");
        }
        match store.pending_purge_older_than(cfg.memory.short_term_ttl_days) {
            Ok(0) => {}
            Ok(n) => info!(purged = n, "dropped expired pending memories"),
            Err(e) => warn!(error = %e, "pending-memory purge failed"),
        }

        let watcher = FileWatcher::spawn(
            Arc::clone(&indexer),
            Arc::clone(&dirty),
            Duration::from_secs(cfg.memory.watch_interval_secs),
        );

        Ok(Self {
            store,
            indexer,
            retriever,
            writer,
            watcher: Mutex::new(Some(watcher)),
            flush_threshold: cfg.memory.flush_threshold,
            ttl_days: cfg.memory.short_term_ttl_days,
            top_k: cfg.memory.top_k,
        })
    }

    // ── Read API ──────────────────────────────────────────────────────────────

    /// Ranked retrieval with the configured default result cap.
    pub async fn memory_search(&self, query: &str) -> anyhow::Result<Vec<MemoryHit>> {
        self.retriever.search(query, self.top_k).await
    }

    /// Ranked retrieval with an explicit result cap.
    pub async fn memory_search_k(&self, query: &str, k: usize) -> anyhow::Result<Vec<MemoryHit>> {
        self.retriever.search(query, k).await
    }

    /// Fetch one chunk verbatim by id.
    pub fn memory_get(&self, chunk_id: &str) -> anyhow::Result<Option<StoredChunk>> {
        self.store.get_chunk(chunk_id)
    }

    pub fn chunk_count(&self) -> anyhow::Result<u64> {
        self.store.chunk_count()
    }

    // ── Write API ─────────────────────────────────────────────────────────────

    /// Append to today's log.  Returns `false` when the noise filter
    /// suppressed the write.
    pub fn write_today(&self, content: &str) -> anyhow::Result<bool> {
        self.writer.write_today(content)
    }

    pub fn write_long_term(&self, category: &str, content: &str) -> anyhow::Result<bool> {
        self.writer.write_long_term(category, content)
    }

    /// Append a pre-formatted section (with its own header) to `MEMORY.md`.
    pub fn append_long_term_raw(&self, section: &str) -> anyhow::Result<()> {
        self.writer.append_long_term_raw(section)
    }

    /// Queue a small observation; once the queue reaches the flush
    /// threshold every queued entry is written out and the queue clears.
    /// Returns `true` when this push triggered a flush.
    pub fn save_pending(
        &self,
        content: &str,
        category: &str,
        mode: PendingMode,
    ) -> anyhow::Result<bool> {
        self.store.pending_push(content, category, mode)?;
        if self.store.pending_len()? >= self.flush_threshold {
            self.flush_pending()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Write every queued entry to its destination and clear the queue.
    /// Entries past the TTL are purged, not written.
    pub fn flush_pending(&self) -> anyhow::Result<usize> {
        let purged = self.store.pending_purge_older_than(self.ttl_days)?;
        if purged > 0 {
            info!(purged, "dropped expired pending memories before flush");
        }
        let entries = self.store.pending_all()?;
        let mut written = 0usize;
        let mut done: Vec<i64> = Vec::with_capacity(entries.len());
        for entry in entries {
            let result = match entry.mode {
                PendingMode::Daily => self.writer.write_today(&entry.content),
                PendingMode::LongTerm => {
                    self.writer.write_long_term(&entry.category, &entry.content)
                }
            };
            match result {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => {
                    // Leave the entry queued; it will retry on the next flush.
                    warn!(id = entry.id, error = %e, "pending flush write failed");
                    continue;
                }
            }
            done.push(entry.id);
        }
        self.store.pending_delete(&done)?;
        Ok(written)
    }

    // ── Maintenance ───────────────────────────────────────────────────────────

    /// Force a full re-index regardless of the dirty flag.
    pub async fn re_index(&self) -> anyhow::Result<usize> {
        self.indexer.index_all().await
    }

    /// Stop the watcher.  The store closes when the manager drops.
    pub async fn close(&self) {
        if let Some(watcher) = self.watcher.lock().await.take() {
            watcher.stop().await;
        }
    }
}

fn build_embedder(cfg: &Config) -> Arc<dyn EmbeddingProvider> {
    match cfg.embedding.kind {
        EmbeddingKind::None => Arc::new(NullEmbedder),
        EmbeddingKind::Local => Arc::new(OpenAICompatEmbedder::local(
            cfg.embedding.model.clone(),
            &cfg.embedding.endpoint,
            cfg.embedding.dimensions,
        )),
        EmbeddingKind::Remote => {
            let key = cfg
                .embedding
                .api_key_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok());
            match key {
                Some(key) => Arc::new(OpenAICompatEmbedder::remote(
                    cfg.embedding.model.clone(),
                    &cfg.embedding.endpoint,
                    cfg.embedding.dimensions,
                    key,
                )),
                None => {
                    warn!("remote embedding configured but no API key found; disabling vectors");
                    Arc::new(NullEmbedder)
                }
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
