// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Polling re-index loop.
//!
//! Writers flip the shared dirty flag; every poll tick the watcher clears
//! the flag and runs a full index pass.  Polling (instead of inotify-style
//! events) keeps the behavior identical across platforms and network
//! filesystems, and the hash check in the indexer makes a spurious pass
//! cheap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::indexer::Indexer;

pub struct FileWatcher {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl FileWatcher {
    /// Start the poll loop.  `dirty` is the flag writers set; the watcher
    /// clears it before re-indexing so writes racing the index pass are
    /// picked up on the next tick rather than lost.
    pub fn spawn(indexer: Arc<Indexer>, dirty: Arc<AtomicBool>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            debug!("file watcher stopping");
                            break;
                        }
                    }
                    _ = tick.tick() => {
                        if dirty.swap(false, Ordering::SeqCst) {
                            if let Err(e) = indexer.index_all().await {
                                warn!(error = %e, "watcher re-index failed");
                            }
                        }
                    }
                }
            }
        });
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Cooperative shutdown: signal the loop and wait for it to finish its
    /// current pass.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::NullEmbedder;
    use crate::store::IndexStore;
    use arvid_config::MemoryConfig;
    use tempfile::TempDir;

    fn make_indexer(dir: &TempDir) -> (Arc<Indexer>, Arc<IndexStore>) {
        let store = Arc::new(IndexStore::open_in_memory().unwrap());
        let indexer = Arc::new(Indexer::new(
            Arc::clone(&store),
            Arc::new(NullEmbedder),
            String::new(),
            dir.path().to_path_buf(),
            &MemoryConfig::default(),
        ));
        (indexer, store)
    }

    #[tokio::test]
    async fn dirty_flag_triggers_reindex_and_clears() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("MEMORY.md"), "# MEMORY\n\nremember the milk\n").unwrap();
        let (indexer, store) = make_indexer(&dir);

        let dirty = Arc::new(AtomicBool::new(true));
        let watcher = FileWatcher::spawn(
            Arc::clone(&indexer),
            Arc::clone(&dirty),
            Duration::from_millis(10),
        );

        // Give the loop a few ticks to notice the flag.
        for _ in 0..50 {
            if store.chunk_count().unwrap() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(store.chunk_count().unwrap() > 0);
        assert!(!dirty.load(Ordering::SeqCst), "flag must be cleared");

        watcher.stop().await;
    }

    #[tokio::test]
    async fn clean_flag_means_no_work() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("MEMORY.md"), "# MEMORY\n\ncontent\n").unwrap();
        let (indexer, store) = make_indexer(&dir);

        let dirty = Arc::new(AtomicBool::new(false));
        let watcher = FileWatcher::spawn(
            Arc::clone(&indexer),
            Arc::clone(&dirty),
            Duration::from_millis(10),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.chunk_count().unwrap(), 0);
        watcher.stop().await;
    }

    #[tokio::test]
    async fn stop_returns_promptly() {
        let dir = TempDir::new().unwrap();
        let (indexer, _) = make_indexer(&dir);
        let dirty = Arc::new(AtomicBool::new(false));
        let watcher = FileWatcher::spawn(indexer, dirty, Duration::from_secs(3600));
        // A long poll interval must not delay shutdown.
        tokio::time::timeout(Duration::from_secs(1), watcher.stop())
            .await
            .expect("stop must not hang");
    }
}
