// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Appends to the markdown memory files and flips the dirty flag.
//!
//! Two destinations: the per-day log `memory/YYYY-MM-DD.md` and the
//! long-term `MEMORY.md`, whose sections are separated by `\n---\n`.  The
//! writer never edits existing content — memory files are append-only, and
//! every successful write marks the index dirty so the watcher re-indexes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use tracing::{debug, warn};

use crate::noise::NoiseFilter;

pub struct MemoryWriter {
    /// `MEMORY.md` location.
    long_term_file: PathBuf,
    /// Directory of the per-day logs.
    daily_dir: PathBuf,
    /// Rolling `MEMORY.md` backups live here.
    backup_dir: PathBuf,
    backup_keep: usize,
    dirty: Arc<AtomicBool>,
    filter: NoiseFilter,
}

impl MemoryWriter {
    pub fn new(
        long_term_file: PathBuf,
        daily_dir: PathBuf,
        backup_dir: PathBuf,
        backup_keep: usize,
        dirty: Arc<AtomicBool>,
    ) -> Self {
        Self {
            long_term_file,
            daily_dir,
            backup_dir,
            backup_keep,
            dirty,
            filter: NoiseFilter::new(),
        }
    }

    /// Append a timestamped entry to today's log.
    ///
    /// Low-value content (assistant boilerplate, capability denials) is
    /// silently dropped — the same catalog that filters retrieval results
    /// keeps it out of the files in the first place.  Returns `true` when
    /// something was written.
    pub fn write_today(&self, content: &str) -> anyhow::Result<bool> {
        let content = content.trim();
        if content.is_empty() || self.filter.is_noise_content(content) {
            debug!("suppressing low-value daily memory write");
            return Ok(false);
        }

        let now = Local::now();
        let path = self.daily_dir.join(format!("{}.md", now.format("%Y-%m-%d")));
        std::fs::create_dir_all(&self.daily_dir)
            .with_context(|| format!("creating {}", self.daily_dir.display()))?;

        let mut text = if path.exists() {
            std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?
        } else {
            format!("# {}\n", now.format("%Y-%m-%d"))
        };
        text.push_str(&format!("\n- {} {}\n", now.format("%H:%M"), content));
        std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;

        self.dirty.store(true, Ordering::SeqCst);
        Ok(true)
    }

    /// Append a categorized section to the long-term file.
    pub fn write_long_term(&self, category: &str, content: &str) -> anyhow::Result<bool> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(false);
        }

        if let Some(parent) = self.long_term_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        self.backup_long_term();

        let mut text = if self.long_term_file.exists() {
            std::fs::read_to_string(&self.long_term_file)
                .with_context(|| format!("reading {}", self.long_term_file.display()))?
        } else {
            "# MEMORY\n".to_string()
        };

        let now = Local::now();
        let category = if category.is_empty() { "note" } else { category };
        text.push_str(&format!(
            "\n---\n\n## {} ({})\n\n{}\n",
            category,
            now.format("%Y-%m-%d %H:%M"),
            content
        ));
        std::fs::write(&self.long_term_file, text)
            .with_context(|| format!("writing {}", self.long_term_file.display()))?;

        self.dirty.store(true, Ordering::SeqCst);
        Ok(true)
    }

    /// Append an already-formatted section verbatim (used by session
    /// summarization, which brings its own header).
    pub fn append_long_term_raw(&self, section: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.long_term_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        self.backup_long_term();
        let mut text = if self.long_term_file.exists() {
            std::fs::read_to_string(&self.long_term_file)
                .with_context(|| format!("reading {}", self.long_term_file.display()))?
        } else {
            "# MEMORY\n".to_string()
        };
        text.push_str(&format!("\n---\n\n{section}\n"));
        std::fs::write(&self.long_term_file, text)
            .with_context(|| format!("writing {}", self.long_term_file.display()))?;
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Copy the current `MEMORY.md` into the backup directory and drop the
    /// oldest copies beyond the keep budget.  Best-effort: backup failures
    /// are logged, never fatal to the write itself.
    fn backup_long_term(&self) {
        if !self.long_term_file.exists() {
            return;
        }
        if let Err(e) = self.try_backup() {
            warn!(error = %e, "long-term memory backup failed");
        }
    }

    fn try_backup(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.backup_dir)
            .with_context(|| format!("creating {}", self.backup_dir.display()))?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let dst = self.backup_dir.join(format!("MEMORY_{stamp}.md"));
        std::fs::copy(&self.long_term_file, &dst)
            .with_context(|| format!("copying to {}", dst.display()))?;

        // Rotate: newest `backup_keep` files survive.
        let mut backups: Vec<PathBuf> = std::fs::read_dir(&self.backup_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("MEMORY_") && n.ends_with(".md"))
                    .unwrap_or(false)
            })
            .collect();
        backups.sort();
        while backups.len() > self.backup_keep {
            let victim = backups.remove(0);
            if let Err(e) = std::fs::remove_file(&victim) {
                warn!(path = %victim.display(), error = %e, "failed to drop old backup");
                break;
            }
        }
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
