// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Contents of the lock marker file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub locked_at: DateTime<Utc>,
    pub pid: u32,
}

/// Filesystem flag ensuring at most one active multi-step plan.
///
/// Presence of the file means a plan is in progress — including after a
/// crash, which is exactly what lets the next process resume it.  The lock
/// is therefore deliberately NOT cleaned up on drop.
#[derive(Debug, Clone)]
pub struct TaskLock {
    path: PathBuf,
}

impl TaskLock {
    pub fn new(tasks_dir: &Path) -> Self {
        Self {
            path: tasks_dir.join("task.lock"),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Create the lock file.  Returns `false` when it already exists —
    /// the caller decides whether that is contention or a resumed plan.
    pub fn acquire(&self) -> anyhow::Result<bool> {
        if self.exists() {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let info = LockInfo {
            locked_at: Utc::now(),
            pid: std::process::id(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&info)?)?;
        Ok(true)
    }

    pub fn release(&self) -> anyhow::Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    /// Read back the lock metadata; `None` when absent or unreadable.
    pub fn info(&self) -> Option<LockInfo> {
        let text = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&text) {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(error = %e, "task lock file unparseable");
                None
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
