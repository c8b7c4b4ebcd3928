// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Short-term memory queue.
//!
//! Tools push small observations here instead of writing markdown on every
//! turn; once the queue reaches the flush threshold, everything is written
//! out in one pass (daily log or long-term file, per entry mode) and the
//! queue clears.  Entries that out-live the TTL before a flush are stale by
//! definition and are purged instead of written.

use serde::{Deserialize, Serialize};

/// Destination of a queued memory once it flushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingMode {
    Daily,
    LongTerm,
}

impl PendingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::LongTerm => "long_term",
        }
    }

    /// Forgiving parse for values read back from the store; unknown modes
    /// fall back to the daily log, which is the lower-stakes destination.
    pub fn parse(s: &str) -> Self {
        match s {
            "long_term" => Self::LongTerm,
            _ => Self::Daily,
        }
    }
}

/// One queued memory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingMemory {
    pub id: i64,
    pub content: String,
    pub category: String,
    pub mode: PendingMode,
    /// Unix seconds.
    pub created_at: i64,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_through_str() {
        assert_eq!(PendingMode::parse(PendingMode::Daily.as_str()), PendingMode::Daily);
        assert_eq!(
            PendingMode::parse(PendingMode::LongTerm.as_str()),
            PendingMode::LongTerm
        );
    }

    #[test]
    fn unknown_mode_falls_back_to_daily() {
        assert_eq!(PendingMode::parse("???"), PendingMode::Daily);
    }
}
