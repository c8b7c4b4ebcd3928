// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Splits markdown into overlapping line-aligned chunks.
//!
//! Chunks accumulate complete lines until the character budget
//! (`chunk_tokens × 4`) is met; a sliding window of roughly
//! `overlap_tokens × 4` trailing characters is repeated at the head of the
//! next chunk so no statement is ever cut off at a retrieval boundary.

use serde::{Deserialize, Serialize};

use crate::text::space_cjk;

/// Characters per token under the estimation heuristic used everywhere else.
const CHARS_PER_TOKEN: usize = 4;

/// A contiguous slice of one markdown file — the unit of indexing and
/// retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable id derived from the source location:
    /// `file:<path>:<start_line>-<end_line>`.
    pub id: String,
    pub file_path: String,
    /// 1-indexed, inclusive.
    pub start_line: usize,
    /// 1-indexed, exclusive.
    pub end_line: usize,
    pub content: String,
    /// CJK-spaced form fed to the FTS index.
    pub search_content: String,
    /// Approximate token count of `content`.
    pub tokens: usize,
    /// Importance in `[0, 1]`, assigned at chunk time and persisted with
    /// the chunk.
    pub importance: f32,
}

impl Chunk {
    fn new(file_path: &str, start_line: usize, end_line: usize, content: String) -> Self {
        let search_content = space_cjk(&content);
        let tokens = (content.len() / CHARS_PER_TOKEN).max(1);
        let importance = chunk_importance(file_path, &content);
        Self {
            id: format!("file:{file_path}:{start_line}-{end_line}"),
            file_path: file_path.to_string(),
            start_line,
            end_line,
            content,
            search_content,
            tokens,
            importance,
        }
    }
}

/// Importance of a chunk in `[0, 1]`, assigned when the chunk is built and
/// stored alongside it.
///
/// Long-term memory outranks the daily logs, and chunks that carry a
/// section header are the curated ones.
pub fn chunk_importance(file_path: &str, content: &str) -> f32 {
    let mut importance: f32 = 0.5;
    if file_path == "MEMORY.md" {
        importance += 0.3;
    }
    if content.lines().any(|l| l.starts_with("## ")) {
        importance += 0.2;
    }
    importance.min(1.0)
}

/// Split `content` into chunks of at most ≈`chunk_tokens` tokens with
/// ≈`overlap_tokens` of line-aligned tail overlap.
///
/// Empty files produce no chunks; a single oversized line still produces one
/// chunk; chunks whose trimmed content is empty are skipped.
pub fn chunk_markdown(
    file_path: &str,
    content: &str,
    chunk_tokens: usize,
    overlap_tokens: usize,
) -> Vec<Chunk> {
    let budget_chars = chunk_tokens.max(1) * CHARS_PER_TOKEN;
    let overlap_chars = overlap_tokens * CHARS_PER_TOKEN;

    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    // Current window: [start..end) as 0-based line indices.
    let mut start = 0usize;

    while start < lines.len() {
        let mut end = start;
        let mut chars = 0usize;

        // Accumulate complete lines until the budget is met.  The first line
        // is always taken so an oversized line still yields one chunk.
        while end < lines.len() {
            let line_len = lines[end].len() + 1;
            if end > start && chars + line_len > budget_chars {
                break;
            }
            chars += line_len;
            end += 1;
        }

        let text = lines[start..end].join("\n");
        if !text.trim().is_empty() {
            // Stored line numbers are 1-indexed with an exclusive end.
            chunks.push(Chunk::new(file_path, start + 1, end + 1, text));
        }

        if end >= lines.len() {
            break;
        }

        // Walk back from `end` until the overlap window is covered, so the
        // tail of this chunk repeats at the head of the next one.
        let mut overlap_start = end;
        let mut overlap = 0usize;
        while overlap_start > start + 1 && overlap < overlap_chars {
            overlap_start -= 1;
            overlap += lines[overlap_start].len() + 1;
        }
        start = overlap_start.max(start + 1);
    }

    chunks
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
