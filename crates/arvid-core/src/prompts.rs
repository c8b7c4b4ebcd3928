// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use arvid_memory::MemoryHit;

/// Built-in system prompt; a config override replaces it wholesale.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are arvid, a personal assistant running on the user's own machine. \
You have long-term memory, a task planner, and scheduled background jobs. \
Use memory_search before answering questions about the user's life, keys, \
dates, or past conversations. Use task_planner for any work that spans \
multiple steps. Keep answers concise; reply in the user's language.";

/// Prefix wrapped around failed tool results so the model (and the user's
/// transcript) can tell a failure from a result at a glance.
pub const TOOL_FAILURE_PREFIX: &str = "【執行失敗】：";

/// Render retrieval hits as the transient "relevant memories" system
/// message.  Snippets go in verbatim so the model can cite them.
pub fn format_memory_hint(hits: &[MemoryHit]) -> String {
    let mut out = String::from(
        "Relevant memories (retrieved from the user's long-term memory; \
         cite them when they answer the question):\n",
    );
    for hit in hits {
        out.push_str(&format!(
            "\n--- {} (lines {}-{}, score {:.2}) ---\n{}\n",
            hit.file_path, hit.start_line, hit.end_line, hit.score, hit.snippet
        ));
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
