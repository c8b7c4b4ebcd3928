// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `save_memory` — queue an observation for the markdown memory.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use arvid_memory::{MemoryManager, PendingMode};

use crate::coerce::arg_str;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct SaveMemoryTool {
    pub memory: Arc<MemoryManager>,
}

#[async_trait]
impl Tool for SaveMemoryTool {
    fn name(&self) -> &str {
        "save_memory"
    }

    fn description(&self) -> &str {
        "Save a fact or observation to memory. mode 'daily' appends to today's\n\
         log; mode 'long_term' adds a categorized section to the permanent\n\
         memory file. Writes are queued and flushed in batches."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The fact to remember"
                },
                "mode": {
                    "type": "string",
                    "enum": ["daily", "long_term"],
                    "description": "Destination (default: daily)"
                },
                "category": {
                    "type": "string",
                    "description": "Section heading for long_term entries"
                }
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let content = match arg_str(&call.args, "content") {
            Some(c) if !c.trim().is_empty() => c,
            _ => return ToolOutput::err(&call.id, "missing or empty 'content'"),
        };
        let mode = match arg_str(&call.args, "mode").as_deref() {
            None | Some("daily") => PendingMode::Daily,
            Some("long_term") => PendingMode::LongTerm,
            Some(other) => {
                return ToolOutput::err(
                    &call.id,
                    format!("invalid mode '{other}' (expected daily|long_term)"),
                )
            }
        };
        let category = arg_str(&call.args, "category").unwrap_or_default();

        match self.memory.save_pending(&content, &category, mode) {
            Ok(true) => ToolOutput::ok(&call.id, "Saved; memory queue flushed to disk."),
            Ok(false) => ToolOutput::ok(&call.id, "Saved to the memory queue."),
            Err(e) => ToolOutput::err(&call.id, format!("saving memory failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arvid_config::{Config, EmbeddingKind};
    use tempfile::TempDir;

    async fn tool(dir: &TempDir, flush_threshold: usize) -> SaveMemoryTool {
        let mut cfg = Config::default();
        cfg.paths.workspace_dir = dir.path().join("ws");
        cfg.paths.state_dir = dir.path().join("state");
        cfg.embedding.kind = EmbeddingKind::None;
        cfg.memory.flush_threshold = flush_threshold;
        std::fs::create_dir_all(&cfg.paths.workspace_dir).unwrap();
        SaveMemoryTool {
            memory: Arc::new(MemoryManager::start(&cfg).await.unwrap()),
        }
    }

    fn call(args: Value) -> ToolCall {
        ToolCall {
            id: "sm1".into(),
            name: "save_memory".into(),
            args,
        }
    }

    #[tokio::test]
    async fn missing_content_is_error() {
        let dir = TempDir::new().unwrap();
        let t = tool(&dir, 5).await;
        assert!(t.execute(&call(json!({}))).await.is_error);
        t.memory.close().await;
    }

    #[tokio::test]
    async fn invalid_mode_is_error() {
        let dir = TempDir::new().unwrap();
        let t = tool(&dir, 5).await;
        let out = t
            .execute(&call(json!({ "content": "something worth keeping", "mode": "weekly" })))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("invalid mode"));
        t.memory.close().await;
    }

    #[tokio::test]
    async fn queue_then_flush_at_threshold() {
        let dir = TempDir::new().unwrap();
        let t = tool(&dir, 2).await;
        let first = t
            .execute(&call(json!({ "content": "first queued observation" })))
            .await;
        assert!(first.content.contains("queue"));
        let second = t
            .execute(&call(json!({ "content": "second queued observation" })))
            .await;
        assert!(second.content.contains("flushed"));

        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        let text = std::fs::read_to_string(
            dir.path().join("ws/memory").join(format!("{date}.md")),
        )
        .unwrap();
        assert!(text.contains("first queued observation"));
        t.memory.close().await;
    }

    #[tokio::test]
    async fn long_term_mode_lands_in_memory_file() {
        let dir = TempDir::new().unwrap();
        let t = tool(&dir, 1).await;
        t.execute(&call(json!({
            "content": "prefers tea over coffee in the afternoon",
            "mode": "long_term",
            "category": "preferences"
        })))
        .await;
        let text = std::fs::read_to_string(dir.path().join("ws/MEMORY.md")).unwrap();
        assert!(text.contains("## preferences"));
        assert!(text.contains("prefers tea"));
        t.memory.close().await;
    }
}
