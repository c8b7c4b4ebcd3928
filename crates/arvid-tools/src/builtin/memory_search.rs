// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `memory_search` — ranked retrieval over the long-term memory.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use arvid_memory::MemoryManager;

use crate::coerce::{arg_str, arg_u32};
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct MemorySearchTool {
    pub memory: Arc<MemoryManager>,
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn description(&self) -> &str {
        "Search long-term memory for facts about the user and past events.\n\
         Returns: ranked snippets with their source file and score.\n\
         Use when the user refers to stored personal context (keys, dates,\n\
         preferences, earlier conversations)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Free-text search query"
                },
                "top_k": {
                    "type": "integer",
                    "description": "Maximum results (default from config)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let query = match arg_str(&call.args, "query") {
            Some(q) if !q.trim().is_empty() => q,
            _ => return ToolOutput::err(&call.id, "missing or empty 'query'"),
        };

        let hits = match arg_u32(&call.args, "top_k") {
            Some(k) => self.memory.memory_search_k(&query, k as usize).await,
            None => self.memory.memory_search(&query).await,
        };

        match hits {
            Ok(hits) if hits.is_empty() => {
                ToolOutput::ok(&call.id, "No relevant memories found.")
            }
            Ok(hits) => {
                let mut lines = vec![format!("Found {} relevant memories:", hits.len())];
                for (i, hit) in hits.iter().enumerate() {
                    lines.push(format!(
                        "{}. [{:.2}] {} (lines {}-{})\n{}",
                        i + 1,
                        hit.score,
                        hit.file_path,
                        hit.start_line,
                        hit.end_line,
                        hit.snippet
                    ));
                }
                ToolOutput::ok(&call.id, lines.join("\n\n"))
            }
            Err(e) => ToolOutput::err(&call.id, format!("memory search failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arvid_config::{Config, EmbeddingKind};
    use serde_json::json;
    use tempfile::TempDir;

    async fn memory(dir: &TempDir) -> Arc<MemoryManager> {
        let mut cfg = Config::default();
        cfg.paths.workspace_dir = dir.path().join("ws");
        cfg.paths.state_dir = dir.path().join("state");
        cfg.embedding.kind = EmbeddingKind::None;
        cfg.memory.chunk_tokens = 15;
        std::fs::create_dir_all(&cfg.paths.workspace_dir).unwrap();
        // Background corpus: BM25 relevance needs documents to rank against.
        std::fs::create_dir_all(dir.path().join("ws/memory")).unwrap();
        std::fs::write(
            dir.path().join("ws/memory/2025-07-01.md"),
            "# 2025-07-01\n\
             - watered balcony tomatoes before work\n\
             - violin practice moved to tuesday evenings\n\
             - ferry timetable changes next month\n\
             - bread starter fed twice weekly\n\
             - garage door sensor battery replaced\n\
             - museum cartography exhibit closes soon\n\
             - winter tires swapped at workshop\n\
             - spanish vocabulary drills after dinner\n",
        )
        .unwrap();
        Arc::new(MemoryManager::start(&cfg).await.unwrap())
    }

    fn call(args: Value) -> ToolCall {
        ToolCall {
            id: "ms1".into(),
            name: "memory_search".into(),
            args,
        }
    }

    #[tokio::test]
    async fn missing_query_is_error() {
        let dir = TempDir::new().unwrap();
        let t = MemorySearchTool {
            memory: memory(&dir).await,
        };
        let out = t.execute(&call(json!({}))).await;
        assert!(out.is_error);
        t.memory.close().await;
    }

    #[tokio::test]
    async fn empty_memory_reports_no_results() {
        let dir = TempDir::new().unwrap();
        let t = MemorySearchTool {
            memory: memory(&dir).await,
        };
        let out = t
            .execute(&call(json!({ "query": "what is my api key?" })))
            .await;
        assert!(!out.is_error);
        assert!(out.content.contains("No relevant memories"));
        t.memory.close().await;
    }

    #[tokio::test]
    async fn finds_seeded_memory() {
        let dir = TempDir::new().unwrap();
        let t = MemorySearchTool {
            memory: memory(&dir).await,
        };
        t.memory
            .write_long_term("keys", "my API key for billing: SECRET-42")
            .unwrap();
        t.memory.re_index().await.unwrap();

        let out = t
            .execute(&call(json!({ "query": "What is my API key?" })))
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.contains("SECRET-42"));
        assert!(out.content.contains("MEMORY.md"));
        t.memory.close().await;
    }

    #[tokio::test]
    async fn wrapped_query_argument_accepted() {
        let dir = TempDir::new().unwrap();
        let t = MemorySearchTool {
            memory: memory(&dir).await,
        };
        let out = t
            .execute(&call(json!({ "query": { "type": "string", "value": "my birthday" } })))
            .await;
        assert!(!out.is_error);
        t.memory.close().await;
    }
}
