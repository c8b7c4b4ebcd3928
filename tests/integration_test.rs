// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! End-to-end scenarios over the full stack, driven by the scripted mock
//! model provider: real memory index, real plan files, real tools — only
//! the LLM is scripted.

use std::sync::Arc;

use arvid_config::{Config, EmbeddingKind};
use arvid_core::{Agent, AgentCallbacks};
use arvid_memory::MemoryManager;
use arvid_model::{ResponseEvent, Role, ScriptedMockProvider};
use arvid_planner::PlanStore;
use arvid_tools::builtin::{MemorySearchTool, SaveMemoryTool, TaskPlannerTool};
use arvid_tools::ToolRegistry;
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> Config {
    let mut cfg = Config::default();
    cfg.paths.workspace_dir = dir.path().join("ws");
    cfg.paths.state_dir = dir.path().join("state");
    cfg.embedding.kind = EmbeddingKind::None;
    cfg.memory.chunk_tokens = 15;
    std::fs::create_dir_all(&cfg.paths.workspace_dir).unwrap();
    cfg
}

/// Unrelated daily-log entries so BM25 has a corpus to rank against —
/// a one-document index has no meaningful keyword relevance.
fn seed_background_corpus(cfg: &Config) {
    let memory_dir = cfg.paths.daily_dir();
    std::fs::create_dir_all(&memory_dir).unwrap();
    std::fs::write(
        memory_dir.join("2025-07-01.md"),
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
}

async fn build_agent(cfg: &Config, provider: ScriptedMockProvider) -> (Agent, Arc<MemoryManager>) {
    let memory = Arc::new(MemoryManager::start(cfg).await.unwrap());
    let planner = Arc::new(PlanStore::new(cfg.paths.tasks_dir()));

    let mut registry = ToolRegistry::new();
    registry.register(MemorySearchTool {
        memory: Arc::clone(&memory),
    });
    registry.register(SaveMemoryTool {
        memory: Arc::clone(&memory),
    });
    registry.register(TaskPlannerTool {
        store: Arc::clone(&planner),
    });

    let agent = Agent::new(
        cfg,
        Arc::new(provider),
        Arc::new(registry),
        Arc::clone(&memory),
        planner,
        AgentCallbacks::new(),
    );
    (agent, memory)
}

fn tool_call_round(id: &str, name: &str, args: &str) -> Vec<ResponseEvent> {
    vec![
        ResponseEvent::ToolCall {
            index: 0,
            id: id.into(),
            name: name.into(),
            arguments: args.into(),
        },
        ResponseEvent::Done,
    ]
}

fn text_round(text: &str) -> Vec<ResponseEvent> {
    vec![ResponseEvent::TextDelta(text.into()), ResponseEvent::Done]
}

#[tokio::test]
async fn plan_creation_then_crash_recovery() {
    let dir = TempDir::new().unwrap();
    let cfg = test_config(&dir);

    // Turn 1: the model creates a three-step plan, then confirms.
    let provider = ScriptedMockProvider::new(vec![
        tool_call_round(
            "c1",
            "task_planner",
            r#"{"action":"create","goal":"Prep talk","steps":"outline;draft;review"}"#,
        ),
        text_round("Plan is set up — starting with the outline."),
    ]);
    let (mut agent, memory) = build_agent(&cfg, provider).await;
    agent.chat("plan my day").await.unwrap();

    // Plan file and lock exist with three pending steps.
    let plan = PlanStore::new(cfg.paths.tasks_dir()).load().unwrap();
    assert_eq!(plan.goal, "Prep talk");
    assert_eq!(plan.steps.len(), 3);
    assert!(plan.steps.iter().all(|s| !s.status.is_terminal()));
    assert!(cfg.paths.tasks_dir().join("task.lock").exists());

    // "Crash": drop the whole process state and build a fresh agent over
    // the same workspace.
    drop(agent);
    memory.close().await;

    let provider = ScriptedMockProvider::always_text("Picking the plan back up.");
    let last_request = provider.last_request.clone();
    let (mut agent, memory) = build_agent(&cfg, provider).await;
    agent.chat("where were we?").await.unwrap();

    // The recovery prompt reached the model: 0/3 done, outline is next.
    let req = last_request.lock().unwrap().clone().unwrap();
    let recovery = req
        .messages
        .iter()
        .find(|m| m.as_text().map_or(false, |t| t.contains("[TASK RECOVERY]")))
        .expect("recovery prompt must be injected after restart");
    let text = recovery.as_text().unwrap();
    assert_eq!(recovery.role, Role::System);
    assert!(text.contains("Prep talk"));
    assert!(text.contains("0/3"));
    assert!(text.contains("Next step: [1] outline"));
    memory.close().await;
}

#[tokio::test]
async fn memory_recall_round_trip() {
    let dir = TempDir::new().unwrap();
    let cfg = test_config(&dir);
    seed_background_corpus(&cfg);
    std::fs::write(
        cfg.paths.long_term_file(),
        "# MEMORY\n\n---\n\n## keys\n\nmy API key is SECRET-42\n",
    )
    .unwrap();

    let provider = ScriptedMockProvider::always_text("Your API key is SECRET-42.");
    let last_request = provider.last_request.clone();
    let (mut agent, memory) = build_agent(&cfg, provider).await;

    // "my … key" hits the force patterns, so the gate lets it through.
    let reply = agent.chat("What is my API key?").await.unwrap();
    assert!(reply.contains("SECRET-42"));

    let req = last_request.lock().unwrap().clone().unwrap();
    let hint = req
        .messages
        .iter()
        .find(|m| m.as_text().map_or(false, |t| t.contains("Relevant memories")))
        .expect("memory prefetch must be injected");
    assert!(hint.as_text().unwrap().contains("SECRET-42"));
    memory.close().await;
}

#[tokio::test]
async fn tool_error_recovery_in_conversation() {
    let dir = TempDir::new().unwrap();
    let cfg = test_config(&dir);

    // Finishing without a plan fails; the model apologizes afterwards.
    let provider = ScriptedMockProvider::new(vec![
        tool_call_round("c1", "task_planner", r#"{"action":"finish"}"#),
        text_round("There is no active plan to finish — sorry."),
    ]);
    let (mut agent, memory) = build_agent(&cfg, provider).await;

    let reply = agent.chat("finish the plan").await.unwrap();
    assert!(reply.contains("no active plan"));

    let failure = agent
        .session()
        .messages
        .iter()
        .filter_map(|m| match &m.content {
            arvid_model::MessageContent::ToolResult { content, .. } => Some(content.clone()),
            _ => None,
        })
        .next()
        .expect("the failed tool call must leave a tool message");
    assert!(failure.starts_with("【執行失敗】："), "got: {failure}");
    assert!(failure.contains("no active plan"));
    memory.close().await;
}

#[tokio::test]
async fn saved_memories_become_searchable_after_reindex() {
    let dir = TempDir::new().unwrap();
    let mut cfg = test_config(&dir);
    cfg.memory.flush_threshold = 1; // every save flushes straight to disk
    seed_background_corpus(&cfg);

    let provider = ScriptedMockProvider::new(vec![
        tool_call_round(
            "c1",
            "save_memory",
            r#"{"content":"the staging database password rotates on Mondays","mode":"long_term","category":"ops"}"#,
        ),
        text_round("Noted."),
    ]);
    let (mut agent, memory) = build_agent(&cfg, provider).await;
    agent.chat("remember: staging db password rotates on Mondays").await.unwrap();
    drop(agent);

    memory.re_index().await.unwrap();
    let hits = memory
        .memory_search("remember the staging database password")
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits[0].snippet.contains("rotates on Mondays"));
    memory.close().await;
}
