// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Session summarization.
//!
//! Two policies:
//! - **Idle**: a session untouched for an hour gets distilled into 3–5
//!   bullet points, appended to the long-term memory under a timestamped
//!   header, and compacted down to its system message.
//! - **Buffer**: when the estimated token total crosses the limit, the
//!   oldest 30% of messages are folded into one synthesized system
//!   message.  A cycle-keyed ledger guarantees at most one flush per cycle.

use chrono::{Local, Utc};
use futures::StreamExt;
use std::collections::HashSet;
use tracing::{debug, info};

use arvid_memory::MemoryManager;
use arvid_model::{
    CompletionOptions, CompletionRequest, Message, MessageContent, ModelProvider, ResponseEvent,
    Role,
};

use crate::session::Session;

/// Header prefix of summary sections appended to the long-term memory.
const SUMMARY_HEADER: &str = "## 📝 歸納日期:";

const SUMMARY_PROMPT: &str = "\
Summarize the following conversation into 3-5 dense bullet points. \
Keep every concrete fact: names, dates, decisions, numbers, open items. \
Write in the language the conversation was held in. Output only the \
bullet points.";

/// Idle-session summarization.
///
/// No-op unless the session has been idle longer than `idle_secs` AND has
/// more than `min_messages - 1` messages (a bare system + one exchange is
/// not worth distilling).  On success the summary lands in `MEMORY.md`,
/// the session is reset to its system message, and `true` is returned so
/// the caller persists the compacted session.
pub async fn check_and_summarize(
    session: &mut Session,
    model: &dyn ModelProvider,
    memory: &MemoryManager,
    idle_secs: u64,
    min_messages: usize,
) -> anyhow::Result<bool> {
    if session.messages.len() < min_messages {
        return Ok(false);
    }
    if session.idle_secs(Utc::now()) <= idle_secs as i64 {
        return Ok(false);
    }

    let history = render_history(&session.messages);
    if history.trim().is_empty() {
        return Ok(false);
    }

    debug!(messages = session.messages.len(), "summarizing idle session");
    let req = CompletionRequest {
        messages: vec![
            Message::system(SUMMARY_PROMPT),
            Message::user(history),
        ],
        tools: Vec::new(),
        stream: true,
        options: CompletionOptions {
            // Low temperature: the summary should be extraction, not prose.
            temperature: Some(0.1),
            top_p: None,
            max_tokens: Some(1024),
        },
    };

    let mut stream = model.complete(req).await?;
    let mut summary = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            ResponseEvent::TextDelta(t) => summary.push_str(&t),
            ResponseEvent::Done => break,
            _ => {}
        }
    }
    let summary = summary.trim().to_string();
    if summary.is_empty() {
        anyhow::bail!("summarization produced no text");
    }

    let stamp = Local::now().format("%Y-%m-%d %H:%M");
    memory.append_long_term_raw(&format!("{SUMMARY_HEADER} {stamp}\n\n{summary}"))?;

    session.reset_to_system();
    info!("idle session summarized into long-term memory");
    Ok(true)
}

/// Cycle-keyed dedup for the buffer policy: each cycle id flushes at most
/// once no matter how many checks run within it.
#[derive(Debug, Default)]
pub struct FlushLedger {
    seen: HashSet<String>,
}

impl FlushLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time `cycle_id` is offered.
    fn try_claim(&mut self, cycle_id: &str) -> bool {
        self.seen.insert(cycle_id.to_string())
    }
}

/// Buffer-based compaction.
///
/// When the session's estimated tokens exceed `token_limit`, the oldest
/// `ratio` of non-system messages is replaced by one synthesized system
/// message carrying their condensed transcript.  Returns `true` when a
/// flush happened.
pub fn buffer_compact(
    session: &mut Session,
    token_limit: usize,
    ratio: f32,
    cycle_id: &str,
    ledger: &mut FlushLedger,
) -> bool {
    if session.approx_tokens() <= token_limit {
        return false;
    }
    if !ledger.try_claim(cycle_id) {
        debug!(cycle_id, "buffer flush already done this cycle");
        return false;
    }

    let non_system: Vec<usize> = session
        .messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role != Role::System)
        .map(|(i, _)| i)
        .collect();
    let take = ((non_system.len() as f32) * ratio).ceil() as usize;
    if take == 0 {
        return false;
    }

    let cut_index = non_system[take - 1] + 1;
    let folded: Vec<Message> = session.messages[..cut_index]
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect();
    let digest = render_history(&folded);

    let mut rebuilt = Vec::with_capacity(session.messages.len() - folded.len() + 2);
    rebuilt.push(session.messages[0].clone());
    rebuilt.push(Message::system(format!(
        "[Earlier context, condensed]\n{digest}"
    )));
    rebuilt.extend(session.messages[cut_index..].iter().cloned());
    session.messages = rebuilt;

    info!(folded = folded.len(), cycle_id, "buffer-compacted session");
    true
}

/// Serialize messages into plain text for a summary prompt or digest.
/// Tool plumbing is kept short — the content matters, not the protocol.
fn render_history(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| {
            let role = match m.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::Tool => "Tool",
                Role::System => "System",
            };
            let text = match &m.content {
                MessageContent::Text(t) => t.clone(),
                MessageContent::ToolCall { function, .. } => {
                    format!("[called {}({})]", function.name, function.arguments)
                }
                MessageContent::ToolResult { content, .. } => {
                    let short: String = content.chars().take(200).collect();
                    format!("[tool result: {short}]")
                }
            };
            format!("{role}: {text}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use arvid_config::{Config, EmbeddingKind};
    use arvid_model::ScriptedMockProvider;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn memory(dir: &TempDir) -> MemoryManager {
        let mut cfg = Config::default();
        cfg.paths.workspace_dir = dir.path().join("ws");
        cfg.paths.state_dir = dir.path().join("state");
        cfg.embedding.kind = EmbeddingKind::None;
        std::fs::create_dir_all(&cfg.paths.workspace_dir).unwrap();
        MemoryManager::start(&cfg).await.unwrap()
    }

    fn stale_session(messages: usize) -> Session {
        let mut s = Session::new("sys");
        for i in 0..messages {
            s.push(Message::user(format!("message number {i} about the project")));
            s.push(Message::assistant(format!("reply number {i} with details")));
        }
        // Pretend the last activity was three hours ago.
        s.last_update = Utc::now() - Duration::hours(3);
        s
    }

    #[tokio::test]
    async fn short_session_is_never_summarized() {
        let dir = TempDir::new().unwrap();
        let mem = memory(&dir).await;
        let provider = ScriptedMockProvider::always_text("- bullet");
        let mut s = Session::new("sys");
        s.push(Message::user("only message"));
        s.last_update = Utc::now() - Duration::hours(3);

        let done = check_and_summarize(&mut s, &provider, &mem, 3600, 3)
            .await
            .unwrap();
        assert!(!done);
        assert_eq!(s.messages.len(), 2);
        mem.close().await;
    }

    #[tokio::test]
    async fn fresh_session_is_not_summarized() {
        let dir = TempDir::new().unwrap();
        let mem = memory(&dir).await;
        let provider = ScriptedMockProvider::always_text("- bullet");
        let mut s = stale_session(5);
        s.last_update = Utc::now();

        let done = check_and_summarize(&mut s, &provider, &mem, 3600, 3)
            .await
            .unwrap();
        assert!(!done);
        mem.close().await;
    }

    #[tokio::test]
    async fn idle_session_summarizes_and_compacts() {
        let dir = TempDir::new().unwrap();
        let mem = memory(&dir).await;
        let provider = ScriptedMockProvider::always_text(
            "- discussed the tax deadline\n- decided to file in May",
        );
        let mut s = stale_session(5);
        let before = s.last_update;

        let done = check_and_summarize(&mut s, &provider, &mem, 3600, 3)
            .await
            .unwrap();
        assert!(done);
        // Compacted to [system] and stamp refreshed.
        assert_eq!(s.messages.len(), 1);
        assert_eq!(s.messages[0].role, Role::System);
        assert!(s.last_update > before);

        let text = std::fs::read_to_string(dir.path().join("ws/MEMORY.md")).unwrap();
        assert!(text.contains("## 📝 歸納日期:"));
        assert!(text.contains("tax deadline"));
        mem.close().await;
    }

    #[tokio::test]
    async fn empty_summary_is_an_error_and_leaves_session_intact() {
        let dir = TempDir::new().unwrap();
        let mem = memory(&dir).await;
        let provider = ScriptedMockProvider::always_text("");
        let mut s = stale_session(5);
        let len_before = s.messages.len();

        let result = check_and_summarize(&mut s, &provider, &mem, 3600, 3).await;
        assert!(result.is_err());
        assert_eq!(s.messages.len(), len_before);
        mem.close().await;
    }

    // ── Buffer policy ─────────────────────────────────────────────────────────

    fn big_session() -> Session {
        let mut s = Session::new("sys");
        for i in 0..10 {
            s.push(Message::user(format!("long message {i}: {}", "x".repeat(400))));
        }
        s
    }

    #[test]
    fn under_limit_is_untouched() {
        let mut s = big_session();
        let mut ledger = FlushLedger::new();
        assert!(!buffer_compact(&mut s, 1_000_000, 0.3, "cycle-1", &mut ledger));
        assert_eq!(s.messages.len(), 11);
    }

    #[test]
    fn over_limit_folds_oldest_third() {
        let mut s = big_session();
        let mut ledger = FlushLedger::new();
        assert!(buffer_compact(&mut s, 100, 0.3, "cycle-1", &mut ledger));
        // 10 non-system, 30% = 3 folded; rebuilt = sys + digest + 7.
        assert_eq!(s.messages.len(), 9);
        assert_eq!(s.messages[0].role, Role::System);
        let digest = s.messages[1].as_text().unwrap();
        assert!(digest.contains("[Earlier context, condensed]"));
        assert!(digest.contains("long message 0"));
        assert!(digest.contains("long message 2"));
        assert!(!digest.contains("long message 3"));
        // Remainder preserved in order.
        assert!(s.messages[2].as_text().unwrap().contains("long message 3"));
    }

    #[test]
    fn one_flush_per_cycle_id() {
        let mut s = big_session();
        let mut ledger = FlushLedger::new();
        assert!(buffer_compact(&mut s, 100, 0.3, "cycle-1", &mut ledger));
        // Still over the limit, but the cycle already flushed.
        assert!(!buffer_compact(&mut s, 100, 0.3, "cycle-1", &mut ledger));
        // A new cycle may flush again.
        assert!(buffer_compact(&mut s, 100, 0.3, "cycle-2", &mut ledger));
    }
}
