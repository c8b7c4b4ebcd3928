// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use arvid_model::{Message, Role};

/// One continuous conversation thread.
///
/// Invariants: the first message is always a system message; messages are
/// append-only except for summarization, which replaces them wholesale;
/// ordering is never changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub last_update: DateTime<Utc>,
}

impl Session {
    /// Fresh session seeded with its system prompt.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: String::new(),
            messages: vec![Message::system(system_prompt)],
            last_update: Utc::now(),
        }
    }

    /// Append a message and refresh the update stamp.  The first user
    /// message also titles the session.
    pub fn push(&mut self, msg: Message) {
        if self.title.is_empty() && msg.role == Role::User {
            if let Some(text) = msg.as_text() {
                self.title = text.chars().take(48).collect();
            }
        }
        self.messages.push(msg);
        self.last_update = Utc::now();
    }

    /// Approximate token total across all messages (chars / 4 heuristic).
    pub fn approx_tokens(&self) -> usize {
        self.messages.iter().map(|m| m.approx_tokens()).sum()
    }

    /// Seconds since the last update.
    pub fn idle_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_update).num_seconds().max(0)
    }

    /// Drop everything but the original system message (post-summarization
    /// compaction) and refresh the update stamp.
    pub fn reset_to_system(&mut self) {
        self.messages.truncate(1);
        self.last_update = Utc::now();
    }

    // ── Persistence ───────────────────────────────────────────────────────────

    fn file_path(&self, history_dir: &Path) -> PathBuf {
        history_dir.join(format!("{}.json", self.id))
    }

    /// Write-replace under `history/<session_id>.json`.
    pub fn save(&self, history_dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(history_dir)
            .with_context(|| format!("creating {}", history_dir.display()))?;
        let path = self.file_path(history_dir);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }

    /// Load one session file.  Unparseable files yield `None` with a
    /// warning — a corrupt session must never block startup.
    pub fn load(path: &Path) -> Option<Session> {
        let text = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str::<Session>(&text) {
            Ok(session) if !session.messages.is_empty() => Some(session),
            Ok(_) => {
                warn!(path = %path.display(), "session file has no messages; ignoring");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "session file unparseable; ignoring");
                None
            }
        }
    }

    /// The most recently modified session in the history directory — the
    /// default the CLI resumes into.
    pub fn load_latest(history_dir: &Path) -> Option<Session> {
        let entries = std::fs::read_dir(history_dir).ok()?;
        let mut candidates: Vec<(std::time::SystemTime, PathBuf)> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "json")
                    .unwrap_or(false)
            })
            .filter_map(|e| {
                let mtime = e.metadata().ok()?.modified().ok()?;
                Some((mtime, e.path()))
            })
            .collect();
        candidates.sort_by(|a, b| b.0.cmp(&a.0));
        candidates.into_iter().find_map(|(_, path)| Session::load(&path))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn new_session_starts_with_system_message() {
        let s = Session::new("you are arvid");
        assert_eq!(s.messages.len(), 1);
        assert_eq!(s.messages[0].role, Role::System);
    }

    #[test]
    fn first_user_message_titles_the_session() {
        let mut s = Session::new("sys");
        s.push(Message::user("plan my day please"));
        assert_eq!(s.title, "plan my day please");
        s.push(Message::user("another message"));
        assert_eq!(s.title, "plan my day please");
    }

    #[test]
    fn title_truncates_long_input() {
        let mut s = Session::new("sys");
        s.push(Message::user(&"x".repeat(200)));
        assert_eq!(s.title.chars().count(), 48);
    }

    #[test]
    fn reset_keeps_only_system() {
        let mut s = Session::new("sys");
        s.push(Message::user("hi"));
        s.push(Message::assistant("hello"));
        s.reset_to_system();
        assert_eq!(s.messages.len(), 1);
        assert_eq!(s.messages[0].role, Role::System);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut s = Session::new("sys");
        s.push(Message::user("remember me"));
        s.save(dir.path()).unwrap();

        let path = dir.path().join(format!("{}.json", s.id));
        let loaded = Session::load(&path).unwrap();
        assert_eq!(loaded.id, s.id);
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.messages[1].as_text(), Some("remember me"));
    }

    #[test]
    fn corrupt_session_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json at all").unwrap();
        assert!(Session::load(&path).is_none());
    }

    #[test]
    fn load_latest_prefers_newest_mtime() {
        let dir = TempDir::new().unwrap();
        let mut old = Session::new("sys");
        old.push(Message::user("old session"));
        old.save(dir.path()).unwrap();

        // Ensure a distinct mtime.
        std::thread::sleep(std::time::Duration::from_millis(20));

        let mut new = Session::new("sys");
        new.push(Message::user("new session"));
        new.save(dir.path()).unwrap();

        let latest = Session::load_latest(dir.path()).unwrap();
        assert_eq!(latest.id, new.id);
    }

    #[test]
    fn load_latest_skips_corrupt_files() {
        let dir = TempDir::new().unwrap();
        let mut s = Session::new("sys");
        s.push(Message::user("valid"));
        s.save(dir.path()).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(dir.path().join("zzz.json"), "garbage").unwrap();

        let latest = Session::load_latest(dir.path()).unwrap();
        assert_eq!(latest.id, s.id);
    }

    #[test]
    fn load_latest_empty_dir_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(Session::load_latest(dir.path()).is_none());
    }

    #[test]
    fn approx_tokens_sums_messages() {
        let mut s = Session::new("12345678");
        s.push(Message::user("12345678"));
        assert_eq!(s.approx_tokens(), 4);
    }
}
