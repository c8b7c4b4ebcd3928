// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Serde default helper — returns `true`.
///
/// `#[serde(default)]` on a `bool` always falls back to `bool::default()`
/// (i.e. `false`), so fields that should be enabled unless the user
/// explicitly disables them need a named function.
fn default_true() -> bool {
    true
}

/// Frozen configuration snapshot taken once at startup.
///
/// Nothing re-reads config files after the process has started; every
/// subsystem receives a clone (or an `Arc`) of this value and treats it as
/// immutable for the lifetime of the process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

// ─── Model ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name forwarded to the provider API.
    pub name: String,
    /// Chat completions endpoint base, ending before `/chat/completions`.
    /// Defaults to a local OpenAI-compatible server.
    pub endpoint: String,
    /// Environment variable that holds the API key (read at runtime).
    /// Local servers need no key; leave unset.
    pub api_key_env: Option<String>,
    /// Sampling temperature (0.0–2.0).
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,
    /// Maximum tokens to request in a single completion.
    pub max_tokens: Option<u32>,
    /// System prompt override; None uses the built-in prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "qwen2.5:14b".into(),
            endpoint: "http://localhost:11434/v1".into(),
            api_key_env: None,
            temperature: Some(0.7),
            top_p: None,
            max_tokens: Some(4096),
            system_prompt: None,
        }
    }
}

// ─── Embedding ────────────────────────────────────────────────────────────────

/// Which embedding backend to construct at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingKind {
    /// Remote OpenAI-compatible `/embeddings` endpoint (API key required).
    Remote,
    /// Local inference server speaking the same wire format, no auth.
    #[default]
    Local,
    /// No vectors at all — retrieval degrades to keyword-only ranking.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub kind: EmbeddingKind,
    /// Endpoint base for remote/local embedders.
    pub endpoint: String,
    pub model: String,
    /// Vector dimensionality the model produces.
    pub dimensions: usize,
    pub api_key_env: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            kind: EmbeddingKind::Local,
            endpoint: "http://localhost:11434/v1".into(),
            model: "nomic-embed-text".into(),
            dimensions: 768,
            api_key_env: None,
        }
    }
}

// ─── Agent ────────────────────────────────────────────────────────────────────

fn default_max_tool_rounds() -> u32 {
    10
}
fn default_summarize_idle_secs() -> u64 {
    3600
}
fn default_summarize_min_messages() -> usize {
    3
}
fn default_buffer_token_limit() -> usize {
    24_000
}
fn default_buffer_compact_ratio() -> f32 {
    0.3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model ↔ tool round-trips per user turn.  Exceeding the bound
    /// aborts the turn with an error so a runaway tool-call fan cannot loop
    /// forever.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
    /// Idle seconds after which the session is summarized into long-term
    /// memory and compacted down to the system message.
    #[serde(default = "default_summarize_idle_secs")]
    pub summarize_idle_secs: u64,
    /// Sessions at or below this many messages are never summarized.
    #[serde(default = "default_summarize_min_messages")]
    pub summarize_min_messages: usize,
    /// Estimated token count above which the buffer-based policy replaces the
    /// oldest 30% of messages with one synthesized system message.
    #[serde(default = "default_buffer_token_limit")]
    pub buffer_token_limit: usize,
    /// Fraction of the oldest messages folded into the synthesized summary
    /// by the buffer-based policy.
    #[serde(default = "default_buffer_compact_ratio")]
    pub buffer_compact_ratio: f32,
    /// Run the memory prefetch before each model call.
    #[serde(default = "default_true")]
    pub memory_prefetch: bool,
    /// Install the heartbeat cron entry at startup.
    #[serde(default = "default_true")]
    pub heartbeat: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            summarize_idle_secs: default_summarize_idle_secs(),
            summarize_min_messages: default_summarize_min_messages(),
            buffer_token_limit: default_buffer_token_limit(),
            buffer_compact_ratio: default_buffer_compact_ratio(),
            memory_prefetch: true,
            heartbeat: true,
        }
    }
}

// ─── Memory ───────────────────────────────────────────────────────────────────

fn default_chunk_tokens() -> usize {
    400
}
fn default_overlap_tokens() -> usize {
    50
}
fn default_top_k() -> usize {
    6
}
fn default_candidate_multiplier() -> usize {
    4
}
fn default_vector_weight() -> f32 {
    0.7
}
fn default_text_weight() -> f32 {
    0.3
}
fn default_recency_half_life_days() -> f32 {
    30.0
}
fn default_recency_weight() -> f32 {
    0.1
}
fn default_importance_base() -> f32 {
    0.7
}
fn default_length_anchor_chars() -> usize {
    600
}
fn default_min_score() -> f32 {
    0.15
}
fn default_mmr_threshold() -> f32 {
    0.85
}
fn default_flush_threshold() -> usize {
    5
}
fn default_short_term_ttl_days() -> i64 {
    7
}
fn default_watch_interval_secs() -> u64 {
    5
}
fn default_backup_keep() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Target token budget per chunk (chars ≈ tokens × 4).
    #[serde(default = "default_chunk_tokens")]
    pub chunk_tokens: usize,
    /// Overlap between adjacent chunks, in tokens.
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
    /// Result cap for a memory search.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Candidate pool = top_k × multiplier (never below top_k × 2).
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    /// Hybrid fusion weight for the vector score.
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,
    /// Hybrid fusion weight for the keyword (BM25) score.
    #[serde(default = "default_text_weight")]
    pub text_weight: f32,
    /// Half-life in days for both the recency boost and the time decay.
    #[serde(default = "default_recency_half_life_days")]
    pub recency_half_life_days: f32,
    /// Additive weight of the recency boost.
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f32,
    /// Base of the importance multiplier: base + (1-base)·importance.
    #[serde(default = "default_importance_base")]
    pub importance_base: f32,
    /// Character count at which the length penalty starts to bite.
    #[serde(default = "default_length_anchor_chars")]
    pub length_anchor_chars: usize,
    /// Hard minimum final score; results below are dropped.
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    /// Cosine similarity above which a candidate is deferred to the tail
    /// as a near-duplicate of an already selected result.
    #[serde(default = "default_mmr_threshold")]
    pub mmr_threshold: f32,
    /// Pending-memory queue length that triggers a flush to markdown.
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,
    /// Pending-memory entries older than this are purged, not flushed.
    #[serde(default = "default_short_term_ttl_days")]
    pub short_term_ttl_days: i64,
    /// File-watcher poll interval in seconds.
    #[serde(default = "default_watch_interval_secs")]
    pub watch_interval_secs: u64,
    /// Rolling backups of the long-term memory file to keep.
    #[serde(default = "default_backup_keep")]
    pub backup_keep: usize,
    /// Gate memory lookups behind the adaptive-retrieval patterns.
    #[serde(default = "default_true")]
    pub adaptive_retrieval: bool,
    /// Extra markdown files or directories indexed beyond the defaults.
    #[serde(default)]
    pub extra_paths: Vec<PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            chunk_tokens: default_chunk_tokens(),
            overlap_tokens: default_overlap_tokens(),
            top_k: default_top_k(),
            candidate_multiplier: default_candidate_multiplier(),
            vector_weight: default_vector_weight(),
            text_weight: default_text_weight(),
            recency_half_life_days: default_recency_half_life_days(),
            recency_weight: default_recency_weight(),
            importance_base: default_importance_base(),
            length_anchor_chars: default_length_anchor_chars(),
            min_score: default_min_score(),
            mmr_threshold: default_mmr_threshold(),
            flush_threshold: default_flush_threshold(),
            short_term_ttl_days: default_short_term_ttl_days(),
            watch_interval_secs: default_watch_interval_secs(),
            backup_keep: default_backup_keep(),
            adaptive_retrieval: true,
            extra_paths: Vec::new(),
        }
    }
}

// ─── Scheduler ────────────────────────────────────────────────────────────────

fn default_workers() -> usize {
    3
}
fn default_queue_capacity() -> usize {
    100
}
fn default_heartbeat_spec() -> String {
    "*/20 * * * *".into()
}
fn default_briefing_spec() -> String {
    "0 7 * * *".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Worker-pool size for one-shot background jobs.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Bounded job-queue capacity; saturated submissions fail synchronously.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// 5-field cron spec for the heartbeat cycle.
    #[serde(default = "default_heartbeat_spec")]
    pub heartbeat_spec: String,
    /// 5-field cron spec for the morning briefing.
    #[serde(default = "default_briefing_spec")]
    pub briefing_spec: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            heartbeat_spec: default_heartbeat_spec(),
            briefing_spec: default_briefing_spec(),
        }
    }
}

// ─── Paths ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the user-visible markdown workspace: `MEMORY.md`, `memory/`,
    /// `history/`, `tasks/` all live under it.
    pub workspace_dir: PathBuf,
    /// Machine state: the relational store and memory backups.
    pub state_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            workspace_dir: home.join("arvid"),
            state_dir: home.join(".local/share/arvid"),
        }
    }
}

impl PathsConfig {
    pub fn long_term_file(&self) -> PathBuf {
        self.workspace_dir.join("MEMORY.md")
    }
    pub fn daily_dir(&self) -> PathBuf {
        self.workspace_dir.join("memory")
    }
    pub fn history_dir(&self) -> PathBuf {
        self.workspace_dir.join("history")
    }
    pub fn tasks_dir(&self) -> PathBuf {
        self.workspace_dir.join("tasks")
    }
    pub fn db_file(&self) -> PathBuf {
        self.state_dir.join("arvid.db")
    }
    pub fn backup_dir(&self) -> PathBuf {
        self.state_dir.join("backup")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_deserializes_from_empty_mapping() {
        let cfg: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.agent.max_tool_rounds, 10);
        assert_eq!(cfg.memory.top_k, 6);
        assert_eq!(cfg.scheduler.workers, 3);
    }

    #[test]
    fn fusion_weights_default_to_seventy_thirty() {
        let cfg = MemoryConfig::default();
        assert!((cfg.vector_weight - 0.7).abs() < f32::EPSILON);
        assert!((cfg.text_weight - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let cfg: Config = serde_yaml::from_str("memory:\n  top_k: 12\n").unwrap();
        assert_eq!(cfg.memory.top_k, 12);
        assert_eq!(cfg.memory.candidate_multiplier, 4);
    }

    #[test]
    fn embedding_kind_none_parses() {
        let cfg: EmbeddingConfig =
            serde_yaml::from_str("kind: none\nendpoint: x\nmodel: m\ndimensions: 8\n").unwrap();
        assert_eq!(cfg.kind, EmbeddingKind::None);
    }

    #[test]
    fn paths_derive_from_workspace() {
        let p = PathsConfig {
            workspace_dir: PathBuf::from("/w"),
            state_dir: PathBuf::from("/s"),
        };
        assert_eq!(p.long_term_file(), PathBuf::from("/w/MEMORY.md"));
        assert_eq!(p.daily_dir(), PathBuf::from("/w/memory"));
        assert_eq!(p.db_file(), PathBuf::from("/s/arvid.db"));
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let cfg = Config::default();
        let text = serde_yaml::to_string(&cfg).unwrap();
        let back: Config = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back.memory.flush_threshold, cfg.memory.flush_threshold);
        assert_eq!(back.model.name, cfg.model.name);
    }
}
