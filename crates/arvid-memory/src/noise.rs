// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Shared regex catalog for low-value text.
//!
//! The same filter runs on both sides of the memory: at write time it
//! suppresses assistant pleasantries from polluting the daily log, and at
//! read time it drops retrieval hits that would only waste prompt space.
//! Keeping one catalog keeps the two paths symmetric.

use std::sync::OnceLock;

use regex::Regex;

use crate::text::cjk_ratio;

/// Minimum character count for Latin queries to reach retrieval.
const MIN_QUERY_CHARS_LATIN: usize = 4;
/// CJK packs more meaning per rune, so the bar is lower.
const MIN_QUERY_CHARS_CJK: usize = 2;
/// A query counts as CJK once at least this fraction of it is ideographs.
const CJK_QUERY_RATIO: f32 = 0.3;
/// Content shorter than this is never worth storing or retrieving.
const MIN_CONTENT_CHARS: usize = 8;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
}

/// Queries that should never trigger a memory lookup: greetings, small talk,
/// prompts pasted back at the agent.
fn skip_patterns() -> &'static Vec<Regex> {
    static SET: OnceLock<Vec<Regex>> = OnceLock::new();
    SET.get_or_init(|| {
        compile(&[
            r"(?i)^(hi|hello|hey|yo|ok|okay|thanks|thank you|bye|goodbye)[!.。！\s]*$",
            r"^(你好|妳好|哈囉|嗨|早安|午安|晚安|謝謝|谢谢|再見|再见|好的|好喔|收到)[!.。！～\s]*$",
            r"(?i)^you are (a|an|the)\b",
            r"^(continue|繼續|继续)$",
        ])
    })
}

/// Queries that must reach retrieval even when a skip pattern or the length
/// threshold would otherwise gate them out: explicit references to stored
/// personal context.
fn force_patterns() -> &'static Vec<Regex> {
    static SET: OnceLock<Vec<Regex>> = OnceLock::new();
    SET.get_or_init(|| {
        compile(&[
            r"(?i)\b(remember|recall|remind|memor)\w*\b",
            r"(?i)\bmy\b.*\b(key|password|secret|token|account|birthday|address|name)\b",
            r"(?i)\b(earlier|last time|previously|yesterday)\b",
            r"(記得|记得|之前|上次|以前|昨天|我的)",
        ])
    })
}

/// Content that is noise on both the write path and the read path:
/// capability denials, service boilerplate, meta-questions about the agent.
fn noise_patterns() -> &'static Vec<Regex> {
    static SET: OnceLock<Vec<Regex>> = OnceLock::new();
    SET.get_or_init(|| {
        compile(&[
            r"(?i)\bas an ai\b",
            r"(?i)\bi (cannot|can't|am unable to) (help|assist|do)\b",
            r"(我是(一個|一个)?(AI|人工智慧|人工智能|語言模型|语言模型))",
            r"(沒有辦法|无法帮助|無法協助)",
            r"(?i)\b(is there anything else|how (can|may) i (help|assist))\b",
            r"(還有什麼(可以|能)幫|有什么(可以|能)帮)",
            r"(?i)^(what can you do|who are you|what are you)\b",
            r"^(你是誰|你是谁|你會什麼|你会什么)",
        ])
    })
}

/// Two-sided filter over the shared catalog.
///
/// Stateless and cheap to construct; the regex sets themselves are compiled
/// once per process.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoiseFilter;

impl NoiseFilter {
    pub fn new() -> Self {
        Self
    }

    /// Adaptive-retrieval gate (read path).
    ///
    /// Returns `true` when the query should bypass memory entirely.  Force
    /// patterns win over everything else; then skip patterns; then the
    /// language-aware length threshold (questions are exempt — a short
    /// question is still a real lookup).
    pub fn should_skip_query(&self, query: &str) -> bool {
        let q = query.trim();
        if q.is_empty() {
            return true;
        }
        if force_patterns().iter().any(|re| re.is_match(q)) {
            return false;
        }
        if skip_patterns().iter().any(|re| re.is_match(q)) {
            return true;
        }
        // Pure symbol/emoji input: nothing searchable in it.
        if !q.chars().any(|c| c.is_alphanumeric()) {
            return true;
        }
        let min_chars = if cjk_ratio(q) >= CJK_QUERY_RATIO {
            MIN_QUERY_CHARS_CJK
        } else {
            MIN_QUERY_CHARS_LATIN
        };
        let is_question = q.contains('?') || q.contains('？');
        q.chars().filter(|c| !c.is_whitespace()).count() < min_chars && !is_question
    }

    /// Symmetric content filter (write path and result filtering).
    pub fn is_noise_content(&self, content: &str) -> bool {
        let c = content.trim();
        if c.chars().count() < MIN_CONTENT_CHARS {
            return true;
        }
        noise_patterns().iter().any(|re| re.is_match(c))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
