// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! CJK-aware text normalization shared by the index writer and the query side.
//!
//! The FTS tokenizer (unicode61) has no language-specific segmenter, so CJK
//! prose would index as one giant token per run of ideographs.  Wrapping
//! every CJK rune in spaces before indexing makes the tokenizer emit one
//! token per ideograph; the query sanitizer mirrors the same transform so
//! index and query agree on token boundaries.

/// Return `true` for characters that need per-rune tokenization.
///
/// Covers the unified CJK blocks plus Japanese kana and the halfwidth /
/// fullwidth forms.  Hangul syllables are included: the same
/// one-token-per-rune treatment gives usable recall for Korean too.
pub fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF      // CJK Unified Ideographs
        | 0x3400..=0x4DBF    // CJK Extension A
        | 0x20000..=0x2A6DF  // CJK Extension B
        | 0xF900..=0xFAFF    // CJK Compatibility Ideographs
        | 0x3040..=0x309F    // Hiragana
        | 0x30A0..=0x30FF    // Katakana
        | 0xAC00..=0xD7AF    // Hangul Syllables
        | 0xFF00..=0xFFEF    // Halfwidth and Fullwidth Forms
    )
}

/// Wrap every CJK rune with spaces so unicode61 emits one token per
/// ideograph.  Latin runs pass through untouched; repeated spaces are fine
/// for FTS5 and are not collapsed here.
pub fn space_cjk(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        if is_cjk(c) {
            out.push(' ');
            out.push(c);
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}

/// Fraction of alphanumeric-or-CJK characters that are CJK.
///
/// Used by the adaptive-retrieval gate: CJK queries carry more meaning per
/// character, so they pass a shorter length threshold than Latin ones.
pub fn cjk_ratio(text: &str) -> f32 {
    let mut cjk = 0usize;
    let mut total = 0usize;
    for c in text.chars() {
        if c.is_whitespace() {
            continue;
        }
        total += 1;
        if is_cjk(c) {
            cjk += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        cjk as f32 / total as f32
    }
}

/// Sanitize a free-text query into an FTS5 MATCH expression.
///
/// Punctuation is stripped, every CJK rune becomes its own quoted disjunct,
/// and contiguous Latin/numeric runs become one quoted token; all tokens are
/// joined with `OR`.  Returns `None` when nothing searchable remains.
pub fn to_fts_query(query: &str) -> Option<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut latin_run = String::new();

    let mut flush_latin = |run: &mut String, tokens: &mut Vec<String>| {
        if !run.is_empty() {
            tokens.push(format!("\"{run}\""));
            run.clear();
        }
    };

    for c in query.chars() {
        if is_cjk(c) {
            flush_latin(&mut latin_run, &mut tokens);
            tokens.push(format!("\"{c}\""));
        } else if c.is_alphanumeric() {
            latin_run.push(c);
        } else {
            // Punctuation and whitespace both terminate the current run.
            flush_latin(&mut latin_run, &mut tokens);
        }
    }
    flush_latin(&mut latin_run, &mut tokens);

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" OR "))
    }
}

/// Truncate `text` to at most `max_chars` characters, appending an ellipsis
/// when content was dropped.  Cuts on a char boundary, never mid-rune.
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin_text_passes_through_unchanged() {
        assert_eq!(space_cjk("hello world"), "hello world");
    }

    #[test]
    fn cjk_runes_get_wrapped_in_spaces() {
        let out = space_cjk("用Go寫");
        assert_eq!(out, " 用 Go 寫 ");
    }

    #[test]
    fn mixed_text_keeps_latin_runs_contiguous() {
        let out = space_cjk("SQLite混合搜尋");
        assert!(out.starts_with("SQLite"));
        assert!(out.contains(" 混 "));
        assert!(out.contains(" 搜 "));
    }

    #[test]
    fn cjk_ratio_pure_latin_is_zero() {
        assert_eq!(cjk_ratio("hello"), 0.0);
    }

    #[test]
    fn cjk_ratio_pure_cjk_is_one() {
        assert_eq!(cjk_ratio("你好世界"), 1.0);
    }

    #[test]
    fn cjk_ratio_ignores_whitespace() {
        assert!((cjk_ratio("你好 ab") - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn fts_query_quotes_latin_runs() {
        assert_eq!(to_fts_query("Go SQLite"), Some("\"Go\" OR \"SQLite\"".into()));
    }

    #[test]
    fn fts_query_explodes_cjk_into_rune_disjuncts() {
        assert_eq!(
            to_fts_query("混合"),
            Some("\"混\" OR \"合\"".into())
        );
    }

    #[test]
    fn fts_query_strips_punctuation() {
        assert_eq!(
            to_fts_query("what's my api-key?"),
            Some("\"what\" OR \"s\" OR \"my\" OR \"api\" OR \"key\"".into())
        );
    }

    #[test]
    fn fts_query_mixed_cjk_and_latin() {
        let q = to_fts_query("用Go寫").unwrap();
        assert_eq!(q, "\"用\" OR \"Go\" OR \"寫\"");
    }

    #[test]
    fn fts_query_empty_returns_none() {
        assert_eq!(to_fts_query(""), None);
        assert_eq!(to_fts_query("?!,."), None);
    }

    #[test]
    fn snippet_short_text_untouched() {
        assert_eq!(truncate_snippet("short", 700), "short");
    }

    #[test]
    fn snippet_truncates_with_ellipsis() {
        let long = "x".repeat(800);
        let out = truncate_snippet(&long, 700);
        assert_eq!(out.chars().count(), 701);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn snippet_cuts_on_char_boundary_for_cjk() {
        let long = "記".repeat(10);
        let out = truncate_snippet(&long, 4);
        assert_eq!(out.chars().count(), 5);
        assert!(out.ends_with('…'));
    }
}
