// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Hybrid BM25 + vector retrieval with multi-stage rescoring.
//!
//! The pipeline, in order: adaptive gate → vector search → keyword search →
//! weighted fusion → recency boost → importance weighting → length
//! normalization → time decay → minimum-score filter → noise filter → MMR
//! diversity.  Every stage that modifies scores is followed by a clamp to
//! `[0, 1]` (NaN → 0) and a re-sort, so compounding factors can never push a
//! result out of bounds or freeze a stale ordering.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use arvid_config::MemoryConfig;

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::noise::NoiseFilter;
use crate::store::{IndexStore, StoredChunk};
use crate::text::{to_fts_query, truncate_snippet};

/// Candidates below this cosine similarity never enter the pool.
const VECTOR_FLOOR: f32 = 0.10;
/// Saturation constant for the BM25 rescale `s / (s + K)`.  FTS5 rank
/// magnitudes vary with corpus size; this maps them into `[0, 1)` with a
/// soft knee around typical single-term match scores.
const BM25_K: f64 = 5.0;
/// Maximum snippet length handed to the model.
const SNIPPET_CHARS: usize = 700;

/// One ranked retrieval result.
#[derive(Debug, Clone)]
pub struct MemoryHit {
    pub chunk_id: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Chunk content truncated to the snippet budget.
    pub snippet: String,
    /// Final score after the full pipeline, guaranteed in `[0, 1]`.
    pub score: f32,
    pub vector_score: f32,
    pub text_score: f32,
}

struct Scored {
    chunk: StoredChunk,
    vector_score: f32,
    text_score: f32,
    score: f32,
}

pub struct Retriever {
    store: Arc<IndexStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    cfg: MemoryConfig,
    filter: NoiseFilter,
}

impl Retriever {
    pub fn new(
        store: Arc<IndexStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        cfg: MemoryConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            cfg,
            filter: NoiseFilter::new(),
        }
    }

    /// Run the full retrieval pipeline for `query`, returning at most `k`
    /// results.  Gated-out and empty queries return empty without touching
    /// the embedding provider.
    pub async fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<MemoryHit>> {
        let query = query.trim();
        if query.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if self.cfg.adaptive_retrieval && self.filter.should_skip_query(query) {
            debug!("adaptive retrieval gate skipped query");
            return Ok(Vec::new());
        }

        let pool = (k * self.cfg.candidate_multiplier).max(k * 2);

        // Stage 2: vector candidates.
        let (vector_hits, vectors) = self.vector_candidates(query, pool).await;

        // Stage 3: keyword candidates with non-linear rescale.
        let text_hits = self.keyword_candidates(query, pool);

        if vector_hits.is_empty() && text_hits.is_empty() {
            return Ok(Vec::new());
        }

        // Stage 4: fuse by chunk id.
        let mut fused: HashMap<String, (f32, f32)> = HashMap::new();
        for (id, vs) in &vector_hits {
            fused.entry(id.clone()).or_insert((0.0, 0.0)).0 = *vs;
        }
        for (id, ts) in &text_hits {
            fused.entry(id.clone()).or_insert((0.0, 0.0)).1 = *ts;
        }

        let ids: Vec<String> = fused.keys().cloned().collect();
        let chunks = self.store.get_chunks(&ids)?;

        let mut scored: Vec<Scored> = chunks
            .into_iter()
            .map(|chunk| {
                let (vs, ts) = fused.get(&chunk.id).copied().unwrap_or((0.0, 0.0));
                let score = vs * self.cfg.vector_weight + ts * self.cfg.text_weight;
                Scored {
                    chunk,
                    vector_score: vs,
                    text_score: ts,
                    score,
                }
            })
            .collect();
        clamp_and_sort(&mut scored);

        // Stage 5: multi-stage rescoring.
        let now = Utc::now().timestamp();
        self.recency_boost(&mut scored, now);
        clamp_and_sort(&mut scored);

        self.importance_weight(&mut scored);
        clamp_and_sort(&mut scored);

        self.length_normalize(&mut scored);
        clamp_and_sort(&mut scored);

        self.time_decay(&mut scored, now);
        clamp_and_sort(&mut scored);

        scored.retain(|s| s.score >= self.cfg.min_score);
        scored.retain(|s| !self.filter.is_noise_content(&s.chunk.content));

        self.mmr_reorder(&mut scored, &vectors);

        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|s| MemoryHit {
                snippet: truncate_snippet(&s.chunk.content, SNIPPET_CHARS),
                chunk_id: s.chunk.id,
                file_path: s.chunk.file_path,
                start_line: s.chunk.start_line,
                end_line: s.chunk.end_line,
                score: s.score,
                vector_score: s.vector_score,
                text_score: s.text_score,
            })
            .collect())
    }

    /// Embed the query and rank every stored vector of the active
    /// `(provider, model)` pair by cosine similarity.  Degrades to an empty
    /// candidate list (keyword-only retrieval) when no embedder is
    /// configured or the embedding call fails.
    async fn vector_candidates(
        &self,
        query: &str,
        pool: usize,
    ) -> (Vec<(String, f32)>, HashMap<String, Vec<f32>>) {
        if self.embedder.dimensions() == 0 {
            return (Vec::new(), HashMap::new());
        }

        let qvec = match self.embedder.embed(&[query.to_string()]).await {
            Ok(mut vs) if !vs.is_empty() => vs.remove(0),
            Ok(_) => return (Vec::new(), HashMap::new()),
            Err(e) => {
                warn!(error = %e, "query embedding failed; falling back to keyword-only");
                return (Vec::new(), HashMap::new());
            }
        };

        let stored = match self
            .store
            .embeddings_for(self.embedder.name(), self.embedder.model_name())
        {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "loading stored vectors failed");
                return (Vec::new(), HashMap::new());
            }
        };

        let mut vectors: HashMap<String, Vec<f32>> = HashMap::new();
        let mut hits: Vec<(String, f32)> = Vec::new();
        for (id, vec) in stored {
            let sim = cosine_similarity(&qvec, &vec);
            vectors.insert(id.clone(), vec);
            if sim >= VECTOR_FLOOR {
                hits.push((id, sim));
            }
        }
        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(pool);
        (hits, vectors)
    }

    /// BM25 keyword candidates, rescaled into `[0, 1)` with `s / (s + K)`
    /// so corpus-dependent rank magnitudes fuse cleanly with cosine scores.
    fn keyword_candidates(&self, query: &str, pool: usize) -> Vec<(String, f32)> {
        let expr = match to_fts_query(query) {
            Some(e) => e,
            None => return Vec::new(),
        };
        match self.store.bm25_search(&expr, pool) {
            Ok(hits) => hits
                .into_iter()
                .map(|(id, s)| {
                    let s = s.max(0.0);
                    (id, (s / (s + BM25_K)) as f32)
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "keyword search failed");
                Vec::new()
            }
        }
    }

    // ── Rescoring stages ──────────────────────────────────────────────────────

    fn recency_boost(&self, scored: &mut [Scored], now: i64) {
        let half_life = self.cfg.recency_half_life_days.max(f32::EPSILON);
        for s in scored.iter_mut() {
            let age_days = age_days(now, s.chunk.updated_at);
            s.score += (-age_days / half_life).exp() * self.cfg.recency_weight;
        }
    }

    /// Weight by the importance persisted with each chunk at index time:
    /// `score ×= base + (1-base)·importance`.
    fn importance_weight(&self, scored: &mut [Scored]) {
        let base = self.cfg.importance_base;
        for s in scored.iter_mut() {
            let importance = s.chunk.importance.clamp(0.0, 1.0);
            s.score *= base + (1.0 - base) * importance;
        }
    }

    fn length_normalize(&self, scored: &mut [Scored]) {
        let anchor = self.cfg.length_anchor_chars.max(1) as f32;
        for s in scored.iter_mut() {
            let ratio = (s.chunk.content.len() as f32 / anchor).max(1.0);
            s.score *= 1.0 / (1.0 + 0.5 * ratio.log2());
        }
    }

    fn time_decay(&self, scored: &mut [Scored], now: i64) {
        let half_life = self.cfg.recency_half_life_days.max(f32::EPSILON);
        for s in scored.iter_mut() {
            let age_days = age_days(now, s.chunk.updated_at);
            // Floor at 0.5: old memories fade, they never vanish outright.
            s.score *= 0.5 + 0.5 * (-age_days / half_life).exp();
        }
    }

    /// MMR diversity pass: walk candidates in score order and defer any
    /// whose embedding is nearly identical (cosine above the threshold) to
    /// an already-selected result.  Deferred candidates keep their scores
    /// but move to the tail, so `truncate(k)` prefers diverse results.
    fn mmr_reorder(&self, scored: &mut Vec<Scored>, vectors: &HashMap<String, Vec<f32>>) {
        if scored.len() < 2 {
            return;
        }
        let mut selected: Vec<Scored> = Vec::with_capacity(scored.len());
        let mut deferred: Vec<Scored> = Vec::new();

        for cand in scored.drain(..) {
            let dup = vectors.get(&cand.chunk.id).map_or(false, |cv| {
                selected.iter().any(|sel| {
                    vectors
                        .get(&sel.chunk.id)
                        .map_or(false, |sv| cosine_similarity(cv, sv) > self.cfg.mmr_threshold)
                })
            });
            if dup {
                deferred.push(cand);
            } else {
                selected.push(cand);
            }
        }
        selected.extend(deferred);
        *scored = selected;
    }
}

fn age_days(now: i64, updated_at: i64) -> f32 {
    ((now - updated_at).max(0) as f32) / 86_400.0
}

/// Clamp every score into `[0, 1]` (NaN and infinities collapse to 0) and
/// re-sort by score descending with chunk id as the deterministic tie-break.
fn clamp_and_sort(scored: &mut [Scored]) {
    for s in scored.iter_mut() {
        if !s.score.is_finite() {
            s.score = 0.0;
        }
        s.score = s.score.clamp(0.0, 1.0);
    }
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
