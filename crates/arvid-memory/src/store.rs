// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! SQLite-backed chunk + embedding + FTS5 store.
//!
//! Schema overview:
//! - `chunks` — one row per markdown chunk, keyed by its location id
//! - `chunks_fts` — FTS5 index over the CJK-spaced `search_content`,
//!   maintained by triggers so writers never touch it directly
//! - `embeddings` — one vector per chunk, keyed also by (provider, model)
//!   so vectors from a previous embedder are never compared against query
//!   vectors from the current one
//! - `embedding_cache` — content-hash keyed vectors, purely derivative
//! - `index_meta` — `file_hash:<path>` entries for skip-if-unchanged
//! - `short_term_memory` — the pending-memory queue
//!
//! Writes are transactional per file: delete-by-file then insert
//! chunks + embeddings under one transaction, then update the file hash.

use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::chunker::Chunk;
use crate::pending::{PendingMemory, PendingMode};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    id             TEXT PRIMARY KEY,
    file_path      TEXT NOT NULL,
    start_line     INTEGER NOT NULL,
    end_line       INTEGER NOT NULL,
    content        TEXT NOT NULL,
    search_content TEXT NOT NULL,
    tokens         INTEGER NOT NULL,
    updated_at     INTEGER NOT NULL,
    file_hash      TEXT NOT NULL,
    importance     REAL NOT NULL DEFAULT 0.5
);
CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file_path);

CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    search_content,
    content='chunks',
    content_rowid='rowid',
    tokenize='unicode61'
);

CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
    INSERT INTO chunks_fts(rowid, search_content)
    VALUES (new.rowid, new.search_content);
END;
CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, search_content)
    VALUES ('delete', old.rowid, old.search_content);
END;
CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, search_content)
    VALUES ('delete', old.rowid, old.search_content);
    INSERT INTO chunks_fts(rowid, search_content)
    VALUES (new.rowid, new.search_content);
END;

CREATE TABLE IF NOT EXISTS embeddings (
    chunk_id   TEXT PRIMARY KEY REFERENCES chunks(id) ON DELETE CASCADE,
    provider   TEXT NOT NULL,
    model      TEXT NOT NULL,
    endpoint   TEXT NOT NULL DEFAULT '',
    vector     BLOB NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS embedding_cache (
    content_hash TEXT PRIMARY KEY,
    provider     TEXT NOT NULL,
    model        TEXT NOT NULL,
    vector       BLOB NOT NULL,
    created_at   INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS index_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS short_term_memory (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    content    TEXT NOT NULL,
    category   TEXT NOT NULL DEFAULT '',
    mode       TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
"#;

/// One indexed chunk as read back from the store.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub search_content: String,
    pub tokens: usize,
    /// Unix seconds of the last (re-)index of this chunk.
    pub updated_at: i64,
    pub file_hash: String,
    /// Importance in `[0, 1]`, assigned at index time.
    pub importance: f32,
}

/// Thread-safe handle to the relational store.
///
/// A single connection guarded by a mutex: statements are short, and SQLite
/// serializes writers anyway, so one connection keeps the locking story
/// trivial.
pub struct IndexStore {
    conn: Mutex<Connection>,
}

impl IndexStore {
    /// Open (or create) the store at `path`.  Failure here is fatal for the
    /// process — there is no degraded mode without the index database.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening index database {}", path.display()))?;
        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory().context("opening in-memory database")?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("enabling foreign keys")?;
        conn.execute_batch(SCHEMA)
            .context("creating index schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ── File hashes ───────────────────────────────────────────────────────────

    /// Recorded content hash for `file_path`, if the file was indexed before.
    pub fn file_hash(&self, file_path: &str) -> anyhow::Result<Option<String>> {
        let conn = self.lock();
        let hash = conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![meta_key(file_path)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash)
    }

    /// Every file path currently recorded in `index_meta`.
    pub fn indexed_files(&self) -> anyhow::Result<Vec<String>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT key FROM index_meta WHERE key LIKE 'file_hash:%'")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut files = Vec::new();
        for key in rows {
            let key = key?;
            if let Some(path) = key.strip_prefix("file_hash:") {
                files.push(path.to_string());
            }
        }
        Ok(files)
    }

    // ── Chunk writes ──────────────────────────────────────────────────────────

    /// Replace every chunk of one file under a single transaction, then
    /// record the new file hash.  `entries` pairs each chunk with its
    /// optional embedding vector for the given `(provider, model)`.
    pub fn replace_file(
        &self,
        file_path: &str,
        file_hash: &str,
        entries: &[(Chunk, Option<Vec<f32>>)],
        provider: &str,
        model: &str,
        endpoint: &str,
    ) -> anyhow::Result<()> {
        let mut conn = self.lock();
        let now = Utc::now().timestamp();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM chunks WHERE file_path = ?1", params![file_path])?;
        for (chunk, vector) in entries {
            tx.execute(
                "INSERT INTO chunks \
                 (id, file_path, start_line, end_line, content, search_content, tokens, updated_at, file_hash, importance) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    chunk.id,
                    chunk.file_path,
                    chunk.start_line as i64,
                    chunk.end_line as i64,
                    chunk.content,
                    chunk.search_content,
                    chunk.tokens as i64,
                    now,
                    file_hash,
                    chunk.importance as f64,
                ],
            )?;
            if let Some(vec) = vector {
                tx.execute(
                    "INSERT OR REPLACE INTO embeddings \
                     (chunk_id, provider, model, endpoint, vector, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![chunk.id, provider, model, endpoint, vec_to_blob(vec), now],
                )?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO index_meta (key, value) VALUES (?1, ?2)",
            params![meta_key(file_path), file_hash],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Drop every chunk of a file that no longer exists on disk.
    pub fn delete_file(&self, file_path: &str) -> anyhow::Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM chunks WHERE file_path = ?1", params![file_path])?;
        tx.execute(
            "DELETE FROM index_meta WHERE key = ?1",
            params![meta_key(file_path)],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ── Chunk reads ───────────────────────────────────────────────────────────

    pub fn chunk_count(&self) -> anyhow::Result<u64> {
        let conn = self.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    pub fn get_chunk(&self, id: &str) -> anyhow::Result<Option<StoredChunk>> {
        let conn = self.lock();
        let chunk = conn
            .query_row(
                "SELECT id, file_path, start_line, end_line, content, search_content, \
                        tokens, updated_at, file_hash, importance \
                 FROM chunks WHERE id = ?1",
                params![id],
                row_to_chunk,
            )
            .optional()?;
        Ok(chunk)
    }

    pub fn get_chunks(&self, ids: &[String]) -> anyhow::Result<Vec<StoredChunk>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, file_path, start_line, end_line, content, search_content, \
                    tokens, updated_at, file_hash, importance \
             FROM chunks WHERE id = ?1",
        )?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(chunk) = stmt.query_row(params![id], row_to_chunk).optional()? {
                out.push(chunk);
            }
        }
        Ok(out)
    }

    /// BM25 keyword search over the FTS index.
    ///
    /// Returns `(chunk_id, relevance)` pairs where relevance is the negated
    /// FTS5 `bm25()` rank, i.e. higher is better and magnitudes are
    /// corpus-dependent (callers rescale).
    pub fn bm25_search(
        &self,
        match_expr: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<(String, f64)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT c.id, -bm25(chunks_fts) AS score \
             FROM chunks_fts JOIN chunks c ON c.rowid = chunks_fts.rowid \
             WHERE chunks_fts MATCH ?1 \
             ORDER BY bm25(chunks_fts) \
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![match_expr, limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // ── Embeddings ────────────────────────────────────────────────────────────

    /// All stored vectors for the active `(provider, model)` pair.
    pub fn embeddings_for(
        &self,
        provider: &str,
        model: &str,
    ) -> anyhow::Result<Vec<(String, Vec<f32>)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT chunk_id, vector FROM embeddings WHERE provider = ?1 AND model = ?2",
        )?;
        let rows = stmt.query_map(params![provider, model], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, blob) = row?;
            out.push((id, blob_to_vec(&blob)));
        }
        Ok(out)
    }

    /// Vector of one chunk, used by the MMR diversity stage.
    pub fn embedding_for_chunk(
        &self,
        chunk_id: &str,
        provider: &str,
        model: &str,
    ) -> anyhow::Result<Option<Vec<f32>>> {
        let conn = self.lock();
        let blob: Option<Vec<u8>> = conn
            .query_row(
                "SELECT vector FROM embeddings \
                 WHERE chunk_id = ?1 AND provider = ?2 AND model = ?3",
                params![chunk_id, provider, model],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob.map(|b| blob_to_vec(&b)))
    }

    // ── Embedding cache ───────────────────────────────────────────────────────

    pub fn cache_get(&self, content_hash: &str) -> anyhow::Result<Option<Vec<f32>>> {
        let conn = self.lock();
        let blob: Option<Vec<u8>> = conn
            .query_row(
                "SELECT vector FROM embedding_cache WHERE content_hash = ?1",
                params![content_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob.map(|b| blob_to_vec(&b)))
    }

    pub fn cache_put(
        &self,
        content_hash: &str,
        provider: &str,
        model: &str,
        vector: &[f32],
    ) -> anyhow::Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO embedding_cache \
             (content_hash, provider, model, vector, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                content_hash,
                provider,
                model,
                vec_to_blob(vector),
                Utc::now().timestamp()
            ],
        )?;
        Ok(())
    }

    // ── Short-term memory queue ───────────────────────────────────────────────

    pub fn pending_push(
        &self,
        content: &str,
        category: &str,
        mode: PendingMode,
    ) -> anyhow::Result<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO short_term_memory (content, category, mode, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![content, category, mode.as_str(), Utc::now().timestamp()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn pending_all(&self) -> anyhow::Result<Vec<PendingMemory>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, content, category, mode, created_at \
             FROM short_term_memory ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PendingMemory {
                id: row.get(0)?,
                content: row.get(1)?,
                category: row.get(2)?,
                mode: PendingMode::parse(&row.get::<_, String>(3)?),
                created_at: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn pending_len(&self) -> anyhow::Result<usize> {
        let conn = self.lock();
        let n: i64 =
            conn.query_row("SELECT COUNT(*) FROM short_term_memory", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn pending_delete(&self, ids: &[i64]) -> anyhow::Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        for id in ids {
            tx.execute("DELETE FROM short_term_memory WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Purge entries older than `ttl_days`; returns how many were dropped.
    pub fn pending_purge_older_than(&self, ttl_days: i64) -> anyhow::Result<usize> {
        let cutoff = Utc::now().timestamp() - ttl_days * 86_400;
        let conn = self.lock();
        let n = conn.execute(
            "DELETE FROM short_term_memory WHERE created_at < ?1",
            params![cutoff],
        )?;
        Ok(n)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned mutex means another thread panicked mid-statement; the
        // connection itself is still usable for independent statements.
        self.conn.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn meta_key(file_path: &str) -> String {
    format!("file_hash:{file_path}")
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredChunk> {
    Ok(StoredChunk {
        id: row.get(0)?,
        file_path: row.get(1)?,
        start_line: row.get::<_, i64>(2)? as usize,
        end_line: row.get::<_, i64>(3)? as usize,
        content: row.get(4)?,
        search_content: row.get(5)?,
        tokens: row.get::<_, i64>(6)? as usize,
        updated_at: row.get(7)?,
        file_hash: row.get(8)?,
        importance: row.get::<_, f64>(9)? as f32,
    })
}

// ─── Blob and hash helpers ────────────────────────────────────────────────────

/// Little-endian f32 concatenation; the only vector wire format on disk.
pub(crate) fn vec_to_blob(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 4);
    for x in v {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

pub(crate) fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// SHA-256 over file contents, hex encoded.
pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Cache key over `(text, provider, model)` so switching either the
/// provider or the model never reuses a stale vector.
pub(crate) fn content_hash(text: &str, provider: &str, model: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(b"\x00");
    hasher.update(provider.as_bytes());
    hasher.update(b"\x00");
    hasher.update(model.as_bytes());
    hex::encode(hasher.finalize())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk_markdown;

    fn store() -> IndexStore {
        IndexStore::open_in_memory().unwrap()
    }

    fn entries(path: &str, text: &str) -> Vec<(Chunk, Option<Vec<f32>>)> {
        chunk_markdown(path, text, 100, 10)
            .into_iter()
            .map(|c| (c, None))
            .collect()
    }

    #[test]
    fn replace_file_inserts_chunks() {
        let s = store();
        s.replace_file("m.md", "h1", &entries("m.md", "hello world"), "p", "m", "")
            .unwrap();
        assert_eq!(s.chunk_count().unwrap(), 1);
        assert_eq!(s.file_hash("m.md").unwrap(), Some("h1".into()));
    }

    #[test]
    fn replace_file_is_idempotent_on_row_counts() {
        let s = store();
        let e = entries("m.md", "line one\nline two");
        s.replace_file("m.md", "h1", &e, "p", "m", "").unwrap();
        let before = s.chunk_count().unwrap();
        s.replace_file("m.md", "h1", &e, "p", "m", "").unwrap();
        assert_eq!(s.chunk_count().unwrap(), before);
    }

    #[test]
    fn importance_is_persisted_with_the_chunk() {
        let s = store();
        s.replace_file(
            "MEMORY.md",
            "h1",
            &entries("MEMORY.md", "## keys\n\nthe billing key"),
            "p",
            "m",
            "",
        )
        .unwrap();
        let ids = vec!["file:MEMORY.md:1-4".to_string()];
        let chunk = &s.get_chunks(&ids).unwrap()[0];
        assert!((chunk.importance - 1.0).abs() < 1e-6);
    }

    #[test]
    fn delete_file_removes_chunks_and_meta() {
        let s = store();
        s.replace_file("m.md", "h1", &entries("m.md", "text here"), "p", "m", "")
            .unwrap();
        s.delete_file("m.md").unwrap();
        assert_eq!(s.chunk_count().unwrap(), 0);
        assert_eq!(s.file_hash("m.md").unwrap(), None);
    }

    #[test]
    fn fts_round_trip_latin_token() {
        let s = store();
        s.replace_file(
            "m.md",
            "h1",
            &entries("m.md", "the quick brown fox jumps"),
            "p",
            "m",
            "",
        )
        .unwrap();
        let hits = s.bm25_search("\"quick\"", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].1 > 0.0, "negated bm25 rank must be positive");
    }

    #[test]
    fn fts_round_trip_cjk_rune_after_spacing() {
        let s = store();
        s.replace_file(
            "m.md",
            "h1",
            &entries("m.md", "使用混合搜尋實作記憶"),
            "p",
            "m",
            "",
        )
        .unwrap();
        // Query sanitizer emits one quoted disjunct per rune.
        let hits = s.bm25_search("\"搜\" OR \"尋\"", 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn fts_index_follows_deletes() {
        let s = store();
        s.replace_file("m.md", "h1", &entries("m.md", "findme here"), "p", "m", "")
            .unwrap();
        s.delete_file("m.md").unwrap();
        assert!(s.bm25_search("\"findme\"", 10).unwrap().is_empty());
    }

    #[test]
    fn embeddings_keyed_by_provider_and_model() {
        let s = store();
        let chunks = chunk_markdown("m.md", "vector text", 100, 10);
        let e: Vec<(Chunk, Option<Vec<f32>>)> = chunks
            .into_iter()
            .map(|c| (c, Some(vec![1.0f32, 0.0])))
            .collect();
        s.replace_file("m.md", "h1", &e, "prov-a", "model-a", "").unwrap();

        assert_eq!(s.embeddings_for("prov-a", "model-a").unwrap().len(), 1);
        // A different active pair sees nothing.
        assert!(s.embeddings_for("prov-b", "model-a").unwrap().is_empty());
    }

    #[test]
    fn embedding_vector_round_trips() {
        let v = vec![0.5f32, -1.25, 3.0];
        assert_eq!(blob_to_vec(&vec_to_blob(&v)), v);
    }

    #[test]
    fn embeddings_cascade_on_chunk_delete() {
        let s = store();
        let chunks = chunk_markdown("m.md", "some text", 100, 10);
        let e: Vec<(Chunk, Option<Vec<f32>>)> =
            chunks.into_iter().map(|c| (c, Some(vec![1.0f32]))).collect();
        s.replace_file("m.md", "h1", &e, "p", "m", "").unwrap();
        s.delete_file("m.md").unwrap();
        assert!(s.embeddings_for("p", "m").unwrap().is_empty());
    }

    #[test]
    fn cache_put_and_get() {
        let s = store();
        let hash = content_hash("text", "p", "m");
        assert!(s.cache_get(&hash).unwrap().is_none());
        s.cache_put(&hash, "p", "m", &[1.0, 2.0]).unwrap();
        assert_eq!(s.cache_get(&hash).unwrap(), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn content_hash_depends_on_provider_and_model() {
        let a = content_hash("t", "p1", "m");
        let b = content_hash("t", "p2", "m");
        let c = content_hash("t", "p1", "m2");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn pending_queue_round_trip() {
        let s = store();
        s.pending_push("today note", "life", PendingMode::Daily).unwrap();
        s.pending_push("fact", "tech", PendingMode::LongTerm).unwrap();
        let all = s.pending_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].mode, PendingMode::Daily);
        assert_eq!(all[1].mode, PendingMode::LongTerm);

        s.pending_delete(&[all[0].id]).unwrap();
        assert_eq!(s.pending_len().unwrap(), 1);
    }

    #[test]
    fn pending_purge_drops_only_old_entries() {
        let s = store();
        s.pending_push("fresh", "", PendingMode::Daily).unwrap();
        // A negative TTL makes "now" older than the cutoff.
        assert_eq!(s.pending_purge_older_than(1).unwrap(), 0);
        assert_eq!(s.pending_purge_older_than(-1).unwrap(), 1);
    }

    #[test]
    fn indexed_files_lists_paths() {
        let s = store();
        s.replace_file("a.md", "h", &entries("a.md", "aaa aaa"), "p", "m", "")
            .unwrap();
        s.replace_file("b.md", "h", &entries("b.md", "bbb bbb"), "p", "m", "")
            .unwrap();
        let mut files = s.indexed_files().unwrap();
        files.sort();
        assert_eq!(files, vec!["a.md", "b.md"]);
    }
}
