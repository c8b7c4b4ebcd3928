// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Hybrid long-term memory for the agent.
//!
//! Markdown files under the workspace are the source of truth; this crate
//! derives a SQLite index from them (chunks + FTS5 keyword index + optional
//! embedding vectors) and answers ranked retrieval queries against it.
//! Writers append to the markdown and flip a dirty flag; a polling watcher
//! re-indexes changed files in the background.

mod chunker;
mod embedding;
mod indexer;
mod manager;
mod noise;
mod pending;
mod retriever;
mod store;
mod text;
mod watcher;
mod writer;

pub use chunker::{chunk_importance, chunk_markdown, Chunk};
pub use embedding::{
    cosine_similarity, EmbeddingProvider, NullEmbedder, OpenAICompatEmbedder,
};
pub use indexer::Indexer;
pub use manager::MemoryManager;
pub use noise::NoiseFilter;
pub use pending::{PendingMemory, PendingMode};
pub use retriever::{MemoryHit, Retriever};
pub use store::{IndexStore, StoredChunk};
pub use text::{space_cjk, to_fts_query};
pub use watcher::FileWatcher;
pub use writer::MemoryWriter;
