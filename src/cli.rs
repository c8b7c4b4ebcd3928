// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// arvid — a personal, long-running AI agent with hybrid long-term memory.
#[derive(Parser, Debug)]
#[command(name = "arvid", version, about)]
pub struct Cli {
    /// Explicit config file (merged over the discovered layers).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Log to stderr (RUST_LOG controls the filter).
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one message and print the reply (default: interactive chat).
    Chat {
        /// The message; omit to read lines interactively.
        message: Option<String>,
    },

    /// Search long-term memory and print the ranked snippets.
    Search {
        query: String,
        /// Maximum results.
        #[arg(long, short = 'k')]
        top_k: Option<usize>,
    },

    /// Re-index every memory file regardless of the dirty flag.
    Reindex,

    /// List persisted scheduled jobs.
    Jobs,

    /// Print the merged configuration and exit.
    ShowConfig,
}
