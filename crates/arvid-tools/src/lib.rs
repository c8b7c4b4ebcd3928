// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! LLM-callable tools.
//!
//! Every capability the model can invoke lives behind the [`Tool`] trait:
//! a JSON-schema definition handed to the model and an `execute` that takes
//! the raw argument object and returns text.  Tools never abort the agent
//! loop — failures become error outputs the model reads and recovers from.

pub mod builtin;
mod coerce;
mod registry;
mod tool;

pub use coerce::{arg_bool, arg_str, arg_u32};
pub use registry::{ToolRegistry, ToolSchema};
pub use tool::{Tool, ToolCall, ToolOutput};
