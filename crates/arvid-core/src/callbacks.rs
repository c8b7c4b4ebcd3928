// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Front-end hooks into the agent loop.
//!
//! The agent is UI-agnostic; a CLI (or any other surface) registers the
//! callbacks it cares about and leaves the rest unset.  Every hook is
//! synchronous and must be cheap — they run inline with the turn.

type Hook = Box<dyn Fn() + Send + Sync>;
type TextHook = Box<dyn Fn(&str) + Send + Sync>;
type ToolHook = Box<dyn Fn(&str, &str) + Send + Sync>;

#[derive(Default)]
pub struct AgentCallbacks {
    /// A model call is about to start.
    pub on_generate_start: Option<Hook>,
    /// One streamed content delta.
    pub on_delta: Option<TextHook>,
    /// The assistant message finished streaming (full text).
    pub on_model_message_complete: Option<TextHook>,
    /// A tool is about to run: `(name, args_json)`.
    pub on_tool_call: Option<ToolHook>,
    /// A tool finished; the string is what enters the conversation.
    pub on_tool_result: Option<TextHook>,
}

impl AgentCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_generate_start(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_generate_start = Some(Box::new(f));
        self
    }

    pub fn on_delta(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_delta = Some(Box::new(f));
        self
    }

    pub fn on_model_message_complete(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_model_message_complete = Some(Box::new(f));
        self
    }

    pub fn on_tool_call(mut self, f: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.on_tool_call = Some(Box::new(f));
        self
    }

    pub fn on_tool_result(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_tool_result = Some(Box::new(f));
        self
    }

    pub(crate) fn generate_start(&self) {
        if let Some(f) = &self.on_generate_start {
            f();
        }
    }

    pub(crate) fn delta(&self, text: &str) {
        if let Some(f) = &self.on_delta {
            f(text);
        }
    }

    pub(crate) fn model_message_complete(&self, text: &str) {
        if let Some(f) = &self.on_model_message_complete {
            f(text);
        }
    }

    pub(crate) fn tool_call(&self, name: &str, args: &str) {
        if let Some(f) = &self.on_tool_call {
            f(name, args);
        }
    }

    pub(crate) fn tool_result(&self, text: &str) {
        if let Some(f) = &self.on_tool_result {
            f(text);
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
