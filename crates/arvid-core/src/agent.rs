// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use futures::StreamExt;
use tracing::{debug, warn};

use arvid_config::Config;
use arvid_memory::MemoryManager;
use arvid_model::{
    CompletionOptions, CompletionRequest, Message, ModelProvider, ResponseEvent,
};
use arvid_planner::{build_recovery_prompt, PlanStore};
use arvid_tools::{ToolCall, ToolRegistry};

use crate::callbacks::AgentCallbacks;
use crate::prompts::{format_memory_hint, DEFAULT_SYSTEM_PROMPT, TOOL_FAILURE_PREFIX};
use crate::session::Session;
use crate::summarize::{buffer_compact, check_and_summarize, FlushLedger};

/// The core agent.  Owns a session and drives the model ↔ tool loop.
pub struct Agent {
    session: Session,
    model: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    memory: Arc<MemoryManager>,
    planner: Arc<PlanStore>,
    callbacks: AgentCallbacks,
    options: CompletionOptions,
    max_tool_rounds: u32,
    memory_prefetch: bool,
    prefetch_top_k: usize,
    summarize_idle_secs: u64,
    summarize_min_messages: usize,
    buffer_token_limit: usize,
    buffer_compact_ratio: f32,
    flush_ledger: FlushLedger,
    history_dir: PathBuf,
}

impl Agent {
    /// Construct an agent over injected capability handles.  Resumes the
    /// most recent session on disk; otherwise starts a fresh one seeded
    /// with the system prompt.
    pub fn new(
        cfg: &Config,
        model: Arc<dyn ModelProvider>,
        tools: Arc<ToolRegistry>,
        memory: Arc<MemoryManager>,
        planner: Arc<PlanStore>,
        callbacks: AgentCallbacks,
    ) -> Self {
        let history_dir = cfg.paths.history_dir();
        let system_prompt = cfg
            .model
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        let session =
            Session::load_latest(&history_dir).unwrap_or_else(|| Session::new(system_prompt));

        Self {
            session,
            model,
            tools,
            memory,
            planner,
            callbacks,
            options: CompletionOptions {
                temperature: cfg.model.temperature,
                top_p: cfg.model.top_p,
                max_tokens: cfg.model.max_tokens,
            },
            max_tool_rounds: cfg.agent.max_tool_rounds,
            memory_prefetch: cfg.agent.memory_prefetch,
            prefetch_top_k: cfg.memory.top_k,
            summarize_idle_secs: cfg.agent.summarize_idle_secs,
            summarize_min_messages: cfg.agent.summarize_min_messages,
            buffer_token_limit: cfg.agent.buffer_token_limit,
            buffer_compact_ratio: cfg.agent.buffer_compact_ratio,
            flush_ledger: FlushLedger::new(),
            history_dir,
        }
    }

    /// Periodic maintenance, driven by the heartbeat: apply the
    /// buffer-based compaction policy at most once per cycle id.  Returns
    /// `true` when the session was compacted (and re-persisted).
    pub fn maintain(&mut self, cycle_id: &str) -> anyhow::Result<bool> {
        let flushed = buffer_compact(
            &mut self.session,
            self.buffer_token_limit,
            self.buffer_compact_ratio,
            cycle_id,
            &mut self.flush_ledger,
        );
        if flushed {
            self.session
                .save(&self.history_dir)
                .context("saving buffer-compacted session")?;
        }
        Ok(flushed)
    }

    /// Start over with a fresh session (the old one stays on disk).
    pub fn new_session(&mut self, system_prompt: &str) {
        self.session = Session::new(system_prompt);
    }

    /// Startup summarization check: a session that crossed the idle
    /// threshold while the process was down is distilled into long-term
    /// memory before the first turn.
    pub async fn summarize_on_startup(&mut self) -> anyhow::Result<bool> {
        let compacted = check_and_summarize(
            &mut self.session,
            self.model.as_ref(),
            &self.memory,
            self.summarize_idle_secs,
            self.summarize_min_messages,
        )
        .await?;
        if compacted {
            self.session
                .save(&self.history_dir)
                .context("saving compacted session")?;
        }
        Ok(compacted)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run one user turn to completion and return the final assistant
    /// text.
    ///
    /// Transient system messages (plan recovery, memory prefetch) are sent
    /// with every model call of this turn but never persisted into the
    /// session, so the canonical history stays clean and re-runnable.
    pub async fn chat(&mut self, user_input: &str) -> anyhow::Result<String> {
        let mut transients: Vec<Message> = Vec::new();

        // Pre-flight: an interrupted plan takes precedence over everything.
        if let Some(recovery) = build_recovery_prompt(&self.planner) {
            debug!("injecting plan recovery prompt");
            transients.push(Message::system(recovery));
        }

        // Memory-first prefetch (the retriever's gate handles greetings and
        // other non-queries internally).
        if self.memory_prefetch {
            match self
                .memory
                .memory_search_k(user_input, self.prefetch_top_k)
                .await
            {
                Ok(hits) if !hits.is_empty() => {
                    debug!(hits = hits.len(), "injecting memory prefetch");
                    transients.push(Message::system(format_memory_hint(&hits)));
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "memory prefetch failed; continuing without"),
            }
        }

        self.session.push(Message::user(user_input));

        let final_text = self.run_tool_loop(&transients).await?;

        // Persist, then give summarization a chance to compact.
        self.session
            .save(&self.history_dir)
            .context("saving session")?;
        match check_and_summarize(
            &mut self.session,
            self.model.as_ref(),
            &self.memory,
            self.summarize_idle_secs,
            self.summarize_min_messages,
        )
        .await
        {
            Ok(true) => {
                self.session
                    .save(&self.history_dir)
                    .context("saving compacted session")?;
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "summarization failed; skipping"),
        }

        Ok(final_text)
    }

    /// The bounded model ↔ tool loop.
    async fn run_tool_loop(&mut self, transients: &[Message]) -> anyhow::Result<String> {
        for round in 1..=self.max_tool_rounds {
            self.callbacks.generate_start();
            let (text, tool_calls) = self.stream_one_turn(transients).await?;
            self.callbacks.model_message_complete(&text);

            if !text.is_empty() {
                self.session.push(Message::assistant(&text));
            }

            if tool_calls.is_empty() {
                return Ok(text);
            }
            debug!(round, calls = tool_calls.len(), "executing tool calls");

            // All tool-call messages precede the results so the wire format
            // keeps parallel calls inside one assistant message.
            for tc in &tool_calls {
                self.session
                    .push(Message::tool_call(&tc.id, &tc.name, tc.args.to_string()));
            }

            // Execute sequentially in the order the model emitted; one tool
            // message per call, appended in the same order.  Failures are
            // wrapped and fed back — the model recovers in conversation.
            for tc in &tool_calls {
                self.callbacks.tool_call(&tc.name, &tc.args.to_string());
                let output = self.tools.call_tool(tc).await;
                let content = if output.is_error {
                    format!("{TOOL_FAILURE_PREFIX}{}", output.content)
                } else {
                    output.content
                };
                self.callbacks.tool_result(&content);
                self.session.push(Message::tool_result(&tc.id, &content));
            }
        }

        // Persist what happened before reporting the overflow; the session
        // is useful evidence when a tool-call fan runs away.
        if let Err(e) = self.session.save(&self.history_dir) {
            warn!(error = %e, "saving session after round overflow failed");
        }
        bail!(
            "tool-call loop exceeded {} rounds without a final reply",
            self.max_tool_rounds
        )
    }

    /// One model call: stream deltas, accumulate text and tool-call
    /// fragments, return the materialized assistant turn.
    async fn stream_one_turn(
        &mut self,
        transients: &[Message],
    ) -> anyhow::Result<(String, Vec<ToolCall>)> {
        let req = CompletionRequest {
            messages: self.request_messages(transients),
            tools: self
                .tools
                .schemas()
                .into_iter()
                .map(|s| arvid_model::ToolSchema {
                    name: s.name,
                    description: s.description,
                    parameters: s.parameters,
                })
                .collect(),
            stream: true,
            options: self.options,
        };

        let mut stream = self
            .model
            .complete(req)
            .await
            .context("model completion failed")?;

        let mut full_text = String::new();
        // Keyed by the parallel-tool-call index from the provider: argument
        // fragments for different calls may interleave.
        let mut pending: HashMap<u32, PendingToolCall> = HashMap::new();

        while let Some(event) = stream.next().await {
            match event.context("model stream failed")? {
                ResponseEvent::TextDelta(delta) if !delta.is_empty() => {
                    self.callbacks.delta(&delta);
                    full_text.push_str(&delta);
                }
                ResponseEvent::TextDelta(_) => {}
                ResponseEvent::ToolCall {
                    index,
                    id,
                    name,
                    arguments,
                } => {
                    let ptc = pending.entry(index).or_default();
                    if !id.is_empty() {
                        ptc.id = id;
                    }
                    if !name.is_empty() {
                        ptc.name = name;
                    }
                    ptc.args_buf.push_str(&arguments);
                }
                ResponseEvent::Usage { .. } => {}
                ResponseEvent::Done => break,
                ResponseEvent::Error(e) => warn!("model stream warning: {e}"),
            }
        }

        // Flush accumulated tool calls in index order.  Calls with no name
        // cannot be dispatched and are dropped; an empty id gets a
        // synthetic one so the result message can still reference it.
        let mut flushed: Vec<(u32, PendingToolCall)> = pending.into_iter().collect();
        flushed.sort_by_key(|(idx, _)| *idx);
        let mut tool_calls = Vec::with_capacity(flushed.len());
        for (i, (_, ptc)) in flushed.into_iter().enumerate() {
            if ptc.name.is_empty() {
                warn!(call_id = %ptc.id, "dropping tool call with empty name");
                continue;
            }
            let mut tc = ptc.finish();
            if tc.id.is_empty() {
                tc.id = format!("tc_synthetic_{i}");
            }
            tool_calls.push(tc);
        }

        Ok((full_text, tool_calls))
    }

    /// Request message list: the canonical session with the transient
    /// system messages spliced in right after the system prompt.
    fn request_messages(&self, transients: &[Message]) -> Vec<Message> {
        if transients.is_empty() {
            return self.session.messages.clone();
        }
        let mut messages = Vec::with_capacity(self.session.messages.len() + transients.len());
        messages.push(self.session.messages[0].clone());
        messages.extend(transients.iter().cloned());
        messages.extend(self.session.messages[1..].iter().cloned());
        messages
    }
}

#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    args_buf: String,
}

impl PendingToolCall {
    /// Resolve the accumulated argument buffer to a JSON object.  Invalid
    /// JSON degrades to `{}` — the tool will answer with a readable error
    /// the model can correct, which beats aborting the turn.
    fn finish(self) -> ToolCall {
        let args = if self.args_buf.is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            match serde_json::from_str(&self.args_buf) {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        tool = %self.name,
                        error = %e,
                        "model sent invalid JSON arguments; substituting {{}}"
                    );
                    serde_json::Value::Object(Default::default())
                }
            }
        };
        ToolCall {
            id: self.id,
            name: self.name,
            args,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
