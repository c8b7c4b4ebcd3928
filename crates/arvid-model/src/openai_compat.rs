// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Driver for OpenAI-compatible chat completion APIs.
//!
//! Remote APIs and local inference servers (Ollama, llama.cpp, vLLM,
//! LM Studio) all speak the same `/chat/completions` SSE wire format, so a
//! single configurable driver covers every deployment this agent targets.

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{provider::ResponseStream, CompletionRequest, ResponseEvent, Role};

/// Connection attempts before a request is reported as failed.
const MAX_ATTEMPTS: u32 = 3;
/// Base delay of the exponential backoff between attempts.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// OpenAI-compatible chat completion provider.
pub struct OpenAICompatProvider {
    /// Model id forwarded to the API.
    model: String,
    /// API key (pre-resolved from config or env).  `None` for local servers.
    api_key: Option<String>,
    /// Full chat completions URL, e.g. `http://localhost:11434/v1/chat/completions`.
    chat_url: String,
    client: reqwest::Client,
}

impl OpenAICompatProvider {
    /// Construct a provider from its endpoint base and model.
    ///
    /// `base_url` ends **before** `/chat/completions`, e.g.
    /// `http://localhost:11434/v1`.
    pub fn new(model: impl Into<String>, base_url: &str, api_key: Option<String>) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            model: model.into(),
            api_key,
            chat_url: format!("{base}/chat/completions"),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl crate::ModelProvider for OpenAICompatProvider {
    fn name(&self) -> &str {
        "openai-compat"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let messages = build_openai_messages(&req.messages);

        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": req.stream,
            "stream_options": { "include_usage": true },
        });
        if let Some(t) = req.options.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(p) = req.options.top_p {
            body["top_p"] = json!(p);
        }
        if let Some(mt) = req.options.max_tokens {
            body["max_tokens"] = json!(mt);
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        debug!(
            model = %self.model,
            tool_count = tools.len(),
            message_count = messages.len(),
            "sending completion request"
        );

        // Bounded retry with exponential backoff on transport errors and 5xx.
        // A 4xx is the caller's fault and fails immediately.
        let mut last_err: Option<anyhow::Error> = None;
        for attempt in 1..=MAX_ATTEMPTS {
            let mut http_req = self.client.post(&self.chat_url).json(&body);
            if let Some(key) = &self.api_key {
                http_req = http_req.bearer_auth(key);
            }

            match http_req.send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(sse_event_stream(resp));
                }
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_server_error() && attempt < MAX_ATTEMPTS {
                        warn!(%status, attempt, "model endpoint returned server error; retrying");
                        last_err = Some(anyhow::anyhow!("model endpoint error {status}: {text}"));
                    } else {
                        bail!("model endpoint error {status}: {text}");
                    }
                }
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!(error = %e, attempt, "completion request failed; retrying");
                    last_err = Some(e.into());
                }
                Err(e) => {
                    return Err(e).context("completion request failed");
                }
            }

            tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt - 1)).await;
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("completion attempts exhausted")))
    }
}

/// Wrap the HTTP byte stream into a [`ResponseEvent`] stream.
///
/// SSE events can be split across multiple TCP packets, so a line buffer is
/// maintained across chunks; events are emitted only for complete lines.
fn sse_event_stream(resp: reqwest::Response) -> ResponseStream {
    let byte_stream = resp.bytes_stream();
    let event_stream = byte_stream
        .scan(String::new(), |buf, chunk| {
            let events: Vec<anyhow::Result<ResponseEvent>> = match chunk {
                Ok(b) => {
                    buf.push_str(&String::from_utf8_lossy(&b));
                    drain_complete_sse_lines(buf)
                }
                Err(e) => vec![Err(anyhow::anyhow!(e))],
            };
            std::future::ready(Some(events))
        })
        .flat_map(futures::stream::iter);
    Box::pin(event_stream)
}

/// Parse a single complete SSE `data:` line into a [`ResponseEvent`].
///
/// Returns `None` for empty lines, comment lines, or unparseable data.
fn parse_sse_data_line(line: &str) -> Option<anyhow::Result<ResponseEvent>> {
    let data = line.strip_prefix("data: ")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Ok(ResponseEvent::Done));
    }
    let v: Value = serde_json::from_str(data).ok()?;
    Some(Ok(parse_sse_chunk(&v)))
}

/// Drain all complete `\n`-terminated SSE lines from `buf`.
///
/// Any trailing incomplete line (bytes not yet terminated by `\n`) is left
/// in `buf` so it can be extended by the next TCP chunk.
pub(crate) fn drain_complete_sse_lines(buf: &mut String) -> Vec<anyhow::Result<ResponseEvent>> {
    let mut events = Vec::new();
    while let Some(nl_pos) = buf.find('\n') {
        // Strip the optional Windows-style \r before \n.
        let line = buf[..nl_pos].trim_end_matches('\r').to_string();
        // Advance buffer past the consumed line including the \n.
        *buf = buf[nl_pos + 1..].to_string();
        if let Some(ev) = parse_sse_data_line(&line) {
            events.push(ev);
        }
    }
    events
}

fn role_str(r: &Role) -> &'static str {
    match r {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn parse_sse_chunk(v: &Value) -> ResponseEvent {
    // Usage-only chunk (emitted when stream_options.include_usage = true)
    if let Some(usage) = v.get("usage").filter(|u| !u.is_null()) {
        return ResponseEvent::Usage {
            input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
        };
    }

    let delta = &v["choices"][0]["delta"];

    // Tool call delta — each SSE chunk carries one tool-call delta in
    // practice; the index routes accumulation for parallel calls.
    if let Some(tc) = delta.get("tool_calls").and_then(|a| a.get(0)) {
        let index = tc["index"].as_u64().unwrap_or(0) as u32;
        let id = tc["id"].as_str().unwrap_or("").to_string();
        let name = tc["function"]["name"].as_str().unwrap_or("").to_string();
        let args = tc["function"]["arguments"].as_str().unwrap_or("").to_string();
        return ResponseEvent::ToolCall {
            index,
            id,
            name,
            arguments: args,
        };
    }

    // Text delta
    if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
        return ResponseEvent::TextDelta(text.to_string());
    }

    ResponseEvent::TextDelta(String::new())
}

/// Convert a slice of [`Message`]s into the OpenAI wire-format JSON array.
///
/// **Parallel tool call coalescing**: the wire format requires all tool
/// calls from one assistant turn inside a *single* assistant message as a
/// `tool_calls` array.  The session stores each call as its own
/// `MessageContent::ToolCall` entry, so consecutive entries are merged here
/// before sending.
pub(crate) fn build_openai_messages(messages: &[crate::Message]) -> Vec<Value> {
    use crate::MessageContent;

    fn tool_call_to_json(tool_call_id: &str, function: &crate::FunctionCall) -> Value {
        json!({
            "id": tool_call_id,
            "type": "function",
            "function": {
                "name": function.name,
                "arguments": function.arguments,
            }
        })
    }

    let mut result: Vec<Value> = Vec::with_capacity(messages.len());
    let mut i = 0;

    while i < messages.len() {
        let m = &messages[i];

        if let MessageContent::ToolCall {
            tool_call_id,
            function,
        } = &m.content
        {
            let mut calls = vec![tool_call_to_json(tool_call_id, function)];
            i += 1;
            while i < messages.len() {
                if let MessageContent::ToolCall {
                    tool_call_id,
                    function,
                } = &messages[i].content
                {
                    calls.push(tool_call_to_json(tool_call_id, function));
                    i += 1;
                } else {
                    break;
                }
            }
            // Assistant tool-call messages have empty content on the wire.
            result.push(json!({ "role": "assistant", "content": "", "tool_calls": calls }));
            continue;
        }

        let v = match &m.content {
            MessageContent::Text(t) => json!({
                "role": role_str(&m.role),
                "content": t,
            }),
            MessageContent::ToolCall { .. } => unreachable!("handled above"),
            MessageContent::ToolResult {
                tool_call_id,
                content,
            } => json!({
                "role": "tool",
                "tool_call_id": tool_call_id,
                "content": content,
            }),
        };
        result.push(v);
        i += 1;
    }

    result
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Message, ModelProvider};

    fn make_provider() -> OpenAICompatProvider {
        OpenAICompatProvider::new("test-model", "http://localhost:9999/v1", None)
    }

    #[test]
    fn model_name_returns_model() {
        assert_eq!(make_provider().model_name(), "test-model");
    }

    #[test]
    fn chat_url_appends_path() {
        assert_eq!(
            make_provider().chat_url,
            "http://localhost:9999/v1/chat/completions"
        );
    }

    #[test]
    fn base_url_trailing_slash_stripped() {
        let p = OpenAICompatProvider::new("m", "http://localhost:1234/v1/", None);
        assert_eq!(p.chat_url, "http://localhost:1234/v1/chat/completions");
    }

    // ── SSE parsing ───────────────────────────────────────────────────────────

    #[test]
    fn done_sentinel_yields_done() {
        let ev = parse_sse_data_line("data: [DONE]").unwrap().unwrap();
        assert!(matches!(ev, ResponseEvent::Done));
    }

    #[test]
    fn text_delta_parsed() {
        let line = r#"data: {"choices":[{"delta":{"content":"hi"}}]}"#;
        let ev = parse_sse_data_line(line).unwrap().unwrap();
        assert!(matches!(ev, ResponseEvent::TextDelta(t) if t == "hi"));
    }

    #[test]
    fn tool_call_delta_parsed() {
        let line = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"memory_search","arguments":"{\"q"}}]}}]}"#;
        let ev = parse_sse_data_line(line).unwrap().unwrap();
        match ev {
            ResponseEvent::ToolCall {
                index, id, name, ..
            } => {
                assert_eq!(index, 0);
                assert_eq!(id, "c1");
                assert_eq!(name, "memory_search");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn usage_chunk_parsed() {
        let line = r#"data: {"usage":{"prompt_tokens":7,"completion_tokens":3},"choices":[]}"#;
        let ev = parse_sse_data_line(line).unwrap().unwrap();
        assert!(matches!(
            ev,
            ResponseEvent::Usage {
                input_tokens: 7,
                output_tokens: 3
            }
        ));
    }

    #[test]
    fn non_data_lines_skipped() {
        assert!(parse_sse_data_line(": keepalive").is_none());
        assert!(parse_sse_data_line("").is_none());
        assert!(parse_sse_data_line("event: message").is_none());
    }

    #[test]
    fn partial_line_stays_buffered() {
        let mut buf = String::from("data: [DO");
        let events = drain_complete_sse_lines(&mut buf);
        assert!(events.is_empty());
        assert_eq!(buf, "data: [DO");

        buf.push_str("NE]\n");
        let events = drain_complete_sse_lines(&mut buf);
        assert_eq!(events.len(), 1);
        assert!(buf.is_empty());
    }

    #[test]
    fn crlf_lines_handled() {
        let mut buf = String::from("data: [DONE]\r\n");
        let events = drain_complete_sse_lines(&mut buf);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].as_ref().unwrap(),
            ResponseEvent::Done
        ));
    }

    // ── Wire-format building ──────────────────────────────────────────────────

    #[test]
    fn plain_messages_keep_role_and_content() {
        let msgs = vec![Message::system("sys"), Message::user("hi")];
        let wire = build_openai_messages(&msgs);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[1]["content"], "hi");
    }

    #[test]
    fn consecutive_tool_calls_coalesce_into_one_assistant_message() {
        let msgs = vec![
            Message::user("go"),
            Message::tool_call("c1", "a", "{}"),
            Message::tool_call("c2", "b", "{}"),
            Message::tool_result("c1", "r1"),
            Message::tool_result("c2", "r2"),
        ];
        let wire = build_openai_messages(&msgs);
        // user, assistant(tool_calls ×2), tool, tool
        assert_eq!(wire.len(), 4);
        assert_eq!(wire[1]["tool_calls"].as_array().unwrap().len(), 2);
        assert_eq!(wire[2]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "c2");
    }

    #[test]
    fn assistant_tool_call_message_has_empty_content() {
        let msgs = vec![Message::tool_call("c1", "f", "{}")];
        let wire = build_openai_messages(&msgs);
        assert_eq!(wire[0]["content"], "");
    }
}
