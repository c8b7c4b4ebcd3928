// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::{Tool, ToolCall, ToolOutput};

/// A tool schema handed to the model provider.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Central registry holding all available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool.  On a name conflict a skill replaces a non-skill;
    /// a non-skill never displaces a registered skill.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if let Some(existing) = self.tools.get(&name) {
            if existing.is_skill() && !tool.is_skill() {
                warn!(tool = %name, "builtin ignored: a skill with this name is registered");
                return;
            }
        }
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Produce the schema list handed to the LLM, sorted for a stable
    /// prompt prefix.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Dispatch one call.  An unknown tool becomes an error output the
    /// model can observe and correct — never a process error.
    pub async fn call_tool(&self, call: &ToolCall) -> ToolOutput {
        match self.tools.get(&call.name) {
            Some(tool) => tool.execute(call).await,
            None => ToolOutput::err(&call.id, format!("unknown tool: {}", call.name)),
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;

    struct EchoTool {
        name: &'static str,
        skill: bool,
        reply: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        fn is_skill(&self) -> bool {
            self.skill
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            ToolOutput::ok(&call.id, self.reply)
        }
    }

    fn echo(name: &'static str) -> EchoTool {
        EchoTool {
            name,
            skill: false,
            reply: "builtin",
        }
    }

    #[test]
    fn register_and_get() {
        let mut reg = ToolRegistry::new();
        reg.register(echo("echo"));
        assert!(reg.get("echo").is_some());
        assert!(reg.get("nope").is_none());
    }

    #[test]
    fn schemas_sorted_and_complete() {
        let mut reg = ToolRegistry::new();
        reg.register(echo("b_tool"));
        reg.register(echo("a_tool"));
        let schemas = reg.schemas();
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0].name, "a_tool");
        assert_eq!(schemas[1].description, "echoes its input");
    }

    #[tokio::test]
    async fn call_known_tool() {
        let mut reg = ToolRegistry::new();
        reg.register(echo("echo"));
        let out = reg
            .call_tool(&ToolCall {
                id: "1".into(),
                name: "echo".into(),
                args: json!({}),
            })
            .await;
        assert!(!out.is_error);
    }

    #[tokio::test]
    async fn unknown_tool_is_recoverable_error() {
        let reg = ToolRegistry::new();
        let out = reg
            .call_tool(&ToolCall {
                id: "x".into(),
                name: "missing".into(),
                args: json!({}),
            })
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("unknown tool"));
    }

    #[tokio::test]
    async fn skill_wins_name_conflict() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool {
            name: "t",
            skill: true,
            reply: "skill",
        });
        // A later builtin must not displace the skill.
        reg.register(EchoTool {
            name: "t",
            skill: false,
            reply: "builtin",
        });
        let out = reg
            .call_tool(&ToolCall {
                id: "1".into(),
                name: "t".into(),
                args: json!({}),
            })
            .await;
        assert_eq!(out.content, "skill");
    }

    #[test]
    fn skill_replaces_builtin() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool {
            name: "t",
            skill: false,
            reply: "builtin",
        });
        reg.register(EchoTool {
            name: "t",
            skill: true,
            reply: "skill",
        });
        assert!(reg.get("t").unwrap().is_skill());
    }
}
