// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `background_task` — query fire-and-forget work launched by other tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use arvid_scheduler::{BackgroundTaskManager, TaskStatus};

use crate::coerce::{arg_str, arg_u32};
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct BackgroundTaskTool {
    pub background: Arc<BackgroundTaskManager>,
}

fn status_str(s: TaskStatus) -> &'static str {
    match s {
        TaskStatus::Running => "running",
        TaskStatus::Success => "success",
        TaskStatus::Failed => "failed",
    }
}

#[async_trait]
impl Tool for BackgroundTaskTool {
    fn name(&self) -> &str {
        "background_task"
    }

    fn description(&self) -> &str {
        "Inspect background tasks. Actions: list (all tracked tasks, newest\n\
         first), status (one task by id, including its result once finished)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["list", "status"],
                    "description": "Query to run"
                },
                "id": {
                    "type": "integer",
                    "description": "Task id (required for status)"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let action = match arg_str(&call.args, "action") {
            Some(a) => a,
            None => return ToolOutput::err(&call.id, "missing 'action'"),
        };

        match action.as_str() {
            "list" => {
                let tasks = self.background.list();
                if tasks.is_empty() {
                    return ToolOutput::ok(&call.id, "No background tasks.");
                }
                let lines: Vec<String> = tasks
                    .iter()
                    .map(|t| {
                        format!(
                            "#{} [{}] {} (started {})",
                            t.id,
                            status_str(t.status),
                            t.command,
                            t.start_time.format("%H:%M:%S")
                        )
                    })
                    .collect();
                ToolOutput::ok(&call.id, lines.join("\n"))
            }
            "status" => {
                let id = match arg_u32(&call.args, "id") {
                    Some(id) => id as i64,
                    None => return ToolOutput::err(&call.id, "missing 'id' for status"),
                };
                match self.background.get(id) {
                    Some(t) => {
                        let mut out = format!(
                            "#{} [{}] {}\nstarted: {}",
                            t.id,
                            status_str(t.status),
                            t.command,
                            t.start_time.format("%Y-%m-%d %H:%M:%S")
                        );
                        if let Some(end) = t.end_time {
                            out.push_str(&format!(
                                "\nended: {}\nresult: {}",
                                end.format("%Y-%m-%d %H:%M:%S"),
                                t.result
                            ));
                        }
                        ToolOutput::ok(&call.id, out)
                    }
                    None => ToolOutput::err(&call.id, format!("no background task #{id}")),
                }
            }
            other => ToolOutput::err(&call.id, format!("unknown action: {other}")),
        }
    }
}
