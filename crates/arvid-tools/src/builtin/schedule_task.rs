// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `schedule_task` — manage recurring cron jobs from the conversation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use arvid_scheduler::CronScheduler;

use crate::coerce::arg_str;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct ScheduleTaskTool {
    pub cron: Arc<CronScheduler>,
}

#[async_trait]
impl Tool for ScheduleTaskTool {
    fn name(&self) -> &str {
        "schedule_task"
    }

    fn description(&self) -> &str {
        "Manage recurring scheduled jobs. Actions: add (name + 5-field cron\n\
         spec + task_type), remove (by name), list. Job definitions persist\n\
         across restarts. Use 'list' first to see registered task types in\n\
         the error message if unsure."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["add", "remove", "list"],
                    "description": "Scheduler operation"
                },
                "name": {
                    "type": "string",
                    "description": "Unique job name (add/remove)"
                },
                "cron_spec": {
                    "type": "string",
                    "description": "5-field cron spec, e.g. '0 7 * * *'"
                },
                "task_type": {
                    "type": "string",
                    "description": "Registered task type the job runs"
                },
                "description": {
                    "type": "string",
                    "description": "What this job is for"
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
            "add" => {
                let name = match arg_str(&call.args, "name") {
                    Some(n) if !n.trim().is_empty() => n,
                    _ => return ToolOutput::err(&call.id, "missing 'name' for add"),
                };
                let spec = match arg_str(&call.args, "cron_spec") {
                    Some(s) => s,
                    None => return ToolOutput::err(&call.id, "missing 'cron_spec' for add"),
                };
                let task_type = match arg_str(&call.args, "task_type") {
                    Some(t) => t,
                    None => {
                        return ToolOutput::err(
                            &call.id,
                            format!(
                                "missing 'task_type' for add; registered types: {}",
                                self.cron.task_types().join(", ")
                            ),
                        )
                    }
                };
                let description = arg_str(&call.args, "description").unwrap_or_default();
                match self.cron.add_job(&name, &spec, &task_type, &description) {
                    Ok(()) => ToolOutput::ok(
                        &call.id,
                        format!("Job '{name}' scheduled ({spec}, task type {task_type})."),
                    ),
                    Err(e) => ToolOutput::err(&call.id, e.to_string()),
                }
            }
            "remove" => {
                let name = match arg_str(&call.args, "name") {
                    Some(n) => n,
                    None => return ToolOutput::err(&call.id, "missing 'name' for remove"),
                };
                match self.cron.remove_job(&name) {
                    Ok(()) => ToolOutput::ok(&call.id, format!("Job '{name}' removed.")),
                    Err(e) => ToolOutput::err(&call.id, e.to_string()),
                }
            }
            "list" => match self.cron.jobs() {
                Ok(jobs) if jobs.is_empty() => {
                    ToolOutput::ok(&call.id, "No scheduled jobs.")
                }
                Ok(jobs) => {
                    let lines: Vec<String> = jobs
                        .iter()
                        .map(|j| {
                            format!(
                                "- {} ({}): {} — {}",
                                j.name, j.cron_spec, j.task_type, j.description
                            )
                        })
                        .collect();
                    ToolOutput::ok(&call.id, lines.join("\n"))
                }
                Err(e) => ToolOutput::err(&call.id, e.to_string()),
            },
            other => ToolOutput::err(&call.id, format!("unknown action: {other}")),
        }
    }
}
