// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `task_planner` — the single entry point for multi-step plans.
//!
//! One tool multiplexing five operations (`create`, `get`, `update`,
//! `append`, `finish`) keeps the model's tool list short and mirrors how
//! the plan state machine is actually used: always one plan, always
//! through the same handle.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use arvid_planner::{describe, PlanStore};

use crate::coerce::{arg_str, arg_u32};
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct TaskPlannerTool {
    pub store: Arc<PlanStore>,
}

#[async_trait]
impl Tool for TaskPlannerTool {
    fn name(&self) -> &str {
        "task_planner"
    }

    fn description(&self) -> &str {
        "Manage the active multi-step plan. Actions: create (goal + ';'-separated\n\
         steps), get (show the plan), update (set one step's status and result),\n\
         append (add steps at the end), finish (archive; only when every step is\n\
         completed, skipped, or failed). Only one plan can be active at a time."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["create", "get", "update", "append", "finish"],
                    "description": "Plan operation to perform"
                },
                "goal": {
                    "type": "string",
                    "description": "Plan goal (required for create)"
                },
                "steps": {
                    "type": "string",
                    "description": "';'-separated step descriptions (create/append)"
                },
                "step_id": {
                    "type": "integer",
                    "description": "1-based step id (required for update)"
                },
                "status": {
                    "type": "string",
                    "enum": ["pending", "in_progress", "completed", "skipped", "failed"],
                    "description": "New step status (required for update)"
                },
                "result": {
                    "type": "string",
                    "description": "Step outcome; appended to any existing result"
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
            "create" => {
                let goal = match arg_str(&call.args, "goal") {
                    Some(g) if !g.trim().is_empty() => g,
                    _ => return ToolOutput::err(&call.id, "missing 'goal' for create"),
                };
                let steps = match arg_str(&call.args, "steps") {
                    Some(s) if !s.trim().is_empty() => s,
                    _ => return ToolOutput::err(&call.id, "missing 'steps' for create"),
                };
                match self.store.create(&goal, &steps) {
                    Ok(plan) => ToolOutput::ok(
                        &call.id,
                        format!("Plan created with {} steps.\n{}", plan.steps.len(), plan.pretty()),
                    ),
                    Err(e) => ToolOutput::err(&call.id, e.to_string()),
                }
            }
            "get" => ToolOutput::ok(&call.id, describe(&self.store)),
            "update" => {
                let step_id = match arg_u32(&call.args, "step_id") {
                    Some(id) => id,
                    None => return ToolOutput::err(&call.id, "missing 'step_id' for update"),
                };
                let status = match arg_str(&call.args, "status") {
                    Some(s) => s,
                    None => return ToolOutput::err(&call.id, "missing 'status' for update"),
                };
                let result = arg_str(&call.args, "result").unwrap_or_default();
                match self.store.update_step(step_id, &status, &result) {
                    Ok(plan) => ToolOutput::ok(
                        &call.id,
                        format!("Step {step_id} updated.\n{}", plan.pretty()),
                    ),
                    Err(e) => ToolOutput::err(&call.id, e.to_string()),
                }
            }
            "append" => {
                let steps = match arg_str(&call.args, "steps") {
                    Some(s) if !s.trim().is_empty() => s,
                    _ => return ToolOutput::err(&call.id, "missing 'steps' for append"),
                };
                match self.store.append_steps(&steps) {
                    Ok(plan) => ToolOutput::ok(
                        &call.id,
                        format!("Steps appended.\n{}", plan.pretty()),
                    ),
                    Err(e) => ToolOutput::err(&call.id, e.to_string()),
                }
            }
            "finish" => match self.store.finish() {
                Ok(archived) => ToolOutput::ok(
                    &call.id,
                    format!("Plan finished and archived to {}.", archived.display()),
                ),
                Err(e) => ToolOutput::err(&call.id, e.to_string()),
            },
            other => ToolOutput::err(&call.id, format!("unknown action: {other}")),
        }
    }
}
