// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Planning,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
    Failed,
}

impl StepStatus {
    /// Parse a status string from a tool call (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" | "in-progress" | "running" => Some(Self::InProgress),
            "completed" | "done" => Some(Self::Completed),
            "skipped" | "skip" => Some(Self::Skipped),
            "failed" | "fail" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    /// Status icon used in pretty-printed plans and the recovery prompt.
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Pending => "⏳",
            Self::InProgress => "🔄",
            Self::Completed => "✅",
            Self::Skipped => "⏭️",
            Self::Failed => "❌",
        }
    }

    /// Terminal statuses permit `finish`; pending and in-progress block it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped | Self::Failed)
    }
}

/// One step of a plan.  Ids are 1-based and dense.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStep {
    pub id: u32,
    pub description: String,
    pub status: StepStatus,
    #[serde(default)]
    pub result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPlan {
    pub id: String,
    pub goal: String,
    pub steps: Vec<TaskStep>,
    pub created_at: DateTime<Utc>,
    pub status: PlanStatus,
}

impl TaskPlan {
    /// Build a plan from a goal and a `;`-separated step list, all steps
    /// pending and the plan immediately in progress.
    pub fn new(goal: impl Into<String>, steps_str: &str) -> Self {
        let steps: Vec<TaskStep> = steps_str
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(i, desc)| TaskStep {
                id: (i + 1) as u32,
                description: desc.to_string(),
                status: StepStatus::Pending,
                result: String::new(),
            })
            .collect();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            goal: goal.into(),
            steps,
            created_at: Utc::now(),
            status: PlanStatus::InProgress,
        }
    }

    /// Append steps from a `;`-separated list at the tail, continuing the
    /// id sequence.  Appended steps are pending and block `finish` exactly
    /// like original ones.
    pub fn append_steps(&mut self, steps_str: &str) -> usize {
        let mut next_id = self.steps.len() as u32 + 1;
        let mut added = 0;
        for desc in steps_str.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            self.steps.push(TaskStep {
                id: next_id,
                description: desc.to_string(),
                status: StepStatus::Pending,
                result: String::new(),
            });
            next_id += 1;
            added += 1;
        }
        added
    }

    pub fn step_mut(&mut self, id: u32) -> Option<&mut TaskStep> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    pub fn completed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }

    pub fn is_all_terminal(&self) -> bool {
        self.steps.iter().all(|s| s.status.is_terminal())
    }

    /// Steps that still block `finish`, in id order.
    pub fn non_terminal_steps(&self) -> Vec<&TaskStep> {
        self.steps.iter().filter(|s| !s.status.is_terminal()).collect()
    }

    /// First step that has not started yet.
    pub fn first_pending(&self) -> Option<&TaskStep> {
        self.steps.iter().find(|s| s.status == StepStatus::Pending)
    }

    /// Human-readable rendering used by the `task_planner get` operation.
    pub fn pretty(&self) -> String {
        let mut out = format!(
            "Plan {} — {}\nCreated: {}\nProgress: {}/{} steps completed\n",
            self.id,
            self.goal,
            self.created_at.format("%Y-%m-%d %H:%M:%S"),
            self.completed_count(),
            self.steps.len()
        );
        for step in &self.steps {
            out.push_str(&format!(
                "  {} [{}] {}",
                step.status.icon(),
                step.id,
                step.description
            ));
            if !step.result.is_empty() {
                out.push_str(&format!(" — {}", step.result));
            }
            out.push('\n');
        }
        out
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
