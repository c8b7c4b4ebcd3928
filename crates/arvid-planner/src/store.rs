// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::warn;

use crate::lock::TaskLock;
use crate::plan::{StepStatus, TaskPlan};

/// Errors the planner surfaces to the tool layer.  Every variant renders a
/// message the model can read and act on — a rejected `create` or `finish`
/// is a conversation event, not a crash.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("a plan is already active; finish it before creating a new one")]
    PlanActive,
    #[error("no active plan")]
    NoPlan,
    #[error("no step with id {0}")]
    UnknownStep(u32),
    #[error("invalid step status '{0}' (expected pending|in_progress|completed|skipped|failed)")]
    InvalidStatus(String),
    #[error("cannot finish: steps still open:\n{0}")]
    UnfinishedSteps(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// File-backed plan storage under `<workspace>/tasks/`.
///
/// - `current_plan.json` — at most one, the active plan
/// - `task.lock` — presence means a plan is active
/// - `archive/plan_<id>_<ts>.json` — immutable once written
pub struct PlanStore {
    tasks_dir: PathBuf,
    lock: TaskLock,
}

impl PlanStore {
    pub fn new(tasks_dir: impl Into<PathBuf>) -> Self {
        let tasks_dir = tasks_dir.into();
        let lock = TaskLock::new(&tasks_dir);
        Self { tasks_dir, lock }
    }

    pub fn lock(&self) -> &TaskLock {
        &self.lock
    }

    fn current_path(&self) -> PathBuf {
        self.tasks_dir.join("current_plan.json")
    }

    /// Create a new plan with every step pending, write it atomically and
    /// acquire the task lock.  Rejected while another plan is active — the
    /// existing plan state is left untouched.
    pub fn create(&self, goal: &str, steps_str: &str) -> Result<TaskPlan, PlannerError> {
        if self.lock.exists() || self.current_path().exists() {
            return Err(PlannerError::PlanActive);
        }
        let plan = TaskPlan::new(goal, steps_str);
        self.write_atomic(&plan)?;
        if let Err(e) = self.lock.acquire() {
            // Roll the plan file back so a failed lock write cannot leave a
            // plan active without its lock.
            let _ = std::fs::remove_file(self.current_path());
            warn!(error = %e, "task lock acquisition failed");
            return Err(PlannerError::Io(std::io::Error::other(e.to_string())));
        }
        Ok(plan)
    }

    /// Load the current plan.  An unparseable plan file is treated as
    /// absent (with a warning) — state corruption must never take the agent
    /// down.
    pub fn load(&self) -> Option<TaskPlan> {
        let path = self.current_path();
        let text = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&text) {
            Ok(plan) => Some(plan),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "current plan unparseable; ignoring");
                None
            }
        }
    }

    /// Mutate exactly one step.  A non-empty `result` is appended to the
    /// step's existing result with a `"; "` joiner rather than replacing it.
    pub fn update_step(
        &self,
        step_id: u32,
        status: &str,
        result: &str,
    ) -> Result<TaskPlan, PlannerError> {
        let status = StepStatus::parse(status)
            .ok_or_else(|| PlannerError::InvalidStatus(status.to_string()))?;
        let mut plan = self.load().ok_or(PlannerError::NoPlan)?;
        let step = plan.step_mut(step_id).ok_or(PlannerError::UnknownStep(step_id))?;
        step.status = status;
        if !result.is_empty() {
            if step.result.is_empty() {
                step.result = result.to_string();
            } else {
                step.result = format!("{}; {}", step.result, result);
            }
        }
        self.write_atomic(&plan)?;
        Ok(plan)
    }

    /// Add steps at the tail of the active plan.
    pub fn append_steps(&self, steps_str: &str) -> Result<TaskPlan, PlannerError> {
        let mut plan = self.load().ok_or(PlannerError::NoPlan)?;
        plan.append_steps(steps_str);
        self.write_atomic(&plan)?;
        Ok(plan)
    }

    /// Archive the plan and release the lock — only when every step is
    /// terminal.  The refusal message enumerates the steps still open so
    /// the model knows exactly what to update first.
    pub fn finish(&self) -> Result<PathBuf, PlannerError> {
        let plan = self.load().ok_or(PlannerError::NoPlan)?;
        if !plan.is_all_terminal() {
            let open = plan
                .non_terminal_steps()
                .iter()
                .map(|s| format!("  {} [{}] {}", s.status.icon(), s.id, s.description))
                .collect::<Vec<_>>()
                .join("\n");
            return Err(PlannerError::UnfinishedSteps(open));
        }

        let archive_dir = self.tasks_dir.join("archive");
        std::fs::create_dir_all(&archive_dir)?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let dest = archive_dir.join(format!("plan_{}_{stamp}.json", plan.id));
        std::fs::write(&dest, serde_json::to_string_pretty(&plan)?)?;

        std::fs::remove_file(self.current_path())?;
        if let Err(e) = self.lock.release() {
            warn!(error = %e, "task lock release failed");
        }
        Ok(dest)
    }

    /// Write-replace so a crash mid-write can never leave a truncated plan.
    fn write_atomic(&self, plan: &TaskPlan) -> Result<(), PlannerError> {
        std::fs::create_dir_all(&self.tasks_dir)?;
        let tmp = self.tasks_dir.join("current_plan.json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(plan)?)?;
        std::fs::rename(&tmp, self.current_path())?;
        Ok(())
    }
}

/// Plan pretty-printer for the `get` operation, kept with the store so the
/// tool layer has a single entry point per operation.
pub fn describe(store: &PlanStore) -> String {
    match store.load() {
        Some(plan) => plan.pretty(),
        None => "No active plan.".to_string(),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanStatus;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> PlanStore {
        PlanStore::new(dir.path().join("tasks"))
    }

    #[test]
    fn create_writes_plan_and_lock() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let plan = s.create("Prep talk", "outline;draft;review").unwrap();
        assert_eq!(plan.steps.len(), 3);
        assert!(dir.path().join("tasks/current_plan.json").exists());
        assert!(dir.path().join("tasks/task.lock").exists());
        assert_eq!(s.load().unwrap().goal, "Prep talk");
    }

    #[test]
    fn second_create_is_rejected_without_touching_state() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.create("first", "a;b").unwrap();
        let err = s.create("second", "x").unwrap_err();
        assert!(matches!(err, PlannerError::PlanActive));
        // Original plan untouched.
        assert_eq!(s.load().unwrap().goal, "first");
    }

    #[test]
    fn update_step_appends_result_with_joiner() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.create("g", "a;b").unwrap();
        s.update_step(1, "completed", "part one").unwrap();
        let plan = s.update_step(1, "completed", "part two").unwrap();
        assert_eq!(plan.steps[0].result, "part one; part two");
        assert_eq!(plan.steps[0].status, StepStatus::Completed);
    }

    #[test]
    fn update_unknown_step_errors() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.create("g", "a").unwrap();
        assert!(matches!(
            s.update_step(9, "completed", ""),
            Err(PlannerError::UnknownStep(9))
        ));
    }

    #[test]
    fn update_invalid_status_errors() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.create("g", "a").unwrap();
        assert!(matches!(
            s.update_step(1, "bogus", ""),
            Err(PlannerError::InvalidStatus(_))
        ));
    }

    #[test]
    fn finish_refusal_enumerates_open_steps() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.create("g", "outline;draft;review").unwrap();
        s.update_step(1, "completed", "").unwrap();

        let err = s.finish().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("draft"));
        assert!(msg.contains("review"));
        assert!(!msg.contains("outline"), "terminal steps are not enumerated");
        // Plan and lock untouched by the refusal.
        assert!(s.lock().exists());
        assert!(s.load().is_some());
    }

    #[test]
    fn finish_archives_and_releases_lock() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let plan = s.create("g", "a;b").unwrap();
        s.update_step(1, "completed", "done").unwrap();
        s.update_step(2, "skipped", "").unwrap();

        let dest = s.finish().unwrap();
        assert!(dest.exists());
        assert!(dest
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(&format!("plan_{}", plan.id)));
        assert!(!s.lock().exists());
        assert!(s.load().is_none());

        // Archived plan is the full serialized plan.
        let text = std::fs::read_to_string(dest).unwrap();
        let archived: TaskPlan = serde_json::from_str(&text).unwrap();
        assert_eq!(archived.id, plan.id);
    }

    #[test]
    fn appended_steps_block_finish() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.create("g", "a").unwrap();
        s.update_step(1, "completed", "").unwrap();
        s.append_steps("late step").unwrap();
        assert!(matches!(s.finish(), Err(PlannerError::UnfinishedSteps(_))));
    }

    #[test]
    fn corrupt_plan_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        std::fs::create_dir_all(dir.path().join("tasks")).unwrap();
        std::fs::write(dir.path().join("tasks/current_plan.json"), "{broken").unwrap();
        assert!(s.load().is_none());
    }

    #[test]
    fn finish_without_plan_errors() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        assert!(matches!(s.finish(), Err(PlannerError::NoPlan)));
    }

    #[test]
    fn created_plan_is_in_progress() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let plan = s.create("g", "a").unwrap();
        assert_eq!(plan.status, PlanStatus::InProgress);
    }
}
