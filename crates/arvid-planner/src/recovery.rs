// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Resumption prompt synthesis.
//!
//! After a restart, the agent's pre-flight step calls
//! [`build_recovery_prompt`]; a `Some` result is injected as a transient
//! system message so the model resumes the interrupted plan
//! deterministically instead of starting over.

use crate::plan::StepStatus;
use crate::store::PlanStore;

/// Check for a pending plan and synthesize the recovery prompt.
///
/// Returns `None` when no lock is held or no plan file exists.  The prompt
/// enumerates completed results (labeled as cached so the model reuses them
/// instead of re-running steps), the open steps with their status icons,
/// and names the first pending step as the next action.
pub fn build_recovery_prompt(store: &PlanStore) -> Option<String> {
    if !store.lock().exists() {
        return None;
    }
    let plan = store.load()?;

    let mut out = String::new();
    out.push_str("[TASK RECOVERY] An interrupted plan is in progress. Resume it now.\n\n");
    out.push_str(&format!("Goal: {}\n", plan.goal));
    out.push_str(&format!(
        "Progress: {}/{} steps completed\n",
        plan.completed_count(),
        plan.steps.len()
    ));

    let completed: Vec<_> = plan
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Completed)
        .collect();
    if !completed.is_empty() {
        out.push_str("\nCompleted steps (results cached — do NOT re-execute):\n");
        for step in completed {
            let result = if step.result.is_empty() {
                "(no recorded result)"
            } else {
                step.result.as_str()
            };
            out.push_str(&format!(
                "  ✅ [{}] {} → cached: {}\n",
                step.id, step.description, result
            ));
        }
    }

    let open: Vec<_> = plan
        .steps
        .iter()
        .filter(|s| !s.status.is_terminal())
        .collect();
    if !open.is_empty() {
        out.push_str("\nRemaining steps:\n");
        for step in &open {
            out.push_str(&format!(
                "  {} [{}] {}\n",
                step.status.icon(),
                step.id,
                step.description
            ));
        }
    }

    if let Some(next) = plan.first_pending() {
        out.push_str(&format!("\nNext step: [{}] {}\n", next.id, next.description));
    }

    out.push_str(
        "\nDirectives:\n\
         - Do not re-execute completed steps; use their cached results.\n\
         - After finishing each step, call task_planner update with its result.\n\
         - Call task_planner finish only when every step is completed, skipped, or failed.\n",
    );
    Some(out)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn no_lock_means_no_prompt() {
        let dir = TempDir::new().unwrap();
        let store = PlanStore::new(dir.path().join("tasks"));
        assert!(build_recovery_prompt(&store).is_none());
    }

    #[test]
    fn fresh_plan_names_first_step_as_next() {
        let dir = TempDir::new().unwrap();
        let store = PlanStore::new(dir.path().join("tasks"));
        store.create("Prep talk", "outline;draft;review").unwrap();

        let prompt = build_recovery_prompt(&store).unwrap();
        assert!(prompt.contains("Goal: Prep talk"));
        assert!(prompt.contains("0/3 steps completed"));
        assert!(prompt.contains("Next step: [1] outline"));
        assert!(!prompt.contains("cached:"), "nothing completed yet");
    }

    #[test]
    fn completed_results_are_labeled_cached() {
        let dir = TempDir::new().unwrap();
        let store = PlanStore::new(dir.path().join("tasks"));
        store.create("g", "outline;draft").unwrap();
        store.update_step(1, "completed", "three main sections").unwrap();

        let prompt = build_recovery_prompt(&store).unwrap();
        assert!(prompt.contains("1/2 steps completed"));
        assert!(prompt.contains("cached: three main sections"));
        assert!(prompt.contains("Next step: [2] draft"));
        assert!(prompt.contains("do NOT re-execute"));
    }

    #[test]
    fn open_steps_carry_icons() {
        let dir = TempDir::new().unwrap();
        let store = PlanStore::new(dir.path().join("tasks"));
        store.create("g", "a;b").unwrap();
        store.update_step(1, "in_progress", "").unwrap();

        let prompt = build_recovery_prompt(&store).unwrap();
        assert!(prompt.contains("🔄 [1] a"));
        assert!(prompt.contains("⏳ [2] b"));
    }

    #[test]
    fn directives_always_present() {
        let dir = TempDir::new().unwrap();
        let store = PlanStore::new(dir.path().join("tasks"));
        store.create("g", "a").unwrap();
        let prompt = build_recovery_prompt(&store).unwrap();
        assert!(prompt.contains("task_planner update"));
        assert!(prompt.contains("task_planner finish"));
    }

    #[test]
    fn lock_without_plan_file_yields_none() {
        let dir = TempDir::new().unwrap();
        let store = PlanStore::new(dir.path().join("tasks"));
        store.lock().acquire().unwrap();
        assert!(build_recovery_prompt(&store).is_none());
    }
}
