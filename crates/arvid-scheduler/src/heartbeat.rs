// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The autonomous perceive → think → act cycle.
//!
//! The heartbeat itself knows nothing about mail, plans, or models — it
//! drives an injected [`Brain`] capability and enforces the cycle
//! invariants: singleton execution (an atomic busy flag), skip on empty
//! perception, the idle sentinel, and a hard per-cycle timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Decision sentinel: the brain concluded nothing needs doing.
pub const IDLE_SENTINEL: &str = "STATUS: IDLE";

/// Hard ceiling for one perceive → think → act cycle.
const CYCLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Domain capability the heartbeat drives.
#[async_trait]
pub trait Brain: Send + Sync {
    /// Snapshot of the environment (unread mail counts, pending plans,
    /// time of day, ...).  An empty snapshot skips the cycle.
    async fn collect_env(&self) -> anyhow::Result<String>;
    /// Decide on the snapshot: either [`IDLE_SENTINEL`] or an executable
    /// decision.
    async fn think(&self, snapshot: &str) -> anyhow::Result<String>;
    async fn execute_decision(&self, decision: &str) -> anyhow::Result<()>;
    /// The 07:00 variant; delivery of the briefing is the brain's concern.
    async fn generate_morning_briefing(&self) -> anyhow::Result<()>;
}

/// Outcome of one tick, mostly for tests and status display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A previous cycle is still running.
    Busy,
    /// Empty environment snapshot; nothing to perceive.
    EmptyEnv,
    /// The brain decided to stay idle.
    Idle,
    /// A decision was executed.
    Acted,
    /// The cycle hit the timeout or an error.
    Failed,
}

type CompletionCallback = Box<dyn Fn(TickOutcome) + Send + Sync>;

pub struct Heartbeat {
    brain: Arc<dyn Brain>,
    is_thinking: AtomicBool,
    timeout: Duration,
    on_completion: Option<CompletionCallback>,
}

impl Heartbeat {
    pub fn new(brain: Arc<dyn Brain>) -> Self {
        Self {
            brain,
            is_thinking: AtomicBool::new(false),
            timeout: CYCLE_TIMEOUT,
            on_completion: None,
        }
    }

    /// Override the cycle timeout (tests use short ones).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Completion callback fired after every finished tick (used by the
    /// CLI to repaint its prompt).
    pub fn on_completion(mut self, cb: impl Fn(TickOutcome) + Send + Sync + 'static) -> Self {
        self.on_completion = Some(Box::new(cb));
        self
    }

    /// One heartbeat tick.  Returns immediately when a cycle is already in
    /// flight.
    pub async fn tick(&self) -> TickOutcome {
        if self.is_thinking.swap(true, Ordering::SeqCst) {
            info!("brain is busy; skipping heartbeat tick");
            return TickOutcome::Busy;
        }

        let outcome = match tokio::time::timeout(self.timeout, self.cycle()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("heartbeat cycle timed out");
                TickOutcome::Failed
            }
        };

        self.is_thinking.store(false, Ordering::SeqCst);
        if let Some(cb) = &self.on_completion {
            cb(outcome);
        }
        outcome
    }

    /// The 07:00 briefing variant, guarded by the same busy flag.
    pub async fn morning_briefing(&self) -> TickOutcome {
        if self.is_thinking.swap(true, Ordering::SeqCst) {
            info!("brain is busy; skipping morning briefing");
            return TickOutcome::Busy;
        }
        let outcome =
            match tokio::time::timeout(self.timeout, self.brain.generate_morning_briefing()).await
            {
                Ok(Ok(())) => TickOutcome::Acted,
                Ok(Err(e)) => {
                    warn!(error = %e, "morning briefing failed");
                    TickOutcome::Failed
                }
                Err(_) => {
                    warn!("morning briefing timed out");
                    TickOutcome::Failed
                }
            };
        self.is_thinking.store(false, Ordering::SeqCst);
        if let Some(cb) = &self.on_completion {
            cb(outcome);
        }
        outcome
    }

    async fn cycle(&self) -> TickOutcome {
        let snapshot = match self.brain.collect_env().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "perception failed");
                return TickOutcome::Failed;
            }
        };
        if snapshot.trim().is_empty() {
            debug!("empty environment snapshot; skipping cycle");
            return TickOutcome::EmptyEnv;
        }

        let decision = match self.brain.think(&snapshot).await {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "thinking failed");
                return TickOutcome::Failed;
            }
        };
        if decision.trim().starts_with(IDLE_SENTINEL) {
            debug!("brain decided to stay idle");
            return TickOutcome::Idle;
        }

        match self.brain.execute_decision(&decision).await {
            Ok(()) => TickOutcome::Acted,
            Err(e) => {
                warn!(error = %e, "decision execution failed");
                TickOutcome::Failed
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
