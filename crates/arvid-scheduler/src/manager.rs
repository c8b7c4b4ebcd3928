// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! One manager over the cron engine, the worker pool, the background-task
//! table and the heartbeat.
//!
//! The manager installs the two built-in entries itself — the periodic
//! heartbeat and the daily morning briefing — and owns the stop order:
//! cron first (no new firings), then the pool (drain the queue), then the
//! workers join.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use arvid_config::SchedulerConfig;

use crate::background::{BackgroundTaskManager, TaskNotification};
use crate::cron_engine::{CronScheduler, CronStore, ScheduledTask, SchedulerError};
use crate::heartbeat::{Brain, Heartbeat};
use crate::pool::{Job, SubmitError, WorkerPool};

const HEARTBEAT_JOB: &str = "heartbeat";
const BRIEFING_JOB: &str = "morning_briefing";

/// Adapter: the heartbeat tick as a cron task type.
struct HeartbeatTask {
    heartbeat: Arc<Heartbeat>,
}

#[async_trait]
impl ScheduledTask for HeartbeatTask {
    fn name(&self) -> &str {
        HEARTBEAT_JOB
    }
    async fn run(&self) -> anyhow::Result<()> {
        self.heartbeat.tick().await;
        Ok(())
    }
}

/// Adapter: the 07:00 briefing as a cron task type.
struct BriefingTask {
    heartbeat: Arc<Heartbeat>,
}

#[async_trait]
impl ScheduledTask for BriefingTask {
    fn name(&self) -> &str {
        BRIEFING_JOB
    }
    async fn run(&self) -> anyhow::Result<()> {
        self.heartbeat.morning_briefing().await;
        Ok(())
    }
}

pub struct SchedulerManager {
    cron: Arc<CronScheduler>,
    pool: Option<WorkerPool>,
    background: Arc<BackgroundTaskManager>,
    heartbeat: Arc<Heartbeat>,
}

impl SchedulerManager {
    /// Build the manager, register the built-in task types, replay
    /// persisted jobs and install the default heartbeat + briefing
    /// entries.  Returns the background-task notification receiver for the
    /// front-end to select on.
    pub fn start(
        cfg: &SchedulerConfig,
        db_path: &Path,
        brain: Arc<dyn Brain>,
        install_heartbeat: bool,
    ) -> anyhow::Result<(Self, mpsc::Receiver<TaskNotification>)> {
        let store = CronStore::open(db_path)?;
        let cron = Arc::new(CronScheduler::new(store));
        let heartbeat = Arc::new(Heartbeat::new(brain));

        cron.register_task(Arc::new(HeartbeatTask {
            heartbeat: Arc::clone(&heartbeat),
        }));
        cron.register_task(Arc::new(BriefingTask {
            heartbeat: Arc::clone(&heartbeat),
        }));

        if let Err(e) = cron.load_jobs() {
            warn!(error = %e, "replaying persisted cron jobs failed");
        }

        if install_heartbeat {
            cron.add_job(
                HEARTBEAT_JOB,
                &cfg.heartbeat_spec,
                HEARTBEAT_JOB,
                "autonomous perceive/think/act cycle",
            )?;
            cron.add_job(
                BRIEFING_JOB,
                &cfg.briefing_spec,
                BRIEFING_JOB,
                "daily morning briefing",
            )?;
        }

        let pool = WorkerPool::start(cfg.workers, cfg.queue_capacity);
        let (background, notify_rx) = BackgroundTaskManager::new(cfg.queue_capacity);

        Ok((
            Self {
                cron,
                pool: Some(pool),
                background: Arc::new(background),
                heartbeat,
            },
            notify_rx,
        ))
    }

    /// Shared handle for tools that add or remove jobs.
    pub fn cron(&self) -> Arc<CronScheduler> {
        Arc::clone(&self.cron)
    }

    /// Shared handle for tools that track fire-and-forget work.
    pub fn background(&self) -> Arc<BackgroundTaskManager> {
        Arc::clone(&self.background)
    }

    pub fn heartbeat(&self) -> &Arc<Heartbeat> {
        &self.heartbeat
    }

    /// Submit a one-shot job to the worker pool.
    pub fn submit(&self, job: Box<dyn Job>) -> Result<(), SubmitError> {
        match &self.pool {
            Some(pool) => pool.submit(job),
            None => Err(SubmitError::Stopped),
        }
    }

    pub fn add_job(
        &self,
        name: &str,
        spec: &str,
        task_type: &str,
        description: &str,
    ) -> Result<(), SchedulerError> {
        self.cron.add_job(name, spec, task_type, description)
    }

    pub fn remove_job(&self, name: &str) -> Result<(), SchedulerError> {
        self.cron.remove_job(name)
    }

    /// Cooperative shutdown: stop cron firings, then drain and join the
    /// pool.
    pub async fn stop(mut self) {
        self.cron.stop();
        if let Some(pool) = self.pool.take() {
            pool.stop().await;
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
