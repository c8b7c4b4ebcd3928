// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Time-based task dispatch with persisted job definitions.
//!
//! Jobs name a `task_type` that must exist in the task registry; the
//! definition `{name, spec, task_type, description}` is persisted so
//! `load_jobs` can replay it on the next startup.  Each installed job runs
//! in its own loop task: firings of one job are serialized (the loop awaits
//! the run before sleeping again), different jobs overlap freely.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use cron::Schedule;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A runnable task type that cron jobs can reference by name.
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self) -> anyhow::Result<()>;
}

/// Persisted cron job definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CronJob {
    /// Unique job name; re-adding an existing name replaces the old entry.
    pub name: String,
    /// 5-field cron spec (minute hour day-of-month month day-of-week).
    pub cron_spec: String,
    /// Must name a registered [`ScheduledTask`].
    pub task_type: String,
    pub description: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid cron spec '{0}': {1}")]
    InvalidSpec(String, String),
    #[error("unknown task type '{0}'")]
    UnknownTaskType(String),
    #[error("no job named '{0}'")]
    UnknownJob(String),
    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

// ─── Job persistence ──────────────────────────────────────────────────────────

/// SQLite-backed job definitions; shares the agent's state database file on
/// its own connection.
pub struct CronStore {
    conn: Mutex<Connection>,
}

impl CronStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cron_jobs (
                name        TEXT PRIMARY KEY,
                cron_spec   TEXT NOT NULL,
                task_type   TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT ''
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn upsert(&self, job: &CronJob) -> Result<(), SchedulerError> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO cron_jobs (name, cron_spec, task_type, description) \
             VALUES (?1, ?2, ?3, ?4)",
            params![job.name, job.cron_spec, job.task_type, job.description],
        )?;
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<bool, SchedulerError> {
        let conn = self.lock();
        let n = conn.execute("DELETE FROM cron_jobs WHERE name = ?1", params![name])?;
        Ok(n > 0)
    }

    pub fn all(&self) -> Result<Vec<CronJob>, SchedulerError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT name, cron_spec, task_type, description FROM cron_jobs ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(CronJob {
                name: row.get(0)?,
                cron_spec: row.get(1)?,
                task_type: row.get(2)?,
                description: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|p| p.into_inner())
    }
}

// ─── Scheduler ────────────────────────────────────────────────────────────────

pub struct CronScheduler {
    registry: Mutex<HashMap<String, Arc<dyn ScheduledTask>>>,
    store: CronStore,
    entries: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl CronScheduler {
    pub fn new(store: CronStore) -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            store,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register a task type jobs can reference.
    pub fn register_task(&self, task: Arc<dyn ScheduledTask>) {
        let mut reg = self.registry.lock().unwrap_or_else(|p| p.into_inner());
        reg.insert(task.name().to_string(), task);
    }

    pub fn task_types(&self) -> Vec<String> {
        let reg = self.registry.lock().unwrap_or_else(|p| p.into_inner());
        let mut names: Vec<String> = reg.keys().cloned().collect();
        names.sort();
        names
    }

    /// Validate, persist and install a job.  A job with the same name
    /// replaces the old entry (the old loop is stopped first).
    pub fn add_job(
        &self,
        name: &str,
        spec: &str,
        task_type: &str,
        description: &str,
    ) -> Result<(), SchedulerError> {
        let schedule = parse_spec(spec)?;
        let task = self
            .task(task_type)
            .ok_or_else(|| SchedulerError::UnknownTaskType(task_type.to_string()))?;

        let job = CronJob {
            name: name.to_string(),
            cron_spec: spec.to_string(),
            task_type: task_type.to_string(),
            description: description.to_string(),
        };
        self.store.upsert(&job)?;
        self.install(&job.name, schedule, task);
        info!(job = name, spec, task_type, "cron job added");
        Ok(())
    }

    /// Remove a job from the engine and from persistence.
    pub fn remove_job(&self, name: &str) -> Result<(), SchedulerError> {
        let removed = self.store.remove(name)?;
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(handle) = entries.remove(name) {
            handle.abort();
        } else if !removed {
            return Err(SchedulerError::UnknownJob(name.to_string()));
        }
        info!(job = name, "cron job removed");
        Ok(())
    }

    /// Replay persisted jobs on startup.  Jobs naming an unknown task type
    /// are skipped with a warning (their definition stays persisted so a
    /// later version that registers the type picks them up again).
    pub fn load_jobs(&self) -> Result<usize, SchedulerError> {
        let mut installed = 0;
        for job in self.store.all()? {
            let schedule = match parse_spec(&job.cron_spec) {
                Ok(s) => s,
                Err(e) => {
                    warn!(job = %job.name, error = %e, "persisted cron spec invalid; skipping");
                    continue;
                }
            };
            match self.task(&job.task_type) {
                Some(task) => {
                    self.install(&job.name, schedule, task);
                    installed += 1;
                }
                None => {
                    warn!(
                        job = %job.name,
                        task_type = %job.task_type,
                        "unknown task type; skipping persisted job"
                    );
                }
            }
        }
        Ok(installed)
    }

    /// Trigger one job immediately, off schedule, and wait for it.
    pub async fn run_job_now(&self, name: &str) -> Result<(), SchedulerError> {
        let job = self
            .store
            .all()?
            .into_iter()
            .find(|j| j.name == name)
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;
        let task = self
            .task(&job.task_type)
            .ok_or_else(|| SchedulerError::UnknownTaskType(job.task_type.clone()))?;
        if let Err(e) = task.run().await {
            warn!(job = name, error = %e, "manual job run failed");
        }
        Ok(())
    }

    pub fn jobs(&self) -> Result<Vec<CronJob>, SchedulerError> {
        self.store.all()
    }

    /// Stop every installed entry.  Running firings are aborted at their
    /// next await point; persisted definitions are untouched.
    pub fn stop(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        for (name, handle) in entries.drain() {
            debug!(job = %name, "stopping cron entry");
            handle.abort();
        }
    }

    fn task(&self, task_type: &str) -> Option<Arc<dyn ScheduledTask>> {
        let reg = self.registry.lock().unwrap_or_else(|p| p.into_inner());
        reg.get(task_type).cloned()
    }

    fn install(&self, name: &str, schedule: Schedule, task: Arc<dyn ScheduledTask>) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(old) = entries.remove(name) {
            old.abort();
        }
        let job_name = name.to_string();
        let handle = tokio::spawn(async move {
            loop {
                let next = match schedule.upcoming(Utc).next() {
                    Some(t) => t,
                    None => break,
                };
                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
                debug!(job = %job_name, "cron firing");
                if let Err(e) = task.run().await {
                    warn!(job = %job_name, error = %e, "cron job failed");
                }
            }
        });
        entries.insert(name.to_string(), handle);
    }
}

/// Parse a 5-field cron spec.  The `cron` crate expects a seconds field, so
/// a plain 5-field spec gets `0` prepended; 6- and 7-field specs pass
/// through for users who want second precision.
fn parse_spec(spec: &str) -> Result<Schedule, SchedulerError> {
    let fields = spec.split_whitespace().count();
    let normalized = if fields == 5 {
        format!("0 {spec}")
    } else {
        spec.to_string()
    };
    Schedule::from_str(&normalized)
        .map_err(|e| SchedulerError::InvalidSpec(spec.to_string(), e.to_string()))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
