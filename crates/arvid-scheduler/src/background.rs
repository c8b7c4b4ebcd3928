// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Fire-and-forget tasks with status tracking.
//!
//! Distinct from the worker pool: tools that want async work they can
//! query later register it here and get a monotonic id back.  Completions
//! push a notification onto a channel that consumers (CLI, heartbeat)
//! select on to inject "task finished" notices between turns.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Success,
    Failed,
}

#[derive(Debug, Clone)]
pub struct BackgroundTask {
    pub id: i64,
    /// Human-readable description of what was launched.
    pub command: String,
    pub status: TaskStatus,
    pub result: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Pushed onto the notify channel when a task completes.
#[derive(Debug, Clone)]
pub struct TaskNotification {
    pub id: i64,
    pub command: String,
    pub status: TaskStatus,
    pub result: String,
}

pub struct BackgroundTaskManager {
    next_id: AtomicI64,
    tasks: Arc<Mutex<HashMap<i64, BackgroundTask>>>,
    notify_tx: mpsc::Sender<TaskNotification>,
}

impl BackgroundTaskManager {
    /// Build the manager and the notification receiver the consumer
    /// selects on.
    pub fn new(notify_capacity: usize) -> (Self, mpsc::Receiver<TaskNotification>) {
        let (notify_tx, notify_rx) = mpsc::channel(notify_capacity.max(1));
        (
            Self {
                next_id: AtomicI64::new(1),
                tasks: Arc::new(Mutex::new(HashMap::new())),
                notify_tx,
            },
            notify_rx,
        )
    }

    /// Launch `fut` in the background and return its task id immediately.
    pub fn add_task<F>(&self, command: &str, fut: F) -> i64
    where
        F: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let task = BackgroundTask {
            id,
            command: command.to_string(),
            status: TaskStatus::Running,
            result: String::new(),
            start_time: Utc::now(),
            end_time: None,
        };
        lock(&self.tasks).insert(id, task);
        debug!(id, command, "background task started");

        let tasks = Arc::clone(&self.tasks);
        let notify = self.notify_tx.clone();
        let command = command.to_string();
        tokio::spawn(async move {
            // Run in a child task so a panic is caught as a JoinError
            // instead of unwinding into the bookkeeping below.
            let outcome = match tokio::spawn(fut).await {
                Ok(Ok(result)) => (TaskStatus::Success, result),
                Ok(Err(e)) => (TaskStatus::Failed, e.to_string()),
                Err(e) => (TaskStatus::Failed, format!("task panicked: {e}")),
            };

            {
                let mut tasks = lock(&tasks);
                if let Some(task) = tasks.get_mut(&id) {
                    task.status = outcome.0;
                    task.result = outcome.1.clone();
                    task.end_time = Some(Utc::now());
                }
            }

            let note = TaskNotification {
                id,
                command,
                status: outcome.0,
                result: outcome.1,
            };
            if notify.try_send(note).is_err() {
                warn!(id, "notification channel full; completion notice dropped");
            }
        });
        id
    }

    pub fn get(&self, id: i64) -> Option<BackgroundTask> {
        lock(&self.tasks).get(&id).cloned()
    }

    /// All tracked tasks, newest first.
    pub fn list(&self) -> Vec<BackgroundTask> {
        let mut tasks: Vec<BackgroundTask> = lock(&self.tasks).values().cloned().collect();
        tasks.sort_by(|a, b| b.id.cmp(&a.id));
        tasks
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
