// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Bounded concurrent background-job runner.
//!
//! N workers drain one shared bounded queue.  Submission never blocks: a
//! saturated queue returns [`SubmitError::QueueFull`] synchronously and the
//! producer handles the backpressure.  Each job runs in its own spawned
//! task so a panic is caught as a `JoinError` and logged — workers survive
//! every job failure mode.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A one-shot background job.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &str;
    async fn execute(&self) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("job queue full")]
    QueueFull,
    #[error("worker pool stopped")]
    Stopped,
}

pub struct WorkerPool {
    tx: Option<mpsc::Sender<Box<dyn Job>>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `workers` workers over a queue of `queue_capacity` slots.
    pub fn start(workers: usize, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Box<dyn Job>>(queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    loop {
                        // Hold the lock only for the receive so other
                        // workers keep draining while this job runs.
                        let job = { rx.lock().await.recv().await };
                        let job = match job {
                            Some(j) => j,
                            None => break,
                        };
                        let name = job.name().to_string();
                        debug!(worker_id, job = %name, "job started");
                        let run = tokio::spawn(async move { job.execute().await });
                        match run.await {
                            Ok(Ok(())) => debug!(worker_id, job = %name, "job finished"),
                            Ok(Err(e)) => warn!(worker_id, job = %name, error = %e, "job failed"),
                            Err(e) => {
                                // Panic inside the job; the worker lives on.
                                warn!(worker_id, job = %name, error = %e, "job panicked");
                            }
                        }
                    }
                    debug!(worker_id, "worker stopped");
                })
            })
            .collect();

        Self {
            tx: Some(tx),
            workers: handles,
        }
    }

    /// Non-blocking submission; the caller owns backpressure handling.
    pub fn submit(&self, job: Box<dyn Job>) -> Result<(), SubmitError> {
        let tx = self.tx.as_ref().ok_or(SubmitError::Stopped)?;
        tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Stopped,
        })
    }

    /// Cooperative stop: close the queue, then join the workers.  Jobs
    /// already queued are drained before the workers exit.
    pub async fn stop(mut self) {
        self.tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.await;
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
