// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Background life of the agent.
//!
//! Two sub-engines share one manager but never share queues: the cron
//! scheduler dispatches recurring jobs by 5-field spec, and the worker pool
//! drains one-shot jobs submitted by tools.  The heartbeat is just a cron
//! entry whose task runs the perceive → think → act cycle, and the
//! background-task manager tracks fire-and-forget work with completion
//! notifications.

mod background;
mod cron_engine;
mod heartbeat;
mod manager;
mod pool;

pub use background::{BackgroundTask, BackgroundTaskManager, TaskNotification, TaskStatus};
pub use cron_engine::{CronJob, CronScheduler, CronStore, ScheduledTask, SchedulerError};
pub use heartbeat::{Brain, Heartbeat, TickOutcome, IDLE_SENTINEL};
pub use manager::SchedulerManager;
pub use pool::{Job, SubmitError, WorkerPool};
