// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::{BufRead, Write};
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tokio::sync::{mpsc, Mutex};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use arvid_config::Config;
use arvid_core::{Agent, AgentCallbacks};
use arvid_memory::MemoryManager;
use arvid_model::OpenAICompatProvider;
use arvid_planner::PlanStore;
use arvid_scheduler::{Brain, SchedulerManager, TaskNotification, TaskStatus, IDLE_SENTINEL};
use arvid_tools::builtin::{
    BackgroundTaskTool, MemorySearchTool, SaveMemoryTool, ScheduleTaskTool, TaskPlannerTool,
};
use arvid_tools::ToolRegistry;

use cli::{Cli, Commands};

/// The heartbeat and the interactive loop share one agent through this
/// slot; it stays empty only during the brief startup window before the
/// agent is constructed.
type AgentSlot = Arc<Mutex<Option<Agent>>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Arc::new(arvid_config::load(cli.config.as_deref())?);

    match cli.command {
        Some(Commands::ShowConfig) => {
            println!("{}", serde_yaml::to_string(&*config).unwrap_or_default());
            Ok(())
        }
        Some(Commands::Search { query, top_k }) => run_search(&config, &query, top_k).await,
        Some(Commands::Reindex) => run_reindex(&config).await,
        Some(Commands::Jobs) => run_jobs(&config),
        Some(Commands::Chat { message }) => run_chat(config, message).await,
        None => run_chat(config, None).await,
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "info" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ── One-shot maintenance commands ─────────────────────────────────────────────

async fn run_search(config: &Config, query: &str, top_k: Option<usize>) -> anyhow::Result<()> {
    let memory = MemoryManager::start(config).await?;
    let hits = match top_k {
        Some(k) => memory.memory_search_k(query, k).await?,
        None => memory.memory_search(query).await?,
    };
    if hits.is_empty() {
        println!("no results");
    }
    for hit in hits {
        println!(
            "[{:.2}] {}:{}-{}\n{}\n",
            hit.score, hit.file_path, hit.start_line, hit.end_line, hit.snippet
        );
    }
    memory.close().await;
    Ok(())
}

async fn run_reindex(config: &Config) -> anyhow::Result<()> {
    let memory = MemoryManager::start(config).await?;
    let n = memory.re_index().await?;
    println!(
        "re-indexed {n} file(s); {} chunk(s) total",
        memory.chunk_count()?
    );
    memory.close().await;
    Ok(())
}

fn run_jobs(config: &Config) -> anyhow::Result<()> {
    let store = arvid_scheduler::CronStore::open(&config.paths.db_file())?;
    let jobs = store.all()?;
    if jobs.is_empty() {
        println!("no scheduled jobs");
    }
    for job in jobs {
        println!(
            "{} ({}): {} — {}",
            job.name, job.cron_spec, job.task_type, job.description
        );
    }
    Ok(())
}

// ── The heartbeat brain ───────────────────────────────────────────────────────

/// Drives the perceive → think → act cycle through the shared agent.
struct AgentBrain {
    agent: AgentSlot,
    planner: Arc<PlanStore>,
    memory: Arc<MemoryManager>,
}

#[async_trait]
impl Brain for AgentBrain {
    async fn collect_env(&self) -> anyhow::Result<String> {
        if self.agent.lock().await.is_none() {
            // Startup window: nothing to drive yet.
            return Ok(String::new());
        }
        let mut lines = Vec::new();
        if let Some(plan) = self.planner.load() {
            lines.push(format!(
                "Pending plan: {} ({}/{} steps completed)",
                plan.goal,
                plan.completed_count(),
                plan.steps.len()
            ));
        }
        // An empty snapshot skips the cycle; only report when there is
        // something actionable to perceive.
        if lines.is_empty() {
            return Ok(String::new());
        }
        lines.push(format!(
            "Local time: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M")
        ));
        Ok(lines.join("\n"))
    }

    async fn think(&self, snapshot: &str) -> anyhow::Result<String> {
        let mut guard = self.agent.lock().await;
        let agent = guard.as_mut().ok_or_else(|| anyhow::anyhow!("agent not ready"))?;
        // One maintenance pass per heartbeat cycle: the minute stamp keys
        // the buffer-compaction dedup.
        let cycle_id = chrono::Utc::now().format("hb-%Y%m%d%H%M").to_string();
        if let Err(e) = agent.maintain(&cycle_id) {
            warn!(error = %e, "session maintenance failed");
        }
        agent
            .chat(&format!(
                "[heartbeat] Environment snapshot:\n{snapshot}\n\n\
                 If nothing needs doing right now, reply exactly '{IDLE_SENTINEL}'. \
                 Otherwise state the single next action to take."
            ))
            .await
    }

    async fn execute_decision(&self, decision: &str) -> anyhow::Result<()> {
        let mut guard = self.agent.lock().await;
        let agent = guard.as_mut().ok_or_else(|| anyhow::anyhow!("agent not ready"))?;
        agent
            .chat(&format!("[heartbeat] Carry out this action now: {decision}"))
            .await?;
        Ok(())
    }

    async fn generate_morning_briefing(&self) -> anyhow::Result<()> {
        let briefing = {
            let mut guard = self.agent.lock().await;
            let agent = guard.as_mut().ok_or_else(|| anyhow::anyhow!("agent not ready"))?;
            agent
                .chat(
                    "[heartbeat] Write a short morning briefing: today's date, \
                     any pending plan, and anything worth remembering from the \
                     last few days of memory.",
                )
                .await?
        };
        if let Err(e) = self
            .memory
            .write_today(&format!("morning briefing: {briefing}"))
        {
            warn!(error = %e, "failed to log morning briefing");
        }
        Ok(())
    }
}

// ── Chat front-end ────────────────────────────────────────────────────────────

async fn run_chat(config: Arc<Config>, one_shot: Option<String>) -> anyhow::Result<()> {
    let memory = Arc::new(MemoryManager::start(&config).await?);
    let planner = Arc::new(PlanStore::new(config.paths.tasks_dir()));

    let api_key = config
        .model
        .api_key_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok());
    let model = Arc::new(OpenAICompatProvider::new(
        config.model.name.clone(),
        &config.model.endpoint,
        api_key,
    ));

    // The scheduler needs a brain before the agent exists; the slot breaks
    // the cycle and is filled right after construction.
    let agent_slot: AgentSlot = Arc::new(Mutex::new(None));
    let brain = AgentBrain {
        agent: Arc::clone(&agent_slot),
        planner: Arc::clone(&planner),
        memory: Arc::clone(&memory),
    };
    let (scheduler, mut notify_rx) = SchedulerManager::start(
        &config.scheduler,
        &config.paths.db_file(),
        Arc::new(brain),
        config.agent.heartbeat,
    )?;

    let mut registry = ToolRegistry::new();
    registry.register(MemorySearchTool {
        memory: Arc::clone(&memory),
    });
    registry.register(SaveMemoryTool {
        memory: Arc::clone(&memory),
    });
    registry.register(TaskPlannerTool {
        store: Arc::clone(&planner),
    });
    registry.register(ScheduleTaskTool {
        cron: scheduler.cron(),
    });
    registry.register(BackgroundTaskTool {
        background: scheduler.background(),
    });

    let callbacks = AgentCallbacks::new()
        .on_delta(|chunk| {
            print!("{chunk}");
            let _ = std::io::stdout().flush();
        })
        .on_tool_call(|name, _args| {
            println!("\n· running {name} …");
        });

    let mut agent = Agent::new(
        &config,
        model,
        Arc::new(registry),
        Arc::clone(&memory),
        Arc::clone(&planner),
        callbacks,
    );
    // A session left idle across the downtime gets summarized before the
    // first turn touches it.
    if let Err(e) = agent.summarize_on_startup().await {
        warn!(error = %e, "startup summarization failed; continuing");
    }
    *agent_slot.lock().await = Some(agent);

    let result = match one_shot {
        Some(message) => {
            let reply = chat_once(&agent_slot, &message).await?;
            println!("{reply}");
            Ok(())
        }
        None => repl(&agent_slot, &mut notify_rx).await,
    };

    scheduler.stop().await;
    memory.close().await;
    result
}

async fn chat_once(slot: &AgentSlot, message: &str) -> anyhow::Result<String> {
    let mut guard = slot.lock().await;
    let agent = guard
        .as_mut()
        .ok_or_else(|| anyhow::anyhow!("agent not ready"))?;
    agent.chat(message).await
}

/// Line-based interactive loop.  Background-task completions queued while
/// a turn ran are printed between turns.
async fn repl(
    slot: &AgentSlot,
    notify_rx: &mut mpsc::Receiver<TaskNotification>,
) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    println!("arvid ready — /quit to exit");

    loop {
        drain_notifications(notify_rx);

        print!("\nyou> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }

        print!("arvid> ");
        std::io::stdout().flush().ok();
        match chat_once(slot, line).await {
            // Deltas streamed via the callback; just terminate the line.
            Ok(_) => println!(),
            Err(e) => eprintln!("\nerror: {e:#}"),
        }
    }
    Ok(())
}

fn drain_notifications(notify_rx: &mut mpsc::Receiver<TaskNotification>) {
    while let Ok(note) = notify_rx.try_recv() {
        let status = match note.status {
            TaskStatus::Success => "done",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Running => "running",
        };
        println!("[background #{} {}] {}: {}", note.id, status, note.command, note.result);
    }
}
