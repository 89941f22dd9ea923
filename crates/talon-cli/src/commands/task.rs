// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `talon task list|show|submit|retry|cancel`
//!
//! `submit` goes through the same `send` RPC every chat transport uses,
//! with a `task:` dispatch-mode prefix so the live daemon's own
//! orchestrator picks it up — there is exactly one in-process
//! [`talon_orchestrator::TaskOrchestrator`] per running daemon, and this
//! CLI has no business constructing a second one alongside it.
//!
//! `list`/`show` read the task snapshot directly off disk: safe at any
//! time, since [`talon_storage::TaskStore`] always persists via
//! atomic rename.
//!
//! `retry`/`cancel` mutate that same snapshot directly, replaying the
//! orchestrator's own transition rules — but only when the daemon is
//! confirmed not running. Racing a live orchestrator's in-memory state with
//! an out-of-process file edit would let either side clobber the other's
//! next save.

use clap::{Args, Subcommand};

use talon_core::{Clock, SystemClock, TaskStatus};
use talon_storage::TaskStore;

use crate::client::{DaemonClient, LegacyRequest};
use crate::client_lifecycle::log_connection_error;
use crate::daemon_process;
use crate::output::format_time_ago;
use crate::table::{Column, Table};

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommand,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// List every task the orchestrator knows about.
    List,
    /// Show one task's full record.
    Show { id: String },
    /// Submit a new task to the orchestrator.
    Submit {
        /// The task prompt. Multiple words are joined with a single space.
        #[arg(trailing_var_arg = true, required = true)]
        text: Vec<String>,
        /// Session key to associate the task with (defaults to `cli`).
        #[arg(long)]
        session: Option<String>,
    },
    /// Re-queue a task that is done, failed, or cancelled.
    Retry { id: String },
    /// Cancel a queued or running task.
    Cancel { id: String },
}

pub async fn run(args: TaskArgs) -> anyhow::Result<()> {
    match args.command {
        TaskCommand::List => list(),
        TaskCommand::Show { id } => show(&id),
        TaskCommand::Submit { text, session } => submit(text.join(" "), session).await,
        TaskCommand::Retry { id } => retry(&id),
        TaskCommand::Cancel { id } => cancel(&id),
    }
}

fn open_store() -> anyhow::Result<TaskStore> {
    Ok(TaskStore::new(crate::env::data_dir()?))
}

fn list() -> anyhow::Result<()> {
    let store = open_store()?;
    let snapshot = store.load()?;

    if snapshot.tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }

    let mut table = Table::new(vec![
        Column::left("ID"),
        Column::status("STATUS"),
        Column::left("REPO"),
        Column::left("AGE").with_max(8),
        Column::left("TEXT").with_max(60),
    ]);
    for task in &snapshot.tasks {
        table.row(vec![
            task.id.short(8).to_string(),
            task.status.to_string(),
            task.repo_id.clone(),
            format_time_ago(task.created_at_ms),
            task.text.clone(),
        ]);
    }
    table.render(&mut std::io::stdout());
    Ok(())
}

fn show(id: &str) -> anyhow::Result<()> {
    let store = open_store()?;
    let snapshot = store.load()?;
    let Some(task) = snapshot.tasks.iter().find(|t| t.id == *id || t.id.short(8) == id) else {
        anyhow::bail!("no task with id {id}");
    };

    println!("id: {}", task.id);
    println!("status: {}", task.status);
    println!("repo: {}", task.repo_id);
    if let Some(session_key) = &task.session_key {
        println!("session: {session_key}");
    }
    if let Some(assigned) = &task.assigned_session {
        println!("assigned_session: {assigned}");
    }
    if let Some(branch) = &task.branch {
        println!("branch: {branch}");
    }
    if let Some(worktree) = &task.worktree_path {
        println!("worktree: {worktree}");
    }
    println!("retries: {}/{}", task.retry_count, task.max_retries);
    if task.escalation_required {
        println!("escalation_required: true");
    }
    if let Some(error) = &task.error {
        println!("error: {error}");
    }
    if let Some((pr_url, pr_title)) = task.latest_pull_request() {
        println!("pull_request: {pr_title} ({pr_url})");
    }
    if let Some(summary) = task.latest_summary() {
        println!("summary: {summary}");
    }
    if !task.children.is_empty() {
        let children: Vec<String> = task.children.iter().map(|c| c.short(8).to_string()).collect();
        println!("children: {}", children.join(", "));
    }
    println!("created: {}", format_time_ago(task.created_at_ms));
    Ok(())
}

async fn submit(text: String, session: Option<String>) -> anyhow::Result<()> {
    let session_key = session.unwrap_or_else(|| "cli".to_string());
    let message = format!("task: {text}");

    let client = match DaemonClient::for_action().await {
        Ok(c) => c,
        Err(e) => {
            log_connection_error(&e);
            return Err(e.into());
        }
    };

    let data = client.send_checked(&LegacyRequest::Send { session_key, message }).await?;
    match data.get("taskId").and_then(|v| v.as_str()) {
        Some(task_id) => println!("Queued task {task_id}."),
        None => anyhow::bail!("daemon accepted the message but did not route it to a task (is a repo configured?)"),
    }
    Ok(())
}

fn ensure_daemon_not_running() -> anyhow::Result<()> {
    let socket_path = daemon_process::daemon_socket()?;
    if daemon_process::probe_socket(&socket_path) {
        anyhow::bail!("talond is running; retry/cancel must go through the live orchestrator, not the CLI, while it's up");
    }
    Ok(())
}

fn retry(id: &str) -> anyhow::Result<()> {
    ensure_daemon_not_running()?;
    let store = open_store()?;
    let mut snapshot = store.load()?;
    let now_ms = SystemClock.now_ms();

    let Some(task) = snapshot.tasks.iter_mut().find(|t| t.id == *id || t.id.short(8) == id) else {
        anyhow::bail!("no task with id {id}");
    };
    if task.status == TaskStatus::Running {
        anyhow::bail!("task {id} is recorded as running; the daemon that owned it is not — investigate before retrying");
    }

    task.error = None;
    task.escalation_required = false;
    task.finished_at_ms = None;
    task.transition(TaskStatus::Queued, now_ms)?;

    store.save(&snapshot)?;
    println!("Task {id} re-queued; it will run on the next daemon start.");
    Ok(())
}

fn cancel(id: &str) -> anyhow::Result<()> {
    ensure_daemon_not_running()?;
    let store = open_store()?;
    let mut snapshot = store.load()?;
    let now_ms = SystemClock.now_ms();

    let Some(task) = snapshot.tasks.iter_mut().find(|t| t.id == *id || t.id.short(8) == id) else {
        anyhow::bail!("no task with id {id}");
    };

    match task.status {
        TaskStatus::Queued => task.transition(TaskStatus::Cancelled, now_ms)?,
        // No live worker exists to honor a cooperative cancel_requested flag
        // while the daemon is down, so a task still marked Running here is
        // necessarily orphaned by a crash; cancel it outright.
        TaskStatus::Running => task.transition(TaskStatus::Cancelled, now_ms)?,
        _ => {
            println!("Task {id} is already {}.", task.status);
            return Ok(());
        }
    }

    store.save(&snapshot)?;
    println!("Task {id} cancelled.");
    Ok(())
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
