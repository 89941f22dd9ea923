// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `talon status`: a one-screen summary of the daemon, its sessions, and
//! (when a repo is registered) the task orchestrator.

use clap::Args;

use crate::client::{DaemonClient, LegacyRequest};
use crate::daemon_process;
use talon_core::TaskStatus;
use talon_storage::TaskStore;

#[derive(Args, Debug)]
pub struct StatusArgs {}

pub async fn run(_args: StatusArgs) -> anyhow::Result<()> {
    let socket_path = daemon_process::daemon_socket()?;
    let pid = daemon_process::read_daemon_pid().ok().flatten();
    let running = daemon_process::probe_socket(&socket_path);

    if !running {
        println!("talond: not running");
        return Ok(());
    }

    match pid {
        Some(pid) => println!("talond: running (pid {pid})"),
        None => println!("talond: running"),
    }

    if let Ok(client) = DaemonClient::for_query() {
        if let Ok(data) = client.send_checked(&LegacyRequest::List).await {
            let count = data.get("sessions").and_then(|s| s.as_array()).map(|a| a.len()).unwrap_or(0);
            println!("sessions: {count} active");
        }
    }

    if let Ok(data_dir) = crate::env::data_dir() {
        let store = TaskStore::new(data_dir);
        if let Ok(snapshot) = store.load() {
            if !snapshot.tasks.is_empty() {
                let mut queued = 0;
                let mut running = 0;
                let mut blocked = 0;
                let mut done = 0;
                let mut failed = 0;
                let mut cancelled = 0;
                for task in &snapshot.tasks {
                    match task.status {
                        TaskStatus::Queued => queued += 1,
                        TaskStatus::Running => running += 1,
                        TaskStatus::Blocked => blocked += 1,
                        TaskStatus::Done => done += 1,
                        TaskStatus::Failed => failed += 1,
                        TaskStatus::Cancelled => cancelled += 1,
                    }
                }
                println!(
                    "tasks: {} total (queued={queued} running={running} blocked={blocked} done={done} failed={failed} cancelled={cancelled})",
                    snapshot.tasks.len()
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
