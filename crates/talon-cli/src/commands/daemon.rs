// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `talon daemon start|stop|status`

use clap::{Args, Subcommand};

use crate::client::{DaemonClient, LegacyRequest};
use crate::client_lifecycle::{daemon_stop, log_connection_error};
use crate::daemon_process;

#[derive(Args, Debug)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Start talond in the background if it isn't already running.
    Start,
    /// Stop the running talond.
    Stop {
        /// Send SIGKILL immediately instead of SIGTERM-then-wait.
        #[arg(long)]
        kill: bool,
    },
    /// Report whether talond is running.
    Status,
}

pub async fn run(args: DaemonArgs) -> anyhow::Result<()> {
    match args.command {
        DaemonCommand::Start => start().await,
        DaemonCommand::Stop { kill } => stop(kill).await,
        DaemonCommand::Status => status().await,
    }
}

async fn start() -> anyhow::Result<()> {
    let socket_path = daemon_process::daemon_socket()?;
    if daemon_process::probe_socket(&socket_path) {
        if let Ok(Some(pid)) = daemon_process::read_daemon_pid() {
            println!("talond is already running (pid {pid}).");
        } else {
            println!("talond is already running.");
        }
        return Ok(());
    }

    match DaemonClient::for_action().await {
        Ok(_) => {
            if let Ok(Some(pid)) = daemon_process::read_daemon_pid() {
                println!("talond started (pid {pid}).");
            } else {
                println!("talond started.");
            }
            Ok(())
        }
        Err(e) => {
            log_connection_error(&e);
            Err(e.into())
        }
    }
}

async fn stop(kill: bool) -> anyhow::Result<()> {
    if daemon_stop(kill).await? {
        println!("talond stopped.");
    } else {
        println!("talond is not running.");
    }
    Ok(())
}

async fn status() -> anyhow::Result<()> {
    let socket_path = daemon_process::daemon_socket()?;
    let pid = daemon_process::read_daemon_pid().ok().flatten();
    let running = daemon_process::probe_socket(&socket_path);

    match (running, pid) {
        (true, Some(pid)) => {
            println!("talond is running (pid {pid}).");
            if let Ok(client) = DaemonClient::for_query() {
                if let Ok(data) = client.send_checked(&LegacyRequest::List).await {
                    let count = data.get("sessions").and_then(|s| s.as_array()).map(|a| a.len()).unwrap_or(0);
                    println!("{count} active session(s).");
                }
            }
        }
        (true, None) => println!("talond is running."),
        (false, _) => println!("talond is not running."),
    }
    Ok(())
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
