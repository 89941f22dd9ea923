// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! talon - operator CLI for the talond control plane and task orchestrator.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod client_lifecycle;
mod color;
mod commands;
mod daemon_process;
mod env;
mod output;
mod poll;
mod table;

use anyhow::Result;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};

use commands::{alias, daemon, logs, send, session, status, task};

#[derive(Parser)]
#[command(name = "talon", version, about = "Operator CLI for talond")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start, stop, or check the daemon.
    Daemon(daemon::DaemonArgs),
    /// Send a chat-simulating message to a session.
    Send(send::SendArgs),
    /// Inspect and manage chat sessions.
    Session(session::SessionArgs),
    /// Manage session-key aliases.
    Alias(alias::AliasArgs),
    /// Submit and manage orchestrator tasks.
    Task(task::TaskArgs),
    /// One-screen summary of the daemon, sessions, and tasks.
    Status(status::StatusArgs),
    /// Tail the daemon's log file.
    Logs(logs::LogsArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let matches = cli_command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;
    dispatch(cli.command).await
}

async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Daemon(args) => daemon::run(args).await,
        Commands::Send(args) => send::run(args).await,
        Commands::Session(args) => session::run(args).await,
        Commands::Alias(args) => alias::run(args).await,
        Commands::Task(args) => task::run(args).await,
        Commands::Status(args) => status::run(args).await,
        Commands::Logs(args) => logs::run(args).await,
    }
}

fn cli_command() -> clap::Command {
    Cli::command().styles(color::styles())
}
