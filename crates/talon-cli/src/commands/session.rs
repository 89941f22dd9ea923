// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `talon session list|show|clear|abort <key-or-alias>`

use clap::{Args, Subcommand};

use crate::client::{resolve_session_key, DaemonClient, LegacyRequest};
use crate::client_lifecycle::log_connection_error;
use crate::table::{Column, Table};

#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// List every session the daemon currently holds in memory.
    List,
    /// Show a session's summary and last assistant message.
    Show { key: String },
    /// Clear a session's conversation, optionally summarizing it first.
    Clear {
        key: String,
        #[arg(long)]
        summarize: bool,
    },
    /// Abort a session's in-flight turn.
    Abort { key: String },
}

pub async fn run(args: SessionArgs) -> anyhow::Result<()> {
    let client = match DaemonClient::for_query() {
        Ok(c) => c,
        Err(e) => {
            log_connection_error(&e);
            return Err(e.into());
        }
    };

    match args.command {
        SessionCommand::List => list(&client).await,
        SessionCommand::Show { key } => show(&client, &key).await,
        SessionCommand::Clear { key, summarize } => clear(&client, &key, summarize).await,
        SessionCommand::Abort { key } => abort(&client, &key).await,
    }
}

async fn list(client: &DaemonClient) -> anyhow::Result<()> {
    let data = client.send_checked(&LegacyRequest::List).await?;
    let sessions: Vec<String> =
        data.get("sessions").and_then(|s| s.as_array()).map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()).unwrap_or_default();

    if sessions.is_empty() {
        println!("No active sessions.");
        return Ok(());
    }

    let mut table = Table::new(vec![Column::left("SESSION")]);
    for key in sessions {
        table.row(vec![key]);
    }
    table.render(&mut std::io::stdout());
    Ok(())
}

async fn show(client: &DaemonClient, key: &str) -> anyhow::Result<()> {
    let session_key = resolve_session_key(client, key).await;

    let summary_data = client.send_checked(&LegacyRequest::GetSummary { session_key: session_key.clone() }).await?;
    let summary = summary_data.get("summary").and_then(|v| v.as_str()).unwrap_or("(no summary)");

    let message_data = client.send_checked(&LegacyRequest::GetMessage { session_key: session_key.clone() }).await?;
    let last_message = message_data.get("text").and_then(|v| v.as_str());

    println!("session: {session_key}");
    println!("summary: {summary}");
    match last_message {
        Some(text) => println!("last message: {text}"),
        None => println!("last message: (none)"),
    }
    Ok(())
}

async fn clear(client: &DaemonClient, key: &str, summarize: bool) -> anyhow::Result<()> {
    let session_key = resolve_session_key(client, key).await;
    client.send_checked(&LegacyRequest::Clear { session_key: session_key.clone(), summarize }).await?;
    println!("Cleared {session_key}.");
    Ok(())
}

async fn abort(client: &DaemonClient, key: &str) -> anyhow::Result<()> {
    let session_key = resolve_session_key(client, key).await;
    let data = client.send_checked(&LegacyRequest::Abort { session_key: session_key.clone() }).await?;
    let aborted = data.get("aborted").and_then(|v| v.as_bool()).unwrap_or(false);
    if aborted {
        println!("Aborted {session_key}.");
    } else {
        println!("{session_key} had no in-flight turn to abort.");
    }
    Ok(())
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
