// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `talon alias set|remove|list|resolve`

use clap::{Args, Subcommand};

use crate::client::{DaemonClient, LegacyRequest};
use crate::client_lifecycle::log_connection_error;
use crate::table::{Column, Table};

#[derive(Args, Debug)]
pub struct AliasArgs {
    #[command(subcommand)]
    pub command: AliasCommand,
}

#[derive(Subcommand, Debug)]
pub enum AliasCommand {
    /// Point an alias at a session key.
    Set { alias: String, session_key: String },
    /// Remove an alias.
    Remove { alias: String },
    /// List every registered alias.
    List,
    /// Resolve an alias to its session key.
    Resolve { alias: String },
}

pub async fn run(args: AliasArgs) -> anyhow::Result<()> {
    let client = match DaemonClient::for_query() {
        Ok(c) => c,
        Err(e) => {
            log_connection_error(&e);
            return Err(e.into());
        }
    };

    match args.command {
        AliasCommand::Set { alias, session_key } => set(&client, &alias, &session_key).await,
        AliasCommand::Remove { alias } => remove(&client, &alias).await,
        AliasCommand::List => list(&client).await,
        AliasCommand::Resolve { alias } => resolve(&client, &alias).await,
    }
}

async fn set(client: &DaemonClient, alias: &str, session_key: &str) -> anyhow::Result<()> {
    client.send_checked(&LegacyRequest::AliasSet { alias: alias.to_string(), session_key: session_key.to_string() }).await?;
    println!("{alias} -> {session_key}");
    Ok(())
}

async fn remove(client: &DaemonClient, alias: &str) -> anyhow::Result<()> {
    client.send_checked(&LegacyRequest::AliasRemove { alias: alias.to_string() }).await?;
    println!("Removed alias {alias}.");
    Ok(())
}

async fn list(client: &DaemonClient) -> anyhow::Result<()> {
    let data = client.send_checked(&LegacyRequest::AliasList).await?;
    let entries = data.get("aliases").and_then(|v| v.as_array()).cloned().unwrap_or_default();

    if entries.is_empty() {
        println!("No aliases configured.");
        return Ok(());
    }

    let mut table = Table::new(vec![Column::left("ALIAS"), Column::left("SESSION")]);
    for entry in entries {
        let alias = entry.get("alias").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let session_key = entry.get("sessionKey").and_then(|v| v.as_str()).unwrap_or("").to_string();
        table.row(vec![alias, session_key]);
    }
    table.render(&mut std::io::stdout());
    Ok(())
}

async fn resolve(client: &DaemonClient, alias: &str) -> anyhow::Result<()> {
    let data = client.send_checked(&LegacyRequest::AliasResolve { alias: alias.to_string() }).await?;
    let session_key = data.get("sessionKey").and_then(|v| v.as_str()).unwrap_or("(unknown)");
    println!("{alias} -> {session_key}");
    Ok(())
}

#[cfg(test)]
#[path = "alias_tests.rs"]
mod tests;
