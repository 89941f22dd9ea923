// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `talon send <session-key-or-alias> <text>`

use clap::Args;

use crate::client::{resolve_session_key, DaemonClient, LegacyRequest};
use crate::client_lifecycle::log_connection_error;

#[derive(Args, Debug)]
pub struct SendArgs {
    /// A session key, or an alias registered via `talon alias set`.
    pub session: String,
    /// The message text. Multiple words are joined with a single space.
    #[arg(trailing_var_arg = true, required = true)]
    pub message: Vec<String>,
}

pub async fn run(args: SendArgs) -> anyhow::Result<()> {
    let message = args.message.join(" ");

    let client = match DaemonClient::for_action().await {
        Ok(c) => c,
        Err(e) => {
            log_connection_error(&e);
            return Err(e.into());
        }
    };

    let session_key = resolve_session_key(&client, &args.session).await;

    let data = client.send_checked(&LegacyRequest::Send { session_key: session_key.clone(), message }).await?;

    let mode = data.get("mode").and_then(|v| v.as_str()).unwrap_or("session");
    match data.get("taskId").and_then(|v| v.as_str()) {
        Some(task_id) => println!("Queued task {task_id} ({session_key})."),
        None => println!("Delivered to {session_key} ({mode})."),
    }
    Ok(())
}

#[cfg(test)]
#[path = "send_tests.rs"]
mod tests;
