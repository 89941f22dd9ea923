// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle and diagnostic logging for the CLI client.
//!
//! The daemon has no RPC shutdown command — it only reacts to SIGTERM and
//! SIGINT — so stopping it is entirely a matter of signaling its pid
//! and waiting, not a request over the control socket.

use std::path::PathBuf;

use crate::client::{timeout_exit, ClientError};
use crate::daemon_process::{
    cleanup_stale_pid, daemon_dir, daemon_socket, force_kill_daemon, process_exists, read_daemon_pid, wait_for_exit,
};

/// Stop the daemon: SIGTERM and wait, then SIGKILL if it's still alive.
/// Returns `true` if a daemon was running to stop, `false` if it wasn't.
pub async fn daemon_stop(kill: bool) -> Result<bool, ClientError> {
    let Some(pid) = read_daemon_pid()? else {
        if let Ok(dir) = daemon_dir() {
            cleanup_stale_pid(&dir);
        }
        return Ok(false);
    };

    if !process_exists(pid) {
        if let Ok(dir) = daemon_dir() {
            cleanup_stale_pid(&dir);
        }
        return Ok(false);
    }

    if kill {
        force_kill_daemon(pid);
        wait_for_exit(pid, timeout_exit()).await;
    } else {
        let _ = std::process::Command::new("kill").args(["-15", &pid.to_string()]).status();
        if !wait_for_exit(pid, timeout_exit()).await {
            force_kill_daemon(pid);
            wait_for_exit(pid, timeout_exit()).await;
        }
    }

    if let Ok(dir) = daemon_dir() {
        cleanup_stale_pid(&dir);
    }

    Ok(true)
}

/// Write a diagnostic message to `{state_dir}/cli.log`.
fn write_cli_log(message: String) {
    use std::io::Write;
    use std::time::SystemTime;

    let log_path = daemon_dir()
        .unwrap_or_else(|_| {
            std::env::var("HOME")
                .map(|h| PathBuf::from(h).join(".local/state/talon"))
                .unwrap_or_else(|_| PathBuf::from("/tmp"))
        })
        .join("cli.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(&log_path) {
        let timestamp = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        let pid = std::process::id();
        let cwd = std::env::current_dir().map(|p| p.display().to_string()).unwrap_or_else(|_| "(unknown)".to_string());
        let state_dir = crate::env::state_dir_raw().unwrap_or_else(|| "(not set)".to_string());

        let _ = writeln!(file, "[ts={}] pid={} cwd={} TALON_STATE_DIR={} {}", timestamp, pid, cwd, state_dir, message);
    }
}

/// Log a connection error for debugging.
///
/// Writes diagnostic info to `{state_dir}/cli.log` when the CLI fails to
/// connect to the daemon. Helps debug cases where the CLI runs from a
/// spawned agent whose stdout/stderr isn't visible.
pub fn log_connection_error(error: &ClientError) {
    let socket_path = daemon_socket().map(|p| p.display().to_string()).unwrap_or_else(|_| "(unknown)".to_string());
    write_cli_log(format!("socket={} error={}", socket_path, error));
}

#[cfg(test)]
#[path = "client_lifecycle_tests.rs"]
mod tests;
