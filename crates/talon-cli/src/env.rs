// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the CLI crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::client::ClientError;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

/// Resolve state directory: `TALON_STATE_DIR` > `XDG_STATE_HOME/talon` >
/// `~/.local/state/talon`. Mirrors [`talon_daemon::config::Config`]'s own
/// resolution so the CLI and daemon always agree on where the socket,
/// lock file, and log live.
pub fn state_dir() -> Result<PathBuf, ClientError> {
    if let Ok(dir) = std::env::var("TALON_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("talon"));
    }
    let home = std::env::var("HOME").map_err(|_| ClientError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/talon"))
}

pub fn state_dir_raw() -> Option<String> {
    std::env::var("TALON_STATE_DIR").ok()
}

/// Resolve the data directory the same way [`talon_daemon::config::Config`]
/// does: `TALON_DATA_DIR` override, else `{state_dir}/data`.
pub fn data_dir() -> Result<PathBuf, ClientError> {
    if let Ok(dir) = std::env::var("TALON_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    Ok(state_dir()?.join("data"))
}

/// Resolve the daemon's own log file the same way
/// [`talon_daemon::config::Config`] does: `TALON_LOG_PATH` override, else
/// `{state_dir}/daemon.log`.
pub fn log_path() -> Result<PathBuf, ClientError> {
    if let Ok(path) = std::env::var("TALON_LOG_PATH") {
        return Ok(PathBuf::from(path));
    }
    Ok(state_dir()?.join("daemon.log"))
}

pub fn no_color() -> bool {
    std::env::var("NO_COLOR").is_ok_and(|v| v == "1")
}

pub fn force_color() -> bool {
    std::env::var("COLOR").is_ok_and(|v| v == "1")
}

pub fn daemon_binary() -> Option<String> {
    std::env::var("TALON_DAEMON_BINARY").ok()
}

pub fn cargo_manifest_dir() -> Option<String> {
    std::env::var("CARGO_MANIFEST_DIR").ok()
}

pub fn timeout_ipc_ms() -> Option<Duration> {
    parse_duration_ms("TALON_TIMEOUT_IPC_MS")
}
pub fn timeout_connect_ms() -> Option<Duration> {
    parse_duration_ms("TALON_TIMEOUT_CONNECT_MS")
}
pub fn timeout_exit_ms() -> Option<Duration> {
    parse_duration_ms("TALON_TIMEOUT_EXIT_MS")
}
pub fn connect_poll_ms() -> Option<Duration> {
    parse_duration_ms("TALON_CONNECT_POLL_MS")
}
