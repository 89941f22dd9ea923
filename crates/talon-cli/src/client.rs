// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The CLI's connection to `talond`.
//!
//! Every subcommand speaks the same newline-delimited JSON wire the daemon's
//! `rpc::protocol` module defines, always over the single global control
//! socket using the legacy, `action`-tagged request shape — the modern
//! `type`-tagged per-session shape exists for long-lived interactive
//! consumers that bind to a session's own socket, which a one-shot CLI
//! invocation has no reason to do.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
pub use talon_daemon::rpc::protocol::{CommandResponse, LegacyRequest};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::daemon_process;
use crate::env;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon is not running")]
    DaemonNotRunning,
    #[error("failed to start daemon: {0}")]
    DaemonStartFailed(String),
    #[error("timed out waiting for daemon to start")]
    DaemonStartTimeout,
    #[error("malformed response from daemon: {0}")]
    Protocol(String),
    #[error("daemon rejected the request: {0}")]
    Rejected(String),
    #[error("daemon sent an unexpected response")]
    UnexpectedResponse,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("could not determine a state directory (set TALON_STATE_DIR or HOME)")]
    NoStateDir,
}

const DEFAULT_TIMEOUT_CONNECT_MS: u64 = 5_000;
const DEFAULT_TIMEOUT_EXIT_MS: u64 = 5_000;
const DEFAULT_TIMEOUT_IPC_MS: u64 = 30_000;
const DEFAULT_CONNECT_POLL_MS: u64 = 50;

pub fn timeout_connect() -> Duration {
    env::timeout_connect_ms().unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_CONNECT_MS))
}

pub fn timeout_exit() -> Duration {
    env::timeout_exit_ms().unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_EXIT_MS))
}

pub fn timeout_ipc() -> Duration {
    env::timeout_ipc_ms().unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_IPC_MS))
}

pub fn poll_interval() -> Duration {
    env::connect_poll_ms().unwrap_or(Duration::from_millis(DEFAULT_CONNECT_POLL_MS))
}

/// A connection to the daemon's global control socket.
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to the daemon, starting it in the background first if it
    /// isn't already up. Used by commands that mutate state (`send`,
    /// `alias set`, ...) where auto-start is the expected convenience.
    pub async fn for_action() -> Result<Self, ClientError> {
        let socket_path = daemon_process::daemon_socket()?;
        if daemon_process::probe_socket(&socket_path) {
            return Ok(Self { socket_path });
        }
        daemon_process::cleanup_stale_socket()?;
        let child = daemon_process::start_daemon_background().map_err(daemon_process::wrap_with_startup_error)?;
        Self::wait_for_socket(&socket_path, child).await?;
        Ok(Self { socket_path })
    }

    /// Connect to a daemon that must already be running; never auto-starts.
    /// Used by read-only / informational commands (`status`, `session
    /// list`, ...) where silently spawning a daemon would be surprising.
    pub fn for_query() -> Result<Self, ClientError> {
        let socket_path = daemon_process::daemon_socket()?;
        if !daemon_process::probe_socket(&socket_path) {
            return Err(ClientError::DaemonNotRunning);
        }
        Ok(Self { socket_path })
    }

    /// Construct a client pointed at an arbitrary socket, bypassing
    /// daemon discovery. Used by command-module tests that stand up a
    /// bare `UnixListener` in place of a real `talond`.
    #[cfg(test)]
    pub fn test_connect(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    async fn wait_for_socket(socket_path: &std::path::Path, mut child: std::process::Child) -> Result<(), ClientError> {
        let start = Instant::now();
        let timeout = timeout_connect();
        loop {
            if daemon_process::probe_socket(socket_path) {
                return Ok(());
            }
            if let Ok(Some(status)) = child.try_wait() {
                return Err(daemon_process::wrap_with_startup_error(ClientError::DaemonStartFailed(format!(
                    "daemon exited during startup ({status})"
                ))));
            }
            if start.elapsed() > timeout {
                return Err(ClientError::DaemonStartTimeout);
            }
            tokio::time::sleep(poll_interval()).await;
        }
    }

    /// Send one legacy request and wait for its one-line JSON response.
    pub async fn send(&self, request: &LegacyRequest) -> Result<CommandResponse, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        roundtrip(stream, request).await
    }

    /// Send a request and turn a `success: false` response into an error,
    /// since most call sites only care about the `data` payload.
    pub async fn send_checked(&self, request: &LegacyRequest) -> Result<serde_json::Value, ClientError> {
        let response = self.send(request).await?;
        if response.success {
            Ok(response.data.unwrap_or(serde_json::Value::Null))
        } else {
            Err(ClientError::Rejected(response.error.unwrap_or_else(|| "unknown error".to_string())))
        }
    }
}

/// Resolve an alias to its session key, falling back to the input
/// unchanged when it isn't a known alias (it may already be a literal
/// session key) — mirrors [`talon_daemon::control_plane::ControlPlane::resolve_session_key`].
pub async fn resolve_session_key(client: &DaemonClient, alias_or_key: &str) -> String {
    let request = LegacyRequest::AliasResolve { alias: alias_or_key.to_string() };
    match client.send_checked(&request).await {
        Ok(data) => data.get("sessionKey").and_then(|v| v.as_str()).map(str::to_string).unwrap_or_else(|| alias_or_key.to_string()),
        Err(_) => alias_or_key.to_string(),
    }
}

async fn roundtrip(stream: UnixStream, request: &impl Serialize) -> Result<CommandResponse, ClientError> {
    let mut line = serde_json::to_string(request).map_err(|e| ClientError::Protocol(e.to_string()))?;
    line.push('\n');

    let (read_half, mut write_half) = stream.into_split();
    write_half.write_all(line.as_bytes()).await?;

    let mut lines = BufReader::new(read_half).lines();
    let response_line = tokio::time::timeout(timeout_ipc(), lines.next_line())
        .await
        .map_err(|_| ClientError::Protocol("timed out waiting for a response".to_string()))??
        .ok_or(ClientError::UnexpectedResponse)?;

    serde_json::from_str(&response_line).map_err(|e| ClientError::Protocol(e.to_string()))
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
