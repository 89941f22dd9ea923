// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A process-spawning `Engine`: one child process per turn, fed
//! [`EngineInput`] as JSON on stdin, expected to print its reply on stdout.
//!
//! On `ENGINE_TIMEOUT_MS` expiry or an explicit cancellation, the child is
//! sent `SIGTERM` and given a short grace period before being force-killed.

use crate::engine::Engine;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use talon_core::{EngineError, EngineInput, EngineOutput};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ProcessEngineConfig {
    /// The command to spawn, e.g. `["claude-engine", "--turn"]`.
    pub command: Vec<String>,
    pub timeout: Duration,
    /// Grace period between SIGTERM and SIGKILL on timeout/cancel.
    pub term_grace: Duration,
}

impl Default for ProcessEngineConfig {
    fn default() -> Self {
        Self {
            command: vec!["true".to_string()],
            timeout: Duration::from_secs(120),
            term_grace: Duration::from_secs(5),
        }
    }
}

pub struct ProcessEngine {
    config: ProcessEngineConfig,
}

impl ProcessEngine {
    pub fn new(config: ProcessEngineConfig) -> Self {
        Self { config }
    }

    /// Send `SIGTERM` to the child, then `SIGKILL` if it hasn't exited
    /// after `term_grace`. Shells out to `kill` rather than linking a
    /// signals crate, consistent with how the rest of this crate talks to
    /// external processes.
    async fn terminate(&self, child: &mut Child) {
        let Some(pid) = child.id() else {
            return;
        };
        let _ = Command::new("kill")
            .args(["-TERM", &pid.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if tokio::time::timeout(self.config.term_grace, child.wait()).await.is_err() {
            warn!(pid, "engine process ignored SIGTERM, sending SIGKILL");
            let _ = child.start_kill();
        }
    }
}

#[async_trait]
impl Engine for ProcessEngine {
    async fn complete(&self, input: EngineInput, cancel: CancellationToken) -> Result<EngineOutput, EngineError> {
        let Some((program, args)) = self.config.command.split_first() else {
            return Err(EngineError::ProcessFailed("empty engine command".to_string()));
        };
        let payload = serde_json::to_vec(&input).map_err(|e| EngineError::ProcessFailed(e.to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&payload).await {
                warn!(error = %e, "failed writing engine stdin");
            }
        }
        // Drain stdout/stderr concurrently in the background so a chatty
        // child can't deadlock on a full pipe buffer while we only await
        // `child.wait()` below.
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stdout_pipe.take() {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe.take() {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.terminate(&mut child).await;
                return Err(EngineError::Cancelled);
            }
            result = tokio::time::timeout(self.config.timeout, child.wait()) => match result {
                Ok(Ok(status)) => status,
                Ok(Err(io_err)) => return Err(EngineError::Io(io_err)),
                Err(_elapsed) => {
                    self.terminate(&mut child).await;
                    return Err(EngineError::Timeout);
                }
            },
        };

        let stdout_buf = stdout_task.await.unwrap_or_default();
        if !status.success() {
            let stderr_buf = stderr_task.await.unwrap_or_default();
            return Err(EngineError::ProcessFailed(format!(
                "engine exited with {}: {}",
                status,
                String::from_utf8_lossy(&stderr_buf)
            )));
        }
        let text = String::from_utf8_lossy(&stdout_buf).trim().to_string();
        debug!(bytes = text.len(), "engine turn complete");
        Ok(EngineOutput { text })
    }

    async fn ping(&self) -> bool {
        let Some((program, _)) = self.config.command.split_first() else {
            return false;
        };
        Command::new(program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
