// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: every tunable named in the design's external
//! interfaces table, loaded once from `TALON_`-prefixed environment
//! variables and validated eagerly so a misconfigured daemon fails fast at
//! startup instead of mid-dispatch.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be > 0, got {value}")]
    MustBePositive { name: &'static str, value: i64 },
    #[error("{name} must be at least {min}, got {value}")]
    TooSmall { name: &'static str, value: u64, min: u64 },
    #[error("TASK_MAX_CONCURRENCY must be in 1..=32, got {0}")]
    ConcurrencyOutOfRange(u64),
    #[error("CHAT_DISPATCH_MODE must be one of session|task|hybrid, got {0:?}")]
    InvalidDispatchMode(String),
    #[error("could not determine a home directory for the default state dir")]
    NoHomeDir,
}

/// Dispatch routing default for inbound chat messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatDispatchMode {
    Session,
    Task,
    Hybrid,
}

impl ChatDispatchMode {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw {
            "session" => Ok(Self::Session),
            "task" => Ok(Self::Task),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(ConfigError::InvalidDispatchMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Filesystem roots.
    pub data_dir: PathBuf,
    pub worktree_root: PathBuf,
    pub control_socket_path: PathBuf,
    pub log_path: PathBuf,
    pub lock_path: PathBuf,

    // Session / control plane tunables.
    pub session_max_messages: usize,
    pub session_ttl_ms: u64,
    pub session_dedupe_window_ms: u64,
    pub max_queue_per_session: usize,
    pub max_message_bytes: usize,
    pub chat_dispatch_mode: ChatDispatchMode,
    pub chat_task_update_poll_ms: u64,

    // Engine.
    pub engine_command: Vec<String>,
    pub engine_timeout_ms: u64,

    // Task orchestrator tunables.
    pub task_max_concurrency: usize,
    pub worker_max_retries: u32,
    pub worktree_stale_hours: u64,
    pub failed_worktree_retention_hours: u64,
    /// Single repo registered as `"default"` at startup, if set. Multi-repo
    /// registration is an administrative concern the RPC/CLI surface does
    /// not yet expose; this covers the common single-repo deployment.
    pub repo_path: Option<PathBuf>,
    pub repo_default_branch: String,
    pub task_autocleanup: bool,
    pub task_auto_commit: bool,
    pub task_auto_pr: bool,
    pub pr_check_timeout_ms: u64,
    pub pr_check_poll_ms: u64,
}

impl Config {
    /// Load configuration from `TALON_`-prefixed environment variables,
    /// falling back to documented defaults, then validate it.
    pub fn load() -> Result<Self, ConfigError> {
        let data_dir = env_path("TALON_DATA_DIR").unwrap_or(default_state_dir()?.join("data"));
        let worktree_root = env_path("TALON_WORKTREE_ROOT_DIR").unwrap_or(default_state_dir()?.join("worktrees"));
        let control_socket_path =
            env_path("TALON_CONTROL_SOCKET_PATH").unwrap_or(default_state_dir()?.join("daemon.sock"));
        let log_path = env_path("TALON_LOG_PATH").unwrap_or(default_state_dir()?.join("daemon.log"));
        let lock_path = default_state_dir()?.join("daemon.pid");

        let config = Self {
            data_dir,
            worktree_root,
            control_socket_path,
            log_path,
            lock_path,
            session_max_messages: env_u64("TALON_SESSION_MAX_MESSAGES", 50) as usize,
            session_ttl_ms: env_u64("TALON_SESSION_TTL_SECONDS", 3600) * 1000,
            session_dedupe_window_ms: env_u64("TALON_SESSION_DEDUPE_WINDOW_MS", 1000),
            max_queue_per_session: env_u64("TALON_MAX_QUEUE_PER_SESSION", 32) as usize,
            max_message_bytes: env_u64("TALON_MAX_MESSAGE_BYTES", 32 * 1024) as usize,
            chat_dispatch_mode: ChatDispatchMode::parse(
                &std::env::var("TALON_CHAT_DISPATCH_MODE").unwrap_or_else(|_| "hybrid".to_string()),
            )?,
            chat_task_update_poll_ms: env_u64("TALON_CHAT_TASK_UPDATE_POLL_MS", 1500),
            engine_command: std::env::var("TALON_ENGINE_COMMAND")
                .ok()
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_else(|| vec!["true".to_string()]),
            engine_timeout_ms: env_u64("TALON_ENGINE_TIMEOUT_MS", 120_000),
            task_max_concurrency: env_u64("TALON_TASK_MAX_CONCURRENCY", 4) as usize,
            worker_max_retries: env_u64("TALON_WORKER_MAX_RETRIES", 2) as u32,
            worktree_stale_hours: env_u64("TALON_WORKTREE_STALE_HOURS", 24),
            failed_worktree_retention_hours: env_u64("TALON_FAILED_WORKTREE_RETENTION_HOURS", 24),
            repo_path: env_path("TALON_REPO_PATH"),
            repo_default_branch: std::env::var("TALON_REPO_DEFAULT_BRANCH").unwrap_or_else(|_| "main".to_string()),
            task_autocleanup: env_bool("TALON_TASK_AUTOCLEANUP", true),
            task_auto_commit: env_bool("TALON_TASK_AUTO_COMMIT", true),
            task_auto_pr: env_bool("TALON_TASK_AUTO_PR", true),
            pr_check_timeout_ms: env_u64("TALON_PR_CHECK_TIMEOUT_MS", 600_000),
            pr_check_poll_ms: env_u64("TALON_PR_CHECK_POLL_MS", 5_000),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.task_max_concurrency == 0 || self.task_max_concurrency > 32 {
            return Err(ConfigError::ConcurrencyOutOfRange(self.task_max_concurrency as u64));
        }
        if self.max_message_bytes == 0 {
            return Err(ConfigError::MustBePositive { name: "TALON_MAX_MESSAGE_BYTES", value: 0 });
        }
        if self.max_queue_per_session == 0 {
            return Err(ConfigError::MustBePositive { name: "TALON_MAX_QUEUE_PER_SESSION", value: 0 });
        }
        if self.chat_task_update_poll_ms < 500 {
            return Err(ConfigError::TooSmall {
                name: "TALON_CHAT_TASK_UPDATE_POLL_MS",
                value: self.chat_task_update_poll_ms,
                min: 500,
            });
        }
        Ok(())
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_timeout_ms)
    }

    pub fn session_dedupe_window(&self) -> Duration {
        Duration::from_millis(self.session_dedupe_window_ms)
    }

    /// Directory that hosts `session-control/{sha}.sock` rendezvous points
    /// and alias symlinks: the directory containing the control socket path.
    pub fn session_control_dir(&self) -> PathBuf {
        self.control_socket_path
            .parent()
            .map(|p| p.join("session-control"))
            .unwrap_or_else(|| PathBuf::from("session-control"))
    }
}

fn default_state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("TALON_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("talon"));
    }
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoHomeDir)?;
    Ok(PathBuf::from(home).join(".local/state/talon"))
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().map(PathBuf::from)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(s) => matches!(s.as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
