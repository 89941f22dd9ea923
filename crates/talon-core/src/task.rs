// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task record and its status transitions.
//!
//! A [`TaskRecord`] is the orchestrator's unit of work: one prompt executed by
//! an agent engine inside a disposable worktree, tracked through a small
//! closed state machine. See [`TaskStatus::can_transition_to`] for the
//! allowed edges.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for a task.
    pub struct TaskId;
}

/// Where a task's submission originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    Transport,
    Webhook,
    Operator,
    System,
}

/// Status of a task in its lifecycle.
///
/// `Done` and `Failed` both permit a transition back to `Queued` — the
/// "retry escape" path used by [`crate::task::TaskStatus::retry`]-style
/// operations. This intentionally breaks the usual monotonicity of terminal
/// states; see the orchestrator's retry operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Blocked,
    Done,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Done | TaskStatus::Failed | TaskStatus::Blocked | TaskStatus::Cancelled
        )
    }

    /// Whether `self -> to` is one of the edges allowed by the state machine.
    pub fn can_transition_to(&self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (Queued, Running)
                | (Queued, Cancelled)
                | (Running, Queued)
                | (Running, Done)
                | (Running, Failed)
                | (Running, Blocked)
                | (Running, Cancelled)
                | (Blocked, Queued)
                | (Blocked, Failed)
                | (Blocked, Done)
                | (Done, Queued)
                | (Done, Blocked)
                | (Done, Failed)
                | (Failed, Queued)
                | (Failed, Blocked)
                | (Failed, Done)
                | (Cancelled, Queued)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("invalid task transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

/// A piece of durable evidence attached to a task.
///
/// Artifacts are append-only; the latest artifact of a given kind is
/// authoritative for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskArtifact {
    Launcher {
        worktree_path: String,
        branch: String,
        assigned_session: String,
    },
    Summary {
        text: String,
    },
    FileChanges {
        files_changed: Vec<String>,
    },
    GitCommit {
        commit_sha: String,
        message: String,
    },
    PullRequest {
        pr_url: String,
        pr_title: String,
    },
    Checks {
        checks_summary: String,
        passed: bool,
    },
    TestOutput {
        text: String,
    },
    Error {
        message: String,
    },
    NoArtifact,
}

/// An append-only log entry on a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub at_ms: u64,
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl TaskEvent {
    pub fn transition(at_ms: u64, from: TaskStatus, to: TaskStatus) -> Self {
        Self {
            at_ms,
            kind: "status_transition".to_string(),
            message: format!("{from} -> {to}"),
            details: Some(serde_json::json!({ "from": from.to_string(), "to": to.to_string() })),
        }
    }

    pub fn note(at_ms: u64, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            at_ms,
            kind: kind.into(),
            message: message.into(),
            details: None,
        }
    }
}

/// The default per-task retry ceiling; overridable per-task via `max_retries`.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    pub source: TaskSource,
    pub text: String,
    pub repo_id: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub escalation_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<TaskArtifact>,
    #[serde(default)]
    pub children: Vec<TaskId>,
    #[serde(default)]
    pub events: Vec<TaskEvent>,
    #[serde(default)]
    pub cancel_requested: bool,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl TaskRecord {
    pub fn new(id: TaskId, text: impl Into<String>, repo_id: impl Into<String>, source: TaskSource, now_ms: u64) -> Self {
        Self {
            id,
            parent_task_id: None,
            session_key: None,
            source,
            text: text.into(),
            repo_id: repo_id.into(),
            status: TaskStatus::Queued,
            assigned_session: None,
            worktree_path: None,
            branch: None,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            escalation_required: false,
            error: None,
            artifacts: Vec::new(),
            children: Vec::new(),
            events: Vec::new(),
            cancel_requested: false,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            started_at_ms: None,
            finished_at_ms: None,
        }
    }

    pub fn is_fanout_parent(&self) -> bool {
        !self.children.is_empty()
    }

    /// Apply a status transition, validating it against [`TaskStatus::can_transition_to`]
    /// and updating `started_at_ms` / `finished_at_ms` to match.
    pub fn transition(&mut self, to: TaskStatus, now_ms: u64) -> Result<(), TaskError> {
        if !self.status.can_transition_to(to) {
            return Err(TaskError::InvalidTransition { from: self.status, to });
        }
        self.events.push(TaskEvent::transition(now_ms, self.status, to));
        self.status = to;
        self.updated_at_ms = now_ms;
        if to == TaskStatus::Running && self.started_at_ms.is_none() {
            self.started_at_ms = Some(now_ms);
        }
        if to.is_terminal() {
            self.finished_at_ms = Some(now_ms);
        } else {
            self.finished_at_ms = None;
        }
        Ok(())
    }

    pub fn push_artifact(&mut self, artifact: TaskArtifact) {
        self.artifacts.push(artifact);
    }

    pub fn push_event(&mut self, event: TaskEvent) {
        self.events.push(event);
    }

    /// The latest artifact of the given discriminant, if any.
    pub fn latest_pull_request(&self) -> Option<(&str, &str)> {
        self.artifacts.iter().rev().find_map(|a| match a {
            TaskArtifact::PullRequest { pr_url, pr_title } => Some((pr_url.as_str(), pr_title.as_str())),
            _ => None,
        })
    }

    pub fn latest_summary(&self) -> Option<&str> {
        self.artifacts.iter().rev().find_map(|a| match a {
            TaskArtifact::Summary { text } => Some(text.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
