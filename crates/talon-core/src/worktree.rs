// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree identifier and lifecycle status.
//!
//! A worktree is a disposable git checkout created for exactly one task. Its
//! lifetime is independent of the task's in-memory record: a task can finish
//! while its worktree is kept around for inspection (see
//! `FAILED_WORKTREE_RETENTION_HOURS`).

use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a worktree, derived from `{repo_id}-{task_id}`.
    pub struct WorktreeId;
}

/// Status of a worktree in its lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorktreeStatus {
    #[default]
    Creating,
    Ready,
    /// Actively checked out by a running task.
    InUse {
        task_id: String,
    },
    Cleaning,
    Failed {
        reason: String,
    },
}

impl fmt::Display for WorktreeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorktreeStatus::Creating => write!(f, "creating"),
            WorktreeStatus::Ready => write!(f, "ready"),
            WorktreeStatus::InUse { task_id } => write!(f, "in_use({task_id})"),
            WorktreeStatus::Cleaning => write!(f, "cleaning"),
            WorktreeStatus::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
