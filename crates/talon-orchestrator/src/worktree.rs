// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Creates, lists, and cleans the disposable git worktrees tasks run in.
//!
//! One worktree per task, on branch `talon/{task_id}`, rooted under a
//! single `WORKTREE_ROOT_DIR`. Git is always invoked for real by shelling
//! out, the same way the rest of the stack talks to subprocesses.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use talon_adapters::subprocess::{run_with_timeout, GIT_TIMEOUT};
use talon_core::TaskId;
use thiserror::Error;
use tokio::process::Command;
use tracing::warn;

#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error("git command failed: {0}")]
    Command(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct CreatedWorktree {
    pub path: PathBuf,
    pub branch: String,
}

#[derive(Debug, Clone)]
pub struct WorktreeListing {
    pub path: PathBuf,
    pub mtime_ms: u64,
}

pub struct WorktreeManager {
    root: PathBuf,
}

fn branch_name(task_id: &TaskId) -> String {
    format!("talon/{task_id}")
}

fn worktree_dir_name(repo_id: &str, task_id: &TaskId) -> String {
    format!("{repo_id}-{task_id}")
}

impl WorktreeManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, repo_id: &str, task_id: &TaskId) -> PathBuf {
        self.root.join(worktree_dir_name(repo_id, task_id))
    }

    /// Create a worktree for `task_id` against `repo_path`, preferring the
    /// remote's default branch and falling back to the local one when there
    /// is no remote (or it can't be reached).
    pub async fn create_worktree(
        &self,
        repo_path: &Path,
        repo_id: &str,
        task_id: &TaskId,
        default_branch: &str,
        remote_name: Option<&str>,
    ) -> Result<CreatedWorktree, WorktreeError> {
        let branch = branch_name(task_id);
        let worktree_path = self.path_for(repo_id, task_id);

        if worktree_path.exists() {
            tokio::fs::remove_dir_all(&worktree_path).await.ok();
        }
        tokio::fs::create_dir_all(&self.root).await?;

        if let Some(remote) = remote_name {
            let ref_spec = format!("{remote}/{default_branch}");
            let mut cmd = Command::new("git");
            cmd.arg("-C")
                .arg(repo_path)
                .args(["worktree", "add", "-B", &branch])
                .arg(&worktree_path)
                .arg(&ref_spec);
            let output = run_with_timeout(cmd, GIT_TIMEOUT, "git worktree add").await.map_err(WorktreeError::Command)?;
            if output.status.success() {
                return Ok(CreatedWorktree { path: worktree_path, branch });
            }
            warn!(repo_id, %ref_spec, "worktree add against remote failed, falling back to local branch");
        }

        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(repo_path)
            .args(["worktree", "add", "-B", &branch])
            .arg(&worktree_path)
            .arg(default_branch);
        let output = run_with_timeout(cmd, GIT_TIMEOUT, "git worktree add").await.map_err(WorktreeError::Command)?;
        if !output.status.success() {
            return Err(WorktreeError::Command(String::from_utf8_lossy(&output.stderr).to_string()));
        }
        Ok(CreatedWorktree { path: worktree_path, branch })
    }

    /// Remove a worktree and its branch, best-effort: failures are logged
    /// but never surfaced, so a stale worktree never blocks the
    /// orchestrator from making progress.
    pub async fn cleanup_worktree(&self, repo_path: &Path, worktree_path: &Path, branch: &str) {
        let mut remove = Command::new("git");
        remove.arg("-C").arg(repo_path).args(["worktree", "remove", "--force"]).arg(worktree_path);
        if let Ok(output) = run_with_timeout(remove, GIT_TIMEOUT, "git worktree remove").await {
            if !output.status.success() {
                warn!(branch, path = %worktree_path.display(), stderr = %String::from_utf8_lossy(&output.stderr), "worktree remove failed");
            }
        }

        let mut delete_branch = Command::new("git");
        delete_branch.arg("-C").arg(repo_path).args(["branch", "-D", branch]);
        if let Ok(output) = run_with_timeout(delete_branch, GIT_TIMEOUT, "git branch -D").await {
            if !output.status.success() {
                warn!(branch, "branch delete failed");
            }
        }
    }

    /// Remove worktree directories older than `max_age` that aren't in
    /// `protected_paths`. Returns the paths actually removed.
    pub fn cleanup_stale(&self, max_age: Duration, protected_paths: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        let now = SystemTime::now();
        for listing in self.list_worktrees()? {
            if protected_paths.iter().any(|p| p == &listing.path) {
                continue;
            }
            let age_ms = now
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0)
                .saturating_sub(listing.mtime_ms);
            if age_ms > max_age.as_millis() as u64 {
                if std::fs::remove_dir_all(&listing.path).is_ok() {
                    removed.push(listing.path);
                }
            }
        }
        Ok(removed)
    }

    pub fn list_worktrees(&self) -> std::io::Result<Vec<WorktreeListing>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let mtime_ms = entry
                .metadata()?
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            out.push(WorktreeListing { path: entry.path(), mtime_ms });
        }
        Ok(out)
    }
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
