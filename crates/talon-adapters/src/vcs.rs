// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git plumbing and the `Forge` trait: committing, pushing, listing changed
//! files, and opening/polling a pull request.
//!
//! Git itself is always invoked for real, by shelling out with
//! [`crate::subprocess::run_with_timeout`]; the forge (PR open + check
//! polling) is behind a trait because no real network call to GitHub or
//! similar is wired into this crate — see [`FakeForge`].

use crate::subprocess::{run_with_timeout, GIT_TIMEOUT};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("git command failed: {0}")]
    Command(String),
}

/// Names of files changed relative to the branch's upstream, or an empty
/// worktree if there is nothing to report.
pub async fn changed_files(worktree_path: &Path) -> Result<Vec<String>, VcsError> {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(worktree_path).args(["status", "--porcelain"]);
    let output = run_with_timeout(cmd, GIT_TIMEOUT, "git status").await.map_err(VcsError::Command)?;
    if !output.status.success() {
        return Err(VcsError::Command(String::from_utf8_lossy(&output.stderr).to_string()));
    }
    let files = String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| line.get(3..).map(str::to_string))
        .collect();
    Ok(files)
}

/// Stage everything and commit. Returns `None` if there was nothing to
/// commit (a clean worktree is not an error).
pub async fn commit_all(worktree_path: &Path, message: &str) -> Result<Option<String>, VcsError> {
    let mut add = Command::new("git");
    add.arg("-C").arg(worktree_path).args(["add", "-A"]);
    let add_out = run_with_timeout(add, GIT_TIMEOUT, "git add").await.map_err(VcsError::Command)?;
    if !add_out.status.success() {
        return Err(VcsError::Command(String::from_utf8_lossy(&add_out.stderr).to_string()));
    }

    let mut commit = Command::new("git");
    commit.arg("-C").arg(worktree_path).args(["commit", "-m", message]);
    let commit_out = run_with_timeout(commit, GIT_TIMEOUT, "git commit").await.map_err(VcsError::Command)?;
    if !commit_out.status.success() {
        // "nothing to commit" is not a failure worth surfacing.
        return Ok(None);
    }

    let mut rev_parse = Command::new("git");
    rev_parse.arg("-C").arg(worktree_path).args(["rev-parse", "HEAD"]);
    let sha_out = run_with_timeout(rev_parse, GIT_TIMEOUT, "git rev-parse").await.map_err(VcsError::Command)?;
    if !sha_out.status.success() {
        return Err(VcsError::Command(String::from_utf8_lossy(&sha_out.stderr).to_string()));
    }
    Ok(Some(String::from_utf8_lossy(&sha_out.stdout).trim().to_string()))
}

/// Push a branch to its remote, creating the upstream if needed.
pub async fn push_branch(worktree_path: &Path, branch: &str) -> Result<(), VcsError> {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(worktree_path).args(["push", "-u", "origin", branch]);
    let output = run_with_timeout(cmd, GIT_TIMEOUT, "git push").await.map_err(VcsError::Command)?;
    if !output.status.success() {
        return Err(VcsError::Command(String::from_utf8_lossy(&output.stderr).to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct OpenPrRequest<'a> {
    pub branch: &'a str,
    pub base: &'a str,
    pub title: &'a str,
    pub body: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksStatus {
    Pending,
    Passed,
    Failed,
}

/// The pull-request surface of a forge (GitHub, GitLab, ...): opening a PR
/// and polling its checks. Never implemented against a real HTTP API in
/// this crate.
#[async_trait]
pub trait Forge: Send + Sync + 'static {
    async fn open_pr(&self, req: OpenPrRequest<'_>) -> Result<String, VcsError>;
    async fn poll_checks(&self, pr_url: &str) -> ChecksStatus;
}

/// Always opens a synthetic PR URL and returns a scripted check status,
/// defaulting to `Passed` so worker-turn tests don't need to configure it.
pub struct FakeForge {
    next_pr_number: Mutex<u64>,
    checks: Mutex<HashMap<String, ChecksStatus>>,
}

impl FakeForge {
    pub fn new() -> Self {
        Self { next_pr_number: Mutex::new(1), checks: Mutex::new(HashMap::new()) }
    }

    pub fn set_checks(&self, pr_url: impl Into<String>, status: ChecksStatus) {
        self.checks.lock().insert(pr_url.into(), status);
    }
}

impl Default for FakeForge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Forge for FakeForge {
    async fn open_pr(&self, req: OpenPrRequest<'_>) -> Result<String, VcsError> {
        let mut n = self.next_pr_number.lock();
        let url = format!("https://github.com/talon/fake-repo/pull/{n}");
        *n += 1;
        let _ = (req.branch, req.base, req.title, req.body);
        Ok(url)
    }

    async fn poll_checks(&self, pr_url: &str) -> ChecksStatus {
        self.checks.lock().get(pr_url).cloned().unwrap_or(ChecksStatus::Passed)
    }
}

#[cfg(test)]
#[path = "vcs_tests.rs"]
mod tests;
