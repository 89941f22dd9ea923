// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolves a `repo_id` to the on-disk git repository the Worktree Manager
//! checks worktrees out of.

use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// The git repository root backing a given `repo_id`.
#[derive(Debug, Clone)]
pub struct RepoEntry {
    pub repo_id: String,
    pub path: PathBuf,
    pub default_branch: String,
    pub remote_name: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepoRegistryError {
    #[error("repo_not_found: {0}")]
    NotFound(String),
}

/// The default repo_id used when a task submission omits one.
pub const DEFAULT_REPO_ID: &str = "default";

#[derive(Debug, Default)]
pub struct RepoRegistry {
    entries: HashMap<String, RepoEntry>,
}

impl RepoRegistry {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn register(&mut self, entry: RepoEntry) {
        self.entries.insert(entry.repo_id.clone(), entry);
    }

    pub fn get(&self, repo_id: &str) -> Result<&RepoEntry, RepoRegistryError> {
        self.entries.get(repo_id).ok_or_else(|| RepoRegistryError::NotFound(repo_id.to_string()))
    }

    /// Resolve an optional explicit repo id, falling back to the registered
    /// `"default"` entry when none was given.
    pub fn resolve(&self, repo_id: Option<&str>) -> Result<&RepoEntry, RepoRegistryError> {
        self.get(repo_id.unwrap_or(DEFAULT_REPO_ID))
    }
}

#[cfg(test)]
#[path = "repo_registry_tests.rs"]
mod tests;
