// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable persistence for the task orchestrator's snapshot:
//! `{data_dir}/tasks/state.json`, a single versioned document holding every
//! `TaskRecord`. Legacy v1 records (no `artifacts[]`, no `assigned_session`)
//! are normalized to v2 on load; the file is never written back downgraded.

use crate::atomic::{read_json_or_none, write_json_atomic, StoreIoError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use talon_core::TaskRecord;

pub const CURRENT_TASK_SNAPSHOT_VERSION: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum TaskStoreError {
    #[error(transparent)]
    Io(#[from] StoreIoError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub version: u32,
    pub tasks: Vec<TaskRecord>,
}

impl TaskSnapshot {
    pub fn empty() -> Self {
        Self { version: CURRENT_TASK_SNAPSHOT_VERSION, tasks: Vec::new() }
    }
}

pub struct TaskStore {
    data_dir: PathBuf,
}

impl TaskStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    fn path(&self) -> PathBuf {
        self.data_dir.join("tasks").join("state.json")
    }

    /// Load the task snapshot, normalizing a legacy v1 document (or a
    /// corrupt one) to a clean v2 `TaskSnapshot`. Never returns an error for
    /// a missing or corrupt file — both read back as an empty snapshot, per
    /// the "truncate and restart" non-goal on manifest durability.
    pub fn load(&self) -> Result<TaskSnapshot, TaskStoreError> {
        let path = self.path();
        let raw: Option<serde_json::Value> = read_json_or_none(&path)?;
        let Some(raw) = raw else {
            return Ok(TaskSnapshot::empty());
        };
        Ok(normalize(raw))
    }

    pub fn save(&self, snapshot: &TaskSnapshot) -> Result<(), TaskStoreError> {
        Ok(write_json_atomic(&self.path(), snapshot)?)
    }
}

/// Normalize a raw JSON task snapshot (v1 or v2) to the current shape.
///
/// v1 task records may be missing `artifacts` (treated as `[]`) and
/// `assigned_session` (treated as absent); any other field defaults already
/// flow through `TaskRecord`'s own `#[serde(default)]` attributes, so the
/// only structural work here is making sure every task has a present,
/// possibly-empty `artifacts` array before deserializing into `TaskRecord`.
fn normalize(mut raw: serde_json::Value) -> TaskSnapshot {
    if let Some(tasks) = raw.get_mut("tasks").and_then(|t| t.as_array_mut()) {
        for task in tasks.iter_mut() {
            if let Some(obj) = task.as_object_mut() {
                obj.entry("artifacts").or_insert_with(|| serde_json::json!([]));
                obj.entry("children").or_insert_with(|| serde_json::json!([]));
                obj.entry("events").or_insert_with(|| serde_json::json!([]));
            }
        }
    }
    match serde_json::from_value::<TaskSnapshot>(raw) {
        Ok(mut snapshot) => {
            snapshot.version = CURRENT_TASK_SNAPSHOT_VERSION;
            snapshot
        }
        Err(_) => TaskSnapshot::empty(),
    }
}

#[cfg(test)]
#[path = "task_store_tests.rs"]
mod tests;
