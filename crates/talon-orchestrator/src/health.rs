// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A pure function over orchestrator state that surfaces invariant
//! violations: tasks the scheduler thinks are running but nothing backs,
//! worker slots with nothing to show for them, and things that have sat too
//! long.

use crate::worktree::WorktreeListing;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use talon_core::{TaskId, TaskRecord, TaskStatus};

#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    pub stale_running_ms: u64,
    pub stale_queued_ms: u64,
    pub stale_worktree_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthIssueKind {
    OrphanedRunningTask,
    OrphanedWorkerSlot,
    WorkerSlotStatusMismatch,
    StuckRunningTask,
    StaleQueuedTask,
    StaleWorktree,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthIssue {
    pub kind: HealthIssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<String>,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthMetrics {
    pub queued: usize,
    pub running: usize,
    pub blocked: usize,
    pub done: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: String,
    pub metrics: HealthMetrics,
    pub issues: Vec<HealthIssue>,
}

pub fn evaluate(
    tasks: &HashMap<TaskId, TaskRecord>,
    running_ids: &HashSet<TaskId>,
    worktrees: &[WorktreeListing],
    now_ms: u64,
    thresholds: &HealthThresholds,
) -> HealthSnapshot {
    let mut metrics = HealthMetrics::default();
    let mut issues = Vec::new();

    for task in tasks.values() {
        match task.status {
            TaskStatus::Queued => metrics.queued += 1,
            TaskStatus::Running => metrics.running += 1,
            TaskStatus::Blocked => metrics.blocked += 1,
            TaskStatus::Done => metrics.done += 1,
            TaskStatus::Failed => metrics.failed += 1,
            TaskStatus::Cancelled => metrics.cancelled += 1,
        }

        if task.status == TaskStatus::Running && !running_ids.contains(&task.id) {
            issues.push(HealthIssue {
                kind: HealthIssueKind::OrphanedRunningTask,
                task_id: Some(task.id.to_string()),
                worktree_path: None,
                detail: format!("task {} is running but has no worker slot", task.id),
            });
        }

        if task.status == TaskStatus::Running {
            let age_ms = now_ms.saturating_sub(task.updated_at_ms);
            if age_ms > thresholds.stale_running_ms {
                issues.push(HealthIssue {
                    kind: HealthIssueKind::StuckRunningTask,
                    task_id: Some(task.id.to_string()),
                    worktree_path: None,
                    detail: format!("task {} has been running for {age_ms}ms", task.id),
                });
            }
        }

        if task.status == TaskStatus::Queued {
            let age_ms = now_ms.saturating_sub(task.created_at_ms);
            if age_ms > thresholds.stale_queued_ms {
                issues.push(HealthIssue {
                    kind: HealthIssueKind::StaleQueuedTask,
                    task_id: Some(task.id.to_string()),
                    worktree_path: None,
                    detail: format!("task {} has been queued for {age_ms}ms", task.id),
                });
            }
        }
    }

    for id in running_ids {
        match tasks.get(id) {
            None => issues.push(HealthIssue {
                kind: HealthIssueKind::OrphanedWorkerSlot,
                task_id: Some(id.to_string()),
                worktree_path: None,
                detail: format!("worker slot for {id} has no matching task"),
            }),
            Some(task) if task.status != TaskStatus::Running => issues.push(HealthIssue {
                kind: HealthIssueKind::WorkerSlotStatusMismatch,
                task_id: Some(id.to_string()),
                worktree_path: None,
                detail: format!("worker slot for {id} but task status is {}", task.status),
            }),
            Some(_) => {}
        }
    }

    let referenced_paths: HashSet<&str> =
        tasks.values().filter(|t| matches!(t.status, TaskStatus::Queued | TaskStatus::Running)).filter_map(|t| t.worktree_path.as_deref()).collect();

    for worktree in worktrees {
        let path_str = worktree.path.to_string_lossy();
        if referenced_paths.contains(path_str.as_ref()) {
            continue;
        }
        let age_ms = now_ms.saturating_sub(worktree.mtime_ms);
        if age_ms > thresholds.stale_worktree_ms {
            issues.push(HealthIssue {
                kind: HealthIssueKind::StaleWorktree,
                task_id: None,
                worktree_path: Some(path_str.to_string()),
                detail: format!("worktree {path_str} is {age_ms}ms old and unreferenced"),
            });
        }
    }

    let status = if issues.is_empty() { "ok" } else { "degraded" }.to_string();
    HealthSnapshot { status, metrics, issues }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
