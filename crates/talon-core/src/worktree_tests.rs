// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn default_status_is_creating() {
    assert_eq!(WorktreeStatus::default(), WorktreeStatus::Creating);
}

#[test]
fn display_formats_each_variant() {
    assert_eq!(WorktreeStatus::Creating.to_string(), "creating");
    assert_eq!(WorktreeStatus::Ready.to_string(), "ready");
    assert_eq!(
        WorktreeStatus::InUse { task_id: "task-1".to_string() }.to_string(),
        "in_use(task-1)"
    );
    assert_eq!(WorktreeStatus::Cleaning.to_string(), "cleaning");
    assert_eq!(
        WorktreeStatus::Failed { reason: "boom".to_string() }.to_string(),
        "failed: boom"
    );
}

#[test]
fn worktree_id_short_truncates() {
    let id = WorktreeId::new("repo-task-0123456789");
    assert_eq!(id.short(8), "repo-tas");
}
