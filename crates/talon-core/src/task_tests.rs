// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn new_task() -> TaskRecord {
    TaskRecord::new(TaskId::new("task-1"), "do the thing", "default", TaskSource::Transport, 0)
}

#[yare::parameterized(
    queued_to_running = { TaskStatus::Queued, TaskStatus::Running, true },
    queued_to_cancelled = { TaskStatus::Queued, TaskStatus::Cancelled, true },
    queued_to_done = { TaskStatus::Queued, TaskStatus::Done, false },
    running_to_done = { TaskStatus::Running, TaskStatus::Done, true },
    running_to_failed = { TaskStatus::Running, TaskStatus::Failed, true },
    running_to_blocked = { TaskStatus::Running, TaskStatus::Blocked, true },
    running_to_queued = { TaskStatus::Running, TaskStatus::Queued, true },
    done_to_queued_retry_escape = { TaskStatus::Done, TaskStatus::Queued, true },
    failed_to_queued_retry_escape = { TaskStatus::Failed, TaskStatus::Queued, true },
    cancelled_to_running_disallowed = { TaskStatus::Cancelled, TaskStatus::Running, false },
    cancelled_to_queued_resubmit = { TaskStatus::Cancelled, TaskStatus::Queued, true },
    blocked_to_running_disallowed = { TaskStatus::Blocked, TaskStatus::Running, false },
)]
fn transition_table(from: TaskStatus, to: TaskStatus, allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[test]
fn transition_rejects_invalid_edge() {
    let mut task = new_task();
    let err = task.transition(TaskStatus::Done, 10).unwrap_err();
    assert_eq!(
        err,
        TaskError::InvalidTransition {
            from: TaskStatus::Queued,
            to: TaskStatus::Done
        }
    );
    assert_eq!(task.status, TaskStatus::Queued);
}

#[test]
fn running_sets_started_at_once() {
    let mut task = new_task();
    task.transition(TaskStatus::Running, 10).unwrap();
    assert_eq!(task.started_at_ms, Some(10));
    task.transition(TaskStatus::Queued, 20).unwrap();
    task.transition(TaskStatus::Running, 30).unwrap();
    assert_eq!(task.started_at_ms, Some(10), "started_at should not move on re-entry");
}

#[test]
fn terminal_transition_sets_finished_at_and_non_terminal_clears_it() {
    let mut task = new_task();
    task.transition(TaskStatus::Running, 10).unwrap();
    task.transition(TaskStatus::Done, 20).unwrap();
    assert_eq!(task.finished_at_ms, Some(20));

    task.transition(TaskStatus::Queued, 30).unwrap();
    assert_eq!(task.finished_at_ms, None);
}

#[test]
fn transition_appends_status_transition_event() {
    let mut task = new_task();
    task.transition(TaskStatus::Running, 5).unwrap();
    let last = task.events.last().unwrap();
    assert_eq!(last.kind, "status_transition");
}

#[test]
fn latest_pull_request_returns_most_recent() {
    let mut task = new_task();
    task.push_artifact(TaskArtifact::PullRequest {
        pr_url: "https://github.com/acme/repo/pull/1".to_string(),
        pr_title: "first".to_string(),
    });
    task.push_artifact(TaskArtifact::PullRequest {
        pr_url: "https://github.com/acme/repo/pull/2".to_string(),
        pr_title: "second".to_string(),
    });
    let (url, title) = task.latest_pull_request().unwrap();
    assert_eq!(url, "https://github.com/acme/repo/pull/2");
    assert_eq!(title, "second");
}

#[test]
fn fanout_parent_detected_by_children() {
    let mut task = new_task();
    assert!(!task.is_fanout_parent());
    task.children.push(TaskId::new("child-1"));
    assert!(task.is_fanout_parent());
}

#[test]
fn legacy_v1_snapshot_without_artifacts_deserializes_with_empty_vec() {
    let v1 = serde_json::json!({
        "id": "task-1",
        "source": "transport",
        "text": "hi",
        "repo_id": "default",
        "status": "queued",
        "created_at_ms": 0,
        "updated_at_ms": 0
    });
    let task: TaskRecord = serde_json::from_value(v1).unwrap();
    assert!(task.artifacts.is_empty());
    assert_eq!(task.max_retries, DEFAULT_MAX_RETRIES);
}
