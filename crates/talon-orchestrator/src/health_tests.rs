use super::*;
use talon_core::{TaskSource, TaskStatus};

fn task(id: &str, status: TaskStatus, now_ms: u64) -> TaskRecord {
    let mut t = TaskRecord::new(TaskId::new(id), "do the thing", "default", TaskSource::Transport, now_ms);
    if status != TaskStatus::Queued {
        t.status = status;
    }
    t
}

fn thresholds() -> HealthThresholds {
    HealthThresholds { stale_running_ms: 1_000, stale_queued_ms: 1_000, stale_worktree_ms: 1_000 }
}

#[test]
fn empty_state_is_ok() {
    let snapshot = evaluate(&HashMap::new(), &HashSet::new(), &[], 0, &thresholds());
    assert_eq!(snapshot.status, "ok");
    assert!(snapshot.issues.is_empty());
}

#[test]
fn running_task_without_worker_slot_is_orphaned() {
    let mut tasks = HashMap::new();
    let t = task("task-1", TaskStatus::Running, 0);
    tasks.insert(t.id.clone(), t);

    let snapshot = evaluate(&tasks, &HashSet::new(), &[], 0, &thresholds());

    assert_eq!(snapshot.status, "degraded");
    assert!(snapshot.issues.iter().any(|i| i.kind == HealthIssueKind::OrphanedRunningTask));
}

#[test]
fn worker_slot_without_task_is_orphaned() {
    let tasks = HashMap::new();
    let mut running = HashSet::new();
    running.insert(TaskId::new("ghost"));

    let snapshot = evaluate(&tasks, &running, &[], 0, &thresholds());

    assert!(snapshot.issues.iter().any(|i| i.kind == HealthIssueKind::OrphanedWorkerSlot));
}

#[test]
fn worker_slot_status_mismatch_when_task_not_running() {
    let mut tasks = HashMap::new();
    let t = task("task-1", TaskStatus::Done, 0);
    let id = t.id.clone();
    tasks.insert(id.clone(), t);
    let mut running = HashSet::new();
    running.insert(id);

    let snapshot = evaluate(&tasks, &running, &[], 0, &thresholds());

    assert!(snapshot.issues.iter().any(|i| i.kind == HealthIssueKind::WorkerSlotStatusMismatch));
}

#[test]
fn stuck_running_task_past_threshold() {
    let mut tasks = HashMap::new();
    let t = task("task-1", TaskStatus::Running, 0);
    let id = t.id.clone();
    tasks.insert(id.clone(), t);
    let mut running = HashSet::new();
    running.insert(id);

    let snapshot = evaluate(&tasks, &running, &[], 5_000, &thresholds());

    assert!(snapshot.issues.iter().any(|i| i.kind == HealthIssueKind::StuckRunningTask));
}

#[test]
fn stale_queued_task_past_threshold() {
    let mut tasks = HashMap::new();
    let t = task("task-1", TaskStatus::Queued, 0);
    tasks.insert(t.id.clone(), t);

    let snapshot = evaluate(&tasks, &HashSet::new(), &[], 5_000, &thresholds());

    assert!(snapshot.issues.iter().any(|i| i.kind == HealthIssueKind::StaleQueuedTask));
}

#[test]
fn stale_unreferenced_worktree_is_flagged() {
    let worktrees = vec![WorktreeListing { path: "/tmp/worktrees/default-task-1".into(), mtime_ms: 0 }];
    let snapshot = evaluate(&HashMap::new(), &HashSet::new(), &worktrees, 5_000, &thresholds());
    assert!(snapshot.issues.iter().any(|i| i.kind == HealthIssueKind::StaleWorktree));
}

#[test]
fn referenced_worktree_is_not_flagged_even_when_old() {
    let mut tasks = HashMap::new();
    let mut t = task("task-1", TaskStatus::Running, 0);
    t.worktree_path = Some("/tmp/worktrees/default-task-1".to_string());
    let id = t.id.clone();
    tasks.insert(id.clone(), t);
    let mut running = HashSet::new();
    running.insert(id);
    let worktrees = vec![WorktreeListing { path: "/tmp/worktrees/default-task-1".into(), mtime_ms: 0 }];

    let snapshot = evaluate(&tasks, &running, &worktrees, 5_000, &thresholds());

    assert!(!snapshot.issues.iter().any(|i| i.kind == HealthIssueKind::StaleWorktree));
}
