use super::*;
use talon_core::{TaskSource, TaskStatus};
use tempfile::tempdir;

fn sample_task() -> TaskRecord {
    TaskRecord::new(talon_core::TaskId::new("task-1"), "do the thing", "default", TaskSource::Transport, 100)
}

#[test]
fn missing_snapshot_loads_as_empty() {
    let dir = tempdir().unwrap();
    let store = TaskStore::new(dir.path());
    let snapshot = store.load().unwrap();
    assert_eq!(snapshot.version, CURRENT_TASK_SNAPSHOT_VERSION);
    assert!(snapshot.tasks.is_empty());
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempdir().unwrap();
    let store = TaskStore::new(dir.path());
    let snapshot = TaskSnapshot { version: CURRENT_TASK_SNAPSHOT_VERSION, tasks: vec![sample_task()] };
    store.save(&snapshot).unwrap();
    let loaded = store.load().unwrap();
    assert_eq!(loaded.tasks.len(), 1);
    assert_eq!(loaded.tasks[0].id, sample_task().id);
    assert_eq!(loaded.tasks[0].status, TaskStatus::Queued);
}

#[test]
fn v1_snapshot_missing_artifacts_normalizes_to_v2_with_empty_artifacts() {
    let dir = tempdir().unwrap();
    let store = TaskStore::new(dir.path());
    let raw = serde_json::json!({
        "version": 1,
        "tasks": [{
            "id": "task-1",
            "source": "transport",
            "text": "legacy task",
            "repo_id": "default",
            "status": "done",
            "retry_count": 0,
            "max_retries": 2,
            "escalation_required": false,
            "cancel_requested": false,
            "created_at_ms": 1,
            "updated_at_ms": 2
        }]
    });
    write_json_atomic(&store.path(), &raw).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.version, CURRENT_TASK_SNAPSHOT_VERSION);
    assert_eq!(loaded.tasks.len(), 1);
    assert!(loaded.tasks[0].artifacts.is_empty());
    assert!(loaded.tasks[0].assigned_session.is_none());

    // Writing it back persists as v2, never downgraded.
    store.save(&loaded).unwrap();
    let reloaded: serde_json::Value = read_json_or_none(&store.path()).unwrap().unwrap();
    assert_eq!(reloaded["version"], 2);
}

#[test]
fn corrupt_snapshot_loads_as_empty_rather_than_erroring() {
    let dir = tempdir().unwrap();
    let store = TaskStore::new(dir.path());
    std::fs::create_dir_all(dir.path().join("tasks")).unwrap();
    std::fs::write(store.path(), b"{ not json").unwrap();
    let loaded = store.load().unwrap();
    assert!(loaded.tasks.is_empty());
}
