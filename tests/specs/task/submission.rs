//! Task orchestrator specs driven end-to-end through the CLI and a real
//! (disposable) git repo, with a scripted fake engine standing in for the
//! agent engine.

use crate::prelude::*;

const SUCCEEDING_ENGINE: &str = "#!/bin/sh\ncat >/dev/null\necho '{\"summary\": \"did the work\", \"state\": \"done\"}'\n";
const FAILING_ENGINE: &str = "#!/bin/sh\ncat >/dev/null\nexit 1\n";

#[test]
fn submitted_task_runs_to_done_in_a_real_worktree() {
    let world = World::new();
    let repo = world.init_repo();
    let engine = world.fake_engine("fake-engine.sh", SUCCEEDING_ENGINE);

    let world = world
        .env("TALON_REPO_PATH", repo.to_string_lossy())
        .env("TALON_ENGINE_COMMAND", engine.to_string_lossy())
        .env("TALON_TASK_AUTO_COMMIT", "false")
        .env("TALON_CHAT_TASK_UPDATE_POLL_MS", "500");

    let submit = world.cli().args(&["task", "submit", "--session", "cli", "add a health check"]).passes();
    let stdout = submit.stdout();
    let task_id = stdout.trim().strip_prefix("Queued task ").and_then(|s| s.strip_suffix(".")).unwrap().to_string();
    assert!(!task_id.is_empty(), "expected a task id in: {stdout}");

    wait_until(
        || {
            let show = world.cli().args(&["task", "show", &task_id]).passes();
            let out = show.stdout();
            out.contains("status: done").then_some(())
        },
        "task to reach done",
    );

    world.cli().args(&["task", "show", &task_id]).passes().stdout_has("status: done").stdout_has("summary: did the work");

    world.cli().args(&["task", "list"]).passes().stdout_has("done");
}

#[test]
fn task_exhausts_retries_and_fails() {
    let world = World::new();
    let repo = world.init_repo();
    let engine = world.fake_engine("fake-engine-fail.sh", FAILING_ENGINE);

    let world = world
        .env("TALON_REPO_PATH", repo.to_string_lossy())
        .env("TALON_ENGINE_COMMAND", engine.to_string_lossy())
        .env("TALON_WORKER_MAX_RETRIES", "1")
        .env("TALON_CHAT_TASK_UPDATE_POLL_MS", "500");

    let submit = world.cli().args(&["task", "submit", "flaky work"]).passes();
    let stdout = submit.stdout();
    let task_id = stdout.trim().strip_prefix("Queued task ").and_then(|s| s.strip_suffix(".")).unwrap().to_string();

    wait_until(
        || {
            let show = world.cli().args(&["task", "show", &task_id]).passes();
            let out = show.stdout();
            (out.contains("status: failed")).then_some(())
        },
        "task to reach failed after exhausting retries",
    );

    world
        .cli()
        .args(&["task", "show", &task_id])
        .passes()
        .stdout_has("status: failed")
        .stdout_has("retries: 2/1")
        .stdout_has("escalation_required: true");
}

#[test]
fn submit_without_a_registered_repo_gets_remediation_reply() {
    let world = World::new();
    world.cli().args(&["task", "submit", "do something"]).fails().stderr_has("Error:");
}
