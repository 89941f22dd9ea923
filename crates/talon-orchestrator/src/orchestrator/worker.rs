// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One worker-turn attempt at a task: worktree, engine call, commit/PR,
//! retry-or-finalize, and the fan-out parent rollup that follows.

use super::TaskOrchestrator;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use talon_adapters::vcs::{self, ChecksStatus, OpenPrRequest};
use talon_adapters::{Engine, Forge};
use talon_core::{Clock, EngineInput, IdGen, TaskArtifact, TaskEvent, TaskId, TaskStatus};
use tracing::{info, warn};

const WORKER_PROMPT_PREAMBLE: &str = "Complete the following task in this worktree. \
When finished, reply with a JSON object: \
{\"summary\": string, \"state\": \"done\"|\"blocked\", \"commit_message\"?: string, \
\"pr_title\"?: string, \"pr_body\"?: string, \"test_output\"?: string}.\n\nTask: ";

#[derive(Debug, Deserialize, Default)]
struct WorkerReply {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    commit_message: Option<String>,
    #[serde(default)]
    pr_title: Option<String>,
    #[serde(default)]
    pr_body: Option<String>,
    #[serde(default)]
    test_output: Option<String>,
}

/// Extract the largest balanced `{...}` substring and parse it, falling
/// back to treating the whole text as a plain "done" summary.
fn parse_worker_reply(text: &str) -> WorkerReply {
    let bytes = text.as_bytes();
    let mut best: Option<(usize, usize)> = None;
    let mut depth = 0i32;
    let mut start = None;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        let len = i - s;
                        if best.map(|(bs, be)| be - bs < len).unwrap_or(true) {
                            best = Some((s, i + 1));
                        }
                    }
                }
            }
            _ => {}
        }
    }
    if let Some((s, e)) = best {
        if let Ok(value) = serde_json::from_str::<Value>(&text[s..e]) {
            if let Ok(reply) = serde_json::from_value::<WorkerReply>(value) {
                if !reply.summary.is_empty() {
                    return reply;
                }
            }
        }
    }
    WorkerReply { summary: text.trim().to_string(), state: Some("done".to_string()), ..Default::default() }
}

pub(crate) async fn run_turn<C: Clock, G: IdGen>(orchestrator: &Arc<TaskOrchestrator<C, G>>, task_id: TaskId) {
    let outcome = run_attempt(orchestrator, &task_id).await;
    finalize_attempt(orchestrator, &task_id, outcome);
    roll_up_parent_if_any(orchestrator, &task_id);
    orchestrator.persist_ignore_error();
    orchestrator.pump();
}

enum AttemptOutcome {
    Done,
    Blocked,
    Cancelled,
    Failed(String),
}

async fn run_attempt<C: Clock, G: IdGen>(orchestrator: &Arc<TaskOrchestrator<C, G>>, task_id: &TaskId) -> AttemptOutcome {
    let now_ms = orchestrator.clock.now_ms();
    let (repo_id, text, session_key) = {
        let mut state = orchestrator.state.lock();
        let Some(task) = state.tasks.get_mut(task_id) else {
            return AttemptOutcome::Failed("task disappeared before it could run".to_string());
        };
        if let Err(e) = task.transition(TaskStatus::Running, now_ms) {
            return AttemptOutcome::Failed(e.to_string());
        }
        task.push_event(TaskEvent::note(now_ms, "started", "worker attempt started"));
        (task.repo_id.clone(), task.text.clone(), task.session_key.clone())
    };
    let _ = orchestrator.persist();

    let repo = {
        let repos = orchestrator.repos.lock();
        match repos.get(&repo_id) {
            Ok(entry) => entry.clone(),
            Err(e) => return AttemptOutcome::Failed(e.to_string()),
        }
    };

    let assigned_session = orchestrator.get_task(task_id).and_then(|t| t.assigned_session.clone()).unwrap_or_default();
    let created = match orchestrator.worktrees.create_worktree(&repo.path, &repo.repo_id, task_id, &repo.default_branch, repo.remote_name.as_deref()).await {
        Ok(created) => created,
        Err(e) => return AttemptOutcome::Failed(format!("worktree creation failed: {e}")),
    };

    orchestrator.mutate_task(task_id, |task| {
        task.worktree_path = Some(created.path.to_string_lossy().to_string());
        task.branch = Some(created.branch.clone());
        task.push_artifact(TaskArtifact::Launcher {
            worktree_path: created.path.to_string_lossy().to_string(),
            branch: created.branch.clone(),
            assigned_session: assigned_session.clone(),
        });
    });

    let input = EngineInput {
        session_key: session_key.unwrap_or_else(|| format!("task:{task_id}")),
        route: format!("task:{repo_id}:{task_id}"),
        text: format!("{WORKER_PROMPT_PREAMBLE}{text}"),
        sender_id: "orchestrator".to_string(),
        metadata: HashMap::new(),
        context_lines: Vec::new(),
        raw_event: None,
        recent_attachments: Vec::new(),
    };

    if orchestrator.get_task(task_id).map(|t| t.cancel_requested).unwrap_or(false) {
        return AttemptOutcome::Cancelled;
    }

    let cancel = tokio_util::sync::CancellationToken::new();
    let output = match orchestrator.engine.complete(input, cancel).await {
        Ok(output) => output,
        Err(e) => return AttemptOutcome::Failed(format!("engine call failed: {e}")),
    };

    if orchestrator.get_task(task_id).map(|t| t.cancel_requested).unwrap_or(false) {
        return AttemptOutcome::Cancelled;
    }

    let reply = parse_worker_reply(&output.text);
    orchestrator.mutate_task(task_id, |task| {
        task.push_artifact(TaskArtifact::Summary { text: reply.summary.clone() });
        if let Some(test_output) = &reply.test_output {
            task.push_artifact(TaskArtifact::TestOutput { text: test_output.clone() });
        }
    });

    match vcs::changed_files(&created.path).await {
        Ok(files) if !files.is_empty() => {
            orchestrator.mutate_task(task_id, |task| task.push_artifact(TaskArtifact::FileChanges { files_changed: files }));
        }
        Ok(_) => {}
        Err(e) => warn!(task_id = %task_id, error = %e, "changed-files probe failed"),
    }

    if reply.state.as_deref() == Some("blocked") {
        return AttemptOutcome::Blocked;
    }

    if !orchestrator.config.task_auto_commit {
        return AttemptOutcome::Done;
    }

    let commit_message = reply.commit_message.clone().unwrap_or_else(|| format!("talon: {}", reply.summary));
    let commit_sha = match vcs::commit_all(&created.path, &commit_message).await {
        Ok(sha) => sha,
        Err(e) => return AttemptOutcome::Failed(format!("commit failed: {e}")),
    };
    let Some(commit_sha) = commit_sha else {
        return AttemptOutcome::Done;
    };
    orchestrator.mutate_task(task_id, |task| task.push_artifact(TaskArtifact::GitCommit { commit_sha: commit_sha.clone(), message: commit_message.clone() }));

    if !orchestrator.config.task_auto_pr {
        return AttemptOutcome::Done;
    }

    if let Err(e) = vcs::push_branch(&created.path, &created.branch).await {
        return AttemptOutcome::Failed(format!("push failed: {e}"));
    }

    let pr_title = reply.pr_title.clone().unwrap_or_else(|| reply.summary.clone());
    let pr_body = reply.pr_body.clone().unwrap_or_default();
    let pr_url = match orchestrator
        .forge
        .open_pr(OpenPrRequest { branch: &created.branch, base: &repo.default_branch, title: &pr_title, body: &pr_body })
        .await
    {
        Ok(url) => url,
        Err(e) => return AttemptOutcome::Failed(format!("opening PR failed: {e}")),
    };
    orchestrator.mutate_task(task_id, |task| task.push_artifact(TaskArtifact::PullRequest { pr_url: pr_url.clone(), pr_title: pr_title.clone() }));

    let checks_deadline = tokio::time::Instant::now() + Duration::from_millis(orchestrator.config.pr_check_timeout_ms);
    let poll_interval = Duration::from_millis(orchestrator.config.pr_check_poll_ms.max(1));
    let final_status = loop {
        let status = orchestrator.forge.poll_checks(&pr_url).await;
        if status != ChecksStatus::Pending || tokio::time::Instant::now() >= checks_deadline {
            break status;
        }
        if orchestrator.get_task(task_id).map(|t| t.cancel_requested).unwrap_or(false) {
            return AttemptOutcome::Cancelled;
        }
        tokio::time::sleep(poll_interval).await;
    };

    let passed = final_status == ChecksStatus::Passed;
    orchestrator.mutate_task(task_id, |task| {
        task.push_artifact(TaskArtifact::Checks { checks_summary: format!("{final_status:?}"), passed });
    });

    if !passed {
        orchestrator.mutate_task(task_id, |task| task.escalation_required = true);
        return AttemptOutcome::Blocked;
    }

    AttemptOutcome::Done
}

fn finalize_attempt<C: Clock, G: IdGen>(orchestrator: &Arc<TaskOrchestrator<C, G>>, task_id: &TaskId, outcome: AttemptOutcome) {
    let now_ms = orchestrator.clock.now_ms();
    let worktree_path = orchestrator.get_task(task_id).and_then(|t| t.worktree_path.clone());
    let branch = orchestrator.get_task(task_id).and_then(|t| t.branch.clone());

    let terminal = {
        let mut state = orchestrator.state.lock();
        let Some(task) = state.tasks.get_mut(task_id) else { return };
        state.running.remove(task_id);
        match outcome {
            AttemptOutcome::Done => {
                let _ = task.transition(TaskStatus::Done, now_ms);
                task.status
            }
            AttemptOutcome::Blocked => {
                let _ = task.transition(TaskStatus::Blocked, now_ms);
                task.status
            }
            AttemptOutcome::Cancelled => {
                let _ = task.transition(TaskStatus::Cancelled, now_ms);
                task.status
            }
            AttemptOutcome::Failed(reason) => {
                task.error = Some(reason.clone());
                task.push_artifact(TaskArtifact::Error { message: reason });
                task.retry_count += 1;
                if task.retry_count <= task.max_retries {
                    let _ = task.transition(TaskStatus::Queued, now_ms);
                    task.push_event(TaskEvent::note(now_ms, "retry_scheduled", format!("retry {} of {}", task.retry_count, task.max_retries)));
                    state.queue.push_back(task_id.clone());
                } else {
                    task.escalation_required = true;
                    let _ = task.transition(TaskStatus::Failed, now_ms);
                }
                task.status
            }
        }
    };

    info!(task_id = %task_id, status = %terminal, "worker attempt finished");

    if !matches!(terminal, TaskStatus::Done | TaskStatus::Failed | TaskStatus::Blocked | TaskStatus::Cancelled) {
        return;
    }
    let should_clean = match terminal {
        TaskStatus::Done | TaskStatus::Cancelled => true,
        TaskStatus::Failed | TaskStatus::Blocked => orchestrator.config.failed_worktree_retention_hours == 0,
        _ => false,
    };
    if !orchestrator.config.task_autocleanup {
        return;
    }
    if should_clean {
        if let (Some(path), Some(branch)) = (worktree_path, branch) {
            let repo_id = orchestrator.get_task(task_id).map(|t| t.repo_id.clone()).unwrap_or_default();
            let repo_path = orchestrator.repos.lock().get(&repo_id).map(|r| r.path.clone());
            if let Some(repo_path) = repo_path {
                // Fire-and-forget: cleanup must never fail the orchestrator.
                let path = std::path::PathBuf::from(path);
                let mgr_root = orchestrator.worktrees.root().to_path_buf();
                tokio::spawn(async move {
                    let manager = crate::worktree::WorktreeManager::new(mgr_root);
                    manager.cleanup_worktree(&repo_path, &path, &branch).await;
                });
            }
        }
    }
}

fn roll_up_parent_if_any<C: Clock, G: IdGen>(orchestrator: &Arc<TaskOrchestrator<C, G>>, task_id: &TaskId) {
    let Some(parent_id) = orchestrator.get_task(task_id).and_then(|t| t.parent_task_id.clone()) else { return };
    let now_ms = orchestrator.clock.now_ms();
    let mut state = orchestrator.state.lock();
    let children: Vec<TaskId> = match state.tasks.get(&parent_id) {
        Some(parent) => parent.children.clone(),
        None => return,
    };
    let statuses: Vec<TaskStatus> = children.iter().filter_map(|c| state.tasks.get(c).map(|t| t.status)).collect();
    let all_done = statuses.iter().all(|s| *s == TaskStatus::Done);
    let any_failed = statuses.iter().any(|s| *s == TaskStatus::Failed);

    let Some(parent) = state.tasks.get_mut(&parent_id) else { return };
    if parent.status == TaskStatus::Done || parent.status == TaskStatus::Failed {
        return;
    }
    if any_failed {
        parent.escalation_required = true;
        let _ = parent.transition(TaskStatus::Failed, now_ms);
    } else if all_done {
        let _ = parent.transition(TaskStatus::Done, now_ms);
        parent.push_artifact(TaskArtifact::Summary { text: format!("All {} child tasks completed.", children.len()) });
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
