// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The bounded-concurrency task scheduler: submit, retry, cancel, pump, and
//! the periodic maintenance sweep. Worker-turn execution itself lives in
//! [`crate::orchestrator::worker`].

mod worker;

use crate::health::{self, HealthSnapshot, HealthThresholds};
use crate::repo_registry::{RepoRegistry, RepoRegistryError};
use crate::worktree::WorktreeManager;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use talon_adapters::{Engine, Forge};
use talon_core::{Clock, IdGen, TaskArtifact, TaskError, TaskId, TaskRecord, TaskSource, TaskStatus};
use talon_storage::{TaskSnapshot, TaskStore, TaskStoreError, CURRENT_TASK_SNAPSHOT_VERSION};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Repo(#[from] RepoRegistryError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Store(#[from] TaskStoreError),
    #[error("task_not_found: {0}")]
    TaskNotFound(TaskId),
    #[error("retry not allowed while task {0} is running")]
    RetryWhileRunning(TaskId),
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_concurrency: usize,
    pub worker_max_retries: u32,
    pub worktree_stale_hours: u64,
    pub failed_worktree_retention_hours: u64,
    pub task_autocleanup: bool,
    pub task_auto_commit: bool,
    pub task_auto_pr: bool,
    pub pr_check_timeout_ms: u64,
    pub pr_check_poll_ms: u64,
    pub maintenance_interval_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            worker_max_retries: 2,
            worktree_stale_hours: 24,
            failed_worktree_retention_hours: 24,
            task_autocleanup: true,
            task_auto_commit: true,
            task_auto_pr: true,
            pr_check_timeout_ms: 10 * 60 * 1000,
            pr_check_poll_ms: 5_000,
            maintenance_interval_ms: 60_000,
        }
    }
}

/// A new piece of work, either a single task or a fan-out parent with one
/// child per prompt in `fanout`.
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub text: String,
    pub repo_id: Option<String>,
    pub session_key: Option<String>,
    pub source: Option<TaskSource>,
    pub fanout: Vec<String>,
}

struct SchedulerState {
    tasks: HashMap<TaskId, TaskRecord>,
    queue: VecDeque<TaskId>,
    running: HashSet<TaskId>,
    last_maintenance_ms: u64,
}

/// Deterministically assigns a session label to a task, used only for
/// display/bookkeeping; it does not create or reserve an `AgentSession`.
pub fn deterministic_assignment(repo_id: &str, task_id: &TaskId, text: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    format!("{repo_id}:{task_id}:{:x}", hasher.finish() & 0xffff)
}

pub struct TaskOrchestrator<C: Clock, G: IdGen> {
    config: OrchestratorConfig,
    state: Mutex<SchedulerState>,
    store: TaskStore,
    repos: Mutex<RepoRegistry>,
    worktrees: WorktreeManager,
    engine: Arc<dyn Engine>,
    forge: Arc<dyn Forge>,
    clock: C,
    id_gen: G,
}

impl<C: Clock, G: IdGen> TaskOrchestrator<C, G> {
    pub fn new(
        config: OrchestratorConfig,
        store: TaskStore,
        repos: RepoRegistry,
        worktrees: WorktreeManager,
        engine: Arc<dyn Engine>,
        forge: Arc<dyn Forge>,
        clock: C,
        id_gen: G,
    ) -> Result<Arc<Self>, OrchestratorError> {
        let snapshot = store.load()?;
        let now_ms = clock.now_ms();
        let mut tasks = HashMap::new();
        for mut task in snapshot.tasks {
            if task.status == TaskStatus::Running {
                task.transition(TaskStatus::Queued, now_ms)?;
                task.push_event(talon_core::TaskEvent::note(now_ms, "recovered", "recovered after restart while running"));
            }
            tasks.insert(task.id.clone(), task);
        }
        let mut queue = VecDeque::new();
        for task in tasks.values() {
            if task.status == TaskStatus::Queued {
                queue.push_back(task.id.clone());
            }
        }
        let orchestrator = Arc::new(Self {
            config,
            state: Mutex::new(SchedulerState { tasks, queue, running: HashSet::new(), last_maintenance_ms: 0 }),
            store,
            repos: Mutex::new(repos),
            worktrees,
            engine,
            forge,
            clock,
            id_gen,
        });
        orchestrator.persist()?;
        Ok(orchestrator)
    }

    fn persist(&self) -> Result<(), OrchestratorError> {
        let state = self.state.lock();
        let snapshot = TaskSnapshot { version: CURRENT_TASK_SNAPSHOT_VERSION, tasks: state.tasks.values().cloned().collect() };
        self.store.save(&snapshot)?;
        Ok(())
    }

    fn persist_ignore_error(&self) {
        if let Err(e) = self.persist() {
            warn!(error = %e, "failed to persist task snapshot");
        }
    }

    /// Mutate one task in place, then persist. A no-op if the task is gone.
    fn mutate_task(&self, id: &TaskId, f: impl FnOnce(&mut TaskRecord)) {
        {
            let mut state = self.state.lock();
            let Some(task) = state.tasks.get_mut(id) else { return };
            f(task);
        }
        self.persist_ignore_error();
    }

    pub fn get_task(&self, id: &TaskId) -> Option<TaskRecord> {
        self.state.lock().tasks.get(id).cloned()
    }

    pub fn list_tasks(&self) -> Vec<TaskRecord> {
        self.state.lock().tasks.values().cloned().collect()
    }

    pub fn health(&self, thresholds: HealthThresholds) -> HealthSnapshot {
        let state = self.state.lock();
        let worktrees = self.worktrees.list_worktrees().unwrap_or_default();
        health::evaluate(&state.tasks, &state.running, &worktrees, self.clock.now_ms(), &thresholds)
    }

    /// Submit a task, or a fan-out parent with one queued child per prompt.
    pub fn submit(self: &Arc<Self>, req: SubmitRequest) -> Result<TaskRecord, OrchestratorError> {
        let now_ms = self.clock.now_ms();
        let repo_id = {
            let repos = self.repos.lock();
            repos.resolve(req.repo_id.as_deref())?.repo_id.clone()
        };
        let source = req.source.unwrap_or(TaskSource::Transport);

        if !req.fanout.is_empty() {
            let parent_id = TaskId::new(self.id_gen.next());
            let mut parent = TaskRecord::new(parent_id.clone(), req.text.clone(), repo_id.clone(), source, now_ms);
            parent.session_key = req.session_key.clone();
            parent.transition(TaskStatus::Blocked, now_ms)?;

            let mut state = self.state.lock();
            for prompt in &req.fanout {
                let child_id = TaskId::new(self.id_gen.next());
                let mut child = TaskRecord::new(child_id.clone(), prompt.clone(), repo_id.clone(), source, now_ms);
                child.parent_task_id = Some(parent_id.clone());
                child.session_key = req.session_key.clone();
                child.assigned_session = Some(deterministic_assignment(&repo_id, &child_id, prompt));
                parent.children.push(child_id.clone());
                state.queue.push_back(child_id.clone());
                state.tasks.insert(child_id, child);
            }
            let result = parent.clone();
            state.tasks.insert(parent_id, parent);
            drop(state);
            self.persist()?;
            self.pump();
            return Ok(result);
        }

        let task_id = TaskId::new(self.id_gen.next());
        let mut task = TaskRecord::new(task_id.clone(), req.text.clone(), repo_id.clone(), source, now_ms);
        task.session_key = req.session_key;
        task.assigned_session = Some(deterministic_assignment(&repo_id, &task_id, &req.text));
        task.max_retries = self.config.worker_max_retries;

        let result = task.clone();
        {
            let mut state = self.state.lock();
            state.queue.push_back(task_id.clone());
            state.tasks.insert(task_id, task);
        }
        self.persist()?;
        self.pump();
        Ok(result)
    }

    /// Retry any non-running task: clears error/escalation, re-enqueues.
    pub fn retry(self: &Arc<Self>, id: &TaskId) -> Result<TaskRecord, OrchestratorError> {
        let now_ms = self.clock.now_ms();
        let result = {
            let mut state = self.state.lock();
            let task = state.tasks.get_mut(id).ok_or_else(|| OrchestratorError::TaskNotFound(id.clone()))?;
            if task.status == TaskStatus::Running {
                return Err(OrchestratorError::RetryWhileRunning(id.clone()));
            }
            task.error = None;
            task.escalation_required = false;
            task.finished_at_ms = None;
            task.transition(TaskStatus::Queued, now_ms)?;
            state.queue.push_back(id.clone());
            task.clone()
        };
        self.persist()?;
        self.pump();
        Ok(result)
    }

    /// Cancel a task: immediate if queued, cooperative if running.
    pub fn cancel(self: &Arc<Self>, id: &TaskId) -> Result<TaskRecord, OrchestratorError> {
        let now_ms = self.clock.now_ms();
        let result = {
            let mut state = self.state.lock();
            let task = state.tasks.get_mut(id).ok_or_else(|| OrchestratorError::TaskNotFound(id.clone()))?;
            match task.status {
                TaskStatus::Queued => {
                    task.transition(TaskStatus::Cancelled, now_ms)?;
                    state.queue.retain(|queued| queued != id);
                }
                TaskStatus::Running => {
                    task.cancel_requested = true;
                }
                _ => {}
            }
            task.clone()
        };
        self.persist()?;
        Ok(result)
    }

    /// Pop queued tasks up to the concurrency bound and launch their
    /// workers. Safe to call repeatedly; idempotent once the queue is
    /// drained or the bound is saturated.
    pub fn pump(self: &Arc<Self>) {
        loop {
            let next = {
                let mut state = self.state.lock();
                if state.running.len() >= self.config.max_concurrency {
                    None
                } else {
                    let mut picked = None;
                    while let Some(id) = state.queue.pop_front() {
                        if state.tasks.get(&id).map(|t| t.status) == Some(TaskStatus::Queued) {
                            picked = Some(id);
                            break;
                        }
                    }
                    picked.map(|id| {
                        state.running.insert(id.clone());
                        id
                    })
                }
            };
            let Some(task_id) = next else { break };
            let orchestrator = Arc::clone(self);
            tokio::spawn(async move {
                worker::run_turn(&orchestrator, task_id).await;
            });
        }
    }

    /// Drop failed worktrees past retention, prune stale directories, and
    /// re-pump. Rate-limited by the caller (typically invoked from `pump`
    /// and a periodic timer); this function itself performs the work
    /// unconditionally when called.
    pub fn maintenance(self: &Arc<Self>) {
        let now_ms = self.clock.now_ms();
        {
            let mut state = self.state.lock();
            if now_ms.saturating_sub(state.last_maintenance_ms) < self.config.maintenance_interval_ms && state.last_maintenance_ms != 0 {
                return;
            }
            state.last_maintenance_ms = now_ms;
        }

        let protected: Vec<std::path::PathBuf> = {
            let state = self.state.lock();
            state
                .tasks
                .values()
                .filter(|t| matches!(t.status, TaskStatus::Queued | TaskStatus::Running))
                .filter_map(|t| t.worktree_path.as_ref().map(std::path::PathBuf::from))
                .collect()
        };
        let max_age = Duration::from_secs(self.config.worktree_stale_hours * 3600);
        match self.worktrees.cleanup_stale(max_age, &protected) {
            Ok(removed) if !removed.is_empty() => info!(count = removed.len(), "pruned stale worktrees"),
            Err(e) => warn!(error = %e, "stale worktree cleanup failed"),
            _ => {}
        }
        self.pump();
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
