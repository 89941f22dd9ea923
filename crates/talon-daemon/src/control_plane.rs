// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The central coordinator: dispatches inbound events into sessions
//! or the task orchestrator, parses the `!`/`/` command syntax, and runs
//! the cleanup and task-lifecycle-watcher background loops.
//!
//! Socket I/O lives in [`crate::rpc`]; this module only owns routing and
//! session lifecycle. The two are coupled by [`SessionLifecycleEvent`]s
//! sent over a channel rather than a direct call, so the RPC layer can
//! bind/unbind per-session listeners without the control plane knowing
//! anything about sockets.

use crate::alias_registry::AliasRegistry;
use crate::config::ChatDispatchMode;
use crate::session::{AgentSession, AgentSessionConfig, EnqueueError, SessionOpError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use talon_adapters::{Engine, PrVerifier};
use talon_core::{route_from_message, Clock, IdGen, InboundMessage, TaskArtifact, TaskId, TaskStatus};
use talon_orchestrator::{OrchestratorError, SubmitRequest, TaskOrchestrator};
use talon_storage::SessionStore;
use tokio::sync::mpsc;
use tracing::warn;

const NO_REPO_REPLY: &str = "No repo is registered for this task; configure one before submitting work.";
const EMPTY_MESSAGE_REPLY: &str = "Message text is required.";
const MIN_TASK_POLL_MS: u64 = 500;

/// Emitted whenever a session is created or torn down, so the RPC layer
/// can bind or remove its per-session socket.
#[derive(Debug, Clone)]
pub enum SessionLifecycleEvent {
    Created(String),
    Removed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub accepted: bool,
    pub reason: Option<String>,
    pub session_key: Option<String>,
    pub mode: Option<String>,
    pub task_id: Option<String>,
}

impl DispatchOutcome {
    fn accepted_session(session_key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { accepted: true, reason: Some(reason.into()), session_key: Some(session_key.into()), mode: Some("session".to_string()), task_id: None }
    }

    fn accepted_task(task_id: impl Into<String>) -> Self {
        Self { accepted: true, reason: None, session_key: None, mode: Some("task".to_string()), task_id: Some(task_id.into()) }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self { accepted: false, reason: Some(reason.into()), session_key: None, mode: None, task_id: None }
    }
}

#[derive(Debug, Clone)]
pub struct ControlPlaneConfig {
    pub session_dedupe_window_ms: u64,
    pub chat_dispatch_mode: ChatDispatchMode,
    pub chat_task_update_poll_ms: u64,
    pub session_ttl_ms: u64,
    pub agent_session: AgentSessionConfig,
}

enum DispatchMode {
    Session,
    Task,
}

/// Strip an optional `/?(chat|task)[ :]` prefix, returning the override
/// (if any) and the remaining text.
fn parse_dispatch_prefix(text: &str) -> (Option<DispatchMode>, &str) {
    let trimmed = text.trim_start();
    let after_slash = trimmed.strip_prefix('/').unwrap_or(trimmed);
    for (verb, mode) in [("chat", DispatchMode::Session), ("task", DispatchMode::Task)] {
        if let Some(rest) = after_slash.strip_prefix(verb) {
            if let Some(rest) = rest.strip_prefix(':').or_else(|| rest.strip_prefix(' ')) {
                return (Some(mode), rest.trim_start());
            }
        }
    }
    (None, text)
}

enum Command {
    Stop(Option<String>),
    Status(Option<String>),
    Alias(AliasCommand),
    Help,
}

enum AliasCommand {
    Set { alias: String, target: Option<String> },
    Remove(String),
    List,
    Resolve(String),
}

fn parse_command(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    let body = trimmed.strip_prefix('!').or_else(|| trimmed.strip_prefix('/'))?;
    let mut parts = body.split_whitespace();
    let verb = parts.next()?.to_ascii_lowercase();
    let rest: Vec<&str> = parts.collect();
    match verb.as_str() {
        "stop" => Some(Command::Stop(rest.first().map(|s| s.to_string()))),
        "status" => Some(Command::Status(rest.first().map(|s| s.to_string()))),
        "help" | "h" => Some(Command::Help),
        "alias" => {
            let sub = rest.first()?.to_ascii_lowercase();
            match sub.as_str() {
                "set" | "add" => {
                    let alias = rest.get(1)?.to_string();
                    let target = rest.get(2).map(|s| s.to_string());
                    Some(Command::Alias(AliasCommand::Set { alias, target }))
                }
                "remove" | "rm" | "delete" => Some(Command::Alias(AliasCommand::Remove(rest.get(1)?.to_string()))),
                "list" | "ls" => Some(Command::Alias(AliasCommand::List)),
                "resolve" => Some(Command::Alias(AliasCommand::Resolve(rest.get(1)?.to_string()))),
                _ => None,
            }
        }
        _ => None,
    }
}

/// The central coordinator: session map, alias registry, process-wide
/// dedupe cache, and (optionally) the task orchestrator.
pub struct ControlPlane<C: Clock, G: IdGen> {
    store: Arc<SessionStore>,
    engine: Arc<dyn Engine>,
    pr_verifier: Arc<dyn PrVerifier>,
    clock: C,
    config: ControlPlaneConfig,
    sessions: Mutex<HashMap<String, Arc<AgentSession<C>>>>,
    alias_registry: Arc<AliasRegistry<C>>,
    orchestrator: Option<Arc<TaskOrchestrator<C, G>>>,
    seen_event_ids: Mutex<HashMap<String, u64>>,
    lifecycle_tx: mpsc::UnboundedSender<SessionLifecycleEvent>,
}

impl<C: Clock, G: IdGen + 'static> ControlPlane<C, G> {
    pub fn new(
        store: Arc<SessionStore>,
        engine: Arc<dyn Engine>,
        pr_verifier: Arc<dyn PrVerifier>,
        clock: C,
        config: ControlPlaneConfig,
        alias_registry: Arc<AliasRegistry<C>>,
        orchestrator: Option<Arc<TaskOrchestrator<C, G>>>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SessionLifecycleEvent>) {
        let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();
        let plane = Arc::new(Self {
            store,
            engine,
            pr_verifier,
            clock,
            config,
            sessions: Mutex::new(HashMap::new()),
            alias_registry,
            orchestrator,
            seen_event_ids: Mutex::new(HashMap::new()),
            lifecycle_tx,
        });
        (plane, lifecycle_rx)
    }

    fn prune_seen(seen: &mut HashMap<String, u64>, now_ms: u64, window_ms: u64) {
        seen.retain(|_, at| now_ms.saturating_sub(*at) <= window_ms);
    }

    /// Look up a live session, creating it (and announcing it to the RPC
    /// layer) if this is its first message.
    pub fn get_or_create_session(&self, session_key: &str) -> Arc<AgentSession<C>> {
        let mut sessions = self.sessions.lock();
        if let Some(existing) = sessions.get(session_key) {
            return Arc::clone(existing);
        }
        let session = Arc::new(AgentSession::load(
            session_key,
            Arc::clone(&self.store),
            Arc::clone(&self.engine),
            Arc::clone(&self.pr_verifier),
            self.clock.clone(),
            self.config.agent_session.clone(),
        ));
        sessions.insert(session_key.to_string(), Arc::clone(&session));
        let _ = self.lifecycle_tx.send(SessionLifecycleEvent::Created(session_key.to_string()));
        self.alias_registry.resync_symlinks_for_session(session_key);
        session
    }

    pub fn find_session(&self, session_key: &str) -> Option<Arc<AgentSession<C>>> {
        self.sessions.lock().get(session_key).cloned()
    }

    pub fn list_sessions(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }

    pub fn alias_registry(&self) -> &Arc<AliasRegistry<C>> {
        &self.alias_registry
    }

    /// Current time per the injected [`Clock`], used by the RPC layer to
    /// stamp synthetic [`InboundMessage`]s for direct `send` commands.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Resolve an alias to a session key, or echo back the input unchanged
    /// if it isn't a known alias (it may already be a literal session key).
    pub fn resolve_session_key(&self, alias_or_key: &str) -> String {
        self.alias_registry.resolve(alias_or_key).map(|k| k.as_str().to_string()).unwrap_or_else(|| alias_or_key.to_string())
    }

    /// Resolve a command target (alias or literal session key) against the
    /// current route, falling back to the route when no target is given.
    fn resolve_target(&self, target: Option<&str>, route_session_key: &str) -> String {
        match target {
            Some(t) => self.alias_registry.resolve(t).map(|k| k.as_str().to_string()).unwrap_or_else(|| t.to_string()),
            None => route_session_key.to_string(),
        }
    }

    /// `Dispatch(m, callbacks)`: the single entry point for every
    /// inbound transport event.
    pub fn dispatch<F>(self: &Arc<Self>, m: InboundMessage, reply: F) -> DispatchOutcome
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let route = route_from_message(&m);
        let now_ms = self.clock.now_ms();

        {
            let mut seen = self.seen_event_ids.lock();
            Self::prune_seen(&mut seen, now_ms, self.config.session_dedupe_window_ms);
            if let Some(seen_at) = seen.get(&m.id) {
                if now_ms.saturating_sub(*seen_at) <= self.config.session_dedupe_window_ms {
                    return DispatchOutcome::accepted_session(route.session_key.as_str(), "duplicate");
                }
            }
            seen.insert(m.id.clone(), now_ms);
        }

        let (mode_override, stripped_text) = parse_dispatch_prefix(&m.text);
        let stripped_text = stripped_text.to_string();
        if stripped_text.trim().is_empty() {
            reply(EMPTY_MESSAGE_REPLY.to_string());
            return DispatchOutcome::rejected("empty_message");
        }

        if let Some(command) = parse_command(&stripped_text) {
            self.handle_command(command, route.session_key.as_str(), &reply);
            return DispatchOutcome::accepted_session(route.session_key.as_str(), "command");
        }

        let use_task_flow = match mode_override {
            Some(DispatchMode::Session) => false,
            Some(DispatchMode::Task) => true,
            None => matches!(self.config.chat_dispatch_mode, ChatDispatchMode::Task),
        };

        let mut m = m;
        m.text = stripped_text;

        if use_task_flow {
            return self.dispatch_task_flow(m, route.session_key.as_str(), reply);
        }
        self.dispatch_session_flow(m, route.session_key.as_str(), reply)
    }

    fn dispatch_session_flow<F>(self: &Arc<Self>, m: InboundMessage, session_key: &str, reply: F) -> DispatchOutcome
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let session = self.get_or_create_session(session_key);
        match session.enqueue(m, reply) {
            Ok(()) => DispatchOutcome::accepted_session(session_key, "enqueued"),
            Err(EnqueueError::MessageTooLarge) => DispatchOutcome::rejected("message_too_large"),
            Err(EnqueueError::QueueFull) => DispatchOutcome::rejected("queue_full"),
        }
    }

    fn dispatch_task_flow<F>(self: &Arc<Self>, m: InboundMessage, session_key: &str, reply: F) -> DispatchOutcome
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let Some(orchestrator) = self.orchestrator.clone() else {
            reply(NO_REPO_REPLY.to_string());
            return DispatchOutcome::rejected("no_orchestrator");
        };
        let req = SubmitRequest { text: m.text.clone(), repo_id: None, session_key: Some(session_key.to_string()), source: None, fanout: Vec::new() };
        match orchestrator.submit(req) {
            Ok(task) => {
                reply(format!("Queued task {} (repo: {}).…", task.id, task.repo_id));
                self.spawn_lifecycle_watcher(Arc::clone(&orchestrator), task.id.clone(), reply);
                DispatchOutcome::accepted_task(task.id.as_str().to_string())
            }
            Err(OrchestratorError::Repo(_)) => {
                reply(NO_REPO_REPLY.to_string());
                DispatchOutcome::rejected("repo_not_found")
            }
            Err(e) => {
                warn!(error = %e, "task submission failed");
                reply("Failed to submit task.".to_string());
                DispatchOutcome::rejected("submit_failed")
            }
        }
    }

    /// Poll `GetTask(id)` every `chatTaskUpdatePollMs`, announcing the first
    /// transition into `running` and the final terminal outcome.
    fn spawn_lifecycle_watcher<F>(&self, orchestrator: Arc<TaskOrchestrator<C, G>>, task_id: TaskId, reply: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let poll_ms = self.config.chat_task_update_poll_ms.max(MIN_TASK_POLL_MS);
        tokio::spawn(async move {
            let mut announced_running = false;
            loop {
                tokio::time::sleep(std::time::Duration::from_millis(poll_ms)).await;
                let Some(task) = orchestrator.get_task(&task_id) else { break };
                if !announced_running && task.status == TaskStatus::Running {
                    announced_running = true;
                    reply(format!("Task {} is now running…", task_id));
                }
                if task.status.is_terminal() {
                    reply(format_task_outcome(&task_id, task.status, &task.artifacts, task.error.as_deref()));
                    break;
                }
            }
        });
    }

    fn handle_command<F>(&self, command: Command, route_session_key: &str, reply: &F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        match command {
            Command::Stop(target) => {
                let key = self.resolve_target(target.as_deref(), route_session_key);
                match self.find_session(&key) {
                    Some(session) => {
                        let aborted = session.abort();
                        reply(format!("Stopped {key} (aborted={aborted})."));
                    }
                    None => reply(format!("No active session for {key}.")),
                }
            }
            Command::Status(target) => {
                let key = self.resolve_target(target.as_deref(), route_session_key);
                match self.find_session(&key) {
                    Some(session) => reply(format!(
                        "{key}: {} (queue={}, turn={}, messages={})",
                        if session.is_idle() { "idle" } else { "running" },
                        session.queue_size(),
                        session.turn_index(),
                        session.message_count(),
                    )),
                    None => reply(format!("No session state for {key}.")),
                }
            }
            Command::Help => reply(HELP_TEXT.to_string()),
            Command::Alias(AliasCommand::Set { alias, target }) => {
                let target = target.unwrap_or_else(|| route_session_key.to_string());
                let resolved_target = self.alias_registry.resolve(&target).map(|k| k.as_str().to_string()).unwrap_or(target);
                match self.alias_registry.set(&alias, &resolved_target) {
                    Ok(record) => {
                        self.alias_registry.resync_symlinks_for_session(record.session_key.as_str());
                        reply(format!("Alias \"{}\" now points to {}.", record.alias, record.session_key));
                    }
                    Err(e) => reply(format!("Could not set alias: {e}")),
                }
            }
            Command::Alias(AliasCommand::Remove(alias)) => match self.alias_registry.remove(&alias) {
                Some(record) => reply(format!("Alias \"{}\" removed.", record.alias)),
                None => reply(format!("No alias named {alias}.")),
            },
            Command::Alias(AliasCommand::List) => {
                let entries = self.alias_registry.list();
                if entries.is_empty() {
                    reply("No aliases configured.".to_string());
                } else {
                    let lines: Vec<String> = entries.iter().map(|a| format!("{} -> {}", a.alias, a.session_key)).collect();
                    reply(lines.join("\n"));
                }
            }
            Command::Alias(AliasCommand::Resolve(alias)) => match self.alias_registry.resolve(&alias) {
                Some(key) => reply(format!("{alias} => {key}")),
                None => reply(format!("No alias named {alias}.")),
            },
        }
    }

    /// `Clear(target)` / `GetSummary` / `Abort` on behalf of the RPC layer,
    /// which resolves aliases before calling in.
    pub fn clear_session(&self, session_key: &str, summarize: bool) -> Result<(), SessionOpError> {
        match self.find_session(session_key) {
            Some(session) => session.clear(summarize),
            None => Ok(()),
        }
    }

    /// Cleanup timer: every `max(15s, sessionTtl/2)`, stop idle
    /// sessions past their TTL.
    pub fn cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(15_000.max(self.config.session_ttl_ms / 2))
    }

    pub fn sweep_expired_sessions(&self) {
        let now_ms = self.clock.now_ms();
        let ttl_ms = self.config.session_ttl_ms;
        let expired: Vec<String> = {
            let sessions = self.sessions.lock();
            sessions
                .iter()
                .filter(|(_, s)| s.is_idle() && now_ms.saturating_sub(s.last_active_at_ms()) > ttl_ms)
                .map(|(k, _)| k.clone())
                .collect()
        };
        for key in expired {
            if let Some(session) = self.sessions.lock().remove(&key) {
                session.stop();
                let _ = self.lifecycle_tx.send(SessionLifecycleEvent::Removed(key));
            }
        }
    }
}

const HELP_TEXT: &str = "Commands: !stop [target], !status [target], !alias set|add|remove|rm|delete|list|ls|resolve, !help|!h";

fn format_task_outcome(task_id: &TaskId, status: TaskStatus, artifacts: &[TaskArtifact], error: Option<&str>) -> String {
    let status_word = match status {
        TaskStatus::Done => "completed",
        TaskStatus::Failed => "failed",
        TaskStatus::Blocked => "blocked",
        TaskStatus::Cancelled => "cancelled",
        _ => "finished",
    };
    let mut evidence = Vec::new();
    for artifact in artifacts {
        match artifact {
            TaskArtifact::PullRequest { pr_url, .. } => evidence.push(format!("PR: {pr_url}")),
            TaskArtifact::GitCommit { commit_sha, .. } => evidence.push(format!("commit: {commit_sha}")),
            TaskArtifact::Checks { checks_summary, passed } => evidence.push(format!("checks ({}): {checks_summary}", if *passed { "passed" } else { "failed" })),
            _ => {}
        }
    }
    let mut msg = format!("Task {task_id} {status_word}.");
    if let Some(error) = error {
        msg.push_str(&format!(" error: {error}"));
    }
    if !evidence.is_empty() {
        msg.push(' ');
        msg.push_str(&evidence.join(", "));
    }
    msg
}

#[cfg(test)]
#[path = "control_plane_tests.rs"]
mod tests;
