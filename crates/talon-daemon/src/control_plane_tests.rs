use super::*;
use crate::alias_registry::AliasRegistry;
use crate::config::ChatDispatchMode;
use crate::session::AgentSessionConfig;
use std::sync::Mutex as StdMutex;
use talon_adapters::{FakeEngine, FakeForge, FakePrVerifier};
use talon_core::{FakeClock, MessageSource, SequentialIdGen};
use talon_orchestrator::{OrchestratorConfig, RepoEntry, RepoRegistry, TaskOrchestrator, WorktreeManager};
use talon_storage::{SessionStore, TaskStore};

fn make_plane(
    dir: &std::path::Path,
    with_orchestrator: bool,
) -> Arc<ControlPlane<FakeClock, SequentialIdGen>> {
    let store = Arc::new(SessionStore::new(dir.join("data")));
    let control_dir = dir.join("session-control");
    let alias_registry = Arc::new(AliasRegistry::load(Arc::clone(&store), control_dir, FakeClock::new(1_000)).unwrap());
    let engine = Arc::new(FakeEngine::new());
    let verifier = Arc::new(FakePrVerifier::new());

    let orchestrator = if with_orchestrator {
        let task_store = TaskStore::new(dir.join("data").join("tasks"));
        let mut repos = RepoRegistry::new();
        repos.register(RepoEntry { repo_id: "default".to_string(), path: dir.join("repo"), default_branch: "main".to_string(), remote_name: None });
        let worktrees = WorktreeManager::new(dir.join("worktrees"));
        let forge = Arc::new(FakeForge::new());
        Some(
            TaskOrchestrator::new(
                OrchestratorConfig::default(),
                task_store,
                repos,
                worktrees,
                engine.clone(),
                forge,
                FakeClock::new(1_000),
                SequentialIdGen::new("task"),
            )
            .unwrap(),
        )
    } else {
        None
    };

    let config = ControlPlaneConfig {
        session_dedupe_window_ms: 1_000,
        chat_dispatch_mode: ChatDispatchMode::Session,
        chat_task_update_poll_ms: 500,
        session_ttl_ms: 60_000,
        agent_session: AgentSessionConfig { session_max_messages: 50, max_queue_per_session: 4, max_message_bytes: 4096, session_dedupe_window_ms: 1_000 },
    };

    let (plane, _rx) = ControlPlane::new(store, engine, verifier, FakeClock::new(1_000), config, alias_registry, orchestrator);
    plane
}

fn msg(id: &str, text: &str) -> InboundMessage {
    InboundMessage {
        id: id.to_string(),
        source: MessageSource::Socket,
        channel: "eng".to_string(),
        thread: Some("main".to_string()),
        sender_id: "operator".to_string(),
        text: text.to_string(),
        attachments: Vec::new(),
        metadata: Default::default(),
        received_at_ms: 1_000,
    }
}

fn collect_replies() -> (Arc<StdMutex<Vec<String>>>, impl Fn(String) + Send + Sync + 'static) {
    let replies = Arc::new(StdMutex::new(Vec::new()));
    let replies2 = Arc::clone(&replies);
    (replies, move |text: String| replies2.lock().unwrap().push(text))
}

#[tokio::test]
async fn dispatch_routes_plain_message_to_session_flow() {
    let tmp = tempfile::tempdir().unwrap();
    let plane = make_plane(tmp.path(), false);
    let (_replies, reply) = collect_replies();
    let outcome = plane.dispatch(msg("evt-1", "hello there"), reply);
    assert!(outcome.accepted);
    assert_eq!(outcome.mode.as_deref(), Some("session"));
}

#[tokio::test]
async fn dispatch_rejects_empty_message() {
    let tmp = tempfile::tempdir().unwrap();
    let plane = make_plane(tmp.path(), false);
    let (replies, reply) = collect_replies();
    let outcome = plane.dispatch(msg("evt-1", "   "), reply);
    assert!(!outcome.accepted);
    assert_eq!(outcome.reason.as_deref(), Some("empty_message"));
    assert_eq!(replies.lock().unwrap()[0], "Message text is required.");
}

#[tokio::test]
async fn dispatch_deduplicates_by_event_id() {
    let tmp = tempfile::tempdir().unwrap();
    let plane = make_plane(tmp.path(), false);
    let (_replies, reply) = collect_replies();
    plane.dispatch(msg("evt-1", "hi"), reply);
    let (_replies2, reply2) = collect_replies();
    let outcome = plane.dispatch(msg("evt-1", "hi"), reply2);
    assert_eq!(outcome.reason.as_deref(), Some("duplicate"));
}

#[tokio::test]
async fn dispatch_honors_explicit_task_prefix_without_orchestrator() {
    let tmp = tempfile::tempdir().unwrap();
    let plane = make_plane(tmp.path(), false);
    let (replies, reply) = collect_replies();
    let outcome = plane.dispatch(msg("evt-1", "/task do the thing"), reply);
    assert!(!outcome.accepted);
    assert_eq!(outcome.reason.as_deref(), Some("no_orchestrator"));
    assert!(replies.lock().unwrap()[0].contains("No repo"));
}

#[tokio::test]
async fn dispatch_submits_to_orchestrator_when_task_flow() {
    let tmp = tempfile::tempdir().unwrap();
    let plane = make_plane(tmp.path(), true);
    let (replies, reply) = collect_replies();
    let outcome = plane.dispatch(msg("evt-1", "/task fix the bug"), reply);
    assert!(outcome.accepted);
    assert_eq!(outcome.mode.as_deref(), Some("task"));
    assert!(replies.lock().unwrap()[0].starts_with("Queued task"));
}

#[tokio::test]
async fn help_command_replies_with_command_list() {
    let tmp = tempfile::tempdir().unwrap();
    let plane = make_plane(tmp.path(), false);
    let (replies, reply) = collect_replies();
    plane.dispatch(msg("evt-1", "!help"), reply);
    assert!(replies.lock().unwrap()[0].contains("!stop"));
}

#[tokio::test]
async fn status_command_reports_idle_session() {
    let tmp = tempfile::tempdir().unwrap();
    let plane = make_plane(tmp.path(), false);
    let (_r, reply1) = collect_replies();
    plane.dispatch(msg("evt-1", "hello"), reply1);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let (replies, reply2) = collect_replies();
    plane.dispatch(msg("evt-2", "!status"), reply2);
    assert!(replies.lock().unwrap()[0].contains("idle") || replies.lock().unwrap()[0].contains("running"));
}

#[tokio::test]
async fn alias_set_list_resolve_remove_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let plane = make_plane(tmp.path(), false);

    let (_r, r1) = collect_replies();
    plane.dispatch(msg("evt-1", "!alias set runbook socket:eng:main"), r1);

    let (replies, r2) = collect_replies();
    plane.dispatch(msg("evt-2", "!alias resolve runbook"), r2);
    assert!(replies.lock().unwrap()[0].contains("socket:eng:main"));

    let (replies3, r3) = collect_replies();
    plane.dispatch(msg("evt-3", "!alias list"), r3);
    assert!(replies3.lock().unwrap()[0].contains("runbook"));

    let (replies4, r4) = collect_replies();
    plane.dispatch(msg("evt-4", "!alias remove runbook"), r4);
    assert!(replies4.lock().unwrap()[0].contains("removed"));
}

#[tokio::test]
async fn unrecognized_bang_prefix_falls_through_to_session_flow() {
    let tmp = tempfile::tempdir().unwrap();
    let plane = make_plane(tmp.path(), false);
    let (_replies, reply) = collect_replies();
    let outcome = plane.dispatch(msg("evt-1", "!notacommand with args"), reply);
    assert!(outcome.accepted);
    assert_eq!(outcome.mode.as_deref(), Some("session"));
}
