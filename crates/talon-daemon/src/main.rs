// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! talon daemon (talond)
//!
//! Long-running background process that owns the control plane and task
//! orchestrator. Talks to transports and the `talon` CLI over Unix sockets;
//! see [`talon_daemon::rpc`] for the wire protocol.

use std::sync::Arc;
use std::time::Duration;

use fs2::FileExt;
use talon_adapters::{FakeForge, FakePrVerifier, ProcessEngine, ProcessEngineConfig};
use talon_core::{SystemClock, UuidIdGen};
use talon_daemon::alias_registry::AliasRegistry;
use talon_daemon::config::{Config, ConfigError};
use talon_daemon::control_plane::ControlPlane;
use talon_daemon::rpc::RpcServer;
use talon_daemon::session::AgentSessionConfig;
use talon_daemon::ControlPlaneConfig;
use talon_orchestrator::{OrchestratorConfig, RepoEntry, RepoRegistry, TaskOrchestrator, WorktreeManager};
use talon_storage::{SessionStore, TaskStore};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("talond {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("talond {}", env!("CARGO_PKG_VERSION"));
                println!("Operator daemon: control plane + task orchestrator.");
                println!();
                println!("USAGE:");
                println!("    talond");
                println!();
                println!("talond is typically started by the `talon` CLI and should not");
                println!("be invoked directly. It listens on a Unix socket for commands.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: talond [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;
    rotate_log_if_needed(&config.log_path);
    write_startup_marker(&config)?;
    let _log_guard = setup_logging(&config)?;

    info!("starting talon daemon");

    let lock_file = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(&config.lock_path)?;
    if lock_file.try_lock_exclusive().is_err() {
        let pid = std::fs::read_to_string(&config.lock_path).unwrap_or_default().trim().to_string();
        eprintln!("talond is already running");
        if !pid.is_empty() {
            eprintln!("  pid: {pid}");
        }
        std::process::exit(1);
    }
    {
        use std::io::Write;
        let mut lock_file = &lock_file;
        lock_file.set_len(0)?;
        writeln!(lock_file, "{}", std::process::id())?;
    }

    let result = run(config).await;
    if let Err(e) = &result {
        error!(error = %e, "daemon exited with error");
    }
    result
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&config.data_dir)?;
    std::fs::create_dir_all(&config.worktree_root)?;

    let store = Arc::new(SessionStore::new(config.data_dir.clone()));
    let alias_registry = Arc::new(AliasRegistry::load(Arc::clone(&store), config.session_control_dir(), SystemClock)?);
    let engine = Arc::new(ProcessEngine::new(ProcessEngineConfig {
        command: config.engine_command.clone(),
        timeout: config.engine_timeout(),
        term_grace: Duration::from_secs(5),
    }));
    let pr_verifier = Arc::new(FakePrVerifier::new());

    let orchestrator = match &config.repo_path {
        Some(repo_path) => {
            let task_store = TaskStore::new(config.data_dir.join("tasks"));
            let mut repos = RepoRegistry::new();
            repos.register(RepoEntry {
                repo_id: "default".to_string(),
                path: repo_path.clone(),
                default_branch: config.repo_default_branch.clone(),
                remote_name: None,
            });
            let worktrees = WorktreeManager::new(config.worktree_root.clone());
            let forge = Arc::new(FakeForge::new());
            let orchestrator_config = OrchestratorConfig {
                max_concurrency: config.task_max_concurrency,
                worker_max_retries: config.worker_max_retries,
                worktree_stale_hours: config.worktree_stale_hours,
                failed_worktree_retention_hours: config.failed_worktree_retention_hours,
                task_autocleanup: config.task_autocleanup,
                task_auto_commit: config.task_auto_commit,
                task_auto_pr: config.task_auto_pr,
                pr_check_timeout_ms: config.pr_check_timeout_ms,
                pr_check_poll_ms: config.pr_check_poll_ms,
                ..OrchestratorConfig::default()
            };
            Some(TaskOrchestrator::new(orchestrator_config, task_store, repos, worktrees, engine.clone(), forge, SystemClock, UuidIdGen)?)
        }
        None => {
            info!("TALON_REPO_PATH not set; task orchestrator disabled, chat sessions only");
            None
        }
    };

    let control_plane_config = ControlPlaneConfig {
        session_dedupe_window_ms: config.session_dedupe_window_ms,
        chat_dispatch_mode: config.chat_dispatch_mode,
        chat_task_update_poll_ms: config.chat_task_update_poll_ms,
        session_ttl_ms: config.session_ttl_ms,
        agent_session: AgentSessionConfig {
            session_max_messages: config.session_max_messages,
            max_queue_per_session: config.max_queue_per_session,
            max_message_bytes: config.max_message_bytes,
            session_dedupe_window_ms: config.session_dedupe_window_ms,
        },
    };

    let (control_plane, lifecycle_rx) =
        ControlPlane::new(store, engine, pr_verifier, SystemClock, control_plane_config, alias_registry, orchestrator.clone());

    let rpc_server = RpcServer::new(Arc::clone(&control_plane), config.control_socket_path.clone(), config.session_control_dir());
    let rpc_handle = tokio::spawn(Arc::clone(&rpc_server).serve(lifecycle_rx));

    spawn_session_cleanup(Arc::clone(&control_plane));
    if let Some(orchestrator) = orchestrator {
        spawn_orchestrator_maintenance(orchestrator, Duration::from_millis(2_000.max(config.chat_task_update_poll_ms)));
    }

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(path = %config.control_socket_path.display(), "talon daemon ready");
    println!("READY");

    tokio::select! {
        result = rpc_handle => {
            if let Ok(Err(e)) = result {
                error!(error = %e, "rpc server stopped unexpectedly");
            }
        }
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    let _ = std::fs::remove_file(&config.lock_path);
    info!("talon daemon stopped");
    Ok(())
}

fn spawn_session_cleanup<C: talon_core::Clock + 'static, G: talon_core::IdGen + 'static>(control_plane: Arc<ControlPlane<C, G>>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(control_plane.cleanup_interval());
        loop {
            interval.tick().await;
            control_plane.sweep_expired_sessions();
        }
    });
}

fn spawn_orchestrator_maintenance<C: talon_core::Clock + Send + Sync + 'static, G: talon_core::IdGen + Send + Sync + 'static>(
    orchestrator: Arc<TaskOrchestrator<C, G>>,
    period: Duration,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            orchestrator.pump();
            orchestrator.maintenance();
        }
    });
}

const MAX_LOG_SIZE: u64 = 16 * 1024 * 1024;
const MAX_ROTATED_LOGS: usize = 3;

fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }
    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

const STARTUP_MARKER_PREFIX: &str = "--- talond: starting (pid: ";

fn write_startup_marker(config: &Config) -> Result<(), ConfigError> {
    use std::io::Write;
    if let Some(parent) = config.log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&config.log_path).map_err(|_| ConfigError::NoHomeDir)?;
    let _ = writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id());
    Ok(())
}

fn setup_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard, ConfigError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let file_name = config.log_path.file_name().ok_or(ConfigError::NoHomeDir)?;
    let file_appender = tracing_appender::rolling::never(config.log_path.parent().ok_or(ConfigError::NoHomeDir)?, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();
    Ok(guard)
}
