// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix socket listeners: one global control socket plus one
//! per-session socket, opened and closed reactively as sessions come and
//! go. Both speak the same newline-delimited JSON protocol; the only
//! difference is that a per-session socket fills in its `sessionKey`
//! implicitly when a typed request omits it.

use crate::alias_registry::session_socket_stem;
use crate::control_plane::{ControlPlane, SessionLifecycleEvent};
use crate::rpc::protocol::{parse_line, CommandResponse, EventMessage, IncomingRequest, LegacyRequest, TypedRequest};
use parking_lot::Mutex as SyncMutex;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use talon_core::{Clock, IdGen, InboundMessage, MessageSource};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

static NEXT_SYNTHETIC_ID: AtomicU64 = AtomicU64::new(1);

fn synthetic_event_id(now_ms: u64) -> String {
    format!("rpc:{now_ms}:{}", NEXT_SYNTHETIC_ID.fetch_add(1, Ordering::Relaxed))
}

/// Owns the global control socket and the set of live per-session sockets,
/// binding and unbinding the latter as [`SessionLifecycleEvent`]s arrive.
pub struct RpcServer<C: Clock, G: IdGen> {
    control_plane: Arc<ControlPlane<C, G>>,
    control_socket_path: PathBuf,
    session_control_dir: PathBuf,
    session_sockets: SyncMutex<HashMap<String, JoinHandle<()>>>,
}

impl<C: Clock + 'static, G: IdGen + 'static> RpcServer<C, G> {
    pub fn new(control_plane: Arc<ControlPlane<C, G>>, control_socket_path: PathBuf, session_control_dir: PathBuf) -> Arc<Self> {
        Arc::new(Self { control_plane, control_socket_path, session_control_dir, session_sockets: SyncMutex::new(HashMap::new()) })
    }

    /// Bind the global socket, then drain `lifecycle_rx` for the life of the
    /// daemon, binding/unbinding per-session sockets as sessions come and go.
    /// Never returns under normal operation.
    pub async fn serve(self: Arc<Self>, mut lifecycle_rx: tokio::sync::mpsc::UnboundedReceiver<SessionLifecycleEvent>) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.session_control_dir)?;
        self.bind_global_socket()?;
        while let Some(event) = lifecycle_rx.recv().await {
            match event {
                SessionLifecycleEvent::Created(key) => Arc::clone(&self).spawn_session_listener(key),
                SessionLifecycleEvent::Removed(key) => self.remove_session_listener(&key),
            }
        }
        Ok(())
    }

    fn bind_global_socket(self: &Arc<Self>) -> std::io::Result<()> {
        if let Some(parent) = self.control_socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let _ = std::fs::remove_file(&self.control_socket_path);
        let listener = UnixListener::bind(&self.control_socket_path)?;
        info!(path = %self.control_socket_path.display(), "control socket bound");
        let this = Arc::clone(self);
        tokio::spawn(async move { this.accept_loop(listener, None).await });
        Ok(())
    }

    fn spawn_session_listener(self: Arc<Self>, session_key: String) {
        let path = self.session_control_dir.join(format!("{}.sock", session_socket_stem(&session_key)));
        let _ = std::fs::remove_file(&path);
        let listener = match UnixListener::bind(&path) {
            Ok(listener) => listener,
            Err(e) => {
                warn!(session_key = %session_key, error = %e, "failed to bind session socket");
                return;
            }
        };
        let this = Arc::clone(&self);
        let bound_key = session_key.clone();
        let handle = tokio::spawn(async move { this.accept_loop(listener, Some(bound_key)).await });
        self.session_sockets.lock().insert(session_key, handle);
    }

    fn remove_session_listener(&self, session_key: &str) {
        if let Some(handle) = self.session_sockets.lock().remove(session_key) {
            handle.abort();
        }
        let path = self.session_control_dir.join(format!("{}.sock", session_socket_stem(session_key)));
        let _ = std::fs::remove_file(path);
    }

    async fn accept_loop(self: Arc<Self>, listener: UnixListener, bound_session_key: Option<String>) {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let this = Arc::clone(&self);
                    let bound_key = bound_session_key.clone();
                    tokio::spawn(async move { this.handle_connection(stream, bound_key).await });
                }
                Err(e) => {
                    warn!(error = %e, "accept failed, listener shutting down");
                    break;
                }
            }
        }
    }

    async fn handle_connection(self: Arc<Self>, stream: UnixStream, bound_session_key: Option<String>) {
        let (read_half, write_half) = stream.into_split();
        let writer = Arc::new(AsyncMutex::new(write_half));
        let mut lines = BufReader::new(read_half).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "connection read error");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Ok(IncomingRequest::Typed(req)) => self.handle_typed(req, bound_session_key.as_deref(), &writer).await,
                Ok(IncomingRequest::Legacy(req)) => self.handle_legacy(req, &writer).await,
                Err(e) => write_response(&writer, CommandResponse::parse_error(e.to_string())).await,
            }
        }
    }

    async fn handle_typed(&self, req: TypedRequest, bound_session_key: Option<&str>, writer: &Arc<AsyncMutex<OwnedWriteHalf>>) {
        let id = req.id().to_string();
        let command = req.command_name().to_string();
        let session_key = match req.session_key().map(str::to_string).or_else(|| bound_session_key.map(str::to_string)) {
            Some(key) => key,
            None => {
                write_response(writer, CommandResponse::err(command, Some(id), "sessionKey is required")).await;
                return;
            }
        };

        match req {
            TypedRequest::Send { message, mode, .. } => {
                let session = self.control_plane.get_or_create_session(&session_key);
                let was_idle = session.is_idle();
                let now_ms = self.control_plane_now_ms();
                let event = InboundMessage {
                    id: synthetic_event_id(now_ms),
                    source: MessageSource::Socket,
                    channel: session_key.clone(),
                    thread: None,
                    sender_id: "operator".to_string(),
                    text: message,
                    attachments: Vec::new(),
                    metadata: HashMap::new(),
                    received_at_ms: now_ms,
                };
                match session.enqueue(event, |_text| {}) {
                    Ok(()) => {
                        let reported_mode = if was_idle { "direct".to_string() } else { mode.unwrap_or_else(|| "steer".to_string()) };
                        write_response(writer, CommandResponse::ok(command, Some(id), json!({"delivered": true, "mode": reported_mode}))).await;
                    }
                    Err(e) => write_response(writer, CommandResponse::err(command, Some(id), e.to_string())).await,
                }
            }
            TypedRequest::Subscribe { .. } => match self.control_plane.find_session(&session_key) {
                Some(session) => {
                    write_response(writer, CommandResponse::ok(command.clone(), Some(id.clone()), json!({"subscribed": true}))).await;
                    let rx = session.subscribe_turn_end();
                    let writer = Arc::clone(writer);
                    tokio::spawn(async move {
                        if let Ok(event) = rx.await {
                            let data = json!({
                                "turnIndex": event.turn_index,
                                "message": event.message.map(|m| m.text),
                            });
                            write_event(&writer, EventMessage::turn_end(id, data)).await;
                        }
                    });
                }
                None => write_response(writer, CommandResponse::err(command, Some(id), "no session for sessionKey")).await,
            },
            TypedRequest::GetMessage { .. } => {
                let text = self.control_plane.find_session(&session_key).and_then(|s| s.get_last_assistant_message());
                write_response(writer, CommandResponse::ok(command, Some(id), json!({"text": text}))).await;
            }
            TypedRequest::GetSummary { .. } => match self.control_plane.find_session(&session_key) {
                Some(session) => match session.get_summary().await {
                    Ok(summary) => write_response(writer, CommandResponse::ok(command, Some(id), json!({"summary": summary}))).await,
                    Err(e) => write_response(writer, CommandResponse::err(command, Some(id), e.to_string())).await,
                },
                None => write_response(writer, CommandResponse::err(command, Some(id), "no session for sessionKey")).await,
            },
            TypedRequest::Clear { summarize, .. } => match self.control_plane.clear_session(&session_key, summarize) {
                Ok(()) => write_response(writer, CommandResponse::ok(command, Some(id), json!({"cleared": true}))).await,
                Err(e) => write_response(writer, CommandResponse::err(command, Some(id), e.to_string())).await,
            },
            TypedRequest::Abort { .. } => {
                let aborted = self.control_plane.find_session(&session_key).map(|s| s.abort()).unwrap_or(false);
                write_response(writer, CommandResponse::ok(command, Some(id), json!({"aborted": aborted}))).await;
            }
        }
    }

    async fn handle_legacy(&self, req: LegacyRequest, writer: &Arc<AsyncMutex<OwnedWriteHalf>>) {
        let command = req.command_name().to_string();
        match req {
            LegacyRequest::Health => {
                write_response(writer, CommandResponse::ok(command, None, json!({"status": "ok"}))).await;
            }
            LegacyRequest::List => {
                let sessions = self.control_plane.list_sessions();
                write_response(writer, CommandResponse::ok(command, None, json!({"sessions": sessions}))).await;
            }
            LegacyRequest::Stop { session_key } => match session_key {
                Some(key) => {
                    let aborted = self.control_plane.find_session(&key).map(|s| s.abort()).unwrap_or(false);
                    write_response(writer, CommandResponse::ok(command, None, json!({"stopped": aborted}))).await;
                }
                None => write_response(writer, CommandResponse::err(command, None, "sessionKey is required")).await,
            },
            LegacyRequest::Send { session_key, message } => {
                // Routed through `dispatch()` rather than a direct session
                // enqueue, so the `!`/`/` command grammar and the `task:`
                // dispatch-mode prefix apply uniformly to socket
                // traffic, the same as they would to a transport/webhook
                // event. A `taskId` in the response lets a one-shot caller
                // (the CLI's `task submit`) learn the new task's id without
                // polling for a reply message.
                let now_ms = self.control_plane_now_ms();
                let event = InboundMessage {
                    id: synthetic_event_id(now_ms),
                    source: MessageSource::Socket,
                    channel: session_key,
                    thread: None,
                    sender_id: "operator".to_string(),
                    text: message,
                    attachments: Vec::new(),
                    metadata: HashMap::new(),
                    received_at_ms: now_ms,
                };
                let outcome = self.control_plane.dispatch(event, |_text| {});
                if outcome.accepted {
                    write_response(
                        writer,
                        CommandResponse::ok(
                            command,
                            None,
                            json!({"delivered": true, "mode": outcome.mode, "taskId": outcome.task_id, "sessionKey": outcome.session_key}),
                        ),
                    )
                    .await;
                } else {
                    write_response(writer, CommandResponse::err(command, None, outcome.reason.unwrap_or_else(|| "rejected".to_string()))).await;
                }
            }
            LegacyRequest::GetMessage { session_key } => {
                let text = self.control_plane.find_session(&session_key).and_then(|s| s.get_last_assistant_message());
                write_response(writer, CommandResponse::ok(command, None, json!({"text": text}))).await;
            }
            LegacyRequest::GetSummary { session_key } => match self.control_plane.find_session(&session_key) {
                Some(session) => match session.get_summary().await {
                    Ok(summary) => write_response(writer, CommandResponse::ok(command, None, json!({"summary": summary}))).await,
                    Err(e) => write_response(writer, CommandResponse::err(command, None, e.to_string())).await,
                },
                None => write_response(writer, CommandResponse::err(command, None, "no session for sessionKey")).await,
            },
            LegacyRequest::Clear { session_key, summarize } => match self.control_plane.clear_session(&session_key, summarize) {
                Ok(()) => write_response(writer, CommandResponse::ok(command, None, json!({"cleared": true}))).await,
                Err(e) => write_response(writer, CommandResponse::err(command, None, e.to_string())).await,
            },
            LegacyRequest::Abort { session_key } => {
                let aborted = self.control_plane.find_session(&session_key).map(|s| s.abort()).unwrap_or(false);
                write_response(writer, CommandResponse::ok(command, None, json!({"aborted": aborted}))).await;
            }
            LegacyRequest::AliasSet { alias, session_key } | LegacyRequest::AliasAdd { alias, session_key } => {
                match self.control_plane.alias_registry().set(&alias, &session_key) {
                    Ok(record) => {
                        self.control_plane.alias_registry().resync_symlinks_for_session(record.session_key.as_str());
                        write_response(writer, CommandResponse::ok(command, None, json!({"alias": record.alias, "sessionKey": record.session_key.as_str()}))).await;
                    }
                    Err(e) => write_response(writer, CommandResponse::err(command, None, e.to_string())).await,
                }
            }
            LegacyRequest::AliasRemove { alias } => match self.control_plane.alias_registry().remove(&alias) {
                Some(record) => write_response(writer, CommandResponse::ok(command, None, json!({"removed": record.alias}))).await,
                None => write_response(writer, CommandResponse::err(command, None, "alias_not_found")).await,
            },
            LegacyRequest::AliasList => {
                let entries = self.control_plane.alias_registry().list();
                let data: Vec<_> = entries.iter().map(|a| json!({"alias": a.alias, "sessionKey": a.session_key.as_str()})).collect();
                write_response(writer, CommandResponse::ok(command, None, json!({"aliases": data}))).await;
            }
            LegacyRequest::AliasResolve { alias } => match self.control_plane.alias_registry().resolve(&alias) {
                Some(key) => write_response(writer, CommandResponse::ok(command, None, json!({"sessionKey": key.as_str()}))).await,
                None => write_response(writer, CommandResponse::err(command, None, "alias_not_found")).await,
            },
        }
    }

    fn control_plane_now_ms(&self) -> u64 {
        self.control_plane.now_ms()
    }
}

async fn write_response(writer: &Arc<AsyncMutex<OwnedWriteHalf>>, response: CommandResponse) {
    write_line(writer, &response).await;
}

async fn write_event(writer: &Arc<AsyncMutex<OwnedWriteHalf>>, event: EventMessage) {
    write_line(writer, &event).await;
}

async fn write_line<T: serde::Serialize>(writer: &Arc<AsyncMutex<OwnedWriteHalf>>, value: &T) {
    let Ok(mut text) = serde_json::to_string(value) else { return };
    text.push('\n');
    let mut guard = writer.lock().await;
    if let Err(e) = guard.write_all(text.as_bytes()).await {
        warn!(error = %e, "failed to write response");
    }
}
