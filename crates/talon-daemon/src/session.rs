// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-session turn lifecycle: transcript, dedupe, at-most-one
//! in-flight engine turn, and the PR-verification safety rewrite.

use crate::serial_queue::{SerialQueue, SerialQueueConfig};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::OnceLock;
use talon_adapters::{Engine, PrVerifier};
use talon_core::{Clock, EngineInput, InboundMessage};
use talon_storage::{SessionState, SessionStore, TranscriptEntry, TranscriptKind};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const ABORTED_REPLY: &str = "Turn was aborted by operator.";
const EXECUTION_ERROR_REPLY: &str = "I hit an execution error processing your request.";
const UNVERIFIED_PR_REPLY: &str = "I can't verify that PR URL yet, so I won't claim it's open.";
const SUMMARY_PROMPT: &str = "Summarize the conversation since the last user turn in a few sentences.";

fn pr_url_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"https://github\.com/[^/\s]+/[^/\s]+/pull/\d+").expect("static PR URL pattern is valid"))
}

#[derive(Debug, Clone)]
pub struct AgentSessionConfig {
    pub session_max_messages: usize,
    pub max_queue_per_session: usize,
    pub max_message_bytes: usize,
    pub session_dedupe_window_ms: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("message_too_large")]
    MessageTooLarge,
    #[error("queue_full")]
    QueueFull,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionOpError {
    #[error("session busy: a turn is running or queued")]
    Busy,
    #[error("unsupported")]
    Unsupported,
    #[error("no_messages")]
    NoMessages,
}

/// One side of a `turn_end` event; `message` is `None` when a reply
/// was suppressed by the sticky "no replies until PR URL" mode.
#[derive(Debug, Clone)]
pub struct TurnEndEvent {
    pub message: Option<TranscriptEntry>,
    pub turn_index: u64,
}

struct Inner {
    transcript: VecDeque<TranscriptEntry>,
    turn_index: u64,
    message_count: u64,
    last_active_at_ms: u64,
    running: bool,
    stopped: bool,
    sticky_no_reply_until_pr: bool,
    current_cancel: Option<CancellationToken>,
    dedupe: HashMap<String, u64>,
    subscribers: Vec<oneshot::Sender<TurnEndEvent>>,
}

/// One session's turn lifecycle: transcript, dedupe window, and the serial
/// queue that enforces at-most-one in-flight engine call.
pub struct AgentSession<C: Clock> {
    pub session_key: String,
    store: Arc<SessionStore>,
    engine: Arc<dyn Engine>,
    pr_verifier: Arc<dyn PrVerifier>,
    clock: C,
    config: AgentSessionConfig,
    queue: SerialQueue,
    inner: Arc<Mutex<Inner>>,
}

impl<C: Clock> AgentSession<C> {
    pub fn load(
        session_key: impl Into<String>,
        store: Arc<SessionStore>,
        engine: Arc<dyn Engine>,
        pr_verifier: Arc<dyn PrVerifier>,
        clock: C,
        config: AgentSessionConfig,
    ) -> Self {
        let session_key = session_key.into();
        let state = store.read_session_state(&session_key).ok().flatten();
        let transcript: VecDeque<TranscriptEntry> = store
            .read_context_tail(&session_key, config.session_max_messages)
            .unwrap_or_default()
            .into_iter()
            .collect();
        let now_ms = clock.now_ms();
        let (turn_index, message_count, last_active_at_ms) = match state {
            Some(s) => (s.turn_index, s.message_count, s.last_active_at_ms),
            None => (0, 0, now_ms),
        };
        let max_queue = config.max_queue_per_session;
        let inner = Arc::new(Mutex::new(Inner {
            transcript,
            turn_index,
            message_count,
            last_active_at_ms,
            running: false,
            stopped: false,
            sticky_no_reply_until_pr: false,
            current_cancel: None,
            dedupe: HashMap::new(),
            subscribers: Vec::new(),
        }));
        let queue_inner = Arc::clone(&inner);
        let queue = SerialQueue::new(
            SerialQueueConfig { max_depth: max_queue, drop_oldest_on_overflow: true },
            move |dropped| {
                // Oldest-drop overflow only discards queued serial-queue
                // items; the session's own bookkeeping (dedupe, counters)
                // is untouched.
                let _ = (dropped, &queue_inner);
            },
        );
        Self { session_key, store, engine, pr_verifier, clock, config, queue, inner }
    }

    pub fn is_idle(&self) -> bool {
        let inner = self.inner.lock();
        !inner.running && self.queue.size() == 0
    }

    pub fn queue_size(&self) -> usize {
        self.queue.size()
    }

    fn prune_dedupe(inner: &mut Inner, now_ms: u64, window_ms: u64) {
        inner.dedupe.retain(|_, seen_at| now_ms.saturating_sub(*seen_at) <= window_ms);
    }

    /// `Enqueue(event)`: dedupe, size limit, and handoff to the
    /// serial queue. `reply` delivers the assistant's final text for this
    /// turn; it is called at most once per accepted event.
    pub fn enqueue<F>(self: &Arc<Self>, event: InboundMessage, reply: F) -> Result<(), EnqueueError>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let now_ms = self.clock.now_ms();
        {
            let mut inner = self.inner.lock();
            if inner.stopped {
                return Ok(());
            }
            Self::prune_dedupe(&mut inner, now_ms, self.config.session_dedupe_window_ms);
            if let Some(seen_at) = inner.dedupe.get(&event.id) {
                if now_ms.saturating_sub(*seen_at) <= self.config.session_dedupe_window_ms {
                    return Ok(());
                }
            }
            inner.dedupe.insert(event.id.clone(), now_ms);
            inner.last_active_at_ms = now_ms;
            inner.message_count += 1;
        }

        if let Err(e) = self.store.append_log(&self.session_key, &serde_json::json!({
            "id": event.id,
            "source": event.source,
            "channel": event.channel,
            "thread": event.thread,
            "sender_id": event.sender_id,
            "text": event.text,
            "received_at_ms": event.received_at_ms,
        })) {
            warn!(session_key = %self.session_key, error = %e, "failed to append raw event log");
        }

        if event.text.len() > self.config.max_message_bytes {
            return Err(EnqueueError::MessageTooLarge);
        }
        let safe_text = event.text.clone();

        let this = Arc::clone(self);
        let event_for_turn = event;
        if self.queue.enqueue(async move { this.process_message(event_for_turn, safe_text, reply).await }).is_err() {
            return Err(EnqueueError::QueueFull);
        }
        Ok(())
    }

    async fn process_message<F>(self: Arc<Self>, event: InboundMessage, safe_text: String, reply: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let now_ms = self.clock.now_ms();
        let turn_index = {
            let mut inner = self.inner.lock();
            inner.running = true;
            let entry = TranscriptEntry { kind: TranscriptKind::User, text: safe_text.clone(), at_ms: now_ms };
            inner.transcript.push_back(entry);
            while inner.transcript.len() > self.config.session_max_messages {
                inner.transcript.pop_front();
            }
            inner.turn_index += 1;
            inner.turn_index
        };
        self.persist_transcript();

        let context_lines: Vec<talon_core::ContextLine> = {
            let inner = self.inner.lock();
            inner
                .transcript
                .iter()
                .map(|e| talon_core::ContextLine {
                    role: match e.kind {
                        TranscriptKind::User => "user".to_string(),
                        TranscriptKind::Assistant => "assistant".to_string(),
                    },
                    text: e.text.clone(),
                    at_ms: e.at_ms,
                })
                .collect()
        };

        let input = EngineInput {
            session_key: self.session_key.clone(),
            route: self.session_key.clone(),
            text: safe_text,
            sender_id: event.sender_id.clone(),
            metadata: event.metadata.clone(),
            context_lines,
            raw_event: None,
            recent_attachments: event.attachments.clone(),
        };

        let cancel = CancellationToken::new();
        {
            let mut inner = self.inner.lock();
            inner.current_cancel = Some(cancel.clone());
        }

        let outcome = self.engine.complete(input, cancel).await;

        {
            let mut inner = self.inner.lock();
            inner.current_cancel = None;
        }

        let mut reply_text = match outcome {
            Ok(output) => output.text,
            Err(talon_core::EngineError::Cancelled) => ABORTED_REPLY.to_string(),
            Err(_) => EXECUTION_ERROR_REPLY.to_string(),
        };

        reply_text = self.rewrite_unverified_pr_claims(reply_text).await;

        let sticky_suppress = {
            let inner = self.inner.lock();
            inner.sticky_no_reply_until_pr && !pr_url_regex().is_match(&reply_text)
        };

        let message = if sticky_suppress {
            None
        } else {
            let entry = TranscriptEntry { kind: TranscriptKind::Assistant, text: reply_text.clone(), at_ms: self.clock.now_ms() };
            {
                let mut inner = self.inner.lock();
                inner.transcript.push_back(entry.clone());
                while inner.transcript.len() > self.config.session_max_messages {
                    inner.transcript.pop_front();
                }
            }
            self.persist_transcript();
            reply(reply_text);
            Some(entry)
        };

        self.persist_state();

        {
            let mut inner = self.inner.lock();
            inner.running = false;
            let subscribers = std::mem::take(&mut inner.subscribers);
            drop(inner);
            let event = TurnEndEvent { message, turn_index };
            for sub in subscribers {
                let _ = sub.send(event.clone());
            }
        }
    }

    /// Replace the reply with a fixed refusal if it contains a GitHub PR
    /// URL the injected `PrVerifier` cannot confirm.
    async fn rewrite_unverified_pr_claims(&self, text: String) -> String {
        let urls: Vec<String> = pr_url_regex().find_iter(&text).map(|m| m.as_str().to_string()).collect();
        if urls.is_empty() {
            return text;
        }
        for url in urls {
            if !self.pr_verifier.verify(&url).await {
                return UNVERIFIED_PR_REPLY.to_string();
            }
        }
        text
    }

    fn persist_transcript(&self) {
        let entries: Vec<TranscriptEntry> = self.inner.lock().transcript.iter().cloned().collect();
        if let Err(e) = self.store.rewrite_context(&self.session_key, &entries) {
            warn!(session_key = %self.session_key, error = %e, "failed to persist transcript");
        }
    }

    fn persist_state(&self) {
        let (turn_index, message_count, last_active_at_ms) = {
            let inner = self.inner.lock();
            (inner.turn_index, inner.message_count, inner.last_active_at_ms)
        };
        let state = SessionState { session_key: self.session_key.clone(), last_active_at_ms, message_count, turn_index, last_processed_message_id: None };
        if let Err(e) = self.store.write_session_state(&self.session_key, &state) {
            warn!(session_key = %self.session_key, error = %e, "failed to persist session state");
        }
    }

    /// `Abort()`: cancel the in-flight turn (if any) and clear the queue.
    /// Returns whether anything was active.
    pub fn abort(&self) -> bool {
        let (was_running, cancel) = {
            let inner = self.inner.lock();
            (inner.running, inner.current_cancel.clone())
        };
        let had_queued = self.queue.size() > 0;
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        self.queue.clear();
        was_running || had_queued
    }

    /// `Clear(summarize)`: rejects while busy; `summarize=true` is reserved
    /// and always fails with `unsupported`.
    pub fn clear(&self, summarize: bool) -> Result<(), SessionOpError> {
        if summarize {
            return Err(SessionOpError::Unsupported);
        }
        let mut inner = self.inner.lock();
        if inner.running || self.queue.size() > 0 {
            return Err(SessionOpError::Busy);
        }
        inner.transcript.clear();
        inner.turn_index = 0;
        inner.message_count = 0;
        inner.dedupe.clear();
        drop(inner);
        if let Err(e) = self.store.clear_session_data(&self.session_key) {
            warn!(session_key = %self.session_key, error = %e, "failed to clear session data");
        }
        self.persist_state();
        Ok(())
    }

    /// `GetSummary()`: calls the engine with a fixed summary prompt over
    /// the transcript since the last user turn.
    pub async fn get_summary(&self) -> Result<String, SessionOpError> {
        let (context_lines, sender) = {
            let inner = self.inner.lock();
            if inner.transcript.is_empty() {
                return Err(SessionOpError::NoMessages);
            }
            let last_user = inner.transcript.iter().rposition(|e| e.kind == TranscriptKind::User).unwrap_or(0);
            let lines: Vec<talon_core::ContextLine> = inner
                .transcript
                .iter()
                .skip(last_user)
                .map(|e| talon_core::ContextLine {
                    role: match e.kind {
                        TranscriptKind::User => "user".to_string(),
                        TranscriptKind::Assistant => "assistant".to_string(),
                    },
                    text: e.text.clone(),
                    at_ms: e.at_ms,
                })
                .collect();
            (lines, "operator".to_string())
        };
        let input = EngineInput {
            session_key: self.session_key.clone(),
            route: self.session_key.clone(),
            text: SUMMARY_PROMPT.to_string(),
            sender_id: sender,
            metadata: HashMap::new(),
            context_lines,
            raw_event: None,
            recent_attachments: Vec::new(),
        };
        let output = self.engine.complete(input, CancellationToken::new()).await;
        match output {
            Ok(o) => Ok(o.text),
            Err(_) => Ok(String::new()),
        }
    }

    pub fn get_last_assistant_message(&self) -> Option<String> {
        let inner = self.inner.lock();
        inner.transcript.iter().rev().find(|e| e.kind == TranscriptKind::Assistant).map(|e| e.text.clone())
    }

    /// Register a single-shot subscriber for the next `turn_end` event.
    pub fn subscribe_turn_end(&self) -> oneshot::Receiver<TurnEndEvent> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().subscribers.push(tx);
        rx
    }

    pub fn stop(&self) {
        self.inner.lock().stopped = true;
        self.queue.clear();
    }

    pub fn last_active_at_ms(&self) -> u64 {
        self.inner.lock().last_active_at_ms
    }

    pub fn turn_index(&self) -> u64 {
        self.inner.lock().turn_index
    }

    pub fn message_count(&self) -> u64 {
        self.inner.lock().message_count
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
