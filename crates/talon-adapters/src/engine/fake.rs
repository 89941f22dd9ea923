// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An in-memory [`Engine`] for tests: records every call it receives and
//! replies from a scripted queue of canned outputs, falling back to an
//! echo of the input text when the queue is empty.

use crate::engine::Engine;
use async_trait::async_trait;
use parking_lot::Mutex;
use talon_core::{EngineError, EngineInput, EngineOutput};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct EngineCall {
    pub session_key: String,
    pub text: String,
}

pub struct FakeEngine {
    calls: Mutex<Vec<EngineCall>>,
    replies: Mutex<Vec<Result<EngineOutput, EngineError>>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self { calls: Mutex::new(Vec::new()), replies: Mutex::new(Vec::new()) }
    }

    /// Queue a reply, returned in FIFO order as calls come in.
    pub fn push_reply(&self, text: impl Into<String>) {
        self.replies.lock().push(Ok(EngineOutput { text: text.into() }));
    }

    pub fn push_error(&self, err: EngineError) {
        self.replies.lock().push(Err(err));
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Engine for FakeEngine {
    async fn complete(&self, input: EngineInput, _cancel: CancellationToken) -> Result<EngineOutput, EngineError> {
        self.calls.lock().push(EngineCall { session_key: input.session_key.clone(), text: input.text.clone() });
        let mut replies = self.replies.lock();
        if !replies.is_empty() {
            return replies.remove(0);
        }
        drop(replies);
        Ok(EngineOutput { text: format!("echo: {}", input.text) })
    }

    async fn ping(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
