// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The data shapes exchanged with an agent engine.
//!
//! The engine itself (a spawned process, or an in-memory fake) lives behind
//! the `Engine` trait in `talon-adapters`; this module only owns the
//! request/response shapes so both `talon-core` consumers and the adapter
//! crate can share them without a dependency cycle.

use crate::inbound::Attachment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// One line of prior conversation handed to the engine as context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextLine {
    pub role: String,
    pub text: String,
    pub at_ms: u64,
}

/// Input to a single engine turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineInput {
    pub session_key: String,
    pub route: String,
    pub text: String,
    pub sender_id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub context_lines: Vec<ContextLine>,
    /// The transport's raw event payload, passed through opaquely for
    /// engines that want transport-specific detail (e.g. Slack block kit).
    #[serde(default)]
    pub raw_event: Option<serde_json::Value>,
    #[serde(default)]
    pub recent_attachments: Vec<Attachment>,
}

/// Output of a single engine turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOutput {
    pub text: String,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine call timed out")]
    Timeout,
    #[error("engine call was cancelled")]
    Cancelled,
    #[error("engine process failed: {0}")]
    ProcessFailed(String),
    #[error("io error talking to engine: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
