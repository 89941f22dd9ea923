// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control socket wire protocol: newline-delimited JSON, one
//! document per line. Two request shapes share the same wire: a `type`-tagged
//! shape for the modern per-session surface, and an `action`-tagged shape
//! kept bit-exact for legacy tooling. Which one a line carries is decided
//! dynamically by probing for the `type` vs `action` key before deserializing
//! into either enum — the two shapes otherwise have nothing in common.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Lines longer than this are rejected without attempting to parse them.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),
    #[error("Failed to parse command: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("request has neither `type` nor `action`")]
    MissingDiscriminant,
}

/// The modern, per-session-socket request shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedRequest {
    Send {
        id: String,
        #[serde(rename = "sessionKey", default)]
        session_key: Option<String>,
        message: String,
        #[serde(default)]
        mode: Option<String>,
    },
    Subscribe {
        id: String,
        #[serde(rename = "sessionKey", default)]
        session_key: Option<String>,
        event: String,
    },
    GetMessage {
        id: String,
        #[serde(rename = "sessionKey", default)]
        session_key: Option<String>,
    },
    GetSummary {
        id: String,
        #[serde(rename = "sessionKey", default)]
        session_key: Option<String>,
    },
    Clear {
        id: String,
        #[serde(rename = "sessionKey", default)]
        session_key: Option<String>,
        #[serde(default)]
        summarize: bool,
    },
    Abort {
        id: String,
        #[serde(rename = "sessionKey", default)]
        session_key: Option<String>,
    },
}

impl TypedRequest {
    pub fn id(&self) -> &str {
        match self {
            TypedRequest::Send { id, .. }
            | TypedRequest::Subscribe { id, .. }
            | TypedRequest::GetMessage { id, .. }
            | TypedRequest::GetSummary { id, .. }
            | TypedRequest::Clear { id, .. }
            | TypedRequest::Abort { id, .. } => id,
        }
    }

    pub fn command_name(&self) -> &'static str {
        match self {
            TypedRequest::Send { .. } => "send",
            TypedRequest::Subscribe { .. } => "subscribe",
            TypedRequest::GetMessage { .. } => "get_message",
            TypedRequest::GetSummary { .. } => "get_summary",
            TypedRequest::Clear { .. } => "clear",
            TypedRequest::Abort { .. } => "abort",
        }
    }

    pub fn session_key(&self) -> Option<&str> {
        match self {
            TypedRequest::Send { session_key, .. }
            | TypedRequest::Subscribe { session_key, .. }
            | TypedRequest::GetMessage { session_key, .. }
            | TypedRequest::GetSummary { session_key, .. }
            | TypedRequest::Clear { session_key, .. }
            | TypedRequest::Abort { session_key, .. } => session_key.as_deref(),
        }
    }
}

/// The legacy, action-tagged request shape kept bit-exact because on-disk
/// tools still emit it. `Serialize` is derived alongside
/// `Deserialize` so the CLI can construct and send these directly rather
/// than hand-building JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LegacyRequest {
    Health,
    List,
    Stop {
        #[serde(rename = "sessionKey", default)]
        session_key: Option<String>,
    },
    Send {
        #[serde(rename = "sessionKey")]
        session_key: String,
        message: String,
    },
    GetMessage {
        #[serde(rename = "sessionKey")]
        session_key: String,
    },
    GetSummary {
        #[serde(rename = "sessionKey")]
        session_key: String,
    },
    Clear {
        #[serde(rename = "sessionKey")]
        session_key: String,
        #[serde(default)]
        summarize: bool,
    },
    Abort {
        #[serde(rename = "sessionKey")]
        session_key: String,
    },
    AliasSet {
        alias: String,
        #[serde(rename = "sessionKey")]
        session_key: String,
    },
    AliasAdd {
        alias: String,
        #[serde(rename = "sessionKey")]
        session_key: String,
    },
    AliasRemove {
        alias: String,
    },
    AliasList,
    AliasResolve {
        alias: String,
    },
}

impl LegacyRequest {
    pub fn command_name(&self) -> &'static str {
        match self {
            LegacyRequest::Health => "health",
            LegacyRequest::List => "list",
            LegacyRequest::Stop { .. } => "stop",
            LegacyRequest::Send { .. } => "send",
            LegacyRequest::GetMessage { .. } => "get_message",
            LegacyRequest::GetSummary { .. } => "get_summary",
            LegacyRequest::Clear { .. } => "clear",
            LegacyRequest::Abort { .. } => "abort",
            LegacyRequest::AliasSet { .. } => "alias_set",
            LegacyRequest::AliasAdd { .. } => "alias_add",
            LegacyRequest::AliasRemove { .. } => "alias_remove",
            LegacyRequest::AliasList => "alias_list",
            LegacyRequest::AliasResolve { .. } => "alias_resolve",
        }
    }
}

/// Either request shape, tagged by which discriminant key was present.
pub enum IncomingRequest {
    Typed(TypedRequest),
    Legacy(LegacyRequest),
}

/// Parse one line: probe for `type` vs `action` before deserializing into
/// the matching enum, since the two shapes share no common tag.
pub fn parse_line(line: &str) -> Result<IncomingRequest, ProtocolError> {
    if line.len() > MAX_LINE_BYTES {
        return Err(ProtocolError::LineTooLong(line.len()));
    }
    let value: Value = serde_json::from_str(line)?;
    if value.get("type").is_some() {
        Ok(IncomingRequest::Typed(serde_json::from_value(value)?))
    } else if value.get("action").is_some() {
        Ok(IncomingRequest::Legacy(serde_json::from_value(value)?))
    } else {
        Err(ProtocolError::MissingDiscriminant)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub command: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl CommandResponse {
    pub fn ok(command: impl Into<String>, id: Option<String>, data: Value) -> Self {
        Self { kind: "response", command: command.into(), success: true, data: Some(data), error: None, id }
    }

    pub fn err(command: impl Into<String>, id: Option<String>, error: impl Into<String>) -> Self {
        Self { kind: "response", command: command.into(), success: false, data: None, error: Some(error.into()), id }
    }

    pub fn parse_error(error: impl Into<String>) -> Self {
        Self { kind: "response", command: "parse".to_string(), success: false, data: None, error: Some(error.into()), id: None }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub event: String,
    pub data: Value,
    #[serde(rename = "subscriptionId")]
    pub subscription_id: String,
}

impl EventMessage {
    pub fn turn_end(subscription_id: String, data: Value) -> Self {
        Self { kind: "event", event: "turn_end".to_string(), data, subscription_id }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
