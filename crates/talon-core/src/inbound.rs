// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The inbound message shape produced by transports and fed to the control plane.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Transport a message arrived over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    Slack,
    Discord,
    Socket,
}

impl MessageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageSource::Slack => "slack",
            MessageSource::Discord => "discord",
            MessageSource::Socket => "socket",
        }
    }
}

impl fmt::Display for MessageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attachment carried alongside a message (file reference, image, etc).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
    pub content_type: Option<String>,
}

/// A transport-agnostic inbound event.
///
/// `id` is the dedupe key: two [`InboundMessage`]s with the same `id` arriving
/// within the configured dedupe window are treated as a single delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub source: MessageSource,
    pub channel: String,
    pub thread: Option<String>,
    pub sender_id: String,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub received_at_ms: u64,
}

impl InboundMessage {
    /// Construct a message for the in-process `socket` transport, used by the
    /// CLI and by per-session RPC `send` commands to synthesize an event.
    pub fn synthetic(id: impl Into<String>, channel: impl Into<String>, text: impl Into<String>, received_at_ms: u64) -> Self {
        Self {
            id: id.into(),
            source: MessageSource::Socket,
            channel: channel.into(),
            thread: None,
            sender_id: "operator".to_string(),
            text: text.into(),
            attachments: Vec::new(),
            metadata: HashMap::new(),
            received_at_ms,
        }
    }
}

#[cfg(test)]
#[path = "inbound_tests.rs"]
mod tests;
