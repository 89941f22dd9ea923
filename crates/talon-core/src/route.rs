// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session routing: deriving a stable [`SessionKey`] from an inbound message.

use crate::inbound::InboundMessage;
use std::fmt;

crate::define_id! {
    /// A session's stable identity, `"{source}:{channel}:{thread}"`.
    pub struct SessionKey;
}

const DEFAULT_THREAD: &str = "main";

/// Replace any character outside `[A-Za-z0-9._-]` with `_`.
fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// The components a [`SessionKey`] was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRoute {
    pub source: String,
    pub channel: String,
    pub thread: String,
    pub session_key: SessionKey,
}

impl fmt::Display for NormalizedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.session_key)
    }
}

/// Derive the session route for an inbound message.
///
/// An absent or empty thread id defaults to `"main"`; every component is
/// sanitized independently before being joined.
pub fn route_from_message(m: &InboundMessage) -> NormalizedRoute {
    let source = sanitize(m.source.as_str());
    let channel = sanitize(&m.channel);
    let thread_raw = m.thread.as_deref().filter(|t| !t.is_empty()).unwrap_or(DEFAULT_THREAD);
    let thread = sanitize(thread_raw);
    let session_key = SessionKey::new(format!("{source}:{channel}:{thread}"));
    NormalizedRoute {
        source,
        channel,
        thread,
        session_key,
    }
}

#[cfg(test)]
#[path = "route_tests.rs"]
mod tests;
