// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The [`SessionAlias`] record and the validity rules for alias names.

use crate::route::SessionKey;
use serde::{Deserialize, Serialize};

/// A human-chosen label mapped to a session key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAlias {
    pub alias: String,
    pub session_key: SessionKey,
    pub created_at_ms: u64,
}

/// Normalize an alias: trim surrounding whitespace and lowercase.
pub fn normalize(alias: &str) -> String {
    alias.trim().to_ascii_lowercase()
}

/// `^[A-Za-z0-9._-]{1,64}$`, checked against the already-normalized form.
pub fn is_valid(alias: &str) -> bool {
    !alias.is_empty()
        && alias.len() <= 64
        && alias
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
}

#[cfg(test)]
#[path = "alias_tests.rs"]
mod tests;
