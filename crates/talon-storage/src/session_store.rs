// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable per-session directory layout: one
//! `state.json` snapshot, an append-only `log.jsonl` of raw inbound
//! events, and an append-only `context.jsonl` transcript, all rooted at
//! `{data_dir}/sessions/{session_key}/`. The top-level alias map lives as a
//! sibling of the `sessions/` directory.

use crate::atomic::{append_line, read_json_or_none, read_jsonl_tail, write_json_atomic, StoreIoError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use talon_core::SessionAlias;

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error(transparent)]
    Io(#[from] StoreIoError),
}

/// The persisted snapshot for one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub session_key: String,
    pub last_active_at_ms: u64,
    pub message_count: u64,
    pub turn_index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_processed_message_id: Option<String>,
}

impl SessionState {
    pub fn new(session_key: impl Into<String>, now_ms: u64) -> Self {
        Self {
            session_key: session_key.into(),
            last_active_at_ms: now_ms,
            message_count: 0,
            turn_index: 0,
            last_processed_message_id: None,
        }
    }
}

/// One line of the `context.jsonl` transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptEntry {
    pub kind: TranscriptKind,
    pub text: String,
    pub at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptKind {
    User,
    Assistant,
}

/// Durable store for session state, transcripts, raw event logs, and the
/// alias registry. A thin filesystem wrapper: no caching, no locking beyond
/// what the filesystem itself provides — callers (the control plane) hold
/// their own in-memory authoritative copies and serialize access per
/// session via the serial queue.
pub struct SessionStore {
    data_dir: PathBuf,
}

impl SessionStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn session_dir(&self, session_key: &str) -> PathBuf {
        self.data_dir.join("sessions").join(session_key)
    }

    fn state_path(&self, session_key: &str) -> PathBuf {
        self.session_dir(session_key).join("state.json")
    }

    fn log_path(&self, session_key: &str) -> PathBuf {
        self.session_dir(session_key).join("log.jsonl")
    }

    fn context_path(&self, session_key: &str) -> PathBuf {
        self.session_dir(session_key).join("context.jsonl")
    }

    fn aliases_path(&self) -> PathBuf {
        self.data_dir.join("aliases.json")
    }

    pub fn read_session_state(&self, session_key: &str) -> Result<Option<SessionState>, SessionStoreError> {
        Ok(read_json_or_none(&self.state_path(session_key))?)
    }

    pub fn write_session_state(&self, session_key: &str, state: &SessionState) -> Result<(), SessionStoreError> {
        Ok(write_json_atomic(&self.state_path(session_key), state)?)
    }

    /// Append a raw inbound event to `log.jsonl` for `session_key`.
    pub fn append_log(&self, session_key: &str, raw_event: &serde_json::Value) -> Result<(), SessionStoreError> {
        Ok(append_line(&self.log_path(session_key), raw_event)?)
    }

    /// Append one transcript entry to `context.jsonl`.
    pub fn append_context(&self, session_key: &str, entry: &TranscriptEntry) -> Result<(), SessionStoreError> {
        Ok(append_line(&self.context_path(session_key), entry)?)
    }

    /// Read up to the last `tail_n` transcript entries.
    pub fn read_context_tail(&self, session_key: &str, tail_n: usize) -> Result<Vec<TranscriptEntry>, SessionStoreError> {
        Ok(read_jsonl_tail(&self.context_path(session_key), tail_n)?)
    }

    /// Rewrite the full transcript, replacing whatever was there before.
    ///
    /// Used when trimming the transcript to `SESSION_MAX_MESSAGES` and by
    /// `Clear`. Not part of the append-only contract for `context.jsonl`,
    /// but still goes through an atomic temp-file-then-rename so a reader
    /// never observes a half-written file.
    pub fn rewrite_context(&self, session_key: &str, entries: &[TranscriptEntry]) -> Result<(), SessionStoreError> {
        let path = self.context_path(session_key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreIoError::from)?;
        }
        let tmp = path.with_file_name("context.jsonl.tmp");
        {
            use std::io::Write;
            let mut f = std::fs::File::create(&tmp).map_err(StoreIoError::from)?;
            for entry in entries {
                let mut line = serde_json::to_string(entry).map_err(StoreIoError::from)?;
                line.push('\n');
                f.write_all(line.as_bytes()).map_err(StoreIoError::from)?;
            }
            f.sync_all().map_err(StoreIoError::from)?;
        }
        std::fs::rename(&tmp, &path).map_err(StoreIoError::from)?;
        Ok(())
    }

    /// Remove `state.json`, `log.jsonl`, `context.jsonl` for `session_key`,
    /// in that order. Idempotent: missing files are not an error.
    pub fn clear_session_data(&self, session_key: &str) -> Result<(), SessionStoreError> {
        for path in [
            self.state_path(session_key),
            self.log_path(session_key),
            self.context_path(session_key),
        ] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(SessionStoreError::Io(StoreIoError::Io(e))),
            }
        }
        Ok(())
    }

    pub fn read_alias_map(&self) -> Result<HashMap<String, SessionAlias>, SessionStoreError> {
        Ok(read_json_or_none(&self.aliases_path())?.unwrap_or_default())
    }

    pub fn write_alias_map(&self, map: &HashMap<String, SessionAlias>) -> Result<(), SessionStoreError> {
        Ok(write_json_atomic(&self.aliases_path(), map)?)
    }
}

#[cfg(test)]
#[path = "session_store_tests.rs"]
mod tests;
