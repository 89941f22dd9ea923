// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The alias → session-key map: persisted via the session store and
//! mirrored as filesystem symlinks next to per-session RPC sockets, so
//! external tools can resolve `{alias}.alias -> {sha1}.sock` without
//! consulting the daemon at all.

use parking_lot::Mutex;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use talon_core::{alias, Clock, SessionAlias};
use talon_storage::{SessionStore, SessionStoreError};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AliasError {
    #[error("invalid_alias: {0:?}")]
    InvalidAlias(String),
    #[error("alias_not_found: {0:?}")]
    NotFound(String),
}

/// `sha1(session_key)` hex digest, used as the per-session socket's file
/// stem: `{dir}/session-control/{sha1}.sock`.
pub fn session_socket_stem(session_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(session_key.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct AliasRegistry<C: Clock> {
    store: std::sync::Arc<SessionStore>,
    control_dir: PathBuf,
    clock: C,
    map: Mutex<HashMap<String, SessionAlias>>,
}

impl<C: Clock> AliasRegistry<C> {
    /// Load the persisted alias map from `store` and re-sync every
    /// existing symlink against it (a restart may have left stale or
    /// missing links behind).
    pub fn load(store: std::sync::Arc<SessionStore>, control_dir: PathBuf, clock: C) -> Result<Self, SessionStoreError> {
        let map = store.read_alias_map()?;
        let registry = Self { store, control_dir, clock, map: Mutex::new(map) };
        registry.resync_all_symlinks();
        Ok(registry)
    }

    fn persist(&self) -> Result<(), SessionStoreError> {
        let map = self.map.lock();
        self.store.write_alias_map(&map)
    }

    fn socket_path(&self, session_key: &str) -> PathBuf {
        self.control_dir.join(format!("{}.sock", session_socket_stem(session_key)))
    }

    fn symlink_path(&self, normalized_alias: &str) -> PathBuf {
        self.control_dir.join(format!("{normalized_alias}.alias"))
    }

    /// Refresh (or remove) the symlink for one alias based on whether the
    /// target session currently has a live socket on disk.
    fn sync_symlink(&self, normalized_alias: &str, session_key: &str) {
        let link = self.symlink_path(normalized_alias);
        let target = self.socket_path(session_key);
        let _ = std::fs::remove_file(&link);
        if target.exists() {
            if let Some(parent) = link.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            #[cfg(unix)]
            {
                let _ = std::os::unix::fs::symlink(&target, &link);
            }
        }
    }

    fn resync_all_symlinks(&self) {
        let entries: Vec<SessionAlias> = self.map.lock().values().cloned().collect();
        for entry in entries {
            self.sync_symlink(&entry.alias, entry.session_key.as_str());
        }
    }

    /// Re-sync every alias that currently resolves to `session_key`. Called
    /// whenever a session's live socket comes up or goes away.
    pub fn resync_symlinks_for_session(&self, session_key: &str) {
        let aliases: Vec<String> = self
            .map
            .lock()
            .values()
            .filter(|a| a.session_key.as_str() == session_key)
            .map(|a| a.alias.clone())
            .collect();
        for normalized in aliases {
            self.sync_symlink(&normalized, session_key);
        }
    }

    /// `Set(alias, sessionKey)`: normalize, validate, resolve a single hop
    /// if `session_key` is itself an alias (never chains more than once),
    /// persist, and refresh the symlink.
    pub fn set(&self, raw_alias: &str, session_key: &str) -> Result<SessionAlias, AliasError> {
        let normalized = alias::normalize(raw_alias);
        if !alias::is_valid(&normalized) {
            return Err(AliasError::InvalidAlias(raw_alias.to_string()));
        }
        let resolved_key = {
            let map = self.map.lock();
            match map.get(&alias::normalize(session_key)) {
                Some(existing) => existing.session_key.as_str().to_string(),
                None => session_key.to_string(),
            }
        };
        let record = SessionAlias {
            alias: normalized.clone(),
            session_key: talon_core::SessionKey::new(resolved_key.clone()),
            created_at_ms: self.clock.now_ms(),
        };
        {
            let mut map = self.map.lock();
            map.insert(normalized.clone(), record.clone());
        }
        let _ = self.persist();
        self.sync_symlink(&normalized, &resolved_key);
        Ok(record)
    }

    /// `Remove(alias)`: returns the previous record, if any, and removes
    /// its symlink.
    pub fn remove(&self, raw_alias: &str) -> Option<SessionAlias> {
        let normalized = alias::normalize(raw_alias);
        let removed = self.map.lock().remove(&normalized);
        if removed.is_some() {
            let _ = self.persist();
            let _ = std::fs::remove_file(self.symlink_path(&normalized));
        }
        removed
    }

    pub fn resolve(&self, raw_alias: &str) -> Option<talon_core::SessionKey> {
        let normalized = alias::normalize(raw_alias);
        self.map.lock().get(&normalized).map(|a| a.session_key.clone())
    }

    pub fn list(&self) -> Vec<SessionAlias> {
        let mut entries: Vec<SessionAlias> = self.map.lock().values().cloned().collect();
        entries.sort_by(|a, b| a.alias.cmp(&b.alias));
        entries
    }

    pub fn aliases_for_session(&self, session_key: &str) -> Vec<String> {
        let mut found: Vec<String> =
            self.map.lock().values().filter(|a| a.session_key.as_str() == session_key).map(|a| a.alias.clone()).collect();
        found.sort();
        found
    }
}

/// Directory symlinks and per-session sockets are rooted in, derived from
/// the control socket path the same way `Config::session_control_dir` does.
pub fn session_control_dir(control_socket_path: &Path) -> PathBuf {
    control_socket_path.parent().map(|p| p.join("session-control")).unwrap_or_else(|| PathBuf::from("session-control"))
}

#[cfg(test)]
#[path = "alias_registry_tests.rs"]
mod tests;
