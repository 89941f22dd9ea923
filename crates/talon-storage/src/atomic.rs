// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic file writes and append-only JSONL helpers.
//!
//! Every durable write in the store goes through [`write_json_atomic`]:
//! serialize to a sibling `.tmp` file, fsync it, then rename over the
//! target. A reader can never observe a torn file — it is either the
//! previous snapshot or the new one.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreIoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write `value` to `path` atomically via a `.tmp` sibling and rename.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreIoError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_sibling(path);
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read a JSON value from `path`. Returns `Ok(None)` if the file is absent.
///
/// A file that exists but fails to parse is treated as corrupt: it is
/// rotated to a `.bak` sibling (so it can be inspected later) and `None` is
/// returned rather than propagating the parse error, mirroring the
/// tempfile-then-rename invariant that `path` is either absent or valid.
pub fn read_json_or_none<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreIoError> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    match serde_json::from_reader(reader) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            let bak = path.with_extension("bak");
            warn!(error = %e, path = %path.display(), bak = %bak.display(), "corrupt snapshot, rotating to .bak");
            let _ = fs::rename(path, &bak);
            Ok(None)
        }
    }
}

fn tmp_sibling(path: &Path) -> std::path::PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{file_name}.tmp"))
}

/// Append one JSON line to `path`, creating the file if absent.
///
/// Best-effort durable: a write failure is surfaced to the caller but never
/// corrupts prior lines, since append mode never rewrites existing bytes.
pub fn append_line<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreIoError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

/// Read up to the last `tail_n` well-formed JSON lines from `path`.
///
/// Malformed lines are skipped rather than treated as fatal. Returns an
/// empty vec if the file does not exist.
pub fn read_jsonl_tail<T: DeserializeOwned>(path: &Path, tail_n: usize) -> Result<Vec<T>, StoreIoError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut all: Vec<T> = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(v) => all.push(v),
            Err(e) => warn!(error = %e, path = %path.display(), "skipping malformed jsonl line"),
        }
    }
    let start = all.len().saturating_sub(tail_n);
    Ok(all.split_off(start))
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
