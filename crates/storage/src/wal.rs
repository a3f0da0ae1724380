// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL write-ahead log of store mutations with group commit.
//!
//! Every [`StoreOp`] is appended before it is applied to the in-memory
//! state, so a crash loses at most the unflushed tail. Recovery loads the
//! snapshot and replays entries after the snapshot's sequence.
//!
//! Each entry is a single line of JSON: `{"seq":N,"op":{...}}\n`

use crate::state::StoreOp;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

/// Flush interval for group commit (~10ms batches)
const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Maximum entries to buffer before forcing flush
const FLUSH_THRESHOLD: usize = 100;

/// Errors that can occur in Wal operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct WalRecordRef<'a> {
    seq: u64,
    op: &'a StoreOp,
}

#[derive(Deserialize)]
struct WalRecord {
    seq: u64,
    op: StoreOp,
}

/// A single WAL entry with sequence number
#[derive(Debug, Clone)]
pub struct WalEntry {
    pub seq: u64,
    pub op: StoreOp,
}

/// JSONL WAL for durable op storage with group commit.
///
/// Ops are buffered in memory and flushed to disk either:
/// - When `needs_flush()` returns true (interval elapsed or buffer full)
/// - Explicitly via `flush()`
pub struct Wal {
    file: File,
    path: PathBuf,
    /// Highest sequence number assigned
    write_seq: u64,
    /// Buffered JSON lines waiting to be flushed (without trailing newline)
    write_buffer: Vec<Vec<u8>>,
    last_flush: Instant,
}

impl Wal {
    /// Open or create a WAL at the given path.
    ///
    /// `base_seq` is the sequence covered by the snapshot (or 0). New entries
    /// are numbered after both it and anything already in the file, so
    /// sequence numbers stay monotonic across truncation.
    pub fn open(path: &Path, base_seq: u64) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = open_append(path)?;
        let (mut max_seq, corrupt) = Self::scan(&file)?;

        if corrupt {
            let valid_lines = Self::read_valid_lines(&file)?;
            drop(file);

            let bak_path = crate::snapshot::rotate_bak_path(path);
            warn!(
                path = %path.display(),
                bak = %bak_path.display(),
                valid_entries = valid_lines.len(),
                "Corrupt WAL detected, rotating to .bak and preserving valid entries",
            );
            std::fs::rename(path, &bak_path)?;

            {
                let mut new_file = File::create(path)?;
                for line in &valid_lines {
                    new_file.write_all(line.as_bytes())?;
                    new_file.write_all(b"\n")?;
                }
                new_file.sync_all()?;
            }

            file = open_append(path)?;
            max_seq = Self::scan(&file)?.0;
        }

        Ok(Self {
            file,
            path: path.to_owned(),
            write_seq: max_seq.max(base_seq),
            write_buffer: Vec::new(),
            last_flush: Instant::now(),
        })
    }

    /// Returns `(max_seq, corrupt)`, where `corrupt` is true if a line
    /// failed to parse (not just EOF).
    fn scan(file: &File) -> Result<(u64, bool), WalError> {
        let mut max_seq = 0u64;
        let mut corrupt = false;
        for_each_line(file, |trimmed| match serde_json::from_str::<WalRecord>(trimmed) {
            Ok(record) => {
                max_seq = max_seq.max(record.seq);
                true
            }
            Err(_) => {
                corrupt = true;
                false
            }
        })?;
        Ok((max_seq, corrupt))
    }

    /// Read all parseable lines, stopping at the first corrupt entry.
    fn read_valid_lines(file: &File) -> Result<Vec<String>, WalError> {
        let mut valid_lines = Vec::new();
        for_each_line(file, |trimmed| {
            if serde_json::from_str::<WalRecord>(trimmed).is_err() {
                return false;
            }
            valid_lines.push(trimmed.to_string());
            true
        })?;
        Ok(valid_lines)
    }

    /// Append an op to the write buffer.
    ///
    /// Returns the assigned sequence number. The op is NOT durable until
    /// `flush()` is called.
    pub fn append(&mut self, op: &StoreOp) -> Result<u64, WalError> {
        let seq = self.write_seq + 1;
        let json_bytes = serde_json::to_vec(&WalRecordRef { seq, op })?;
        self.write_seq = seq;
        self.write_buffer.push(json_bytes);
        Ok(seq)
    }

    /// Check if flush is needed (interval elapsed or buffer full).
    pub fn needs_flush(&self) -> bool {
        !self.write_buffer.is_empty()
            && (self.last_flush.elapsed() >= FLUSH_INTERVAL
                || self.write_buffer.len() >= FLUSH_THRESHOLD)
    }

    /// Flush all buffered entries to disk with a single fsync.
    pub fn flush(&mut self) -> Result<(), WalError> {
        if self.write_buffer.is_empty() {
            return Ok(());
        }

        for mut json_bytes in self.write_buffer.drain(..) {
            json_bytes.push(b'\n');
            self.file.write_all(&json_bytes)?;
        }

        self.file.sync_all()?;
        self.last_flush = Instant::now();
        Ok(())
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    /// Drop entries with a sequence below `seq`.
    ///
    /// Called after a checkpoint to reclaim disk space.
    pub fn truncate_before(&mut self, seq: u64) -> Result<(), WalError> {
        self.flush()?;

        let mut kept_lines = Vec::new();
        for_each_line(&self.file, |trimmed| {
            match serde_json::from_str::<WalRecord>(trimmed) {
                Ok(record) => {
                    if record.seq >= seq {
                        kept_lines.push(trimmed.to_string());
                    }
                    true
                }
                Err(_) => false,
            }
        })?;

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp_file = File::create(&tmp_path)?;
            for line in &kept_lines {
                tmp_file.write_all(line.as_bytes())?;
                tmp_file.write_all(b"\n")?;
            }
            tmp_file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        self.file = open_append(&self.path)?;
        Ok(())
    }

    /// All flushed entries after the given sequence number.
    ///
    /// Replay stops at the first corrupt line.
    pub fn entries_after(&self, seq: u64) -> Result<Vec<WalEntry>, WalError> {
        let mut entries = Vec::new();
        for_each_line(&self.file, |trimmed| {
            match serde_json::from_str::<WalRecord>(trimmed) {
                Ok(record) => {
                    if record.seq > seq {
                        entries.push(WalEntry {
                            seq: record.seq,
                            op: record.op,
                        });
                    }
                    true
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        "Corrupt WAL entry during replay, stopping at corruption point"
                    );
                    false
                }
            }
        })?;
        Ok(entries)
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
}

/// Feed each non-empty trimmed line to `visit` until it returns false.
fn for_each_line(file: &File, mut visit: impl FnMut(&str) -> bool) -> Result<(), WalError> {
    let mut reader = BufReader::new(file.try_clone()?);
    reader.seek(SeekFrom::Start(0))?;

    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
            Err(e) => return Err(e.into()),
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !visit(trimmed) {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
