// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only write-ahead log of events.
//!
//! Entries are JSON lines `{"seq": N, "event": {...}}`. The log is the
//! durability boundary: a status transition is externally visible only
//! after its entry has been flushed here.

use icarus_core::Event;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur in WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt WAL entry at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },
}

/// One logged event with its sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub event: Event,
}

/// Append-only event log.
///
/// `write_seq` is the last appended sequence; `processed_seq` is the last
/// sequence the engine has applied (the snapshot cut point).
pub struct Wal {
    path: PathBuf,
    writer: BufWriter<File>,
    write_seq: u64,
    processed_seq: u64,
}

impl Wal {
    /// Open (or create) the log at `path`, resuming after `processed_seq`.
    ///
    /// Scans existing entries to recover the write sequence. A torn final
    /// line (crash mid-append) is truncated away so later appends start
    /// on a clean boundary; corruption in the middle of the log is an
    /// error.
    pub fn open(path: &Path, processed_seq: u64) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut write_seq = 0;
        if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            let mut good_len = 0usize;
            let mut offset = 0usize;
            let mut lines = raw.split_inclusive('\n').enumerate().peekable();
            while let Some((idx, line)) = lines.next() {
                offset += line.len();
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    good_len = offset;
                    continue;
                }
                match serde_json::from_str::<WalEntry>(trimmed) {
                    Ok(entry) => {
                        write_seq = entry.seq;
                        good_len = offset;
                    }
                    Err(e) if lines.peek().is_none() => {
                        // Torn final write from a crash mid-append.
                        tracing::warn!(line = idx + 1, error = %e, "truncating torn WAL tail");
                        let file = OpenOptions::new().write(true).open(path)?;
                        file.set_len(good_len as u64)?;
                    }
                    Err(e) => {
                        return Err(WalError::Corrupt { line: idx + 1, reason: e.to_string() })
                    }
                }
            }
        }

        // A snapshot can be ahead of a truncated log; never hand out
        // sequence numbers below what the snapshot already covers.
        let write_seq = write_seq.max(processed_seq);

        let file = OpenOptions::new().append(true).create(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            write_seq,
            processed_seq,
        })
    }

    /// Append an event, returning its sequence number. Call [`Wal::flush`]
    /// before treating the entry as durable.
    pub fn append(&mut self, event: &Event) -> Result<u64, WalError> {
        self.write_seq += 1;
        let entry = WalEntry { seq: self.write_seq, event: event.clone() };
        serde_json::to_writer(&mut self.writer, &entry)?;
        self.writer.write_all(b"\n")?;
        Ok(self.write_seq)
    }

    /// Flush buffered entries to the OS and fsync the file.
    pub fn flush(&mut self) -> Result<(), WalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Mark entries up to `seq` as applied to the materialized state.
    pub fn mark_processed(&mut self, seq: u64) {
        if seq > self.processed_seq {
            self.processed_seq = seq;
        }
    }

    /// Read all entries with `seq > after` from disk.
    pub fn entries_after(&self, after: u64) -> Result<Vec<WalEntry>, WalError> {
        let mut entries = Vec::new();
        if !self.path.exists() {
            return Ok(entries);
        }
        let reader = BufReader::new(File::open(&self.path)?);
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WalEntry>(&line) {
                Ok(entry) if entry.seq > after => entries.push(entry),
                Ok(_) => {}
                Err(e) => {
                    // Entries past the last good one were never applied.
                    tracing::warn!(line = idx + 1, error = %e, "stopping replay at corrupt entry");
                    break;
                }
            }
        }
        Ok(entries)
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
