// SPDX-License-Identifier: MIT

//! Append-only write-ahead log.
//!
//! One JSON entry per line, each carrying its own sequence number. `append`
//! does not return until the entry is flushed and fsynced, so any operation
//! acknowledged to a caller is durable. A torn final line (crash mid-write)
//! is trimmed on open; corruption earlier in the file is an error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt WAL entry at {path}:{line}: {detail}")]
    Corrupt { path: PathBuf, line: usize, detail: String },
}

/// One logged event with its sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry<E> {
    pub seq: u64,
    pub event: E,
}

/// Append-only log of `E` events.
#[derive(Debug)]
pub struct Wal<E> {
    path: PathBuf,
    writer: BufWriter<File>,
    write_seq: u64,
    _event: PhantomData<E>,
}

impl<E: Serialize + DeserializeOwned> Wal<E> {
    /// Open the log (creating it if missing) and read back every entry.
    ///
    /// `min_seq` seeds the sequence counter when the log has been truncated
    /// by a checkpoint: new entries must keep numbering past the snapshot.
    pub fn open(path: &Path, min_seq: u64) -> Result<(Self, Vec<WalEntry<E>>), WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().read(true).append(true).create(true).open(path)?;
        let mut text = String::new();
        file.read_to_string(&mut text)?;

        let (entries, keep_bytes) = parse_entries::<E>(path, &text)?;
        if keep_bytes < text.len() as u64 {
            // Torn final line from a crash mid-append; trim it.
            tracing::warn!(path = %path.display(), "trimming torn WAL tail");
            file.set_len(keep_bytes)?;
            file.seek(SeekFrom::End(0))?;
        }

        let write_seq = entries.last().map(|e| e.seq).unwrap_or(0).max(min_seq);
        let wal = Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            write_seq,
            _event: PhantomData,
        };
        Ok((wal, entries))
    }

    /// Append one event; durable when this returns.
    pub fn append(&mut self, event: &E) -> Result<u64, WalError> {
        let seq = self.write_seq + 1;
        let line = serde_json::to_string(&WalEntryRef { seq, event })?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.write_seq = seq;
        Ok(seq)
    }

    /// Highest sequence number written (or seeded).
    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    /// Drop all entries; sequence numbering continues from where it was.
    /// Called after a snapshot has captured everything up to `write_seq`.
    pub fn truncate(&mut self) -> Result<(), WalError> {
        self.writer.flush()?;
        self.writer.get_ref().set_len(0)?;
        self.writer.get_ref().sync_data()?;
        self.writer.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Serialize-only borrow used by `append` so callers pass events by reference.
#[derive(Serialize)]
struct WalEntryRef<'a, E> {
    seq: u64,
    event: &'a E,
}

fn parse_entries<E: DeserializeOwned>(
    path: &Path,
    text: &str,
) -> Result<(Vec<WalEntry<E>>, u64), WalError> {
    let mut entries = Vec::new();
    let mut offset = 0u64;
    for (idx, line) in text.split_inclusive('\n').enumerate() {
        if !line.ends_with('\n') {
            // Incomplete final line: stop here, caller trims the file.
            break;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            offset += line.len() as u64;
            continue;
        }
        match serde_json::from_str::<WalEntry<E>>(trimmed) {
            Ok(entry) => {
                entries.push(entry);
                offset += line.len() as u64;
            }
            Err(err) => {
                return Err(WalError::Corrupt {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    detail: err.to_string(),
                });
            }
        }
    }
    Ok((entries, offset))
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
