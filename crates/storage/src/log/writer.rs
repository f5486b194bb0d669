// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable appends
//!
//! Every append is fsync'd before returning.

use super::entry::LogEntry;
use super::reader::LogReader;
use crate::StorageError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Append-only writer for a log of `T` records
pub struct LogWriter<T> {
    path: PathBuf,
    file: File,
    next_sequence: u64,
    replica_id: String,
    _record: PhantomData<fn(T)>,
}

impl<T: Serialize + DeserializeOwned> LogWriter<T> {
    /// Open or create a log file
    ///
    /// Scans an existing file for its last valid sequence number.
    pub fn open(path: &Path, replica_id: &str) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let next_sequence = LogReader::open_or_empty(path)
            .last_sequence::<T>()?
            .map_or(1, |s| s + 1);

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_sequence,
            replica_id: replica_id.to_string(),
            _record: PhantomData,
        })
    }

    /// Append one record, returning its sequence number
    pub fn append(&mut self, record: T) -> Result<u64, StorageError> {
        let sequence = self.next_sequence;
        self.append_batch(vec![record])?;
        Ok(sequence)
    }

    /// Append records with a single fsync, returning the written entries
    ///
    /// Sequence numbers are only consumed once the batch is durable.
    pub fn append_batch(&mut self, records: Vec<T>) -> Result<Vec<LogEntry<T>>, StorageError> {
        let start = self.next_sequence;
        let entries: Vec<LogEntry<T>> = (start..)
            .zip(records)
            .map(|(sequence, record)| LogEntry::new(sequence, &self.replica_id, record))
            .collect();

        let mut buffer = String::new();
        for entry in &entries {
            buffer.push_str(&entry.to_line()?);
            buffer.push('\n');
        }
        self.file.write_all(buffer.as_bytes())?;
        self.file.sync_all()?;

        self.next_sequence = start + entries.len() as u64;
        Ok(entries)
    }

    /// Reopen the file handle after the file was replaced on disk
    ///
    /// Keeps the sequence counter so numbers are never reused.
    pub fn reopen(&mut self) -> Result<(), StorageError> {
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        Ok(())
    }

    /// Sequence number the next append will get
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Last assigned sequence number, `None` before the first append
    pub fn last_sequence(&self) -> Option<u64> {
        (self.next_sequence > 1).then(|| self.next_sequence - 1)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
