// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log reader with corruption detection
//!
//! Iteration stops meaning at the first invalid entry (parse error or
//! checksum mismatch): everything after it is treated as a torn write.

use super::entry::LogEntry;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogReadError {
    #[error("corrupted entry at line {line}: {reason}")]
    Corrupted { line: u64, reason: String },
    #[error("checksum mismatch at line {line}")]
    ChecksumMismatch { line: u64 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reader over a log file; a missing file reads as empty
pub struct LogReader {
    path: PathBuf,
}

impl LogReader {
    pub fn open_or_empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn entries<T>(&self) -> Result<LogEntryIter<T>, LogReadError>
    where
        T: Serialize + DeserializeOwned,
    {
        LogEntryIter::new(&self.path)
    }

    pub fn last_sequence<T>(&self) -> Result<Option<u64>, LogReadError>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut last = None;
        for entry in self.entries::<T>()? {
            match entry {
                Ok(entry) => last = Some(entry.sequence),
                Err(_) => break,
            }
        }
        Ok(last)
    }

    /// Read every valid entry, reporting where corruption begins
    pub fn validate<T>(&self) -> Result<LogValidation<T>, LogReadError>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut iter = self.entries::<T>()?;
        let mut entries = Vec::new();
        let mut corruption = None;

        for entry in iter.by_ref() {
            match entry {
                Ok(entry) => entries.push(entry),
                Err(LogReadError::Corrupted { line, reason }) => {
                    corruption = Some(LogCorruption { line, reason });
                    break;
                }
                Err(LogReadError::ChecksumMismatch { line }) => {
                    corruption = Some(LogCorruption {
                        line,
                        reason: "checksum mismatch".to_string(),
                    });
                    break;
                }
                Err(LogReadError::Io(e)) => return Err(LogReadError::Io(e)),
            }
        }

        Ok(LogValidation {
            entries,
            corruption,
            valid_bytes: iter.last_valid_position(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Result of scanning a log file
#[derive(Debug)]
pub struct LogValidation<T> {
    pub entries: Vec<LogEntry<T>>,
    pub corruption: Option<LogCorruption>,
    /// Byte length of the valid prefix
    pub valid_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCorruption {
    pub line: u64,
    pub reason: String,
}

/// Iterator over entries with byte position tracking
pub struct LogEntryIter<T> {
    reader: Option<BufReader<File>>,
    line_number: u64,
    position: u64,
    /// Byte offset just past the last valid entry
    last_valid_position: u64,
    _record: PhantomData<fn() -> T>,
}

impl<T> LogEntryIter<T> {
    fn new(path: &Path) -> Result<Self, LogReadError> {
        let reader = if path.exists() {
            Some(BufReader::new(File::open(path)?))
        } else {
            None
        };
        Ok(Self {
            reader,
            line_number: 0,
            position: 0,
            last_valid_position: 0,
            _record: PhantomData,
        })
    }

    pub fn last_valid_position(&self) -> u64 {
        self.last_valid_position
    }
}

impl<T: Serialize + DeserializeOwned> Iterator for LogEntryIter<T> {
    type Item = Result<LogEntry<T>, LogReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;

        loop {
            let mut line = String::new();
            let bytes_read = match reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(n) => n as u64,
                Err(e) => {
                    self.reader = None;
                    return Some(Err(LogReadError::Io(e)));
                }
            };
            self.line_number += 1;
            self.position += bytes_read;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            // A line without its newline is a torn write even if it parses
            if !line.ends_with('\n') {
                self.reader = None;
                return Some(Err(LogReadError::Corrupted {
                    line: self.line_number,
                    reason: "truncated entry".to_string(),
                }));
            }

            let entry = match LogEntry::<T>::from_line(trimmed) {
                Ok(entry) => entry,
                Err(e) => {
                    self.reader = None;
                    return Some(Err(LogReadError::Corrupted {
                        line: self.line_number,
                        reason: e.to_string(),
                    }));
                }
            };

            if !entry.verify() {
                self.reader = None;
                return Some(Err(LogReadError::ChecksumMismatch {
                    line: self.line_number,
                }));
            }

            self.last_valid_position = self.position;
            return Some(Ok(entry));
        }
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
