// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checksummed append-only JSONL logs
//!
//! Used for the event log and the sync outbox. Entries are appended with
//! fsync; removals rewrite the whole file through a temp file and an atomic
//! rename so a crash leaves either the old or the new file.

mod entry;
mod reader;
mod writer;

pub use entry::LogEntry;
pub use reader::{LogCorruption, LogEntryIter, LogReadError, LogReader, LogValidation};
pub use writer::LogWriter;

use crate::StorageError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Replace a log's contents with `entries`, preserving their sequence numbers
pub fn rewrite_log<T>(path: &Path, entries: &[LogEntry<T>]) -> Result<(), StorageError>
where
    T: Serialize + DeserializeOwned,
{
    let temp_path = path.with_extension("jsonl.rewrite.tmp");
    {
        let mut file = File::create(&temp_path)?;
        for entry in entries {
            file.write_all(entry.to_line()?.as_bytes())?;
            file.write_all(b"\n")?;
        }
        file.sync_all()?;
    }
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// Truncate a log at its first corrupt entry
///
/// Returns the number of bytes removed, 0 when the log is intact.
pub fn repair_log<T>(path: &Path) -> Result<u64, StorageError>
where
    T: Serialize + DeserializeOwned,
{
    if !path.exists() {
        return Ok(0);
    }

    let validation = LogReader::open_or_empty(path).validate::<T>()?;
    let Some(corruption) = validation.corruption else {
        return Ok(0);
    };

    let old_size = std::fs::metadata(path)?.len();
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(validation.valid_bytes)?;
    file.sync_all()?;

    let removed = old_size.saturating_sub(validation.valid_bytes);
    tracing::warn!(
        path = %path.display(),
        line = corruption.line,
        reason = %corruption.reason,
        bytes_removed = removed,
        "log truncated at corruption point"
    );
    Ok(removed)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
