// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log entry structure with checksum verification
//!
//! Each line of a log file holds one entry: sequence number, write time,
//! writing replica, the record itself and a CRC32 of the serialized record.

use crate::StorageError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A single entry in an append-only log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry<T> {
    /// Monotonically increasing, starting at 1
    pub sequence: u64,
    /// Microseconds since Unix epoch
    pub timestamp_micros: u64,
    /// Replica that wrote the entry
    pub replica_id: String,
    pub record: T,
    /// CRC32 checksum of serialized record
    pub checksum: u32,
}

impl<T: Serialize + DeserializeOwned> LogEntry<T> {
    pub fn new(sequence: u64, replica_id: &str, record: T) -> Self {
        let timestamp_micros = u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap_or(0);
        Self::new_with_timestamp(sequence, timestamp_micros, replica_id, record)
    }

    pub fn new_with_timestamp(
        sequence: u64,
        timestamp_micros: u64,
        replica_id: &str,
        record: T,
    ) -> Self {
        let checksum = Self::calculate_checksum(&record);
        Self {
            sequence,
            timestamp_micros,
            replica_id: replica_id.to_string(),
            record,
            checksum,
        }
    }

    fn calculate_checksum(record: &T) -> u32 {
        // Records are plain data; a serialization failure yields a checksum
        // that will not verify on read.
        let json = serde_json::to_string(record).unwrap_or_default();
        crc32fast::hash(json.as_bytes())
    }

    pub fn verify(&self) -> bool {
        self.checksum == Self::calculate_checksum(&self.record)
    }

    /// Serialize to one line of JSON (no trailing newline)
    pub fn to_line(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(StorageError::from)
    }

    pub fn from_line(line: &str) -> Result<Self, StorageError> {
        serde_json::from_str(line).map_err(StorageError::from)
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
