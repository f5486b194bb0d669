// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-replica sync outbox and cursors
//!
//! Every locally recorded event is appended here as an [`Operation`] with a
//! strictly increasing `origin_seq`. Peers pull operations past their cursor.
//! The outbox is never compacted, so shipping is unaffected by event log
//! compaction.
//!
//! Cursors record the highest `origin_seq` applied from each remote origin
//! and live in `cursors.json` next to the outbox.

use crate::log::{repair_log, LogReader, LogWriter};
use crate::StorageError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use yaba_core::{CrdtEvent, Cursors, Operation, OperationPayload, ReplicaId};

const OUTBOX_FILE: &str = "outbox.jsonl";
const CURSORS_FILE: &str = "cursors.json";

#[derive(Clone)]
pub struct OperationLog {
    replica_id: ReplicaId,
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    writer: LogWriter<Operation>,
    /// Local operations in `origin_seq` order
    operations: Vec<Operation>,
    cursors: Cursors,
    cursors_path: PathBuf,
}

impl OperationLog {
    pub fn open(dir: &Path, replica_id: &ReplicaId) -> Result<Self, StorageError> {
        std::fs::create_dir_all(dir)?;
        let outbox_path = dir.join(OUTBOX_FILE);

        let validation = LogReader::open_or_empty(&outbox_path).validate::<Operation>()?;
        if validation.corruption.is_some() {
            repair_log::<Operation>(&outbox_path)?;
        }
        let operations = validation
            .entries
            .into_iter()
            .map(|entry| entry.record)
            .collect();

        let cursors_path = dir.join(CURSORS_FILE);
        let cursors = load_cursors(&cursors_path)?;

        Ok(Self {
            replica_id: replica_id.clone(),
            inner: Arc::new(Mutex::new(Inner {
                writer: LogWriter::open(&outbox_path, replica_id.as_str())?,
                operations,
                cursors,
                cursors_path,
            })),
        })
    }

    pub fn replica_id(&self) -> &ReplicaId {
        &self.replica_id
    }

    /// Durably append locally recorded events as new operations
    pub async fn append_local(
        &self,
        events: &[CrdtEvent],
        happened_at: i64,
    ) -> Result<Vec<Operation>, StorageError> {
        let mut inner = self.inner.lock().await;
        let first_seq = inner.writer.next_sequence();
        let operations: Vec<Operation> = (first_seq..)
            .zip(events)
            .map(|(origin_seq, event)| Operation {
                op_id: format!("{}-{origin_seq}", self.replica_id),
                origin_device_id: self.replica_id.clone(),
                origin_seq,
                happened_at,
                payload: OperationPayload::FieldEvent {
                    event: event.clone(),
                },
            })
            .collect();

        inner.writer.append_batch(operations.clone())?;
        inner.operations.extend(operations.iter().cloned());
        Ok(operations)
    }

    /// Local operations with `origin_seq > after`, at most `limit`
    ///
    /// The flag is true when more operations remain past the batch.
    pub async fn operations_after(&self, after: u64, limit: usize) -> (Vec<Operation>, bool) {
        let inner = self.inner.lock().await;
        let start = inner.operations.partition_point(|op| op.origin_seq <= after);
        let remaining = &inner.operations[start..];
        let batch = remaining.iter().take(limit).cloned().collect();
        (batch, remaining.len() > limit)
    }

    /// Highest counter of this replica in shipped event clocks, per object
    pub async fn shipped_counters(&self) -> BTreeMap<String, u64> {
        let inner = self.inner.lock().await;
        let mut counters = BTreeMap::new();
        for op in &inner.operations {
            let event = op.event();
            let counter = counters.entry(event.object_id.clone()).or_insert(0);
            *counter = event.clock.get(&self.replica_id).max(*counter);
        }
        counters
    }

    /// Highest local `origin_seq`, 0 before the first operation
    pub async fn last_sequence(&self) -> u64 {
        self.inner.lock().await.writer.last_sequence().unwrap_or(0)
    }

    pub async fn cursors(&self) -> Cursors {
        self.inner.lock().await.cursors.clone()
    }

    pub async fn cursor(&self, origin: &ReplicaId) -> u64 {
        self.inner
            .lock()
            .await
            .cursors
            .get(origin)
            .copied()
            .unwrap_or(0)
    }

    /// Move a cursor forward; never moves it back
    pub async fn advance_cursor(&self, origin: &ReplicaId, origin_seq: u64) {
        let mut inner = self.inner.lock().await;
        let cursor = inner.cursors.entry(origin.clone()).or_insert(0);
        *cursor = (*cursor).max(origin_seq);
    }

    pub async fn persist_cursors(&self) -> Result<(), StorageError> {
        let inner = self.inner.lock().await;
        let json = serde_json::to_string_pretty(&inner.cursors)?;
        let temp_path = inner.cursors_path.with_extension("json.tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, &inner.cursors_path)?;
        Ok(())
    }
}

/// Unreadable cursors reset to empty: re-applying operations is idempotent.
fn load_cursors(path: &Path) -> Result<Cursors, StorageError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Cursors::new()),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_str(&content) {
        Ok(cursors) => Ok(cursors),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt cursors, resetting");
            Ok(Cursors::new())
        }
    }
}

#[cfg(test)]
#[path = "outbox_tests.rs"]
mod tests;
