// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event store backed by a checksummed JSONL log
//!
//! The whole log is indexed in memory on open. Appends go to the end of the
//! file; deletions rewrite it.

use super::{sort_by_timestamp, EventStore};
use crate::log::{repair_log, rewrite_log, LogEntry, LogReader, LogWriter};
use crate::StorageError;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use yaba_core::{CrdtEvent, ReplicaId};

#[derive(Clone)]
pub struct FileEventStore {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    path: PathBuf,
    writer: LogWriter<CrdtEvent>,
    /// Stored entries by log sequence
    entries: BTreeMap<u64, LogEntry<CrdtEvent>>,
    sequence_by_id: HashMap<String, u64>,
}

impl FileEventStore {
    /// Open or create the event log at `path`
    ///
    /// A corrupt tail (torn final write) is truncated so later appends stay
    /// readable.
    pub fn open(path: &Path, replica_id: &ReplicaId) -> Result<Self, StorageError> {
        let validation = LogReader::open_or_empty(path).validate::<CrdtEvent>()?;
        if let Some(corruption) = &validation.corruption {
            tracing::warn!(
                path = %path.display(),
                line = corruption.line,
                reason = %corruption.reason,
                "event log corrupt, truncating to last valid entry"
            );
            repair_log::<CrdtEvent>(path)?;
        }

        let mut entries = BTreeMap::new();
        let mut sequence_by_id = HashMap::new();
        for entry in validation.entries {
            sequence_by_id.insert(entry.record.event_id.clone(), entry.sequence);
            entries.insert(entry.sequence, entry);
        }

        let writer = LogWriter::open(path, replica_id.as_str())?;
        tracing::debug!(path = %path.display(), events = entries.len(), "opened event log");

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                path: path.to_path_buf(),
                writer,
                entries,
                sequence_by_id,
            })),
        })
    }

    pub async fn path(&self) -> PathBuf {
        self.inner.lock().await.path.clone()
    }
}

impl Inner {
    fn events(&self) -> impl Iterator<Item = &CrdtEvent> {
        self.entries.values().map(|entry| &entry.record)
    }

    fn collect_sorted<'a>(&self, events: impl Iterator<Item = &'a CrdtEvent>) -> Vec<CrdtEvent> {
        let mut events: Vec<_> = events.cloned().collect();
        sort_by_timestamp(&mut events);
        events
    }
}

#[async_trait]
impl EventStore for FileEventStore {
    async fn insert_events(&self, events: &[CrdtEvent]) -> Result<usize, StorageError> {
        let mut inner = self.inner.lock().await;

        let mut seen = HashSet::new();
        let fresh: Vec<CrdtEvent> = events
            .iter()
            .filter(|event| {
                !inner.sequence_by_id.contains_key(&event.event_id)
                    && seen.insert(event.event_id.as_str())
            })
            .cloned()
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        let written = inner.writer.append_batch(fresh)?;
        let inserted = written.len();
        for entry in written {
            inner
                .sequence_by_id
                .insert(entry.record.event_id.clone(), entry.sequence);
            inner.entries.insert(entry.sequence, entry);
        }
        Ok(inserted)
    }

    async fn events_for_object(&self, object_id: &str) -> Result<Vec<CrdtEvent>, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner.collect_sorted(inner.events().filter(|e| e.object_id == object_id)))
    }

    async fn all_events(&self) -> Result<Vec<CrdtEvent>, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner.collect_sorted(inner.events()))
    }

    async fn events_after_timestamp(
        &self,
        timestamp: i64,
    ) -> Result<Vec<CrdtEvent>, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner.collect_sorted(inner.events().filter(|e| e.timestamp > timestamp)))
    }

    async fn delete_events_by_ids(&self, event_ids: &[String]) -> Result<usize, StorageError> {
        let mut inner = self.inner.lock().await;

        let doomed: BTreeSet<u64> = event_ids
            .iter()
            .filter_map(|id| inner.sequence_by_id.get(id).copied())
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }

        let kept: Vec<LogEntry<CrdtEvent>> = inner
            .entries
            .values()
            .filter(|entry| !doomed.contains(&entry.sequence))
            .cloned()
            .collect();
        rewrite_log(&inner.path, &kept)?;

        // The file no longer holds them, whether or not the reopen succeeds
        for sequence in &doomed {
            if let Some(entry) = inner.entries.remove(sequence) {
                inner.sequence_by_id.remove(&entry.record.event_id);
            }
        }
        tracing::debug!(removed = doomed.len(), kept = kept.len(), "rewrote event log");
        inner.writer.reopen()?;
        Ok(doomed.len())
    }

    async fn object_ids_with_events(&self) -> Result<Vec<String>, StorageError> {
        let inner = self.inner.lock().await;
        let ids: BTreeSet<&str> = inner.events().map(|e| e.object_id.as_str()).collect();
        Ok(ids.into_iter().map(str::to_string).collect())
    }

    async fn event_count(&self) -> Result<u64, StorageError> {
        Ok(self.inner.lock().await.entries.len() as u64)
    }

    async fn contains_event(&self, event_id: &str) -> Result<bool, StorageError> {
        Ok(self.inner.lock().await.sequence_by_id.contains_key(event_id))
    }
}
