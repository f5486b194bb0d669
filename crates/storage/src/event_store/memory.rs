// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory event store
//!
//! Holds events for an ephemeral replica. With the `test-support` feature it
//! can also be told to fail writes.

use super::{sort_by_timestamp, EventStore};
use crate::StorageError;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use yaba_core::CrdtEvent;

#[derive(Clone, Default)]
pub struct MemoryEventStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    /// Insertion order
    events: Vec<CrdtEvent>,
    ids: HashSet<String>,
    fail_writes: bool,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut MemoryInner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut inner)
    }

    fn sorted(&self, filter: impl Fn(&CrdtEvent) -> bool) -> Vec<CrdtEvent> {
        let mut events: Vec<CrdtEvent> = self.with_inner(|inner| {
            inner
                .events
                .iter()
                .filter(|event| filter(event))
                .cloned()
                .collect()
        });
        sort_by_timestamp(&mut events);
        events
    }
}

#[cfg(any(test, feature = "test-support"))]
impl MemoryEventStore {
    /// Make every subsequent insert and delete fail with an I/O error
    pub fn fail_writes(&self, fail: bool) {
        self.with_inner(|inner| inner.fail_writes = fail);
    }
}

fn injected_failure() -> StorageError {
    StorageError::Io(std::io::Error::other("injected write failure"))
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert_events(&self, events: &[CrdtEvent]) -> Result<usize, StorageError> {
        self.with_inner(|inner| {
            if inner.fail_writes {
                return Err(injected_failure());
            }
            let mut inserted = 0;
            for event in events {
                if inner.ids.insert(event.event_id.clone()) {
                    inner.events.push(event.clone());
                    inserted += 1;
                }
            }
            Ok(inserted)
        })
    }

    async fn events_for_object(&self, object_id: &str) -> Result<Vec<CrdtEvent>, StorageError> {
        Ok(self.sorted(|event| event.object_id == object_id))
    }

    async fn all_events(&self) -> Result<Vec<CrdtEvent>, StorageError> {
        Ok(self.sorted(|_| true))
    }

    async fn events_after_timestamp(
        &self,
        timestamp: i64,
    ) -> Result<Vec<CrdtEvent>, StorageError> {
        Ok(self.sorted(|event| event.timestamp > timestamp))
    }

    async fn delete_events_by_ids(&self, event_ids: &[String]) -> Result<usize, StorageError> {
        self.with_inner(|inner| {
            if inner.fail_writes {
                return Err(injected_failure());
            }
            let doomed: HashSet<&String> = event_ids.iter().collect();
            let before = inner.events.len();
            inner.events.retain(|event| !doomed.contains(&event.event_id));
            for id in &doomed {
                inner.ids.remove(id.as_str());
            }
            Ok(before - inner.events.len())
        })
    }

    async fn object_ids_with_events(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.with_inner(|inner| {
            let ids: BTreeSet<&String> = inner.events.iter().map(|e| &e.object_id).collect();
            ids.into_iter().cloned().collect()
        }))
    }

    async fn event_count(&self) -> Result<u64, StorageError> {
        Ok(self.with_inner(|inner| inner.events.len() as u64))
    }

    async fn contains_event(&self, event_id: &str) -> Result<bool, StorageError> {
        Ok(self.with_inner(|inner| inner.ids.contains(event_id)))
    }
}
