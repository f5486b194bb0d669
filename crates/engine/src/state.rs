// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem state manager
//!
//! The JSON snapshot on disk is the source of truth; the query cache is
//! derived from it. This manager scans the snapshot, reports where the
//! cache has drifted, repairs it, and publishes the replica's [`SyncState`].

use crate::EngineError;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::watch;
use yaba_core::{ObjectType, SyncState};
use yaba_storage::{CacheEntry, EntitySnapshot, EntityStore, LocalCache};

/// Type-qualified entity id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    pub object_type: ObjectType,
    pub id: String,
}

impl EntityKey {
    pub fn new(object_type: ObjectType, id: impl Into<String>) -> Self {
        Self {
            object_type,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.object_type, self.id)
    }
}

/// One live entity found on disk
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedEntity {
    pub id: String,
    pub snapshot: EntitySnapshot,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileSystemScanResult {
    pub folders: Vec<ScannedEntity>,
    pub tags: Vec<ScannedEntity>,
    pub bookmarks: Vec<ScannedEntity>,
    pub highlights: Vec<ScannedEntity>,
    /// Tombstoned entities
    pub deleted: Vec<EntityKey>,
    pub corrupted_paths: Vec<PathBuf>,
}

impl FileSystemScanResult {
    pub fn entities(&self, object_type: ObjectType) -> &[ScannedEntity] {
        match object_type {
            ObjectType::Folder => &self.folders,
            ObjectType::Tag => &self.tags,
            ObjectType::Bookmark => &self.bookmarks,
            ObjectType::Highlight => &self.highlights,
        }
    }

    fn entities_mut(&mut self, object_type: ObjectType) -> &mut Vec<ScannedEntity> {
        match object_type {
            ObjectType::Folder => &mut self.folders,
            ObjectType::Tag => &mut self.tags,
            ObjectType::Bookmark => &mut self.bookmarks,
            ObjectType::Highlight => &mut self.highlights,
        }
    }

    pub fn live_count(&self) -> usize {
        ObjectType::ALL
            .iter()
            .map(|object_type| self.entities(*object_type).len())
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftResult {
    pub has_drift: bool,
    pub missing_in_cache: Vec<EntityKey>,
    pub missing_in_filesystem: Vec<EntityKey>,
    pub deleted_but_in_cache: Vec<EntityKey>,
    /// Cached fields differ from the on-disk primary document
    pub data_conflicts: Vec<EntityKey>,
}

fn cache_entry(object_type: ObjectType, entity: &ScannedEntity) -> CacheEntry {
    CacheEntry {
        object_type,
        id: entity.id.clone(),
        fields: entity
            .snapshot
            .documents
            .get(&object_type.primary_document())
            .map(|doc| doc.fields.clone())
            .unwrap_or_default(),
    }
}

pub struct FileSystemStateManager<F, L> {
    entities: F,
    cache: L,
    status: watch::Sender<SyncState>,
}

impl<F: EntityStore, L: LocalCache> FileSystemStateManager<F, L> {
    pub fn new(entities: F, cache: L) -> Self {
        let (status, _) = watch::channel(SyncState::InSync);
        Self {
            entities,
            cache,
            status,
        }
    }

    pub fn sync_state(&self) -> SyncState {
        *self.status.borrow()
    }

    pub fn set_sync_state(&self, state: SyncState) {
        let previous = self.status.send_replace(state);
        if previous != state {
            tracing::info!(from = %previous, to = %state, "sync state changed");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.status.subscribe()
    }

    /// Read every entity on disk
    pub async fn scan_all(&self) -> Result<FileSystemScanResult, EngineError> {
        let mut result = FileSystemScanResult::default();
        for object_type in ObjectType::ALL {
            for id in self.entities.scan_ids(object_type).await? {
                if self.entities.is_deleted(object_type, &id).await? {
                    result.deleted.push(EntityKey::new(object_type, id));
                    continue;
                }
                let snapshot = self.entities.snapshot(object_type, &id).await?;
                result.corrupted_paths.extend(snapshot.corrupted.iter().cloned());
                if !snapshot.is_empty() {
                    result
                        .entities_mut(object_type)
                        .push(ScannedEntity { id, snapshot });
                }
            }
        }
        tracing::debug!(
            live = result.live_count(),
            deleted = result.deleted.len(),
            corrupted = result.corrupted_paths.len(),
            "scanned filesystem"
        );
        Ok(result)
    }

    pub async fn has_corruption(&self) -> Result<bool, EngineError> {
        Ok(!self.scan_all().await?.corrupted_paths.is_empty())
    }

    /// Compare the cache against the snapshot
    ///
    /// Moves the status to CORRUPTED when unreadable documents exist and to
    /// SYNC_NEEDED on drift.
    pub async fn detect_drift(&self) -> Result<DriftResult, EngineError> {
        let scan = self.scan_all().await?;
        let drift = self.drift_against(&scan).await?;

        if !scan.corrupted_paths.is_empty() {
            tracing::warn!(paths = scan.corrupted_paths.len(), "corrupted documents on disk");
            self.set_sync_state(SyncState::Corrupted);
        } else if drift.has_drift {
            self.set_sync_state(SyncState::SyncNeeded);
        }
        Ok(drift)
    }

    async fn drift_against(&self, scan: &FileSystemScanResult) -> Result<DriftResult, EngineError> {
        let mut drift = DriftResult::default();
        let deleted: BTreeSet<&EntityKey> = scan.deleted.iter().collect();

        for object_type in ObjectType::ALL {
            let mut on_disk = BTreeSet::new();
            for entity in scan.entities(object_type) {
                on_disk.insert(entity.id.as_str());
                let key = EntityKey::new(object_type, entity.id.clone());
                match self.cache.get(object_type, &entity.id).await? {
                    None => drift.missing_in_cache.push(key),
                    Some(cached) if cached != cache_entry(object_type, entity) => {
                        drift.data_conflicts.push(key)
                    }
                    Some(_) => {}
                }
            }

            for id in self.cache.ids(object_type).await? {
                if on_disk.contains(id.as_str()) {
                    continue;
                }
                let key = EntityKey::new(object_type, id);
                if deleted.contains(&key) {
                    drift.deleted_but_in_cache.push(key);
                } else {
                    drift.missing_in_filesystem.push(key);
                }
            }
        }

        drift.has_drift = !(drift.missing_in_cache.is_empty()
            && drift.missing_in_filesystem.is_empty()
            && drift.deleted_but_in_cache.is_empty()
            && drift.data_conflicts.is_empty());
        Ok(drift)
    }

    /// Repair the cache from the snapshot; returns what was repaired
    pub async fn fix_drift(&self) -> Result<DriftResult, EngineError> {
        let scan = self.scan_all().await?;
        let drift = self.drift_against(&scan).await?;

        for key in drift.missing_in_cache.iter().chain(&drift.data_conflicts) {
            let entity = scan
                .entities(key.object_type)
                .iter()
                .find(|entity| entity.id == key.id);
            if let Some(entity) = entity {
                self.cache.upsert(cache_entry(key.object_type, entity)).await?;
            }
        }
        for key in drift.missing_in_filesystem.iter().chain(&drift.deleted_but_in_cache) {
            self.cache.remove(key.object_type, &key.id).await?;
        }

        if drift.has_drift {
            tracing::info!(
                missing_in_cache = drift.missing_in_cache.len(),
                missing_in_filesystem = drift.missing_in_filesystem.len(),
                deleted_but_in_cache = drift.deleted_but_in_cache.len(),
                data_conflicts = drift.data_conflicts.len(),
                "repaired cache drift"
            );
        }
        self.settle(&scan);
        Ok(drift)
    }

    /// Clear the cache and rebuild it from disk; returns the entity count
    pub async fn full_refresh(&self) -> Result<usize, EngineError> {
        let scan = self.scan_all().await?;
        self.cache.clear().await?;
        for object_type in ObjectType::ALL {
            for entity in scan.entities(object_type) {
                self.cache.upsert(cache_entry(object_type, entity)).await?;
            }
        }
        let count = scan.live_count();
        tracing::info!(entities = count, "rebuilt cache");
        self.settle(&scan);
        Ok(count)
    }

    /// Status after a repair: CORRUPTED stays while unreadable files remain
    fn settle(&self, scan: &FileSystemScanResult) {
        if !scan.corrupted_paths.is_empty() {
            self.set_sync_state(SyncState::Corrupted);
        } else if matches!(self.sync_state(), SyncState::Corrupted | SyncState::SyncNeeded) {
            self.set_sync_state(SyncState::InSync);
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
