// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replica facade
//!
//! Wires the stores and services of one replica together and offers the
//! entity-level operations applications call.

use crate::{
    CrdtEngine, DeletionService, EngineError, FileSystemStateManager, LogCompaction,
    Materializer, SyncDeps, SyncEngine, SyncMode, SyncOutcome,
};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use yaba_adapters::{PeerInbox, PeerTransport};
use yaba_core::{
    Clock, FieldValue, FileTarget, IdGen, MergedState, ObjectType, ReplicaConfig, ReplicaId,
    SystemClock, UuidIdGen, VectorClock,
};
use yaba_storage::{
    EntityStore, EventStore, FileEntityStore, FileEventStore, LocalCache, MemoryCache,
    OperationLog, StorageError,
};

const LOCK_FILE: &str = "replica.lock";
const REPLICA_ID_FILE: &str = "replica.id";

/// On-disk replica as applications open it
pub type FileReplica = Replica<FileEventStore, FileEntityStore, MemoryCache, SystemClock, UuidIdGen>;

/// Stores and sources a replica is assembled from
pub struct ReplicaParts<E, F, L, C, I> {
    pub replica_id: ReplicaId,
    pub events: E,
    pub entities: F,
    pub cache: L,
    pub outbox: OperationLog,
    pub clock: C,
    pub id_gen: I,
}

pub struct Replica<E, F, L, C, I> {
    replica_id: ReplicaId,
    id_gen: I,
    engine: CrdtEngine<E, F, C, I>,
    deletion: DeletionService<E, F, L, C, I>,
    materializer: Materializer<E, F, L, C, I>,
    compaction: LogCompaction<E, F>,
    sync: SyncEngine<E, F, L, C, I>,
    state: Arc<FileSystemStateManager<F, L>>,
    /// Serializes read-clock, record, materialize for local edits
    edit_lock: Arc<Mutex<()>>,
    /// Held for the replica's lifetime
    _lock: Option<File>,
}

impl FileReplica {
    /// Open the replica rooted at `config.data_dir`
    ///
    /// Takes an exclusive lock on the data directory, so a second open of
    /// the same directory fails with [`EngineError::Locked`] until this
    /// replica is dropped.
    pub async fn open(config: ReplicaConfig) -> Result<Self, EngineError> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir).map_err(StorageError::from)?;

        let lock_path = config.data_dir.join(LOCK_FILE);
        let lock = File::create(&lock_path).map_err(StorageError::from)?;
        lock.try_lock_exclusive()
            .map_err(|_| EngineError::Locked(config.data_dir.display().to_string()))?;

        let replica_id = match &config.replica_id {
            Some(id) => id.clone(),
            None => load_or_create_replica_id(&config.data_dir)?,
        };

        let parts = ReplicaParts {
            events: FileEventStore::open(&config.events_path(), &replica_id)?,
            entities: FileEntityStore::open(config.entities_dir())?,
            cache: MemoryCache::new(),
            outbox: OperationLog::open(&config.sync_dir(), &replica_id)?,
            clock: SystemClock,
            id_gen: UuidIdGen,
            replica_id,
        };
        let mut replica = Replica::assemble(parts, &config);
        replica._lock = Some(lock);

        replica.engine.recover_unshipped().await?;

        let cached = replica.sync.full_refresh().await?;
        tracing::info!(
            replica_id = %replica.replica_id,
            data_dir = %config.data_dir.display(),
            entities = cached,
            "opened replica"
        );
        Ok(replica)
    }
}

fn load_or_create_replica_id(data_dir: &Path) -> Result<ReplicaId, StorageError> {
    let path = data_dir.join(REPLICA_ID_FILE);
    match std::fs::read_to_string(&path) {
        Ok(content) if !content.trim().is_empty() => return Ok(ReplicaId::new(content.trim())),
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    let id = ReplicaId::new(UuidIdGen.next());
    std::fs::write(&path, id.as_str())?;
    tracing::info!(replica_id = %id, "generated replica id");
    Ok(id)
}

impl<E, F, L, C, I> Replica<E, F, L, C, I>
where
    E: EventStore,
    F: EntityStore,
    L: LocalCache,
    C: Clock,
    I: IdGen,
{
    /// Wire services over already opened stores
    pub fn assemble(parts: ReplicaParts<E, F, L, C, I>, config: &ReplicaConfig) -> Self {
        let engine = CrdtEngine::new(
            parts.replica_id.clone(),
            parts.events.clone(),
            parts.entities.clone(),
            parts.clock,
            parts.id_gen.clone(),
        )
        .with_outbox(parts.outbox.clone());
        let deletion = DeletionService::new(engine.clone(), parts.cache.clone());
        let materializer = Materializer::new(engine.clone(), deletion.clone(), parts.cache.clone());
        let compaction =
            LogCompaction::new(parts.events, parts.entities.clone(), &config.compaction);
        let state = Arc::new(FileSystemStateManager::new(parts.entities, parts.cache));
        let sync = SyncEngine::new(
            SyncDeps {
                engine: engine.clone(),
                outbox: parts.outbox,
                materializer: materializer.clone(),
                compaction: compaction.clone(),
                state: Arc::clone(&state),
            },
            config.sync.clone(),
            config.compaction.compact_on_sync,
        );

        Self {
            replica_id: parts.replica_id,
            id_gen: parts.id_gen,
            engine,
            deletion,
            materializer,
            compaction,
            sync,
            state,
            edit_lock: Arc::new(Mutex::new(())),
            _lock: None,
        }
    }

    pub fn replica_id(&self) -> &ReplicaId {
        &self.replica_id
    }

    pub fn engine(&self) -> &CrdtEngine<E, F, C, I> {
        &self.engine
    }

    pub fn deletion(&self) -> &DeletionService<E, F, L, C, I> {
        &self.deletion
    }

    pub fn materializer(&self) -> &Materializer<E, F, L, C, I> {
        &self.materializer
    }

    pub fn compaction(&self) -> &LogCompaction<E, F> {
        &self.compaction
    }

    pub fn sync(&self) -> &SyncEngine<E, F, L, C, I> {
        &self.sync
    }

    pub fn state(&self) -> &FileSystemStateManager<F, L> {
        &self.state
    }

    /// Create an entity with a fresh id; fields go to its primary document
    pub async fn create(
        &self,
        object_type: ObjectType,
        fields: BTreeMap<String, FieldValue>,
    ) -> Result<String, EngineError> {
        let id = self.id_gen.next();
        self.set_fields(object_type, &id, object_type.primary_document(), fields)
            .await?;
        Ok(id)
    }

    /// Record changes to one document and write the merged result
    pub async fn set_fields(
        &self,
        object_type: ObjectType,
        id: &str,
        file: FileTarget,
        changes: BTreeMap<String, FieldValue>,
    ) -> Result<MergedState, EngineError> {
        let _guard = self.edit_lock.lock().await;

        let current = match self.engine.merge_events_for_object(id).await? {
            Some(state) if state.is_deleted => {
                return Err(EngineError::EntityDeleted {
                    object_type,
                    id: id.to_string(),
                })
            }
            Some(state) => state.merged_clock,
            None => VectorClock::new(),
        };

        self.engine
            .record_field_changes(id, object_type, file, &changes, &current)
            .await?;
        self.materializer
            .materialize(id)
            .await?
            .ok_or_else(|| EngineError::EntityNotFound {
                object_type,
                id: id.to_string(),
            })
    }

    pub async fn update_field(
        &self,
        object_type: ObjectType,
        id: &str,
        file: FileTarget,
        field: &str,
        value: FieldValue,
    ) -> Result<MergedState, EngineError> {
        let changes = BTreeMap::from([(field.to_string(), value)]);
        self.set_fields(object_type, id, file, changes).await
    }

    /// Delete an entity; folders cascade to their contents
    ///
    /// Returns the number of entities deleted.
    pub async fn delete(&self, object_type: ObjectType, id: &str) -> Result<usize, EngineError> {
        let _guard = self.edit_lock.lock().await;
        match object_type {
            ObjectType::Folder => self.deletion.delete_folder_cascade(id).await,
            _ => Ok(usize::from(self.deletion.delete_entity(object_type, id).await?)),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<MergedState>, EngineError> {
        self.engine.merge_events_for_object(id).await
    }

    /// Reconcile local state without talking to peers
    pub async fn sync_local(&self, mode: SyncMode) -> Result<(), EngineError> {
        let _guard = self.edit_lock.lock().await;
        self.sync.sync(mode).await
    }

    pub async fn pull_from<T: PeerTransport>(
        &self,
        peer: &ReplicaId,
        transport: &T,
    ) -> Result<SyncOutcome, EngineError> {
        let _guard = self.edit_lock.lock().await;
        self.sync.pull_from(peer, transport).await
    }

    /// Answer sync requests until the inbox closes
    pub async fn serve(&self, mut inbox: PeerInbox) {
        while let Some(request) = inbox.recv().await {
            match self.sync.handle_request(&request.body).await {
                Ok(body) => request.respond(body),
                Err(e) => {
                    tracing::warn!(error = %e, "rejecting sync request");
                    request.reject(e.to_string());
                }
            }
        }
        tracing::debug!(replica_id = %self.replica_id, "inbox closed");
    }
}

#[cfg(test)]
#[path = "replica_tests.rs"]
mod tests;
