// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine unit tests

use crate::{Replica, ReplicaParts};
use std::collections::BTreeMap;
use tempfile::TempDir;
use yaba_core::{
    FakeClock, FieldValue, ReplicaConfig, ReplicaId, SequentialIdGen,
};
use yaba_storage::{FileEntityStore, MemoryCache, MemoryEventStore, OperationLog};

pub(crate) type TestReplica =
    Replica<MemoryEventStore, FileEntityStore, MemoryCache, FakeClock, SequentialIdGen>;

pub(crate) struct Harness {
    pub dir: TempDir,
    pub replica: TestReplica,
    pub events: MemoryEventStore,
    pub entities: FileEntityStore,
    pub cache: MemoryCache,
    pub outbox: OperationLog,
}

pub(crate) fn harness(replica_id: &str) -> Harness {
    harness_with(replica_id, |_| {})
}

pub(crate) fn harness_with(replica_id: &str, configure: impl FnOnce(&mut ReplicaConfig)) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = ReplicaConfig::for_data_dir(dir.path()).with_replica_id(replica_id);
    configure(&mut config);

    let id = ReplicaId::from(replica_id);
    let events = MemoryEventStore::new();
    let entities = FileEntityStore::open(config.entities_dir()).unwrap();
    let cache = MemoryCache::new();
    let outbox = OperationLog::open(&config.sync_dir(), &id).unwrap();
    let replica = Replica::assemble(
        ReplicaParts {
            replica_id: id,
            events: events.clone(),
            entities: entities.clone(),
            cache: cache.clone(),
            outbox: outbox.clone(),
            clock: FakeClock::new(),
            id_gen: SequentialIdGen::new(replica_id),
        },
        &config,
    );
    Harness {
        dir,
        replica,
        events,
        entities,
        cache,
        outbox,
    }
}

pub(crate) fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, FieldValue> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), FieldValue::from(*value)))
        .collect()
}
