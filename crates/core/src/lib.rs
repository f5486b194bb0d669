// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! yaba-core: shared data model for YABA replication
//!
//! This crate provides:
//! - Vector clocks and replica identity
//! - The CRDT event model and merged-state projection
//! - Entity snapshot documents and tombstones
//! - The sync wire model and its JSON codec
//! - Clock / id-generation abstractions and TOML configuration

pub mod clock;
pub mod config;
pub mod entity;
pub mod event;
pub mod ids;
pub mod sync;
pub mod vector_clock;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{CompactionConfig, ConfigError, ReplicaConfig, SyncConfig};
pub use entity::{
    is_system_entity, EntityDocument, Tombstone, PINNED_TAG_ID, PRIVATE_TAG_ID,
    UNCATEGORIZED_FOLDER_ID,
};
pub use event::{
    CrdtEvent, EventKind, FieldValue, FileTarget, MergedState, ObjectType, ResolvedValue,
    DELETED_FIELD,
};
pub use ids::{IdGen, ReplicaId, SequentialIdGen, UuidIdGen};
pub use sync::{
    CodecError, Cursors, Operation, OperationPayload, SyncRequest, SyncResponse, SyncState,
};
pub use vector_clock::VectorClock;
