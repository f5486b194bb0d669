// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! YABA replication engine

mod compaction;
mod crdt;
mod deletion;
mod error;
mod materialize;
mod replica;
mod state;
mod sync;

#[cfg(test)]
mod test_support;

pub use compaction::{CompactionReport, LogCompaction, LogStats};
pub use crdt::{pick_winner, resolve_field_from_events, CrdtEngine};
pub use deletion::DeletionService;
pub use error::EngineError;
pub use materialize::{MaterializeSummary, Materializer};
pub use replica::{FileReplica, Replica, ReplicaParts};
pub use state::{DriftResult, EntityKey, FileSystemScanResult, FileSystemStateManager, ScannedEntity};
pub use sync::{SyncDeps, SyncEngine, SyncMode, SyncOutcome};
