// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable storage for YABA replicas
//!
//! - Checksummed append-only logs
//! - The CRDT event store
//! - JSON entity snapshots and tombstones
//! - The local query cache
//! - The sync outbox and cursors

mod cache;
mod entity_store;
mod error;
mod event_store;
pub mod log;
mod outbox;

pub use cache::{CacheEntry, LocalCache, MemoryCache};
pub use entity_store::{EntitySnapshot, EntityStore, FileEntityStore};
pub use error::StorageError;
pub use event_store::{EventStore, FileEventStore, MemoryEventStore};
pub use outbox::OperationLog;
