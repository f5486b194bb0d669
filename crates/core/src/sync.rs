// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync wire model
//!
//! Replicas exchange a [`SyncRequest`] carrying per-origin cursors and get
//! back a [`SyncResponse`] with the responder's own operations past the
//! requester's cursor. Messages are plain JSON; framing belongs to the
//! transport.

use crate::event::CrdtEvent;
use crate::ids::ReplicaId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Highest `origin_seq` applied per origin replica. Absent means none.
pub type Cursors = BTreeMap<ReplicaId, u64>;

/// What an operation carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationPayload {
    FieldEvent { event: CrdtEvent },
}

/// One entry in a replica's linear outgoing log, uniquely addressed by
/// `(origin_device_id, origin_seq)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub op_id: String,
    pub origin_device_id: ReplicaId,
    pub origin_seq: u64,
    pub happened_at: i64,
    pub payload: OperationPayload,
}

impl Operation {
    pub fn event(&self) -> &CrdtEvent {
        match &self.payload {
            OperationPayload::FieldEvent { event } => event,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub replica_id: ReplicaId,
    #[serde(default)]
    pub cursors: Cursors,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub replica_id: ReplicaId,
    pub operations: Vec<Operation>,
    /// More operations remain past this batch
    #[serde(default)]
    pub has_more: bool,
}

/// Coarse sync status shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    InSync,
    SyncNeeded,
    Syncing,
    Corrupted,
    SyncFailed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncState::InSync => "in sync",
            SyncState::SyncNeeded => "sync needed",
            SyncState::Syncing => "syncing",
            SyncState::Corrupted => "corrupted",
            SyncState::SyncFailed => "sync failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed sync message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a sync message as JSON bytes.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(message)?)
}

/// Decode a sync message from JSON bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
