// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport for replicas that never sync.

use super::{PeerTransport, TransportError};
use async_trait::async_trait;
use yaba_core::ReplicaId;

/// Every peer is unreachable.
///
/// Used by standalone replicas that only keep local history.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpTransport;

impl NoOpTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PeerTransport for NoOpTransport {
    async fn exchange(
        &self,
        peer: &ReplicaId,
        _request: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        Err(TransportError::Unreachable(peer.to_string()))
    }
}
