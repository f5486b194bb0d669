// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process transport over tokio channels
//!
//! Replicas sharing a process (embedded multi-profile setups, tests)
//! register on a [`ChannelNetwork`] and receive requests through their
//! [`PeerInbox`].

use super::{PeerTransport, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use yaba_core::ReplicaId;

const INBOX_CAPACITY: usize = 16;

/// A request delivered to a registered replica
pub struct InboundRequest {
    pub body: Vec<u8>,
    reply: oneshot::Sender<Result<Vec<u8>, String>>,
}

impl InboundRequest {
    pub fn respond(self, body: Vec<u8>) {
        // The requester may have given up (timeout); nothing to do then.
        let _ = self.reply.send(Ok(body));
    }

    pub fn reject(self, reason: impl Into<String>) {
        let _ = self.reply.send(Err(reason.into()));
    }
}

/// Receiving side of a registered replica
pub struct PeerInbox {
    receiver: mpsc::Receiver<InboundRequest>,
}

impl PeerInbox {
    /// Next request, `None` once the replica is unregistered
    pub async fn recv(&mut self) -> Option<InboundRequest> {
        self.receiver.recv().await
    }
}

/// Registry of in-process replicas
#[derive(Clone, Default)]
pub struct ChannelNetwork {
    peers: Arc<Mutex<HashMap<ReplicaId, mpsc::Sender<InboundRequest>>>>,
}

impl ChannelNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a replica, replacing any previous registration
    pub fn register(&self, replica: &ReplicaId) -> PeerInbox {
        let (sender, receiver) = mpsc::channel(INBOX_CAPACITY);
        self.peers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(replica.clone(), sender);
        PeerInbox { receiver }
    }

    pub fn unregister(&self, replica: &ReplicaId) {
        self.peers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(replica);
    }

    pub fn transport(&self) -> ChannelTransport {
        ChannelTransport {
            network: self.clone(),
        }
    }

    fn sender(&self, replica: &ReplicaId) -> Option<mpsc::Sender<InboundRequest>> {
        self.peers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(replica)
            .cloned()
    }
}

#[derive(Clone)]
pub struct ChannelTransport {
    network: ChannelNetwork,
}

#[async_trait]
impl PeerTransport for ChannelTransport {
    async fn exchange(
        &self,
        peer: &ReplicaId,
        request: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        let sender = self
            .network
            .sender(peer)
            .ok_or_else(|| TransportError::Unreachable(peer.to_string()))?;

        let (reply, response) = oneshot::channel();
        sender
            .send(InboundRequest {
                body: request,
                reply,
            })
            .await
            .map_err(|_| TransportError::Closed(peer.to_string()))?;

        match response.await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(reason)) => Err(TransportError::Rejected {
                peer: peer.to_string(),
                reason,
            }),
            Err(_) => Err(TransportError::Closed(peer.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
