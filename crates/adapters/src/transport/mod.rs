// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Peer transport adapters
//!
//! The sync engine only needs to hand a request to a peer and get its
//! response back. Discovery and framing live behind this trait.

mod channel;
mod noop;

pub use channel::{ChannelNetwork, ChannelTransport, InboundRequest, PeerInbox};
pub use noop::NoOpTransport;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTransport, TransportCall};

use async_trait::async_trait;
use thiserror::Error;
use yaba_core::ReplicaId;

/// Errors from peer exchanges
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer unreachable: {0}")]
    Unreachable(String),
    #[error("exchange with {peer} timed out")]
    Timeout { peer: String },
    #[error("connection to {0} closed")]
    Closed(String),
    #[error("peer {peer} rejected request: {reason}")]
    Rejected { peer: String, reason: String },
    #[error("transport io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether trying the same exchange again later may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Rejected { .. })
    }
}

/// Request/response exchange with a peer replica
#[async_trait]
pub trait PeerTransport: Clone + Send + Sync + 'static {
    async fn exchange(&self, peer: &ReplicaId, request: Vec<u8>)
        -> Result<Vec<u8>, TransportError>;
}
