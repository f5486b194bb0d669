//! Shared helpers for replication specs.

pub use similar_asserts::assert_eq;
pub use std::collections::BTreeMap;
pub use std::sync::Arc;
pub use yaba_adapters::{ChannelNetwork, FakeTransport, TracedTransport, TransportError};
pub use yaba_core::entity::fields::{BOOKMARK_ID, FOLDER_ID, PARENT_ID};
pub use yaba_core::{
    EventKind, FieldValue, FileTarget, MergedState, ObjectType, ReplicaConfig, ReplicaId,
    SyncState,
};
pub use yaba_engine::{EngineError, FileReplica, SyncOutcome};

use tempfile::TempDir;

/// A set of on-disk replicas that can pull from each other
pub struct Mesh {
    network: ChannelNetwork,
    peers: BTreeMap<String, (Arc<FileReplica>, TempDir)>,
}

impl Mesh {
    pub async fn new(names: &[&str]) -> Self {
        Self::with_config(names, |_| {}).await
    }

    pub async fn with_config(names: &[&str], configure: impl Fn(&mut ReplicaConfig)) -> Self {
        let network = ChannelNetwork::new();
        let mut peers = BTreeMap::new();
        for name in names {
            let dir = TempDir::new().unwrap();
            let mut config = ReplicaConfig::for_data_dir(dir.path()).with_replica_id(*name);
            configure(&mut config);
            let replica = Arc::new(FileReplica::open(config).await.unwrap());

            let inbox = network.register(replica.replica_id());
            let serving = Arc::clone(&replica);
            tokio::spawn(async move { serving.serve(inbox).await });

            peers.insert(name.to_string(), (replica, dir));
        }
        Self { network, peers }
    }

    pub fn peer(&self, name: &str) -> &FileReplica {
        &self.peers[name].0
    }

    /// `into` pulls everything `from` originated
    pub async fn pull(&self, into: &str, from: &str) -> SyncOutcome {
        let transport = TracedTransport::new(self.network.transport());
        self.peer(into)
            .pull_from(&ReplicaId::from(from), &transport)
            .await
            .unwrap()
    }

    /// Every replica pulls from every other one
    pub async fn sync_all(&self) {
        let names: Vec<String> = self.peers.keys().cloned().collect();
        for into in &names {
            for from in &names {
                if into != from {
                    self.pull(into, from).await;
                }
            }
        }
    }

    pub async fn state(&self, name: &str, id: &str) -> Option<MergedState> {
        self.peer(name).get(id).await.unwrap()
    }
}

pub fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, FieldValue> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), FieldValue::from(*value)))
        .collect()
}

pub fn label(state: &MergedState) -> Option<&str> {
    state
        .value(FileTarget::Meta, "label")
        .and_then(FieldValue::as_str)
}
