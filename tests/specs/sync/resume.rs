//! Interrupted syncs resume where they stopped.

use crate::prelude::*;
use crate::prelude::assert_eq;

#[tokio::test]
async fn failed_pull_is_retried_from_cursor() {
    let mesh = Mesh::with_config(&["R1", "R2"], |config| {
        config.sync.max_operations_per_response = 2
    })
    .await;
    for label in ["a", "b", "c", "d", "e"] {
        mesh.peer("R1")
            .create(ObjectType::Tag, fields(&[("label", label)]))
            .await
            .unwrap();
    }

    let broken = FakeTransport::new();
    broken.push_failure(TransportError::Unreachable("R1".into()));
    let err = mesh
        .peer("R2")
        .pull_from(&ReplicaId::from("R1"), &broken)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(mesh.peer("R2").state().sync_state(), SyncState::SyncFailed);

    let outcome = mesh.pull("R2", "R1").await;
    assert_eq!(outcome.applied, 5);
    assert_eq!(mesh.peer("R2").state().sync_state(), SyncState::InSync);

    let again = mesh.pull("R2", "R1").await;
    assert_eq!(again.applied, 0);
    assert_eq!(
        mesh.peer("R2").state().scan_all().await.unwrap().tags.len(),
        5
    );
}

#[tokio::test]
async fn pulling_from_unknown_peer_fails() {
    let mesh = Mesh::new(&["R1"]).await;
    let err = mesh
        .peer("R1")
        .pull_from(&ReplicaId::from("ghost"), &ChannelNetwork::new().transport())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Transport(TransportError::Unreachable(_))));
}
