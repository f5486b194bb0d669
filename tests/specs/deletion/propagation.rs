//! Deletes reach every replica and are never undone.

use crate::prelude::*;
use crate::prelude::assert_eq;

#[tokio::test]
async fn concurrent_edit_does_not_resurrect() {
    let mesh = Mesh::new(&["R1", "R2"]).await;
    let id = mesh
        .peer("R1")
        .create(ObjectType::Tag, fields(&[("label", "rust")]))
        .await
        .unwrap();
    mesh.sync_all().await;

    mesh.peer("R1").delete(ObjectType::Tag, &id).await.unwrap();
    // R2 has not heard of the delete yet
    mesh.peer("R2")
        .update_field(ObjectType::Tag, &id, FileTarget::Meta, "label", "renamed".into())
        .await
        .unwrap();
    mesh.sync_all().await;

    for name in ["R1", "R2"] {
        let state = mesh.state(name, &id).await.unwrap();
        assert!(state.is_deleted, "{name}");
        assert!(state.documents.is_empty(), "{name}");
    }
    let r2 = mesh.peer("R2");
    assert!(matches!(
        r2.update_field(ObjectType::Tag, &id, FileTarget::Meta, "label", "again".into())
            .await,
        Err(EngineError::EntityDeleted { .. })
    ));
    let scan = r2.state().scan_all().await.unwrap();
    assert!(scan.tags.is_empty());
}

#[tokio::test]
async fn deleted_entity_leaves_remote_cache() {
    let mesh = Mesh::new(&["R1", "R2"]).await;
    let id = mesh
        .peer("R1")
        .create(ObjectType::Folder, fields(&[("label", "Old")]))
        .await
        .unwrap();
    mesh.sync_all().await;
    assert!(!mesh.peer("R2").state().detect_drift().await.unwrap().has_drift);

    mesh.peer("R1").delete(ObjectType::Folder, &id).await.unwrap();
    mesh.pull("R2", "R1").await;

    let drift = mesh.peer("R2").state().detect_drift().await.unwrap();
    assert!(!drift.has_drift);
    assert_eq!(mesh.peer("R2").state().sync_state(), SyncState::InSync);
}
