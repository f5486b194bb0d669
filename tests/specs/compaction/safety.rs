//! Compaction never changes what replicas resolve.

use crate::prelude::*;
use crate::prelude::assert_eq;

#[tokio::test]
async fn compaction_preserves_merged_state() {
    let mesh = Mesh::new(&["R1", "R2"]).await;
    let id = mesh
        .peer("R1")
        .create(ObjectType::Bookmark, fields(&[("label", "page"), ("note", "n")]))
        .await
        .unwrap();
    mesh.sync_all().await;
    mesh.peer("R1")
        .update_field(ObjectType::Bookmark, &id, FileTarget::Meta, "label", "one".into())
        .await
        .unwrap();
    mesh.peer("R2")
        .update_field(ObjectType::Bookmark, &id, FileTarget::Meta, "label", "two".into())
        .await
        .unwrap();
    mesh.sync_all().await;

    for name in ["R1", "R2"] {
        let replica = mesh.peer(name);
        let before = mesh.state(name, &id).await;
        let report = replica.compaction().compact().await.unwrap();
        assert!(report.events_removed > 0, "{name}");
        assert_eq!(mesh.state(name, &id).await, before, "{name}");
    }
    assert_eq!(mesh.state("R1", &id).await, mesh.state("R2", &id).await);
}

#[tokio::test]
async fn sync_after_compaction_still_ships_history() {
    let mesh = Mesh::new(&["R1", "R2"]).await;
    let id = mesh
        .peer("R1")
        .create(ObjectType::Folder, fields(&[("label", "Work")]))
        .await
        .unwrap();
    mesh.peer("R1").compaction().compact().await.unwrap();
    assert_eq!(mesh.peer("R1").engine().event_count().await.unwrap(), 0);

    mesh.pull("R2", "R1").await;

    let state = mesh.state("R2", &id).await.unwrap();
    assert_eq!(label(&state), Some("Work"));
}
