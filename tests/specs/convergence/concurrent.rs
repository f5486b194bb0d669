//! Concurrent edits converge on every replica.

use crate::prelude::*;
use crate::prelude::assert_eq;

const SHARED: &str = "f-shared";

#[tokio::test]
async fn concurrent_label_resolves_to_greater_replica() {
    let mesh = Mesh::new(&["R1", "R2"]).await;
    mesh.peer("R1")
        .set_fields(ObjectType::Folder, SHARED, FileTarget::Meta, fields(&[("label", "A")]))
        .await
        .unwrap();
    mesh.peer("R2")
        .set_fields(ObjectType::Folder, SHARED, FileTarget::Meta, fields(&[("label", "B")]))
        .await
        .unwrap();

    mesh.sync_all().await;

    let r1 = mesh.state("R1", SHARED).await.unwrap();
    let r2 = mesh.state("R2", SHARED).await.unwrap();
    assert_eq!(label(&r1), Some("B"));
    assert_eq!(r1, r2);
}

#[tokio::test]
async fn causally_later_edit_wins_everywhere() {
    let mesh = Mesh::new(&["R1", "R2"]).await;
    let id = mesh
        .peer("R1")
        .create(ObjectType::Folder, fields(&[("label", "first")]))
        .await
        .unwrap();
    mesh.pull("R2", "R1").await;
    mesh.peer("R2")
        .update_field(ObjectType::Folder, &id, FileTarget::Meta, "label", "second".into())
        .await
        .unwrap();

    mesh.sync_all().await;

    for name in ["R1", "R2"] {
        let state = mesh.state(name, &id).await.unwrap();
        assert_eq!(label(&state), Some("second"), "{name}");
    }
}

#[tokio::test]
async fn three_replicas_converge_on_every_field() {
    let mesh = Mesh::new(&["R1", "R2", "R3"]).await;
    let id = mesh
        .peer("R1")
        .create(ObjectType::Bookmark, fields(&[("label", "page")]))
        .await
        .unwrap();
    mesh.sync_all().await;

    mesh.peer("R1")
        .update_field(ObjectType::Bookmark, &id, FileTarget::Meta, "label", "from r1".into())
        .await
        .unwrap();
    mesh.peer("R2")
        .update_field(ObjectType::Bookmark, &id, FileTarget::Link, "url", "https://r2.example".into())
        .await
        .unwrap();
    mesh.peer("R3")
        .update_field(ObjectType::Bookmark, &id, FileTarget::Meta, "label", "from r3".into())
        .await
        .unwrap();

    // Pull in an uneven order first, then settle
    mesh.pull("R3", "R2").await;
    mesh.pull("R1", "R3").await;
    mesh.sync_all().await;

    let reference = mesh.state("R1", &id).await.unwrap();
    assert_eq!(label(&reference), Some("from r3"));
    assert_eq!(
        reference.value(FileTarget::Link, "url"),
        Some(&FieldValue::from("https://r2.example"))
    );
    for name in ["R2", "R3"] {
        assert_eq!(mesh.state(name, &id).await.unwrap(), reference);
    }
}
