//! Folder deletion cascades through descendants.

use crate::prelude::*;
use crate::prelude::assert_eq;

#[tokio::test]
async fn cascade_deletes_tree_and_compaction_keeps_deletes() {
    let mesh = Mesh::new(&["R1", "R2"]).await;
    let r1 = mesh.peer("R1");
    let parent = r1
        .create(ObjectType::Folder, fields(&[("label", "F")]))
        .await
        .unwrap();
    let child = r1
        .create(ObjectType::Folder, fields(&[("label", "C"), (PARENT_ID, parent.as_str())]))
        .await
        .unwrap();
    let bookmark = r1
        .create(ObjectType::Bookmark, fields(&[("label", "B"), (FOLDER_ID, child.as_str())]))
        .await
        .unwrap();
    mesh.sync_all().await;

    assert_eq!(r1.delete(ObjectType::Folder, &parent).await.unwrap(), 3);
    mesh.sync_all().await;

    for name in ["R1", "R2"] {
        let deletion = mesh.peer(name).deletion();
        assert!(deletion.is_entity_deleted(ObjectType::Folder, &parent).await.unwrap());
        assert!(deletion.is_entity_deleted(ObjectType::Folder, &child).await.unwrap());
        assert!(deletion.is_entity_deleted(ObjectType::Bookmark, &bookmark).await.unwrap());

        mesh.peer(name).compaction().compact().await.unwrap();
        let events = mesh.peer(name).engine().pending_events().await.unwrap();
        assert_eq!(events.len(), 3, "{name}");
        assert!(events.iter().all(|e| e.kind == EventKind::Delete), "{name}");
    }
}

#[tokio::test]
async fn highlights_go_with_their_bookmark() {
    let mesh = Mesh::new(&["R1", "R2"]).await;
    let r1 = mesh.peer("R1");
    let bookmark = r1
        .create(ObjectType::Bookmark, fields(&[("label", "B")]))
        .await
        .unwrap();
    let highlight = r1
        .create(ObjectType::Highlight, fields(&[("text", "quote"), (BOOKMARK_ID, bookmark.as_str())]))
        .await
        .unwrap();
    mesh.sync_all().await;

    r1.delete(ObjectType::Bookmark, &bookmark).await.unwrap();
    mesh.sync_all().await;

    let state = mesh.state("R2", &highlight).await.unwrap();
    assert!(state.is_deleted);
    assert!(mesh
        .peer("R2")
        .deletion()
        .is_entity_deleted(ObjectType::Highlight, &highlight)
        .await
        .unwrap());
}
