// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::test_support::{fields, harness, Harness};
use yaba_core::entity::fields::{BOOKMARK_ID, FOLDER_ID, PARENT_ID};
use yaba_core::{
    EventKind, FileTarget, ObjectType, ReplicaId, Tombstone, VectorClock, PINNED_TAG_ID,
    PRIVATE_TAG_ID, UNCATEGORIZED_FOLDER_ID,
};
use yaba_storage::{EntityStore, EventStore, LocalCache};

async fn folder(h: &Harness, label: &str, parent: Option<&str>) -> String {
    let mut f = fields(&[("label", label)]);
    if let Some(parent) = parent {
        f.insert(PARENT_ID.into(), parent.into());
    }
    h.replica.create(ObjectType::Folder, f).await.unwrap()
}

async fn bookmark(h: &Harness, folder: &str) -> String {
    h.replica
        .create(ObjectType::Bookmark, fields(&[("label", "page"), (FOLDER_ID, folder)]))
        .await
        .unwrap()
}

async fn highlight(h: &Harness, bookmark: &str) -> String {
    h.replica
        .create(ObjectType::Highlight, fields(&[("text", "quote"), (BOOKMARK_ID, bookmark)]))
        .await
        .unwrap()
}

async fn event_kinds(h: &Harness, id: &str) -> Vec<EventKind> {
    h.events
        .events_for_object(id)
        .await
        .unwrap()
        .iter()
        .map(|e| e.kind)
        .collect()
}

#[tokio::test]
async fn delete_writes_tombstone_and_removes_data() {
    let h = harness("r1");
    let tag = h
        .replica
        .create(ObjectType::Tag, fields(&[("label", "rust")]))
        .await
        .unwrap();
    let before = h.entities.snapshot_clock(ObjectType::Tag, &tag).await.unwrap();

    assert!(h.replica.deletion().delete_entity(ObjectType::Tag, &tag).await.unwrap());

    let tombstone = h
        .entities
        .read_tombstone(ObjectType::Tag, &tag)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tombstone.clock, before.increment(&ReplicaId::from("r1")));
    assert!(h
        .entities
        .read_document(ObjectType::Tag, &tag, FileTarget::Meta)
        .await
        .unwrap()
        .is_none());
    assert!(h.cache.get(ObjectType::Tag, &tag).await.unwrap().is_none());
    assert_eq!(event_kinds(&h, &tag).await, vec![EventKind::Create, EventKind::Delete]);
    assert!(h.replica.deletion().is_entity_deleted(ObjectType::Tag, &tag).await.unwrap());
}

#[tokio::test]
async fn deleting_twice_is_a_no_op() {
    let h = harness("r1");
    let tag = h
        .replica
        .create(ObjectType::Tag, fields(&[("label", "rust")]))
        .await
        .unwrap();

    assert!(h.replica.deletion().delete_entity(ObjectType::Tag, &tag).await.unwrap());
    assert!(!h.replica.deletion().delete_entity(ObjectType::Tag, &tag).await.unwrap());
    assert_eq!(event_kinds(&h, &tag).await.len(), 2);
}

#[tokio::test]
async fn system_entities_cannot_be_deleted() {
    let h = harness("r1");
    let deletion = h.replica.deletion();

    assert!(!deletion
        .delete_entity(ObjectType::Folder, UNCATEGORIZED_FOLDER_ID)
        .await
        .unwrap());
    assert!(!deletion.delete_entity(ObjectType::Tag, PINNED_TAG_ID).await.unwrap());
    assert!(!deletion.delete_entity(ObjectType::Tag, PRIVATE_TAG_ID).await.unwrap());
    assert_eq!(deletion.delete_folder_cascade(UNCATEGORIZED_FOLDER_ID).await.unwrap(), 0);
    assert_eq!(h.events.event_count().await.unwrap(), 0);
}

#[tokio::test]
async fn bookmark_delete_takes_highlights_and_content() {
    let h = harness("r1");
    let f = folder(&h, "Reading", None).await;
    let b = bookmark(&h, &f).await;
    let hl = highlight(&h, &b).await;
    let content = h
        .entities
        .entity_dir(ObjectType::Bookmark, &b)
        .unwrap()
        .join("content");
    std::fs::create_dir_all(&content).unwrap();
    std::fs::write(content.join("page.html"), "<p>hi</p>").unwrap();

    assert!(h.replica.deletion().delete_entity(ObjectType::Bookmark, &b).await.unwrap());

    assert!(!content.exists());
    assert!(h.entities.is_deleted(ObjectType::Highlight, &hl).await.unwrap());
    assert!(h.cache.highlights_for_bookmark(&b).await.unwrap().is_empty());
    assert!(!h.entities.is_deleted(ObjectType::Folder, &f).await.unwrap());
}

#[tokio::test]
async fn folder_cascade_deletes_bookmarks_then_children_then_parent() {
    let h = harness("r1");
    let parent = folder(&h, "Parent", None).await;
    let child = folder(&h, "Child", Some(&parent)).await;
    let other = folder(&h, "Elsewhere", None).await;
    let b = bookmark(&h, &child).await;
    let kept = bookmark(&h, &other).await;

    let deleted = h.replica.deletion().delete_folder_cascade(&parent).await.unwrap();
    assert_eq!(deleted, 3);

    let order: Vec<String> = h
        .events
        .all_events()
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.is_delete())
        .map(|e| e.object_id)
        .collect();
    assert_eq!(order, vec![b.clone(), child.clone(), parent.clone()]);

    for (object_type, id) in [
        (ObjectType::Folder, &parent),
        (ObjectType::Folder, &child),
        (ObjectType::Bookmark, &b),
    ] {
        assert!(h.entities.is_deleted(object_type, id).await.unwrap(), "{id}");
    }
    assert!(!h.entities.is_deleted(ObjectType::Bookmark, &kept).await.unwrap());
    assert!(!h.entities.is_deleted(ObjectType::Folder, &other).await.unwrap());
}

#[tokio::test]
async fn cascade_survives_parent_cycles() {
    let h = harness("r1");
    let a = folder(&h, "A", None).await;
    let b = folder(&h, "B", Some(&a)).await;
    h.replica
        .update_field(ObjectType::Folder, &a, FileTarget::Meta, PARENT_ID, b.as_str().into())
        .await
        .unwrap();

    assert_eq!(h.replica.deletion().delete_folder_cascade(&a).await.unwrap(), 2);
}

#[tokio::test]
async fn remote_delete_widens_tombstone_without_new_event() {
    let h = harness("r1");
    let tag = h
        .replica
        .create(ObjectType::Tag, fields(&[("label", "rust")]))
        .await
        .unwrap();
    let count = h.events.event_count().await.unwrap();
    let remote = VectorClock::of("r2", 3);

    let deletion = h.replica.deletion();
    assert!(deletion
        .apply_remote_delete(ObjectType::Tag, &tag, &remote)
        .await
        .unwrap());
    assert!(!deletion
        .apply_remote_delete(ObjectType::Tag, &tag, &remote)
        .await
        .unwrap());

    assert_eq!(h.events.event_count().await.unwrap(), count);
    assert_eq!(
        h.entities.read_tombstone(ObjectType::Tag, &tag).await.unwrap(),
        Some(Tombstone::new(tag.clone(), remote))
    );
    assert!(h.cache.get(ObjectType::Tag, &tag).await.unwrap().is_none());
}

#[tokio::test]
async fn interrupted_delete_is_finished_on_retry() {
    let h = harness("r1");
    let tag = h
        .replica
        .create(ObjectType::Tag, fields(&[("label", "rust")]))
        .await
        .unwrap();
    let deletion = h.replica.deletion();

    h.events.fail_writes(true);
    assert!(deletion.delete_entity(ObjectType::Tag, &tag).await.is_err());
    h.events.fail_writes(false);
    assert!(h.entities.is_deleted(ObjectType::Tag, &tag).await.unwrap());
    assert_eq!(event_kinds(&h, &tag).await, vec![EventKind::Create]);

    assert!(deletion.delete_entity(ObjectType::Tag, &tag).await.unwrap());

    assert_eq!(event_kinds(&h, &tag).await, vec![EventKind::Create, EventKind::Delete]);
    assert_eq!(h.outbox.last_sequence().await, 2);
    let tombstone = h
        .entities
        .read_tombstone(ObjectType::Tag, &tag)
        .await
        .unwrap()
        .unwrap();
    let delete = h.events.events_for_object(&tag).await.unwrap().remove(1);
    assert!(delete.clock.is_newer_or_equal(&tombstone.clock));
    assert!(!deletion.delete_entity(ObjectType::Tag, &tag).await.unwrap());
}
