// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{fields, harness, harness_with};
use proptest::prelude::*;
use yaba_core::entity::fields::FOLDER_ID;
use yaba_core::{
    EntityDocument, EventKind, FieldValue, FileTarget, ObjectType, ReplicaId,
    UNCATEGORIZED_FOLDER_ID,
};

fn clock(entries: &[(&str, u64)]) -> VectorClock {
    VectorClock::from_map(entries.iter().map(|(r, n)| (ReplicaId::from(*r), *n)))
}

fn bookmark_event(id: &str, file: FileTarget, field: &str, value: &str, clock: VectorClock) -> CrdtEvent {
    CrdtEvent {
        event_id: id.to_string(),
        object_id: "b-1".to_string(),
        object_type: ObjectType::Bookmark,
        kind: EventKind::Update,
        file,
        field: field.to_string(),
        value: FieldValue::from(value),
        clock,
        timestamp: 0,
    }
}

fn document(fields: &[(&str, &str, VectorClock)], clock: VectorClock) -> EntityDocument {
    let mut doc = EntityDocument::new("b-1");
    doc.clock = clock;
    for (field, value, field_clock) in fields {
        doc.fields.insert(field.to_string(), FieldValue::from(*value));
        doc.field_clocks.insert(field.to_string(), field_clock.clone());
    }
    doc
}

#[tokio::test]
async fn materialized_events_are_removed() {
    let h = harness("r1");
    let id = h
        .replica
        .create(ObjectType::Folder, fields(&[("label", "Work"), ("color", "red")]))
        .await
        .unwrap();
    let before = h.replica.get(&id).await.unwrap();

    let report = h.replica.compaction().compact_object(&id).await.unwrap();

    assert_eq!(report.events_removed, 2);
    assert_eq!(h.events.event_count().await.unwrap(), 0);
    assert_eq!(h.replica.get(&id).await.unwrap(), before);
}

#[tokio::test]
async fn unmaterialized_events_are_kept() {
    let h = harness("r1");
    let id = h
        .replica
        .create(ObjectType::Folder, fields(&[("label", "Work")]))
        .await
        .unwrap();
    let clock = h.replica.get(&id).await.unwrap().unwrap().merged_clock;
    // Recorded but never written back to disk
    h.replica
        .engine()
        .record_field_change(&id, ObjectType::Folder, FileTarget::Meta, "label", "Play".into(), &clock)
        .await
        .unwrap();
    let before = h.replica.get(&id).await.unwrap();

    let report = h.replica.compaction().compact_object(&id).await.unwrap();

    assert_eq!(report.events_removed, 1);
    let left = h.events.events_for_object(&id).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].value, FieldValue::from("Play"));
    assert_eq!(h.replica.get(&id).await.unwrap(), before);
}

#[tokio::test]
async fn losing_concurrent_event_is_removed() {
    let h = harness("r2");
    let id = h
        .replica
        .create(ObjectType::Folder, fields(&[("label", "B")]))
        .await
        .unwrap();
    // Concurrent write from R1 loses to R2's {r2:1}
    let mut loser = h.events.events_for_object(&id).await.unwrap().remove(0);
    loser.event_id = "r1-remote".into();
    loser.clock = VectorClock::of("r1", 1);
    loser.value = "A".into();
    h.replica.engine().apply_event(&loser).await.unwrap();
    h.replica.materializer().materialize(&id).await.unwrap();
    let before = h.replica.get(&id).await.unwrap();

    h.replica.compaction().compact_object(&id).await.unwrap();

    assert_eq!(h.events.event_count().await.unwrap(), 0);
    let after = h.replica.get(&id).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(
        after.unwrap().value(FileTarget::Meta, "label"),
        Some(&FieldValue::from("B"))
    );
}

#[tokio::test]
async fn deleted_objects_keep_only_delete_events() {
    let h = harness("r1");
    let folder = h
        .replica
        .create(ObjectType::Folder, fields(&[("label", "Parent")]))
        .await
        .unwrap();
    let bookmark = h
        .replica
        .create(ObjectType::Bookmark, fields(&[("label", "page"), (FOLDER_ID, folder.as_str())]))
        .await
        .unwrap();
    h.replica.delete(ObjectType::Folder, &folder).await.unwrap();

    let report = h.replica.compaction().compact().await.unwrap();

    assert_eq!(report.objects_scanned, 2);
    assert_eq!(report.delete_events_retained, 2);
    let remaining = h.events.all_events().await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|e| e.kind == EventKind::Delete));
    assert!(h.replica.get(&bookmark).await.unwrap().unwrap().is_deleted);
}

#[tokio::test]
async fn size_trigger_respects_limit() {
    let h = harness_with("r1", |config| config.compaction.max_event_count = 2);
    let compaction = h.replica.compaction();
    h.replica
        .create(ObjectType::Tag, fields(&[("label", "a")]))
        .await
        .unwrap();

    assert!(!compaction.is_compaction_needed().await.unwrap());
    assert_eq!(compaction.compact_if_needed().await.unwrap(), None);

    h.replica
        .create(ObjectType::Tag, fields(&[("label", "b"), ("color", "red")]))
        .await
        .unwrap();
    assert_eq!(
        compaction.stats().await.unwrap(),
        LogStats {
            total_events: 3,
            object_count: 2,
            needs_compaction: true,
        }
    );

    let report = compaction.compact_if_needed().await.unwrap().unwrap();
    assert_eq!(report.events_removed, 3);
    assert!(!compaction.stats().await.unwrap().needs_compaction);
}

#[tokio::test]
async fn object_without_events_is_untouched() {
    let h = harness("r1");
    let report = h.replica.compaction().compact_object("nothing").await.unwrap();
    assert_eq!(report, CompactionReport::default());
}

#[tokio::test]
async fn events_ahead_of_snapshot_clock_are_kept() {
    let h = harness("r1");
    let id = h
        .replica
        .create(ObjectType::Tag, fields(&[("label", "a")]))
        .await
        .unwrap();
    let mut ahead = h.events.events_for_object(&id).await.unwrap().remove(0);
    ahead.event_id = "remote".into();
    ahead.field = "color".into();
    ahead.clock = VectorClock::of(ReplicaId::from("r3"), 1);
    h.replica.engine().apply_event(&ahead).await.unwrap();

    h.replica.compaction().compact_object(&id).await.unwrap();

    let left: Vec<_> = h
        .events
        .events_for_object(&id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event_id)
        .collect();
    assert_eq!(left, vec!["remote"]);
}

#[tokio::test]
async fn bookmark_snapshot_clock_joins_meta_and_link() {
    let h = harness("r1");
    let url_clock = clock(&[("r1", 1), ("r2", 1)]);
    // Neither file alone dominates {r1:1, r2:1}; together they do
    let meta = document(&[("label", "page", clock(&[("r1", 3)]))], clock(&[("r1", 3)]));
    let link = document(&[("url", "https://a.example", url_clock.clone())], clock(&[("r2", 2)]));
    h.entities
        .write_document(ObjectType::Bookmark, FileTarget::Meta, &meta)
        .await
        .unwrap();
    h.entities
        .write_document(ObjectType::Bookmark, FileTarget::Link, &link)
        .await
        .unwrap();

    let engine = h.replica.engine();
    engine
        .apply_events(&[
            bookmark_event("reflected", FileTarget::Link, "url", "https://a.example", url_clock),
            // Dominated by the meta clock, but link.json never got the field
            bookmark_event("unreflected", FileTarget::Link, "domain", "a.example", clock(&[("r1", 2)])),
            bookmark_event("ahead", FileTarget::Link, "url", "https://b.example", clock(&[("r2", 3)])),
        ])
        .await
        .unwrap();
    let before = h.replica.get("b-1").await.unwrap();

    let report = h.replica.compaction().compact_object("b-1").await.unwrap();

    assert_eq!(report.events_removed, 1);
    let left: Vec<String> = h
        .events
        .events_for_object("b-1")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event_id)
        .collect();
    assert_eq!(left, vec!["unreflected".to_string(), "ahead".to_string()]);
    assert_eq!(h.replica.get("b-1").await.unwrap(), before);
}

#[tokio::test]
async fn system_entity_events_survive_a_stray_delete() {
    let h = harness("r1");
    let mut create = bookmark_event("create", FileTarget::Meta, "label", "Uncategorized", clock(&[("r2", 1)]));
    create.object_id = UNCATEGORIZED_FOLDER_ID.to_string();
    create.object_type = ObjectType::Folder;
    let mut delete = create.clone();
    delete.event_id = "delete".to_string();
    delete.kind = EventKind::Delete;
    delete.field = yaba_core::DELETED_FIELD.to_string();
    delete.value = FieldValue::Bool(true);
    delete.clock = clock(&[("r2", 2)]);
    h.replica.engine().apply_events(&[create, delete]).await.unwrap();

    let report = h
        .replica
        .compaction()
        .compact_object(UNCATEGORIZED_FOLDER_ID)
        .await
        .unwrap();

    assert_eq!(report.events_removed, 0);
    assert_eq!(h.events.events_for_object(UNCATEGORIZED_FOLDER_ID).await.unwrap().len(), 2);
}

fn block_on<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn arb_folder_events() -> impl Strategy<Value = Vec<CrdtEvent>> {
    prop::collection::vec(
        (
            prop::collection::btree_map(prop::sample::select(vec!["r1", "r2", "r3"]), 1u64..4, 1..3),
            prop::sample::select(vec!["label", "color"]),
            prop::sample::select(vec!["A", "B", "C"]),
            0u8..8,
        ),
        1..10,
    )
    .prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (counters, field, value, roll))| {
                let clock = VectorClock::from_map(
                    counters.into_iter().map(|(r, n)| (ReplicaId::from(r), n)),
                );
                let mut event = bookmark_event(&format!("e-{i}"), FileTarget::Meta, field, value, clock);
                event.object_id = "f-1".to_string();
                event.object_type = ObjectType::Folder;
                if roll == 0 {
                    event.kind = EventKind::Delete;
                    event.field = yaba_core::DELETED_FIELD.to_string();
                    event.value = FieldValue::Bool(true);
                }
                event
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn compaction_never_changes_the_merged_state(
        events in arb_folder_events(),
        materialized in 0usize..10,
    ) {
        let (before, after) = block_on(async {
            let h = harness("r1");
            let engine = h.replica.engine();
            let split = materialized.min(events.len());
            engine.apply_events(&events[..split]).await.unwrap();
            h.replica.materializer().materialize("f-1").await.unwrap();
            engine.apply_events(&events[split..]).await.unwrap();

            let before = engine.merge_events_for_object("f-1").await.unwrap();
            h.replica.compaction().compact_object("f-1").await.unwrap();
            let after = engine.merge_events_for_object("f-1").await.unwrap();
            (before, after)
        });
        prop_assert_eq!(before, after);
    }
}
