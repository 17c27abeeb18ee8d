//! Dataset-level backfill scenarios: legacy username references become
//! stable ids, publications pick the converted records up, re-runs are
//! no-ops and unresolvable values stay flagged but untouched.

use std::collections::BTreeSet;

use ride_sync_service::identity::IdentityStore;
use ride_sync_service::migration::{BackfillConfig, BackfillReport, IdentityBackfill};
use ride_sync_service::models::{
    Chat, Message, Ride, User, UserId, SCHEMA_LEGACY, SCHEMA_STABLE_IDS,
};
use ride_sync_service::store::Store;
use ride_sync_service::sync::Publisher;

fn legacy_ride(id: &str, driver: &str) -> Ride {
    let mut ride = Ride::new(UserId::from(driver), "p-a", "p-b", chrono::Utc::now(), 2, "");
    ride.id = id.to_string();
    ride.schema_version = SCHEMA_LEGACY;
    ride
}

fn execute() -> BackfillConfig {
    BackfillConfig {
        batch_size: 100,
        dry_run: false,
        fail_fast: false,
    }
}

#[tokio::test]
async fn test_legacy_driver_becomes_visible_to_stable_id() {
    let store = Store::new();
    let identity = IdentityStore::new();
    identity
        .create_user(User::new("u-42", "alice@example.com"))
        .unwrap();

    store
        .rides
        .insert_legacy(legacy_ride("r-legacy", "alice@example.com"))
        .unwrap();

    // Before migration the stable id matches nothing.
    let publisher = Publisher::new(store.clone());
    assert!(publisher
        .publish_my_rides(Some(UserId::from("u-42")))
        .snapshot
        .is_empty());

    let report = IdentityBackfill::new(store.clone(), identity, execute()).run();
    assert_eq!(report.converted, 1);
    assert!(report.unresolved.is_empty());

    let migrated = store.rides.get("r-legacy").unwrap();
    assert_eq!(migrated.driver, UserId::from("u-42"));
    assert_eq!(migrated.schema_version, SCHEMA_STABLE_IDS);

    // The stable id now matches; the raw username string never does again.
    let sub = publisher.publish_my_rides(Some(UserId::from("u-42")));
    assert_eq!(sub.snapshot.len(), 1);
    assert!(publisher
        .publish_my_rides(Some(UserId::from("alice@example.com")))
        .snapshot
        .is_empty());
}

#[test]
fn test_rerun_converts_nothing_and_preserves_state() {
    let store = Store::new();
    let identity = IdentityStore::new();
    identity
        .create_user(User::new("u-42", "alice@example.com"))
        .unwrap();
    identity.create_user(User::new("u-7", "bob")).unwrap();

    store
        .rides
        .insert_legacy(legacy_ride("r-1", "alice@example.com"))
        .unwrap();
    let mut chat = Chat::for_ride(
        "r-1",
        [UserId::from("alice@example.com"), UserId::from("u-7")]
            .into_iter()
            .collect::<BTreeSet<_>>(),
    );
    chat.messages.push(Message::new(UserId::from("bob"), "hi"));
    chat.schema_version = SCHEMA_LEGACY;
    let chat_id = chat.id.clone();
    store.chats.insert_legacy(chat).unwrap();

    let backfill = IdentityBackfill::new(store.clone(), identity, execute());
    let first = backfill.run();
    assert_eq!(first.converted, 2);

    let rides_before = serde_json::to_value(store.rides.get("r-1").unwrap()).unwrap();
    let chats_before = serde_json::to_value(store.chats.get(&chat_id).unwrap()).unwrap();

    let second = backfill.run();
    assert_eq!(second.converted, 0);
    assert_eq!(second.already_stable, 2);

    assert_eq!(
        rides_before,
        serde_json::to_value(store.rides.get("r-1").unwrap()).unwrap()
    );
    assert_eq!(
        chats_before,
        serde_json::to_value(store.chats.get(&chat_id).unwrap()).unwrap()
    );

    let migrated = store.chats.get(&chat_id).unwrap();
    assert!(migrated.participants.contains(&UserId::from("u-42")));
    assert_eq!(migrated.messages[0].sender, UserId::from("u-7"));
}

#[test]
fn test_unresolvable_sender_is_flagged_not_guessed() {
    let store = Store::new();
    let identity = IdentityStore::new();
    identity.create_user(User::new("u-7", "bob")).unwrap();

    let mut chat = Chat::for_ride(
        "r-1",
        [UserId::from("u-7")].into_iter().collect::<BTreeSet<_>>(),
    );
    chat.messages
        .push(Message::new(UserId::from("deleted-account"), "old message"));
    chat.schema_version = SCHEMA_LEGACY;
    let chat_id = chat.id.clone();
    store.chats.insert_legacy(chat).unwrap();

    let report = IdentityBackfill::new(store.clone(), identity, execute()).run();
    assert_eq!(report.converted, 0);
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].field, "messages.sender");
    assert_eq!(report.unresolved[0].value, "deleted-account");

    // Flagged records stay fully legacy until reviewed.
    let untouched = store.chats.get(&chat_id).unwrap();
    assert_eq!(untouched.schema_version, SCHEMA_LEGACY);
    assert_eq!(untouched.messages[0].sender, UserId::from("deleted-account"));
}

#[test]
fn test_interrupted_run_resumes_without_double_converting() {
    let store = Store::new();
    let identity = IdentityStore::new();
    identity
        .create_user(User::new("u-42", "alice@example.com"))
        .unwrap();

    for i in 0..5 {
        store
            .rides
            .insert_legacy(legacy_ride(&format!("r-{i}"), "alice@example.com"))
            .unwrap();
    }

    let backfill = IdentityBackfill::new(
        store.clone(),
        identity,
        BackfillConfig {
            batch_size: 2,
            dry_run: false,
            fail_fast: false,
        },
    );

    // First run stops after one batch, as if interrupted.
    let mut report = BackfillReport::new();
    backfill.run_batch(&mut report);
    assert_eq!(report.converted, 2);

    let mut resumed = BackfillReport::resume(report.checkpoint);
    while backfill.run_batch(&mut resumed) {}
    assert_eq!(resumed.converted, 3);
    assert_eq!(resumed.already_stable, 0);
    assert!(store
        .rides
        .snapshot_filtered(|r| r.schema_version < SCHEMA_STABLE_IDS)
        .is_empty());
}
