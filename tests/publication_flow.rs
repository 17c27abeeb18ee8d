//! End-to-end publication behavior driven through the mutation services:
//! snapshots, live deltas, monotonic consistency and the derived places view.

use std::sync::Arc;
use std::time::Duration;

use ride_sync_service::config::Config;
use ride_sync_service::models::{Place, User, UserId};
use ride_sync_service::services::ride_service::CreateRideRequest;
use ride_sync_service::services::{ChatService, RideService};
use ride_sync_service::state::AppState;
use ride_sync_service::sync::{Subscription, SyncEvent};

fn seeded_state() -> AppState {
    let state = AppState::new(Arc::new(Config::default()));
    state
        .identity
        .create_user(User::new("u-driver-1", "driver"))
        .unwrap();
    state
        .identity
        .create_user(User::new("u-rider-9", "rider"))
        .unwrap();
    state
}

fn create_ride(state: &AppState, seats: u32) -> String {
    let origin = Place::new("origin", (0.0, 0.0), None);
    let destination = Place::new("destination", (1.0, 1.0), None);
    let (origin_id, destination_id) = (origin.id.clone(), destination.id.clone());
    state.store.places.insert(origin).unwrap();
    state.store.places.insert(destination).unwrap();

    RideService::create_ride(
        &state.store,
        &state.identity,
        UserId::from("u-driver-1"),
        CreateRideRequest {
            origin: origin_id,
            destination: destination_id,
            scheduled_at: chrono::Utc::now(),
            seats_available: seats,
            notes: String::new(),
        },
    )
    .unwrap()
    .id
}

async fn next<T>(sub: &mut Subscription<T>) -> SyncEvent<T> {
    tokio::time::timeout(Duration::from_secs(1), sub.events.recv())
        .await
        .expect("timed out waiting for publication event")
        .expect("publication stream closed")
}

#[tokio::test]
async fn test_rides_stream_tracks_membership() {
    let state = seeded_state();
    let ride_id = create_ride(&state, 2);

    let mut sub = state.publisher.publish_my_rides(Some(UserId::from("u-rider-9")));
    assert!(sub.snapshot.is_empty());

    RideService::join_ride(&state.store, &state.identity, &ride_id, UserId::from("u-rider-9"))
        .unwrap();
    match next(&mut sub).await {
        SyncEvent::Added { record } => assert_eq!(record.id, ride_id),
        other => panic!("expected added, got {:?}", other),
    }

    RideService::leave_ride(&state.store, &ride_id, UserId::from("u-rider-9")).unwrap();
    match next(&mut sub).await {
        SyncEvent::Removed { id } => assert_eq!(id, ride_id),
        other => panic!("expected removed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_chat_stream_delivers_messages_as_changes() {
    let state = seeded_state();
    let ride_id = create_ride(&state, 2);
    RideService::join_ride(&state.store, &state.identity, &ride_id, UserId::from("u-rider-9"))
        .unwrap();

    let mut sub = state.publisher.publish_my_chats(Some(UserId::from("u-rider-9")));
    assert_eq!(sub.snapshot.len(), 1);
    let chat_id = sub.snapshot[0].id.clone();

    ChatService::send_message(
        &state.store,
        &chat_id,
        UserId::from("u-driver-1"),
        "leaving in five".to_string(),
    )
    .unwrap();

    match next(&mut sub).await {
        SyncEvent::Changed { record } => {
            assert_eq!(record.id, chat_id);
            assert_eq!(record.messages.len(), 1);
        }
        other => panic!("expected changed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_places_stream_follows_rides() {
    let state = seeded_state();
    let ride_id = create_ride(&state, 2);

    let mut sub = state.publisher.publish_my_places(Some(UserId::from("u-rider-9")));
    assert!(sub.snapshot.is_empty());

    RideService::join_ride(&state.store, &state.identity, &ride_id, UserId::from("u-rider-9"))
        .unwrap();
    let mut added = 0;
    for _ in 0..2 {
        match next(&mut sub).await {
            SyncEvent::Added { .. } => added += 1,
            other => panic!("expected added, got {:?}", other),
        }
    }
    assert_eq!(added, 2);

    // Driver removes the ride; the derived places retract.
    RideService::remove_ride(&state.store, &state.identity, &ride_id, &UserId::from("u-driver-1"))
        .unwrap();
    let mut removed = 0;
    for _ in 0..2 {
        match next(&mut sub).await {
            SyncEvent::Removed { .. } => removed += 1,
            other => panic!("expected removed, got {:?}", other),
        }
    }
    assert_eq!(removed, 2);
}

#[tokio::test]
async fn test_anonymous_subscription_is_empty_not_an_error() {
    let state = seeded_state();
    create_ride(&state, 2);

    let mut sub = state.publisher.publish_my_rides(None);
    assert!(sub.snapshot.is_empty());
    // The stream is closed; nothing will ever be delivered.
    assert!(sub.events.recv().await.is_none());
}

#[tokio::test]
async fn test_driver_sees_own_ride_immediately() {
    let state = seeded_state();
    let ride_id = create_ride(&state, 2);

    let sub = state.publisher.publish_my_rides(Some(UserId::from("u-driver-1")));
    assert_eq!(sub.snapshot.len(), 1);
    assert_eq!(sub.snapshot[0].id, ride_id);

    // A username string is not an id; it matches nothing.
    let sub = state.publisher.publish_my_rides(Some(UserId::from("driver")));
    assert!(sub.snapshot.is_empty());
}
