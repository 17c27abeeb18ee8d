//! Ride mutation surface. Every operation takes the caller's stable id
//! explicitly and authorizes through the membership predicates before any
//! write; the write itself is one atomic document update.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::identity::IdentityStore;
use crate::membership::{is_driver, is_rider};
use crate::models::{Ride, UserId};
use crate::services::ChatService;
use crate::store::Store;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRideRequest {
    pub origin: String,
    pub destination: String,
    pub scheduled_at: DateTime<Utc>,
    pub seats_available: u32,
    #[serde(default)]
    pub notes: String,
}

pub struct RideService;

impl RideService {
    pub fn create_ride(
        store: &Store,
        identity: &IdentityStore,
        driver: UserId,
        req: CreateRideRequest,
    ) -> AppResult<Ride> {
        if !identity.user_exists(&driver) {
            return Err(AppError::NotFound("user"));
        }
        for place_id in [&req.origin, &req.destination] {
            if store.places.get(place_id).is_none() {
                return Err(AppError::NotFound("place"));
            }
        }

        let ride = Ride::new(
            driver,
            req.origin,
            req.destination,
            req.scheduled_at,
            req.seats_available,
            req.notes,
        );
        store.rides.insert(ride.clone())?;
        tracing::info!(ride_id = %ride.id, driver = %ride.driver, "ride created");
        Ok(ride)
    }

    /// Join a ride as a rider. Validation and the rider append happen inside
    /// one document update, so a concurrent join for the last seat loses
    /// cleanly instead of oversubscribing.
    pub fn join_ride(store: &Store, identity: &IdentityStore, ride_id: &str, caller: UserId) -> AppResult<Ride> {
        if !identity.user_exists(&caller) {
            return Err(AppError::NotFound("user"));
        }

        let rider = caller.clone();
        let ride = store.rides.update(ride_id, move |ride| {
            if ride.driver == rider {
                return Err(AppError::InvalidState(
                    "driver cannot join their own ride".to_string(),
                ));
            }
            if ride.riders.contains(&rider) {
                return Err(AppError::InvalidState("already a rider".to_string()));
            }
            if ride.seats_available == 0 {
                return Err(AppError::InvalidState("no seats available".to_string()));
            }
            ride.riders.push(rider);
            ride.seats_available -= 1;
            Ok(())
        })?;

        // Joining a ride pulls the rider into its chat, creating the chat if
        // this is the first membership event.
        ChatService::ensure_ride_chat(store, &ride)?;
        tracing::info!(ride_id = %ride.id, rider = %caller, "rider joined");
        Ok(ride)
    }

    pub fn leave_ride(store: &Store, ride_id: &str, caller: UserId) -> AppResult<Ride> {
        let rider = caller.clone();
        let ride = store.rides.update(ride_id, move |ride| {
            let Some(pos) = ride.riders.iter().position(|r| *r == rider) else {
                return Err(AppError::InvalidState("not a rider of this ride".to_string()));
            };
            ride.riders.remove(pos);
            ride.seats_available += 1;
            Ok(())
        })?;
        tracing::info!(ride_id = %ride.id, rider = %caller, "rider left");
        Ok(ride)
    }

    /// Remove a ride entirely; driver or admin only. The linked chat goes
    /// with it.
    pub fn remove_ride(
        store: &Store,
        identity: &IdentityStore,
        ride_id: &str,
        caller: &UserId,
    ) -> AppResult<()> {
        let ride = store.rides.get(ride_id).ok_or(AppError::NotFound("ride"))?;
        if !is_driver(&ride, caller) && !identity.is_admin(caller) {
            return Err(AppError::Unauthorized);
        }

        store.rides.remove(ride_id);
        if let Some(chat) = ChatService::find_ride_chat(store, ride_id) {
            store.chats.remove(&chat.id);
        }
        tracing::info!(ride_id, caller = %caller, "ride removed");
        Ok(())
    }

    /// Driver (or admin) removes a rider.
    pub fn remove_rider(
        store: &Store,
        identity: &IdentityStore,
        ride_id: &str,
        target: &UserId,
        caller: &UserId,
    ) -> AppResult<Ride> {
        let admin = identity.is_admin(caller);
        let caller_id = caller.clone();
        let target_id = target.clone();
        let ride = store.rides.update(ride_id, move |ride| {
            if ride.driver != caller_id && !admin {
                return Err(AppError::Unauthorized);
            }
            let Some(pos) = ride.riders.iter().position(|r| *r == target_id) else {
                return Err(AppError::NotFound("rider"));
            };
            ride.riders.remove(pos);
            ride.seats_available += 1;
            Ok(())
        })?;
        tracing::info!(ride_id = %ride.id, target = %target, caller = %caller, "rider removed");
        Ok(ride)
    }

    /// Snapshot of the rides the caller drives or rides; the live variant is
    /// the rides publication.
    pub fn my_rides(store: &Store, caller: &UserId) -> Vec<Ride> {
        store
            .rides
            .snapshot_filtered(|ride| is_driver(ride, caller) || is_rider(ride, caller))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Place, User};

    fn fixture() -> (Store, IdentityStore, String, String) {
        let store = Store::new();
        let identity = IdentityStore::new();
        identity.create_user(User::new("u-driver-1", "driver")).unwrap();
        identity.create_user(User::new("u-rider-9", "rider")).unwrap();
        identity
            .create_user(User::new("u-admin", "admin").with_role("admin"))
            .unwrap();

        let origin = Place::new("origin", (0.0, 0.0), None);
        let destination = Place::new("destination", (1.0, 1.0), None);
        let (origin_id, destination_id) = (origin.id.clone(), destination.id.clone());
        store.places.insert(origin).unwrap();
        store.places.insert(destination).unwrap();
        (store, identity, origin_id, destination_id)
    }

    fn create(store: &Store, identity: &IdentityStore, origin: &str, dest: &str, seats: u32) -> Ride {
        RideService::create_ride(
            store,
            identity,
            UserId::from("u-driver-1"),
            CreateRideRequest {
                origin: origin.to_string(),
                destination: dest.to_string(),
                scheduled_at: Utc::now(),
                seats_available: seats,
                notes: String::new(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_join_decrements_seats_and_appends_rider() {
        let (store, identity, origin, dest) = fixture();
        let ride = create(&store, &identity, &origin, &dest, 2);

        let joined =
            RideService::join_ride(&store, &identity, &ride.id, UserId::from("u-rider-9")).unwrap();
        assert_eq!(joined.riders, vec![UserId::from("u-rider-9")]);
        assert_eq!(joined.seats_available, 1);

        // Joining also materializes the ride chat with both members.
        let chat = ChatService::find_ride_chat(&store, &ride.id).unwrap();
        assert!(chat.participants.contains(&UserId::from("u-driver-1")));
        assert!(chat.participants.contains(&UserId::from("u-rider-9")));
    }

    #[test]
    fn test_join_leave_round_trip() {
        let (store, identity, origin, dest) = fixture();
        let ride = create(&store, &identity, &origin, &dest, 2);

        RideService::join_ride(&store, &identity, &ride.id, UserId::from("u-rider-9")).unwrap();
        let after = RideService::leave_ride(&store, &ride.id, UserId::from("u-rider-9")).unwrap();
        assert!(after.riders.is_empty());
        assert_eq!(after.seats_available, 2);
    }

    #[test]
    fn test_driver_cannot_join_own_ride() {
        let (store, identity, origin, dest) = fixture();
        let ride = create(&store, &identity, &origin, &dest, 2);

        let err =
            RideService::join_ride(&store, &identity, &ride.id, UserId::from("u-driver-1"))
                .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(store.rides.get(&ride.id).unwrap().riders.is_empty());
    }

    #[test]
    fn test_full_ride_rejects_join_without_mutation() {
        let (store, identity, origin, dest) = fixture();
        let ride = create(&store, &identity, &origin, &dest, 1);
        RideService::join_ride(&store, &identity, &ride.id, UserId::from("u-rider-9")).unwrap();

        identity.create_user(User::new("u-late", "late")).unwrap();
        let err = RideService::join_ride(&store, &identity, &ride.id, UserId::from("u-late"))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let unchanged = store.rides.get(&ride.id).unwrap();
        assert_eq!(unchanged.riders, vec![UserId::from("u-rider-9")]);
        assert_eq!(unchanged.seats_available, 0);
    }

    #[test]
    fn test_double_join_rejected() {
        let (store, identity, origin, dest) = fixture();
        let ride = create(&store, &identity, &origin, &dest, 3);
        RideService::join_ride(&store, &identity, &ride.id, UserId::from("u-rider-9")).unwrap();
        let err = RideService::join_ride(&store, &identity, &ride.id, UserId::from("u-rider-9"))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(store.rides.get(&ride.id).unwrap().riders.len(), 1);
    }

    #[test]
    fn test_remove_ride_requires_driver_or_admin() {
        let (store, identity, origin, dest) = fixture();
        let ride = create(&store, &identity, &origin, &dest, 2);

        let err =
            RideService::remove_ride(&store, &identity, &ride.id, &UserId::from("u-rider-9"))
                .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
        assert!(store.rides.get(&ride.id).is_some());

        RideService::remove_ride(&store, &identity, &ride.id, &UserId::from("u-admin")).unwrap();
        assert!(store.rides.get(&ride.id).is_none());
    }

    #[test]
    fn test_remove_rider_authorization() {
        let (store, identity, origin, dest) = fixture();
        let ride = create(&store, &identity, &origin, &dest, 2);
        RideService::join_ride(&store, &identity, &ride.id, UserId::from("u-rider-9")).unwrap();

        // A rider cannot evict another rider.
        let err = RideService::remove_rider(
            &store,
            &identity,
            &ride.id,
            &UserId::from("u-rider-9"),
            &UserId::from("u-rider-9"),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        let after = RideService::remove_rider(
            &store,
            &identity,
            &ride.id,
            &UserId::from("u-rider-9"),
            &UserId::from("u-driver-1"),
        )
        .unwrap();
        assert!(after.riders.is_empty());
        assert_eq!(after.seats_available, 2);
    }

    #[test]
    fn test_create_ride_validates_references() {
        let (store, identity, origin, _dest) = fixture();
        let err = RideService::create_ride(
            &store,
            &identity,
            UserId::from("u-ghost"),
            CreateRideRequest {
                origin: origin.clone(),
                destination: origin.clone(),
                scheduled_at: Utc::now(),
                seats_available: 1,
                notes: String::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound("user")));

        let err = RideService::create_ride(
            &store,
            &identity,
            UserId::from("u-driver-1"),
            CreateRideRequest {
                origin: "p-nowhere".to_string(),
                destination: origin,
                scheduled_at: Utc::now(),
                seats_available: 1,
                notes: String::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound("place")));
    }

    #[test]
    fn test_my_rides_covers_both_roles() {
        let (store, identity, origin, dest) = fixture();
        let driven = create(&store, &identity, &origin, &dest, 2);
        create(&store, &identity, &origin, &dest, 2);

        identity.create_user(User::new("u-2", "two")).unwrap();
        let mut foreign = Ride::new(UserId::from("u-2"), origin, dest, Utc::now(), 1, "");
        foreign.riders.push(UserId::from("u-driver-1"));
        store.rides.insert(foreign.clone()).unwrap();

        let mine = RideService::my_rides(&store, &UserId::from("u-driver-1"));
        assert_eq!(mine.len(), 3);
        assert!(mine.iter().any(|r| r.id == driven.id));
        assert!(mine.iter().any(|r| r.id == foreign.id));
    }
}
