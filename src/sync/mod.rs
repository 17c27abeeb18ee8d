//! Reactive Filter/Publisher: live, auto-updating record subsets per caller.
//!
//! A publication subscribes to a collection's change feed, takes a snapshot,
//! then re-evaluates its membership predicate on every change event. The
//! derived stream is monotonically consistent: a record that stops matching
//! emits a removal, one that starts matching emits an addition. Anonymous
//! callers get an empty subscription, never an error.

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

pub mod events;
mod places;
mod publications;

pub use events::SyncEvent;

use crate::membership::{is_participant, is_ride_member};
use crate::models::{Chat, Place, Ride, UserId};
use crate::store::Store;

/// A live publication handed to one subscriber: the matching records at
/// subscription time plus the delta stream from that point on.
pub struct Subscription<T> {
    pub snapshot: Vec<T>,
    pub events: UnboundedReceiver<SyncEvent<T>>,
}

impl<T> Subscription<T> {
    /// Empty and immediately closed; what unauthenticated callers receive.
    pub fn empty() -> Self {
        let (_tx, rx) = unbounded_channel();
        Self {
            snapshot: Vec::new(),
            events: rx,
        }
    }
}

#[derive(Clone)]
pub struct Publisher {
    store: Store,
}

impl Publisher {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Rides the caller drives or rides.
    pub fn publish_my_rides(&self, caller: Option<UserId>) -> Subscription<Ride> {
        let Some(caller) = caller else {
            return Subscription::empty();
        };
        publications::spawn_filter_publication(self.store.rides.clone(), move |ride: &Ride| {
            is_ride_member(ride, &caller)
        })
    }

    /// Chats the caller participates in.
    pub fn publish_my_chats(&self, caller: Option<UserId>) -> Subscription<Chat> {
        let Some(caller) = caller else {
            return Subscription::empty();
        };
        publications::spawn_filter_publication(self.store.chats.clone(), move |chat: &Chat| {
            is_participant(chat, &caller)
        })
    }

    /// Places referenced by the caller's rides, derived transitively from the
    /// rides publication.
    pub fn publish_my_places(&self, caller: Option<UserId>) -> Subscription<Place> {
        let Some(caller) = caller else {
            return Subscription::empty();
        };
        places::spawn_places_publication(&self.store, caller)
    }
}
