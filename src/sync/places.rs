//! Places publication, derived transitively from the caller's rides.
//!
//! Keeps a reference count of place ids across the caller's visible rides.
//! A place is delivered while at least one visible ride references it and
//! the place record exists; both the rides feed and the places feed drive
//! the derived view.

use std::collections::{HashMap, HashSet};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::{error::SendError, unbounded_channel, UnboundedSender};

use super::{Subscription, SyncEvent};
use crate::membership::is_ride_member;
use crate::models::{Place, Ride, UserId};
use crate::store::{ChangeEvent, Collection, Store};

type Step = Result<(), SendError<SyncEvent<Place>>>;

struct DerivedPlaces {
    places: Collection<Place>,
    /// ride id -> place ids it contributes (only rides visible to the caller)
    ride_places: HashMap<String, Vec<String>>,
    /// place id -> number of visible rides referencing it
    refs: HashMap<String, usize>,
    /// place ids currently delivered to the subscriber
    emitted: HashSet<String>,
    tx: UnboundedSender<SyncEvent<Place>>,
}

pub(super) fn spawn_places_publication(store: &Store, caller: UserId) -> Subscription<Place> {
    let (tx, rx) = unbounded_channel();

    let mut rides_feed = store.rides.subscribe();
    let mut places_feed = store.places.subscribe();

    let mut view = DerivedPlaces {
        places: store.places.clone(),
        ride_places: HashMap::new(),
        refs: HashMap::new(),
        emitted: HashSet::new(),
        tx,
    };

    for ride in store.rides.snapshot_filtered(|r| is_ride_member(r, &caller)) {
        let refs = ride.place_refs();
        for place_id in &refs {
            *view.refs.entry(place_id.clone()).or_insert(0) += 1;
        }
        view.ride_places.insert(ride.id.clone(), refs);
    }
    let mut snapshot = Vec::new();
    for place_id in view.refs.keys() {
        if let Some(place) = view.places.get(place_id) {
            view.emitted.insert(place_id.clone());
            snapshot.push(place);
        }
    }

    let rides = store.rides.clone();
    tokio::spawn(async move {
        loop {
            let step = tokio::select! {
                event = rides_feed.recv() => match event {
                    Ok(event) => view.apply_ride_change(&event, &caller),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "rides feed lagged, resynchronizing places publication");
                        view.resync(&rides, &caller)
                    }
                    Err(RecvError::Closed) => break,
                },
                event = places_feed.recv() => match event {
                    Ok(event) => view.apply_place_change(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "places feed lagged, resynchronizing places publication");
                        view.resync(&rides, &caller)
                    }
                    Err(RecvError::Closed) => break,
                },
            };
            if step.is_err() {
                break; // subscriber went away
            }
        }
    });

    Subscription {
        snapshot,
        events: rx,
    }
}

impl DerivedPlaces {
    fn apply_ride_change(&mut self, event: &ChangeEvent<Ride>, caller: &UserId) -> Step {
        match event {
            ChangeEvent::Added(ride) | ChangeEvent::Updated(ride) => {
                let contribution = if is_ride_member(ride, caller) {
                    Some(ride.place_refs())
                } else {
                    None
                };
                self.set_contribution(&ride.id, contribution)
            }
            ChangeEvent::Removed(ride_id) => self.set_contribution(ride_id, None),
        }
    }

    /// Replace one ride's contribution to the reference counts. Places whose
    /// count crosses zero enter or leave the visible set; places referenced
    /// both before and after are left alone.
    fn set_contribution(&mut self, ride_id: &str, new_refs: Option<Vec<String>>) -> Step {
        let old_refs = match &new_refs {
            Some(refs) => self.ride_places.insert(ride_id.to_string(), refs.clone()),
            None => self.ride_places.remove(ride_id),
        }
        .unwrap_or_default();
        let new_refs = new_refs.unwrap_or_default();

        let old_set: HashSet<&String> = old_refs.iter().collect();
        let new_set: HashSet<&String> = new_refs.iter().collect();

        for place_id in old_set.difference(&new_set) {
            if let Some(count) = self.refs.get_mut(*place_id) {
                *count -= 1;
                if *count == 0 {
                    self.refs.remove(*place_id);
                    if self.emitted.remove(*place_id) {
                        self.tx.send(SyncEvent::Removed {
                            id: (*place_id).clone(),
                        })?;
                    }
                }
            }
        }

        for place_id in new_set.difference(&old_set) {
            let count = self.refs.entry((*place_id).clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                if let Some(place) = self.places.get(place_id) {
                    if self.emitted.insert((*place_id).clone()) {
                        self.tx.send(SyncEvent::Added { record: place })?;
                    }
                }
            }
        }

        Ok(())
    }

    fn apply_place_change(&mut self, event: &ChangeEvent<Place>) -> Step {
        match event {
            ChangeEvent::Added(place) => {
                // A place created after a visible ride referenced it becomes
                // deliverable now.
                if self.refs.get(&place.id).copied().unwrap_or(0) > 0
                    && self.emitted.insert(place.id.clone())
                {
                    self.tx.send(SyncEvent::Added {
                        record: place.clone(),
                    })?;
                }
            }
            ChangeEvent::Updated(place) => {
                if self.emitted.contains(&place.id) {
                    self.tx.send(SyncEvent::Changed {
                        record: place.clone(),
                    })?;
                }
            }
            ChangeEvent::Removed(place_id) => {
                if self.emitted.remove(place_id) {
                    self.tx.send(SyncEvent::Removed {
                        id: place_id.clone(),
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Full rebuild after feed lag.
    fn resync(&mut self, rides: &Collection<Ride>, caller: &UserId) -> Step {
        self.ride_places.clear();
        self.refs.clear();
        for ride in rides.snapshot_filtered(|r| is_ride_member(r, caller)) {
            let refs = ride.place_refs();
            for place_id in &refs {
                *self.refs.entry(place_id.clone()).or_insert(0) += 1;
            }
            self.ride_places.insert(ride.id.clone(), refs);
        }

        let mut current: HashSet<String> = HashSet::new();
        for place_id in self.refs.keys() {
            if self.places.get(place_id).is_some() {
                current.insert(place_id.clone());
            }
        }

        for gone in self.emitted.difference(&current) {
            self.tx.send(SyncEvent::Removed { id: gone.clone() })?;
        }
        for place_id in &current {
            if let Some(place) = self.places.get(place_id) {
                if self.emitted.contains(place_id) {
                    self.tx.send(SyncEvent::Changed { record: place })?;
                } else {
                    self.tx.send(SyncEvent::Added { record: place })?;
                }
            }
        }
        self.emitted = current;
        Ok(())
    }
}
