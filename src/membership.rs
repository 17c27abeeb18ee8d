//! Membership Predicate Evaluator.
//!
//! Pure, total predicates over stable user ids. A failed id lookup upstream
//! is a caller-side bug; these never weaken to display-name comparison.

use crate::models::{Chat, Ride, UserId};

pub fn is_driver(ride: &Ride, caller: &UserId) -> bool {
    ride.driver == *caller
}

pub fn is_rider(ride: &Ride, caller: &UserId) -> bool {
    ride.riders.contains(caller)
}

pub fn is_participant(chat: &Chat, caller: &UserId) -> bool {
    chat.participants.contains(caller)
}

/// Visibility predicate backing the "rides I drive or ride" publication.
pub fn is_ride_member(ride: &Ride, caller: &UserId) -> bool {
    is_driver(ride, caller) || is_rider(ride, caller)
}
