use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{UserId, SCHEMA_STABLE_IDS};
use crate::store::Document;

/// Ride record. `driver` and `riders` are identity fields: at
/// `schema_version >= 2` they hold stable user ids, uniformly.
///
/// Invariants: the driver is never also present in `riders`, and `riders`
/// contains no duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: String,
    pub schema_version: u32,
    pub driver: UserId,
    pub riders: Vec<UserId>,
    /// Place id
    pub origin: String,
    /// Place id
    pub destination: String,
    pub scheduled_at: DateTime<Utc>,
    pub seats_available: u32,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl Ride {
    pub fn new(
        driver: UserId,
        origin: impl Into<String>,
        destination: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        seats_available: u32,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            schema_version: SCHEMA_STABLE_IDS,
            driver,
            riders: Vec::new(),
            origin: origin.into(),
            destination: destination.into(),
            scheduled_at,
            seats_available,
            notes: notes.into(),
            created_at: Utc::now(),
        }
    }

    /// Place ids this ride references.
    pub fn place_refs(&self) -> Vec<String> {
        if self.origin == self.destination {
            vec![self.origin.clone()]
        } else {
            vec![self.origin.clone(), self.destination.clone()]
        }
    }
}

impl Document for Ride {
    const COLLECTION: &'static str = "rides";

    fn id(&self) -> &str {
        &self.id
    }

    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_refs_deduplicates_round_trips() {
        let mut ride = Ride::new(UserId::from("u-1"), "p-a", "p-b", Utc::now(), 2, "");
        assert_eq!(ride.place_refs(), vec!["p-a".to_string(), "p-b".to_string()]);

        ride.destination = "p-a".to_string();
        assert_eq!(ride.place_refs(), vec!["p-a".to_string()]);
    }
}
