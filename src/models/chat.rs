use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::{UserId, SCHEMA_STABLE_IDS};
use crate::store::Document;

pub const MAX_MESSAGE_BODY_LENGTH: usize = 2_000;

/// One chat per ride. `participants` is an identity field and must stay a
/// superset of the linked ride's driver and riders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub schema_version: u32,
    pub ride_id: String,
    pub participants: BTreeSet<UserId>,
    pub messages: Vec<Message>,
}

/// Immutable once created, except for moderation deletion (tombstone).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: UserId,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
}

impl Chat {
    pub fn for_ride(ride_id: impl Into<String>, participants: BTreeSet<UserId>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            schema_version: SCHEMA_STABLE_IDS,
            ride_id: ride_id.into(),
            participants,
            messages: Vec::new(),
        }
    }
}

impl Message {
    pub fn new(sender: UserId, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            body: body.into(),
            sent_at: Utc::now(),
            deleted: false,
        }
    }

    /// Moderation deletion keeps the record but blanks the content.
    pub fn tombstone(&mut self) {
        self.deleted = true;
        self.body.clear();
    }
}

impl Document for Chat {
    const COLLECTION: &'static str = "chats";

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
    fn test_tombstone_clears_body() {
        let mut msg = Message::new(UserId::from("u-1"), "hello");
        msg.tombstone();
        assert!(msg.deleted);
        assert!(msg.body.is_empty());
        // Sender attribution survives moderation for audit purposes.
        assert_eq!(msg.sender, UserId::from("u-1"));
    }
}
