use serde::{Deserialize, Serialize};
use std::fmt;

pub mod chat;
pub mod error_report;
pub mod place;
pub mod ride;
pub mod user;

pub use chat::{Chat, Message, MAX_MESSAGE_BODY_LENGTH};
pub use error_report::{ErrorReport, ReportCategory, ReportSeverity};
pub use place::Place;
pub use ride::Ride;
pub use user::{User, ROLE_ADMIN};

/// Schema version for records whose identity fields may still hold legacy
/// display-name values.
pub const SCHEMA_LEGACY: u32 = 1;
/// Schema version for records whose identity fields hold stable user ids.
pub const SCHEMA_STABLE_IDS: u32 = 2;

/// Stable user identifier: assigned at user creation, never reused, never
/// user-editable. Membership checks compare these with exact equality and
/// never fall back to display names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_equality_is_exact() {
        assert_eq!(UserId::from("u-42"), UserId::new("u-42"));
        assert_ne!(UserId::from("u-42"), UserId::from("U-42"));
        // A display-name shaped value is just a different id, never a match.
        assert_ne!(UserId::from("u-42"), UserId::from("alice@example.com"));
    }

    #[test]
    fn test_user_id_serde_transparent() {
        let id = UserId::from("u-7");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"u-7\"");
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
