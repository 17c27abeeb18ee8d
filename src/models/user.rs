use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::UserId;

/// Core identity entity. `id` is immutable; `username` is a mutable display
/// string and may coincide with an email address, so it is never used as a
/// membership key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email_verified: bool,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

pub const ROLE_ADMIN: &str = "admin";

impl User {
    pub fn new(id: impl Into<UserId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email_verified: false,
            roles: BTreeSet::new(),
        }
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.roles.insert(role.to_string());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(ROLE_ADMIN)
    }
}
