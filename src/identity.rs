//! Identity Store: the authoritative mapping from stable user ids to mutable
//! display attributes.
//!
//! Membership checks never go through this store; they compare stable ids
//! directly. Display surfaces resolve names here, and the identity backfill
//! uses the reverse index to map legacy display-name values back to ids.

use dashmap::DashMap;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{User, UserId};

pub const UNKNOWN_USER: &str = "Unknown User";

struct IdentityInner {
    users: DashMap<UserId, User>,
    /// username -> id reverse index; consulted only by the backfill.
    by_username: DashMap<String, UserId>,
}

#[derive(Clone)]
pub struct IdentityStore {
    inner: Arc<IdentityInner>,
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(IdentityInner {
                users: DashMap::new(),
                by_username: DashMap::new(),
            }),
        }
    }

    pub fn create_user(&self, user: User) -> AppResult<()> {
        use dashmap::mapref::entry::Entry;

        match self.inner.users.entry(user.id.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "users: duplicate id {}",
                user.id
            ))),
            Entry::Vacant(slot) => {
                self.inner
                    .by_username
                    .insert(user.username.clone(), user.id.clone());
                slot.insert(user);
                Ok(())
            }
        }
    }

    /// Change a user's display name, keeping the reverse index consistent.
    /// Membership data is untouched: it references the stable id.
    pub fn rename_user(&self, id: &UserId, username: impl Into<String>) -> AppResult<()> {
        let username = username.into();
        let mut entry = self
            .inner
            .users
            .get_mut(id)
            .ok_or(AppError::NotFound("user"))?;
        self.inner.by_username.remove(&entry.username);
        entry.username = username.clone();
        drop(entry);
        self.inner.by_username.insert(username, id.clone());
        Ok(())
    }

    pub fn resolve_display_name(&self, id: &UserId) -> AppResult<String> {
        self.inner
            .users
            .get(id)
            .map(|user| user.username.clone())
            .ok_or(AppError::NotFound("user"))
    }

    /// Rendering fallback: a dangling reference degrades to a placeholder
    /// instead of failing the surrounding operation.
    pub fn display_name_or_unknown(&self, id: &UserId) -> String {
        self.resolve_display_name(id)
            .unwrap_or_else(|_| UNKNOWN_USER.to_string())
    }

    /// Reverse lookup used only during the one-time backfill, never in
    /// steady-state membership checks.
    pub fn resolve_id(&self, username: &str) -> Option<UserId> {
        self.inner
            .by_username
            .get(username)
            .map(|entry| entry.clone())
    }

    pub fn user_exists(&self, id: &UserId) -> bool {
        self.inner.users.contains_key(id)
    }

    pub fn is_admin(&self, id: &UserId) -> bool {
        self.inner
            .users
            .get(id)
            .map(|user| user.is_admin())
            .unwrap_or(false)
    }

    pub fn get(&self, id: &UserId) -> Option<User> {
        self.inner.users.get(id).map(|entry| entry.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(users: &[(&str, &str)]) -> IdentityStore {
        let store = IdentityStore::new();
        for (id, name) in users {
            store.create_user(User::new(*id, *name)).unwrap();
        }
        store
    }

    #[test]
    fn test_resolve_round_trip() {
        let store = store_with(&[("u-42", "alice@example.com")]);
        let id = store.resolve_id("alice@example.com").unwrap();
        assert_eq!(id, UserId::from("u-42"));
        assert_eq!(store.resolve_display_name(&id).unwrap(), "alice@example.com");
    }

    #[test]
    fn test_resolve_unknown_id() {
        let store = store_with(&[]);
        let err = store.resolve_display_name(&UserId::from("u-ghost")).unwrap_err();
        assert!(matches!(err, AppError::NotFound("user")));
        assert_eq!(
            store.display_name_or_unknown(&UserId::from("u-ghost")),
            UNKNOWN_USER
        );
    }

    #[test]
    fn test_rename_keeps_reverse_index_consistent() {
        let store = store_with(&[("u-1", "alice")]);
        store.rename_user(&UserId::from("u-1"), "alice.smith@example.com").unwrap();

        assert_eq!(store.resolve_id("alice"), None);
        assert_eq!(
            store.resolve_id("alice.smith@example.com"),
            Some(UserId::from("u-1"))
        );
        assert_eq!(
            store.resolve_display_name(&UserId::from("u-1")).unwrap(),
            "alice.smith@example.com"
        );
    }

    #[test]
    fn test_duplicate_user_id_rejected() {
        let store = store_with(&[("u-1", "alice")]);
        let err = store.create_user(User::new("u-1", "other")).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
