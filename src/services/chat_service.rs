//! Chat mutation surface. Chats are linked one-to-one with rides; membership
//! events on the ride extend the participant set, and participants are only
//! ever added, never removed, so history stays readable after leaving.

use std::collections::BTreeSet;

use crate::error::{AppError, AppResult};
use crate::identity::IdentityStore;
use crate::membership::{is_participant, is_ride_member};
use crate::models::{Chat, Message, Ride, UserId, MAX_MESSAGE_BODY_LENGTH};
use crate::store::Store;

pub struct ChatService;

impl ChatService {
    /// Open the chat for a ride on behalf of one of its members. Returns the
    /// existing chat when the ride already has one.
    pub fn create_chat(store: &Store, ride_id: &str, caller: &UserId) -> AppResult<Chat> {
        let ride = store.rides.get(ride_id).ok_or(AppError::NotFound("ride"))?;
        if !is_ride_member(&ride, caller) {
            return Err(AppError::Unauthorized);
        }
        Self::ensure_ride_chat(store, &ride)
    }

    /// Create the chat for a ride, or extend the existing one with any ride
    /// members not yet in it. Idempotent per ride.
    pub fn ensure_ride_chat(store: &Store, ride: &Ride) -> AppResult<Chat> {
        let mut members: BTreeSet<UserId> = ride.riders.iter().cloned().collect();
        members.insert(ride.driver.clone());

        if let Some(existing) = Self::find_ride_chat(store, &ride.id) {
            return store.chats.update(&existing.id, move |chat| {
                chat.participants.extend(members);
                Ok(())
            });
        }

        let chat = Chat::for_ride(&ride.id, members);
        store.chats.insert(chat.clone())?;
        tracing::info!(chat_id = %chat.id, ride_id = %ride.id, "chat created");
        Ok(chat)
    }

    pub fn find_ride_chat(store: &Store, ride_id: &str) -> Option<Chat> {
        store
            .chats
            .snapshot_filtered(|chat| chat.ride_id == ride_id)
            .into_iter()
            .next()
    }

    pub fn get_chat(store: &Store, chat_id: &str, caller: &UserId) -> AppResult<Chat> {
        let chat = store.chats.get(chat_id).ok_or(AppError::NotFound("chat"))?;
        if !is_participant(&chat, caller) {
            return Err(AppError::Unauthorized);
        }
        Ok(chat)
    }

    pub fn my_chats(store: &Store, caller: &UserId) -> Vec<Chat> {
        store.chats.snapshot_filtered(|chat| is_participant(chat, caller))
    }

    /// Append a message; participants only. The participant check and the
    /// append run inside one document update.
    pub fn send_message(
        store: &Store,
        chat_id: &str,
        sender: UserId,
        body: String,
    ) -> AppResult<Message> {
        let body = body.trim().to_string();
        if body.is_empty() {
            return Err(AppError::BadRequest("message body is empty".to_string()));
        }
        if body.chars().count() > MAX_MESSAGE_BODY_LENGTH {
            return Err(AppError::BadRequest(format!(
                "message body exceeds {} characters",
                MAX_MESSAGE_BODY_LENGTH
            )));
        }

        let message = Message::new(sender, body);
        let appended = message.clone();
        store.chats.update(chat_id, move |chat| {
            if !chat.participants.contains(&appended.sender) {
                return Err(AppError::Unauthorized);
            }
            chat.messages.push(appended);
            Ok(())
        })?;
        Ok(message)
    }

    /// Tombstone a message; its sender or an admin only.
    pub fn delete_message(
        store: &Store,
        identity: &IdentityStore,
        chat_id: &str,
        message_id: &str,
        caller: &UserId,
    ) -> AppResult<()> {
        let admin = identity.is_admin(caller);
        let caller_id = caller.clone();
        let message_id = message_id.to_string();
        store.chats.update(chat_id, move |chat| {
            let Some(message) = chat.messages.iter_mut().find(|m| m.id == message_id) else {
                return Err(AppError::NotFound("message"));
            };
            if message.sender != caller_id && !admin {
                return Err(AppError::Unauthorized);
            }
            message.tombstone();
            Ok(())
        })?;
        Ok(())
    }
}
