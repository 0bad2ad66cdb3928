//! Chat message log

use bgs_core::{ChatMessage, RoomId, UserId};
use tracing::instrument;

use crate::collection::{Collection, DocumentId, Query, Stored};
use crate::config::Capacities;
use crate::error::StorageError;
use crate::provision::{CHAT_MESSAGES, create_chat_message_collection_with};
use crate::tables::DocumentStore;

/// Append-only chat history, trimmed oldest-first at capacity
#[derive(Debug, Clone)]
pub struct ChatLog {
    messages: Collection<ChatMessage>,
}

impl ChatLog {
    /// Wrap an already provisioned collection
    pub fn new(messages: Collection<ChatMessage>) -> Self {
        Self { messages }
    }

    /// Provision the collection if needed and wrap it
    pub fn provision(store: &DocumentStore, capacities: &Capacities) -> Result<Self, StorageError> {
        Ok(Self::new(create_chat_message_collection_with(store, capacities)?))
    }

    /// Open the existing chat collection
    pub fn open(store: &DocumentStore) -> Result<Self, StorageError> {
        Ok(Self::new(store.collection(CHAT_MESSAGES)?))
    }

    /// Append a message
    #[instrument(level = "debug", skip(self, message), fields(room = %message.room))]
    pub fn post(&self, message: &ChatMessage) -> Result<DocumentId, StorageError> {
        self.messages.insert_one(message)
    }

    /// Newest messages of a room, newest first
    pub fn recent_in_room(
        &self,
        room: &RoomId,
        limit: usize,
    ) -> Result<Vec<Stored<ChatMessage>>, StorageError> {
        self.messages
            .find(&Query::new().eq("room", room.as_str()).limit(limit))
    }

    /// Newest messages posted by a user across all rooms, newest first
    pub fn recent_by_author(
        &self,
        author: &UserId,
        limit: usize,
    ) -> Result<Vec<Stored<ChatMessage>>, StorageError> {
        self.messages
            .find(&Query::new().eq("author.id", author.as_str()).limit(limit))
    }

    pub fn collection(&self) -> &Collection<ChatMessage> {
        &self.messages
    }
}
