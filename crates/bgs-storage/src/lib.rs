//! # BGS Storage
//!
//! Capped, indexed document collections backing the board-game platform's
//! event logs.
//!
//! ## Features
//!
//! - **DocumentStore**: redb-backed handle with create-if-absent provisioning
//! - **Collection**: typed collections with compound indexes, equality
//!   queries and insertion-order scans
//! - **CapacityPolicy**: byte and document caps enforced by evicting the
//!   oldest documents inside the inserting transaction
//! - **ChatLog / ApiErrorLog / GameInfoStore**: facades over the three
//!   platform collections
//!
//! ## Example
//!
//! ```rust,ignore
//! use bgs_core::{ChatAuthor, ChatMessage, RoomId, UserId};
//! use bgs_storage::{ChatLog, Capacities, DocumentStore};
//!
//! let store = DocumentStore::in_memory()?;
//! let chat = ChatLog::provision(&store, &Capacities::default())?;
//!
//! let room = RoomId::new("A")?;
//! let ann = ChatAuthor::new(UserId::new("ann")?, "Ann");
//! chat.post(&ChatMessage::text(room.clone(), ann.clone(), "hi"))?;
//! chat.post(&ChatMessage::text(room.clone(), ann, "bye"))?;
//!
//! // Newest first
//! let recent = chat.recent_in_room(&room, 10)?;
//! assert_eq!(recent[0].document.text_body(), "bye");
//! ```

pub mod collection;
pub mod config;
pub mod error;
pub mod logs;
pub mod provision;
pub mod quota;
pub mod tables;

// Re-exports
pub use collection::{
    Collection, CollectionMeta, CollectionOptions, CollectionStats, Direction, DocumentId,
    ID_FIELD, IndexField, IndexSpec, Query, SortOrder, Stored,
};
pub use config::{Capacities, StoreConfig};
pub use error::StorageError;
pub use logs::{ApiErrorLog, ChatLog, DEFAULT_RECENT_LIMIT, GameInfoStore};
pub use provision::{
    API_ERRORS, CHAT_MESSAGES, GAME_INFOS, Provisioned, create_api_error_collection,
    create_chat_message_collection, create_game_info_collection, provision_all,
};
pub use quota::{CapacityPolicy, MAX_DOCUMENT_SIZE};
pub use tables::{DocumentStore, RedbStorageConfig};
