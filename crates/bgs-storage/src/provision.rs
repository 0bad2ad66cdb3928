//! Boot-time provisioning of the platform collections
//!
//! Each function creates its collection if absent (or confirms the existing
//! one has the same capacity options) and then ensures its indexes exist.
//! All of them are safe to run on every start. Any failure is returned to
//! the caller; nothing is retried.

use bgs_core::{ApiError, ChatMessage, GameInfo};
use tracing::{info, instrument};

use crate::collection::{Collection, CollectionOptions, ID_FIELD, IndexSpec};
use crate::config::Capacities;
use crate::error::StorageError;
use crate::tables::DocumentStore;

pub const CHAT_MESSAGES: &str = "chatmessages";
pub const API_ERRORS: &str = "apierrors";
pub const GAME_INFOS: &str = "gameinfos";

/// Chat lines of a room, newest first
pub fn chat_room_index() -> IndexSpec {
    IndexSpec::new().asc("room").desc(ID_FIELD)
}

/// Chat lines of an author, newest first
pub fn chat_author_index() -> IndexSpec {
    IndexSpec::new().asc("author.id").desc(ID_FIELD)
}

/// Errors of a user, newest first
pub fn api_error_user_index() -> IndexSpec {
    IndexSpec::new().asc("user").desc("createdAt")
}

/// Versions of a game, newest first
pub fn game_version_index() -> IndexSpec {
    IndexSpec::new().asc("game").desc("version")
}

fn provision<T>(
    store: &DocumentStore,
    name: &str,
    options: CollectionOptions,
    indexes: &[IndexSpec],
) -> Result<Collection<T>, StorageError>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    store.create_collection(name, options)?;
    let collection = store.collection::<T>(name)?;
    for spec in indexes {
        collection.create_index(spec.clone())?;
    }
    Ok(collection)
}

/// Provision the capped chat log with the default 100 MiB capacity
pub fn create_chat_message_collection(
    store: &DocumentStore,
) -> Result<Collection<ChatMessage>, StorageError> {
    create_chat_message_collection_with(store, &Capacities::default())
}

/// Provision the capped chat log
#[instrument(skip(store, capacities), fields(collection = CHAT_MESSAGES))]
pub fn create_chat_message_collection_with(
    store: &DocumentStore,
    capacities: &Capacities,
) -> Result<Collection<ChatMessage>, StorageError> {
    provision(
        store,
        CHAT_MESSAGES,
        CollectionOptions::capped(capacities.chat_size_bytes),
        &[chat_room_index(), chat_author_index()],
    )
}

/// Provision the capped API error log with the default 10 MiB / 10,000 document capacity
pub fn create_api_error_collection(
    store: &DocumentStore,
) -> Result<Collection<ApiError>, StorageError> {
    create_api_error_collection_with(store, &Capacities::default())
}

/// Provision the capped API error log
#[instrument(skip(store, capacities), fields(collection = API_ERRORS))]
pub fn create_api_error_collection_with(
    store: &DocumentStore,
    capacities: &Capacities,
) -> Result<Collection<ApiError>, StorageError> {
    provision(
        store,
        API_ERRORS,
        CollectionOptions::capped(capacities.api_error_size_bytes)
            .with_max(capacities.api_error_max_docs),
        &[api_error_user_index()],
    )
}

/// Provision the uncapped game metadata collection
#[instrument(skip(store), fields(collection = GAME_INFOS))]
pub fn create_game_info_collection(
    store: &DocumentStore,
) -> Result<Collection<GameInfo>, StorageError> {
    provision(
        store,
        GAME_INFOS,
        CollectionOptions::uncapped(),
        &[game_version_index()],
    )
}

/// Handles to every provisioned collection
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub chat_messages: Collection<ChatMessage>,
    pub api_errors: Collection<ApiError>,
    pub game_infos: Collection<GameInfo>,
}

/// Run the full boot provisioning sequence
#[instrument(skip_all)]
pub fn provision_all(
    store: &DocumentStore,
    capacities: &Capacities,
) -> Result<Provisioned, StorageError> {
    let provisioned = Provisioned {
        chat_messages: create_chat_message_collection_with(store, capacities)?,
        api_errors: create_api_error_collection_with(store, capacities)?,
        game_infos: create_game_info_collection(store)?,
    };
    info!(
        chat_size_bytes = capacities.chat_size_bytes,
        api_error_size_bytes = capacities.api_error_size_bytes,
        api_error_max_docs = capacities.api_error_max_docs,
        "Provisioned collections"
    );
    Ok(provisioned)
}
