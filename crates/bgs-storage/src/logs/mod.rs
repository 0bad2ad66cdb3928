//! Typed facades over the provisioned collections
//!
//! Producers append through these wrappers and consumers read the newest
//! records of a partition without building queries by hand.

mod api_errors;
mod chat;
mod game_info;

pub use api_errors::ApiErrorLog;
pub use chat::ChatLog;
pub use game_info::GameInfoStore;

/// Default page size of the `bgs-store` tail commands
pub const DEFAULT_RECENT_LIMIT: usize = 50;
