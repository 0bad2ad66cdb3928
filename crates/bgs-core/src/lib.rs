//! # BGS Core
//!
//! Core types shared by the board-game platform's persistence layer.
//!
//! ## Key Types
//!
//! - [`UserId`], [`RoomId`], [`GameId`]: validated string identities used as
//!   partition keys by the event logs
//! - [`ChatMessage`]: a chat line posted to a room
//! - [`ApiError`]: an error report captured by the API server
//! - [`GameInfo`]: curated metadata for one version of a game

pub mod error;
pub mod identity;
pub mod records;

// Re-export main types
pub use error::*;
pub use identity::*;
pub use records::*;
