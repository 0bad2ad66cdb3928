//! Identity newtypes
//!
//! The event logs are partitioned by a handful of string keys. Each key gets
//! its own newtype so a room can never be passed where a user is expected:
//!
//! - [`UserId`]: account identity (a hex object id issued by the API server)
//! - [`RoomId`]: chat room, usually a game id or `"lobby"`
//! - [`GameId`]: game kind, e.g. `"gaia-project"`
//!
//! All three are validated on construction and on deserialization.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Longest identity accepted, in bytes
pub const MAX_IDENTITY_LEN: usize = 128;

fn validate(kind: &'static str, value: &str) -> Result<(), IdentityError> {
    if value.is_empty() {
        return Err(IdentityError::Empty { kind });
    }
    if value.len() > MAX_IDENTITY_LEN {
        return Err(IdentityError::TooLong {
            kind,
            len: value.len(),
            max: MAX_IDENTITY_LEN,
        });
    }
    if value.chars().any(char::is_control) {
        return Err(IdentityError::ControlCharacter { kind });
    }
    Ok(())
}

macro_rules! string_identity {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a validated identity
            pub fn new(value: impl Into<String>) -> Result<Self, IdentityError> {
                let value = value.into();
                validate($kind, &value)?;
                Ok(Self(value))
            }

            /// Borrow the identity as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdentityError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_identity!(
    /// Identity of a registered user
    UserId,
    "user id"
);

string_identity!(
    /// Identity of a chat room
    RoomId,
    "room id"
);

string_identity!(
    /// Identity of a game kind (not a game instance)
    GameId,
    "game id"
);

impl RoomId {
    /// The shared lobby room
    pub fn lobby() -> Self {
        Self("lobby".to_string())
    }
}
