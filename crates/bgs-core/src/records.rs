//! Record models persisted by the event log store
//!
//! [`ChatMessage`] and [`ApiError`] are append-only log records: created once
//! by a producer, never updated, and only removed when their collection's
//! capacity forces the oldest records out. [`GameInfo`] is curated metadata
//! keyed by (game, version) and lives in an uncapped collection.

use serde::{Deserialize, Serialize};

use crate::identity::{GameId, RoomId, UserId};

// ============================================================================
// Chat
// ============================================================================

/// Kind of chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// Plain text typed by a player
    #[default]
    Text,
    /// A single emoji reaction
    Emoji,
    /// Generated by the game server (player joined, game started, ...)
    System,
}

/// Who posted a chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAuthor {
    pub id: UserId,
    pub name: String,
}

/// Body of a chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatData {
    pub text: String,
}

/// A message posted to a chat room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Room the message belongs to (partition key)
    pub room: RoomId,
    /// Absent for system messages
    pub author: Option<ChatAuthor>,
    pub data: ChatData,
    #[serde(rename = "type")]
    pub kind: ChatKind,
}

impl ChatMessage {
    /// Create a text message from a user
    pub fn text(room: RoomId, author: ChatAuthor, text: impl Into<String>) -> Self {
        Self {
            room,
            author: Some(author),
            data: ChatData { text: text.into() },
            kind: ChatKind::Text,
        }
    }

    /// Create an emoji message from a user
    pub fn emoji(room: RoomId, author: ChatAuthor, emoji: impl Into<String>) -> Self {
        Self {
            room,
            author: Some(author),
            data: ChatData { text: emoji.into() },
            kind: ChatKind::Emoji,
        }
    }

    /// Create a system message with no author
    pub fn system(room: RoomId, text: impl Into<String>) -> Self {
        Self {
            room,
            author: None,
            data: ChatData { text: text.into() },
            kind: ChatKind::System,
        }
    }

    /// The message text
    pub fn text_body(&self) -> &str {
        &self.data.text
    }
}

impl ChatAuthor {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

// ============================================================================
// API errors
// ============================================================================

/// The error half of an error report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub name: String,
    pub message: String,
    /// Stack frames, innermost first
    pub stack: Vec<String>,
}

/// The request that triggered an error
///
/// `body` holds the JSON-serialized request body rather than the body itself:
/// request bodies routinely carry keys containing `.`, which the store
/// refuses as field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub url: String,
    pub method: String,
    pub body: String,
}

impl ApiRequest {
    /// Capture a request, serializing its body
    pub fn new(url: impl Into<String>, method: impl Into<String>, body: &serde_json::Value) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            body: body.to_string(),
        }
    }

    /// Parse the captured body back into JSON
    pub fn parsed_body(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// An error report captured by the API server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error: ErrorInfo,
    pub request: ApiRequest,
    /// Free-form context supplied by the reporting middleware
    pub meta: serde_json::Value,
    /// The authenticated user, if any
    pub user: Option<UserId>,
    /// Unix millis
    pub created_at: i64,
    /// Unix millis; equal to `created_at` since reports are never updated
    pub updated_at: i64,
}

impl ApiError {
    /// Create an error report stamped with the current time
    pub fn new(error: ErrorInfo, request: ApiRequest, user: Option<UserId>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            error,
            request,
            meta: serde_json::Value::Null,
            user,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach middleware context
    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }

    /// Override the creation time (Unix millis)
    pub fn at(mut self, millis: i64) -> Self {
        self.created_at = millis;
        self.updated_at = millis;
        self
    }
}

impl ErrorInfo {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: Vec::new(),
        }
    }

    /// Split a newline-separated stack trace into frames
    pub fn with_stack(mut self, stack: &str) -> Self {
        self.stack = stack
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        self
    }
}

// ============================================================================
// Game metadata
// ============================================================================

/// Inclusive range of supported player counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRange {
    pub min: u8,
    pub max: u8,
}

/// An optional expansion of a game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expansion {
    pub name: String,
    pub label: String,
}

/// Metadata describing one published version of a game engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameInfo {
    pub game: GameId,
    pub version: u32,
    pub label: String,
    pub description: String,
    pub players: PlayerRange,
    pub expansions: Vec<Expansion>,
    pub meta: serde_json::Value,
}

impl GameInfo {
    pub fn new(game: GameId, version: u32, label: impl Into<String>) -> Self {
        Self {
            game,
            version,
            label: label.into(),
            description: String::new(),
            players: PlayerRange { min: 2, max: 4 },
            expansions: Vec::new(),
            meta: serde_json::Value::Null,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_players(mut self, min: u8, max: u8) -> Self {
        self.players = PlayerRange { min, max };
        self
    }

    pub fn with_expansion(mut self, name: impl Into<String>, label: impl Into<String>) -> Self {
        self.expansions.push(Expansion {
            name: name.into(),
            label: label.into(),
        });
        self
    }
}
