//! The message envelope stored and retrieved by engine backends.
//!
//! This is the shape that crosses the boundary to the backend and back to
//! the application on presence and history hydration. It must round-trip
//! through storage without losing or reordering any field.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Client metadata attached to a presence entry and to every message.
///
/// Supplied by the caller at subscribe time. Stored as-is: a later write
/// for the same key replaces the whole record, it never merges fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// User identity the connection authenticated as.
    pub user: String,
    /// Connection ID of the client's session.
    pub client: String,
    /// Default metadata attached at connect time.
    #[serde(default)]
    pub default_info: Option<serde_json::Value>,
    /// Extra metadata attached when authorizing this channel.
    #[serde(default)]
    pub channel_info: Option<serde_json::Value>,
}

impl ClientInfo {
    /// Create client info for a user and connection.
    #[must_use]
    pub fn new(user: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            client: client.into(),
            default_info: None,
            channel_info: None,
        }
    }

    /// Attach default metadata.
    #[must_use]
    pub fn with_default_info(mut self, info: serde_json::Value) -> Self {
        self.default_info = Some(info);
        self
    }

    /// Attach channel-specific metadata.
    #[must_use]
    pub fn with_channel_info(mut self, info: serde_json::Value) -> Self {
        self.channel_info = Some(info);
        self
    }
}

/// A published message.
///
/// Produced once, stored by reference in history, never mutated after
/// creation. The `timestamp` field is string-encoded epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier.
    pub uid: String,
    /// Creation time as string-encoded epoch seconds.
    pub timestamp: String,
    /// Info about the client that produced the message.
    pub info: ClientInfo,
    /// Originating channel.
    pub channel: String,
    /// Opaque application payload.
    pub data: serde_json::Value,
    /// Originating connection ID.
    pub client: String,
}

impl Message {
    /// Create a new message with a fresh uid and the current timestamp.
    #[must_use]
    pub fn new(channel: impl Into<String>, data: serde_json::Value, info: ClientInfo) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        Self {
            uid: Uuid::new_v4().to_string(),
            timestamp: timestamp.to_string(),
            client: info.client.clone(),
            info,
            channel: channel.into(),
            data,
        }
    }

    /// Parse the timestamp back into epoch seconds.
    ///
    /// Returns `None` if the field does not hold a decimal number.
    #[must_use]
    pub fn timestamp_secs(&self) -> Option<u64> {
        self.timestamp.parse().ok()
    }
}
