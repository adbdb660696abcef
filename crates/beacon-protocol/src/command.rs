//! Backend command and reply types.
//!
//! Every engine operation maps to exactly one command, and every command is
//! served by the backend in a single round trip. Mutations that must hold an
//! invariant (history trim on insert, presence upsert with TTL) carry their
//! bounds in the command so the backend can apply them atomically.

use crate::envelope::{ClientInfo, Message};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A command issued to a backend connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Command {
    /// Publish an opaque payload to a channel.
    Publish {
        /// Target channel.
        channel: String,
        /// Pre-encoded message payload.
        #[serde(with = "serde_bytes")]
        payload: Vec<u8>,
    },

    /// Register server-side interest in a channel. Idempotent.
    Subscribe {
        /// Channel name.
        channel: String,
    },

    /// Remove server-side interest in a channel. Idempotent.
    Unsubscribe {
        /// Channel name.
        channel: String,
    },

    /// Upsert presence info for a connection, refreshing its TTL.
    AddPresence {
        /// Channel name.
        channel: String,
        /// Connection ID keying the entry.
        conn_id: String,
        /// Client info; replaces any prior entry for the same key.
        info: ClientInfo,
        /// Entry time-to-live in milliseconds.
        ttl_ms: u64,
    },

    /// Delete presence info for a connection. No-op if absent.
    RemovePresence {
        /// Channel name.
        channel: String,
        /// Connection ID keying the entry.
        conn_id: String,
    },

    /// Fetch the presence snapshot for a channel.
    Presence {
        /// Channel name.
        channel: String,
    },

    /// Append a message to channel history, trimming to bounds atomically.
    AddHistory {
        /// Channel name.
        channel: String,
        /// Message to append.
        message: Message,
        /// Maximum retained entry count.
        size: u64,
        /// Maximum retained age in milliseconds. Zero disables age expiry.
        lifetime_ms: u64,
    },

    /// Fetch the history of a channel, newest first.
    History {
        /// Channel name.
        channel: String,
    },

    /// List channels currently holding interest, presence, or history.
    Channels,
}

impl Command {
    /// Create a publish command.
    #[must_use]
    pub fn publish(channel: impl Into<String>, payload: Vec<u8>) -> Self {
        Self::Publish {
            channel: channel.into(),
            payload,
        }
    }

    /// Create a subscribe command.
    #[must_use]
    pub fn subscribe(channel: impl Into<String>) -> Self {
        Self::Subscribe {
            channel: channel.into(),
        }
    }

    /// Create an unsubscribe command.
    #[must_use]
    pub fn unsubscribe(channel: impl Into<String>) -> Self {
        Self::Unsubscribe {
            channel: channel.into(),
        }
    }

    /// The wire method name of this command.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Publish { .. } => "publish",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::AddPresence { .. } => "add_presence",
            Self::RemovePresence { .. } => "remove_presence",
            Self::Presence { .. } => "presence",
            Self::AddHistory { .. } => "add_history",
            Self::History { .. } => "history",
            Self::Channels => "channels",
        }
    }

    /// The channel this command targets, if any.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        match self {
            Self::Publish { channel, .. }
            | Self::Subscribe { channel }
            | Self::Unsubscribe { channel }
            | Self::AddPresence { channel, .. }
            | Self::RemovePresence { channel, .. }
            | Self::Presence { channel }
            | Self::AddHistory { channel, .. }
            | Self::History { channel } => Some(channel),
            Self::Channels => None,
        }
    }
}

/// A backend's reply to a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Reply {
    /// The command was applied.
    Ok,

    /// Presence snapshot.
    Presence {
        /// Live presence entries keyed by connection ID.
        members: HashMap<String, ClientInfo>,
    },

    /// History snapshot, newest first.
    History {
        /// Retained messages within the size and lifetime bounds.
        messages: Vec<Message>,
    },

    /// Known channels.
    Channels {
        /// Channel names.
        channels: Vec<String>,
    },

    /// The backend rejected the command.
    Error {
        /// Backend-defined error code.
        code: u16,
        /// Human-readable reason.
        message: String,
    },
}

impl Reply {
    /// Create an error reply.
    #[must_use]
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_method_names() {
        assert_eq!(Command::publish("c", vec![]).method(), "publish");
        assert_eq!(Command::subscribe("c").method(), "subscribe");
        assert_eq!(Command::Channels.method(), "channels");
    }

    #[test]
    fn test_command_channel_accessor() {
        assert_eq!(Command::subscribe("news").channel(), Some("news"));
        assert_eq!(Command::Channels.channel(), None);
    }

    #[test]
    fn test_command_wire_tag() {
        let cmd = Command::unsubscribe("news");
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["method"], "unsubscribe");
        assert_eq!(value["channel"], "news");
    }

    #[test]
    fn test_reply_roundtrip() {
        let info = ClientInfo::new("7", "conn-7").with_default_info(json!({"name": "Ada"}));
        let replies = vec![
            Reply::Ok,
            Reply::Presence {
                members: [("conn-7".to_string(), info.clone())].into_iter().collect(),
            },
            Reply::History {
                messages: vec![Message::new("news", json!({"n": 1}), info)],
            },
            Reply::Channels {
                channels: vec!["news".into(), "chat:lobby".into()],
            },
            Reply::error(100, "internal server error"),
        ];

        for reply in replies {
            let encoded = serde_json::to_vec(&reply).unwrap();
            let decoded: Reply = serde_json::from_slice(&encoded).unwrap();
            assert_eq!(reply, decoded);
        }
    }
}
