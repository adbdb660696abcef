//! The engine contract.
//!
//! An engine makes channel messaging, presence, and history durable behind
//! a uniform capability surface, so the rest of the server never depends on
//! which backend is in use. Implementations in this workspace: the
//! in-memory engine in this crate and the pool-backed engine in
//! `beacon-backend`.

use crate::channel::{ChannelId, ConnId};
use async_trait::async_trait;
use beacon_protocol::{ClientInfo, Message};
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Boxed error cause attached to engine errors.
pub type Cause = Box<dyn std::error::Error + Send + Sync>;

/// Engine errors.
///
/// Every operation failure carries the operation and channel it belongs to.
/// An empty presence or history result is never reported through this type:
/// emptiness and failure are distinct outcomes.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid engine or pool configuration. Fatal at construction.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Backend unreachable or refused. Fatal at construction, retriable
    /// with backoff at steady state.
    #[error("Backend connection failed: {0}")]
    Connection(#[source] Cause),

    /// The connection pool holds zero connections.
    #[error("Connection pool is empty")]
    EmptyPool,

    /// Publish rejected by the backend or connection unavailable.
    #[error("Publish to channel {channel} failed: {source}")]
    Publish {
        /// Target channel.
        channel: ChannelId,
        /// Underlying cause.
        #[source]
        source: Cause,
    },

    /// Subscribe failed.
    #[error("Subscribe to channel {channel} failed: {source}")]
    Subscribe {
        /// Target channel.
        channel: ChannelId,
        /// Underlying cause.
        #[source]
        source: Cause,
    },

    /// Unsubscribe failed.
    #[error("Unsubscribe from channel {channel} failed: {source}")]
    Unsubscribe {
        /// Target channel.
        channel: ChannelId,
        /// Underlying cause.
        #[source]
        source: Cause,
    },

    /// Presence operation failed.
    #[error("Presence operation {op} on channel {channel} failed: {source}")]
    Presence {
        /// Failing operation name.
        op: &'static str,
        /// Target channel.
        channel: ChannelId,
        /// Underlying cause.
        #[source]
        source: Cause,
    },

    /// History operation failed.
    #[error("History operation {op} on channel {channel} failed: {source}")]
    History {
        /// Failing operation name.
        op: &'static str,
        /// Target channel.
        channel: ChannelId,
        /// Underlying cause.
        #[source]
        source: Cause,
    },

    /// Listing channels failed.
    #[error("Listing channels failed: {source}")]
    List {
        /// Underlying cause.
        #[source]
        source: Cause,
    },

    /// The caller's deadline elapsed before the backend round trip
    /// completed. Distinct from backend rejection; never retried by the
    /// engine itself.
    #[error("Operation {op} on channel {channel} cancelled before completion")]
    Cancelled {
        /// Cancelled operation name.
        op: &'static str,
        /// Target channel, or `*` for channel-less operations.
        channel: ChannelId,
    },
}

/// Delivery seam toward the application.
///
/// The engine hands every publication on a subscribed channel to the sink.
/// Delivery runs on the publishing task, so implementations must not block.
pub trait MessageSink: Send + Sync {
    /// Deliver a publication payload for a channel.
    fn deliver(&self, channel: &str, payload: Bytes);
}

/// Unbounded channel sink: publications are queued for the application's
/// routing loop. A closed receiver drops publications with a warning.
impl MessageSink for mpsc::UnboundedSender<(ChannelId, Bytes)> {
    fn deliver(&self, channel: &str, payload: Bytes) {
        if self.send((channel.to_string(), payload)).is_err() {
            warn!(channel = %channel, "Message sink closed, dropping publication");
        }
    }
}

/// The uniform capability surface every backend must satisfy.
///
/// All operations are safe to call from concurrent tasks. The engine does
/// not impose a per-channel sequencer: callers needing strict ordering
/// between their own mutations on one channel must serialize those calls
/// themselves.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Engine name, for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Start the engine's background work (expiry sweeps). Call once,
    /// inside a tokio runtime, after construction.
    async fn run(&self) -> Result<(), EngineError>;

    /// Publish an opaque payload to a channel.
    ///
    /// Payloads reach the application sink only for channels with
    /// registered interest; publishing elsewhere is an acked no-op.
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), EngineError>;

    /// Register server-side interest in a channel. Idempotent.
    async fn subscribe(&self, channel: &str) -> Result<(), EngineError>;

    /// Remove server-side interest in a channel. Idempotent: removing a
    /// channel that was never subscribed is not an error.
    async fn unsubscribe(&self, channel: &str) -> Result<(), EngineError>;

    /// Upsert presence info for a connection on a channel.
    ///
    /// A repeated call for the same `(channel, conn_id)` replaces the
    /// stored info wholesale; there are no merge semantics.
    async fn add_presence(
        &self,
        channel: &str,
        conn_id: &str,
        info: ClientInfo,
    ) -> Result<(), EngineError>;

    /// Delete presence info for a connection. No-op if absent.
    async fn remove_presence(&self, channel: &str, conn_id: &str) -> Result<(), EngineError>;

    /// Snapshot of live presence entries for a channel at call time.
    async fn presence(&self, channel: &str) -> Result<HashMap<ConnId, ClientInfo>, EngineError>;

    /// Append a message to channel history and trim to bounds.
    ///
    /// At most `size` entries are retained, and no entry is retained past
    /// `lifetime` from its insertion; both bounds are applied atomically
    /// with the append. A zero `lifetime` disables age-based expiry.
    async fn add_history(
        &self,
        channel: &str,
        message: Message,
        size: usize,
        lifetime: Duration,
    ) -> Result<(), EngineError>;

    /// Channel history within the current bounds, newest first.
    async fn history(&self, channel: &str) -> Result<Vec<Message>, EngineError>;

    /// Channels currently holding interest, presence, or history.
    async fn channels(&self) -> Result<Vec<ChannelId>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_carries_channel_context() {
        let err = EngineError::Publish {
            channel: "chat:lobby".into(),
            source: "connection reset".into(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("chat:lobby"));
        assert!(rendered.contains("connection reset"));
    }

    #[test]
    fn test_cancelled_is_distinct() {
        let err = EngineError::Cancelled {
            op: "history",
            channel: "news".into(),
        };
        assert!(matches!(err, EngineError::Cancelled { .. }));
        assert!(err.to_string().contains("cancelled"));
    }

    #[tokio::test]
    async fn test_mpsc_sink_delivery() {
        let (tx, mut rx) = mpsc::unbounded_channel::<(ChannelId, Bytes)>();
        let sink: &dyn MessageSink = &tx;

        sink.deliver("news", Bytes::from_static(b"payload"));

        let (channel, payload) = rx.recv().await.unwrap();
        assert_eq!(channel, "news");
        assert_eq!(&payload[..], b"payload");
    }

    #[tokio::test]
    async fn test_mpsc_sink_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel::<(ChannelId, Bytes)>();
        drop(rx);

        // Must not panic once the application side is gone.
        tx.deliver("news", Bytes::from_static(b"payload"));
    }
}
