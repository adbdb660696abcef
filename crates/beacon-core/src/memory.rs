//! In-memory engine.
//!
//! The reference [`Engine`] implementation: all state lives in this process,
//! keyed by channel. Every mutation runs under that channel's map entry
//! guard, which is the in-memory counterpart of the single-round-trip rule
//! that remote backends follow — no operation is ever a read-modify-write
//! split across two locks.

use crate::channel::{validate_channel_name, ChannelId};
use crate::engine::{Engine, EngineError, MessageSink};
use crate::history::HistoryBuffer;
use crate::presence::PresenceTracker;
use async_trait::async_trait;
use beacon_protocol::{ClientInfo, Message};
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Memory engine configuration.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Presence entry time-to-live; refreshed on every presence write.
    pub presence_ttl: Duration,
    /// Cadence of the background expiry sweep started by `run`.
    pub sweep_interval: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            presence_ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(1),
        }
    }
}

/// Per-channel engine state.
#[derive(Debug, Default)]
struct ChannelState {
    /// Whether server-side interest is registered for the channel.
    subscribed: bool,
    presence: PresenceTracker,
    history: HistoryBuffer,
}

impl ChannelState {
    /// A vacant channel holds no interest, no presence, and no history,
    /// and is removed from the map.
    fn is_vacant(&self) -> bool {
        !self.subscribed && self.presence.is_empty() && self.history.is_empty()
    }
}

struct Inner {
    channels: DashMap<ChannelId, ChannelState>,
    sink: Arc<dyn MessageSink>,
    config: MemoryConfig,
}

/// The in-memory engine.
///
/// Cheap to clone via its inner `Arc`; one instance is shared between the
/// application and the background sweep task.
#[derive(Clone)]
pub struct MemoryEngine {
    inner: Arc<Inner>,
}

impl MemoryEngine {
    /// Create a memory engine with default configuration.
    #[must_use]
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self::with_config(sink, MemoryConfig::default())
    }

    /// Create a memory engine with custom configuration.
    #[must_use]
    pub fn with_config(sink: Arc<dyn MessageSink>, config: MemoryConfig) -> Self {
        info!("Creating memory engine with config: {:?}", config);
        Self {
            inner: Arc::new(Inner {
                channels: DashMap::new(),
                sink,
                config,
            }),
        }
    }

    /// Upsert presence with an explicit TTL instead of the configured one.
    ///
    /// Backends that receive the TTL on the wire use this to enforce the
    /// caller's window rather than this engine's own configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Presence`] if the channel name is invalid.
    pub fn add_presence_with_ttl(
        &self,
        channel: &str,
        conn_id: &str,
        info: ClientInfo,
        ttl: Duration,
    ) -> Result<(), EngineError> {
        validate_channel_name(channel).map_err(|e| EngineError::Presence {
            op: "add_presence",
            channel: channel.to_string(),
            source: e.into(),
        })?;

        let mut state = self.inner.channels.entry(channel.to_string()).or_default();
        state.presence.set(conn_id, info, ttl);
        Ok(())
    }

    /// Remove the channel if it no longer holds any state.
    fn drop_if_vacant(&self, channel: &str) {
        let removed = self
            .inner
            .channels
            .remove_if(channel, |_, state| state.is_vacant());
        if removed.is_some() {
            debug!(channel = %channel, "Removed vacant channel");
        }
    }

    /// One expiry sweep over all channels.
    fn sweep(inner: &Inner) {
        let now = Instant::now();
        let keys: Vec<ChannelId> = inner.channels.iter().map(|e| e.key().clone()).collect();

        for key in keys {
            if let Some(mut entry) = inner.channels.get_mut(&key) {
                entry.presence.prune_expired(now);
                entry.history.prune_expired(now);
                let vacant = entry.is_vacant();
                drop(entry);
                if vacant {
                    inner.channels.remove_if(&key, |_, state| state.is_vacant());
                }
            }
        }
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn run(&self) -> Result<(), EngineError> {
        let inner = Arc::clone(&self.inner);
        info!(
            interval = ?inner.config.sweep_interval,
            "Starting memory engine expiry sweep"
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.sweep_interval);
            loop {
                ticker.tick().await;
                Self::sweep(&inner);
            }
        });

        Ok(())
    }

    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), EngineError> {
        validate_channel_name(channel).map_err(|e| EngineError::Publish {
            channel: channel.to_string(),
            source: e.into(),
        })?;

        let subscribed = self
            .inner
            .channels
            .get(channel)
            .is_some_and(|state| state.subscribed);

        if subscribed {
            trace!(channel = %channel, bytes = payload.len(), "Publishing message");
            self.inner.sink.deliver(channel, payload);
        } else {
            debug!(channel = %channel, "Publish to channel without interest");
        }

        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<(), EngineError> {
        validate_channel_name(channel).map_err(|e| EngineError::Subscribe {
            channel: channel.to_string(),
            source: e.into(),
        })?;

        let mut state = self.inner.channels.entry(channel.to_string()).or_default();
        state.subscribed = true;
        debug!(channel = %channel, "Subscribed");
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), EngineError> {
        if let Some(mut state) = self.inner.channels.get_mut(channel) {
            state.subscribed = false;
            drop(state);
            debug!(channel = %channel, "Unsubscribed");
            self.drop_if_vacant(channel);
        }
        Ok(())
    }

    async fn add_presence(
        &self,
        channel: &str,
        conn_id: &str,
        info: ClientInfo,
    ) -> Result<(), EngineError> {
        self.add_presence_with_ttl(channel, conn_id, info, self.inner.config.presence_ttl)
    }

    async fn remove_presence(&self, channel: &str, conn_id: &str) -> Result<(), EngineError> {
        if let Some(mut state) = self.inner.channels.get_mut(channel) {
            state.presence.remove(conn_id);
            drop(state);
            self.drop_if_vacant(channel);
        }
        Ok(())
    }

    async fn presence(&self, channel: &str) -> Result<HashMap<String, ClientInfo>, EngineError> {
        match self.inner.channels.get_mut(channel) {
            Some(mut state) => Ok(state.presence.snapshot(Instant::now())),
            // A channel with no state has no presence: empty, not an error.
            None => Ok(HashMap::new()),
        }
    }

    async fn add_history(
        &self,
        channel: &str,
        message: Message,
        size: usize,
        lifetime: Duration,
    ) -> Result<(), EngineError> {
        validate_channel_name(channel).map_err(|e| EngineError::History {
            op: "add_history",
            channel: channel.to_string(),
            source: e.into(),
        })?;

        let mut state = self.inner.channels.entry(channel.to_string()).or_default();
        state.history.push(message, size, lifetime, Instant::now());
        let vacant = state.is_vacant();
        drop(state);
        if vacant {
            self.drop_if_vacant(channel);
        }
        Ok(())
    }

    async fn history(&self, channel: &str) -> Result<Vec<Message>, EngineError> {
        match self.inner.channels.get_mut(channel) {
            Some(mut state) => Ok(state.history.snapshot(Instant::now())),
            None => Ok(Vec::new()),
        }
    }

    async fn channels(&self) -> Result<Vec<ChannelId>, EngineError> {
        Ok(self
            .inner
            .channels
            .iter()
            .filter(|entry| !entry.is_vacant())
            .map(|entry| entry.key().clone())
            .collect())
    }
}
