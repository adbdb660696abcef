//! In-process loopback backend.
//!
//! Serves the command protocol from a shared [`MemoryEngine`] hub instead
//! of a network peer. Every pool connection is a handle onto the same hub,
//! which makes this backend useful twice over: single-process deployments
//! get a working engine without an external store, and tests get a real
//! shared-state backend to drive the pooled engine end to end.

use crate::traits::{Backend, BackendConn, BackendError};
use async_trait::async_trait;
use beacon_core::{Engine, EngineError, MemoryEngine};
use beacon_protocol::{Command, Reply};
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

/// Error code used for hub-side rejections.
const REJECTION_CODE: u16 = 100;

/// Loopback backend options: the hub every connection serves from.
#[derive(Clone)]
pub struct LoopbackOptions {
    /// Shared in-process hub.
    pub hub: MemoryEngine,
}

/// In-process backend for tests and single-process deployments.
pub struct LoopbackBackend;

/// A handle onto the shared hub.
pub struct LoopbackConn {
    hub: MemoryEngine,
}

#[async_trait]
impl Backend for LoopbackBackend {
    type Conn = LoopbackConn;
    type Options = LoopbackOptions;

    async fn connect(address: &str, options: &Self::Options) -> Result<Self::Conn, BackendError> {
        debug!(address = %address, "Opening loopback connection");
        Ok(LoopbackConn {
            hub: options.hub.clone(),
        })
    }

    fn name() -> &'static str {
        "loopback"
    }
}

#[async_trait]
impl BackendConn for LoopbackConn {
    async fn call(&self, command: Command) -> Result<Reply, BackendError> {
        let result = match command {
            Command::Publish { channel, payload } => self
                .hub
                .publish(&channel, Bytes::from(payload))
                .await
                .map(|()| Reply::Ok),
            Command::Subscribe { channel } => {
                self.hub.subscribe(&channel).await.map(|()| Reply::Ok)
            }
            Command::Unsubscribe { channel } => {
                self.hub.unsubscribe(&channel).await.map(|()| Reply::Ok)
            }
            Command::AddPresence {
                channel,
                conn_id,
                info,
                ttl_ms,
            } => self
                .hub
                .add_presence_with_ttl(&channel, &conn_id, info, Duration::from_millis(ttl_ms))
                .map(|()| Reply::Ok),
            Command::RemovePresence { channel, conn_id } => self
                .hub
                .remove_presence(&channel, &conn_id)
                .await
                .map(|()| Reply::Ok),
            Command::Presence { channel } => self
                .hub
                .presence(&channel)
                .await
                .map(|members| Reply::Presence { members }),
            Command::AddHistory {
                channel,
                message,
                size,
                lifetime_ms,
            } => self
                .hub
                .add_history(
                    &channel,
                    message,
                    size as usize,
                    Duration::from_millis(lifetime_ms),
                )
                .await
                .map(|()| Reply::Ok),
            Command::History { channel } => self
                .hub
                .history(&channel)
                .await
                .map(|messages| Reply::History { messages }),
            Command::Channels => self
                .hub
                .channels()
                .await
                .map(|channels| Reply::Channels { channels }),
        };

        result.map_err(rejection)
    }

    fn is_open(&self) -> bool {
        true
    }
}

/// Hub-side failures surface as command rejections.
fn rejection(err: EngineError) -> BackendError {
    BackendError::Rejected {
        code: REJECTION_CODE,
        message: err.to_string(),
    }
}
