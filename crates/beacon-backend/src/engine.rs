//! Pool-backed engine.
//!
//! Translates every engine operation into exactly one command, issued on
//! the next pooled connection under a deadline. Because consecutive calls
//! may land on different physical connections, no operation is ever split
//! into a read on one connection and a write on another; the command
//! protocol carries each mutation's bounds so the backend applies them in
//! one atomic step.

use crate::pool::{ConnectionPool, PoolConfig, PoolError};
use crate::traits::{Backend, BackendConn, BackendError};
use async_trait::async_trait;
use beacon_core::{Cause, ChannelId, ConnId, Engine, EngineError};
use beacon_protocol::{ClientInfo, Command, Message, Reply};
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, trace};

/// Default deadline for one backend round trip.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default presence TTL sent with every presence upsert.
pub const DEFAULT_PRESENCE_TTL: Duration = Duration::from_secs(60);

/// Pooled engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig<O> {
    /// Connection pool configuration.
    pub pool: PoolConfig<O>,
    /// Deadline applied to every backend round trip.
    pub op_timeout: Duration,
    /// Presence entry TTL sent with every presence upsert.
    pub presence_ttl: Duration,
}

impl<O> EngineConfig<O> {
    /// Configuration with default timeouts for the given pool.
    #[must_use]
    pub fn new(pool: PoolConfig<O>) -> Self {
        Self {
            pool,
            op_timeout: DEFAULT_OP_TIMEOUT,
            presence_ttl: DEFAULT_PRESENCE_TTL,
        }
    }
}

/// Outcome of one dispatched command, before per-operation wrapping.
enum DispatchError {
    Pool(PoolError),
    Backend(BackendError),
    Cancelled,
}

/// An engine that fans every operation out over a connection pool.
pub struct PooledEngine<B: Backend> {
    pool: ConnectionPool<B::Conn>,
    op_timeout: Duration,
    presence_ttl: Duration,
}

impl<B: Backend> PooledEngine<B> {
    /// Connect the pool and build the engine.
    ///
    /// Fail-fast: any connection failure during pool construction aborts
    /// startup; the server must not come up on a partially built engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] or [`EngineError::Connection`]
    /// when the pool cannot be built.
    pub async fn connect(config: EngineConfig<B::Options>) -> Result<Self, EngineError> {
        let pool = ConnectionPool::connect::<B>(&config.pool).await?;
        info!(
            backend = B::name(),
            pool_size = pool.len(),
            "Pooled engine connected"
        );
        Ok(Self {
            pool,
            op_timeout: config.op_timeout,
            presence_ttl: config.presence_ttl,
        })
    }

    /// Number of pooled connections.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Issue one command on the next pooled connection under the deadline.
    async fn dispatch(&self, command: Command) -> Result<Reply, DispatchError> {
        let conn = self.pool.acquire().map_err(DispatchError::Pool)?;
        trace!(method = command.method(), "Dispatching command");

        match timeout(self.op_timeout, conn.call(command)).await {
            Err(_elapsed) => Err(DispatchError::Cancelled),
            Ok(Err(err)) => Err(DispatchError::Backend(err)),
            Ok(Ok(Reply::Error { code, message })) => {
                Err(DispatchError::Backend(BackendError::Rejected { code, message }))
            }
            Ok(Ok(reply)) => Ok(reply),
        }
    }

    /// Dispatch and wrap failures with the operation and channel.
    async fn dispatch_for(
        &self,
        op: &'static str,
        channel: &str,
        command: Command,
    ) -> Result<Reply, EngineError> {
        self.dispatch(command).await.map_err(|err| match err {
            DispatchError::Pool(e) => e.into(),
            DispatchError::Cancelled => EngineError::Cancelled {
                op,
                channel: channel.to_string(),
            },
            DispatchError::Backend(e) => operation_error(op, channel, e),
        })
    }
}

/// Wrap a backend failure in the per-operation error variant.
fn operation_error(op: &'static str, channel: &str, source: BackendError) -> EngineError {
    let channel = channel.to_string();
    let source: Cause = Box::new(source);
    match op {
        "publish" => EngineError::Publish { channel, source },
        "subscribe" => EngineError::Subscribe { channel, source },
        "unsubscribe" => EngineError::Unsubscribe { channel, source },
        "add_presence" | "remove_presence" | "presence" => EngineError::Presence {
            op,
            channel,
            source,
        },
        "add_history" | "history" => EngineError::History {
            op,
            channel,
            source,
        },
        _ => EngineError::List { source },
    }
}

/// The backend answered with a reply shape the operation cannot use.
fn unexpected_reply(reply: &Reply) -> BackendError {
    BackendError::Other(format!("Unexpected reply: {reply:?}"))
}

#[async_trait]
impl<B: Backend> Engine for PooledEngine<B> {
    fn name(&self) -> &'static str {
        B::name()
    }

    async fn run(&self) -> Result<(), EngineError> {
        // Expiry is backend-native: presence TTLs and history lifetimes
        // travel with each command, so there is no engine-side sweep.
        debug!(backend = B::name(), "Pooled engine running");
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), EngineError> {
        let command = Command::publish(channel, payload.to_vec());
        match self.dispatch_for("publish", channel, command).await? {
            Reply::Ok => Ok(()),
            other => Err(operation_error("publish", channel, unexpected_reply(&other))),
        }
    }

    async fn subscribe(&self, channel: &str) -> Result<(), EngineError> {
        let command = Command::subscribe(channel);
        match self.dispatch_for("subscribe", channel, command).await? {
            Reply::Ok => Ok(()),
            other => Err(operation_error(
                "subscribe",
                channel,
                unexpected_reply(&other),
            )),
        }
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), EngineError> {
        let command = Command::unsubscribe(channel);
        match self.dispatch_for("unsubscribe", channel, command).await? {
            Reply::Ok => Ok(()),
            other => Err(operation_error(
                "unsubscribe",
                channel,
                unexpected_reply(&other),
            )),
        }
    }

    async fn add_presence(
        &self,
        channel: &str,
        conn_id: &str,
        info: ClientInfo,
    ) -> Result<(), EngineError> {
        let command = Command::AddPresence {
            channel: channel.to_string(),
            conn_id: conn_id.to_string(),
            info,
            ttl_ms: self.presence_ttl.as_millis() as u64,
        };
        match self.dispatch_for("add_presence", channel, command).await? {
            Reply::Ok => Ok(()),
            other => Err(operation_error(
                "add_presence",
                channel,
                unexpected_reply(&other),
            )),
        }
    }

    async fn remove_presence(&self, channel: &str, conn_id: &str) -> Result<(), EngineError> {
        let command = Command::RemovePresence {
            channel: channel.to_string(),
            conn_id: conn_id.to_string(),
        };
        match self
            .dispatch_for("remove_presence", channel, command)
            .await?
        {
            Reply::Ok => Ok(()),
            other => Err(operation_error(
                "remove_presence",
                channel,
                unexpected_reply(&other),
            )),
        }
    }

    async fn presence(&self, channel: &str) -> Result<HashMap<ConnId, ClientInfo>, EngineError> {
        let command = Command::Presence {
            channel: channel.to_string(),
        };
        match self.dispatch_for("presence", channel, command).await? {
            Reply::Presence { members } => Ok(members),
            other => Err(operation_error(
                "presence",
                channel,
                unexpected_reply(&other),
            )),
        }
    }

    async fn add_history(
        &self,
        channel: &str,
        message: Message,
        size: usize,
        lifetime: Duration,
    ) -> Result<(), EngineError> {
        let command = Command::AddHistory {
            channel: channel.to_string(),
            message,
            size: size as u64,
            lifetime_ms: lifetime.as_millis() as u64,
        };
        match self.dispatch_for("add_history", channel, command).await? {
            Reply::Ok => Ok(()),
            other => Err(operation_error(
                "add_history",
                channel,
                unexpected_reply(&other),
            )),
        }
    }

    async fn history(&self, channel: &str) -> Result<Vec<Message>, EngineError> {
        let command = Command::History {
            channel: channel.to_string(),
        };
        match self.dispatch_for("history", channel, command).await? {
            Reply::History { messages } => Ok(messages),
            other => Err(operation_error(
                "history",
                channel,
                unexpected_reply(&other),
            )),
        }
    }

    async fn channels(&self) -> Result<Vec<ChannelId>, EngineError> {
        match self.dispatch_for("channels", "*", Command::Channels).await? {
            Reply::Channels { channels } => Ok(channels),
            other => Err(operation_error("channels", "*", unexpected_reply(&other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// A backend whose connections never answer.
    struct StallBackend;

    struct StallConn;

    #[async_trait]
    impl BackendConn for StallConn {
        async fn call(&self, _command: Command) -> Result<Reply, BackendError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Reply::Ok)
        }

        fn is_open(&self) -> bool {
            true
        }
    }

    #[async_trait]
    impl Backend for StallBackend {
        type Conn = StallConn;
        type Options = ();

        async fn connect(_address: &str, _options: &()) -> Result<Self::Conn, BackendError> {
            Ok(StallConn)
        }

        fn name() -> &'static str {
            "stall"
        }
    }

    /// A backend whose connections reject everything.
    struct RejectBackend;

    struct RejectConn;

    #[async_trait]
    impl BackendConn for RejectConn {
        async fn call(&self, _command: Command) -> Result<Reply, BackendError> {
            Ok(Reply::error(100, "internal server error"))
        }

        fn is_open(&self) -> bool {
            true
        }
    }

    #[async_trait]
    impl Backend for RejectBackend {
        type Conn = RejectConn;
        type Options = ();

        async fn connect(_address: &str, _options: &()) -> Result<Self::Conn, BackendError> {
            Ok(RejectConn)
        }

        fn name() -> &'static str {
            "reject"
        }
    }

    fn engine_config<O>(pool_size: usize, options: O, op_timeout: Duration) -> EngineConfig<O> {
        let mut config = EngineConfig::new(PoolConfig {
            address: "test:0".into(),
            pool_size,
            options,
        });
        config.op_timeout = op_timeout;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_call_surfaces_as_cancelled() {
        let engine =
            PooledEngine::<StallBackend>::connect(engine_config(1, (), Duration::from_millis(50)))
                .await
                .unwrap();

        let result = engine.subscribe("news").await;
        match result {
            Err(EngineError::Cancelled { op, channel }) => {
                assert_eq!(op, "subscribe");
                assert_eq!(channel, "news");
            }
            other => panic!("Expected Cancelled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejection_surfaces_as_operation_error() {
        let engine =
            PooledEngine::<RejectBackend>::connect(engine_config(1, (), DEFAULT_OP_TIMEOUT))
                .await
                .unwrap();

        match engine.history("news").await {
            Err(EngineError::History { op, channel, .. }) => {
                assert_eq!(op, "history");
                assert_eq!(channel, "news");
            }
            other => panic!("Expected History error, got {other:?}"),
        }

        // A rejected publish and a rejected presence read map to their own
        // variants, so the caller can pick a retry policy per operation.
        assert!(matches!(
            engine.publish("news", Bytes::new()).await,
            Err(EngineError::Publish { .. })
        ));
        assert!(matches!(
            engine.presence("news").await,
            Err(EngineError::Presence { .. })
        ));
        assert!(matches!(
            engine.channels().await,
            Err(EngineError::List { .. })
        ));
    }

    #[tokio::test]
    async fn test_fail_fast_construction() {
        let result =
            PooledEngine::<StallBackend>::connect(engine_config(0, (), DEFAULT_OP_TIMEOUT)).await;
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }
}
