//! Backend abstraction traits.
//!
//! These traits define the interface that all backend implementations must
//! provide, allowing the engine to be backend-agnostic. A backend is
//! anything that can serve the command protocol over physical connections:
//! an in-process hub, a distributed cache, a persistent store.

use async_trait::async_trait;
use beacon_protocol::{Command, ProtocolError, Reply};
use thiserror::Error;

/// Backend errors.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// The connection was closed.
    #[error("Connection closed")]
    Closed,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The backend rejected the command.
    #[error("Backend rejected command: [{code}] {message}")]
    Rejected {
        /// Backend-defined error code.
        code: u16,
        /// Human-readable reason.
        message: String,
    },

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// A backend that can open connections.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Connection type produced by this backend.
    type Conn: BackendConn;

    /// Backend-specific connection options, opaque to the pool.
    type Options: Clone + Send + Sync;

    /// Open one physical connection to `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses or cannot be reached.
    async fn connect(address: &str, options: &Self::Options) -> Result<Self::Conn, BackendError>;

    /// Backend name (e.g. "loopback").
    fn name() -> &'static str;
}

/// One physical backend connection.
///
/// Connections are shared: the pool hands the same connection to multiple
/// concurrent callers and never serializes access. An implementation whose
/// underlying client cannot take concurrent calls must serialize them
/// internally; that choice sets the backend's concurrency ceiling.
#[async_trait]
pub trait BackendConn: Send + Sync + 'static {
    /// Issue one command and wait for its reply.
    ///
    /// One call is one backend round trip. Commands that must hold an
    /// invariant carry their bounds, so the backend applies them in a
    /// single atomic step; a connection never needs a second trip to
    /// finish a mutation.
    async fn call(&self, command: Command) -> Result<Reply, BackendError>;

    /// Check if the connection is still open.
    ///
    /// A stale connection is not replaced by the pool; its calls fail and
    /// the caller decides on retry.
    fn is_open(&self) -> bool;
}
