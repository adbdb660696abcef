//! Round-robin connection pool.
//!
//! The pool owns a fixed set of physical backend connections and hands one
//! out per operation, so callers never know or care how many connections
//! exist. Construction is fail-fast: the pool either comes up with exactly
//! the requested size or not at all.

use crate::traits::{Backend, BackendConn, BackendError};
use beacon_core::EngineError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Pool errors.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Invalid pool configuration. Fatal at construction, never retried.
    #[error("Invalid pool configuration: {0}")]
    Configuration(String),

    /// A connection attempt failed during construction.
    #[error("Connection {index} to backend failed: {source}")]
    Connection {
        /// Index of the failed connection attempt.
        index: usize,
        /// Underlying cause.
        #[source]
        source: BackendError,
    },

    /// The pool holds zero connections.
    #[error("Connection pool is empty")]
    Empty,
}

impl From<PoolError> for EngineError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Configuration(msg) => EngineError::Configuration(msg),
            PoolError::Empty => EngineError::EmptyPool,
            err @ PoolError::Connection { .. } => EngineError::Connection(Box::new(err)),
        }
    }
}

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig<O> {
    /// Backend address every connection dials.
    pub address: String,
    /// Number of physical connections to open.
    pub pool_size: usize,
    /// Backend-specific options, opaque to the pool.
    pub options: O,
}

/// A fixed set of backend connections shared via round-robin selection.
pub struct ConnectionPool<C> {
    conns: Vec<Arc<C>>,
    cursor: AtomicUsize,
}

impl<C: BackendConn> ConnectionPool<C> {
    /// Wrap pre-built connections into a pool.
    #[must_use]
    pub fn new(conns: Vec<Arc<C>>) -> Self {
        Self {
            conns,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Open `pool_size` connections to the configured address.
    ///
    /// Fail-fast: a zero pool size is rejected before any connection
    /// attempt, and a failure at connection *i* discards connections
    /// `0..i` and surfaces the error. There is no partial pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Configuration`] for a zero pool size and
    /// [`PoolError::Connection`] for a failed connection attempt.
    pub async fn connect<B>(config: &PoolConfig<B::Options>) -> Result<Self, PoolError>
    where
        B: Backend<Conn = C>,
    {
        if config.pool_size == 0 {
            return Err(PoolError::Configuration(
                "Size of connection pool is zero".into(),
            ));
        }

        let mut conns = Vec::with_capacity(config.pool_size);
        for index in 0..config.pool_size {
            info!(
                index,
                address = %config.address,
                backend = B::name(),
                "Connecting to backend"
            );
            match B::connect(&config.address, &config.options).await {
                Ok(conn) => {
                    debug!(index, "Connected to backend");
                    conns.push(Arc::new(conn));
                }
                Err(source) => return Err(PoolError::Connection { index, source }),
            }
        }

        Ok(Self::new(conns))
    }

    /// Next connection in round-robin order.
    ///
    /// A single atomic fetch-add advances the shared cursor; taking the
    /// modulo afterwards keeps the slot lookup in bounds under any
    /// interleaving of concurrent callers.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Empty`] if the pool holds zero connections.
    pub fn acquire(&self) -> Result<Arc<C>, PoolError> {
        if self.conns.is_empty() {
            return Err(PoolError::Empty);
        }
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed) % self.conns.len();
        Ok(Arc::clone(&self.conns[slot]))
    }

    /// Number of connections in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conns.len()
    }

    /// Check if the pool holds no connections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}
