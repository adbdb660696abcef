//! # beacon-backend
//!
//! Backend connection abstraction and the pool-backed engine for Beacon.
//!
//! A backend is anything that can serve the Beacon command protocol over
//! physical connections. This crate defines the seam ([`Backend`],
//! [`BackendConn`]), the round-robin [`ConnectionPool`] that shares a fixed
//! set of connections between all operations, and the [`PooledEngine`] that
//! implements the engine contract on top of them. The [`LoopbackBackend`]
//! serves commands from an in-process hub for tests and single-process
//! deployments.
//!
//! ## Example
//!
//! ```rust,no_run
//! use beacon_backend::{EngineConfig, LoopbackBackend, LoopbackOptions, PoolConfig, PooledEngine};
//! use beacon_core::{Engine, MemoryEngine};
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), beacon_core::EngineError> {
//! let (sink, _deliveries) = mpsc::unbounded_channel::<(String, bytes::Bytes)>();
//! let hub = MemoryEngine::new(Arc::new(sink));
//!
//! let engine = PooledEngine::<LoopbackBackend>::connect(EngineConfig::new(PoolConfig {
//!     address: "loopback:".into(),
//!     pool_size: 4,
//!     options: LoopbackOptions { hub },
//! }))
//! .await?;
//!
//! engine.subscribe("chat:lobby").await?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod loopback;
pub mod pool;
pub mod traits;

pub use engine::{EngineConfig, PooledEngine, DEFAULT_OP_TIMEOUT, DEFAULT_PRESENCE_TTL};
pub use loopback::{LoopbackBackend, LoopbackConn, LoopbackOptions};
pub use pool::{ConnectionPool, PoolConfig, PoolError};
pub use traits::{Backend, BackendConn, BackendError};
