//! # beacon-core
//!
//! Engine contract and in-memory engine for the Beacon pub/sub backend
//! layer.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Engine** - The uniform capability surface (publish, subscribe,
//!   presence, history, channels) every backend must satisfy
//! - **MemoryEngine** - The reference in-process implementation
//! - **PresenceTracker** - Ephemeral per-channel presence with TTL expiry
//! - **HistoryBuffer** - Bounded, time-limited message log per channel
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │ Application │────▶│   Engine    │────▶│   Backend    │
//! └─────────────┘     └─────────────┘     └──────────────┘
//!                            │
//!                     ┌──────┴──────┐
//!                     ▼             ▼
//!              ┌────────────┐ ┌────────────┐
//!              │  Presence  │ │  History   │
//!              └────────────┘ └────────────┘
//! ```
//!
//! The application routes client traffic and calls the engine; the engine
//! makes channel state durable. Which backend sits behind the engine is
//! invisible to the application.

pub mod channel;
pub mod engine;
pub mod history;
pub mod memory;
pub mod presence;

pub use channel::{validate_channel_name, ChannelId, ConnId, MAX_CHANNEL_NAME_LENGTH};
pub use engine::{Cause, Engine, EngineError, MessageSink};
pub use history::HistoryBuffer;
pub use memory::{MemoryConfig, MemoryEngine};
pub use presence::{PresenceEntry, PresenceTracker};
