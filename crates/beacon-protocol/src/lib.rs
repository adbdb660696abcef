//! # beacon-protocol
//!
//! Wire protocol definitions for the Beacon engine layer.
//!
//! This crate defines what crosses the boundary between the engine and its
//! backends: the stored message envelope, the command/reply protocol, and
//! the framing codec.
//!
//! ## Wire shapes
//!
//! - [`Message`] / [`ClientInfo`] - the JSON envelope stored in history and
//!   attached to presence entries; round-trips field-for-field
//! - [`Command`] / [`Reply`] - one engine operation, one command, one
//!   backend round trip
//!
//! ## Example
//!
//! ```rust
//! use beacon_protocol::{codec, Command};
//!
//! let command = Command::publish("chat:lobby", b"Hello, world!".to_vec());
//!
//! // Encode and decode
//! let encoded = codec::encode(&command).unwrap();
//! let decoded: Command = codec::decode(&encoded).unwrap();
//! ```

pub mod codec;
pub mod command;
pub mod envelope;

pub use codec::{decode, encode, ProtocolError};
pub use command::{Command, Reply};
pub use envelope::{ClientInfo, Message};
