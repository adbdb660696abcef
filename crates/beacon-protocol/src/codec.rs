//! Codec for encoding and decoding protocol values.
//!
//! This module provides JSON-based serialization with length-prefixed
//! framing, shared by commands, replies, and stored envelopes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Maximum frame size (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Length prefix size in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// Not enough data to decode a frame.
    #[error("Incomplete frame: need {0} more bytes")]
    Incomplete(usize),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid frame data.
    #[error("Invalid frame: {0}")]
    Invalid(String),
}

/// Encode a value to bytes.
///
/// The encoded format is:
/// - 4 bytes: Big-endian length prefix
/// - N bytes: JSON-encoded body
///
/// # Errors
///
/// Returns an error if the value is too large or encoding fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Bytes, ProtocolError> {
    let body = serde_json::to_vec(value)?;

    if body.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(body.len()));
    }

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + body.len());
    buf.put_u32(body.len() as u32);
    buf.extend_from_slice(&body);

    Ok(buf.freeze())
}

/// Encode a value into an existing buffer.
///
/// # Errors
///
/// Returns an error if the value is too large or encoding fails.
pub fn encode_into<T: Serialize>(value: &T, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    let body = serde_json::to_vec(value)?;

    if body.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(body.len()));
    }

    buf.reserve(LENGTH_PREFIX_SIZE + body.len());
    buf.put_u32(body.len() as u32);
    buf.extend_from_slice(&body);

    Ok(())
}

/// Decode a value from bytes.
///
/// # Errors
///
/// Returns an error if the data is incomplete, too large, or invalid.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.len() < LENGTH_PREFIX_SIZE {
        return Err(ProtocolError::Incomplete(LENGTH_PREFIX_SIZE - data.len()));
    }

    let length = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;

    if length > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(length));
    }

    let total_size = LENGTH_PREFIX_SIZE + length;
    if data.len() < total_size {
        return Err(ProtocolError::Incomplete(total_size - data.len()));
    }

    let value = serde_json::from_slice(&data[LENGTH_PREFIX_SIZE..total_size])?;
    Ok(value)
}

/// Try to decode a value from a buffer, advancing it if successful.
///
/// Returns `Ok(Some(value))` if a complete frame was decoded,
/// `Ok(None)` if more data is needed, or `Err` on protocol error.
///
/// # Errors
///
/// Returns an error if the frame is too large or invalid.
pub fn decode_from<T: DeserializeOwned>(buf: &mut BytesMut) -> Result<Option<T>, ProtocolError> {
    if buf.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

    if length > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(length));
    }

    let total_size = LENGTH_PREFIX_SIZE + length;
    if buf.len() < total_size {
        return Ok(None);
    }

    buf.advance(LENGTH_PREFIX_SIZE);
    let body = buf.split_to(length);
    let value = serde_json::from_slice(&body)?;

    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, Reply};
    use crate::envelope::{ClientInfo, Message};
    use serde_json::json;

    #[test]
    fn test_encode_decode_roundtrip() {
        let info = ClientInfo::new("1", "conn-1");
        let commands = vec![
            Command::publish("chat:room", b"Hello, world!".to_vec()),
            Command::subscribe("news"),
            Command::unsubscribe("news"),
            Command::AddPresence {
                channel: "chat:room".into(),
                conn_id: "conn-1".into(),
                info: info.clone(),
                ttl_ms: 60_000,
            },
            Command::AddHistory {
                channel: "chat:room".into(),
                message: Message::new("chat:room", json!({"text": "hi"}), info),
                size: 10,
                lifetime_ms: 30_000,
            },
            Command::Channels,
        ];

        for command in commands {
            let encoded = encode(&command).unwrap();
            let decoded: Command = decode(&encoded).unwrap();
            assert_eq!(command, decoded);
        }
    }

    #[test]
    fn test_decode_incomplete() {
        let encoded = encode(&Command::subscribe("test")).unwrap();

        let partial = &encoded[..5];
        match decode::<Command>(partial) {
            Err(ProtocolError::Incomplete(_)) => {}
            other => panic!("Expected Incomplete error, got {:?}", other),
        }
    }

    #[test]
    fn test_frame_too_large() {
        let large_payload = vec![0u8; MAX_FRAME_SIZE + 1];
        let command = Command::publish("test", large_payload);

        match encode(&command) {
            Err(ProtocolError::FrameTooLarge(_)) => {}
            other => panic!("Expected FrameTooLarge error, got {:?}", other),
        }
    }

    #[test]
    fn test_streaming_decode() {
        let reply1 = Reply::Ok;
        let reply2 = Reply::Channels {
            channels: vec!["news".into()],
        };

        let mut buf = BytesMut::new();
        encode_into(&reply1, &mut buf).unwrap();
        encode_into(&reply2, &mut buf).unwrap();

        let decoded1: Reply = decode_from(&mut buf).unwrap().unwrap();
        let decoded2: Reply = decode_from(&mut buf).unwrap().unwrap();

        assert_eq!(reply1, decoded1);
        assert_eq!(reply2, decoded2);
        assert!(buf.is_empty());

        // A drained buffer needs more data, not an error
        assert!(decode_from::<Reply>(&mut buf).unwrap().is_none());
    }
}
