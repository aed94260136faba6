/*!
Message types for the handshake protocol.

Every frame payload starts with a one-byte message type and the one-byte
protocol version, followed by the type-specific body.
*/

use std::fmt;

use crate::core::{
    constants::VERSION,
    error::{Error, Result},
};

/// Size of the type and version bytes in front of every body
pub const PAYLOAD_HEADER_SIZE: usize = 2;

/// Protocol message types
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Initiator's offer
    ClientHello = 0x01,
    /// Responder's choice, ephemeral KEM key and signature
    ServerHello = 0x02,
    /// Initiator's ciphertext and signature
    ClientFinish = 0x03,
    /// Secure channel record
    Data = 0x04,
    /// Orderly shutdown of the secure channel
    Close = 0x05,
}

impl MessageType {
    /// Convert a u8 value to a MessageType
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(MessageType::ClientHello),
            0x02 => Some(MessageType::ServerHello),
            0x03 => Some(MessageType::ClientFinish),
            0x04 => Some(MessageType::Data),
            0x05 => Some(MessageType::Close),
            _ => None,
        }
    }

    /// Get the u8 value of this MessageType
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::ClientHello => write!(f, "ClientHello"),
            MessageType::ServerHello => write!(f, "ServerHello"),
            MessageType::ClientFinish => write!(f, "ClientFinish"),
            MessageType::Data => write!(f, "Data"),
            MessageType::Close => write!(f, "Close"),
        }
    }
}

/// Prefix `body` with the type and version bytes
pub fn encode_payload(msg_type: MessageType, body: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(PAYLOAD_HEADER_SIZE + body.len());
    payload.push(msg_type.as_u8());
    payload.push(VERSION);
    payload.extend_from_slice(body);
    payload
}

/// Split a payload into its type and body, checking the version
pub fn split_payload(payload: &[u8]) -> Result<(MessageType, &[u8])> {
    if payload.len() < PAYLOAD_HEADER_SIZE {
        return Err(Error::InvalidFormat("Payload too short for message header".into()));
    }
    let msg_type = MessageType::from_u8(payload[0])
        .ok_or_else(|| Error::InvalidFormat(format!("Invalid message type: {}", payload[0])))?;
    if payload[1] != VERSION {
        return Err(Error::UnsupportedVersion(payload[1]));
    }
    Ok((msg_type, &payload[PAYLOAD_HEADER_SIZE..]))
}

/// Split a payload and require a particular type
pub fn expect_payload(payload: &[u8], expected: MessageType) -> Result<&[u8]> {
    let (msg_type, body) = split_payload(payload)?;
    if msg_type != expected {
        return Err(Error::Protocol(format!("expected {}, received {}", expected, msg_type)));
    }
    Ok(body)
}
