/*!
Message handling for the handshake protocol.

This module provides the message types, the frame codec and the
handshake message bodies.
*/

pub mod frame;
pub mod handshake;
pub mod types;

// Re-export commonly used items
pub use handshake::{ClientFinish, ClientHello, ServerHello};
pub use types::{encode_payload, expect_payload, split_payload, MessageType};
