//! Networked handshake drivers.
//!
//! This module runs the session state machines over framed blocking
//! transports and provides the encrypted channel used afterwards.

// Cooperative cancellation
pub mod cancel;

// Framed transport with receive deadlines
pub mod transport;

// Encrypted records after the handshake
pub mod channel;

// Initiator driver
pub mod client;

// Responder driver
pub mod server;

// Re-export for convenience
pub use cancel::CancellationToken;
pub use channel::SecureChannel;
pub use client::PqcClient;
pub use server::{Connection, PqcServer};
pub use transport::{FramedTransport, Transport};
