//! Core components for the PQC lab.
//!
//! This module contains the algorithm catalog and provider binding, key
//! material management, the handshake messages and state machines,
//! configuration, logging and error handling.

// Cryptographic catalog, provider binding and key material
pub mod crypto;

// Key generation and key files
pub mod keys;

// Handshake message formats
pub mod message;

// Handshake state machines
pub mod session;

// Layered configuration
pub mod config;

// Tracing subscriber setup
pub mod logging;

// Protocol constants
pub mod constants;

// Error handling
pub mod error;

// Re-exports for convenience
pub use self::config::LabConfig;
pub use self::constants::VERSION;
pub use self::error::{AuthError, CryptoError, Error, Result};
pub use self::message::MessageType;
pub use self::session::{HandshakeState, Role};
