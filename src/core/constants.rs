/*!
Constants for the PQC lab.

This module contains protocol constants, framing limits and the
defaults shared by the configuration layer and the CLI.
*/

use std::time::Duration;

/// Handshake protocol version
pub const VERSION: u8 = 0x01;

/// Size of a handshake nonce in bytes
pub const NONCE_SIZE: usize = 32;

/// Size of the transcript hash (SHA-256) in bytes
pub const TRANSCRIPT_HASH_SIZE: usize = 32;

/// Size of the length prefix in front of every frame
pub const FRAME_HEADER_SIZE: usize = 4;

/// Largest payload a single frame may carry (64KB)
pub const MAX_FRAME_SIZE: usize = 65_536;

/// Size constants for derived keys and the secure channel
pub mod sizes {
    /// Size of the HKDF-derived session key in bytes
    pub const SESSION_KEY_SIZE: usize = 32;

    /// ChaCha20-Poly1305 constants
    pub mod chacha {
        /// Size of ChaCha20-Poly1305 authentication tag in bytes
        pub const TAG_SIZE: usize = 16;

        /// Size of ChaCha20-Poly1305 nonce in bytes
        pub const NONCE_SIZE: usize = 12;

        /// Size of ChaCha20-Poly1305 key in bytes
        pub const KEY_SIZE: usize = 32;
    }
}

/// Salt for the HKDF that turns a shared secret into the session key
pub const HKDF_SALT: &[u8] = b"PQC-Lab-v1-Session";

/// Info string for the session key
pub const HKDF_INFO_SESSION: &[u8] = b"pqc-lab session key";

/// Info string for the initiator-to-responder channel key
pub const HKDF_INFO_I2R: &[u8] = b"pqc-lab channel i2r";

/// Info string for the responder-to-initiator channel key
pub const HKDF_INFO_R2I: &[u8] = b"pqc-lab channel r2i";

/// Domain separator prefixed to the responder's ServerHello signature input
pub const SERVER_SIGNATURE_CONTEXT: &[u8] = b"pqc-lab server hello";

/// Domain separator prefixed to the initiator's ClientFinish signature input
pub const CLIENT_SIGNATURE_CONTEXT: &[u8] = b"pqc-lab client finish";

/// Configuration defaults
pub mod defaults {
    use super::Duration;

    /// Default KEM algorithm
    pub const KEM: &str = "ML-KEM-768";

    /// Default DSA algorithm
    pub const DSA: &str = "ML-DSA-65";

    /// Default host for network operations
    pub const HOST: &str = "127.0.0.1";

    /// Default port for network operations
    pub const PORT: u16 = 5555;

    /// Default per-message handshake timeout
    pub const TIMEOUT: Duration = Duration::from_secs(30);

    /// Default benchmark iterations
    pub const BENCH_ITERATIONS: usize = 100;

    /// Default unmeasured warm-up iterations
    pub const BENCH_WARMUP: usize = 10;

    /// Directory for generated artifacts
    pub const ARTIFACTS_DIR: &str = "artifacts";

    /// Prefix for generated key files
    pub const KEY_PREFIX: &str = "pqc";

    /// Extension for public key files
    pub const PUBLIC_KEY_EXTENSION: &str = ".pub";

    /// Extension for private key files
    pub const PRIVATE_KEY_EXTENSION: &str = ".priv";

    /// Extension for signature files
    pub const SIGNATURE_EXTENSION: &str = ".sig";

    /// Message the handshake client sends over the secure channel
    pub const CLIENT_MESSAGE: &str = "Hello PQC!";
}
