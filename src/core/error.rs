/*!
Error handling for the PQC lab.

Every fallible operation in the crate returns [`Result`]. Errors raised by the
provider binding and the key manager carry the operation, algorithm and the
expected and actual lengths involved; handshake failures are terminal for the
session that produced them.
*/

use std::fmt;
use std::io;
use thiserror::Error;

use crate::core::crypto::registry::AlgorithmKind;

/// Result type for the PQC lab
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the PQC lab
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// No usable cryptographic provider was found
    #[error("No usable cryptographic provider: {0}")]
    ProviderUnavailable(String),

    /// The provider disagrees with the algorithm catalog
    #[error("Provider does not match the algorithm catalog: {0}")]
    ProviderMismatch(String),

    /// Name or code is not in the algorithm catalog
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Catalogued, but not compiled into the loaded provider
    #[error("Algorithm {0} is not supported by the loaded provider")]
    UnsupportedAlgorithm(String),

    /// Caller supplied a buffer of the wrong size
    #[error("Invalid {role} length for {algorithm}: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        role: BufferRole,
        algorithm: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The provider reported failure
    #[error("Provider operation {operation} failed for {algorithm}")]
    ProviderOperationFailed {
        operation: Operation,
        algorithm: &'static str,
    },

    /// A persisted key or signature file has the wrong size
    #[error("Length mismatch in {path}: expected {expected} bytes, found {actual}")]
    LengthMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },

    /// Authentication error (limited details for security)
    #[error("Authentication failed")]
    Authentication(#[source] AuthError),

    /// Negotiation found no algorithm both peers support
    #[error("No common {0} algorithm")]
    NoCommonAlgorithm(AlgorithmKind),

    /// Timeout error
    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    /// The handshake was aborted by its caller
    #[error("Handshake cancelled")]
    Cancelled,

    /// The peer closed the connection mid-handshake
    #[error("Peer closed the connection")]
    PeerClosed,

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid message format
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    /// Unsupported protocol version
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Secure channel error (limited details for security)
    #[error("Cryptographic operation failed")]
    Crypto(#[source] CryptoError),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Which buffer a length check was applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRole {
    PublicKey,
    SecretKey,
    Ciphertext,
    SharedSecret,
    Signature,
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferRole::PublicKey => write!(f, "public key"),
            BufferRole::SecretKey => write!(f, "secret key"),
            BufferRole::Ciphertext => write!(f, "ciphertext"),
            BufferRole::SharedSecret => write!(f, "shared secret"),
            BufferRole::Signature => write!(f, "signature"),
        }
    }
}

/// Provider operation named in [`Error::ProviderOperationFailed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    KemKeypair,
    KemEncapsulate,
    KemDecapsulate,
    SigKeypair,
    SigSign,
    SigVerify,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::KemKeypair => write!(f, "kem-keypair"),
            Operation::KemEncapsulate => write!(f, "kem-encapsulate"),
            Operation::KemDecapsulate => write!(f, "kem-decapsulate"),
            Operation::SigKeypair => write!(f, "sig-keypair"),
            Operation::SigSign => write!(f, "sig-sign"),
            Operation::SigVerify => write!(f, "sig-verify"),
        }
    }
}

/// Authentication errors with limited details to prevent leaking information
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Signature verification failed
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// The pinned peer key does not belong to the negotiated algorithm
    #[error("Pinned peer key does not match the negotiated algorithm")]
    PeerKeyMismatch,

    /// The responder chose an algorithm that was never offered
    #[error("Peer selected an algorithm that was not offered")]
    UnofferedAlgorithm,
}

/// Secure channel errors with limited details to prevent leaking information
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// Generic encryption error
    #[error("Encryption failed")]
    EncryptionFailed,

    /// Generic decryption error
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Key derivation error
    #[error("Key derivation failed")]
    KeyDerivationFailed,

    /// The 64-bit message counter is exhausted
    #[error("Nonce counter exhausted")]
    NonceExhausted,
}

impl Error {
    /// Process exit code used by the CLI for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Io(_) => 2,
            Error::ProviderUnavailable(_) | Error::ProviderMismatch(_) => 3,
            Error::UnknownAlgorithm(_) | Error::UnsupportedAlgorithm(_) => 4,
            Error::InvalidKeyLength { .. } | Error::LengthMismatch { .. } => 5,
            Error::ProviderOperationFailed { .. } | Error::Crypto(_) => 6,
            Error::Authentication(_) => 7,
            Error::NoCommonAlgorithm(_) => 8,
            Error::Timeout(_) | Error::Cancelled | Error::PeerClosed => 9,
            Error::Protocol(_) | Error::InvalidFormat(_) | Error::UnsupportedVersion(_) => 10,
            Error::Config(_) => 11,
        }
    }

    /// Whether the error came from a timed-out read or write
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Config(error.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::InvalidFormat(error.to_string())
    }
}

/// Convert from Error to io::Error (for compatibility)
impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Io(io_error) => io_error,
            Error::Timeout(ms) => io::Error::new(
                io::ErrorKind::TimedOut,
                format!("Operation timed out after {} ms", ms),
            ),
            Error::PeerClosed => io::Error::new(io::ErrorKind::UnexpectedEof, "Peer closed the connection"),
            Error::Authentication(_) => {
                io::Error::new(io::ErrorKind::PermissionDenied, "Authentication error")
            }
            Error::Crypto(_) => io::Error::new(io::ErrorKind::InvalidData, "Cryptographic error"),
            Error::InvalidKeyLength { .. }
            | Error::LengthMismatch { .. }
            | Error::Protocol(_)
            | Error::InvalidFormat(_)
            | Error::UnsupportedVersion(_) => io::Error::new(io::ErrorKind::InvalidData, error.to_string()),
            Error::ProviderUnavailable(_) | Error::UnsupportedAlgorithm(_) | Error::UnknownAlgorithm(_) => {
                io::Error::new(io::ErrorKind::Unsupported, error.to_string())
            }
            Error::NoCommonAlgorithm(_) => io::Error::new(io::ErrorKind::ConnectionRefused, error.to_string()),
            Error::Cancelled => io::Error::new(io::ErrorKind::Interrupted, "Handshake cancelled"),
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}

/// Create a protocol error
#[macro_export]
macro_rules! protocol_err {
    ($msg:expr) => {
        Err($crate::core::error::Error::Protocol($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        Err($crate::core::error::Error::Protocol(format!($fmt, $($arg)*)))
    };
}

/// Create an invalid-format error
#[macro_export]
macro_rules! format_err {
    ($msg:expr) => {
        Err($crate::core::error::Error::InvalidFormat($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        Err($crate::core::error::Error::InvalidFormat(format!($fmt, $($arg)*)))
    };
}

/// Create an authentication error
#[macro_export]
macro_rules! auth_err {
    ($err:expr) => {
        Err($crate::core::error::Error::Authentication($err))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Protocol("Test error".to_string());
        assert_eq!(format!("{}", err), "Protocol error: Test error");

        let err = Error::InvalidKeyLength {
            role: BufferRole::PublicKey,
            algorithm: "ML-KEM-768",
            expected: 1184,
            actual: 1183,
        };
        assert_eq!(
            format!("{}", err),
            "Invalid public key length for ML-KEM-768: expected 1184 bytes, got 1183"
        );

        let err = Error::Authentication(AuthError::SignatureVerificationFailed);
        assert_eq!(format!("{}", err), "Authentication failed");

        let err = Error::NoCommonAlgorithm(AlgorithmKind::Kem);
        assert_eq!(format!("{}", err), "No common KEM algorithm");
    }

    #[test]
    fn test_io_error_conversion() {
        let err = Error::Protocol("Test error".to_string());
        let io_err = io::Error::from(err);
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
        assert!(format!("{}", io_err).contains("Test error"));

        let io_err = io::Error::from(Error::Timeout(250));
        assert_eq!(io_err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_exit_codes_are_nonzero() {
        let errors = [
            Error::ProviderUnavailable("none".into()),
            Error::Authentication(AuthError::SignatureVerificationFailed),
            Error::Timeout(1),
            Error::Cancelled,
            Error::Config("bad".into()),
        ];
        for err in &errors {
            assert_ne!(err.exit_code(), 0, "{err}");
        }
    }
}
