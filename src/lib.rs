/*!
# PQC Lab

A post-quantum cryptography readiness lab built on the NIST ML-KEM (FIPS 203)
and ML-DSA (FIPS 204) algorithms.

## Overview

- An algorithm catalog with wire codes, NIST levels and key lengths
- A provider binding over liboqs, loaded at runtime, or the builtin PQClean code
- Key generation, raw key files and detached signatures
- A mutually authenticated KEM handshake with signed transcripts
- A ChaCha20-Poly1305 channel keyed from the handshake
- A benchmark harness with JSON, text and CSV reports

## Example

```no_run
use std::sync::Arc;
use pqc_lab::{AlgorithmKind, KeyManager, LabConfig, PqcContext, Result};

fn main() -> Result<()> {
    let config = LabConfig::load(None)?;
    let ctx = PqcContext::load(&config.provider_settings())?;
    let keys = KeyManager::new(ctx.clone());

    let identity = keys.generate(AlgorithmKind::Dsa, "mldsa65")?;
    let signature = ctx.sig_sign(identity.spec(), b"hello", &identity.secret)?;
    assert!(ctx.sig_verify(identity.spec(), b"hello", signature.as_bytes(), identity.public.as_bytes())?);
    Ok(())
}
```
*/

// Catalog, providers, keys, wire format and handshake state machines
pub mod core;

// Sockets, framing and the secure channel
pub mod protocol;

// Benchmark harness and reports
pub mod bench;

// Command-line front end
pub mod cli;

pub use self::core::config::LabConfig;
pub use self::core::constants::VERSION;
pub use self::core::crypto::{
    AlgorithmKind, AlgorithmSpec, Keypair, PqcContext, Provider, ProviderSettings, PublicKey, SecretKey,
    SharedSecret, Signature,
};
pub use self::core::error::{AuthError, CryptoError, Error, Result};
pub use self::core::keys::{KeyLayout, KeyManager};
pub use self::core::session::{EstablishedSession, HandshakeConfig, HandshakeState, Initiator, Responder, Role};
pub use self::protocol::{CancellationToken, Connection, FramedTransport, PqcClient, PqcServer, SecureChannel, Transport};
