/*!
Handshake sessions.

[`Initiator`] and [`Responder`] are sans-IO state machines: they consume and
produce message payloads and never touch a socket. The drivers in
[`crate::protocol`] move payloads over a framed transport and enforce
timeouts and cancellation.

Both roles share a [`HandshakeConfig`]: the long-term DSA identity, the
pinned DSA public key of the peer and the algorithm preferences. Sessions
only ever read the configuration, so one `Arc`-held identity can serve many
concurrent handshakes.
*/

pub mod initiator;
pub mod responder;
pub mod state;
pub mod transcript;

use std::fmt;
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::core::{
    config::AlgorithmConfig,
    constants::{sizes::SESSION_KEY_SIZE, TRANSCRIPT_HASH_SIZE},
    crypto::{
        registry::{self, AlgorithmKind},
        AlgorithmSpec, Keypair, PqcContext, PublicKey, SharedSecret,
    },
    error::Result,
};

pub use initiator::Initiator;
pub use responder::Responder;
pub use state::{FailureReason, HandshakeState, Role, StateManager};
pub use transcript::Transcript;

/// Identity, pinned peer key and algorithm preferences for one endpoint
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    kem_algorithms: Vec<&'static AlgorithmSpec>,
    dsa_algorithms: Vec<&'static AlgorithmSpec>,
    identity: Arc<Keypair>,
    peer_key: PublicKey,
}

impl HandshakeConfig {
    /// Offer every catalogued KEM and the identity's own DSA
    pub fn new(identity: Arc<Keypair>, peer_key: PublicKey) -> Result<Self> {
        identity.spec().require_dsa()?;
        peer_key.spec().require_dsa()?;
        let dsa_algorithms = vec![identity.spec()];
        Ok(Self {
            kem_algorithms: registry::list(AlgorithmKind::Kem),
            dsa_algorithms,
            identity,
            peer_key,
        })
    }

    /// Use the preference lists of the algorithm configuration
    pub fn from_algorithm_config(
        algorithms: &AlgorithmConfig,
        identity: Arc<Keypair>,
        peer_key: PublicKey,
    ) -> Result<Self> {
        let kem = resolve(AlgorithmKind::Kem, &algorithms.kem_algorithms)?;
        let dsa = resolve(AlgorithmKind::Dsa, &algorithms.dsa_algorithms)?;
        Self::new(identity, peer_key)?
            .with_kem_algorithms(kem)?
            .with_dsa_algorithms(dsa)
    }

    /// Replace the KEM preference list
    pub fn with_kem_algorithms(mut self, algorithms: Vec<&'static AlgorithmSpec>) -> Result<Self> {
        for spec in &algorithms {
            spec.require_kem()?;
        }
        self.kem_algorithms = algorithms;
        Ok(self)
    }

    /// Replace the DSA preference list
    pub fn with_dsa_algorithms(mut self, algorithms: Vec<&'static AlgorithmSpec>) -> Result<Self> {
        for spec in &algorithms {
            spec.require_dsa()?;
        }
        self.dsa_algorithms = algorithms;
        Ok(self)
    }

    pub fn kem_algorithms(&self) -> &[&'static AlgorithmSpec] {
        &self.kem_algorithms
    }

    pub fn dsa_algorithms(&self) -> &[&'static AlgorithmSpec] {
        &self.dsa_algorithms
    }

    pub fn identity(&self) -> &Keypair {
        &self.identity
    }

    pub fn peer_key(&self) -> &PublicKey {
        &self.peer_key
    }

    /// KEMs this endpoint can use with `ctx`, in preference order
    pub(crate) fn usable_kems(&self, ctx: &PqcContext) -> Vec<&'static AlgorithmSpec> {
        self.kem_algorithms
            .iter()
            .copied()
            .filter(|spec| ctx.is_supported(AlgorithmKind::Kem, spec.name))
            .collect()
    }

    /// DSAs this endpoint can use with `ctx`
    ///
    /// Both long-term keys are fixed, so only an algorithm matching the
    /// identity and the pinned peer key is usable.
    pub(crate) fn usable_dsas(&self, ctx: &PqcContext) -> Vec<&'static AlgorithmSpec> {
        self.dsa_algorithms
            .iter()
            .copied()
            .filter(|spec| {
                *spec == self.identity.spec()
                    && *spec == self.peer_key.spec()
                    && ctx.is_supported(AlgorithmKind::Dsa, spec.name)
            })
            .collect()
    }
}

fn resolve(kind: AlgorithmKind, names: &[String]) -> Result<Vec<&'static AlgorithmSpec>> {
    names.iter().map(|name| registry::lookup_kind(kind, name)).collect()
}

/// Result of a successful handshake
///
/// The shared secret and session key are wiped on drop.
pub struct EstablishedSession {
    role: Role,
    kem: &'static AlgorithmSpec,
    dsa: &'static AlgorithmSpec,
    transcript_hash: [u8; TRANSCRIPT_HASH_SIZE],
    shared_secret: SharedSecret,
    session_key: Zeroizing<[u8; SESSION_KEY_SIZE]>,
}

impl EstablishedSession {
    pub(crate) fn new(
        role: Role,
        kem: &'static AlgorithmSpec,
        dsa: &'static AlgorithmSpec,
        transcript_hash: [u8; TRANSCRIPT_HASH_SIZE],
        shared_secret: SharedSecret,
    ) -> Result<Self> {
        let session_key = transcript::derive_session_key(&transcript_hash, &shared_secret)?;
        Ok(Self {
            role,
            kem,
            dsa,
            transcript_hash,
            shared_secret,
            session_key,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Negotiated KEM
    pub fn kem(&self) -> &'static AlgorithmSpec {
        self.kem
    }

    /// Negotiated DSA
    pub fn dsa(&self) -> &'static AlgorithmSpec {
        self.dsa
    }

    /// H(ClientHello ‖ ServerHello)
    pub fn transcript_hash(&self) -> &[u8; TRANSCRIPT_HASH_SIZE] {
        &self.transcript_hash
    }

    pub fn shared_secret(&self) -> &SharedSecret {
        &self.shared_secret
    }

    /// HKDF-SHA256 of the shared secret, salted with the transcript hash
    pub fn session_key(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.session_key
    }
}

impl fmt::Debug for EstablishedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstablishedSession")
            .field("role", &self.role)
            .field("kem", &self.kem.name)
            .field("dsa", &self.dsa.name)
            .field("shared_secret", &"[REDACTED]")
            .finish()
    }
}
