/*!
Initiator side of the handshake.
*/

use rand::RngCore;
use tracing::{debug, info};

use super::{
    state::{FailureReason, HandshakeState, Role, StateManager},
    transcript::{self, Transcript},
    EstablishedSession, HandshakeConfig,
};
use crate::core::{
    constants::NONCE_SIZE,
    crypto::{registry::AlgorithmKind, AlgorithmSpec, PqcContext},
    error::{AuthError, Error, Result},
    message::{ClientFinish, ClientHello, ServerHello},
};
use crate::{auth_err, protocol_err};

/// Sans-IO initiator
///
/// ```text
/// start()                 -> ClientHello payload
/// handle_server_hello(..) -> ClientFinish payload
/// finish_sent()           -> session established
/// ```
#[derive(Debug)]
pub struct Initiator {
    ctx: PqcContext,
    config: HandshakeConfig,
    state: StateManager,
    transcript: Transcript,
    offered_kem: Vec<&'static AlgorithmSpec>,
    offered_dsa: Vec<&'static AlgorithmSpec>,
    session: Option<EstablishedSession>,
}

impl Initiator {
    pub fn new(ctx: PqcContext, config: HandshakeConfig) -> Self {
        Self {
            ctx,
            config,
            state: StateManager::new(Role::Initiator),
            transcript: Transcript::new(),
            offered_kem: Vec::new(),
            offered_dsa: Vec::new(),
            session: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state.state()
    }

    /// Build the ClientHello
    pub fn start(&mut self) -> Result<Vec<u8>> {
        let result = self.build_client_hello();
        if let Err(err) = &result {
            self.fail(err);
        }
        result
    }

    /// Verify the ServerHello and build the ClientFinish
    ///
    /// The handshake stays in SendFinish until [`Initiator::finish_sent`]
    /// confirms the returned payload reached the transport.
    pub fn handle_server_hello(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let result = self.process_server_hello(payload);
        if let Err(err) = &result {
            self.fail(err);
        }
        result
    }

    /// Mark the ClientFinish as sent, establishing the session
    pub fn finish_sent(&mut self) -> Result<()> {
        let result = self.establish();
        if let Err(err) = &result {
            self.fail(err);
        }
        result
    }

    /// Abort the handshake, wiping everything derived so far
    pub fn fail(&mut self, error: &Error) {
        self.state.fail(FailureReason::from(error));
        self.session = None;
        self.transcript = Transcript::new();
    }

    /// The established session, once the handshake has completed
    pub fn into_session(self) -> Result<EstablishedSession> {
        match self.session {
            Some(session) if self.state.is_established() => Ok(session),
            _ => protocol_err!("handshake not established (state {})", self.state.state()),
        }
    }

    fn build_client_hello(&mut self) -> Result<Vec<u8>> {
        self.state.expect(HandshakeState::Start)?;

        self.offered_kem = self.config.usable_kems(&self.ctx);
        self.offered_dsa = self.config.usable_dsas(&self.ctx);
        if self.offered_kem.is_empty() {
            return Err(Error::NoCommonAlgorithm(AlgorithmKind::Kem));
        }
        if self.offered_dsa.is_empty() {
            return Err(Error::NoCommonAlgorithm(AlgorithmKind::Dsa));
        }

        let mut nonce = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce);
        let hello = ClientHello {
            kem_algorithms: self.offered_kem.iter().map(|s| s.code).collect(),
            dsa_algorithms: self.offered_dsa.iter().map(|s| s.code).collect(),
            nonce,
        };
        let payload = hello.encode()?;

        self.transcript.absorb(&payload);
        self.state.transition(HandshakeState::AwaitServerHello)?;
        debug!(
            kem = self.offered_kem.len(),
            dsa = self.offered_dsa.len(),
            "sending ClientHello"
        );
        Ok(payload)
    }

    fn process_server_hello(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        self.state.expect(HandshakeState::AwaitServerHello)?;

        let hello = ServerHello::decode(payload)?;
        let (kem, dsa) = (hello.kem, hello.dsa);
        if !self.offered_kem.contains(&kem) || !self.offered_dsa.contains(&dsa) {
            return auth_err!(AuthError::UnofferedAlgorithm);
        }
        if dsa != self.config.peer_key().spec() {
            return auth_err!(AuthError::PeerKeyMismatch);
        }

        let mut signed = self.transcript.clone();
        signed.absorb(&hello.encode_unsigned());
        let input = transcript::server_signature_input(&signed.hash());
        if !self
            .ctx
            .sig_verify(dsa, &input, &hello.signature, self.config.peer_key().as_bytes())?
        {
            return auth_err!(AuthError::SignatureVerificationFailed);
        }

        let encapsulated = self.ctx.kem_encapsulate(kem, &hello.kem_public_key)?;
        self.transcript.absorb(payload);
        self.state.transition(HandshakeState::SendFinish)?;

        let hash = self.transcript.hash();
        let signature = self.ctx.sig_sign(
            dsa,
            &transcript::client_signature_input(&hash, &encapsulated.ciphertext),
            &self.config.identity().secret,
        )?;
        let finish = ClientFinish {
            ciphertext: encapsulated.ciphertext,
            signature: signature.into_bytes(),
        }
        .encode()?;

        self.session = Some(EstablishedSession::new(
            Role::Initiator,
            kem,
            dsa,
            hash,
            encapsulated.shared_secret,
        )?);
        debug!(kem = kem.name, dsa = dsa.name, "sending ClientFinish");
        Ok(finish)
    }

    fn establish(&mut self) -> Result<()> {
        self.state.expect(HandshakeState::SendFinish)?;
        let Some(session) = &self.session else {
            return protocol_err!("no pending session in state {}", self.state.state());
        };
        info!(kem = session.kem().name, dsa = session.dsa().name, "handshake established");
        self.state.transition(HandshakeState::Established)
    }
}
