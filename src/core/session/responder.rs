/*!
Responder side of the handshake.

Negotiation is first-match over the initiator's ordered lists. The
responder's ephemeral KEM keypair lives only between ServerHello and
ClientFinish and is wiped once decapsulation is done or the handshake fails.
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
    crypto::{
        registry::{self, AlgorithmKind},
        AlgorithmSpec, Keypair, PqcContext,
    },
    error::{AuthError, Error, Result},
    message::{ClientFinish, ClientHello, ServerHello},
};
use crate::{auth_err, protocol_err};

/// Sans-IO responder
///
/// ```text
/// handle_client_hello(..)  -> ServerHello payload
/// handle_client_finish(..) -> session established
/// ```
#[derive(Debug)]
pub struct Responder {
    ctx: PqcContext,
    config: HandshakeConfig,
    state: StateManager,
    transcript: Transcript,
    negotiated: Option<(&'static AlgorithmSpec, &'static AlgorithmSpec)>,
    ephemeral: Option<Keypair>,
    session: Option<EstablishedSession>,
}

/// First entry of `offered` that resolves and is in `usable`
fn first_match(
    kind: AlgorithmKind,
    offered: &[u16],
    usable: &[&'static AlgorithmSpec],
) -> Result<&'static AlgorithmSpec> {
    offered
        .iter()
        .filter_map(|code| registry::by_code(kind, *code))
        .find(|spec| usable.contains(spec))
        .ok_or(Error::NoCommonAlgorithm(kind))
}

impl Responder {
    /// A responder waiting for a ClientHello
    pub fn new(ctx: PqcContext, config: HandshakeConfig) -> Result<Self> {
        let mut state = StateManager::new(Role::Responder);
        state.transition(HandshakeState::AwaitClientHello)?;
        Ok(Self {
            ctx,
            config,
            state,
            transcript: Transcript::new(),
            negotiated: None,
            ephemeral: None,
            session: None,
        })
    }

    pub fn state(&self) -> HandshakeState {
        self.state.state()
    }

    /// Negotiate and build the signed ServerHello
    ///
    /// [`Error::NoCommonAlgorithm`] means no reply should be sent.
    pub fn handle_client_hello(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let result = self.process_client_hello(payload);
        if let Err(err) = &result {
            self.fail(err);
        }
        result
    }

    /// Authenticate the initiator and recover the shared secret
    pub fn handle_client_finish(&mut self, payload: &[u8]) -> Result<()> {
        let result = self.process_client_finish(payload);
        if let Err(err) = &result {
            self.fail(err);
        }
        result
    }

    /// Abort the handshake, wiping the ephemeral key and anything derived
    pub fn fail(&mut self, error: &Error) {
        self.state.fail(FailureReason::from(error));
        self.ephemeral = None;
        self.session = None;
        self.negotiated = None;
        self.transcript = Transcript::new();
    }

    /// The established session, once the handshake has completed
    pub fn into_session(self) -> Result<EstablishedSession> {
        match self.session {
            Some(session) if self.state.is_established() => Ok(session),
            _ => protocol_err!("handshake not established (state {})", self.state.state()),
        }
    }

    fn process_client_hello(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        self.state.expect(HandshakeState::AwaitClientHello)?;

        let hello = ClientHello::decode(payload)?;
        let kem = first_match(AlgorithmKind::Kem, &hello.kem_algorithms, &self.config.usable_kems(&self.ctx))?;
        let dsa = first_match(AlgorithmKind::Dsa, &hello.dsa_algorithms, &self.config.usable_dsas(&self.ctx))?;
        debug!(kem = kem.name, dsa = dsa.name, "negotiated algorithms");

        self.transcript.absorb(payload);
        let ephemeral = self.ctx.kem_keypair(kem)?;

        let mut nonce = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce);
        let mut reply = ServerHello {
            kem,
            dsa,
            kem_public_key: ephemeral.public.as_bytes().to_vec(),
            nonce,
            signature: Vec::new(),
        };

        let mut signed = self.transcript.clone();
        signed.absorb(&reply.encode_unsigned());
        reply.signature = self
            .ctx
            .sig_sign(
                dsa,
                &transcript::server_signature_input(&signed.hash()),
                &self.config.identity().secret,
            )?
            .into_bytes();
        let payload = reply.encode()?;

        self.transcript.absorb(&payload);
        self.negotiated = Some((kem, dsa));
        self.ephemeral = Some(ephemeral);
        self.state.transition(HandshakeState::AwaitClientFinish)?;
        Ok(payload)
    }

    fn process_client_finish(&mut self, payload: &[u8]) -> Result<()> {
        self.state.expect(HandshakeState::AwaitClientFinish)?;
        let Some((kem, dsa)) = self.negotiated else {
            return protocol_err!("no negotiated algorithms");
        };

        let finish = ClientFinish::decode(payload, kem)?;
        let hash = self.transcript.hash();
        let input = transcript::client_signature_input(&hash, &finish.ciphertext);
        if !self
            .ctx
            .sig_verify(dsa, &input, &finish.signature, self.config.peer_key().as_bytes())?
        {
            return auth_err!(AuthError::SignatureVerificationFailed);
        }

        let Some(ephemeral) = self.ephemeral.take() else {
            return protocol_err!("ephemeral key already consumed");
        };
        let shared_secret = self.ctx.kem_decapsulate(kem, &finish.ciphertext, &ephemeral.secret)?;
        drop(ephemeral);

        let session = EstablishedSession::new(Role::Responder, kem, dsa, hash, shared_secret)?;
        self.state.transition(HandshakeState::Established)?;
        self.session = Some(session);
        info!(kem = kem.name, dsa = dsa.name, "handshake established");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        crypto::{
            provider::pqclean::PqcleanProvider,
            registry::{ML_DSA_44, ML_DSA_65, ML_KEM_1024, ML_KEM_512, ML_KEM_768},
        },
        error::Error,
        message::MessageType,
        session::Initiator,
    };
    use std::sync::Arc;

    struct Pair {
        initiator: HandshakeConfig,
        responder: HandshakeConfig,
    }

    fn context() -> PqcContext {
        PqcContext::with_provider(Arc::new(PqcleanProvider::new())).unwrap()
    }

    fn identities(ctx: &PqcContext, dsa: &'static AlgorithmSpec) -> Pair {
        let client = Arc::new(ctx.sig_keypair(dsa).unwrap());
        let server = Arc::new(ctx.sig_keypair(dsa).unwrap());
        Pair {
            initiator: HandshakeConfig::new(client.clone(), server.public.clone()).unwrap(),
            responder: HandshakeConfig::new(server, client.public.clone()).unwrap(),
        }
    }

    #[test]
    fn test_full_handshake_in_memory() {
        let ctx = context();
        let pair = identities(&ctx, &ML_DSA_44);
        let mut initiator = Initiator::new(ctx.clone(), pair.initiator);
        let mut responder = Responder::new(ctx, pair.responder).unwrap();

        let hello = initiator.start().unwrap();
        let reply = responder.handle_client_hello(&hello).unwrap();
        let finish = initiator.handle_server_hello(&reply).unwrap();
        assert_eq!(initiator.state(), HandshakeState::SendFinish);
        responder.handle_client_finish(&finish).unwrap();
        initiator.finish_sent().unwrap();

        let client = initiator.into_session().unwrap();
        let server = responder.into_session().unwrap();
        assert_eq!(client.shared_secret(), server.shared_secret());
        assert_eq!(client.session_key(), server.session_key());
        assert_eq!(client.transcript_hash(), server.transcript_hash());
        assert_eq!(client.kem(), &ML_KEM_512);
        assert_eq!(client.dsa(), &ML_DSA_44);
    }

    #[test]
    fn test_unsent_finish_fails_initiator() {
        let ctx = context();
        let pair = identities(&ctx, &ML_DSA_44);
        let mut initiator = Initiator::new(ctx.clone(), pair.initiator);
        let mut responder = Responder::new(ctx, pair.responder).unwrap();

        let reply = responder.handle_client_hello(&initiator.start().unwrap()).unwrap();
        initiator.handle_server_hello(&reply).unwrap();
        assert!(!initiator.state().is_terminal());

        initiator.fail(&Error::PeerClosed);
        assert_eq!(initiator.state(), HandshakeState::Failed(FailureReason::PeerClosed));
        assert!(initiator.finish_sent().is_err());
        assert!(initiator.into_session().is_err());
    }

    #[test]
    fn test_first_match_follows_initiator_order() {
        let ctx = context();
        let pair = identities(&ctx, &ML_DSA_44);
        let initiator_cfg = pair
            .initiator
            .with_kem_algorithms(vec![&ML_KEM_1024, &ML_KEM_768])
            .unwrap();
        let responder_cfg = pair
            .responder
            .with_kem_algorithms(vec![&ML_KEM_768, &ML_KEM_1024])
            .unwrap();

        let mut initiator = Initiator::new(ctx.clone(), initiator_cfg);
        let mut responder = Responder::new(ctx, responder_cfg).unwrap();
        let reply = responder.handle_client_hello(&initiator.start().unwrap()).unwrap();
        assert_eq!(ServerHello::decode(&reply).unwrap().kem, &ML_KEM_1024);
    }

    #[test]
    fn test_no_common_kem() {
        let ctx = context();
        let pair = identities(&ctx, &ML_DSA_44);
        let mut initiator = Initiator::new(ctx.clone(), pair.initiator.with_kem_algorithms(vec![&ML_KEM_512]).unwrap());
        let mut responder = Responder::new(ctx, pair.responder.with_kem_algorithms(vec![&ML_KEM_1024]).unwrap()).unwrap();

        let err = responder.handle_client_hello(&initiator.start().unwrap()).unwrap_err();
        assert!(matches!(err, Error::NoCommonAlgorithm(AlgorithmKind::Kem)));
        assert_eq!(
            responder.state(),
            HandshakeState::Failed(FailureReason::NoCommonAlgorithm(AlgorithmKind::Kem))
        );
    }

    #[test]
    fn test_mismatched_identity_algorithms() {
        let ctx = context();
        let client = Arc::new(ctx.sig_keypair(&ML_DSA_44).unwrap());
        let server = Arc::new(ctx.sig_keypair(&ML_DSA_65).unwrap());
        let mut initiator = Initiator::new(
            ctx.clone(),
            HandshakeConfig::new(client.clone(), server.public.clone()).unwrap(),
        );

        // The pinned key and the identity disagree, so nothing can be offered
        assert!(matches!(initiator.start(), Err(Error::NoCommonAlgorithm(AlgorithmKind::Dsa))));
        assert!(initiator.state().is_terminal());
    }

    #[test]
    fn test_corrupted_finish_signature() {
        let ctx = context();
        let pair = identities(&ctx, &ML_DSA_44);
        let mut initiator = Initiator::new(ctx.clone(), pair.initiator);
        let mut responder = Responder::new(ctx, pair.responder).unwrap();

        let reply = responder.handle_client_hello(&initiator.start().unwrap()).unwrap();
        let mut finish = initiator.handle_server_hello(&reply).unwrap();
        let last = finish.len() - 1;
        finish[last] ^= 0x01;

        let err = responder.handle_client_finish(&finish).unwrap_err();
        assert!(matches!(err, Error::Authentication(AuthError::SignatureVerificationFailed)));
        assert_eq!(
            responder.state(),
            HandshakeState::Failed(FailureReason::AuthenticationFailed)
        );
        assert!(responder.into_session().is_err());
    }

    #[test]
    fn test_wrong_pinned_server_key() {
        let ctx = context();
        let pair = identities(&ctx, &ML_DSA_44);
        let impostor = ctx.sig_keypair(&ML_DSA_44).unwrap();
        let initiator_cfg = HandshakeConfig::new(
            Arc::new(ctx.sig_keypair(&ML_DSA_44).unwrap()),
            impostor.public.clone(),
        )
        .unwrap();

        let mut initiator = Initiator::new(ctx.clone(), initiator_cfg);
        let mut responder = Responder::new(ctx, pair.responder).unwrap();
        let reply = responder.handle_client_hello(&initiator.start().unwrap()).unwrap();
        assert!(matches!(
            initiator.handle_server_hello(&reply),
            Err(Error::Authentication(AuthError::SignatureVerificationFailed))
        ));
    }

    #[test]
    fn test_message_out_of_order() {
        let ctx = context();
        let pair = identities(&ctx, &ML_DSA_44);
        let mut responder = Responder::new(ctx, pair.responder).unwrap();
        let finish = crate::core::message::encode_payload(MessageType::ClientFinish, &[0u8; 8]);
        assert!(matches!(responder.handle_client_finish(&finish), Err(Error::Protocol(_))));
    }
}
