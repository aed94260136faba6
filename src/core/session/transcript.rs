/*!
Handshake transcript and key derivation.

The transcript is a running SHA-256 over the handshake payloads in wire
order. Its hash is bound into both signatures and salts the session key.
*/

use std::fmt;

use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::core::{
    constants::{
        sizes::SESSION_KEY_SIZE, CLIENT_SIGNATURE_CONTEXT, HKDF_INFO_SESSION, SERVER_SIGNATURE_CONTEXT,
        TRANSCRIPT_HASH_SIZE,
    },
    crypto::SharedSecret,
    error::{CryptoError, Error, Result},
};

/// Running hash of the handshake messages
#[derive(Clone, Default)]
pub struct Transcript {
    hasher: Sha256,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a payload
    pub fn absorb(&mut self, payload: &[u8]) {
        self.hasher.update(payload);
    }

    /// Hash of everything absorbed so far; the transcript stays usable
    pub fn hash(&self) -> [u8; TRANSCRIPT_HASH_SIZE] {
        self.hasher.clone().finalize().into()
    }
}

impl fmt::Debug for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcript").finish_non_exhaustive()
    }
}

/// Bytes the responder signs: context and H(ClientHello ‖ unsigned ServerHello)
pub fn server_signature_input(hash: &[u8; TRANSCRIPT_HASH_SIZE]) -> Vec<u8> {
    [SERVER_SIGNATURE_CONTEXT, hash.as_slice()].concat()
}

/// Bytes the initiator signs: context, H(ClientHello ‖ ServerHello) and the ciphertext
pub fn client_signature_input(hash: &[u8; TRANSCRIPT_HASH_SIZE], ciphertext: &[u8]) -> Vec<u8> {
    [CLIENT_SIGNATURE_CONTEXT, hash.as_slice(), ciphertext].concat()
}

/// HKDF-SHA256 with the transcript hash as salt
pub fn derive_session_key(
    hash: &[u8; TRANSCRIPT_HASH_SIZE],
    shared_secret: &SharedSecret,
) -> Result<Zeroizing<[u8; SESSION_KEY_SIZE]>> {
    let hkdf = Hkdf::<Sha256>::new(Some(hash), shared_secret.expose_bytes());
    let mut key = Zeroizing::new([0u8; SESSION_KEY_SIZE]);
    hkdf.expand(HKDF_INFO_SESSION, &mut key[..])
        .map_err(|_| Error::Crypto(CryptoError::KeyDerivationFailed))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_incremental() {
        let mut transcript = Transcript::new();
        transcript.absorb(b"client hello");
        let first = transcript.hash();
        transcript.absorb(b"server hello");
        let second = transcript.hash();

        assert_ne!(first, second);
        let expected: [u8; 32] = Sha256::digest(b"client helloserver hello").into();
        assert_eq!(second, expected);
    }

    #[test]
    fn test_signature_inputs_are_separated() {
        let hash = [7u8; TRANSCRIPT_HASH_SIZE];
        let server = server_signature_input(&hash);
        let client = client_signature_input(&hash, &[]);
        assert_ne!(server, client);
        assert!(client_signature_input(&hash, b"ct").ends_with(b"ct"));
    }

    #[test]
    fn test_session_key_depends_on_transcript() {
        let secret = SharedSecret::new(Zeroizing::new(vec![0x42; 32]));
        let a = derive_session_key(&[1u8; 32], &secret).unwrap();
        let b = derive_session_key(&[2u8; 32], &secret).unwrap();
        assert_ne!(*a, *b);
        assert_eq!(*a, *derive_session_key(&[1u8; 32], &secret).unwrap());
    }
}
