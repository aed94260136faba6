/*!
Record encryption for the secure channel.

ChaCha20-Poly1305 with a 96-bit nonce made of a direction byte, a
big-endian 64-bit record counter and three zero bytes.
*/

use chacha20poly1305::{
    aead::{generic_array::GenericArray, Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};

use crate::core::{
    constants::sizes,
    error::{CryptoError, Error, Result},
};

/// Cipher handles symmetric encryption and decryption
pub struct Cipher {
    cipher: ChaCha20Poly1305,
}

impl Cipher {
    /// Create a new Cipher with the given encryption key
    pub fn new(key: &[u8; sizes::chacha::KEY_SIZE]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Encrypt `data`, authenticating `aad` alongside it
    pub fn encrypt(&self, nonce: &Nonce, data: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        self.cipher
            .encrypt(nonce, Payload { msg: data, aad })
            .map_err(|_e| Error::Crypto(CryptoError::EncryptionFailed))
    }

    /// Decrypt `data`; a bad tag or different `aad` fails
    pub fn decrypt(&self, nonce: &Nonce, data: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        self.cipher
            .decrypt(nonce, Payload { msg: data, aad })
            .map_err(|_e| Error::Crypto(CryptoError::DecryptionFailed))
    }

    /// Create a nonce from a direction byte and record counter
    pub fn create_nonce(direction: u8, counter: u64) -> Nonce {
        let mut nonce = [0u8; sizes::chacha::NONCE_SIZE];
        nonce[0] = direction;
        nonce[1..9].copy_from_slice(&counter.to_be_bytes());
        *GenericArray::from_slice(&nonce)
    }
}
