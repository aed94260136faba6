/*!
Encrypted channel over an established handshake.

Each direction has its own key expanded from the session key and its own
record counter. Records are `Data` payloads whose type and version bytes
are authenticated as associated data. A `Close` payload ends the channel.
*/

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use super::transport::{FramedTransport, Transport};
use crate::core::{
    constants::{sizes, HKDF_INFO_I2R, HKDF_INFO_R2I, HKDF_SALT},
    crypto::cipher::Cipher,
    error::{CryptoError, Error, Result},
    message::{encode_payload, split_payload, types::PAYLOAD_HEADER_SIZE, MessageType},
    session::{EstablishedSession, Role},
};

/// Nonce prefix for initiator-to-responder records
pub const DIRECTION_I2R: u8 = 0x01;
/// Nonce prefix for responder-to-initiator records
pub const DIRECTION_R2I: u8 = 0x02;

type ChannelKey = Zeroizing<[u8; sizes::chacha::KEY_SIZE]>;

/// Expand the session key into the (initiator-to-responder, responder-to-initiator) keys
pub fn derive_channel_keys(session_key: &[u8; sizes::SESSION_KEY_SIZE]) -> Result<(ChannelKey, ChannelKey)> {
    let hkdf = Hkdf::<Sha256>::new(Some(HKDF_SALT), session_key);
    let mut i2r = Zeroizing::new([0u8; sizes::chacha::KEY_SIZE]);
    let mut r2i = Zeroizing::new([0u8; sizes::chacha::KEY_SIZE]);
    hkdf.expand(HKDF_INFO_I2R, &mut i2r[..])
        .and_then(|_| hkdf.expand(HKDF_INFO_R2I, &mut r2i[..]))
        .map_err(|_| Error::Crypto(CryptoError::KeyDerivationFailed))?;
    Ok((i2r, r2i))
}

/// One direction of the channel
struct Half {
    cipher: Cipher,
    direction: u8,
    counter: u64,
}

impl Half {
    fn new(key: &ChannelKey, direction: u8) -> Self {
        Self {
            cipher: Cipher::new(key),
            direction,
            counter: 0,
        }
    }

    /// Nonce for the next record; the counter never wraps
    fn next_nonce(&mut self) -> Result<chacha20poly1305::Nonce> {
        if self.counter == u64::MAX {
            return Err(Error::Crypto(CryptoError::NonceExhausted));
        }
        let nonce = Cipher::create_nonce(self.direction, self.counter);
        self.counter += 1;
        Ok(nonce)
    }
}

impl fmt::Debug for Half {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Half")
            .field("direction", &self.direction)
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}

/// ChaCha20-Poly1305 records over a framed transport
pub struct SecureChannel<T: Transport> {
    transport: FramedTransport<T>,
    sender: Half,
    receiver: Half,
    closed: bool,
}

impl<T: Transport + fmt::Debug> fmt::Debug for SecureChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureChannel")
            .field("transport", &self.transport)
            .field("sender", &self.sender)
            .field("receiver", &self.receiver)
            .field("closed", &self.closed)
            .finish()
    }
}

impl<T: Transport> SecureChannel<T> {
    /// Key the channel from `session`; the transport must be the one the handshake ran on
    pub fn new(transport: FramedTransport<T>, session: &EstablishedSession) -> Result<Self> {
        let (i2r, r2i) = derive_channel_keys(session.session_key())?;
        let (sender, receiver) = match session.role() {
            Role::Initiator => (Half::new(&i2r, DIRECTION_I2R), Half::new(&r2i, DIRECTION_R2I)),
            Role::Responder => (Half::new(&r2i, DIRECTION_R2I), Half::new(&i2r, DIRECTION_I2R)),
        };
        Ok(Self {
            transport,
            sender,
            receiver,
            closed: false,
        })
    }

    /// Largest plaintext that fits in one record
    pub fn max_message_len(&self) -> usize {
        self.transport.max_frame_len() - PAYLOAD_HEADER_SIZE - sizes::chacha::TAG_SIZE
    }

    /// Encrypt and send one message
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::PeerClosed);
        }
        if data.len() > self.max_message_len() {
            return Err(Error::InvalidFormat(format!(
                "Message of {} bytes exceeds record limit of {}",
                data.len(),
                self.max_message_len()
            )));
        }
        let header = encode_payload(MessageType::Data, &[]);
        let nonce = self.sender.next_nonce()?;
        let ciphertext = self.sender.cipher.encrypt(&nonce, data, &header)?;
        self.transport.send(&encode_payload(MessageType::Data, &ciphertext))
    }

    /// Receive and decrypt one message; `None` once the peer has closed
    pub fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        if self.closed {
            return Ok(None);
        }
        let payload = self.transport.recv()?;
        let (msg_type, body) = split_payload(&payload)?;
        match msg_type {
            MessageType::Data => {
                let nonce = self.receiver.next_nonce()?;
                let plaintext = self
                    .receiver
                    .cipher
                    .decrypt(&nonce, body, &payload[..PAYLOAD_HEADER_SIZE])?;
                Ok(Some(plaintext))
            }
            MessageType::Close => {
                debug!("peer closed secure channel");
                self.closed = true;
                Ok(None)
            }
            other => Err(Error::Protocol(format!("unexpected {} on secure channel", other))),
        }
    }

    /// Send `Close` and shut the transport down
    pub fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.transport.send(&encode_payload(MessageType::Close, &[]))?;
        }
        self.transport.close()
    }

    pub fn transport(&self) -> &FramedTransport<T> {
        &self.transport
    }
}
