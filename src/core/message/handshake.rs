/*!
Handshake message bodies.

```text
ClientHello   kem_count u8 | kem codes u16.. | dsa_count u8 | dsa codes u16.. | nonce [32]
ServerHello   kem u16 | dsa u16 | kem public key | nonce [32] | sig_len u16 | signature
ClientFinish  ciphertext | sig_len u16 | signature
```

All integers are big-endian. Public keys and ciphertexts are raw and sized
by the negotiated algorithm, so [`ServerHello`] resolves its algorithm codes
while decoding and [`ClientFinish`] needs the negotiated KEM.
*/

use bytes::{Buf, BufMut, BytesMut};

use super::types::{expect_payload, MessageType, PAYLOAD_HEADER_SIZE};
use crate::core::{
    constants::{NONCE_SIZE, VERSION},
    crypto::registry::{self, AlgorithmKind, AlgorithmSpec},
    error::{AuthError, BufferRole, Error, Result},
};
use crate::format_err;

fn start(msg_type: MessageType, capacity: usize) -> BytesMut {
    let mut buf = BytesMut::with_capacity(PAYLOAD_HEADER_SIZE + capacity);
    buf.put_u8(msg_type.as_u8());
    buf.put_u8(VERSION);
    buf
}

fn need(buf: &[u8], len: usize, what: &str) -> Result<()> {
    if buf.remaining() < len {
        return format_err!("Truncated {}: need {} bytes, have {}", what, len, buf.remaining());
    }
    Ok(())
}

fn finished(buf: &[u8], msg_type: MessageType) -> Result<()> {
    if buf.has_remaining() {
        return format_err!("{} has {} trailing bytes", msg_type, buf.remaining());
    }
    Ok(())
}

fn put_codes(buf: &mut BytesMut, codes: &[u16]) -> Result<()> {
    if codes.len() > u8::MAX as usize {
        return format_err!("Too many algorithms offered: {}", codes.len());
    }
    buf.put_u8(codes.len() as u8);
    for code in codes {
        buf.put_u16(*code);
    }
    Ok(())
}

fn get_codes(buf: &mut &[u8]) -> Result<Vec<u16>> {
    need(buf, 1, "algorithm list")?;
    let count = buf.get_u8() as usize;
    need(buf, count * 2, "algorithm list")?;
    Ok((0..count).map(|_| buf.get_u16()).collect())
}

fn put_signature(buf: &mut BytesMut, signature: &[u8]) -> Result<()> {
    if signature.is_empty() || signature.len() > u16::MAX as usize {
        return format_err!("Signature of {} bytes cannot be encoded", signature.len());
    }
    buf.put_u16(signature.len() as u16);
    buf.put_slice(signature);
    Ok(())
}

fn get_signature(buf: &mut &[u8]) -> Result<Vec<u8>> {
    need(buf, 2, "signature length")?;
    let len = buf.get_u16() as usize;
    if len == 0 {
        return format_err!("Empty signature");
    }
    need(buf, len, "signature")?;
    let signature = buf[..len].to_vec();
    buf.advance(len);
    Ok(signature)
}

fn get_nonce(buf: &mut &[u8]) -> Result<[u8; NONCE_SIZE]> {
    need(buf, NONCE_SIZE, "nonce")?;
    let mut nonce = [0u8; NONCE_SIZE];
    buf.copy_to_slice(&mut nonce);
    Ok(nonce)
}

/// Read a raw key-sized field, reporting a short field against `spec`
fn get_sized(
    buf: &mut &[u8],
    spec: &'static AlgorithmSpec,
    role: BufferRole,
    len: usize,
    trailer: usize,
) -> Result<Vec<u8>> {
    if buf.remaining() < len + trailer {
        return Err(Error::InvalidKeyLength {
            role,
            algorithm: spec.name,
            expected: len,
            actual: buf.remaining().saturating_sub(trailer),
        });
    }
    let field = buf[..len].to_vec();
    buf.advance(len);
    Ok(field)
}

/// The initiator's offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    /// KEM codes in preference order
    pub kem_algorithms: Vec<u16>,
    /// DSA codes in preference order
    pub dsa_algorithms: Vec<u16>,
    pub nonce: [u8; NONCE_SIZE],
}

impl ClientHello {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let capacity = 2 + 2 * (self.kem_algorithms.len() + self.dsa_algorithms.len()) + NONCE_SIZE;
        let mut buf = start(MessageType::ClientHello, capacity);
        put_codes(&mut buf, &self.kem_algorithms)?;
        put_codes(&mut buf, &self.dsa_algorithms)?;
        buf.put_slice(&self.nonce);
        Ok(buf.to_vec())
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut buf = expect_payload(payload, MessageType::ClientHello)?;
        let kem_algorithms = get_codes(&mut buf)?;
        let dsa_algorithms = get_codes(&mut buf)?;
        let nonce = get_nonce(&mut buf)?;
        finished(buf, MessageType::ClientHello)?;
        Ok(Self {
            kem_algorithms,
            dsa_algorithms,
            nonce,
        })
    }
}

/// The responder's choice, signed with its long-term key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub kem: &'static AlgorithmSpec,
    pub dsa: &'static AlgorithmSpec,
    /// Ephemeral KEM public key
    pub kem_public_key: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
    pub signature: Vec<u8>,
}

impl ServerHello {
    /// Payload without the signature fields, which is what gets signed
    pub fn encode_unsigned(&self) -> Vec<u8> {
        let capacity = 4 + self.kem_public_key.len() + NONCE_SIZE;
        let mut buf = start(MessageType::ServerHello, capacity);
        buf.put_u16(self.kem.code);
        buf.put_u16(self.dsa.code);
        buf.put_slice(&self.kem_public_key);
        buf.put_slice(&self.nonce);
        buf.to_vec()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::from(self.encode_unsigned().as_slice());
        put_signature(&mut buf, &self.signature)?;
        Ok(buf.to_vec())
    }

    /// Decode, resolving the chosen algorithms from the catalog
    ///
    /// A code outside the catalog cannot have been offered and is rejected
    /// as an authentication failure.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut buf = expect_payload(payload, MessageType::ServerHello)?;
        need(buf, 4, "algorithm codes")?;
        let kem = registry::by_code(AlgorithmKind::Kem, buf.get_u16())
            .ok_or(Error::Authentication(AuthError::UnofferedAlgorithm))?;
        let dsa = registry::by_code(AlgorithmKind::Dsa, buf.get_u16())
            .ok_or(Error::Authentication(AuthError::UnofferedAlgorithm))?;

        let kem_public_key = get_sized(
            &mut buf,
            kem,
            BufferRole::PublicKey,
            kem.public_key_len(),
            NONCE_SIZE + 2,
        )?;
        let nonce = get_nonce(&mut buf)?;
        let signature = get_signature(&mut buf)?;
        finished(buf, MessageType::ServerHello)?;

        Ok(Self {
            kem,
            dsa,
            kem_public_key,
            nonce,
            signature,
        })
    }
}

/// The initiator's encapsulation and signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFinish {
    pub ciphertext: Vec<u8>,
    pub signature: Vec<u8>,
}

impl ClientFinish {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = start(MessageType::ClientFinish, self.ciphertext.len() + 2 + self.signature.len());
        buf.put_slice(&self.ciphertext);
        put_signature(&mut buf, &self.signature)?;
        Ok(buf.to_vec())
    }

    /// Decode against the negotiated KEM, which fixes the ciphertext length
    pub fn decode(payload: &[u8], kem: &'static AlgorithmSpec) -> Result<Self> {
        let ct_len = kem.require_kem()?.ciphertext;
        let mut buf = expect_payload(payload, MessageType::ClientFinish)?;
        let ciphertext = get_sized(&mut buf, kem, BufferRole::Ciphertext, ct_len, 2)?;
        let signature = get_signature(&mut buf)?;
        finished(buf, MessageType::ClientFinish)?;
        Ok(Self { ciphertext, signature })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::registry::{ML_DSA_44, ML_KEM_512};

    fn server_hello() -> ServerHello {
        ServerHello {
            kem: &ML_KEM_512,
            dsa: &ML_DSA_44,
            kem_public_key: vec![0x11; 800],
            nonce: [0x22; NONCE_SIZE],
            signature: vec![0x33; 2420],
        }
    }

    #[test]
    fn test_client_hello_layout() {
        let hello = ClientHello {
            kem_algorithms: vec![0x0201, 0x0202],
            dsa_algorithms: vec![0x0301],
            nonce: [9u8; NONCE_SIZE],
        };
        let payload = hello.encode().unwrap();
        assert_eq!(&payload[..9], &[0x01, VERSION, 2, 0x02, 0x01, 0x02, 0x02, 1, 0x03]);
        assert_eq!(payload.len(), 2 + 1 + 4 + 1 + 2 + NONCE_SIZE);
        assert_eq!(ClientHello::decode(&payload).unwrap(), hello);
    }

    #[test]
    fn test_client_hello_trailing_bytes() {
        let hello = ClientHello {
            kem_algorithms: vec![],
            dsa_algorithms: vec![],
            nonce: [0u8; NONCE_SIZE],
        };
        let mut payload = hello.encode().unwrap();
        payload.push(0);
        assert!(matches!(ClientHello::decode(&payload), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_server_hello_signed_prefix() {
        let hello = server_hello();
        let payload = hello.encode().unwrap();
        let unsigned = hello.encode_unsigned();
        assert!(payload.starts_with(&unsigned));
        assert_eq!(payload.len(), unsigned.len() + 2 + 2420);

        let decoded = ServerHello::decode(&payload).unwrap();
        assert_eq!(decoded, hello);
        assert_eq!(decoded.encode_unsigned(), unsigned);
    }

    #[test]
    fn test_server_hello_short_public_key() {
        let mut hello = server_hello();
        hello.kem_public_key.truncate(700);
        hello.signature.truncate(10);
        let payload = hello.encode().unwrap();
        assert!(matches!(
            ServerHello::decode(&payload),
            Err(Error::InvalidKeyLength {
                role: BufferRole::PublicKey,
                ..
            }) | Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_server_hello_unknown_code() {
        let mut payload = server_hello().encode().unwrap();
        payload[2] = 0x7f;
        assert!(matches!(
            ServerHello::decode(&payload),
            Err(Error::Authentication(AuthError::UnofferedAlgorithm))
        ));
    }

    #[test]
    fn test_client_finish_needs_full_ciphertext() {
        let finish = ClientFinish {
            ciphertext: vec![1u8; 700],
            signature: vec![2u8; 1],
        };
        let payload = finish.encode().unwrap();
        assert!(matches!(
            ClientFinish::decode(&payload, &ML_KEM_512),
            Err(Error::InvalidKeyLength {
                role: BufferRole::Ciphertext,
                expected: 768,
                actual: 701,
                ..
            })
        ));
    }
}
