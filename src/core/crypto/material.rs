/*!
Owned key material.

Every buffer here is tagged with the [`AlgorithmSpec`] it belongs to and is
only constructed at that algorithm's exact length. Secret buffers live in
[`Zeroizing`] storage and are wiped when dropped; [`SecretKey`] is not
`Clone`, so copying secret bytes always goes through
[`SecretKey::expose_bytes`] or [`SecretKey::to_zeroizing`].
*/

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::core::{
    crypto::registry::AlgorithmSpec,
    error::{BufferRole, Error, Result},
};

/// Check a buffer length against what the algorithm declares
pub(crate) fn check_len(
    spec: &'static AlgorithmSpec,
    role: BufferRole,
    expected: usize,
    actual: usize,
) -> Result<()> {
    if expected != actual {
        return Err(Error::InvalidKeyLength {
            role,
            algorithm: spec.name,
            expected,
            actual,
        });
    }
    Ok(())
}

/// A public key
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    spec: &'static AlgorithmSpec,
    bytes: Vec<u8>,
}

impl PublicKey {
    /// Wrap `bytes`, which must be exactly the algorithm's public key length
    pub fn from_bytes(spec: &'static AlgorithmSpec, bytes: Vec<u8>) -> Result<Self> {
        check_len(spec, BufferRole::PublicKey, spec.public_key_len(), bytes.len())?;
        Ok(Self { spec, bytes })
    }

    pub fn spec(&self) -> &'static AlgorithmSpec {
        self.spec
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("algorithm", &self.spec.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A secret key
///
/// Wiped on drop. Not `Clone`.
pub struct SecretKey {
    spec: &'static AlgorithmSpec,
    bytes: Zeroizing<Vec<u8>>,
}

impl SecretKey {
    /// Wrap `bytes`, which must be exactly the algorithm's secret key length
    pub fn from_bytes(spec: &'static AlgorithmSpec, bytes: Zeroizing<Vec<u8>>) -> Result<Self> {
        check_len(spec, BufferRole::SecretKey, spec.secret_key_len(), bytes.len())?;
        Ok(Self { spec, bytes })
    }

    pub fn spec(&self) -> &'static AlgorithmSpec {
        self.spec
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Borrow the raw secret bytes
    pub fn expose_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copy the secret bytes into a new zeroizing buffer
    pub fn to_zeroizing(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.bytes.to_vec())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("algorithm", &self.spec.name)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A public and secret key of the same algorithm
#[derive(Debug)]
pub struct Keypair {
    pub public: PublicKey,
    pub secret: SecretKey,
}

impl Keypair {
    /// Pair up two keys, which must belong to the same algorithm
    pub fn new(public: PublicKey, secret: SecretKey) -> Result<Self> {
        if !std::ptr::eq(public.spec, secret.spec) {
            return Err(Error::InvalidFormat(format!(
                "public key is {} but secret key is {}",
                public.spec.name, secret.spec.name
            )));
        }
        Ok(Self { public, secret })
    }

    pub fn spec(&self) -> &'static AlgorithmSpec {
        self.public.spec
    }
}

impl PartialEq for Keypair {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.spec(), other.spec())
            && self.public == other.public
            && bool::from(self.secret.bytes.as_slice().ct_eq(other.secret.bytes.as_slice()))
    }
}

impl Eq for Keypair {}

/// A KEM shared secret
///
/// Wiped on drop; never persisted.
pub struct SharedSecret(Zeroizing<Vec<u8>>);

impl SharedSecret {
    pub(crate) fn new(bytes: Zeroizing<Vec<u8>>) -> Self {
        Self(bytes)
    }

    /// Borrow the raw secret bytes
    pub fn expose_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        bool::from(self.0.as_slice().ct_eq(other.0.as_slice()))
    }
}

impl Eq for SharedSecret {}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedSecret([REDACTED; {}])", self.0.len())
    }
}

/// Output of an encapsulation
#[derive(Debug)]
pub struct EncapsulationResult {
    pub ciphertext: Vec<u8>,
    pub shared_secret: SharedSecret,
}

/// A detached signature of its actual produced length
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    spec: &'static AlgorithmSpec,
    bytes: Vec<u8>,
}

impl Signature {
    /// Wrap `bytes`, which must be non-empty and within the maximum length
    pub fn from_bytes(spec: &'static AlgorithmSpec, bytes: Vec<u8>) -> Result<Self> {
        let max = spec.require_dsa()?.max_signature;
        if bytes.is_empty() || bytes.len() > max {
            return Err(Error::InvalidKeyLength {
                role: BufferRole::Signature,
                algorithm: spec.name,
                expected: max,
                actual: bytes.len(),
            });
        }
        Ok(Self { spec, bytes })
    }

    pub fn spec(&self) -> &'static AlgorithmSpec {
        self.spec
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("algorithm", &self.spec.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}
