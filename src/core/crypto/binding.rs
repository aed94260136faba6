/*!
Safe, length-checked API over a [`Provider`].

[`PqcContext`] is the only way the rest of the crate touches the provider.
Each operation:

1. checks that the algorithm is of the right kind and that the provider enables it,
2. checks every caller buffer against the catalog lengths,
3. opens a fresh algorithm handle, runs one status-coded call into freshly
   allocated output buffers and drops the handle.

Outputs are returned only when the provider reports success, so callers never
see partially written keys.
*/

use std::sync::Arc;

use tracing::trace;
use zeroize::Zeroizing;

use super::{
    material::{check_len, EncapsulationResult, Keypair, PublicKey, SecretKey, SharedSecret, Signature},
    provider::{self, KemHandle, Provider, ProviderSettings, SigHandle},
    registry::{self, AlgorithmKind, AlgorithmSpec, KemLengths, SigLengths},
};
use crate::core::error::{BufferRole, Error, Operation, Result};

#[derive(Clone)]
enum Backend {
    Loaded(Arc<dyn Provider>),
    Unavailable(String),
}

/// Handle to a loaded provider, cheap to clone and share between threads
#[derive(Clone)]
pub struct PqcContext {
    backend: Backend,
}

impl std::fmt::Debug for PqcContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.backend {
            Backend::Loaded(provider) => f.debug_tuple("PqcContext").field(provider).finish(),
            Backend::Unavailable(reason) => f.debug_tuple("PqcContext").field(&reason).finish(),
        }
    }
}

impl PqcContext {
    /// Context over the process-wide provider, loading it if needed
    pub fn load(settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            backend: Backend::Loaded(provider::global(settings)?),
        })
    }

    /// Like [`PqcContext::load`], but a missing provider yields a context
    /// whose crypto operations fail with `ProviderUnavailable`
    pub fn load_or_unavailable(settings: &ProviderSettings) -> Self {
        match provider::global(settings) {
            Ok(provider) => Self {
                backend: Backend::Loaded(provider),
            },
            Err(err) => Self::unavailable(err.to_string()),
        }
    }

    /// Context over a specific provider, validated against the catalog
    pub fn with_provider(provider: Arc<dyn Provider>) -> Result<Self> {
        provider::validate(provider.as_ref())?;
        Ok(Self {
            backend: Backend::Loaded(provider),
        })
    }

    /// Context without a provider
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            backend: Backend::Unavailable(reason.into()),
        }
    }

    /// The loaded provider
    pub fn provider(&self) -> Result<&Arc<dyn Provider>> {
        match &self.backend {
            Backend::Loaded(provider) => Ok(provider),
            Backend::Unavailable(reason) => Err(Error::ProviderUnavailable(reason.clone())),
        }
    }

    /// Whether a provider is loaded
    pub fn is_available(&self) -> bool {
        matches!(self.backend, Backend::Loaded(_))
    }

    /// Whether the provider has the algorithm compiled in
    ///
    /// Distinct from catalog membership; always false without a provider.
    pub fn is_supported(&self, kind: AlgorithmKind, name: &str) -> bool {
        let Ok(spec) = registry::lookup_kind(kind, name) else {
            return false;
        };
        match &self.backend {
            Backend::Loaded(provider) => provider.is_enabled(kind, spec.name),
            Backend::Unavailable(_) => false,
        }
    }

    /// Catalogued algorithms of `kind` the provider supports, in catalog order
    pub fn supported(&self, kind: AlgorithmKind) -> Vec<&'static AlgorithmSpec> {
        registry::list(kind)
            .into_iter()
            .filter(|spec| self.is_supported(kind, spec.name))
            .collect()
    }

    fn kem(&self, spec: &'static AlgorithmSpec) -> Result<(Box<dyn KemHandle + '_>, KemLengths)> {
        let lengths = *spec.require_kem()?;
        let provider = self.provider()?;
        if !provider.is_enabled(AlgorithmKind::Kem, spec.name) {
            return Err(Error::UnsupportedAlgorithm(spec.name.to_string()));
        }
        let handle = provider
            .open_kem(spec.name)
            .ok_or_else(|| Error::UnsupportedAlgorithm(spec.name.to_string()))?;
        Ok((handle, lengths))
    }

    fn sig(&self, spec: &'static AlgorithmSpec) -> Result<(Box<dyn SigHandle + '_>, SigLengths)> {
        let lengths = *spec.require_dsa()?;
        let provider = self.provider()?;
        if !provider.is_enabled(AlgorithmKind::Dsa, spec.name) {
            return Err(Error::UnsupportedAlgorithm(spec.name.to_string()));
        }
        let handle = provider
            .open_sig(spec.name)
            .ok_or_else(|| Error::UnsupportedAlgorithm(spec.name.to_string()))?;
        Ok((handle, lengths))
    }

    /// Generate a KEM keypair
    pub fn kem_keypair(&self, spec: &'static AlgorithmSpec) -> Result<Keypair> {
        let (kem, lengths) = self.kem(spec)?;
        let mut public = vec![0u8; lengths.public_key];
        let mut secret = Zeroizing::new(vec![0u8; lengths.secret_key]);

        if !kem.keypair(&mut public, &mut secret).is_success() {
            return Err(Error::ProviderOperationFailed {
                operation: Operation::KemKeypair,
                algorithm: spec.name,
            });
        }
        trace!(algorithm = spec.name, "generated KEM keypair");

        Keypair::new(PublicKey::from_bytes(spec, public)?, SecretKey::from_bytes(spec, secret)?)
    }

    /// Encapsulate a fresh shared secret to `peer_public_key`
    pub fn kem_encapsulate(
        &self,
        spec: &'static AlgorithmSpec,
        peer_public_key: &[u8],
    ) -> Result<EncapsulationResult> {
        let (kem, lengths) = self.kem(spec)?;
        check_len(spec, BufferRole::PublicKey, lengths.public_key, peer_public_key.len())?;

        let mut ciphertext = vec![0u8; lengths.ciphertext];
        let mut shared_secret = Zeroizing::new(vec![0u8; lengths.shared_secret]);
        if !kem
            .encaps(&mut ciphertext, &mut shared_secret, peer_public_key)
            .is_success()
        {
            return Err(Error::ProviderOperationFailed {
                operation: Operation::KemEncapsulate,
                algorithm: spec.name,
            });
        }

        Ok(EncapsulationResult {
            ciphertext,
            shared_secret: SharedSecret::new(shared_secret),
        })
    }

    /// Recover the shared secret from `ciphertext`
    pub fn kem_decapsulate(
        &self,
        spec: &'static AlgorithmSpec,
        ciphertext: &[u8],
        secret_key: &SecretKey,
    ) -> Result<SharedSecret> {
        let (kem, lengths) = self.kem(spec)?;
        check_len(spec, BufferRole::Ciphertext, lengths.ciphertext, ciphertext.len())?;
        check_len(spec, BufferRole::SecretKey, lengths.secret_key, secret_key.len())?;

        let mut shared_secret = Zeroizing::new(vec![0u8; lengths.shared_secret]);
        if !kem
            .decaps(&mut shared_secret, ciphertext, secret_key.expose_bytes())
            .is_success()
        {
            return Err(Error::ProviderOperationFailed {
                operation: Operation::KemDecapsulate,
                algorithm: spec.name,
            });
        }
        Ok(SharedSecret::new(shared_secret))
    }

    /// Generate a signature keypair
    pub fn sig_keypair(&self, spec: &'static AlgorithmSpec) -> Result<Keypair> {
        let (sig, lengths) = self.sig(spec)?;
        let mut public = vec![0u8; lengths.public_key];
        let mut secret = Zeroizing::new(vec![0u8; lengths.secret_key]);

        if !sig.keypair(&mut public, &mut secret).is_success() {
            return Err(Error::ProviderOperationFailed {
                operation: Operation::SigKeypair,
                algorithm: spec.name,
            });
        }
        trace!(algorithm = spec.name, "generated signature keypair");

        Keypair::new(PublicKey::from_bytes(spec, public)?, SecretKey::from_bytes(spec, secret)?)
    }

    /// Sign `message`; the signature carries its actual length
    pub fn sig_sign(
        &self,
        spec: &'static AlgorithmSpec,
        message: &[u8],
        secret_key: &SecretKey,
    ) -> Result<Signature> {
        let (sig, lengths) = self.sig(spec)?;
        check_len(spec, BufferRole::SecretKey, lengths.secret_key, secret_key.len())?;

        let mut signature = vec![0u8; lengths.max_signature];
        let mut signature_len = 0usize;
        let status = sig.sign(&mut signature, &mut signature_len, message, secret_key.expose_bytes());
        if !status.is_success() || signature_len == 0 || signature_len > lengths.max_signature {
            return Err(Error::ProviderOperationFailed {
                operation: Operation::SigSign,
                algorithm: spec.name,
            });
        }

        signature.truncate(signature_len);
        Signature::from_bytes(spec, signature)
    }

    /// Verify `signature` over `message`
    ///
    /// A well-formed but invalid signature is `Ok(false)`. A public key of the
    /// wrong length, or an empty or oversized signature, is an error.
    pub fn sig_verify(
        &self,
        spec: &'static AlgorithmSpec,
        message: &[u8],
        signature: &[u8],
        public_key: &[u8],
    ) -> Result<bool> {
        let (sig, lengths) = self.sig(spec)?;
        check_len(spec, BufferRole::PublicKey, lengths.public_key, public_key.len())?;
        if signature.is_empty() || signature.len() > lengths.max_signature {
            return Err(Error::InvalidKeyLength {
                role: BufferRole::Signature,
                algorithm: spec.name,
                expected: lengths.max_signature,
                actual: signature.len(),
            });
        }

        Ok(sig.verify(message, signature, public_key).is_success())
    }
}
