/*!
Key Material Manager.

Generates keypairs through the provider binding, converts them to and from
raw bytes, and persists them with [`super::files`].
*/

use std::path::{Path, PathBuf};

use tracing::info;
use zeroize::Zeroizing;

use super::files::{self, KeyLayout};
use crate::core::{
    crypto::{
        registry::{self, AlgorithmKind},
        AlgorithmSpec, Keypair, PqcContext, PublicKey, SecretKey,
    },
    error::{Error, Result},
};

/// Owns key generation and (de)serialization for one provider context
#[derive(Debug, Clone)]
pub struct KeyManager {
    ctx: PqcContext,
}

impl KeyManager {
    pub fn new(ctx: PqcContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &PqcContext {
        &self.ctx
    }

    /// Generate a keypair for `algorithm`, given by name or alias
    pub fn generate(&self, kind: AlgorithmKind, algorithm: &str) -> Result<Keypair> {
        let spec = registry::lookup_kind(kind, algorithm)?;
        let keypair = match kind {
            AlgorithmKind::Kem => self.ctx.kem_keypair(spec)?,
            AlgorithmKind::Dsa => self.ctx.sig_keypair(spec)?,
        };
        info!(algorithm = spec.name, kind = %kind, "generated keypair");
        Ok(keypair)
    }

    /// Raw bytes of both halves; the secret half stays in zeroizing storage
    pub fn serialize(keypair: &Keypair) -> (Vec<u8>, Zeroizing<Vec<u8>>) {
        (keypair.public.as_bytes().to_vec(), keypair.secret.to_zeroizing())
    }

    /// Rebuild a keypair from raw bytes
    pub fn deserialize(
        kind: AlgorithmKind,
        algorithm: &str,
        public: &[u8],
        secret: &[u8],
    ) -> Result<Keypair> {
        let spec = registry::lookup_kind(kind, algorithm)?;
        if public.len() != spec.public_key_len() {
            return Err(Error::LengthMismatch {
                path: format!("{} public key", spec.name),
                expected: spec.public_key_len(),
                actual: public.len(),
            });
        }
        if secret.len() != spec.secret_key_len() {
            return Err(Error::LengthMismatch {
                path: format!("{} secret key", spec.name),
                expected: spec.secret_key_len(),
                actual: secret.len(),
            });
        }
        Keypair::new(
            PublicKey::from_bytes(spec, public.to_vec())?,
            SecretKey::from_bytes(spec, Zeroizing::new(secret.to_vec()))?,
        )
    }

    /// Wipe and drop `keypair`
    pub fn release(keypair: Keypair) {
        // SecretKey zeroes its buffer on drop.
        drop(keypair);
    }

    /// Generate a keypair and write it under `layout`, returning the paths used
    pub fn generate_to(
        &self,
        kind: AlgorithmKind,
        algorithm: &str,
        layout: &KeyLayout,
    ) -> Result<(Keypair, PathBuf, PathBuf)> {
        let keypair = self.generate(kind, algorithm)?;
        let public_path = layout.public_path(keypair.spec());
        let private_path = layout.private_path(keypair.spec());
        files::save_keypair(&keypair, &public_path, &private_path)?;
        Ok((keypair, public_path, private_path))
    }

    /// Load a keypair written by [`files::save_keypair`]
    pub fn load(
        kind: AlgorithmKind,
        algorithm: &str,
        public_path: &Path,
        private_path: &Path,
    ) -> Result<Keypair> {
        let spec: &'static AlgorithmSpec = registry::lookup_kind(kind, algorithm)?;
        files::load_keypair(spec, public_path, private_path)
    }
}
