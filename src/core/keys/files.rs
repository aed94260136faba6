/*!
Key and signature files.

Files hold raw bytes with no envelope; the algorithm is known out of band.
Anything read back is checked against the algorithm's declared length.
*/

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;
use zeroize::Zeroizing;

use crate::core::{
    config::FileConfig,
    crypto::{AlgorithmSpec, Keypair, PublicKey, SecretKey, Signature},
    error::{Error, Result},
};

/// Naming scheme for key files in a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    pub dir: PathBuf,
    pub prefix: String,
    pub public_extension: String,
    pub private_extension: String,
}

impl KeyLayout {
    /// Layout from the file section of the configuration
    pub fn from_config(file: &FileConfig) -> Self {
        Self {
            dir: file.artifacts_dir.clone(),
            prefix: file.key_prefix.clone(),
            public_extension: file.public_key_extension.clone(),
            private_extension: file.private_key_extension.clone(),
        }
    }

    /// Use a different directory
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    /// `<dir>/<prefix>-<alias>`, without extension
    fn stem(&self, spec: &AlgorithmSpec) -> PathBuf {
        self.dir.join(format!("{}-{}", self.prefix, spec.alias))
    }

    pub fn public_path(&self, spec: &AlgorithmSpec) -> PathBuf {
        let mut path = self.stem(spec).into_os_string();
        path.push(&self.public_extension);
        path.into()
    }

    pub fn private_path(&self, spec: &AlgorithmSpec) -> PathBuf {
        let mut path = self.stem(spec).into_os_string();
        path.push(&self.private_extension);
        path.into()
    }
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn write_secret(path: &Path, bytes: &[u8]) -> Result<()> {
    create_parent(path)?;
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        let mut file = options.open(path)?;
        // An existing file keeps its old mode through open.
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    #[cfg(not(unix))]
    {
        let mut file = options.open(path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    Ok(())
}

fn write_public(path: &Path, bytes: &[u8]) -> Result<()> {
    create_parent(path)?;
    fs::write(path, bytes)?;
    Ok(())
}

fn length_mismatch(path: &Path, expected: usize, actual: usize) -> Error {
    Error::LengthMismatch {
        path: path.display().to_string(),
        expected,
        actual,
    }
}

/// Write both halves of `keypair`; the secret file is owner-only on Unix
pub fn save_keypair(keypair: &Keypair, public_path: &Path, private_path: &Path) -> Result<()> {
    write_public(public_path, keypair.public.as_bytes())?;
    write_secret(private_path, keypair.secret.expose_bytes())?;
    debug!(
        algorithm = keypair.spec().name,
        public = %public_path.display(),
        private = %private_path.display(),
        "saved keypair"
    );
    Ok(())
}

/// Read a public key file
pub fn load_public_key(spec: &'static AlgorithmSpec, path: &Path) -> Result<PublicKey> {
    let bytes = fs::read(path)?;
    if bytes.len() != spec.public_key_len() {
        return Err(length_mismatch(path, spec.public_key_len(), bytes.len()));
    }
    PublicKey::from_bytes(spec, bytes)
}

/// Read a secret key file
pub fn load_secret_key(spec: &'static AlgorithmSpec, path: &Path) -> Result<SecretKey> {
    let bytes = Zeroizing::new(fs::read(path)?);
    if bytes.len() != spec.secret_key_len() {
        return Err(length_mismatch(path, spec.secret_key_len(), bytes.len()));
    }
    SecretKey::from_bytes(spec, bytes)
}

/// Read both halves of a keypair
pub fn load_keypair(spec: &'static AlgorithmSpec, public_path: &Path, private_path: &Path) -> Result<Keypair> {
    let public = load_public_key(spec, public_path)?;
    let secret = load_secret_key(spec, private_path)?;
    Keypair::new(public, secret)
}

/// Write a detached signature
pub fn save_signature(signature: &Signature, path: &Path) -> Result<()> {
    write_public(path, signature.as_bytes())
}

/// Read a detached signature
///
/// The file must be non-empty and no longer than the algorithm's maximum.
pub fn load_signature(spec: &'static AlgorithmSpec, path: &Path) -> Result<Signature> {
    let max = spec.require_dsa()?.max_signature;
    let bytes = fs::read(path)?;
    if bytes.is_empty() || bytes.len() > max {
        return Err(length_mismatch(path, max, bytes.len()));
    }
    Signature::from_bytes(spec, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::registry::{ML_DSA_65, ML_KEM_768};

    #[test]
    fn test_layout_names() {
        let layout = KeyLayout::from_config(&FileConfig::default()).in_dir("/tmp/keys");
        assert_eq!(layout.public_path(&ML_KEM_768), PathBuf::from("/tmp/keys/pqc-mlkem768.pub"));
        assert_eq!(layout.private_path(&ML_DSA_65), PathBuf::from("/tmp/keys/pqc-mldsa65.priv"));
    }

    #[test]
    fn test_truncated_public_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.pub");
        fs::write(&path, vec![0u8; 100]).unwrap();

        let err = load_public_key(&ML_KEM_768, &path).unwrap_err();
        assert!(matches!(
            err,
            Error::LengthMismatch {
                expected: 1184,
                actual: 100,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_signature_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.sig");
        fs::write(&path, b"").unwrap();
        assert!(matches!(load_signature(&ML_DSA_65, &path), Err(Error::LengthMismatch { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_secret_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("k.priv");
        write_secret(&path, &[1, 2, 3]).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
