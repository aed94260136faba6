/*!
Cryptographic provider seam.

A provider is the native library that actually implements ML-KEM and ML-DSA.
Its surface is deliberately C-shaped: algorithms are opened by name, every
operation writes into caller-allocated buffers and reports a status code, and
handles are released when dropped. The safe, length-checked API on top of this
lives in [`crate::core::crypto::binding`].

Two backends exist:

- [`oqs::OqsProvider`] opens liboqs at runtime.
- [`pqclean::PqcleanProvider`] is compiled in and used when no liboqs can be
  found and the configuration allows it.

Discovery walks an ordered list of candidates (see [`load_provider`]); the
first that loads and agrees with the algorithm catalog wins. The result is
cached process-wide by [`global`] until [`shutdown`].
*/

pub mod oqs;
pub mod pqclean;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

use crate::core::{
    crypto::registry::{self, AlgorithmKind, KemLengths, Lengths, SigLengths},
    error::{Error, Result},
};

/// Status code returned by raw provider operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
}

impl Status {
    /// Whether the provider reported success
    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

/// Where a provider was loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOrigin {
    /// A shared library at an explicit path
    Library(PathBuf),
    /// A shared library found through the system loader search path
    System(String),
    /// Compiled into this binary
    Builtin,
}

impl fmt::Display for ProviderOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderOrigin::Library(path) => write!(f, "{}", path.display()),
            ProviderOrigin::System(name) => write!(f, "system library {}", name),
            ProviderOrigin::Builtin => write!(f, "builtin"),
        }
    }
}

/// An opened KEM algorithm
///
/// Buffers passed in must match [`KemHandle::lengths`]; implementations
/// return [`Status::Error`] when they don't.
pub trait KemHandle {
    /// Lengths as reported by the provider
    fn lengths(&self) -> KemLengths;

    /// Generate a keypair into `public_key` and `secret_key`
    fn keypair(&self, public_key: &mut [u8], secret_key: &mut [u8]) -> Status;

    /// Encapsulate to `public_key`
    fn encaps(&self, ciphertext: &mut [u8], shared_secret: &mut [u8], public_key: &[u8]) -> Status;

    /// Decapsulate `ciphertext` with `secret_key`
    fn decaps(&self, shared_secret: &mut [u8], ciphertext: &[u8], secret_key: &[u8]) -> Status;
}

/// An opened signature algorithm
pub trait SigHandle {
    /// Lengths as reported by the provider
    fn lengths(&self) -> SigLengths;

    /// Generate a keypair into `public_key` and `secret_key`
    fn keypair(&self, public_key: &mut [u8], secret_key: &mut [u8]) -> Status;

    /// Sign `message`
    ///
    /// `signature` must hold the maximum signature length; the produced
    /// length is written to `signature_len`.
    fn sign(
        &self,
        signature: &mut [u8],
        signature_len: &mut usize,
        message: &[u8],
        secret_key: &[u8],
    ) -> Status;

    /// Verify `signature` over `message`
    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> Status;
}

/// A loaded cryptographic provider
pub trait Provider: Send + Sync {
    /// Short provider name
    fn name(&self) -> &str;

    /// Provider version string
    fn version(&self) -> String;

    /// Where the provider came from
    fn origin(&self) -> ProviderOrigin;

    /// Whether the algorithm is compiled into the provider
    fn is_enabled(&self, kind: AlgorithmKind, name: &str) -> bool;

    /// Open a KEM algorithm by canonical name
    fn open_kem(&self, name: &str) -> Option<Box<dyn KemHandle + '_>>;

    /// Open a signature algorithm by canonical name
    fn open_sig(&self, name: &str) -> Option<Box<dyn SigHandle + '_>>;
}

impl fmt::Debug for dyn Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name())
            .field("version", &self.version())
            .field("origin", &self.origin())
            .finish()
    }
}

/// Provider discovery settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Explicit liboqs location; a directory is searched for `lib/liboqs.*`
    pub liboqs_path: Option<PathBuf>,
    /// Fall back to the compiled-in provider
    pub allow_builtin: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            liboqs_path: None,
            allow_builtin: true,
        }
    }
}

/// Install locations probed after the configured path
pub const WELL_KNOWN_PATHS: &[&str] = &[
    "/usr/local/lib/liboqs.so",
    "/usr/local/lib/liboqs.dylib",
    "/usr/lib/liboqs.so",
    "/usr/lib/x86_64-linux-gnu/liboqs.so",
    "/opt/homebrew/lib/liboqs.dylib",
];

/// Canonical library name for the system loader search
pub const SYSTEM_LIBRARY_NAME: &str = "oqs";

/// One place discovery will look
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Configured(PathBuf),
    WellKnown(PathBuf),
    System(String),
    Builtin,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Candidate::Configured(path) => write!(f, "configured {}", path.display()),
            Candidate::WellKnown(path) => write!(f, "{}", path.display()),
            Candidate::System(name) => write!(f, "system {}", name),
            Candidate::Builtin => write!(f, "builtin"),
        }
    }
}

/// Resolve a configured liboqs location to a library file
///
/// A path naming a directory is treated as an install prefix.
fn configured_library(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join("lib").join(libloading::library_filename(SYSTEM_LIBRARY_NAME))
    } else {
        path.to_path_buf()
    }
}

/// The ordered discovery candidates for `settings`
pub fn candidates(settings: &ProviderSettings) -> Vec<Candidate> {
    let mut list = Vec::new();
    if let Some(path) = &settings.liboqs_path {
        list.push(Candidate::Configured(configured_library(path)));
    }
    list.extend(WELL_KNOWN_PATHS.iter().map(|p| Candidate::WellKnown(PathBuf::from(p))));
    list.push(Candidate::System(SYSTEM_LIBRARY_NAME.to_string()));
    if settings.allow_builtin {
        list.push(Candidate::Builtin);
    }
    list
}

fn open_candidate(candidate: &Candidate) -> Result<Arc<dyn Provider>> {
    match candidate {
        Candidate::Configured(path) | Candidate::WellKnown(path) => {
            Ok(Arc::new(oqs::OqsProvider::open(path)?))
        }
        Candidate::System(name) => Ok(Arc::new(oqs::OqsProvider::open_system(name)?)),
        Candidate::Builtin => Ok(Arc::new(pqclean::PqcleanProvider::new())),
    }
}

/// Check every catalogued algorithm the provider enables against the catalog
pub fn validate(provider: &dyn Provider) -> Result<()> {
    for spec in registry::all() {
        if !provider.is_enabled(spec.kind(), spec.name) {
            continue;
        }
        match &spec.lengths {
            Lengths::Kem(expected) => {
                let handle = provider.open_kem(spec.name).ok_or_else(|| {
                    Error::ProviderMismatch(format!("{} is enabled but cannot be opened", spec.name))
                })?;
                let actual = handle.lengths();
                if actual != *expected {
                    return Err(Error::ProviderMismatch(format!(
                        "{}: catalog {:?}, provider {:?}",
                        spec.name, expected, actual
                    )));
                }
            }
            Lengths::Dsa(expected) => {
                let handle = provider.open_sig(spec.name).ok_or_else(|| {
                    Error::ProviderMismatch(format!("{} is enabled but cannot be opened", spec.name))
                })?;
                let actual = handle.lengths();
                if actual != *expected {
                    return Err(Error::ProviderMismatch(format!(
                        "{}: catalog {:?}, provider {:?}",
                        spec.name, expected, actual
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Discover and load a provider
///
/// Candidates are tried in order. A configured path that fails to load or
/// validate is fatal; other candidates that fail are skipped.
pub fn load_provider(settings: &ProviderSettings) -> Result<Arc<dyn Provider>> {
    let mut attempts = Vec::new();

    for candidate in candidates(settings) {
        debug!(%candidate, "trying provider candidate");
        let loaded = open_candidate(&candidate).and_then(|provider| {
            validate(provider.as_ref())?;
            Ok(provider)
        });

        match loaded {
            Ok(provider) => {
                info!(
                    provider = provider.name(),
                    version = %provider.version(),
                    origin = %provider.origin(),
                    "loaded cryptographic provider"
                );
                return Ok(provider);
            }
            Err(err) if matches!(candidate, Candidate::Configured(_)) => {
                warn!(%candidate, error = %err, "configured provider failed to load");
                return Err(match err {
                    Error::ProviderMismatch(_) => err,
                    other => Error::ProviderUnavailable(format!("{}: {}", candidate, other)),
                });
            }
            Err(err @ Error::ProviderMismatch(_)) => {
                warn!(%candidate, error = %err, "provider rejected");
                attempts.push(format!("{}: {}", candidate, err));
            }
            Err(err) => {
                debug!(%candidate, error = %err, "provider candidate unavailable");
                attempts.push(format!("{}: {}", candidate, err));
            }
        }
    }

    Err(Error::ProviderUnavailable(if attempts.is_empty() {
        "no candidates".to_string()
    } else {
        attempts.join("; ")
    }))
}

enum Slot {
    Unloaded,
    Loaded(Arc<dyn Provider>),
    Failed(String),
}

static GLOBAL: Lazy<Mutex<Slot>> = Lazy::new(|| Mutex::new(Slot::Unloaded));

/// The process-wide provider, loading it on first use
///
/// Later calls return the cached provider regardless of `settings`. A failed
/// load is remembered and reported again without retrying until
/// [`shutdown`].
pub fn global(settings: &ProviderSettings) -> Result<Arc<dyn Provider>> {
    let mut slot = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner);
    match &*slot {
        Slot::Loaded(provider) => return Ok(Arc::clone(provider)),
        Slot::Failed(reason) => return Err(Error::ProviderUnavailable(reason.clone())),
        Slot::Unloaded => {}
    }

    match load_provider(settings) {
        Ok(provider) => {
            *slot = Slot::Loaded(Arc::clone(&provider));
            Ok(provider)
        }
        Err(err) => {
            warn!(error = %err, "no cryptographic provider available");
            *slot = Slot::Failed(err.to_string());
            Err(err)
        }
    }
}

/// Drop the process-wide provider
///
/// Contexts still holding the provider keep it alive until they are dropped.
pub fn shutdown() {
    let mut slot = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner);
    if matches!(&*slot, Slot::Loaded(_)) {
        debug!("releasing cryptographic provider");
    }
    *slot = Slot::Unloaded;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_order() {
        let settings = ProviderSettings {
            liboqs_path: Some(PathBuf::from("/nonexistent/liboqs.so")),
            allow_builtin: true,
        };
        let list = candidates(&settings);
        assert_eq!(list.first(), Some(&Candidate::Configured(PathBuf::from("/nonexistent/liboqs.so"))));
        assert_eq!(list.last(), Some(&Candidate::Builtin));
        assert_eq!(list.len(), WELL_KNOWN_PATHS.len() + 3);
    }

    #[test]
    fn test_builtin_can_be_disallowed() {
        let settings = ProviderSettings {
            liboqs_path: None,
            allow_builtin: false,
        };
        assert!(!candidates(&settings).contains(&Candidate::Builtin));
    }

    #[test]
    fn test_missing_configured_path_is_fatal() {
        let settings = ProviderSettings {
            liboqs_path: Some(PathBuf::from("/nonexistent/liboqs.so")),
            allow_builtin: true,
        };
        assert!(matches!(load_provider(&settings), Err(Error::ProviderUnavailable(_))));
    }

    #[test]
    fn test_builtin_passes_validation() {
        let provider = pqclean::PqcleanProvider::new();
        validate(&provider).unwrap();
    }
}
