/*!
liboqs, opened at runtime.

Only the generic `OQS_KEM_*` / `OQS_SIG_*` entry points are used: an
algorithm object is created by name, its length fields are read from the
leading part of the C struct, and the object is freed when the handle drops.
*/

use std::ffi::{CStr, CString, c_char, c_int};
use std::path::Path;
use std::ptr::NonNull;

use libloading::Library;
use tracing::debug;

use super::{KemHandle, Provider, ProviderOrigin, SigHandle, Status};
use crate::core::{
    crypto::registry::{AlgorithmKind, KemLengths, SigLengths},
    error::{Error, Result},
};

const OQS_SUCCESS: c_int = 0;

/// Leading fields of `OQS_KEM`
///
/// Fields added by later liboqs releases live after these, so the offsets
/// below are stable.
#[allow(dead_code)]
#[repr(C)]
struct RawKem {
    method_name: *const c_char,
    alg_version: *const c_char,
    claimed_nist_level: u8,
    ind_cca: bool,
    length_public_key: usize,
    length_secret_key: usize,
    length_ciphertext: usize,
    length_shared_secret: usize,
}

/// Leading fields of `OQS_SIG`
///
/// Newer releases add further bool flags after `euf_cma`; they sit in the
/// padding before `length_public_key`.
#[allow(dead_code)]
#[repr(C)]
struct RawSig {
    method_name: *const c_char,
    alg_version: *const c_char,
    claimed_nist_level: u8,
    euf_cma: bool,
    length_public_key: usize,
    length_secret_key: usize,
    length_signature: usize,
}

type AlgIsEnabledFn = unsafe extern "C" fn(*const c_char) -> c_int;
type KemNewFn = unsafe extern "C" fn(*const c_char) -> *mut RawKem;
type KemFreeFn = unsafe extern "C" fn(*mut RawKem);
type KemKeypairFn = unsafe extern "C" fn(*const RawKem, *mut u8, *mut u8) -> c_int;
type KemEncapsFn = unsafe extern "C" fn(*const RawKem, *mut u8, *mut u8, *const u8) -> c_int;
type KemDecapsFn = unsafe extern "C" fn(*const RawKem, *mut u8, *const u8, *const u8) -> c_int;
type SigNewFn = unsafe extern "C" fn(*const c_char) -> *mut RawSig;
type SigFreeFn = unsafe extern "C" fn(*mut RawSig);
type SigKeypairFn = unsafe extern "C" fn(*const RawSig, *mut u8, *mut u8) -> c_int;
type SigSignFn =
    unsafe extern "C" fn(*const RawSig, *mut u8, *mut usize, *const u8, usize, *const u8) -> c_int;
type SigVerifyFn =
    unsafe extern "C" fn(*const RawSig, *const u8, usize, *const u8, usize, *const u8) -> c_int;
type VersionFn = unsafe extern "C" fn() -> *const c_char;
type InitFn = unsafe extern "C" fn();

/// Resolved entry points
struct Api {
    kem_alg_is_enabled: AlgIsEnabledFn,
    kem_new: KemNewFn,
    kem_free: KemFreeFn,
    kem_keypair: KemKeypairFn,
    kem_encaps: KemEncapsFn,
    kem_decaps: KemDecapsFn,
    sig_alg_is_enabled: AlgIsEnabledFn,
    sig_new: SigNewFn,
    sig_free: SigFreeFn,
    sig_keypair: SigKeypairFn,
    sig_sign: SigSignFn,
    sig_verify: SigVerifyFn,
    version: VersionFn,
}

/// Look up a required symbol, copying the function pointer out
///
/// # Safety
///
/// `T` must be the correct function pointer type for `name`.
unsafe fn resolve<T: Copy>(library: &Library, name: &str) -> Result<T> {
    // SAFETY: the caller guarantees the signature.
    let symbol = unsafe { library.get::<T>(name.as_bytes()) }
        .map_err(|e| Error::ProviderUnavailable(format!("missing entry point {}: {}", name, e)))?;
    Ok(*symbol)
}

impl Api {
    fn resolve(library: &Library) -> Result<Self> {
        // SAFETY: each type alias matches the liboqs prototype of the same name.
        unsafe {
            Ok(Self {
                kem_alg_is_enabled: resolve(library, "OQS_KEM_alg_is_enabled")?,
                kem_new: resolve(library, "OQS_KEM_new")?,
                kem_free: resolve(library, "OQS_KEM_free")?,
                kem_keypair: resolve(library, "OQS_KEM_keypair")?,
                kem_encaps: resolve(library, "OQS_KEM_encaps")?,
                kem_decaps: resolve(library, "OQS_KEM_decaps")?,
                sig_alg_is_enabled: resolve(library, "OQS_SIG_alg_is_enabled")?,
                sig_new: resolve(library, "OQS_SIG_new")?,
                sig_free: resolve(library, "OQS_SIG_free")?,
                sig_keypair: resolve(library, "OQS_SIG_keypair")?,
                sig_sign: resolve(library, "OQS_SIG_sign")?,
                sig_verify: resolve(library, "OQS_SIG_verify")?,
                version: resolve(library, "OQS_version")?,
            })
        }
    }
}

fn status(rc: c_int) -> Status {
    if rc == OQS_SUCCESS {
        Status::Success
    } else {
        Status::Error
    }
}

/// A liboqs shared library
pub struct OqsProvider {
    api: Api,
    origin: ProviderOrigin,
    // Keeps the function pointers in `api` valid.
    _library: Library,
}

impl OqsProvider {
    /// Open liboqs at an explicit path
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ProviderUnavailable(format!("{} does not exist", path.display())));
        }
        // SAFETY: loading liboqs runs no initialisers with preconditions.
        let library = unsafe { Library::new(path) }
            .map_err(|e| Error::ProviderUnavailable(format!("{}: {}", path.display(), e)))?;
        Self::from_library(library, ProviderOrigin::Library(path.to_path_buf()))
    }

    /// Open liboqs through the system loader search path
    pub fn open_system(name: &str) -> Result<Self> {
        let filename = libloading::library_filename(name);
        // SAFETY: as for `open`.
        let library = unsafe { Library::new(&filename) }
            .map_err(|e| Error::ProviderUnavailable(format!("{}: {}", filename.to_string_lossy(), e)))?;
        Self::from_library(library, ProviderOrigin::System(filename.to_string_lossy().into_owned()))
    }

    fn from_library(library: Library, origin: ProviderOrigin) -> Result<Self> {
        let api = Api::resolve(&library)?;

        // SAFETY: OQS_init takes no arguments and may be called repeatedly.
        unsafe {
            if let Ok(init) = library.get::<InitFn>(b"OQS_init") {
                (*init)();
            }
        }

        debug!(%origin, "resolved liboqs entry points");
        Ok(Self {
            api,
            origin,
            _library: library,
        })
    }
}

impl Provider for OqsProvider {
    fn name(&self) -> &str {
        "liboqs"
    }

    fn version(&self) -> String {
        // SAFETY: OQS_version returns a pointer to a static string.
        unsafe {
            let raw = (self.api.version)();
            if raw.is_null() {
                return "unknown".to_string();
            }
            CStr::from_ptr(raw).to_string_lossy().into_owned()
        }
    }

    fn origin(&self) -> ProviderOrigin {
        self.origin.clone()
    }

    fn is_enabled(&self, kind: AlgorithmKind, name: &str) -> bool {
        let Ok(name) = CString::new(name) else {
            return false;
        };
        let check = match kind {
            AlgorithmKind::Kem => self.api.kem_alg_is_enabled,
            AlgorithmKind::Dsa => self.api.sig_alg_is_enabled,
        };
        // SAFETY: `name` is a valid NUL-terminated string.
        unsafe { check(name.as_ptr()) != 0 }
    }

    fn open_kem(&self, name: &str) -> Option<Box<dyn KemHandle + '_>> {
        let name = CString::new(name).ok()?;
        // SAFETY: `name` is NUL-terminated; a null return means not available.
        let raw = NonNull::new(unsafe { (self.api.kem_new)(name.as_ptr()) })?;
        // SAFETY: a non-null OQS_KEM is initialised by OQS_KEM_new.
        let fields = unsafe { raw.as_ref() };
        let lengths = KemLengths {
            public_key: fields.length_public_key,
            secret_key: fields.length_secret_key,
            ciphertext: fields.length_ciphertext,
            shared_secret: fields.length_shared_secret,
        };
        Some(Box::new(OqsKem {
            api: &self.api,
            raw,
            lengths,
        }))
    }

    fn open_sig(&self, name: &str) -> Option<Box<dyn SigHandle + '_>> {
        let name = CString::new(name).ok()?;
        // SAFETY: as in `open_kem`.
        let raw = NonNull::new(unsafe { (self.api.sig_new)(name.as_ptr()) })?;
        // SAFETY: a non-null OQS_SIG is initialised by OQS_SIG_new.
        let fields = unsafe { raw.as_ref() };
        let lengths = SigLengths {
            public_key: fields.length_public_key,
            secret_key: fields.length_secret_key,
            max_signature: fields.length_signature,
        };
        Some(Box::new(OqsSig {
            api: &self.api,
            raw,
            lengths,
        }))
    }
}

struct OqsKem<'a> {
    api: &'a Api,
    raw: NonNull<RawKem>,
    lengths: KemLengths,
}

impl KemHandle for OqsKem<'_> {
    fn lengths(&self) -> KemLengths {
        self.lengths
    }

    fn keypair(&self, public_key: &mut [u8], secret_key: &mut [u8]) -> Status {
        if public_key.len() != self.lengths.public_key || secret_key.len() != self.lengths.secret_key {
            return Status::Error;
        }
        // SAFETY: buffer lengths match the object's declared lengths.
        status(unsafe {
            (self.api.kem_keypair)(self.raw.as_ptr(), public_key.as_mut_ptr(), secret_key.as_mut_ptr())
        })
    }

    fn encaps(&self, ciphertext: &mut [u8], shared_secret: &mut [u8], public_key: &[u8]) -> Status {
        if ciphertext.len() != self.lengths.ciphertext
            || shared_secret.len() != self.lengths.shared_secret
            || public_key.len() != self.lengths.public_key
        {
            return Status::Error;
        }
        // SAFETY: buffer lengths match the object's declared lengths.
        status(unsafe {
            (self.api.kem_encaps)(
                self.raw.as_ptr(),
                ciphertext.as_mut_ptr(),
                shared_secret.as_mut_ptr(),
                public_key.as_ptr(),
            )
        })
    }

    fn decaps(&self, shared_secret: &mut [u8], ciphertext: &[u8], secret_key: &[u8]) -> Status {
        if shared_secret.len() != self.lengths.shared_secret
            || ciphertext.len() != self.lengths.ciphertext
            || secret_key.len() != self.lengths.secret_key
        {
            return Status::Error;
        }
        // SAFETY: buffer lengths match the object's declared lengths.
        status(unsafe {
            (self.api.kem_decaps)(
                self.raw.as_ptr(),
                shared_secret.as_mut_ptr(),
                ciphertext.as_ptr(),
                secret_key.as_ptr(),
            )
        })
    }
}

impl Drop for OqsKem<'_> {
    fn drop(&mut self) {
        // SAFETY: `raw` came from OQS_KEM_new and is freed exactly once.
        unsafe { (self.api.kem_free)(self.raw.as_ptr()) }
    }
}

struct OqsSig<'a> {
    api: &'a Api,
    raw: NonNull<RawSig>,
    lengths: SigLengths,
}

impl SigHandle for OqsSig<'_> {
    fn lengths(&self) -> SigLengths {
        self.lengths
    }

    fn keypair(&self, public_key: &mut [u8], secret_key: &mut [u8]) -> Status {
        if public_key.len() != self.lengths.public_key || secret_key.len() != self.lengths.secret_key {
            return Status::Error;
        }
        // SAFETY: buffer lengths match the object's declared lengths.
        status(unsafe {
            (self.api.sig_keypair)(self.raw.as_ptr(), public_key.as_mut_ptr(), secret_key.as_mut_ptr())
        })
    }

    fn sign(
        &self,
        signature: &mut [u8],
        signature_len: &mut usize,
        message: &[u8],
        secret_key: &[u8],
    ) -> Status {
        if signature.len() < self.lengths.max_signature || secret_key.len() != self.lengths.secret_key {
            return Status::Error;
        }
        let mut produced = 0usize;
        // SAFETY: `signature` holds at least the maximum signature length.
        let rc = unsafe {
            (self.api.sig_sign)(
                self.raw.as_ptr(),
                signature.as_mut_ptr(),
                &mut produced,
                message.as_ptr(),
                message.len(),
                secret_key.as_ptr(),
            )
        };
        if rc != OQS_SUCCESS || produced > signature.len() {
            return Status::Error;
        }
        *signature_len = produced;
        Status::Success
    }

    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> Status {
        if public_key.len() != self.lengths.public_key || signature.len() > self.lengths.max_signature {
            return Status::Error;
        }
        // SAFETY: input lengths are within the object's declared lengths.
        status(unsafe {
            (self.api.sig_verify)(
                self.raw.as_ptr(),
                message.as_ptr(),
                message.len(),
                signature.as_ptr(),
                signature.len(),
                public_key.as_ptr(),
            )
        })
    }
}

impl Drop for OqsSig<'_> {
    fn drop(&mut self) {
        // SAFETY: `raw` came from OQS_SIG_new and is freed exactly once.
        unsafe { (self.api.sig_free)(self.raw.as_ptr()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library() {
        let err = OqsProvider::open(Path::new("/nonexistent/liboqs.so")).err().unwrap();
        assert!(matches!(err, Error::ProviderUnavailable(_)));
    }

    #[test]
    fn test_struct_prefix_layout() {
        let word = std::mem::size_of::<usize>();
        assert_eq!(std::mem::offset_of!(RawKem, length_public_key), 3 * word);
        assert_eq!(std::mem::offset_of!(RawSig, length_signature), 5 * word);
    }
}
