/*!
Compiled-in provider backed by the PQClean implementations in the
`pqcrypto` crate family.

This is the last discovery candidate. It exposes the same status-coded,
caller-allocated surface as the liboqs backend so the binding above it does
not care which one it talks to.
*/

use zeroize::Zeroize;

use super::{KemHandle, Provider, ProviderOrigin, SigHandle, Status};
use crate::core::crypto::registry::{AlgorithmKind, KemLengths, SigLengths};

/// Copy `src` into `dst`, which must be exactly the same size
fn fill(dst: &mut [u8], src: &[u8]) -> Status {
    if dst.len() != src.len() {
        return Status::Error;
    }
    dst.copy_from_slice(src);
    Status::Success
}

/// Zero a `pqcrypto` value in place
///
/// # Safety
///
/// `T` must be plain bytes with no padding, such as the `[u8; N]` newtypes
/// `pqcrypto` uses for keys and shared secrets.
unsafe fn wipe<T: Copy>(value: &mut T) {
    // SAFETY: the caller guarantees every byte of `T` is an initialized u8.
    let bytes = unsafe { std::slice::from_raw_parts_mut((value as *mut T).cast::<u8>(), std::mem::size_of::<T>()) };
    bytes.zeroize();
}

impl Status {
    fn and(self, next: impl FnOnce() -> Status) -> Status {
        match self {
            Status::Success => next(),
            Status::Error => Status::Error,
        }
    }
}

struct KemEntry {
    name: &'static str,
    lengths: fn() -> KemLengths,
    keypair: fn(&mut [u8], &mut [u8]) -> Status,
    encaps: fn(&mut [u8], &mut [u8], &[u8]) -> Status,
    decaps: fn(&mut [u8], &[u8], &[u8]) -> Status,
}

struct SigEntry {
    name: &'static str,
    lengths: fn() -> SigLengths,
    keypair: fn(&mut [u8], &mut [u8]) -> Status,
    sign: fn(&mut [u8], &mut usize, &[u8], &[u8]) -> Status,
    verify: fn(&[u8], &[u8], &[u8]) -> Status,
}

macro_rules! kem_backend {
    ($module:ident) => {
        mod $module {
            use super::*;
            use pqcrypto_mlkem::$module as alg;
            use pqcrypto_traits::kem::{Ciphertext as _, PublicKey as _, SecretKey as _, SharedSecret as _};

            pub(super) fn lengths() -> KemLengths {
                KemLengths {
                    public_key: alg::public_key_bytes(),
                    secret_key: alg::secret_key_bytes(),
                    ciphertext: alg::ciphertext_bytes(),
                    shared_secret: alg::shared_secret_bytes(),
                }
            }

            pub(super) fn keypair(public_key: &mut [u8], secret_key: &mut [u8]) -> Status {
                let (pk, mut sk) = alg::keypair();
                let status = fill(public_key, pk.as_bytes()).and(|| fill(secret_key, sk.as_bytes()));
                // SAFETY: `alg::SecretKey` wraps a byte array.
                unsafe { wipe(&mut sk) };
                status
            }

            pub(super) fn encaps(ciphertext: &mut [u8], shared_secret: &mut [u8], public_key: &[u8]) -> Status {
                let Ok(pk) = alg::PublicKey::from_bytes(public_key) else {
                    return Status::Error;
                };
                let (mut ss, ct) = alg::encapsulate(&pk);
                let status = fill(ciphertext, ct.as_bytes()).and(|| fill(shared_secret, ss.as_bytes()));
                // SAFETY: `alg::SharedSecret` wraps a byte array.
                unsafe { wipe(&mut ss) };
                status
            }

            pub(super) fn decaps(shared_secret: &mut [u8], ciphertext: &[u8], secret_key: &[u8]) -> Status {
                let Ok(ct) = alg::Ciphertext::from_bytes(ciphertext) else {
                    return Status::Error;
                };
                let Ok(mut sk) = alg::SecretKey::from_bytes(secret_key) else {
                    return Status::Error;
                };
                let mut ss = alg::decapsulate(&ct, &sk);
                let status = fill(shared_secret, ss.as_bytes());
                // SAFETY: both wrap byte arrays.
                unsafe {
                    wipe(&mut sk);
                    wipe(&mut ss);
                }
                status
            }
        }
    };
}

macro_rules! sig_backend {
    ($module:ident) => {
        mod $module {
            use super::*;
            use pqcrypto_mldsa::$module as alg;
            use pqcrypto_traits::sign::{DetachedSignature as _, PublicKey as _, SecretKey as _};

            pub(super) fn lengths() -> SigLengths {
                SigLengths {
                    public_key: alg::public_key_bytes(),
                    secret_key: alg::secret_key_bytes(),
                    max_signature: alg::signature_bytes(),
                }
            }

            pub(super) fn keypair(public_key: &mut [u8], secret_key: &mut [u8]) -> Status {
                let (pk, mut sk) = alg::keypair();
                let status = fill(public_key, pk.as_bytes()).and(|| fill(secret_key, sk.as_bytes()));
                // SAFETY: `alg::SecretKey` wraps a byte array.
                unsafe { wipe(&mut sk) };
                status
            }

            pub(super) fn sign(
                signature: &mut [u8],
                signature_len: &mut usize,
                message: &[u8],
                secret_key: &[u8],
            ) -> Status {
                let Ok(mut sk) = alg::SecretKey::from_bytes(secret_key) else {
                    return Status::Error;
                };
                let sig = alg::detached_sign(message, &sk);
                // SAFETY: `alg::SecretKey` wraps a byte array.
                unsafe { wipe(&mut sk) };
                let produced = sig.as_bytes();
                if produced.len() > signature.len() {
                    return Status::Error;
                }
                signature[..produced.len()].copy_from_slice(produced);
                *signature_len = produced.len();
                Status::Success
            }

            pub(super) fn verify(message: &[u8], signature: &[u8], public_key: &[u8]) -> Status {
                let (Ok(sig), Ok(pk)) = (
                    alg::DetachedSignature::from_bytes(signature),
                    alg::PublicKey::from_bytes(public_key),
                ) else {
                    return Status::Error;
                };
                match alg::verify_detached_signature(&sig, message, &pk) {
                    Ok(()) => Status::Success,
                    Err(_) => Status::Error,
                }
            }
        }
    };
}

kem_backend!(mlkem512);
kem_backend!(mlkem768);
kem_backend!(mlkem1024);
sig_backend!(mldsa44);
sig_backend!(mldsa65);
sig_backend!(mldsa87);

static KEMS: [KemEntry; 3] = [
    KemEntry {
        name: "ML-KEM-512",
        lengths: mlkem512::lengths,
        keypair: mlkem512::keypair,
        encaps: mlkem512::encaps,
        decaps: mlkem512::decaps,
    },
    KemEntry {
        name: "ML-KEM-768",
        lengths: mlkem768::lengths,
        keypair: mlkem768::keypair,
        encaps: mlkem768::encaps,
        decaps: mlkem768::decaps,
    },
    KemEntry {
        name: "ML-KEM-1024",
        lengths: mlkem1024::lengths,
        keypair: mlkem1024::keypair,
        encaps: mlkem1024::encaps,
        decaps: mlkem1024::decaps,
    },
];

static SIGS: [SigEntry; 3] = [
    SigEntry {
        name: "ML-DSA-44",
        lengths: mldsa44::lengths,
        keypair: mldsa44::keypair,
        sign: mldsa44::sign,
        verify: mldsa44::verify,
    },
    SigEntry {
        name: "ML-DSA-65",
        lengths: mldsa65::lengths,
        keypair: mldsa65::keypair,
        sign: mldsa65::sign,
        verify: mldsa65::verify,
    },
    SigEntry {
        name: "ML-DSA-87",
        lengths: mldsa87::lengths,
        keypair: mldsa87::keypair,
        sign: mldsa87::sign,
        verify: mldsa87::verify,
    },
];

struct PqcleanKem(&'static KemEntry);

impl KemHandle for PqcleanKem {
    fn lengths(&self) -> KemLengths {
        (self.0.lengths)()
    }

    fn keypair(&self, public_key: &mut [u8], secret_key: &mut [u8]) -> Status {
        (self.0.keypair)(public_key, secret_key)
    }

    fn encaps(&self, ciphertext: &mut [u8], shared_secret: &mut [u8], public_key: &[u8]) -> Status {
        (self.0.encaps)(ciphertext, shared_secret, public_key)
    }

    fn decaps(&self, shared_secret: &mut [u8], ciphertext: &[u8], secret_key: &[u8]) -> Status {
        (self.0.decaps)(shared_secret, ciphertext, secret_key)
    }
}

struct PqcleanSig(&'static SigEntry);

impl SigHandle for PqcleanSig {
    fn lengths(&self) -> SigLengths {
        (self.0.lengths)()
    }

    fn keypair(&self, public_key: &mut [u8], secret_key: &mut [u8]) -> Status {
        (self.0.keypair)(public_key, secret_key)
    }

    fn sign(
        &self,
        signature: &mut [u8],
        signature_len: &mut usize,
        message: &[u8],
        secret_key: &[u8],
    ) -> Status {
        (self.0.sign)(signature, signature_len, message, secret_key)
    }

    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> Status {
        (self.0.verify)(message, signature, public_key)
    }
}

/// Provider compiled into the binary
#[derive(Debug, Default, Clone, Copy)]
pub struct PqcleanProvider;

impl PqcleanProvider {
    /// Create the builtin provider
    pub fn new() -> Self {
        Self
    }
}

impl Provider for PqcleanProvider {
    fn name(&self) -> &str {
        "pqclean"
    }

    fn version(&self) -> String {
        concat!("pqcrypto (PQClean), pqc-lab ", env!("CARGO_PKG_VERSION")).to_string()
    }

    fn origin(&self) -> ProviderOrigin {
        ProviderOrigin::Builtin
    }

    fn is_enabled(&self, kind: AlgorithmKind, name: &str) -> bool {
        match kind {
            AlgorithmKind::Kem => KEMS.iter().any(|entry| entry.name == name),
            AlgorithmKind::Dsa => SIGS.iter().any(|entry| entry.name == name),
        }
    }

    fn open_kem(&self, name: &str) -> Option<Box<dyn KemHandle + '_>> {
        KEMS.iter()
            .find(|entry| entry.name == name)
            .map(|entry| Box::new(PqcleanKem(entry)) as Box<dyn KemHandle>)
    }

    fn open_sig(&self, name: &str) -> Option<Box<dyn SigHandle + '_>> {
        SIGS.iter()
            .find(|entry| entry.name == name)
            .map(|entry| Box::new(PqcleanSig(entry)) as Box<dyn SigHandle>)
    }
}
