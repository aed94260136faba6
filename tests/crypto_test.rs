// tests/crypto_test.rs
use std::sync::Arc;

use pqc_lab::{
    core::{
        crypto::{
            provider::{self, pqclean::PqcleanProvider, ProviderSettings},
            registry::{self, ML_DSA_44, ML_DSA_65, ML_DSA_87, ML_KEM_1024, ML_KEM_512, ML_KEM_768},
        },
        error::BufferRole,
    },
    AlgorithmKind, Error, PqcContext, Result,
};

fn context() -> PqcContext {
    PqcContext::with_provider(Arc::new(PqcleanProvider::new())).unwrap()
}

#[test]
fn test_kem_round_trip_all_levels() -> Result<()> {
    let ctx = context();
    for spec in [&ML_KEM_512, &ML_KEM_768, &ML_KEM_1024] {
        let keypair = ctx.kem_keypair(spec)?;
        assert_eq!(keypair.public.len(), spec.public_key_len());
        assert_eq!(keypair.secret.len(), spec.secret_key_len());

        let encapsulated = ctx.kem_encapsulate(spec, keypair.public.as_bytes())?;
        let lengths = spec.kem().unwrap();
        assert_eq!(encapsulated.ciphertext.len(), lengths.ciphertext);

        let recovered = ctx.kem_decapsulate(spec, &encapsulated.ciphertext, &keypair.secret)?;
        assert_eq!(recovered, encapsulated.shared_secret, "{} shared secrets differ", spec.name);
        assert_eq!(recovered.len(), lengths.shared_secret);
    }
    Ok(())
}

#[test]
fn test_sign_verify_all_levels() -> Result<()> {
    let ctx = context();
    let message = b"post-quantum readiness";
    for spec in [&ML_DSA_44, &ML_DSA_65, &ML_DSA_87] {
        let keypair = ctx.sig_keypair(spec)?;
        let signature = ctx.sig_sign(spec, message, &keypair.secret)?;
        assert!(!signature.is_empty());
        assert!(signature.len() <= spec.dsa().unwrap().max_signature);
        assert!(ctx.sig_verify(spec, message, signature.as_bytes(), keypair.public.as_bytes())?);
    }
    Ok(())
}

#[test]
fn test_mutations_fail_verification() -> Result<()> {
    let ctx = context();
    let keypair = ctx.sig_keypair(&ML_DSA_65)?;
    let message = b"transfer 10 coins".to_vec();
    let signature = ctx.sig_sign(&ML_DSA_65, &message, &keypair.secret)?;

    for at in [0, 10, signature.len() / 2, signature.len() - 1] {
        let mut bad_signature = signature.as_bytes().to_vec();
        bad_signature[at] ^= 0x01;
        assert!(
            !ctx.sig_verify(&ML_DSA_65, &message, &bad_signature, keypair.public.as_bytes())?,
            "flipping signature byte {} went unnoticed",
            at
        );
    }

    let mut bad_message = message.clone();
    bad_message[0] ^= 0x80;
    assert!(!ctx.sig_verify(&ML_DSA_65, &bad_message, signature.as_bytes(), keypair.public.as_bytes())?);

    let other = ctx.sig_keypair(&ML_DSA_65)?;
    assert!(!ctx.sig_verify(&ML_DSA_65, &message, signature.as_bytes(), other.public.as_bytes())?);
    Ok(())
}

#[test]
fn test_wrong_length_buffers() -> Result<()> {
    let ctx = context();

    let err = ctx.kem_encapsulate(&ML_KEM_768, &[0u8; 800]).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidKeyLength {
            role: BufferRole::PublicKey,
            expected: 1184,
            actual: 800,
            ..
        }
    ));

    let keypair = ctx.kem_keypair(&ML_KEM_768)?;
    let err = ctx.kem_decapsulate(&ML_KEM_768, &[0u8; 10], &keypair.secret).unwrap_err();
    assert!(matches!(err, Error::InvalidKeyLength { role: BufferRole::Ciphertext, .. }));

    let signer = ctx.sig_keypair(&ML_DSA_44)?;
    let err = ctx.sig_verify(&ML_DSA_44, b"m", &[], signer.public.as_bytes()).unwrap_err();
    assert!(matches!(err, Error::InvalidKeyLength { role: BufferRole::Signature, .. }));
    Ok(())
}

#[test]
fn test_kind_mismatch_is_rejected() {
    let ctx = context();
    assert!(ctx.kem_keypair(&ML_DSA_44).is_err());
    assert!(ctx.sig_keypair(&ML_KEM_512).is_err());
}

#[test]
fn test_unavailable_provider_keeps_catalog() {
    let ctx = PqcContext::unavailable("no liboqs in test");
    assert!(!ctx.is_available());
    assert!(matches!(ctx.kem_keypair(&ML_KEM_768), Err(Error::ProviderUnavailable(_))));
    assert!(matches!(ctx.sig_keypair(&ML_DSA_65), Err(Error::ProviderUnavailable(_))));

    assert_eq!(registry::list(AlgorithmKind::Kem).len(), 3);
    assert_eq!(registry::list(AlgorithmKind::Dsa).len(), 3);
    assert!(ctx.supported(AlgorithmKind::Kem).is_empty());
    assert!(!ctx.is_supported(AlgorithmKind::Dsa, "mldsa65"));
}

#[test]
fn test_builtin_provider_supports_catalog() {
    let ctx = context();
    assert_eq!(ctx.supported(AlgorithmKind::Kem).len(), 3);
    assert_eq!(ctx.supported(AlgorithmKind::Dsa).len(), 3);
    assert!(ctx.is_supported(AlgorithmKind::Kem, "ML-KEM-1024"));
    assert!(!ctx.is_supported(AlgorithmKind::Kem, "ML-DSA-44"));
    assert!(!ctx.is_supported(AlgorithmKind::Kem, "kyber768"));
}

#[test]
fn test_missing_configured_library_is_fatal() {
    let settings = ProviderSettings {
        liboqs_path: Some("/nonexistent/liboqs.so".into()),
        allow_builtin: true,
    };
    assert!(matches!(provider::load_provider(&settings), Err(Error::ProviderUnavailable(_))));
}
