use std::sync::Arc;
use std::time::Duration;

use pqc_lab::{
    bench::BenchStats,
    core::{
        constants::{FRAME_HEADER_SIZE, MAX_FRAME_SIZE},
        crypto::{
            cipher::Cipher,
            provider::pqclean::PqcleanProvider,
            registry::{ML_DSA_44, ML_KEM_512},
        },
        message::{frame, split_payload, ClientFinish, ClientHello, MessageType, ServerHello},
    },
    PqcContext,
};

use proptest::prelude::*;

// Arbitrary bytes, sized like handshake payloads
fn payloads() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..4096)
}

fn message_types() -> impl Strategy<Value = MessageType> {
    prop_oneof![
        Just(MessageType::ClientHello),
        Just(MessageType::ServerHello),
        Just(MessageType::ClientFinish),
        Just(MessageType::Data),
        Just(MessageType::Close),
    ]
}

proptest! {
    #[test]
    fn prop_decoders_never_panic(bytes in payloads()) {
        let _ = split_payload(&bytes);
        let _ = ClientHello::decode(&bytes);
        let _ = ServerHello::decode(&bytes);
        let _ = ClientFinish::decode(&bytes, &ML_KEM_512);
    }

    #[test]
    fn prop_decoders_reject_foreign_types(msg_type in message_types(), body in payloads()) {
        let mut payload = vec![msg_type.as_u8(), pqc_lab::VERSION];
        payload.extend_from_slice(&body);
        if msg_type != MessageType::ClientHello {
            prop_assert!(ClientHello::decode(&payload).is_err());
        }
        if msg_type != MessageType::ServerHello {
            prop_assert!(ServerHello::decode(&payload).is_err());
        }
        let (decoded, rest) = split_payload(&payload).unwrap();
        prop_assert_eq!(decoded, msg_type);
        prop_assert_eq!(rest, &body[..]);
    }

    #[test]
    fn prop_frame_limit_enforced(len in 1usize..=(2 * MAX_FRAME_SIZE), max in 1024usize..=MAX_FRAME_SIZE) {
        let header: [u8; FRAME_HEADER_SIZE] = (len as u32).to_be_bytes();
        let decoded = frame::decode_header(&header, max);
        if len <= max {
            prop_assert_eq!(decoded.unwrap(), len);
        } else {
            prop_assert!(decoded.is_err());
        }
    }

    #[test]
    fn prop_ciphertext_bit_flip_rejected(
        data in prop::collection::vec(any::<u8>(), 0..512),
        counter in any::<u64>(),
        flip in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let cipher = Cipher::new(&[7u8; 32]);
        let nonce = Cipher::create_nonce(0x01, counter);
        let mut sealed = cipher.encrypt(&nonce, &data, b"aad").unwrap();
        prop_assert_eq!(cipher.decrypt(&nonce, &sealed, b"aad").unwrap(), data);

        let at = flip.index(sealed.len());
        sealed[at] ^= 1 << bit;
        prop_assert!(cipher.decrypt(&nonce, &sealed, b"aad").is_err());
    }

    #[test]
    fn prop_stats_are_ordered(samples in prop::collection::vec(1u64..1_000_000, 1..200)) {
        let durations: Vec<Duration> = samples.iter().map(|us| Duration::from_micros(*us)).collect();
        let stats = BenchStats::from_samples(&durations).unwrap();
        prop_assert_eq!(stats.samples, samples.len());
        prop_assert!(stats.min_us <= stats.median_us && stats.median_us <= stats.max_us);
        prop_assert!(stats.mean_us >= stats.min_us - 1e-6 && stats.mean_us <= stats.max_us + 1e-6);
        prop_assert!(stats.p95_us <= stats.p99_us && stats.p99_us <= stats.max_us);
        prop_assert!(stats.std_dev_us >= 0.0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_message_mutation_fails_verify(
        message in prop::collection::vec(any::<u8>(), 1..256),
        flip in any::<prop::sample::Index>(),
    ) {
        let ctx = PqcContext::with_provider(Arc::new(PqcleanProvider::new())).unwrap();
        let keypair = ctx.sig_keypair(&ML_DSA_44).unwrap();
        let signature = ctx.sig_sign(&ML_DSA_44, &message, &keypair.secret).unwrap();
        prop_assert!(ctx.sig_verify(&ML_DSA_44, &message, signature.as_bytes(), keypair.public.as_bytes()).unwrap());

        let mut tampered = message.clone();
        let at = flip.index(tampered.len());
        tampered[at] ^= 0x01;
        prop_assert!(!ctx.sig_verify(&ML_DSA_44, &tampered, signature.as_bytes(), keypair.public.as_bytes()).unwrap());
    }

    #[test]
    fn prop_signature_mutation_fails_verify(
        message in prop::collection::vec(any::<u8>(), 0..256),
        flip in any::<prop::sample::Index>(),
        mask in 1u8..=u8::MAX,
    ) {
        let ctx = PqcContext::with_provider(Arc::new(PqcleanProvider::new())).unwrap();
        let keypair = ctx.sig_keypair(&ML_DSA_44).unwrap();
        let signature = ctx.sig_sign(&ML_DSA_44, &message, &keypair.secret).unwrap();

        let mut tampered = signature.as_bytes().to_vec();
        let at = flip.index(tampered.len());
        tampered[at] ^= mask;
        prop_assert!(!ctx.sig_verify(&ML_DSA_44, &message, &tampered, keypair.public.as_bytes()).unwrap());
    }
}
