use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pqc_lab::{
    core::crypto::{
        cipher::Cipher,
        provider::pqclean::PqcleanProvider,
        registry::{self, ML_DSA_65},
    },
    AlgorithmKind, HandshakeConfig, Initiator, PqcContext, Responder,
};

fn context() -> PqcContext {
    PqcContext::with_provider(Arc::new(PqcleanProvider::new())).unwrap()
}

fn benchmark_kem(c: &mut Criterion) {
    let ctx = context();
    let mut group = c.benchmark_group("kem");

    for spec in registry::list(AlgorithmKind::Kem) {
        group.bench_function(BenchmarkId::new("keypair", spec.name), |b| {
            b.iter(|| black_box(ctx.kem_keypair(spec).unwrap()));
        });

        let keypair = ctx.kem_keypair(spec).unwrap();
        group.bench_function(BenchmarkId::new("encapsulate", spec.name), |b| {
            b.iter(|| black_box(ctx.kem_encapsulate(spec, keypair.public.as_bytes()).unwrap()));
        });

        let encapsulated = ctx.kem_encapsulate(spec, keypair.public.as_bytes()).unwrap();
        group.bench_function(BenchmarkId::new("decapsulate", spec.name), |b| {
            b.iter(|| black_box(ctx.kem_decapsulate(spec, &encapsulated.ciphertext, &keypair.secret).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_signature(c: &mut Criterion) {
    let ctx = context();
    let mut group = c.benchmark_group("signature");
    let message = vec![0x42u8; 1024];

    for spec in registry::list(AlgorithmKind::Dsa) {
        group.bench_function(BenchmarkId::new("keypair", spec.name), |b| {
            b.iter(|| black_box(ctx.sig_keypair(spec).unwrap()));
        });

        let keypair = ctx.sig_keypair(spec).unwrap();
        group.bench_function(BenchmarkId::new("sign", spec.name), |b| {
            b.iter(|| black_box(ctx.sig_sign(spec, &message, &keypair.secret).unwrap()));
        });

        let signature = ctx.sig_sign(spec, &message, &keypair.secret).unwrap();
        group.bench_function(BenchmarkId::new("verify", spec.name), |b| {
            b.iter(|| {
                black_box(
                    ctx.sig_verify(spec, &message, signature.as_bytes(), keypair.public.as_bytes())
                        .unwrap(),
                )
            });
        });
    }

    group.finish();
}

fn benchmark_handshake(c: &mut Criterion) {
    let ctx = context();
    let client_id = Arc::new(ctx.sig_keypair(&ML_DSA_65).unwrap());
    let server_id = Arc::new(ctx.sig_keypair(&ML_DSA_65).unwrap());
    let client_config = HandshakeConfig::new(Arc::clone(&client_id), server_id.public.clone()).unwrap();
    let server_config = HandshakeConfig::new(Arc::clone(&server_id), client_id.public.clone()).unwrap();

    let mut group = c.benchmark_group("handshake");
    group.bench_function("in_memory", |b| {
        b.iter(|| {
            let mut initiator = Initiator::new(ctx.clone(), client_config.clone());
            let mut responder = Responder::new(ctx.clone(), server_config.clone()).unwrap();

            let hello = initiator.start().unwrap();
            let reply = responder.handle_client_hello(&hello).unwrap();
            let finish = initiator.handle_server_hello(&reply).unwrap();
            responder.handle_client_finish(&finish).unwrap();
            initiator.finish_sent().unwrap();
            black_box((initiator.into_session().unwrap(), responder.into_session().unwrap()));
        });
    });
    group.finish();
}

fn benchmark_record_cipher(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_cipher");
    let cipher = Cipher::new(&[0x11u8; 32]);

    for size in [64, 1024, 16384, 65_000].iter() {
        let data = vec![0x42u8; *size];
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("encrypt", size), &data, |b, data| {
            let mut counter = 0u64;
            b.iter(|| {
                counter += 1;
                black_box(cipher.encrypt(&Cipher::create_nonce(0x01, counter), data, b"\x04\x01").unwrap())
            });
        });

        let nonce = Cipher::create_nonce(0x02, 0);
        let sealed = cipher.encrypt(&nonce, &data, b"\x04\x01").unwrap();
        group.bench_with_input(BenchmarkId::new("decrypt", size), &sealed, |b, sealed| {
            b.iter(|| black_box(cipher.decrypt(&nonce, sealed, b"\x04\x01").unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = benchmark_kem, benchmark_signature, benchmark_handshake, benchmark_record_cipher
);
criterion_main!(benches);
