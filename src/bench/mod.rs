/*!
Benchmark harness.

[`run`] times repeated calls to one provider operation. Anything the
operation needs (keys, a ciphertext, a signature) is prepared once before
timing starts, warm-up calls are discarded, and each measured sample covers
exactly one operation.
*/

pub mod report;
pub mod stats;

use std::fmt;
use std::hint::black_box;
use std::str::FromStr;
use std::time::{Duration, Instant};

use rand::RngCore;
use tracing::debug;

pub use report::{BenchReport, BenchResult, ReportFormat};
pub use stats::BenchStats;

use crate::core::{
    crypto::{AlgorithmKind, AlgorithmSpec, Keypair, PqcContext, Signature},
    error::{Error, Operation, Result},
};

/// Size of the random message signed and verified by DSA benchmarks
pub const MESSAGE_SIZE: usize = 1024;

/// An operation the harness can time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum BenchOperation {
    KemKeypair,
    KemEncapsulate,
    KemDecapsulate,
    #[value(name = "dsa-keypair")]
    SigKeypair,
    #[value(name = "dsa-sign")]
    SigSign,
    #[value(name = "dsa-verify")]
    SigVerify,
}

impl BenchOperation {
    /// The algorithm kind the operation applies to
    pub fn kind(self) -> AlgorithmKind {
        match self {
            BenchOperation::KemKeypair | BenchOperation::KemEncapsulate | BenchOperation::KemDecapsulate => {
                AlgorithmKind::Kem
            }
            BenchOperation::SigKeypair | BenchOperation::SigSign | BenchOperation::SigVerify => {
                AlgorithmKind::Dsa
            }
        }
    }

    /// Every operation of `kind`
    pub fn for_kind(kind: AlgorithmKind) -> &'static [BenchOperation] {
        match kind {
            AlgorithmKind::Kem => &[
                BenchOperation::KemKeypair,
                BenchOperation::KemEncapsulate,
                BenchOperation::KemDecapsulate,
            ],
            AlgorithmKind::Dsa => &[
                BenchOperation::SigKeypair,
                BenchOperation::SigSign,
                BenchOperation::SigVerify,
            ],
        }
    }

    /// Short label used in reports
    pub fn label(self) -> &'static str {
        match self {
            BenchOperation::KemKeypair | BenchOperation::SigKeypair => "keypair",
            BenchOperation::KemEncapsulate => "encapsulate",
            BenchOperation::KemDecapsulate => "decapsulate",
            BenchOperation::SigSign => "sign",
            BenchOperation::SigVerify => "verify",
        }
    }
}

impl fmt::Display for BenchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind().to_string().to_ascii_lowercase(), self.label())
    }
}

impl FromStr for BenchOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [
            BenchOperation::KemKeypair,
            BenchOperation::KemEncapsulate,
            BenchOperation::KemDecapsulate,
            BenchOperation::SigKeypair,
            BenchOperation::SigSign,
            BenchOperation::SigVerify,
        ]
        .into_iter()
        .find(|op| op.to_string().eq_ignore_ascii_case(s))
        .ok_or_else(|| Error::Config(format!("unknown benchmark operation: {}", s)))
    }
}

/// Inputs prepared outside the measured region
enum Prepared {
    Nothing,
    Keys(Keypair),
    Ciphertext(Keypair, Vec<u8>),
    Message(Keypair, Vec<u8>),
    Signed(Keypair, Vec<u8>, Signature),
}

fn random_message() -> Vec<u8> {
    let mut message = vec![0u8; MESSAGE_SIZE];
    rand::rng().fill_bytes(&mut message);
    message
}

fn prepare(ctx: &PqcContext, op: BenchOperation, spec: &'static AlgorithmSpec) -> Result<Prepared> {
    Ok(match op {
        BenchOperation::KemKeypair | BenchOperation::SigKeypair => Prepared::Nothing,
        BenchOperation::KemEncapsulate => Prepared::Keys(ctx.kem_keypair(spec)?),
        BenchOperation::KemDecapsulate => {
            let keys = ctx.kem_keypair(spec)?;
            let ciphertext = ctx.kem_encapsulate(spec, keys.public.as_bytes())?.ciphertext;
            Prepared::Ciphertext(keys, ciphertext)
        }
        BenchOperation::SigSign => {
            let keys = ctx.sig_keypair(spec)?;
            Prepared::Message(keys, random_message())
        }
        BenchOperation::SigVerify => {
            let keys = ctx.sig_keypair(spec)?;
            let message = random_message();
            let signature = ctx.sig_sign(spec, &message, &keys.secret)?;
            Prepared::Signed(keys, message, signature)
        }
    })
}

fn invoke(ctx: &PqcContext, op: BenchOperation, spec: &'static AlgorithmSpec, input: &Prepared) -> Result<()> {
    match (op, input) {
        (BenchOperation::KemKeypair, _) => {
            black_box(ctx.kem_keypair(spec)?);
        }
        (BenchOperation::SigKeypair, _) => {
            black_box(ctx.sig_keypair(spec)?);
        }
        (BenchOperation::KemEncapsulate, Prepared::Keys(keys)) => {
            black_box(ctx.kem_encapsulate(spec, keys.public.as_bytes())?);
        }
        (BenchOperation::KemDecapsulate, Prepared::Ciphertext(keys, ciphertext)) => {
            black_box(ctx.kem_decapsulate(spec, ciphertext, &keys.secret)?);
        }
        (BenchOperation::SigSign, Prepared::Message(keys, message)) => {
            black_box(ctx.sig_sign(spec, message, &keys.secret)?);
        }
        (BenchOperation::SigVerify, Prepared::Signed(keys, message, signature)) => {
            let valid = ctx.sig_verify(spec, message, signature.as_bytes(), keys.public.as_bytes())?;
            if !black_box(valid) {
                return Err(Error::ProviderOperationFailed {
                    operation: Operation::SigVerify,
                    algorithm: spec.name,
                });
            }
        }
        _ => {
            return Err(Error::Protocol(format!("inputs for {} were not prepared", op)));
        }
    }
    Ok(())
}

/// Time `iterations` calls of `op`, after `warmup` unmeasured calls
pub fn run(
    ctx: &PqcContext,
    op: BenchOperation,
    spec: &'static AlgorithmSpec,
    iterations: usize,
    warmup: usize,
) -> Result<Vec<Duration>> {
    if op.kind() != spec.kind() {
        return Err(Error::UnsupportedAlgorithm(format!(
            "{} cannot run {}",
            spec.name, op
        )));
    }
    if iterations == 0 {
        return Err(Error::Config("benchmark iterations must be at least 1".into()));
    }

    let input = prepare(ctx, op, spec)?;
    for _ in 0..warmup {
        invoke(ctx, op, spec, &input)?;
    }

    let mut samples = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let start = Instant::now();
        invoke(ctx, op, spec, &input)?;
        samples.push(start.elapsed());
    }

    debug!(algorithm = spec.name, operation = %op, iterations, warmup, "benchmark finished");
    Ok(samples)
}

/// Run `op` and summarise it as a report entry
pub fn measure(
    ctx: &PqcContext,
    op: BenchOperation,
    spec: &'static AlgorithmSpec,
    iterations: usize,
    warmup: usize,
) -> Result<BenchResult> {
    let samples = run(ctx, op, spec, iterations, warmup)?;
    let stats = BenchStats::from_samples(&samples)
        .ok_or_else(|| Error::Config("benchmark produced no samples".into()))?;
    Ok(BenchResult {
        algorithm: spec.name.to_string(),
        kind: spec.kind().to_string(),
        operation: op.label().to_string(),
        iterations,
        warmup,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::{
        provider::pqclean::PqcleanProvider,
        registry::{ML_DSA_44, ML_KEM_512},
    };
    use std::sync::Arc;

    fn context() -> PqcContext {
        PqcContext::with_provider(Arc::new(PqcleanProvider::new())).unwrap()
    }

    #[test]
    fn test_run_returns_one_sample_per_iteration() {
        let ctx = context();
        for op in BenchOperation::for_kind(AlgorithmKind::Kem) {
            assert_eq!(run(&ctx, *op, &ML_KEM_512, 3, 1).unwrap().len(), 3);
        }
        for op in BenchOperation::for_kind(AlgorithmKind::Dsa) {
            assert_eq!(run(&ctx, *op, &ML_DSA_44, 2, 0).unwrap().len(), 2);
        }
    }

    #[test]
    fn test_mismatched_kind() {
        let ctx = context();
        assert!(run(&ctx, BenchOperation::SigSign, &ML_KEM_512, 1, 0).is_err());
    }

    #[test]
    fn test_zero_iterations() {
        let ctx = context();
        assert!(run(&ctx, BenchOperation::KemKeypair, &ML_KEM_512, 0, 0).is_err());
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(BenchOperation::KemEncapsulate.to_string(), "kem-encapsulate");
        assert_eq!("dsa-sign".parse::<BenchOperation>().unwrap(), BenchOperation::SigSign);
    }

    #[test]
    fn test_unavailable_provider() {
        let ctx = PqcContext::unavailable("none");
        assert!(matches!(
            run(&ctx, BenchOperation::KemKeypair, &ML_KEM_512, 1, 0),
            Err(Error::ProviderUnavailable(_))
        ));
    }
}
