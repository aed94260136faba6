/*!
Handlers behind each subcommand.

Results go to stdout; diagnostics go through `tracing` to stderr.
*/

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::{BenchArgs, ClientArgs, EndpointArgs, KeygenArgs, ServerArgs, SignArgs, VerifyArgs};
use crate::bench::{self, BenchOperation, BenchReport, ReportFormat};
use crate::core::{
    config::LabConfig,
    constants::{defaults, VERSION},
    crypto::{registry, AlgorithmKind, AlgorithmSpec, PqcContext},
    error::{AuthError, Error, Result},
    keys::{files, KeyLayout, KeyManager},
    session::{EstablishedSession, HandshakeConfig},
};
use crate::protocol::{Connection, PqcClient, PqcServer};

pub fn keygen(config: &LabConfig, args: &KeygenArgs) -> Result<()> {
    let spec = registry::lookup(&args.alg)?;
    let mut layout = KeyLayout::from_config(&config.file);
    if let Some(dir) = &args.out {
        layout = layout.in_dir(dir);
    }
    if let Some(prefix) = &args.prefix {
        layout.prefix = prefix.clone();
    }
    let public_path = args.public.clone().unwrap_or_else(|| layout.public_path(spec));
    let private_path = args.private.clone().unwrap_or_else(|| layout.private_path(spec));

    let manager = KeyManager::new(PqcContext::load(&config.provider_settings())?);
    let keypair = manager.generate(spec.kind(), spec.name)?;
    files::save_keypair(&keypair, &public_path, &private_path)?;
    KeyManager::release(keypair);

    println!("{} {} keypair", spec.name, spec.kind());
    println!("  public:  {} ({} bytes)", public_path.display(), spec.public_key_len());
    println!("  private: {} ({} bytes)", private_path.display(), spec.secret_key_len());
    Ok(())
}

pub fn sign(config: &LabConfig, args: &SignArgs) -> Result<()> {
    let spec = registry::lookup_kind(AlgorithmKind::Dsa, &args.alg)?;
    let ctx = PqcContext::load(&config.provider_settings())?;
    let secret = files::load_secret_key(spec, &args.private)?;
    let message = fs::read(&args.input)?;

    let signature = ctx.sig_sign(spec, &message, &secret)?;
    let sig_path = signature_path(args.sig.as_deref(), &args.input, config);
    files::save_signature(&signature, &sig_path)?;

    println!("{} signature ({} bytes) written to {}", spec.name, signature.len(), sig_path.display());
    Ok(())
}

pub fn verify(config: &LabConfig, args: &VerifyArgs) -> Result<()> {
    let spec = registry::lookup_kind(AlgorithmKind::Dsa, &args.alg)?;
    let ctx = PqcContext::load(&config.provider_settings())?;
    let public = files::load_public_key(spec, &args.public)?;
    let sig_path = signature_path(args.sig.as_deref(), &args.input, config);
    let signature = files::load_signature(spec, &sig_path)?;
    let message = fs::read(&args.input)?;

    if ctx.sig_verify(spec, &message, signature.as_bytes(), public.as_bytes())? {
        println!("OK");
        Ok(())
    } else {
        println!("FAILED");
        Err(Error::Authentication(AuthError::SignatureVerificationFailed))
    }
}

pub fn bench(config: &LabConfig, args: &BenchArgs) -> Result<()> {
    let ctx = PqcContext::load(&config.provider_settings())?;
    let provider = ctx.provider()?;
    let iterations = args.count.unwrap_or(config.benchmark.default_iterations);
    let warmup = args.warmup.unwrap_or(config.benchmark.warmup_iterations);
    let format = args.format.unwrap_or(config.benchmark.output_format);

    let algorithms: Vec<&'static AlgorithmSpec> = match &args.alg {
        Some(name) => vec![registry::lookup(name)?],
        None => {
            let mut all = ctx.supported(AlgorithmKind::Kem);
            all.extend(ctx.supported(AlgorithmKind::Dsa));
            all.retain(|spec| args.op.is_none_or(|op| op.kind() == spec.kind()));
            all
        }
    };

    let mut report = BenchReport::new(provider.name(), provider.version());
    for spec in algorithms {
        let ops: Vec<BenchOperation> = match args.op {
            Some(op) => vec![op],
            None => BenchOperation::for_kind(spec.kind()).to_vec(),
        };
        for op in ops {
            info!(algorithm = spec.name, operation = %op, iterations, "benchmarking");
            report.push(bench::measure(&ctx, op, spec, iterations, warmup)?);
        }
    }

    print!("{}", report.render(format)?);

    let output = args.output.clone().or_else(|| {
        config
            .benchmark
            .save_results
            .then(|| config.file.artifacts_dir.join(format!("benchmark-results.{}", extension(format))))
    });
    if let Some(path) = output {
        report.save(&path, format)?;
        info!(path = %path.display(), "benchmark report saved");
    }
    Ok(())
}

pub fn handshake_server(config: &LabConfig, args: &ServerArgs) -> Result<()> {
    let endpoint = &args.endpoint;
    let ctx = PqcContext::load(&config.provider_settings())?;
    let handshake = handshake_config(config, endpoint)?;
    let addr = address(config, endpoint);

    let server = PqcServer::bind(addr.as_str(), ctx, handshake)?
        .with_timeout(timeout(config, endpoint)?)
        .with_max_frame_len(config.network.max_frame_len);
    println!("listening on {}", server.local_addr()?);

    if args.once {
        let conn = server.accept()?;
        return receive(conn);
    }
    server.serve(receive)
}

pub fn handshake_client(config: &LabConfig, args: &ClientArgs) -> Result<()> {
    let endpoint = &args.endpoint;
    let ctx = PqcContext::load(&config.provider_settings())?;
    let handshake = handshake_config(config, endpoint)?;
    let addr = address(config, endpoint);

    let client = PqcClient::new(ctx, handshake)
        .with_timeout(timeout(config, endpoint)?)
        .with_max_frame_len(config.network.max_frame_len);
    let (session, mut channel) = client.connect(addr.as_str())?;
    print_session(&addr, &session);

    let message = args.message.as_deref().unwrap_or(defaults::CLIENT_MESSAGE);
    channel.send(message.as_bytes())?;
    channel.close()?;
    println!("sent {} bytes", message.len());
    Ok(())
}

pub fn info(config: &LabConfig) -> Result<()> {
    let ctx = PqcContext::load_or_unavailable(&config.provider_settings());

    println!("pqc-lab {} (protocol version {})", env!("CARGO_PKG_VERSION"), VERSION);
    match ctx.provider() {
        Ok(provider) => println!(
            "provider: {} {} ({})",
            provider.name(),
            provider.version(),
            provider.origin()
        ),
        Err(err) => println!("provider: unavailable ({})", err),
    }
    for kind in [AlgorithmKind::Kem, AlgorithmKind::Dsa] {
        let names: Vec<&str> = ctx.supported(kind).iter().map(|spec| spec.name).collect();
        let names = if names.is_empty() { "none".to_string() } else { names.join(", ") };
        println!("supported {}: {}", kind, names);
    }
    println!("artifacts: {}", config.file.artifacts_dir.display());
    println!("default KEM: {}", config.algorithm.default_kem);
    println!("default DSA: {}", config.algorithm.default_dsa);
    println!(
        "endpoint: {}:{} (timeout {:?})",
        config.network.default_host,
        config.network.default_port,
        config.network.timeout()
    );
    Ok(())
}

pub fn list(config: &LabConfig) -> Result<()> {
    let ctx = PqcContext::load_or_unavailable(&config.provider_settings());
    if !ctx.is_available() {
        warn!("no provider loaded; every algorithm is listed as unsupported");
    }

    println!("{:<12} {:<10} {:<5} {:>5} {:>8}  {}", "NAME", "ALIAS", "KIND", "LEVEL", "CODE", "SUPPORTED");
    for spec in registry::all() {
        let supported = if ctx.is_supported(spec.kind(), spec.name) { "yes" } else { "no" };
        println!(
            "{:<12} {:<10} {:<5} {:>5} {:>#8x}  {}",
            spec.name,
            spec.alias,
            spec.kind(),
            spec.nist_level,
            spec.code,
            supported
        );
    }
    Ok(())
}

/// Print every message a connection sends until it closes
fn receive(mut conn: Connection) -> Result<()> {
    print_session(&conn.peer.to_string(), &conn.session);
    while let Some(message) = conn.channel.recv()? {
        println!("[{}] {}", conn.peer, String::from_utf8_lossy(&message));
    }
    conn.channel.close()
}

fn print_session(peer: &str, session: &EstablishedSession) {
    println!(
        "{} handshake with {} established: {} + {}, transcript {}",
        session.role(),
        peer,
        session.kem().name,
        session.dsa().name,
        fingerprint(session.transcript_hash())
    );
}

/// Load keys and build the negotiation preferences for one endpoint
fn handshake_config(config: &LabConfig, endpoint: &EndpointArgs) -> Result<HandshakeConfig> {
    let dsa_name = endpoint.dsa.as_deref().unwrap_or(&config.algorithm.default_dsa);
    let dsa = registry::lookup_kind(AlgorithmKind::Dsa, dsa_name)?;
    let identity = files::load_keypair(dsa, &endpoint.identity_pub, &endpoint.identity_priv)?;
    let peer_key = files::load_public_key(dsa, &endpoint.peer_pub)?;

    let mut handshake = HandshakeConfig::from_algorithm_config(&config.algorithm, Arc::new(identity), peer_key)?
        .with_dsa_algorithms(vec![dsa])?;
    if let Some(kem) = &endpoint.kem {
        handshake = handshake.with_kem_algorithms(vec![registry::lookup_kind(AlgorithmKind::Kem, kem)?])?;
    }
    Ok(handshake)
}

fn address(config: &LabConfig, endpoint: &EndpointArgs) -> String {
    format!(
        "{}:{}",
        endpoint.host.as_deref().unwrap_or(&config.network.default_host),
        endpoint.port.unwrap_or(config.network.default_port)
    )
}

fn timeout(config: &LabConfig, endpoint: &EndpointArgs) -> Result<Duration> {
    match endpoint.timeout {
        None => Ok(config.network.timeout()),
        Some(secs) if secs.is_finite() && secs > 0.0 => Ok(Duration::from_secs_f64(secs)),
        Some(secs) => Err(Error::Config(format!("invalid timeout: {}", secs))),
    }
}

/// `--sig`, or the input path with the configured signature extension appended
fn signature_path(explicit: Option<&Path>, input: &Path, config: &LabConfig) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let mut path = input.as_os_str().to_owned();
            path.push(&config.file.signature_extension);
            path.into()
        }
    }
}

fn extension(format: ReportFormat) -> &'static str {
    match format {
        ReportFormat::Json => "json",
        ReportFormat::Text => "txt",
        ReportFormat::Csv => "csv",
    }
}

fn fingerprint(bytes: &[u8]) -> String {
    bytes.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_path_default() {
        let config = LabConfig::default();
        assert_eq!(
            signature_path(None, Path::new("doc/msg.txt"), &config),
            PathBuf::from("doc/msg.txt.sig")
        );
        assert_eq!(
            signature_path(Some(Path::new("x.sig")), Path::new("msg.txt"), &config),
            PathBuf::from("x.sig")
        );
    }

    #[test]
    fn test_fingerprint() {
        assert_eq!(fingerprint(&[0xab, 0x01, 0xff]), "ab01ff");
        assert_eq!(fingerprint(&[0u8; 32]).len(), 16);
    }

    #[test]
    fn test_invalid_timeout() {
        let endpoint = EndpointArgs {
            host: None,
            port: None,
            kem: None,
            dsa: None,
            identity_pub: PathBuf::new(),
            identity_priv: PathBuf::new(),
            peer_pub: PathBuf::new(),
            timeout: Some(-1.0),
        };
        assert!(matches!(timeout(&LabConfig::default(), &endpoint), Err(Error::Config(_))));
    }
}
