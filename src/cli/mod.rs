//! Command-line interface for the `pqc-lab` binary.
//!
//! # Usage
//!
//! ```bash
//! # Generate a long-term signing identity under ./artifacts
//! pqc-lab keygen --alg mldsa65
//!
//! # Sign and verify a file
//! pqc-lab sign --alg mldsa65 --priv artifacts/pqc-mldsa65.priv --in msg.txt --sig msg.sig
//! pqc-lab verify --alg mldsa65 --pub artifacts/pqc-mldsa65.pub --in msg.txt --sig msg.sig
//!
//! # Benchmark every supported algorithm as CSV
//! pqc-lab bench --count 200 --format csv
//!
//! # Mutually authenticated handshake
//! pqc-lab handshake server --identity-pub s.pub --identity-priv s.priv --peer-pub c.pub --once
//! pqc-lab handshake client --identity-pub c.pub --identity-priv c.priv --peer-pub s.pub
//! ```
//!
//! Settings not given on the command line come from the configuration (see
//! [`crate::core::config`]). Every error maps to a non-zero exit code through
//! [`crate::core::error::Error::exit_code`].

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::bench::{BenchOperation, ReportFormat};
use crate::core::{config::LabConfig, crypto::provider, error::Result, logging};

/// Post-quantum cryptography readiness lab
#[derive(Parser, Debug, Clone)]
#[command(name = "pqc-lab")]
#[command(version)]
#[command(about = "ML-KEM / ML-DSA key management, benchmarks and an authenticated handshake", long_about = None)]
pub struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate a KEM or DSA keypair and write it to disk
    Keygen(KeygenArgs),

    /// Sign a file with a DSA secret key
    Sign(SignArgs),

    /// Verify a detached signature; prints OK or FAILED
    Verify(VerifyArgs),

    /// Time provider operations
    Bench(BenchArgs),

    /// Run the mutually authenticated KEM handshake
    #[command(subcommand)]
    Handshake(HandshakeCommand),

    /// Show provider, supported algorithms and defaults
    Info,

    /// List the algorithm catalog
    List,
}

#[derive(Args, Debug, Clone)]
pub struct KeygenArgs {
    /// Algorithm name or alias, e.g. mlkem768 or ML-DSA-65
    #[arg(long)]
    pub alg: String,

    /// Public key output path
    #[arg(long = "pub")]
    pub public: Option<PathBuf>,

    /// Private key output path
    #[arg(long = "priv")]
    pub private: Option<PathBuf>,

    /// Directory for generated files
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// File name prefix
    #[arg(long)]
    pub prefix: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SignArgs {
    /// DSA name or alias
    #[arg(long)]
    pub alg: String,

    /// Private key file
    #[arg(long = "priv")]
    pub private: PathBuf,

    /// File to sign
    #[arg(long = "in")]
    pub input: PathBuf,

    /// Signature output path; defaults to the input path plus `.sig`
    #[arg(long)]
    pub sig: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// DSA name or alias
    #[arg(long)]
    pub alg: String,

    /// Public key file
    #[arg(long = "pub")]
    pub public: PathBuf,

    /// Signed file
    #[arg(long = "in")]
    pub input: PathBuf,

    /// Signature file; defaults to the input path plus `.sig`
    #[arg(long)]
    pub sig: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct BenchArgs {
    /// Algorithm name or alias; every supported algorithm when omitted
    #[arg(long)]
    pub alg: Option<String>,

    /// Single operation; every operation of the algorithm's kind when omitted
    #[arg(long, value_enum)]
    pub op: Option<BenchOperation>,

    /// Measured iterations
    #[arg(long)]
    pub count: Option<usize>,

    /// Unmeasured warm-up iterations
    #[arg(long)]
    pub warmup: Option<usize>,

    /// Report format
    #[arg(long, value_enum)]
    pub format: Option<ReportFormat>,

    /// Write the report to this file
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum HandshakeCommand {
    /// Accept handshakes and print the messages clients send
    Server(ServerArgs),

    /// Connect, handshake and send one message
    Client(ClientArgs),
}

/// Options shared by both handshake roles
#[derive(Args, Debug, Clone)]
pub struct EndpointArgs {
    /// Host to bind or connect to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind or connect to
    #[arg(long)]
    pub port: Option<u16>,

    /// Restrict negotiation to this KEM
    #[arg(long)]
    pub kem: Option<String>,

    /// DSA of both long-term keys
    #[arg(long)]
    pub dsa: Option<String>,

    /// This endpoint's DSA public key
    #[arg(long)]
    pub identity_pub: PathBuf,

    /// This endpoint's DSA private key
    #[arg(long)]
    pub identity_priv: PathBuf,

    /// The peer's pinned DSA public key
    #[arg(long)]
    pub peer_pub: PathBuf,

    /// Per-message timeout in seconds
    #[arg(long)]
    pub timeout: Option<f64>,
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,

    /// Exit after the first connection
    #[arg(long)]
    pub once: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,

    /// Message sent over the secure channel
    #[arg(long)]
    pub message: Option<String>,
}

/// Load configuration, install logging and run the command
pub fn run(cli: Cli) -> Result<()> {
    let config = LabConfig::load(cli.config.as_deref())?;
    logging::init(&config.log_level, cli.verbose || config.verbose);

    let result = match &cli.command {
        Command::Keygen(args) => commands::keygen(&config, args),
        Command::Sign(args) => commands::sign(&config, args),
        Command::Verify(args) => commands::verify(&config, args),
        Command::Bench(args) => commands::bench(&config, args),
        Command::Handshake(HandshakeCommand::Server(args)) => commands::handshake_server(&config, args),
        Command::Handshake(HandshakeCommand::Client(args)) => commands::handshake_client(&config, args),
        Command::Info => commands::info(&config),
        Command::List => commands::list(&config),
    };
    provider::shutdown();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keygen_args() {
        let cli = Cli::try_parse_from(["pqc-lab", "keygen", "--alg", "mlkem768", "--out", "/tmp/k"]).unwrap();
        match cli.command {
            Command::Keygen(args) => {
                assert_eq!(args.alg, "mlkem768");
                assert_eq!(args.out, Some(PathBuf::from("/tmp/k")));
                assert!(args.public.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["pqc-lab", "list", "--verbose", "--config", "lab.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("lab.toml")));
    }

    #[test]
    fn test_bench_value_enums() {
        let cli = Cli::try_parse_from([
            "pqc-lab", "bench", "--alg", "mldsa44", "--op", "dsa-sign", "--format", "csv", "--count", "5",
        ])
        .unwrap();
        match cli.command {
            Command::Bench(args) => {
                assert_eq!(args.op, Some(BenchOperation::SigSign));
                assert_eq!(args.format, Some(ReportFormat::Csv));
                assert_eq!(args.count, Some(5));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_handshake_server_args() {
        let cli = Cli::try_parse_from([
            "pqc-lab",
            "handshake",
            "server",
            "--port",
            "6000",
            "--identity-pub",
            "s.pub",
            "--identity-priv",
            "s.priv",
            "--peer-pub",
            "c.pub",
            "--once",
        ])
        .unwrap();
        match cli.command {
            Command::Handshake(HandshakeCommand::Server(args)) => {
                assert!(args.once);
                assert_eq!(args.endpoint.port, Some(6000));
                assert_eq!(args.endpoint.peer_pub, PathBuf::from("c.pub"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_handshake_requires_keys() {
        assert!(Cli::try_parse_from(["pqc-lab", "handshake", "client", "--peer-pub", "s.pub"]).is_err());
    }
}
