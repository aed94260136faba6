// tests/cli_test.rs
use std::fs;
use std::path::Path;

use clap::Parser;
use pqc_lab::{
    cli::{self, Cli},
    AuthError, Error, Result,
};
use tempfile::tempdir;

fn run(args: &[&str]) -> Result<()> {
    let mut argv = vec!["pqc-lab"];
    argv.extend_from_slice(args);
    cli::run(Cli::try_parse_from(argv).unwrap())
}

fn path(p: &Path) -> &str {
    p.to_str().unwrap()
}

#[test]
fn test_keygen_sign_verify() -> Result<()> {
    let dir = tempdir()?;
    let out = dir.path();
    run(&["keygen", "--alg", "mldsa44", "--out", path(out), "--prefix", "alice"])?;

    let public = out.join("alice-mldsa44.pub");
    let private = out.join("alice-mldsa44.priv");
    assert_eq!(fs::metadata(&public)?.len(), 1312);
    assert_eq!(fs::metadata(&private)?.len(), 2560);

    let input = out.join("message.txt");
    fs::write(&input, b"ship it")?;
    run(&["sign", "--alg", "ML-DSA-44", "--priv", path(&private), "--in", path(&input)])?;
    assert!(out.join("message.txt.sig").exists());

    run(&["verify", "--alg", "mldsa44", "--pub", path(&public), "--in", path(&input)])?;

    fs::write(&input, b"ship it!")?;
    let err = run(&["verify", "--alg", "mldsa44", "--pub", path(&public), "--in", path(&input)]).unwrap_err();
    assert!(matches!(err, Error::Authentication(AuthError::SignatureVerificationFailed)));
    assert_ne!(err.exit_code(), 0);
    Ok(())
}

#[test]
fn test_sign_rejects_kem_algorithm() {
    let err = run(&["sign", "--alg", "mlkem768", "--priv", "k.priv", "--in", "m.txt"]).unwrap_err();
    assert!(matches!(err, Error::UnknownAlgorithm(_)));
}

#[test]
fn test_bench_writes_csv_report() -> Result<()> {
    let dir = tempdir()?;
    let report = dir.path().join("bench.csv");
    run(&[
        "bench", "--alg", "mlkem512", "--count", "3", "--warmup", "1", "--format", "csv", "--output", path(&report),
    ])?;

    let csv = fs::read_to_string(&report)?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4, "header plus one row per KEM operation:\n{}", csv);
    assert!(lines[1..].iter().all(|line| line.contains("ML-KEM-512")));
    Ok(())
}

#[test]
fn test_list_and_info() -> Result<()> {
    run(&["list"])?;
    run(&["info"])
}
