/*!
Benchmark reports and their output formats.
*/

use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::stats::BenchStats;
use crate::core::error::{Error, Result};

/// How a report is rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Text,
    Csv,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Json => write!(f, "json"),
            ReportFormat::Text => write!(f, "text"),
            ReportFormat::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "text" => Ok(ReportFormat::Text),
            "csv" => Ok(ReportFormat::Csv),
            other => Err(Error::Config(format!("unknown report format: {}", other))),
        }
    }
}

/// Timings of one operation on one algorithm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchResult {
    pub algorithm: String,
    pub kind: String,
    pub operation: String,
    pub iterations: usize,
    pub warmup: usize,
    pub stats: BenchStats,
}

/// A full benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchReport {
    pub provider: String,
    pub provider_version: String,
    pub results: Vec<BenchResult>,
}

const CSV_HEADER: &str =
    "algorithm,kind,operation,iterations,warmup,min_us,max_us,mean_us,median_us,p95_us,p99_us,std_dev_us,ops_per_sec";

impl BenchReport {
    pub fn new(provider: impl Into<String>, provider_version: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            provider_version: provider_version.into(),
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: BenchResult) {
        self.results.push(result);
    }

    /// Render in the requested format
    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            ReportFormat::Text => Ok(self.render_text()),
            ReportFormat::Csv => Ok(self.render_csv()),
        }
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Provider: {} {}", self.provider, self.provider_version);
        let _ = writeln!(
            out,
            "{:<12} {:<16} {:>8} {:>11} {:>11} {:>11} {:>11} {:>12}",
            "algorithm", "operation", "iters", "mean(us)", "median(us)", "p95(us)", "p99(us)", "ops/sec"
        );
        for r in &self.results {
            let _ = writeln!(
                out,
                "{:<12} {:<16} {:>8} {:>11.2} {:>11.2} {:>11.2} {:>11.2} {:>12.1}",
                r.algorithm,
                r.operation,
                r.iterations,
                r.stats.mean_us,
                r.stats.median_us,
                r.stats.p95_us,
                r.stats.p99_us,
                r.stats.ops_per_sec
            );
        }
        out
    }

    fn render_csv(&self) -> String {
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for r in &self.results {
            let s = &r.stats;
            let _ = writeln!(
                out,
                "{},{},{},{},{},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3}",
                r.algorithm,
                r.kind,
                r.operation,
                r.iterations,
                r.warmup,
                s.min_us,
                s.max_us,
                s.mean_us,
                s.median_us,
                s.p95_us,
                s.p99_us,
                s.std_dev_us,
                s.ops_per_sec
            );
        }
        out
    }

    /// Render and write to `path`, creating parent directories
    pub fn save(&self, path: &Path, format: ReportFormat) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.render(format)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn report() -> BenchReport {
        let stats = BenchStats::from_samples(&[Duration::from_micros(10), Duration::from_micros(20)]).unwrap();
        let mut report = BenchReport::new("pqclean", "test");
        report.push(BenchResult {
            algorithm: "ML-KEM-768".into(),
            kind: "KEM".into(),
            operation: "keypair".into(),
            iterations: 2,
            warmup: 0,
            stats,
        });
        report
    }

    #[test]
    fn test_json_parses_back() {
        let json = report().render(ReportFormat::Json).unwrap();
        let parsed: BenchReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report());
    }

    #[test]
    fn test_csv_has_header_and_row() {
        let csv = report().render(ReportFormat::Csv).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].starts_with("ML-KEM-768,KEM,keypair,2,0,10.000,20.000,15.000"));
    }

    #[test]
    fn test_text_mentions_algorithm() {
        let text = report().render(ReportFormat::Text).unwrap();
        assert!(text.contains("ML-KEM-768"));
        assert!(text.contains("pqclean"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ReportFormat>().unwrap(), ReportFormat::Csv);
        assert!("xml".parse::<ReportFormat>().is_err());
    }
}
