/*!
Lab configuration.

Settings are layered: built-in defaults, then an optional file (TOML, YAML
or JSON, picked by extension), then environment variables prefixed with
`PQC_LAB__` using `__` between path segments, e.g.
`PQC_LAB__NETWORK__DEFAULT_PORT=6000`.
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bench::ReportFormat;
use crate::core::{
    constants::{defaults, MAX_FRAME_SIZE},
    crypto::{
        provider::ProviderSettings,
        registry::{self, AlgorithmKind},
    },
    error::{Error, Result},
};

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "PQC_LAB";

/// Smallest frame limit that still fits the largest handshake message
pub const MIN_FRAME_SIZE: usize = 8 * 1024;

/// Algorithm selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmConfig {
    /// KEMs offered during negotiation, in preference order
    pub kem_algorithms: Vec<String>,
    /// DSAs offered during negotiation, in preference order
    pub dsa_algorithms: Vec<String>,
    pub default_kem: String,
    pub default_dsa: String,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            kem_algorithms: registry::list(AlgorithmKind::Kem).iter().map(|s| s.name.to_string()).collect(),
            dsa_algorithms: registry::list(AlgorithmKind::Dsa).iter().map(|s| s.name.to_string()).collect(),
            default_kem: defaults::KEM.to_string(),
            default_dsa: defaults::DSA.to_string(),
        }
    }
}

/// Network settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub default_host: String,
    pub default_port: u16,
    /// Per-receive timeout in seconds
    pub timeout: f64,
    /// Largest frame accepted from a peer
    pub max_frame_len: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            default_host: defaults::HOST.to_string(),
            default_port: defaults::PORT,
            timeout: defaults::TIMEOUT.as_secs_f64(),
            max_frame_len: MAX_FRAME_SIZE,
        }
    }
}

impl NetworkConfig {
    /// The receive timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }
}

/// Benchmark settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub default_iterations: usize,
    pub warmup_iterations: usize,
    pub output_format: ReportFormat,
    /// Write reports to the artifacts directory when no output file is given
    pub save_results: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            default_iterations: defaults::BENCH_ITERATIONS,
            warmup_iterations: defaults::BENCH_WARMUP,
            output_format: ReportFormat::Json,
            save_results: true,
        }
    }
}

/// File layout settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub artifacts_dir: PathBuf,
    pub key_prefix: String,
    pub signature_extension: String,
    pub public_key_extension: String,
    pub private_key_extension: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from(defaults::ARTIFACTS_DIR),
            key_prefix: defaults::KEY_PREFIX.to_string(),
            signature_extension: defaults::SIGNATURE_EXTENSION.to_string(),
            public_key_extension: defaults::PUBLIC_KEY_EXTENSION.to_string(),
            private_key_extension: defaults::PRIVATE_KEY_EXTENSION.to_string(),
        }
    }
}

/// Provider discovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// liboqs library file or install prefix, tried before anything else
    pub liboqs_path: Option<PathBuf>,
    /// Fall back to the compiled-in provider
    pub allow_builtin: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            liboqs_path: None,
            allow_builtin: true,
        }
    }
}

/// Complete lab configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    pub algorithm: AlgorithmConfig,
    pub network: NetworkConfig,
    pub benchmark: BenchmarkConfig,
    pub file: FileConfig,
    pub provider: ProviderConfig,
    pub log_level: String,
    pub verbose: bool,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmConfig::default(),
            network: NetworkConfig::default(),
            benchmark: BenchmarkConfig::default(),
            file: FileConfig::default(),
            provider: ProviderConfig::default(),
            log_level: "info".to_string(),
            verbose: false,
        }
    }
}

/// `PQC_LAB__SECTION__KEY` variables; algorithm lists are comma separated
fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("algorithm.kem_algorithms")
        .with_list_parse_key("algorithm.dsa_algorithms")
}

impl LabConfig {
    /// Load defaults, then `file` if given, then the environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with(file, environment())
    }

    fn load_with(file: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            if !path.exists() {
                return Err(Error::Config(format!("{} does not exist", path.display())));
            }
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(env);

        let cfg: LabConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the settings against the algorithm catalog and protocol limits
    pub fn validate(&self) -> Result<()> {
        registry::lookup_kind(AlgorithmKind::Kem, &self.algorithm.default_kem)
            .map_err(|e| Error::Config(format!("algorithm.default_kem: {}", e)))?;
        registry::lookup_kind(AlgorithmKind::Dsa, &self.algorithm.default_dsa)
            .map_err(|e| Error::Config(format!("algorithm.default_dsa: {}", e)))?;
        for name in &self.algorithm.kem_algorithms {
            registry::lookup_kind(AlgorithmKind::Kem, name)
                .map_err(|e| Error::Config(format!("algorithm.kem_algorithms: {}", e)))?;
        }
        for name in &self.algorithm.dsa_algorithms {
            registry::lookup_kind(AlgorithmKind::Dsa, name)
                .map_err(|e| Error::Config(format!("algorithm.dsa_algorithms: {}", e)))?;
        }
        if !(self.network.timeout.is_finite() && self.network.timeout > 0.0) {
            return Err(Error::Config("network.timeout must be a positive number of seconds".into()));
        }
        if !(MIN_FRAME_SIZE..=MAX_FRAME_SIZE).contains(&self.network.max_frame_len) {
            return Err(Error::Config(format!(
                "network.max_frame_len must be between {} and {}",
                MIN_FRAME_SIZE, MAX_FRAME_SIZE
            )));
        }
        if self.benchmark.default_iterations == 0 {
            return Err(Error::Config("benchmark.default_iterations must be at least 1".into()));
        }
        Ok(())
    }

    /// Provider discovery settings
    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            liboqs_path: self.provider.liboqs_path.clone(),
            allow_builtin: self.provider.allow_builtin,
        }
    }
}
