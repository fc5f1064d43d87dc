//! Pipeline configuration.
//!
//! Loaded from `--config <path>`, else the `ULI_MAP_CONFIG` environment
//! variable, else the copy of `config/default.toml` embedded at compile
//! time.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use uli_map_geocoder::ProviderConfig;
use uli_map_ingest::sources::SourceDir;
use uli_map_ingest_models::EventKind;
use uli_map_optimizer::{DEFAULT_MIN_VIABLE_ROWS, DEFAULT_SEED, OptimizeOptions};
use uli_map_optimizer_models::DeploymentProfile;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "ULI_MAP_CONFIG";

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Errors loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The config is not valid TOML for [`Config`].
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// One directory of raw extracts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    /// Event kind every count under `dir` is credited to.
    pub event: EventKind,
    /// Relative to `data_dir`.
    pub dir: PathBuf,
}

/// `[optimizer]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// k-means seed.
    pub seed: u64,
    /// Qualifying rows needed before the uniform-weight fallback is skipped.
    pub min_viable_rows: usize,
    /// Profile for aggregate-mode risk tables.
    pub weighted: DeploymentProfile,
    /// Profile for record-level risk tables.
    pub count: DeploymentProfile,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            min_viable_rows: DEFAULT_MIN_VIABLE_ROWS,
            weighted: DeploymentProfile::weighted(),
            count: DeploymentProfile::count_driven(),
        }
    }
}

impl OptimizerConfig {
    /// Run options for `profile`.
    #[must_use]
    pub fn options(&self, profile: &DeploymentProfile) -> OptimizeOptions {
        OptimizeOptions {
            profile: profile.clone(),
            seed: self.seed,
            min_viable_rows: self.min_viable_rows,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Root of the raw inputs.
    pub data_dir: PathBuf,
    /// Where artifacts are written.
    pub output_dir: PathBuf,
    /// Raw extract directories.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// Postal-code lookup backend.
    pub geocoder: ProviderConfig,
    /// Clustering settings.
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

impl Config {
    /// Loads the configuration from the first of `explicit`, the
    /// `ULI_MAP_CONFIG` variable, or the embedded default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the chosen file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        match path {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?;
                Self::parse(&text)
            }
            None => {
                log::debug!("Using embedded default config");
                Self::parse(DEFAULT_CONFIG)
            }
        }
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the text does not describe a
    /// [`Config`].
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Source directories resolved against `data_dir`.
    #[must_use]
    pub fn source_dirs(&self) -> Vec<SourceDir> {
        self.sources
            .iter()
            .map(|s| SourceDir {
                dir: self.data_dir.join(&s.dir),
                kind: s.event,
            })
            .collect()
    }

    /// Geocoder settings with a relative postal-table path resolved against
    /// `data_dir`.
    #[must_use]
    pub fn geocoder(&self) -> ProviderConfig {
        match &self.geocoder {
            ProviderConfig::PostalTable { path, country_code } => ProviderConfig::PostalTable {
                path: self.data_dir.join(path),
                country_code: country_code.clone(),
            },
            other @ ProviderConfig::Nominatim { .. } => other.clone(),
        }
    }
}
