#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Postal-code geocoding for risk scoring.
//!
//! Resolves postal codes to a centroid coordinate and administrative
//! district through the [`GeoLookup`] trait. Two providers are available,
//! selected by a `type`-tagged [`ProviderConfig`]:
//!
//! 1. **GeoNames postal table** ([`postal_table`]): offline, reads the
//!    tab-separated GeoNames postal dump and averages the coordinates of
//!    every place sharing a code.
//! 2. **Nominatim / `OpenStreetMap`** ([`nominatim`]): structured postal-code
//!    search, rate limited, one request per code.
//!
//! Lookups are batched: callers hand over the full set of distinct codes
//! and [`GeoCache`] makes sure no code is queried twice in one run.

pub mod cache;
pub mod nominatim;
pub mod postal_table;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

pub use cache::GeoCache;

/// Centroid and district for one postal code.
///
/// Any field may be missing; a code only counts as resolved when both
/// coordinates are present (see [`GeoResult::coordinates`]).
#[derive(Debug, Clone, PartialEq)]
pub struct GeoResult {
    /// Latitude (WGS84).
    pub latitude: Option<f64>,
    /// Longitude (WGS84).
    pub longitude: Option<f64>,
    /// Administrative district name.
    pub district: Option<String>,
}

impl GeoResult {
    /// Returns `(lat, lng)` when both coordinates are present and finite.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some((lat, lng)),
            _ => None,
        }
    }
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// A local postal table could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A local postal table could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Batched postal-code lookup.
///
/// Implementations return an entry for every code they could resolve;
/// codes missing from the map (or mapped to a result without coordinates)
/// are unresolved. A single code failing must not fail the batch.
pub trait GeoLookup: Send + Sync {
    /// Resolves a batch of distinct postal codes.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] only when the whole batch cannot proceed
    /// (e.g. the provider is rate limiting every request).
    fn resolve(
        &self,
        codes: &BTreeSet<String>,
    ) -> impl std::future::Future<Output = Result<BTreeMap<String, GeoResult>, GeocodeError>>
    + Send;

    /// Short provider name for logs.
    fn name(&self) -> &str;
}

/// Provider configuration, tagged by `type` in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Offline GeoNames postal dump.
    PostalTable {
        /// Path to the tab-separated dump (e.g. `IN.txt`).
        path: PathBuf,
        /// Keep only rows with this ISO country code.
        #[serde(default)]
        country_code: Option<String>,
    },
    /// Nominatim / `OpenStreetMap` search endpoint.
    Nominatim {
        /// API base URL (e.g., `"https://nominatim.openstreetmap.org/search"`).
        base_url: String,
        /// ISO country code to restrict matches to.
        country_code: String,
        /// Minimum delay between requests in milliseconds.
        #[serde(default = "default_rate_limit_ms")]
        rate_limit_ms: u64,
    },
}

const fn default_rate_limit_ms() -> u64 {
    1_000
}

/// A configured provider.
pub enum GeoProvider {
    /// See [`postal_table::PostalTable`].
    PostalTable(postal_table::PostalTable),
    /// See [`nominatim::NominatimLookup`].
    Nominatim(nominatim::NominatimLookup),
}

impl GeoProvider {
    /// Builds the provider described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the postal table cannot be loaded or the
    /// HTTP client cannot be built.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, GeocodeError> {
        match config {
            ProviderConfig::PostalTable { path, country_code } => Ok(Self::PostalTable(
                postal_table::PostalTable::open(path, country_code.as_deref())?,
            )),
            ProviderConfig::Nominatim {
                base_url,
                country_code,
                rate_limit_ms,
            } => Ok(Self::Nominatim(nominatim::NominatimLookup::new(
                base_url,
                country_code,
                std::time::Duration::from_millis(*rate_limit_ms),
            )?)),
        }
    }
}

impl GeoLookup for GeoProvider {
    async fn resolve(
        &self,
        codes: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, GeoResult>, GeocodeError> {
        match self {
            Self::PostalTable(table) => table.resolve(codes).await,
            Self::Nominatim(nominatim) => nominatim.resolve(codes).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::PostalTable(table) => table.name(),
            Self::Nominatim(nominatim) => nominatim.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_require_both_axes() {
        let full = GeoResult {
            latitude: Some(28.6),
            longitude: Some(77.2),
            district: None,
        };
        assert_eq!(full.coordinates(), Some((28.6, 77.2)));

        let partial = GeoResult {
            latitude: Some(28.6),
            longitude: None,
            district: Some("New Delhi".to_string()),
        };
        assert!(partial.coordinates().is_none());

        let nan = GeoResult {
            latitude: Some(f64::NAN),
            longitude: Some(77.2),
            district: None,
        };
        assert!(nan.coordinates().is_none());
    }

    #[test]
    fn parses_tagged_provider_config() {
        let table: ProviderConfig = toml::de::from_str(
            r#"
            type = "postal_table"
            path = "data/geonames/IN.txt"
            country_code = "IN"
            "#,
        )
        .unwrap();
        assert_eq!(
            table,
            ProviderConfig::PostalTable {
                path: PathBuf::from("data/geonames/IN.txt"),
                country_code: Some("IN".to_string()),
            }
        );

        let nominatim: ProviderConfig = toml::de::from_str(
            r#"
            type = "nominatim"
            base_url = "https://nominatim.openstreetmap.org/search"
            country_code = "in"
            "#,
        )
        .unwrap();
        assert!(matches!(
            nominatim,
            ProviderConfig::Nominatim {
                rate_limit_ms: 1_000,
                ..
            }
        ));
    }
}
