#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Update Lag Index (ULI) scoring.
//!
//! Two formulas share one output shape:
//!
//! - **Aggregate mode** ([`aggregate`]) scores each postal code by its lag
//!   ratio `(enrolments - updates) / enrolments`, clipped to `[0, 1]`.
//! - **Record mode** ([`record`]) scores each individual by years since
//!   their last update relative to age, amplified in the age-5 and age-15
//!   mandatory update windows. Record-mode ULI is left unclipped.
//!
//! [`engine::RiskEngine`] runs either formula, geocodes every distinct
//! postal code once, and fans the centroid and district out to all rows
//! sharing that code.

pub mod aggregate;
pub mod engine;
pub mod record;

pub use engine::{RiskEngine, RiskReport, ScoringInput};

/// Errors that abort a scoring run.
#[derive(Debug, thiserror::Error)]
pub enum RiskError {
    /// The geocoding provider failed the whole batch.
    #[error("Geocoding failed: {0}")]
    Geocode(#[from] uli_map_geocoder::GeocodeError),
}
