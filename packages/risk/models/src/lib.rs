#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Risk table types shared by scoring, clustering, and reporting.
//!
//! Both scoring modes emit the same [`RiskRow`] shape; the mode-specific
//! inputs travel in [`RowDetail`] so downstream stages only need to match
//! on it where the semantics genuinely differ (demand weighting).

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Ordinal risk tier derived from the Update Lag Index.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskCategory {
    /// Up to date, or close enough.
    Safe,
    /// Falling behind.
    Warning,
    /// Far behind; primary deployment target.
    Critical,
}

/// Strict-greater-than tier cut points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierThresholds {
    /// `uli > critical` is [`RiskCategory::Critical`].
    pub critical: f64,
    /// `uli > warning` is [`RiskCategory::Warning`].
    pub warning: f64,
}

impl TierThresholds {
    /// Classifies a ULI. A value exactly on a cut point falls into the
    /// lower tier.
    #[must_use]
    pub fn classify(self, uli: f64) -> RiskCategory {
        if uli > self.critical {
            RiskCategory::Critical
        } else if uli > self.warning {
            RiskCategory::Warning
        } else {
            RiskCategory::Safe
        }
    }
}

/// Cut points for per-individual scores.
pub const RECORD_THRESHOLDS: TierThresholds = TierThresholds {
    critical: 0.8,
    warning: 0.5,
};

/// Cut points for per-postal-code lag ratios. Lower than the record-level
/// set because the lag ratio is bounded to `[0, 1]` and concentrates lower.
pub const AGGREGATE_THRESHOLDS: TierThresholds = TierThresholds {
    critical: 0.6,
    warning: 0.3,
};

/// Input granularity a risk table was scored at.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScoringMode {
    /// One row per individual.
    Record,
    /// One row per postal code.
    Aggregate,
}

impl ScoringMode {
    /// Tier cut points for this mode.
    #[must_use]
    pub const fn thresholds(self) -> TierThresholds {
        match self {
            Self::Record => RECORD_THRESHOLDS,
            Self::Aggregate => AGGREGATE_THRESHOLDS,
        }
    }
}

/// Mode-specific fields of a [`RiskRow`].
#[derive(Debug, Clone, PartialEq)]
pub enum RowDetail {
    /// Aggregate-mode inputs.
    Unit {
        /// Total enrolments for the postal code.
        enrolment_count: u64,
        /// Total updates for the postal code.
        update_count: u64,
    },
    /// Record-level inputs.
    Record {
        /// Individual identifier.
        individual_id: String,
        /// Age in years (`days / 365`).
        current_age: f64,
        /// Days since the last update (or since birth when never updated).
        update_gap_days: i64,
        /// Milestone multiplier applied to the base ULI.
        urgency_factor: f64,
    },
}

/// One scored row of the risk table.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskRow {
    /// Postal code (geographic unit).
    pub postal_code: String,
    /// Update Lag Index. Within `[0, 1]` in aggregate mode; unbounded above
    /// in record mode.
    pub uli: f64,
    /// Tier derived from `uli` with the mode's thresholds.
    pub risk_category: RiskCategory,
    /// Centroid latitude; `None` when geocoding failed.
    pub latitude: Option<f64>,
    /// Centroid longitude; `None` when geocoding failed.
    pub longitude: Option<f64>,
    /// Administrative district, when known.
    pub district: Option<String>,
    /// Mode-specific inputs.
    pub detail: RowDetail,
}

impl RiskRow {
    /// The mode this row was scored in.
    #[must_use]
    pub const fn mode(&self) -> ScoringMode {
        match self.detail {
            RowDetail::Unit { .. } => ScoringMode::Aggregate,
            RowDetail::Record { .. } => ScoringMode::Record,
        }
    }

    /// `(lat, lng)` when the row was geocoded.
    #[must_use]
    pub const fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }

    /// Outstanding updates (`enrolments - updates`, floored at zero) for
    /// aggregate rows.
    #[must_use]
    pub const fn lag_volume(&self) -> Option<u64> {
        match self.detail {
            RowDetail::Unit {
                enrolment_count,
                update_count,
            } => Some(enrolment_count.saturating_sub(update_count)),
            RowDetail::Record { .. } => None,
        }
    }
}

/// Bookkeeping from one scoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringStats {
    /// Mode the run scored in.
    pub mode: ScoringMode,
    /// Rows handed to the scorer.
    pub input_rows: u64,
    /// Aggregate rows excluded because `enrolment_count == 0`.
    pub dropped_zero_enrolment: u64,
    /// Record rows excluded because date of birth was missing.
    pub dropped_missing_dob: u64,
    /// Rows with a computed ULI, before geocoding is applied.
    pub scored_rows: u64,
    /// Distinct postal codes sent for geocoding.
    pub distinct_postal_codes: u64,
    /// Distinct postal codes that failed to resolve.
    pub unresolved_postal_codes: u64,
    /// Scored rows whose postal code did not resolve (dropped in aggregate
    /// mode, kept with null coordinates in record mode).
    pub ungeocoded_rows: u64,
    /// Rows in the emitted risk table.
    pub output_rows: u64,
    /// Emitted SAFE rows.
    pub safe: u64,
    /// Emitted WARNING rows.
    pub warning: u64,
    /// Emitted CRITICAL rows.
    pub critical: u64,
}

impl ScoringStats {
    /// Empty stats for `mode`.
    #[must_use]
    pub const fn new(mode: ScoringMode) -> Self {
        Self {
            mode,
            input_rows: 0,
            dropped_zero_enrolment: 0,
            dropped_missing_dob: 0,
            scored_rows: 0,
            distinct_postal_codes: 0,
            unresolved_postal_codes: 0,
            ungeocoded_rows: 0,
            output_rows: 0,
            safe: 0,
            warning: 0,
            critical: 0,
        }
    }

    /// Tallies an emitted row's tier.
    pub const fn count_tier(&mut self, category: RiskCategory) {
        self.output_rows += 1;
        match category {
            RiskCategory::Safe => self.safe += 1,
            RiskCategory::Warning => self.warning += 1,
            RiskCategory::Critical => self.critical += 1,
        }
    }
}
