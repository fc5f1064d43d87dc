#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Canonical ingestion types.
//!
//! These are the hand-off shapes produced by the ingestion stage and read by
//! risk scoring: the per-postal-code [`UnitAggregate`] table, the per-month
//! [`TimeSeriesPoint`] series, and the per-individual [`RawRecord`] table
//! produced by the record-level merge.

use std::str::FromStr;

use chrono::{Datelike as _, NaiveDate};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Which kind of identity event a source file counts.
///
/// Biometric and demographic update extracts both map to [`Self::Update`].
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    /// New enrolments.
    Enrolment,
    /// Biometric or demographic updates.
    Update,
}

/// Running enrolment/update totals for a single key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitCounts {
    /// Sum across all enrolment sources.
    pub enrolment_count: u64,
    /// Sum across all update sources.
    pub update_count: u64,
}

impl UnitCounts {
    /// Returns counts holding `count` under the given event kind.
    #[must_use]
    pub const fn of(kind: EventKind, count: u64) -> Self {
        match kind {
            EventKind::Enrolment => Self {
                enrolment_count: count,
                update_count: 0,
            },
            EventKind::Update => Self {
                enrolment_count: 0,
                update_count: count,
            },
        }
    }

    /// Element-wise sum of two partial counts.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            enrolment_count: self.enrolment_count.saturating_add(other.enrolment_count),
            update_count: self.update_count.saturating_add(other.update_count),
        }
    }
}

/// Per-postal-code enrolment and update totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitAggregate {
    /// Normalised postal code (geographic unit key).
    pub postal_code: String,
    /// Sum across all enrolment sources.
    pub enrolment_count: u64,
    /// Sum across all update sources.
    pub update_count: u64,
}

impl UnitAggregate {
    /// Builds a row from a key and its accumulated counts.
    #[must_use]
    pub fn new(postal_code: impl Into<String>, counts: UnitCounts) -> Self {
        Self {
            postal_code: postal_code.into(),
            enrolment_count: counts.enrolment_count,
            update_count: counts.update_count,
        }
    }

    /// Returns the `(enrolment, update)` totals as [`UnitCounts`].
    #[must_use]
    pub const fn counts(&self) -> UnitCounts {
        UnitCounts {
            enrolment_count: self.enrolment_count,
            update_count: self.update_count,
        }
    }
}

/// A calendar month, serialised as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    /// Calendar year.
    pub year: i32,
    /// Month of year (1-12).
    pub month: u32,
}

impl Period {
    /// Returns the month containing `date`.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Error returned when a period label is not `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPeriodError {
    /// The rejected label.
    pub value: String,
}

impl std::fmt::Display for InvalidPeriodError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid period '{}': expected YYYY-MM", self.value)
    }
}

impl std::error::Error for InvalidPeriodError {}

impl FromStr for Period {
    type Err = InvalidPeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InvalidPeriodError {
            value: s.to_string(),
        };
        let (year, month) = s.trim().split_once('-').ok_or_else(err)?;
        let year = year.parse::<i32>().map_err(|_| err())?;
        let month = month.parse::<u32>().map_err(|_| err())?;
        if !(1..=12).contains(&month) {
            return Err(err());
        }
        Ok(Self { year, month })
    }
}

impl TryFrom<String> for Period {
    type Error = InvalidPeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(value: Period) -> Self {
        value.to_string()
    }
}

/// Enrolment and update totals for one calendar month.
///
/// Only months present in the source data appear; gaps are not zero-filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    /// Calendar month.
    pub period: Period,
    /// Enrolments recorded in the month.
    pub enrolment_count: u64,
    /// Updates recorded in the month.
    pub update_count: u64,
}

/// One individual's enrolment joined with their most recent update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Identifier the enrolment and update tables were joined on.
    pub individual_id: String,
    /// Enrolment date, when parseable.
    pub enrolment_date: Option<NaiveDate>,
    /// Date of birth, when parseable.
    pub date_of_birth: Option<NaiveDate>,
    /// Most recent update; `None` when the individual never updated.
    pub last_update_date: Option<NaiveDate>,
    /// Normalised postal code.
    pub postal_code: String,
}

/// Totals reported at the end of an ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Source files that contributed to at least one aggregate.
    pub files_read: u64,
    /// Source files skipped as unreadable or unrecognisable.
    pub files_skipped: u64,
    /// Data rows read across all contributing files.
    pub rows_read: u64,
    /// Count cells that were non-numeric or negative and counted as zero.
    pub malformed_cells: u64,
    /// Grand total of enrolments keyed by postal code.
    pub enrolment_total: u64,
    /// Grand total of updates keyed by postal code.
    pub update_total: u64,
}
