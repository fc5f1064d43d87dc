//! Flat CSV form of the risk table.
//!
//! Both scoring modes share one column layout. Aggregate rows fill
//! `enrolment_count`/`update_count`; record rows fill `individual_id`,
//! `current_age`, `update_gap_days`, and `urgency_factor`. The columns of
//! the other mode are left empty.

use serde::{Deserialize, Serialize};
use uli_map_risk_models::{RiskCategory, RiskRow, RowDetail};

/// One line of `master_table.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTableRecord {
    /// Geographic unit key.
    pub postal_code: String,
    /// Update Lag Index.
    pub uli: f64,
    /// Tier derived from `uli`.
    pub risk_category: RiskCategory,
    /// Empty when the postal code did not geocode.
    pub latitude: Option<f64>,
    /// Empty when the postal code did not geocode.
    pub longitude: Option<f64>,
    /// District name reported by the geocoder.
    pub district: Option<String>,
    /// Aggregate rows only.
    pub enrolment_count: Option<u64>,
    /// Aggregate rows only.
    pub update_count: Option<u64>,
    /// Record rows only.
    pub individual_id: Option<String>,
    /// Record rows only, in years.
    pub current_age: Option<f64>,
    /// Record rows only.
    pub update_gap_days: Option<i64>,
    /// Record rows only.
    pub urgency_factor: Option<f64>,
}

impl From<&RiskRow> for RiskTableRecord {
    fn from(row: &RiskRow) -> Self {
        let mut record = Self {
            postal_code: row.postal_code.clone(),
            uli: row.uli,
            risk_category: row.risk_category,
            latitude: row.latitude,
            longitude: row.longitude,
            district: row.district.clone(),
            enrolment_count: None,
            update_count: None,
            individual_id: None,
            current_age: None,
            update_gap_days: None,
            urgency_factor: None,
        };

        match &row.detail {
            RowDetail::Unit {
                enrolment_count,
                update_count,
            } => {
                record.enrolment_count = Some(*enrolment_count);
                record.update_count = Some(*update_count);
            }
            RowDetail::Record {
                individual_id,
                current_age,
                update_gap_days,
                urgency_factor,
            } => {
                record.individual_id = Some(individual_id.clone());
                record.current_age = Some(*current_age);
                record.update_gap_days = Some(*update_gap_days);
                record.urgency_factor = Some(*urgency_factor);
            }
        }

        record
    }
}

impl RiskTableRecord {
    /// Rebuilds the typed row. Returns `None` when neither mode's columns
    /// are filled in.
    #[must_use]
    pub fn into_row(self) -> Option<RiskRow> {
        let detail = match (self.enrolment_count, self.update_count, self.individual_id) {
            (Some(enrolment_count), Some(update_count), _) => RowDetail::Unit {
                enrolment_count,
                update_count,
            },
            (_, _, Some(individual_id)) => RowDetail::Record {
                individual_id,
                current_age: self.current_age?,
                update_gap_days: self.update_gap_days?,
                urgency_factor: self.urgency_factor?,
            },
            _ => return None,
        };

        Some(RiskRow {
            postal_code: self.postal_code,
            uli: self.uli,
            risk_category: self.risk_category,
            latitude: self.latitude,
            longitude: self.longitude,
            district: self.district.filter(|d| !d.is_empty()),
            detail,
        })
    }
}
