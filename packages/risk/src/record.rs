//! Record-level (per individual) scoring.
//!
//! Age-milestone windows around 5 and 15 years carry mandatory biometric
//! updates, so lag inside those windows is amplified.

use chrono::NaiveDate;
use uli_map_risk_models::{RiskCategory, ScoringMode};

/// Intermediate and final values for one individual.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordScore {
    /// Age in years (`days / 365`).
    pub current_age: f64,
    /// Days since the last update, or since birth when never updated.
    pub update_gap_days: i64,
    /// Milestone multiplier.
    pub urgency_factor: f64,
    /// Final ULI. Not clipped: very stale records may exceed 1.0.
    pub uli: f64,
    /// Tier under the record-level thresholds.
    pub risk_category: RiskCategory,
}

/// Milestone multiplier for an age in years.
///
/// Windows are inclusive on both ends.
#[must_use]
pub fn urgency_factor(age: f64) -> f64 {
    if (4.5..=7.0).contains(&age) {
        2.0
    } else if (14.5..=17.0).contains(&age) {
        2.5
    } else if age > 18.0 {
        0.1
    } else {
        1.0
    }
}

/// Scores one individual as of `today`.
///
/// Returns `None` when the date of birth lies after `today`; age and lag
/// are undefined for such rows.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score(
    date_of_birth: NaiveDate,
    last_update_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<RecordScore> {
    if date_of_birth > today {
        return None;
    }

    let current_age = (today - date_of_birth).num_days() as f64 / 365.0;
    let last_activity = last_update_date.unwrap_or(date_of_birth);
    let update_gap_days = (today - last_activity).num_days();

    let factor = urgency_factor(current_age);
    // `+ 1` keeps newborns (age 0) well defined.
    let base_uli = (update_gap_days as f64 / 365.0) / (current_age + 1.0);
    let uli = base_uli * factor;

    Some(RecordScore {
        current_age,
        update_gap_days,
        urgency_factor: factor,
        uli,
        risk_category: ScoringMode::Record.thresholds().classify(uli),
    })
}
