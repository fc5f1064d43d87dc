//! Aggregate-mode (per postal code) scoring.

use uli_map_risk_models::{RiskCategory, ScoringMode};

/// Share of enrolments without a matching update.
///
/// Returns `None` when `enrolment_count` is zero; such units have no
/// defined ratio and are excluded before scoring.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn lag_ratio(enrolment_count: u64, update_count: u64) -> Option<f64> {
    if enrolment_count == 0 {
        return None;
    }
    let enrolments = enrolment_count as f64;
    Some((enrolments - update_count as f64) / enrolments)
}

/// Lag ratio clipped to `[0, 1]`.
#[must_use]
pub fn uli(enrolment_count: u64, update_count: u64) -> Option<f64> {
    lag_ratio(enrolment_count, update_count).map(|r| r.clamp(0.0, 1.0))
}

/// ULI and tier for one postal code, or `None` for zero enrolments.
#[must_use]
pub fn score(enrolment_count: u64, update_count: u64) -> Option<(f64, RiskCategory)> {
    let uli = uli(enrolment_count, update_count)?;
    Some((uli, ScoringMode::Aggregate.thresholds().classify(uli)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heavy_lag_is_critical() {
        let (uli, tier) = score(1000, 200).unwrap();
        assert!((uli - 0.8).abs() < f64::EPSILON);
        assert_eq!(tier, RiskCategory::Critical);
    }

    #[test]
    fn boundary_point_three_is_safe() {
        let (uli, tier) = score(1000, 700).unwrap();
        assert!((uli - 0.3).abs() < f64::EPSILON);
        assert_eq!(tier, RiskCategory::Safe);
    }

    #[test]
    fn boundary_point_six_is_warning() {
        let (_, tier) = score(1000, 400).unwrap();
        assert_eq!(tier, RiskCategory::Warning);
    }

    #[test]
    fn more_updates_than_enrolments_clips_to_zero() {
        assert!((lag_ratio(100, 250).unwrap() - -1.5).abs() < f64::EPSILON);
        let (uli, tier) = score(100, 250).unwrap();
        assert!(uli.abs() < f64::EPSILON);
        assert_eq!(tier, RiskCategory::Safe);
    }

    #[test]
    fn zero_enrolment_has_no_score() {
        assert!(score(0, 10).is_none());
        assert!(score(0, 0).is_none());
    }

    #[test]
    fn uli_always_within_unit_interval() {
        for (e, u) in [(1, 0), (7, 3), (5, 500), (1_000_000, 1), (3, 3)] {
            let uli = uli(e, u).unwrap();
            assert!((0.0..=1.0).contains(&uli), "({e}, {u}) -> {uli}");
        }
    }
}
