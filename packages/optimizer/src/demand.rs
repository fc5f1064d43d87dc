//! Clustering input: which rows qualify and how much each one weighs.

use uli_map_risk_models::{RiskCategory, RiskRow, RowDetail};

/// A geocoded row entering the clustering stage.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandPoint {
    /// Postal code of the source row.
    pub postal_code: String,
    /// Geocoded latitude.
    pub latitude: f64,
    /// Geocoded longitude.
    pub longitude: f64,
    /// Always at least one.
    pub weight: u64,
}

/// Selected clustering input.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandSelection {
    /// Points in risk-table order.
    pub points: Vec<DemandPoint>,
    /// Too few rows qualified, so every geocoded row was taken at weight 1.
    pub fallback: bool,
}

impl DemandSelection {
    /// Sum of all point weights.
    #[must_use]
    pub fn total_weight(&self) -> u64 {
        self.points
            .iter()
            .fold(0_u64, |acc, p| acc.saturating_add(p.weight))
    }
}

/// Aggregate rows qualify at WARNING or above; record rows only at CRITICAL.
fn qualifies(row: &RiskRow) -> bool {
    match row.detail {
        RowDetail::Unit { .. } => row.risk_category >= RiskCategory::Warning,
        RowDetail::Record { .. } => row.risk_category == RiskCategory::Critical,
    }
}

/// `max(1, enrolments - updates)` for aggregate rows, 1 for records.
fn weight(row: &RiskRow) -> u64 {
    row.lag_volume().unwrap_or(1).max(1)
}

/// Picks clustering input from a risk table.
///
/// Rows without coordinates never enter clustering. When fewer than
/// `min_viable_rows` geocoded rows qualify, all geocoded rows are used with
/// a uniform weight of 1 and the substitution is logged.
#[must_use]
pub fn select(rows: &[RiskRow], min_viable_rows: usize) -> DemandSelection {
    let qualifying: Vec<DemandPoint> = rows
        .iter()
        .filter(|row| qualifies(row))
        .filter_map(|row| point(row, weight(row)))
        .collect();

    if qualifying.len() >= min_viable_rows {
        log::info!(
            "{} of {} rows qualify for clustering",
            qualifying.len(),
            rows.len()
        );
        return DemandSelection {
            points: qualifying,
            fallback: false,
        };
    }

    let points: Vec<DemandPoint> = rows.iter().filter_map(|row| point(row, 1)).collect();

    log::warn!(
        "Only {} rows qualify for clustering (minimum {min_viable_rows}); \
         falling back to all {} geocoded rows with uniform weight 1",
        qualifying.len(),
        points.len()
    );

    DemandSelection {
        points,
        fallback: true,
    }
}

fn point(row: &RiskRow, weight: u64) -> Option<DemandPoint> {
    let (latitude, longitude) = row.coordinates()?;
    Some(DemandPoint {
        postal_code: row.postal_code.clone(),
        latitude,
        longitude,
        weight,
    })
}
