#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Service deployment placement.
//!
//! Filters a risk table to at-risk, geocoded rows, weights each by
//! outstanding demand, picks a cluster count from the total, and places
//! that many deployment points with seeded weighted k-means.

pub mod demand;
pub mod heuristic;
pub mod kmeans;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use uli_map_optimizer_models::{
    ALGORITHM_NAME, ClusterDeployment, ClusterSnapshot, DeploymentProfile,
};
use uli_map_risk_models::RiskRow;

pub use demand::{DemandPoint, DemandSelection};

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 42;

/// Qualifying rows below this trigger the uniform-weight fallback.
pub const DEFAULT_MIN_VIABLE_ROWS: usize = 5;

/// Errors from an optimizer run.
#[derive(Debug, thiserror::Error)]
pub enum OptimizeError {
    /// No geocoded rows to cluster, even after the fallback.
    #[error("No geocoded rows available for clustering ({input_rows} rows in the risk table)")]
    NoDemand {
        /// Rows in the risk table handed to the optimizer.
        input_rows: usize,
    },
}

/// Knobs for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeOptions {
    /// Cluster-count bounds and status labels.
    pub profile: DeploymentProfile,
    /// k-means seed.
    pub seed: u64,
    /// Qualifying rows needed before the uniform-weight fallback is skipped.
    pub min_viable_rows: usize,
}

impl OptimizeOptions {
    /// Options for `profile` with the default seed and fallback threshold.
    #[must_use]
    pub const fn new(profile: DeploymentProfile) -> Self {
        Self {
            profile,
            seed: DEFAULT_SEED,
            min_viable_rows: DEFAULT_MIN_VIABLE_ROWS,
        }
    }
}

/// Cluster membership of one clustering input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Postal code of the clustered row.
    pub postal_code: String,
    /// Index into `snapshot.routes`.
    pub cluster_id: usize,
    /// Demand weight the row contributed.
    pub weight: u64,
}

/// Everything an optimizer run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentPlan {
    /// The persisted snapshot.
    pub snapshot: ClusterSnapshot,
    /// One entry per clustering input row, in input order.
    pub assignments: Vec<Assignment>,
    /// Whether the uniform-weight fallback was used.
    pub fallback: bool,
}

/// Plans deployments for `rows`, stamping the snapshot with the current
/// time.
///
/// # Errors
///
/// Returns [`OptimizeError::NoDemand`] if no row has coordinates.
pub fn optimize(
    rows: &[RiskRow],
    options: &OptimizeOptions,
) -> Result<DeploymentPlan, OptimizeError> {
    optimize_at(rows, options, Utc::now())
}

/// [`optimize`] with an explicit snapshot timestamp.
///
/// # Errors
///
/// Returns [`OptimizeError::NoDemand`] if no row has coordinates.
#[allow(clippy::cast_precision_loss)]
pub fn optimize_at(
    rows: &[RiskRow],
    options: &OptimizeOptions,
    timestamp: DateTime<Utc>,
) -> Result<DeploymentPlan, OptimizeError> {
    let selection = demand::select(rows, options.min_viable_rows);
    if selection.points.is_empty() {
        return Err(OptimizeError::NoDemand {
            input_rows: rows.len(),
        });
    }

    let total_demand = selection.total_weight();
    let target = heuristic::cluster_count(total_demand, &options.profile);

    let distinct = selection
        .points
        .iter()
        .map(|p| (p.latitude.to_bits(), p.longitude.to_bits()))
        .collect::<BTreeSet<_>>()
        .len();
    let k = if target > distinct {
        log::info!(
            "Capping cluster count at {distinct} distinct locations (heuristic asked for {target})"
        );
        distinct
    } else {
        target
    };

    log::info!(
        "Clustering {} points (total demand {total_demand}) into {k} clusters",
        selection.points.len()
    );

    let points: Vec<kmeans::Point> = selection
        .points
        .iter()
        .map(|p| [p.latitude, p.longitude])
        .collect();
    let weights: Vec<f64> = selection.points.iter().map(|p| p.weight as f64).collect();

    let fitted = kmeans::fit(&points, &weights, &kmeans::KMeansConfig::new(k, options.seed))
        .ok_or(OptimizeError::NoDemand {
            input_rows: rows.len(),
        })?;

    let mut demand = vec![0_u64; fitted.centroids.len()];
    for (point, &cluster) in selection.points.iter().zip(&fitted.assignments) {
        demand[cluster] = demand[cluster].saturating_add(point.weight);
    }

    let routes: Vec<ClusterDeployment> = fitted
        .centroids
        .iter()
        .zip(&demand)
        .enumerate()
        .map(|(cluster_id, (centroid, &demand_size))| ClusterDeployment {
            cluster_id,
            latitude: centroid[0],
            longitude: centroid[1],
            demand_size,
            status: options.profile.status(demand_size).to_string(),
        })
        .collect();

    let assignments = selection
        .points
        .iter()
        .zip(&fitted.assignments)
        .map(|(point, &cluster_id)| Assignment {
            postal_code: point.postal_code.clone(),
            cluster_id,
            weight: point.weight,
        })
        .collect();

    log::info!(
        "Deployed {} vans, busiest cluster demand {}",
        routes.len(),
        demand.iter().max().copied().unwrap_or(0)
    );

    Ok(DeploymentPlan {
        snapshot: ClusterSnapshot {
            algorithm: ALGORITHM_NAME.to_string(),
            timestamp,
            total_demand,
            deployed_vans: routes.len(),
            routes,
        },
        assignments,
        fallback: selection.fallback,
    })
}

#[cfg(test)]
mod tests {
    use uli_map_risk_models::{RiskCategory, RowDetail};

    use super::*;

    #[allow(clippy::cast_precision_loss)]
    fn unit_row(i: u64, lag: u64) -> RiskRow {
        RiskRow {
            postal_code: (110_000 + i).to_string(),
            uli: 0.9,
            risk_category: RiskCategory::Critical,
            latitude: Some(8.0 + (i as f64) * 0.37),
            longitude: Some(70.0 + ((i * 7) % 23) as f64 * 0.41),
            district: None,
            detail: RowDetail::Unit {
                enrolment_count: lag + 100,
                update_count: 100,
            },
        }
    }

    #[test]
    fn fifty_thousand_weighted_demand_deploys_ten_vans() {
        let rows: Vec<RiskRow> = (0..50).map(|i| unit_row(i, 1000)).collect();
        let plan = optimize(&rows, &OptimizeOptions::new(DeploymentProfile::weighted())).unwrap();

        assert_eq!(plan.snapshot.total_demand, 50_000);
        assert_eq!(plan.snapshot.deployed_vans, 10);
        assert_eq!(plan.snapshot.routes.len(), 10);
        assert_eq!(plan.snapshot.algorithm, "Weighted K-Means Clustering");
        assert_eq!(
            plan.snapshot.routes.iter().map(|r| r.demand_size).sum::<u64>(),
            50_000
        );
        assert!(!plan.fallback);
    }

    #[test]
    fn identical_input_and_seed_are_deterministic() {
        let rows: Vec<RiskRow> = (0..40).map(|i| unit_row(i, 300 + i * 17)).collect();
        let options = OptimizeOptions::new(DeploymentProfile::weighted());
        let ts = Utc::now();

        let a = optimize_at(&rows, &options, ts).unwrap();
        let b = optimize_at(&rows, &options, ts).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn status_follows_profile_threshold() {
        let rows: Vec<RiskRow> = (0..10).map(|i| unit_row(i, 3000)).collect();
        let plan = optimize(&rows, &OptimizeOptions::new(DeploymentProfile::weighted())).unwrap();
        for route in &plan.snapshot.routes {
            let expected = if route.demand_size > 10_000 { "CRITICAL" } else { "HIGH" };
            assert_eq!(route.status, expected);
        }
    }

    #[test]
    fn cluster_count_is_capped_by_distinct_locations() {
        let mut rows: Vec<RiskRow> = (0..6).map(|i| unit_row(i % 2, 1000)).collect();
        rows[0].postal_code = "dup".to_string();
        let plan = optimize(&rows, &OptimizeOptions::new(DeploymentProfile::weighted())).unwrap();
        assert_eq!(plan.snapshot.deployed_vans, 2);
        assert_eq!(plan.assignments.len(), 6);
    }

    #[test]
    fn no_geocoded_rows_is_an_error() {
        let mut row = unit_row(0, 1000);
        row.latitude = None;
        row.longitude = None;
        let result = optimize(&[row], &OptimizeOptions::new(DeploymentProfile::weighted()));
        assert!(matches!(result, Err(OptimizeError::NoDemand { input_rows: 1 })));
    }
}
