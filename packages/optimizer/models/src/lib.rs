#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Deployment planning types: the profile that shapes a clustering run and
//! the snapshot it emits for map and dashboard consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Algorithm name recorded in every snapshot.
pub const ALGORITHM_NAME: &str = "Weighted K-Means Clustering";

/// Cluster-count bounds and status labelling for one kind of deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentProfile {
    /// Demand served by one deployment point.
    pub divisor: f64,
    /// Lower bound on the cluster count.
    pub min_clusters: usize,
    /// Upper bound on the cluster count.
    pub max_clusters: usize,
    /// Demand strictly above this gets `high_label`.
    pub status_threshold: u64,
    /// Status for clusters above `status_threshold`.
    pub high_label: String,
    /// Status for every other cluster.
    pub low_label: String,
}

impl DeploymentProfile {
    /// Demand-driven vans sized by outstanding update volume.
    #[must_use]
    pub fn weighted() -> Self {
        Self {
            divisor: 5000.0,
            min_clusters: 3,
            max_clusters: 20,
            status_threshold: 10_000,
            high_label: "CRITICAL".to_string(),
            low_label: "HIGH".to_string(),
        }
    }

    /// Vans sized by the number of at-risk individuals.
    #[must_use]
    pub fn count_driven() -> Self {
        Self {
            divisor: 100.0,
            min_clusters: 1,
            max_clusters: 50,
            status_threshold: 200,
            high_label: "busiest".to_string(),
            low_label: "normal".to_string(),
        }
    }

    /// Status label for a cluster carrying `demand`.
    #[must_use]
    pub fn status(&self, demand: u64) -> &str {
        if demand > self.status_threshold {
            &self.high_label
        } else {
            &self.low_label
        }
    }
}

/// One recommended service stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDeployment {
    /// Index of the centroid within its run.
    pub cluster_id: usize,
    /// Weighted centroid latitude.
    #[serde(rename = "lat")]
    pub latitude: f64,
    /// Weighted centroid longitude.
    #[serde(rename = "lng")]
    pub longitude: f64,
    /// Sum of the weights assigned to this cluster.
    pub demand_size: u64,
    /// Profile label derived from `demand_size`.
    pub status: String,
}

/// Output of one optimizer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    /// Always [`ALGORITHM_NAME`].
    pub algorithm: String,
    /// Serialized as RFC 3339.
    pub timestamp: DateTime<Utc>,
    /// Sum of weights over the clustering input.
    pub total_demand: u64,
    /// Number of clusters emitted.
    pub deployed_vans: usize,
    /// Clusters in centroid index order.
    pub routes: Vec<ClusterDeployment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_threshold_is_strict() {
        let weighted = DeploymentProfile::weighted();
        assert_eq!(weighted.status(10_000), "HIGH");
        assert_eq!(weighted.status(10_001), "CRITICAL");

        let count = DeploymentProfile::count_driven();
        assert_eq!(count.status(200), "normal");
        assert_eq!(count.status(201), "busiest");
    }

    #[test]
    fn snapshot_uses_lat_lng_keys() {
        let snapshot = ClusterSnapshot {
            algorithm: ALGORITHM_NAME.to_string(),
            timestamp: DateTime::parse_from_rfc3339("2025-01-15T10:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
            total_demand: 12_500,
            deployed_vans: 1,
            routes: vec![ClusterDeployment {
                cluster_id: 0,
                latitude: 28.6,
                longitude: 77.2,
                demand_size: 12_500,
                status: "CRITICAL".to_string(),
            }],
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["algorithm"], "Weighted K-Means Clustering");
        assert_eq!(json["timestamp"], "2025-01-15T10:30:00Z");
        assert_eq!(json["routes"][0]["lat"], 28.6);
        assert_eq!(json["routes"][0]["lng"], 77.2);
        assert!(json["routes"][0].get("latitude").is_none());
    }

    #[test]
    fn profile_reads_from_toml() {
        let profile: DeploymentProfile = toml::from_str(
            r#"
            divisor = 2500.0
            min_clusters = 2
            max_clusters = 8
            status_threshold = 5000
            high_label = "CRITICAL"
            low_label = "HIGH"
            "#,
        )
        .unwrap();
        assert_eq!(profile.max_clusters, 8);
        assert_eq!(profile.status(5001), "CRITICAL");
    }
}
