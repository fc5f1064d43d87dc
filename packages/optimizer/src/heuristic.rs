//! Cluster-count heuristic.

use uli_map_optimizer_models::DeploymentProfile;

/// `clamp(round(total_weight / divisor), min_clusters, max_clusters)`,
/// never below one.
///
/// A non-positive or non-finite divisor yields `min_clusters`. Bounds are
/// applied lower-then-upper so a misconfigured profile with
/// `min_clusters > max_clusters` settles on `max_clusters` instead of
/// panicking.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn cluster_count(total_weight: u64, profile: &DeploymentProfile) -> usize {
    let raw = if profile.divisor.is_finite() && profile.divisor > 0.0 {
        (total_weight as f64 / profile.divisor).round() as usize
    } else {
        0
    };

    raw.max(profile.min_clusters)
        .min(profile.max_clusters)
        .max(1)
}
