//! Weighted k-means over 2-D coordinates.
//!
//! # Algorithm
//!
//! 1. Seed k centroids with k-means++, sampling each new centroid with
//!    probability proportional to `weight × D²`
//! 2. Assign each point to its nearest centroid (ties to the lowest index)
//! 3. Move each centroid to the weighted mean of its members
//! 4. Repeat until the largest centroid shift is below the tolerance or the
//!    iteration limit is hit
//!
//! The whole procedure is restarted `n_init` times from one seeded
//! [`StdRng`] and the run with the lowest weighted inertia wins, so a given
//! seed always reproduces the same centroids and assignments.

use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};

/// A 2-D point: `[latitude, longitude]`.
pub type Point = [f64; 2];

/// Parameters for [`fit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansConfig {
    /// Number of centroids.
    pub k: usize,
    /// Lloyd iterations per restart.
    pub max_iterations: usize,
    /// Stop once no centroid moves further than this.
    pub tolerance: f64,
    /// Seeded restarts; the lowest-inertia run is kept.
    pub n_init: usize,
    /// Seed for the `StdRng` driving k-means++ initialization.
    pub seed: u64,
}

impl KMeansConfig {
    /// Defaults for `k` clusters and `seed`.
    #[must_use]
    pub const fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            max_iterations: 300,
            tolerance: 1e-6,
            n_init: 10,
            seed,
        }
    }
}

/// Fitted centroids and the point-to-centroid assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Final centroids, `k` of them.
    pub centroids: Vec<Point>,
    /// Centroid index per input point.
    pub assignments: Vec<usize>,
    /// Weighted sum of squared distances to the assigned centroid.
    pub inertia: f64,
    /// Lloyd iterations run by the kept restart.
    pub iterations: usize,
    /// Whether the kept restart stopped under `tolerance`.
    pub converged: bool,
}

#[inline]
fn distance_squared(a: &Point, b: &Point) -> f64 {
    (a[0] - b[0]).mul_add(a[0] - b[0], (a[1] - b[1]) * (a[1] - b[1]))
}

/// Index of the nearest centroid and the squared distance to it.
fn nearest(point: &Point, centroids: &[Point]) -> (usize, f64) {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (j, centroid) in centroids.iter().enumerate() {
        let dist = distance_squared(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best = j;
        }
    }
    (best, best_dist)
}

/// Draws an index with probability proportional to `mass`.
fn sample_index(rng: &mut StdRng, mass: &[f64]) -> Option<usize> {
    let total: f64 = mass.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return None;
    }

    let target = rng.random::<f64>() * total;
    let mut cumulative = 0.0;
    for (i, m) in mass.iter().enumerate() {
        cumulative += m;
        if target < cumulative {
            return Some(i);
        }
    }

    // Rounding can leave `target` just past the last bucket.
    mass.iter().rposition(|m| *m > 0.0)
}

fn kmeans_plus_plus_init(
    points: &[Point],
    weights: &[f64],
    k: usize,
    rng: &mut StdRng,
) -> Vec<Point> {
    let mut centroids = Vec::with_capacity(k);

    let first = sample_index(rng, weights).unwrap_or(0);
    centroids.push(points[first]);

    let mut min_distances: Vec<f64> = points
        .iter()
        .map(|p| distance_squared(p, &points[first]))
        .collect();

    while centroids.len() < k {
        let mass: Vec<f64> = min_distances
            .iter()
            .zip(weights)
            .map(|(d, w)| d * w)
            .collect();

        // Every point already sits on a centroid.
        let Some(next) = sample_index(rng, &mass) else {
            break;
        };

        let centroid = points[next];
        for (dist, point) in min_distances.iter_mut().zip(points) {
            *dist = dist.min(distance_squared(point, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

/// Weighted means of assigned points. A centroid with no members keeps its
/// previous position.
fn weighted_centroids(
    points: &[Point],
    weights: &[f64],
    assignments: &[usize],
    previous: &[Point],
) -> Vec<Point> {
    let mut sums = vec![[0.0_f64; 2]; previous.len()];
    let mut mass = vec![0.0_f64; previous.len()];

    for ((point, weight), &cluster) in points.iter().zip(weights).zip(assignments) {
        sums[cluster][0] += point[0] * weight;
        sums[cluster][1] += point[1] * weight;
        mass[cluster] += weight;
    }

    sums.into_iter()
        .zip(mass)
        .zip(previous)
        .map(|((sum, m), prev)| {
            if m > 0.0 {
                [sum[0] / m, sum[1] / m]
            } else {
                *prev
            }
        })
        .collect()
}

fn assign(points: &[Point], weights: &[f64], centroids: &[Point]) -> (Vec<usize>, f64) {
    let mut inertia = 0.0;
    let assignments = points
        .iter()
        .zip(weights)
        .map(|(point, weight)| {
            let (idx, dist) = nearest(point, centroids);
            inertia += dist * weight;
            idx
        })
        .collect();
    (assignments, inertia)
}

fn lloyd(
    points: &[Point],
    weights: &[f64],
    mut centroids: Vec<Point>,
    config: &KMeansConfig,
) -> KMeansResult {
    let mut iterations = 0;
    let mut converged = false;

    for iter in 0..config.max_iterations {
        iterations = iter + 1;

        let (assignments, _) = assign(points, weights, &centroids);
        let updated = weighted_centroids(points, weights, &assignments, &centroids);

        let max_shift = centroids
            .iter()
            .zip(&updated)
            .map(|(old, new)| distance_squared(old, new).sqrt())
            .fold(0.0_f64, f64::max);

        centroids = updated;

        if max_shift < config.tolerance {
            converged = true;
            break;
        }
    }

    let (assignments, inertia) = assign(points, weights, &centroids);

    KMeansResult {
        centroids,
        assignments,
        inertia,
        iterations,
        converged,
    }
}

/// Fits `config.k` weighted centroids to `points`.
///
/// `weights` must be the same length as `points`. Returns `None` when there
/// are no points or `k` is zero. Fewer than `k` centroids come back only
/// when the points have fewer than `k` distinct positions.
#[must_use]
pub fn fit(points: &[Point], weights: &[f64], config: &KMeansConfig) -> Option<KMeansResult> {
    if points.is_empty() || config.k == 0 || points.len() != weights.len() {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<KMeansResult> = None;

    for _ in 0..config.n_init.max(1) {
        let init = kmeans_plus_plus_init(points, weights, config.k, &mut rng);
        let run = lloyd(points, weights, init, config);

        log::debug!(
            "k-means restart: inertia={:.6} iterations={} converged={}",
            run.inertia,
            run.iterations,
            run.converged
        );

        if best.as_ref().is_none_or(|b| run.inertia < b.inertia) {
            best = Some(run);
        }
    }

    if let Some(result) = &best
        && !result.converged
    {
        log::warn!(
            "k-means did not converge after {} iterations",
            config.max_iterations
        );
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> (Vec<Point>, Vec<f64>) {
        let points = vec![
            [28.60, 77.20],
            [28.61, 77.21],
            [28.62, 77.19],
            [12.90, 77.60],
            [12.91, 77.61],
            [12.95, 77.58],
        ];
        let weights = vec![5.0, 1.0, 2.0, 3.0, 1.0, 4.0];
        (points, weights)
    }

    #[test]
    fn single_cluster_centroid_is_weighted_average() {
        let points = vec![[0.0, 0.0], [10.0, 0.0], [0.0, 10.0]];
        let weights = vec![1.0, 1.0, 8.0];

        let result = fit(&points, &weights, &KMeansConfig::new(1, 42)).unwrap();

        assert_eq!(result.centroids.len(), 1);
        assert!((result.centroids[0][0] - 1.0).abs() < 1e-9);
        assert!((result.centroids[0][1] - 8.0).abs() < 1e-9);
        assert_eq!(result.assignments, vec![0, 0, 0]);
    }

    #[test]
    fn separates_distant_groups() {
        let (points, weights) = two_blobs();
        let result = fit(&points, &weights, &KMeansConfig::new(2, 42)).unwrap();

        let north = result.assignments[0];
        assert!(result.assignments[..3].iter().all(|&a| a == north));
        assert!(result.assignments[3..].iter().all(|&a| a != north));
        assert!(result.converged);
    }

    #[test]
    fn same_seed_reproduces_result() {
        let (points, weights) = two_blobs();
        let config = KMeansConfig::new(3, 7);
        let a = fit(&points, &weights, &config).unwrap();
        let b = fit(&points, &weights, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn k_beyond_distinct_points_stops_seeding() {
        let points = vec![[1.0, 1.0], [1.0, 1.0], [2.0, 2.0]];
        let weights = vec![1.0, 1.0, 1.0];
        let result = fit(&points, &weights, &KMeansConfig::new(5, 42)).unwrap();
        assert_eq!(result.centroids.len(), 2);
        assert!(result.inertia.abs() < 1e-12);
    }

    #[test]
    fn ties_go_to_lowest_index() {
        let centroids = [[0.0, 0.0], [2.0, 0.0]];
        assert_eq!(nearest(&[1.0, 0.0], &centroids).0, 0);
    }

    #[test]
    fn empty_input_fits_nothing() {
        assert!(fit(&[], &[], &KMeansConfig::new(3, 42)).is_none());
    }
}
