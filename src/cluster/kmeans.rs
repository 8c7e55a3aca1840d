//! Deterministic k-means over feature vectors.
//!
//! Lloyd's algorithm with seeded initialization: repeated runs on identical
//! input produce identical centroids and assignments, which full
//! re-clustering relies on for reproducibility.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;

use crate::features::FeatureVector;

/// Output of one k-means run.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Final centroid per cluster, indexed by cluster id.
    pub centroids: Vec<FeatureVector>,
    /// Cluster id assigned to each input point, in input order.
    pub assignments: Vec<usize>,
}

/// Partition `points` into `k` clusters.
///
/// Initial centroids are `k` distinct points chosen by a `StdRng` seeded
/// with `seed`. Assignment ties go to the lowest cluster id. A cluster left
/// without members keeps its previous centroid for the next iteration (the
/// caller decides what to do with empty clusters in the final assignment).
///
/// # Panics
/// Panics if `k == 0` or `points.len() < k`; callers gate on sample count
/// before clustering.
pub fn kmeans(points: &[FeatureVector], k: usize, seed: u64, max_iter: usize) -> KMeansResult {
    assert!(k > 0, "cluster count must be positive");
    assert!(
        points.len() >= k,
        "k-means needs at least as many points ({}) as clusters ({})",
        points.len(),
        k
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids: Vec<FeatureVector> = sample(&mut rng, points.len(), k)
        .into_iter()
        .map(|i| points[i])
        .collect();

    let mut assignments = assign(points, &centroids);
    for _ in 0..max_iter {
        for (cluster_id, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<FeatureVector> = points
                .iter()
                .zip(&assignments)
                .filter(|(_, a)| **a == cluster_id)
                .map(|(p, _)| *p)
                .collect();
            if let Some(mean) = FeatureVector::mean(&members) {
                *centroid = mean;
            }
        }
        let next = assign(points, &centroids);
        if next == assignments {
            break;
        }
        assignments = next;
    }

    KMeansResult {
        centroids,
        assignments,
    }
}

fn assign(points: &[FeatureVector], centroids: &[FeatureVector]) -> Vec<usize> {
    points
        .iter()
        .map(|point| {
            let mut best = 0;
            let mut best_distance = f64::INFINITY;
            for (cluster_id, centroid) in centroids.iter().enumerate() {
                let distance = point.squared_distance(centroid);
                if distance < best_distance {
                    best = cluster_id;
                    best_distance = distance;
                }
            }
            best
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(value: f64) -> FeatureVector {
        FeatureVector::from_array([value; FeatureVector::DIMS])
    }

    fn two_blobs() -> Vec<FeatureVector> {
        vec![
            uniform(1.0),
            uniform(1.1),
            uniform(0.9),
            uniform(10.0),
            uniform(10.1),
            uniform(9.9),
        ]
    }

    #[test]
    fn identical_input_clusters_identically() {
        let points = two_blobs();
        let first = kmeans(&points, 2, 42, 100);
        let second = kmeans(&points, 2, 42, 100);
        assert_eq!(first, second);
    }

    #[test]
    fn separated_blobs_end_up_in_separate_clusters() {
        let points = two_blobs();
        let result = kmeans(&points, 2, 42, 100);

        let low = result.assignments[0];
        assert_eq!(result.assignments[1], low);
        assert_eq!(result.assignments[2], low);
        let high = result.assignments[3];
        assert_ne!(high, low);
        assert_eq!(result.assignments[4], high);
        assert_eq!(result.assignments[5], high);

        // Centroids converge to the blob means.
        let low_centroid = result.centroids[low].as_array()[0];
        let high_centroid = result.centroids[high].as_array()[0];
        assert!((low_centroid - 1.0).abs() < 0.2);
        assert!((high_centroid - 10.0).abs() < 0.2);
    }

    #[test]
    fn single_cluster_centroid_is_the_mean() {
        let points = vec![uniform(2.0), uniform(4.0), uniform(6.0)];
        let result = kmeans(&points, 1, 42, 100);
        assert_eq!(result.assignments, vec![0, 0, 0]);
        for value in result.centroids[0].as_array() {
            assert!((value - 4.0).abs() < 1e-12);
        }
    }

    #[test]
    #[should_panic(expected = "at least as many points")]
    fn rejects_more_clusters_than_points() {
        kmeans(&[uniform(1.0)], 2, 42, 100);
    }
}
