//! Reply-context clustering.
//!
//! Maps an incoming email's style to the reply style the user tends to use
//! in that context. [`ReplyClusterEngine`] owns full (re)clustering over the
//! pair history; [`OnlineClusterUpdater`] applies cheap incremental nudges
//! between full runs and triggers the periodic ground-truth re-partition.

pub mod engine;
pub mod kmeans;
pub mod updater;

use crate::features::{cosine_similarity, FeatureVector};
use crate::storage::StyleCluster;

pub use engine::ReplyClusterEngine;
pub use kmeans::{kmeans, KMeansResult};
pub use updater::OnlineClusterUpdater;

/// The cluster whose centroid is most cosine-similar to `vector`.
///
/// `clusters` arrive ordered by `cluster_id`, and only a strictly greater
/// similarity displaces the current best, so ties resolve to the lowest
/// cluster id. `None` only when `clusters` is empty.
pub(crate) fn nearest_cluster<'a>(
    clusters: &'a [StyleCluster],
    vector: &FeatureVector,
) -> Option<&'a StyleCluster> {
    let mut best: Option<(&StyleCluster, f64)> = None;
    for cluster in clusters {
        let similarity = cosine_similarity(vector, &cluster.centroid_vector);
        match best {
            Some((_, best_similarity)) if similarity <= best_similarity => {}
            _ => best = Some((cluster, similarity)),
        }
    }
    best.map(|(cluster, _)| cluster)
}
