//! Full reply-style clustering over a user's pair history.

use std::sync::Arc;

use crate::analyzer::TextAnalyzer;
use crate::cluster::{kmeans, nearest_cluster};
use crate::config::StyleConfig;
use crate::error::StyleError;
use crate::features::{derive_labels, DerivedLabels, FeatureVector, LabelThresholds};
use crate::locks::UserLocks;
use crate::storage::{SqliteStyleStore, StyleCluster};

/// Unsupervised clustering of incoming-email styles, each cluster carrying
/// the averaged reply style observed for it.
pub struct ReplyClusterEngine {
    store: Arc<SqliteStyleStore>,
    analyzer: Arc<dyn TextAnalyzer>,
    locks: UserLocks,
    n_clusters: usize,
    kmeans_seed: u64,
    kmeans_max_iter: usize,
    thresholds: LabelThresholds,
}

impl ReplyClusterEngine {
    pub fn new(
        store: Arc<SqliteStyleStore>,
        analyzer: Arc<dyn TextAnalyzer>,
        locks: UserLocks,
        config: &StyleConfig,
    ) -> Self {
        Self {
            store,
            analyzer,
            locks,
            n_clusters: config.n_clusters,
            kmeans_seed: config.kmeans_seed,
            kmeans_max_iter: config.kmeans_max_iter,
            thresholds: config.label_thresholds,
        }
    }

    /// Append (incoming, reply) pairs to the user's history and run a full
    /// re-cluster. Pairs with an empty incoming or reply text are skipped.
    ///
    /// The appended pairs persist even when re-clustering then reports
    /// [`StyleError::InsufficientData`]; they count toward a later run.
    pub async fn initialize(
        &self,
        user_id: &str,
        pairs: &[(String, String)],
    ) -> Result<usize, StyleError> {
        let usable: Vec<(String, String)> = pairs
            .iter()
            .filter(|(incoming, reply)| !incoming.is_empty() && !reply.is_empty())
            .cloned()
            .collect();
        let appended = self.store.append_pairs(user_id, &usable)?;
        tracing::info!(user_id, appended, "appended reply pairs");
        self.recluster(user_id).await
    }

    /// Re-derive the user's cluster set from their full pair history.
    /// Returns the number of clusters written.
    ///
    /// K-means runs over the incoming-email vectors only; each resulting
    /// cluster gets the elementwise mean of the reply vectors whose pairs
    /// fell into it. Clusters with no assigned pairs are dropped, so the
    /// stored count can be less than the requested one. The analyzer calls
    /// and the k-means run happen off the user lock; only the final swap
    /// takes it.
    ///
    /// # Errors
    /// [`StyleError::InsufficientData`] when the history holds fewer pairs
    /// than the requested cluster count; stored clusters are left untouched.
    pub async fn recluster(&self, user_id: &str) -> Result<usize, StyleError> {
        let pairs = self.store.pairs(user_id)?;
        if pairs.len() < self.n_clusters {
            return Err(StyleError::InsufficientData {
                available: pairs.len(),
                required: self.n_clusters,
            });
        }

        // Incoming and reply vectors live in the same feature space but are
        // never mixed within one vector: one analyzer call per text.
        let mut incoming_vectors = Vec::with_capacity(pairs.len());
        let mut reply_vectors = Vec::with_capacity(pairs.len());
        for pair in &pairs {
            incoming_vectors.push(
                self.analyzer
                    .analyze(std::slice::from_ref(&pair.incoming_email))
                    .await?,
            );
            reply_vectors.push(
                self.analyzer
                    .analyze(std::slice::from_ref(&pair.reply_email))
                    .await?,
            );
        }

        let result = kmeans(
            &incoming_vectors,
            self.n_clusters,
            self.kmeans_seed,
            self.kmeans_max_iter,
        );

        let mut clusters = Vec::with_capacity(self.n_clusters);
        for cluster_id in 0..self.n_clusters {
            let member_replies: Vec<FeatureVector> = reply_vectors
                .iter()
                .zip(&result.assignments)
                .filter(|(_, assignment)| **assignment == cluster_id)
                .map(|(vector, _)| *vector)
                .collect();
            // Empty clusters are dropped silently.
            let Some(reply_style_vector) = FeatureVector::mean(&member_replies) else {
                continue;
            };
            clusters.push(StyleCluster {
                cluster_id: cluster_id as u32,
                centroid_vector: result.centroids[cluster_id],
                reply_style_vector,
                sample_count: member_replies.len() as u64,
            });
        }

        let written = clusters.len();
        let _guard = self.locks.lock(user_id).await;
        self.store.replace_clusters(user_id, &clusters)?;
        tracing::info!(
            user_id,
            clusters = written,
            pairs = pairs.len(),
            "reclustered reply styles"
        );
        Ok(written)
    }

    /// Labels of the reply style the user tends toward for mail that looks
    /// like `incoming_text`: nearest stored centroid by cosine similarity,
    /// ties to the lowest cluster id, projected through the same label
    /// derivation as the general style.
    ///
    /// # Errors
    /// [`StyleError::NoClusters`] when the user has no stored clusters.
    pub async fn nearest_cluster_labels(
        &self,
        user_id: &str,
        incoming_text: &str,
    ) -> Result<DerivedLabels, StyleError> {
        let clusters = self.store.clusters(user_id)?;
        if clusters.is_empty() {
            return Err(StyleError::NoClusters {
                user_id: user_id.to_string(),
            });
        }
        let vector = self
            .analyzer
            .analyze(&[incoming_text.to_string()])
            .await?;
        let best = nearest_cluster(&clusters, &vector).ok_or_else(|| StyleError::NoClusters {
            user_id: user_id.to_string(),
        })?;
        Ok(derive_labels(&best.reply_style_vector, &self.thresholds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::testing::StubAnalyzer;
    use crate::features::{ProcessingStyle, Tone};
    use crate::storage::sqlite::store_at;

    fn uniform(value: f64) -> FeatureVector {
        FeatureVector::from_array([value; FeatureVector::DIMS])
    }

    fn engine_with(
        analyzer: StubAnalyzer,
    ) -> (tempfile::TempDir, Arc<SqliteStyleStore>, ReplyClusterEngine) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_at(dir.path(), "style.db").unwrap());
        let engine = ReplyClusterEngine::new(
            store.clone(),
            Arc::new(analyzer),
            UserLocks::new(),
            &StyleConfig::default(),
        );
        (dir, store, engine)
    }

    /// Three stylistically distinct incoming groups with distinct replies.
    fn three_group_analyzer() -> (StubAnalyzer, Vec<(String, String)>) {
        let mut analyzer = StubAnalyzer::new();
        let mut pairs = Vec::new();
        for group in 0..3u32 {
            for i in 0..2u32 {
                let incoming = format!("incoming-{group}-{i}");
                let reply = format!("reply-{group}-{i}");
                analyzer = analyzer
                    .with_response(&incoming, uniform(group as f64 * 10.0 + i as f64 * 0.1))
                    .with_response(&reply, uniform(group as f64 * 100.0));
                pairs.push((incoming, reply));
            }
        }
        (analyzer, pairs)
    }

    #[tokio::test]
    async fn initialize_clusters_the_pair_history() {
        let (analyzer, pairs) = three_group_analyzer();
        let (_dir, store, engine) = engine_with(analyzer);

        let written = engine.initialize("u1", &pairs).await.unwrap();
        assert!(written >= 1 && written <= 3);
        assert_eq!(store.pairs("u1").unwrap().len(), 6);

        let clusters = store.clusters("u1").unwrap();
        assert_eq!(clusters.len(), written);
        let total_samples: u64 = clusters.iter().map(|c| c.sample_count).sum();
        assert_eq!(total_samples, 6);
    }

    #[tokio::test]
    async fn recluster_is_deterministic_on_identical_history() {
        let (analyzer, pairs) = three_group_analyzer();
        let (_dir, store, engine) = engine_with(analyzer);

        engine.initialize("u1", &pairs).await.unwrap();
        let first = store.clusters("u1").unwrap();
        engine.recluster("u1").await.unwrap();
        let second = store.clusters("u1").unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn insufficient_history_leaves_existing_clusters_untouched() {
        let (analyzer, _) = three_group_analyzer();
        let (_dir, store, engine) = engine_with(analyzer);

        let preexisting = vec![StyleCluster {
            cluster_id: 0,
            centroid_vector: uniform(5.0),
            reply_style_vector: uniform(7.0),
            sample_count: 4,
        }];
        store.replace_clusters("u1", &preexisting).unwrap();

        // Two pairs, three requested clusters.
        let pairs = vec![
            ("incoming-0-0".to_string(), "reply-0-0".to_string()),
            ("incoming-1-0".to_string(), "reply-1-0".to_string()),
        ];
        let err = engine.initialize("u1", &pairs).await.unwrap_err();
        assert!(matches!(
            err,
            StyleError::InsufficientData {
                available: 2,
                required: 3
            }
        ));

        // Clusters untouched, but the appended pairs persist for later.
        assert_eq!(store.clusters("u1").unwrap(), preexisting);
        assert_eq!(store.pairs("u1").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn initialize_skips_pairs_with_empty_sides() {
        let (analyzer, mut pairs) = three_group_analyzer();
        pairs.push((String::new(), "reply-orphan".to_string()));
        pairs.push(("incoming-orphan".to_string(), String::new()));
        let (_dir, store, engine) = engine_with(analyzer);

        engine.initialize("u1", &pairs).await.unwrap();
        assert_eq!(store.pairs("u1").unwrap().len(), 6);
    }

    #[tokio::test]
    async fn nearest_cluster_labels_projects_the_winning_reply_style() {
        let analyzer = StubAnalyzer::new().with_response(
            "query",
            FeatureVector::from_array([0.9, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0]),
        );
        let (_dir, store, engine) = engine_with(analyzer);

        let friendly_reply = FeatureVector {
            polarity_mean: 0.5,
            question_ratio: 0.5,
            ..FeatureVector::zeros()
        };
        store
            .replace_clusters(
                "u1",
                &[
                    StyleCluster {
                        cluster_id: 0,
                        centroid_vector: FeatureVector::from_array([
                            1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
                        ]),
                        reply_style_vector: friendly_reply,
                        sample_count: 2,
                    },
                    StyleCluster {
                        cluster_id: 1,
                        centroid_vector: FeatureVector::from_array([
                            0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0,
                        ]),
                        reply_style_vector: FeatureVector::zeros(),
                        sample_count: 2,
                    },
                ],
            )
            .unwrap();

        let labels = engine.nearest_cluster_labels("u1", "query").await.unwrap();
        assert_eq!(labels.tone, Tone::Friendly);
        assert_eq!(labels.processing_style, ProcessingStyle::Inquisitive);
    }

    #[tokio::test]
    async fn retrieval_without_clusters_reports_no_clusters() {
        let (_dir, _store, engine) = engine_with(StubAnalyzer::new());
        let err = engine
            .nearest_cluster_labels("ghost", "anything")
            .await
            .unwrap_err();
        assert!(matches!(err, StyleError::NoClusters { .. }));
    }
}
