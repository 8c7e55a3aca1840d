//! Online reply-style updates between full re-clusterings.
//!
//! Each new (incoming, reply) pair nudges the nearest cluster's reply-style
//! vector by a count-weighted moving average. Centroids are deliberately NOT
//! updated here: an incoming email is always compared against the stable
//! centroids of the last full clustering, not a drifting reference. Every
//! `recluster_trigger` pairs, a full re-clustering corrects the accumulated
//! approximation.

use std::sync::Arc;

use crate::analyzer::TextAnalyzer;
use crate::cluster::{nearest_cluster, ReplyClusterEngine};
use crate::config::StyleConfig;
use crate::error::StyleError;
use crate::locks::UserLocks;
use crate::storage::SqliteStyleStore;

/// Applies single pairs to the stored cluster set.
pub struct OnlineClusterUpdater {
    store: Arc<SqliteStyleStore>,
    analyzer: Arc<dyn TextAnalyzer>,
    engine: Arc<ReplyClusterEngine>,
    locks: UserLocks,
    recluster_trigger: u64,
}

impl OnlineClusterUpdater {
    pub fn new(
        store: Arc<SqliteStyleStore>,
        analyzer: Arc<dyn TextAnalyzer>,
        engine: Arc<ReplyClusterEngine>,
        locks: UserLocks,
        config: &StyleConfig,
    ) -> Self {
        Self {
            store,
            analyzer,
            engine,
            locks,
            recluster_trigger: config.recluster_trigger,
        }
    }

    /// Feed one new (incoming, reply) pair into the user's cluster set.
    ///
    /// The pair is appended to the history log, the nearest cluster (by
    /// cosine similarity of the incoming vector to the stored centroids)
    /// absorbs the reply vector into its moving average, and the pair
    /// counter advances. Reaching the trigger threshold resets the counter
    /// and runs a full re-cluster — after the user lock is released, since
    /// re-clustering takes it again only for its final swap.
    ///
    /// # Errors
    /// [`StyleError::NoClusters`] when the user has no clusters yet; online
    /// updates require a prior [`ReplyClusterEngine::initialize`].
    pub async fn apply_pair(
        &self,
        user_id: &str,
        incoming_email: &str,
        reply_email: &str,
    ) -> Result<(), StyleError> {
        let incoming_vec = self
            .analyzer
            .analyze(&[incoming_email.to_string()])
            .await?;
        let reply_vec = self.analyzer.analyze(&[reply_email.to_string()]).await?;

        let should_recluster = {
            let _guard = self.locks.lock(user_id).await;
            let clusters = self.store.clusters(user_id)?;
            let best = nearest_cluster(&clusters, &incoming_vec).ok_or_else(|| {
                StyleError::NoClusters {
                    user_id: user_id.to_string(),
                }
            })?;

            let nudged = best
                .reply_style_vector
                .fold_sample(&reply_vec, best.sample_count);
            let pair_count = self.store.apply_online_update(
                user_id,
                incoming_email,
                reply_email,
                best.cluster_id,
                &nudged,
                best.sample_count + 1,
            )?;
            tracing::debug!(
                user_id,
                cluster_id = best.cluster_id,
                pair_count,
                "applied online reply-style update"
            );

            if pair_count >= self.recluster_trigger {
                self.store.reset_pair_count(user_id)?;
                true
            } else {
                false
            }
        };

        if should_recluster {
            tracing::info!(user_id, "online update trigger reached, reclustering");
            self.engine.recluster(user_id).await?;
        }
        Ok(())
    }
}
