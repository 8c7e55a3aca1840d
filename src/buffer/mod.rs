//! Buffered ingestion of style samples.
//!
//! Raw "written"/"edited" emails are queued per user and only folded into
//! the general style profile once a threshold of pending samples is reached.
//! This keeps a single outlier email from perturbing the running style as
//! eagerly as a raw per-message update would, and lets the background sweep
//! and inline per-request triggers coexist on the same queue.

use std::sync::Arc;

use crate::error::StyleError;
use crate::locks::UserLocks;
use crate::profile::GeneralStyleLearner;
use crate::storage::{SampleSource, SqliteStyleStore};

/// Per-user pending queue plus the threshold-gated flush.
pub struct BufferedIngestion {
    store: Arc<SqliteStyleStore>,
    learner: Arc<GeneralStyleLearner>,
    locks: UserLocks,
    threshold: usize,
}

impl BufferedIngestion {
    pub fn new(
        store: Arc<SqliteStyleStore>,
        learner: Arc<GeneralStyleLearner>,
        locks: UserLocks,
        threshold: usize,
    ) -> Self {
        Self {
            store,
            learner,
            locks,
            threshold,
        }
    }

    /// Append a sample to the user's pending queue. Unconditional; never
    /// triggers learning by itself.
    pub fn enqueue(
        &self,
        user_id: &str,
        email_text: &str,
        source: SampleSource,
    ) -> Result<(), StyleError> {
        self.store.enqueue_sample(user_id, email_text, source)
    }

    /// Flush the user's queue through incremental learning if it has reached
    /// the threshold. Returns whether a flush happened.
    ///
    /// Samples are consumed oldest-first, one incremental update per sample,
    /// so each contributes its standard count-weighted marginal update
    /// rather than a single batch overwrite. The per-user lock guarantees a
    /// given queue snapshot is consumed by at most one invocation; each
    /// consumed row is deleted in the same transaction that persists its
    /// profile update.
    pub async fn maybe_learn(&self, user_id: &str) -> Result<bool, StyleError> {
        let _guard = self.locks.lock(user_id).await;
        let samples = self.store.pending_samples(user_id)?;
        if samples.len() < self.threshold {
            tracing::debug!(
                user_id,
                pending = samples.len(),
                threshold = self.threshold,
                "buffer below threshold, leaving samples queued"
            );
            return Ok(false);
        }

        let consumed = samples.len();
        for sample in &samples {
            self.learner.consume_buffered(sample).await?;
        }
        tracing::info!(user_id, consumed, "flushed style buffer into profile");
        Ok(true)
    }
}
