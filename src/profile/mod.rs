//! General style learning: one running style vector per user.
//!
//! The learner maintains each user's single [`LearningProfile`] via
//! count-weighted incremental averaging and projects it to categorical
//! labels. Bulk [`GeneralStyleLearner::learn`] overwrites the profile;
//! [`GeneralStyleLearner::update`] folds one sample into the running mean.

use std::sync::Arc;

use chrono::Utc;

use crate::analyzer::TextAnalyzer;
use crate::error::StyleError;
use crate::features::{derive_labels, DerivedLabels, FeatureVector, LabelThresholds};
use crate::locks::UserLocks;
use crate::storage::{BufferedEmail, LearningProfile, SqliteStyleStore};

/// Maintains per-user general style profiles.
pub struct GeneralStyleLearner {
    store: Arc<SqliteStyleStore>,
    analyzer: Arc<dyn TextAnalyzer>,
    thresholds: LabelThresholds,
    locks: UserLocks,
}

impl GeneralStyleLearner {
    pub fn new(
        store: Arc<SqliteStyleStore>,
        analyzer: Arc<dyn TextAnalyzer>,
        thresholds: LabelThresholds,
        locks: UserLocks,
    ) -> Self {
        Self {
            store,
            analyzer,
            thresholds,
            locks,
        }
    }

    /// Bulk (re)initialization from a batch of emails.
    ///
    /// Computes one feature vector over the whole batch and **overwrites**
    /// the stored profile; prior state is not merged. `email_count` becomes
    /// the batch size.
    pub async fn learn(
        &self,
        user_id: &str,
        texts: &[String],
    ) -> Result<(DerivedLabels, FeatureVector), StyleError> {
        let vector = self.analyzer.analyze(texts).await?;
        let labels = derive_labels(&vector, &self.thresholds);
        let profile = LearningProfile {
            user_id: user_id.to_string(),
            feature_vector: vector,
            derived_labels: labels,
            email_count: texts.len() as u64,
            last_updated: Utc::now(),
        };

        let _guard = self.locks.lock(user_id).await;
        self.store.upsert_profile(&profile)?;
        tracing::info!(user_id, samples = texts.len(), "learned general style");
        Ok((labels, vector))
    }

    /// Incremental single-sample update.
    ///
    /// Folds the sample into the stored running average with count weighting
    /// and recomputes labels. With no prior profile this degenerates to
    /// [`GeneralStyleLearner::learn`] over a singleton batch.
    pub async fn update(&self, user_id: &str, text: &str) -> Result<DerivedLabels, StyleError> {
        let sample = self.analyzer.analyze(&[text.to_string()]).await?;

        let _guard = self.locks.lock(user_id).await;
        let existing = self.store.profile(user_id)?;
        let profile = self.folded_profile(user_id, existing, &sample);
        let labels = profile.derived_labels;
        self.store.upsert_profile(&profile)?;
        tracing::debug!(
            user_id,
            email_count = profile.email_count,
            "updated general style"
        );
        Ok(labels)
    }

    /// Current derived labels for a user.
    ///
    /// # Errors
    /// [`StyleError::ProfileNotFound`] when no sample has ever been learned —
    /// distinct from a zero-count profile, which cannot exist.
    pub fn current_labels(&self, user_id: &str) -> Result<DerivedLabels, StyleError> {
        match self.store.profile(user_id)? {
            Some(profile) => Ok(profile.derived_labels),
            None => Err(StyleError::ProfileNotFound {
                user_id: user_id.to_string(),
            }),
        }
    }

    /// Fold one buffered sample into the profile and delete its queue row in
    /// the same store transaction. Caller must hold the user lock.
    pub(crate) async fn consume_buffered(
        &self,
        sample: &BufferedEmail,
    ) -> Result<(), StyleError> {
        let vector = self.analyzer.analyze(&[sample.email_text.clone()]).await?;
        let existing = self.store.profile(&sample.user_id)?;
        let profile = self.folded_profile(&sample.user_id, existing, &vector);
        self.store.consume_sample(&profile, sample.id)
    }

    /// The next profile state after folding `sample` into `existing`.
    fn folded_profile(
        &self,
        user_id: &str,
        existing: Option<LearningProfile>,
        sample: &FeatureVector,
    ) -> LearningProfile {
        let (vector, count) = match &existing {
            Some(profile) => (
                profile.feature_vector.fold_sample(sample, profile.email_count),
                profile.email_count + 1,
            ),
            None => (*sample, 1),
        };
        LearningProfile {
            user_id: user_id.to_string(),
            feature_vector: vector,
            derived_labels: derive_labels(&vector, &self.thresholds),
            email_count: count,
            last_updated: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::testing::{FailingAnalyzer, StubAnalyzer};
    use crate::storage::sqlite::store_at;

    fn learner_with(analyzer: Arc<dyn TextAnalyzer>) -> (tempfile::TempDir, GeneralStyleLearner) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_at(dir.path(), "style.db").unwrap());
        let learner = GeneralStyleLearner::new(
            store,
            analyzer,
            LabelThresholds::default(),
            UserLocks::new(),
        );
        (dir, learner)
    }

    fn uniform(value: f64) -> FeatureVector {
        FeatureVector::from_array([value; FeatureVector::DIMS])
    }

    #[tokio::test]
    async fn sequential_updates_converge_to_arithmetic_mean() {
        let samples = [2.0, 4.0, 6.0, 8.0];
        let mut analyzer = StubAnalyzer::new();
        for value in samples {
            analyzer = analyzer.with_response(&format!("email-{value}"), uniform(value));
        }
        let (_dir, learner) = learner_with(Arc::new(analyzer));

        for value in samples {
            learner.update("u1", &format!("email-{value}")).await.unwrap();
        }

        let profile = learner.store.profile("u1").unwrap().unwrap();
        assert_eq!(profile.email_count, samples.len() as u64);
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        for value in profile.feature_vector.as_array() {
            assert!((value - mean).abs() < 1e-9, "expected {mean}, got {value}");
        }
    }

    #[tokio::test]
    async fn first_update_behaves_like_singleton_learn() {
        let analyzer = StubAnalyzer::new().with_response("hello", uniform(3.0));
        let (_dir, learner) = learner_with(Arc::new(analyzer));

        learner.update("u1", "hello").await.unwrap();
        let profile = learner.store.profile("u1").unwrap().unwrap();
        assert_eq!(profile.email_count, 1);
        assert_eq!(profile.feature_vector, uniform(3.0));
    }

    #[tokio::test]
    async fn learn_overwrites_rather_than_merges() {
        let analyzer = StubAnalyzer::new().with_response("old", uniform(100.0));
        let (_dir, learner) = learner_with(Arc::new(analyzer));

        learner.update("u1", "old").await.unwrap();
        let batch = vec!["a fresh start".to_string(), "another email".to_string()];
        let (_, vector) = learner.learn("u1", &batch).await.unwrap();

        let profile = learner.store.profile("u1").unwrap().unwrap();
        assert_eq!(profile.email_count, 2);
        assert_eq!(profile.feature_vector, vector);
        assert_ne!(profile.feature_vector, uniform(100.0));
    }

    #[tokio::test]
    async fn current_labels_reports_not_found_before_any_learning() {
        let (_dir, learner) = learner_with(Arc::new(StubAnalyzer::new()));
        let err = learner.current_labels("ghost").unwrap_err();
        assert!(matches!(err, StyleError::ProfileNotFound { .. }));
    }

    #[tokio::test]
    async fn analyzer_failure_persists_nothing() {
        let (_dir, learner) = learner_with(Arc::new(FailingAnalyzer));
        let err = learner.update("u1", "anything").await.unwrap_err();
        assert!(matches!(err, StyleError::Analyzer(_)));
        assert!(learner.store.profile("u1").unwrap().is_none());
    }

    #[tokio::test]
    async fn labels_follow_the_updated_vector() {
        // One very positive sample, then one very negative one; tone must
        // track the running mean, not the last sample.
        let positive = FeatureVector {
            polarity_mean: 0.9,
            ..uniform(0.0)
        };
        let negative = FeatureVector {
            polarity_mean: -0.3,
            ..uniform(0.0)
        };
        let analyzer = StubAnalyzer::new()
            .with_response("pos", positive)
            .with_response("neg", negative);
        let (_dir, learner) = learner_with(Arc::new(analyzer));

        let labels = learner.update("u1", "pos").await.unwrap();
        assert_eq!(labels.tone, crate::features::Tone::Friendly);

        // Mean polarity is now 0.3, still above the 0.2 cutoff.
        let labels = learner.update("u1", "neg").await.unwrap();
        assert_eq!(labels.tone, crate::features::Tone::Friendly);
    }
}
