//! Durable records for the style-learning engine.
//!
//! The engine treats persistence as an opaque record store with per-user
//! filtered queries and bulk delete-by-filter. [`SqliteStyleStore`] is the
//! SQLite-backed implementation; the record structs here are its typed rows.
//! Every stored vector column is a JSON-serialized [`FeatureVector`], so
//! absence of a field is an explicit decode error rather than a silent
//! missing-key lookup.

pub mod sqlite;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StyleError;
use crate::features::{DerivedLabels, FeatureVector};

pub use sqlite::SqliteStyleStore;

/// Where a buffered sample came from: an email the user wrote from scratch,
/// or an AI draft the user edited before sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleSource {
    Written,
    Edited,
}

impl SampleSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleSource::Written => "written",
            SampleSource::Edited => "edited",
        }
    }
}

impl FromStr for SampleSource {
    type Err = StyleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "written" => Ok(SampleSource::Written),
            "edited" => Ok(SampleSource::Edited),
            other => Err(StyleError::InvalidSource {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SampleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's running general-style profile. One row per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningProfile {
    pub user_id: String,
    /// Running count-weighted average over all folded samples.
    pub feature_vector: FeatureVector,
    pub derived_labels: DerivedLabels,
    /// Number of samples folded into `feature_vector`.
    pub email_count: u64,
    pub last_updated: DateTime<Utc>,
}

/// Immutable snapshot of a [`LearningProfile`], appended on every upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileVersion {
    pub id: i64,
    pub user_id: String,
    pub feature_vector: FeatureVector,
    pub derived_labels: DerivedLabels,
    pub email_count: u64,
    pub updated_at: DateTime<Utc>,
}

/// A pending sample in a user's learning queue.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedEmail {
    pub id: i64,
    pub user_id: String,
    pub email_text: String,
    pub source: SampleSource,
    pub created_at: DateTime<Utc>,
}

/// One (incoming email, user reply) observation. Append-only: the full pair
/// history is replayed on every full re-clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailReplyPair {
    pub id: i64,
    pub user_id: String,
    pub incoming_email: String,
    pub reply_email: String,
    pub created_at: DateTime<Utc>,
}

/// One reply-context cluster for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleCluster {
    /// Cluster index from the last full re-clustering. Stable between
    /// re-clusterings; fully reassigned by each one.
    pub cluster_id: u32,
    /// Incoming-email-space centroid from the last full clustering. Not
    /// touched by online updates.
    pub centroid_vector: FeatureVector,
    /// Running average of reply vectors attributed to this cluster.
    pub reply_style_vector: FeatureVector,
    /// Number of replies folded into `reply_style_vector` since the last
    /// full re-clustering seeded it.
    pub sample_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_source_round_trips_through_str() {
        assert_eq!("written".parse::<SampleSource>().unwrap(), SampleSource::Written);
        assert_eq!("edited".parse::<SampleSource>().unwrap(), SampleSource::Edited);
        assert_eq!(SampleSource::Written.as_str(), "written");
    }

    #[test]
    fn unknown_sample_source_is_rejected() {
        let err = "forwarded".parse::<SampleSource>().unwrap_err();
        assert!(matches!(err, StyleError::InvalidSource { .. }));
        assert!(err.to_string().contains("forwarded"));
    }
}
