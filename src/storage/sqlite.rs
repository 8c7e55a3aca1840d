//! SQLite-backed store for profiles, buffers, pairs, and clusters.
//!
//! Follows the one-connection-per-operation pattern: every method opens the
//! database file, does its work (multi-row mutations inside a single
//! transaction), and closes. Async callers wrap these methods in
//! `tokio::task::spawn_blocking` when latency matters; individual operations
//! are small.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{BufferedEmail, EmailReplyPair, LearningProfile, ProfileVersion, StyleCluster};
use crate::error::StyleError;
use crate::features::{DerivedLabels, FeatureVector};

/// SQLite store for all six style-engine record types.
#[derive(Debug, Clone)]
pub struct SqliteStyleStore {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
}

impl SqliteStyleStore {
    /// Open (creating if needed) the store at `db_path` and ensure the schema
    /// exists.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self, StyleError> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self { db_path };
        store.initialize_db()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection, StyleError> {
        Ok(Connection::open(&self.db_path)?)
    }

    fn initialize_db(&self) -> Result<(), StyleError> {
        let conn = self.open()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS learning_profiles (
                user_id TEXT PRIMARY KEY,
                feature_vector TEXT NOT NULL,
                derived_labels TEXT NOT NULL,
                email_count INTEGER NOT NULL DEFAULT 0,
                last_updated TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS learning_profile_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                feature_vector TEXT NOT NULL,
                derived_labels TEXT NOT NULL,
                email_count INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS style_email_buffer (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                email_text TEXT NOT NULL,
                source TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS email_reply_pairs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                incoming_email TEXT NOT NULL,
                reply_email TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS style_clusters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                cluster_id INTEGER NOT NULL,
                centroid_vector TEXT NOT NULL,
                reply_style_vector TEXT NOT NULL,
                sample_count INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS cluster_status (
                user_id TEXT PRIMARY KEY,
                pair_count_since_last_cluster INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_buffer_user ON style_email_buffer(user_id);
            CREATE INDEX IF NOT EXISTS idx_pairs_user ON email_reply_pairs(user_id);
            CREATE INDEX IF NOT EXISTS idx_clusters_user ON style_clusters(user_id);",
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Learning profiles
    // -----------------------------------------------------------------------

    /// Load a user's profile, or `None` if never learned.
    pub fn profile(&self, user_id: &str) -> Result<Option<LearningProfile>, StyleError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT feature_vector, derived_labels, email_count, last_updated
             FROM learning_profiles WHERE user_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, DateTime<Utc>>(3)?,
            ))
        })?;
        match rows.next() {
            Some(row) => {
                let (vector_json, labels_json, email_count, last_updated) = row?;
                Ok(Some(LearningProfile {
                    user_id: user_id.to_string(),
                    feature_vector: serde_json::from_str::<FeatureVector>(&vector_json)?,
                    derived_labels: serde_json::from_str::<DerivedLabels>(&labels_json)?,
                    email_count: email_count as u64,
                    last_updated,
                }))
            }
            None => Ok(None),
        }
    }

    /// Insert or overwrite a user's profile, appending a version snapshot in
    /// the same transaction.
    pub fn upsert_profile(&self, profile: &LearningProfile) -> Result<(), StyleError> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        Self::upsert_profile_in_tx(&tx, profile)?;
        tx.commit()?;
        Ok(())
    }

    fn upsert_profile_in_tx(
        tx: &rusqlite::Transaction<'_>,
        profile: &LearningProfile,
    ) -> Result<(), StyleError> {
        let vector_json = serde_json::to_string(&profile.feature_vector)?;
        let labels_json = serde_json::to_string(&profile.derived_labels)?;
        tx.execute(
            "INSERT INTO learning_profiles
                (user_id, feature_vector, derived_labels, email_count, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                feature_vector = excluded.feature_vector,
                derived_labels = excluded.derived_labels,
                email_count = excluded.email_count,
                last_updated = excluded.last_updated",
            params![
                profile.user_id,
                vector_json,
                labels_json,
                profile.email_count as i64,
                profile.last_updated,
            ],
        )?;
        tx.execute(
            "INSERT INTO learning_profile_versions
                (user_id, feature_vector, derived_labels, email_count, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                profile.user_id,
                vector_json,
                labels_json,
                profile.email_count as i64,
                profile.last_updated,
            ],
        )?;
        Ok(())
    }

    /// Audit trail of profile snapshots, oldest first.
    pub fn profile_versions(&self, user_id: &str) -> Result<Vec<ProfileVersion>, StyleError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, feature_vector, derived_labels, email_count, updated_at
             FROM learning_profile_versions WHERE user_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, DateTime<Utc>>(4)?,
            ))
        })?;
        let mut versions = Vec::new();
        for row in rows {
            let (id, vector_json, labels_json, email_count, updated_at) = row?;
            versions.push(ProfileVersion {
                id,
                user_id: user_id.to_string(),
                feature_vector: serde_json::from_str(&vector_json)?,
                derived_labels: serde_json::from_str(&labels_json)?,
                email_count: email_count as u64,
                updated_at,
            });
        }
        Ok(versions)
    }

    // -----------------------------------------------------------------------
    // Style email buffer
    // -----------------------------------------------------------------------

    /// Append a sample to a user's pending queue.
    pub fn enqueue_sample(
        &self,
        user_id: &str,
        email_text: &str,
        source: super::SampleSource,
    ) -> Result<(), StyleError> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO style_email_buffer (user_id, email_text, source, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, email_text, source.as_str(), Utc::now()],
        )?;
        Ok(())
    }

    /// A user's full pending queue, oldest first. Tie on `created_at` breaks
    /// by insertion id so consumption order is deterministic.
    pub fn pending_samples(&self, user_id: &str) -> Result<Vec<BufferedEmail>, StyleError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, email_text, source, created_at
             FROM style_email_buffer WHERE user_id = ?1
             ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, DateTime<Utc>>(3)?,
            ))
        })?;
        let mut samples = Vec::new();
        for row in rows {
            let (id, email_text, source, created_at) = row?;
            samples.push(BufferedEmail {
                id,
                user_id: user_id.to_string(),
                email_text,
                source: source.parse()?,
                created_at,
            });
        }
        Ok(samples)
    }

    /// Distinct users with at least one pending sample. Drives the sweep.
    pub fn buffered_user_ids(&self) -> Result<Vec<String>, StyleError> {
        let conn = self.open()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT user_id FROM style_email_buffer ORDER BY user_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut user_ids = Vec::new();
        for row in rows {
            user_ids.push(row?);
        }
        Ok(user_ids)
    }

    /// Persist an updated profile and delete the buffer row it consumed, in
    /// one transaction. Either both land or neither does, so a sample can
    /// never be double-counted or silently dropped.
    pub fn consume_sample(
        &self,
        profile: &LearningProfile,
        sample_id: i64,
    ) -> Result<(), StyleError> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        Self::upsert_profile_in_tx(&tx, profile)?;
        tx.execute(
            "DELETE FROM style_email_buffer WHERE id = ?1",
            params![sample_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Email/reply pairs
    // -----------------------------------------------------------------------

    /// Append (incoming, reply) pairs to a user's history log.
    pub fn append_pairs(
        &self,
        user_id: &str,
        pairs: &[(String, String)],
    ) -> Result<usize, StyleError> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let now = Utc::now();
        let mut inserted = 0;
        for (incoming, reply) in pairs {
            tx.execute(
                "INSERT INTO email_reply_pairs (user_id, incoming_email, reply_email, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, incoming, reply, now],
            )?;
            inserted += 1;
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// A user's full pair history, oldest first.
    pub fn pairs(&self, user_id: &str) -> Result<Vec<EmailReplyPair>, StyleError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, incoming_email, reply_email, created_at
             FROM email_reply_pairs WHERE user_id = ?1
             ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, DateTime<Utc>>(3)?,
            ))
        })?;
        let mut pairs = Vec::new();
        for row in rows {
            let (id, incoming_email, reply_email, created_at) = row?;
            pairs.push(EmailReplyPair {
                id,
                user_id: user_id.to_string(),
                incoming_email,
                reply_email,
                created_at,
            });
        }
        Ok(pairs)
    }

    // -----------------------------------------------------------------------
    // Style clusters
    // -----------------------------------------------------------------------

    /// A user's clusters, ordered by `cluster_id` so arg-max ties resolve to
    /// the lowest id.
    pub fn clusters(&self, user_id: &str) -> Result<Vec<StyleCluster>, StyleError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT cluster_id, centroid_vector, reply_style_vector, sample_count
             FROM style_clusters WHERE user_id = ?1 ORDER BY cluster_id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;
        let mut clusters = Vec::new();
        for row in rows {
            let (cluster_id, centroid_json, reply_json, sample_count) = row?;
            clusters.push(StyleCluster {
                cluster_id: cluster_id as u32,
                centroid_vector: serde_json::from_str(&centroid_json)?,
                reply_style_vector: serde_json::from_str(&reply_json)?,
                sample_count: sample_count as u64,
            });
        }
        Ok(clusters)
    }

    /// Atomically replace all of a user's clusters with a new set.
    ///
    /// Delete and insert ride one transaction: a failure rolls the user back
    /// to the prior cluster set rather than leaving them with none.
    pub fn replace_clusters(
        &self,
        user_id: &str,
        clusters: &[StyleCluster],
    ) -> Result<(), StyleError> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM style_clusters WHERE user_id = ?1",
            params![user_id],
        )?;
        for cluster in clusters {
            tx.execute(
                "INSERT INTO style_clusters
                    (user_id, cluster_id, centroid_vector, reply_style_vector, sample_count)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user_id,
                    cluster.cluster_id as i64,
                    serde_json::to_string(&cluster.centroid_vector)?,
                    serde_json::to_string(&cluster.reply_style_vector)?,
                    cluster.sample_count as i64,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Persist one online update: the observed pair appended to the history
    /// log, the nudged reply-style vector for one cluster, and the
    /// incremented pair counter, all in a single transaction. Returns the
    /// new counter value.
    pub fn apply_online_update(
        &self,
        user_id: &str,
        incoming_email: &str,
        reply_email: &str,
        cluster_id: u32,
        reply_style_vector: &FeatureVector,
        sample_count: u64,
    ) -> Result<u64, StyleError> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO email_reply_pairs (user_id, incoming_email, reply_email, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, incoming_email, reply_email, Utc::now()],
        )?;
        tx.execute(
            "UPDATE style_clusters
             SET reply_style_vector = ?1, sample_count = ?2
             WHERE user_id = ?3 AND cluster_id = ?4",
            params![
                serde_json::to_string(reply_style_vector)?,
                sample_count as i64,
                user_id,
                cluster_id as i64,
            ],
        )?;
        tx.execute(
            "INSERT INTO cluster_status (user_id, pair_count_since_last_cluster)
             VALUES (?1, 1)
             ON CONFLICT(user_id) DO UPDATE SET
                pair_count_since_last_cluster = pair_count_since_last_cluster + 1",
            params![user_id],
        )?;
        let count: i64 = tx.query_row(
            "SELECT pair_count_since_last_cluster FROM cluster_status WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        tx.commit()?;
        Ok(count as u64)
    }

    /// Pairs observed since the last full re-clustering.
    pub fn pair_count_since_last_cluster(&self, user_id: &str) -> Result<u64, StyleError> {
        let conn = self.open()?;
        let count: Option<i64> = conn
            .query_row(
                "SELECT pair_count_since_last_cluster FROM cluster_status WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(count.unwrap_or(0) as u64)
    }

    /// Reset the pair counter to zero (a full re-clustering just ran).
    pub fn reset_pair_count(&self, user_id: &str) -> Result<(), StyleError> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO cluster_status (user_id, pair_count_since_last_cluster)
             VALUES (?1, 0)
             ON CONFLICT(user_id) DO UPDATE SET pair_count_since_last_cluster = 0",
            params![user_id],
        )?;
        Ok(())
    }
}

/// Convenience for tests: a store under the given directory.
#[cfg(test)]
pub(crate) fn store_at(
    dir: &std::path::Path,
    file_name: &str,
) -> Result<SqliteStyleStore, StyleError> {
    SqliteStyleStore::new(dir.join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{derive_labels, LabelThresholds};
    use crate::storage::SampleSource;

    fn test_store() -> (tempfile::TempDir, SqliteStyleStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(dir.path(), "style.db").unwrap();
        (dir, store)
    }

    fn profile_with_count(user_id: &str, count: u64) -> LearningProfile {
        let vector = FeatureVector::from_array([10.0, 8.0, 0.05, 0.1, 0.3, 0.1, 0.5]);
        LearningProfile {
            user_id: user_id.to_string(),
            feature_vector: vector,
            derived_labels: derive_labels(&vector, &LabelThresholds::default()),
            email_count: count,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn profile_upsert_and_load_round_trip() {
        let (_dir, store) = test_store();
        assert!(store.profile("u1").unwrap().is_none());

        let profile = profile_with_count("u1", 3);
        store.upsert_profile(&profile).unwrap();
        let loaded = store.profile("u1").unwrap().unwrap();
        assert_eq!(loaded.feature_vector, profile.feature_vector);
        assert_eq!(loaded.derived_labels, profile.derived_labels);
        assert_eq!(loaded.email_count, 3);
    }

    #[test]
    fn every_upsert_appends_a_version_snapshot() {
        let (_dir, store) = test_store();
        store.upsert_profile(&profile_with_count("u1", 1)).unwrap();
        store.upsert_profile(&profile_with_count("u1", 2)).unwrap();

        let versions = store.profile_versions("u1").unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].email_count, 1);
        assert_eq!(versions[1].email_count, 2);
        // The live row reflects only the latest state.
        assert_eq!(store.profile("u1").unwrap().unwrap().email_count, 2);
    }

    #[test]
    fn buffer_preserves_enqueue_order_per_user() {
        let (_dir, store) = test_store();
        store.enqueue_sample("u1", "first", SampleSource::Written).unwrap();
        store.enqueue_sample("u1", "second", SampleSource::Edited).unwrap();
        store.enqueue_sample("u2", "other", SampleSource::Written).unwrap();

        let samples = store.pending_samples("u1").unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].email_text, "first");
        assert_eq!(samples[1].email_text, "second");
        assert_eq!(samples[1].source, SampleSource::Edited);

        let mut users = store.buffered_user_ids().unwrap();
        users.sort();
        assert_eq!(users, vec!["u1".to_string(), "u2".to_string()]);
    }

    #[test]
    fn consume_sample_updates_profile_and_drains_row_together() {
        let (_dir, store) = test_store();
        store.enqueue_sample("u1", "text", SampleSource::Written).unwrap();
        let sample = store.pending_samples("u1").unwrap().remove(0);

        store.consume_sample(&profile_with_count("u1", 1), sample.id).unwrap();
        assert!(store.pending_samples("u1").unwrap().is_empty());
        assert_eq!(store.profile("u1").unwrap().unwrap().email_count, 1);
        assert_eq!(store.profile_versions("u1").unwrap().len(), 1);
    }

    #[test]
    fn pairs_are_append_only_and_ordered() {
        let (_dir, store) = test_store();
        store
            .append_pairs("u1", &[("in-a".into(), "re-a".into()), ("in-b".into(), "re-b".into())])
            .unwrap();
        store.append_pairs("u1", &[("in-c".into(), "re-c".into())]).unwrap();

        let pairs = store.pairs("u1").unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].incoming_email, "in-a");
        assert_eq!(pairs[2].reply_email, "re-c");
    }

    #[test]
    fn replace_clusters_swaps_the_whole_set() {
        let (_dir, store) = test_store();
        let cluster = |id: u32, x: f64| StyleCluster {
            cluster_id: id,
            centroid_vector: FeatureVector::from_array([x; FeatureVector::DIMS]),
            reply_style_vector: FeatureVector::from_array([x; FeatureVector::DIMS]),
            sample_count: 1,
        };
        store.replace_clusters("u1", &[cluster(0, 1.0), cluster(1, 2.0)]).unwrap();
        assert_eq!(store.clusters("u1").unwrap().len(), 2);

        store.replace_clusters("u1", &[cluster(0, 9.0)]).unwrap();
        let clusters = store.clusters("u1").unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].centroid_vector.avg_sentence_length, 9.0);
    }

    #[test]
    fn online_update_increments_counter_transactionally() {
        let (_dir, store) = test_store();
        let cluster = StyleCluster {
            cluster_id: 0,
            centroid_vector: FeatureVector::zeros(),
            reply_style_vector: FeatureVector::zeros(),
            sample_count: 0,
        };
        store.replace_clusters("u1", &[cluster]).unwrap();

        let nudged = FeatureVector::from_array([1.0; FeatureVector::DIMS]);
        assert_eq!(
            store.apply_online_update("u1", "in-a", "re-a", 0, &nudged, 1).unwrap(),
            1
        );
        assert_eq!(
            store.apply_online_update("u1", "in-b", "re-b", 0, &nudged, 2).unwrap(),
            2
        );
        assert_eq!(store.pair_count_since_last_cluster("u1").unwrap(), 2);

        let stored = store.clusters("u1").unwrap().remove(0);
        assert_eq!(stored.sample_count, 2);
        assert_eq!(stored.reply_style_vector, nudged);
        // The observed pairs joined the append-only history in the same tx.
        assert_eq!(store.pairs("u1").unwrap().len(), 2);

        store.reset_pair_count("u1").unwrap();
        assert_eq!(store.pair_count_since_last_cluster("u1").unwrap(), 0);
    }

    #[test]
    fn pair_count_defaults_to_zero_for_unknown_user() {
        let (_dir, store) = test_store();
        assert_eq!(store.pair_count_since_last_cluster("nobody").unwrap(), 0);
    }
}
