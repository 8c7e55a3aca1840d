//! Engine configuration.
//!
//! Every tuning knob of the learning and clustering engines lives here as a
//! named field with the production default, overridable per deployment
//! through environment variables read by [`StyleConfig::from_env`].

use std::time::Duration;

use crate::features::LabelThresholds;

/// Tunable constants for the style-learning engine.
#[derive(Debug, Clone)]
pub struct StyleConfig {
    /// Cutoffs for the categorical label projection.
    pub label_thresholds: LabelThresholds,
    /// Minimum queued samples before a buffer flush learns from them.
    pub buffer_threshold: usize,
    /// Requested cluster count for full re-clustering.
    pub n_clusters: usize,
    /// Online pairs between automatic full re-clusterings.
    pub recluster_trigger: u64,
    /// Fixed k-means seed; identical input must cluster identically.
    pub kmeans_seed: u64,
    /// Iteration cap for a single k-means run.
    pub kmeans_max_iter: usize,
    /// Interval of the background buffer sweep.
    pub sweep_interval: Duration,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            label_thresholds: LabelThresholds::default(),
            buffer_threshold: 5,
            n_clusters: 3,
            recluster_trigger: 10,
            kmeans_seed: 42,
            kmeans_max_iter: 100,
            sweep_interval: Duration::from_secs(600),
        }
    }
}

impl StyleConfig {
    /// Defaults overridden by environment variables where set:
    /// `STYLE_BUFFER_THRESHOLD`, `STYLE_N_CLUSTERS`,
    /// `STYLE_RECLUSTER_TRIGGER`, `STYLE_SWEEP_INTERVAL_SECS`.
    /// Unparseable values fall back to the default for that field.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(value) = env_parse::<usize>("STYLE_BUFFER_THRESHOLD") {
            config.buffer_threshold = value;
        }
        if let Some(value) = env_parse::<usize>("STYLE_N_CLUSTERS") {
            config.n_clusters = value;
        }
        if let Some(value) = env_parse::<u64>("STYLE_RECLUSTER_TRIGGER") {
            config.recluster_trigger = value;
        }
        if let Some(value) = env_parse::<u64>("STYLE_SWEEP_INTERVAL_SECS") {
            config.sweep_interval = Duration::from_secs(value);
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|raw| raw.parse().ok())
}
