//! # stylelearn
//!
//! Adaptive per-user style learning and reply-context clustering for
//! AI-assisted email composition.
//!
//! The engine converts raw email text into numeric stylistic feature
//! vectors (through an external text-analyzer collaborator), maintains a
//! running general-style profile per user, and keeps a set of per-user
//! reply-context clusters that answer "how would this user reply to
//! something that looks like X?". Derived categorical labels feed the
//! downstream text-generation service as prompt-conditioning input.

pub mod analyzer;
pub mod buffer;
pub mod cluster;
pub mod config;
pub mod error;
pub mod features;
pub mod locks;
pub mod profile;
pub mod scheduler;
pub mod server;
pub mod storage;

pub use analyzer::{HttpTextAnalyzer, TextAnalyzer};
pub use buffer::BufferedIngestion;
pub use cluster::{OnlineClusterUpdater, ReplyClusterEngine};
pub use config::StyleConfig;
pub use error::StyleError;
pub use features::{derive_labels, DerivedLabels, FeatureVector, LabelThresholds};
pub use profile::GeneralStyleLearner;
pub use storage::{LearningProfile, SampleSource, SqliteStyleStore, StyleCluster};

/// Library version.
pub const VERSION: &str = "0.1.0";
