//! Text-analysis capability consumed by the learning engines.
//!
//! Feature extraction (sentence segmentation, readability scoring, sentiment
//! scoring) is provided by an external collaborator service. The engines only
//! depend on the [`TextAnalyzer`] trait: a pure `samples -> FeatureVector`
//! capability. [`HttpTextAnalyzer`] is the production implementation.

pub mod remote;

use async_trait::async_trait;

use crate::error::StyleError;
use crate::features::FeatureVector;

pub use remote::HttpTextAnalyzer;

/// Batch text analysis: a list of samples in, one feature vector out.
///
/// The vector summarizes the whole batch, not each sample individually;
/// callers that need per-sample vectors issue one call per sample.
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    /// Analyze a batch of text samples into a single feature vector.
    ///
    /// # Errors
    /// Returns [`StyleError::Analyzer`] when the collaborator is unavailable
    /// or responds with something that is not a feature vector.
    async fn analyze(&self, samples: &[String]) -> Result<FeatureVector, StyleError>;
}
