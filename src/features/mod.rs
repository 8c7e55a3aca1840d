//! Stylistic feature vectors and their derived categorical labels.
//!
//! Every text sample in the system is summarized as a [`FeatureVector`]: a
//! fixed-order tuple of seven numeric stylistic dimensions. All comparison
//! and averaging is positional, so the dimension order is part of the
//! contract and must never change between writers and readers.

pub mod labels;
pub mod similarity;

use serde::{Deserialize, Serialize};

pub use labels::{
    derive_labels, Complexity, DerivedLabels, Formality, LabelThresholds, Length,
    ProcessingStyle, Tone,
};
pub use similarity::cosine_similarity;

/// Fixed-dimension numeric summary of a text sample's stylistic properties.
///
/// Field order matches the wire/storage order returned by the text analyzer.
/// Positional arithmetic goes through [`FeatureVector::as_array`] /
/// [`FeatureVector::from_array`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Mean words per sentence across the analyzed samples.
    pub avg_sentence_length: f64,
    /// Flesch-Kincaid style reading grade of the combined text.
    pub reading_grade_level: f64,
    /// Passive-voice constructions per sentence.
    pub passive_voice_ratio: f64,
    /// Fraction of sentences that are questions.
    pub question_ratio: f64,
    /// Mean sentiment polarity over sentences.
    pub polarity_mean: f64,
    /// Standard deviation of sentence polarity.
    pub polarity_std: f64,
    /// Mean subjectivity over sentences.
    pub subjectivity_mean: f64,
}

impl FeatureVector {
    /// Number of dimensions in every feature vector, system-wide.
    pub const DIMS: usize = 7;

    /// The all-zero vector.
    pub fn zeros() -> Self {
        Self::from_array([0.0; Self::DIMS])
    }

    /// View the vector as a positional array, in canonical dimension order.
    pub fn as_array(&self) -> [f64; Self::DIMS] {
        [
            self.avg_sentence_length,
            self.reading_grade_level,
            self.passive_voice_ratio,
            self.question_ratio,
            self.polarity_mean,
            self.polarity_std,
            self.subjectivity_mean,
        ]
    }

    /// Build a vector from a positional array in canonical dimension order.
    pub fn from_array(values: [f64; Self::DIMS]) -> Self {
        Self {
            avg_sentence_length: values[0],
            reading_grade_level: values[1],
            passive_voice_ratio: values[2],
            question_ratio: values[3],
            polarity_mean: values[4],
            polarity_std: values[5],
            subjectivity_mean: values[6],
        }
    }

    /// Build a vector from a slice.
    ///
    /// # Panics
    /// Panics if `values.len() != Self::DIMS`. A wrong-length vector is a
    /// programming-contract violation, not a recoverable runtime error.
    pub fn from_slice(values: &[f64]) -> Self {
        assert_eq!(
            values.len(),
            Self::DIMS,
            "feature vector must have exactly {} dimensions, got {}",
            Self::DIMS,
            values.len()
        );
        let mut array = [0.0; Self::DIMS];
        array.copy_from_slice(values);
        Self::from_array(array)
    }

    /// Fold a new sample into a running mean over `count` prior samples.
    ///
    /// `new[k] = (self[k] * count + sample[k]) / (count + 1)` for every
    /// dimension `k`. The caller owns incrementing its sample counter.
    pub fn fold_sample(&self, sample: &FeatureVector, count: u64) -> Self {
        let old = self.as_array();
        let new = sample.as_array();
        let count = count as f64;
        let mut merged = [0.0; Self::DIMS];
        for k in 0..Self::DIMS {
            merged[k] = (old[k] * count + new[k]) / (count + 1.0);
        }
        Self::from_array(merged)
    }

    /// Elementwise mean of a set of vectors. `None` when the set is empty.
    pub fn mean(vectors: &[FeatureVector]) -> Option<Self> {
        if vectors.is_empty() {
            return None;
        }
        let mut sums = [0.0; Self::DIMS];
        for vector in vectors {
            for (sum, value) in sums.iter_mut().zip(vector.as_array()) {
                *sum += value;
            }
        }
        let n = vectors.len() as f64;
        for sum in sums.iter_mut() {
            *sum /= n;
        }
        Some(Self::from_array(sums))
    }

    /// Squared Euclidean distance, used by k-means assignment.
    pub fn squared_distance(&self, other: &FeatureVector) -> f64 {
        self.as_array()
            .iter()
            .zip(other.as_array())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_round_trip_preserves_dimension_order() {
        let values = [11.0, 9.5, 0.08, 0.12, 0.35, 0.2, 0.6];
        let vector = FeatureVector::from_array(values);
        assert_eq!(vector.as_array(), values);
        assert_eq!(vector.avg_sentence_length, 11.0);
        assert_eq!(vector.subjectivity_mean, 0.6);
    }

    #[test]
    fn fold_sample_is_count_weighted() {
        // Running mean of 3 samples at [6, ...], folding in [12, ...]
        // must land at [7.5, ...].
        let running = FeatureVector::from_array([6.0; FeatureVector::DIMS]);
        let sample = FeatureVector::from_array([12.0; FeatureVector::DIMS]);
        let merged = running.fold_sample(&sample, 3);
        for value in merged.as_array() {
            assert!((value - 7.5).abs() < 1e-12);
        }
    }

    #[test]
    fn mean_of_vectors_is_elementwise() {
        let a = FeatureVector::from_array([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let b = FeatureVector::from_array([3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let mean = FeatureVector::mean(&[a, b]).unwrap();
        assert_eq!(mean.as_array(), [2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert!(FeatureVector::mean(&[]).is_none());
    }

    #[test]
    #[should_panic(expected = "exactly 7 dimensions")]
    fn from_slice_rejects_wrong_dimensionality() {
        FeatureVector::from_slice(&[1.0, 2.0, 3.0]);
    }

    #[test]
    fn serializes_with_named_dimensions() {
        let vector = FeatureVector::zeros();
        let json = serde_json::to_value(vector).unwrap();
        assert!(json.get("avg_sentence_length").is_some());
        assert!(json.get("polarity_std").is_some());
        let back: FeatureVector = serde_json::from_value(json).unwrap();
        assert_eq!(back, vector);
    }
}
