//! Categorical style labels derived from a feature vector.
//!
//! The mapping is a deterministic, fixed-threshold projection onto five
//! two-valued axes. The cutoffs are empirical values carried over from the
//! production service; they are exposed as named configuration fields rather
//! than re-derived.

use serde::{Deserialize, Serialize};

use super::FeatureVector;

/// Sentiment axis of the derived style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Friendly,
    Neutral,
}

/// Sentence-length axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Length {
    Concise,
    Detailed,
}

/// Reading-grade axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Advanced,
    Moderate,
}

/// Passive-voice axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Formality {
    Formal,
    Informal,
}

/// Question-usage axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStyle {
    Sequential,
    Inquisitive,
}

/// The categorical projection of a user's style vector.
///
/// Consumed by the text-generation collaborator as prompt-conditioning input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedLabels {
    pub tone: Tone,
    pub length: Length,
    pub complexity: Complexity,
    pub formality: Formality,
    pub processing_style: ProcessingStyle,
}

/// Numeric cutoffs for label derivation.
///
/// All comparisons are strict, so a value sitting exactly on a cutoff falls
/// into the second (else) category of its axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelThresholds {
    /// Tone is `friendly` iff `polarity_mean` exceeds this.
    pub friendly_polarity: f64,
    /// Length is `concise` iff `avg_sentence_length` is below this.
    pub concise_sentence_length: f64,
    /// Complexity is `advanced` iff `reading_grade_level` exceeds this.
    pub advanced_reading_grade: f64,
    /// Formality is `formal` iff `passive_voice_ratio` exceeds this.
    pub formal_passive_ratio: f64,
    /// Processing style is `sequential` iff `question_ratio` is below this.
    pub sequential_question_ratio: f64,
}

impl Default for LabelThresholds {
    fn default() -> Self {
        Self {
            friendly_polarity: 0.2,
            concise_sentence_length: 12.0,
            advanced_reading_grade: 10.0,
            formal_passive_ratio: 0.1,
            sequential_question_ratio: 0.05,
        }
    }
}

/// Project a feature vector onto the five categorical style axes.
///
/// Pure function: identical vector and thresholds always yield identical
/// labels. No randomness, no external state.
pub fn derive_labels(vector: &FeatureVector, thresholds: &LabelThresholds) -> DerivedLabels {
    DerivedLabels {
        tone: if vector.polarity_mean > thresholds.friendly_polarity {
            Tone::Friendly
        } else {
            Tone::Neutral
        },
        length: if vector.avg_sentence_length < thresholds.concise_sentence_length {
            Length::Concise
        } else {
            Length::Detailed
        },
        complexity: if vector.reading_grade_level > thresholds.advanced_reading_grade {
            Complexity::Advanced
        } else {
            Complexity::Moderate
        },
        formality: if vector.passive_voice_ratio > thresholds.formal_passive_ratio {
            Formality::Formal
        } else {
            Formality::Informal
        },
        processing_style: if vector.question_ratio < thresholds.sequential_question_ratio {
            ProcessingStyle::Sequential
        } else {
            ProcessingStyle::Inquisitive
        },
    }
}
