//! Confidence calibration for raw strategy evidence.
//!
//! Every strategy code has a [`StrategyConfidenceProfile`] describing which
//! features support it and how much. The [`ConfidenceEngine`] combines the
//! profile, the feature vector and any caller-supplied factors into a final
//! score with a full explanation.

mod engine;
mod profiles;

pub use engine::ConfidenceEngine;
pub use profiles::{
    default_profiles, EvidenceRequirements, ProfileError, QualityThresholds,
    StrategyConfidenceProfile,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ordinal confidence bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 0.2 {
            Self::VeryLow
        } else if score < 0.4 {
            Self::Low
        } else if score < 0.6 {
            Self::Medium
        } else if score < 0.8 {
            Self::High
        } else {
            Self::VeryHigh
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryLow => "very low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very high",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named contribution to a confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceFactor {
    pub name: String,
    pub value: f64,
    pub weight: f64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
}

impl ConfidenceFactor {
    /// A factor with `value` clamped to `[0, 1]` and a non-negative weight.
    pub fn new(name: impl Into<String>, value: f64, weight: f64, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: clamp01(value),
            weight: if weight.is_finite() { weight.max(0.0) } else { 0.0 },
            description: description.into(),
            evidence: Vec::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.evidence.extend(evidence.into_iter().map(Into::into));
        self
    }
}

/// How well the examples back a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceQuality {
    Weak,
    #[default]
    Normal,
    Strong,
}

impl EvidenceQuality {
    /// Multiplier applied to the aggregated score.
    pub fn multiplier(&self) -> f64 {
        match self {
            EvidenceQuality::Weak => 0.85,
            EvidenceQuality::Normal => 1.0,
            EvidenceQuality::Strong => 1.1,
        }
    }

    /// Grade an example count against a profile's requirements.
    pub fn assess(example_count: usize, requirements: &EvidenceRequirements) -> Self {
        if example_count < requirements.min_examples {
            EvidenceQuality::Weak
        } else if example_count >= requirements.strong_examples {
            EvidenceQuality::Strong
        } else {
            EvidenceQuality::Normal
        }
    }
}

/// Signals from independent methods that agree (or not) with a detection.
///
/// Every present value is a `[0, 1]` agreement score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationFeatures {
    /// Agreement of salient-term retention with the strategy
    pub salience_agreement: Option<f64>,
    /// Measured readability gain of the target
    pub quality_improvement: Option<f64>,
    /// Share of detection methods that reported the same strategy
    pub method_overlap: Option<f64>,
}

impl CrossValidationFeatures {
    pub(crate) fn factors(&self) -> Vec<ConfidenceFactor> {
        let entries = [
            ("salience_agreement", self.salience_agreement, "salient-term retention agrees with the strategy"),
            ("quality_improvement", self.quality_improvement, "target readability improved"),
            ("method_overlap", self.method_overlap, "independent methods agree"),
        ];
        entries
            .into_iter()
            .filter_map(|(name, value, description)| {
                value.map(|v| ConfidenceFactor::new(name, v, 0.5, description))
            })
            .collect()
    }
}

/// Why a detection received its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceExplanation {
    pub strategy_code: String,
    pub final_confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub factors: Vec<ConfidenceFactor>,
    pub recommendations: Vec<String>,
    /// Score fell below the profile minimum; `final_confidence` is 0.0
    pub rejected: bool,
    /// The code had no profile of its own
    pub used_default_profile: bool,
}

/// Aggregate view over a set of explanations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    pub total: usize,
    pub average_confidence: f64,
    pub level_distribution: BTreeMap<ConfidenceLevel, usize>,
    /// Codes with at least one score at or above their profile's `high_confidence`
    pub high_confidence: Vec<String>,
    /// Codes with at least one Low or VeryLow explanation
    pub low_confidence: Vec<String>,
}

pub(crate) fn clamp01(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
