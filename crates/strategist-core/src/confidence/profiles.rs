//! Per-strategy confidence profiles and their defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::types::{StrategyCode, FEATURE_NAMES};

/// A profile that cannot be used for scoring.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProfileError {
    #[error("Invalid profile for {code}: {reason}")]
    InvalidProfile { code: String, reason: String },
}

/// Score bounds for a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Scores below this are rejected (final confidence 0.0)
    pub min_confidence: f64,
    /// Scores at or above this count as high confidence
    pub high_confidence: f64,
}

/// Example counts that make evidence weak or strong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRequirements {
    pub min_examples: usize,
    pub strong_examples: usize,
}

/// How a strategy's confidence is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfidenceProfile {
    pub base_confidence: f64,
    /// Weight of the base confidence in the weighted mean
    pub base_weight: f64,
    /// Feature name → weight of its transformation signal
    pub feature_weights: BTreeMap<String, f64>,
    /// How strongly semantic similarity scales the score, in `[0, 1]`
    pub semantic_multiplier_weight: f64,
    pub quality_thresholds: QualityThresholds,
    pub evidence_requirements: EvidenceRequirements,
}

impl Default for StrategyConfidenceProfile {
    /// The profile used for codes without one of their own.
    fn default() -> Self {
        Self {
            base_confidence: 0.4,
            base_weight: 1.0,
            feature_weights: BTreeMap::new(),
            semantic_multiplier_weight: 0.2,
            quality_thresholds: QualityThresholds {
                min_confidence: 0.2,
                high_confidence: 0.75,
            },
            evidence_requirements: EvidenceRequirements {
                min_examples: 1,
                strong_examples: 3,
            },
        }
    }
}

impl StrategyConfidenceProfile {
    fn build(
        base_confidence: f64,
        weights: &[(&str, f64)],
        semantic_multiplier_weight: f64,
        min_confidence: f64,
        strong_examples: usize,
    ) -> Self {
        Self {
            base_confidence,
            base_weight: 1.0,
            feature_weights: weights.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            semantic_multiplier_weight,
            quality_thresholds: QualityThresholds {
                min_confidence,
                high_confidence: 0.75,
            },
            evidence_requirements: EvidenceRequirements {
                min_examples: 1,
                strong_examples,
            },
        }
    }

    /// Check ranges and feature names.
    pub fn validate(&self, code: &str) -> Result<(), ProfileError> {
        let invalid = |reason: String| ProfileError::InvalidProfile {
            code: code.to_string(),
            reason,
        };
        let unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);

        if !unit(self.base_confidence) {
            return Err(invalid(format!("base_confidence {} not in [0, 1]", self.base_confidence)));
        }
        if !self.base_weight.is_finite() || self.base_weight < 0.0 {
            return Err(invalid(format!("base_weight {} must be >= 0", self.base_weight)));
        }
        if !unit(self.semantic_multiplier_weight) {
            return Err(invalid(format!(
                "semantic_multiplier_weight {} not in [0, 1]",
                self.semantic_multiplier_weight
            )));
        }
        for (name, weight) in &self.feature_weights {
            if !FEATURE_NAMES.contains(&name.as_str()) {
                return Err(invalid(format!("unknown feature '{}'", name)));
            }
            if !weight.is_finite() || *weight < 0.0 {
                return Err(invalid(format!("weight of '{}' must be >= 0", name)));
            }
        }
        let q = &self.quality_thresholds;
        if !unit(q.min_confidence) || !unit(q.high_confidence) || q.min_confidence > q.high_confidence {
            return Err(invalid(format!(
                "quality thresholds must satisfy 0 <= min ({}) <= high ({}) <= 1",
                q.min_confidence, q.high_confidence
            )));
        }
        let e = &self.evidence_requirements;
        if e.min_examples > e.strong_examples {
            return Err(invalid(format!(
                "min_examples ({}) exceeds strong_examples ({})",
                e.min_examples, e.strong_examples
            )));
        }
        Ok(())
    }
}

/// Built-in profile for every known strategy code, keyed by tag.
pub fn default_profiles() -> BTreeMap<String, StrategyConfidenceProfile> {
    use StrategyCode::*;

    let profile = |code: StrategyCode| match code {
        LexicalSimplification => StrategyConfidenceProfile::build(
            0.55,
            &[
                ("complexity_reduction", 0.8),
                ("lexical_overlap", 0.4),
                ("avg_word_length_ratio", 0.3),
                ("semantic_similarity", 0.3),
            ],
            0.25,
            0.35,
            3,
        ),
        Fragmentation => StrategyConfidenceProfile::build(
            0.55,
            &[
                ("sentence_count_ratio", 0.8),
                ("structure_change_score", 0.5),
                ("semantic_similarity", 0.3),
            ],
            0.2,
            0.3,
            2,
        ),
        GlobalRewriting => StrategyConfidenceProfile::build(
            0.5,
            &[
                ("word_count_ratio", 0.6),
                ("lexical_overlap", 0.6),
                ("structure_change_score", 0.5),
            ],
            0.1,
            0.35,
            3,
        ),
        Modulation => StrategyConfidenceProfile::build(
            0.5,
            &[
                ("voice_change_score", 0.7),
                ("pronoun_reduction_score", 0.5),
                ("semantic_similarity", 0.6),
                ("lexical_overlap", 0.3),
            ],
            0.3,
            0.3,
            2,
        ),
        Omission => StrategyConfidenceProfile::build(
            0.5,
            &[("length_ratio", 0.5), ("word_count_ratio", 0.5)],
            0.0,
            0.3,
            2,
        ),
        SemanticDeviation => StrategyConfidenceProfile::build(
            0.3,
            &[("semantic_similarity", 0.5)],
            0.5,
            0.5,
            3,
        ),
        Explicitation => StrategyConfidenceProfile::build(
            0.5,
            &[
                ("explicitness_score", 0.3),
                ("structure_change_score", 0.1),
                ("semantic_similarity", 0.2),
            ],
            0.3,
            0.3,
            2,
        ),
    };

    StrategyCode::ALL
        .iter()
        .map(|&code| (code.as_str().to_string(), profile(code)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_code_has_a_valid_profile() {
        let profiles = default_profiles();
        for code in StrategyCode::ALL {
            let profile = profiles.get(code.as_str()).expect("profile");
            assert!(profile.validate(code.as_str()).is_ok(), "{}", code);
        }
        assert!(StrategyConfidenceProfile::default().validate("default").is_ok());
    }

    #[test]
    fn test_default_profile_base() {
        assert_eq!(StrategyConfidenceProfile::default().base_confidence, 0.4);
    }

    #[test]
    fn test_validate_rejects_unknown_feature() {
        let mut profile = StrategyConfidenceProfile::default();
        profile.feature_weights.insert("sparkle".to_string(), 1.0);
        assert!(matches!(
            profile.validate("SL+"),
            Err(ProfileError::InvalidProfile { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut profile = StrategyConfidenceProfile::default();
        profile.quality_thresholds.min_confidence = 0.9;
        profile.quality_thresholds.high_confidence = 0.5;
        assert!(profile.validate("SL+").is_err());
    }

    #[test]
    fn test_partial_profile_fills_defaults() {
        let profile: StrategyConfidenceProfile =
            serde_yaml::from_str("base_confidence: 0.6\nfeature_weights:\n  lexical_overlap: 0.5\n").unwrap();
        assert_eq!(profile.base_confidence, 0.6);
        assert_eq!(profile.quality_thresholds.min_confidence, 0.2);
        assert_eq!(profile.feature_weights.len(), 1);
    }
}
