//! The confidence engine.
//!
//! Scoring for one strategy:
//!
//! ```text
//! additive   = base, feature signals, custom factors, cross-validation factors
//! mean       = Σ(value · weight) / Σ(weight)
//! multiplier = 1 - w + w · similarity          (w = semantic_multiplier_weight)
//! score      = clamp(clamp(mean · multiplier) · evidence_quality)
//! final      = score < min_confidence ? 0.0 : score
//! ```
//!
//! Every additive factor and the similarity enter with non-negative weight,
//! so the score never decreases when one of them grows.

use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::types::{StrategyFeatures, FEATURE_NAMES};

use super::profiles::{default_profiles, ProfileError, StrategyConfidenceProfile};
use super::{
    clamp01, ConfidenceExplanation, ConfidenceFactor, ConfidenceLevel, ConfidenceSummary,
    CrossValidationFeatures, EvidenceQuality,
};

/// Similarity below which meaning preservation is flagged.
const LOW_SIMILARITY: f64 = 0.5;

/// Lexical overlap at or above which the lexical diversity signal is weak.
const HIGH_OVERLAP: f64 = 0.85;

/// Turns features and factors into calibrated confidence scores.
pub struct ConfidenceEngine {
    profiles: BTreeMap<String, StrategyConfidenceProfile>,
    default_profile: StrategyConfidenceProfile,
}

impl ConfidenceEngine {
    /// Engine with the built-in profiles.
    pub fn new() -> Self {
        Self {
            profiles: default_profiles(),
            default_profile: StrategyConfidenceProfile::default(),
        }
    }

    /// Engine with the built-in profiles replaced by `overrides` where given.
    pub fn with_overrides(
        overrides: &BTreeMap<String, StrategyConfidenceProfile>,
    ) -> Result<Self, ProfileError> {
        let mut engine = Self::new();
        for (code, profile) in overrides {
            engine.update_profile(code, profile.clone())?;
        }
        Ok(engine)
    }

    /// Replace (or add) the profile of a code.
    pub fn update_profile(
        &mut self,
        strategy_code: &str,
        profile: StrategyConfidenceProfile,
    ) -> Result<(), ProfileError> {
        profile.validate(strategy_code)?;
        debug!(code = %strategy_code, "Confidence profile updated");
        self.profiles.insert(strategy_code.to_string(), profile);
        Ok(())
    }

    /// Profile of a code, if it has one of its own.
    pub fn profile(&self, strategy_code: &str) -> Option<&StrategyConfidenceProfile> {
        self.profiles.get(strategy_code)
    }

    /// Profile used for codes without one of their own.
    pub fn default_profile(&self) -> &StrategyConfidenceProfile {
        &self.default_profile
    }

    /// Every configured profile, keyed by code.
    pub fn profiles(&self) -> &BTreeMap<String, StrategyConfidenceProfile> {
        &self.profiles
    }

    /// The profile a code resolves to, and whether it is the default one.
    pub fn resolve_profile(&self, strategy_code: &str) -> (&StrategyConfidenceProfile, bool) {
        match self.profiles.get(strategy_code) {
            Some(profile) => (profile, false),
            None => (&self.default_profile, true),
        }
    }

    /// Score one strategy detection.
    pub fn calculate_confidence(
        &self,
        strategy_code: &str,
        features: &StrategyFeatures,
        custom_factors: &[ConfidenceFactor],
        evidence_quality: EvidenceQuality,
        cross_validation: Option<&CrossValidationFeatures>,
    ) -> ConfidenceExplanation {
        let (profile, used_default_profile) = self.resolve_profile(strategy_code);
        let mut recommendations = Vec::new();
        if used_default_profile {
            recommendations.push(format!(
                "Unknown strategy code '{}': scored with the default profile",
                strategy_code
            ));
        }

        let mut factors = vec![ConfidenceFactor::new(
            "base_confidence",
            profile.base_confidence,
            profile.base_weight,
            "prior confidence for this strategy",
        )];
        for name in FEATURE_NAMES {
            let (Some(weight), Some(signal)) = (profile.feature_weights.get(name), features.signal(name)) else {
                continue;
            };
            let raw = features.value(name).unwrap_or_default();
            factors.push(
                ConfidenceFactor::new(name, signal, *weight, format!("{} signal", name.replace('_', " ")))
                    .with_evidence([format!("{} = {:.3}", name, raw)]),
            );
        }
        factors.extend(custom_factors.iter().cloned());
        if let Some(cv) = cross_validation {
            factors.extend(cv.factors());
        }

        let total_weight: f64 = factors.iter().map(|f| f.weight).sum();
        let mean = if total_weight > 0.0 {
            factors.iter().map(|f| clamp01(f.value) * f.weight).sum::<f64>() / total_weight
        } else {
            profile.base_confidence
        };

        let similarity = clamp01(features.semantic_similarity);
        let w = profile.semantic_multiplier_weight;
        let multiplier = 1.0 - w + w * similarity;
        factors.push(ConfidenceFactor {
            name: "semantic_multiplier".to_string(),
            value: multiplier,
            weight: w,
            description: "meaning preservation scales the score".to_string(),
            evidence: vec![format!("semantic_similarity = {:.3}", similarity)],
        });

        let aggregated = clamp01(mean * multiplier);
        let score = clamp01(aggregated * evidence_quality.multiplier());

        if features.semantic_degraded {
            recommendations.push(
                "Semantic similarity unavailable; verify manually that meaning was preserved".to_string(),
            );
        } else if similarity < LOW_SIMILARITY {
            recommendations.push(format!(
                "Low semantic similarity ({:.2}); verify that meaning was preserved",
                similarity
            ));
        }
        if features.lexical_overlap >= HIGH_OVERLAP {
            recommendations.push(format!(
                "High lexical overlap ({:.2}): the lexical diversity signal is weak",
                features.lexical_overlap
            ));
        }
        if evidence_quality == EvidenceQuality::Weak {
            recommendations.push("Few supporting examples; review this detection manually".to_string());
        }

        let min_confidence = profile.quality_thresholds.min_confidence;
        let rejected = score < min_confidence;
        let final_confidence = if rejected {
            recommendations.push(format!(
                "Score {:.3} is below the minimum {:.2} for {}; detection rejected",
                score, min_confidence, strategy_code
            ));
            0.0
        } else {
            score
        };

        debug!(
            code = %strategy_code,
            score,
            final_confidence,
            rejected,
            "Confidence calculated"
        );

        ConfidenceExplanation {
            strategy_code: strategy_code.to_string(),
            final_confidence,
            confidence_level: ConfidenceLevel::from_score(final_confidence),
            factors,
            recommendations,
            rejected,
            used_default_profile,
        }
    }

    /// Summarize a set of explanations.
    pub fn get_confidence_summary(&self, explanations: &[ConfidenceExplanation]) -> ConfidenceSummary {
        if explanations.is_empty() {
            return ConfidenceSummary::default();
        }

        let mut level_distribution = BTreeMap::new();
        let mut high_confidence = Vec::new();
        let mut low_confidence = Vec::new();
        let (mut seen_high, mut seen_low) = (HashSet::new(), HashSet::new());

        for explanation in explanations {
            *level_distribution.entry(explanation.confidence_level).or_insert(0) += 1;
            let code = explanation.strategy_code.as_str();
            let (profile, _) = self.resolve_profile(code);
            let is_high = !explanation.rejected
                && explanation.final_confidence >= profile.quality_thresholds.high_confidence;
            if is_high && seen_high.insert(code) {
                high_confidence.push(code.to_string());
            }
            if explanation.confidence_level <= ConfidenceLevel::Low && seen_low.insert(code) {
                low_confidence.push(code.to_string());
            }
        }

        ConfidenceSummary {
            total: explanations.len(),
            average_confidence: explanations.iter().map(|e| e.final_confidence).sum::<f64>()
                / explanations.len() as f64,
            level_distribution,
            high_confidence,
            low_confidence,
        }
    }
}

impl Default for ConfidenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn simplified_features(similarity: f64) -> StrategyFeatures {
        StrategyFeatures {
            word_count_ratio: 0.7,
            length_ratio: 0.65,
            avg_word_length_ratio: 0.85,
            sentence_count_ratio: 1.5,
            semantic_similarity: similarity,
            lexical_overlap: 0.4,
            complexity_reduction: 0.4,
            structure_change_score: 0.5,
            ..StrategyFeatures::neutral()
        }
    }

    #[test]
    fn test_known_code_uses_own_profile() {
        let engine = ConfidenceEngine::new();
        let explanation =
            engine.calculate_confidence("SL+", &simplified_features(0.9), &[], EvidenceQuality::Normal, None);
        assert!(!explanation.used_default_profile);
        assert!(!explanation.rejected);
        assert!(explanation.final_confidence > 0.0);
        assert!(explanation.factors.iter().any(|f| f.name == "complexity_reduction"));
        assert_eq!(
            explanation.confidence_level,
            ConfidenceLevel::from_score(explanation.final_confidence)
        );
    }

    #[test]
    fn test_unknown_code_falls_back_to_default() {
        let engine = ConfidenceEngine::new();
        let explanation =
            engine.calculate_confidence("ZZ+", &simplified_features(0.9), &[], EvidenceQuality::Normal, None);
        assert!(explanation.used_default_profile);
        assert!(explanation.recommendations.iter().any(|r| r.contains("Unknown strategy code")));
        let base = explanation.factors.iter().find(|f| f.name == "base_confidence").unwrap();
        assert_eq!(base.value, 0.4);
    }

    #[test]
    fn test_engineered_low_features_are_rejected() {
        let engine = ConfidenceEngine::new();
        let features = StrategyFeatures {
            lexical_overlap: 1.0,
            complexity_reduction: -0.5,
            avg_word_length_ratio: 1.2,
            semantic_similarity: 0.0,
            ..StrategyFeatures::neutral()
        };
        let explanation = engine.calculate_confidence("SL+", &features, &[], EvidenceQuality::Weak, None);
        assert!(explanation.rejected);
        assert_eq!(explanation.final_confidence, 0.0);
        assert_eq!(explanation.confidence_level, ConfidenceLevel::VeryLow);
        assert!(explanation.recommendations.iter().any(|r| r.contains("rejected")));
    }

    #[test]
    fn test_evidence_quality_scales_score() {
        let engine = ConfidenceEngine::new();
        let features = simplified_features(0.8);
        let weak = engine.calculate_confidence("RP+", &features, &[], EvidenceQuality::Weak, None);
        let normal = engine.calculate_confidence("RP+", &features, &[], EvidenceQuality::Normal, None);
        let strong = engine.calculate_confidence("RP+", &features, &[], EvidenceQuality::Strong, None);
        assert!(weak.final_confidence < normal.final_confidence);
        assert!(normal.final_confidence <= strong.final_confidence);
    }

    #[test]
    fn test_recommendations_for_overlap_and_degraded_similarity() {
        let engine = ConfidenceEngine::new();
        let features = StrategyFeatures {
            lexical_overlap: 0.9,
            semantic_degraded: true,
            ..simplified_features(0.0)
        };
        let explanation = engine.calculate_confidence("SL+", &features, &[], EvidenceQuality::Normal, None);
        assert!(explanation.recommendations.iter().any(|r| r.contains("High lexical overlap")));
        assert!(explanation.recommendations.iter().any(|r| r.contains("unavailable")));
    }

    #[test]
    fn test_custom_and_cross_validation_factors_are_recorded() {
        let engine = ConfidenceEngine::new();
        let custom = [ConfidenceFactor::new("evidence_strength", 0.9, 1.5, "stage confidence")];
        let cv = CrossValidationFeatures {
            salience_agreement: Some(0.7),
            method_overlap: Some(1.0),
            ..Default::default()
        };
        let explanation =
            engine.calculate_confidence("RF+", &simplified_features(0.5), &custom, EvidenceQuality::Normal, Some(&cv));
        let names: Vec<&str> = explanation.factors.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"evidence_strength"));
        assert!(names.contains(&"salience_agreement"));
        assert!(names.contains(&"method_overlap"));
        assert!(!names.contains(&"quality_improvement"));
    }

    #[test]
    fn test_update_profile_validates() {
        let mut engine = ConfidenceEngine::new();
        let mut profile = StrategyConfidenceProfile::default();
        profile.base_confidence = 0.9;
        engine.update_profile("SL+", profile).unwrap();
        assert_eq!(engine.profile("SL+").unwrap().base_confidence, 0.9);

        let mut broken = StrategyConfidenceProfile::default();
        broken.semantic_multiplier_weight = 2.0;
        assert!(engine.update_profile("SL+", broken).is_err());
        assert_eq!(engine.profile("SL+").unwrap().base_confidence, 0.9);
    }

    #[test]
    fn test_summary() {
        let engine = ConfidenceEngine::new();
        let features = simplified_features(0.9);
        let explanations = vec![
            engine.calculate_confidence("RP+", &features, &[], EvidenceQuality::Strong, None),
            engine.calculate_confidence("RP+", &features, &[], EvidenceQuality::Strong, None),
            engine.calculate_confidence("ZZ+", &StrategyFeatures::neutral(), &[], EvidenceQuality::Weak, None),
        ];
        let summary = engine.get_confidence_summary(&explanations);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.level_distribution.values().sum::<usize>(), 3);
        let expected = explanations.iter().map(|e| e.final_confidence).sum::<f64>() / 3.0;
        assert!((summary.average_confidence - expected).abs() < 1e-12);
        assert!(engine.get_confidence_summary(&[]).total == 0);
    }

    fn explanation(code: &str, score: f64) -> ConfidenceExplanation {
        ConfidenceExplanation {
            strategy_code: code.to_string(),
            final_confidence: score,
            confidence_level: ConfidenceLevel::from_score(score),
            factors: Vec::new(),
            recommendations: Vec::new(),
            rejected: false,
            used_default_profile: false,
        }
    }

    #[test]
    fn test_summary_uses_profile_high_threshold() {
        let explanations = vec![explanation("SL+", 0.7), explanation("RP+", 0.85)];

        let engine = ConfidenceEngine::new();
        let summary = engine.get_confidence_summary(&explanations);
        assert_eq!(summary.high_confidence, vec!["RP+".to_string()]);

        let mut lowered = engine.profile("SL+").unwrap().clone();
        lowered.quality_thresholds.high_confidence = 0.65;
        let mut engine = ConfidenceEngine::new();
        engine.update_profile("SL+", lowered).unwrap();
        let summary = engine.get_confidence_summary(&explanations);
        assert_eq!(summary.high_confidence, vec!["SL+".to_string(), "RP+".to_string()]);
    }

    proptest! {
        #[test]
        fn prop_monotonic_in_similarity(
            a in 0.0f64..=1.0,
            b in 0.0f64..=1.0,
            code_idx in 0usize..7,
        ) {
            let engine = ConfidenceEngine::new();
            let code = crate::types::StrategyCode::ALL[code_idx].as_str();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let low = engine.calculate_confidence(code, &simplified_features(lo), &[], EvidenceQuality::Normal, None);
            let high = engine.calculate_confidence(code, &simplified_features(hi), &[], EvidenceQuality::Normal, None);
            prop_assert!(high.final_confidence >= low.final_confidence);
        }

        #[test]
        fn prop_confidence_stays_in_unit_interval(
            similarity in 0.0f64..=1.0,
            overlap in 0.0f64..=1.0,
            ratio in 0.0f64..3.0,
            strength in 0.0f64..=1.0,
        ) {
            let engine = ConfidenceEngine::new();
            let features = StrategyFeatures {
                semantic_similarity: similarity,
                lexical_overlap: overlap,
                word_count_ratio: ratio,
                sentence_count_ratio: ratio,
                ..StrategyFeatures::neutral()
            };
            let custom = [ConfidenceFactor::new("evidence_strength", strength, 1.5, "")];
            for code in crate::types::StrategyCode::ALL {
                let e = engine.calculate_confidence(code.as_str(), &features, &custom, EvidenceQuality::Strong, None);
                prop_assert!((0.0..=1.0).contains(&e.final_confidence));
                prop_assert!(!e.rejected || e.final_confidence == 0.0);
            }
        }
    }
}
