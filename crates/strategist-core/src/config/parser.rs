//! Configuration parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::warn;

use crate::confidence::{ProfileError, StrategyConfidenceProfile};
use crate::salience::DEFAULT_SALIENCE_CACHE_CAPACITY;
use crate::spans::SpanExtractorConfig;
use crate::stages::{
    AdaptiveThresholds, DEFAULT_COMPLETE_MICRO_SENTENCE_LIMIT, DEFAULT_EARLY_EXIT_CONFIDENCE,
};
use crate::types::{AnalysisMode, StrategyCode};

const CONFIG_SCHEMA_JSON: &str = include_str!("../../../../schema/strategist-config.schema.json");

/// Target/source word ratio a simplification is expected to stay under.
pub const DEFAULT_EXPECTED_REDUCTION_RATIO: f64 = 0.65;

/// Sentences per text analyzed in performance mode.
pub const DEFAULT_PERFORMANCE_MAX_SENTENCES: usize = 20;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration does not match schema: {}", join_violations(.0))]
    SchemaError(Vec<SchemaViolation>),

    #[error("Embedded configuration schema is unusable: {0}")]
    InvalidSchema(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// A place where a document breaks the configuration schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// JSON pointer to the offending value (`""` is the document root)
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}

fn join_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Every schema violation in `value`, in document order.
fn check_schema(value: &serde_json::Value) -> Result<Vec<SchemaViolation>, ConfigError> {
    static VALIDATOR: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

    let validator = VALIDATOR
        .get_or_init(|| {
            let schema: serde_json::Value =
                serde_json::from_str(CONFIG_SCHEMA_JSON).map_err(|e| e.to_string())?;
            jsonschema::validator_for(&schema).map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|reason| ConfigError::InvalidSchema(reason.clone()))?;

    Ok(validator
        .iter_errors(value)
        .map(|e| SchemaViolation {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect())
}

/// Detection policy for one strategy code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagConfig {
    /// The tag may be emitted at all
    pub active: bool,
    /// The tag is reserved for human annotators
    pub manual_only: bool,
}

impl TagConfig {
    /// Built-in policy: PRO+ is manual only, OM+ is off, everything else is on.
    pub fn default_for(code: StrategyCode) -> Self {
        match code {
            StrategyCode::SemanticDeviation => Self {
                active: true,
                manual_only: true,
            },
            StrategyCode::Omission => Self {
                active: false,
                manual_only: false,
            },
            _ => Self {
                active: true,
                manual_only: false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct PartialTag {
    active: Option<bool>,
    manual_only: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawUserConfiguration {
    #[serde(default)]
    expected_reduction_ratio: Option<f64>,
    #[serde(default)]
    tags: BTreeMap<StrategyCode, PartialTag>,
}

/// Per-tag detection policy and reporting expectations.
///
/// PRO+ is always manual only, whatever the input says.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawUserConfiguration")]
pub struct UserConfiguration {
    pub expected_reduction_ratio: f64,
    tags: BTreeMap<StrategyCode, TagConfig>,
}

impl From<RawUserConfiguration> for UserConfiguration {
    fn from(raw: RawUserConfiguration) -> Self {
        let mut config = Self::default();
        if let Some(ratio) = raw.expected_reduction_ratio {
            config.expected_reduction_ratio = ratio;
        }
        for (code, partial) in raw.tags {
            let current = config.tag(code);
            config.set_tag(
                code,
                TagConfig {
                    active: partial.active.unwrap_or(current.active),
                    manual_only: partial.manual_only.unwrap_or(current.manual_only),
                },
            );
        }
        config
    }
}

impl Default for UserConfiguration {
    fn default() -> Self {
        Self {
            expected_reduction_ratio: DEFAULT_EXPECTED_REDUCTION_RATIO,
            tags: StrategyCode::ALL
                .iter()
                .map(|&code| (code, TagConfig::default_for(code)))
                .collect(),
        }
    }
}

impl UserConfiguration {
    /// Policy of a code.
    pub fn tag(&self, code: StrategyCode) -> TagConfig {
        self.tags
            .get(&code)
            .copied()
            .unwrap_or_else(|| TagConfig::default_for(code))
    }

    /// Replace the policy of a code. PRO+ stays manual only.
    pub fn set_tag(&mut self, code: StrategyCode, mut tag: TagConfig) {
        if code == StrategyCode::SemanticDeviation && !tag.manual_only {
            warn!(code = %code, "Ignoring attempt to make a manual-only tag automatic");
            tag.manual_only = true;
        }
        self.tags.insert(code, tag);
    }

    /// Turn automatic detection of a code on or off.
    pub fn set_active(&mut self, code: StrategyCode, active: bool) {
        let tag = TagConfig {
            active,
            ..self.tag(code)
        };
        self.set_tag(code, tag);
    }

    /// The cascade may emit this code.
    pub fn is_auto_enabled(&self, code: StrategyCode) -> bool {
        let tag = self.tag(code);
        tag.active && !tag.manual_only
    }

    /// Every code with its policy, in canonical order.
    pub fn tags(&self) -> impl Iterator<Item = (StrategyCode, TagConfig)> + '_ {
        StrategyCode::ALL.iter().map(move |&code| (code, self.tag(code)))
    }
}

/// How the cascade runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeSettings {
    pub mode: AnalysisMode,
    pub performance_max_sentences: usize,
    pub complete_micro_sentence_limit: usize,
    pub early_exit_confidence: f64,
    pub thresholds: AdaptiveThresholds,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::Performance,
            performance_max_sentences: DEFAULT_PERFORMANCE_MAX_SENTENCES,
            complete_micro_sentence_limit: DEFAULT_COMPLETE_MICRO_SENTENCE_LIMIT,
            early_exit_confidence: DEFAULT_EARLY_EXIT_CONFIDENCE,
            thresholds: AdaptiveThresholds::default(),
        }
    }
}

/// Salient-term ranking used for examples and cross-validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalienceSettings {
    pub method: String,
    pub max_units: usize,
    pub cache_capacity: usize,
}

impl Default for SalienceSettings {
    fn default() -> Self {
        Self {
            method: "frequency".to_string(),
            max_units: 10,
            cache_capacity: DEFAULT_SALIENCE_CACHE_CAPACITY,
        }
    }
}

/// Everything a detector can be configured with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub policy: UserConfiguration,
    pub cascade: CascadeSettings,
    /// Confidence profile overrides, keyed by strategy code
    pub profiles: BTreeMap<String, StrategyConfidenceProfile>,
    pub spans: SpanExtractorConfig,
    pub salience: SalienceSettings,
}

impl DetectorConfig {
    /// Parse a configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Self::from_value(serde_json::Value::Null);
        }
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a configuration from JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a configuration file, choosing the format from its extension
    /// (`.json` is JSON, anything else YAML).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_file(path)
        } else {
            Self::from_yaml_file(path)
        }
    }

    fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        // An empty document means "all defaults".
        let value = if value.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            value
        };
        let violations = check_schema(&value)?;
        if !violations.is_empty() {
            return Err(ConfigError::SchemaError(violations));
        }
        let config: DetectorConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Check constraints the schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratio = self.policy.expected_reduction_ratio;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "policy.expected_reduction_ratio must be > 0, got {}",
                ratio
            )));
        }
        if self.cascade.performance_max_sentences == 0 {
            return Err(ConfigError::InvalidValue(
                "cascade.performance_max_sentences must be at least 1".to_string(),
            ));
        }
        self.cascade
            .thresholds
            .validate()
            .map_err(|reason| ConfigError::InvalidValue(format!("cascade.thresholds: {}", reason)))?;
        for (code, profile) in &self.profiles {
            profile.validate(code)?;
        }
        Ok(())
    }
}
