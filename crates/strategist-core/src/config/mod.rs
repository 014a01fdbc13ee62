//! Detector configuration.
//!
//! Configuration files are YAML or JSON, validated against
//! `schema/strategist-config.schema.json` before they are deserialized.

mod parser;

pub use parser::{
    CascadeSettings, ConfigError, DetectorConfig, SalienceSettings, SchemaViolation, TagConfig,
    UserConfiguration, DEFAULT_EXPECTED_REDUCTION_RATIO, DEFAULT_PERFORMANCE_MAX_SENTENCES,
};
