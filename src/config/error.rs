//! Configuration error types.

/// Configuration loading and validation error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config {path}: {source}")]
    ParseYaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to parse JSON config {path}: {source}")]
    ParseJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse TOML config {path}: {source}")]
    ParseToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Unsupported config format for {0}: .{1}")]
    UnsupportedFormat(String, String),

    #[error("Confidence weights must be non-negative and sum to 1.0 (got {sum:.3})")]
    InvalidWeights { sum: f64 },

    #[error("Invalid confidence thresholds: {0}")]
    InvalidThresholds(String),

    #[error("Invalid limit {name}: {message}")]
    InvalidLimit { name: &'static str, message: String },

    #[error("Unknown detector: {0}")]
    UnknownDetector(String),

    #[error("Detector {detector} depends on unknown detector {dependency}")]
    UnknownDependency {
        detector: String,
        dependency: String,
    },

    #[error("Cyclic detector dependencies among: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),

    #[error("Invalid settings for detector {detector}: {message}")]
    InvalidDetectorSettings { detector: String, message: String },

    #[error("Invalid project root {path}: {message}")]
    InvalidRoot { path: String, message: String },
}
