//! Configuration type definitions.

use crate::confidence::Weights;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::error::ConfigError;

/// Main configuration structure for doc-guardian.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project and documentation roots.
    pub project: ProjectConfig,
    /// Confidence scoring weights and action thresholds.
    pub confidence: ConfidenceConfig,
    /// Resource limits applied to files and patterns.
    pub limits: Limits,
    /// Detector ordering and worker pool settings.
    pub execution: ExecutionConfig,
    /// Version control integration.
    pub git: GitConfig,
    /// Per-detector sections, keyed by detector name.
    pub detectors: BTreeMap<String, DetectorSettings>,
    /// File this configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Config {
    /// Settings for the named detector, or defaults when the section is absent.
    pub fn detector(&self, name: &str) -> DetectorSettings {
        self.detectors.get(name).cloned().unwrap_or_default()
    }

    /// A detector runs unless its section sets `enabled: false`.
    pub fn is_detector_enabled(&self, name: &str) -> bool {
        self.detectors.get(name).is_none_or(|d| d.enabled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project root, relative to the configuration file's directory.
    pub root: PathBuf,
    /// Documentation root, relative to the project root.
    pub doc_root: PathBuf,
    /// Backup directory, relative to the project root.
    pub backup_dir: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            doc_root: PathBuf::from("docs"),
            backup_dir: PathBuf::from(".doc-guardian/backups"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub report_only_threshold: f64,
    pub auto_stage_threshold: f64,
    pub auto_commit_threshold: f64,
    pub weights: Weights,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            report_only_threshold: 0.5,
            auto_stage_threshold: 0.8,
            auto_commit_threshold: 0.9,
            weights: Weights::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Largest document the applier will read or rewrite, in bytes.
    pub max_file_size: u64,
    /// Largest pattern collection a detector may compile.
    pub max_patterns: usize,
    pub max_pattern_length: usize,
    pub max_path_length: usize,
    /// Links examined per file before a detector stops looking.
    pub max_links_per_file: usize,
    /// Lines longer than this are skipped by line-oriented detectors.
    pub max_line_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            max_patterns: 1000,
            max_pattern_length: 10_000,
            max_path_length: 4096,
            max_links_per_file: 5000,
            max_line_length: 100_000,
        }
    }
}

impl Limits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, u64); 6] = [
            ("max_file_size", self.max_file_size),
            ("max_patterns", self.max_patterns as u64),
            ("max_pattern_length", self.max_pattern_length as u64),
            ("max_path_length", self.max_path_length as u64),
            ("max_links_per_file", self.max_links_per_file as u64),
            ("max_line_length", self.max_line_length as u64),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(ConfigError::InvalidLimit {
                    name,
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Worker threads for concurrent scans. Defaults to min(cpus, 4).
    pub max_workers: Option<usize>,
    /// Keep running later stages after a detector reports errors.
    pub continue_on_error: bool,
    /// Detector order. Empty means registration order.
    pub order: Vec<String>,
    /// Explicit dependency edges. Empty means each detector depends on
    /// the one before it in `order`.
    pub dependencies: BTreeMap<String, Vec<String>>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            continue_on_error: true,
            order: Vec::new(),
            dependencies: BTreeMap::new(),
        }
    }
}

impl ExecutionConfig {
    pub fn effective_workers(&self) -> usize {
        self.max_workers.unwrap_or_else(default_workers)
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(4)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Use git for tracked-file rollback.
    pub enabled: bool,
    /// Stage files whose changes reach the auto-stage tier.
    pub auto_stage: bool,
    /// Commit when every applied change reaches the auto-commit tier.
    pub auto_commit: bool,
    pub commit_prefix: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_stage: false,
            auto_commit: false,
            commit_prefix: "docs(guardian):".to_string(),
        }
    }
}

/// A detector's configuration section.
///
/// Only `enabled` is interpreted by the core; every other key is passed
/// through to the detector untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            options: serde_json::Map::new(),
        }
    }
}

impl DetectorSettings {
    /// Deserialize the detector-specific options into `T`.
    pub fn section<T: DeserializeOwned>(&self, detector: &str) -> Result<T, ConfigError> {
        serde_json::from_value(serde_json::Value::Object(self.options.clone())).map_err(|e| {
            ConfigError::InvalidDetectorSettings {
                detector: detector.to_string(),
                message: e.to_string(),
            }
        })
    }
}

fn default_true() -> bool {
    true
}
