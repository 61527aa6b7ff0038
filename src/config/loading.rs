//! Configuration loading and validation.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::ConfigError;
use super::types::Config;
use crate::confidence::ThresholdPolicy;

/// File names probed by [`Config::load`], in order.
pub const CONFIG_FILE_NAMES: &[&str] = &[
    ".doc-guardian.yaml",
    ".doc-guardian.yml",
    ".doc-guardian.json",
    ".doc-guardian.toml",
];

impl Config {
    /// Load configuration from a file, choosing the parser by extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let mut config: Config = match ext.as_str() {
            "yaml" | "yml" => {
                serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseYaml {
                    path: path.display().to_string(),
                    source: e,
                })?
            }
            "json" => serde_json::from_str(&content).map_err(|e| ConfigError::ParseJson {
                path: path.display().to_string(),
                source: e,
            })?,
            "toml" => toml::from_str(&content).map_err(|e| ConfigError::ParseToml {
                path: path.display().to_string(),
                source: e,
            })?,
            _ => {
                return Err(ConfigError::UnsupportedFormat(
                    path.display().to_string(),
                    ext,
                ));
            }
        };

        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Load the first `.doc-guardian.*` file found in `project_root`, or
    /// defaults when there is none.
    ///
    /// A file that exists but fails to parse is an error: a broken
    /// configuration never silently falls back to defaults.
    pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
        for name in CONFIG_FILE_NAMES {
            let path = project_root.join(name);
            if path.is_file() {
                debug!(path = %path.display(), "loading configuration");
                return Self::from_file(&path);
            }
        }
        debug!(root = %project_root.display(), "no configuration file, using defaults");
        Ok(Self::default())
    }

    /// Directory that relative `project.root` is resolved against.
    pub fn base_dir(&self, fallback: &Path) -> PathBuf {
        self.source
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| fallback.to_path_buf())
    }

    /// Validate everything that can be checked without touching the
    /// filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ThresholdPolicy::from_config(&self.confidence)?;
        self.limits.validate()?;
        if self.execution.max_workers == Some(0) {
            return Err(ConfigError::InvalidLimit {
                name: "max_workers",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
