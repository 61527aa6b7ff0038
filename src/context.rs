//! Per-run context shared by the orchestrator and every detector.
//!
//! Built once from a validated [`Config`] and passed by reference; there is
//! no global state.

use crate::config::{Config, ConfigError, DetectorSettings, Limits};
use crate::confidence::ThresholdPolicy;
use crate::discovery::{DocumentWalker, WalkConfig};
use crate::error::Result;
use crate::security::{
    PathGuard, PathSecurityError, PatternGuard, SafeFileReader, sanitize_error_message,
    validate_doc_root, validate_project_root,
};
use crate::shutdown::ShutdownFlag;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RunContext {
    project_root: PathBuf,
    doc_root: PathBuf,
    backup_dir: PathBuf,
    policy: ThresholdPolicy,
    limits: Limits,
    patterns: PatternGuard,
    detectors: BTreeMap<String, DetectorSettings>,
    shutdown: ShutdownFlag,
    config_path: Option<PathBuf>,
}

impl RunContext {
    /// Validate `config` and resolve its roots against `base_dir`.
    pub fn from_config(config: &Config, base_dir: &Path, shutdown: ShutdownFlag) -> Result<Self> {
        config.validate()?;
        let policy = ThresholdPolicy::from_config(&config.confidence)?;

        let requested_root = base_dir.join(&config.project.root);
        let project_root =
            validate_project_root(&requested_root).map_err(|e| invalid_root(&requested_root, e))?;
        let doc_root = validate_doc_root(&config.project.doc_root, &project_root)
            .map_err(|e| invalid_root(&project_root.join(&config.project.doc_root), e))?;
        let backup_dir = project_root.join(&config.project.backup_dir);

        let patterns = PatternGuard::new()
            .with_max_length(config.limits.max_pattern_length)
            .with_max_patterns(config.limits.max_patterns);

        Ok(Self {
            project_root,
            doc_root,
            backup_dir,
            policy,
            limits: config.limits,
            patterns,
            detectors: config.detectors.clone(),
            shutdown,
            config_path: config.source.clone(),
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn doc_root(&self) -> &Path {
        &self.doc_root
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn patterns(&self) -> &PatternGuard {
        &self.patterns
    }

    pub fn shutdown(&self) -> &ShutdownFlag {
        &self.shutdown
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// The named detector's configuration section, or defaults.
    pub fn settings(&self, detector: &str) -> DetectorSettings {
        self.detectors.get(detector).cloned().unwrap_or_default()
    }

    pub fn path_guard(&self) -> Result<PathGuard> {
        Ok(PathGuard::new(&self.doc_root)?.with_max_path_length(self.limits.max_path_length))
    }

    /// Documents under the doc root with one of `extensions`.
    pub fn documents<S: AsRef<str>>(&self, extensions: &[S]) -> Vec<PathBuf> {
        DocumentWalker::new(WalkConfig::default().with_extensions(extensions)).walk(&self.doc_root)
    }

    /// Every non-hidden file under the doc root.
    pub fn all_files(&self) -> Vec<PathBuf> {
        DocumentWalker::new(WalkConfig::default()).walk(&self.doc_root)
    }

    /// Read a document within the configured size limit.
    pub fn read_document(&self, path: &Path) -> Result<String> {
        Ok(SafeFileReader::read_to_string(path, self.limits.max_file_size)?)
    }

    /// `path` relative to the doc root, for display.
    pub fn display_path<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.doc_root).unwrap_or(path)
    }

    /// Strip absolute locations from a message bound for a report.
    pub fn sanitize(&self, message: &str) -> String {
        sanitize_error_message(message, &self.project_root)
    }
}

fn invalid_root(path: &Path, err: PathSecurityError) -> ConfigError {
    ConfigError::InvalidRoot {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
