//! Proposed edits.

use crate::confidence::{ChangeType, unit_interval};
use crate::error::{GuardianError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Replace one occurrence of `old_content`.
    #[default]
    Replace,
    /// Replace the whole file. A non-empty `old_content` must equal the
    /// current file content.
    FullFile,
}

/// An immutable proposed edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    file: PathBuf,
    /// 1-based line where `old_content` starts; 0 when not line-specific.
    line: usize,
    old_content: String,
    new_content: String,
    confidence: f64,
    reason: String,
    detector: String,
    change_type: ChangeType,
    kind: ChangeKind,
}

impl Change {
    pub fn builder(detector: impl Into<String>, file: impl Into<PathBuf>) -> ChangeBuilder {
        ChangeBuilder {
            detector: detector.into(),
            file: file.into(),
            line: 0,
            old_content: String::new(),
            new_content: String::new(),
            confidence: None,
            reason: String::new(),
            change_type: ChangeType::default(),
            kind: ChangeKind::Replace,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn old_content(&self) -> &str {
        &self.old_content
    }

    pub fn new_content(&self) -> &str {
        &self.new_content
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn detector(&self) -> &str {
        &self.detector
    }

    pub fn change_type(&self) -> ChangeType {
        self.change_type
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }
}

#[derive(Debug, Clone)]
pub struct ChangeBuilder {
    detector: String,
    file: PathBuf,
    line: usize,
    old_content: String,
    new_content: String,
    confidence: Option<f64>,
    reason: String,
    change_type: ChangeType,
    kind: ChangeKind,
}

impl ChangeBuilder {
    pub fn line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    pub fn replace(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.old_content = old.into();
        self.new_content = new.into();
        self.kind = ChangeKind::Replace;
        self
    }

    /// Replace the entire file. Pass the content the change was computed
    /// from as `expected`, or an empty string to overwrite unconditionally.
    pub fn full_file(mut self, expected: impl Into<String>, new: impl Into<String>) -> Self {
        self.old_content = expected.into();
        self.new_content = new.into();
        self.kind = ChangeKind::FullFile;
        self.line = 0;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn change_type(mut self, change_type: ChangeType) -> Self {
        self.change_type = change_type;
        self
    }

    pub fn build(self) -> Result<Change> {
        let confidence = self
            .confidence
            .ok_or_else(|| GuardianError::InvalidChange("confidence not set".to_string()))?;
        let confidence = unit_interval("confidence", confidence)?;

        if self.kind == ChangeKind::Replace && self.old_content.is_empty() {
            return Err(GuardianError::InvalidChange(format!(
                "{}: empty old content for a partial replacement",
                self.file.display()
            )));
        }

        Ok(Change {
            file: self.file,
            line: self.line,
            old_content: self.old_content,
            new_content: self.new_content,
            confidence,
            reason: self.reason,
            detector: self.detector,
            change_type: self.change_type,
            kind: self.kind,
        })
    }
}
