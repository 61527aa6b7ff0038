//! Confidence scoring for proposed changes.
//!
//! A change's confidence is a weighted sum of four factors, each in
//! [0.0, 1.0]. The resulting score is mapped onto an [`ActionTier`] by a
//! [`ThresholdPolicy`] that is validated once, at startup.

use crate::config::{ConfidenceConfig, ConfigError};
use crate::error::{GuardianError, Result};
use serde::{Deserialize, Serialize};

const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Relative importance of each confidence factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub pattern: f64,
    pub magnitude: f64,
    pub risk: f64,
    pub history: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            pattern: 0.40,
            magnitude: 0.30,
            risk: 0.20,
            history: 0.10,
        }
    }
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.pattern + self.magnitude + self.risk + self.history
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let all = [self.pattern, self.magnitude, self.risk, self.history];
        let sum = self.sum();
        if all.iter().any(|w| !w.is_finite() || *w < 0.0)
            || (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE
        {
            return Err(ConfigError::InvalidWeights { sum });
        }
        Ok(())
    }
}

/// The four inputs to a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceFactors {
    pattern_match: f64,
    change_magnitude: f64,
    risk_assessment: f64,
    historical_accuracy: f64,
}

impl ConfidenceFactors {
    pub fn new(
        pattern_match: f64,
        change_magnitude: f64,
        risk_assessment: f64,
        historical_accuracy: f64,
    ) -> Result<Self> {
        Ok(Self {
            pattern_match: unit_interval("pattern_match", pattern_match)?,
            change_magnitude: unit_interval("change_magnitude", change_magnitude)?,
            risk_assessment: unit_interval("risk_assessment", risk_assessment)?,
            historical_accuracy: unit_interval("historical_accuracy", historical_accuracy)?,
        })
    }

    pub fn pattern_match(&self) -> f64 {
        self.pattern_match
    }

    pub fn change_magnitude(&self) -> f64 {
        self.change_magnitude
    }

    pub fn risk_assessment(&self) -> f64 {
        self.risk_assessment
    }

    pub fn historical_accuracy(&self) -> f64 {
        self.historical_accuracy
    }
}

pub(crate) fn unit_interval(field: &'static str, value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(GuardianError::OutOfRange { field, value })
    }
}

/// Weighted confidence score, clamped to [0.0, 1.0].
pub fn score(factors: &ConfidenceFactors, weights: &Weights) -> f64 {
    let raw = factors.pattern_match * weights.pattern
        + factors.change_magnitude * weights.magnitude
        + factors.risk_assessment * weights.risk
        + factors.historical_accuracy * weights.history;
    raw.clamp(0.0, 1.0)
}

/// Score how disruptive an edit is from the change in line count.
///
/// Small edits score close to 1.0; rewrites that add or remove more than a
/// hundred lines score 0.2.
pub fn assess_change_magnitude(old: &str, new: &str) -> f64 {
    let delta = old.lines().count().abs_diff(new.lines().count());
    match delta {
        0..=5 => 1.0,
        6..=10 => 0.9,
        11..=20 => 0.8,
        21..=50 => 0.6,
        51..=100 => 0.4,
        _ => 0.2,
    }
}

/// Category of edit, used for the risk factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    TypoFix,
    BrokenLinkFix,
    FormattingFix,
    SyncCanonical,
    StructuralChange,
    CodeChange,
    #[default]
    Unknown,
}

impl ChangeType {
    /// Inverse risk: 1.0 is the safest kind of edit.
    pub fn risk(&self) -> f64 {
        match self {
            ChangeType::TypoFix => 1.0,
            ChangeType::BrokenLinkFix => 0.9,
            ChangeType::FormattingFix => 0.85,
            ChangeType::SyncCanonical => 0.8,
            ChangeType::StructuralChange => 0.5,
            ChangeType::CodeChange => 0.3,
            ChangeType::Unknown => 0.5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::TypoFix => "typo_fix",
            ChangeType::BrokenLinkFix => "broken_link_fix",
            ChangeType::FormattingFix => "formatting_fix",
            ChangeType::SyncCanonical => "sync_canonical",
            ChangeType::StructuralChange => "structural_change",
            ChangeType::CodeChange => "code_change",
            ChangeType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What to do with a change of a given confidence.
///
/// Variants are ordered from least to most trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTier {
    Discard,
    ReportOnly,
    AutoStage,
    AutoCommit,
}

impl ActionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionTier::Discard => "discard",
            ActionTier::ReportOnly => "report_only",
            ActionTier::AutoStage => "auto_stage",
            ActionTier::AutoCommit => "auto_commit",
        }
    }
}

impl std::fmt::Display for ActionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validated thresholds and weights for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    report_only: f64,
    auto_stage: f64,
    auto_commit: f64,
    weights: Weights,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            report_only: 0.5,
            auto_stage: 0.8,
            auto_commit: 0.9,
            weights: Weights::default(),
        }
    }
}

impl ThresholdPolicy {
    pub fn new(
        report_only: f64,
        auto_stage: f64,
        auto_commit: f64,
        weights: Weights,
    ) -> std::result::Result<Self, ConfigError> {
        weights.validate()?;

        for (name, value) in [
            ("report_only", report_only),
            ("auto_stage", auto_stage),
            ("auto_commit", auto_commit),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThresholds(format!(
                    "{name} must be within [0.0, 1.0], got {value}"
                )));
            }
        }

        if !(report_only <= auto_stage && auto_stage <= auto_commit) {
            return Err(ConfigError::InvalidThresholds(format!(
                "expected report_only <= auto_stage <= auto_commit, got {report_only} / {auto_stage} / {auto_commit}"
            )));
        }

        Ok(Self {
            report_only,
            auto_stage,
            auto_commit,
            weights,
        })
    }

    pub fn from_config(config: &ConfidenceConfig) -> std::result::Result<Self, ConfigError> {
        Self::new(
            config.report_only_threshold,
            config.auto_stage_threshold,
            config.auto_commit_threshold,
            config.weights,
        )
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn report_only(&self) -> f64 {
        self.report_only
    }

    pub fn auto_stage(&self) -> f64 {
        self.auto_stage
    }

    pub fn auto_commit(&self) -> f64 {
        self.auto_commit
    }

    pub fn score(&self, factors: &ConfidenceFactors) -> f64 {
        score(factors, &self.weights)
    }

    pub fn action_for(&self, score: f64) -> ActionTier {
        if score >= self.auto_commit {
            ActionTier::AutoCommit
        } else if score >= self.auto_stage {
            ActionTier::AutoStage
        } else if score >= self.report_only {
            ActionTier::ReportOnly
        } else {
            ActionTier::Discard
        }
    }
}
