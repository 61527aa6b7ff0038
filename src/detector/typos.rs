//! Dictionary-driven typo correction.

use super::{Detector, propose};
use crate::confidence::{ChangeType, ConfidenceFactors, assess_change_magnitude, unit_interval};
use crate::context::RunContext;
use crate::error::Result;
use crate::report::{Change, Mode, Report};
use crate::security::{CompiledPattern, PatternGuard};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

pub(super) const NAME: &str = "fix_typos";

pub(super) fn factory(ctx: &RunContext) -> Result<Box<dyn Detector>> {
    Ok(Box::new(TypoDetector::from_context(ctx)?))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TypoSettings {
    /// Misspelling to correction. Replaces the built-in list when set.
    pub common_typos: BTreeMap<String, String>,
    pub case_sensitive: bool,
    pub preserve_case: bool,
    pub skip_code_blocks: bool,
    pub historical_accuracy: f64,
    pub extensions: Vec<String>,
}

impl Default for TypoSettings {
    fn default() -> Self {
        let common_typos = [
            ("teh", "the"),
            ("recieve", "receive"),
            ("occured", "occurred"),
            ("seperator", "separator"),
            ("wierd", "weird"),
            ("thier", "their"),
            ("definately", "definitely"),
            ("untill", "until"),
        ]
        .into_iter()
        .map(|(typo, fix)| (typo.to_string(), fix.to_string()))
        .collect();

        Self {
            common_typos,
            case_sensitive: false,
            preserve_case: true,
            skip_code_blocks: true,
            historical_accuracy: 0.95,
            extensions: vec!["md".to_string()],
        }
    }
}

#[derive(Debug)]
pub struct TypoDetector {
    settings: TypoSettings,
    /// One word-bounded pattern per dictionary entry, in key order.
    patterns: Vec<(CompiledPattern, String)>,
}

impl TypoDetector {
    pub fn new(settings: TypoSettings, guard: &PatternGuard) -> Result<Self> {
        unit_interval("historical_accuracy", settings.historical_accuracy)?;

        let flags = if settings.case_sensitive { "" } else { "(?i)" };
        let sources: Vec<String> = settings
            .common_typos
            .keys()
            .map(|typo| format!(r"{flags}\b{}\b", regex::escape(typo)))
            .collect();
        let compiled = guard.compile_collection(&sources)?;
        let patterns = compiled
            .into_iter()
            .zip(settings.common_typos.values().cloned())
            .collect();

        Ok(Self { settings, patterns })
    }

    pub fn from_context(ctx: &RunContext) -> Result<Self> {
        let settings = ctx.settings(NAME).section::<TypoSettings>(NAME)?;
        Self::new(settings, ctx.patterns())
    }

    /// The corrected line and the misspellings found, or `None` if clean.
    fn correct_line(&self, line: &str) -> Option<(String, Vec<String>)> {
        let mut fixed = line.to_string();
        let mut found = Vec::new();

        for (pattern, correction) in &self.patterns {
            let mut hit = false;
            let replaced = pattern.replace_all(&fixed, |caps: &regex::Captures<'_>| {
                let Some(m) = caps.get(0) else {
                    return String::new();
                };
                if inside_link_or_path(&fixed, m.start(), m.end()) {
                    return m.as_str().to_string();
                }
                hit = true;
                if self.settings.preserve_case {
                    match_case(m.as_str(), correction)
                } else {
                    correction.clone()
                }
            });
            if hit {
                found.push(pattern_word(pattern));
                fixed = replaced.into_owned();
            }
        }

        (fixed != line).then_some((fixed, found))
    }

    fn scan_file(&self, ctx: &RunContext, file: &Path, content: &str, report: &mut Report) -> usize {
        let mut in_fence = false;
        let mut found = 0;

        for (index, line) in content.lines().enumerate() {
            if self.settings.skip_code_blocks {
                if line.trim_start().starts_with("```") {
                    in_fence = !in_fence;
                    continue;
                }
                if in_fence || line.contains('`') {
                    continue;
                }
            }
            if line.len() > ctx.limits().max_line_length {
                continue;
            }
            let Some((fixed, typos)) = self.correct_line(line) else {
                continue;
            };
            found += 1;

            let built = ConfidenceFactors::new(
                1.0,
                assess_change_magnitude(line, &fixed),
                ChangeType::TypoFix.risk(),
                self.settings.historical_accuracy,
            )
            .and_then(|factors| {
                Change::builder(NAME, file)
                    .line(index + 1)
                    .replace(line, fixed)
                    .confidence(ctx.policy().score(&factors))
                    .reason(format!("typo: {}", typos.join(", ")))
                    .change_type(ChangeType::TypoFix)
                    .build()
            });
            match built {
                Ok(change) => propose(report, ctx, change),
                Err(e) => report.push_error(ctx.sanitize(&e.to_string())),
            }
        }

        found
    }
}

impl Detector for TypoDetector {
    fn name(&self) -> &str {
        NAME
    }

    fn scan(&self, ctx: &RunContext) -> Report {
        let started = Instant::now();
        let mut report = Report::new(NAME, Mode::Check);
        let mut found = 0;

        for file in ctx.documents(&self.settings.extensions) {
            if ctx.shutdown().is_requested() {
                break;
            }
            match ctx.read_document(&file) {
                Ok(content) => found += self.scan_file(ctx, &file, &content, &mut report),
                Err(e) => report.push_error(ctx.sanitize(&e.to_string())),
            }
        }

        report.set_issues_found(found);
        report.finish(started)
    }
}

/// The dictionary word behind a compiled `\bword\b` pattern.
fn pattern_word(pattern: &CompiledPattern) -> String {
    pattern
        .as_str()
        .trim_start_matches("(?i)")
        .trim_start_matches(r"\b")
        .trim_end_matches(r"\b")
        .replace('\\', "")
}

/// True when the word at `start..end` sits in a URL, path or link target.
fn inside_link_or_path(line: &str, start: usize, end: usize) -> bool {
    let token_start = line[..start]
        .rfind(char::is_whitespace)
        .map_or(0, |i| i + 1);
    let token_end = line[end..]
        .find(char::is_whitespace)
        .map_or(line.len(), |i| end + i);
    let token = &line[token_start..token_end];
    token.contains("](") || token.contains('/') || token.contains("://")
}

/// Apply the casing of `original` to `correction`.
fn match_case(original: &str, correction: &str) -> String {
    let has_letters = original.chars().any(char::is_alphabetic);
    if has_letters && original.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase) {
        return correction.to_uppercase();
    }
    let mut chars = original.chars();
    if chars.next().is_some_and(char::is_uppercase) {
        let mut out = String::with_capacity(correction.len());
        let mut rest = correction.chars();
        if let Some(first) = rest.next() {
            out.extend(first.to_uppercase());
        }
        out.push_str(&rest.as_str().to_lowercase());
        return out;
    }
    correction.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::{BackupStore, ChangeApplier};
    use crate::config::Config;
    use crate::shutdown::ShutdownFlag;
    use crate::test_utils::doc_tree;
    use std::fs;

    fn detector() -> TypoDetector {
        TypoDetector::new(TypoSettings::default(), &PatternGuard::new()).unwrap()
    }

    fn context(dir: &Path) -> RunContext {
        RunContext::from_config(&Config::default(), dir, ShutdownFlag::new()).unwrap()
    }

    #[test]
    fn test_corrects_and_preserves_case() {
        let detector = detector();
        let (fixed, typos) = detector
            .correct_line("Teh parser will recieve TEH input")
            .unwrap();
        assert_eq!(fixed, "The parser will receive THE input");
        assert_eq!(typos, ["recieve", "teh"]);
        assert!(detector.correct_line("the clean line").is_none());
    }

    #[test]
    fn test_word_boundaries_and_paths() {
        let detector = detector();
        assert!(detector.correct_line("tehran is a city").is_none());
        assert!(detector.correct_line("see [docs](guide/teh.md)").is_none());
        assert!(detector.correct_line("https://example.com/teh").is_none());
    }

    #[test]
    fn test_scan_skips_code() {
        let dir = doc_tree(&[(
            "docs/a.md",
            "# Title\n```\nteh code\n```\nuse `teh` here\nteh prose\n",
        )]);
        let report = detector().scan(&context(dir.path()));

        assert_eq!(report.issues_found(), 1);
        let change = &report.changes()[0];
        assert_eq!(change.line(), 6);
        assert_eq!(change.old_content(), "teh prose");
        assert_eq!(change.new_content(), "the prose");
        assert!(change.confidence() > 0.99);
    }

    #[test]
    fn test_heal_then_rescan_is_clean() {
        let dir = doc_tree(&[("docs/a.md", "we recieve data untill noon\nok\n")]);
        let ctx = context(dir.path());
        let applier =
            ChangeApplier::new(ctx.path_guard().unwrap(), BackupStore::new(ctx.backup_dir()));

        let report = detector().heal(&ctx, &applier, 0.9);
        assert_eq!(report.issues_fixed(), 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("docs/a.md")).unwrap(),
            "we receive data until noon\nok\n"
        );
        assert_eq!(detector().scan(&ctx).issues_found(), 0);
    }

    #[test]
    fn test_custom_dictionary_from_settings() {
        let dir = doc_tree(&[("docs/a.md", "the adress line\n")]);
        let mut config = Config::default();
        config.detectors.insert(
            NAME.to_string(),
            serde_json::from_value(serde_json::json!({
                "common_typos": { "adress": "address" }
            }))
            .unwrap(),
        );
        let ctx = RunContext::from_config(&config, dir.path(), ShutdownFlag::new()).unwrap();

        let report = TypoDetector::from_context(&ctx).unwrap().scan(&ctx);
        assert_eq!(report.changes()[0].new_content(), "the address line");
    }

    #[test]
    fn test_dictionary_size_is_limited() {
        let settings = TypoSettings {
            common_typos: (0..5).map(|i| (format!("w{i}"), "x".to_string())).collect(),
            ..TypoSettings::default()
        };
        assert!(TypoDetector::new(settings, &PatternGuard::new().with_max_patterns(4)).is_err());
    }

    #[test]
    fn test_match_case() {
        assert_eq!(match_case("teh", "the"), "the");
        assert_eq!(match_case("Teh", "the"), "The");
        assert_eq!(match_case("TEH", "the"), "THE");
    }
}
