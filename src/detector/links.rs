//! Broken relative links in Markdown documents.
//!
//! A link is broken when its target does not exist on disk. The detector
//! proposes the most similar existing file, rewriting only the link target
//! and keeping any `#anchor`.

use super::{Detector, propose};
use crate::confidence::{ChangeType, ConfidenceFactors, assess_change_magnitude, unit_interval};
use crate::context::RunContext;
use crate::error::{GuardianError, Result};
use crate::report::{Change, Mode, Report};
use crate::security::{CompiledPattern, PatternGuard};
use serde::Deserialize;
use std::ops::Range;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

pub(super) const NAME: &str = "fix_broken_links";

pub(super) fn factory(ctx: &RunContext) -> Result<Box<dyn Detector>> {
    Ok(Box::new(BrokenLinkDetector::from_context(ctx)?))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Must capture the link text as group 1 and the target as group 2.
    pub link_pattern: String,
    /// Minimum similarity for a replacement candidate.
    pub fuzzy_threshold: f64,
    pub historical_success_rate: f64,
    pub extensions: Vec<String>,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            link_pattern: r"\[([^\]]+)\]\(([^\)]+)\)".to_string(),
            fuzzy_threshold: 0.5,
            historical_success_rate: 0.92,
            extensions: vec!["md".to_string()],
        }
    }
}

/// One link occurrence.
#[derive(Debug, Clone, PartialEq)]
struct Link {
    line: usize,
    full: String,
    /// Byte range of the target inside `full`.
    target: Range<usize>,
}

impl Link {
    fn target(&self) -> &str {
        &self.full[self.target.clone()]
    }
}

#[derive(Debug)]
pub struct BrokenLinkDetector {
    settings: LinkSettings,
    pattern: CompiledPattern,
}

impl BrokenLinkDetector {
    pub fn new(settings: LinkSettings, patterns: &PatternGuard) -> Result<Self> {
        unit_interval("fuzzy_threshold", settings.fuzzy_threshold)?;
        unit_interval("historical_success_rate", settings.historical_success_rate)?;

        let pattern = patterns.compile_safe(&settings.link_pattern)?;
        if pattern.captures_len() < 3 {
            return Err(GuardianError::RegexConfig {
                pattern: settings.link_pattern.clone(),
                message: "link_pattern must capture link text and target".to_string(),
            });
        }

        Ok(Self { settings, pattern })
    }

    pub fn from_context(ctx: &RunContext) -> Result<Self> {
        let settings = ctx.settings(NAME).section::<LinkSettings>(NAME)?;
        Self::new(settings, ctx.patterns())
    }

    /// Links in `content`, skipping fenced blocks, inline code and
    /// over-long lines.
    fn extract(&self, content: &str, ctx: &RunContext, file: &Path, report: &mut Report) -> Vec<Link> {
        let limits = ctx.limits();
        let mut links = Vec::new();
        let mut in_fence = false;

        for (index, line) in content.lines().enumerate() {
            let line_no = index + 1;
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            if line.len() > limits.max_line_length {
                report.push_error(format!(
                    "{}:{line_no}: line exceeds {} bytes, skipped",
                    ctx.display_path(file).display(),
                    limits.max_line_length
                ));
                continue;
            }

            let code = inline_code_spans(line);
            for caps in self.pattern.captures_iter(line) {
                let (Some(whole), Some(target)) = (caps.get(0), caps.get(2)) else {
                    continue;
                };
                if code.iter().any(|span| span.contains(&whole.start())) {
                    continue;
                }
                if links.len() >= limits.max_links_per_file {
                    warn!(file = %ctx.display_path(file).display(), "link limit reached");
                    report.push_error(format!(
                        "{}: more than {} links, remainder skipped",
                        ctx.display_path(file).display(),
                        limits.max_links_per_file
                    ));
                    return links;
                }
                links.push(Link {
                    line: line_no,
                    full: whole.as_str().to_string(),
                    target: (target.start() - whole.start())..(target.end() - whole.start()),
                });
            }
        }

        links
    }

    fn propose_fix(
        &self,
        ctx: &RunContext,
        file: &Path,
        link: &Link,
        candidates: &[PathBuf],
    ) -> Result<Option<Change>> {
        let target = link.target();
        let (path_part, anchor) = match target.split_once('#') {
            Some((path, anchor)) => (path, Some(anchor)),
            None => (target, None),
        };
        let from_dir = file.parent().unwrap_or(ctx.doc_root());
        let rooted = path_part.starts_with('/');
        let expected = resolve(ctx.doc_root(), from_dir, path_part);
        let expected_dir = expected.parent().unwrap_or(ctx.doc_root());

        let Some((best, score)) = best_candidate(path_part, expected_dir, candidates) else {
            return Ok(None);
        };
        if score < self.settings.fuzzy_threshold {
            debug!(link_target = target, score, "no candidate above threshold");
            return Ok(None);
        }

        let mut suggested = if rooted {
            let inside = best.strip_prefix(ctx.doc_root()).unwrap_or(best);
            format!("/{}", to_link_path(inside))
        } else {
            to_link_path(&relative_path(from_dir, best))
        };
        if let Some(anchor) = anchor {
            suggested.push('#');
            suggested.push_str(anchor);
        }

        let new = format!(
            "{}{}{}",
            &link.full[..link.target.start],
            suggested,
            &link.full[link.target.end..]
        );

        let factors = ConfidenceFactors::new(
            score,
            assess_change_magnitude(&link.full, &new),
            ChangeType::BrokenLinkFix.risk(),
            self.settings.historical_success_rate,
        )?;

        Change::builder(NAME, file)
            .line(link.line)
            .replace(link.full.clone(), new)
            .confidence(ctx.policy().score(&factors))
            .reason(format!("broken link {target}, closest match {suggested}"))
            .change_type(ChangeType::BrokenLinkFix)
            .build()
            .map(Some)
    }
}

impl Detector for BrokenLinkDetector {
    fn name(&self) -> &str {
        NAME
    }

    fn scan(&self, ctx: &RunContext) -> Report {
        let started = Instant::now();
        let mut report = Report::new(NAME, Mode::Check);
        let candidates = ctx.all_files();
        let mut found = 0;

        for file in ctx.documents(&self.settings.extensions) {
            if ctx.shutdown().is_requested() {
                break;
            }
            let content = match ctx.read_document(&file) {
                Ok(content) => content,
                Err(e) => {
                    report.push_error(ctx.sanitize(&e.to_string()));
                    continue;
                }
            };

            let from_dir = file.parent().unwrap_or(ctx.doc_root());
            for link in self.extract(&content, ctx, &file, &mut report) {
                let target = link.target();
                if is_external(target) {
                    continue;
                }
                let path_part = target.split('#').next().unwrap_or_default();
                if path_part.is_empty() || resolve(ctx.doc_root(), from_dir, path_part).exists() {
                    continue;
                }

                found += 1;
                match self.propose_fix(ctx, &file, &link, &candidates) {
                    Ok(Some(change)) => propose(&mut report, ctx, change),
                    Ok(None) => debug!(
                        file = %ctx.display_path(&file).display(),
                        line = link.line,
                        link_target = target,
                        "broken link without suggestion"
                    ),
                    Err(e) => report.push_error(ctx.sanitize(&e.to_string())),
                }
            }
        }

        report.set_issues_found(found);
        report.finish(started)
    }
}

fn is_external(target: &str) -> bool {
    target.starts_with('#') || target.starts_with("mailto:") || target.contains("://")
}

/// Byte ranges covered by backtick code spans.
fn inline_code_spans(line: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut open = None;
    for (i, c) in line.char_indices() {
        if c == '`' {
            match open.take() {
                Some(start) => spans.push(start..i + 1),
                None => open = Some(i),
            }
        }
    }
    spans
}

/// Resolve a link target without touching the filesystem.
fn resolve(doc_root: &Path, from_dir: &Path, target: &str) -> PathBuf {
    let joined = match target.strip_prefix('/') {
        Some(rooted) => doc_root.join(rooted),
        None => from_dir.join(target),
    };
    normalize(&joined)
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Path from directory `from` to `to`, both absolute.
fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<_> = from.components().collect();
    let to: Vec<_> = to.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for component in &to[common..] {
        out.push(component);
    }
    out
}

fn to_link_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// The most similar candidate, ties going to the first in walk order.
fn best_candidate<'a>(
    target: &str,
    expected_dir: &Path,
    candidates: &'a [PathBuf],
) -> Option<(&'a Path, f64)> {
    let mut best: Option<(&Path, f64)> = None;
    for candidate in candidates {
        let score = similarity(target, expected_dir, candidate);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((candidate.as_path(), score));
        }
    }
    best
}

/// Similarity between a broken link target and an existing file, in [0, 1].
///
/// - same file name, ignoring case: 1.0
/// - same directory, one stem a prefix of the other: 0.95
/// - edit distance of at most 2: 0.95 down to 0.90
/// - edit distance of 3 to 5: 0.88 down to 0.85
/// - otherwise `1 - distance / longer name length`
pub fn similarity(target: &str, expected_dir: &Path, candidate: &Path) -> f64 {
    let target_name = Path::new(target)
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let candidate_name = candidate
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if target_name.is_empty() || candidate_name.is_empty() {
        return 0.0;
    }
    if target_name == candidate_name {
        return 1.0;
    }

    if candidate.parent() == Some(expected_dir) {
        let target_stem = stem(&target_name);
        let candidate_stem = stem(&candidate_name);
        if !target_stem.is_empty()
            && !candidate_stem.is_empty()
            && (candidate_stem.starts_with(target_stem) || target_stem.starts_with(candidate_stem))
        {
            return 0.95;
        }
    }

    let distance = levenshtein(&target_name, &candidate_name);
    match distance {
        0..=2 => 0.95 - distance as f64 * 0.025,
        3..=5 => 0.90 - (distance - 2) as f64 * 0.0166,
        _ => {
            let longest = target_name.chars().count().max(candidate_name.chars().count());
            1.0 - distance as f64 / longest as f64
        }
    }
}

fn stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
