//! Regex admission control.
//!
//! Detector-supplied patterns are screened for catastrophic-backtracking
//! shapes and size limits before they are compiled. Rust's regex engine is
//! linear-time, but patterns are also shared with configuration authors and
//! other tooling, so the same shapes are refused here.

use crate::error::{GuardianError, Result};
use regex::{Regex, RegexBuilder};
use std::fmt;

pub const DEFAULT_MAX_PATTERN_LENGTH: usize = 10_000;
pub const DEFAULT_MAX_PATTERNS: usize = 1_000;

/// Upper bound on compiled program size for any single pattern.
const COMPILED_SIZE_LIMIT: usize = 1 << 20;

/// A pattern that passed the shape scan and compiled successfully.
#[derive(Clone)]
pub struct CompiledPattern {
    regex: Regex,
}

impl CompiledPattern {
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

impl std::ops::Deref for CompiledPattern {
    type Target = Regex;

    fn deref(&self) -> &Regex {
        &self.regex
    }
}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompiledPattern")
            .field(&self.regex.as_str())
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PatternGuard {
    max_length: usize,
    max_patterns: usize,
}

impl Default for PatternGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternGuard {
    pub fn new() -> Self {
        Self {
            max_length: DEFAULT_MAX_PATTERN_LENGTH,
            max_patterns: DEFAULT_MAX_PATTERNS,
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_max_patterns(mut self, max_patterns: usize) -> Self {
        self.max_patterns = max_patterns;
        self
    }

    pub fn compile_safe(&self, pattern: &str) -> Result<CompiledPattern> {
        if pattern.len() > self.max_length {
            return Err(GuardianError::RegexConfig {
                pattern: truncate(pattern),
                message: format!(
                    "pattern length {} exceeds limit {}",
                    pattern.len(),
                    self.max_length
                ),
            });
        }

        if let Some(reason) = find_catastrophic_shape(pattern) {
            return Err(GuardianError::RegexSecurity {
                pattern: truncate(pattern),
                reason: reason.to_string(),
            });
        }

        let regex = RegexBuilder::new(pattern)
            .size_limit(COMPILED_SIZE_LIMIT)
            .build()
            .map_err(|e| GuardianError::RegexConfig {
                pattern: truncate(pattern),
                message: e.to_string(),
            })?;

        Ok(CompiledPattern { regex })
    }

    /// Compile a pattern collection, refusing it outright when it is larger
    /// than the configured count limit.
    pub fn compile_collection<S: AsRef<str>>(&self, patterns: &[S]) -> Result<Vec<CompiledPattern>> {
        if patterns.len() > self.max_patterns {
            return Err(GuardianError::RegexConfig {
                pattern: format!("<{} patterns>", patterns.len()),
                message: format!(
                    "pattern count {} exceeds limit {}",
                    patterns.len(),
                    self.max_patterns
                ),
            });
        }
        patterns
            .iter()
            .map(|p| self.compile_safe(p.as_ref()))
            .collect()
    }
}

fn truncate(pattern: &str) -> String {
    const SHOWN: usize = 80;
    match pattern.char_indices().nth(SHOWN) {
        Some((idx, _)) => format!("{}...", &pattern[..idx]),
        None => pattern.to_string(),
    }
}

/// Return a description of the first catastrophic shape in `pattern`.
///
/// Detected shapes:
/// - a quantified group whose body already contains an unbounded
///   quantifier: `(a+)+`, `(a*)*`, `(.*)+`, `(a+){2,}`
/// - a quantified alternation whose branches can match the same text:
///   `(a|a)+`, `(a|ab)*`, `(.|x)*`
pub fn find_catastrophic_shape(pattern: &str) -> Option<&'static str> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut open: Vec<usize> = Vec::new();
    let mut in_class = false;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                i += 2;
                continue;
            }
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '(' if !in_class => open.push(i),
            ')' if !in_class => {
                if let Some(start) = open.pop()
                    && unbounded_quantifier_at(&chars, i + 1)
                {
                    let body = strip_group_prefix(&chars[start + 1..i]);
                    if contains_unbounded_quantifier(body) {
                        return Some("nested quantifier");
                    }
                    if has_overlapping_alternation(body) {
                        return Some("quantified alternation with overlapping branches");
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// `+`, `*` or `{n,}` at `pos`.
fn unbounded_quantifier_at(chars: &[char], pos: usize) -> bool {
    match chars.get(pos) {
        Some('+') | Some('*') => true,
        Some('{') => {
            let rest: String = chars[pos + 1..]
                .iter()
                .take_while(|c| **c != '}')
                .collect();
            match rest.split_once(',') {
                Some((min, max)) => {
                    !min.is_empty()
                        && min.chars().all(|c| c.is_ascii_digit())
                        && max.trim().is_empty()
                }
                None => false,
            }
        }
        _ => false,
    }
}

fn strip_group_prefix(body: &[char]) -> &[char] {
    if body.first() != Some(&'?') {
        return body;
    }
    // (?P<name>...) and (?<name>...)
    if matches!(body.get(1), Some('P') | Some('<'))
        && let Some(end) = body.iter().position(|c| *c == '>')
    {
        return &body[end + 1..];
    }
    // (?:...) and (?flags:...)
    match body.iter().position(|c| *c == ':') {
        Some(end) => &body[end + 1..],
        None => &[],
    }
}

fn contains_unbounded_quantifier(body: &[char]) -> bool {
    let mut in_class = false;
    let mut i = 0;
    while i < body.len() {
        match body[i] {
            '\\' => {
                i += 2;
                continue;
            }
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '+' | '*' if !in_class => return true,
            '{' if !in_class && unbounded_quantifier_at(body, i) => return true,
            _ => {}
        }
        i += 1;
    }
    false
}

fn top_level_branches(body: &[char]) -> Vec<String> {
    let mut branches = vec![String::new()];
    let mut depth = 0usize;
    let mut in_class = false;
    let mut i = 0;
    while i < body.len() {
        let c = body[i];
        if c == '\\' {
            if let Some(branch) = branches.last_mut() {
                branch.push(c);
                if let Some(next) = body.get(i + 1) {
                    branch.push(*next);
                }
            }
            i += 2;
            continue;
        }
        match c {
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '(' if !in_class => depth += 1,
            ')' if !in_class => depth = depth.saturating_sub(1),
            '|' if !in_class && depth == 0 => {
                branches.push(String::new());
                i += 1;
                continue;
            }
            _ => {}
        }
        if let Some(branch) = branches.last_mut() {
            branch.push(c);
        }
        i += 1;
    }
    branches
}

fn has_overlapping_alternation(body: &[char]) -> bool {
    let branches = top_level_branches(body);
    if branches.len() < 2 {
        return false;
    }
    let wildcard = |b: &str| b.is_empty() || b.starts_with('.') || b.starts_with('[');
    for (idx, a) in branches.iter().enumerate() {
        for b in &branches[idx + 1..] {
            if wildcard(a) || wildcard(b) || a.starts_with(b.as_str()) || b.starts_with(a.as_str())
            {
                return true;
            }
        }
    }
    false
}
