//! Regex denial-of-service tests.
//!
//! User-supplied patterns (link patterns, typo dictionaries) go through
//! `PatternGuard`; catastrophic shapes are refused before compilation and
//! accepted patterns run in linear time.

use doc_guardian::detector::{BrokenLinkDetector, LinkSettings, TypoDetector, TypoSettings};
use doc_guardian::security::{PatternGuard, find_catastrophic_shape};
use doc_guardian::GuardianError;
use std::time::{Duration, Instant};

const MAX_ACCEPTABLE_TIME: Duration = Duration::from_millis(500);

#[test]
fn test_rejects_nested_quantifiers() {
    let guard = PatternGuard::new();
    for pattern in ["(a+)+b", "(a*)*", "(.*)+x", "(\\w+){2,}$"] {
        let err = guard.compile_safe(pattern).unwrap_err();
        assert!(
            matches!(err, GuardianError::RegexSecurity { .. }),
            "{pattern} should be rejected"
        );
    }
}

#[test]
fn test_rejects_overlapping_alternation() {
    let guard = PatternGuard::new();
    assert!(guard.compile_safe("(a|a)+").is_err());
    assert!(guard.compile_safe("(a|ab)*c").is_err());
}

#[test]
fn test_accepts_linear_patterns() {
    let guard = PatternGuard::new();
    for pattern in ["a+b", r"\[([^\]]+)\]\(([^\)]+)\)", r"(?i)\bteh\b", "[(a+)+]", r"\(a+\)+"] {
        assert!(guard.compile_safe(pattern).is_ok(), "{pattern} should compile");
    }
    assert_eq!(find_catastrophic_shape("(ab)+c"), None);
}

#[test]
fn test_length_and_count_limits() {
    let guard = PatternGuard::new().with_max_length(16).with_max_patterns(2);
    assert!(matches!(
        guard.compile_safe(&"a".repeat(17)).unwrap_err(),
        GuardianError::RegexConfig { .. }
    ));
    assert!(guard.compile_collection(&["a", "b", "c"]).is_err());
    assert_eq!(guard.compile_collection(&["a", "b"]).unwrap().len(), 2);
}

#[test]
fn test_link_detector_refuses_catastrophic_pattern() {
    let settings = LinkSettings {
        link_pattern: r"\[((a+)+)\]\((.*)\)".to_string(),
        ..LinkSettings::default()
    };
    let err = BrokenLinkDetector::new(settings, &PatternGuard::new()).unwrap_err();
    assert!(matches!(err, GuardianError::RegexSecurity { .. }));
}

#[test]
fn test_typo_dictionary_is_escaped() {
    let mut settings = TypoSettings::default();
    settings
        .common_typos
        .insert("(a+)+".to_string(), "safe".to_string());
    assert!(TypoDetector::new(settings, &PatternGuard::new()).is_ok());
}

#[test]
fn test_accepted_link_pattern_is_linear_on_hostile_input() {
    let guard = PatternGuard::new();
    let pattern = guard.compile_safe(r"\[([^\]]+)\]\(([^\)]+)\)").unwrap();
    let hostile = format!("{}{}", "[".repeat(50_000), "](".repeat(50_000));

    let start = Instant::now();
    let found = pattern.regex().find_iter(&hostile).count();
    let elapsed = start.elapsed();

    assert_eq!(found, 0);
    assert!(
        elapsed < MAX_ACCEPTABLE_TIME,
        "link pattern took {elapsed:?} on hostile input"
    );
}
