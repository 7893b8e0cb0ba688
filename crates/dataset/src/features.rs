//! Per-row feature heuristics shared across the pipeline.

use std::sync::OnceLock;

use regex::RegexSet;

/// Keywords suggesting a commit message describes a bug fix.
const FIX_KEYWORDS: [&str; 19] = [
    "fix", "fixes", "fixed", "fixing", "bug", "bugfix", "patch", "resolve", "resolves",
    "resolved", "resolving", "close", "closes", "closed", "closing", "issue", "error",
    "correct", "repair",
];

/// Filename patterns identifying test sources across common languages.
const TEST_FILE_PATTERNS: [&str; 14] = [
    r"test.*\.py$",
    r".*test\.py$",
    r".*_test\.py$",
    r"test.*\.java$",
    r".*Test\.java$",
    r".*Tests\.java$",
    r"test.*\.js$",
    r".*test\.js$",
    r".*\.test\.js$",
    r"test.*\.ts$",
    r".*test\.ts$",
    r".*\.test\.ts$",
    r".*\.spec\.(js|ts|py|java)$",
    r".*/tests?/.*",
];

fn test_file_set() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        let patterns: Vec<String> = TEST_FILE_PATTERNS
            .iter()
            .map(|p| format!("(?i){p}"))
            .collect();
        RegexSet::new(&patterns).expect("test-file patterns are valid regexes")
    })
}

/// Whether a commit note contains any fix keyword (case-insensitive
/// substring match, matching inflected forms via the keyword list itself).
pub fn has_fix_keyword(note: &str) -> bool {
    let lower = note.to_lowercase();
    FIX_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Whether a file path names a test source.
pub fn is_test_file(path: &str) -> bool {
    test_file_set().is_match(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_keyword_positive() {
        assert!(has_fix_keyword("Fixes bug #123"));
        assert!(has_fix_keyword("RESOLVED: null pointer"));
        assert!(has_fix_keyword("patch for the parser"));
    }

    #[test]
    fn test_fix_keyword_negative() {
        assert!(!has_fix_keyword("Update documentation"));
        assert!(!has_fix_keyword(""));
    }

    #[test]
    fn test_test_file_positive() {
        assert!(is_test_file("src/test_foo.py"));
        assert!(is_test_file("FooTest.java"));
        assert!(is_test_file("app/components/button.test.ts"));
        assert!(is_test_file("project/tests/helper.rb"));
        assert!(is_test_file("src/TEST_CASE.PY"));
    }

    #[test]
    fn test_test_file_negative() {
        assert!(!is_test_file("src/foo.py"));
        assert!(!is_test_file("README.md"));
        assert!(!is_test_file("attestation.rs"));
    }
}
