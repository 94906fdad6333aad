use crate::models::Settings;
use regex::Regex;
use thiserror::Error;

/// An ignore pattern that is not a valid regular expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid ignore pattern `{pattern}`: {message}")]
pub struct InvalidPattern {
    pub pattern: String,
    pub message: String,
}

/// Compiled set of ignore patterns.
///
/// Built once per invocation (one document event, one bulk run) and then
/// applied to every path of that invocation. Patterns are unanchored searches
/// against the vault-relative path; a document is ignored if any of them match.
/// The empty pattern matches every path.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    patterns: Vec<Regex>,
}

impl ExclusionFilter {
    /// Compile a list of patterns.
    ///
    /// Fails on the first malformed pattern, naming it.
    pub fn new<I, S>(patterns: I) -> Result<Self, InvalidPattern>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|e| InvalidPattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// Compile the patterns configured in `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self, InvalidPattern> {
        Self::new(settings.ignore_patterns())
    }

    /// Check whether `path` matches any pattern.
    pub fn is_ignored(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(path))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Check a single path against a pattern list.
///
/// Convenience for one-off checks; bulk callers should build an
/// [`ExclusionFilter`] once and reuse it.
pub fn is_ignored<S: AsRef<str>>(path: &str, patterns: &[S]) -> Result<bool, InvalidPattern> {
    Ok(ExclusionFilter::new(patterns)?.is_ignored(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_prefix_pattern() {
        assert!(is_ignored("templates/foo.md", &["^templates/"]).unwrap());
        assert!(!is_ignored("notes/foo.md", &["^templates/"]).unwrap());
    }

    #[test]
    fn test_no_patterns() {
        let none: [&str; 0] = [];
        assert!(!is_ignored("anything.md", &none).unwrap());
        assert!(ExclusionFilter::default().is_empty());
    }

    #[test]
    fn test_any_pattern_matches() {
        let filter = ExclusionFilter::new(["^archive/", r"\.excalidraw\.md$"]).unwrap();

        assert_eq!(filter.len(), 2);
        assert!(filter.is_ignored("archive/2023.md"));
        assert!(filter.is_ignored("drawings/plan.excalidraw.md"));
        assert!(!filter.is_ignored("notes/plan.md"));
    }

    #[test]
    fn test_unanchored_search() {
        assert!(is_ignored("notes/daily/2024-01-01.md", &["daily"]).unwrap());
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        assert!(is_ignored("notes/foo.md", &[""]).unwrap());
        assert!(is_ignored("", &[""]).unwrap());
    }

    #[test]
    fn test_invalid_pattern_is_named() {
        let err = ExclusionFilter::new(["^ok/", "([unclosed", "also-ok"]).unwrap_err();

        assert_eq!(err.pattern, "([unclosed");
        assert!(err.to_string().contains("([unclosed"));
    }

    #[test]
    fn test_from_settings_skips_blank_lines() {
        let settings = Settings {
            ignore_file_regex: "^templates/\n\n".to_string(),
            ..Settings::default()
        };
        let filter = ExclusionFilter::from_settings(&settings).unwrap();

        assert_eq!(filter.len(), 1);
        assert!(!filter.is_ignored("notes/a.md"));
    }

    proptest! {
        #[test]
        fn prop_empty_pattern_list_ignores_nothing(path in "[a-z/]{0,40}\\.md") {
            let none: [&str; 0] = [];
            prop_assert!(!is_ignored(&path, &none).unwrap());
        }

        #[test]
        fn prop_escaped_prefix_matches_own_subtree(dir in "[a-z.+()]{1,12}", name in "[a-z]{1,12}") {
            let pattern = format!("^{}/", regex::escape(&dir));
            let inside = format!("{dir}/{name}.md");
            let outside = format!("{name}.md");
            prop_assert!(is_ignored(&inside, &[pattern.as_str()]).unwrap());
            prop_assert!(!is_ignored(&outside, &[pattern.as_str()]).unwrap());
        }
    }
}
