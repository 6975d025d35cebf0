use glob::{MatchOptions, Pattern, PatternError};
use tracing::warn;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// An ant-style path pattern: `*` matches within a single path segment, `**` matches any
///  number of segments. A pattern ending in `/` is shorthand for everything below that directory.
#[derive(Debug, Clone)]
pub struct PathPattern {
    pattern: Pattern,
}
impl PathPattern {
    pub fn new(source: &str) -> Result<PathPattern, PatternError> {
        let mut normalized = source.replace('\\', "/").trim_start_matches('/').to_string();
        if normalized.is_empty() || normalized.ends_with('/') {
            normalized.push_str("**");
        }
        // a trailing `**` only matches subdirectories when followed by a segment pattern
        if normalized == "**" || normalized.ends_with("/**") {
            normalized.push_str("/*");
        }

        Ok(PathPattern {
            pattern: Pattern::new(&normalized)?,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.pattern.matches_with(path.trim_start_matches('/'), MATCH_OPTIONS)
    }
}

/// One-shot convenience; an invalid pattern matches nothing
pub fn matches(pattern: &str, path: &str) -> bool {
    PathPattern::new(pattern)
        .map(|p| p.matches(path))
        .unwrap_or(false)
}

/// Black and white lists of a proxy connector. The black list is evaluated first and excludes
///  unconditionally; a non-empty white list restricts to matching paths.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    black_list: Vec<PathPattern>,
    white_list: Vec<PathPattern>,
    /// a white list that was configured but consists of invalid patterns only still excludes everything
    white_list_declared: bool,
}
impl PathFilter {
    pub fn new(black_list: &[String], white_list: &[String]) -> PathFilter {
        PathFilter {
            black_list: compile(black_list),
            white_list: compile(white_list),
            white_list_declared: !white_list.is_empty(),
        }
    }

    pub fn allows(&self, path: &str) -> bool {
        if self.black_list.iter().any(|p| p.matches(path)) {
            return false;
        }
        !self.white_list_declared || self.white_list.iter().any(|p| p.matches(path))
    }
}

fn compile(patterns: &[String]) -> Vec<PathPattern> {
    patterns.iter()
        .filter_map(|p| match PathPattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(pattern = %p, "dropping invalid path pattern: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use rstest::*;
    use super::*;

    #[rstest]
    #[case::exact("org/example/lib/1.0/lib-1.0.jar", "org/example/lib/1.0/lib-1.0.jar", true)]
    #[case::star_in_segment("org/example/*/1.0/*.jar", "org/example/lib/1.0/lib-1.0.jar", true)]
    #[case::star_does_not_cross_segments("org/*.jar", "org/example/lib-1.0.jar", false)]
    #[case::double_star("org/**/*.jar", "org/example/lib/1.0/lib-1.0.jar", true)]
    #[case::double_star_matches_zero_segments("org/**/*.jar", "org/lib-1.0.jar", true)]
    #[case::leading_double_star("**/*-sources.jar", "org/example/lib/1.0/lib-1.0-sources.jar", true)]
    #[case::leading_double_star_other_ext("**/*-sources.jar", "org/example/lib/1.0/lib-1.0.jar", false)]
    #[case::trailing_double_star("org/example/**", "org/example/lib/1.0/lib-1.0.jar", true)]
    #[case::trailing_double_star_other_group("org/example/**", "org/other/lib/1.0/lib-1.0.jar", false)]
    #[case::trailing_slash("org/example/", "org/example/lib/1.0/lib-1.0.jar", true)]
    #[case::everything("**", "a/b/c.jar", true)]
    #[case::leading_slash("/org/**", "org/a.jar", true)]
    #[case::backslashes("org\\example\\**", "org/example/a.jar", true)]
    #[case::case_sensitive("ORG/**", "org/a.jar", false)]
    fn test_matches(#[case] pattern: &str, #[case] path: &str, #[case] expected: bool) {
        assert_eq!(matches(pattern, path), expected);
    }

    #[test]
    fn test_invalid_pattern_matches_nothing() {
        assert!(PathPattern::new("org/a**b").is_err());
        assert!(!matches("org/a**b", "org/axxb"));
    }

    fn strings(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[rstest]
    #[case::no_lists(&[], &[], "org/a/1.0/a-1.0.jar", true)]
    #[case::white_listed(&[], &["org/**"], "org/a/1.0/a-1.0.jar", true)]
    #[case::not_white_listed(&[], &["com/**"], "org/a/1.0/a-1.0.jar", false)]
    #[case::black_listed(&["org/a/**"], &[], "org/a/1.0/a-1.0.jar", false)]
    #[case::black_beats_white(&["org/a/**"], &["org/**"], "org/a/1.0/a-1.0.jar", false)]
    #[case::black_list_other_path(&["org/b/**"], &["org/**"], "org/a/1.0/a-1.0.jar", true)]
    #[case::invalid_white_list_stays_restrictive(&[], &["org/a**b"], "org/a/1.0/a-1.0.jar", false)]
    #[case::invalid_black_list_entry_dropped(&["org/a**b"], &[], "org/a/1.0/a-1.0.jar", true)]
    fn test_filter(#[case] black: &[&str], #[case] white: &[&str], #[case] path: &str, #[case] expected: bool) {
        let filter = PathFilter::new(&strings(black), &strings(white));
        assert_eq!(filter.allows(path), expected);
    }
}
