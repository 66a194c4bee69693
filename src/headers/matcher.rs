//! Header name matching.
//!
//! # Responsibilities
//! - Match header names against configured names or regular expressions
//! - Match case-insensitively, treating `-` and `_` as the same character in
//!   literal names
//!
//! # Design Decisions
//! - A pattern without regex metacharacters is a literal name (exact match)
//! - Any other pattern is a regex that may match anywhere in the name
//! - Malformed regexes are logged when compiled and never match

use regex::{Regex, RegexBuilder};

const TRACING_TARGET: &str = "environ_trace::headers";

const REGEX_METACHARACTERS: &[char] = &[
    '\\', '.', '^', '$', '|', '?', '*', '+', '(', ')', '[', ']', '{', '}',
];

#[derive(Debug, Clone)]
enum NamePattern {
    Literal(String),
    Regex(Regex),
}

impl NamePattern {
    fn matches(&self, name: &str, folded: &str) -> bool {
        match self {
            NamePattern::Literal(literal) => literal == folded,
            NamePattern::Regex(regex) => regex.is_match(name),
        }
    }
}

/// Compiled, case-insensitive set of header name patterns.
#[derive(Debug, Clone, Default)]
pub struct HeaderNameMatcher {
    patterns: Vec<NamePattern>,
}

impl HeaderNameMatcher {
    /// Compiles `patterns` in order. Malformed regexes are logged and dropped.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter_map(|pattern| compile(pattern.as_ref()))
            .collect();
        Self { patterns }
    }

    /// True when no usable pattern was configured.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether `name` matches any pattern. The first match wins.
    pub fn matches(&self, name: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let folded = fold_name(name);
        self.patterns
            .iter()
            .any(|pattern| pattern.matches(name, &folded))
    }
}

/// One-shot form of [`HeaderNameMatcher::matches`].
pub fn matches<S: AsRef<str>>(name: &str, patterns: &[S]) -> bool {
    HeaderNameMatcher::new(patterns).matches(name)
}

fn compile(pattern: &str) -> Option<NamePattern> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return None;
    }
    if !pattern.contains(REGEX_METACHARACTERS) {
        return Some(NamePattern::Literal(fold_name(pattern)));
    }

    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => Some(NamePattern::Regex(regex)),
        Err(err) => {
            tracing::warn!(
                target: TRACING_TARGET,
                pattern = %pattern,
                error = %err,
                "Ignoring malformed header name pattern"
            );
            None
        }
    }
}

fn fold_name(name: &str) -> String {
    name.to_ascii_lowercase().replace('_', "-")
}
