// src/query/matcher.rs

//! Pattern matching behind the query filters

use crate::error::{Error, Result};
use glob::{MatchOptions, Pattern};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

/// How filter patterns are compared against package attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CmpMode {
    #[default]
    Eq,
    Neq,
    Glob,
    NotGlob,
    IExact,
    IGlob,
    Contains,
    IContains,
    StartsWith,
    EndsWith,
    Regex,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpMode {
    /// Case-insensitive variant, where one exists
    pub fn with_icase(self) -> Self {
        match self {
            CmpMode::Eq => CmpMode::IExact,
            CmpMode::Glob => CmpMode::IGlob,
            CmpMode::Contains => CmpMode::IContains,
            other => other,
        }
    }

    pub fn is_ordering(self) -> bool {
        matches!(self, CmpMode::Gt | CmpMode::Gte | CmpMode::Lt | CmpMode::Lte)
    }

    fn is_negated(self) -> bool {
        matches!(self, CmpMode::Neq | CmpMode::NotGlob)
    }

    /// Check an ordering result against an ordering mode
    pub fn accepts(self, ord: Ordering) -> bool {
        match self {
            CmpMode::Gt => ord == Ordering::Greater,
            CmpMode::Gte => ord != Ordering::Less,
            CmpMode::Lt => ord == Ordering::Less,
            CmpMode::Lte => ord != Ordering::Greater,
            CmpMode::Neq => ord != Ordering::Equal,
            _ => ord == Ordering::Equal,
        }
    }
}

/// Does `s` contain glob metacharacters
pub fn is_glob_pattern(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

const ICASE: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

#[derive(Debug)]
enum Matcher {
    Exact(String),
    IExact(String),
    Glob(Pattern),
    IGlob(Pattern),
    Contains(String),
    IContains(String),
    StartsWith(String),
    EndsWith(String),
    Regex(Regex),
}

impl Matcher {
    fn matches(&self, value: &str) -> bool {
        match self {
            Matcher::Exact(p) => value == p,
            Matcher::IExact(p) => value.to_lowercase() == *p,
            Matcher::Glob(p) => p.matches(value),
            Matcher::IGlob(p) => p.matches_with(value, ICASE),
            Matcher::Contains(p) => value.contains(p.as_str()),
            Matcher::IContains(p) => value.to_lowercase().contains(p.as_str()),
            Matcher::StartsWith(p) => value.starts_with(p.as_str()),
            Matcher::EndsWith(p) => value.ends_with(p.as_str()),
            Matcher::Regex(r) => r.is_match(value),
        }
    }
}

/// A compiled set of patterns; a value matches if any pattern matches
#[derive(Debug)]
pub(crate) struct StringMatcher {
    matchers: Vec<Matcher>,
    negate: bool,
}

impl StringMatcher {
    /// Compile patterns for a non-ordering mode
    ///
    /// A malformed glob falls back to an exact comparison; a malformed
    /// regular expression is an error.
    pub(crate) fn new<S: AsRef<str>>(patterns: &[S], mode: CmpMode) -> Result<Self> {
        if mode.is_ordering() && patterns.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "Comparison {:?} is not supported for this filter",
                mode
            )));
        }

        let matchers = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                Ok(match mode {
                    CmpMode::Eq | CmpMode::Neq => Matcher::Exact(p.to_string()),
                    CmpMode::IExact => Matcher::IExact(p.to_lowercase()),
                    CmpMode::Glob | CmpMode::NotGlob => match Pattern::new(p) {
                        Ok(pat) => Matcher::Glob(pat),
                        Err(_) => Matcher::Exact(p.to_string()),
                    },
                    CmpMode::IGlob => match Pattern::new(p) {
                        Ok(pat) => Matcher::IGlob(pat),
                        Err(_) => Matcher::IExact(p.to_lowercase()),
                    },
                    CmpMode::Contains => Matcher::Contains(p.to_string()),
                    CmpMode::IContains => Matcher::IContains(p.to_lowercase()),
                    CmpMode::StartsWith => Matcher::StartsWith(p.to_string()),
                    CmpMode::EndsWith => Matcher::EndsWith(p.to_string()),
                    CmpMode::Regex => Matcher::Regex(
                        RegexBuilder::new(p)
                            .build()
                            .map_err(|e| Error::InvalidArgument(format!("Invalid regex '{}': {}", p, e)))?,
                    ),
                    CmpMode::Gt | CmpMode::Gte | CmpMode::Lt | CmpMode::Lte => {
                        return Err(Error::InvalidArgument(format!(
                            "Comparison {:?} is not supported for this filter",
                            mode
                        )));
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            matchers,
            negate: mode.is_negated(),
        })
    }

    pub(crate) fn matches(&self, value: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(value)) != self.negate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_detection() {
        assert!(is_glob_pattern("one*"));
        assert!(is_glob_pattern("on?"));
        assert!(is_glob_pattern("o[nm]e"));
        assert!(!is_glob_pattern("one-1.0"));
    }

    #[test]
    fn test_modes() {
        let m = StringMatcher::new(&["one"], CmpMode::Eq).unwrap();
        assert!(m.matches("one") && !m.matches("One"));

        let m = StringMatcher::new(&["one"], CmpMode::IExact).unwrap();
        assert!(m.matches("ONE"));

        let m = StringMatcher::new(&["o*"], CmpMode::IGlob).unwrap();
        assert!(m.matches("One"));

        let m = StringMatcher::new(&["one", "two"], CmpMode::Neq).unwrap();
        assert!(!m.matches("two") && m.matches("three"));

        let m = StringMatcher::new(&["^t.o$"], CmpMode::Regex).unwrap();
        assert!(m.matches("two"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(StringMatcher::new(&["("], CmpMode::Regex).is_err());
        assert!(StringMatcher::new(&["one"], CmpMode::Gt).is_err());

        // unclosed range falls back to literal comparison
        let m = StringMatcher::new(&["on[e"], CmpMode::Glob).unwrap();
        assert!(m.matches("on[e"));
    }

    #[test]
    fn test_ordering_acceptance() {
        assert!(CmpMode::Gte.accepts(Ordering::Equal));
        assert!(!CmpMode::Gt.accepts(Ordering::Equal));
        assert!(CmpMode::Lt.accepts(Ordering::Less));
        assert_eq!(CmpMode::Eq.with_icase(), CmpMode::IExact);
    }
}
