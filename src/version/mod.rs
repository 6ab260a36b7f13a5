// src/version/mod.rs

//! RPM version handling
//!
//! This module provides version parsing and comparison for RPM-style versions
//! (`[epoch:]version[-release]`), the comparison operators used by package
//! dependencies, and NEVRA parsing for package specs.
//!
//! Comparison follows rpm's `rpmvercmp` segment rules, including `~`
//! (sorts before everything, used for pre-releases) and `^` (sorts after the
//! end of a string but before any other segment, used for snapshots).

mod nevra;

pub use nevra::{Nevra, NevraForm, DEFAULT_NEVRA_FORMS};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Compare two version (or release) strings with rpm semantics
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let mut one = a.as_bytes();
    let mut two = b.as_bytes();

    loop {
        one = skip_separators(one);
        two = skip_separators(two);

        // Tilde sorts before everything else
        if one.first() == Some(&b'~') || two.first() == Some(&b'~') {
            if one.first() != Some(&b'~') {
                return Ordering::Greater;
            }
            if two.first() != Some(&b'~') {
                return Ordering::Less;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        // Caret sorts after the end of a string, before anything else
        if one.first() == Some(&b'^') || two.first() == Some(&b'^') {
            if one.is_empty() {
                return Ordering::Less;
            }
            if two.is_empty() {
                return Ordering::Greater;
            }
            if one.first() != Some(&b'^') {
                return Ordering::Greater;
            }
            if two.first() != Some(&b'^') {
                return Ordering::Less;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        if one.is_empty() || two.is_empty() {
            break;
        }

        let numeric = one[0].is_ascii_digit();
        let (seg1, rest1) = take_segment(one, numeric);
        let (seg2, rest2) = take_segment(two, numeric);
        one = rest1;
        two = rest2;

        // Segments of different types: numeric is always newer
        if seg2.is_empty() {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ord = if numeric {
            let s1 = trim_leading_zeros(seg1);
            let s2 = trim_leading_zeros(seg2);
            s1.len().cmp(&s2.len()).then_with(|| s1.cmp(s2))
        } else {
            seg1.cmp(seg2)
        };

        if ord != Ordering::Equal {
            return ord;
        }
    }

    match (one.is_empty(), two.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        _ => Ordering::Greater,
    }
}

fn skip_separators(s: &[u8]) -> &[u8] {
    let skip = s
        .iter()
        .take_while(|c| !c.is_ascii_alphanumeric() && **c != b'~' && **c != b'^')
        .count();
    &s[skip..]
}

fn take_segment(s: &[u8], numeric: bool) -> (&[u8], &[u8]) {
    let len = s
        .iter()
        .take_while(|c| {
            if numeric {
                c.is_ascii_digit()
            } else {
                c.is_ascii_alphabetic()
            }
        })
        .count();
    s.split_at(len)
}

fn trim_leading_zeros(s: &[u8]) -> &[u8] {
    let zeros = s.iter().take_while(|c| **c == b'0').count();
    &s[zeros..]
}

/// A parsed epoch:version-release triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Evr {
    pub epoch: u32,
    pub version: String,
    pub release: String,
}

impl Evr {
    pub fn new(epoch: u32, version: impl Into<String>, release: impl Into<String>) -> Self {
        Self {
            epoch,
            version: version.into(),
            release: release.into(),
        }
    }

    /// Parse an EVR string
    ///
    /// Format: [epoch:]version[-release]
    /// - "1.2.3" → epoch=0, version="1.2.3", release=""
    /// - "2:1.2.3-4.fc40" → epoch=2, version="1.2.3", release="4.fc40"
    pub fn parse(s: &str) -> Result<Self> {
        let (epoch, rest) = match s.split_once(':') {
            Some(("", rest)) => (0, rest),
            Some((e, rest)) => {
                let epoch = e.parse::<u32>().map_err(|err| {
                    Error::ParseError(format!("Invalid epoch in version '{}': {}", s, err))
                })?;
                (epoch, rest)
            }
            None => (0, s),
        };

        let (version, release) = match rest.rsplit_once('-') {
            Some((v, r)) => (v, r),
            None => (rest, ""),
        };

        if version.is_empty() {
            return Err(Error::ParseError(format!(
                "Empty version component in '{}'",
                s
            )));
        }

        Ok(Self::new(epoch, version, release))
    }

    /// Full comparison: epoch, then version, then release
    pub fn compare(&self, other: &Evr) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| rpmvercmp(&self.version, &other.version))
            .then_with(|| rpmvercmp(&self.release, &other.release))
    }

    /// Comparison used for dependency matching
    ///
    /// When either side has no release the releases are not compared, so
    /// `foo >= 1.0` is satisfied by `foo = 1.0-3`.
    pub fn compare_for_dep(&self, other: &Evr) -> Ordering {
        let ord = self
            .epoch
            .cmp(&other.epoch)
            .then_with(|| rpmvercmp(&self.version, &other.version));
        if self.release.is_empty() || other.release.is_empty() {
            ord
        } else {
            ord.then_with(|| rpmvercmp(&self.release, &other.release))
        }
    }
}

impl fmt::Display for Evr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if !self.release.is_empty() {
            write!(f, "-{}", self.release)?;
        }
        Ok(())
    }
}

impl Ord for Evr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for Evr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Comparison operator of a versioned dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = ">")]
    Greater,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Less => "<",
            CmpOp::LessOrEqual => "<=",
            CmpOp::Equal => "=",
            CmpOp::GreaterOrEqual => ">=",
            CmpOp::Greater => ">",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "<" => Some(CmpOp::Less),
            "<=" | "=<" => Some(CmpOp::LessOrEqual),
            "=" | "==" => Some(CmpOp::Equal),
            ">=" | "=>" => Some(CmpOp::GreaterOrEqual),
            ">" => Some(CmpOp::Greater),
            _ => None,
        }
    }

    fn has_less(&self) -> bool {
        matches!(self, CmpOp::Less | CmpOp::LessOrEqual)
    }

    fn has_greater(&self) -> bool {
        matches!(self, CmpOp::Greater | CmpOp::GreaterOrEqual)
    }

    fn has_equal(&self) -> bool {
        matches!(
            self,
            CmpOp::Equal | CmpOp::LessOrEqual | CmpOp::GreaterOrEqual
        )
    }

    /// Check whether `evr` satisfies `<self> bound`
    pub fn satisfied_by(&self, evr: &Evr, bound: &Evr) -> bool {
        match evr.compare_for_dep(bound) {
            Ordering::Less => self.has_less(),
            Ordering::Greater => self.has_greater(),
            Ordering::Equal => self.has_equal(),
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check whether two versioned ranges intersect
///
/// This is the rule rpm uses to decide whether a versioned provide
/// satisfies a versioned requirement: `(op_a, evr_a)` and `(op_b, evr_b)`
/// overlap when some EVR satisfies both.
pub fn ranges_overlap(op_a: CmpOp, evr_a: &Evr, op_b: CmpOp, evr_b: &Evr) -> bool {
    match evr_a.compare_for_dep(evr_b) {
        Ordering::Less => op_a.has_greater() || op_b.has_less(),
        Ordering::Greater => op_a.has_less() || op_b.has_greater(),
        Ordering::Equal => {
            (op_a.has_equal() && op_b.has_equal())
                || (op_a.has_less() && op_b.has_less())
                || (op_a.has_greater() && op_b.has_greater())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpmvercmp_basic() {
        assert_eq!(rpmvercmp("1.0", "1.0"), Ordering::Equal);
        assert_eq!(rpmvercmp("1.0", "2.0"), Ordering::Less);
        assert_eq!(rpmvercmp("2.0.1", "2.0"), Ordering::Greater);
        assert_eq!(rpmvercmp("1.10", "1.9"), Ordering::Greater);
        assert_eq!(rpmvercmp("1.010", "1.10"), Ordering::Equal);
    }

    #[test]
    fn test_rpmvercmp_alpha_and_numeric() {
        // numeric segments are newer than alphabetic ones
        assert_eq!(rpmvercmp("1.0a", "1.0.1"), Ordering::Less);
        assert_eq!(rpmvercmp("1.a", "1.1"), Ordering::Less);
        assert_eq!(rpmvercmp("fc39", "fc40"), Ordering::Less);
        assert_eq!(rpmvercmp("abc", "abd"), Ordering::Less);
    }

    #[test]
    fn test_rpmvercmp_separators_are_equivalent() {
        assert_eq!(rpmvercmp("1.0", "1_0"), Ordering::Equal);
        assert_eq!(rpmvercmp("1+0", "1.0"), Ordering::Equal);
    }

    #[test]
    fn test_rpmvercmp_tilde() {
        assert_eq!(rpmvercmp("1.0~rc1", "1.0"), Ordering::Less);
        assert_eq!(rpmvercmp("1.0~rc1", "1.0~rc2"), Ordering::Less);
        assert_eq!(rpmvercmp("1.0~~", "1.0~"), Ordering::Less);
    }

    #[test]
    fn test_rpmvercmp_caret() {
        assert_eq!(rpmvercmp("1.0^", "1.0"), Ordering::Greater);
        assert_eq!(rpmvercmp("1.0^git1", "1.0.1"), Ordering::Less);
        assert_eq!(rpmvercmp("1.0^git1", "1.0^git2"), Ordering::Less);
        assert_eq!(rpmvercmp("1.0^git1", "1.0~rc1"), Ordering::Greater);
    }

    #[test]
    fn test_evr_parse() {
        let evr = Evr::parse("2:1.2.3-4.fc40").unwrap();
        assert_eq!(evr.epoch, 2);
        assert_eq!(evr.version, "1.2.3");
        assert_eq!(evr.release, "4.fc40");

        let evr = Evr::parse("1.2.3").unwrap();
        assert_eq!(evr.epoch, 0);
        assert_eq!(evr.release, "");

        assert!(Evr::parse("x:1.0").is_err());
        assert!(Evr::parse("1:-1").is_err());
    }

    #[test]
    fn test_evr_display_hides_zero_epoch() {
        assert_eq!(Evr::parse("0:1.0-1").unwrap().to_string(), "1.0-1");
        assert_eq!(Evr::parse("3:1.0-1").unwrap().to_string(), "3:1.0-1");
    }

    #[test]
    fn test_evr_ordering() {
        let a = Evr::parse("1.0-1").unwrap();
        let b = Evr::parse("1.0-2").unwrap();
        let c = Evr::parse("1:0.1-1").unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_dep_compare_ignores_missing_release() {
        let provided = Evr::parse("1.0-3").unwrap();
        let bound = Evr::parse("1.0").unwrap();
        assert!(CmpOp::Equal.satisfied_by(&provided, &bound));
        assert!(CmpOp::GreaterOrEqual.satisfied_by(&provided, &bound));
        assert!(!CmpOp::Greater.satisfied_by(&provided, &bound));
    }

    #[test]
    fn test_ranges_overlap() {
        let one = Evr::parse("1.0").unwrap();
        let two = Evr::parse("2.0").unwrap();
        assert!(ranges_overlap(CmpOp::GreaterOrEqual, &one, CmpOp::Equal, &two));
        assert!(!ranges_overlap(CmpOp::Less, &one, CmpOp::Equal, &two));
        assert!(ranges_overlap(CmpOp::Less, &two, CmpOp::Greater, &one));
        assert!(!ranges_overlap(CmpOp::Less, &one, CmpOp::Greater, &one));
    }
}
