// src/package/reldep.rs

//! Package relational dependencies (`name [op evr]`)

use crate::error::{Error, Result};
use crate::version::{ranges_overlap, CmpOp, Evr};
use std::fmt;

/// A single requires/provides/conflicts/obsoletes entry
///
/// Only the plain `name` and `name op evr` shapes are supported; file paths
/// are plain names starting with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reldep {
    pub name: String,
    pub constraint: Option<(CmpOp, Evr)>,
}

impl Reldep {
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: None,
        }
    }

    pub fn versioned(name: impl Into<String>, op: CmpOp, evr: Evr) -> Self {
        Self {
            name: name.into(),
            constraint: Some((op, evr)),
        }
    }

    /// Parse "foo", "foo >= 1.0" or "foo = 2:1.0-3"
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::ParseError("Empty dependency".to_string()));
        }
        if s.starts_with('(') {
            return Err(Error::ParseError(format!(
                "Rich dependencies are not supported: {}",
                s
            )));
        }

        let parts: Vec<&str> = s.split_whitespace().collect();
        match parts.as_slice() {
            [name] => Ok(Self::unversioned(*name)),
            [name, op, evr] => {
                let op = CmpOp::parse(op).ok_or_else(|| {
                    Error::ParseError(format!("Invalid comparison operator in '{}'", s))
                })?;
                Ok(Self::versioned(*name, op, Evr::parse(evr)?))
            }
            _ => Err(Error::ParseError(format!("Invalid dependency '{}'", s))),
        }
    }

    pub fn is_file(&self) -> bool {
        self.name.starts_with('/')
    }

    /// Check whether a provide satisfies this requirement
    ///
    /// Names must match exactly. An unversioned side on either end matches
    /// any version; otherwise the two ranges must overlap.
    pub fn is_satisfied_by(&self, provide: &Reldep) -> bool {
        if self.name != provide.name {
            return false;
        }
        match (&self.constraint, &provide.constraint) {
            (Some((op_a, evr_a)), Some((op_b, evr_b))) => {
                ranges_overlap(*op_a, evr_a, *op_b, evr_b)
            }
            _ => true,
        }
    }
}

impl fmt::Display for Reldep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some((op, evr)) => write!(f, "{} {} {}", self.name, op, evr),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unversioned() {
        let dep = Reldep::parse("libfoo.so.1()(64bit)").unwrap();
        assert_eq!(dep.name, "libfoo.so.1()(64bit)");
        assert!(dep.constraint.is_none());
    }

    #[test]
    fn test_parse_versioned() {
        let dep = Reldep::parse("foo >= 1:2.0-1").unwrap();
        assert_eq!(dep.name, "foo");
        let (op, evr) = dep.constraint.unwrap();
        assert_eq!(op, CmpOp::GreaterOrEqual);
        assert_eq!(evr.epoch, 1);
    }

    #[test]
    fn test_parse_rejects_rich_and_garbage() {
        assert!(Reldep::parse("(foo or bar)").is_err());
        assert!(Reldep::parse("foo ~ 1.0").is_err());
        assert!(Reldep::parse("foo >=").is_err());
    }

    #[test]
    fn test_requirement_against_self_provide() {
        let provide = Reldep::parse("foo = 2.0-1").unwrap();
        assert!(Reldep::parse("foo").unwrap().is_satisfied_by(&provide));
        assert!(Reldep::parse("foo >= 1.5").unwrap().is_satisfied_by(&provide));
        assert!(!Reldep::parse("foo < 2.0").unwrap().is_satisfied_by(&provide));
        assert!(!Reldep::parse("bar").unwrap().is_satisfied_by(&provide));
    }

    #[test]
    fn test_display() {
        assert_eq!(Reldep::parse("foo >= 1.0").unwrap().to_string(), "foo >= 1.0");
    }
}
