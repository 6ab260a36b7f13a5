// src/version/nevra.rs

//! NEVRA parsing for package specs
//!
//! A package spec such as `foo-1:2.0-3.x86_64` can be read in several forms.
//! `Nevra::parse` returns every form that fits the string, in the order the
//! forms were requested, so the caller can try them one by one.

use crate::error::{Error, Result};
use std::fmt;

/// The shapes a package spec may take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NevraForm {
    Nevra,
    Nevr,
    Nev,
    Na,
    Name,
}

/// Default precedence used when resolving package specs
pub const DEFAULT_NEVRA_FORMS: &[NevraForm] = &[
    NevraForm::Nevra,
    NevraForm::Na,
    NevraForm::Nevr,
    NevraForm::Nev,
    NevraForm::Name,
];

/// A (possibly partial) name-epoch-version-release-arch tuple
///
/// Empty fields were not present in the parsed spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Nevra {
    pub name: String,
    pub epoch: String,
    pub version: String,
    pub release: String,
    pub arch: String,
}

/// Delimiter positions found while scanning a spec
struct Delims {
    before_last_dash: Option<usize>,
    last_dash: Option<usize>,
    colon: Option<usize>,
    dot: Option<usize>,
}

impl Nevra {
    /// Parse `spec` in each of `forms`, keeping the ones that fit
    ///
    /// Characters inside a glob range (`[...]`) are not treated as delimiters.
    /// A spec containing `:` twice or one of `( / = < >` or a space is rejected.
    pub fn parse(spec: &str, forms: &[NevraForm]) -> Result<Vec<Nevra>> {
        let delims = scan(spec)?;
        let end = spec.len();
        let mut result = Vec::new();

        for form in forms {
            let parsed = match form {
                NevraForm::Nevra => parse_nevra(spec, &delims, end),
                NevraForm::Nevr => parse_nevr(spec, &delims, end),
                NevraForm::Nev => parse_nev(spec, &delims, end),
                NevraForm::Na => parse_na(spec, &delims, end),
                NevraForm::Name => {
                    if delims.colon.is_some() || spec.is_empty() {
                        None
                    } else {
                        Some(Nevra {
                            name: spec.to_string(),
                            ..Default::default()
                        })
                    }
                }
            };
            if let Some(nevra) = parsed {
                result.push(nevra);
            }
        }

        Ok(result)
    }

    /// Only the name was given
    pub fn has_just_name(&self) -> bool {
        !self.name.is_empty()
            && self.epoch.is_empty()
            && self.version.is_empty()
            && self.release.is_empty()
            && self.arch.is_empty()
    }
}

impl fmt::Display for Nevra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.version.is_empty() {
            f.write_str("-")?;
            if !self.epoch.is_empty() {
                write!(f, "{}:", self.epoch)?;
            }
            write!(f, "{}", self.version)?;
            if !self.release.is_empty() {
                write!(f, "-{}", self.release)?;
            }
        }
        if !self.arch.is_empty() {
            write!(f, ".{}", self.arch)?;
        }
        Ok(())
    }
}

fn scan(spec: &str) -> Result<Delims> {
    let mut delims = Delims {
        before_last_dash: None,
        last_dash: None,
        colon: None,
        dot: None,
    };
    let mut in_range = false;

    for (i, c) in spec.char_indices() {
        if in_range {
            if c == ']' {
                in_range = false;
            }
            continue;
        }
        match c {
            '[' => in_range = true,
            '-' => {
                delims.before_last_dash = delims.last_dash;
                delims.last_dash = Some(i);
            }
            '.' => delims.dot = Some(i),
            ':' => {
                if delims.colon.is_some() {
                    return Err(Error::ParseError(format!(
                        "NEVRA string \"{}\" contains ':' multiple times",
                        spec
                    )));
                }
                delims.colon = Some(i);
            }
            '(' | '/' | '=' | '<' | '>' | ' ' => {
                return Err(Error::ParseError(format!(
                    "Invalid character '{}' in NEVRA string \"{}\"",
                    c, spec
                )));
            }
            _ => {}
        }
    }

    Ok(delims)
}

/// Split `spec[evr_start..version_end]` into epoch and version
///
/// `limit` is the position the epoch colon must stay at least two bytes
/// away from.
fn split_epoch(
    spec: &str,
    colon: Option<usize>,
    evr_start: usize,
    limit: usize,
) -> Option<(String, usize)> {
    match colon {
        Some(c) => {
            if c < evr_start + 1 || limit < c + 2 {
                return None;
            }
            Some((spec[evr_start..c].to_string(), c + 1))
        }
        None => Some((String::new(), evr_start)),
    }
}

fn parse_nevra(spec: &str, d: &Delims, end: usize) -> Option<Nevra> {
    let (evr_delim, release_delim, arch_delim) = (d.before_last_dash?, d.last_dash?, d.dot?);
    if evr_delim == 0 {
        return None;
    }
    let (epoch, version_start) = split_epoch(spec, d.colon, evr_delim + 1, release_delim)?;
    if release_delim < version_start + 1 {
        return None;
    }
    if arch_delim < release_delim + 2 {
        return None;
    }
    if end < arch_delim + 2 {
        return None;
    }
    Some(Nevra {
        name: spec[..evr_delim].to_string(),
        epoch,
        version: spec[version_start..release_delim].to_string(),
        release: spec[release_delim + 1..arch_delim].to_string(),
        arch: spec[arch_delim + 1..].to_string(),
    })
}

fn parse_nevr(spec: &str, d: &Delims, end: usize) -> Option<Nevra> {
    let (evr_delim, release_delim) = (d.before_last_dash?, d.last_dash?);
    if evr_delim == 0 {
        return None;
    }
    let (epoch, version_start) = split_epoch(spec, d.colon, evr_delim + 1, release_delim)?;
    if release_delim < version_start + 1 {
        return None;
    }
    if end < release_delim + 2 {
        return None;
    }
    Some(Nevra {
        name: spec[..evr_delim].to_string(),
        epoch,
        version: spec[version_start..release_delim].to_string(),
        release: spec[release_delim + 1..].to_string(),
        ..Default::default()
    })
}

fn parse_nev(spec: &str, d: &Delims, end: usize) -> Option<Nevra> {
    let evr_delim = d.last_dash?;
    if d.before_last_dash == Some(0) || evr_delim == 0 {
        return None;
    }
    let (epoch, version_start) = split_epoch(spec, d.colon, evr_delim + 1, end)?;
    if end < version_start + 1 {
        return None;
    }
    Some(Nevra {
        name: spec[..evr_delim].to_string(),
        epoch,
        version: spec[version_start..].to_string(),
        ..Default::default()
    })
}

fn parse_na(spec: &str, d: &Delims, end: usize) -> Option<Nevra> {
    let arch_delim = d.dot?;
    if d.colon.is_some() || arch_delim == 0 {
        return None;
    }
    if d.last_dash.is_some_and(|dash| dash > arch_delim) {
        return None;
    }
    if end == arch_delim + 1 {
        return None;
    }
    Some(Nevra {
        name: spec[..arch_delim].to_string(),
        arch: spec[arch_delim + 1..].to_string(),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_nevra() {
        let forms = Nevra::parse("foo-1:2.0-3.fc40.x86_64", &[NevraForm::Nevra]).unwrap();
        assert_eq!(forms.len(), 1);
        let nevra = &forms[0];
        assert_eq!(nevra.name, "foo");
        assert_eq!(nevra.epoch, "1");
        assert_eq!(nevra.version, "2.0");
        assert_eq!(nevra.release, "3.fc40");
        assert_eq!(nevra.arch, "x86_64");
    }

    #[test]
    fn test_parse_dashed_name() {
        let forms = Nevra::parse("python3-foo-1.0-1.noarch", &[NevraForm::Nevra]).unwrap();
        assert_eq!(forms[0].name, "python3-foo");
        assert_eq!(forms[0].version, "1.0");
        assert_eq!(forms[0].release, "1");
        assert_eq!(forms[0].arch, "noarch");
    }

    #[test]
    fn test_parse_all_forms_in_order() {
        let forms = Nevra::parse("one-2-1", DEFAULT_NEVRA_FORMS).unwrap();
        // NEVR, NEV and NAME fit; NEVRA and NA need an arch
        assert_eq!(forms.len(), 3);
        assert_eq!(forms[0].name, "one");
        assert_eq!(forms[0].version, "2");
        assert_eq!(forms[0].release, "1");
        assert_eq!(forms[1].name, "one-2");
        assert_eq!(forms[1].version, "1");
        assert!(forms[2].has_just_name());
        assert_eq!(forms[2].name, "one-2-1");
    }

    #[test]
    fn test_parse_name_arch() {
        let forms = Nevra::parse("one.x86_64", DEFAULT_NEVRA_FORMS).unwrap();
        assert_eq!(forms[0].name, "one");
        assert_eq!(forms[0].arch, "x86_64");
        assert_eq!(forms[1].name, "one.x86_64");
    }

    #[test]
    fn test_na_rejects_dash_in_arch() {
        let forms = Nevra::parse("one.x86-64", &[NevraForm::Na]).unwrap();
        assert!(forms.is_empty());
    }

    #[test]
    fn test_glob_range_is_not_a_delimiter() {
        let forms = Nevra::parse("foo[.-]bar", &[NevraForm::Name, NevraForm::Na]).unwrap();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].name, "foo[.-]bar");
    }

    #[test]
    fn test_invalid_characters() {
        assert!(Nevra::parse("foo>=1.0", DEFAULT_NEVRA_FORMS).is_err());
        assert!(Nevra::parse("/usr/bin/foo", DEFAULT_NEVRA_FORMS).is_err());
        assert!(Nevra::parse("foo-1:2:3", DEFAULT_NEVRA_FORMS).is_err());
    }

    #[test]
    fn test_display_roundtrip_shape() {
        let forms = Nevra::parse("foo-1:2.0-3.x86_64", &[NevraForm::Nevra]).unwrap();
        assert_eq!(forms[0].to_string(), "foo-1:2.0-3.x86_64");
    }
}
