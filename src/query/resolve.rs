// src/query/resolve.rs

//! Turning a user-supplied package spec into a package set
//!
//! A spec is tried, in order, as a NEVRA in each configured form, as a
//! provide, as a file path and as a binary name. The first stage that
//! matches anything wins.

use super::{is_glob_pattern, CmpMode, PackageQuery};
use crate::package::Reldep;
use crate::version::{Nevra, NevraForm, DEFAULT_NEVRA_FORMS};
use tracing::trace;

const BINARY_DIRS: [&str; 2] = ["/usr/bin/", "/usr/sbin/"];

/// Which interpretations of a spec are attempted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveSpecSettings {
    pub with_nevra: bool,
    pub with_provides: bool,
    pub with_filenames: bool,
    pub with_binaries: bool,
    pub ignore_case: bool,
    pub expand_globs: bool,
    /// NEVRA forms to try; empty means the default order
    pub nevra_forms: Vec<NevraForm>,
}

impl Default for ResolveSpecSettings {
    fn default() -> Self {
        Self {
            with_nevra: true,
            with_provides: true,
            with_filenames: true,
            with_binaries: true,
            ignore_case: false,
            expand_globs: true,
            nevra_forms: Vec::new(),
        }
    }
}

impl ResolveSpecSettings {
    fn forms(&self) -> &[NevraForm] {
        if self.nevra_forms.is_empty() {
            DEFAULT_NEVRA_FORMS
        } else {
            &self.nevra_forms
        }
    }
}

/// Does the spec look like a path
fn is_file_pattern(spec: &str) -> bool {
    spec.starts_with('/') || spec.starts_with("*/")
}

impl PackageQuery {
    /// Narrow the query to the packages `spec` refers to
    ///
    /// Returns whether anything matched, plus the NEVRA that matched when the
    /// NEVRA stage won. When nothing matches the query is cleared.
    pub fn resolve_pkg_spec(
        &mut self,
        spec: &str,
        settings: &ResolveSpecSettings,
        with_src: bool,
    ) -> (bool, Option<Nevra>) {
        if !with_src {
            self.filter_source(false);
        }

        let glob = settings.expand_globs && is_glob_pattern(spec);
        let cmp = if glob { CmpMode::Glob } else { CmpMode::Eq };
        let name_cmp = if settings.ignore_case { cmp.with_icase() } else { cmp };

        if settings.with_nevra {
            // a spec that does not parse in any form skips this stage
            if let Ok(nevras) = Nevra::parse(spec, settings.forms()) {
                for nevra in nevras {
                    let mut candidate = self.clone();
                    if candidate.filter_nevra_spec(&nevra, cmp, name_cmp).is_ok()
                        && !candidate.is_empty()
                    {
                        trace!("Spec '{}' matched as NEVRA {}", spec, nevra);
                        *self = candidate;
                        return (true, Some(nevra));
                    }
                }
                if settings.nevra_forms.is_empty() && glob {
                    let mut candidate = self.clone();
                    if candidate.filter_nevra(&[spec], name_cmp).is_ok() && !candidate.is_empty() {
                        *self = candidate;
                        return (true, None);
                    }
                }
            }
        }

        if settings.with_provides && self.narrow_by_provide(spec, glob) {
            trace!("Spec '{}' matched as a provide", spec);
            return (true, None);
        }

        let file_pattern = is_file_pattern(spec);
        if settings.with_filenames && file_pattern {
            let mut candidate = self.clone();
            if candidate.filter_file(&[spec], cmp).is_ok() && !candidate.is_empty() {
                trace!("Spec '{}' matched as a file", spec);
                *self = candidate;
                return (true, None);
            }
        }

        if settings.with_binaries && !file_pattern {
            let paths: Vec<String> = BINARY_DIRS.iter().map(|d| format!("{d}{spec}")).collect();
            for path in &paths {
                if self.narrow_by_provide(path, glob) {
                    return (true, None);
                }
            }
            for path in &paths {
                let mut candidate = self.clone();
                if candidate.filter_file(&[path], cmp).is_ok() && !candidate.is_empty() {
                    trace!("Spec '{}' matched as binary {}", spec, path);
                    *self = candidate;
                    return (true, None);
                }
            }
        }

        self.clear();
        (false, None)
    }

    /// Apply the parts of a parsed NEVRA; `name_cmp` covers the name only
    fn filter_nevra_spec(
        &mut self,
        nevra: &Nevra,
        cmp: CmpMode,
        name_cmp: CmpMode,
    ) -> crate::Result<()> {
        self.filter_name(&[&nevra.name], name_cmp)?;
        if !nevra.epoch.is_empty() {
            let epoch = super::StringMatcher::new(&[&nevra.epoch], cmp)?;
            self.retain(|pkg| epoch.matches(&pkg.evr.epoch.to_string()));
        }
        if !nevra.version.is_empty() {
            self.filter_version(&[&nevra.version], cmp)?;
        }
        if !nevra.release.is_empty() {
            self.filter_release(&[&nevra.release], cmp)?;
        }
        if !nevra.arch.is_empty() {
            self.filter_arch(&[&nevra.arch], cmp)?;
        }
        Ok(())
    }

    /// Narrow to packages providing `spec`, if any do
    fn narrow_by_provide(&mut self, spec: &str, glob: bool) -> bool {
        let mut candidate = self.clone();
        if glob && !spec.contains(char::is_whitespace) {
            if candidate.filter_provides_name(&[spec], CmpMode::Glob).is_err() {
                return false;
            }
        } else {
            match Reldep::parse(spec) {
                Ok(dep) => candidate.filter_provides(&[dep]),
                Err(_) => return false,
            }
        }
        if candidate.is_empty() {
            return false;
        }
        *self = candidate;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageRecord;
    use crate::sack::{PackageSack, RepoSource, SackRepo};

    fn rec(name: &str, evr: &str, arch: &str) -> PackageRecord {
        PackageRecord::new(name, evr, arch).unwrap()
    }

    fn sack() -> PackageSack {
        let sack = PackageSack::new();
        let mut tool = rec("tool", "1.0-1", "x86_64");
        tool.files = vec!["/usr/bin/dotool".to_string(), "/etc/tool.conf".to_string()];
        let mut virt = rec("impl", "1-1", "noarch");
        virt.provides = vec!["webserver = 2".to_string()];
        sack.load_repo(
            SackRepo::new("repo1"),
            RepoSource::Records(vec![
                rec("one", "1-1", "noarch"),
                rec("one", "2-1", "noarch"),
                rec("one", "2-1", "src"),
                rec("one-extra", "1-1", "noarch"),
                rec("CamelPkg", "1-1", "noarch"),
                tool,
                virt,
            ]),
        )
        .unwrap();
        sack
    }

    fn resolve(spec: &str, settings: &ResolveSpecSettings) -> (bool, Vec<String>) {
        let sack = sack();
        let mut query = PackageQuery::new(&sack);
        let (found, _) = query.resolve_pkg_spec(spec, settings, false);
        (found, query.iter().map(|p| p.nevra()).collect())
    }

    #[test]
    fn test_name_excludes_source_packages() {
        let (found, nevras) = resolve("one", &ResolveSpecSettings::default());
        assert!(found);
        assert_eq!(nevras, vec!["one-1-1.noarch", "one-2-1.noarch"]);
    }

    #[test]
    fn test_full_nevra_and_name_arch() {
        let settings = ResolveSpecSettings::default();
        assert_eq!(resolve("one-2-1.noarch", &settings).1, vec!["one-2-1.noarch"]);
        assert_eq!(resolve("one-0:1-1.noarch", &settings).1, vec!["one-1-1.noarch"]);
        assert_eq!(resolve("one.noarch", &settings).1.len(), 2);
        assert_eq!(resolve("one-2", &settings).1, vec!["one-2-1.noarch"]);
    }

    #[test]
    fn test_dashed_name_falls_back_to_name_form() {
        let settings = ResolveSpecSettings::default();
        assert_eq!(resolve("one-extra", &settings).1, vec!["one-extra-1-1.noarch"]);
    }

    #[test]
    fn test_glob_spec() {
        let (found, nevras) = resolve("one*", &ResolveSpecSettings::default());
        assert!(found);
        assert_eq!(nevras.len(), 3);
    }

    #[test]
    fn test_ignore_case() {
        let settings = ResolveSpecSettings::default();
        assert!(!resolve("camelpkg", &settings).0);

        let settings = ResolveSpecSettings {
            ignore_case: true,
            ..Default::default()
        };
        assert_eq!(resolve("camelpkg", &settings).1, vec!["CamelPkg-1-1.noarch"]);
    }

    #[test]
    fn test_provides_files_and_binaries() {
        let settings = ResolveSpecSettings::default();
        assert_eq!(resolve("webserver >= 1", &settings).1, vec!["impl-1-1.noarch"]);
        assert_eq!(resolve("/etc/tool.conf", &settings).1, vec!["tool-1.0-1.x86_64"]);
        assert_eq!(resolve("dotool", &settings).1, vec!["tool-1.0-1.x86_64"]);

        let no_binaries = ResolveSpecSettings {
            with_binaries: false,
            ..Default::default()
        };
        assert!(!resolve("dotool", &no_binaries).0);
    }

    #[test]
    fn test_no_match_clears_query() {
        let (found, nevras) = resolve("no_one", &ResolveSpecSettings::default());
        assert!(!found);
        assert!(nevras.is_empty());
    }
}
