// src/query/mod.rs

//! Package queries
//!
//! A `PackageQuery` is a set of package ids over one sack snapshot. Filters
//! narrow the set in place and chain as a logical AND; `update`,
//! `intersection` and `difference` combine two queries drawn from the same
//! sack. Iteration is always in ascending id order.
//!
//! # Example
//!
//! ```ignore
//! let mut query = PackageQuery::new(&sack);
//! query.filter_name(&["one"], CmpMode::Eq)?;
//! query.filter_available();
//! query.filter_latest_evr(1);
//! for pkg in &query {
//!     println!("{}", pkg.nevra());
//! }
//! ```

mod matcher;
mod resolve;

pub use matcher::{is_glob_pattern, CmpMode};
pub use resolve::ResolveSpecSettings;

use crate::error::{Error, Result};
use crate::package::{Package, PackageId, Reldep};
use crate::sack::{PackageSack, SackSnapshot};
use crate::version::{rpmvercmp, Evr, Nevra};
use matcher::StringMatcher;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// A set of packages from one sack snapshot
#[derive(Debug, Clone)]
pub struct PackageQuery {
    snapshot: Arc<SackSnapshot>,
    ids: BTreeSet<PackageId>,
}

impl PackageQuery {
    /// All packages in the sack except excluded ones
    pub fn new(sack: &PackageSack) -> Self {
        Self::from_snapshot(sack.snapshot(), true)
    }

    /// All packages in the sack, excluded ones included
    pub fn new_with_excluded(sack: &PackageSack) -> Self {
        Self::from_snapshot(sack.snapshot(), false)
    }

    pub fn from_snapshot(snapshot: Arc<SackSnapshot>, apply_excludes: bool) -> Self {
        let ids = snapshot
            .all_ids()
            .filter(|id| !apply_excludes || !snapshot.is_excluded(*id))
            .collect();
        Self { snapshot, ids }
    }

    /// An empty query over the same snapshot
    pub fn empty_like(&self) -> Self {
        Self {
            snapshot: Arc::clone(&self.snapshot),
            ids: BTreeSet::new(),
        }
    }

    pub fn snapshot(&self) -> &Arc<SackSnapshot> {
        &self.snapshot
    }

    pub fn size(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: PackageId) -> bool {
        self.ids.contains(&id)
    }

    pub fn add(&mut self, id: PackageId) {
        if id.index() < self.snapshot.len() {
            self.ids.insert(id);
        }
    }

    pub fn remove(&mut self, id: PackageId) {
        self.ids.remove(&id);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn ids(&self) -> Vec<PackageId> {
        self.ids.iter().copied().collect()
    }

    pub fn package(&self, id: PackageId) -> &Arc<Package> {
        self.snapshot.package(id)
    }

    /// Iterate the packages in id order
    ///
    /// The iterator keeps the snapshot alive on its own, so it stays valid
    /// after the query (or the sack) is dropped or reloaded.
    pub fn iter(&self) -> PackageIter {
        PackageIter {
            snapshot: Arc::clone(&self.snapshot),
            ids: self.ids(),
            pos: 0,
        }
    }

    // Set algebra

    fn adopt(&mut self, other: &PackageQuery) -> Result<()> {
        if self.snapshot.sack_id() != other.snapshot.sack_id() {
            return Err(Error::QueryError(
                "Cannot combine queries from different package sacks".to_string(),
            ));
        }
        // ids are never reused, so the newer snapshot covers both sets
        if other.snapshot.generation() > self.snapshot.generation() {
            self.snapshot = Arc::clone(&other.snapshot);
        }
        Ok(())
    }

    /// Union: add every package of `other`
    pub fn update(&mut self, other: &PackageQuery) -> Result<()> {
        self.adopt(other)?;
        self.ids.extend(other.ids.iter().copied());
        Ok(())
    }

    /// Keep only packages also in `other`
    pub fn intersection(&mut self, other: &PackageQuery) -> Result<()> {
        self.adopt(other)?;
        self.ids.retain(|id| other.ids.contains(id));
        Ok(())
    }

    /// Drop packages that are in `other`
    pub fn difference(&mut self, other: &PackageQuery) -> Result<()> {
        self.adopt(other)?;
        self.ids.retain(|id| !other.ids.contains(id));
        Ok(())
    }

    fn retain(&mut self, mut pred: impl FnMut(&Package) -> bool) {
        let snapshot = &self.snapshot;
        self.ids.retain(|id| pred(snapshot.package(*id)));
    }

    fn filter_text<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
        cmp: CmpMode,
        field: impl Fn(&Package) -> &str,
        order: fn(&str, &str) -> std::cmp::Ordering,
    ) -> Result<()> {
        if cmp.is_ordering() {
            self.retain(|pkg| {
                patterns
                    .iter()
                    .any(|p| cmp.accepts(order(field(pkg), p.as_ref())))
            });
        } else {
            let matcher = StringMatcher::new(patterns, cmp)?;
            self.retain(|pkg| matcher.matches(field(pkg)));
        }
        Ok(())
    }

    // Attribute filters

    pub fn filter_name<S: AsRef<str>>(&mut self, patterns: &[S], cmp: CmpMode) -> Result<()> {
        self.filter_text(patterns, cmp, |p| &p.name, |a, b| a.cmp(b))
    }

    pub fn filter_epoch(&mut self, epochs: &[u32], cmp: CmpMode) {
        self.retain(|pkg| epochs.iter().any(|e| cmp.accepts(pkg.evr.epoch.cmp(e))));
    }

    pub fn filter_version<S: AsRef<str>>(&mut self, patterns: &[S], cmp: CmpMode) -> Result<()> {
        self.filter_text(patterns, cmp, |p| p.version(), rpmvercmp)
    }

    pub fn filter_release<S: AsRef<str>>(&mut self, patterns: &[S], cmp: CmpMode) -> Result<()> {
        self.filter_text(patterns, cmp, |p| p.release(), rpmvercmp)
    }

    pub fn filter_arch<S: AsRef<str>>(&mut self, patterns: &[S], cmp: CmpMode) -> Result<()> {
        self.filter_text(patterns, cmp, |p| &p.arch, |a, b| a.cmp(b))
    }

    pub fn filter_repo_id<S: AsRef<str>>(&mut self, patterns: &[S], cmp: CmpMode) -> Result<()> {
        self.filter_text(patterns, cmp, |p| &p.repo_id, |a, b| a.cmp(b))
    }

    pub fn filter_location<S: AsRef<str>>(&mut self, patterns: &[S], cmp: CmpMode) -> Result<()> {
        self.filter_text(patterns, cmp, |p| p.location.as_deref().unwrap_or(""), |a, b| a.cmp(b))
    }

    /// Filter by `[epoch:]version-release`
    ///
    /// Ordering modes compare with rpm EVR rules; other modes compare the
    /// EVR string (epoch omitted when zero).
    pub fn filter_evr<S: AsRef<str>>(&mut self, patterns: &[S], cmp: CmpMode) -> Result<()> {
        if cmp.is_ordering() || cmp == CmpMode::Eq || cmp == CmpMode::Neq {
            let evrs = patterns
                .iter()
                .map(|p| Evr::parse(p.as_ref()))
                .collect::<Result<Vec<_>>>()?;
            if cmp == CmpMode::Neq {
                self.retain(|pkg| evrs.iter().all(|e| pkg.evr.compare(e).is_ne()));
            } else {
                self.retain(|pkg| evrs.iter().any(|e| cmp.accepts(pkg.evr.compare(e))));
            }
            return Ok(());
        }
        let matcher = StringMatcher::new(patterns, cmp)?;
        self.retain(|pkg| matcher.matches(&pkg.evr_string()));
        Ok(())
    }

    /// Filter by NEVRA string; both the short and the full form are tried
    pub fn filter_nevra<S: AsRef<str>>(&mut self, patterns: &[S], cmp: CmpMode) -> Result<()> {
        let matcher = StringMatcher::new(patterns, cmp)?;
        if cmp == CmpMode::Neq || cmp == CmpMode::NotGlob {
            self.retain(|pkg| matcher.matches(&pkg.nevra()) && matcher.matches(&pkg.full_nevra()));
        } else {
            self.retain(|pkg| matcher.matches(&pkg.nevra()) || matcher.matches(&pkg.full_nevra()));
        }
        Ok(())
    }

    /// Filter by the present parts of a parsed NEVRA
    pub fn filter_nevra_parts(&mut self, nevra: &Nevra, cmp: CmpMode) -> Result<()> {
        self.filter_name(&[&nevra.name], cmp)?;
        if !nevra.epoch.is_empty() {
            let matcher = StringMatcher::new(&[&nevra.epoch], cmp)?;
            self.retain(|pkg| matcher.matches(&pkg.evr.epoch.to_string()));
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

    /// Keep packages whose `name.arch` occurs in `other`
    pub fn filter_name_arch(&mut self, other: &PackageQuery) {
        let keys: HashSet<(String, String)> = other
            .iter()
            .map(|p| (p.name.clone(), p.arch.clone()))
            .collect();
        self.retain(|pkg| keys.contains(&(pkg.name.clone(), pkg.arch.clone())));
    }

    /// Keep packages whose name occurs in `other`
    pub fn filter_name_of(&mut self, other: &PackageQuery) {
        let names: HashSet<String> = other.iter().map(|p| p.name.clone()).collect();
        self.retain(|pkg| names.contains(&pkg.name));
    }

    /// Keep packages whose NEVRA occurs in `other`
    pub fn filter_nevra_of(&mut self, other: &PackageQuery) {
        let nevras: HashSet<String> = other.iter().map(|p| p.nevra()).collect();
        self.retain(|pkg| nevras.contains(&pkg.nevra()));
    }

    // Dependency filters

    /// Keep packages providing any of `deps`
    pub fn filter_provides(&mut self, deps: &[Reldep]) {
        self.retain(|pkg| deps.iter().any(|d| pkg.provides_dep(d)));
    }

    /// Keep packages with a provide name matching the patterns
    pub fn filter_provides_name<S: AsRef<str>>(&mut self, patterns: &[S], cmp: CmpMode) -> Result<()> {
        let matcher = StringMatcher::new(patterns, cmp)?;
        self.retain(|pkg| pkg.provides.iter().any(|p| matcher.matches(&p.name)));
        Ok(())
    }

    /// Keep packages with a requirement whose name matches the patterns
    pub fn filter_requires<S: AsRef<str>>(&mut self, patterns: &[S], cmp: CmpMode) -> Result<()> {
        let matcher = StringMatcher::new(patterns, cmp)?;
        self.retain(|pkg| pkg.requires.iter().any(|r| matcher.matches(&r.name)));
        Ok(())
    }

    /// Keep packages with a conflict whose name matches the patterns
    pub fn filter_conflicts<S: AsRef<str>>(&mut self, patterns: &[S], cmp: CmpMode) -> Result<()> {
        let matcher = StringMatcher::new(patterns, cmp)?;
        self.retain(|pkg| pkg.conflicts.iter().any(|r| matcher.matches(&r.name)));
        Ok(())
    }

    /// Keep packages that obsolete at least one package of `other`
    pub fn filter_obsoletes(&mut self, other: &PackageQuery) {
        let targets: Vec<Arc<Package>> = other.iter().collect();
        self.retain(|pkg| targets.iter().any(|t| pkg.obsoletes_package(t)));
    }

    pub fn filter_file<S: AsRef<str>>(&mut self, patterns: &[S], cmp: CmpMode) -> Result<()> {
        let matcher = StringMatcher::new(patterns, cmp)?;
        self.retain(|pkg| pkg.files.iter().any(|f| matcher.matches(f)));
        Ok(())
    }

    // Scope filters

    pub fn filter_installed(&mut self) {
        self.retain(|pkg| pkg.is_installed());
    }

    pub fn filter_available(&mut self) {
        self.retain(|pkg| !pkg.is_installed());
    }

    /// Drop (or keep only) source packages
    pub fn filter_source(&mut self, source: bool) {
        self.retain(|pkg| pkg.is_source() == source);
    }

    /// Keep only excluded packages, or drop them
    ///
    /// Only meaningful on a query built with `new_with_excluded`.
    pub fn filter_excluded(&mut self, excluded: bool) {
        let snapshot = Arc::clone(&self.snapshot);
        self.ids.retain(|id| snapshot.is_excluded(*id) == excluded);
    }

    /// Keep packages whose arch runs on `system_arch`
    pub fn filter_arch_compatible(&mut self, system_arch: &str) {
        self.retain(|pkg| {
            crate::repository::selector::PackageSelector::is_architecture_compatible(
                &pkg.arch,
                system_arch,
            )
        });
    }

    /// Installed packages keyed by name, from the whole snapshot
    fn installed_by_name(&self) -> HashMap<String, Vec<Arc<Package>>> {
        let mut map: HashMap<String, Vec<Arc<Package>>> = HashMap::new();
        for pkg in self.snapshot.packages().iter().filter(|p| p.is_installed()) {
            map.entry(pkg.name.clone()).or_default().push(Arc::clone(pkg));
        }
        map
    }

    /// Available (non-excluded) packages keyed by name, from the whole snapshot
    fn available_by_name(&self) -> HashMap<String, Vec<Arc<Package>>> {
        let mut map: HashMap<String, Vec<Arc<Package>>> = HashMap::new();
        for pkg in self.snapshot.packages() {
            if !pkg.is_installed() && !pkg.is_source() && !self.snapshot.is_excluded(pkg.id) {
                map.entry(pkg.name.clone()).or_default().push(Arc::clone(pkg));
            }
        }
        map
    }

    /// Keep available packages newer than an installed package of the same
    /// name and compatible arch
    pub fn filter_upgrades(&mut self) {
        let installed = self.installed_by_name();
        self.retain(|pkg| {
            !pkg.is_installed()
                && installed.get(&pkg.name).is_some_and(|list| {
                    list.iter()
                        .any(|i| same_arch_family(&i.arch, &pkg.arch) && pkg.evr > i.evr)
                })
        });
    }

    /// Keep available packages older than an installed package of the same
    /// name and arch
    pub fn filter_downgrades(&mut self) {
        let installed = self.installed_by_name();
        self.retain(|pkg| {
            !pkg.is_installed()
                && installed.get(&pkg.name).is_some_and(|list| {
                    list.iter().any(|i| i.arch == pkg.arch && pkg.evr < i.evr)
                })
        });
    }

    /// Keep installed packages that have an upgrade available
    pub fn filter_upgradable(&mut self) {
        let available = self.available_by_name();
        self.retain(|pkg| {
            pkg.is_installed()
                && available.get(&pkg.name).is_some_and(|list| {
                    list.iter()
                        .any(|a| same_arch_family(&a.arch, &pkg.arch) && a.evr > pkg.evr)
                })
        });
    }

    /// Keep installed packages that have a downgrade available
    pub fn filter_downgradable(&mut self) {
        let available = self.available_by_name();
        self.retain(|pkg| {
            pkg.is_installed()
                && available.get(&pkg.name).is_some_and(|list| {
                    list.iter().any(|a| a.arch == pkg.arch && a.evr < pkg.evr)
                })
        });
    }

    /// Group ids by `name.arch`, each group sorted by EVR descending
    fn evr_groups(&self) -> BTreeMap<(String, String), Vec<PackageId>> {
        let mut groups: BTreeMap<(String, String), Vec<PackageId>> = BTreeMap::new();
        for id in &self.ids {
            let pkg = self.snapshot.package(*id);
            groups
                .entry((pkg.name.clone(), pkg.arch.clone()))
                .or_default()
                .push(*id);
        }
        for ids in groups.values_mut() {
            ids.sort_by(|a, b| {
                self.snapshot
                    .package(*b)
                    .evr
                    .cmp(&self.snapshot.package(*a).evr)
            });
        }
        groups
    }

    fn filter_by_evr_rank(&mut self, limit: i32, latest: bool) {
        let mut keep = BTreeSet::new();
        for ids in self.evr_groups().into_values() {
            let mut distinct: Vec<Evr> = Vec::new();
            for id in &ids {
                let evr = &self.snapshot.package(*id).evr;
                if distinct.last() != Some(evr) {
                    distinct.push(evr.clone());
                }
            }
            if !latest {
                distinct.reverse();
            }
            let n = limit.unsigned_abs() as usize;
            let selected: Vec<&Evr> = if limit > 0 {
                distinct.iter().take(n).collect()
            } else {
                distinct.iter().skip(n).collect()
            };
            for id in ids {
                if selected.contains(&&self.snapshot.package(id).evr) {
                    keep.insert(id);
                }
            }
        }
        self.ids = keep;
    }

    /// Keep the `limit` highest EVRs of each `name.arch`; a negative limit
    /// drops them instead
    pub fn filter_latest_evr(&mut self, limit: i32) {
        self.filter_by_evr_rank(limit, true);
    }

    /// Keep the `limit` lowest EVRs of each `name.arch`; a negative limit
    /// drops them instead
    pub fn filter_earliest_evr(&mut self, limit: i32) {
        self.filter_by_evr_rank(limit, false);
    }

    /// Keep, per `name.arch`, only available packages from the repositories
    /// with the best (lowest) priority; installed packages are kept
    pub fn filter_priority(&mut self) {
        let mut best: HashMap<(String, String), i32> = HashMap::new();
        for id in &self.ids {
            let pkg = self.snapshot.package(*id);
            if pkg.is_installed() {
                continue;
            }
            let priority = self.snapshot.repo_rank(*id).0;
            best.entry((pkg.name.clone(), pkg.arch.clone()))
                .and_modify(|p| *p = (*p).min(priority))
                .or_insert(priority);
        }
        let snapshot = Arc::clone(&self.snapshot);
        self.retain(|pkg| {
            pkg.is_installed()
                || best.get(&(pkg.name.clone(), pkg.arch.clone()))
                    == Some(&snapshot.repo_rank(pkg.id).0)
        });
    }
}

/// Upgrades may move between an arch and noarch
fn same_arch_family(a: &str, b: &str) -> bool {
    a == b || a == "noarch" || b == "noarch"
}

/// Iterator over a query's packages that owns its snapshot
pub struct PackageIter {
    snapshot: Arc<SackSnapshot>,
    ids: Vec<PackageId>,
    pos: usize,
}

impl Iterator for PackageIter {
    type Item = Arc<Package>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = *self.ids.get(self.pos)?;
        self.pos += 1;
        Some(Arc::clone(self.snapshot.package(id)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.ids.len() - self.pos;
        (left, Some(left))
    }
}

impl ExactSizeIterator for PackageIter {}

impl<'a> IntoIterator for &'a PackageQuery {
    type Item = Arc<Package>;
    type IntoIter = PackageIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for PackageQuery {
    type Item = Arc<Package>;
    type IntoIter = PackageIter;

    fn into_iter(self) -> Self::IntoIter {
        let ids = self.ids.into_iter().collect();
        PackageIter {
            snapshot: self.snapshot,
            ids,
            pos: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{PackageRecord, SYSTEM_REPO_ID};
    use crate::sack::{RepoSource, SackRepo};
    use std::collections::HashMap;

    fn rec(name: &str, evr: &str, arch: &str) -> PackageRecord {
        PackageRecord::new(name, evr, arch).unwrap()
    }

    fn sample_sack() -> PackageSack {
        let sack = PackageSack::new();
        sack.load_system_repo(
            RepoSource::Records(vec![rec("one", "1-1", "noarch")]),
            &HashMap::new(),
        )
        .unwrap();
        let mut three = rec("three", "1-1", "x86_64");
        three.provides = vec!["virtual-three = 1.0".to_string()];
        three.files = vec!["/usr/bin/three".to_string()];
        sack.load_repo(
            SackRepo::new("repo1"),
            RepoSource::Records(vec![
                rec("one", "1-1", "noarch"),
                rec("one", "2-1", "noarch"),
                rec("two", "2-1", "noarch"),
                three,
                rec("one", "2-1", "src"),
            ]),
        )
        .unwrap();
        sack
    }

    fn names(query: &PackageQuery) -> Vec<String> {
        query.iter().map(|p| format!("{}@{}", p.nevra(), p.repo_id)).collect()
    }

    #[test]
    fn test_filter_name_and_glob() {
        let sack = sample_sack();
        let mut q = PackageQuery::new(&sack);
        q.filter_name(&["t*"], CmpMode::Glob).unwrap();
        assert_eq!(q.size(), 2);

        let mut q = PackageQuery::new(&sack);
        q.filter_name(&["ONE"], CmpMode::IExact).unwrap();
        assert_eq!(q.size(), 4);
    }

    #[test]
    fn test_installed_available_split() {
        let sack = sample_sack();
        let mut installed = PackageQuery::new(&sack);
        installed.filter_installed();
        assert_eq!(names(&installed), vec![format!("one-1-1.noarch@{}", SYSTEM_REPO_ID)]);

        let mut available = PackageQuery::new(&sack);
        available.filter_available();
        assert_eq!(available.size(), 5);
    }

    #[test]
    fn test_version_ordering_filter() {
        let sack = sample_sack();
        let mut q = PackageQuery::new(&sack);
        q.filter_name(&["one"], CmpMode::Eq).unwrap();
        q.filter_evr(&["1-1"], CmpMode::Gt).unwrap();
        assert_eq!(q.size(), 2);
        q.filter_source(false);
        assert_eq!(names(&q), vec!["one-2-1.noarch@repo1".to_string()]);
    }

    #[test]
    fn test_upgrades_and_upgradable() {
        let sack = sample_sack();
        let mut upgrades = PackageQuery::new(&sack);
        upgrades.filter_upgrades();
        upgrades.filter_source(false);
        assert_eq!(names(&upgrades), vec!["one-2-1.noarch@repo1".to_string()]);

        let mut upgradable = PackageQuery::new(&sack);
        upgradable.filter_upgradable();
        assert_eq!(upgradable.size(), 1);

        let mut downgrades = PackageQuery::new(&sack);
        downgrades.filter_downgrades();
        assert!(downgrades.is_empty());
    }

    #[test]
    fn test_latest_evr() {
        let sack = sample_sack();
        let mut q = PackageQuery::new(&sack);
        q.filter_name(&["one"], CmpMode::Eq).unwrap();
        q.filter_arch(&["noarch"], CmpMode::Eq).unwrap();
        q.filter_latest_evr(1);
        assert_eq!(names(&q), vec!["one-2-1.noarch@repo1".to_string()]);

        let mut q = PackageQuery::new(&sack);
        q.filter_name(&["one"], CmpMode::Eq).unwrap();
        q.filter_arch(&["noarch"], CmpMode::Eq).unwrap();
        q.filter_latest_evr(-1);
        // both 1-1 copies (installed and repo1) remain
        assert_eq!(q.size(), 2);
    }

    #[test]
    fn test_provides_and_files() {
        let sack = sample_sack();
        let mut q = PackageQuery::new(&sack);
        q.filter_provides(&[Reldep::parse("virtual-three >= 0.5").unwrap()]);
        assert_eq!(q.size(), 1);

        let mut q = PackageQuery::new(&sack);
        q.filter_file(&["/usr/bin/*"], CmpMode::Glob).unwrap();
        assert_eq!(names(&q), vec!["three-1-1.x86_64@repo1".to_string()]);
    }

    #[test]
    fn test_union_difference_restores_disjoint_set() {
        let sack = sample_sack();
        let mut a = PackageQuery::new(&sack);
        a.filter_name(&["one"], CmpMode::Eq).unwrap();
        let mut b = PackageQuery::new(&sack);
        b.filter_name(&["two", "three"], CmpMode::Eq).unwrap();

        let original = a.ids();
        a.update(&b).unwrap();
        assert_eq!(a.size(), original.len() + b.size());
        a.difference(&b).unwrap();
        assert_eq!(a.ids(), original);
    }

    #[test]
    fn test_intersection() {
        let sack = sample_sack();
        let mut a = PackageQuery::new(&sack);
        a.filter_name(&["one"], CmpMode::Eq).unwrap();
        let mut b = PackageQuery::new(&sack);
        b.filter_installed();
        a.intersection(&b).unwrap();
        assert_eq!(a.size(), 1);
    }

    #[test]
    fn test_combining_different_sacks_fails() {
        let a = PackageQuery::new(&sample_sack());
        let b = PackageQuery::new(&sample_sack());
        let mut c = a.clone();
        assert!(matches!(c.update(&b), Err(Error::QueryError(_))));
    }

    #[test]
    fn test_iterator_outlives_query_and_reload() {
        let sack = sample_sack();
        let iter = {
            let mut q = PackageQuery::new(&sack);
            q.filter_installed();
            q.iter()
        };
        sack.load_repo(
            SackRepo::new("repo2"),
            RepoSource::Records(vec![rec("four", "1-1", "noarch")]),
        )
        .unwrap();

        let nevras: Vec<String> = iter.map(|p| p.nevra()).collect();
        assert_eq!(nevras, vec!["one-1-1.noarch".to_string()]);
    }

    #[test]
    fn test_priority_filter() {
        let sack = PackageSack::new();
        sack.load_repo(
            SackRepo::new("low"),
            RepoSource::Records(vec![rec("one", "3-1", "noarch")]),
        )
        .unwrap();
        sack.load_repo(
            SackRepo::new("high").with_priority(10),
            RepoSource::Records(vec![rec("one", "2-1", "noarch")]),
        )
        .unwrap();
        let mut q = PackageQuery::new(&sack);
        q.filter_priority();
        assert_eq!(names(&q), vec!["one-2-1.noarch@high".to_string()]);
    }
}
