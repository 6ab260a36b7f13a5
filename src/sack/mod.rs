// src/sack/mod.rs

//! Package sack: the in-memory union of all loaded repositories
//!
//! A sack publishes immutable snapshots. Loading a repository builds a new
//! snapshot off to the side and swaps it in under a write lock, so readers
//! (queries, goals, iterators) see either the old or the new package set,
//! never a partially loaded one. Package ids grow monotonically and are never
//! reused for the lifetime of the sack.

use crate::error::{Error, Result};
use crate::package::{Package, PackageId, PackageRecord, Reason, SYSTEM_REPO_ID};
use crate::repository::metadata::read_metadata;
use glob::Pattern;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

static NEXT_SACK_ID: AtomicU64 = AtomicU64::new(1);

/// Default repository priority (lower number wins)
pub const DEFAULT_PRIORITY: i32 = 99;

/// Where a repository's packages come from
#[derive(Debug, Clone)]
pub enum RepoSource {
    /// Records already in memory
    Records(Vec<PackageRecord>),
    /// A `packages.json` metadata file
    MetadataFile(PathBuf),
}

impl RepoSource {
    fn into_records(self, repo_id: &str) -> Result<Vec<PackageRecord>> {
        match self {
            RepoSource::Records(records) => Ok(records),
            RepoSource::MetadataFile(path) => read_metadata(&path).map_err(|e| {
                Error::repo_with_source(
                    repo_id,
                    format!("cannot read metadata {}", path.display()),
                    e,
                )
            }),
        }
    }
}

/// A repository as seen by the sack
#[derive(Debug, Clone, PartialEq)]
pub struct SackRepo {
    pub id: String,
    pub priority: i32,
    pub cost: i32,
    /// Position in load order, used as the final tie-break
    pub load_order: usize,
    /// Glob patterns of package names hidden from candidate selection
    pub excludepkgs: Vec<String>,
}

impl SackRepo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            priority: DEFAULT_PRIORITY,
            cost: 1000,
            load_order: 0,
            excludepkgs: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_excludes(mut self, excludes: Vec<String>) -> Self {
        self.excludepkgs = excludes;
        self
    }

    pub fn is_system(&self) -> bool {
        self.id == SYSTEM_REPO_ID
    }
}

/// One immutable state of the sack
#[derive(Debug)]
pub struct SackSnapshot {
    sack_id: u64,
    generation: u64,
    packages: Vec<Arc<Package>>,
    repos: Vec<Arc<SackRepo>>,
    excluded: BTreeSet<PackageId>,
}

impl SackSnapshot {
    pub fn sack_id(&self) -> u64 {
        self.sack_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn package(&self, id: PackageId) -> &Arc<Package> {
        &self.packages[id.index()]
    }

    pub fn packages(&self) -> &[Arc<Package>] {
        &self.packages
    }

    pub fn repo(&self, repo_id: &str) -> Option<&Arc<SackRepo>> {
        self.repos.iter().find(|r| r.id == repo_id)
    }

    pub fn repos(&self) -> &[Arc<SackRepo>] {
        &self.repos
    }

    pub fn is_excluded(&self, id: PackageId) -> bool {
        self.excluded.contains(&id)
    }

    /// Priority and load order of the package's repository
    pub fn repo_rank(&self, id: PackageId) -> (i32, usize) {
        let pkg = self.package(id);
        self.repo(&pkg.repo_id)
            .map(|r| (r.priority, r.load_order))
            .unwrap_or((DEFAULT_PRIORITY, usize::MAX))
    }

    pub fn all_ids(&self) -> impl Iterator<Item = PackageId> + '_ {
        self.packages.iter().map(|p| p.id)
    }
}

/// The package index shared by queries and goals
#[derive(Debug)]
pub struct PackageSack {
    id: u64,
    current: RwLock<Arc<SackSnapshot>>,
    /// Global excludes from the main configuration
    excludepkgs: Vec<String>,
}

impl PackageSack {
    pub fn new() -> Self {
        Self::with_excludes(Vec::new())
    }

    /// Create a sack that hides packages matching `excludepkgs` in every
    /// repository other than `@System`
    pub fn with_excludes(excludepkgs: Vec<String>) -> Self {
        let id = NEXT_SACK_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            id,
            current: RwLock::new(Arc::new(SackSnapshot {
                sack_id: id,
                generation: 0,
                packages: Vec::new(),
                repos: Vec::new(),
                excluded: BTreeSet::new(),
            })),
            excludepkgs,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current snapshot; stays valid after later loads
    pub fn snapshot(&self) -> Arc<SackSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn has_repo(&self, repo_id: &str) -> bool {
        self.snapshot().repo(repo_id).is_some()
    }

    /// Load a repository's packages into the sack
    ///
    /// Fails with `RepoIdAlreadyExists` for a duplicate id and with
    /// `RepoError` for malformed metadata. On failure nothing is added.
    pub fn load_repo(&self, repo: SackRepo, source: RepoSource) -> Result<usize> {
        let records = source.into_records(&repo.id)?;
        self.publish(repo, records, &HashMap::new())
    }

    /// Load the installed package set as the `@System` repository
    ///
    /// `reasons` maps `name.arch` to the persisted install reason.
    pub fn load_system_repo(
        &self,
        source: RepoSource,
        reasons: &HashMap<String, Reason>,
    ) -> Result<usize> {
        let records = source.into_records(SYSTEM_REPO_ID)?;
        self.publish(SackRepo::new(SYSTEM_REPO_ID), records, reasons)
    }

    /// The `@System` repository, if loaded
    pub fn system_repo(&self) -> Option<Arc<SackRepo>> {
        self.snapshot().repo(SYSTEM_REPO_ID).cloned()
    }

    fn publish(
        &self,
        mut repo: SackRepo,
        records: Vec<PackageRecord>,
        reasons: &HashMap<String, Reason>,
    ) -> Result<usize> {
        let mut guard = self
            .current
            .write()
            .map_err(|_| Error::InitError("Package sack lock poisoned".to_string()))?;
        let old = Arc::clone(&guard);

        if old.repo(&repo.id).is_some() {
            return Err(Error::RepoIdAlreadyExists(repo.id));
        }

        let excludes = compile_excludes(&repo, &self.excludepkgs)?;
        let first_id = old.packages.len();
        let mut added = Vec::with_capacity(records.len());
        let mut seen = BTreeSet::new();

        for (offset, record) in records.iter().enumerate() {
            let raw_id = u32::try_from(first_id + offset).map_err(|_| {
                Error::repo(repo.id.clone(), "package id space exhausted".to_string())
            })?;
            let mut pkg = Package::from_record(PackageId(raw_id), &repo.id, record)
                .map_err(|e| {
                    Error::repo_with_source(
                        repo.id.clone(),
                        format!("invalid package record #{}", offset),
                        e,
                    )
                })?;

            if !seen.insert(pkg.full_nevra()) {
                return Err(Error::repo(
                    repo.id.clone(),
                    format!("duplicate package {}", pkg.nevra()),
                ));
            }

            if repo.is_system() {
                pkg.reason = reasons.get(&pkg.na()).copied().unwrap_or(Reason::ExternalUser);
            }
            added.push(Arc::new(pkg));
        }

        repo.load_order = old.repos.len();
        let count = added.len();

        let mut excluded = old.excluded.clone();
        if !repo.is_system() {
            for pkg in &added {
                if excludes.iter().any(|p| p.matches(&pkg.name)) {
                    excluded.insert(pkg.id);
                }
            }
        }

        let mut packages = old.packages.clone();
        packages.extend(added);
        let mut repos = old.repos.clone();
        info!("Loaded repository '{}' with {} packages", repo.id, count);
        repos.push(Arc::new(repo));

        *guard = Arc::new(SackSnapshot {
            sack_id: self.id,
            generation: old.generation + 1,
            packages,
            repos,
            excluded,
        });
        debug!("Sack {} now at generation {}", self.id, guard.generation);

        Ok(count)
    }
}

impl Default for PackageSack {
    fn default() -> Self {
        Self::new()
    }
}

fn compile_excludes(repo: &SackRepo, global: &[String]) -> Result<Vec<Pattern>> {
    global
        .iter()
        .chain(repo.excludepkgs.iter())
        .map(|p| {
            Pattern::new(p).map_err(|e| {
                Error::Config(format!("Invalid excludepkgs pattern '{}': {}", p, e))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(name: &str, evr: &str, arch: &str) -> PackageRecord {
        PackageRecord::new(name, evr, arch).unwrap()
    }

    #[test]
    fn test_ids_are_monotonic_across_repos() {
        let sack = PackageSack::new();
        sack.load_repo(
            SackRepo::new("repo1"),
            RepoSource::Records(vec![rec("one", "1-1", "noarch"), rec("two", "1-1", "noarch")]),
        )
        .unwrap();
        sack.load_repo(
            SackRepo::new("repo2"),
            RepoSource::Records(vec![rec("three", "1-1", "noarch")]),
        )
        .unwrap();

        let snap = sack.snapshot();
        let ids: Vec<u32> = snap.all_ids().map(|id| id.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(snap.package(PackageId(2)).repo_id, "repo2");
        assert_eq!(snap.repo("repo2").unwrap().load_order, 1);
    }

    #[test]
    fn test_duplicate_repo_id_is_rejected() {
        let sack = PackageSack::new();
        sack.load_repo(SackRepo::new("repo1"), RepoSource::Records(vec![]))
            .unwrap();
        let err = sack
            .load_repo(SackRepo::new("repo1"), RepoSource::Records(vec![]))
            .unwrap_err();
        assert!(matches!(err, Error::RepoIdAlreadyExists(id) if id == "repo1"));
    }

    #[test]
    fn test_malformed_repo_leaves_no_partial_state() {
        let sack = PackageSack::new();
        let mut bad = rec("two", "1-1", "noarch");
        bad.requires = vec!["(rich or dep)".to_string()];

        let err = sack
            .load_repo(
                SackRepo::new("repo1"),
                RepoSource::Records(vec![rec("one", "1-1", "noarch"), bad]),
            )
            .unwrap_err();
        assert!(matches!(err, Error::RepoError { .. }));

        let snap = sack.snapshot();
        assert!(snap.is_empty());
        assert!(snap.repo("repo1").is_none());
        assert_eq!(snap.generation(), 0);
    }

    #[test]
    fn test_snapshot_survives_later_load() {
        let sack = PackageSack::new();
        sack.load_repo(
            SackRepo::new("repo1"),
            RepoSource::Records(vec![rec("one", "1-1", "noarch")]),
        )
        .unwrap();
        let before = sack.snapshot();
        sack.load_repo(
            SackRepo::new("repo2"),
            RepoSource::Records(vec![rec("two", "1-1", "noarch")]),
        )
        .unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(sack.snapshot().len(), 2);
    }

    #[test]
    fn test_system_repo_reasons() {
        let sack = PackageSack::new();
        let mut reasons = HashMap::new();
        reasons.insert("one.noarch".to_string(), Reason::Dependency);
        sack.load_system_repo(
            RepoSource::Records(vec![rec("one", "1-1", "noarch"), rec("two", "1-1", "noarch")]),
            &reasons,
        )
        .unwrap();

        let snap = sack.snapshot();
        assert!(sack.system_repo().is_some());
        assert_eq!(snap.package(PackageId(0)).reason, Reason::Dependency);
        assert_eq!(snap.package(PackageId(1)).reason, Reason::ExternalUser);
        assert!(snap.package(PackageId(0)).is_installed());
    }

    #[test]
    fn test_excludes_apply_to_available_only() {
        let sack = PackageSack::with_excludes(vec!["one*".to_string()]);
        sack.load_system_repo(
            RepoSource::Records(vec![rec("one", "1-1", "noarch")]),
            &HashMap::new(),
        )
        .unwrap();
        sack.load_repo(
            SackRepo::new("repo1").with_excludes(vec!["two".to_string()]),
            RepoSource::Records(vec![rec("one", "2-1", "noarch"), rec("two", "1-1", "noarch")]),
        )
        .unwrap();

        let snap = sack.snapshot();
        assert!(!snap.is_excluded(PackageId(0)));
        assert!(snap.is_excluded(PackageId(1)));
        assert!(snap.is_excluded(PackageId(2)));
    }
}
