// src/base.rs

//! The `Base`: configuration, repositories, package sack and installer
//! shared by every goal and transaction of one session
//!
//! Goals and transactions keep a `BaseHandle` instead of the base itself.
//! Once the base is invalidated (its session closed) or dropped, every
//! access through a handle fails with `Error::InvalidatedHandle`.

use crate::config::ConfigMain;
use crate::db::{self, PackageState};
use crate::error::{Error, Result};
use crate::installer::{DbInstaller, PackageInstaller};
use crate::package::{Package, Reason};
use crate::progress::{ProgressCallbacks, TransferStatus};
use crate::repository::{read_metadata, RepoConfStore, RepoConfig};
use crate::sack::{PackageSack, RepoSource};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tracing::{debug, info, warn};

pub struct Base {
    config: ConfigMain,
    sack: PackageSack,
    repos: RwLock<RepoConfStore>,
    installer: Box<dyn PackageInstaller>,
    alive: Arc<AtomicBool>,
}

impl std::fmt::Debug for Base {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Base")
            .field("installroot", &self.config.installroot)
            .field("sack", &self.sack.id())
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl Base {
    /// Set up a base for `config`, reading repository files from its
    /// `reposdir` and recording installs in its `rpmdb.json`
    pub fn new(config: ConfigMain) -> Result<Arc<Self>> {
        let installer = Box::new(DbInstaller::new(config.rpmdb_path()));
        Self::with_installer(config, installer)
    }

    pub fn with_installer(config: ConfigMain, installer: Box<dyn PackageInstaller>) -> Result<Arc<Self>> {
        let repos = RepoConfStore::load_dir(&config.reposdir_path())?;
        let sack = PackageSack::with_excludes(config.excludepkgs.clone());

        Ok(Arc::new(Self {
            config,
            sack,
            repos: RwLock::new(repos),
            installer,
            alive: Arc::new(AtomicBool::new(true)),
        }))
    }

    pub fn config(&self) -> &ConfigMain {
        &self.config
    }

    pub fn sack(&self) -> &PackageSack {
        &self.sack
    }

    pub fn installer(&self) -> &dyn PackageInstaller {
        self.installer.as_ref()
    }

    pub fn repos(&self) -> Result<RwLockReadGuard<'_, RepoConfStore>> {
        self.repos
            .read()
            .map_err(|_| Error::LogicError("Repository configuration lock poisoned".to_string()))
    }

    pub fn repos_mut(&self) -> Result<RwLockWriteGuard<'_, RepoConfStore>> {
        self.repos
            .write()
            .map_err(|_| Error::LogicError("Repository configuration lock poisoned".to_string()))
    }

    pub fn add_repo(&self, repo: RepoConfig) -> Result<()> {
        self.repos_mut()?.add(repo)
    }

    pub fn handle(self: &Arc<Self>) -> BaseHandle {
        BaseHandle {
            base: Arc::downgrade(self),
            alive: Arc::clone(&self.alive),
        }
    }

    /// Cut off every handle to this base
    pub fn invalidate(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Load every enabled repository that is not in the sack yet
    ///
    /// Metadata files are parsed in parallel and then loaded in
    /// configuration order, so package ids do not depend on timing.
    pub fn load_repos(&self, callbacks: &dyn ProgressCallbacks) -> Result<usize> {
        let pending: Vec<RepoConfig> = self
            .repos()?
            .enabled()
            .filter(|r| !self.sack.has_repo(&r.id))
            .cloned()
            .collect();
        callbacks.on_start("Loading repositories", pending.len() as u64);

        let parsed: Vec<(RepoConfig, Result<Vec<_>>)> = pending
            .into_par_iter()
            .map(|repo| {
                let records = read_metadata(&repo.metadata_path());
                (repo, records)
            })
            .collect();

        let total = parsed.len() as u64;
        let mut loaded = 0;
        for (done, (repo, records)) in parsed.into_iter().enumerate() {
            let records = match records {
                Ok(records) => records,
                Err(e) => {
                    let url = repo.baseurl.display().to_string();
                    callbacks.on_mirror_failure(&e.to_string(), &url);
                    callbacks.on_end(TransferStatus::Error, &format!("Failed to load repository {}", repo.id));
                    return Err(Error::repo_with_source(repo.id.clone(), "cannot read metadata", e));
                }
            };
            self.sack.load_repo(repo.sack_repo(), RepoSource::Records(records))?;
            loaded += 1;
            callbacks.on_progress(done as u64 + 1, total);
        }

        callbacks.on_end(TransferStatus::Successful, &format!("Loaded {} repositories", loaded));
        info!("Loaded {} repositories", loaded);
        Ok(loaded)
    }

    /// Load the installed package set
    ///
    /// Install reasons come from the system state table; packages without a
    /// recorded reason count as installed by an external user.
    pub fn load_system_repo(&self) -> Result<usize> {
        let rpmdb = self.config.rpmdb_path();
        let source = if rpmdb.exists() {
            RepoSource::MetadataFile(rpmdb)
        } else {
            debug!("No installed package database at {}", rpmdb.display());
            RepoSource::Records(Vec::new())
        };

        let reasons = self.persisted_reasons()?;
        self.sack.load_system_repo(source, &reasons)
    }

    fn persisted_reasons(&self) -> Result<HashMap<String, Reason>> {
        let path = self.config.history_db_path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let conn = db::open(&path)?;
        Ok(PackageState::load_all(&conn)?
            .into_iter()
            .map(|(na, state)| (na, state.reason))
            .collect())
    }

    /// Path of a package's file, when it has a location
    pub fn package_path(&self, pkg: &Package) -> Option<PathBuf> {
        let location = pkg.location.as_deref()?;
        let path = Path::new(location);
        if path.is_absolute() {
            return Some(path.to_path_buf());
        }
        match self.repos().ok()?.get(&pkg.repo_id) {
            Some(repo) => Some(repo.baseurl.join(path)),
            None => {
                warn!("Package {} comes from unknown repository {}", pkg.nevra(), pkg.repo_id);
                None
            }
        }
    }

    /// NEVRAs of the installed packages
    pub fn installed_nevras(&self) -> Vec<String> {
        self.sack
            .snapshot()
            .packages()
            .iter()
            .filter(|p| p.is_installed())
            .map(|p| p.nevra())
            .collect()
    }
}

/// Weak reference to a `Base`
#[derive(Debug, Clone)]
pub struct BaseHandle {
    base: Weak<Base>,
    alive: Arc<AtomicBool>,
}

impl BaseHandle {
    pub fn get(&self) -> Result<Arc<Base>> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(Error::InvalidatedHandle("the owning session was closed".to_string()));
        }
        self.base
            .upgrade()
            .ok_or_else(|| Error::InvalidatedHandle("the base no longer exists".to_string()))
    }

    pub fn is_valid(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && self.base.strong_count() > 0
    }
}
