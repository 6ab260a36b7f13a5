// src/repository/mod.rs

//! Repository configuration
//!
//! Repositories are declared in TOML files under `reposdir`, one table per
//! repository id:
//!
//! ```toml
//! [fedora]
//! name = "Fedora"
//! baseurl = "/srv/repos/fedora"
//! priority = 10
//! gpgcheck = true
//! gpgkey = ["/etc/pki/fedora.asc"]
//! ```
//!
//! The `baseurl` directory holds the `packages.json` index and the package
//! files it references.

pub mod gpg;
pub mod metadata;
pub mod selector;

pub use gpg::GpgVerifier;
pub use metadata::{read_metadata, write_metadata, RepositoryMetadata, METADATA_FILE};
pub use selector::PackageSelector;

use crate::config::ConfigMain;
use crate::error::{Error, Result};
use crate::package::{COMMANDLINE_REPO_ID, SYSTEM_REPO_ID};
use crate::sack::{SackRepo, DEFAULT_PRIORITY};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// One configured repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Filled from the table name
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub baseurl: PathBuf,
    pub enabled: bool,
    pub priority: i32,
    pub cost: i32,
    pub gpgcheck: Option<bool>,
    pub pkg_gpgcheck: Option<bool>,
    pub gpgkey: Vec<PathBuf>,
    pub excludepkgs: Vec<String>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            baseurl: PathBuf::new(),
            enabled: true,
            priority: DEFAULT_PRIORITY,
            cost: 1000,
            gpgcheck: None,
            pkg_gpgcheck: None,
            gpgkey: Vec::new(),
            excludepkgs: Vec::new(),
        }
    }
}

impl RepoConfig {
    pub fn new(id: impl Into<String>, baseurl: impl Into<PathBuf>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            baseurl: baseurl.into(),
            ..Default::default()
        }
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.baseurl.join(METADATA_FILE)
    }

    /// Whether packages from this repository need a valid signature
    pub fn pkg_gpgcheck_enabled(&self, cfg: &ConfigMain) -> bool {
        self.pkg_gpgcheck
            .or(self.gpgcheck)
            .unwrap_or(cfg.pkg_gpgcheck || cfg.gpgcheck)
    }

    /// The sack's view of this repository
    pub fn sack_repo(&self) -> SackRepo {
        let mut repo = SackRepo::new(self.id.clone())
            .with_priority(self.priority)
            .with_excludes(self.excludepkgs.clone());
        repo.cost = self.cost;
        repo
    }

    fn validate(&self) -> Result<()> {
        if self.id.is_empty() || self.id.starts_with('@') {
            return Err(Error::Config(format!("Invalid repository id '{}'", self.id)));
        }
        if self.baseurl.as_os_str().is_empty() {
            return Err(Error::Config(format!("Repository '{}' has no baseurl", self.id)));
        }
        Ok(())
    }
}

/// Which repositories `RepoConfStore::list` returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepoFilter {
    #[default]
    Enabled,
    Disabled,
    All,
}

impl FromStr for RepoFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "enabled" => Ok(RepoFilter::Enabled),
            "disabled" => Ok(RepoFilter::Disabled),
            "all" => Ok(RepoFilter::All),
            other => Err(Error::InvalidArgument(format!(
                "enable_disable must be one of enabled, disabled, all; got '{}'",
                other
            ))),
        }
    }
}

/// All configured repositories, in configuration order
#[derive(Debug, Clone, Default)]
pub struct RepoConfStore {
    repos: Vec<RepoConfig>,
}

impl RepoConfStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every `*.toml` file of `dir`, in file name order
    ///
    /// A missing directory yields an empty store.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut store = Self::new();
        if !dir.is_dir() {
            debug!("Repository directory {} does not exist", dir.display());
            return Ok(store);
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("toml"))
            .collect();
        files.sort();

        for file in files {
            let content = fs::read_to_string(&file).map_err(|e| {
                Error::IoError(format!("Failed to read {}: {}", file.display(), e))
            })?;
            let tables: BTreeMap<String, RepoConfig> = toml::from_str(&content)?;
            for (id, mut repo) in tables {
                repo.id = id;
                if repo.name.is_empty() {
                    repo.name = repo.id.clone();
                }
                store.add(repo)?;
            }
        }
        Ok(store)
    }

    pub fn add(&mut self, repo: RepoConfig) -> Result<()> {
        repo.validate()?;
        if repo.id == SYSTEM_REPO_ID || repo.id == COMMANDLINE_REPO_ID || self.get(&repo.id).is_some() {
            return Err(Error::RepoIdAlreadyExists(repo.id));
        }
        self.repos.push(repo);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&RepoConfig> {
        self.repos.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    /// Repositories passing `filter` whose id matches one of the glob
    /// `patterns` (all when empty)
    pub fn list(&self, filter: RepoFilter, patterns: &[String]) -> Result<Vec<&RepoConfig>> {
        let globs = patterns
            .iter()
            .map(|p| {
                Pattern::new(p)
                    .map_err(|e| Error::InvalidArgument(format!("Invalid pattern '{}': {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(self
            .repos
            .iter()
            .filter(|r| match filter {
                RepoFilter::Enabled => r.enabled,
                RepoFilter::Disabled => !r.enabled,
                RepoFilter::All => true,
            })
            .filter(|r| globs.is_empty() || globs.iter().any(|g| g.matches(&r.id)))
            .collect())
    }

    pub fn enabled(&self) -> impl Iterator<Item = &RepoConfig> {
        self.repos.iter().filter(|r| r.enabled)
    }

    /// Enable or disable every repository whose id matches one of `patterns`
    ///
    /// Returns the ids that changed. Fails without changing anything when a
    /// pattern matches no repository.
    pub fn set_enabled(&mut self, patterns: &[String], enabled: bool) -> Result<Vec<String>> {
        for pattern in patterns {
            let glob = Pattern::new(pattern)
                .map_err(|e| Error::InvalidArgument(format!("Invalid pattern '{}': {}", pattern, e)))?;
            if !self.repos.iter().any(|r| glob.matches(&r.id)) {
                return Err(Error::NotFoundError(format!("No matching repository: {}", pattern)));
            }
        }

        let mut changed = Vec::new();
        for repo in &mut self.repos {
            let matched = patterns
                .iter()
                .filter_map(|p| Pattern::new(p).ok())
                .any(|g| g.matches(&repo.id));
            if matched && repo.enabled != enabled {
                repo.enabled = enabled;
                changed.push(repo.id.clone());
            }
        }
        if changed.is_empty() {
            warn!("No repository changed state");
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_conf(dir: &Path, file: &str, content: &str) {
        fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn test_load_dir_in_file_order() {
        let dir = TempDir::new().unwrap();
        write_conf(
            dir.path(),
            "b.toml",
            "[updates]\nbaseurl = \"/srv/updates\"\nenabled = false\n",
        );
        write_conf(
            dir.path(),
            "a.toml",
            "[fedora]\nbaseurl = \"/srv/fedora\"\npriority = 10\ngpgcheck = true\n",
        );
        write_conf(dir.path(), "notes.txt", "ignored");

        let store = RepoConfStore::load_dir(dir.path()).unwrap();
        let all: Vec<&str> = store
            .list(RepoFilter::All, &[])
            .unwrap()
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(all, vec!["fedora", "updates"]);

        let fedora = store.get("fedora").unwrap();
        assert_eq!(fedora.priority, 10);
        assert_eq!(fedora.name, "fedora");
        assert!(fedora.pkg_gpgcheck_enabled(&ConfigMain::default()));
        assert_eq!(fedora.metadata_path(), PathBuf::from("/srv/fedora/packages.json"));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let mut store = RepoConfStore::new();
        store.add(RepoConfig::new("repo1", "/a")).unwrap();
        assert!(matches!(
            store.add(RepoConfig::new("repo1", "/b")),
            Err(Error::RepoIdAlreadyExists(_))
        ));
        assert!(store.add(RepoConfig::new("@System", "/c")).is_err());
    }

    #[test]
    fn test_enable_disable_and_filters() {
        let mut store = RepoConfStore::new();
        store.add(RepoConfig::new("repo1", "/a")).unwrap();
        store.add(RepoConfig::new("repo2", "/b")).unwrap();
        store.add(RepoConfig::new("other", "/c")).unwrap();

        let changed = store.set_enabled(&["repo*".to_string()], false).unwrap();
        assert_eq!(changed, vec!["repo1", "repo2"]);
        assert_eq!(store.list(RepoFilter::Enabled, &[]).unwrap().len(), 1);
        assert_eq!(
            store
                .list(RepoFilter::Disabled, &["repo2".to_string()])
                .unwrap()
                .len(),
            1
        );

        assert!(store.set_enabled(&["missing".to_string()], true).is_err());
        assert_eq!("all".parse::<RepoFilter>().unwrap(), RepoFilter::All);
        assert!("some".parse::<RepoFilter>().is_err());
    }
}
