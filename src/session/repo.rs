// src/session/repo.rs

//! `Repo` and `RepoConf` interfaces

use super::options::{self, KeyValueMap};
use super::Session;
use crate::error::{Error, Result};
use crate::repository::{RepoConfig, RepoFilter};
use serde_json::json;

fn repo_map(repo: &RepoConfig, loaded: bool) -> KeyValueMap {
    let mut map = KeyValueMap::new();
    map.insert("id".into(), json!(repo.id));
    map.insert("name".into(), json!(repo.name));
    map.insert("enabled".into(), json!(repo.enabled));
    map.insert("baseurl".into(), json!(repo.baseurl.display().to_string()));
    map.insert("priority".into(), json!(repo.priority));
    map.insert("cost".into(), json!(repo.cost));
    map.insert("loaded".into(), json!(loaded));
    map
}

pub struct RepoService<'a> {
    session: &'a Session,
}

impl<'a> RepoService<'a> {
    pub(super) fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Options: `enable_disable` (`enabled`, `disabled` or `all`, default
    /// `enabled`) and `patterns` (repo id globs)
    pub fn list(&self, options: &KeyValueMap) -> Result<Vec<KeyValueMap>> {
        let filter = match options::get_string(options, "enable_disable")? {
            Some(value) => value.parse::<RepoFilter>()?,
            None => RepoFilter::Enabled,
        };
        let patterns = options::get_strings(options, "patterns")?;
        let base = self.session.base()?;
        let repos = base.repos()?;
        Ok(repos
            .list(filter, &patterns)?
            .into_iter()
            .map(|r| repo_map(r, base.sack().has_repo(&r.id)))
            .collect())
    }
}

/// Repository configuration, as read from the repository files
pub struct RepoConfService<'a> {
    session: &'a Session,
}

impl<'a> RepoConfService<'a> {
    pub(super) fn new(session: &'a Session) -> Self {
        Self { session }
    }

    pub fn list(&self, patterns: &[String]) -> Result<Vec<KeyValueMap>> {
        let base = self.session.base()?;
        let repos = base.repos()?;
        Ok(repos
            .list(RepoFilter::All, patterns)?
            .into_iter()
            .map(|r| repo_map(r, base.sack().has_repo(&r.id)))
            .collect())
    }

    pub fn get(&self, id: &str) -> Result<KeyValueMap> {
        let base = self.session.base()?;
        let repos = base.repos()?;
        repos
            .get(id)
            .map(|r| repo_map(r, base.sack().has_repo(id)))
            .ok_or_else(|| Error::NotFoundError(format!("Repository \"{}\" not found", id)))
    }

    /// Returns the ids whose state changed
    pub fn enable(&self, patterns: &[String]) -> Result<Vec<String>> {
        self.session.base()?.repos_mut()?.set_enabled(patterns, true)
    }

    pub fn disable(&self, patterns: &[String]) -> Result<Vec<String>> {
        self.session.base()?.repos_mut()?.set_enabled(patterns, false)
    }
}
