// src/config.rs

//! Main configuration
//!
//! `ConfigMain` is read from a TOML file:
//!
//! ```toml
//! installroot = "/"
//! reposdir = "/etc/rpmgoal/repos.d"
//! best = true
//! excludepkgs = ["kernel*"]
//! protected_packages = ["rpmgoal", "systemd"]
//! ```
//!
//! Every key is optional. Session options may override keys afterwards
//! through `apply_overrides`, which parses the string values by key type.

use crate::error::{Error, Result};
use crate::repository::selector::PackageSelector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Installed package database, relative to the persist directory
pub const RPMDB_FILE: &str = "rpmdb.json";
/// History database, relative to the persist directory
pub const HISTORY_DB_FILE: &str = "history.sqlite";

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigMain {
    /// Root of the system being managed
    pub installroot: PathBuf,
    /// State directory, inside the installroot
    pub persistdir: PathBuf,
    /// Directory of repository configuration files, inside the installroot
    pub reposdir: PathBuf,
    /// Directory of imported repository keys, inside the installroot
    pub keyringdir: PathBuf,
    pub gpgcheck: bool,
    pub pkg_gpgcheck: bool,
    /// Require the highest version of every requested package
    pub best: bool,
    pub skip_unavailable: bool,
    pub skip_broken: bool,
    /// Fail the whole request on any unavailable or broken package
    pub strict: bool,
    pub install_weak_deps: bool,
    pub clean_requirements_on_remove: bool,
    /// Package name globs hidden in every repository
    pub excludepkgs: Vec<String>,
    /// Package names that may never be removed
    pub protected_packages: Vec<String>,
    /// Consider obsoletes when upgrading
    pub obsoletes: bool,
    /// Record transactions in the history database
    pub history_record: bool,
    /// Architecture override; detected from the host when unset
    pub arch: Option<String>,
}

impl Default for ConfigMain {
    fn default() -> Self {
        Self {
            installroot: PathBuf::from("/"),
            persistdir: PathBuf::from("var/lib/rpmgoal"),
            reposdir: PathBuf::from("etc/rpmgoal/repos.d"),
            keyringdir: PathBuf::from("var/lib/rpmgoal/keys"),
            gpgcheck: false,
            pkg_gpgcheck: false,
            best: false,
            skip_unavailable: false,
            skip_broken: false,
            strict: true,
            install_weak_deps: true,
            clean_requirements_on_remove: true,
            excludepkgs: Vec::new(),
            protected_packages: vec!["rpmgoal".to_string()],
            obsoletes: true,
            history_record: true,
            arch: None,
        }
    }
}

impl ConfigMain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: ConfigMain = toml::from_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Override keys from string values
    ///
    /// Booleans accept `1/0`, `true/false`, `yes/no` and `on/off`; lists are
    /// comma or whitespace separated. An unknown key or a bad value is an
    /// error and leaves the configuration unchanged.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, String>) -> Result<()> {
        let mut updated = self.clone();
        for (key, value) in overrides {
            updated.set(key, value)?;
        }
        *self = updated;
        Ok(())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "installroot" => self.installroot = PathBuf::from(value),
            "persistdir" => self.persistdir = PathBuf::from(value),
            "reposdir" => self.reposdir = PathBuf::from(value),
            "keyringdir" => self.keyringdir = PathBuf::from(value),
            "gpgcheck" => self.gpgcheck = parse_bool(key, value)?,
            "pkg_gpgcheck" => self.pkg_gpgcheck = parse_bool(key, value)?,
            "best" => self.best = parse_bool(key, value)?,
            "skip_unavailable" => self.skip_unavailable = parse_bool(key, value)?,
            "skip_broken" => self.skip_broken = parse_bool(key, value)?,
            "strict" => self.strict = parse_bool(key, value)?,
            "install_weak_deps" => self.install_weak_deps = parse_bool(key, value)?,
            "clean_requirements_on_remove" => {
                self.clean_requirements_on_remove = parse_bool(key, value)?
            }
            "excludepkgs" => self.excludepkgs = parse_list(value),
            "protected_packages" => self.protected_packages = parse_list(value),
            "obsoletes" => self.obsoletes = parse_bool(key, value)?,
            "history_record" => self.history_record = parse_bool(key, value)?,
            "arch" => self.arch = Some(value.to_string()),
            _ => {
                return Err(Error::Config(format!("Unknown configuration option: {}", key)));
            }
        }
        Ok(())
    }

    /// Architecture new packages have to run on
    pub fn system_arch(&self) -> String {
        self.arch
            .clone()
            .unwrap_or_else(PackageSelector::detect_architecture)
    }

    /// Resolve a path that lives inside the installroot
    fn in_root(&self, path: &Path) -> PathBuf {
        let relative = path.strip_prefix("/").unwrap_or(path);
        self.installroot.join(relative)
    }

    pub fn persist_path(&self) -> PathBuf {
        self.in_root(&self.persistdir)
    }

    pub fn reposdir_path(&self) -> PathBuf {
        self.in_root(&self.reposdir)
    }

    pub fn keyring_path(&self) -> PathBuf {
        self.in_root(&self.keyringdir)
    }

    pub fn rpmdb_path(&self) -> PathBuf {
        self.persist_path().join(RPMDB_FILE)
    }

    pub fn history_db_path(&self) -> PathBuf {
        self.persist_path().join(HISTORY_DB_FILE)
    }

    /// Lock file held while a transaction runs
    pub fn transaction_lock_path(&self) -> PathBuf {
        self.installroot.join("run/rpmgoal/transaction.lock")
    }

    /// Where an offline transaction waits for the next boot
    pub fn offline_transaction_path(&self) -> PathBuf {
        self.persist_path().join("offline").join("transaction.json")
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!(
            "Invalid boolean value '{}' for option {}",
            other, key
        ))),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ConfigMain::default();
        assert!(config.strict);
        assert!(!config.skip_unavailable);
        assert!(config.install_weak_deps);
        assert_eq!(config.rpmdb_path(), PathBuf::from("/var/lib/rpmgoal/rpmdb.json"));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rpmgoal.toml");
        std::fs::write(
            &path,
            "installroot = \"/tmp/root\"\nbest = true\nexcludepkgs = [\"kernel*\"]\n",
        )
        .unwrap();

        let config = ConfigMain::load(&path).unwrap();
        assert!(config.best);
        assert_eq!(config.excludepkgs, vec!["kernel*".to_string()]);
        assert_eq!(
            config.history_db_path(),
            PathBuf::from("/tmp/root/var/lib/rpmgoal/history.sqlite")
        );
        assert_eq!(
            config.transaction_lock_path(),
            PathBuf::from("/tmp/root/run/rpmgoal/transaction.lock")
        );
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rpmgoal.toml");
        std::fs::write(&path, "no_such_key = 1\n").unwrap();
        assert!(matches!(ConfigMain::load(&path), Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_overrides() {
        let mut config = ConfigMain::default();
        let mut overrides = BTreeMap::new();
        overrides.insert("best".to_string(), "yes".to_string());
        overrides.insert("protected_packages".to_string(), "rpm, dnf".to_string());
        config.apply_overrides(&overrides).unwrap();
        assert!(config.best);
        assert_eq!(config.protected_packages, vec!["rpm", "dnf"]);
    }

    #[test]
    fn test_bad_override_leaves_config_unchanged() {
        let mut config = ConfigMain::default();
        let mut overrides = BTreeMap::new();
        overrides.insert("best".to_string(), "true".to_string());
        overrides.insert("strict".to_string(), "maybe".to_string());
        assert!(config.apply_overrides(&overrides).is_err());
        assert!(!config.best);

        let mut overrides = BTreeMap::new();
        overrides.insert("colour".to_string(), "1".to_string());
        assert!(matches!(config.apply_overrides(&overrides), Err(Error::Config(_))));
    }
}
