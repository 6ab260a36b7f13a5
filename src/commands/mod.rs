// src/commands/mod.rs
//! Command handlers for the rpmgoal CLI

mod history;
mod packages;
pub mod progress;
mod repo;

pub use history::cmd_history_list;
pub use packages::{cmd_packages, PackageAction};
pub use repo::cmd_repo_list;

use crate::cli::Cli;
use anyhow::{bail, Context, Result};
use progress::RepoProgress;
use rpmgoal::{KeyValueMap, Session, SessionManager};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Session options from the global flags
fn session_options(cli: &Cli, load_repos: bool) -> Result<KeyValueMap> {
    let mut overrides = Map::new();
    for opt in &cli.setopt {
        let Some((key, value)) = opt.split_once('=') else {
            bail!("--setopt expects KEY=VALUE, got '{}'", opt);
        };
        overrides.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
    }
    if let Some(root) = &cli.installroot {
        overrides.insert("installroot".to_string(), Value::String(root.clone()));
    }

    let mut options = KeyValueMap::new();
    options.insert("config".to_string(), Value::Object(overrides));
    if let Some(path) = &cli.config {
        options.insert("config_file".to_string(), json!(path));
    }
    options.insert("load_system_repo".to_string(), json!(load_repos));
    options.insert("load_available_repos".to_string(), json!(load_repos));
    Ok(options)
}

/// Open a session with terminal progress for repository loading
fn open_session(cli: &Cli, load_repos: bool) -> Result<(SessionManager, Arc<Session>)> {
    let manager = SessionManager::with_callbacks(Arc::new(RepoProgress::new()));
    let handle = manager
        .open_session(&session_options(cli, load_repos)?)
        .context("Failed to set up the package session")?;
    let session = manager.session(&handle)?;
    Ok((manager, session))
}

/// Human-readable byte count
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_session_options_from_flags() {
        let cli = Cli::try_parse_from([
            "rpmgoal",
            "--installroot",
            "/srv/root",
            "--setopt",
            "gpgcheck=0",
            "history",
            "list",
        ])
        .unwrap();
        let options = session_options(&cli, false).unwrap();
        assert_eq!(options["config"]["installroot"], json!("/srv/root"));
        assert_eq!(options["config"]["gpgcheck"], json!("0"));
        assert_eq!(options["load_available_repos"], json!(false));
    }

    #[test]
    fn test_bad_setopt() {
        let cli = Cli::try_parse_from(["rpmgoal", "--setopt", "gpgcheck", "history", "list"]).unwrap();
        assert!(session_options(&cli, true).is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MiB");
    }
}
