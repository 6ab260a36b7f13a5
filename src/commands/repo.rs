// src/commands/repo.rs
//! Repository commands

use super::open_session;
use crate::cli::Cli;
use anyhow::Result;
use rpmgoal::KeyValueMap;
use serde_json::{json, Value};
use tracing::info;

/// List configured repositories
pub fn cmd_repo_list(cli: &Cli, patterns: &[String], all: bool, disabled: bool) -> Result<()> {
    info!("Listing repositories");
    let (_manager, session) = open_session(cli, false)?;

    let filter = if all {
        "all"
    } else if disabled {
        "disabled"
    } else {
        "enabled"
    };
    let mut options = KeyValueMap::new();
    options.insert("enable_disable".to_string(), json!(filter));
    options.insert("patterns".to_string(), json!(patterns));
    let repos = session.repo().list(&options)?;

    if repos.is_empty() {
        println!("No repositories configured");
        return Ok(());
    }
    println!("Repositories:");
    for repo in repos {
        let enabled = repo.get("enabled").and_then(Value::as_bool).unwrap_or(false);
        let enabled_mark = if enabled { "[x]" } else { "[ ]" };
        let text = |key: &str| repo.get(key).and_then(Value::as_str).unwrap_or("").to_string();
        let priority = repo.get("priority").and_then(Value::as_i64).unwrap_or(0);
        println!(
            "  {} {} - {} (priority: {})",
            enabled_mark,
            text("id"),
            text("name"),
            priority
        );
        println!("      {}", text("baseurl"));
    }
    Ok(())
}
