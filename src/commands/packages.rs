// src/commands/packages.rs

//! install, remove, upgrade, downgrade, reinstall and distro-sync

use super::progress::TransactionProgress;
use super::{format_size, open_session};
use crate::cli::{Cli, TransactionOpts};
use anyhow::{bail, Result};
use rpmgoal::{KeyValueMap, ResolveResult, ResolvedItem};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageAction {
    Install,
    Remove,
    Upgrade,
    Downgrade,
    Reinstall,
    DistroSync,
}

/// Goal job options from the transaction flags
fn job_options(opts: &TransactionOpts) -> KeyValueMap {
    let mut options = KeyValueMap::new();
    if !opts.repos.is_empty() {
        options.insert("repo_ids".to_string(), json!(opts.repos));
    }
    if opts.skip_unavailable {
        options.insert("skip_unavailable".to_string(), json!(true));
    }
    if opts.strict || opts.no_strict {
        options.insert("strict".to_string(), json!(opts.strict));
    }
    if opts.best || opts.no_best {
        options.insert("best".to_string(), json!(opts.best));
    }
    options
}

fn attr<'a>(item: &'a ResolvedItem, key: &str) -> &'a str {
    item.package_attrs.get(key).and_then(Value::as_str).unwrap_or("")
}

fn attr_u64(item: &ResolvedItem, key: &str) -> u64 {
    item.package_attrs.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn print_items(items: &[ResolvedItem]) {
    println!(
        "{:<12} {:<45} {:<15} {:>10}",
        "Action", "Package", "Repository", "Size"
    );
    for item in items {
        let repo = match item.action.as_str() {
            "Remove" | "Replaced" | "Obsoleted" => attr(item, "from_repo_id"),
            _ => attr(item, "repo_id"),
        };
        println!(
            "{:<12} {:<45} {:<15} {:>10}",
            item.action,
            attr(item, "nevra"),
            repo,
            format_size(attr_u64(item, "install_size"))
        );
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for item in items {
        *counts.entry(item.action.as_str()).or_default() += 1;
    }
    println!();
    println!("Transaction summary:");
    for (action, count) in counts {
        println!("  {:<12} {} package(s)", action, count);
    }
}

pub fn cmd_packages(
    cli: &Cli,
    action: PackageAction,
    specs: &[String],
    opts: &TransactionOpts,
) -> Result<()> {
    info!("{:?} {}", action, specs.join(" "));
    let (_manager, session) = open_session(cli, true)?;

    let options = job_options(opts);
    let rpm = session.rpm();
    match action {
        PackageAction::Install => rpm.install(specs, &options)?,
        PackageAction::Remove => rpm.remove(specs, &options)?,
        PackageAction::Upgrade => rpm.upgrade(specs, &options)?,
        PackageAction::Downgrade => rpm.downgrade(specs, &options)?,
        PackageAction::Reinstall => rpm.reinstall(specs, &options)?,
        PackageAction::DistroSync => rpm.distro_sync(specs, &options)?,
    }

    let goal = session.goal();
    let (items, result) = goal.resolve(&KeyValueMap::new())?;
    for message in goal.get_transaction_problems_string()? {
        eprintln!("{}", message);
    }
    if result == ResolveResult::Error {
        bail!("Failed to resolve the transaction");
    }
    if items.is_empty() {
        println!("Nothing to do.");
        return Ok(());
    }

    print_items(&items);
    if opts.assumeno {
        println!("Operation aborted by the user.");
        return Ok(());
    }

    let mut run_options = KeyValueMap::new();
    run_options.insert("offline".to_string(), json!(opts.offline));
    if let Some(comment) = &opts.comment {
        run_options.insert("comment".to_string(), json!(comment));
    }
    goal.do_transaction_with(&run_options, Arc::new(TransactionProgress::new()))?;

    if opts.offline {
        println!("Transaction stored; it will run at the next boot.");
    } else {
        println!("Complete!");
    }
    Ok(())
}
