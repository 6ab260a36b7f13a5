// src/transaction/mod.rs

//! Resolved transactions and their execution
//!
//! A `Transaction` is what `Goal::resolve` produces: either the ordered
//! package actions of a successful resolve, or an empty item list plus the
//! problems that stopped it. Running it applies the actions through the
//! base's `PackageInstaller` in this order:
//!
//! ```text
//! inbound (providers before requirers) -> replaced/obsoleted -> removals (dependents first)
//! ```
//!
//! The run holds an exclusive lock on the installroot, records the
//! transaction in history and persists install reasons per `name.arch`.

mod package;

pub use package::{TransactionItemAction, TransactionItemState, TransactionItemType, TransactionPackage};

use crate::base::{Base, BaseHandle};
use crate::db::{self, HistoryItem, HistoryState, HistoryTransaction, PackageState};
use crate::error::{Error, Result};
use crate::goal::{GoalProblem, LogEvent};
use crate::installer::{InstallStep, StepKind};
use crate::package::{Package, PackageId};
use crate::progress::{NoopCallbacks, TransactionCallbacks};
use crate::repository::GpgVerifier;
use crate::resolver::DependencyGraph;
use chrono::Utc;
use fs2::FileExt;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

/// Outcome of `Transaction::run`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionRunResult {
    Success,
    ErrorRerun,
    ErrorResolve,
    ErrorLock,
    ErrorCheck,
    ErrorRpmRun,
    ErrorGpgCheck,
}

impl TransactionRunResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionRunResult::Success => "Success.",
            TransactionRunResult::ErrorRerun => "This transaction has been already run before.",
            TransactionRunResult::ErrorResolve => "Cannot run transaction with resolving problems.",
            TransactionRunResult::ErrorLock => {
                "Failed to obtain rpm transaction lock. Another transaction is in progress."
            }
            TransactionRunResult::ErrorCheck => "Rpm transaction check failed.",
            TransactionRunResult::ErrorRpmRun => "Rpm transaction failed.",
            TransactionRunResult::ErrorGpgCheck => "Signature verification failed.",
        }
    }

    pub fn is_success(&self) -> bool {
        *self == TransactionRunResult::Success
    }
}

impl fmt::Display for TransactionRunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exclusive lock on the installroot, released on drop
struct TransactionLock {
    file: File,
}

impl TransactionLock {
    /// `None` when another process holds the lock
    fn acquire(path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                log::debug!("Acquired transaction lock {}", path.display());
                Ok(Some(Self { file }))
            }
            Err(e) => {
                log::debug!("Transaction lock {} is busy: {}", path.display(), e);
                Ok(None)
            }
        }
    }
}

impl Drop for TransactionLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[derive(Serialize)]
struct SerializedItem<'a> {
    nevra: String,
    action: &'a str,
    reason: &'a str,
    repo_id: &'a str,
    replaces: Vec<String>,
}

#[derive(Serialize)]
struct SerializedTransaction<'a> {
    description: &'a str,
    comment: &'a str,
    items: Vec<SerializedItem<'a>>,
}

pub struct Transaction {
    base: BaseHandle,
    items: Vec<TransactionPackage>,
    problems: GoalProblem,
    resolve_logs: Vec<LogEvent>,
    gpg_signature_problems: Vec<String>,
    transaction_problems: Vec<String>,
    description: String,
    comment: String,
    user_id: Option<u32>,
    callbacks: Arc<dyn TransactionCallbacks>,
    ran: bool,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("items", &self.items.len())
            .field("problems", &self.problems)
            .field("ran", &self.ran)
            .finish()
    }
}

impl Transaction {
    pub(crate) fn new(
        base: BaseHandle,
        items: Vec<TransactionPackage>,
        problems: GoalProblem,
        resolve_logs: Vec<LogEvent>,
    ) -> Self {
        Self {
            base,
            items,
            problems,
            resolve_logs,
            gpg_signature_problems: Vec::new(),
            transaction_problems: Vec::new(),
            description: String::new(),
            comment: String::new(),
            user_id: None,
            callbacks: Arc::new(NoopCallbacks),
            ran: false,
        }
    }

    pub fn items(&self) -> &[TransactionPackage] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn problems(&self) -> GoalProblem {
        self.problems
    }

    pub fn resolve_logs(&self) -> &[LogEvent] {
        &self.resolve_logs
    }

    /// Rendered resolve log, one string per event
    pub fn resolve_logs_as_strings(&self) -> Vec<String> {
        self.resolve_logs.iter().map(|e| e.to_string()).collect()
    }

    pub fn gpg_signature_problems(&self) -> &[String] {
        &self.gpg_signature_problems
    }

    pub fn transaction_problems(&self) -> &[String] {
        &self.transaction_problems
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    /// Override the user recorded in history (the login uid by default)
    pub fn set_user_id(&mut self, user_id: u32) {
        self.user_id = Some(user_id);
    }

    pub fn set_callbacks(&mut self, callbacks: Arc<dyn TransactionCallbacks>) {
        self.callbacks = callbacks;
    }

    fn inbound(&self) -> impl Iterator<Item = &TransactionPackage> {
        self.items.iter().filter(|i| i.action.is_inbound())
    }

    fn outbound(&self) -> impl Iterator<Item = &TransactionPackage> {
        self.items.iter().filter(|i| i.action.is_outbound())
    }

    /// Installed size of everything brought in
    pub fn total_install_size(&self) -> u64 {
        self.inbound().map(|i| i.package.install_size).sum()
    }

    /// Download size of everything brought in
    pub fn total_download_size(&self) -> u64 {
        self.inbound().map(|i| i.package.download_size).sum()
    }

    /// Installed size of everything taken out
    pub fn freed_size(&self) -> u64 {
        self.outbound().map(|i| i.package.install_size).sum()
    }

    /// Verify the detached signature of every inbound package
    ///
    /// Repositories with signature checking off are skipped with one
    /// warning each. A repository without an imported key gets one import
    /// attempt from its configured key files. Returns false when any
    /// package failed; the reasons are in `gpg_signature_problems`.
    pub fn check_gpg_signatures(&mut self) -> Result<bool> {
        let base = self.base.get()?;
        let config = base.config();
        let verifier = GpgVerifier::new(config.keyring_path());

        let mut skipped: BTreeMap<String, usize> = BTreeMap::new();
        let mut import_attempted: BTreeSet<String> = BTreeSet::new();
        let mut problems = Vec::new();
        let mut all_ok = true;

        for item in self.items.iter().filter(|i| i.action.is_inbound()) {
            let pkg = &item.package;
            let (check, key_files) = {
                let repos = base.repos()?;
                match repos.get(&pkg.repo_id) {
                    Some(repo) => (repo.pkg_gpgcheck_enabled(config), repo.gpgkey.clone()),
                    None => (config.pkg_gpgcheck || config.gpgcheck, Vec::new()),
                }
            };
            if !check {
                *skipped.entry(pkg.repo_id.clone()).or_default() += 1;
                continue;
            }

            if !verifier.has_key(&pkg.repo_id) && import_attempted.insert(pkg.repo_id.clone()) {
                for key in &key_files {
                    match verifier.import_key_file(key, &pkg.repo_id) {
                        Ok(fingerprint) => log::info!(
                            "Imported key {} for repository {}",
                            fingerprint,
                            pkg.repo_id
                        ),
                        Err(e) => log::warn!("Cannot import key {}: {}", key.display(), e),
                    }
                }
            }

            let Some(path) = base.package_path(pkg) else {
                all_ok = false;
                problems.push(format!(
                    "PGP check for package \"{}\" () from repo \"{}\" has failed: package file location is unknown",
                    pkg.nevra(),
                    pkg.repo_id
                ));
                continue;
            };
            if let Err(e) = verifier.verify_file(&path, &pkg.repo_id) {
                all_ok = false;
                let reason = match e {
                    Error::GpgVerificationFailed(reason) => reason,
                    other => other.to_string(),
                };
                problems.push(format!(
                    "PGP check for package \"{}\" ({}) from repo \"{}\" has failed: {}",
                    pkg.nevra(),
                    path.display(),
                    pkg.repo_id,
                    reason
                ));
            }
        }

        for (repo_id, count) in skipped {
            problems.push(format!(
                "Warning: skipped PGP checks for {} package(s) from repository \"{}\".",
                count, repo_id
            ));
        }
        self.gpg_signature_problems = problems;
        Ok(all_ok)
    }

    /// The transaction as JSON, for storing and replaying later
    pub fn serialize(&self) -> Result<String> {
        let nevra_of: HashMap<PackageId, String> = self
            .items
            .iter()
            .map(|i| (i.id(), i.nevra()))
            .collect();
        let items = self
            .items
            .iter()
            .map(|i| SerializedItem {
                nevra: i.nevra(),
                action: i.action.as_str(),
                reason: i.reason.as_str(),
                repo_id: &i.package.repo_id,
                replaces: i.replaces.iter().filter_map(|id| nevra_of.get(id).cloned()).collect(),
            })
            .collect();
        let doc = SerializedTransaction {
            description: &self.description,
            comment: &self.comment,
            items,
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Installer steps in execution order
    pub fn install_steps(&self, base: &Base) -> Vec<InstallStep> {
        let by_id: HashMap<PackageId, &TransactionPackage> =
            self.items.iter().map(|i| (i.id(), i)).collect();
        let ordered = |packages: Vec<Arc<Package>>, reverse: bool| -> Vec<PackageId> {
            let graph = DependencyGraph::from_packages(&packages);
            if reverse { graph.removal_order() } else { graph.install_order() }
        };

        let mut steps = Vec::with_capacity(self.items.len());

        let inbound: Vec<Arc<Package>> = self.inbound().map(|i| Arc::clone(&i.package)).collect();
        for id in ordered(inbound, false) {
            if let Some(item) = by_id.get(&id) {
                steps.push(InstallStep {
                    kind: StepKind::Install,
                    item: (*item).clone(),
                    path: base.package_path(&item.package),
                });
            }
        }

        for item in self.items.iter().filter(|i| {
            matches!(i.action, TransactionItemAction::Replaced | TransactionItemAction::Obsoleted)
        }) {
            let same_nevra = item
                .replaced_by
                .iter()
                .filter_map(|id| by_id.get(id))
                .any(|by| by.nevra() == item.nevra());
            steps.push(InstallStep {
                kind: if same_nevra { StepKind::Cleanup } else { StepKind::Erase },
                item: item.clone(),
                path: None,
            });
        }

        let removals: Vec<Arc<Package>> = self
            .items
            .iter()
            .filter(|i| i.action == TransactionItemAction::Remove)
            .map(|i| Arc::clone(&i.package))
            .collect();
        for id in ordered(removals, true) {
            if let Some(item) = by_id.get(&id) {
                steps.push(InstallStep {
                    kind: StepKind::Erase,
                    item: (*item).clone(),
                    path: None,
                });
            }
        }
        steps
    }

    /// Apply the transaction to the installroot
    ///
    /// Infrastructure failures (database, invalidated base) are `Err`;
    /// everything else is reported through the returned result.
    pub fn run(&mut self) -> Result<TransactionRunResult> {
        if self.ran {
            return Ok(TransactionRunResult::ErrorRerun);
        }
        self.ran = true;
        if self.problems != GoalProblem::NO_PROBLEM {
            return Ok(TransactionRunResult::ErrorResolve);
        }

        let base = self.base.get()?;
        let config = base.config();
        let Some(_lock) = TransactionLock::acquire(&config.transaction_lock_path())? else {
            return Ok(TransactionRunResult::ErrorLock);
        };

        let steps = self.install_steps(&base);
        let check_problems = base.installer().check(&steps);
        if !check_problems.is_empty() {
            self.transaction_problems.extend(check_problems);
            return Ok(TransactionRunResult::ErrorCheck);
        }

        let conn = db::open(&config.history_db_path())?;
        let installed_before = base.installed_nevras();
        let mut history = None;
        if config.history_record {
            let user_id = self
                .user_id
                .unwrap_or_else(|| nix::unistd::getuid().as_raw());
            let mut trans = HistoryTransaction::new(
                Utc::now().to_rfc3339(),
                db::rpmdb_version(&installed_before),
                user_id,
            );
            trans.description = self.description.clone();
            trans.comment = self.comment.clone();
            trans.items = self.items.iter().map(history_item).collect();
            trans.insert(&conn)?;
            history = Some(trans);
        }

        log::info!("Running transaction with {} steps", steps.len());
        self.callbacks.transaction_start(steps.len() as u64);
        let mut failed = false;
        for step in &steps {
            let state = match base.installer().apply(step, self.callbacks.as_ref()) {
                Ok(()) => TransactionItemState::Ok,
                Err(e) => {
                    let message = format!("{} {}: {}", step.item.action, step.nevra(), e);
                    log::error!("{}", message);
                    self.callbacks.elem_error(&step.item, &e.to_string());
                    self.transaction_problems.push(message);
                    TransactionItemState::Error
                }
            };
            if let Some(pos) = self.items.iter().position(|i| i.id() == step.item.id()) {
                self.items[pos].state = state;
                if let Some(trans) = history.as_mut() {
                    let recorded = match state {
                        TransactionItemState::Ok => HistoryState::Ok,
                        TransactionItemState::Error => HistoryState::Error,
                        TransactionItemState::Started => HistoryState::Started,
                    };
                    trans.set_item_state(&conn, pos, recorded)?;
                }
            }
            if state == TransactionItemState::Error {
                failed = true;
                break;
            }
        }
        self.callbacks.transaction_stop(!failed);

        if !failed {
            for item in self
                .items
                .iter_mut()
                .filter(|i| i.action == TransactionItemAction::ReasonChange)
            {
                item.state = TransactionItemState::Ok;
            }
        }
        // steps applied before a failure stay applied
        self.persist_reasons(&conn)?;

        if let Some(mut trans) = history {
            let state = if failed { HistoryState::Error } else { HistoryState::Ok };
            let end_version = db::rpmdb_version(&self.installed_after(installed_before));
            trans.finish(&conn, Utc::now().to_rfc3339(), end_version, state)?;
        }

        if failed {
            Ok(TransactionRunResult::ErrorRpmRun)
        } else {
            log::info!("Transaction completed");
            Ok(TransactionRunResult::Success)
        }
    }

    fn applied(&self) -> impl Iterator<Item = &TransactionPackage> {
        self.items.iter().filter(|i| i.state == TransactionItemState::Ok)
    }

    /// Installed NEVRAs after the applied items
    fn installed_after(&self, mut installed: Vec<String>) -> Vec<String> {
        for item in self.applied().filter(|i| i.action.is_outbound()) {
            let nevra = item.nevra();
            if let Some(pos) = installed.iter().position(|n| *n == nevra) {
                installed.remove(pos);
            }
        }
        installed.extend(self.applied().filter(|i| i.action.is_inbound()).map(|i| i.nevra()));
        installed
    }

    /// Write install reasons of the applied items to the system state
    fn persist_reasons(&self, conn: &rusqlite::Connection) -> Result<()> {
        let inbound_na: BTreeSet<String> = self
            .applied()
            .filter(|i| i.action.is_inbound())
            .map(|i| i.package.na())
            .collect();
        for item in self.applied().filter(|i| i.action.is_outbound()) {
            let pkg = &item.package;
            if !inbound_na.contains(&pkg.na()) {
                PackageState::delete(conn, &pkg.name, &pkg.arch)?;
            }
        }
        for item in self.applied() {
            let pkg = &item.package;
            if item.action.is_inbound() {
                PackageState::new(&pkg.name, &pkg.arch, item.reason, &pkg.repo_id).save(conn)?;
            } else if item.action == TransactionItemAction::ReasonChange {
                PackageState::set_reason(conn, &pkg.name, &pkg.arch, item.reason)?;
            }
        }
        Ok(())
    }
}

fn history_item(item: &TransactionPackage) -> HistoryItem {
    let pkg = &item.package;
    let repo_id = if pkg.is_installed() {
        pkg.from_repo_id.clone().unwrap_or_else(|| pkg.repo_id.clone())
    } else {
        pkg.repo_id.clone()
    };
    HistoryItem {
        id: None,
        nevra: pkg.nevra(),
        name: pkg.name.clone(),
        arch: pkg.arch.clone(),
        repo_id,
        action: item.action.as_str().to_string(),
        reason: item.reason.as_str().to_string(),
        state: HistoryState::Started,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_result_messages() {
        assert_eq!(
            TransactionRunResult::ErrorResolve.to_string(),
            "Cannot run transaction with resolving problems."
        );
        assert_eq!(
            TransactionRunResult::ErrorLock.as_str(),
            "Failed to obtain rpm transaction lock. Another transaction is in progress."
        );
        assert!(TransactionRunResult::Success.is_success());
        assert!(!TransactionRunResult::ErrorRpmRun.is_success());
    }

    #[test]
    fn test_lock_is_exclusive() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run/rpmgoal/transaction.lock");
        let first = TransactionLock::acquire(&path).unwrap();
        assert!(first.is_some());
        // a second open file description cannot take the lock
        assert!(TransactionLock::acquire(&path).unwrap().is_none());
        drop(first);
        assert!(TransactionLock::acquire(&path).unwrap().is_some());
    }
}
