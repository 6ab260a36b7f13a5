// src/installer.rs

//! Package installer boundary
//!
//! A transaction hands its packages to a `PackageInstaller` one step at a
//! time. Unpacking payloads and running scriptlets is the installer's
//! business; the engine only decides the order.
//!
//! `DbInstaller` is the installer shipped with the crate. It keeps the
//! installed package database (`rpmdb.json`) in sync and touches nothing
//! else in the installroot.

use crate::error::{Error, Result};
use crate::package::PackageRecord;
use crate::progress::TransactionCallbacks;
use crate::repository::metadata::{read_metadata, write_metadata};
use crate::transaction::{TransactionItemAction, TransactionPackage};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// What a step does to the installed set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Install,
    Erase,
    /// Drop the old copy of a reinstalled package; the new copy already
    /// took its place
    Cleanup,
}

/// One unit of work for the installer
#[derive(Debug, Clone)]
pub struct InstallStep {
    pub kind: StepKind,
    pub item: TransactionPackage,
    /// Package file for inbound steps
    pub path: Option<PathBuf>,
}

impl InstallStep {
    pub fn nevra(&self) -> String {
        self.item.nevra()
    }
}

/// Applies packages to the target system
pub trait PackageInstaller: Send + Sync {
    /// Problems that would make the steps fail; empty when all is well
    fn check(&self, steps: &[InstallStep]) -> Vec<String>;

    /// Carry out one step
    fn apply(&self, step: &InstallStep, callbacks: &dyn TransactionCallbacks) -> Result<()>;
}

/// Installer that only records package state in `rpmdb.json`
pub struct DbInstaller {
    rpmdb_path: PathBuf,
    guard: Mutex<()>,
}

impl DbInstaller {
    pub fn new(rpmdb_path: impl Into<PathBuf>) -> Self {
        Self {
            rpmdb_path: rpmdb_path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn rpmdb_path(&self) -> &Path {
        &self.rpmdb_path
    }

    fn read_installed(&self) -> Result<Vec<PackageRecord>> {
        if !self.rpmdb_path.exists() {
            return Ok(Vec::new());
        }
        read_metadata(&self.rpmdb_path)
    }
}

impl PackageInstaller for DbInstaller {
    fn check(&self, steps: &[InstallStep]) -> Vec<String> {
        let installed: BTreeSet<String> = match self.read_installed() {
            Ok(records) => records.iter().map(|r| r.nevra()).collect(),
            Err(e) => return vec![format!("cannot read installed packages: {}", e)],
        };

        let mut problems = Vec::new();
        for step in steps {
            let nevra = step.nevra();
            match step.kind {
                StepKind::Install => {
                    if installed.contains(&nevra)
                        && step.item.action != TransactionItemAction::Reinstall
                    {
                        problems.push(format!("package {} is already installed", nevra));
                    }
                }
                StepKind::Erase | StepKind::Cleanup => {
                    if !installed.contains(&nevra) {
                        problems.push(format!("package {} is not installed", nevra));
                    }
                }
            }
        }
        problems
    }

    fn apply(&self, step: &InstallStep, callbacks: &dyn TransactionCallbacks) -> Result<()> {
        let _lock = self
            .guard
            .lock()
            .map_err(|_| Error::installer(step.nevra(), "installer lock poisoned", None))?;
        let item = &step.item;
        let pkg = &item.package;
        let mut records = self
            .read_installed()
            .map_err(|e| Error::installer(step.nevra(), "cannot read installed packages", Some(e.into())))?;

        match step.kind {
            StepKind::Install => {
                callbacks.install_start(item, pkg.install_size);
                let mut record = PackageRecord::from(pkg.as_ref());
                record.from_repo = Some(pkg.repo_id.clone());
                let nevra = record.nevra();
                match records.iter().position(|r| r.nevra() == nevra) {
                    Some(pos) => records[pos] = record,
                    None => records.push(record),
                }
                write_metadata(&self.rpmdb_path, &records)
                    .map_err(|e| Error::installer(step.nevra(), "cannot record package", Some(e.into())))?;
                callbacks.install_progress(item, pkg.install_size, pkg.install_size);
                callbacks.install_stop(item);
            }
            StepKind::Erase => {
                callbacks.uninstall_start(item, pkg.install_size);
                let nevra = step.nevra();
                let pos = records.iter().position(|r| r.nevra() == nevra).ok_or_else(|| {
                    Error::installer(nevra.clone(), "package is not installed", None)
                })?;
                records.remove(pos);
                write_metadata(&self.rpmdb_path, &records)
                    .map_err(|e| Error::installer(nevra, "cannot record removal", Some(e.into())))?;
                callbacks.uninstall_progress(item, pkg.install_size, pkg.install_size);
                callbacks.uninstall_stop(item);
            }
            StepKind::Cleanup => {
                callbacks.uninstall_start(item, 0);
                callbacks.uninstall_stop(item);
            }
        }
        debug!("{:?} {} done", step.kind, step.nevra());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{Package, PackageId, Reason};
    use crate::progress::NoopCallbacks;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn step(kind: StepKind, nevra_evr: &str, action: TransactionItemAction) -> InstallStep {
        let rec = PackageRecord::new("one", nevra_evr, "noarch").unwrap();
        let pkg = Arc::new(Package::from_record(PackageId(0), "repo1", &rec).unwrap());
        InstallStep {
            kind,
            item: TransactionPackage::new(pkg, action, Reason::User),
            path: None,
        }
    }

    #[test]
    fn test_install_then_erase() {
        let dir = TempDir::new().unwrap();
        let installer = DbInstaller::new(dir.path().join("var/lib/rpmgoal/rpmdb.json"));

        let install = step(StepKind::Install, "2-1", TransactionItemAction::Install);
        assert!(installer.check(std::slice::from_ref(&install)).is_empty());
        installer.apply(&install, &NoopCallbacks).unwrap();

        let records = read_metadata(installer.rpmdb_path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].from_repo.as_deref(), Some("repo1"));

        let again = step(StepKind::Install, "2-1", TransactionItemAction::Install);
        assert_eq!(
            installer.check(&[again]),
            vec!["package one-2-1.noarch is already installed".to_string()]
        );

        let erase = step(StepKind::Erase, "2-1", TransactionItemAction::Remove);
        installer.apply(&erase, &NoopCallbacks).unwrap();
        assert!(read_metadata(installer.rpmdb_path()).unwrap().is_empty());
    }

    #[test]
    fn test_reinstall_keeps_one_record() {
        let dir = TempDir::new().unwrap();
        let installer = DbInstaller::new(dir.path().join("rpmdb.json"));
        installer
            .apply(&step(StepKind::Install, "1-1", TransactionItemAction::Install), &NoopCallbacks)
            .unwrap();

        let steps = vec![
            step(StepKind::Install, "1-1", TransactionItemAction::Reinstall),
            step(StepKind::Cleanup, "1-1", TransactionItemAction::Replaced),
        ];
        assert!(installer.check(&steps).is_empty());
        for s in &steps {
            installer.apply(s, &NoopCallbacks).unwrap();
        }
        assert_eq!(read_metadata(installer.rpmdb_path()).unwrap().len(), 1);
    }

    #[test]
    fn test_erase_missing_fails() {
        let dir = TempDir::new().unwrap();
        let installer = DbInstaller::new(dir.path().join("rpmdb.json"));
        let erase = step(StepKind::Erase, "1-1", TransactionItemAction::Remove);
        assert_eq!(installer.check(std::slice::from_ref(&erase)).len(), 1);
        let err = installer.apply(&erase, &NoopCallbacks).unwrap_err();
        assert!(matches!(err, Error::InstallerError { .. }));
    }
}
