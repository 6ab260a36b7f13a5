// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use openpgp::cert::prelude::*;
use openpgp::policy::StandardPolicy;
use openpgp::serialize::stream::{Message, Signer};
use openpgp::serialize::SerializeInto;
use rpmgoal::repository::write_metadata;
use sequoia_openpgp as openpgp;
use rpmgoal::{Base, ConfigMain, KeyValueMap, NoopCallbacks, PackageRecord, Session, SessionManager};
use serde_json::json;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Architecture every test root pretends to run on
pub const TEST_ARCH: &str = "x86_64";

pub fn pkg(name: &str, evr: &str, arch: &str) -> PackageRecord {
    PackageRecord::new(name, evr, arch).unwrap()
}

pub fn noarch(name: &str, evr: &str) -> PackageRecord {
    pkg(name, evr, "noarch")
}

/// An installroot with repositories and an installed package set
///
/// Keep the value alive for as long as the root is used; dropping it
/// removes the directory.
pub struct TestRoot {
    dir: TempDir,
}

impl TestRoot {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> ConfigMain {
        ConfigMain {
            installroot: self.path().to_path_buf(),
            arch: Some(TEST_ARCH.to_string()),
            ..Default::default()
        }
    }

    /// Write `records` as repository `id` and declare it in the reposdir
    pub fn add_repo(&self, id: &str, records: &[PackageRecord]) -> PathBuf {
        self.add_repo_with(id, records, "")
    }

    /// `add_repo` with extra TOML lines in the repository section
    pub fn add_repo_with(&self, id: &str, records: &[PackageRecord], extra: &str) -> PathBuf {
        let baseurl = self.path().join("srv/repos").join(id);
        write_metadata(&baseurl.join("packages.json"), records).unwrap();

        let reposdir = self.config().reposdir_path();
        fs::create_dir_all(&reposdir).unwrap();
        let content = format!(
            "[{}]\nname = \"Test repository {}\"\nbaseurl = {:?}\n{}",
            id,
            id,
            baseurl.display().to_string(),
            extra
        );
        fs::write(reposdir.join(format!("{}.toml", id)), content).unwrap();
        baseurl
    }

    /// Replace the installed package set
    pub fn set_installed(&self, records: &[PackageRecord]) {
        write_metadata(&self.config().rpmdb_path(), records).unwrap();
    }

    /// NEVRAs recorded in the installed package database, sorted
    pub fn installed(&self) -> Vec<String> {
        let path = self.config().rpmdb_path();
        if !path.exists() {
            return Vec::new();
        }
        let mut nevras: Vec<String> = rpmgoal::repository::read_metadata(&path)
            .unwrap()
            .iter()
            .map(|r| r.nevra())
            .collect();
        nevras.sort();
        nevras
    }

    /// A base with the system repo and every enabled repo loaded
    pub fn base(&self) -> Arc<Base> {
        self.base_with(self.config())
    }

    /// `base()` over a modified configuration
    pub fn base_with(&self, config: ConfigMain) -> Arc<Base> {
        let base = Base::new(config).unwrap();
        base.load_system_repo().unwrap();
        base.load_repos(&NoopCallbacks).unwrap();
        base
    }

    pub fn session_options(&self) -> KeyValueMap {
        serde_json::from_value(json!({
            "config": {
                "installroot": self.path().display().to_string(),
                "arch": TEST_ARCH,
            }
        }))
        .unwrap()
    }

    pub fn open_session(&self) -> (SessionManager, Arc<Session>) {
        let manager = SessionManager::new();
        let handle = manager.open_session(&self.session_options()).unwrap();
        let session = manager.session(&handle).unwrap();
        (manager, session)
    }
}

/// Job options for the `Rpm` interface
pub fn options(value: serde_json::Value) -> KeyValueMap {
    serde_json::from_value(value).unwrap()
}

/// A freshly generated signing key
pub struct TestKey {
    cert: openpgp::Cert,
}

impl TestKey {
    pub fn generate() -> Self {
        let (cert, _revocation) =
            CertBuilder::general_purpose(None, Some("rpmgoal test <test@example.org>"))
                .generate()
                .unwrap();
        Self { cert }
    }

    /// The public certificate, ASCII armored
    pub fn armored(&self) -> Vec<u8> {
        self.cert.armored().to_vec().unwrap()
    }

    /// Detached binary signature over `payload`
    pub fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let policy = StandardPolicy::new();
        let keypair = self
            .cert
            .keys()
            .unencrypted_secret()
            .with_policy(&policy, None)
            .alive()
            .revoked(false)
            .for_signing()
            .next()
            .unwrap()
            .key()
            .clone()
            .into_keypair()
            .unwrap();

        let mut sink = Vec::new();
        {
            let message = Message::new(&mut sink);
            let mut signer = Signer::new(message, keypair).detached().build().unwrap();
            signer.write_all(payload).unwrap();
            signer.finalize().unwrap();
        }
        sink
    }

    /// Write `payload` to `path` with its `.sig` next to it
    pub fn write_signed(&self, path: &Path, payload: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, payload).unwrap();
        fs::write(rpmgoal::repository::gpg::signature_path(path), self.sign(payload)).unwrap();
    }
}
