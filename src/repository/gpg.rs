// src/repository/gpg.rs

//! OpenPGP verification of package files
//!
//! Each repository has at most one key file, `<keyringdir>/<repo>.asc`.
//! Packages are signed with a detached signature stored next to the
//! package file as `<package>.sig`.

use crate::error::{Error, Result};
use openpgp::parse::Parse;
use openpgp::policy::StandardPolicy;
use sequoia_openpgp as openpgp;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Suffix of detached signature files
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// Path of the detached signature belonging to `package_path`
pub fn signature_path(package_path: &Path) -> PathBuf {
    let mut name = package_path.as_os_str().to_os_string();
    name.push(SIGNATURE_SUFFIX);
    PathBuf::from(name)
}

/// Per-repository keyring and signature verifier
pub struct GpgVerifier {
    keyring_dir: PathBuf,
    policy: StandardPolicy<'static>,
}

impl GpgVerifier {
    /// The keyring directory is created on the first import
    pub fn new(keyring_dir: PathBuf) -> Self {
        Self {
            keyring_dir,
            policy: StandardPolicy::new(),
        }
    }

    fn key_path(&self, repo_id: &str) -> PathBuf {
        self.keyring_dir.join(format!("{}.asc", repo_id))
    }

    pub fn has_key(&self, repo_id: &str) -> bool {
        self.key_path(repo_id).exists()
    }

    /// Store `key_data` as the key of `repo_id`, returning its fingerprint
    ///
    /// The data must parse as an OpenPGP certificate.
    pub fn import_key(&self, key_data: &[u8], repo_id: &str) -> Result<String> {
        let cert = openpgp::Cert::from_bytes(key_data)
            .map_err(|e| Error::ParseError(format!("Failed to parse OpenPGP key: {}", e)))?;
        let fingerprint = cert.fingerprint().to_string();

        fs::create_dir_all(&self.keyring_dir).map_err(|e| {
            Error::IoError(format!(
                "Failed to create keyring directory {}: {}",
                self.keyring_dir.display(),
                e
            ))
        })?;
        fs::write(self.key_path(repo_id), key_data)
            .map_err(|e| Error::IoError(format!("Failed to write key for '{}': {}", repo_id, e)))?;

        info!("Imported key {} for repository '{}'", fingerprint, repo_id);
        Ok(fingerprint)
    }

    pub fn import_key_file(&self, key_path: &Path, repo_id: &str) -> Result<String> {
        let key_data = fs::read(key_path).map_err(|e| {
            Error::IoError(format!("Failed to read key file {}: {}", key_path.display(), e))
        })?;
        self.import_key(&key_data, repo_id)
    }

    /// Verify the detached signature of `file_path` against the key of `repo_id`
    pub fn verify_file(&self, file_path: &Path, repo_id: &str) -> Result<()> {
        let key_path = self.key_path(repo_id);
        let key_data = fs::read(&key_path).map_err(|_| {
            Error::GpgVerificationFailed(format!("no key imported for repository '{}'", repo_id))
        })?;
        let cert = openpgp::Cert::from_bytes(&key_data)
            .map_err(|e| Error::GpgVerificationFailed(format!("invalid repository key: {}", e)))?;

        let message = fs::read(file_path).map_err(|e| {
            Error::GpgVerificationFailed(format!("cannot read package file: {}", e))
        })?;
        let sig_path = signature_path(file_path);
        let sig_data = fs::read(&sig_path).map_err(|_| {
            Error::GpgVerificationFailed(format!("signature {} not found", sig_path.display()))
        })?;

        let pile = openpgp::PacketPile::from_bytes(&sig_data)
            .map_err(|e| Error::GpgVerificationFailed(format!("invalid signature: {}", e)))?;

        for packet in pile.descendants() {
            let openpgp::Packet::Signature(sig) = packet else {
                continue;
            };
            for key in cert.keys().with_policy(&self.policy, None).for_signing() {
                if sig.clone().verify_message(key.key(), &message).is_ok() {
                    debug!("Verified {} with key {}", file_path.display(), key.key().fingerprint());
                    return Ok(());
                }
            }
        }

        Err(Error::GpgVerificationFailed(
            "signature does not match any repository key".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openpgp::cert::prelude::*;
    use openpgp::serialize::stream::{Message, Signer};
    use openpgp::serialize::SerializeInto;
    use std::io::Write;
    use tempfile::TempDir;

    fn generate_key() -> openpgp::Cert {
        let (cert, _) = CertBuilder::general_purpose(None, Some("repo1 <repo1@example.org>"))
            .generate()
            .unwrap();
        cert
    }

    fn sign_detached(cert: &openpgp::Cert, payload: &[u8]) -> Vec<u8> {
        let policy = StandardPolicy::new();
        let keypair = cert
            .keys()
            .unencrypted_secret()
            .with_policy(&policy, None)
            .for_signing()
            .next()
            .unwrap()
            .key()
            .clone()
            .into_keypair()
            .unwrap();
        let mut sig = Vec::new();
        {
            let mut signer = Signer::new(Message::new(&mut sig), keypair)
                .detached()
                .build()
                .unwrap();
            signer.write_all(payload).unwrap();
            signer.finalize().unwrap();
        }
        sig
    }

    #[test]
    fn test_good_and_tampered_signatures() {
        let dir = TempDir::new().unwrap();
        let verifier = GpgVerifier::new(dir.path().join("keys"));
        let cert = generate_key();
        let fingerprint = verifier
            .import_key(&cert.armored().to_vec().unwrap(), "repo1")
            .unwrap();
        assert_eq!(fingerprint, cert.fingerprint().to_string());
        assert!(dir.path().join("keys/repo1.asc").exists());

        let pkg = dir.path().join("one-1-1.noarch.rpm");
        fs::write(&pkg, b"payload").unwrap();
        fs::write(signature_path(&pkg), sign_detached(&cert, b"payload")).unwrap();
        verifier.verify_file(&pkg, "repo1").unwrap();

        fs::write(&pkg, b"tampered payload").unwrap();
        let err = verifier.verify_file(&pkg, "repo1").unwrap_err();
        assert!(matches!(
            err,
            Error::GpgVerificationFailed(ref reason) if reason == "signature does not match any repository key"
        ));
    }

    #[test]
    fn test_signature_from_other_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let verifier = GpgVerifier::new(dir.path().join("keys"));
        verifier
            .import_key(&generate_key().armored().to_vec().unwrap(), "repo1")
            .unwrap();

        let pkg = dir.path().join("one-1-1.noarch.rpm");
        fs::write(&pkg, b"payload").unwrap();
        assert!(matches!(
            verifier.verify_file(&pkg, "repo1"),
            Err(Error::GpgVerificationFailed(ref reason)) if reason.starts_with("signature ") && reason.ends_with(" not found")
        ));

        fs::write(signature_path(&pkg), sign_detached(&generate_key(), b"payload")).unwrap();
        assert!(verifier.verify_file(&pkg, "repo1").is_err());
    }

    #[test]
    fn test_signature_path() {
        assert_eq!(
            signature_path(Path::new("/repo/one-1-1.noarch.rpm")),
            PathBuf::from("/repo/one-1-1.noarch.rpm.sig")
        );
    }

    #[test]
    fn test_missing_key_fails_verification() {
        let dir = TempDir::new().unwrap();
        let verifier = GpgVerifier::new(dir.path().join("keys"));
        let pkg = dir.path().join("one.rpm");
        fs::write(&pkg, b"payload").unwrap();

        assert!(!verifier.has_key("repo1"));
        let err = verifier.verify_file(&pkg, "repo1").unwrap_err();
        assert!(err.to_string().contains("no key imported for repository 'repo1'"));
    }

    #[test]
    fn test_import_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let verifier = GpgVerifier::new(dir.path().join("keys"));
        assert!(matches!(
            verifier.import_key(b"not a key", "repo1"),
            Err(Error::ParseError(_))
        ));
        assert!(!verifier.has_key("repo1"));
    }
}
