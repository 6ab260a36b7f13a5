// src/db/mod.rs

//! History and system state database
//!
//! A single SQLite file at `<installroot>/<persistdir>/history.sqlite`
//! holds executed transactions and the install reason of every installed
//! `name.arch`.

pub mod history;
pub mod schema;
pub mod state;

pub use history::{HistoryItem, HistoryState, HistoryTransaction};
pub use state::PackageState;

use crate::error::Result;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Open (creating if needed) the database at `path` and bring its schema
/// up to date
pub fn open(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
    schema::migrate(&conn)?;
    debug!("Opened history database {}", path.display());
    Ok(conn)
}

/// Version string of an installed package set
///
/// `<count>:<sha256 of the sorted NEVRAs>`; equal sets give equal versions
/// regardless of order.
pub fn rpmdb_version<S: AsRef<str>>(nevras: &[S]) -> String {
    let mut sorted: Vec<&str> = nevras.iter().map(|s| s.as_ref()).collect();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    for nevra in &sorted {
        hasher.update(nevra.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}:{}", sorted.len(), hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("var/lib/rpmgoal/history.sqlite");
        let conn = open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(schema::get_schema_version(&conn).unwrap(), schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_rpmdb_version_ignores_order() {
        let a = rpmdb_version(&["one-1-1.noarch", "two-1-1.noarch"]);
        let b = rpmdb_version(&["two-1-1.noarch", "one-1-1.noarch"]);
        assert_eq!(a, b);
        assert!(a.starts_with("2:"));
        assert_ne!(a, rpmdb_version(&["one-1-1.noarch"]));
        assert!(rpmdb_version::<&str>(&[]).starts_with("0:"));
    }
}
