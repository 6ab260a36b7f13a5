// src/repository/metadata.rs

//! Repository metadata data structures
//!
//! Repositories are consumed as an already-fetched JSON package index:
//!
//! ```json
//! { "packages": [ { "name": "one", "version": "2", "release": "1", "arch": "noarch" } ] }
//! ```
//!
//! The installed package database uses the same layout.

use crate::error::{Error, Result};
use crate::package::PackageRecord;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// File name of the package index inside a repository base directory
pub const METADATA_FILE: &str = "packages.json";

/// Repository metadata format (simple JSON index)
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    #[serde(default)]
    pub packages: Vec<PackageRecord>,
}

/// Read a package index from `path`
pub fn read_metadata(path: &Path) -> Result<Vec<PackageRecord>> {
    let data = fs::read(path)
        .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
    let metadata: RepositoryMetadata = serde_json::from_slice(&data)?;
    Ok(metadata.packages)
}

/// Write a package index to `path` atomically
///
/// The new content is written to a temporary file in the same directory
/// and renamed over the old file, so readers never see a truncated index.
pub fn write_metadata(path: &Path, packages: &[PackageRecord]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::IoError(format!("No parent directory for {}", path.display())))?;
    fs::create_dir_all(dir)?;

    let metadata = RepositoryMetadata {
        packages: packages.to_vec(),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, &metadata)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| Error::IoError(format!("Failed to replace {}: {}", path.display(), e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_minimal_record() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(METADATA_FILE);
        fs::write(
            &path,
            r#"{"packages":[{"name":"one","version":"2","release":"1","arch":"noarch","requires":["two >= 1"]}]}"#,
        )
        .unwrap();

        let packages = read_metadata(&path).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].nevra(), "one-2-1.noarch");
        assert_eq!(packages[0].epoch, 0);
        assert_eq!(packages[0].requires, vec!["two >= 1".to_string()]);
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state").join(METADATA_FILE);
        let records = vec![PackageRecord::new("one", "1-1", "x86_64").unwrap()];

        write_metadata(&path, &records).unwrap();
        assert_eq!(read_metadata(&path).unwrap(), records);
    }

    #[test]
    fn test_malformed_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(METADATA_FILE);
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_metadata(&path), Err(Error::Json(_))));
    }
}
