// src/package/mod.rs

//! Package records
//!
//! `PackageRecord` is the serialized form found in repository metadata and in
//! the installed package database. `Package` is the immutable, validated form
//! stored in the sack, with parsed dependencies and an index-assigned id.

mod reldep;

pub use reldep::Reldep;

use crate::error::{Error, Result};
use crate::version::{CmpOp, Evr};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Id of the pseudo-repository holding installed packages
pub const SYSTEM_REPO_ID: &str = "@System";

/// Id of the pseudo-repository for packages given on the command line
pub const COMMANDLINE_REPO_ID: &str = "@commandline";

/// Index-assigned package id
///
/// Ids grow monotonically for the lifetime of a sack and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageId(pub(crate) u32);

impl PackageId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a package is present on the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    #[default]
    None,
    User,
    Dependency,
    WeakDependency,
    Group,
    ExternalUser,
    Clean,
}

impl Reason {
    pub fn as_str(&self) -> &str {
        match self {
            Reason::None => "none",
            Reason::User => "user",
            Reason::Dependency => "dependency",
            Reason::WeakDependency => "weak-dependency",
            Reason::Group => "group",
            Reason::ExternalUser => "external-user",
            Reason::Clean => "clean",
        }
    }

    /// Strength used when two reasons compete for one package
    ///
    /// A package pulled in both as a dependency and by the user keeps the
    /// stronger reason.
    fn rank(&self) -> u8 {
        match self {
            Reason::None => 0,
            Reason::Clean => 1,
            Reason::WeakDependency => 2,
            Reason::Dependency => 3,
            Reason::Group => 4,
            Reason::ExternalUser => 5,
            Reason::User => 6,
        }
    }

    pub fn stronger(self, other: Reason) -> Reason {
        if other.rank() > self.rank() { other } else { self }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reason {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "unknown" => Ok(Reason::None),
            "user" => Ok(Reason::User),
            "dependency" | "dep" => Ok(Reason::Dependency),
            "weak-dependency" | "weak" => Ok(Reason::WeakDependency),
            "group" => Ok(Reason::Group),
            "external-user" | "external" => Ok(Reason::ExternalUser),
            "clean" => Ok(Reason::Clean),
            _ => Err(format!("Invalid reason: {s}")),
        }
    }
}

/// Serialized package as it appears in repository metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageRecord {
    pub name: String,
    pub epoch: u32,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub install_size: u64,
    pub download_size: u64,
    pub checksum: Option<String>,
    pub source_rpm: Option<String>,
    /// Package file location relative to the repository base
    pub location: Option<String>,
    pub files: Vec<String>,
    pub requires: Vec<String>,
    pub provides: Vec<String>,
    pub conflicts: Vec<String>,
    pub obsoletes: Vec<String>,
    pub recommends: Vec<String>,
    pub suggests: Vec<String>,
    pub enhances: Vec<String>,
    pub supplements: Vec<String>,
    /// Installed packages only: repository the package came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_repo: Option<String>,
}

impl PackageRecord {
    pub fn new(name: &str, evr: &str, arch: &str) -> Result<Self> {
        let evr = Evr::parse(evr)?;
        Ok(Self {
            name: name.to_string(),
            epoch: evr.epoch,
            version: evr.version,
            release: evr.release,
            arch: arch.to_string(),
            ..Default::default()
        })
    }

    pub fn nevra(&self) -> String {
        let evr = Evr::new(self.epoch, self.version.clone(), self.release.clone());
        format!("{}-{}.{}", self.name, evr, self.arch)
    }
}

impl From<&Package> for PackageRecord {
    fn from(pkg: &Package) -> Self {
        fn strings(deps: &[Reldep]) -> Vec<String> {
            deps.iter().map(|d| d.to_string()).collect()
        }

        // the implicit self-provide is re-added on load
        let provides: Vec<Reldep> = pkg
            .provides
            .iter()
            .filter(|p| **p != pkg.self_provide())
            .cloned()
            .collect();

        Self {
            name: pkg.name.clone(),
            epoch: pkg.evr.epoch,
            version: pkg.evr.version.clone(),
            release: pkg.evr.release.clone(),
            arch: pkg.arch.clone(),
            install_size: pkg.install_size,
            download_size: pkg.download_size,
            checksum: pkg.checksum.clone(),
            source_rpm: pkg.source_rpm.clone(),
            location: pkg.location.clone(),
            files: pkg.files.clone(),
            requires: strings(&pkg.requires),
            provides: strings(&provides),
            conflicts: strings(&pkg.conflicts),
            obsoletes: strings(&pkg.obsoletes),
            recommends: strings(&pkg.recommends),
            suggests: strings(&pkg.suggests),
            enhances: strings(&pkg.enhances),
            supplements: strings(&pkg.supplements),
            from_repo: pkg.from_repo_id.clone(),
        }
    }
}

/// An immutable package loaded into a sack
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub id: PackageId,
    pub repo_id: String,
    pub name: String,
    pub evr: Evr,
    pub arch: String,
    pub from_repo_id: Option<String>,
    pub install_size: u64,
    pub download_size: u64,
    pub checksum: Option<String>,
    pub reason: Reason,
    pub source_rpm: Option<String>,
    pub location: Option<String>,
    pub files: Vec<String>,
    pub requires: Vec<Reldep>,
    pub provides: Vec<Reldep>,
    pub conflicts: Vec<Reldep>,
    pub obsoletes: Vec<Reldep>,
    pub recommends: Vec<Reldep>,
    pub suggests: Vec<Reldep>,
    pub enhances: Vec<Reldep>,
    pub supplements: Vec<Reldep>,
}

impl Package {
    /// Validate a record and build a package from it
    ///
    /// Every package provides itself (`name = evr`) even when the metadata
    /// does not say so.
    pub fn from_record(id: PackageId, repo_id: &str, record: &PackageRecord) -> Result<Self> {
        if record.name.is_empty() {
            return Err(Error::ParseError("Package without a name".to_string()));
        }
        if record.version.is_empty() {
            return Err(Error::ParseError(format!(
                "Package '{}' has no version",
                record.name
            )));
        }
        if record.arch.is_empty() {
            return Err(Error::ParseError(format!(
                "Package '{}' has no architecture",
                record.name
            )));
        }
        if record.name.contains(char::is_whitespace) {
            return Err(Error::ParseError(format!(
                "Package name '{}' contains whitespace",
                record.name
            )));
        }

        fn parse_all(deps: &[String]) -> Result<Vec<Reldep>> {
            deps.iter().map(|d| Reldep::parse(d)).collect()
        }

        let evr = Evr::new(record.epoch, record.version.clone(), record.release.clone());
        let mut provides = parse_all(&record.provides)?;
        let self_provide = Reldep::versioned(record.name.clone(), CmpOp::Equal, evr.clone());
        if !provides.contains(&self_provide) {
            provides.insert(0, self_provide);
        }

        Ok(Self {
            id,
            repo_id: repo_id.to_string(),
            name: record.name.clone(),
            evr,
            arch: record.arch.clone(),
            from_repo_id: record.from_repo.clone(),
            install_size: record.install_size,
            download_size: record.download_size,
            checksum: record.checksum.clone(),
            reason: Reason::None,
            source_rpm: record.source_rpm.clone(),
            location: record.location.clone(),
            files: record.files.clone(),
            requires: parse_all(&record.requires)?,
            provides,
            conflicts: parse_all(&record.conflicts)?,
            obsoletes: parse_all(&record.obsoletes)?,
            recommends: parse_all(&record.recommends)?,
            suggests: parse_all(&record.suggests)?,
            enhances: parse_all(&record.enhances)?,
            supplements: parse_all(&record.supplements)?,
        })
    }

    pub fn self_provide(&self) -> Reldep {
        Reldep::versioned(self.name.clone(), CmpOp::Equal, self.evr.clone())
    }

    pub fn epoch(&self) -> u32 {
        self.evr.epoch
    }

    pub fn version(&self) -> &str {
        &self.evr.version
    }

    pub fn release(&self) -> &str {
        &self.evr.release
    }

    /// `[epoch:]version-release`, epoch omitted when zero
    pub fn evr_string(&self) -> String {
        self.evr.to_string()
    }

    /// `name-[epoch:]version-release.arch`, epoch omitted when zero
    pub fn nevra(&self) -> String {
        format!("{}-{}.{}", self.name, self.evr, self.arch)
    }

    /// `name-epoch:version-release.arch`, epoch always present
    pub fn full_nevra(&self) -> String {
        format!(
            "{}-{}:{}-{}.{}",
            self.name, self.evr.epoch, self.evr.version, self.evr.release, self.arch
        )
    }

    /// `name.arch`
    pub fn na(&self) -> String {
        format!("{}.{}", self.name, self.arch)
    }

    pub fn is_installed(&self) -> bool {
        self.repo_id == SYSTEM_REPO_ID
    }

    pub fn is_source(&self) -> bool {
        self.arch == "src" || self.arch == "nosrc"
    }

    /// Check whether any provide or file of this package satisfies `dep`
    pub fn provides_dep(&self, dep: &Reldep) -> bool {
        if dep.is_file() && dep.constraint.is_none() && self.files.iter().any(|f| *f == dep.name) {
            return true;
        }
        self.provides.iter().any(|p| dep.is_satisfied_by(p))
    }

    /// Check whether this package's obsoletes match `other`
    ///
    /// Obsoletes are matched against the other package's name and version,
    /// not against its provides.
    pub fn obsoletes_package(&self, other: &Package) -> bool {
        self.obsoletes
            .iter()
            .any(|obs| obs.is_satisfied_by(&other.self_provide()))
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nevra())
    }
}
