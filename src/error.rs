// src/error.rs

//! Error types for rpmgoal
//!
//! Resolution problems (a package that cannot be found, an unsatisfiable
//! request) are not errors: they are reported as log events on the resolved
//! transaction. The variants here cover caller misuse and failures of the
//! collaborators the engine talks to (repository metadata, the database,
//! signature verification, the package installer).

use thiserror::Error;

/// Result type used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause attached to infrastructure errors
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    /// Initialization or setup failure
    #[error("Initialization error: {0}")]
    InitError(String),

    /// I/O failure with a formatted context message
    #[error("I/O error: {0}")]
    IoError(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input (NEVRA, reldep, version string, ...)
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A named object (repo, session, package) does not exist
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// History or system state database failure
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// JSON encoding or decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file or option failure
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML configuration could not be parsed
    #[error("Configuration error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A repository with this id is already loaded into the sack
    #[error("Repository \"{0}\" is already loaded")]
    RepoIdAlreadyExists(String),

    /// Repository metadata could not be loaded; nothing from it was added
    #[error("Failed to load repository \"{repo_id}\": {message}")]
    RepoError {
        repo_id: String,
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    /// Queries from different package sacks were combined
    #[error("Query error: {0}")]
    QueryError(String),

    /// Invalid argument passed to a public operation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation called in a state that does not allow it
    #[error("{0}")]
    LogicError(String),

    /// Handle whose owning base or session is gone
    #[error("Invalidated handle: {0}")]
    InvalidatedHandle(String),

    /// Signature backend failure
    #[error("GPG verification failed: {0}")]
    GpgVerificationFailed(String),

    /// Transaction failed to run
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// The package installer failed for a specific package
    #[error("Installer failed for {nevra}: {message}")]
    InstallerError {
        nevra: String,
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    /// The global logger was registered twice
    #[error("A global logger is already registered")]
    LoggerAlreadyRegistered,
}

impl Error {
    /// Build a repo error without an underlying cause
    pub fn repo(repo_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RepoError {
            repo_id: repo_id.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Build a repo error wrapping the cause that triggered it
    pub fn repo_with_source(
        repo_id: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<BoxedCause>,
    ) -> Self {
        Self::RepoError {
            repo_id: repo_id.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Build an installer error wrapping its cause
    pub fn installer(
        nevra: impl Into<String>,
        message: impl Into<String>,
        source: Option<BoxedCause>,
    ) -> Self {
        Self::InstallerError {
            nevra: nevra.into(),
            message: message.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_repo_error_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "packages.json missing");
        let err = Error::repo_with_source("fedora", "cannot read metadata", io);

        assert_eq!(
            err.to_string(),
            "Failed to load repository \"fedora\": cannot read metadata"
        );
        let cause = err.source().expect("cause should be chained");
        assert_eq!(cause.to_string(), "packages.json missing");
    }

    #[test]
    fn test_repo_error_without_cause() {
        let err = Error::repo("updates", "bad record");
        assert!(err.source().is_none());
    }
}
