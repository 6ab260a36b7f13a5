// src/lib.rs

//! rpmgoal: goal resolution and transaction engine for RPM-style package sets
//!
//! Callers describe what they want ("install these specs, remove that
//! package") on a `Goal`. Resolving the goal yields a `Transaction`: either a
//! consistent, ordered set of package changes, or the problems that prevent
//! one. Running the transaction hands the changes to a `PackageInstaller`
//! and records them in the history database.
//!
//! # Architecture
//!
//! - `sack`: the package index, published as immutable snapshots
//! - `query`: filtered package sets and spec resolution
//! - `goal`: job accumulation and problem reporting
//! - `resolver`: the dependency solver behind the `Solver` trait
//! - `transaction`: ordering, signature checks, execution and history
//! - `session`: the client-facing façade over all of the above

pub mod base;
pub mod config;
pub mod db;
mod error;
pub mod goal;
pub mod installer;
pub mod logging;
pub mod package;
pub mod progress;
pub mod query;
pub mod repository;
pub mod resolver;
pub mod sack;
pub mod session;
pub mod transaction;
pub mod version;

pub use base::{Base, BaseHandle};
pub use config::ConfigMain;
pub use error::{BoxedCause, Error, Result};
pub use goal::{Goal, GoalAction, GoalJobSettings, GoalProblem, GoalSetting, GoalState, LogEvent, Severity};
pub use installer::{DbInstaller, InstallStep, PackageInstaller, StepKind};
pub use logging::{LogRouter, LogSink, RouterLayer};
pub use package::{Package, PackageId, PackageRecord, Reason, Reldep};
pub use progress::{LogCallbacks, NoopCallbacks, ProgressCallbacks, TransactionCallbacks, TransferStatus};
pub use query::{CmpMode, PackageQuery, ResolveSpecSettings};
pub use repository::{RepoConfStore, RepoConfig, RepoFilter};
pub use resolver::{BacktrackingSolver, Job, Solver, SolverInput, SolverOutcome, SolverProblem};
pub use sack::{PackageSack, RepoSource, SackRepo, SackSnapshot};
pub use session::{KeyValueMap, ResolveResult, ResolvedItem, Session, SessionHandle, SessionManager};
pub use transaction::{
    Transaction, TransactionItemAction, TransactionPackage, TransactionRunResult,
};
pub use version::{Evr, Nevra, NevraForm};
