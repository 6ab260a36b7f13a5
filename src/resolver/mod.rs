// src/resolver/mod.rs

//! Dependency resolution
//!
//! The goal turns user requests into solver `Job`s over package ids. A
//! `Solver` takes those jobs plus the sack snapshot and returns either an
//! `Assignment` (what to install and remove, and why) or the problems that
//! block a solution. `graph` orders a solved transaction for execution.

mod engine;
pub mod graph;
mod problem;

pub use engine::{BacktrackingSolver, DEFAULT_DECISION_BUDGET};
pub use graph::DependencyGraph;
pub use problem::{dedup_problems, format_problems, ProblemRule, SolverProblem};

use crate::package::{PackageId, Reason};
use crate::sack::SackSnapshot;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One request handed to the solver
///
/// Candidate lists are ordered best first; the solver tries them in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    /// Install one of `candidates`
    ///
    /// Satisfied without change when the first candidate's NEVRA is already
    /// installed, unless `reinstall` is set.
    Install {
        candidates: Vec<PackageId>,
        best: bool,
        optional: bool,
        reinstall: bool,
        reason: Reason,
    },
    /// Remove installed `targets` and everything that depends on them
    Remove {
        targets: Vec<PackageId>,
        clean_deps: bool,
    },
    /// Move installed packages to newer `candidates` of the same name
    Upgrade {
        candidates: Vec<PackageId>,
        best: bool,
        optional: bool,
    },
    /// Move installed packages to the best of `candidates`, up or down
    DistroSync {
        candidates: Vec<PackageId>,
        optional: bool,
    },
    /// Keep installed `targets` exactly as they are
    Lock { targets: Vec<PackageId> },
}

impl Job {
    pub fn is_optional(&self) -> bool {
        match self {
            Job::Install { optional, .. }
            | Job::Upgrade { optional, .. }
            | Job::DistroSync { optional, .. } => *optional,
            Job::Remove { .. } | Job::Lock { .. } => false,
        }
    }
}

/// Everything a solver needs for one run
#[derive(Debug, Clone)]
pub struct SolverInput {
    pub snapshot: Arc<SackSnapshot>,
    pub jobs: Vec<Job>,
    /// Package names that may never be removed
    pub protected: BTreeSet<String>,
    pub install_weak_deps: bool,
    /// Architecture new packages must run on
    pub system_arch: String,
}

impl SolverInput {
    pub fn new(snapshot: Arc<SackSnapshot>, system_arch: impl Into<String>) -> Self {
        Self {
            snapshot,
            jobs: Vec::new(),
            protected: BTreeSet::new(),
            install_weak_deps: true,
            system_arch: system_arch.into(),
        }
    }
}

/// An optional job the solver dropped instead of failing
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedJob {
    /// Index into `SolverInput::jobs`
    pub job: usize,
    pub problem: SolverProblem,
}

/// A consistent end state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment {
    /// Packages to bring in, ascending by id
    pub install: Vec<PackageId>,
    /// Installed packages that go away, ascending by id
    pub remove: Vec<PackageId>,
    /// Why each package in `install` or `remove` is part of the result
    ///
    /// `Reason::None` marks packages whose reason the caller decides, such
    /// as upgrades that inherit the installed package's reason.
    pub reasons: BTreeMap<PackageId, Reason>,
    pub skipped: Vec<SkippedJob>,
}

impl Assignment {
    pub fn reason(&self, id: PackageId) -> Reason {
        self.reasons.get(&id).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolverOutcome {
    Solved(Assignment),
    Unsolvable(Vec<SolverProblem>),
}

/// A dependency solver
pub trait Solver: Send + Sync {
    fn solve(&self, input: &SolverInput) -> SolverOutcome;
}
