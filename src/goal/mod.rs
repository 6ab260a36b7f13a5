// src/goal/mod.rs

//! Goals: what the caller wants done to the installed package set
//!
//! A `Goal` accumulates jobs ("install these specs", "remove that query")
//! and turns them into a `Transaction` with a single call to `resolve()`.
//! Each job is first resolved against the package sack; specs that match
//! nothing usable are reported as log events on the transaction. What is
//! left goes to the dependency solver as one request.

pub mod problem;
mod resolve;
pub mod settings;

pub use problem::{GoalProblem, LogEvent, Severity};
pub use settings::{GoalAction, GoalJobSettings, GoalSetting};

use crate::base::{Base, BaseHandle};
use crate::error::{Error, Result};
use crate::package::{PackageId, Reason};
use crate::query::PackageQuery;
use crate::resolver::{BacktrackingSolver, Solver};
use crate::transaction::Transaction;
use resolve::JobResolver;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Lifecycle of a goal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalState {
    Empty,
    JobsAccumulated,
    Resolving,
    /// `resolve()` produced a transaction without problems
    Resolved,
    /// `resolve()` produced a transaction with problems, or failed
    Failed,
}

/// What a job applies to
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum JobTarget {
    Spec(String),
    Packages(Vec<PackageId>),
    /// Every installed package
    All,
}

#[derive(Debug, Clone)]
pub(crate) struct GoalJob {
    pub action: GoalAction,
    pub target: JobTarget,
    pub settings: GoalJobSettings,
}

pub struct Goal {
    base: BaseHandle,
    sack_id: u64,
    jobs: Vec<GoalJob>,
    state: GoalState,
    solver: Option<Box<dyn Solver>>,
}

impl fmt::Debug for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Goal")
            .field("jobs", &self.jobs.len())
            .field("state", &self.state)
            .finish()
    }
}

impl Goal {
    pub fn new(base: &Arc<Base>) -> Self {
        Self {
            base: base.handle(),
            sack_id: base.sack().id(),
            jobs: Vec::new(),
            state: GoalState::Empty,
            solver: None,
        }
    }

    /// Use `solver` instead of the built-in backtracking solver
    pub fn set_solver(&mut self, solver: Box<dyn Solver>) {
        self.solver = Some(solver);
    }

    pub fn state(&self) -> GoalState {
        self.state
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn push(&mut self, action: GoalAction, target: JobTarget, settings: GoalJobSettings) -> Result<()> {
        match self.state {
            GoalState::Empty | GoalState::JobsAccumulated => {}
            _ => {
                return Err(Error::LogicError(
                    "Cannot add jobs to a goal that has already been resolved".to_string(),
                ));
            }
        }
        if let JobTarget::Spec(spec) = &target {
            if spec.trim().is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "{} job requires a package spec",
                    action
                )));
            }
        }
        debug!("Adding {} job for {:?}", action, target);
        self.jobs.push(GoalJob {
            action,
            target,
            settings,
        });
        self.state = GoalState::JobsAccumulated;
        Ok(())
    }

    fn push_query(&mut self, action: GoalAction, query: &PackageQuery, settings: GoalJobSettings) -> Result<()> {
        if query.snapshot().sack_id() != self.sack_id {
            return Err(Error::QueryError(
                "The query belongs to a different package sack".to_string(),
            ));
        }
        self.push(action, JobTarget::Packages(query.ids()), settings)
    }

    pub fn add_rpm_install(&mut self, spec: &str, settings: GoalJobSettings) -> Result<()> {
        self.push(GoalAction::Install, JobTarget::Spec(spec.to_string()), settings)
    }

    pub fn add_rpm_remove(&mut self, spec: &str, settings: GoalJobSettings) -> Result<()> {
        self.push(GoalAction::Remove, JobTarget::Spec(spec.to_string()), settings)
    }

    pub fn add_rpm_upgrade(&mut self, spec: &str, settings: GoalJobSettings) -> Result<()> {
        self.push(GoalAction::Upgrade, JobTarget::Spec(spec.to_string()), settings)
    }

    /// Upgrade every installed package
    pub fn add_rpm_upgrade_all(&mut self, settings: GoalJobSettings) -> Result<()> {
        self.push(GoalAction::UpgradeAll, JobTarget::All, settings)
    }

    pub fn add_rpm_downgrade(&mut self, spec: &str, settings: GoalJobSettings) -> Result<()> {
        self.push(GoalAction::Downgrade, JobTarget::Spec(spec.to_string()), settings)
    }

    pub fn add_rpm_reinstall(&mut self, spec: &str, settings: GoalJobSettings) -> Result<()> {
        self.push(GoalAction::Reinstall, JobTarget::Spec(spec.to_string()), settings)
    }

    pub fn add_rpm_distro_sync(&mut self, spec: &str, settings: GoalJobSettings) -> Result<()> {
        self.push(GoalAction::DistroSync, JobTarget::Spec(spec.to_string()), settings)
    }

    /// Sync every installed package with the repositories
    pub fn add_rpm_distro_sync_all(&mut self, settings: GoalJobSettings) -> Result<()> {
        self.push(GoalAction::DistroSyncAll, JobTarget::All, settings)
    }

    /// Change the recorded install reason of installed packages
    ///
    /// A change to `Reason::Group` needs the id of the group.
    pub fn add_rpm_reason_change(
        &mut self,
        spec: &str,
        reason: Reason,
        group_id: Option<&str>,
        mut settings: GoalJobSettings,
    ) -> Result<()> {
        if reason == Reason::Group && group_id.is_none_or(|g| g.is_empty()) {
            return Err(Error::InvalidArgument(format!(
                "Reason change for \"{}\" to group requires a group id",
                spec
            )));
        }
        settings.reason = Some(reason);
        settings.group_id = group_id.map(str::to_string);
        self.push(GoalAction::ReasonChange, JobTarget::Spec(spec.to_string()), settings)
    }

    pub fn add_package_install(&mut self, query: &PackageQuery, settings: GoalJobSettings) -> Result<()> {
        self.push_query(GoalAction::Install, query, settings)
    }

    pub fn add_package_remove(&mut self, query: &PackageQuery, settings: GoalJobSettings) -> Result<()> {
        self.push_query(GoalAction::Remove, query, settings)
    }

    pub fn add_package_upgrade(&mut self, query: &PackageQuery, settings: GoalJobSettings) -> Result<()> {
        self.push_query(GoalAction::Upgrade, query, settings)
    }

    pub fn add_package_downgrade(&mut self, query: &PackageQuery, settings: GoalJobSettings) -> Result<()> {
        self.push_query(GoalAction::Downgrade, query, settings)
    }

    pub fn add_package_reinstall(&mut self, query: &PackageQuery, settings: GoalJobSettings) -> Result<()> {
        self.push_query(GoalAction::Reinstall, query, settings)
    }

    pub fn add_package_distro_sync(&mut self, query: &PackageQuery, settings: GoalJobSettings) -> Result<()> {
        self.push_query(GoalAction::DistroSync, query, settings)
    }

    /// Resolve all jobs into a transaction
    ///
    /// Can be called once. Problems with individual jobs do not make this
    /// fail; they end up in the transaction's `problems()` and
    /// `resolve_logs()`, and a transaction with problems has no items.
    pub fn resolve(&mut self) -> Result<Transaction> {
        match self.state {
            GoalState::Resolving | GoalState::Resolved | GoalState::Failed => {
                return Err(Error::LogicError("Goal has already been resolved".to_string()));
            }
            GoalState::Empty | GoalState::JobsAccumulated => {}
        }
        self.state = GoalState::Resolving;

        let base = match self.base.get() {
            Ok(base) => base,
            Err(e) => {
                self.state = GoalState::Failed;
                return Err(e);
            }
        };

        let mut resolver = JobResolver::new(&base);
        for job in &self.jobs {
            resolver.add_job(job);
        }

        let default_solver = BacktrackingSolver::new();
        let solver: &dyn Solver = match &self.solver {
            Some(solver) => solver.as_ref(),
            None => &default_solver,
        };
        let (items, problems, logs) = resolver.solve(solver);

        self.state = if problems.is_empty() {
            GoalState::Resolved
        } else {
            GoalState::Failed
        };
        info!(
            "Resolved {} jobs into {} items ({} log events, problems: {})",
            self.jobs.len(),
            items.len(),
            logs.len(),
            problems.as_str()
        );
        Ok(Transaction::new(self.base.clone(), items, problems, logs))
    }
}
