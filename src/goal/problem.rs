// src/goal/problem.rs

//! Goal problems and resolve log events
//!
//! Every job that cannot be turned into a solver request leaves a
//! `LogEvent` on the transaction. Events that stop the goal set a bit in
//! the transaction's `GoalProblem` mask; warnings only get logged.

use super::settings::{GoalAction, GoalJobSettings};
use crate::resolver::{format_problems, SolverProblem};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

bitflags::bitflags! {
    /// Kinds of problems found while resolving a goal
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GoalProblem: u32 {
        const SOLVER_ERROR = 1 << 0;
        const NOT_FOUND = 1 << 1;
        const EXCLUDED = 1 << 2;
        const ONLY_SRC = 1 << 3;
        const NOT_FOUND_IN_REPOSITORIES = 1 << 4;
        const NOT_INSTALLED = 1 << 5;
        const NOT_INSTALLED_FOR_ARCHITECTURE = 1 << 6;
        const HINT_ICASE = 1 << 7;
        const HINT_ALTERNATIVES = 1 << 8;
        const INSTALLED_LOWEST_VERSION = 1 << 9;
        const INSTALLED_IN_DIFFERENT_VERSION = 1 << 10;
        const NOT_AVAILABLE = 1 << 11;
        const ALREADY_INSTALLED = 1 << 12;
        const SOLVER_PROBLEM_STRICT_RESOLVEMENT = 1 << 13;
        const UNSUPPORTED_ACTION = 1 << 15;
    }
}

impl GoalProblem {
    pub const NO_PROBLEM: GoalProblem = GoalProblem::empty();

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NO_PROBLEM => "no_problem",
            Self::SOLVER_ERROR => "solver_error",
            Self::NOT_FOUND => "not_found",
            Self::EXCLUDED => "excluded",
            Self::ONLY_SRC => "only_src",
            Self::NOT_FOUND_IN_REPOSITORIES => "not_found_in_repositories",
            Self::NOT_INSTALLED => "not_installed",
            Self::NOT_INSTALLED_FOR_ARCHITECTURE => "not_installed_for_architecture",
            Self::HINT_ICASE => "hint_icase",
            Self::HINT_ALTERNATIVES => "hint_alternatives",
            Self::INSTALLED_LOWEST_VERSION => "installed_lowest_version",
            Self::INSTALLED_IN_DIFFERENT_VERSION => "installed_in_different_version",
            Self::NOT_AVAILABLE => "not_available",
            Self::ALREADY_INSTALLED => "already_installed",
            Self::SOLVER_PROBLEM_STRICT_RESOLVEMENT => "solver_problem_strict_resolvement",
            Self::UNSUPPORTED_ACTION => "unsupported_action",
            _ => "multiple",
        }
    }
}

impl Serialize for GoalProblem {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

/// Whether an event blocks the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One entry of the resolve log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    pub action: GoalAction,
    /// A single problem bit
    pub problem: GoalProblem,
    pub severity: Severity,
    pub settings: GoalJobSettings,
    pub spec: String,
    pub additional_data: BTreeSet<String>,
    pub solver_problems: Vec<SolverProblem>,
}

impl LogEvent {
    pub fn new(
        action: GoalAction,
        problem: GoalProblem,
        severity: Severity,
        settings: &GoalJobSettings,
        spec: impl Into<String>,
    ) -> Self {
        Self {
            action,
            problem,
            severity,
            settings: settings.clone(),
            spec: spec.into(),
            additional_data: BTreeSet::new(),
            solver_problems: Vec::new(),
        }
    }

    pub fn with_data<S: Into<String>>(mut self, data: impl IntoIterator<Item = S>) -> Self {
        self.additional_data.extend(data.into_iter().map(Into::into));
        self
    }

    /// Event carrying problems reported by the solver
    pub fn solver(problem: GoalProblem, problems: Vec<SolverProblem>) -> Self {
        Self {
            action: GoalAction::Resolve,
            problem,
            severity: Severity::Error,
            settings: GoalJobSettings::default(),
            spec: String::new(),
            additional_data: BTreeSet::new(),
            solver_problems: problems,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    fn data(&self) -> String {
        self.additional_data
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spec = &self.spec;
        match self.problem {
            GoalProblem::NOT_FOUND if self.action == GoalAction::Remove => {
                write!(f, "No packages to remove for argument: {}", spec)
            }
            GoalProblem::NOT_FOUND => write!(f, "No match for argument: {}", spec),
            GoalProblem::NOT_FOUND_IN_REPOSITORIES => write!(
                f,
                "No match for argument '{}' in repositories '{}'",
                spec,
                self.settings.to_repo_ids.join(", ")
            ),
            GoalProblem::NOT_INSTALLED => write!(
                f,
                "Packages for argument '{}' available, but not installed.",
                spec
            ),
            GoalProblem::NOT_INSTALLED_FOR_ARCHITECTURE => write!(
                f,
                "Packages for argument '{}' available, but installed for a different architecture.",
                spec
            ),
            GoalProblem::ONLY_SRC => {
                write!(f, "Argument '{}' matches only source packages.", spec)
            }
            GoalProblem::EXCLUDED => {
                write!(f, "Argument '{}' matches only excluded packages.", spec)
            }
            GoalProblem::HINT_ICASE => write!(f, "  * Maybe you meant: {}", self.data()),
            GoalProblem::HINT_ALTERNATIVES => write!(
                f,
                "There are following alternatives for '{}': {}",
                spec,
                self.data()
            ),
            GoalProblem::INSTALLED_LOWEST_VERSION => write!(
                f,
                "The lowest available version of the \"{}\" package is already installed, cannot downgrade it.",
                self.data()
            ),
            GoalProblem::INSTALLED_IN_DIFFERENT_VERSION => write!(
                f,
                "Installed packages for argument '{}' are not available in repositories in the same version, available versions: {}, cannot reinstall.",
                spec,
                self.data()
            ),
            GoalProblem::NOT_AVAILABLE => write!(
                f,
                "Packages for argument '{}' installed, but not available.",
                spec
            ),
            GoalProblem::ALREADY_INSTALLED if self.action == GoalAction::ReasonChange => write!(
                f,
                "Package \"{}\" is already installed with reason \"{}\".",
                self.data(),
                self.settings.reason.unwrap_or_default()
            ),
            GoalProblem::ALREADY_INSTALLED => {
                write!(f, "Package \"{}\" is already installed.", self.data())
            }
            GoalProblem::UNSUPPORTED_ACTION => write!(
                f,
                "{} action for argument \"{}\" is not supported.",
                self.action, spec
            ),
            _ => f.write_str(&format_problems(&self.solver_problems)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Reason;
    use crate::resolver::ProblemRule;

    fn event(action: GoalAction, problem: GoalProblem, spec: &str) -> LogEvent {
        LogEvent::new(action, problem, Severity::Error, &GoalJobSettings::default(), spec)
    }

    #[test]
    fn test_bit_values() {
        assert_eq!(GoalProblem::NO_PROBLEM.bits(), 0);
        assert_eq!(GoalProblem::NOT_FOUND_IN_REPOSITORIES.bits(), 16);
        assert_eq!(GoalProblem::ALREADY_INSTALLED.bits(), 4096);
        assert_eq!(GoalProblem::SOLVER_PROBLEM_STRICT_RESOLVEMENT.bits(), 8192);
        assert_eq!(GoalProblem::UNSUPPORTED_ACTION.bits(), 32768);
    }

    #[test]
    fn test_not_found_messages() {
        assert_eq!(
            event(GoalAction::Install, GoalProblem::NOT_FOUND, "no_one").to_string(),
            "No match for argument: no_one"
        );
        assert_eq!(
            event(GoalAction::Remove, GoalProblem::NOT_FOUND, "no_one").to_string(),
            "No packages to remove for argument: no_one"
        );
        assert!(event(GoalAction::Install, GoalProblem::NOT_FOUND, "no_one").is_error());
    }

    #[test]
    fn test_repo_message_lists_repo_ids() {
        let settings = GoalJobSettings::new().with_repo_ids(["repo2", "repo3"]);
        let event = LogEvent::new(
            GoalAction::Install,
            GoalProblem::NOT_FOUND_IN_REPOSITORIES,
            Severity::Error,
            &settings,
            "one",
        );
        assert_eq!(
            event.to_string(),
            "No match for argument 'one' in repositories 'repo2, repo3'"
        );
    }

    #[test]
    fn test_messages_with_data() {
        let e = event(GoalAction::Install, GoalProblem::ALREADY_INSTALLED, "one")
            .with_data(["one-1-1.noarch"]);
        assert_eq!(e.to_string(), "Package \"one-1-1.noarch\" is already installed.");

        let mut e = event(GoalAction::ReasonChange, GoalProblem::ALREADY_INSTALLED, "one")
            .with_data(["one-1-1.noarch"]);
        e.settings.reason = Some(Reason::User);
        assert_eq!(
            e.to_string(),
            "Package \"one-1-1.noarch\" is already installed with reason \"user\"."
        );

        let e = event(GoalAction::Reinstall, GoalProblem::INSTALLED_IN_DIFFERENT_VERSION, "one")
            .with_data(["one-2-1.noarch", "one-3-1.noarch"]);
        assert!(e.to_string().contains("available versions: one-2-1.noarch, one-3-1.noarch"));

        let e = event(GoalAction::Downgrade, GoalProblem::UNSUPPORTED_ACTION, "one");
        assert_eq!(e.to_string(), "Downgrade action for argument \"one\" is not supported.");
    }

    #[test]
    fn test_solver_event_renders_problems() {
        let problem = SolverProblem::new(vec![ProblemRule::ConflictingRequests]);
        let e = LogEvent::solver(GoalProblem::SOLVER_ERROR, vec![problem]);
        assert_eq!(e.to_string(), "Problem: conflicting requests");
    }
}
