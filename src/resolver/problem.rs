// src/resolver/problem.rs

//! Solver problem types
//!
//! A `SolverProblem` is one independent reason the solver could not satisfy
//! the request, made of the rules that together block it.

use serde::Serialize;
use std::fmt;

/// One rule that blocks a solution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ProblemRule {
    /// A requirement without any provider in the index
    NothingProvides { dep: String, package: String },
    /// A requirement whose providers all fail to install
    RequiresUninstallable { dep: String, package: String },
    /// `package` conflicts with `dep`, which `provider` provides
    Conflicts {
        package: String,
        dep: String,
        provider: String,
    },
    /// Two packages competing for one `name.arch` slot
    SameName { first: String, second: String },
    /// Jobs that contradict each other
    ConflictingRequests,
    /// `best` was requested and the top candidate cannot be installed
    BestCandidate,
    /// `best` was requested and the top update of `package` cannot be installed
    BestUpdateCandidate { package: String },
    /// The job names a package that is not in the index
    UnknownPackage { package: String },
    /// The solution would remove protected packages
    RemovalOfProtected { names: Vec<String> },
    /// The search gave up
    DecisionBudgetExhausted { decisions: usize },
}

impl fmt::Display for ProblemRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemRule::NothingProvides { dep, package } => {
                write!(f, "nothing provides {} needed by {}", dep, package)
            }
            ProblemRule::RequiresUninstallable { dep, package } => write!(
                f,
                "package {} requires {}, but none of the providers can be installed",
                package, dep
            ),
            ProblemRule::Conflicts {
                package,
                dep,
                provider,
            } => write!(
                f,
                "package {} conflicts with {} provided by {}",
                package, dep, provider
            ),
            ProblemRule::SameName { first, second } => {
                write!(f, "cannot install both {} and {}", first, second)
            }
            ProblemRule::ConflictingRequests => f.write_str("conflicting requests"),
            ProblemRule::BestCandidate => {
                f.write_str("cannot install the best candidate for the job")
            }
            ProblemRule::BestUpdateCandidate { package } => write!(
                f,
                "cannot install the best update candidate for package {}",
                package
            ),
            ProblemRule::UnknownPackage { package } => {
                write!(f, "package {} does not exist", package)
            }
            ProblemRule::RemovalOfProtected { names } => write!(
                f,
                "The operation would result in removing the following protected packages: {}",
                names.join(", ")
            ),
            ProblemRule::DecisionBudgetExhausted { decisions } => write!(
                f,
                "dependency resolution gave up after {} decisions",
                decisions
            ),
        }
    }
}

/// The rules behind one failed request
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct SolverProblem {
    pub rules: Vec<ProblemRule>,
}

impl SolverProblem {
    pub fn new(rules: Vec<ProblemRule>) -> Self {
        let mut problem = Self::default();
        for rule in rules {
            problem.push(rule);
        }
        problem
    }

    /// Append a rule unless an identical one is already present
    pub fn push(&mut self, rule: ProblemRule) {
        if !self.rules.contains(&rule) {
            self.rules.push(rule);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Display for SolverProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<String> = self.rules.iter().map(|r| r.to_string()).collect();
        f.write_str(&rules.join("\n  - "))
    }
}

/// Render problems the way they are shown to users
///
/// A single problem reads `Problem: ...`; several are numbered.
pub fn format_problems(problems: &[SolverProblem]) -> String {
    match problems {
        [] => String::new(),
        [only] => format!("Problem: {}", only),
        many => many
            .iter()
            .enumerate()
            .map(|(i, p)| format!("Problem {}: {}", i + 1, p))
            .collect::<Vec<_>>()
            .join("\n "),
    }
}

/// Drop problems identical (as a rule set) to an earlier one
pub fn dedup_problems(problems: Vec<SolverProblem>) -> Vec<SolverProblem> {
    let mut unique: Vec<SolverProblem> = Vec::new();
    for problem in problems {
        let duplicate = unique.iter().any(|u| {
            u.rules.len() == problem.rules.len()
                && problem.rules.iter().all(|r| u.rules.contains(r))
        });
        if !duplicate {
            unique.push(problem);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_texts() {
        let rule = ProblemRule::NothingProvides {
            dep: "libfoo >= 2".to_string(),
            package: "one-2-1.noarch".to_string(),
        };
        assert_eq!(rule.to_string(), "nothing provides libfoo >= 2 needed by one-2-1.noarch");

        let rule = ProblemRule::RequiresUninstallable {
            dep: "two".to_string(),
            package: "one-2-1.noarch".to_string(),
        };
        assert_eq!(
            rule.to_string(),
            "package one-2-1.noarch requires two, but none of the providers can be installed"
        );

        let rule = ProblemRule::RemovalOfProtected {
            names: vec!["dnf".to_string(), "rpm".to_string()],
        };
        assert!(rule.to_string().ends_with("protected packages: dnf, rpm"));
    }

    #[test]
    fn test_single_problem_format() {
        let problem = SolverProblem::new(vec![
            ProblemRule::BestCandidate,
            ProblemRule::NothingProvides {
                dep: "x".to_string(),
                package: "one-1-1.noarch".to_string(),
            },
        ]);
        assert_eq!(
            format_problems(&[problem]),
            "Problem: cannot install the best candidate for the job\n  - nothing provides x needed by one-1-1.noarch"
        );
    }

    #[test]
    fn test_multiple_problems_are_numbered() {
        let a = SolverProblem::new(vec![ProblemRule::ConflictingRequests]);
        let b = SolverProblem::new(vec![ProblemRule::BestCandidate]);
        assert_eq!(
            format_problems(&[a, b]),
            "Problem 1: conflicting requests\n Problem 2: cannot install the best candidate for the job"
        );
    }

    #[test]
    fn test_dedup() {
        let a = SolverProblem::new(vec![ProblemRule::ConflictingRequests, ProblemRule::BestCandidate]);
        let b = SolverProblem::new(vec![ProblemRule::BestCandidate, ProblemRule::ConflictingRequests]);
        assert_eq!(dedup_problems(vec![a, b]).len(), 1);

        let single = SolverProblem::new(vec![ProblemRule::BestCandidate, ProblemRule::BestCandidate]);
        assert_eq!(single.rules.len(), 1);
    }
}
