// src/cli.rs
//! CLI definitions for rpmgoal
//!
//! Package commands each turn their specs into goal jobs, resolve the goal
//! and run the resulting transaction. The command implementations are in the
//! `commands` module.

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rpmgoal")]
#[command(version)]
#[command(about = "Resolve package goals into transactions and run them", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Installation root directory
    #[arg(long, global = true)]
    pub installroot: Option<String>,

    /// Override a configuration option (KEY=VALUE)
    #[arg(long, global = true, value_name = "KEY=VALUE")]
    pub setopt: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that builds a transaction
#[derive(Args, Debug, Clone, Default)]
pub struct TransactionOpts {
    /// Only take packages from this repository (repeatable, globs allowed)
    #[arg(long = "repo", value_name = "REPO_ID")]
    pub repos: Vec<String>,

    /// Skip specs that match no package instead of failing
    #[arg(long)]
    pub skip_unavailable: bool,

    /// Fail on any unresolvable spec
    #[arg(long, conflicts_with = "no_strict")]
    pub strict: bool,

    /// Allow skipping unresolvable specs
    #[arg(long)]
    pub no_strict: bool,

    /// Insist on the best available candidate
    #[arg(long, conflicts_with = "no_best")]
    pub best: bool,

    /// Accept older candidates when the best one cannot be installed
    #[arg(long)]
    pub no_best: bool,

    /// Resolve and show the transaction, then stop
    #[arg(long)]
    pub assumeno: bool,

    /// Store the transaction to run at next boot
    #[arg(long)]
    pub offline: bool,

    /// Comment recorded in the history database
    #[arg(long)]
    pub comment: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install packages
    Install {
        /// Package specs (name, NEVRA, glob, provide or file path)
        #[arg(required = true)]
        specs: Vec<String>,

        #[command(flatten)]
        opts: TransactionOpts,
    },

    /// Remove installed packages
    Remove {
        /// Package specs
        #[arg(required = true)]
        specs: Vec<String>,

        #[command(flatten)]
        opts: TransactionOpts,
    },

    /// Upgrade packages (everything installed when no spec is given)
    Upgrade {
        /// Package specs
        specs: Vec<String>,

        #[command(flatten)]
        opts: TransactionOpts,
    },

    /// Downgrade packages to the next lower available version
    Downgrade {
        /// Package specs
        #[arg(required = true)]
        specs: Vec<String>,

        #[command(flatten)]
        opts: TransactionOpts,
    },

    /// Reinstall installed packages from a repository
    Reinstall {
        /// Package specs
        #[arg(required = true)]
        specs: Vec<String>,

        #[command(flatten)]
        opts: TransactionOpts,
    },

    /// Synchronize packages to the versions in the repositories
    DistroSync {
        /// Package specs (everything installed when none is given)
        specs: Vec<String>,

        #[command(flatten)]
        opts: TransactionOpts,
    },

    /// Repository commands
    #[command(subcommand)]
    Repo(RepoCommands),

    /// Transaction history commands
    #[command(subcommand)]
    History(HistoryCommands),
}

#[derive(Subcommand)]
pub enum RepoCommands {
    /// List configured repositories
    List {
        /// Repository id globs
        patterns: Vec<String>,

        /// Show enabled and disabled repositories
        #[arg(long, conflicts_with = "disabled")]
        all: bool,

        /// Show only disabled repositories
        #[arg(long)]
        disabled: bool,
    },
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List recorded transactions
    List,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_install_flags() {
        let cli = Cli::try_parse_from([
            "rpmgoal",
            "--installroot",
            "/tmp/root",
            "install",
            "one",
            "two",
            "--repo",
            "repo1",
            "--no-strict",
            "--assumeno",
        ])
        .unwrap();
        assert_eq!(cli.installroot.as_deref(), Some("/tmp/root"));
        match cli.command {
            Commands::Install { specs, opts } => {
                assert_eq!(specs, vec!["one", "two"]);
                assert_eq!(opts.repos, vec!["repo1"]);
                assert!(opts.no_strict);
                assert!(!opts.strict);
                assert!(opts.assumeno);
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_conflicting_flags() {
        assert!(Cli::try_parse_from(["rpmgoal", "install", "one", "--best", "--no-best"]).is_err());
        assert!(Cli::try_parse_from(["rpmgoal", "install"]).is_err());
    }

    #[test]
    fn test_upgrade_without_specs() {
        let cli = Cli::try_parse_from(["rpmgoal", "upgrade"]).unwrap();
        assert!(matches!(cli.command, Commands::Upgrade { ref specs, .. } if specs.is_empty()));
    }
}
