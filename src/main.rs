// src/main.rs

use anyhow::Result;
use clap::Parser;
use rpmgoal::logging::RouterLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands, HistoryCommands, RepoCommands};
use commands::PackageAction;

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(RouterLayer)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Install { specs, opts } => {
            commands::cmd_packages(&cli, PackageAction::Install, specs, opts)
        }
        Commands::Remove { specs, opts } => {
            commands::cmd_packages(&cli, PackageAction::Remove, specs, opts)
        }
        Commands::Upgrade { specs, opts } => {
            commands::cmd_packages(&cli, PackageAction::Upgrade, specs, opts)
        }
        Commands::Downgrade { specs, opts } => {
            commands::cmd_packages(&cli, PackageAction::Downgrade, specs, opts)
        }
        Commands::Reinstall { specs, opts } => {
            commands::cmd_packages(&cli, PackageAction::Reinstall, specs, opts)
        }
        Commands::DistroSync { specs, opts } => {
            commands::cmd_packages(&cli, PackageAction::DistroSync, specs, opts)
        }
        Commands::Repo(RepoCommands::List {
            patterns,
            all,
            disabled,
        }) => commands::cmd_repo_list(&cli, patterns, *all, *disabled),
        Commands::History(HistoryCommands::List) => commands::cmd_history_list(&cli),
    }
}
