// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Package spec arguments
fn specs_arg(required: bool) -> Arg {
    Arg::new("specs")
        .num_args(1..)
        .required(required)
        .help("Package specs (name, NEVRA, glob, provide or file path)")
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).action(ArgAction::SetTrue).help(help)
}

/// Options shared by every command that builds a transaction
fn transaction_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("repo")
            .long("repo")
            .value_name("REPO_ID")
            .action(ArgAction::Append)
            .help("Only take packages from this repository (repeatable, globs allowed)"),
    )
    .arg(flag("skip-unavailable", "Skip specs that match no package instead of failing"))
    .arg(flag("strict", "Fail on any unresolvable spec"))
    .arg(flag("no-strict", "Allow skipping unresolvable specs"))
    .arg(flag("best", "Insist on the best available candidate"))
    .arg(flag("no-best", "Accept older candidates when the best one cannot be installed"))
    .arg(flag("assumeno", "Resolve and show the transaction, then stop"))
    .arg(flag("offline", "Store the transaction to run at next boot"))
    .arg(
        Arg::new("comment")
            .long("comment")
            .value_name("TEXT")
            .help("Comment recorded in the history database"),
    )
}

fn build_cli() -> Command {
    Command::new("rpmgoal")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Resolve package goals into transactions and run them")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Configuration file (TOML)"),
        )
        .arg(
            Arg::new("installroot")
                .long("installroot")
                .value_name("DIR")
                .global(true)
                .help("Installation root directory"),
        )
        .arg(
            Arg::new("setopt")
                .long("setopt")
                .value_name("KEY=VALUE")
                .action(ArgAction::Append)
                .global(true)
                .help("Override a configuration option"),
        )
        .subcommand(transaction_args(
            Command::new("install").about("Install packages").arg(specs_arg(true)),
        ))
        .subcommand(transaction_args(
            Command::new("remove").about("Remove installed packages").arg(specs_arg(true)),
        ))
        .subcommand(transaction_args(
            Command::new("upgrade")
                .about("Upgrade packages (everything installed when no spec is given)")
                .arg(specs_arg(false)),
        ))
        .subcommand(transaction_args(
            Command::new("downgrade")
                .about("Downgrade packages to the next lower available version")
                .arg(specs_arg(true)),
        ))
        .subcommand(transaction_args(
            Command::new("reinstall")
                .about("Reinstall installed packages from a repository")
                .arg(specs_arg(true)),
        ))
        .subcommand(transaction_args(
            Command::new("distro-sync")
                .about("Synchronize packages to the versions in the repositories")
                .arg(specs_arg(false)),
        ))
        .subcommand(
            Command::new("repo").about("Repository commands").subcommand(
                Command::new("list")
                    .about("List configured repositories")
                    .arg(Arg::new("patterns").num_args(0..).help("Repository id globs"))
                    .arg(flag("all", "Show enabled and disabled repositories"))
                    .arg(flag("disabled", "Show only disabled repositories")),
            ),
        )
        .subcommand(
            Command::new("history")
                .about("Transaction history commands")
                .subcommand(Command::new("list").about("List recorded transactions")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("rpmgoal.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
