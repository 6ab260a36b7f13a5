// src/commands/progress.rs

//! Terminal progress bars for repository loading and transactions

use indicatif::{ProgressBar, ProgressStyle};
use rpmgoal::{ProgressCallbacks, TransactionCallbacks, TransactionPackage, TransferStatus};
use std::sync::Mutex;
use std::time::Duration;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} ({pos}/{len}) [{bar:40.green/dim}] {percent}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/// Spinner per repository while metadata loads
#[derive(Default)]
pub struct RepoProgress {
    current: Mutex<Option<ProgressBar>>,
}

impl RepoProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressCallbacks for RepoProgress {
    fn on_start(&self, description: &str, _total: u64) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(spinner_style());
        pb.set_message(description.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        if let Ok(mut current) = self.current.lock() {
            if let Some(old) = current.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn on_progress(&self, done: u64, total: u64) {
        if let Ok(current) = self.current.lock() {
            if let Some(pb) = current.as_ref() {
                pb.set_length(total);
                pb.set_position(done);
            }
        }
    }

    fn on_end(&self, status: TransferStatus, message: &str) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(pb) = current.take() {
                match status {
                    TransferStatus::Error => pb.abandon_with_message(format!("[FAILED] {}", message)),
                    _ => pb.finish_and_clear(),
                }
            }
        }
    }

    fn on_mirror_failure(&self, message: &str, url: &str) {
        eprintln!("Failed to load {}: {}", url, message);
    }
}

/// Overall bar across the items of a running transaction
pub struct TransactionProgress {
    bar: ProgressBar,
}

impl TransactionProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(bar_style());
        Self { bar }
    }

    fn item_done(&self, item: &TransactionPackage) {
        self.bar.inc(1);
        self.bar.println(format!("  {:<12} {}", item.action.as_str(), item.nevra()));
    }
}

impl Default for TransactionProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionCallbacks for TransactionProgress {
    fn transaction_start(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_message("Running transaction");
    }

    fn install_start(&self, item: &TransactionPackage, _total: u64) {
        self.bar.set_message(format!("Installing {}", item.package.name));
    }

    fn install_stop(&self, item: &TransactionPackage) {
        self.item_done(item);
    }

    fn uninstall_start(&self, item: &TransactionPackage, _total: u64) {
        self.bar.set_message(format!("Removing {}", item.package.name));
    }

    fn uninstall_stop(&self, item: &TransactionPackage) {
        self.item_done(item);
    }

    fn elem_error(&self, item: &TransactionPackage, message: &str) {
        self.bar
            .println(format!("  [FAILED] {} {}: {}", item.action.as_str(), item.nevra(), message));
    }

    fn transaction_stop(&self, success: bool) {
        if success {
            self.bar.finish_with_message("Transaction complete");
        } else {
            self.bar.abandon_with_message("Transaction failed");
        }
    }
}
