// src/progress.rs

//! Progress callbacks
//!
//! `ProgressCallbacks` reports long-running work such as loading repository
//! metadata. `TransactionCallbacks` reports the execution of a transaction
//! item by item. Every method has an empty default, so implementations only
//! override what they display.
//!
//! # Example
//!
//! ```ignore
//! struct Counter(AtomicUsize);
//!
//! impl TransactionCallbacks for Counter {
//!     fn install_stop(&self, _item: &TransactionPackage) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//! ```

use crate::transaction::TransactionPackage;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Final state reported to `ProgressCallbacks::on_end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Successful,
    AlreadyExists,
    Error,
}

/// Progress of one unit of work
pub trait ProgressCallbacks: Send + Sync {
    fn on_start(&self, _description: &str, _total: u64) {}

    fn on_progress(&self, _done: u64, _total: u64) {}

    fn on_end(&self, _status: TransferStatus, _message: &str) {}

    /// A source failed; the caller may try another one
    fn on_mirror_failure(&self, _message: &str, _url: &str) {}
}

/// Progress of a running transaction
pub trait TransactionCallbacks: Send + Sync {
    fn transaction_start(&self, _total: u64) {}

    fn install_start(&self, _item: &TransactionPackage, _total: u64) {}

    fn install_progress(&self, _item: &TransactionPackage, _amount: u64, _total: u64) {}

    fn install_stop(&self, _item: &TransactionPackage) {}

    fn uninstall_start(&self, _item: &TransactionPackage, _total: u64) {}

    fn uninstall_progress(&self, _item: &TransactionPackage, _amount: u64, _total: u64) {}

    fn uninstall_stop(&self, _item: &TransactionPackage) {}

    /// An item failed; `message` is what the installer reported
    fn elem_error(&self, _item: &TransactionPackage, _message: &str) {}

    fn transaction_stop(&self, _success: bool) {}
}

/// Callbacks that ignore everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl ProgressCallbacks for NoopCallbacks {}

impl TransactionCallbacks for NoopCallbacks {}

/// Callbacks that report through `tracing`
///
/// Used when no terminal is attached.
#[derive(Debug, Default)]
pub struct LogCallbacks {
    done: AtomicU64,
    total: AtomicU64,
}

impl LogCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    fn step(&self) -> (u64, u64) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        (done, self.total.load(Ordering::Relaxed))
    }
}

impl ProgressCallbacks for LogCallbacks {
    fn on_start(&self, description: &str, _total: u64) {
        info!("{}", description);
    }

    fn on_end(&self, status: TransferStatus, message: &str) {
        if status == TransferStatus::Error {
            warn!("{}", message);
        }
    }

    fn on_mirror_failure(&self, message: &str, url: &str) {
        warn!("Failed to use {}: {}", url, message);
    }
}

impl TransactionCallbacks for LogCallbacks {
    fn transaction_start(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
    }

    fn install_stop(&self, item: &TransactionPackage) {
        let (done, total) = self.step();
        info!("[{}/{}] {} {}", done, total, item.action, item.nevra());
    }

    fn uninstall_stop(&self, item: &TransactionPackage) {
        let (done, total) = self.step();
        info!("[{}/{}] {} {}", done, total, item.action, item.nevra());
    }

    fn elem_error(&self, item: &TransactionPackage, message: &str) {
        warn!("{} {} failed: {}", item.action, item.nevra(), message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{Package, PackageId, PackageRecord, Reason};
    use crate::transaction::TransactionItemAction;
    use std::sync::Arc;

    #[test]
    fn test_log_callbacks_count_steps() {
        let rec = PackageRecord::new("one", "1-1", "noarch").unwrap();
        let pkg = Arc::new(Package::from_record(PackageId(0), "repo1", &rec).unwrap());
        let item = TransactionPackage::new(pkg, TransactionItemAction::Install, Reason::User);

        let callbacks = LogCallbacks::new();
        callbacks.transaction_start(2);
        callbacks.install_stop(&item);
        callbacks.uninstall_stop(&item);
        assert_eq!(callbacks.done.load(Ordering::Relaxed), 2);
    }
}
