// src/session/goal.rs

//! `Goal` interface: resolve the session goal and run the result

use super::options::{self, KeyValueMap};
use super::Session;
use crate::error::{Error, Result};
use crate::goal::{Goal, GoalProblem, LogEvent};
use crate::progress::{LogCallbacks, TransactionCallbacks};
use crate::transaction::{Transaction, TransactionPackage, TransactionRunResult};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tracing::{info, warn};

const NOT_RESOLVED: &str = "Transaction has to be resolved first. Call Goal.resolve() first.";

/// Overall outcome of `resolve`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u32)]
pub enum ResolveResult {
    NoProblem = 0,
    /// Resolved, with warnings or skipped jobs
    Warning = 1,
    Error = 2,
}

impl ResolveResult {
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// One transaction item as reported to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedItem {
    pub object_type: String,
    pub action: String,
    pub reason: String,
    pub transaction_item_attrs: KeyValueMap,
    pub package_attrs: KeyValueMap,
}

impl ResolvedItem {
    fn from_item(item: &TransactionPackage) -> Self {
        let pkg = &item.package;
        let mut package_attrs = KeyValueMap::new();
        package_attrs.insert("id".into(), json!(pkg.id.index()));
        package_attrs.insert("name".into(), json!(pkg.name));
        package_attrs.insert("epoch".into(), json!(pkg.epoch().to_string()));
        package_attrs.insert("version".into(), json!(pkg.version()));
        package_attrs.insert("release".into(), json!(pkg.release()));
        package_attrs.insert("arch".into(), json!(pkg.arch));
        package_attrs.insert("evr".into(), json!(pkg.evr_string()));
        package_attrs.insert("nevra".into(), json!(pkg.nevra()));
        package_attrs.insert("full_nevra".into(), json!(pkg.full_nevra()));
        package_attrs.insert("repo_id".into(), json!(pkg.repo_id));
        package_attrs.insert(
            "from_repo_id".into(),
            json!(pkg.from_repo_id.clone().unwrap_or_default()),
        );
        package_attrs.insert("install_size".into(), json!(pkg.install_size));
        package_attrs.insert("download_size".into(), json!(pkg.download_size));
        package_attrs.insert("reason".into(), json!(pkg.reason.as_str()));

        let mut transaction_item_attrs = KeyValueMap::new();
        if !item.replaces.is_empty() {
            let replaces: Vec<usize> = item.replaces.iter().map(|id| id.index()).collect();
            transaction_item_attrs.insert("replaces".into(), json!(replaces));
        }

        Self {
            object_type: item.item_type().as_str().to_string(),
            action: item.action.as_str().to_string(),
            reason: item.reason.as_str().to_string(),
            transaction_item_attrs,
            package_attrs,
        }
    }
}

fn log_event_map(event: &LogEvent) -> KeyValueMap {
    let mut map = KeyValueMap::new();
    map.insert("action".into(), json!(event.action.as_str()));
    map.insert("problem".into(), json!(event.problem.bits()));
    map.insert("severity".into(), json!(event.severity));
    map.insert(
        "goal_job_settings".into(),
        json!({ "to_repo_ids": event.settings.to_repo_ids }),
    );
    if !event.spec.is_empty() {
        map.insert("spec".into(), json!(event.spec));
    }
    if !event.additional_data.is_empty() {
        map.insert("additional_data".into(), json!(event.additional_data));
    }
    if !event.solver_problems.is_empty() {
        let problems: Vec<Vec<String>> = event
            .solver_problems
            .iter()
            .map(|p| p.rules.iter().map(|r| r.to_string()).collect())
            .collect();
        map.insert("solver_problems".into(), json!(problems));
    }
    map
}

#[derive(Serialize)]
struct OfflineTransactionState {
    transaction_id: String,
    created_at: String,
    transaction: Value,
}

pub struct GoalService<'a> {
    session: &'a Session,
}

impl<'a> GoalService<'a> {
    pub(super) fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Resolve the jobs added so far
    ///
    /// Items are returned only when there are no problems. The session
    /// starts a fresh goal and keeps the transaction for `do_transaction`.
    pub fn resolve(&self, _options: &KeyValueMap) -> Result<(Vec<ResolvedItem>, ResolveResult)> {
        let base = self.session.base()?;
        let transaction = {
            let mut goal = self.session.lock_goal()?;
            let mut resolving = std::mem::replace(&mut *goal, Goal::new(base));
            resolving.resolve()?
        };

        let (items, result) = if transaction.problems() != GoalProblem::NO_PROBLEM {
            (Vec::new(), ResolveResult::Error)
        } else {
            let items = transaction.items().iter().map(ResolvedItem::from_item).collect();
            let result = if transaction.resolve_logs().is_empty() {
                ResolveResult::NoProblem
            } else {
                ResolveResult::Warning
            };
            (items, result)
        };

        *self.session.lock_transaction()? = Some(transaction);
        Ok((items, result))
    }

    fn with_transaction<T>(&self, f: impl FnOnce(&mut Transaction) -> Result<T>) -> Result<T> {
        let mut guard = self.session.lock_transaction()?;
        match guard.as_mut() {
            Some(transaction) => f(transaction),
            None => Err(Error::LogicError(NOT_RESOLVED.to_string())),
        }
    }

    pub fn get_transaction_problems_string(&self) -> Result<Vec<String>> {
        self.with_transaction(|t| Ok(t.resolve_logs_as_strings()))
    }

    pub fn get_transaction_problems(&self) -> Result<Vec<KeyValueMap>> {
        self.with_transaction(|t| Ok(t.resolve_logs().iter().map(log_event_map).collect()))
    }

    /// Run the resolved transaction, or store it for the next boot
    ///
    /// Options: `offline` (bool) and `comment` (string).
    pub fn do_transaction(&self, options: &KeyValueMap) -> Result<()> {
        self.do_transaction_with(options, Arc::new(LogCallbacks::new()))
    }

    /// `do_transaction` reporting item progress to `callbacks`
    pub fn do_transaction_with(
        &self,
        options: &KeyValueMap,
        callbacks: Arc<dyn TransactionCallbacks>,
    ) -> Result<()> {
        let offline = options::get_bool(options, "offline")?.unwrap_or(false);
        let comment = options::get_string(options, "comment")?;
        let base = self.session.base()?;

        self.with_transaction(|transaction| {
            if transaction.problems() != GoalProblem::NO_PROBLEM {
                return Err(Error::TransactionError(
                    TransactionRunResult::ErrorResolve.to_string(),
                ));
            }
            if let Some(comment) = &comment {
                transaction.set_comment(comment.clone());
            }

            if offline {
                let path = base.config().offline_transaction_path();
                let state = OfflineTransactionState {
                    transaction_id: uuid::Uuid::new_v4().to_string(),
                    created_at: Utc::now().to_rfc3339(),
                    transaction: serde_json::from_str(&transaction.serialize()?)?,
                };
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, serde_json::to_string_pretty(&state)?)?;
                info!(
                    "Stored offline transaction {} at {}",
                    state.transaction_id,
                    path.display()
                );
                return Ok(());
            }

            if !transaction.check_gpg_signatures()? {
                for problem in transaction.gpg_signature_problems() {
                    warn!("{}", problem);
                }
                return Err(Error::TransactionError(
                    TransactionRunResult::ErrorGpgCheck.to_string(),
                ));
            }

            transaction.set_description("rpmgoal session");
            transaction.set_callbacks(callbacks);
            match transaction.run()? {
                TransactionRunResult::Success => Ok(()),
                failed => {
                    let mut message = failed.to_string();
                    for problem in transaction.transaction_problems() {
                        message.push_str("\n  ");
                        message.push_str(problem);
                    }
                    Err(Error::TransactionError(message))
                }
            }
        })
    }
}
