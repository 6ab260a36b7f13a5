// src/session/mod.rs

//! Session façade
//!
//! A client opens a session, which owns one `Base` with its repositories
//! loaded. Package jobs accumulate on the session's goal through `Rpm`,
//! `Goal::resolve` turns them into a transaction, and `Goal::do_transaction`
//! runs it. Closing the session invalidates the base, so every handle the
//! client still holds starts failing with `Error::InvalidatedHandle`.

mod goal;
pub mod options;
mod repo;
mod rpm;

pub use goal::{GoalService, ResolveResult, ResolvedItem};
pub use options::KeyValueMap;
pub use repo::{RepoConfService, RepoService};
pub use rpm::RpmService;

use crate::base::Base;
use crate::config::ConfigMain;
use crate::error::{Error, Result};
use crate::goal::Goal;
use crate::progress::{LogCallbacks, ProgressCallbacks};
use crate::transaction::Transaction;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, info};

/// Identifies an open session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One client's view of the system
pub struct Session {
    handle: SessionHandle,
    base: Arc<Base>,
    goal: Mutex<Goal>,
    transaction: Mutex<Option<Transaction>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("handle", &self.handle)
            .field("base", &self.base)
            .finish()
    }
}

impl Session {
    /// Set up a session over `config`
    ///
    /// Options: `config` (string map of configuration overrides),
    /// `config_file` (TOML file read before the overrides),
    /// `load_system_repo` and `load_available_repos` (both default true).
    pub fn open(options: &KeyValueMap, callbacks: &dyn ProgressCallbacks) -> Result<Arc<Self>> {
        let mut config = match options::get_string(options, "config_file")? {
            Some(path) => ConfigMain::load(&PathBuf::from(path))?,
            None => ConfigMain::default(),
        };
        config.apply_overrides(&options::get_string_map(options, "config")?)?;

        let base = Base::new(config)?;
        if options::get_bool(options, "load_system_repo")?.unwrap_or(true) {
            base.load_system_repo()?;
        }
        if options::get_bool(options, "load_available_repos")?.unwrap_or(true) {
            base.load_repos(callbacks)?;
        }

        let handle = SessionHandle(format!("session-{}", uuid::Uuid::new_v4().simple()));
        debug!("Opened {} over {}", handle, base.config().installroot.display());
        Ok(Arc::new(Self {
            handle,
            goal: Mutex::new(Goal::new(&base)),
            base,
            transaction: Mutex::new(None),
        }))
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// The session's base, unless the session was closed
    pub fn base(&self) -> Result<&Arc<Base>> {
        if !self.base.is_alive() {
            return Err(Error::InvalidatedHandle(format!("session {} is closed", self.handle)));
        }
        Ok(&self.base)
    }

    fn lock_goal(&self) -> Result<MutexGuard<'_, Goal>> {
        self.base()?;
        self.goal
            .lock()
            .map_err(|_| Error::LogicError("Session goal lock poisoned".to_string()))
    }

    fn lock_transaction(&self) -> Result<MutexGuard<'_, Option<Transaction>>> {
        self.base()?;
        self.transaction
            .lock()
            .map_err(|_| Error::LogicError("Session transaction lock poisoned".to_string()))
    }

    pub fn rpm(&self) -> RpmService<'_> {
        RpmService::new(self)
    }

    pub fn goal(&self) -> GoalService<'_> {
        GoalService::new(self)
    }

    pub fn repo(&self) -> RepoService<'_> {
        RepoService::new(self)
    }

    pub fn repo_conf(&self) -> RepoConfService<'_> {
        RepoConfService::new(self)
    }

    fn close(&self) {
        self.base.invalidate();
    }
}

/// All open sessions
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionHandle, Arc<Session>>>,
    callbacks: Option<Arc<dyn ProgressCallbacks>>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.sessions.read().map(|s| s.len()).unwrap_or(0))
            .finish()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report repository loading of new sessions to `callbacks`
    pub fn with_callbacks(callbacks: Arc<dyn ProgressCallbacks>) -> Self {
        Self {
            sessions: RwLock::default(),
            callbacks: Some(callbacks),
        }
    }

    pub fn open_session(&self, options: &KeyValueMap) -> Result<SessionHandle> {
        let session = match &self.callbacks {
            Some(callbacks) => Session::open(options, callbacks.as_ref())?,
            None => Session::open(options, &LogCallbacks::new())?,
        };
        let handle = session.handle().clone();
        self.sessions
            .write()
            .map_err(|_| Error::LogicError("Session table lock poisoned".to_string()))?
            .insert(handle.clone(), session);
        info!("Session {} opened", handle);
        Ok(handle)
    }

    /// Close a session; false when the handle is unknown
    pub fn close_session(&self, handle: &SessionHandle) -> bool {
        let removed = match self.sessions.write() {
            Ok(mut sessions) => sessions.remove(handle),
            Err(_) => None,
        };
        match removed {
            Some(session) => {
                session.close();
                info!("Session {} closed", handle);
                true
            }
            None => false,
        }
    }

    pub fn session(&self, handle: &SessionHandle) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .map_err(|_| Error::LogicError("Session table lock poisoned".to_string()))?
            .get(handle)
            .cloned()
            .ok_or_else(|| Error::InvalidatedHandle(format!("session {} is not open", handle)))
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
