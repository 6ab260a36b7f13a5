// src/session/rpm.rs

//! `Rpm` interface: add package jobs to the session goal

use super::options::{self, KeyValueMap};
use super::Session;
use crate::error::{Error, Result};
use crate::goal::{Goal, GoalJobSettings};
use tracing::debug;

pub struct RpmService<'a> {
    session: &'a Session,
}

impl<'a> RpmService<'a> {
    pub(super) fn new(session: &'a Session) -> Self {
        Self { session }
    }

    fn add_jobs(
        &self,
        specs: &[String],
        options: &KeyValueMap,
        mut add: impl FnMut(&mut Goal, &str, GoalJobSettings) -> Result<()>,
    ) -> Result<()> {
        let settings = options::job_settings(options)?;
        if specs.is_empty() {
            return Err(Error::InvalidArgument("No package specs given".to_string()));
        }
        let mut goal = self.session.lock_goal()?;
        for spec in specs {
            add(&mut goal, spec, settings.clone())?;
        }
        debug!("Added {} specs to {}", specs.len(), self.session.handle());
        Ok(())
    }

    pub fn install(&self, specs: &[String], options: &KeyValueMap) -> Result<()> {
        self.add_jobs(specs, options, |goal, spec, settings| goal.add_rpm_install(spec, settings))
    }

    pub fn remove(&self, specs: &[String], options: &KeyValueMap) -> Result<()> {
        self.add_jobs(specs, options, |goal, spec, settings| goal.add_rpm_remove(spec, settings))
    }

    /// Upgrade the given packages, or everything installed when `specs` is
    /// empty
    pub fn upgrade(&self, specs: &[String], options: &KeyValueMap) -> Result<()> {
        if specs.is_empty() {
            let settings = options::job_settings(options)?;
            return self.session.lock_goal()?.add_rpm_upgrade_all(settings);
        }
        self.add_jobs(specs, options, |goal, spec, settings| goal.add_rpm_upgrade(spec, settings))
    }

    pub fn downgrade(&self, specs: &[String], options: &KeyValueMap) -> Result<()> {
        self.add_jobs(specs, options, |goal, spec, settings| goal.add_rpm_downgrade(spec, settings))
    }

    pub fn reinstall(&self, specs: &[String], options: &KeyValueMap) -> Result<()> {
        self.add_jobs(specs, options, |goal, spec, settings| goal.add_rpm_reinstall(spec, settings))
    }

    /// Sync the given packages, or everything installed when `specs` is
    /// empty
    pub fn distro_sync(&self, specs: &[String], options: &KeyValueMap) -> Result<()> {
        if specs.is_empty() {
            let settings = options::job_settings(options)?;
            return self.session.lock_goal()?.add_rpm_distro_sync_all(settings);
        }
        self.add_jobs(specs, options, |goal, spec, settings| goal.add_rpm_distro_sync(spec, settings))
    }
}
