// src/goal/settings.rs

//! Per-job settings and the actions a goal accepts

use crate::config::ConfigMain;
use crate::package::Reason;
use crate::query::ResolveSpecSettings;
use serde::Serialize;
use std::fmt;

/// A tri-state override of a configuration default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalSetting {
    #[default]
    Auto,
    True,
    False,
}

impl GoalSetting {
    /// The explicit value, or `default` for `Auto`
    pub fn resolve(self, default: bool) -> bool {
        match self {
            GoalSetting::Auto => default,
            GoalSetting::True => true,
            GoalSetting::False => false,
        }
    }

    pub fn is_auto(self) -> bool {
        self == GoalSetting::Auto
    }
}

impl From<bool> for GoalSetting {
    fn from(value: bool) -> Self {
        if value { GoalSetting::True } else { GoalSetting::False }
    }
}

/// What a job asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalAction {
    Install,
    Upgrade,
    UpgradeAll,
    Downgrade,
    Reinstall,
    Remove,
    DistroSync,
    DistroSyncAll,
    ReasonChange,
    /// Problems raised by the solver rather than by one job
    Resolve,
}

impl GoalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalAction::Install => "Install",
            GoalAction::Upgrade => "Upgrade",
            GoalAction::UpgradeAll => "Upgrade all",
            GoalAction::Downgrade => "Downgrade",
            GoalAction::Reinstall => "Reinstall",
            GoalAction::Remove => "Remove",
            GoalAction::DistroSync => "Distrosync",
            GoalAction::DistroSyncAll => "Distrosync all",
            GoalAction::ReasonChange => "Reason Change",
            GoalAction::Resolve => "Resolve",
        }
    }
}

impl fmt::Display for GoalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings attached to one job
///
/// `strict`, `skip_unavailable` and `skip_broken` stay `None` unless the
/// caller sets them; the `resolve_*` methods combine them with the main
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GoalJobSettings {
    pub strict: Option<bool>,
    pub skip_unavailable: Option<bool>,
    pub skip_broken: Option<bool>,
    pub best: GoalSetting,
    pub clean_requirements_on_remove: GoalSetting,
    /// Repository id globs the job is restricted to
    pub to_repo_ids: Vec<String>,
    #[serde(skip)]
    pub spec: ResolveSpecSettings,
    /// Install reason for new packages; target reason for a reason change
    pub reason: Option<Reason>,
    /// Group id required by a reason change to `Group`
    pub group_id: Option<String>,
}

impl GoalJobSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo_ids<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.to_repo_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    pub fn with_skip_unavailable(mut self, skip: bool) -> Self {
        self.skip_unavailable = Some(skip);
        self
    }

    pub fn with_best(mut self, best: bool) -> Self {
        self.best = best.into();
        self
    }

    /// Missing packages are warnings rather than problems
    ///
    /// An explicit `skip_unavailable` wins, then an explicit `strict`. Remove
    /// jobs skip by default.
    pub fn resolve_skip_unavailable(&self, cfg: &ConfigMain, action: GoalAction) -> bool {
        if let Some(skip) = self.skip_unavailable {
            return skip;
        }
        if let Some(strict) = self.strict {
            return !strict;
        }
        if action == GoalAction::Remove {
            return true;
        }
        cfg.skip_unavailable || !cfg.strict
    }

    /// Unsolvable jobs are dropped rather than failing the goal
    pub fn resolve_skip_broken(&self, cfg: &ConfigMain) -> bool {
        if let Some(skip) = self.skip_broken {
            return skip;
        }
        if let Some(strict) = self.strict {
            return !strict;
        }
        cfg.skip_broken || !cfg.strict
    }

    pub fn resolve_best(&self, cfg: &ConfigMain) -> bool {
        self.best.resolve(cfg.best)
    }

    pub fn resolve_clean_requirements_on_remove(&self, cfg: &ConfigMain) -> bool {
        self.clean_requirements_on_remove
            .resolve(cfg.clean_requirements_on_remove)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names() {
        assert_eq!(GoalAction::DistroSyncAll.to_string(), "Distrosync all");
        assert_eq!(GoalAction::ReasonChange.to_string(), "Reason Change");
        assert_eq!(GoalAction::UpgradeAll.to_string(), "Upgrade all");
    }

    #[test]
    fn test_setting_fallback() {
        assert!(GoalSetting::default().is_auto());
        assert!(GoalSetting::Auto.resolve(true));
        assert!(!GoalSetting::from(false).resolve(true));
        assert!(!GoalSetting::True.is_auto());
    }

    #[test]
    fn test_skip_unavailable_precedence() {
        let cfg = ConfigMain::default();
        let settings = GoalJobSettings::new();
        assert!(!settings.resolve_skip_unavailable(&cfg, GoalAction::Install));
        assert!(settings.resolve_skip_unavailable(&cfg, GoalAction::Remove));

        let settings = GoalJobSettings::new().with_strict(false);
        assert!(settings.resolve_skip_unavailable(&cfg, GoalAction::Install));

        let settings = GoalJobSettings::new()
            .with_strict(false)
            .with_skip_unavailable(false);
        assert!(!settings.resolve_skip_unavailable(&cfg, GoalAction::Install));

        let settings = GoalJobSettings::new().with_strict(true);
        assert!(!settings.resolve_skip_unavailable(&cfg, GoalAction::Remove));
    }

    #[test]
    fn test_skip_broken_follows_strict() {
        let mut cfg = ConfigMain::default();
        let settings = GoalJobSettings::new();
        assert!(!settings.resolve_skip_broken(&cfg));

        cfg.strict = false;
        assert!(settings.resolve_skip_broken(&cfg));

        let settings = GoalJobSettings {
            skip_broken: Some(false),
            strict: Some(false),
            ..Default::default()
        };
        assert!(!settings.resolve_skip_broken(&cfg));
    }

    #[test]
    fn test_best_defaults_to_config() {
        let mut cfg = ConfigMain::default();
        assert!(!GoalJobSettings::new().resolve_best(&cfg));
        cfg.best = true;
        assert!(GoalJobSettings::new().resolve_best(&cfg));
        assert!(!GoalJobSettings::new().with_best(false).resolve_best(&cfg));
    }
}
