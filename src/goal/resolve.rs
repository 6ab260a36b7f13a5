// src/goal/resolve.rs

//! Turning goal jobs into solver jobs, and the solver's answer into
//! transaction items

use super::problem::{GoalProblem, LogEvent, Severity};
use super::settings::{GoalAction, GoalJobSettings};
use super::{GoalJob, JobTarget};
use crate::base::Base;
use crate::config::ConfigMain;
use crate::package::{Package, PackageId, Reason};
use crate::query::{CmpMode, PackageQuery};
use crate::repository::selector::PackageSelector;
use crate::resolver::{Assignment, Job, Solver, SolverInput, SolverOutcome};
use crate::sack::SackSnapshot;
use crate::transaction::{TransactionItemAction, TransactionPackage};
use crate::version::Nevra;
use glob::Pattern;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Accumulates solver jobs and log events for one `Goal::resolve()` call
pub(super) struct JobResolver<'a> {
    cfg: &'a ConfigMain,
    snapshot: Arc<SackSnapshot>,
    system_arch: String,
    jobs: Vec<Job>,
    reason_changes: Vec<TransactionPackage>,
    logs: Vec<LogEvent>,
    problems: GoalProblem,
}

fn arch_family(a: &str, b: &str) -> bool {
    a == b || a == "noarch" || b == "noarch"
}

fn repo_patterns(settings: &GoalJobSettings) -> Vec<Pattern> {
    settings
        .to_repo_ids
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect()
}

impl<'a> JobResolver<'a> {
    pub fn new(base: &'a Base) -> Self {
        let cfg = base.config();
        Self {
            cfg,
            snapshot: base.sack().snapshot(),
            system_arch: cfg.system_arch(),
            jobs: Vec::new(),
            reason_changes: Vec::new(),
            logs: Vec::new(),
            problems: GoalProblem::NO_PROBLEM,
        }
    }

    fn query(&self, apply_excludes: bool) -> PackageQuery {
        PackageQuery::from_snapshot(Arc::clone(&self.snapshot), apply_excludes)
    }

    fn installed(&self) -> PackageQuery {
        let mut query = self.query(true);
        query.filter_installed();
        query
    }

    /// Installed packages sharing a name with anything in `query`
    fn installed_of_names(&self, query: &PackageQuery) -> PackageQuery {
        let mut installed = self.installed();
        installed.filter_name_of(query);
        installed
    }

    fn available_of(&self, query: &PackageQuery) -> PackageQuery {
        let mut available = query.clone();
        available.filter_available();
        available.filter_arch_compatible(&self.system_arch);
        available
    }

    fn report(&mut self, event: LogEvent) {
        match event.severity {
            Severity::Error => {
                self.problems |= event.problem;
                warn!("{}", event);
            }
            Severity::Warning => warn!("{}", event),
            Severity::Info => info!("{}", event),
        }
        self.logs.push(event);
    }

    /// Report a job target that cannot be acted on
    ///
    /// An error, unless the job skips unavailable packages.
    fn unavailable(&mut self, action: GoalAction, problem: GoalProblem, settings: &GoalJobSettings, spec: &str) {
        let severity = if settings.resolve_skip_unavailable(self.cfg, action) {
            Severity::Warning
        } else {
            Severity::Error
        };
        self.report(LogEvent::new(action, problem, severity, settings, spec));
    }

    fn sorted(&self, query: &PackageQuery, settings: &GoalJobSettings) -> Vec<PackageId> {
        let mut ids = query.ids();
        PackageSelector::sort_best_first(&self.snapshot, &mut ids, &settings.to_repo_ids);
        ids
    }

    pub fn add_job(&mut self, job: &GoalJob) {
        let action = job.action;
        let settings = &job.settings;

        let (matched, nevra, label) = match &job.target {
            JobTarget::All => {
                match action {
                    GoalAction::UpgradeAll => self.add_upgrade_all(settings),
                    GoalAction::DistroSyncAll => self.add_distro_sync_all(settings),
                    _ => self.report(LogEvent::new(
                        action,
                        GoalProblem::UNSUPPORTED_ACTION,
                        Severity::Error,
                        settings,
                        "*",
                    )),
                }
                return;
            }
            JobTarget::Spec(spec) => {
                if spec.starts_with('@') {
                    // group, environment and module specs
                    self.report(LogEvent::new(
                        action,
                        GoalProblem::UNSUPPORTED_ACTION,
                        Severity::Error,
                        settings,
                        spec.as_str(),
                    ));
                    return;
                }
                match self.resolve_spec(action, spec, settings) {
                    Some((matched, nevra)) => (matched, nevra, spec.clone()),
                    None => return,
                }
            }
            JobTarget::Packages(ids) => {
                let mut matched = self.query(false);
                matched.clear();
                for id in ids {
                    if id.index() < self.snapshot.len() {
                        matched.add(*id);
                    }
                }
                let label = matched.iter().map(|p| p.nevra()).collect::<Vec<_>>().join(", ");
                if matched.is_empty() {
                    self.unavailable(action, GoalProblem::NOT_FOUND, settings, "");
                    return;
                }
                (matched, None, label)
            }
        };

        match action {
            GoalAction::Install => {
                let per_name = nevra.is_some() || matches!(job.target, JobTarget::Packages(_));
                self.add_install(&matched, nevra.as_ref(), per_name, &label, settings)
            }
            GoalAction::Remove => self.add_remove(&matched, &label, settings),
            GoalAction::Upgrade => self.add_upgrade(&matched, nevra.as_ref(), &label, settings),
            GoalAction::Downgrade => self.add_downgrade(&matched, nevra.as_ref(), &label, settings),
            GoalAction::Reinstall => self.add_reinstall(&matched, &label, settings),
            GoalAction::DistroSync => self.add_distro_sync(&matched, nevra.as_ref(), &label, settings),
            GoalAction::ReasonChange => self.add_reason_change(&matched, &label, settings),
            GoalAction::UpgradeAll | GoalAction::DistroSyncAll | GoalAction::Resolve => {
                self.report(LogEvent::new(
                    action,
                    GoalProblem::UNSUPPORTED_ACTION,
                    Severity::Error,
                    settings,
                    label,
                ))
            }
        }
    }

    /// Resolve a spec, reporting why nothing matched when that is the case
    fn resolve_spec(
        &mut self,
        action: GoalAction,
        spec: &str,
        settings: &GoalJobSettings,
    ) -> Option<(PackageQuery, Option<Nevra>)> {
        let mut query = self.query(true);
        if action == GoalAction::Remove {
            query.filter_installed();
        }
        let (found, nevra) = query.resolve_pkg_spec(spec, &settings.spec, false);
        if found {
            debug!("Spec '{}' matched {} packages", spec, query.size());
            return Some((query, nevra));
        }

        let problem = if action == GoalAction::Remove {
            GoalProblem::NOT_FOUND
        } else if self.query(false).resolve_pkg_spec(spec, &settings.spec, false).0 {
            GoalProblem::EXCLUDED
        } else if self.query(true).resolve_pkg_spec(spec, &settings.spec, true).0 {
            GoalProblem::ONLY_SRC
        } else {
            GoalProblem::NOT_FOUND
        };
        self.unavailable(action, problem, settings, spec);

        if problem == GoalProblem::NOT_FOUND {
            self.add_hints(action, spec, settings);
        }
        None
    }

    fn add_hints(&mut self, action: GoalAction, spec: &str, settings: &GoalJobSettings) {
        if !settings.spec.ignore_case {
            let mut icase = settings.spec.clone();
            icase.ignore_case = true;
            icase.with_provides = false;
            icase.with_filenames = false;
            icase.with_binaries = false;
            let mut query = self.query(true);
            if action == GoalAction::Remove {
                query.filter_installed();
            }
            if query.resolve_pkg_spec(spec, &icase, false).0 {
                let names: BTreeSet<String> = query.iter().map(|p| p.name.clone()).collect();
                self.report(
                    LogEvent::new(action, GoalProblem::HINT_ICASE, Severity::Info, settings, spec)
                        .with_data(names),
                );
            }
        }

        let mut alternatives = self.query(true);
        let provide = format!("alternative-for({})", spec);
        if alternatives.filter_provides_name(&[provide], CmpMode::Eq).is_ok() && !alternatives.is_empty() {
            let names: BTreeSet<String> = alternatives.iter().map(|p| p.name.clone()).collect();
            self.report(
                LogEvent::new(action, GoalProblem::HINT_ALTERNATIVES, Severity::Info, settings, spec)
                    .with_data(names),
            );
        }
    }

    /// Narrow available candidates to the job's repositories
    fn in_repos(
        &mut self,
        action: GoalAction,
        spec: &str,
        settings: &GoalJobSettings,
        mut available: PackageQuery,
    ) -> Option<PackageQuery> {
        if settings.to_repo_ids.is_empty() {
            return Some(available);
        }
        if available.filter_repo_id(&settings.to_repo_ids, CmpMode::Glob).is_err() || available.is_empty() {
            self.unavailable(action, GoalProblem::NOT_FOUND_IN_REPOSITORIES, settings, spec);
            return None;
        }
        Some(available)
    }

    /// Installed packages a name-based job acts on
    ///
    /// Reports `NOT_INSTALLED` when no package of the matched names is
    /// installed, and `NOT_INSTALLED_FOR_ARCHITECTURE` when the spec names
    /// an arch that is not the installed one.
    fn require_installed(
        &mut self,
        action: GoalAction,
        matched: &PackageQuery,
        nevra: Option<&Nevra>,
        spec: &str,
        settings: &GoalJobSettings,
    ) -> Option<PackageQuery> {
        let mut installed = self.installed_of_names(matched);
        if installed.is_empty() {
            self.unavailable(action, GoalProblem::NOT_INSTALLED, settings, spec);
            return None;
        }
        if let Some(arch) = nevra.map(|n| n.arch.as_str()).filter(|a| !a.is_empty()) {
            installed.filter_name_arch(matched);
            if installed.is_empty() {
                debug!("Spec '{}' asks for arch {} that is not installed", spec, arch);
                self.unavailable(action, GoalProblem::NOT_INSTALLED_FOR_ARCHITECTURE, settings, spec);
                return None;
            }
        }
        Some(installed)
    }

    fn already_installed(&mut self, action: GoalAction, settings: &GoalJobSettings, spec: &str, installed: &PackageQuery) {
        let nevras: Vec<String> = installed.iter().map(|p| p.nevra()).collect();
        self.report(
            LogEvent::new(action, GoalProblem::ALREADY_INSTALLED, Severity::Warning, settings, spec)
                .with_data(nevras),
        );
    }

    fn add_install(
        &mut self,
        matched: &PackageQuery,
        nevra: Option<&Nevra>,
        per_name: bool,
        spec: &str,
        settings: &GoalJobSettings,
    ) {
        let action = GoalAction::Install;
        let available = self.available_of(matched);
        let installed = self.installed_of_names(matched);

        if available.is_empty() {
            let mut present = matched.clone();
            present.filter_installed();
            if present.is_empty() {
                self.unavailable(action, GoalProblem::NOT_FOUND, settings, spec);
            } else {
                self.already_installed(action, settings, spec, &present);
            }
            return;
        }
        let Some(available) = self.in_repos(action, spec, settings, available) else {
            return;
        };

        // an explicit version is installed as asked; a bare name only
        // moves forward from what is installed
        let versioned = nevra.is_some_and(|n| !n.version.is_empty());
        let installed_pkgs: Vec<Arc<Package>> = installed.iter().collect();
        let mut candidates = available.clone();
        for pkg in available.iter() {
            let keep = if installed_pkgs.iter().any(|i| i.nevra() == pkg.nevra()) {
                false
            } else if versioned {
                true
            } else {
                let same_name: Vec<&Arc<Package>> =
                    installed_pkgs.iter().filter(|i| i.name == pkg.name).collect();
                same_name.is_empty()
                    || same_name
                        .iter()
                        .any(|i| arch_family(&i.arch, &pkg.arch) && pkg.evr > i.evr)
            };
            if !keep {
                candidates.remove(pkg.id);
            }
        }

        if candidates.is_empty() {
            let mut present = installed.clone();
            if versioned {
                present.filter_nevra_of(&available);
            }
            self.already_installed(action, settings, spec, &present);
            return;
        }

        let reason = settings.reason.unwrap_or(Reason::User);
        let best = settings.resolve_best(self.cfg);
        let optional = settings.resolve_skip_broken(self.cfg);

        // a NEVRA spec installs every name it matches; a provide or a file
        // installs its best provider
        let mut groups: BTreeMap<String, Vec<PackageId>> = BTreeMap::new();
        for id in self.sorted(&candidates, settings) {
            let key = if per_name {
                self.snapshot.package(id).name.clone()
            } else {
                String::new()
            };
            groups.entry(key).or_default().push(id);
        }
        for (_, candidates) in groups {
            self.jobs.push(Job::Install {
                candidates,
                best,
                optional,
                reinstall: false,
                reason,
            });
        }
    }

    fn add_remove(&mut self, matched: &PackageQuery, spec: &str, settings: &GoalJobSettings) {
        let action = GoalAction::Remove;
        let mut targets = matched.clone();
        targets.filter_installed();
        if targets.is_empty() {
            self.unavailable(action, GoalProblem::NOT_FOUND, settings, spec);
            return;
        }

        let patterns = repo_patterns(settings);
        if !patterns.is_empty() {
            for pkg in targets.clone().iter() {
                let from = pkg.from_repo_id.as_deref().unwrap_or_default();
                if !patterns.iter().any(|p| p.matches(from)) {
                    targets.remove(pkg.id);
                }
            }
            if targets.is_empty() {
                self.unavailable(action, GoalProblem::NOT_FOUND_IN_REPOSITORIES, settings, spec);
                return;
            }
        }

        self.jobs.push(Job::Remove {
            targets: targets.ids(),
            clean_deps: settings.resolve_clean_requirements_on_remove(self.cfg),
        });
    }

    /// Packages of `available` that obsolete something in `installed`
    fn obsoleters_of(&self, available: &PackageQuery, installed: &PackageQuery) -> PackageQuery {
        let mut obsoleters = available.clone();
        if self.cfg.obsoletes {
            obsoleters.filter_obsoletes(installed);
        } else {
            obsoleters.clear();
        }
        obsoleters
    }

    fn push_upgrade(&mut self, candidates: &PackageQuery, settings: &GoalJobSettings) {
        if candidates.is_empty() {
            return;
        }
        let candidates = self.sorted(candidates, settings);
        self.jobs.push(Job::Upgrade {
            candidates,
            best: settings.resolve_best(self.cfg),
            optional: settings.resolve_skip_broken(self.cfg),
        });
    }

    fn add_upgrade(&mut self, matched: &PackageQuery, nevra: Option<&Nevra>, spec: &str, settings: &GoalJobSettings) {
        let action = GoalAction::Upgrade;
        let available = self.available_of(matched);

        if self.installed_of_names(matched).is_empty() {
            // a package that replaces an installed one by obsoleting it
            let replacing = self.obsoleters_of(&available, &self.installed());
            if !replacing.is_empty() {
                if let Some(replacing) = self.in_repos(action, spec, settings, replacing) {
                    self.push_upgrade(&replacing, settings);
                }
                return;
            }
        }
        let Some(installed) = self.require_installed(action, matched, nevra, spec, settings) else {
            return;
        };
        if available.is_empty() {
            debug!("No available packages for '{}', nothing to upgrade", spec);
            return;
        }

        let mut candidates = available;
        let mut all_available = self.query(true);
        all_available.filter_available();
        all_available.filter_arch_compatible(&self.system_arch);
        for id in self.obsoleters_of(&all_available, &installed).ids() {
            candidates.add(id);
        }
        let Some(candidates) = self.in_repos(action, spec, settings, candidates) else {
            return;
        };
        self.push_upgrade(&candidates, settings);
    }

    fn add_upgrade_all(&mut self, settings: &GoalJobSettings) {
        let installed = self.installed();
        let mut available = self.query(true);
        available.filter_available();
        available.filter_arch_compatible(&self.system_arch);
        let mut candidates = available.clone();
        candidates.filter_upgrades();
        for id in self.obsoleters_of(&available, &installed).ids() {
            candidates.add(id);
        }
        if candidates.is_empty() {
            return;
        }
        if let Some(candidates) = self.in_repos(GoalAction::UpgradeAll, "*", settings, candidates) {
            self.push_upgrade(&candidates, settings);
        }
    }

    fn add_downgrade(&mut self, matched: &PackageQuery, nevra: Option<&Nevra>, spec: &str, settings: &GoalJobSettings) {
        let action = GoalAction::Downgrade;
        let Some(installed) = self.require_installed(action, matched, nevra, spec, settings) else {
            return;
        };
        let mut available = self.available_of(matched);
        if !available.is_empty() {
            available = match self.in_repos(action, spec, settings, available) {
                Some(available) => available,
                None => return,
            };
        }

        let optional = settings.resolve_skip_broken(self.cfg);
        for pkg in installed.iter() {
            let mut lower = available.clone();
            for candidate in available.iter() {
                if candidate.na() != pkg.na() || candidate.evr >= pkg.evr {
                    lower.remove(candidate.id);
                }
            }
            if lower.is_empty() {
                self.report(
                    LogEvent::new(action, GoalProblem::INSTALLED_LOWEST_VERSION, Severity::Warning, settings, spec)
                        .with_data([pkg.name.clone()]),
                );
                continue;
            }
            let candidates = self.sorted(&lower, settings);
            self.jobs.push(Job::Install {
                candidates,
                best: false,
                optional,
                reinstall: false,
                reason: Reason::None,
            });
        }
    }

    fn add_reinstall(&mut self, matched: &PackageQuery, spec: &str, settings: &GoalJobSettings) {
        let action = GoalAction::Reinstall;
        let mut installed = matched.clone();
        installed.filter_installed();
        if installed.is_empty() {
            let by_name = self.installed_of_names(matched);
            let same_arch = by_name
                .iter()
                .any(|i| matched.iter().any(|m| arch_family(&i.arch, &m.arch)));
            let problem = if by_name.is_empty() || same_arch {
                GoalProblem::NOT_INSTALLED
            } else {
                GoalProblem::NOT_INSTALLED_FOR_ARCHITECTURE
            };
            self.unavailable(action, problem, settings, spec);
            return;
        }

        let mut same_name = self.query(true);
        same_name.filter_available();
        same_name.filter_name_of(&installed);
        let mut available = same_name.clone();
        available.filter_nevra_of(&installed);

        if available.is_empty() {
            if same_name.is_empty() {
                self.unavailable(action, GoalProblem::NOT_AVAILABLE, settings, spec);
                return;
            }
            let mut same_na = same_name.clone();
            same_na.filter_name_arch(&installed);
            if same_na.is_empty() {
                self.unavailable(action, GoalProblem::NOT_INSTALLED_FOR_ARCHITECTURE, settings, spec);
                return;
            }
            let versions: Vec<String> = same_na.iter().map(|p| p.evr_string()).collect();
            let severity = if settings.resolve_skip_unavailable(self.cfg, action) {
                Severity::Warning
            } else {
                Severity::Error
            };
            self.report(
                LogEvent::new(action, GoalProblem::INSTALLED_IN_DIFFERENT_VERSION, severity, settings, spec)
                    .with_data(versions),
            );
            return;
        }
        let Some(available) = self.in_repos(action, spec, settings, available) else {
            return;
        };

        let optional = settings.resolve_skip_broken(self.cfg);
        for pkg in installed.iter() {
            let mut copies = available.clone();
            for candidate in available.iter() {
                if candidate.nevra() != pkg.nevra() {
                    copies.remove(candidate.id);
                }
            }
            if copies.is_empty() {
                continue;
            }
            let candidates = self.sorted(&copies, settings);
            self.jobs.push(Job::Install {
                candidates,
                best: false,
                optional,
                reinstall: true,
                reason: Reason::None,
            });
        }
    }

    fn push_distro_sync(&mut self, candidates: &PackageQuery, settings: &GoalJobSettings) {
        if candidates.is_empty() {
            return;
        }
        let candidates = self.sorted(candidates, settings);
        self.jobs.push(Job::DistroSync {
            candidates,
            optional: settings.resolve_skip_broken(self.cfg),
        });
    }

    fn add_distro_sync(&mut self, matched: &PackageQuery, nevra: Option<&Nevra>, spec: &str, settings: &GoalJobSettings) {
        let action = GoalAction::DistroSync;
        if self.require_installed(action, matched, nevra, spec, settings).is_none() {
            return;
        }
        let available = self.available_of(matched);
        if available.is_empty() {
            debug!("No available packages for '{}', nothing to sync", spec);
            return;
        }
        if let Some(candidates) = self.in_repos(action, spec, settings, available) {
            self.push_distro_sync(&candidates, settings);
        }
    }

    fn add_distro_sync_all(&mut self, settings: &GoalJobSettings) {
        let installed = self.installed();
        let mut candidates = self.query(true);
        candidates.filter_available();
        candidates.filter_arch_compatible(&self.system_arch);
        candidates.filter_name_of(&installed);
        if candidates.is_empty() {
            return;
        }
        if let Some(candidates) = self.in_repos(GoalAction::DistroSyncAll, "*", settings, candidates) {
            self.push_distro_sync(&candidates, settings);
        }
    }

    fn add_reason_change(&mut self, matched: &PackageQuery, spec: &str, settings: &GoalJobSettings) {
        let action = GoalAction::ReasonChange;
        let Some(reason) = settings.reason else {
            return;
        };
        let mut installed = matched.clone();
        installed.filter_installed();
        if installed.is_empty() {
            self.unavailable(action, GoalProblem::NOT_INSTALLED, settings, spec);
            return;
        }
        for pkg in installed.iter() {
            if pkg.reason == reason {
                self.report(
                    LogEvent::new(action, GoalProblem::ALREADY_INSTALLED, Severity::Warning, settings, spec)
                        .with_data([pkg.nevra()]),
                );
                continue;
            }
            if self.reason_changes.iter().any(|i| i.id() == pkg.id) {
                continue;
            }
            self.reason_changes
                .push(TransactionPackage::new(pkg, TransactionItemAction::ReasonChange, reason));
        }
    }

    /// Run the solver over the accumulated jobs
    ///
    /// Returns the items (empty when there are problems), the problem mask
    /// and the resolve log.
    pub fn solve(mut self, solver: &dyn Solver) -> (Vec<TransactionPackage>, GoalProblem, Vec<LogEvent>) {
        let mut items = Vec::new();

        if !self.jobs.is_empty() {
            let mut input = SolverInput::new(Arc::clone(&self.snapshot), self.system_arch.clone());
            input.jobs = std::mem::take(&mut self.jobs);
            input.protected = self.cfg.protected_packages.iter().cloned().collect();
            input.install_weak_deps = self.cfg.install_weak_deps;

            match solver.solve(&input) {
                SolverOutcome::Solved(assignment) => {
                    if !assignment.skipped.is_empty() {
                        let problems = assignment.skipped.iter().map(|s| s.problem.clone()).collect();
                        let mut event = LogEvent::solver(GoalProblem::SOLVER_PROBLEM_STRICT_RESOLVEMENT, problems);
                        event.severity = Severity::Warning;
                        self.report(event);
                    }
                    items = transaction_items(&self.snapshot, &assignment);
                }
                SolverOutcome::Unsolvable(problems) => {
                    self.report(LogEvent::solver(GoalProblem::SOLVER_ERROR, problems));
                }
            }
        }

        items.append(&mut self.reason_changes);
        if !self.problems.is_empty() {
            items.clear();
        }
        items.sort_by_key(|i| (i.action.group_rank(), i.id()));
        (items, self.problems, self.logs)
    }
}

/// Classify a solver assignment into transaction items
///
/// Each removed package is claimed by at most one inbound package: the
/// first (by id) with the same `name.arch`, else the same name, else one
/// that obsoletes it. Unclaimed removals are plain removes.
pub(crate) fn transaction_items(snapshot: &SackSnapshot, assignment: &Assignment) -> Vec<TransactionPackage> {
    let mut claimed: BTreeMap<PackageId, (PackageId, TransactionItemAction)> = BTreeMap::new();
    let mut items = Vec::new();

    let mut unclaimed: Vec<PackageId> = assignment.remove.clone();
    let claim = |pred: &dyn Fn(&Package) -> bool, unclaimed: &mut Vec<PackageId>| -> Vec<PackageId> {
        let (hit, rest): (Vec<PackageId>, Vec<PackageId>) =
            unclaimed.iter().partition(|id| pred(snapshot.package(**id).as_ref()));
        *unclaimed = rest;
        hit
    };

    for &id in &assignment.install {
        let pkg = snapshot.package(id);
        let mut replaced = claim(&|old: &Package| old.na() == pkg.na(), &mut unclaimed);
        if replaced.is_empty() {
            replaced = claim(
                &|old: &Package| old.name == pkg.name && arch_family(&old.arch, &pkg.arch),
                &mut unclaimed,
            );
        }
        let obsoleted = claim(&|old: &Package| pkg.obsoletes_package(old), &mut unclaimed);

        let action = match replaced.first().map(|old| snapshot.package(*old)) {
            None => TransactionItemAction::Install,
            Some(old) if old.nevra() == pkg.nevra() => TransactionItemAction::Reinstall,
            Some(old) if pkg.evr < old.evr => TransactionItemAction::Downgrade,
            Some(_) => TransactionItemAction::Upgrade,
        };

        let mut reason = assignment.reason(id);
        for old in replaced.iter().chain(obsoleted.iter()) {
            reason = reason.stronger(snapshot.package(*old).reason);
        }
        if reason == Reason::None {
            reason = Reason::User;
        }

        let mut item = TransactionPackage::new(Arc::clone(pkg), action, reason);
        for old in &replaced {
            claimed.insert(*old, (id, TransactionItemAction::Replaced));
        }
        for old in &obsoleted {
            claimed.insert(*old, (id, TransactionItemAction::Obsoleted));
        }
        item.replaces = replaced.iter().chain(obsoleted.iter()).copied().collect();
        item.replaces.sort();
        items.push(item);
    }

    for &id in &assignment.remove {
        let pkg = snapshot.package(id);
        let item = match claimed.get(&id) {
            Some(&(by, action)) => {
                let mut item = TransactionPackage::new(Arc::clone(pkg), action, pkg.reason);
                item.replaced_by = vec![by];
                item
            }
            None => {
                let reason = match assignment.reason(id) {
                    Reason::None => Reason::User,
                    reason => reason,
                };
                TransactionPackage::new(Arc::clone(pkg), TransactionItemAction::Remove, reason)
            }
        };
        items.push(item);
    }
    items
}
