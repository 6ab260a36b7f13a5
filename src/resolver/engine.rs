// src/resolver/engine.rs

//! Backtracking solver
//!
//! A depth-first search over provider choices. The state is the set of
//! packages that will be on the system, keyed by `name.arch`. Installing a
//! package puts it in its slot (replacing whatever was there), drops the
//! installed packages it obsoletes, checks conflicts and then satisfies its
//! requirements one by one, trying providers best first and backing out of
//! choices that lead nowhere. Every candidate tried counts against a
//! decision budget so pathological inputs terminate.
//!
//! Packages a remove job targets are erase-locked for the whole run: no
//! job or dependency may bring the same NEVRA back, whatever the job order.

use super::problem::{dedup_problems, ProblemRule, SolverProblem};
use super::{Assignment, Job, SkippedJob, Solver, SolverInput, SolverOutcome};
use crate::package::{Package, PackageId, Reason, Reldep};
use crate::repository::selector::PackageSelector;
use crate::sack::SackSnapshot;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, trace};

/// Candidates tried before the search gives up
pub const DEFAULT_DECISION_BUDGET: usize = 100_000;

/// Deterministic depth-first solver
#[derive(Debug, Clone)]
pub struct BacktrackingSolver {
    budget: usize,
}

impl BacktrackingSolver {
    pub fn new() -> Self {
        Self {
            budget: DEFAULT_DECISION_BUDGET,
        }
    }

    pub fn with_budget(budget: usize) -> Self {
        Self { budget }
    }
}

impl Default for BacktrackingSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for BacktrackingSolver {
    fn solve(&self, input: &SolverInput) -> SolverOutcome {
        let search = Search::new(input, self.budget);
        search.run()
    }
}

/// The would-be system: one package per slot
#[derive(Debug, Clone)]
struct State {
    slots: BTreeMap<String, PackageId>,
    /// Reasons of packages brought in by this run
    reasons: BTreeMap<PackageId, Reason>,
    /// Reasons of installed packages taken out by this run
    removal_reasons: BTreeMap<PackageId, Reason>,
    /// Slots that may not change
    locked: BTreeSet<String>,
}

impl State {
    fn ids(&self) -> impl Iterator<Item = PackageId> + '_ {
        self.slots.values().copied()
    }

    fn holds(&self, id: PackageId) -> bool {
        self.slots.values().any(|v| *v == id)
    }
}

type Attempt = std::result::Result<State, SolverProblem>;

struct Search<'a> {
    input: &'a SolverInput,
    snap: &'a SackSnapshot,
    budget: usize,
    decisions: Cell<usize>,
    exhausted: Cell<bool>,
    providers: RefCell<HashMap<Reldep, Vec<PackageId>>>,
    /// NEVRAs removed by the request
    erased: BTreeSet<String>,
}

impl<'a> Search<'a> {
    fn new(input: &'a SolverInput, budget: usize) -> Self {
        let erased = input
            .jobs
            .iter()
            .filter_map(|job| match job {
                Job::Remove { targets, .. } => Some(targets),
                _ => None,
            })
            .flatten()
            .map(|id| input.snapshot.package(*id).nevra())
            .collect();
        Self {
            input,
            snap: &input.snapshot,
            budget,
            decisions: Cell::new(0),
            exhausted: Cell::new(false),
            providers: RefCell::new(HashMap::new()),
            erased,
        }
    }

    fn erase_locked(&self, id: PackageId) -> bool {
        !self.erased.is_empty() && self.erased.contains(&self.nevra(id))
    }

    fn pkg(&self, id: PackageId) -> &Package {
        self.snap.package(id)
    }

    fn nevra(&self, id: PackageId) -> String {
        self.pkg(id).nevra()
    }

    fn initial_state(&self) -> State {
        let mut slots = BTreeMap::new();
        for pkg in self.snap.packages().iter().filter(|p| p.is_installed()) {
            let na = pkg.na();
            if slots.contains_key(&na) {
                // several installed versions of one name.arch keep separate slots
                slots.insert(format!("{}#{}", na, pkg.id), pkg.id);
            } else {
                slots.insert(na, pkg.id);
            }
        }
        State {
            slots,
            reasons: BTreeMap::new(),
            removal_reasons: BTreeMap::new(),
            locked: BTreeSet::new(),
        }
    }

    fn run(&self) -> SolverOutcome {
        let mut state = self.initial_state();
        let original: BTreeSet<PackageId> = state.ids().collect();
        let mut problems = Vec::new();
        let mut skipped = Vec::new();

        let conflicting = self.conflicting_jobs();

        for (index, job) in self.input.jobs.iter().enumerate() {
            let result = if conflicting.contains(&index) {
                Err(SolverProblem::new(vec![ProblemRule::ConflictingRequests]))
            } else {
                self.apply_job(&state, job)
            };
            match result {
                Ok(next) => state = next,
                Err(problem) if job.is_optional() && !self.exhausted.get() => {
                    debug!("Skipping job #{}: {}", index, problem);
                    skipped.push(SkippedJob { job: index, problem });
                }
                Err(problem) => problems.push(problem),
            }
        }

        if !problems.is_empty() {
            return SolverOutcome::Unsolvable(dedup_problems(problems));
        }

        if self.input.install_weak_deps {
            state = self.add_weak_deps(state, &original);
        }

        let current: BTreeSet<PackageId> = state.ids().collect();
        let install: Vec<PackageId> = current.difference(&original).copied().collect();
        let remove: Vec<PackageId> = original.difference(&current).copied().collect();

        let mut reasons = BTreeMap::new();
        for id in &install {
            reasons.insert(*id, state.reasons.get(id).copied().unwrap_or_default());
        }
        for id in &remove {
            reasons.insert(*id, state.removal_reasons.get(id).copied().unwrap_or_default());
        }

        debug!(
            "Solved in {} decisions: {} to install, {} to remove",
            self.decisions.get(),
            install.len(),
            remove.len()
        );
        SolverOutcome::Solved(Assignment {
            install,
            remove,
            reasons,
            skipped,
        })
    }

    /// Install jobs whose every candidate name is also removed by the request
    fn conflicting_jobs(&self) -> BTreeSet<usize> {
        let removed: BTreeSet<&str> = self
            .input
            .jobs
            .iter()
            .filter_map(|job| match job {
                Job::Remove { targets, .. } => Some(targets),
                _ => None,
            })
            .flatten()
            .map(|id| self.pkg(*id).name.as_str())
            .collect();

        self.input
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| match job {
                Job::Install { candidates, .. } => {
                    !candidates.is_empty()
                        && candidates
                            .iter()
                            .all(|id| removed.contains(self.pkg(*id).name.as_str()))
                }
                _ => false,
            })
            .map(|(index, _)| index)
            .collect()
    }

    fn tick(&self) -> std::result::Result<(), SolverProblem> {
        let n = self.decisions.get() + 1;
        self.decisions.set(n);
        if n > self.budget {
            self.exhausted.set(true);
            return Err(SolverProblem::new(vec![ProblemRule::DecisionBudgetExhausted {
                decisions: self.budget,
            }]));
        }
        Ok(())
    }

    fn apply_job(&self, state: &State, job: &Job) -> Attempt {
        match job {
            Job::Install {
                candidates,
                best,
                reinstall,
                reason,
                ..
            } => self.job_install(state, candidates, *best, *reinstall, *reason),
            Job::Remove {
                targets,
                clean_deps,
            } => self.job_remove(state, targets, *clean_deps),
            Job::Upgrade {
                candidates, best, ..
            } => self.job_upgrade(state, candidates, *best),
            Job::DistroSync { candidates, .. } => self.job_distro_sync(state, candidates),
            Job::Lock { targets } => {
                let mut next = state.clone();
                for id in targets {
                    next.locked.insert(self.pkg(*id).na());
                }
                Ok(next)
            }
        }
    }

    /// Run `f` with the slots of `ids` pinned, so repairs cannot undo them
    fn pinned(&self, state: State, ids: &[PackageId], f: impl FnOnce(State) -> Attempt) -> Attempt {
        let previous = state.locked.clone();
        let mut pinned = state;
        for id in ids {
            pinned.locked.insert(self.pkg(*id).na());
        }
        let mut done = f(pinned)?;
        done.locked = previous;
        Ok(done)
    }

    fn job_install(
        &self,
        state: &State,
        candidates: &[PackageId],
        best: bool,
        reinstall: bool,
        reason: Reason,
    ) -> Attempt {
        let Some(&first) = candidates.first() else {
            return Err(SolverProblem::new(vec![ProblemRule::ConflictingRequests]));
        };

        if !reinstall {
            let wanted = self.pkg(first).nevra();
            if state.ids().any(|id| self.pkg(id).nevra() == wanted) {
                trace!("{} already present", wanted);
                return Ok(state.clone());
            }
        }

        let mut tries = if best { self.top_evr(candidates) } else { candidates.to_vec() };
        tries.retain(|id| !self.erase_locked(*id));
        if tries.is_empty() {
            return Err(SolverProblem::new(vec![ProblemRule::ConflictingRequests]));
        }
        let mut first_problem = None;
        for id in tries {
            let replaces = self.same_slot_installed(state, id);
            let attempt = self
                .install(state, id, reason, replaces)
                .and_then(|s| self.pinned(s, &[id], |s| self.repair(s)));
            match attempt {
                Ok(next) => return Ok(next),
                Err(problem) => {
                    if self.exhausted.get() {
                        return Err(problem);
                    }
                    first_problem.get_or_insert(problem);
                }
            }
        }

        let mut problem = SolverProblem::default();
        if best {
            problem.push(ProblemRule::BestCandidate);
        }
        for rule in first_problem.map(|p| p.rules).unwrap_or_default() {
            problem.push(rule);
        }
        Err(problem)
    }

    fn job_remove(&self, state: &State, targets: &[PackageId], clean_deps: bool) -> Attempt {
        let mut next = state.clone();
        let mut removed = Vec::new();

        for id in targets {
            let Some(slot) = self.slot_of(&next, *id) else {
                continue;
            };
            if next.locked.contains(&slot) {
                return Err(SolverProblem::new(vec![ProblemRule::ConflictingRequests]));
            }
            next.slots.remove(&slot);
            next.removal_reasons.insert(*id, Reason::User);
            removed.push(*id);
        }

        // dependents of removed packages go too
        loop {
            let broken: Vec<PackageId> = next
                .ids()
                .filter(|id| !self.requires_met(&next, *id))
                .collect();
            if broken.is_empty() {
                break;
            }
            for id in broken {
                if !next.holds(id) || self.requires_met(&next, id) {
                    continue;
                }
                let pkg = self.pkg(id);
                if !pkg.is_installed() {
                    // brought in by an earlier job; it needs another provider
                    for dep in &pkg.requires {
                        if !self.state_provides(&next, dep) {
                            next = self.satisfy(next, dep, id)?;
                        }
                    }
                    continue;
                }
                if let Some(slot) = self.slot_of(&next, id) {
                    next.slots.remove(&slot);
                }
                next.removal_reasons.insert(id, Reason::Dependency);
                removed.push(id);
            }
        }

        if clean_deps {
            self.remove_unneeded(&mut next, &removed);
        }

        self.check_protected(state, &next)?;
        Ok(next)
    }

    /// Drop dependencies of `removed` that nothing else needs any more
    fn remove_unneeded(&self, state: &mut State, removed: &[PackageId]) {
        let mut candidates: BTreeSet<PackageId> = BTreeSet::new();
        let mut queue: Vec<PackageId> = removed.to_vec();
        while let Some(id) = queue.pop() {
            for dep in &self.pkg(id).requires {
                for other in state.ids() {
                    let pkg = self.pkg(other);
                    if matches!(pkg.reason, Reason::Dependency | Reason::WeakDependency)
                        && pkg.provides_dep(dep)
                        && candidates.insert(other)
                    {
                        queue.push(other);
                    }
                }
            }
        }

        loop {
            let unneeded: Vec<PackageId> = candidates
                .iter()
                .copied()
                .filter(|c| state.holds(*c))
                .filter(|c| {
                    let pkg = self.pkg(*c);
                    !state.ids().filter(|o| o != c).any(|o| {
                        let other = self.pkg(o);
                        other
                            .requires
                            .iter()
                            .chain(other.recommends.iter())
                            .any(|d| pkg.provides_dep(d))
                    })
                })
                .collect();
            if unneeded.is_empty() {
                break;
            }
            for id in unneeded {
                if let Some(slot) = self.slot_of(state, id) {
                    state.slots.remove(&slot);
                }
                state.removal_reasons.insert(id, Reason::Clean);
            }
        }
    }

    fn job_upgrade(&self, state: &State, candidates: &[PackageId], best: bool) -> Attempt {
        let mut next = state.clone();

        for (name, cands) in group_by_name(self.snap, candidates) {
            let targets: Vec<PackageId> = next
                .ids()
                .filter(|id| {
                    let p = self.pkg(*id);
                    p.is_installed() && p.name == name
                })
                .collect();

            if targets.is_empty() {
                // candidates that obsolete something installed
                for id in &cands {
                    let obsoletes_installed = next
                        .ids()
                        .any(|o| self.pkg(o).is_installed() && self.pkg(*id).obsoletes_package(self.pkg(o)));
                    if obsoletes_installed {
                        if let Ok(s) = self
                            .install(&next, *id, Reason::None, None)
                            .and_then(|s| self.pinned(s, &[*id], |s| self.repair(s)))
                        {
                            next = s;
                            break;
                        }
                    }
                }
                continue;
            }

            for target in targets {
                if !next.holds(target) {
                    continue;
                }
                let installed = self.pkg(target);
                let ups: Vec<PackageId> = cands
                    .iter()
                    .copied()
                    .filter(|id| {
                        let p = self.pkg(*id);
                        arch_upgradable(&installed.arch, &p.arch) && p.evr > installed.evr
                    })
                    .collect();
                if ups.is_empty() {
                    continue;
                }
                let tries = if best { self.top_evr(&ups) } else { ups };

                let mut first_problem = None;
                let mut upgraded = false;
                for id in tries {
                    let attempt = self
                        .install(&next, id, Reason::None, Some(target))
                        .and_then(|s| self.pinned(s, &[id], |s| self.repair(s)));
                    match attempt {
                        Ok(s) => {
                            next = s;
                            upgraded = true;
                            break;
                        }
                        Err(problem) => {
                            if self.exhausted.get() {
                                return Err(problem);
                            }
                            first_problem.get_or_insert(problem);
                        }
                    }
                }

                if !upgraded && best {
                    let mut problem = SolverProblem::new(vec![ProblemRule::BestUpdateCandidate {
                        package: installed.nevra(),
                    }]);
                    for rule in first_problem.map(|p| p.rules).unwrap_or_default() {
                        problem.push(rule);
                    }
                    return Err(problem);
                }
            }
        }
        Ok(next)
    }

    /// Move every installed `name.arch` to its best available version
    ///
    /// Candidates of another arch are only taken to or from noarch; an
    /// arch nothing installed has is never added.
    fn job_distro_sync(&self, state: &State, candidates: &[PackageId]) -> Attempt {
        let mut next = state.clone();

        for (name, cands) in group_by_name(self.snap, candidates) {
            let installed: Vec<PackageId> = next
                .ids()
                .filter(|id| {
                    let p = self.pkg(*id);
                    p.is_installed() && p.name == name
                })
                .collect();

            for target in installed {
                if !next.holds(target) {
                    continue;
                }
                let current = self.pkg(target);
                let same_arch: Vec<PackageId> = cands
                    .iter()
                    .copied()
                    .filter(|id| arch_upgradable(&current.arch, &self.pkg(*id).arch))
                    .collect();
                let Some(&top) = same_arch.first() else {
                    continue;
                };
                if self.pkg(top).nevra() == current.nevra() {
                    continue;
                }

                let mut first_problem = None;
                let mut synced = false;
                for id in same_arch.into_iter().filter(|id| self.pkg(*id).nevra() != current.nevra()) {
                    let attempt = self
                        .install(&next, id, Reason::None, Some(target))
                        .and_then(|s| self.pinned(s, &[id], |s| self.repair(s)));
                    match attempt {
                        Ok(s) => {
                            next = s;
                            synced = true;
                            break;
                        }
                        Err(problem) => {
                            if self.exhausted.get() {
                                return Err(problem);
                            }
                            first_problem.get_or_insert(problem);
                        }
                    }
                }
                if !synced {
                    return Err(first_problem.unwrap_or_default());
                }
            }
        }
        Ok(next)
    }

    /// Put `id` into its slot and satisfy everything it needs
    fn install(&self, state: &State, id: PackageId, reason: Reason, replaces: Option<PackageId>) -> Attempt {
        self.tick()?;
        let pkg = self.pkg(id);
        let na = pkg.na();
        trace!("Trying {}", pkg.nevra());

        if state.slots.get(&na) == Some(&id) {
            return Ok(state.clone());
        }
        if state.locked.contains(&na) {
            if let Some(current) = state.slots.get(&na) {
                return Err(SolverProblem::new(vec![ProblemRule::SameName {
                    first: self.nevra(*current),
                    second: pkg.nevra(),
                }]));
            }
        }

        let mut next = state.clone();
        if let Some(old) = next.slots.insert(na, id) {
            next.reasons.remove(&old);
        }
        next.reasons.insert(id, reason);

        if let Some(old) = replaces {
            if let Some(slot) = self.slot_of(&next, old) {
                if next.locked.contains(&slot) {
                    return Err(SolverProblem::new(vec![ProblemRule::SameName {
                        first: self.nevra(old),
                        second: pkg.nevra(),
                    }]));
                }
                next.slots.remove(&slot);
            }
        }

        let obsoleted: Vec<(String, PackageId)> = next
            .slots
            .iter()
            .filter(|(_, other)| **other != id)
            .filter(|(_, other)| {
                let o = self.pkg(**other);
                o.is_installed() && pkg.obsoletes_package(o)
            })
            .map(|(slot, other)| (slot.clone(), *other))
            .collect();
        for (slot, other) in obsoleted {
            if next.locked.contains(&slot) {
                return Err(SolverProblem::new(vec![ProblemRule::SameName {
                    first: self.nevra(other),
                    second: pkg.nevra(),
                }]));
            }
            next.slots.remove(&slot);
        }

        self.check_protected(state, &next)?;
        self.check_conflicts(&next, id)?;

        for dep in &pkg.requires {
            next = self.satisfy(next, dep, id)?;
        }
        Ok(next)
    }

    /// Make sure something in the state provides `dep`
    fn satisfy(&self, state: State, dep: &Reldep, requirer: PackageId) -> Attempt {
        if self.state_provides(&state, dep) {
            return Ok(state);
        }

        let providers = self.providers(dep);
        if providers.is_empty() {
            let erased_provider = self
                .snap
                .packages()
                .iter()
                .any(|p| self.erase_locked(p.id) && p.provides_dep(dep));
            if erased_provider {
                debug!("{} needed by {} is only provided by removed packages", dep, self.nevra(requirer));
                return Err(SolverProblem::new(vec![ProblemRule::ConflictingRequests]));
            }
            return Err(SolverProblem::new(vec![ProblemRule::NothingProvides {
                dep: dep.to_string(),
                package: self.nevra(requirer),
            }]));
        }

        let mut first_problem = None;
        for provider in providers {
            let replaces = self.same_slot_installed(&state, provider);
            match self.install(&state, provider, Reason::Dependency, replaces) {
                Ok(next) => return Ok(next),
                Err(problem) => {
                    if self.exhausted.get() {
                        return Err(problem);
                    }
                    first_problem.get_or_insert(problem);
                }
            }
        }

        let mut problem = SolverProblem::new(vec![ProblemRule::RequiresUninstallable {
            dep: dep.to_string(),
            package: self.nevra(requirer),
        }]);
        for rule in first_problem.map(|p| p.rules).unwrap_or_default() {
            problem.push(rule);
        }
        Err(problem)
    }

    /// Fix packages whose requirements broke because something they needed
    /// was replaced; an installed package may be upgraded to do so
    fn repair(&self, state: State) -> Attempt {
        let mut state = state;
        loop {
            let broken = state.ids().find(|id| !self.requires_met(&state, *id));
            let Some(id) = broken else {
                return Ok(state);
            };
            let pkg = self.pkg(id);
            let unmet: Vec<&Reldep> = pkg
                .requires
                .iter()
                .filter(|d| !self.state_provides(&state, d))
                .collect();

            let mut fixed = None;
            let mut first_problem = None;
            for dep in &unmet {
                let attempt = match fixed.take() {
                    Some(s) => self.satisfy(s, dep, id),
                    None => self.satisfy(state.clone(), dep, id),
                };
                match attempt {
                    Ok(s) => fixed = Some(s),
                    Err(problem) => {
                        if self.exhausted.get() {
                            return Err(problem);
                        }
                        first_problem = Some(problem);
                        fixed = None;
                        break;
                    }
                }
            }
            if let Some(s) = fixed {
                state = s;
                continue;
            }

            // try moving the broken package itself
            let mut moved = None;
            if pkg.is_installed() {
                for newer in self.newer_versions(pkg) {
                    if let Ok(s) = self.install(&state, newer, Reason::None, Some(id)) {
                        moved = Some(s);
                        break;
                    }
                    if self.exhausted.get() {
                        break;
                    }
                }
            }
            match moved {
                Some(s) => state = s,
                None => return Err(first_problem.unwrap_or_default()),
            }
        }
    }

    fn add_weak_deps(&self, state: State, original: &BTreeSet<PackageId>) -> State {
        let added: Vec<PackageId> = state.ids().filter(|id| !original.contains(id)).collect();
        let mut state = state;
        let previous = state.locked.clone();
        for id in &added {
            state.locked.insert(self.pkg(*id).na());
        }

        for id in added {
            for dep in &self.pkg(id).recommends {
                if self.state_provides(&state, dep) {
                    continue;
                }
                for provider in self.providers(dep) {
                    let replaces = self.same_slot_installed(&state, provider);
                    match self.install(&state, provider, Reason::WeakDependency, replaces) {
                        Ok(next) => {
                            state = next;
                            break;
                        }
                        Err(problem) => trace!("Weak dependency {} skipped: {}", dep, problem),
                    }
                    if self.exhausted.get() {
                        break;
                    }
                }
            }
        }
        state.locked = previous;
        state
    }

    fn check_conflicts(&self, state: &State, id: PackageId) -> std::result::Result<(), SolverProblem> {
        let pkg = self.pkg(id);
        for other_id in state.ids().filter(|o| *o != id) {
            let other = self.pkg(other_id);
            if let Some(dep) = pkg.conflicts.iter().find(|d| other.provides_dep(d)) {
                return Err(SolverProblem::new(vec![ProblemRule::Conflicts {
                    package: pkg.nevra(),
                    dep: dep.to_string(),
                    provider: other.nevra(),
                }]));
            }
            if let Some(dep) = other.conflicts.iter().find(|d| pkg.provides_dep(d)) {
                return Err(SolverProblem::new(vec![ProblemRule::Conflicts {
                    package: other.nevra(),
                    dep: dep.to_string(),
                    provider: pkg.nevra(),
                }]));
            }
        }
        Ok(())
    }

    /// Fail if `next` lost a protected package `before` had
    fn check_protected(&self, before: &State, next: &State) -> std::result::Result<(), SolverProblem> {
        if self.input.protected.is_empty() {
            return Ok(());
        }
        let names: BTreeSet<String> = before
            .ids()
            .filter(|id| !next.holds(*id))
            .map(|id| self.pkg(id))
            .filter(|p| p.is_installed() && self.input.protected.contains(&p.name))
            .filter(|p| !next.ids().any(|n| self.pkg(n).name == p.name))
            .map(|p| p.name.clone())
            .collect();
        if names.is_empty() {
            return Ok(());
        }
        Err(SolverProblem::new(vec![ProblemRule::RemovalOfProtected {
            names: names.into_iter().collect(),
        }]))
    }

    fn state_provides(&self, state: &State, dep: &Reldep) -> bool {
        state.ids().any(|id| self.pkg(id).provides_dep(dep))
    }

    fn requires_met(&self, state: &State, id: PackageId) -> bool {
        self.pkg(id)
            .requires
            .iter()
            .all(|dep| self.state_provides(state, dep))
    }

    fn slot_of(&self, state: &State, id: PackageId) -> Option<String> {
        state
            .slots
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(k, _)| k.clone())
    }

    /// Installed package currently in the slot `id` would take
    fn same_slot_installed(&self, state: &State, id: PackageId) -> Option<PackageId> {
        state
            .slots
            .get(&self.pkg(id).na())
            .copied()
            .filter(|current| *current != id)
    }

    /// Installable providers of `dep`, best first
    fn providers(&self, dep: &Reldep) -> Vec<PackageId> {
        if let Some(cached) = self.providers.borrow().get(dep) {
            return cached.clone();
        }
        let mut ids: Vec<PackageId> = self
            .snap
            .packages()
            .iter()
            .filter(|p| self.installable(p) && p.provides_dep(dep))
            .map(|p| p.id)
            .collect();
        PackageSelector::sort_best_first(self.snap, &mut ids, &[]);
        self.providers.borrow_mut().insert(dep.clone(), ids.clone());
        ids
    }

    fn installable(&self, pkg: &Package) -> bool {
        !pkg.is_installed()
            && !pkg.is_source()
            && !self.snap.is_excluded(pkg.id)
            && !self.erase_locked(pkg.id)
            && PackageSelector::is_architecture_compatible(&pkg.arch, &self.input.system_arch)
    }

    /// Available versions of `pkg`'s name.arch newer than it, best first
    fn newer_versions(&self, pkg: &Package) -> Vec<PackageId> {
        let mut ids: Vec<PackageId> = self
            .snap
            .packages()
            .iter()
            .filter(|p| self.installable(p) && p.name == pkg.name && p.arch == pkg.arch && p.evr > pkg.evr)
            .map(|p| p.id)
            .collect();
        PackageSelector::sort_best_first(self.snap, &mut ids, &[]);
        ids
    }

    /// Candidates sharing the highest EVR of their name
    fn top_evr(&self, candidates: &[PackageId]) -> Vec<PackageId> {
        let mut best: HashMap<&str, &crate::version::Evr> = HashMap::new();
        for id in candidates {
            let p = self.pkg(*id);
            best.entry(p.name.as_str())
                .and_modify(|e| {
                    if p.evr > **e {
                        *e = &p.evr;
                    }
                })
                .or_insert(&p.evr);
        }
        candidates
            .iter()
            .copied()
            .filter(|id| {
                let p = self.pkg(*id);
                best.get(p.name.as_str()).is_some_and(|e| **e == p.evr)
            })
            .collect()
    }
}

/// Upgrades keep the arch, or move to or from noarch
fn arch_upgradable(installed: &str, candidate: &str) -> bool {
    installed == candidate || installed == "noarch" || candidate == "noarch"
}

/// Group ids by package name, keeping their relative order
fn group_by_name(snap: &SackSnapshot, ids: &[PackageId]) -> BTreeMap<String, Vec<PackageId>> {
    let mut groups: BTreeMap<String, Vec<PackageId>> = BTreeMap::new();
    for id in ids {
        groups
            .entry(snap.package(*id).name.clone())
            .or_default()
            .push(*id);
    }
    groups
}
