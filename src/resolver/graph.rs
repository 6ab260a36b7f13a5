// src/resolver/graph.rs

//! Dependency graph for transaction ordering
//!
//! Nodes are the packages of one transaction; an edge `a -> b` means `a`
//! requires something `b` provides. Installing follows the edges backwards
//! (providers first), erasing follows them forwards (dependents first).

use crate::error::{Error, Result};
use crate::package::{Package, PackageId};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Dependency graph over package ids
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<PackageId>,
    /// Package to the packages it depends on
    edges: BTreeMap<PackageId, BTreeSet<PackageId>>,
    /// Package to the packages depending on it
    reverse_edges: BTreeMap<PackageId, BTreeSet<PackageId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of `requires` among `packages`
    ///
    /// Requirements satisfied outside the set add no edge. Self-requires
    /// are ignored.
    pub fn from_packages(packages: &[Arc<Package>]) -> Self {
        let mut graph = Self::new();
        for pkg in packages {
            graph.add_node(pkg.id);
        }
        for pkg in packages {
            for dep in &pkg.requires {
                for provider in packages.iter().filter(|p| p.id != pkg.id) {
                    if provider.provides_dep(dep) {
                        graph.add_edge(pkg.id, provider.id);
                    }
                }
            }
        }
        graph
    }

    pub fn add_node(&mut self, id: PackageId) {
        self.nodes.insert(id);
    }

    /// Record that `from` depends on `to`
    pub fn add_edge(&mut self, from: PackageId, to: PackageId) {
        self.nodes.insert(from);
        self.nodes.insert(to);
        self.edges.entry(from).or_default().insert(to);
        self.reverse_edges.entry(to).or_default().insert(from);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get_dependencies(&self, id: PackageId) -> Vec<PackageId> {
        self.edges
            .get(&id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn get_dependents(&self, id: PackageId) -> Vec<PackageId> {
        self.reverse_edges
            .get(&id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Kahn's algorithm; dependencies come before dependents
    ///
    /// Ready nodes are taken lowest id first, so the order is deterministic.
    /// Fails if the graph has a cycle.
    pub fn topological_sort(&self) -> Result<Vec<PackageId>> {
        let mut pending: BTreeMap<PackageId, usize> = self
            .nodes
            .iter()
            .map(|id| (*id, self.edges.get(id).map_or(0, |d| d.len())))
            .collect();
        let mut ready: BTreeSet<PackageId> = pending
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(id) = ready.pop_first() {
            pending.remove(&id);
            result.push(id);
            for dependent in self.get_dependents(id) {
                if let Some(n) = pending.get_mut(&dependent) {
                    *n -= 1;
                    if *n == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if result.len() != self.nodes.len() {
            return Err(Error::TransactionError(
                "Circular dependency detected in package graph".to_string(),
            ));
        }
        Ok(result)
    }

    /// Installation order that tolerates cycles
    ///
    /// When the graph is cyclic the lowest-id package of the stuck set is
    /// emitted next, which breaks the cycle.
    pub fn install_order(&self) -> Vec<PackageId> {
        if let Ok(order) = self.topological_sort() {
            return order;
        }
        if let Some(cycle) = self.detect_cycle() {
            let names: Vec<String> = cycle.iter().map(|id| id.to_string()).collect();
            debug!("Breaking dependency cycle between packages {}", names.join(" -> "));
        }

        let mut placed: HashSet<PackageId> = HashSet::new();
        let mut result = Vec::with_capacity(self.nodes.len());
        while result.len() < self.nodes.len() {
            let next = self
                .nodes
                .iter()
                .copied()
                .filter(|id| !placed.contains(id))
                .find(|id| self.get_dependencies(*id).iter().all(|d| placed.contains(d)))
                .or_else(|| self.nodes.iter().copied().find(|id| !placed.contains(id)));
            let Some(id) = next else { break };
            placed.insert(id);
            result.push(id);
        }
        result
    }

    /// Erase order: dependents before what they depend on
    pub fn removal_order(&self) -> Vec<PackageId> {
        let mut order = self.install_order();
        order.reverse();
        order
    }

    /// Packages forming a cycle, if there is one
    pub fn detect_cycle(&self) -> Option<Vec<PackageId>> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut cycle = Vec::new();

        for id in &self.nodes {
            if !visited.contains(id)
                && self.dfs_cycle_detect(*id, &mut visited, &mut rec_stack, &mut cycle)
            {
                cycle.reverse();
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_cycle_detect(
        &self,
        id: PackageId,
        visited: &mut HashSet<PackageId>,
        rec_stack: &mut HashSet<PackageId>,
        cycle: &mut Vec<PackageId>,
    ) -> bool {
        visited.insert(id);
        rec_stack.insert(id);

        for dep in self.get_dependencies(id) {
            if !visited.contains(&dep) {
                if self.dfs_cycle_detect(dep, visited, rec_stack, cycle) {
                    cycle.push(id);
                    return true;
                }
            } else if rec_stack.contains(&dep) {
                cycle.push(dep);
                cycle.push(id);
                return true;
            }
        }

        rec_stack.remove(&id);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageRecord;

    fn pkg(id: u32, name: &str, requires: &[&str]) -> Arc<Package> {
        let mut rec = PackageRecord::new(name, "1-1", "noarch").unwrap();
        rec.requires = requires.iter().map(|s| s.to_string()).collect();
        Arc::new(Package::from_record(PackageId(id), "repo1", &rec).unwrap())
    }

    #[test]
    fn test_providers_come_first() {
        let packages = vec![
            pkg(0, "app", &["lib"]),
            pkg(1, "lib", &["base"]),
            pkg(2, "base", &[]),
        ];
        let graph = DependencyGraph::from_packages(&packages);
        assert_eq!(graph.get_dependencies(PackageId(0)), vec![PackageId(1)]);
        assert_eq!(graph.get_dependents(PackageId(2)), vec![PackageId(1)]);
        assert_eq!(
            graph.topological_sort().unwrap(),
            vec![PackageId(2), PackageId(1), PackageId(0)]
        );
        assert_eq!(
            graph.removal_order(),
            vec![PackageId(0), PackageId(1), PackageId(2)]
        );
    }

    #[test]
    fn test_independent_packages_keep_id_order() {
        let packages = vec![pkg(3, "c", &[]), pkg(1, "a", &[]), pkg(2, "b", &[])];
        let graph = DependencyGraph::from_packages(&packages);
        assert_eq!(
            graph.install_order(),
            vec![PackageId(1), PackageId(2), PackageId(3)]
        );
    }

    #[test]
    fn test_cycles_are_tolerated() {
        let packages = vec![
            pkg(0, "glibc", &["glibc-common"]),
            pkg(1, "glibc-common", &["glibc"]),
            pkg(2, "bash", &["glibc"]),
        ];
        let graph = DependencyGraph::from_packages(&packages);
        assert!(graph.topological_sort().is_err());
        assert!(graph.detect_cycle().is_some());

        let order = graph.install_order();
        assert_eq!(order.len(), 3);
        assert_eq!(order.last(), Some(&PackageId(2)));
    }
}
