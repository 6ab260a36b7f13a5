// src/repository/selector.rs

//! Candidate ordering for package selection
//!
//! When several packages can satisfy a job, the solver tries them in the
//! order produced here. The order is fully deterministic so the same
//! fixtures always resolve to the same NEVRAs.

use crate::package::PackageId;
use crate::sack::SackSnapshot;
use glob::Pattern;
use std::env;
use tracing::debug;

/// Package selector for choosing the best package from multiple matches
pub struct PackageSelector;

impl PackageSelector {
    /// Detect the current system architecture
    pub fn detect_architecture() -> String {
        // env::consts::ARCH returns the target architecture
        // Common values: "x86_64", "aarch64", "x86", "arm", etc.
        match env::consts::ARCH {
            "x86" => "i686".to_string(),
            arch => arch.to_string(),
        }
    }

    /// Check if a package architecture is compatible with the system
    pub fn is_architecture_compatible(pkg_arch: &str, system_arch: &str) -> bool {
        match pkg_arch {
            "noarch" => true,
            "i686" | "i586" | "i486" | "i386" => {
                system_arch == "x86_64" || system_arch == pkg_arch || system_arch == "i686"
            }
            arch => arch == system_arch,
        }
    }

    /// Order candidates best first
    ///
    /// Selection criteria (in order of priority):
    /// 1. Repository listed in `preferred_repos` (glob patterns)
    /// 2. Version (highest EVR by rpm comparison)
    /// 3. Repository priority (lower number is better)
    /// 4. Repository load order
    /// 5. Package id (stable tie-breaker)
    pub fn sort_best_first(
        snapshot: &SackSnapshot,
        candidates: &mut [PackageId],
        preferred_repos: &[String],
    ) {
        let patterns: Vec<Pattern> = preferred_repos
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .collect();
        let preferred = |id: PackageId| {
            let repo_id = &snapshot.package(id).repo_id;
            patterns.iter().any(|p| p.matches(repo_id))
        };

        candidates.sort_by(|&a, &b| {
            let (pa, pb) = (snapshot.package(a), snapshot.package(b));
            preferred(b)
                .cmp(&preferred(a))
                .then_with(|| pb.evr.cmp(&pa.evr))
                .then_with(|| snapshot.repo_rank(a).cmp(&snapshot.repo_rank(b)))
                .then_with(|| a.cmp(&b))
        });
    }

    /// Select the best candidate, if any
    pub fn select_best(
        snapshot: &SackSnapshot,
        candidates: &[PackageId],
        preferred_repos: &[String],
    ) -> Option<PackageId> {
        let mut sorted = candidates.to_vec();
        Self::sort_best_first(snapshot, &mut sorted, preferred_repos);
        let best = sorted.first().copied();
        if let Some(id) = best {
            let pkg = snapshot.package(id);
            debug!(
                "Selected package {} from repository {} (priority {})",
                pkg.nevra(),
                pkg.repo_id,
                snapshot.repo_rank(id).0
            );
        }
        best
    }
}
