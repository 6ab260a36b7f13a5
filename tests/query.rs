// tests/query.rs

//! Package queries over loaded repositories

mod common;

use common::{noarch, pkg, TestRoot};
use rpmgoal::{Base, CmpMode, Nevra, NoopCallbacks, PackageQuery};

fn nevras(query: &PackageQuery) -> Vec<String> {
    query.iter().map(|p| p.nevra()).collect()
}

fn root() -> TestRoot {
    let root = TestRoot::new();
    root.add_repo(
        "repo1",
        &[noarch("one", "1-1"), noarch("one", "2-1"), pkg("two", "1-1", "x86_64")],
    );
    root.add_repo("repo2", &[noarch("three", "1-1"), pkg("two", "2-1", "i686")]);
    root.set_installed(&[noarch("one", "1-1")]);
    root
}

#[test]
fn test_union_then_difference_restores_set() {
    let root = root();
    let base = root.base();

    let mut a = PackageQuery::new(base.sack());
    a.filter_repo_id(&["repo1"], CmpMode::Eq).unwrap();
    let mut b = PackageQuery::new(base.sack());
    b.filter_repo_id(&["repo2"], CmpMode::Eq).unwrap();
    let original = nevras(&a);

    let mut combined = a.clone();
    combined.update(&b).unwrap();
    assert_eq!(combined.size(), a.size() + b.size());
    combined.difference(&b).unwrap();
    assert_eq!(nevras(&combined), original);
}

#[test]
fn test_installed_and_available_split() {
    let root = root();
    let base = root.base();

    let mut installed = PackageQuery::new(base.sack());
    installed.filter_installed();
    assert_eq!(nevras(&installed), vec!["one-1-1.noarch".to_string()]);

    let mut upgrades = PackageQuery::new(base.sack());
    upgrades.filter_upgrades();
    assert_eq!(nevras(&upgrades), vec!["one-2-1.noarch".to_string()]);

    let mut arch_ok = PackageQuery::new(base.sack());
    arch_ok.filter_available();
    arch_ok.filter_name(&["two"], CmpMode::Eq).unwrap();
    arch_ok.filter_arch_compatible("x86_64");
    assert_eq!(nevras(&arch_ok), vec!["two-1-1.x86_64".to_string(), "two-2-1.i686".to_string()]);
}

#[test]
fn test_glob_and_latest() {
    let root = root();
    let base = root.base();

    let mut query = PackageQuery::new(base.sack());
    query.filter_available();
    query.filter_name(&["o*"], CmpMode::Glob).unwrap();
    query.filter_latest_evr(1);
    assert_eq!(nevras(&query), vec!["one-2-1.noarch".to_string()]);
}

#[test]
fn test_dependency_and_location_filters() {
    let root = TestRoot::new();
    let mut app = noarch("app", "2:1.0-1");
    app.requires = vec!["libfoo >= 1".to_string()];
    app.conflicts = vec!["oldapp".to_string()];
    app.location = Some("Packages/a/app-1.0-1.noarch.rpm".to_string());
    root.add_repo("repo1", &[app, pkg("libfoo", "1-1", "x86_64"), noarch("three", "1-1")]);

    let mut config = root.config();
    config.excludepkgs = vec!["three".to_string()];
    let base = Base::new(config).unwrap();
    base.load_repos(&NoopCallbacks).unwrap();

    let mut requiring = PackageQuery::new(base.sack());
    requiring.filter_requires(&["libfoo"], CmpMode::Eq).unwrap();
    assert_eq!(nevras(&requiring), vec!["app-2:1.0-1.noarch".to_string()]);

    let mut conflicting = PackageQuery::new(base.sack());
    conflicting.filter_conflicts(&["old*"], CmpMode::Glob).unwrap();
    assert_eq!(conflicting.size(), 1);

    let mut epoch = PackageQuery::new(base.sack());
    epoch.filter_epoch(&[2], CmpMode::Eq);
    assert_eq!(nevras(&epoch), nevras(&requiring));

    let mut located = PackageQuery::new(base.sack());
    located.filter_location(&["Packages/a/*"], CmpMode::Glob).unwrap();
    assert_eq!(located.size(), 1);

    let nevra = Nevra {
        name: "libfoo".to_string(),
        arch: "x86_64".to_string(),
        ..Default::default()
    };
    let mut parts = PackageQuery::new(base.sack());
    parts.filter_nevra_parts(&nevra, CmpMode::Eq).unwrap();
    assert_eq!(nevras(&parts), vec!["libfoo-1-1.x86_64".to_string()]);

    // excluded packages only show up when asked for
    let mut visible = PackageQuery::new(base.sack());
    visible.filter_name(&["three"], CmpMode::Eq).unwrap();
    assert!(visible.is_empty());
    let mut excluded = PackageQuery::new_with_excluded(base.sack());
    excluded.filter_excluded(true);
    assert_eq!(nevras(&excluded), vec!["three-1-1.noarch".to_string()]);
    assert!(excluded.empty_like().is_empty());
}

#[test]
fn test_downgradable_and_earliest() {
    let root = TestRoot::new();
    root.add_repo("repo1", &[noarch("one", "1-1"), noarch("one", "2-1"), noarch("one", "3-1")]);
    root.set_installed(&[noarch("one", "3-1")]);
    let base = root.base();

    let mut downgradable = PackageQuery::new(base.sack());
    downgradable.filter_downgradable();
    assert_eq!(downgradable.size(), 1);
    assert!(downgradable.iter().all(|p| p.is_installed()));

    let mut earliest = PackageQuery::new(base.sack());
    earliest.filter_available();
    earliest.filter_earliest_evr(1);
    assert_eq!(nevras(&earliest), vec!["one-1-1.noarch".to_string()]);

    let mut downgrades = PackageQuery::new(base.sack());
    downgrades.filter_downgrades();
    downgrades.filter_latest_evr(1);
    assert_eq!(nevras(&downgrades), vec!["one-2-1.noarch".to_string()]);
}
