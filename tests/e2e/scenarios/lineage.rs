use crate::harness::{Assertion, Scenario};
use vault_core::LinkageType::{BranchFrom, Sequential};
use vault_core::MetadataBackend;

#[test]
fn test_sequential_chain_on_main() {
    Scenario::new("sequential_chain")
        .codebase("proj")
        .file("a.txt", b"hello")
        .snapshot("main", "v1")
        .file("a.txt", b"hello again")
        .snapshot("main", "v2")
        .snapshot("main", "v3")
        .assert_root(("main", "v1"))
        .assert_parent(("main", "v2"), ("main", "v1"), Sequential)
        .assert_parent(("main", "v3"), ("main", "v2"), Sequential)
        .assert_edge_count(2)
        .assert_head("main", "v3")
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_new_branch_forks_from_latest_main() {
    Scenario::new("fork_from_main")
        .codebase("proj")
        .file("a.txt", b"hello")
        .file("b.png", b"\x89PNG\r\n\x1a\n")
        .snapshot("main", "v1")
        .snapshot("main", "v2")
        .snapshot("feature", "f1")
        .snapshot("feature", "f2")
        .assert_parent(("feature", "f1"), ("main", "v2"), BranchFrom)
        .assert_parent(("feature", "f2"), ("feature", "f1"), Sequential)
        .assert_head("main", "v2")
        .assert_head("feature", "f2")
        .assert_version_count(4)
        .run()
        .unwrap();
}

#[test]
fn test_explicit_branch_from_overrides_fork_point() {
    Scenario::new("explicit_branch_from")
        .codebase("proj")
        .file("a.txt", b"one")
        .snapshot("main", "v1")
        .snapshot("main", "v2")
        .snapshot_from("hotfix", "h1", ("main", "v1"))
        .assert_parent(("hotfix", "h1"), ("main", "v1"), BranchFrom)
        .run()
        .unwrap();
}

#[test]
fn test_first_version_on_side_branch_is_root() {
    // No default-branch version exists to fork from
    Scenario::new("side_branch_root")
        .codebase("proj")
        .file("a.txt", b"x")
        .snapshot("experiment", "e1")
        .snapshot("experiment", "e2")
        .assert_root(("experiment", "e1"))
        .assert_parent(("experiment", "e2"), ("experiment", "e1"), Sequential)
        .run()
        .unwrap();
}

#[test]
fn test_custom_default_branch_is_fork_source() {
    Scenario::new("custom_default_branch")
        .codebase_with_branch("proj", "trunk")
        .file("a.txt", b"x")
        .snapshot("trunk", "t1")
        .snapshot("main", "m1")
        .assert_parent(("main", "m1"), ("trunk", "t1"), BranchFrom)
        .run()
        .unwrap();
}

#[test]
fn test_unlinked_snapshot_then_manual_link() {
    Scenario::new("manual_link")
        .codebase("proj")
        .file("a.txt", b"x")
        .snapshot("main", "v1")
        .snapshot_unlinked("main", "v2")
        .assert_root(("main", "v2"))
        .link(("main", "v2"), ("main", "v1"), Sequential, true)
        .assert_parent(("main", "v2"), ("main", "v1"), Sequential)
        // A child keeps its first parent
        .link(("main", "v2"), ("main", "v1"), BranchFrom, false)
        .assert_parent(("main", "v2"), ("main", "v1"), Sequential)
        .snapshot("feature", "f1")
        .link(("feature", "f1"), ("main", "v1"), BranchFrom, false)
        .assert_parent(("feature", "f1"), ("main", "v2"), BranchFrom)
        .assert_edge_count(2)
        .run()
        .unwrap();
}

#[test]
fn test_cached_graph_is_refreshed_by_rebuild() {
    Scenario::new("graph_cache")
        .codebase("proj")
        .file("a.txt", b"x")
        .snapshot("main", "v1")
        .assert(Assertion::GraphNodeCount(1))
        .snapshot("main", "v2")
        // Automatic linking leaves the cached graph as it was
        .assert(Assertion::GraphNodeCount(1))
        .rebuild_graph()
        .assert(Assertion::GraphNodeCount(2))
        .run()
        .unwrap();
}

#[test]
fn test_lineage_on_redb_backend() {
    Scenario::new("lineage_redb")
        .with_backend(MetadataBackend::Redb)
        .codebase("proj")
        .file("a.txt", b"x")
        .snapshot("main", "v1")
        .snapshot("main", "v2")
        .snapshot("feature", "f1")
        .assert_parent(("main", "v2"), ("main", "v1"), Sequential)
        .assert_parent(("feature", "f1"), ("main", "v2"), BranchFrom)
        .assert_head("feature", "f1")
        .run()
        .unwrap();
}
