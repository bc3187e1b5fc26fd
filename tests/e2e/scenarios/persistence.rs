use crate::harness::{Assertion, Scenario};
use vault_core::LinkageType::{BranchFrom, Sequential};
use vault_core::MetadataBackend;

fn survives_restart(backend: MetadataBackend) {
    Scenario::new("restart")
        .with_backend(backend)
        .codebase("proj")
        .file("a.txt", b"hello")
        .file("img/b.png", b"\x89PNG")
        .snapshot("main", "v1")
        .snapshot("feature", "f1")
        .restart()
        .assert_version_count(2)
        .assert_parent(("feature", "f1"), ("main", "v1"), BranchFrom)
        .assert_file(("main", "v1"), "img/b.png", b"\x89PNG")
        // Lineage keeps working on reopened metadata
        .snapshot("main", "v2")
        .assert_parent(("main", "v2"), ("main", "v1"), Sequential)
        .restart()
        .assert_head("main", "v2")
        .assert(Assertion::CodebaseCount(1))
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_json_metadata_survives_restart() {
    survives_restart(MetadataBackend::Json);
}

#[test]
fn test_redb_metadata_survives_restart() {
    survives_restart(MetadataBackend::Redb);
}

#[test]
fn test_delete_removes_codebase_and_content() {
    Scenario::new("delete")
        .codebase("proj")
        .file("a.txt", b"x")
        .snapshot("main", "v1")
        .snapshot("main", "v2")
        .rebuild_graph()
        .delete_codebase()
        .assert(Assertion::CodebaseGone)
        .assert(Assertion::CodebaseCount(0))
        .restart()
        .assert(Assertion::CodebaseGone)
        .run()
        .unwrap();
}

#[test]
fn test_delete_on_redb_backend() {
    Scenario::new("delete_redb")
        .with_backend(MetadataBackend::Redb)
        .codebase("proj")
        .file("a.txt", b"x")
        .snapshot("main", "v1")
        .delete_codebase()
        .assert(Assertion::CodebaseGone)
        .run()
        .unwrap();
}

#[test]
fn test_switching_storage_root_starts_empty_and_persists() {
    Scenario::new("switch_root")
        .codebase("proj")
        .file("a.txt", b"x")
        .snapshot("main", "v1")
        .switch_storage_root("other_store")
        .assert(Assertion::CodebaseCount(0))
        .codebase("proj2")
        .snapshot("main", "v1")
        .restart()
        // The new root was saved to the config file
        .assert(Assertion::custom(|vault, _| {
            let root = vault.storage_root();
            anyhow::ensure!(root.ends_with("other_store"), "root is {}", root.display());
            let names: Vec<_> = vault.list_codebases()?.into_iter().map(|c| c.name).collect();
            anyhow::ensure!(names == vec!["proj2".to_string()], "codebases: {:?}", names);
            Ok(())
        }))
        .assert_file(("main", "v1"), "a.txt", b"x")
        .run()
        .unwrap();
}
