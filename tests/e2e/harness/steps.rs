use super::assertions::Assertion;
use vault_core::{LinkageType, VersionRef};

/// All possible actions in a test scenario
#[derive(Debug)]
pub enum ScenarioStep {
    // Codebase lifecycle
    InitCodebase {
        name: String,
        default_branch: String,
    },
    DeleteCodebase,

    // Working files (the next snapshot uploads exactly these)
    WriteFile {
        path: String,
        content: Vec<u8>,
    },
    RemoveFile {
        path: String,
    },

    // Snapshots
    Snapshot {
        branch: String,
        label: String,
        branch_from: Option<VersionRef>,
        auto_linkage: bool,
    },
    SnapshotFails {
        branch: String,
        label: String,
        error_contains: String,
    },

    // Lineage
    Link {
        child: VersionRef,
        parent: VersionRef,
        linkage_type: LinkageType,
        expect_created: bool,
    },
    RebuildGraph,

    // Process and storage control
    Restart,
    SwitchStorageRoot {
        dir: String,
    },

    // Assertions (can be interspersed)
    Assert {
        assertion: Assertion,
    },
}
