use super::assertions::Assertion;
use super::runner::ScenarioRunner;
use super::steps::ScenarioStep;
use vault_core::{LinkageType, MetadataBackend, VersionRef, DEFAULT_BRANCH};

/// Fluent DSL for building test scenarios
pub struct Scenario {
    name: String,
    backend: MetadataBackend,
    steps: Vec<ScenarioStep>,
}

fn vref(branch: &str, label: &str) -> VersionRef {
    VersionRef::new(branch, label)
}

impl Scenario {
    /// Create a new scenario with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            backend: MetadataBackend::default(),
            steps: Vec::new(),
        }
    }

    // ===== Initial setup =====

    /// Run against a specific metadata backend
    pub fn with_backend(mut self, backend: MetadataBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Create the codebase every later step works on
    pub fn codebase(self, name: &str) -> Self {
        self.codebase_with_branch(name, DEFAULT_BRANCH)
    }

    /// Create the codebase with a custom default branch
    pub fn codebase_with_branch(mut self, name: &str, default_branch: &str) -> Self {
        self.steps.push(ScenarioStep::InitCodebase {
            name: name.to_string(),
            default_branch: default_branch.to_string(),
        });
        self
    }

    /// Delete the current codebase
    pub fn delete_codebase(mut self) -> Self {
        self.steps.push(ScenarioStep::DeleteCodebase);
        self
    }

    // ===== Working files =====

    /// Add or replace a file in the next upload
    pub fn file(mut self, path: &str, content: &[u8]) -> Self {
        self.steps.push(ScenarioStep::WriteFile {
            path: path.to_string(),
            content: content.to_vec(),
        });
        self
    }

    /// Drop a file from the next upload
    pub fn remove_file(mut self, path: &str) -> Self {
        self.steps.push(ScenarioStep::RemoveFile {
            path: path.to_string(),
        });
        self
    }

    // ===== Snapshots =====

    /// Snapshot the working files with automatic lineage
    pub fn snapshot(mut self, branch: &str, label: &str) -> Self {
        self.steps.push(ScenarioStep::Snapshot {
            branch: branch.to_string(),
            label: label.to_string(),
            branch_from: None,
            auto_linkage: true,
        });
        self
    }

    /// Snapshot forking from an explicit version
    pub fn snapshot_from(mut self, branch: &str, label: &str, from: (&str, &str)) -> Self {
        self.steps.push(ScenarioStep::Snapshot {
            branch: branch.to_string(),
            label: label.to_string(),
            branch_from: Some(vref(from.0, from.1)),
            auto_linkage: true,
        });
        self
    }

    /// Snapshot without linking
    pub fn snapshot_unlinked(mut self, branch: &str, label: &str) -> Self {
        self.steps.push(ScenarioStep::Snapshot {
            branch: branch.to_string(),
            label: label.to_string(),
            branch_from: None,
            auto_linkage: false,
        });
        self
    }

    /// Snapshot that must fail with an error mentioning `error_contains`
    pub fn snapshot_fails(mut self, branch: &str, label: &str, error_contains: &str) -> Self {
        self.steps.push(ScenarioStep::SnapshotFails {
            branch: branch.to_string(),
            label: label.to_string(),
            error_contains: error_contains.to_string(),
        });
        self
    }

    // ===== Lineage =====

    /// Link two versions by hand; `expect_created` is the expected result
    pub fn link(
        mut self,
        child: (&str, &str),
        parent: (&str, &str),
        linkage_type: LinkageType,
        expect_created: bool,
    ) -> Self {
        self.steps.push(ScenarioStep::Link {
            child: vref(child.0, child.1),
            parent: vref(parent.0, parent.1),
            linkage_type,
            expect_created,
        });
        self
    }

    /// Rebuild the cached graph
    pub fn rebuild_graph(mut self) -> Self {
        self.steps.push(ScenarioStep::RebuildGraph);
        self
    }

    // ===== Process and storage control =====

    /// Drop the vault and reopen it from the saved config
    pub fn restart(mut self) -> Self {
        self.steps.push(ScenarioStep::Restart);
        self
    }

    /// Point storage at a new directory inside the workspace
    pub fn switch_storage_root(mut self, dir: &str) -> Self {
        self.steps.push(ScenarioStep::SwitchStorageRoot {
            dir: dir.to_string(),
        });
        self
    }

    // ===== Assertions =====

    /// Add a general assertion
    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.steps.push(ScenarioStep::Assert { assertion });
        self
    }

    /// Assert the codebase has exactly `count` versions
    pub fn assert_version_count(self, count: usize) -> Self {
        self.assert(Assertion::VersionCount(count))
    }

    /// Assert `child` is linked to `parent`
    pub fn assert_parent(
        self,
        child: (&str, &str),
        parent: (&str, &str),
        linkage_type: LinkageType,
    ) -> Self {
        self.assert(Assertion::ParentOf {
            child: vref(child.0, child.1),
            parent: vref(parent.0, parent.1),
            linkage_type,
        })
    }

    /// Assert a version has no parent
    pub fn assert_root(self, version: (&str, &str)) -> Self {
        self.assert(Assertion::IsRoot(vref(version.0, version.1)))
    }

    /// Assert the graph's head for `branch`
    pub fn assert_head(self, branch: &str, label: &str) -> Self {
        self.assert(Assertion::BranchHead {
            branch: branch.to_string(),
            label: label.to_string(),
        })
    }

    /// Assert the number of lineage edges
    pub fn assert_edge_count(self, count: usize) -> Self {
        self.assert(Assertion::EdgeCount(count))
    }

    /// Assert a file's content inside a stored version
    pub fn assert_file(self, version: (&str, &str), path: &str, content: &[u8]) -> Self {
        self.assert(Assertion::FileEquals {
            version: vref(version.0, version.1),
            path: path.to_string(),
            content: content.to_vec(),
        })
    }

    /// Assert a path is absent from a stored version
    pub fn assert_file_missing(self, version: (&str, &str), path: &str) -> Self {
        self.assert(Assertion::FileMissing {
            version: vref(version.0, version.1),
            path: path.to_string(),
        })
    }

    /// Assert the archive of a version holds exactly `paths`
    pub fn assert_archive_entries(self, version: (&str, &str), paths: &[&str]) -> Self {
        self.assert(Assertion::ArchiveEntries {
            version: vref(version.0, version.1),
            paths: paths.iter().map(|p| p.to_string()).collect(),
        })
    }

    // ===== Execution =====

    /// Execute the scenario and return results
    pub fn run(self) -> ScenarioResult {
        let mut runner = match ScenarioRunner::new(self.backend) {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name.clone(),
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {}", e)),
                }
            }
        };

        match runner.execute(&self.steps) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: self.steps.len(),
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{:?}", e)),
                }
            }
        }
    }
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) {
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}
