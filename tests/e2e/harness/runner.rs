use super::assertions::Assertion;
use super::steps::ScenarioStep;
use super::workspace::TestWorkspace;
use anyhow::{anyhow, bail, ensure, Context, Result};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use vault_core::lineage;
use vault_core::{
    LinkageType, MetadataBackend, MetadataStore, SnapshotRequest, StorageConfig, UploadedFile, Vault, VersionRef,
};

/// Executes scenarios against a real vault instance
pub struct ScenarioRunner {
    workspace: TestWorkspace,
    vault: Option<Vault>,
    codebase_id: Option<String>,
    codebase_name: Option<String>,
    files: BTreeMap<String, Vec<u8>>,
    current_step: usize,
}

impl ScenarioRunner {
    /// Create a new runner with a fresh workspace
    pub fn new(backend: MetadataBackend) -> Result<Self> {
        let workspace = TestWorkspace::new(backend)?;
        let vault = workspace.open_vault()?;

        Ok(Self {
            workspace,
            vault: Some(vault),
            codebase_id: None,
            codebase_name: None,
            files: BTreeMap::new(),
            current_step: 0,
        })
    }

    /// Get current step number
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Execute all steps in sequence
    pub fn execute(&mut self, steps: &[ScenarioStep]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.current_step = i;
            self.execute_step(step)
                .with_context(|| format!("Step {}: {:?}", i, step))?;
        }
        Ok(())
    }

    fn vault(&self) -> Result<&Vault> {
        self.vault
            .as_ref()
            .ok_or_else(|| anyhow!("Vault not available"))
    }

    fn codebase_id(&self) -> Result<&str> {
        self.codebase_id
            .as_deref()
            .ok_or_else(|| anyhow!("No codebase created yet"))
    }

    /// Execute a single step
    fn execute_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::InitCodebase {
                name,
                default_branch,
            } => self.handle_init(name, default_branch),
            ScenarioStep::DeleteCodebase => self.handle_delete(),

            ScenarioStep::WriteFile { path, content } => {
                self.files.insert(path.clone(), content.clone());
                Ok(())
            }
            ScenarioStep::RemoveFile { path } => {
                self.files
                    .remove(path)
                    .ok_or_else(|| anyhow!("No working file {}", path))?;
                Ok(())
            }

            ScenarioStep::Snapshot {
                branch,
                label,
                branch_from,
                auto_linkage,
            } => self.handle_snapshot(branch, label, branch_from.clone(), *auto_linkage),
            ScenarioStep::SnapshotFails {
                branch,
                label,
                error_contains,
            } => self.handle_snapshot_fails(branch, label, error_contains),

            ScenarioStep::Link {
                child,
                parent,
                linkage_type,
                expect_created,
            } => self.handle_link(child, parent, *linkage_type, *expect_created),
            ScenarioStep::RebuildGraph => {
                let id = self.codebase_id()?.to_string();
                self.vault()?.rebuild_graph(&id)?;
                Ok(())
            }

            ScenarioStep::Restart => self.handle_restart(),
            ScenarioStep::SwitchStorageRoot { dir } => {
                let root = self.workspace.storage_dir(dir);
                self.vault()?.set_storage_root(&root)?;
                Ok(())
            }

            ScenarioStep::Assert { assertion } => self.handle_assertion(assertion),
        }
    }

    // ===== Action handlers =====

    fn handle_init(&mut self, name: &str, default_branch: &str) -> Result<()> {
        let codebase = self
            .vault()?
            .init_codebase(name, "e2e scenario", default_branch)?;
        self.codebase_id = Some(codebase.id);
        self.codebase_name = Some(codebase.name);
        Ok(())
    }

    fn handle_delete(&mut self) -> Result<()> {
        let id = self.codebase_id()?.to_string();
        self.vault()?.delete_codebase(&id)?;
        Ok(())
    }

    fn uploads(&self) -> Vec<UploadedFile> {
        self.files
            .iter()
            .map(|(path, content)| UploadedFile::new(path.clone(), content.clone()))
            .collect()
    }

    fn handle_snapshot(
        &mut self,
        branch: &str,
        label: &str,
        branch_from: Option<VersionRef>,
        auto_linkage: bool,
    ) -> Result<()> {
        let mut request =
            SnapshotRequest::new(branch, label, self.uploads()).auto_linkage(auto_linkage);
        if let Some(reference) = branch_from {
            request = request.branch_from(reference);
        }

        let id = self.codebase_id()?.to_string();
        let outcome = self.vault()?.create_snapshot(&id, request)?;
        if let Some(err) = outcome.link_error {
            bail!("Snapshot stored but linking failed: {}", err);
        }
        ensure!(
            outcome.file_tree.files.len() == self.files.len(),
            "Expected {} file entries, got {}",
            self.files.len(),
            outcome.file_tree.files.len()
        );
        Ok(())
    }

    fn handle_snapshot_fails(&mut self, branch: &str, label: &str, needle: &str) -> Result<()> {
        let id = self.codebase_id()?.to_string();
        let request = SnapshotRequest::new(branch, label, self.uploads());
        match self.vault()?.create_snapshot(&id, request) {
            Ok(outcome) => bail!("Snapshot {} unexpectedly succeeded", outcome.version.reference()),
            Err(e) => {
                let message = e.to_string();
                ensure!(
                    message.contains(needle),
                    "Error '{}' does not mention '{}'",
                    message,
                    needle
                );
                Ok(())
            }
        }
    }

    fn handle_link(
        &mut self,
        child: &VersionRef,
        parent: &VersionRef,
        linkage_type: LinkageType,
        expect_created: bool,
    ) -> Result<()> {
        let id = self.codebase_id()?.to_string();
        let created = self
            .vault()?
            .link_versions(&id, child, parent, linkage_type)?;
        ensure!(
            created == expect_created,
            "link_versions returned {}, expected {}",
            created,
            expect_created
        );
        Ok(())
    }

    fn handle_restart(&mut self) -> Result<()> {
        // Drop first so the redb file lock is released before reopening
        self.vault = None;
        self.vault = Some(self.workspace.open_vault()?);
        Ok(())
    }

    // ===== Assertion handlers =====

    fn handle_assertion(&mut self, assertion: &Assertion) -> Result<()> {
        let vault = self.vault()?;
        let metadata = vault.providers().metadata();

        match assertion {
            Assertion::VersionCount(expected) => {
                let count = metadata.graph_nodes(self.codebase_id()?)?.len();
                ensure!(count == *expected, "Expected {} versions, found {}", expected, count);
            }

            Assertion::VersionExists(v) => {
                metadata.find_version(self.codebase_id()?, &v.branch, &v.label)?;
            }

            Assertion::ParentOf {
                child,
                parent,
                linkage_type,
            } => {
                let id = self.codebase_id()?;
                let child_v = metadata.find_version(id, &child.branch, &child.label)?;
                let parent_v = metadata.find_version(id, &parent.branch, &parent.label)?;
                let link = metadata
                    .get_link(&child_v.id)?
                    .ok_or_else(|| anyhow!("{} has no parent", child))?;
                ensure!(
                    link.parent_version_id == parent_v.id,
                    "{} is linked to {}, not {}",
                    child,
                    link.parent_version_id,
                    parent
                );
                ensure!(
                    link.linkage_type == *linkage_type,
                    "Expected {} link, found {}",
                    linkage_type,
                    link.linkage_type
                );
                ensure!(link.branch == child_v.branch, "Link branch differs from child branch");
            }

            Assertion::IsRoot(v) => {
                let version = metadata.find_version(self.codebase_id()?, &v.branch, &v.label)?;
                if let Some(link) = metadata.get_link(&version.id)? {
                    bail!("{} unexpectedly has parent {}", v, link.parent_version_id);
                }
            }

            Assertion::EdgeCount(expected) => {
                let graph = lineage::build_graph(metadata.as_ref(), self.codebase_id()?)?;
                ensure!(
                    graph.edges.len() == *expected,
                    "Expected {} edges, found {}",
                    expected,
                    graph.edges.len()
                );
            }

            Assertion::BranchHead { branch, label } => {
                let id = self.codebase_id()?;
                let graph = lineage::build_graph(metadata.as_ref(), id)?;
                let expected = metadata.find_version(id, branch, label)?;
                let head = graph
                    .refs
                    .get(branch)
                    .ok_or_else(|| anyhow!("No head for branch {}", branch))?;
                ensure!(*head == expected.id, "Head of {} is {}, not {}", branch, head, label);
            }

            Assertion::GraphNodeCount(expected) => {
                let bytes = vault.graph(self.codebase_id()?)?;
                let graph = lineage::decode_graph(&bytes)?;
                ensure!(
                    graph.nodes.len() == *expected,
                    "Expected {} graph nodes, found {}",
                    expected,
                    graph.nodes.len()
                );
            }

            Assertion::ArchiveEntries { version, paths } => {
                let archive = vault.archive(self.codebase_id()?, &version.branch, &version.label)?;
                let zip = zip::ZipArchive::new(Cursor::new(archive.bytes))?;
                let mut names: Vec<String> = zip
                    .file_names()
                    .filter(|n| !n.ends_with('/'))
                    .map(str::to_string)
                    .collect();
                names.sort();
                let mut expected = paths.clone();
                expected.sort();
                ensure!(names == expected, "Archive holds {:?}, expected {:?}", names, expected);
            }

            Assertion::ArchiveFileEquals {
                version,
                path,
                content,
            } => {
                let archive = vault.archive(self.codebase_id()?, &version.branch, &version.label)?;
                let mut zip = zip::ZipArchive::new(Cursor::new(archive.bytes))?;
                let mut entry = zip
                    .by_name(path)
                    .with_context(|| format!("{} missing from archive", path))?;
                let mut actual = Vec::new();
                entry.read_to_end(&mut actual)?;
                ensure!(actual == *content, "Archived {} differs", path);
            }

            Assertion::FileEquals {
                version,
                path,
                content,
            } => {
                let download =
                    vault.get_file(self.codebase_id()?, &version.branch, &version.label, path)?;
                ensure!(download.bytes == *content, "{} content differs", path);
            }

            Assertion::FileMissing { version, path } => {
                match vault.get_file(self.codebase_id()?, &version.branch, &version.label, path) {
                    Ok(_) => bail!("{} unexpectedly present in {}", path, version),
                    Err(e) => ensure!(e.is_not_found(), "Unexpected error: {}", e),
                }
            }

            Assertion::StoredKeyShared {
                version,
                first,
                second,
            } => {
                let v = metadata.find_version(self.codebase_id()?, &version.branch, &version.label)?;
                let tree = metadata.get_file_tree(&v.tree_id)?;
                let key_of = |path: &str| {
                    tree.files
                        .iter()
                        .find(|f| f.path == path)
                        .map(|f| f.storage_key.clone())
                        .ok_or_else(|| anyhow!("{} not in file tree", path))
                };
                ensure!(key_of(first)? == key_of(second)?, "Storage keys differ");
            }

            Assertion::CodebaseCount(expected) => {
                let count = vault.list_codebases()?.len();
                ensure!(count == *expected, "Expected {} codebases, found {}", expected, count);
            }

            Assertion::CodebaseGone => {
                let id = self.codebase_id()?;
                match vault.get_codebase(id) {
                    Ok(_) => bail!("Codebase {} still exists", id),
                    Err(e) => ensure!(e.is_not_found(), "Unexpected error: {}", e),
                }
                let name = self
                    .codebase_name
                    .as_deref()
                    .ok_or_else(|| anyhow!("No codebase name recorded"))?;
                let blob_dir = StorageConfig::blob_root(&vault.storage_root()).join(name);
                ensure!(!blob_dir.exists(), "Blob directory {} remains", blob_dir.display());
            }

            Assertion::Custom(f) => f(vault, self.codebase_id()?)?,
        }

        Ok(())
    }
}
