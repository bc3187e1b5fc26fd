//! Snapshot a directory as a new version.

use anyhow::{bail, Context, Result};
use console::style;
use std::fs;
use std::path::Path;
use tracing::debug;
use vault_core::{SnapshotRequest, UploadedFile, VersionRef};
use walkdir::{DirEntry, WalkDir};

use super::VersionArgs;

/// Collects every regular file below `dir`, keyed by its slash-separated
/// relative path.
pub fn collect_files(dir: &Path, include_hidden: bool) -> Result<Vec<UploadedFile>> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }

    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| include_hidden || e.depth() == 0 || !is_hidden(e));

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(dir)?;
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let content = fs::read(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        files.push(UploadedFile::new(path, content));
    }

    debug!(dir = %dir.display(), files = files.len(), "Collected files for snapshot");
    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    config_path: &Path,
    codebase_id: &str,
    dir: &Path,
    version: &VersionArgs,
    message: &str,
    branch_from: Option<VersionRef>,
    auto_linkage: bool,
    include_hidden: bool,
) -> Result<()> {
    let vault = super::open_vault(config_path)?;

    let files = collect_files(dir, include_hidden)?;
    if files.is_empty() {
        bail!("No files found in {}", dir.display());
    }

    let mut request = SnapshotRequest::new(&version.branch, &version.label, files)
        .message(message)
        .auto_linkage(auto_linkage);
    if let Some(reference) = branch_from {
        request = request.branch_from(reference);
    }

    let pb = super::spinner(format!("Storing {} files...", request.files.len()))?;
    let result = vault.create_snapshot(codebase_id, request);
    pb.finish_and_clear();
    let outcome = result.context("Failed to create snapshot")?;

    let stats = &outcome.version.stats;
    println!(
        "{} Snapshot {} of {}",
        style("✓").green(),
        style(outcome.version.reference()).bold(),
        style(&outcome.codebase.name).cyan()
    );
    println!();
    println!("  Version:     {}", outcome.version.id);
    println!("  Files:       {}", stats.total_files);
    println!("  Size:        {}", super::human_bytes(stats.total_size));
    println!(
        "  Stored:      {} ({:.1}%)",
        super::human_bytes(stats.compressed_size),
        stats.compression_ratio * 100.0
    );

    match (&outcome.link, &outcome.link_error) {
        (Some(link), _) => {
            println!(
                "  Parent:      {} ({})",
                link.parent_version_id,
                style(link.linkage_type).dim()
            );
        }
        (None, Some(err)) => {
            println!("  {} Linking failed: {}", style("×").red(), err);
        }
        (None, None) if auto_linkage => println!("  Parent:      {}", style("none (root)").dim()),
        (None, None) => {}
    }

    Ok(())
}
