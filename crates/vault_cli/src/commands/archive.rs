//! Write a version as a zip archive.

use anyhow::{Context, Result};
use console::style;
use std::fs;
use std::path::{Path, PathBuf};

use super::VersionArgs;

pub fn run(
    config_path: &Path,
    codebase_id: &str,
    version: &VersionArgs,
    output: Option<&Path>,
) -> Result<()> {
    let vault = super::open_vault(config_path)?;

    let pb = super::spinner(format!(
        "Reconstructing {}/{}...",
        version.branch, version.label
    ))?;
    let result = vault.archive(codebase_id, &version.branch, &version.label);
    pb.finish_and_clear();
    let archive = result.context("Failed to build archive")?;

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&archive.file_name));
    fs::write(&path, &archive.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "{} Wrote {} ({})",
        style("✓").green(),
        style(path.display()).bold(),
        super::human_bytes(archive.bytes.len() as u64)
    );

    Ok(())
}
