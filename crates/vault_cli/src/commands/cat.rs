//! Print or save a single file of a version.

use anyhow::{Context, Result};
use console::style;
use std::fs;
use std::io::Write;
use std::path::Path;

use super::VersionArgs;

pub fn run(
    config_path: &Path,
    codebase_id: &str,
    path: &str,
    version: &VersionArgs,
    output: Option<&Path>,
) -> Result<()> {
    let vault = super::open_vault(config_path)?;
    let download = vault
        .get_file(codebase_id, &version.branch, &version.label, path)
        .with_context(|| format!("Failed to fetch {}", path))?;

    match output {
        Some(out) => {
            fs::write(out, &download.bytes)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            eprintln!(
                "{} Saved {} to {}",
                style("✓").green(),
                download.file_name,
                style(out.display()).bold()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&download.bytes)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
