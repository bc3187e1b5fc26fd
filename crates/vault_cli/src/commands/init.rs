//! Create a new codebase.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

/// Create a codebase and print its ID.
pub fn run(config_path: &Path, name: &str, description: &str, branch: &str) -> Result<()> {
    let vault = super::open_vault(config_path)?;
    let codebase = vault
        .init_codebase(name, description, branch)
        .context("Failed to create codebase")?;

    println!("{} Created codebase {}", style("✓").green(), style(&codebase.name).bold());
    println!();
    println!("  ID:             {}", style(&codebase.id).cyan());
    println!("  Default branch: {}", codebase.default_branch);
    if !codebase.description.is_empty() {
        println!("  Description:    {}", codebase.description);
    }
    println!("  Storage root:   {}", vault.storage_root().display());
    println!();
    println!(
        "Snapshot a directory with: {}",
        style(format!("vault snapshot {} <dir>", codebase.id)).cyan()
    );

    Ok(())
}
