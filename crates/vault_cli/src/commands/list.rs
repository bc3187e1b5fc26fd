//! List codebases.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

pub fn run(config_path: &Path) -> Result<()> {
    let vault = super::open_vault(config_path)?;
    let codebases = vault.list_codebases().context("Failed to list codebases")?;

    if codebases.is_empty() {
        println!("{}", style("No codebases. Create one with 'vault init <name>'").dim());
        return Ok(());
    }

    println!("{}", style(format!("Codebases ({})", codebases.len())).bold());
    println!();
    for cb in &codebases {
        let updated = cb.updated_at.with_timezone(&chrono::Local);
        println!(
            "  {}  {:<20} {:<10} {}",
            style(&cb.id).cyan(),
            cb.name,
            cb.default_branch,
            style(updated.format("%Y-%m-%d %H:%M")).dim()
        );
        if !cb.description.is_empty() {
            println!("      {}", cb.description);
        }
    }

    Ok(())
}
