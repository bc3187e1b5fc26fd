//! Delete a codebase.

use anyhow::{Context, Result};
use console::style;
use std::io::{self, BufRead, Write};
use std::path::Path;

pub fn run(config_path: &Path, codebase_id: &str, yes: bool) -> Result<()> {
    let vault = super::open_vault(config_path)?;
    let codebase = vault.get_codebase(codebase_id)?;

    if !yes {
        print!(
            "Delete codebase {} and all of its versions? [y/N] ",
            style(&codebase.name).bold()
        );
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("{} Aborted", style("→").cyan());
            return Ok(());
        }
    }

    vault
        .delete_codebase(codebase_id)
        .context("Failed to delete codebase")?;

    println!("{} Deleted codebase {}", style("✓").green(), style(&codebase.name).bold());
    Ok(())
}
