//! Link two versions by hand.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use vault_core::VersionRef;

use super::LinkKind;

pub fn run(
    config_path: &Path,
    codebase_id: &str,
    child: &VersionRef,
    parent: &VersionRef,
    kind: LinkKind,
) -> Result<()> {
    let vault = super::open_vault(config_path)?;
    let created = vault
        .link_versions(codebase_id, child, parent, kind.into())
        .context("Failed to link versions")?;

    if created {
        println!(
            "{} Linked {} → {}",
            style("✓").green(),
            style(child).bold(),
            style(parent).bold()
        );
        println!("  {}", style("Graph rebuild scheduled").dim());
    } else {
        println!(
            "{} {} already has a parent, nothing changed",
            style("→").cyan(),
            style(child).bold()
        );
    }

    Ok(())
}
