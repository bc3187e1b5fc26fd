//! Show or change configuration.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use vault_core::StorageConfig;

pub fn show(config_path: &Path) -> Result<()> {
    let vault = super::open_vault(config_path)?;
    let config = vault.config();
    let root = &config.storage.root;

    println!("{}", style("Configuration").bold());
    println!();
    println!(
        "  Config file:       {}{}",
        config_path.display(),
        if config_path.exists() {
            String::new()
        } else {
            style(" (not found, using defaults)").dim().to_string()
        }
    );
    println!("  Storage root:      {}", root.display());
    println!("  Blobs:             {}", StorageConfig::blob_root(root).display());
    println!("  Metadata:          {}", StorageConfig::metadata_root(root).display());
    println!("  Metadata backend:  {}", config.storage.metadata_backend);
    println!("  Compression level: {}", config.storage.compression_level);

    Ok(())
}

pub fn set_root(config_path: &Path, new_root: &Path) -> Result<()> {
    let vault = super::open_vault(config_path)?;
    let old_root = vault.storage_root();

    vault
        .set_storage_root(new_root)
        .with_context(|| format!("Failed to switch storage to {}", new_root.display()))?;

    println!(
        "{} Storage root {} → {}",
        style("✓").green(),
        old_root.display(),
        style(new_root.display()).bold()
    );
    println!("  Saved to {}", config_path.display());
    println!(
        "  {}",
        style("Existing data was not moved; earlier codebases stay under the old root").dim()
    );

    Ok(())
}
