//! CLI commands.

pub mod archive;
pub mod cat;
pub mod config;
pub mod delete;
pub mod graph;
pub mod init;
pub mod link;
pub mod list;
pub mod snapshot;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use vault_core::{LinkageType, Vault, VersionRef, DEFAULT_BRANCH};

/// Selects a version by branch and label.
#[derive(Args, Debug, Clone)]
pub struct VersionArgs {
    /// Branch name
    #[arg(short, long, default_value = DEFAULT_BRANCH)]
    pub branch: String,
    /// Version label
    #[arg(short, long, default_value = "v1")]
    pub label: String,
}

/// Link type accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum LinkKind {
    /// Same-branch succession
    Sequential,
    /// Branch fork point
    BranchFrom,
}

impl From<LinkKind> for LinkageType {
    fn from(kind: LinkKind) -> Self {
        match kind {
            LinkKind::Sequential => LinkageType::Sequential,
            LinkKind::BranchFrom => LinkageType::BranchFrom,
        }
    }
}

/// Parses `BRANCH/LABEL`. The label is everything after the last slash, so
/// branch names may contain slashes.
pub fn parse_version_ref(s: &str) -> std::result::Result<VersionRef, String> {
    match s.rsplit_once('/') {
        Some((branch, label)) if !branch.is_empty() && !label.is_empty() => {
            Ok(VersionRef::new(branch, label))
        }
        _ => Err(format!("expected BRANCH/LABEL, got '{}'", s)),
    }
}

/// Opens the vault described by the config file at `config_path`.
pub fn open_vault(config_path: &Path) -> Result<Vault> {
    Vault::open_with_config_file(config_path)
        .with_context(|| format!("Failed to open vault using {}", config_path.display()))
}

/// A steadily ticking spinner with a message.
pub fn spinner(message: impl Into<String>) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// Formats a byte count for humans.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
