//! Vault CLI - Command-line interface for the snapshot archive.

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use vault_core::VaultError;

mod commands;

use commands::{LinkKind, VersionArgs};

#[derive(Parser)]
#[command(name = "vault")]
#[command(about = "Local-first snapshot archive with automatic version lineage", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to $VAULT_CONFIG or ./vault.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new codebase
    Init {
        /// Codebase name (also the storage prefix of its content)
        name: String,
        /// Free-form description
        #[arg(short, long, default_value = "")]
        description: String,
        /// Default branch
        #[arg(short, long, default_value = "main")]
        branch: String,
    },
    /// Snapshot a directory as a new version
    Snapshot {
        /// Codebase ID
        codebase: String,
        /// Directory to capture
        dir: PathBuf,
        #[command(flatten)]
        version: VersionArgs,
        /// Snapshot message
        #[arg(short, long, default_value = "")]
        message: String,
        /// Fork from an explicit version, as BRANCH/LABEL
        #[arg(long, value_parser = commands::parse_version_ref)]
        branch_from: Option<vault_core::VersionRef>,
        /// Don't link the version into the lineage graph
        #[arg(long)]
        no_link: bool,
        /// Include dot-files and dot-directories
        #[arg(long)]
        all: bool,
    },
    /// Write a version as a zip archive
    Archive {
        /// Codebase ID
        codebase: String,
        #[command(flatten)]
        version: VersionArgs,
        /// Output file (defaults to <name>-<branch>-<label>.zip)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print or save a single file of a version
    Cat {
        /// Codebase ID
        codebase: String,
        /// Path of the file inside the version
        path: String,
        #[command(flatten)]
        version: VersionArgs,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete a codebase with all of its versions and content
    Delete {
        /// Codebase ID
        codebase: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show the version graph
    Graph {
        /// Codebase ID
        codebase: String,
        /// Rebuild the cached graph first
        #[arg(long)]
        rebuild: bool,
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Link two versions by hand
    Link {
        /// Codebase ID
        codebase: String,
        /// Child version, as BRANCH/LABEL
        #[arg(value_parser = commands::parse_version_ref)]
        child: vault_core::VersionRef,
        /// Parent version, as BRANCH/LABEL
        #[arg(value_parser = commands::parse_version_ref)]
        parent: vault_core::VersionRef,
        /// Link type
        #[arg(long = "type", value_enum, default_value = "branch-from")]
        kind: LinkKind,
    },
    /// List codebases
    List,
    /// Show or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Point storage at a new root (existing data is not moved)
    SetRoot {
        /// New storage root
        path: PathBuf,
    },
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(vault_core::Config::default_path);

    match cli.command {
        Commands::Init {
            name,
            description,
            branch,
        } => commands::init::run(&config_path, &name, &description, &branch),
        Commands::Snapshot {
            codebase,
            dir,
            version,
            message,
            branch_from,
            no_link,
            all,
        } => commands::snapshot::run(
            &config_path,
            &codebase,
            &dir,
            &version,
            &message,
            branch_from,
            !no_link,
            all,
        ),
        Commands::Archive {
            codebase,
            version,
            output,
        } => commands::archive::run(&config_path, &codebase, &version, output.as_deref()),
        Commands::Cat {
            codebase,
            path,
            version,
            output,
        } => commands::cat::run(&config_path, &codebase, &path, &version, output.as_deref()),
        Commands::Delete { codebase, yes } => commands::delete::run(&config_path, &codebase, yes),
        Commands::Graph {
            codebase,
            rebuild,
            format,
        } => commands::graph::run(&config_path, &codebase, rebuild, &format),
        Commands::Link {
            codebase,
            child,
            parent,
            kind,
        } => commands::link::run(&config_path, &codebase, &child, &parent, kind),
        Commands::List => commands::list::run(&config_path),
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::config::show(&config_path),
            ConfigCommands::SetRoot { path } => commands::config::set_root(&config_path, &path),
        },
    }
}

fn main() {
    // Initialize tracing subscriber
    // Respects RUST_LOG environment variable (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("{} {:#}", style("error:").red().bold(), err);
        if let Some(hint) = err
            .downcast_ref::<VaultError>()
            .and_then(VaultError::recovery_suggestion)
        {
            eprintln!("  {} {}", style("hint:").cyan(), hint);
        }
        std::process::exit(1);
    }
}
