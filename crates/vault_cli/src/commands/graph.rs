//! Show the version graph of a codebase.

use anyhow::{bail, Context, Result};
use console::style;
use std::collections::HashMap;
use std::path::Path;
use vault_core::lineage;
use vault_core::VersionGraph;

pub fn run(config_path: &Path, codebase_id: &str, rebuild: bool, format: &str) -> Result<()> {
    if !matches!(format, "text" | "json") {
        bail!("Unknown format '{}'. Use 'text' or 'json'", format);
    }

    let vault = super::open_vault(config_path)?;

    let bytes = if rebuild {
        let graph = vault
            .rebuild_graph(codebase_id)
            .context("Failed to rebuild graph")?;
        lineage::encode_graph(&graph)?
    } else {
        vault.graph(codebase_id).context("Failed to load graph")?
    };

    if format == "json" {
        println!("{}", String::from_utf8_lossy(&bytes));
        return Ok(());
    }

    let graph = lineage::decode_graph(&bytes)?;
    print_text(&graph);
    Ok(())
}

fn print_text(graph: &VersionGraph) {
    println!("{}", style("Version Graph").bold());
    println!();

    if graph.nodes.is_empty() {
        println!("  {}", style("No versions yet").dim());
        return;
    }

    let parents: HashMap<&str, (&str, String)> = graph
        .edges
        .iter()
        .map(|e| (e.to.as_str(), (e.from.as_str(), e.linkage_type.to_string())))
        .collect();
    let names: HashMap<&str, String> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), format!("{}/{}", n.branch, n.label)))
        .collect();

    for node in &graph.nodes {
        let is_head = graph.refs.get(&node.branch) == Some(&node.id);
        let marker = if is_head {
            style("*").green().to_string()
        } else {
            " ".to_string()
        };

        let parent = match parents.get(node.id.as_str()) {
            Some((from, kind)) => format!(
                "← {} ({})",
                names.get(from).map(String::as_str).unwrap_or(*from),
                kind
            ),
            None => "root".to_string(),
        };

        println!(
            "{} {:<24} {}  {}",
            marker,
            style(format!("{}/{}", node.branch, node.label)).cyan(),
            node.created_at.format("%Y-%m-%d %H:%M:%S"),
            style(parent).dim()
        );
    }

    println!();
    println!("{}", style("Branch heads").bold());
    for (branch, id) in &graph.refs {
        let name = names.get(id.as_str()).map(String::as_str).unwrap_or(id.as_str());
        println!("  {} → {}", branch, name);
    }
}
