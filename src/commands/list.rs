//! List command implementation
//!
//! Shows every deployment name the cached sources provide, which source
//! wins it, and which sources are shadowed.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use skillsync::output::{emoji, OutputConfig};

/// Arguments for the list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Path to the source registry file
    #[arg(long, value_name = "PATH", env = "SKILLSYNC_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Cache root directory
    #[arg(long, value_name = "PATH", env = "SKILLSYNC_CACHE")]
    pub cache_root: Option<PathBuf>,

    /// Only show definitions from this source
    #[arg(long, value_name = "ID")]
    pub source: Option<String>,

    /// Emit machine-readable JSON instead of the table
    #[arg(long)]
    pub json: bool,
}

/// One row of `list` output, shared by the table and JSON renderings.
#[derive(Serialize)]
struct ListEntry {
    deployment_name: String,
    version: Option<String>,
    source_id: String,
    relative_path: PathBuf,
    shadowed: Vec<String>,
}

/// Execute the list command
pub fn execute(args: ListArgs, output: &OutputConfig) -> Result<()> {
    let ctx = super::load_context(args.registry, args.cache_root)?;
    let set = super::discover_and_resolve(&ctx)?;

    let entries: Vec<ListEntry> = set
        .resolved
        .iter()
        .filter(|item| match &args.source {
            Some(filter) => &item.definition.source_id == filter,
            None => true,
        })
        .map(|item| ListEntry {
            deployment_name: item.definition.deployment_name.clone(),
            version: item.definition.version.clone(),
            source_id: item.definition.source_id.clone(),
            relative_path: item.definition.relative_path.clone(),
            shadowed: item.shadowed.clone(),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for warning in &set.warnings {
        println!("{} {}", emoji(output, "⚠️", "[WARN]"), warning);
    }
    for collision in &set.collisions {
        println!("{} {}", emoji(output, "⚠️", "[WARN]"), collision);
    }

    for entry in &entries {
        let version = entry.version.as_deref().unwrap_or("-");
        print!(
            "{:<30} {:<12} {}",
            entry.deployment_name, version, entry.source_id
        );
        if !entry.shadowed.is_empty() {
            print!(" (shadows: {})", entry.shadowed.join(", "));
        }
        println!();
    }

    if entries.is_empty() {
        println!("No definitions found. Run `skillsync sync` first.");
    }

    Ok(())
}
