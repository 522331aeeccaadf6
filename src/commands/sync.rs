//! Sync command implementation
//!
//! Fetches every enabled source into the local cache, skipping sources
//! whose remote head matches the token stored after the last fetch.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;

use skillsync::defaults;
use skillsync::git::SystemGit;
use skillsync::output::{emoji, OutputConfig};
use skillsync::sync::sync_all;

/// Arguments for the sync command
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Path to the source registry file
    #[arg(long, value_name = "PATH", env = "SKILLSYNC_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Cache root directory
    #[arg(long, value_name = "PATH", env = "SKILLSYNC_CACHE")]
    pub cache_root: Option<PathBuf>,

    /// Re-fetch every source even when its remote head is unchanged
    #[arg(short, long)]
    pub force: bool,

    /// Number of sources to fetch concurrently
    #[arg(short, long, value_name = "N", default_value_t = defaults::DEFAULT_SYNC_JOBS)]
    pub jobs: usize,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the sync command
pub fn execute(args: SyncArgs, output: &OutputConfig) -> Result<()> {
    let start_time = Instant::now();
    let ctx = super::load_context(args.registry, args.cache_root)?;
    let transport = SystemGit::new(Duration::from_secs(defaults::DEFAULT_GIT_TIMEOUT_SECS));

    let summary = sync_all(&ctx.registry, &ctx.cache, &transport, args.force, args.jobs)?;

    if !args.quiet {
        for outcome in &summary.outcomes {
            if outcome.updated {
                println!(
                    "{} {} updated ({} bytes)",
                    emoji(output, "⬇️", "[FETCH]"),
                    outcome.source_id,
                    outcome.bytes_transferred
                );
            } else if outcome.warning.is_none() {
                println!(
                    "{} {} up to date",
                    emoji(output, "✅", "[OK]"),
                    outcome.source_id
                );
            }
        }
        for (source_id, warning) in summary.warnings() {
            println!("{} {}: {}", emoji(output, "⚠️", "[WARN]"), source_id, warning);
        }
        println!(
            "Synced {} of {} sources in {:.2}s",
            summary.updated_count(),
            summary.outcomes.len(),
            start_time.elapsed().as_secs_f64()
        );
    }

    Ok(())
}
