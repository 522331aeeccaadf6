//! Deploy command implementation
//!
//! Runs the full pipeline: sync (unless `--no-sync`), discover definitions
//! in every cached source, resolve one winner per deployment name, and
//! write the winners into the target directory.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;

use skillsync::defaults;
use skillsync::deploy::{deploy, DeployOptions};
use skillsync::git::SystemGit;
use skillsync::manifest::DeploymentManifest;
use skillsync::output::{emoji, OutputConfig};
use skillsync::registry::ConflictPolicy;
use skillsync::sync::sync_all;

/// Arguments for the deploy command
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Target directory to deploy into
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Path to the source registry file
    #[arg(long, value_name = "PATH", env = "SKILLSYNC_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Cache root directory
    #[arg(long, value_name = "PATH", env = "SKILLSYNC_CACHE")]
    pub cache_root: Option<PathBuf>,

    /// Deploy from the existing cache without contacting any source
    #[arg(long)]
    pub no_sync: bool,

    /// Overwrite deployed definitions even when they were hand-edited
    #[arg(short, long)]
    pub force: bool,

    /// Remove deployed definitions no longer provided by any source
    #[arg(long)]
    pub prune: bool,

    /// Number of sources to fetch concurrently
    #[arg(short, long, value_name = "N", default_value_t = defaults::DEFAULT_SYNC_JOBS)]
    pub jobs: usize,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the deploy command
pub fn execute(args: DeployArgs, output: &OutputConfig) -> Result<()> {
    let start_time = Instant::now();
    let ctx = super::load_context(args.registry, args.cache_root)?;

    if !args.no_sync {
        let transport = SystemGit::new(Duration::from_secs(defaults::DEFAULT_GIT_TIMEOUT_SECS));
        let summary = sync_all(&ctx.registry, &ctx.cache, &transport, false, args.jobs)?;
        if !args.quiet {
            for (source_id, warning) in summary.warnings() {
                println!("{} {}: {}", emoji(output, "⚠️", "[WARN]"), source_id, warning);
            }
        }
    }

    let set = super::discover_and_resolve(&ctx)?;
    if !args.quiet {
        for warning in &set.warnings {
            println!("{} {}", emoji(output, "⚠️", "[WARN]"), warning);
        }
        for collision in &set.collisions {
            println!("{} {}", emoji(output, "⚠️", "[WARN]"), collision);
        }
    }

    // --force overrides whatever conflict policy the registry declares.
    let policy = if args.force {
        ConflictPolicy::Overwrite
    } else {
        ctx.registry.on_modified
    };

    let mut manifest = DeploymentManifest::load(&args.target);
    let result = deploy(
        &set.resolved,
        &args.target,
        &mut manifest,
        DeployOptions {
            prune: args.prune,
            policy,
        },
    )?;

    if !args.quiet {
        for name in &result.written {
            println!("{} {}", emoji(output, "📦", "[WRITE]"), name);
        }
        for name in &result.removed {
            println!("{} {} removed", emoji(output, "🗑️", "[PRUNE]"), name);
        }
        for conflict in &result.conflicts {
            println!("{} {}", emoji(output, "⚠️", "[CONFLICT]"), conflict);
        }

        if result.is_noop() {
            println!(
                "{} Everything up to date ({} definitions) in {:.2}s",
                emoji(output, "✅", "[OK]"),
                result.skipped.len(),
                start_time.elapsed().as_secs_f64()
            );
        } else {
            println!(
                "{} {} written, {} skipped, {} removed in {:.2}s",
                emoji(output, "✅", "[OK]"),
                result.written.len(),
                result.skipped.len(),
                result.removed.len(),
                start_time.elapsed().as_secs_f64()
            );
        }
    }

    if !result.conflicts.is_empty() {
        anyhow::bail!(
            "{} definition(s) were modified locally; re-run with --force to overwrite",
            result.conflicts.len()
        );
    }

    Ok(())
}
