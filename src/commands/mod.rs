//! # CLI Command Implementations
//!
//! Each subcommand of the `skillsync` tool lives in its own file, following
//! a shared shape:
//! - An `Args` struct defining the command-specific flags, derived with
//!   `clap`.
//! - An `execute` function that takes the parsed `Args`, calls into the
//!   `skillsync` library for the actual work, and renders the result.
//!
//! Common plumbing shared by the commands (resolving the registry and cache
//! locations, running the discovery/resolution pipeline) lives in this
//! module so the commands stay declarative.

pub mod deploy;
pub mod list;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};

use skillsync::cache::CacheStore;
use skillsync::defaults;
use skillsync::discovery::{self, CachedDefinition, CollisionWarning};
use skillsync::registry::{self, Registry};
use skillsync::resolver::{self, ResolvedDefinition};

/// Registry and cache handles shared by every command.
pub struct AppContext {
    pub registry: Registry,
    pub cache: CacheStore,
}

/// Load the registry and open the cache, honoring the per-command overrides
/// and their environment variables.
pub fn load_context(registry_path: Option<PathBuf>, cache_root: Option<PathBuf>) -> Result<AppContext> {
    let registry_path = registry_path.unwrap_or_else(defaults::default_registry_path);
    let registry = registry::load(&registry_path)
        .with_context(|| format!("failed to load source registry {}", registry_path.display()))?;
    let cache = CacheStore::new(cache_root.unwrap_or_else(defaults::default_cache_root));
    cache.recover_interrupted();
    Ok(AppContext { registry, cache })
}

/// Everything discovery and resolution produce across all sources.
pub struct ResolvedSet {
    pub resolved: Vec<ResolvedDefinition>,
    pub collisions: Vec<CollisionWarning>,
    pub warnings: Vec<String>,
}

/// Scan every effective source's cache slot and resolve winners per name.
pub fn discover_and_resolve(ctx: &AppContext) -> Result<ResolvedSet> {
    let mut candidates: Vec<CachedDefinition> = Vec::new();
    let mut collisions = Vec::new();
    let mut warnings = Vec::new();

    for source in ctx.registry.effective_sources() {
        let root = ctx.cache.definitions_root(&source);
        let report = discovery::discover(&source.id, &root)?;
        candidates.extend(report.definitions);
        collisions.extend(report.collisions);
        warnings.extend(report.warnings);
    }

    let resolved = resolver::resolve(&ctx.registry, candidates);
    Ok(ResolvedSet {
        resolved,
        collisions,
        warnings,
    })
}
