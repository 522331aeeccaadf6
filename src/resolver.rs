//! # Version Resolver
//!
//! Chooses exactly one winning definition per deployment name across all
//! sources. The tie-break order is:
//!
//! 1. Declared source priority: a lower number wins outright, regardless
//!    of declared versions. Priority expresses deliberate operator intent
//!    ("my project overrides always win") and must dominate version
//!    comparison.
//! 2. Among sources of equal priority, the higher semantic version wins.
//!    A missing or malformed version string ranks as the lowest possible
//!    version, never a fatal error.
//! 3. If versions are also equal, the source whose id sorts first wins,
//!    guaranteeing total determinism.
//!
//! Output is sorted by deployment name so downstream processing and
//! diagnostics are reproducible across runs.

use std::collections::BTreeMap;

use semver::Version;

use crate::discovery::CachedDefinition;
use crate::registry::Registry;

/// The single winning definition for one deployment name.
#[derive(Debug, Clone)]
pub struct ResolvedDefinition {
    pub definition: CachedDefinition,
    /// Priority of the winning source, kept for diagnostics.
    pub priority: i64,
    /// Ids of losing candidates for the same name, in the order they were
    /// beaten; lets the CLI show what was shadowed.
    pub shadowed: Vec<String>,
}

/// Parse a declared version, tolerating a leading `v`.
///
/// `None` means "no usable version" and ranks below every parsed version.
fn parse_version(version: Option<&str>) -> Option<Version> {
    let raw = version?;
    let trimmed = raw.strip_prefix('v').unwrap_or(raw);
    Version::parse(trimmed).ok()
}

/// True when `challenger` beats `incumbent` under the resolver ordering.
fn beats(
    challenger: &CachedDefinition,
    challenger_priority: i64,
    incumbent: &CachedDefinition,
    incumbent_priority: i64,
) -> bool {
    if challenger_priority != incumbent_priority {
        return challenger_priority < incumbent_priority;
    }

    let challenger_version = parse_version(challenger.version.as_deref());
    let incumbent_version = parse_version(incumbent.version.as_deref());
    match (challenger_version, incumbent_version) {
        (Some(a), Some(b)) if a != b => a > b,
        (Some(_), None) => true,
        (None, Some(_)) => false,
        // Equal or both unversioned: first source id wins
        _ => challenger.source_id < incumbent.source_id,
    }
}

/// Group candidates by deployment name and pick one winner per name.
///
/// Deterministic given identical registry and cache state: the outcome
/// depends only on candidate contents and declared priorities, not on
/// input order.
pub fn resolve(registry: &Registry, candidates: Vec<CachedDefinition>) -> Vec<ResolvedDefinition> {
    let mut winners: BTreeMap<String, ResolvedDefinition> = BTreeMap::new();

    for candidate in candidates {
        let priority = registry.priority_of(&candidate.source_id);
        match winners.get_mut(&candidate.deployment_name) {
            None => {
                winners.insert(
                    candidate.deployment_name.clone(),
                    ResolvedDefinition {
                        definition: candidate,
                        priority,
                        shadowed: Vec::new(),
                    },
                );
            }
            Some(current) => {
                if beats(&candidate, priority, &current.definition, current.priority) {
                    let beaten = std::mem::replace(
                        &mut current.definition,
                        candidate,
                    );
                    current.shadowed.push(beaten.source_id);
                    current.priority = priority;
                } else {
                    current.shadowed.push(candidate.source_id);
                }
            }
        }
    }

    // BTreeMap iteration gives the stable name ordering deployment relies on
    winners.into_values().collect()
}
