//! # Source Registry
//!
//! This module defines the schema for the `sources.yaml` registry file and
//! the logic for loading, validating, bootstrapping, and saving it.
//!
//! The registry is the ordered list of configured sources, each a git
//! repository (plus branch and optional subdirectory) ranked by a numeric
//! priority, where a *lower* number means higher precedence. Priority is a
//! total order over sources, not a tie-breaker: the resolver lets it
//! dominate version comparison outright.
//!
//! ## First-run bootstrap
//!
//! When the registry file is absent, [`load`] invokes the explicit
//! [`bootstrap`] step, which synthesizes a single default source pointing at
//! the public community repository and persists it, so first-run behavior
//! requires no user action. The bootstrap is logged; it only ever fires on a
//! *missing* file. A file that exists but cannot be parsed is
//! [`Error::ConfigCorrupt`]: fatal, requiring a user fix, and never
//! auto-reset.
//!
//! ## Hand-editing
//!
//! [`save`] writes a commented header documenting every field, so the file
//! round-trips through `serde_yaml` and stays safe to edit by hand.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::defaults;
use crate::error::{Error, Result};

/// Policy applied when a deployment target holds a managed name whose
/// on-disk content no longer matches what was last deployed (a user edit)
/// and the incoming winner comes from a different source.
///
/// This is a deliberate configuration knob rather than hard-coded behavior;
/// the CLI `--force` flag maps to [`ConflictPolicy::Overwrite`] for a
/// single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Report a conflict and leave the target untouched (default).
    #[default]
    Block,
    /// Silently keep the user's edited content.
    Keep,
    /// Overwrite the target with the resolved content.
    Overwrite,
}

/// One configured origin of capability definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Unique identifier, also the cache slot name for this source.
    pub id: String,
    /// Git URL of the repository.
    pub url: String,
    /// Branch to sync.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Optional subdirectory within the repository that holds definitions.
    /// When set, discovery roots at this path instead of the repo root.
    #[serde(default)]
    pub subdirectory: Option<String>,
    /// Precedence; lower number wins during resolution.
    pub priority: i64,
    /// Disabled sources are skipped by sync and resolution, but their cache
    /// is not purged.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_enabled() -> bool {
    true
}

impl Source {
    /// The bundled fallback source synthesized on first run and, unless
    /// `disable_defaults` is set, appended to resolution when no configured
    /// source claims its id.
    pub fn bundled_default() -> Self {
        Self {
            id: defaults::DEFAULT_SOURCE_ID.to_string(),
            url: defaults::DEFAULT_SOURCE_URL.to_string(),
            branch: default_branch(),
            subdirectory: None,
            priority: defaults::DEFAULT_SOURCE_PRIORITY,
            enabled: true,
        }
    }
}

/// The parsed registry: top-level settings plus the source list.
///
/// Constructed once at operation start and passed by reference into every
/// component call; no component reads ambient global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Registry {
    /// When true, the bundled fallback source does not participate in
    /// resolution even if no configured source shadows it.
    #[serde(default)]
    pub disable_defaults: bool,
    /// Policy for targets whose managed content was edited by the user.
    #[serde(default)]
    pub on_modified: ConflictPolicy,
    /// Configured sources, in file order. Resolution order is governed by
    /// `priority`, not file position.
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl Registry {
    /// The sources that participate in sync and resolution: every enabled
    /// configured source, plus the bundled default when it is neither
    /// disabled via `disable_defaults` nor shadowed by a configured source
    /// with the same id.
    pub fn effective_sources(&self) -> Vec<Source> {
        let mut sources: Vec<Source> = self.sources.iter().filter(|s| s.enabled).cloned().collect();

        if !self.disable_defaults
            && !self
                .sources
                .iter()
                .any(|s| s.id == defaults::DEFAULT_SOURCE_ID)
        {
            sources.push(Source::bundled_default());
        }

        sources
    }

    /// Look up the declared priority for a source id. Unknown ids (stale
    /// cache slots, for example) rank after everything configured.
    pub fn priority_of(&self, source_id: &str) -> i64 {
        self.effective_sources()
            .iter()
            .find(|s| s.id == source_id)
            .map(|s| s.priority)
            .unwrap_or(i64::MAX)
    }

    /// Validate registry invariants.
    ///
    /// Duplicate ids and negative priorities are hard errors. A URL that
    /// does not parse is only a warning; reachability is not verified
    /// until sync, and a temporarily wrong entry must not block the rest of
    /// the registry.
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();

        for source in &self.sources {
            if !seen.insert(source.id.as_str()) {
                return Err(Error::ConfigInvalid {
                    message: format!("duplicate source id: {}", source.id),
                });
            }
            if source.priority < 0 {
                return Err(Error::ConfigInvalid {
                    message: format!(
                        "source {} has negative priority {}",
                        source.id, source.priority
                    ),
                });
            }
            if Url::parse(&source.url).is_err() {
                warnings.push(format!(
                    "source {} has an unparsable url: {}",
                    source.id, source.url
                ));
            }
        }

        Ok(warnings)
    }
}

/// Load the registry from `path`, bootstrapping a default registry if the
/// file does not exist.
///
/// Validation warnings are logged via `warn!`; validation errors and parse
/// failures are fatal.
pub fn load(path: &Path) -> Result<Registry> {
    if !path.exists() {
        return bootstrap(path);
    }

    let content = fs::read_to_string(path)?;
    let registry: Registry =
        serde_yaml::from_str(&content).map_err(|e| Error::ConfigCorrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    for warning in registry.validate()? {
        warn!("{}", warning);
    }

    Ok(registry)
}

/// Synthesize and persist the first-run registry with the single bundled
/// default source.
///
/// Explicit and logged so callers (and tests) can observe exactly when and
/// why it fires; it is only ever invoked by [`load`] on a missing file.
pub fn bootstrap(path: &Path) -> Result<Registry> {
    info!(
        "No registry found at {}; bootstrapping default registry",
        path.display()
    );

    let registry = Registry {
        disable_defaults: false,
        on_modified: ConflictPolicy::default(),
        sources: vec![Source::bundled_default()],
    };
    save(path, &registry)?;
    Ok(registry)
}

/// Header written before the YAML body so the file documents itself.
const FILE_HEADER: &str = "\
# skillsync source registry
#
# Fields per source:
#   id:           unique name; also the cache slot for this source
#   url:          git URL of the repository
#   branch:       branch to sync (default: main)
#   subdirectory: optional path within the repo holding definitions
#   priority:     integer precedence; LOWER number wins on name conflicts
#   enabled:      disabled sources are skipped but their cache is kept
#
# Top-level settings:
#   disable_defaults: when true, the bundled community source is ignored
#   on_modified:      block | keep | overwrite - what to do when a deployed
#                     definition was hand-edited and a different source now
#                     provides it (default: block)
";

/// Persist the registry to `path`, creating parent directories as needed.
pub fn save(path: &Path, registry: &Registry) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let body = serde_yaml::to_string(registry)?;
    fs::write(path, format!("{}\n{}", FILE_HEADER, body))?;
    Ok(())
}
