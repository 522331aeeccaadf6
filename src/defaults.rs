//! Default values for skillsync configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// Default git subprocess timeout, in seconds.
///
/// Applies independently to each remote operation (ls-remote, clone); a
/// timed-out source degrades to its cached content.
pub const DEFAULT_GIT_TIMEOUT_SECS: u64 = 60;

/// Default number of sources synced concurrently.
pub const DEFAULT_SYNC_JOBS: usize = 4;

/// Id of the bundled default source synthesized on first run.
pub const DEFAULT_SOURCE_ID: &str = "community";

/// URL of the bundled default source.
pub const DEFAULT_SOURCE_URL: &str = "https://github.com/skillsync/community-skills.git";

/// Priority of the bundled default source. High number = low precedence, so
/// any user-configured source at standard priorities overrides it.
pub const DEFAULT_SOURCE_PRIORITY: i64 = 100;

/// Returns the default cache root directory.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/skillsync` (XDG Base Directory)
/// - macOS: `~/Library/Caches/skillsync`
/// - Windows: `{FOLDERID_LocalAppData}\skillsync`
///
/// Falls back to `.skillsync-cache` in the current directory if the
/// platform cache directory cannot be determined.
///
/// This can be overridden by the `--cache-root` CLI flag or the
/// `SKILLSYNC_CACHE` environment variable.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".skillsync-cache"))
        .join("skillsync")
}

/// Returns the default registry file path.
///
/// Uses the platform config directory (e.g. `~/.config/skillsync/sources.yaml`
/// on Linux), falling back to `./sources.yaml` if it cannot be determined.
///
/// This can be overridden by the `--registry` CLI flag or the
/// `SKILLSYNC_REGISTRY` environment variable.
pub fn default_registry_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skillsync")
        .join("sources.yaml")
}
