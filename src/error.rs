//! # Error Handling
//!
//! Centralized error handling for skillsync, built on `thiserror`.
//!
//! Only genuinely fatal conditions live in the [`Error`] enum: registry
//! corruption, git subprocess failures, and the serde/io error families
//! wrapped via `#[from]`. Degradable conditions (an unreachable source with
//! a usable cache, a deployment-name collision, a hand-edited target, a
//! corrupt manifest) are *not* errors here. They are carried as data inside
//! the structured result types (`SyncSummary`, `DiscoveryReport`,
//! `DeployResult`) and reported in aggregate at the end of an operation, so
//! that one failing source or definition never aborts the rest of the batch.
//!
//! The CLI layer converts these into `anyhow` errors at the boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for skillsync operations
#[derive(Error, Debug)]
pub enum Error {
    /// The registry file exists but cannot be parsed.
    ///
    /// This is fatal and requires the user to fix the file by hand; the
    /// registry loader never resets user configuration on parse failure.
    #[error("Registry file is corrupt: {path}: {message}")]
    ConfigCorrupt { path: PathBuf, message: String },

    /// Registry validation failed (duplicate source id, negative priority).
    #[error("Invalid registry: {message}")]
    ConfigInvalid { message: String },

    /// An error occurred while cloning a source repository.
    #[error("Git clone error for {url}@{branch}: {message}")]
    GitClone {
        url: String,
        branch: String,
        message: String,
    },

    /// A git subprocess failed with a non-zero status.
    #[error("Git command failed for {url}: {command} - {stderr}")]
    GitCommand {
        command: String,
        url: String,
        stderr: String,
    },

    /// A git subprocess exceeded its timeout.
    ///
    /// Treated identically to a network failure by the sync engine: the
    /// source degrades to its existing cache, or contributes nothing if it
    /// has never been synced.
    #[error("Git command timed out after {seconds}s for {url}")]
    GitTimeout { url: String, seconds: u64 },

    /// The configured branch does not exist on the remote.
    #[error("Branch {branch} not found on remote {url}")]
    BranchNotFound { url: String, branch: String },

    /// An error occurred with a cache operation.
    #[error("Cache operation error: {message}")]
    Cache { message: String },

    /// An error occurred while writing to the deployment target.
    #[error("Deployment error for {name}: {message}")]
    Deployment { name: String, message: String },

    /// No source produced any definitions: every source is disabled,
    /// unsynced and unreachable, or empty.
    #[error("No usable source: {message}")]
    NoUsableSource { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON serialization error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A semantic versioning parsing error, wrapped from `semver::Error`.
    #[error("Semver parsing error: {0}")]
    Semver(#[from] semver::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the sync engine may degrade to an existing cache when this
    /// error comes out of a transport call.
    pub fn is_network_degradable(&self) -> bool {
        matches!(
            self,
            Error::GitClone { .. } | Error::GitCommand { .. } | Error::GitTimeout { .. }
        )
    }
}
