//! # State Tracker
//!
//! The deployment manifest is the persisted record of what is currently
//! deployed in a target directory, and the *only* authority for it. The
//! deployment engine never infers state by re-scanning the target tree,
//! because user edits there are intentionally tolerated and must not be
//! misread as drift.
//!
//! Each record carries the winning source, resolved version, content hash,
//! and timestamp. The manifest also stores one aggregate hash over all
//! records, letting a repeat invocation short-circuit an entire deploy
//! with a single comparison when nothing changed anywhere.
//!
//! A missing or corrupt manifest is treated as "nothing deployed yet",
//! never as fatal: the engine degrades to a full deploy rather than
//! refusing to proceed.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Manifest filename within a deployment target directory.
pub const MANIFEST_FILE: &str = ".skillsync-manifest.json";

/// One deployed artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Source that won resolution for this name.
    pub source_id: String,
    /// Declared version of the deployed definition, if any.
    pub version: Option<String>,
    /// Content hash of the deployed bytes at deploy time.
    pub content_hash: String,
    /// When this record was last written.
    pub deployed_at: DateTime<Utc>,
}

/// The per-target manifest: deployment name -> record, plus an aggregate
/// hash for whole-manifest short-circuiting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeploymentManifest {
    pub aggregate_hash: String,
    pub records: BTreeMap<String, DeploymentRecord>,
}

/// Aggregate hash over (name, content hash) pairs in sorted name order.
///
/// Exposed so the deployment engine can compute the would-be aggregate of
/// a resolved set and compare it against a stored manifest without
/// touching the filesystem.
pub fn aggregate_hash<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut hasher = Sha256::new();
    for (name, hash) in pairs {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(hash.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

impl DeploymentManifest {
    /// Load the manifest for a target directory.
    ///
    /// Missing file: empty manifest. Unreadable or unparsable file: logged
    /// warning, empty manifest; the next deploy rewrites everything.
    pub fn load(target_dir: &Path) -> Self {
        let path = target_dir.join(MANIFEST_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(
                    "Deployment manifest {} is unreadable ({}); treating as empty",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Recompute the aggregate hash and persist the manifest.
    pub fn save(&mut self, target_dir: &Path) -> Result<()> {
        self.aggregate_hash = aggregate_hash(
            self.records
                .iter()
                .map(|(name, record)| (name.as_str(), record.content_hash.as_str())),
        );
        fs::create_dir_all(target_dir)?;
        let content = serde_json::to_string_pretty(self)?;
        fs::write(target_dir.join(MANIFEST_FILE), content)?;
        Ok(())
    }

    pub fn record(&self, deployment_name: &str) -> Option<&DeploymentRecord> {
        self.records.get(deployment_name)
    }

    pub fn upsert(&mut self, deployment_name: &str, record: DeploymentRecord) {
        self.records.insert(deployment_name.to_string(), record);
    }

    pub fn remove(&mut self, deployment_name: &str) -> Option<DeploymentRecord> {
        self.records.remove(deployment_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(source_id: &str, hash: &str) -> DeploymentRecord {
        DeploymentRecord {
            source_id: source_id.to_string(),
            version: Some("1.0.0".to_string()),
            content_hash: hash.to_string(),
            deployed_at: Utc::now(),
        }
    }

    #[test]
    fn test_load_missing_manifest_is_empty() {
        let temp = TempDir::new().unwrap();
        let manifest = DeploymentManifest::load(temp.path());
        assert!(manifest.records.is_empty());
        assert!(manifest.aggregate_hash.is_empty());
    }

    #[test]
    fn test_load_corrupt_manifest_is_empty_not_fatal() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(MANIFEST_FILE), "{broken").unwrap();
        let manifest = DeploymentManifest::load(temp.path());
        assert!(manifest.records.is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let mut manifest = DeploymentManifest::default();
        manifest.upsert("engineer", record("proj", "h1"));
        manifest.upsert("reviewer", record("sys", "h2"));
        manifest.save(temp.path()).unwrap();

        let loaded = DeploymentManifest::load(temp.path());
        assert_eq!(loaded, manifest);
        assert!(!loaded.aggregate_hash.is_empty());
    }

    #[test]
    fn test_aggregate_changes_with_content() {
        let temp = TempDir::new().unwrap();
        let mut manifest = DeploymentManifest::default();
        manifest.upsert("engineer", record("proj", "h1"));
        manifest.save(temp.path()).unwrap();
        let first = manifest.aggregate_hash.clone();

        manifest.upsert("engineer", record("proj", "h2"));
        manifest.save(temp.path()).unwrap();
        assert_ne!(first, manifest.aggregate_hash);
    }

    #[test]
    fn test_aggregate_matches_standalone_helper() {
        let temp = TempDir::new().unwrap();
        let mut manifest = DeploymentManifest::default();
        manifest.upsert("b-name", record("proj", "hb"));
        manifest.upsert("a-name", record("proj", "ha"));
        manifest.save(temp.path()).unwrap();

        // Helper over sorted pairs must agree with the saved aggregate, so
        // the deploy short-circuit comparison is sound.
        let expected = aggregate_hash([("a-name", "ha"), ("b-name", "hb")]);
        assert_eq!(manifest.aggregate_hash, expected);
    }

    #[test]
    fn test_remove_record() {
        let mut manifest = DeploymentManifest::default();
        manifest.upsert("engineer", record("proj", "h1"));
        assert!(manifest.remove("engineer").is_some());
        assert!(manifest.record("engineer").is_none());
        assert!(manifest.remove("engineer").is_none());
    }
}
