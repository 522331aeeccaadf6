//! # Deployment Engine
//!
//! Materializes a resolved definition set into a target directory, writing
//! only what changed.
//!
//! Idempotency comes from the manifest: before writing a definition, its
//! cache-side content hash is compared against the recorded hash for that
//! deployment name, and an exact match is skipped with no filesystem write
//! at all. A single aggregate-hash comparison can short-circuit the entire
//! deploy when nothing changed anywhere, the path taken on the vast
//! majority of repeat invocations across projects sharing one cache.
//!
//! Every write is staged under the target and renamed into place, so an
//! interrupted deploy leaves previously completed definitions intact and
//! never a half-written one visible. The manifest is persisted after each
//! completed write, so it always reflects exactly what finished.
//!
//! User edits in the target are detected by comparing the on-disk content
//! against the *recorded* hash (never against the cache): a mismatch means
//! the user changed the deployed artifact, and the configured
//! [`ConflictPolicy`] decides whether to block, keep, or overwrite.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::Utc;
use log::debug;

use crate::discovery::DefinitionKind;
use crate::error::{Error, Result};
use crate::hash;
use crate::manifest::{self, DeploymentManifest, DeploymentRecord};
use crate::registry::ConflictPolicy;
use crate::resolver::ResolvedDefinition;

/// Staging directory created under the target during a deploy.
const STAGING_DIR: &str = ".skillsync-staging";

/// Options for one deploy operation.
#[derive(Debug, Clone, Copy)]
pub struct DeployOptions {
    /// Remove previously deployed names absent from the resolved set.
    /// When false, stale deployments are left in place ("accumulate,
    /// never delete").
    pub prune: bool,
    /// What to do when a managed artifact was hand-edited in the target.
    pub policy: ConflictPolicy,
}

/// A definition that was not written because the target's copy was edited
/// by the user and the policy is [`ConflictPolicy::Block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConflict {
    pub deployment_name: String,
    /// Source recorded in the manifest for the existing content.
    pub recorded_source: String,
    /// Source that won resolution this run.
    pub incoming_source: String,
}

impl std::fmt::Display for DeployConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: target content was modified since it was deployed from {}; \
             refusing to overwrite with content from {} (use --force to override)",
            self.deployment_name, self.recorded_source, self.incoming_source
        )
    }
}

/// Outcome of one deploy operation, enumerated by deployment name so the
/// CLI can render a complete summary.
#[derive(Debug, Default)]
pub struct DeployResult {
    pub written: Vec<String>,
    pub skipped: Vec<String>,
    pub removed: Vec<String>,
    pub conflicts: Vec<DeployConflict>,
    /// True when the aggregate-hash comparison skipped the whole run.
    pub short_circuited: bool,
}

impl DeployResult {
    pub fn is_noop(&self) -> bool {
        self.written.is_empty() && self.removed.is_empty() && self.conflicts.is_empty()
    }
}

/// Deploy the resolved set into `target_dir`.
///
/// Definitions are processed in deployment-name order (the resolver's
/// output order), so partial-failure diagnostics are reproducible across
/// runs. The manifest passed in is mutated and persisted incrementally.
pub fn deploy(
    resolved: &[ResolvedDefinition],
    target_dir: &Path,
    manifest: &mut DeploymentManifest,
    options: DeployOptions,
) -> Result<DeployResult> {
    let mut result = DeployResult::default();

    // One cheap comparison covers the whole run when nothing changed: same
    // names, same content hashes, nothing to prune.
    let incoming_aggregate = manifest::aggregate_hash(resolved.iter().map(|r| {
        (
            r.definition.deployment_name.as_str(),
            r.definition.content_hash.as_str(),
        )
    }));
    if !manifest.aggregate_hash.is_empty() && manifest.aggregate_hash == incoming_aggregate {
        debug!("Aggregate hash unchanged; short-circuiting deploy");
        result.short_circuited = true;
        result.skipped = resolved
            .iter()
            .map(|r| r.definition.deployment_name.clone())
            .collect();
        return Ok(result);
    }

    fs::create_dir_all(target_dir)?;

    for item in resolved {
        let def = &item.definition;
        let name = &def.deployment_name;

        if let Some(record) = manifest.record(name) {
            if record.content_hash == def.content_hash && record.source_id == def.source_id {
                // Identical content from the same source: no write, no
                // timestamp change.
                result.skipped.push(name.clone());
                continue;
            }

            // The record says something is deployed here. If the on-disk
            // content no longer matches the record, the user edited it.
            if target_content_hash(target_dir, def)?
                .map(|disk| disk != record.content_hash)
                .unwrap_or(false)
            {
                match options.policy {
                    ConflictPolicy::Block => {
                        result.conflicts.push(DeployConflict {
                            deployment_name: name.clone(),
                            recorded_source: record.source_id.clone(),
                            incoming_source: def.source_id.clone(),
                        });
                        continue;
                    }
                    ConflictPolicy::Keep => {
                        debug!("Keeping user-modified content for {}", name);
                        result.skipped.push(name.clone());
                        continue;
                    }
                    ConflictPolicy::Overwrite => {}
                }
            }
        }

        write_definition(target_dir, item)?;
        manifest.upsert(
            name,
            DeploymentRecord {
                source_id: def.source_id.clone(),
                version: def.version.clone(),
                content_hash: def.content_hash.clone(),
                deployed_at: Utc::now(),
            },
        );
        // Persist after every completed write so an interruption leaves a
        // manifest describing exactly what finished.
        manifest.save(target_dir)?;
        result.written.push(name.clone());
    }

    if options.prune {
        let resolved_names: BTreeSet<&str> = resolved
            .iter()
            .map(|r| r.definition.deployment_name.as_str())
            .collect();
        let stale: Vec<String> = manifest
            .records
            .keys()
            .filter(|name| !resolved_names.contains(name.as_str()))
            .cloned()
            .collect();

        for name in stale {
            let path = target_dir.join(&name);
            if path.exists() {
                fs::remove_dir_all(&path)?;
            }
            manifest.remove(&name);
            manifest.save(target_dir)?;
            result.removed.push(name);
        }
    }

    // Drop the staging area if any write left it behind
    let staging_root = target_dir.join(STAGING_DIR);
    if staging_root.exists() {
        let _ = fs::remove_dir_all(&staging_root);
    }

    Ok(result)
}

/// Hash the target's current content for a deployment name, using the same
/// scheme the definition's cache-side hash used. `None` when the name is
/// not present in the target at all (a deleted artifact is simply
/// rewritten, not treated as a conflict).
fn target_content_hash(
    target_dir: &Path,
    def: &crate::discovery::CachedDefinition,
) -> Result<Option<String>> {
    let deployed = target_dir.join(&def.deployment_name);
    if !deployed.exists() {
        return Ok(None);
    }
    match def.kind {
        DefinitionKind::Directory => Ok(Some(hash::hash_tree(&deployed)?)),
        DefinitionKind::SingleFile => {
            let file_name = def
                .content_root
                .file_name()
                .ok_or_else(|| Error::Deployment {
                    name: def.deployment_name.clone(),
                    message: "single-file definition has no filename".to_string(),
                })?;
            let file = deployed.join(file_name);
            if file.exists() {
                Ok(Some(hash::hash_file(&file)?))
            } else {
                Ok(Some(String::new()))
            }
        }
    }
}

/// Stage a definition's content and rename it into place.
fn write_definition(target_dir: &Path, item: &ResolvedDefinition) -> Result<()> {
    let def = &item.definition;
    let staging = target_dir.join(STAGING_DIR).join(&def.deployment_name);
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    match def.kind {
        DefinitionKind::Directory => copy_tree(&def.content_root, &staging)?,
        DefinitionKind::SingleFile => {
            let file_name = def
                .content_root
                .file_name()
                .ok_or_else(|| Error::Deployment {
                    name: def.deployment_name.clone(),
                    message: "single-file definition has no filename".to_string(),
                })?;
            fs::copy(&def.content_root, staging.join(file_name))?;
        }
    }

    let destination = target_dir.join(&def.deployment_name);
    if destination.exists() {
        fs::remove_dir_all(&destination)?;
    }
    fs::rename(&staging, &destination)?;
    Ok(())
}

/// Recursively copy a directory's contents.
fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let destination = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            fs::create_dir_all(&destination)?;
            copy_tree(&entry.path(), &destination)?;
        } else {
            fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::CachedDefinition;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn options() -> DeployOptions {
        DeployOptions {
            prune: false,
            policy: ConflictPolicy::Block,
        }
    }

    /// Build a real definition directory in a fake cache and return the
    /// resolved item pointing at it.
    fn resolved_dir_definition(
        cache: &Path,
        source_id: &str,
        name: &str,
        version: Option<&str>,
        body: &str,
    ) -> ResolvedDefinition {
        let dir = cache.join(source_id).join(name);
        fs::create_dir_all(&dir).unwrap();
        let front = version
            .map(|v| format!("---\nversion: {}\n---\n", v))
            .unwrap_or_default();
        fs::write(dir.join("DEFINITION.md"), format!("{}{}", front, body)).unwrap();

        ResolvedDefinition {
            definition: CachedDefinition {
                source_id: source_id.to_string(),
                relative_path: PathBuf::from(format!("{}/DEFINITION.md", name)),
                deployment_name: name.to_string(),
                version: version.map(String::from),
                content_hash: hash::hash_tree(&dir).unwrap(),
                kind: DefinitionKind::Directory,
                content_root: dir,
            },
            priority: 1,
            shadowed: Vec::new(),
        }
    }

    #[test]
    fn test_deploy_writes_to_empty_target() {
        let cache = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let item = resolved_dir_definition(cache.path(), "proj", "engineer", Some("1.0.0"), "body");

        let mut manifest = DeploymentManifest::default();
        let result = deploy(&[item], target.path(), &mut manifest, options()).unwrap();

        assert_eq!(result.written, vec!["engineer"]);
        assert!(result.conflicts.is_empty());
        assert!(target.path().join("engineer/DEFINITION.md").exists());

        let record = manifest.record("engineer").unwrap();
        assert_eq!(record.source_id, "proj");
        assert_eq!(record.version.as_deref(), Some("1.0.0"));

        // No staging residue
        assert!(!target.path().join(STAGING_DIR).exists());
    }

    #[test]
    fn test_deploy_is_idempotent() {
        let cache = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let item = resolved_dir_definition(cache.path(), "proj", "engineer", Some("1.0.0"), "body");

        let mut manifest = DeploymentManifest::default();
        deploy(
            std::slice::from_ref(&item),
            target.path(),
            &mut manifest,
            options(),
        )
        .unwrap();

        let deployed_file = target.path().join("engineer/DEFINITION.md");
        let mtime_before = fs::metadata(&deployed_file).unwrap().modified().unwrap();
        let manifest_mtime_before = fs::metadata(target.path().join(manifest::MANIFEST_FILE))
            .unwrap()
            .modified()
            .unwrap();

        let second = deploy(&[item], target.path(), &mut manifest, options()).unwrap();

        assert!(second.written.is_empty());
        assert!(second.short_circuited);
        assert_eq!(second.skipped, vec!["engineer"]);
        // Zero filesystem writes: mtimes untouched, manifest untouched
        assert_eq!(
            fs::metadata(&deployed_file).unwrap().modified().unwrap(),
            mtime_before
        );
        assert_eq!(
            fs::metadata(target.path().join(manifest::MANIFEST_FILE))
                .unwrap()
                .modified()
                .unwrap(),
            manifest_mtime_before
        );
    }

    #[test]
    fn test_deploy_updates_changed_content() {
        let cache = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let v1 = resolved_dir_definition(cache.path(), "proj", "engineer", Some("1.0.0"), "old");

        let mut manifest = DeploymentManifest::default();
        deploy(&[v1], target.path(), &mut manifest, options()).unwrap();
        let h1 = manifest.record("engineer").unwrap().content_hash.clone();

        // Source syncs new content; hash changes, write occurs
        let v2 = resolved_dir_definition(cache.path(), "proj", "engineer", Some("1.1.0"), "new");
        let result = deploy(&[v2], target.path(), &mut manifest, options()).unwrap();

        assert_eq!(result.written, vec!["engineer"]);
        let h2 = manifest.record("engineer").unwrap().content_hash.clone();
        assert_ne!(h1, h2);
        let body = fs::read_to_string(target.path().join("engineer/DEFINITION.md")).unwrap();
        assert!(body.contains("new"));
    }

    #[test]
    fn test_deploy_blocks_on_user_edit_from_other_source() {
        let cache = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let from_sys = resolved_dir_definition(cache.path(), "sys", "engineer", None, "original");

        let mut manifest = DeploymentManifest::default();
        deploy(&[from_sys], target.path(), &mut manifest, options()).unwrap();

        // User hand-edits the deployed artifact
        fs::write(
            target.path().join("engineer/DEFINITION.md"),
            "my customizations",
        )
        .unwrap();

        // A different source now wins the name
        let from_proj = resolved_dir_definition(cache.path(), "proj", "engineer", None, "takeover");
        let result = deploy(
            std::slice::from_ref(&from_proj),
            target.path(),
            &mut manifest,
            options(),
        )
        .unwrap();

        assert!(result.written.is_empty());
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].recorded_source, "sys");
        assert_eq!(result.conflicts[0].incoming_source, "proj");
        // User content untouched
        let body = fs::read_to_string(target.path().join("engineer/DEFINITION.md")).unwrap();
        assert_eq!(body, "my customizations");

        // Overwrite policy (--force) proceeds
        let force = DeployOptions {
            prune: false,
            policy: ConflictPolicy::Overwrite,
        };
        let result = deploy(&[from_proj], target.path(), &mut manifest, force).unwrap();
        assert_eq!(result.written, vec!["engineer"]);
        let body = fs::read_to_string(target.path().join("engineer/DEFINITION.md")).unwrap();
        assert!(body.contains("takeover"));
    }

    #[test]
    fn test_deploy_keep_policy_preserves_user_edit() {
        let cache = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let v1 = resolved_dir_definition(cache.path(), "proj", "engineer", None, "original");

        let mut manifest = DeploymentManifest::default();
        deploy(&[v1], target.path(), &mut manifest, options()).unwrap();
        fs::write(target.path().join("engineer/DEFINITION.md"), "edited").unwrap();

        let v2 = resolved_dir_definition(cache.path(), "proj2", "engineer", None, "update");
        let keep = DeployOptions {
            prune: false,
            policy: ConflictPolicy::Keep,
        };
        let result = deploy(&[v2], target.path(), &mut manifest, keep).unwrap();

        assert!(result.written.is_empty());
        assert!(result.conflicts.is_empty());
        assert_eq!(result.skipped, vec!["engineer"]);
        let body = fs::read_to_string(target.path().join("engineer/DEFINITION.md")).unwrap();
        assert_eq!(body, "edited");
    }

    #[test]
    fn test_deploy_prune_removes_stale_names() {
        let cache = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let keep = resolved_dir_definition(cache.path(), "proj", "keeper", None, "body");
        let stale = resolved_dir_definition(cache.path(), "proj", "stale", None, "body");

        let mut manifest = DeploymentManifest::default();
        deploy(
            &[keep.clone(), stale],
            target.path(),
            &mut manifest,
            options(),
        )
        .unwrap();
        assert!(target.path().join("stale").exists());

        // "stale" drops out of the resolved set; prune=false leaves it
        let result = deploy(
            std::slice::from_ref(&keep),
            target.path(),
            &mut manifest,
            options(),
        )
        .unwrap();
        assert!(result.removed.is_empty());
        assert!(target.path().join("stale").exists());

        // prune=true removes it and its record
        let prune = DeployOptions {
            prune: true,
            policy: ConflictPolicy::Block,
        };
        let result = deploy(&[keep], target.path(), &mut manifest, prune).unwrap();
        assert_eq!(result.removed, vec!["stale"]);
        assert!(!target.path().join("stale").exists());
        assert!(manifest.record("stale").is_none());
        assert!(target.path().join("keeper").exists());
    }

    #[test]
    fn test_deploy_restores_deleted_artifact_without_conflict() {
        let cache = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let item = resolved_dir_definition(cache.path(), "proj", "engineer", None, "body");

        let mut manifest = DeploymentManifest::default();
        deploy(
            std::slice::from_ref(&item),
            target.path(),
            &mut manifest,
            options(),
        )
        .unwrap();

        fs::remove_dir_all(target.path().join("engineer")).unwrap();

        // Force a content change so the aggregate short-circuit does not
        // mask the restore.
        let updated = resolved_dir_definition(cache.path(), "proj", "engineer", None, "body v2");
        let result = deploy(&[updated], target.path(), &mut manifest, options()).unwrap();
        assert_eq!(result.written, vec!["engineer"]);
        assert!(target.path().join("engineer/DEFINITION.md").exists());
    }

    #[test]
    fn test_deploy_single_file_definition() {
        let cache = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();

        let file = cache.path().join("proj").join("engineer.md");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "legacy single file").unwrap();

        let item = ResolvedDefinition {
            definition: CachedDefinition {
                source_id: "proj".to_string(),
                relative_path: PathBuf::from("engineer.md"),
                deployment_name: "engineer".to_string(),
                version: None,
                content_hash: hash::hash_file(&file).unwrap(),
                kind: DefinitionKind::SingleFile,
                content_root: file,
            },
            priority: 1,
            shadowed: Vec::new(),
        };

        let mut manifest = DeploymentManifest::default();
        let result = deploy(&[item], target.path(), &mut manifest, options()).unwrap();

        assert_eq!(result.written, vec!["engineer"]);
        let deployed = target.path().join("engineer").join("engineer.md");
        assert_eq!(fs::read_to_string(deployed).unwrap(), "legacy single file");
    }
}
