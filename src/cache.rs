//! # Cache Store
//!
//! The on-disk mirror of all synced sources, shared by every consumer
//! project on the machine. Layout under the cache root:
//!
//! ```text
//! <root>/sources/<source-id>/   synced repository content, unmodified
//! <root>/.staging/<source-id>/  in-flight clone, promoted atomically
//! <root>/tokens.json            source id -> last conditional-fetch token
//! ```
//!
//! Writers never mutate a populated slot in place. A fresh clone lands in
//! the staging area and is swapped in with directory renames, so a
//! concurrent reader (another project running discovery at the same time)
//! observes either the old snapshot or the new one, never a half-written
//! mix, and an interrupted sync simply leaves the prior state intact. The
//! narrow window between the swap's two renames is covered by
//! [`CacheStore::recover_interrupted`], which puts a stranded prior
//! snapshot back into its slot on the next invocation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::warn;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::registry::Source;

const TOKENS_FILE: &str = "tokens.json";

/// Name prefix for a slot renamed aside during a swap.
const RETIRED_PREFIX: &str = ".retired-";

/// Handle to the shared on-disk cache.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The cache slot holding a source's synced content.
    pub fn source_dir(&self, source_id: &str) -> PathBuf {
        self.root.join("sources").join(source_id)
    }

    /// Whether a source has ever been synced successfully.
    pub fn has_source(&self, source_id: &str) -> bool {
        self.source_dir(source_id).is_dir()
    }

    /// The subtree discovery should scan for a source: its cache slot,
    /// narrowed to the configured subdirectory when one is set.
    pub fn definitions_root(&self, source: &Source) -> PathBuf {
        let slot = self.source_dir(&source.id);
        match &source.subdirectory {
            Some(sub) => slot.join(sub),
            None => slot,
        }
    }

    /// Staging location for an in-flight clone of a source.
    pub fn staging_dir(&self, source_id: &str) -> PathBuf {
        self.root.join(".staging").join(source_id)
    }

    /// Atomically swap a completed staging clone into the source's slot.
    ///
    /// The old slot (if any) is renamed aside before the staging directory
    /// is renamed in, then deleted. Both moves are single directory renames
    /// on the same filesystem, so no reader ever sees a partial slot.
    pub fn promote(&self, source_id: &str) -> Result<()> {
        let staging = self.staging_dir(source_id);
        if !staging.is_dir() {
            return Err(Error::Cache {
                message: format!("no staged content to promote for source {}", source_id),
            });
        }

        let slot = self.source_dir(source_id);
        if let Some(parent) = slot.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut retired = None;
        if slot.exists() {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0);
            let aside = self
                .root
                .join(".staging")
                .join(format!("{}{}-{}", RETIRED_PREFIX, source_id, nanos));
            fs::rename(&slot, &aside)?;
            retired = Some(aside);
        }

        if let Err(e) = fs::rename(&staging, &slot) {
            // Put the prior snapshot back so a failed swap leaves the slot
            // exactly as it was.
            if let Some(aside) = retired {
                if let Err(restore_err) = fs::rename(&aside, &slot) {
                    warn!(
                        "Failed to restore retired cache for {} after aborted swap: {}",
                        source_id, restore_err
                    );
                }
            }
            return Err(e.into());
        }

        if let Some(aside) = retired {
            fs::remove_dir_all(&aside)?;
        }
        Ok(())
    }

    /// Sweep leftovers of swaps interrupted between their two renames.
    ///
    /// A crash after a slot was renamed aside but before the staging
    /// directory took its place leaves the prior snapshot stranded under
    /// `.staging/` with an empty slot. Renaming it back restores the last
    /// good state; a retired directory whose slot exists is garbage from a
    /// swap that completed, and is deleted.
    pub fn recover_interrupted(&self) {
        let staging_root = self.root.join(".staging");
        let entries = match fs::read_dir(&staging_root) {
            Ok(entries) => entries,
            Err(_) => return,
        };

        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name();
            let Some(rest) = name.to_string_lossy().strip_prefix(RETIRED_PREFIX).map(String::from)
            else {
                continue;
            };
            // <id>-<nanos>: the id may itself contain hyphens
            let Some((source_id, _nanos)) = rest.rsplit_once('-') else {
                continue;
            };

            if self.has_source(source_id) {
                if let Err(e) = fs::remove_dir_all(entry.path()) {
                    warn!("Failed to remove stale retired cache for {}: {}", source_id, e);
                }
            } else {
                warn!(
                    "Restoring cache for {} from an interrupted swap",
                    source_id
                );
                if let Err(e) = fs::rename(entry.path(), self.source_dir(source_id)) {
                    warn!("Failed to restore retired cache for {}: {}", source_id, e);
                }
            }
        }
    }

    /// Discard a staging directory after a failed clone.
    pub fn discard_staging(&self, source_id: &str) {
        let staging = self.staging_dir(source_id);
        if staging.exists() {
            if let Err(e) = fs::remove_dir_all(&staging) {
                warn!("Failed to clean staging for {}: {}", source_id, e);
            }
        }
    }

    /// Total byte size of a source's cache slot, excluding git metadata.
    pub fn slot_size(&self, source_id: &str) -> u64 {
        WalkDir::new(self.source_dir(source_id))
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git")
            .filter_map(|e| e.ok())
            .filter_map(|e| e.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum()
    }

    /// Load the fetch-token store. A missing or unreadable store degrades
    /// to empty (every source re-fetches), never to an error.
    pub fn load_tokens(&self) -> BTreeMap<String, String> {
        let path = self.root.join(TOKENS_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(tokens) => tokens,
                Err(e) => {
                    warn!("Fetch-token store unreadable ({}); refetching all", e);
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        }
    }

    /// Persist the fetch-token store.
    pub fn save_tokens(&self, tokens: &BTreeMap<String, String>) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let content = serde_json::to_string_pretty(tokens)?;
        fs::write(self.root.join(TOKENS_FILE), content)?;
        Ok(())
    }
}
