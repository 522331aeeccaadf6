//! # Source Synchronization
//!
//! Brings the local cache up to date with every enabled source, in
//! parallel, without ever leaving a partially fetched source visible.
//!
//! Each source is checked cheaply first: the remote branch head is compared
//! against the token stored after the last successful fetch, and a match
//! means zero content transfer. Only a changed (or missing) source is
//! cloned, into a staging slot that is atomically promoted on success.
//!
//! Failures are per-source. A source that cannot be reached degrades to its
//! cached copy with a warning, and a source with no cached copy at all is
//! skipped with a warning. The run only fails outright when *no* source
//! contributed anything usable, because a stale cache is still a working
//! system while an aborted sync is not.

use std::collections::BTreeMap;
use std::sync::Mutex;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::cache::CacheStore;
use crate::error::{Error, Result};
use crate::git::GitTransport;
use crate::registry::{Registry, Source};

/// What happened to one source during a sync run.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub source_id: String,
    /// True when new content was fetched and promoted into the cache.
    pub updated: bool,
    /// Size of the promoted cache slot, zero when the token matched.
    pub bytes_transferred: u64,
    /// Set when the source degraded to cache or was skipped.
    pub warning: Option<String>,
}

/// Aggregate result of syncing all effective sources.
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub outcomes: Vec<SyncOutcome>,
}

impl SyncSummary {
    pub fn updated_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.updated).count()
    }

    pub fn warnings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.warning.as_deref().map(|w| (o.source_id.as_str(), w)))
    }
}

/// Synchronize every effective source into the cache.
///
/// Sources are fetched concurrently on a bounded pool of `jobs` workers.
/// With `force`, the stored tokens are ignored and every source is
/// re-fetched. The token store is rewritten only when a token actually
/// changed, so an unchanged repeat sync leaves it byte-identical.
pub fn sync_all(
    registry: &Registry,
    cache: &CacheStore,
    transport: &dyn GitTransport,
    force: bool,
    jobs: usize,
) -> Result<SyncSummary> {
    let sources = registry.effective_sources();
    if sources.is_empty() {
        return Err(Error::NoUsableSource {
            message: "no sources are enabled".to_string(),
        });
    }

    // A previous invocation may have died mid-swap; restore before reading
    cache.recover_interrupted();

    let stored_tokens = cache.load_tokens();
    let tokens = Mutex::new(stored_tokens.clone());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| Error::ConfigInvalid {
            message: format!("cannot build sync worker pool: {}", e),
        })?;

    // par_iter + map keeps outcomes in registry order regardless of which
    // worker finishes first.
    let outcomes: Vec<SyncOutcome> = pool.install(|| {
        sources
            .par_iter()
            .map(|source| sync_one(source, cache, transport, force, &tokens))
            .collect()
    });

    let tokens = tokens.into_inner().map_err(|_| Error::Cache {
        message: "sync worker panicked while holding the token store".to_string(),
    })?;
    if tokens != stored_tokens {
        cache.save_tokens(&tokens)?;
    }

    // A degraded run is fine; a run where nothing is usable is not.
    let any_usable = outcomes
        .iter()
        .any(|o| o.updated || cache.has_source(&o.source_id));
    if !any_usable {
        return Err(Error::NoUsableSource {
            message: "every source failed to sync and none has a cached copy".to_string(),
        });
    }

    Ok(SyncSummary { outcomes })
}

/// Sync a single source. Never fails: errors become warnings on the
/// outcome, and the caller decides whether the aggregate is fatal.
fn sync_one(
    source: &Source,
    cache: &CacheStore,
    transport: &dyn GitTransport,
    force: bool,
    tokens: &Mutex<BTreeMap<String, String>>,
) -> SyncOutcome {
    let mut outcome = SyncOutcome {
        source_id: source.id.clone(),
        updated: false,
        bytes_transferred: 0,
        warning: None,
    };

    let head = match transport.remote_head(&source.url, &source.branch) {
        Ok(head) => head,
        Err(e) => {
            degrade(&mut outcome, cache, &e);
            return outcome;
        }
    };

    if !force && cache.has_source(&source.id) {
        let known = tokens
            .lock()
            .map(|t| t.get(&source.id).cloned())
            .unwrap_or_default();
        if known.as_deref() == Some(head.as_str()) {
            debug!("Source {} is up to date at {}", source.id, head);
            return outcome;
        }
    }

    info!("Fetching {} from {}@{}", source.id, source.url, source.branch);
    let staging = cache.staging_dir(&source.id);
    if let Err(e) = transport
        .clone_shallow(&source.url, &source.branch, &staging)
        .and_then(|()| cache.promote(&source.id))
    {
        cache.discard_staging(&source.id);
        degrade(&mut outcome, cache, &e);
        return outcome;
    }

    if let Ok(mut t) = tokens.lock() {
        t.insert(source.id.clone(), head);
    }
    outcome.updated = true;
    outcome.bytes_transferred = cache.slot_size(&source.id);
    outcome
}

/// Turn a per-source failure into a warning, preferring the cached copy
/// when the failure is a network-class one and a cache exists.
fn degrade(outcome: &mut SyncOutcome, cache: &CacheStore, error: &Error) {
    let warning = if error.is_network_degradable() && cache.has_source(&outcome.source_id) {
        warn!(
            "Sync failed for {}, using cached copy: {}",
            outcome.source_id, error
        );
        format!("sync failed, using cached copy: {}", error)
    } else {
        warn!("Sync failed for {}, skipping: {}", outcome.source_id, error);
        format!("sync failed, skipping: {}", error)
    };
    outcome.warning = Some(warning);
}
