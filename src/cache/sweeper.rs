//! src/cache/sweeper.rs
//!
//! Prefix-scoped walks that delete expired or unwanted cache objects.

use crate::cache::freshness::{FreshnessPolicy, parse_last_access};
use crate::errors::Result;
use crate::store::{ObjectStore, list_all_objects};
use std::sync::Arc;
use tracing::{debug, warn};

/// Counters reported by a sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Objects examined under the prefix.
    pub examined: usize,

    /// Objects actually deleted.
    pub deleted: usize,
}

/// Walks every object under a prefix and deletes the ones that fail the
/// freshness policy, or all of them.
///
/// Deletions are fire-and-forget per object: a failed delete is logged and
/// the sweep moves on. Objects carrying no last-access tag are treated as
/// invalid and deleted; anything under the cache prefix is assumed to be
/// cache-owned, so a misconfigured prefix shared with non-cache objects
/// will lose them.
pub struct EvictionSweeper {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    policy: FreshnessPolicy,
}

impl EvictionSweeper {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, policy: FreshnessPolicy) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            policy,
        }
    }

    /// Deletes every object under `prefix` whose last-access tag fails the
    /// policy or is missing.
    pub async fn sweep_invalid(&self, prefix: &str) -> Result<SweepStats> {
        let objects = list_all_objects(&*self.store, &self.bucket, prefix).await?;
        let mut stats = SweepStats::default();
        for object in &objects {
            stats.examined += 1;
            if self.is_valid(&object.key).await {
                continue;
            }
            match self.store.delete(&self.bucket, &object.key).await {
                Ok(()) => stats.deleted += 1,
                Err(err) => warn!("sweep_invalid(): deleting {}: {}", object.key, err),
            }
        }
        debug!(
            "sweep_invalid(): deleted {} of {} items",
            stats.deleted, stats.examined
        );
        Ok(stats)
    }

    /// Unconditionally deletes every object under `prefix`.
    pub async fn purge(&self, prefix: &str) -> Result<SweepStats> {
        let objects = list_all_objects(&*self.store, &self.bucket, prefix).await?;
        let mut stats = SweepStats {
            examined: objects.len(),
            deleted: 0,
        };
        for object in &objects {
            match self.store.delete(&self.bucket, &object.key).await {
                Ok(()) => stats.deleted += 1,
                Err(err) => warn!("purge(): deleting {}: {}", object.key, err),
            }
        }
        debug!("purge(): deleted {} items", stats.deleted);
        Ok(stats)
    }

    /// Deletes one object.
    pub async fn evict(&self, key: &str) -> Result<()> {
        self.store.delete(&self.bucket, key).await
    }

    /// A tag that is missing or unparseable means invalid. A tag *fetch*
    /// that fails outright leaves the object in place: deleting on a
    /// transient read error would turn an availability blip into data
    /// loss.
    async fn is_valid(&self, key: &str) -> bool {
        match self.store.get_tags(&self.bucket, key).await {
            Ok(tags) => parse_last_access(&tags)
                .map(|last| self.policy.is_valid(last))
                .unwrap_or(false),
            Err(err) => {
                warn!("sweep_invalid(): reading tags of {}: {}", key, err);
                true
            }
        }
    }
}
