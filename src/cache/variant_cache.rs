//! src/cache/variant_cache.rs
//!
//! The cache facade. Object keys are derived by [`Keyspace`]; validity is
//! decided by [`FreshnessPolicy`] over a `LastAccessTime` tag, since the
//! backing store has no native last-accessed time and object bodies are
//! immutable. Variant bodies go through the async upload pipelines; info
//! records are small enough to write synchronously.

use crate::cache::freshness::{FreshnessPolicy, new_last_access_tag};
use crate::cache::keys::Keyspace;
use crate::cache::{
    CacheObserver, EvictionSweeper, MultipartUploader, SingleShotUploader, SweepStats,
    CompletionHandle,
};
use crate::config::CacheConfig;
use crate::errors::{Error, Result};
use crate::models::info::ImageInfo;
use crate::models::reference::Credentials;
use crate::models::variant::{Identifier, VariantDescriptor};
use crate::store::registry::{ClientSpec, StoreRegistry};
use crate::store::{GetOptions, ObjectStore, list_all_objects};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A cached variant body plus the instant it was last written.
#[derive(Debug)]
pub struct VariantRead {
    pub body: Bytes,
    pub last_modified: DateTime<Utc>,
}

/// Write sink for one variant, single-shot or multipart per configuration.
pub enum VariantWriter {
    Single(SingleShotUploader),
    Multipart(MultipartUploader),
}

impl VariantWriter {
    pub fn write(&mut self, data: &[u8]) {
        match self {
            VariantWriter::Single(writer) => writer.write(data),
            VariantWriter::Multipart(writer) => writer.write(data),
        }
    }

    /// Marks the written data as complete. A writer closed without this
    /// call never produces an object.
    pub fn complete(&mut self) {
        match self {
            VariantWriter::Single(writer) => writer.complete(),
            VariantWriter::Multipart(writer) => writer.complete(),
        }
    }

    pub fn is_complete(&self) -> bool {
        match self {
            VariantWriter::Single(writer) => writer.is_complete(),
            VariantWriter::Multipart(writer) => writer.is_complete(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            VariantWriter::Single(writer) => writer.key(),
            VariantWriter::Multipart(writer) => writer.key(),
        }
    }

    /// Hands off to the background upload and returns immediately.
    pub fn close(self) -> CompletionHandle {
        match self {
            VariantWriter::Single(writer) => writer.close(),
            VariantWriter::Multipart(writer) => writer.close(),
        }
    }
}

/// Write-through cache of variant images and info records with
/// least-recently-used style retention driven by the freshness tag.
pub struct VariantCache {
    store: Arc<dyn ObjectStore>,
    config: CacheConfig,
    keyspace: Keyspace,
    policy: FreshnessPolicy,
    observers: Vec<Arc<dyn CacheObserver>>,
}

impl VariantCache {
    pub fn new(store: Arc<dyn ObjectStore>, config: CacheConfig) -> Self {
        let keyspace = Keyspace::new(&config.object_key_prefix);
        let policy = FreshnessPolicy::new(config.ttl_seconds);
        Self {
            store,
            config,
            keyspace,
            policy,
            observers: Vec::new(),
        }
    }

    /// Builds the cache with a client resolved through the registry from
    /// the config's endpoint, region, and credentials.
    pub fn from_registry(registry: &StoreRegistry, config: CacheConfig) -> Result<Self> {
        let credentials = match (&config.access_key_id, &config.secret_access_key) {
            (Some(id), Some(secret)) => Some(Credentials {
                access_key_id: id.clone(),
                secret_access_key: secret.clone(),
            }),
            _ => None,
        };
        let spec = ClientSpec {
            endpoint: config.endpoint.clone(),
            region: config.region.clone(),
            credentials,
            async_credential_update: config.async_credential_update,
        };
        let store = registry.get_or_create(&spec)?;
        Ok(Self::new(store, config))
    }

    pub fn add_observer(&mut self, observer: Arc<dyn CacheObserver>) {
        self.observers.push(observer);
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    pub fn policy(&self) -> FreshnessPolicy {
        self.policy
    }

    // --- info records (synchronous metadata path) -----------------------

    /// Writes the serialized info record for an identifier. Rate-limited
    /// responses are retried immediately up to the configured budget;
    /// small, frequent metadata writes are disproportionately likely to
    /// trip burst throttling.
    pub async fn put_info(&self, identifier: &Identifier, info: &ImageInfo) -> Result<()> {
        debug!("put_info(): caching info for {}", identifier);
        let body = Bytes::from(info.to_json()?);
        let key = self.keyspace.info_key(identifier);
        let mut attempt = 0u32;
        loop {
            match self
                .store
                .put(
                    &self.config.bucket,
                    &key,
                    body.clone(),
                    Some("application/json"),
                    Some("UTF-8"),
                )
                .await
            {
                Ok(()) => {
                    trace!(
                        "put_info(): wrote {} bytes to {} in bucket {}",
                        body.len(),
                        key,
                        self.config.bucket
                    );
                    self.touch_async(key);
                    return Ok(());
                }
                Err(Error::RateLimited(message)) => {
                    if attempt >= self.config.max_retries {
                        return Err(Error::io_other(format!(
                            "rate limited writing `{}` after {} retries: {}",
                            key, attempt, message
                        )));
                    }
                    attempt += 1;
                    debug!(
                        "put_info(): rate limited; retry {} of {}",
                        attempt, self.config.max_retries
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Fetches the info record for an identifier, or `None` when there is
    /// no valid entry. Expiry is enforced by a conditional fetch; a
    /// condition miss is a cache miss, not an error.
    pub async fn fetch_info(&self, identifier: &Identifier) -> Result<Option<ImageInfo>> {
        let key = self.keyspace.info_key(identifier);
        let options = GetOptions {
            if_modified_since: Some(self.policy.earliest_valid_instant()),
            ..Default::default()
        };
        match self.store.get(&self.config.bucket, &key, options).await {
            Ok(result) => {
                let mut info = ImageInfo::from_json(&result.body)?;
                if info.serialization_timestamp.is_none() {
                    info.serialization_timestamp = Some(result.attributes.last_modified);
                }
                debug!(
                    "fetch_info(): read {} from bucket {}",
                    key, self.config.bucket
                );
                self.touch_async(key);
                Ok(Some(info))
            }
            Err(err) if err.is_absent() => Ok(None),
            Err(err) => Err(err),
        }
    }

    // --- variant bodies -------------------------------------------------

    /// Opens a write sink for a variant body. The choice between one
    /// buffered PUT and a multipart transaction is configuration-driven.
    pub fn variant_writer(&self, descriptor: &VariantDescriptor) -> VariantWriter {
        let key = self.keyspace.image_key(descriptor);
        if self.config.multipart_uploads {
            VariantWriter::Multipart(MultipartUploader::new(
                Arc::clone(&self.store),
                descriptor.clone(),
                self.config.bucket.clone(),
                key,
                self.observers.clone(),
            ))
        } else {
            VariantWriter::Single(SingleShotUploader::new(
                Arc::clone(&self.store),
                descriptor.clone(),
                self.config.bucket.clone(),
                key,
                self.observers.clone(),
            ))
        }
    }

    /// Fetches a variant body, or `None` when there is no valid entry. A
    /// stale object returned by a store that ignores the modified-since
    /// condition is evicted asynchronously rather than served.
    pub async fn variant_reader(&self, descriptor: &VariantDescriptor) -> Result<Option<VariantRead>> {
        let key = self.keyspace.image_key(descriptor);
        debug!(
            "variant_reader(): bucket: {}; key: {}",
            self.config.bucket, key
        );
        let earliest = self.policy.earliest_valid_instant();
        let options = GetOptions {
            if_modified_since: Some(earliest),
            ..Default::default()
        };
        match self.store.get(&self.config.bucket, &key, options).await {
            Ok(result) => {
                if result.attributes.last_modified > earliest {
                    self.touch_async(key);
                    Ok(Some(VariantRead {
                        body: result.body,
                        last_modified: result.attributes.last_modified,
                    }))
                } else {
                    debug!(
                        "{} in bucket {} is invalid; evicting asynchronously",
                        key, self.config.bucket
                    );
                    self.evict_async(key);
                    Ok(None)
                }
            }
            Err(err) if err.is_absent() => Ok(None),
            Err(err) => Err(err),
        }
    }

    // --- eviction -------------------------------------------------------

    /// Deletes one variant.
    pub async fn evict_variant(&self, descriptor: &VariantDescriptor) -> Result<()> {
        self.store
            .delete(&self.config.bucket, &self.keyspace.image_key(descriptor))
            .await
    }

    /// Deletes the info record and every variant of one identifier.
    pub async fn evict_identifier(&self, identifier: &Identifier) -> Result<()> {
        self.store
            .delete(&self.config.bucket, &self.keyspace.info_key(identifier))
            .await?;

        let prefix = self.keyspace.image_prefix(identifier);
        let objects = list_all_objects(&*self.store, &self.config.bucket, &prefix).await?;
        let mut deleted = 0usize;
        for object in &objects {
            trace!("evict_identifier(): deleting {}", object.key);
            match self.store.delete(&self.config.bucket, &object.key).await {
                Ok(()) => deleted += 1,
                Err(err) => warn!("evict_identifier(): deleting {}: {}", object.key, err),
            }
        }
        debug!("evict_identifier(): deleted {} items", deleted);
        Ok(())
    }

    /// Deletes every info record.
    pub async fn evict_infos(&self) -> Result<SweepStats> {
        self.sweeper().purge(&self.keyspace.info_prefix()).await
    }

    /// Deletes every cache object that fails the freshness policy.
    pub async fn evict_invalid(&self) -> Result<SweepStats> {
        self.sweeper().sweep_invalid(self.keyspace.prefix()).await
    }

    /// Deletes every cache object.
    pub async fn purge(&self) -> Result<SweepStats> {
        self.sweeper().purge(self.keyspace.prefix()).await
    }

    fn sweeper(&self) -> EvictionSweeper {
        EvictionSweeper::new(
            Arc::clone(&self.store),
            self.config.bucket.clone(),
            self.policy,
        )
    }

    // --- background helpers ---------------------------------------------

    /// Re-stamps an object's last-access tag on a background task.
    fn touch_async(&self, key: String) {
        let store = Arc::clone(&self.store);
        let bucket = self.config.bucket.clone();
        tokio::spawn(async move {
            trace!("touch_async(): {}", key);
            let (tag, value) = new_last_access_tag();
            if let Err(err) = store
                .put_tags(&bucket, &key, HashMap::from([(tag, value)]))
                .await
            {
                warn!("touch_async(): tagging {}: {}", key, err);
            }
        });
    }

    /// Deletes an object on a background task.
    fn evict_async(&self, key: String) {
        let store = Arc::clone(&self.store);
        let bucket = self.config.bucket.clone();
        tokio::spawn(async move {
            debug!("evict_async(): deleting {} from bucket {}", key, bucket);
            if let Err(err) = store.delete(&bucket, &key).await {
                warn!("evict_async(): deleting {}: {}", key, err);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    fn cache(multipart: bool) -> VariantCache {
        let store = Arc::new(InMemoryStore::with_bucket("cache-bucket"));
        let config = CacheConfig {
            bucket: "cache-bucket".into(),
            multipart_uploads: multipart,
            ..Default::default()
        };
        VariantCache::new(store, config)
    }

    #[tokio::test]
    async fn writer_selection_follows_configuration() {
        let descriptor = VariantDescriptor::new("cats");
        assert!(matches!(
            cache(false).variant_writer(&descriptor),
            VariantWriter::Single(_)
        ));
        assert!(matches!(
            cache(true).variant_writer(&descriptor),
            VariantWriter::Multipart(_)
        ));
    }
}
