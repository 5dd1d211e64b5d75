//! src/source/mod.rs
//!
//! Read side for original objects: resolves a logical identifier to a
//! remote object via a lookup strategy, answers existence/size checks, and
//! opens random-access streams over the object for downstream decoders.
//!
//! Fulfilling one read issues a HEAD, then either a series of ranged GETs
//! (chunking enabled, the default) or a single full-body GET spooled to a
//! local file (chunking disabled). Format sniffing may add one more small
//! ranged GET when neither key nor identifier reveals the format.

pub mod lookup;
pub mod range_reader;
pub mod seekable;

mod format_iter;

pub use format_iter::FormatIterator;
pub use lookup::{LookupStrategy, ObjectLookup};
pub use range_reader::RangeReader;
pub use seekable::{SeekableStream, SpooledStream, WindowedSeekableStream};

use crate::config::SourceConfig;
use crate::errors::{Error, Result};
use crate::models::object::ObjectAttributes;
use crate::models::reference::{Credentials, ObjectReference};
use crate::models::variant::Identifier;
use crate::store::ObjectStore;
use crate::store::registry::{ClientSpec, StoreRegistry};
use std::sync::Arc;
use tracing::debug;

/// Maps one identifier at a time to a remote object and opens streams
/// over it. The resolved reference and HEAD attributes are cached until
/// the identifier changes.
pub struct Source {
    registry: Arc<StoreRegistry>,
    config: SourceConfig,
    strategy: LookupStrategy,
    identifier: Option<Identifier>,
    reference: Option<ObjectReference>,
    attributes: Option<ObjectAttributes>,
}

impl Source {
    pub fn new(registry: Arc<StoreRegistry>, config: SourceConfig, strategy: LookupStrategy) -> Self {
        Self {
            registry,
            config,
            strategy,
            identifier: None,
            reference: None,
            attributes: None,
        }
    }

    /// Points the source at a new identifier, dropping any cached
    /// resolution state.
    pub fn set_identifier(&mut self, identifier: impl Into<Identifier>) {
        self.identifier = Some(identifier.into());
        self.reference = None;
        self.attributes = None;
    }

    /// Resolves (and caches) the reference for the current identifier.
    /// A lookup that reports "no such object" surfaces as `NotFound`.
    pub fn object_reference(&mut self) -> Result<ObjectReference> {
        if let Some(reference) = &self.reference {
            return Ok(reference.clone());
        }
        let identifier = self.current_identifier()?.clone();
        let reference = self
            .strategy
            .resolve(&self.config, &identifier)?
            .ok_or_else(|| Error::not_found(&self.config.bucket, identifier.as_str()))?;
        self.reference = Some(reference.clone());
        Ok(reference)
    }

    /// Existence/size check for the current object. Results are cached
    /// until the identifier changes.
    pub async fn stat(&mut self) -> Result<ObjectAttributes> {
        if let Some(attributes) = &self.attributes {
            return Ok(attributes.clone());
        }
        let reference = self.object_reference()?;
        let store = self.client_for(&reference)?;
        let attributes = store.head(reference.bucket(), reference.key()).await?;
        self.attributes = Some(attributes.clone());
        Ok(attributes)
    }

    /// Iterator over the format-inference tactics for the current object.
    pub fn format_iterator(&mut self) -> Result<FormatIterator> {
        let reference = self.object_reference()?;
        let store = self.client_for(&reference)?;
        let identifier = self.current_identifier()?.clone();
        Ok(FormatIterator::new(
            RangeReader::new(store, reference),
            identifier,
        ))
    }

    /// Opens a random-access stream over the current object: windowed
    /// ranged fetches when chunking is enabled, a spooled full download
    /// otherwise.
    pub async fn new_seekable_stream(&mut self) -> Result<SeekableStream> {
        let attributes = self.stat().await?;
        let mut reference = self.object_reference()?;
        reference.set_length(attributes.length);
        self.reference = Some(reference.clone());
        let store = self.client_for(&reference)?;

        if self.config.chunking_enabled {
            debug!(
                "new_seekable_stream(): using {}-byte windows",
                self.config.chunk_size
            );
            Ok(SeekableStream::Windowed(WindowedSeekableStream::new(
                RangeReader::new(store, reference),
                attributes.length,
                self.config.chunk_size,
            )))
        } else {
            debug!("new_seekable_stream(): chunking is disabled; spooling");
            Ok(SeekableStream::Spooled(
                SpooledStream::create(store, &reference).await?,
            ))
        }
    }

    fn current_identifier(&self) -> Result<&Identifier> {
        self.identifier
            .as_ref()
            .ok_or_else(|| Error::Configuration("no identifier has been set".into()))
    }

    /// Resolves the client for a reference, preferring the reference's own
    /// endpoint/region/credentials over the configured ones.
    fn client_for(&self, reference: &ObjectReference) -> Result<Arc<dyn ObjectStore>> {
        let credentials = reference.credentials().cloned().or_else(|| {
            match (&self.config.access_key_id, &self.config.secret_access_key) {
                (Some(id), Some(secret)) => Some(Credentials {
                    access_key_id: id.clone(),
                    secret_access_key: secret.clone(),
                }),
                _ => None,
            }
        });
        let spec = ClientSpec {
            endpoint: reference
                .endpoint()
                .map(str::to_string)
                .or_else(|| self.config.endpoint.clone()),
            region: reference
                .region()
                .map(str::to_string)
                .or_else(|| self.config.region.clone()),
            credentials,
            async_credential_update: self.config.async_credential_update,
        };
        self.registry.get_or_create(&spec)
    }
}
