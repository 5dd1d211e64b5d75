//! src/source/range_reader.rs
//!
//! The unit primitive under the windowed stream and format sniffing: one
//! GET per fetch, no retry, no caching. Error mapping to the crate
//! taxonomy is the store implementation's job.

use crate::errors::Result;
use crate::models::object::{ByteRange, ObjectAttributes};
use crate::models::reference::ObjectReference;
use crate::store::{GetOptions, ObjectStore};
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

/// Fetches arbitrary byte ranges of one remote object.
pub struct RangeReader {
    store: Arc<dyn ObjectStore>,
    reference: ObjectReference,
}

impl RangeReader {
    pub fn new(store: Arc<dyn ObjectStore>, reference: ObjectReference) -> Self {
        Self { store, reference }
    }

    pub fn reference(&self) -> &ObjectReference {
        &self.reference
    }

    /// Fetches one byte range with a single GET.
    pub async fn fetch(&self, range: ByteRange) -> Result<Bytes> {
        debug!(
            "requesting bytes {}-{} from {}",
            range.start, range.end, self.reference
        );
        let options = GetOptions {
            range: Some(range),
            ..Default::default()
        };
        let result = self
            .store
            .get(self.reference.bucket(), self.reference.key(), options)
            .await?;
        Ok(result.body)
    }

    /// Existence and size check.
    pub async fn head(&self) -> Result<ObjectAttributes> {
        self.store
            .head(self.reference.bucket(), self.reference.key())
            .await
    }
}
