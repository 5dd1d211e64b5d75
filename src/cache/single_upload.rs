//! src/cache/single_upload.rs
//!
//! Buffers an entire written object in memory and uploads it in one
//! request on a background task once the writer is closed. The store
//! requires a known content length up front, so there is no way to stream
//! an unknown amount of data; everything is buffered first.

use crate::cache::freshness::new_last_access_tag;
use crate::cache::{CacheObserver, CompletionHandle, UploadOutcome};
use crate::models::variant::VariantDescriptor;
use crate::store::ObjectStore;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

/// Write sink that uploads its buffered bytes in a single PUT.
///
/// Closing without first calling [`complete`](Self::complete) discards the
/// buffer; a partial write never produces an object. `close()` returns
/// promptly regardless of upload duration; callers synchronize only
/// through the returned [`CompletionHandle`].
pub struct SingleShotUploader {
    store: Arc<dyn ObjectStore>,
    descriptor: VariantDescriptor,
    bucket: String,
    key: String,
    buffer: Vec<u8>,
    completed: bool,
    observers: Vec<Arc<dyn CacheObserver>>,
}

impl SingleShotUploader {
    pub(crate) fn new(
        store: Arc<dyn ObjectStore>,
        descriptor: VariantDescriptor,
        bucket: impl Into<String>,
        key: impl Into<String>,
        observers: Vec<Arc<dyn CacheObserver>>,
    ) -> Self {
        Self {
            store,
            descriptor,
            bucket: bucket.into(),
            key: key.into(),
            buffer: Vec::new(),
            completed: false,
            observers,
        }
    }

    pub fn write(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Marks the written data as complete and eligible for upload.
    pub fn complete(&mut self) {
        self.completed = true;
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Hands the buffer to a background upload task (if complete) and
    /// returns immediately.
    pub fn close(self) -> CompletionHandle {
        let (tx, rx) = oneshot::channel();
        if self.completed {
            let content_type = self
                .descriptor
                .output_format()
                .map(|format| format.media_type().to_string());
            tokio::spawn(upload(
                self.store,
                self.descriptor,
                self.bucket,
                self.key,
                content_type,
                Bytes::from(self.buffer),
                self.observers,
                tx,
            ));
        } else {
            trace!("discarding incomplete write for {}", self.key);
            let _ = tx.send(UploadOutcome::Aborted);
        }
        CompletionHandle::new(rx)
    }
}

#[allow(clippy::too_many_arguments)]
async fn upload(
    store: Arc<dyn ObjectStore>,
    descriptor: VariantDescriptor,
    bucket: String,
    key: String,
    content_type: Option<String>,
    data: Bytes,
    observers: Vec<Arc<dyn CacheObserver>>,
    tx: oneshot::Sender<UploadOutcome>,
) {
    if data.is_empty() {
        trace!("no data to upload; returning");
        let _ = tx.send(UploadOutcome::Completed);
        return;
    }

    debug!(
        "uploading {} bytes to {} in bucket {}",
        data.len(),
        key,
        bucket
    );
    let length = data.len();
    match store
        .put(&bucket, &key, data, content_type.as_deref(), None)
        .await
    {
        Ok(()) => {
            let (tag, value) = new_last_access_tag();
            if let Err(err) = store
                .put_tags(&bucket, &key, HashMap::from([(tag, value)]))
                .await
            {
                warn!("tagging {} in bucket {}: {}", key, bucket, err);
            }
            for observer in &observers {
                observer.on_variant_written(&descriptor);
            }
            trace!("wrote {} bytes to {} in bucket {}", length, key, bucket);
            let _ = tx.send(UploadOutcome::Completed);
        }
        Err(err) => {
            warn!("uploading {} to bucket {}: {}", key, bucket, err);
            let _ = tx.send(UploadOutcome::Failed);
        }
    }
}
