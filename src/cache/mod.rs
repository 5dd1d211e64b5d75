//! src/cache/mod.rs
//!
//! Write-through, TTL-bounded caching of variant images and their
//! serialized metadata in a remote object store.
//!
//! Writers never block on the network: both upload pipelines buffer on the
//! caller's side and hand the actual upload to background tasks on close.
//! A writer that is closed without being marked complete never produces an
//! object.

pub mod freshness;
pub mod keys;
mod multipart_upload;
mod single_upload;
mod sweeper;
mod variant_cache;

pub use multipart_upload::MultipartUploader;
pub use single_upload::SingleShotUploader;
pub use sweeper::{EvictionSweeper, SweepStats};
pub use variant_cache::{VariantCache, VariantRead, VariantWriter};

use crate::models::variant::VariantDescriptor;
use tokio::sync::oneshot;

/// Terminal state of a background upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The object was written (or there was nothing to write).
    Completed,

    /// The writer was closed without being marked complete; nothing was
    /// written and any open multipart transaction was aborted.
    Aborted,

    /// A background task failed. The failure was logged; no object is
    /// guaranteed to exist under the key.
    Failed,
}

/// Awaitable signal for a background upload's terminal state. This is the
/// only way to synchronize with an upload; `close()` itself never waits.
pub struct CompletionHandle {
    rx: oneshot::Receiver<UploadOutcome>,
}

impl CompletionHandle {
    pub(crate) fn new(rx: oneshot::Receiver<UploadOutcome>) -> Self {
        Self { rx }
    }

    /// Waits for the upload's terminal state. A worker that died without
    /// reporting counts as failed.
    pub async fn outcome(self) -> UploadOutcome {
        self.rx.await.unwrap_or(UploadOutcome::Failed)
    }
}

/// Observer of successful variant writes, notified from the uploader's
/// background task once the object is fully persisted.
pub trait CacheObserver: Send + Sync {
    fn on_variant_written(&self, descriptor: &VariantDescriptor);
}
