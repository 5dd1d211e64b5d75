//! src/cache/multipart_upload.rs
//!
//! Uploads written data in parts, concurrently with writing, without ever
//! blocking the writer on the network.
//!
//! The multipart protocol involves three operations: creating the
//! transaction, uploading parts, and completing (or aborting) it. Each is
//! a variant of [`UploadTask`]; write and close enqueue tasks onto a
//! single-consumer channel drained by one background worker per session.
//! FIFO consumption by that one worker is what guarantees parts are
//! created, uploaded, and finalized in write order.
//!
//! Multipart uploads bound peak memory to roughly one part length instead
//! of the whole object, at the cost of more requests. Incomplete
//! transactions are aborted on close; a store-side expiration rule for
//! abandoned transactions is the usual backstop for aborts lost to a
//! crash.

use crate::cache::freshness::new_last_access_tag;
use crate::cache::{CacheObserver, CompletionHandle, UploadOutcome};
use crate::models::object::CompletedPart;
use crate::models::variant::VariantDescriptor;
use crate::store::{MIN_PART_LENGTH, ObjectStore};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{trace, warn};

/// One unit of background work for an upload session. `Complete` and
/// `Abort` are terminal: the worker exits after running one of them.
enum UploadTask {
    Create,
    UploadPart { body: Bytes, part_number: i32 },
    Complete,
    Abort,
}

/// Write sink that uploads in parts of at least [`MIN_PART_LENGTH`] bytes.
///
/// Closing without first calling [`complete`](Self::complete) aborts the
/// remote transaction; no object appears under the key. `close()` returns
/// promptly; callers synchronize only through the returned
/// [`CompletionHandle`].
pub struct MultipartUploader {
    queue: mpsc::UnboundedSender<UploadTask>,
    outcome_rx: oneshot::Receiver<UploadOutcome>,
    key: String,
    current_part: Vec<u8>,
    part_number: i32,
    request_created: bool,
    completed: bool,
}

impl MultipartUploader {
    pub(crate) fn new(
        store: Arc<dyn ObjectStore>,
        descriptor: VariantDescriptor,
        bucket: impl Into<String>,
        key: impl Into<String>,
        observers: Vec<Arc<dyn CacheObserver>>,
    ) -> Self {
        let bucket = bucket.into();
        let key = key.into();
        let content_type = descriptor
            .output_format()
            .map(|format| format.media_type().to_string());
        let (queue, task_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        tokio::spawn(run_worker(Session {
            store,
            descriptor,
            bucket,
            key: key.clone(),
            content_type,
            observers,
            task_rx,
            outcome_tx,
        }));
        Self {
            queue,
            outcome_rx,
            key,
            current_part: Vec::new(),
            part_number: 1,
            request_created: false,
            completed: false,
        }
    }

    pub fn write(&mut self, data: &[u8]) {
        self.current_part.extend_from_slice(data);
        self.create_request_if_necessary();
        self.upload_part_if_necessary();
    }

    /// Marks the written data as complete and eligible for finalization.
    pub fn complete(&mut self) {
        self.completed = true;
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Enqueues the final part and the terminal task, then returns
    /// immediately. The worker finalizes or aborts in the background.
    pub fn close(mut self) -> CompletionHandle {
        if self.completed {
            // The final part may be undersized or even empty; the worker
            // skips empty parts since the store rejects zero-length ones.
            self.flush_current_part();
            self.enqueue(UploadTask::Complete);
        } else {
            self.enqueue(UploadTask::Abort);
        }
        CompletionHandle::new(self.outcome_rx)
    }

    fn create_request_if_necessary(&mut self) {
        if !self.request_created {
            self.enqueue(UploadTask::Create);
            self.request_created = true;
        }
    }

    fn upload_part_if_necessary(&mut self) {
        if self.current_part.len() >= MIN_PART_LENGTH {
            self.flush_current_part();
        }
    }

    fn flush_current_part(&mut self) {
        let body = Bytes::from(std::mem::take(&mut self.current_part));
        let part_number = self.part_number;
        self.part_number += 1;
        self.enqueue(UploadTask::UploadPart { body, part_number });
    }

    fn enqueue(&self, task: UploadTask) {
        if self.queue.send(task).is_err() {
            warn!("upload worker for {} is gone; dropping task", self.key);
        }
    }
}

struct Session {
    store: Arc<dyn ObjectStore>,
    descriptor: VariantDescriptor,
    bucket: String,
    key: String,
    content_type: Option<String>,
    observers: Vec<Arc<dyn CacheObserver>>,
    task_rx: mpsc::UnboundedReceiver<UploadTask>,
    outcome_tx: oneshot::Sender<UploadOutcome>,
}

/// Drains the session's task queue in order. Any task failure is logged
/// and terminates the worker; failures never reach the writer.
async fn run_worker(mut session: Session) {
    let mut upload_id: Option<String> = None;
    let mut completed_parts: Vec<CompletedPart> = Vec::new();

    let outcome = loop {
        let next = session.task_rx.recv().await;
        let Some(task) = next else {
            // The writer was dropped without closing. Tidy up the remote
            // transaction as if it had been closed incomplete.
            if let Some(id) = &upload_id {
                if let Err(err) = session
                    .store
                    .abort_multipart(&session.bucket, &session.key, id)
                    .await
                {
                    warn!("aborting dropped upload {}: {}", id, err);
                }
            }
            break UploadOutcome::Aborted;
        };

        match task {
            UploadTask::Create => {
                trace!(
                    "creating request [bucket: {}] [key: {}]",
                    session.bucket, session.key
                );
                match session
                    .store
                    .create_multipart(
                        &session.bucket,
                        &session.key,
                        session.content_type.as_deref(),
                    )
                    .await
                {
                    Ok(id) => upload_id = Some(id),
                    Err(err) => {
                        warn!("creating upload for {}: {}", session.key, err);
                        break UploadOutcome::Failed;
                    }
                }
            }
            UploadTask::UploadPart { body, part_number } => {
                // There is a small chance the last part is empty.
                if body.is_empty() {
                    trace!("skipping empty part {}", part_number);
                    continue;
                }
                let Some(id) = &upload_id else {
                    warn!("part {} enqueued before transaction creation", part_number);
                    break UploadOutcome::Failed;
                };
                trace!(
                    "uploading part {} ({} bytes) [upload ID: {}]",
                    part_number,
                    body.len(),
                    id
                );
                match session
                    .store
                    .upload_part(&session.bucket, &session.key, id, part_number, body)
                    .await
                {
                    Ok(etag) => completed_parts.push(CompletedPart { part_number, etag }),
                    Err(err) => {
                        warn!("uploading part {} of {}: {}", part_number, session.key, err);
                        break UploadOutcome::Failed;
                    }
                }
            }
            UploadTask::Complete => {
                let Some(id) = &upload_id else {
                    // Nothing was ever written; there is no transaction to
                    // finalize and no object to create.
                    trace!("no data written to {}; skipping completion", session.key);
                    break UploadOutcome::Completed;
                };
                trace!(
                    "completing {}-part request [upload ID: {}]",
                    completed_parts.len(),
                    id
                );
                match session
                    .store
                    .complete_multipart(
                        &session.bucket,
                        &session.key,
                        id,
                        completed_parts.clone(),
                    )
                    .await
                {
                    Ok(()) => {
                        let (tag, value) = new_last_access_tag();
                        if let Err(err) = session
                            .store
                            .put_tags(
                                &session.bucket,
                                &session.key,
                                HashMap::from([(tag, value)]),
                            )
                            .await
                        {
                            warn!("tagging {}: {}", session.key, err);
                        }
                        for observer in &session.observers {
                            observer.on_variant_written(&session.descriptor);
                        }
                        break UploadOutcome::Completed;
                    }
                    Err(err) => {
                        warn!("completing upload {}: {}", id, err);
                        break UploadOutcome::Failed;
                    }
                }
            }
            UploadTask::Abort => {
                match &upload_id {
                    Some(id) => {
                        trace!("aborting multipart request [upload ID: {}]", id);
                        if let Err(err) = session
                            .store
                            .abort_multipart(&session.bucket, &session.key, id)
                            .await
                        {
                            warn!("aborting upload {}: {}", id, err);
                        }
                    }
                    None => trace!("no transaction to abort for {}", session.key),
                }
                break UploadOutcome::Aborted;
            }
        }
    };

    let _ = session.outcome_tx.send(outcome);
}
