//! src/store/mod.rs
//!
//! The object-store contract the rest of the crate is written against,
//! plus an in-process implementation and the per-endpoint client registry.
//!
//! Implementations map their native failure modes onto the crate error
//! taxonomy deterministically: a missing bucket or key is `NotFound`, a
//! permission failure is `AccessDenied`, burst throttling is
//! `RateLimited`, and anything else is `Io` wrapping the original cause.

pub mod memory;
pub mod registry;

use crate::errors::Result;
use crate::models::object::{ByteRange, CompletedPart, ListObjectsPage, ObjectAttributes};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use std::collections::HashMap;

/// Minimum size of every part but the last in a multipart transaction.
pub const MIN_PART_LENGTH: usize = 5 * 1024 * 1024;

/// Options for a GET request.
#[derive(Clone, Copy, Debug, Default)]
pub struct GetOptions {
    /// Fetch only this byte range.
    pub range: Option<ByteRange>,

    /// Only return the object if it was written after this instant;
    /// otherwise the call fails with `NotModified`.
    pub if_modified_since: Option<DateTime<Utc>>,
}

/// A successful GET: the (possibly range-limited) body plus the object's
/// attributes.
#[derive(Debug)]
pub struct GetResult {
    pub body: Bytes,
    pub attributes: ObjectAttributes,
}

/// A full object body delivered as a chunk stream.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Operations against one logical store endpoint.
///
/// Implementations are safe for concurrent use by many operations; one
/// instance is memoized per endpoint by [`registry::StoreRegistry`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Existence/size check without fetching the body.
    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectAttributes>;

    /// Fetches an object body, optionally range-limited and/or conditional
    /// on modification time.
    async fn get(&self, bucket: &str, key: &str, options: GetOptions) -> Result<GetResult>;

    /// Fetches a full object body as a chunk stream.
    async fn get_stream(&self, bucket: &str, key: &str) -> Result<ByteStream>;

    /// Writes an object, replacing any previous body and tags.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
        content_encoding: Option<&str>,
    ) -> Result<()>;

    /// Deletes an object. Deleting a missing key succeeds.
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// Lists one page of keys under a prefix. Pass the previous page's
    /// continuation token to resume.
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListObjectsPage>;

    async fn get_tags(&self, bucket: &str, key: &str) -> Result<HashMap<String, String>>;

    /// Replaces the object's tag set.
    async fn put_tags(&self, bucket: &str, key: &str, tags: HashMap<String, String>) -> Result<()>;

    /// Opens a multipart transaction and returns its id.
    async fn create_multipart(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String>;

    /// Uploads one part and returns its etag.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<String>;

    /// Finalizes a multipart transaction from its ordered part list.
    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()>;

    /// Abandons a multipart transaction, discarding uploaded parts.
    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()>;
}

/// Drains every listing page under `prefix` and returns all summaries.
pub async fn list_all_objects(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<crate::models::object::ObjectSummary>> {
    let mut all = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = store.list(bucket, prefix, token.as_deref()).await?;
        all.extend(page.objects);
        if !page.is_truncated {
            break;
        }
        match page.next_continuation_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }
    Ok(all)
}
