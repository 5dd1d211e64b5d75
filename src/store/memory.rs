//! src/store/memory.rs
//!
//! In-process [`ObjectStore`] implementation. Backs the test suite and
//! embedders that want cache semantics without a remote endpoint. Objects
//! live in per-bucket ordered maps so prefix listings come back in key
//! order, mirroring a real store's listing contract.

use crate::errors::{Error, Result};
use crate::models::object::{
    ByteRange, CompletedPart, ListObjectsPage, ObjectAttributes, ObjectSummary,
};
use crate::store::{ByteStream, GetOptions, GetResult, MIN_PART_LENGTH, ObjectStore};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const MAX_KEYS_PER_PAGE: usize = 1000;
const STREAM_CHUNK_LEN: usize = 64 * 1024;

#[derive(Clone)]
struct StoredObject {
    body: Bytes,
    content_type: Option<String>,
    etag: String,
    last_modified: DateTime<Utc>,
    tags: HashMap<String, String>,
}

struct StoredPart {
    etag: String,
    body: Bytes,
}

struct MultipartSession {
    bucket: String,
    key: String,
    content_type: Option<String>,
    parts: BTreeMap<i32, StoredPart>,
}

#[derive(Default)]
struct State {
    buckets: HashMap<String, BTreeMap<String, StoredObject>>,
    uploads: HashMap<String, MultipartSession>,
}

/// In-memory store keyed by bucket and object key.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor that pre-creates one bucket.
    pub fn with_bucket(name: impl Into<String>) -> Self {
        let store = Self::new();
        store.create_bucket(name);
        store
    }

    pub fn create_bucket(&self, name: impl Into<String>) {
        self.state().buckets.entry(name.into()).or_default();
    }

    /// Number of multipart transactions that have been created but neither
    /// completed nor aborted. Exposed so callers can verify abort paths.
    pub fn open_upload_count(&self) -> usize {
        self.state().uploads.len()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Basic key validation to catch empty, oversized, or path-traversal
    /// keys before they reach the maps.
    fn ensure_key_safe(bucket: &str, key: &str) -> Result<()> {
        if key.is_empty()
            || key.len() > MAX_OBJECT_KEY_LEN
            || key.starts_with('/')
            || key.contains("..")
            || key
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(Error::not_found(bucket, key));
        }
        Ok(())
    }

    fn lookup<'a>(state: &'a State, bucket: &str, key: &str) -> Result<&'a StoredObject> {
        state
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .ok_or_else(|| Error::not_found(bucket, key))
    }

    fn attributes_of(object: &StoredObject) -> ObjectAttributes {
        ObjectAttributes {
            length: object.body.len() as u64,
            last_modified: object.last_modified,
            content_type: object.content_type.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectAttributes> {
        Self::ensure_key_safe(bucket, key)?;
        let state = self.state();
        let object = Self::lookup(&state, bucket, key)?;
        Ok(Self::attributes_of(object))
    }

    async fn get(&self, bucket: &str, key: &str, options: GetOptions) -> Result<GetResult> {
        Self::ensure_key_safe(bucket, key)?;
        let state = self.state();
        let object = Self::lookup(&state, bucket, key)?;

        if let Some(since) = options.if_modified_since {
            if object.last_modified <= since {
                return Err(Error::not_modified(bucket, key));
            }
        }

        let body = match options.range {
            Some(range) => {
                let length = object.body.len() as u64;
                if range.start >= length {
                    return Err(Error::io_other(format!(
                        "range {} not satisfiable for {}-byte object `{}`",
                        range, length, key
                    )));
                }
                let end = range.end.min(length - 1);
                object.body.slice(range.start as usize..=end as usize)
            }
            None => object.body.clone(),
        };

        Ok(GetResult {
            body,
            attributes: Self::attributes_of(object),
        })
    }

    async fn get_stream(&self, bucket: &str, key: &str) -> Result<ByteStream> {
        Self::ensure_key_safe(bucket, key)?;
        let body = {
            let state = self.state();
            Self::lookup(&state, bucket, key)?.body.clone()
        };
        let mut chunks = Vec::new();
        let mut offset = 0;
        while offset < body.len() {
            let end = (offset + STREAM_CHUNK_LEN).min(body.len());
            chunks.push(Ok(body.slice(offset..end)));
            offset = end;
        }
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
        _content_encoding: Option<&str>,
    ) -> Result<()> {
        Self::ensure_key_safe(bucket, key)?;
        let mut state = self.state();
        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::not_found(bucket, key))?;
        let etag = format!("{:x}", md5::compute(&body));
        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.map(str::to_string),
                etag,
                last_modified: Utc::now(),
                tags: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        Self::ensure_key_safe(bucket, key)?;
        let mut state = self.state();
        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::not_found(bucket, key))?;
        objects.remove(key);
        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListObjectsPage> {
        let state = self.state();
        let objects = state
            .buckets
            .get(bucket)
            .ok_or_else(|| Error::not_found(bucket, prefix))?;

        let start_after = continuation_token.map(decode_continuation_token);
        let fetch_limit = MAX_KEYS_PER_PAGE + 1;
        let mut rows: Vec<ObjectSummary> = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| match &start_after {
                Some(token) => key.as_str() > token.as_str(),
                None => true,
            })
            .take(fetch_limit)
            .map(|(key, object)| ObjectSummary {
                key: key.clone(),
                size_bytes: object.body.len() as u64,
                last_modified: object.last_modified,
            })
            .collect();

        let mut is_truncated = false;
        let mut next_continuation_token = None;
        if rows.len() == fetch_limit {
            if let Some(last) = rows.pop() {
                next_continuation_token = Some(encode_continuation_token(&last.key));
            }
            is_truncated = true;
        }

        Ok(ListObjectsPage {
            objects: rows,
            next_continuation_token,
            is_truncated,
        })
    }

    async fn get_tags(&self, bucket: &str, key: &str) -> Result<HashMap<String, String>> {
        Self::ensure_key_safe(bucket, key)?;
        let state = self.state();
        let object = Self::lookup(&state, bucket, key)?;
        Ok(object.tags.clone())
    }

    async fn put_tags(&self, bucket: &str, key: &str, tags: HashMap<String, String>) -> Result<()> {
        Self::ensure_key_safe(bucket, key)?;
        let mut state = self.state();
        let object = state
            .buckets
            .get_mut(bucket)
            .and_then(|objects| objects.get_mut(key))
            .ok_or_else(|| Error::not_found(bucket, key))?;
        object.tags = tags;
        Ok(())
    }

    async fn create_multipart(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String> {
        Self::ensure_key_safe(bucket, key)?;
        let mut state = self.state();
        if !state.buckets.contains_key(bucket) {
            return Err(Error::not_found(bucket, key));
        }
        let upload_id = Uuid::new_v4().to_string();
        state.uploads.insert(
            upload_id.clone(),
            MultipartSession {
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: content_type.map(str::to_string),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<String> {
        let mut state = self.state();
        let session = state
            .uploads
            .get_mut(upload_id)
            .filter(|session| session.bucket == bucket && session.key == key)
            .ok_or_else(|| Error::not_found(bucket, key))?;
        let etag = format!("{:x}", md5::compute(&body));
        session.parts.insert(
            part_number,
            StoredPart {
                etag: etag.clone(),
                body,
            },
        );
        Ok(etag)
    }

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()> {
        let mut state = self.state();
        {
            let session = state
                .uploads
                .get(upload_id)
                .filter(|session| session.bucket == bucket && session.key == key)
                .ok_or_else(|| Error::not_found(bucket, key))?;

            if parts.is_empty() {
                return Err(Error::io_other(format!(
                    "completing upload `{}` requires at least one part",
                    upload_id
                )));
            }
            for (index, part) in parts.iter().enumerate() {
                let stored = session.parts.get(&part.part_number).ok_or_else(|| {
                    Error::io_other(format!(
                        "upload `{}` has no part {}",
                        upload_id, part.part_number
                    ))
                })?;
                if stored.etag != part.etag {
                    return Err(Error::io_other(format!(
                        "etag mismatch for part {} of upload `{}`",
                        part.part_number, upload_id
                    )));
                }
                let is_last = index == parts.len() - 1;
                if !is_last && stored.body.len() < MIN_PART_LENGTH {
                    return Err(Error::io_other(format!(
                        "part {} of upload `{}` is smaller than the {}-byte minimum",
                        part.part_number, upload_id, MIN_PART_LENGTH
                    )));
                }
            }
        }

        let session = match state.uploads.remove(upload_id) {
            Some(session) => session,
            None => return Err(Error::not_found(bucket, key)),
        };
        let mut assembled = Vec::new();
        for part in &parts {
            if let Some(stored) = session.parts.get(&part.part_number) {
                assembled.extend_from_slice(&stored.body);
            }
        }
        let body = Bytes::from(assembled);
        let etag = format!("{:x}", md5::compute(&body));
        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::not_found(bucket, key))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: session.content_type,
                etag,
                last_modified: Utc::now(),
                tags: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        let mut state = self.state();
        state
            .uploads
            .remove(upload_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(bucket, key))
    }
}

fn encode_continuation_token(token: &str) -> String {
    general_purpose::STANDARD.encode(token)
}

fn decode_continuation_token(token: &str) -> String {
    general_purpose::STANDARD
        .decode(token)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| token.to_string())
}
