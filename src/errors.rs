//! src/errors.rs
//!
//! Crate-wide error taxonomy shared by the store contract, the cache, and
//! the source layer.

use std::io;
use thiserror::Error;

/// Errors surfaced by store, cache, and source operations.
///
/// Cache reads translate `NotFound`/`NotModified` into an absent result
/// rather than surfacing them to callers; everything else propagates.
#[derive(Debug, Error)]
pub enum Error {
    /// No such bucket or key.
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },

    /// A conditional fetch whose modified-since condition was not met.
    #[error("object `{key}` in bucket `{bucket}` not modified since the cutoff")]
    NotModified { bucket: String, key: String },

    /// Permission failure from the backing store.
    #[error("access denied to `{key}` in bucket `{bucket}`")]
    AccessDenied { bucket: String, key: String },

    /// Burst-rate throttling. Retryable on the synchronous metadata path;
    /// escalates to `Io` once the retry budget is exhausted.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Malformed configuration or an invalid lookup result.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Error::NotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn not_modified(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Error::NotModified {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn access_denied(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Error::AccessDenied {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn io_other(message: impl Into<String>) -> Self {
        Error::Io(io::Error::other(message.into()))
    }

    /// True for the error kinds a cache read treats as "no such entry".
    pub fn is_absent(&self) -> bool {
        matches!(self, Error::NotFound { .. } | Error::NotModified { .. })
    }
}
