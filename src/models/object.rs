//! Object attributes, listing results, byte ranges, and multipart part
//! descriptors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a HEAD request: what is knowable about an object without
/// fetching its body.
#[derive(Clone, Debug)]
pub struct ObjectAttributes {
    /// Size in bytes.
    pub length: u64,

    /// Timestamp when the object was last written.
    pub last_modified: DateTime<Utc>,

    /// Content type (MIME type), if recorded.
    pub content_type: Option<String>,
}

/// One object in a listing.
#[derive(Clone, Debug)]
pub struct ObjectSummary {
    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Size in bytes.
    pub size_bytes: u64,

    /// Timestamp when the object was last written.
    pub last_modified: DateTime<Utc>,
}

/// One page of a prefix listing.
#[derive(Debug, Default)]
pub struct ListObjectsPage {
    pub objects: Vec<ObjectSummary>,

    /// Opaque token resuming the listing after this page, present iff
    /// `is_truncated`.
    pub next_continuation_token: Option<String>,

    pub is_truncated: bool,
}

/// An inclusive byte range for a ranged GET.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,

    /// Inclusive end offset.
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes={}-{}", self.start, self.end)
    }
}

/// A successfully uploaded part of a multipart transaction, as echoed back
/// to the completion call.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CompletedPart {
    /// Part number (1-based).
    pub part_number: i32,

    /// ETag hash returned by the part upload.
    pub etag: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_renders_as_http_header_value() {
        let range = ByteRange::new(0, 511);
        assert_eq!(range.to_string(), "bytes=0-511");
        assert_eq!(range.len(), 512);
        assert!(!range.is_empty());
    }
}
