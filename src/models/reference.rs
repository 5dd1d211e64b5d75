//! Identifies one object in a remote store.

use std::fmt;

/// A static credential pair attached to a reference.
///
/// `Debug` masks both halves so references can be logged freely.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &"******")
            .field("secret_access_key", &"******")
            .finish()
    }
}

/// Everything needed to address one remote object: bucket and key, plus
/// optional per-request region, endpoint, and credentials, and the object
/// length once discovered.
///
/// A reference is owned by the operation that constructed it and is never
/// shared mutably across concurrent operations.
#[derive(Clone, Debug)]
pub struct ObjectReference {
    bucket: String,
    key: String,
    region: Option<String>,
    endpoint: Option<String>,
    credentials: Option<Credentials>,
    length: Option<u64>,
}

impl ObjectReference {
    /// Reference addressed through statically configured endpoint/region/
    /// credentials.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            region: None,
            endpoint: None,
            credentials: None,
            length: None,
        }
    }

    /// Reference carrying per-request overrides, as returned by a delegate
    /// lookup.
    pub fn with_overrides(
        bucket: impl Into<String>,
        key: impl Into<String>,
        region: Option<String>,
        endpoint: Option<String>,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            region,
            endpoint,
            credentials,
            length: None,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Object length, if it has been discovered via a HEAD.
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    /// Records the object length once discovered. Later calls overwrite;
    /// references are not shared, so there is no race to guard against.
    pub fn set_length(&mut self, length: u64) {
        self.length = Some(length);
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://")?;
        if let Some(endpoint) = &self.endpoint {
            write!(f, "{}/", endpoint)?;
        }
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_masks_credentials() {
        let reference = ObjectReference::with_overrides(
            "bucket",
            "key",
            None,
            None,
            Some(Credentials {
                access_key_id: "AKIAEXAMPLE".into(),
                secret_access_key: "very-secret".into(),
            }),
        );
        let rendered = format!("{:?}", reference);
        assert!(!rendered.contains("AKIAEXAMPLE"));
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("******"));
    }

    #[test]
    fn display_includes_endpoint_when_present() {
        let mut reference = ObjectReference::with_overrides(
            "b",
            "k",
            None,
            Some("minio.local:9000".into()),
            None,
        );
        assert_eq!(reference.to_string(), "s3://minio.local:9000/b/k");
        assert_eq!(reference.length(), None);
        reference.set_length(42);
        assert_eq!(reference.length(), Some(42));
    }
}
