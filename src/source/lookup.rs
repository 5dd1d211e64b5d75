//! src/source/lookup.rs
//!
//! Maps a logical identifier to an object reference, either from static
//! configuration or through an external hook.

use crate::config::SourceConfig;
use crate::errors::{Error, Result};
use crate::models::reference::{Credentials, ObjectReference};
use crate::models::variant::Identifier;
use std::collections::HashMap;
use std::sync::Arc;

/// External hook resolving identifiers to object locations.
///
/// The returned map must contain at least `bucket` and `key`, and may
/// carry `region`, `endpoint`, `access_key_id`, and `secret_access_key`.
/// `None` (or an empty map) means "no such object".
pub trait ObjectLookup: Send + Sync {
    fn lookup(&self, identifier: &Identifier) -> Result<Option<HashMap<String, String>>>;
}

/// How identifiers become object references.
#[derive(Clone)]
pub enum LookupStrategy {
    /// Configured bucket plus `path_prefix + identifier + path_suffix`.
    Basic,

    /// Delegate to an [`ObjectLookup`] hook.
    Delegate(Arc<dyn ObjectLookup>),
}

impl LookupStrategy {
    /// Resolves an identifier. `Ok(None)` means the hook reported that no
    /// such object exists.
    pub fn resolve(
        &self,
        config: &SourceConfig,
        identifier: &Identifier,
    ) -> Result<Option<ObjectReference>> {
        match self {
            LookupStrategy::Basic => {
                let key = format!(
                    "{}{}{}",
                    config.path_prefix, identifier, config.path_suffix
                );
                Ok(Some(ObjectReference::new(config.bucket.clone(), key)))
            }
            LookupStrategy::Delegate(hook) => {
                let Some(result) = hook.lookup(identifier)? else {
                    return Ok(None);
                };
                if result.is_empty() {
                    return Ok(None);
                }
                let (Some(bucket), Some(key)) = (result.get("bucket"), result.get("key")) else {
                    return Err(Error::Configuration(format!(
                        "lookup result for `{}` must include bucket and key",
                        identifier
                    )));
                };
                let credentials = match (
                    result.get("access_key_id"),
                    result.get("secret_access_key"),
                ) {
                    (Some(id), Some(secret)) => Some(Credentials {
                        access_key_id: id.clone(),
                        secret_access_key: secret.clone(),
                    }),
                    _ => None,
                };
                Ok(Some(ObjectReference::with_overrides(
                    bucket.clone(),
                    key.clone(),
                    result.get("region").cloned(),
                    result.get("endpoint").cloned(),
                    credentials,
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MapLookup(Option<HashMap<String, String>>);

    impl ObjectLookup for MapLookup {
        fn lookup(&self, _identifier: &Identifier) -> Result<Option<HashMap<String, String>>> {
            Ok(self.0.clone())
        }
    }

    fn config() -> SourceConfig {
        SourceConfig {
            bucket: "source-bucket".into(),
            path_prefix: "images/".into(),
            path_suffix: ".jpg".into(),
            ..Default::default()
        }
    }

    #[test]
    fn basic_strategy_concatenates_prefix_identifier_suffix() {
        let reference = LookupStrategy::Basic
            .resolve(&config(), &Identifier::from("cats"))
            .unwrap()
            .unwrap();
        assert_eq!(reference.bucket(), "source-bucket");
        assert_eq!(reference.key(), "images/cats.jpg");
    }

    #[test]
    fn delegate_none_means_no_such_object() {
        let strategy = LookupStrategy::Delegate(Arc::new(MapLookup(None)));
        assert!(strategy
            .resolve(&config(), &Identifier::from("cats"))
            .unwrap()
            .is_none());

        let strategy = LookupStrategy::Delegate(Arc::new(MapLookup(Some(HashMap::new()))));
        assert!(strategy
            .resolve(&config(), &Identifier::from("cats"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn delegate_requires_bucket_and_key() {
        let incomplete = HashMap::from([("bucket".to_string(), "b".to_string())]);
        let strategy = LookupStrategy::Delegate(Arc::new(MapLookup(Some(incomplete))));
        assert!(matches!(
            strategy.resolve(&config(), &Identifier::from("cats")),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn delegate_overrides_flow_into_the_reference() {
        let full = HashMap::from([
            ("bucket".to_string(), "other".to_string()),
            ("key".to_string(), "path/to/object".to_string()),
            ("region".to_string(), "us-west-2".to_string()),
            ("endpoint".to_string(), "http://minio.local:9000".to_string()),
            ("access_key_id".to_string(), "id".to_string()),
            ("secret_access_key".to_string(), "secret".to_string()),
        ]);
        let strategy = LookupStrategy::Delegate(Arc::new(MapLookup(Some(full))));
        let reference = strategy
            .resolve(&config(), &Identifier::from("cats"))
            .unwrap()
            .unwrap();
        assert_eq!(reference.bucket(), "other");
        assert_eq!(reference.key(), "path/to/object");
        assert_eq!(reference.region(), Some("us-west-2"));
        assert_eq!(reference.endpoint(), Some("http://minio.local:9000"));
        assert!(reference.credentials().is_some());
    }
}
