//! src/store/registry.rs
//!
//! One store client per distinct endpoint, created lazily and reused for
//! the life of the registry. The registry is owned by the composition
//! root; the get-or-create critical section is its only lock.

use crate::errors::Result;
use crate::models::reference::Credentials;
use crate::store::ObjectStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Key under which endpoint-less specs are memoized.
const DEFAULT_ENDPOINT_KEY: &str = "default";

/// Everything a factory needs to build a client for one endpoint.
#[derive(Clone, Debug, Default)]
pub struct ClientSpec {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub credentials: Option<Credentials>,
    pub async_credential_update: bool,
}

type StoreFactory = Box<dyn Fn(&ClientSpec) -> Result<Arc<dyn ObjectStore>> + Send + Sync>;

/// Memoizes one [`ObjectStore`] per endpoint identity.
pub struct StoreRegistry {
    factory: StoreFactory,
    clients: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl StoreRegistry {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&ClientSpec) -> Result<Arc<dyn ObjectStore>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Registry that hands the same store to every spec. Useful for tests
    /// and for embedders with exactly one backend.
    pub fn single(store: Arc<dyn ObjectStore>) -> Self {
        Self::new(move |_spec| Ok(Arc::clone(&store)))
    }

    /// Returns the memoized client for the spec's endpoint, building it on
    /// first use.
    pub fn get_or_create(&self, spec: &ClientSpec) -> Result<Arc<dyn ObjectStore>> {
        let endpoint_key = spec
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT_KEY.to_string());
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(&endpoint_key) {
            return Ok(Arc::clone(client));
        }
        let client = (self.factory)(spec)?;
        clients.insert(endpoint_key, Arc::clone(&client));
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn one_client_per_endpoint() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let registry = StoreRegistry::new(move |_spec| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(InMemoryStore::new()) as Arc<dyn ObjectStore>)
        });

        let default_spec = ClientSpec::default();
        let minio_spec = ClientSpec {
            endpoint: Some("http://minio.local:9000".into()),
            ..Default::default()
        };

        let a = registry.get_or_create(&default_spec).unwrap();
        let b = registry.get_or_create(&default_spec).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(built.load(Ordering::SeqCst), 1);

        let c = registry.get_or_create(&minio_spec).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn single_registry_always_returns_the_same_store() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new());
        let registry = StoreRegistry::single(Arc::clone(&store));
        let spec = ClientSpec {
            endpoint: Some("anything".into()),
            ..Default::default()
        };
        let client = registry.get_or_create(&spec).unwrap();
        assert!(Arc::ptr_eq(&client, &store));
    }
}
