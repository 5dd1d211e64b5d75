//! src/config.rs
//!
//! Cache and source configuration. Every option has a working default;
//! `from_env()` overlays `VARIANT_CACHE_*` / `VARIANT_SOURCE_*` environment
//! variables on top of those defaults.

use crate::errors::{Error, Result};
use std::env;

/// Default window/chunk size for ranged source reads.
pub const DEFAULT_CHUNK_SIZE: u64 = 512 * 1024;

/// Default retry budget for throttled metadata writes.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Configuration for [`crate::cache::VariantCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Bucket holding all cache objects.
    pub bucket: String,

    /// Service endpoint. `None` selects the client factory's default.
    pub endpoint: Option<String>,

    /// Endpoint region. Only meaningful for region-aware endpoints.
    pub region: Option<String>,

    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,

    /// Key prefix for all cache objects. Normalized to either empty or a
    /// value ending in exactly one `/`.
    pub object_key_prefix: String,

    /// Entry time-to-live in seconds. Zero or negative means unbounded.
    pub ttl_seconds: i64,

    /// Upload variant bodies in parts instead of one buffered PUT.
    pub multipart_uploads: bool,

    /// Retry budget for rate-limited metadata writes.
    pub max_retries: u32,

    pub async_credential_update: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            endpoint: None,
            region: None,
            access_key_id: None,
            secret_access_key: None,
            object_key_prefix: String::new(),
            ttl_seconds: 0,
            multipart_uploads: false,
            max_retries: DEFAULT_MAX_RETRIES,
            async_credential_update: true,
        }
    }
}

impl CacheConfig {
    /// Build a config from `VARIANT_CACHE_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            bucket: env_string("VARIANT_CACHE_BUCKET").unwrap_or(defaults.bucket),
            endpoint: env_string("VARIANT_CACHE_ENDPOINT"),
            region: env_string("VARIANT_CACHE_REGION"),
            access_key_id: env_string("VARIANT_CACHE_ACCESS_KEY_ID"),
            secret_access_key: env_string("VARIANT_CACHE_SECRET_ACCESS_KEY"),
            object_key_prefix: env_string("VARIANT_CACHE_OBJECT_KEY_PREFIX")
                .unwrap_or(defaults.object_key_prefix),
            ttl_seconds: env_parse("VARIANT_CACHE_TTL_SECONDS")?.unwrap_or(defaults.ttl_seconds),
            multipart_uploads: env_parse("VARIANT_CACHE_MULTIPART_UPLOADS")?
                .unwrap_or(defaults.multipart_uploads),
            max_retries: env_parse("VARIANT_CACHE_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            async_credential_update: env_parse("VARIANT_CACHE_ASYNC_CREDENTIAL_UPDATE")?
                .unwrap_or(defaults.async_credential_update),
        })
    }
}

/// Configuration for [`crate::source::Source`].
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Bucket used by the basic lookup strategy.
    pub bucket: String,

    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,

    /// Prepended to the identifier by the basic lookup strategy.
    pub path_prefix: String,

    /// Appended to the identifier by the basic lookup strategy.
    pub path_suffix: String,

    /// Serve reads through ranged window fetches. When disabled, the full
    /// object is spooled to a local temp file instead.
    pub chunking_enabled: bool,

    /// Window size for ranged reads, in bytes.
    pub chunk_size: u64,

    pub async_credential_update: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            endpoint: None,
            region: None,
            access_key_id: None,
            secret_access_key: None,
            path_prefix: String::new(),
            path_suffix: String::new(),
            chunking_enabled: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            async_credential_update: true,
        }
    }
}

impl SourceConfig {
    /// Build a config from `VARIANT_SOURCE_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            bucket: env_string("VARIANT_SOURCE_BUCKET").unwrap_or(defaults.bucket),
            endpoint: env_string("VARIANT_SOURCE_ENDPOINT"),
            region: env_string("VARIANT_SOURCE_REGION"),
            access_key_id: env_string("VARIANT_SOURCE_ACCESS_KEY_ID"),
            secret_access_key: env_string("VARIANT_SOURCE_SECRET_ACCESS_KEY"),
            path_prefix: env_string("VARIANT_SOURCE_PATH_PREFIX").unwrap_or(defaults.path_prefix),
            path_suffix: env_string("VARIANT_SOURCE_PATH_SUFFIX").unwrap_or(defaults.path_suffix),
            chunking_enabled: env_parse("VARIANT_SOURCE_CHUNKING_ENABLED")?
                .unwrap_or(defaults.chunking_enabled),
            chunk_size: env_parse("VARIANT_SOURCE_CHUNK_SIZE")?.unwrap_or(defaults.chunk_size),
            async_credential_update: env_parse("VARIANT_SOURCE_ASYNC_CREDENTIAL_UPDATE")?
                .unwrap_or(defaults.async_credential_update),
        })
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.parse::<T>().map(Some).map_err(|err| {
            Error::Configuration(format!("parsing {} value `{}`: {}", name, raw, err))
        }),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(Error::Configuration(format!("reading {}: {}", name, err))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_defaults() {
        let config = CacheConfig::default();
        assert!(!config.multipart_uploads);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.ttl_seconds, 0);
        assert!(config.async_credential_update);
    }

    #[test]
    fn source_defaults() {
        let config = SourceConfig::default();
        assert!(config.chunking_enabled);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn env_parse_rejects_garbage() {
        // Variable name is unique to this test to keep it parallel-safe.
        unsafe {
            env::set_var("VARIANT_CACHE_TEST_PARSE_GARBAGE", "not-a-number");
        }
        let result: Result<Option<i64>> = env_parse("VARIANT_CACHE_TEST_PARSE_GARBAGE");
        assert!(matches!(result, Err(Error::Configuration(_))));
        unsafe {
            env::remove_var("VARIANT_CACHE_TEST_PARSE_GARBAGE");
        }
    }

    #[test]
    fn env_parse_absent_is_none() {
        let result: Result<Option<u64>> = env_parse("VARIANT_CACHE_TEST_PARSE_ABSENT");
        assert!(matches!(result, Ok(None)));
    }
}
