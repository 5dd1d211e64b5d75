//! End-to-end coverage of the two upload pipelines against the in-memory
//! store: round-trip laws, abort semantics, and observer notification.

use rand::RngCore;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use variant_cache::cache::freshness::parse_last_access;
use variant_cache::store::MIN_PART_LENGTH;
use variant_cache::{
    CacheConfig, CacheObserver, Format, GetOptions, InMemoryStore, ObjectStore, UploadOutcome,
    VariantCache, VariantDescriptor,
};

const BUCKET: &str = "cache-bucket";

/// Opt-in log output for debugging test failures: set `RUST_LOG` and run
/// with `--nocapture`.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    rand::rng().fill_bytes(&mut data);
    data
}

fn new_cache(multipart: bool) -> (Arc<InMemoryStore>, VariantCache) {
    let store = Arc::new(InMemoryStore::with_bucket(BUCKET));
    let config = CacheConfig {
        bucket: BUCKET.into(),
        multipart_uploads: multipart,
        ..Default::default()
    };
    let cache = VariantCache::new(Arc::clone(&store) as Arc<dyn ObjectStore>, config);
    (store, cache)
}

fn descriptor() -> VariantDescriptor {
    VariantDescriptor::new("cats")
        .with_operation("scale:50%")
        .with_output_format(Format::Jpeg)
}

struct CountingObserver(AtomicUsize);

impl CacheObserver for CountingObserver {
    fn on_variant_written(&self, _descriptor: &VariantDescriptor) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn single_shot_round_trip_with_freshness_tag() {
    init_logging();
    let (store, mut cache) = new_cache(false);
    let observer = Arc::new(CountingObserver(AtomicUsize::new(0)));
    cache.add_observer(observer.clone());

    let expected = random_bytes(1024 * 1024);
    let mut writer = cache.variant_writer(&descriptor());
    let key = writer.key().to_string();
    writer.write(&expected);
    writer.complete();
    let outcome = writer.close().outcome().await;
    assert_eq!(outcome, UploadOutcome::Completed);

    let result = store.get(BUCKET, &key, GetOptions::default()).await.unwrap();
    assert_eq!(&result.body[..], &expected[..]);
    assert_eq!(result.attributes.content_type.as_deref(), Some("image/jpeg"));

    let tags = store.get_tags(BUCKET, &key).await.unwrap();
    let stamped = parse_last_access(&tags).expect("freshness tag missing");
    assert!((chrono::Utc::now() - stamped).num_seconds() < 5);

    assert_eq!(observer.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn single_shot_incomplete_close_discards_the_write() {
    let (store, cache) = new_cache(false);
    let mut writer = cache.variant_writer(&descriptor());
    let key = writer.key().to_string();
    writer.write(b"partial data that must never appear");
    let outcome = writer.close().outcome().await;
    assert_eq!(outcome, UploadOutcome::Aborted);
    assert!(store.head(BUCKET, &key).await.is_err());
}

#[tokio::test]
async fn single_shot_empty_write_uploads_nothing() {
    let (store, cache) = new_cache(false);
    let mut writer = cache.variant_writer(&descriptor());
    let key = writer.key().to_string();
    writer.complete();
    let outcome = writer.close().outcome().await;
    assert_eq!(outcome, UploadOutcome::Completed);
    assert!(store.head(BUCKET, &key).await.is_err());
}

#[tokio::test]
async fn multipart_round_trip_with_mixed_write_granularity() {
    init_logging();
    let (store, cache) = new_cache(true);

    // Two full parts plus an undersized tail, written as a mix of
    // single-byte and large-buffer writes.
    let expected = random_bytes(MIN_PART_LENGTH * 2 + 1024 * 1024);
    let mut writer = cache.variant_writer(&descriptor());
    let key = writer.key().to_string();

    for byte in &expected[..1024] {
        writer.write(std::slice::from_ref(byte));
    }
    for chunk in expected[1024..].chunks(64 * 1024) {
        writer.write(chunk);
    }
    writer.complete();
    let outcome = writer.close().outcome().await;
    assert_eq!(outcome, UploadOutcome::Completed);

    let result = store.get(BUCKET, &key, GetOptions::default()).await.unwrap();
    assert_eq!(result.body.len(), expected.len());
    assert_eq!(&result.body[..], &expected[..]);
    assert_eq!(store.open_upload_count(), 0);

    let tags = store.get_tags(BUCKET, &key).await.unwrap();
    assert!(parse_last_access(&tags).is_some());
}

#[tokio::test]
async fn multipart_exact_part_multiple_skips_the_empty_tail() {
    let (store, cache) = new_cache(true);

    let expected = random_bytes(MIN_PART_LENGTH * 2);
    let mut writer = cache.variant_writer(&descriptor());
    let key = writer.key().to_string();
    for chunk in expected.chunks(MIN_PART_LENGTH) {
        writer.write(chunk);
    }
    writer.complete();
    assert_eq!(writer.close().outcome().await, UploadOutcome::Completed);

    let result = store.get(BUCKET, &key, GetOptions::default()).await.unwrap();
    assert_eq!(&result.body[..], &expected[..]);
    assert_eq!(store.open_upload_count(), 0);
}

#[tokio::test]
async fn multipart_undersized_single_part_round_trips() {
    let (store, cache) = new_cache(true);

    let expected = random_bytes(3 * 1024);
    let mut writer = cache.variant_writer(&descriptor());
    let key = writer.key().to_string();
    writer.write(&expected);
    writer.complete();
    assert_eq!(writer.close().outcome().await, UploadOutcome::Completed);

    let result = store.get(BUCKET, &key, GetOptions::default()).await.unwrap();
    assert_eq!(&result.body[..], &expected[..]);
}

#[tokio::test]
async fn multipart_incomplete_close_aborts_the_transaction() {
    let (store, mut cache) = new_cache(true);
    let observer = Arc::new(CountingObserver(AtomicUsize::new(0)));
    cache.add_observer(observer.clone());

    let mut writer = cache.variant_writer(&descriptor());
    let key = writer.key().to_string();
    writer.write(&random_bytes(MIN_PART_LENGTH + 17));
    // No complete() before close.
    let outcome = writer.close().outcome().await;
    assert_eq!(outcome, UploadOutcome::Aborted);

    assert!(store.head(BUCKET, &key).await.is_err());
    assert_eq!(store.open_upload_count(), 0);
    assert_eq!(observer.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn multipart_observers_fire_after_the_object_is_readable() {
    let (store, mut cache) = new_cache(true);
    let observer = Arc::new(CountingObserver(AtomicUsize::new(0)));
    cache.add_observer(observer.clone());

    let mut writer = cache.variant_writer(&descriptor());
    let key = writer.key().to_string();
    writer.write(&random_bytes(MIN_PART_LENGTH));
    writer.complete();
    assert_eq!(writer.close().outcome().await, UploadOutcome::Completed);

    assert_eq!(observer.0.load(Ordering::SeqCst), 1);
    assert!(store.head(BUCKET, &key).await.is_ok());
}
