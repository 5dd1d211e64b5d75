//! Write-through, TTL-bounded caching of variant images and their
//! serialized metadata in an S3-style object store, plus windowed
//! random-access reads over large remote objects.
//!
//! The two load-bearing pieces are the asynchronous upload pipelines
//! ([`cache::SingleShotUploader`], [`cache::MultipartUploader`]), which
//! decouple a synchronous write API from the actual network upload, and
//! the windowed seekable stream ([`source::WindowedSeekableStream`]),
//! which serves random-access reads over an immutable remote object with
//! on-demand ranged fetches instead of a full download.
//!
//! The store itself is a collaborator behind [`store::ObjectStore`]; an
//! in-process implementation ([`store::memory::InMemoryStore`]) backs the
//! test suite and endpoint-less embedders, and
//! [`store::registry::StoreRegistry`] memoizes one client per endpoint.

pub mod cache;
pub mod config;
pub mod errors;
pub mod models;
pub mod source;
pub mod store;

pub use cache::{
    CacheObserver, CompletionHandle, EvictionSweeper, MultipartUploader, SingleShotUploader,
    SweepStats, UploadOutcome, VariantCache, VariantRead, VariantWriter,
};
pub use config::{CacheConfig, SourceConfig};
pub use errors::{Error, Result};
pub use models::format::Format;
pub use models::info::ImageInfo;
pub use models::object::{ByteRange, CompletedPart, ListObjectsPage, ObjectAttributes, ObjectSummary};
pub use models::reference::{Credentials, ObjectReference};
pub use models::variant::{Identifier, VariantDescriptor};
pub use source::{
    FormatIterator, LookupStrategy, ObjectLookup, RangeReader, SeekableStream, Source,
    SpooledStream, WindowedSeekableStream,
};
pub use store::registry::{ClientSpec, StoreRegistry};
pub use store::{GetOptions, GetResult, ObjectStore, memory::InMemoryStore};
