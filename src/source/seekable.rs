//! src/source/seekable.rs
//!
//! Random-access reads over an immutable remote object. The windowed form
//! serves reads from fixed-size, boundary-aligned ranged fetches, caching
//! one window at a time; the spooled form downloads the whole body once
//! into a temp file and seeks locally. Which one a caller gets is decided
//! by the chunking configuration.

use crate::errors::{Error, Result};
use crate::models::object::ByteRange;
use crate::models::reference::ObjectReference;
use crate::source::range_reader::RangeReader;
use crate::store::ObjectStore;
use bytes::Bytes;
use futures::StreamExt;
use std::io::{self, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::StreamReader;
use tracing::warn;
use uuid::Uuid;

/// One cached, boundary-aligned slice of the remote object.
struct Window {
    start: u64,
    data: Bytes,
}

/// Serves reads at arbitrary positions by fetching aligned windows on
/// demand. At most one window is resident; a read outside it evicts and
/// refetches. A failed fetch leaves no partial state behind; the next
/// read starts from scratch.
pub struct WindowedSeekableStream {
    reader: RangeReader,
    length: u64,
    window_size: u64,
    position: u64,
    window: Option<Window>,
}

impl WindowedSeekableStream {
    pub fn new(reader: RangeReader, length: u64, window_size: u64) -> Self {
        Self {
            reader,
            length,
            window_size: window_size.max(1),
            position: 0,
            window: None,
        }
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Repositions the stream. Seeking past the end is allowed; reads
    /// there signal end-of-stream rather than erroring.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.position = resolve_seek(pos, self.position, self.length)?;
        Ok(self.position)
    }

    /// Reads up to `buf.len()` bytes at the current position. Returns 0 at
    /// or past end-of-stream. A single call never crosses a window
    /// boundary; callers read in a loop.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || self.position >= self.length {
            return Ok(0);
        }
        let covered = self
            .window
            .as_ref()
            .is_some_and(|w| self.position >= w.start && self.position < w.start + w.data.len() as u64);
        if !covered {
            self.fetch_window().await?;
        }
        let Some(window) = self.window.as_ref() else {
            return Err(Error::io_other("window fetch produced no data"));
        };
        let offset = (self.position - window.start) as usize;
        let n = buf.len().min(window.data.len() - offset);
        buf[..n].copy_from_slice(&window.data[offset..offset + n]);
        self.position += n as u64;
        Ok(n)
    }

    /// Fetches the window containing the current position, replacing any
    /// cached one. The cache is cleared first so a failed fetch retains
    /// nothing.
    async fn fetch_window(&mut self) -> Result<()> {
        self.window = None;
        let start = (self.position / self.window_size) * self.window_size;
        let end = (start + self.window_size).min(self.length) - 1;
        let data = self.reader.fetch(ByteRange::new(start, end)).await?;
        self.window = Some(Window { start, data });
        Ok(())
    }
}

/// Serves reads from a local spool of the full object body, for callers
/// that disabled chunking (many small round trips are worse than one big
/// download for small objects, or range support at the endpoint is
/// suspect).
pub struct SpooledStream {
    file: tokio::fs::File,
    path: PathBuf,
    length: u64,
    position: u64,
}

impl SpooledStream {
    /// Downloads the whole object into a temp file with one streaming GET.
    pub(crate) async fn create(
        store: Arc<dyn ObjectStore>,
        reference: &ObjectReference,
    ) -> Result<Self> {
        let path = std::env::temp_dir().join(format!(".spool-{}", Uuid::new_v4()));
        let stream = store
            .get_stream(reference.bucket(), reference.key())
            .await?;
        let mut reader = StreamReader::new(stream.map(|chunk| chunk.map_err(io::Error::other)));
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        let length = match tokio::io::copy(&mut reader, &mut file).await {
            Ok(length) => length,
            Err(err) => {
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
                return Err(err.into());
            }
        };
        file.rewind().await?;
        Ok(Self {
            file,
            path,
            length,
            position: 0,
        })
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.position = resolve_seek(pos, self.position, self.length)?;
        Ok(self.position)
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || self.position >= self.length {
            return Ok(0);
        }
        self.file.seek(SeekFrom::Start(self.position)).await?;
        let n = self.file.read(buf).await?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Drop for SpooledStream {
    fn drop(&mut self) {
        // Removal happens off the caller's thread so a slow filesystem
        // never stalls a close. Unlinking while the handle is still open
        // is fine; the handle closes right after this body.
        let path = std::mem::take(&mut self.path);
        if path.as_os_str().is_empty() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = tokio::fs::remove_file(&path).await {
                        warn!("removing spool file {}: {}", path.display(), err);
                    }
                });
            }
            Err(_) => {
                let _ = std::fs::remove_file(&path);
            }
        }
    }
}

/// Random-access read stream over a remote object, windowed or spooled.
pub enum SeekableStream {
    Windowed(WindowedSeekableStream),
    Spooled(SpooledStream),
}

impl SeekableStream {
    pub fn len(&self) -> u64 {
        match self {
            SeekableStream::Windowed(stream) => stream.len(),
            SeekableStream::Spooled(stream) => stream.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self) -> u64 {
        match self {
            SeekableStream::Windowed(stream) => stream.position(),
            SeekableStream::Spooled(stream) => stream.position(),
        }
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        match self {
            SeekableStream::Windowed(stream) => stream.seek(pos),
            SeekableStream::Spooled(stream) => stream.seek(pos),
        }
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            SeekableStream::Windowed(stream) => stream.read(buf).await,
            SeekableStream::Spooled(stream) => stream.read(buf).await,
        }
    }

    /// Reads from the current position through end-of-stream.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = [0u8; 16 * 1024];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        Ok(out)
    }

    /// Releases the stream. Spooled streams remove their temp file on a
    /// background task so this returns quickly.
    pub fn close(self) {}
}

fn resolve_seek(pos: SeekFrom, current: u64, length: u64) -> Result<u64> {
    let target = match pos {
        SeekFrom::Start(offset) => offset as i128,
        SeekFrom::End(delta) => length as i128 + delta as i128,
        SeekFrom::Current(delta) => current as i128 + delta as i128,
    };
    if target < 0 {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek before the start of the stream",
        )));
    }
    Ok(target as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use bytes::Bytes;

    async fn windowed(body: &[u8], window_size: u64) -> (Arc<InMemoryStore>, WindowedSeekableStream) {
        let store = Arc::new(InMemoryStore::with_bucket("b"));
        store
            .put("b", "k", Bytes::copy_from_slice(body), None, None)
            .await
            .unwrap();
        let reader = RangeReader::new(
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            ObjectReference::new("b", "k"),
        );
        let stream = WindowedSeekableStream::new(reader, body.len() as u64, window_size);
        (store, stream)
    }

    #[tokio::test]
    async fn reads_cross_window_boundaries() {
        let body: Vec<u8> = (0..=255).collect();
        let (_store, mut stream) = windowed(&body, 7).await;
        let mut out = Vec::new();
        let mut buf = [0u8; 10];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, body);
    }

    #[tokio::test]
    async fn backward_seek_refetches() {
        let body = b"0123456789abcdef".to_vec();
        let (_store, mut stream) = windowed(&body, 4).await;

        stream.seek(SeekFrom::Start(12)).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"cdef");

        stream.seek(SeekFrom::Start(2)).unwrap();
        assert_eq!(stream.read(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"23");
    }

    #[tokio::test]
    async fn seek_past_end_reads_nothing() {
        let body = b"abc".to_vec();
        let (_store, mut stream) = windowed(&body, 8).await;
        stream.seek(SeekFrom::Start(100)).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).await.unwrap(), 0);

        assert!(stream.seek(SeekFrom::Current(-1000)).is_err());
    }

    #[tokio::test]
    async fn zero_length_object_is_immediately_exhausted() {
        let (_store, mut stream) = windowed(&[], 8).await;
        assert!(stream.is_empty());
        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_fetch_retains_no_window() {
        let body = b"0123456789".to_vec();
        let (store, mut stream) = windowed(&body, 4).await;

        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).await.unwrap(), 4);

        // Delete the object out from under the stream; the next window
        // fetch fails and must retain nothing.
        store.delete("b", "k").await.unwrap();
        assert!(stream.read(&mut buf).await.is_err());

        // Restore the object; reading resumes as though nothing was
        // cached.
        store
            .put("b", "k", Bytes::copy_from_slice(&body), None, None)
            .await
            .unwrap();
        assert_eq!(stream.read(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"4567");
    }
}
