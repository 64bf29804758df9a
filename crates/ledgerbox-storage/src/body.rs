//! Object byte sources and sinks.
//!
//! - [`ObjectBody`]: an owned async byte source handed to `upload_object`.
//! - [`ObjectReader`]: an owned async byte stream returned by
//!   `fetch_object`; dropping it closes the underlying response.
//! - [`WriteAt`]: a random-access sink filled by `download_object`, possibly
//!   out of order.

use std::fmt;
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

// ---------------------------------------------------------------------------
// ObjectBody
// ---------------------------------------------------------------------------

/// Bytes to upload, read lazily.
///
/// # Examples
///
/// ```
/// use ledgerbox_storage::ObjectBody;
///
/// # tokio_test::block_on(async {
/// let body = ObjectBody::from_static(b"date,amount\n");
/// assert_eq!(body.size_hint(), Some(12));
/// assert_eq!(body.into_bytes().await.unwrap().as_ref(), b"date,amount\n");
/// # });
/// ```
pub struct ObjectBody {
    reader: Pin<Box<dyn AsyncRead + Send>>,
    size_hint: Option<u64>,
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody")
            .field("size_hint", &self.size_hint)
            .finish_non_exhaustive()
    }
}

impl ObjectBody {
    /// Wrap any async reader. The length is unknown until it is drained.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            reader: Box::pin(reader),
            size_hint: None,
        }
    }

    /// A body over static bytes.
    #[must_use]
    pub fn from_static(data: &'static [u8]) -> Self {
        Self::from(Bytes::from_static(data))
    }

    /// An empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::from(Bytes::new())
    }

    /// Exact length when the body was built from in-memory bytes.
    #[must_use]
    pub fn size_hint(&self) -> Option<u64> {
        self.size_hint
    }

    /// Read up to `limit` bytes. A short chunk means the body is exhausted.
    pub async fn read_chunk(&mut self, limit: usize) -> io::Result<Bytes> {
        let capacity = self
            .size_hint
            .and_then(|n| usize::try_from(n).ok())
            .map_or(limit, |n| n.min(limit));
        let mut buf = Vec::with_capacity(capacity);
        let limit = u64::try_from(limit).unwrap_or(u64::MAX);
        (&mut self.reader).take(limit).read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    /// Drain the whole body into memory.
    pub async fn into_bytes(mut self) -> io::Result<Bytes> {
        let mut buf = Vec::new();
        self.reader.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

impl From<Bytes> for ObjectBody {
    fn from(data: Bytes) -> Self {
        let size_hint = u64::try_from(data.len()).ok();
        Self {
            reader: Box::pin(Cursor::new(data)),
            size_hint,
        }
    }
}

impl From<Vec<u8>> for ObjectBody {
    fn from(data: Vec<u8>) -> Self {
        Self::from(Bytes::from(data))
    }
}

impl From<String> for ObjectBody {
    fn from(data: String) -> Self {
        Self::from(Bytes::from(data))
    }
}

impl From<&'static str> for ObjectBody {
    fn from(data: &'static str) -> Self {
        Self::from(Bytes::from_static(data.as_bytes()))
    }
}

impl From<&'static [u8]> for ObjectBody {
    fn from(data: &'static [u8]) -> Self {
        Self::from_static(data)
    }
}

impl AsyncRead for ObjectBody {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.reader.as_mut().poll_read(cx, buf)
    }
}

// ---------------------------------------------------------------------------
// ObjectReader
// ---------------------------------------------------------------------------

/// A fetched object, readable from its first byte.
pub struct ObjectReader {
    reader: Pin<Box<dyn AsyncRead + Send>>,
    content_length: Option<u64>,
}

impl fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectReader")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

impl ObjectReader {
    /// Wrap a response body stream.
    pub fn new<R>(reader: R, content_length: Option<u64>) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            reader: Box::pin(reader),
            content_length,
        }
    }

    /// Length reported by the store, if any.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Read the rest of the stream into memory.
    pub async fn into_bytes(mut self) -> io::Result<Bytes> {
        let capacity = self
            .content_length
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or_default();
        let mut buf = Vec::with_capacity(capacity);
        self.reader.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

impl AsyncRead for ObjectReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.reader.as_mut().poll_read(cx, buf)
    }
}

// ---------------------------------------------------------------------------
// WriteAt
// ---------------------------------------------------------------------------

/// A sink that accepts writes at arbitrary offsets.
///
/// Ranged downloads complete out of order, so each range is written at its
/// own offset. Writes are synchronous.
pub trait WriteAt: Send {
    /// Write all of `buf` starting at `offset`, growing the sink if needed.
    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<()>;
}

impl WriteAt for Vec<u8> {
    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset exceeds memory"))?;
        let end = start
            .checked_add(buf.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "write overflows"))?;
        if self.len() < end {
            self.resize(end, 0);
        }
        self[start..end].copy_from_slice(buf);
        Ok(())
    }
}

impl WriteAt for Cursor<Vec<u8>> {
    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<()> {
        self.get_mut().write_at(buf, offset)
    }
}

impl WriteAt for std::fs::File {
    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(buf)
    }
}

impl<W: WriteAt + ?Sized> WriteAt for &mut W {
    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<()> {
        (**self).write_at(buf, offset)
    }
}
