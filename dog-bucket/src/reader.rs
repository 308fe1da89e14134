use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::driver::{Driver, DriverReader};
use crate::error::wrap;
use crate::{BlobCtx, BlobError, BlobResult, ByteStream, ReaderAttributes};

/// Reads one object (or a range of it) from a bucket.
///
/// Returned by [`Bucket::new_range_reader`](crate::Bucket::new_range_reader).
/// Every read and the close are passed straight to the driver and raced
/// against the context the reader was opened with. Not safe for concurrent
/// use; callers must [`close`](Self::close) it.
pub struct Reader {
    driver: Arc<dyn Driver>,
    ctx: BlobCtx,
    key: String,
    inner: Option<Box<dyn DriverReader>>,
    attrs: ReaderAttributes,
    chunk_size: usize,
}

impl Reader {
    pub(crate) fn new(
        driver: Arc<dyn Driver>,
        ctx: BlobCtx,
        key: String,
        inner: Box<dyn DriverReader>,
        chunk_size: usize,
    ) -> Self {
        let attrs = inner.attributes();
        Self {
            driver,
            ctx,
            key,
            inner: Some(inner),
            attrs,
            chunk_size,
        }
    }

    /// Read into `buf`; `Ok(0)` means the range is exhausted
    pub async fn read(&mut self, buf: &mut [u8]) -> BlobResult<usize> {
        let inner = self.inner.as_mut().ok_or_else(|| BlobError::closed("reader"))?;
        self.ctx
            .run(inner.read(buf))
            .await
            .map_err(|source| wrap(self.driver.as_ref(), "reader.read", source))
    }

    /// Read everything left in the range
    pub async fn read_to_end(&mut self) -> BlobResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    pub async fn close(&mut self) -> BlobResult<()> {
        let mut inner = self.inner.take().ok_or_else(|| BlobError::closed("reader"))?;
        self.ctx
            .run(inner.close())
            .await
            .map_err(|source| wrap(self.driver.as_ref(), "reader.close", source))
    }

    /// Stream the rest of the range in chunks, closing the reader at the end.
    ///
    /// Errors surface as `std::io::Error`s wrapping the tagged [`BlobError`].
    pub fn into_stream(mut self) -> ByteStream {
        let stream = async_stream::stream! {
            let mut buf = vec![0u8; self.chunk_size];
            loop {
                match self.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => yield Ok(Bytes::copy_from_slice(&buf[..n])),
                    Err(err) => {
                        let _ = self.close().await;
                        yield Err(std::io::Error::new(std::io::ErrorKind::Other, err));
                        return;
                    }
                }
            }
            if let Err(err) = self.close().await {
                yield Err(std::io::Error::new(std::io::ErrorKind::Other, err));
            }
        };
        Box::pin(stream)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Media type of the object
    pub fn content_type(&self) -> &str {
        &self.attrs.content_type
    }

    /// Size of the whole object
    pub fn size(&self) -> u64 {
        self.attrs.size
    }

    pub fn mod_time(&self) -> Option<DateTime<Utc>> {
        self.attrs.mod_time
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        if self.inner.is_some() {
            warn!(key = %self.key, "reader dropped without close");
        }
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("key", &self.key)
            .field("attrs", &self.attrs)
            .field("closed", &self.inner.is_none())
            .finish()
    }
}
