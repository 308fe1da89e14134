use std::sync::Arc;

use tracing::{debug, warn};

use crate::driver::{Driver, DriverWriter};
use crate::error::wrap;
use crate::sniff::detect_content_type;
use crate::{BlobCtx, BlobError, BlobResult, WriterOptions};

enum WriterState {
    /// No content type was declared; holding the first bytes until there
    /// are enough to detect one.
    Sniffing { buf: Vec<u8> },
    Open { inner: Box<dyn DriverWriter> },
    Closed,
}

/// Writes one object to a bucket.
///
/// Returned by [`Bucket::new_writer`](crate::Bucket::new_writer). When the
/// writer options declare a content type the driver writer already exists.
/// Otherwise up to `sniff_len` bytes are buffered and the driver writer is
/// created, with a detected content type, on the first write that would
/// overflow the buffer or on [`close`](Self::close).
///
/// The object only becomes visible after a successful close. Not safe for
/// concurrent use.
pub struct Writer {
    driver: Arc<dyn Driver>,
    ctx: BlobCtx,
    key: String,
    opts: WriterOptions,
    sniff_len: usize,
    content_type: Option<String>,
    state: WriterState,
}

impl Writer {
    pub(crate) fn sniffing(
        driver: Arc<dyn Driver>,
        ctx: BlobCtx,
        key: String,
        opts: WriterOptions,
        sniff_len: usize,
    ) -> Self {
        Self {
            driver,
            ctx,
            key,
            opts,
            sniff_len,
            content_type: None,
            state: WriterState::Sniffing {
                buf: Vec::with_capacity(sniff_len),
            },
        }
    }

    pub(crate) fn open(
        driver: Arc<dyn Driver>,
        ctx: BlobCtx,
        key: String,
        opts: WriterOptions,
        content_type: String,
        inner: Box<dyn DriverWriter>,
    ) -> Self {
        Self {
            driver,
            ctx,
            key,
            opts,
            sniff_len: 0,
            content_type: Some(content_type),
            state: WriterState::Open { inner },
        }
    }

    /// Write `data`, returning how many of its bytes were accepted
    pub async fn write(&mut self, data: &[u8]) -> BlobResult<usize> {
        match std::mem::replace(&mut self.state, WriterState::Closed) {
            WriterState::Closed => Err(BlobError::closed("writer")),
            WriterState::Sniffing { mut buf } if buf.len() + data.len() <= self.sniff_len => {
                buf.extend_from_slice(data);
                self.state = WriterState::Sniffing { buf };
                Ok(data.len())
            }
            WriterState::Sniffing { buf } => {
                let mut inner = self.open_sniffed(&buf, data).await?;
                let driver = self.driver.as_ref();
                let result = match write_fully(&self.ctx, driver, inner.as_mut(), &buf).await {
                    Ok(()) => forward(&self.ctx, driver, inner.as_mut(), data).await,
                    Err(err) => Err(err),
                };
                // Stay open after a failed write so close can still release the driver writer.
                self.state = WriterState::Open { inner };
                result
            }
            WriterState::Open { mut inner } => {
                let result = forward(&self.ctx, self.driver.as_ref(), inner.as_mut(), data).await;
                self.state = WriterState::Open { inner };
                result
            }
        }
    }

    /// Write all of `data`, retrying short driver writes
    pub async fn write_all(&mut self, mut data: &[u8]) -> BlobResult<()> {
        while !data.is_empty() {
            let n = self.write(data).await?;
            if n == 0 {
                return Err(write_zero(self.driver.as_ref()));
            }
            data = &data[n.min(data.len())..];
        }
        Ok(())
    }

    /// Flush anything still buffered and commit the object.
    ///
    /// Closing twice is an error.
    pub async fn close(&mut self) -> BlobResult<()> {
        let mut inner = match std::mem::replace(&mut self.state, WriterState::Closed) {
            WriterState::Closed => return Err(BlobError::closed("writer")),
            WriterState::Open { inner } => inner,
            WriterState::Sniffing { buf } => {
                let mut inner = self.open_sniffed(&buf, &[]).await?;
                let flushed =
                    write_fully(&self.ctx, self.driver.as_ref(), inner.as_mut(), &buf).await;
                if let Err(err) = flushed {
                    let _ = self.ctx.run(inner.close()).await;
                    return Err(err);
                }
                inner
            }
        };

        self.ctx
            .run(inner.close())
            .await
            .map_err(|source| wrap(self.driver.as_ref(), "writer.close", source))
    }

    /// Give up on the object after a failed write.
    ///
    /// Cancels the writer's context, then closes the driver writer outside
    /// the cancellation race so the driver sees the close and releases the
    /// upload. The close's error is discarded. Bytes still being sniffed
    /// never reached the driver and are simply dropped.
    pub(crate) async fn abort(&mut self) {
        self.ctx.cancel();
        if let WriterState::Open { mut inner } =
            std::mem::replace(&mut self.state, WriterState::Closed)
        {
            if let Err(err) = inner.close().await {
                debug!(
                    request_id = %self.ctx.request_id,
                    key = %self.key,
                    error = %err,
                    "aborted writer close failed"
                );
            }
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Declared or detected content type; `None` while still sniffing
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, WriterState::Closed)
    }

    /// Detect the content type from the start of the stream and open the driver writer
    async fn open_sniffed(&mut self, buf: &[u8], next: &[u8]) -> BlobResult<Box<dyn DriverWriter>> {
        let room = self.sniff_len.saturating_sub(buf.len()).min(next.len());
        let mut prefix = Vec::with_capacity(buf.len() + room);
        prefix.extend_from_slice(buf);
        prefix.extend_from_slice(&next[..room]);

        let content_type = detect_content_type(&prefix, &self.key);
        debug!(
            request_id = %self.ctx.request_id,
            key = %self.key,
            content_type = %content_type,
            sniffed = prefix.len(),
            "detected content type"
        );

        let inner = self
            .ctx
            .run(
                self.driver
                    .new_typed_writer(&self.ctx, &self.key, &content_type, &self.opts),
            )
            .await
            .map_err(|source| wrap(self.driver.as_ref(), "new_writer", source))?;
        self.content_type = Some(content_type);
        Ok(inner)
    }
}

// These take the writer's fields rather than `&Writer`: a driver writer is
// only `Send`, and a `&Writer` held across an await would not be.
async fn forward(
    ctx: &BlobCtx,
    driver: &dyn Driver,
    inner: &mut dyn DriverWriter,
    data: &[u8],
) -> BlobResult<usize> {
    ctx.run(inner.write(data))
        .await
        .map_err(|source| wrap(driver, "writer.write", source))
}

async fn write_fully(
    ctx: &BlobCtx,
    driver: &dyn Driver,
    inner: &mut dyn DriverWriter,
    mut data: &[u8],
) -> BlobResult<()> {
    while !data.is_empty() {
        let n = forward(ctx, driver, inner, data).await?;
        if n == 0 {
            return Err(write_zero(driver));
        }
        data = &data[n.min(data.len())..];
    }
    Ok(())
}

fn write_zero(driver: &dyn Driver) -> BlobError {
    let source = std::io::Error::new(
        std::io::ErrorKind::WriteZero,
        "driver writer accepted no bytes",
    );
    wrap(driver, "writer.write", Box::new(source))
}

impl Drop for Writer {
    fn drop(&mut self) {
        if !self.is_closed() {
            warn!(key = %self.key, "writer dropped without close, object not committed");
        }
    }
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            WriterState::Sniffing { buf } => format!("sniffing({} bytes)", buf.len()),
            WriterState::Open { .. } => "open".to_string(),
            WriterState::Closed => "closed".to_string(),
        };
        f.debug_struct("Writer")
            .field("key", &self.key)
            .field("content_type", &self.content_type)
            .field("state", &state)
            .finish()
    }
}
