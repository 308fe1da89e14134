use std::sync::Arc;

use futures_util::StreamExt;
use tracing::debug;

use crate::driver::Driver;
use crate::error::wrap_result;
use crate::{
    Attributes, BlobCtx, BlobError, BlobResult, BucketConfig, ByteStream, ListIterator,
    ListOptions, Reader, ReaderOptions, SignedUrlOptions, Writer, WriterOptions,
};

/// Portable handle on one bucket of one backend.
///
/// Wraps a single driver and exposes the same operations for every
/// backend. Each error a driver returns reaches the caller as exactly one
/// tagged [`BlobError::Driver`]. A bucket holds no per-call state, so
/// independent operations may run concurrently; the readers, writers and
/// iterators it hands out may not be shared between tasks.
pub struct Bucket {
    driver: Arc<dyn Driver>,
    config: BucketConfig,
}

impl Bucket {
    /// Wrap a driver with the default configuration
    pub fn new<D: Driver + 'static>(driver: D) -> Self {
        Self::with_config(driver, BucketConfig::default())
    }

    pub fn with_config<D: Driver + 'static>(driver: D, config: BucketConfig) -> Self {
        Self {
            driver: Arc::new(driver),
            config,
        }
    }

    /// Wrap a driver that is already boxed, as openers return them
    pub fn from_boxed(driver: Box<dyn Driver>, config: BucketConfig) -> Self {
        Self {
            driver: Arc::from(driver),
            config,
        }
    }

    /// Iterate over the objects matching `opts`.
    ///
    /// Nothing is fetched until the iterator is first advanced.
    pub fn list(&self, mut opts: ListOptions) -> ListIterator {
        if opts.page_size.is_none() {
            opts.page_size = self.config.default_page_size;
        }
        ListIterator::new(self.driver.clone(), opts)
    }

    pub async fn attributes(&self, ctx: &BlobCtx, key: &str) -> BlobResult<Attributes> {
        debug!(request_id = %ctx.request_id, key, "fetching attributes");
        let result = ctx.run(self.driver.attributes(key)).await;
        wrap_result(self.driver.as_ref(), "attributes", result)
    }

    /// Whether an object exists at `key`
    pub async fn exists(&self, ctx: &BlobCtx, key: &str) -> BlobResult<bool> {
        match self.attributes(ctx, key).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Open a reader over `length` bytes of `key` starting at `offset`.
    ///
    /// `None` reads to the end of the object.
    pub async fn new_range_reader(
        &self,
        ctx: &BlobCtx,
        key: &str,
        offset: u64,
        length: Option<u64>,
        opts: &ReaderOptions,
    ) -> BlobResult<Reader> {
        debug!(request_id = %ctx.request_id, key, offset, ?length, "opening range reader");
        let result = ctx
            .run(self.driver.new_range_reader(key, offset, length, opts))
            .await;
        let inner = wrap_result(self.driver.as_ref(), "new_range_reader", result)?;

        Ok(Reader::new(
            self.driver.clone(),
            ctx.clone(),
            key.to_string(),
            inner,
            self.config.read_chunk_size,
        ))
    }

    /// Open a reader over the whole object
    pub async fn new_reader(
        &self,
        ctx: &BlobCtx,
        key: &str,
        opts: &ReaderOptions,
    ) -> BlobResult<Reader> {
        self.new_range_reader(ctx, key, 0, None, opts).await
    }

    /// Read the whole object into memory.
    ///
    /// The reader is always closed; a close failure is reported even when
    /// every read succeeded.
    pub async fn read_all(&self, ctx: &BlobCtx, key: &str) -> BlobResult<Vec<u8>> {
        let mut reader = self.new_reader(ctx, key, &ReaderOptions::default()).await?;
        let data = reader.read_to_end().await;
        let closed = reader.close().await;

        let data = data?;
        closed?;
        Ok(data)
    }

    /// Open a writer for `key`.
    ///
    /// With a declared content type the driver writer is created here;
    /// without one, creation waits until the writer has sniffed enough bytes.
    pub async fn new_writer(
        &self,
        ctx: &BlobCtx,
        key: &str,
        opts: WriterOptions,
    ) -> BlobResult<Writer> {
        let declared = opts
            .content_type
            .as_deref()
            .filter(|ct| !ct.is_empty())
            .map(str::to_string);

        let Some(content_type) = declared else {
            debug!(request_id = %ctx.request_id, key, "opening writer, content type to be sniffed");
            return Ok(Writer::sniffing(
                self.driver.clone(),
                ctx.clone(),
                key.to_string(),
                opts,
                self.config.sniff_len,
            ));
        };

        debug!(request_id = %ctx.request_id, key, %content_type, "opening writer");
        let result = ctx
            .run(self.driver.new_typed_writer(ctx, key, &content_type, &opts))
            .await;
        let inner = wrap_result(self.driver.as_ref(), "new_writer", result)?;

        Ok(Writer::open(
            self.driver.clone(),
            ctx.clone(),
            key.to_string(),
            opts,
            content_type,
            inner,
        ))
    }

    /// Store `data` at `key` in one call.
    ///
    /// If writing fails the writer is aborted: its context is cancelled and
    /// the driver writer closed, with that close's error discarded. The
    /// write error is returned.
    pub async fn write_all(
        &self,
        ctx: &BlobCtx,
        key: &str,
        data: &[u8],
        opts: WriterOptions,
    ) -> BlobResult<()> {
        let ctx = ctx.child();
        let mut writer = self.new_writer(&ctx, key, opts).await?;

        match writer.write_all(data).await {
            Ok(()) => writer.close().await,
            Err(err) => {
                writer.abort().await;
                Err(err)
            }
        }
    }

    /// Store everything `body` yields at `key`, returning the number of bytes written
    pub async fn upload(
        &self,
        ctx: &BlobCtx,
        key: &str,
        mut body: ByteStream,
        opts: WriterOptions,
    ) -> BlobResult<u64> {
        let ctx = ctx.child();
        let mut writer = self.new_writer(&ctx, key, opts).await?;

        let copied = async {
            let mut total = 0u64;
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                writer.write_all(&chunk).await?;
                total += chunk.len() as u64;
            }
            Ok::<_, BlobError>(total)
        }
        .await;

        match copied {
            Ok(total) => {
                writer.close().await?;
                debug!(request_id = %ctx.request_id, key, bytes = total, "upload complete");
                Ok(total)
            }
            Err(err) => {
                writer.abort().await;
                Err(err)
            }
        }
    }

    pub async fn delete(&self, ctx: &BlobCtx, key: &str) -> BlobResult<()> {
        debug!(request_id = %ctx.request_id, key, "deleting");
        let result = ctx.run(self.driver.delete(key)).await;
        wrap_result(self.driver.as_ref(), "delete", result)
    }

    /// URL granting temporary access to `key`
    pub async fn signed_url(
        &self,
        ctx: &BlobCtx,
        key: &str,
        opts: &SignedUrlOptions,
    ) -> BlobResult<String> {
        if opts.expiry.is_zero() {
            return Err(BlobError::invalid("signed URL expiry must be positive"));
        }

        debug!(request_id = %ctx.request_id, key, method = ?opts.method, "signing URL");
        let result = ctx.run(self.driver.signed_url(key, opts)).await;
        wrap_result(self.driver.as_ref(), "signed_url", result)
    }

    /// Get configuration
    pub fn config(&self) -> &BucketConfig {
        &self.config
    }
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
