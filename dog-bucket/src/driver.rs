use async_trait::async_trait;

use crate::{
    Attributes, BlobCtx, DriverError, ErrorKind, ListOptions, ListPage, ReaderAttributes,
    ReaderOptions, SignedUrlOptions, WriterOptions,
};

/// Contract every storage backend implements.
///
/// A driver only talks to its backend: it owns any retry or backoff policy,
/// and returns its native errors untouched. The [`Bucket`](crate::Bucket)
/// wrapping it classifies those errors through [`Driver::error_kind`] and
/// races each call against the caller's context.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Fetch one page of objects.
    ///
    /// Pages may be empty while still carrying a continuation token; an
    /// empty `next_page_token` marks the last page.
    async fn list_paged(&self, opts: &ListOptions) -> Result<ListPage, DriverError>;

    /// Attributes of the object at `key`
    async fn attributes(&self, key: &str) -> Result<Attributes, DriverError>;

    /// Open a reader over `length` bytes starting at `offset`; `None` reads to the end.
    async fn new_range_reader(
        &self,
        key: &str,
        offset: u64,
        length: Option<u64>,
        opts: &ReaderOptions,
    ) -> Result<Box<dyn DriverReader>, DriverError>;

    /// Open a writer that stores `key` with the given media type.
    ///
    /// The object must not become visible until the writer closes
    /// successfully. The writer outlives this call, so it keeps `ctx`: once
    /// `ctx` is cancelled, `close` must release the upload without
    /// committing it.
    async fn new_typed_writer(
        &self,
        ctx: &BlobCtx,
        key: &str,
        content_type: &str,
        opts: &WriterOptions,
    ) -> Result<Box<dyn DriverWriter>, DriverError>;

    /// Delete the object at `key`
    async fn delete(&self, key: &str) -> Result<(), DriverError>;

    /// URL granting temporary access to `key` without credentials
    async fn signed_url(&self, key: &str, opts: &SignedUrlOptions) -> Result<String, DriverError>;

    /// Map one of this driver's native errors onto a portable kind
    fn error_kind(&self, err: &(dyn std::error::Error + Send + Sync + 'static)) -> ErrorKind;
}

/// Byte source returned by [`Driver::new_range_reader`]
#[async_trait]
pub trait DriverReader: Send {
    /// Read into `buf`, returning how many bytes were read; `0` means end of range
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, DriverError>;

    async fn close(&mut self) -> Result<(), DriverError>;

    fn attributes(&self) -> ReaderAttributes;
}

/// Byte sink returned by [`Driver::new_typed_writer`].
///
/// Dropping a writer without a successful [`close`](Self::close) must
/// discard the upload. A failed bucket-level write still calls `close`,
/// after cancelling the writer's context, so the driver can release what
/// it holds.
#[async_trait]
pub trait DriverWriter: Send {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, DriverError>;

    /// Commit the object, or abort it if the writer's context was cancelled
    async fn close(&mut self) -> Result<(), DriverError>;
}
