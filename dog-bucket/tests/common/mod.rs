#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use dog_bucket::{
    Attributes, BlobCtx, Driver, DriverError, DriverReader, DriverWriter, ErrorKind, ListObject,
    ListOptions, ListPage, ReaderAttributes, ReaderOptions, SignedUrlOptions, WriterOptions,
};

/// Test factory functions
pub fn create_test_context() -> BlobCtx {
    BlobCtx::new().with_request_id("test_request".to_string())
}

/// Native error of the fake drivers; carries the kind its classifier reports
#[derive(Error, Debug)]
#[error("native failure in {op}")]
pub struct NativeError {
    pub op: &'static str,
    pub kind: ErrorKind,
}

impl NativeError {
    pub fn boxed(op: &'static str, kind: ErrorKind) -> DriverError {
        Box::new(Self { op, kind })
    }
}

fn classify(err: &(dyn std::error::Error + Send + Sync + 'static)) -> ErrorKind {
    err.downcast_ref::<NativeError>()
        .map(|e| e.kind)
        .unwrap_or(ErrorKind::Unknown)
}

/// Serves a fixed sequence of pages; the token is the index of the next page.
pub struct PagedDriver {
    pages: Vec<Vec<&'static str>>,
    stuck_at: Option<usize>,
    pub calls: Arc<AtomicUsize>,
}

impl PagedDriver {
    pub fn new(pages: Vec<Vec<&'static str>>) -> Self {
        Self {
            pages,
            stuck_at: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Page `idx` comes back empty, handing back the token it was asked for
    pub fn stuck_at(mut self, idx: usize) -> Self {
        self.stuck_at = Some(idx);
        self
    }
}

#[async_trait]
impl Driver for PagedDriver {
    async fn list_paged(&self, opts: &ListOptions) -> Result<ListPage, DriverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let idx: usize = if opts.page_token.is_empty() {
            0
        } else {
            String::from_utf8(opts.page_token.clone())?.parse()?
        };
        if self.stuck_at == Some(idx) {
            return Ok(ListPage::new(Vec::new(), opts.page_token.clone()));
        }

        let objects = self.pages[idx].iter().map(|key| ListObject::new(*key)).collect();
        let next = if idx + 1 < self.pages.len() {
            (idx + 1).to_string().into_bytes()
        } else {
            Vec::new()
        };
        Ok(ListPage::new(objects, next))
    }

    async fn attributes(&self, _key: &str) -> Result<Attributes, DriverError> {
        Err(NativeError::boxed("attributes", ErrorKind::Unimplemented))
    }

    async fn new_range_reader(
        &self,
        _key: &str,
        _offset: u64,
        _length: Option<u64>,
        _opts: &ReaderOptions,
    ) -> Result<Box<dyn DriverReader>, DriverError> {
        Err(NativeError::boxed("new_range_reader", ErrorKind::Unimplemented))
    }

    async fn new_typed_writer(
        &self,
        _ctx: &BlobCtx,
        _key: &str,
        _content_type: &str,
        _opts: &WriterOptions,
    ) -> Result<Box<dyn DriverWriter>, DriverError> {
        Err(NativeError::boxed("new_typed_writer", ErrorKind::Unimplemented))
    }

    async fn delete(&self, _key: &str) -> Result<(), DriverError> {
        Err(NativeError::boxed("delete", ErrorKind::Unimplemented))
    }

    async fn signed_url(&self, _key: &str, _opts: &SignedUrlOptions) -> Result<String, DriverError> {
        Err(NativeError::boxed("signed_url", ErrorKind::Unimplemented))
    }

    fn error_kind(&self, err: &(dyn std::error::Error + Send + Sync + 'static)) -> ErrorKind {
        classify(err)
    }
}

/// Key for which the failing driver hands out a reader and writer that fail on use
pub const WORKING_KEY: &str = "work";

/// Key on which the failing driver never answers
pub const HANGING_KEY: &str = "hang";

/// Fails every call with a [`NativeError`] of kind `Internal`, counting
/// classifier invocations and driver writer closes.
#[derive(Default)]
pub struct FailingDriver {
    pub classified: Arc<AtomicUsize>,
    pub writer_closes: Arc<AtomicUsize>,
}

impl FailingDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Driver for FailingDriver {
    async fn list_paged(&self, _opts: &ListOptions) -> Result<ListPage, DriverError> {
        Err(NativeError::boxed("list_paged", ErrorKind::Internal))
    }

    async fn attributes(&self, key: &str) -> Result<Attributes, DriverError> {
        if key == HANGING_KEY {
            return std::future::pending().await;
        }
        Err(NativeError::boxed("attributes", ErrorKind::Internal))
    }

    async fn new_range_reader(
        &self,
        key: &str,
        _offset: u64,
        _length: Option<u64>,
        _opts: &ReaderOptions,
    ) -> Result<Box<dyn DriverReader>, DriverError> {
        if key == WORKING_KEY {
            return Ok(Box::new(FailingReader));
        }
        Err(NativeError::boxed("new_range_reader", ErrorKind::Internal))
    }

    async fn new_typed_writer(
        &self,
        _ctx: &BlobCtx,
        key: &str,
        _content_type: &str,
        _opts: &WriterOptions,
    ) -> Result<Box<dyn DriverWriter>, DriverError> {
        if key == WORKING_KEY {
            return Ok(Box::new(FailingWriter {
                closes: self.writer_closes.clone(),
            }));
        }
        Err(NativeError::boxed("new_typed_writer", ErrorKind::Internal))
    }

    async fn delete(&self, _key: &str) -> Result<(), DriverError> {
        Err(NativeError::boxed("delete", ErrorKind::Internal))
    }

    async fn signed_url(&self, _key: &str, _opts: &SignedUrlOptions) -> Result<String, DriverError> {
        Err(NativeError::boxed("signed_url", ErrorKind::Internal))
    }

    fn error_kind(&self, err: &(dyn std::error::Error + Send + Sync + 'static)) -> ErrorKind {
        self.classified.fetch_add(1, Ordering::SeqCst);
        classify(err)
    }
}

struct FailingReader;

#[async_trait]
impl DriverReader for FailingReader {
    async fn read(&mut self, _buf: &mut [u8]) -> Result<usize, DriverError> {
        Err(NativeError::boxed("read", ErrorKind::Internal))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        Err(NativeError::boxed("close", ErrorKind::Internal))
    }

    fn attributes(&self) -> ReaderAttributes {
        ReaderAttributes::default()
    }
}

struct FailingWriter {
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl DriverWriter for FailingWriter {
    async fn write(&mut self, _buf: &[u8]) -> Result<usize, DriverError> {
        Err(NativeError::boxed("write", ErrorKind::Internal))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Err(NativeError::boxed("close", ErrorKind::Internal))
    }
}

/// What a [`RecordingDriver`] saw, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open { key: String, content_type: String },
    Write(Vec<u8>),
    Close,
}

/// Accepts every write and records the calls its writers receive
#[derive(Default)]
pub struct RecordingDriver {
    pub events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    async fn list_paged(&self, _opts: &ListOptions) -> Result<ListPage, DriverError> {
        Ok(ListPage::default())
    }

    async fn attributes(&self, _key: &str) -> Result<Attributes, DriverError> {
        Err(NativeError::boxed("attributes", ErrorKind::NotFound))
    }

    async fn new_range_reader(
        &self,
        _key: &str,
        _offset: u64,
        _length: Option<u64>,
        _opts: &ReaderOptions,
    ) -> Result<Box<dyn DriverReader>, DriverError> {
        Err(NativeError::boxed("new_range_reader", ErrorKind::NotFound))
    }

    async fn new_typed_writer(
        &self,
        _ctx: &BlobCtx,
        key: &str,
        content_type: &str,
        _opts: &WriterOptions,
    ) -> Result<Box<dyn DriverWriter>, DriverError> {
        self.events.lock().push(Event::Open {
            key: key.to_string(),
            content_type: content_type.to_string(),
        });
        Ok(Box::new(RecordingWriter {
            events: self.events.clone(),
        }))
    }

    async fn delete(&self, _key: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn signed_url(&self, key: &str, _opts: &SignedUrlOptions) -> Result<String, DriverError> {
        Ok(format!("https://example.test/{key}"))
    }

    fn error_kind(&self, err: &(dyn std::error::Error + Send + Sync + 'static)) -> ErrorKind {
        classify(err)
    }
}

struct RecordingWriter {
    events: Arc<Mutex<Vec<Event>>>,
}

#[async_trait]
impl DriverWriter for RecordingWriter {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, DriverError> {
        self.events.lock().push(Event::Write(buf.to_vec()));
        Ok(buf.len())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.events.lock().push(Event::Close);
        Ok(())
    }
}
