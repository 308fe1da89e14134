//! In-process driver, opened through `mem://` URLs.
//!
//! Objects live in a sorted map for the lifetime of the driver. Writers
//! buffer in memory and publish the object atomically when closed; a writer
//! dropped without closing, or closed after its context was cancelled,
//! leaves nothing behind.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::RwLock;
use thiserror::Error;
use url::Url;

use crate::driver::{Driver, DriverReader, DriverWriter};
use crate::registry::SchemeRegistry;
use crate::{
    Attributes, BlobCtx, ContextError, DriverError, ErrorKind, ListObject, ListOptions,
    ListPage, ReaderAttributes, ReaderOptions, SignedUrlOptions, WriterOptions,
};

/// URL scheme the memory driver is registered under
pub const SCHEME: &str = "mem";

const DEFAULT_PAGE_SIZE: usize = 1000;

/// Native errors of the memory driver
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("object {key:?} not found")]
    NotFound { key: String },

    #[error("content MD5 of {key:?} does not match the declared one")]
    Md5Mismatch { key: String },

    #[error("malformed page token")]
    InvalidPageToken,

    #[error("{0} is not supported by the memory driver")]
    Unsupported(&'static str),

    #[error("memory buckets take no options, got {0:?}")]
    UnknownOptions(String),
}

struct StoredObject {
    data: Bytes,
    attrs: Attributes,
}

type ObjectMap = Arc<RwLock<BTreeMap<String, StoredObject>>>;

/// Driver keeping every object in memory
pub struct MemoryDriver {
    objects: ObjectMap,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn list_paged(&self, opts: &ListOptions) -> Result<ListPage, DriverError> {
        let start_after = if opts.page_token.is_empty() {
            None
        } else {
            Some(String::from_utf8(opts.page_token.clone()).map_err(|_| MemoryError::InvalidPageToken)?)
        };
        let page_size = opts.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);

        let objects = self.objects.read();
        let mut entries: Vec<ListObject> = Vec::new();
        for (key, obj) in objects.range(opts.prefix.clone()..) {
            if !key.starts_with(&opts.prefix) {
                break;
            }

            let entry = match dir_prefix(key, &opts.prefix, &opts.delimiter) {
                Some(dir) => {
                    if entries.last().is_some_and(|last| last.key == dir) {
                        continue;
                    }
                    ListObject::dir(dir)
                }
                None => list_object(key, &obj.attrs),
            };

            if start_after.as_deref().is_some_and(|after| entry.key.as_str() <= after) {
                continue;
            }
            entries.push(entry);
            if entries.len() > page_size {
                break;
            }
        }

        let next_page_token = if entries.len() > page_size {
            entries.truncate(page_size);
            entries
                .last()
                .map(|last| last.key.clone().into_bytes())
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(ListPage::new(entries, next_page_token))
    }

    async fn attributes(&self, key: &str) -> Result<Attributes, DriverError> {
        self.objects
            .read()
            .get(key)
            .map(|obj| obj.attrs.clone())
            .ok_or_else(|| not_found(key))
    }

    async fn new_range_reader(
        &self,
        key: &str,
        offset: u64,
        length: Option<u64>,
        _opts: &ReaderOptions,
    ) -> Result<Box<dyn DriverReader>, DriverError> {
        let objects = self.objects.read();
        let obj = objects.get(key).ok_or_else(|| not_found(key))?;

        let size = obj.data.len();
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(size);
        let end = match length {
            Some(length) => start
                .saturating_add(usize::try_from(length).unwrap_or(usize::MAX))
                .min(size),
            None => size,
        };

        Ok(Box::new(MemoryReader {
            data: obj.data.slice(start..end),
            attrs: ReaderAttributes {
                content_type: obj.attrs.content_type.clone(),
                mod_time: obj.attrs.mod_time,
                size: obj.attrs.size,
            },
        }))
    }

    async fn new_typed_writer(
        &self,
        ctx: &BlobCtx,
        key: &str,
        content_type: &str,
        opts: &WriterOptions,
    ) -> Result<Box<dyn DriverWriter>, DriverError> {
        Ok(Box::new(MemoryWriter {
            ctx: ctx.clone(),
            objects: self.objects.clone(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            opts: opts.clone(),
            buf: Vec::new(),
        }))
    }

    async fn delete(&self, key: &str) -> Result<(), DriverError> {
        self.objects
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| not_found(key))
    }

    async fn signed_url(&self, _key: &str, _opts: &SignedUrlOptions) -> Result<String, DriverError> {
        Err(Box::new(MemoryError::Unsupported("signed URLs")))
    }

    fn error_kind(&self, err: &(dyn std::error::Error + Send + Sync + 'static)) -> ErrorKind {
        match err.downcast_ref::<MemoryError>() {
            Some(MemoryError::NotFound { .. }) => ErrorKind::NotFound,
            Some(MemoryError::Md5Mismatch { .. }) => ErrorKind::InvalidArgument,
            Some(MemoryError::InvalidPageToken) => ErrorKind::InvalidArgument,
            Some(MemoryError::UnknownOptions(_)) => ErrorKind::InvalidArgument,
            Some(MemoryError::Unsupported(_)) => ErrorKind::Unimplemented,
            None => ErrorKind::Unknown,
        }
    }
}

fn not_found(key: &str) -> DriverError {
    Box::new(MemoryError::NotFound {
        key: key.to_string(),
    })
}

/// Directory entry `key` collapses into, if the delimiter occurs past the prefix
fn dir_prefix(key: &str, prefix: &str, delimiter: &str) -> Option<String> {
    if delimiter.is_empty() {
        return None;
    }
    let rest = &key[prefix.len()..];
    rest.find(delimiter)
        .map(|idx| key[..prefix.len() + idx + delimiter.len()].to_string())
}

fn list_object(key: &str, attrs: &Attributes) -> ListObject {
    let mut obj = ListObject::new(key)
        .with_size(attrs.size)
        .with_content_type(attrs.content_type.clone());
    obj.mod_time = attrs.mod_time;
    obj.md5 = attrs.md5.clone();
    obj
}

struct MemoryReader {
    data: Bytes,
    attrs: ReaderAttributes,
}

#[async_trait]
impl DriverReader for MemoryReader {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, DriverError> {
        let n = buf.len().min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = self.data.slice(n..);
        Ok(n)
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn attributes(&self) -> ReaderAttributes {
        self.attrs.clone()
    }
}

struct MemoryWriter {
    ctx: BlobCtx,
    objects: ObjectMap,
    key: String,
    content_type: String,
    opts: WriterOptions,
    buf: Vec<u8>,
}

#[async_trait]
impl DriverWriter for MemoryWriter {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, DriverError> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if self.ctx.is_cancelled() {
            self.buf.clear();
            return Err(Box::new(ContextError::Canceled));
        }

        let digest = md5::compute(&self.buf);
        if let Some(expected) = &self.opts.content_md5 {
            if expected.as_slice() != digest.0.as_slice() {
                return Err(Box::new(MemoryError::Md5Mismatch {
                    key: self.key.clone(),
                }));
            }
        }

        let data = Bytes::from(std::mem::take(&mut self.buf));
        let attrs = Attributes {
            content_type: self.content_type.clone(),
            cache_control: self.opts.cache_control.clone(),
            content_disposition: self.opts.content_disposition.clone(),
            content_encoding: self.opts.content_encoding.clone(),
            content_language: self.opts.content_language.clone(),
            metadata: self.opts.metadata.clone(),
            mod_time: Some(Utc::now()),
            size: data.len() as u64,
            md5: Some(digest.0.to_vec()),
            etag: Some(format!("\"{:x}\"", digest)),
        };

        self.objects
            .write()
            .insert(self.key.clone(), StoredObject { data, attrs });
        Ok(())
    }
}

async fn open_memory_bucket(_ctx: BlobCtx, url: Url) -> Result<Box<dyn Driver>, DriverError> {
    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        return Err(Box::new(MemoryError::UnknownOptions(query.to_string())));
    }
    Ok(Box::new(MemoryDriver::new()))
}

pub(crate) fn register(registry: &SchemeRegistry) {
    registry.register(SCHEME, open_memory_bucket);
}
