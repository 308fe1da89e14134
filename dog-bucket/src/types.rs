use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

/// Stream of bytes for blob content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// One entry produced while listing a bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListObject {
    pub key: String,
    pub size: u64,
    pub mod_time: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub md5: Option<Vec<u8>>,
    /// Set for the synthetic entries produced by delimiter grouping;
    /// `key` then ends with the delimiter.
    pub is_dir: bool,
}

impl ListObject {
    pub fn new<S: Into<String>>(key: S) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Directory marker for a delimiter-grouped prefix
    pub fn dir<S: Into<String>>(key: S) -> Self {
        Self {
            key: key.into(),
            is_dir: true,
            ..Self::default()
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_mod_time(mut self, mod_time: DateTime<Utc>) -> Self {
        self.mod_time = Some(mod_time);
        self
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_md5(mut self, md5: Vec<u8>) -> Self {
        self.md5 = Some(md5);
        self
    }
}

/// Options for listing a bucket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Only keys starting with this prefix are listed
    pub prefix: String,
    /// Group keys sharing a prefix up to this delimiter into one directory entry
    pub delimiter: String,
    /// Hint for how many objects one page should hold
    pub page_size: Option<usize>,
    /// Opaque continuation token from a previous page; empty for the first page
    pub page_token: Vec<u8>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_delimiter<S: Into<String>>(mut self, delimiter: S) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_page_token(mut self, token: Vec<u8>) -> Self {
        self.page_token = token;
        self
    }
}

/// One page of listing results.
///
/// A page may hold zero objects and still carry a continuation token;
/// only an empty token ends the listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<ListObject>,
    pub next_page_token: Vec<u8>,
}

impl ListPage {
    pub fn new(objects: Vec<ListObject>, next_page_token: Vec<u8>) -> Self {
        Self {
            objects,
            next_page_token,
        }
    }

    /// True when no page follows this one
    pub fn is_last(&self) -> bool {
        self.next_page_token.is_empty()
    }
}

/// Attributes of an existing object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub content_type: String,
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub metadata: HashMap<String, String>,
    pub mod_time: Option<DateTime<Utc>>,
    pub size: u64,
    pub md5: Option<Vec<u8>>,
    /// Backend-specific version identifier, typically an HTTP ETag
    pub etag: Option<String>,
}

/// Attributes a driver reports for an open reader
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderAttributes {
    pub content_type: String,
    pub mod_time: Option<DateTime<Utc>>,
    /// Size of the whole object, not of the requested range
    pub size: u64,
}

/// Options for opening a reader. Currently carries nothing backend-neutral.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct ReaderOptions {}

/// Options for opening a writer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterOptions {
    /// Declared media type. When absent the writer sniffs it from the
    /// first bytes written.
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    /// Expected MD5 of the full content; drivers that support it reject mismatches
    pub content_md5: Option<Vec<u8>>,
    pub metadata: HashMap<String, String>,
    /// Hint for how much the driver should buffer per upload request
    pub buffer_size: Option<usize>,
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_cache_control<S: Into<String>>(mut self, value: S) -> Self {
        self.cache_control = Some(value.into());
        self
    }

    pub fn with_content_disposition<S: Into<String>>(mut self, value: S) -> Self {
        self.content_disposition = Some(value.into());
        self
    }

    pub fn with_content_encoding<S: Into<String>>(mut self, value: S) -> Self {
        self.content_encoding = Some(value.into());
        self
    }

    pub fn with_content_language<S: Into<String>>(mut self, value: S) -> Self {
        self.content_language = Some(value.into());
        self
    }

    pub fn with_content_md5(mut self, md5: Vec<u8>) -> Self {
        self.content_md5 = Some(md5);
        self
    }

    pub fn with_metadata<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }
}

/// HTTP method a signed URL is valid for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignedUrlMethod {
    #[default]
    Get,
    Put,
    Delete,
}

/// Options for generating a signed URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrlOptions {
    pub expiry: Duration,
    pub method: SignedUrlMethod,
}

impl SignedUrlOptions {
    pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(3600);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_method(mut self, method: SignedUrlMethod) -> Self {
        self.method = method;
        self
    }
}

impl Default for SignedUrlOptions {
    fn default() -> Self {
        Self {
            expiry: Self::DEFAULT_EXPIRY,
            method: SignedUrlMethod::Get,
        }
    }
}
