//! # dog-bucket: Portable blob storage for DogRS applications
//!
//! `dog-bucket` puts one bucket API in front of any storage backend. A
//! backend only implements the small [`Driver`] contract; the [`Bucket`]
//! wrapping it adds everything callers rely on regardless of where the bytes
//! live.
//!
//! ## Key Features
//!
//! - **One error model**: every driver error reaches callers tagged exactly once
//!   with a portable [`ErrorKind`]
//! - **Lazy listing**: [`ListIterator`] fetches pages on demand and skips empty ones
//! - **Content sniffing**: writers without a declared media type detect one
//!   from the first bytes written
//! - **Open by URL**: drivers register under a URL scheme and are opened with
//!   [`open`], query string passed through untouched
//! - **Cancellation**: every driver call is raced against the [`BlobCtx`]
//!   it runs under
//!
//! ## Quick Start
//!
//! ```rust
//! use dog_bucket::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = BlobCtx::new();
//! let bucket = dog_bucket::open(&ctx, "mem://").await?;
//!
//! bucket.write_all(&ctx, "hello.txt", b"Hello, world!", WriterOptions::new()).await?;
//! let data = bucket.read_all(&ctx, "hello.txt").await?;
//! assert_eq!(data, b"Hello, world!");
//!
//! let attrs = bucket.attributes(&ctx, "hello.txt").await?;
//! assert_eq!(attrs.content_type, "text/plain");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   Your Service   │  ← Business logic only
//! ├──────────────────┤
//! │  SchemeRegistry  │  ← URL → driver
//! ├──────────────────┤
//! │      Bucket      │  ← Error tagging, sniffing, paging
//! ├──────────────────┤
//! │      Driver      │  ← Storage primitives
//! └──────────────────┘
//! ```
//!
//! Adding a backend means implementing [`Driver`] and registering an opener:
//!
//! ```rust
//! use dog_bucket::prelude::*;
//!
//! let registry = SchemeRegistry::new();
//! registry.register("scratch", |_ctx: BlobCtx, _url: url::Url| async {
//!     Ok::<_, DriverError>(Box::new(dog_bucket::MemoryDriver::new()) as Box<dyn Driver>)
//! });
//! assert!(registry.contains("scratch"));
//! ```

mod bucket;
mod config;
mod ctx;
pub mod driver;
mod error;
mod list;
#[cfg(feature = "memory")]
pub mod memory;
mod reader;
mod registry;
mod sniff;
mod types;
mod writer;

// Re-export main types for clean API
pub use bucket::Bucket;
pub use config::{BucketConfig, DEFAULT_READ_CHUNK_SIZE, DEFAULT_SNIFF_LEN};
pub use ctx::BlobCtx;
pub use driver::{Driver, DriverReader, DriverWriter};
pub use error::{BlobError, BlobResult, ContextError, DriverError, ErrorKind, ERROR_PREFIX};
pub use list::ListIterator;
#[cfg(feature = "memory")]
pub use memory::MemoryDriver;
pub use reader::Reader;
pub use registry::{
    default_registry, open, query_params, register, BucketOpener, OpenError, SchemeRegistry,
};
pub use sniff::detect_content_type;
pub use types::{
    Attributes, ByteStream, ListObject, ListOptions, ListPage, ReaderAttributes, ReaderOptions,
    SignedUrlMethod, SignedUrlOptions, WriterOptions,
};
pub use writer::Writer;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Attributes, BlobCtx, BlobError, BlobResult, Bucket, BucketConfig, BucketOpener, Driver,
        DriverError, ErrorKind, ListOptions, ReaderOptions, SchemeRegistry, WriterOptions,
    };
}
