use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::driver::Driver;
use crate::{BlobCtx, Bucket, BucketConfig, DriverError};

/// Builds a driver for a bucket URL.
///
/// The opener receives the URL exactly as parsed, query string included,
/// and is solely responsible for interpreting it. Closures of the form
/// `Fn(BlobCtx, Url) -> impl Future<Output = Result<Box<dyn Driver>, DriverError>>`
/// implement this trait.
#[async_trait]
pub trait BucketOpener: Send + Sync {
    async fn open_bucket(&self, ctx: &BlobCtx, url: &Url) -> Result<Box<dyn Driver>, DriverError>;
}

#[async_trait]
impl<F, Fut> BucketOpener for F
where
    F: Fn(BlobCtx, Url) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Box<dyn Driver>, DriverError>> + Send + 'static,
{
    async fn open_bucket(&self, ctx: &BlobCtx, url: &Url) -> Result<Box<dyn Driver>, DriverError> {
        (self)(ctx.clone(), url.clone()).await
    }
}

/// Errors raised while resolving a bucket URL
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("bucket URL is empty")]
    EmptyUrl,

    #[error("invalid bucket URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("bucket URL {url:?} has no scheme")]
    MissingScheme { url: String },

    #[error("no bucket opener registered for scheme {scheme:?}")]
    UnknownScheme { scheme: String },

    #[error("invalid scheme name {scheme:?}")]
    InvalidScheme { scheme: String },

    #[error("scheme {scheme:?} is already registered")]
    DuplicateScheme { scheme: String },

    /// The opener itself failed; its error is passed on unchanged
    #[error(transparent)]
    Opener(DriverError),
}

/// Maps URL schemes to the openers that build their drivers.
///
/// Lookups take a shared lock and never block each other; registration
/// takes the exclusive lock. Most programs use [`default_registry`], but
/// private registries are handy in tests.
pub struct SchemeRegistry {
    openers: RwLock<HashMap<String, Arc<dyn BucketOpener>>>,
}

impl SchemeRegistry {
    pub fn new() -> Self {
        Self {
            openers: RwLock::new(HashMap::new()),
        }
    }

    /// Register `opener` for `scheme`, failing if the scheme is taken or malformed
    pub fn try_register<O: BucketOpener + 'static>(
        &self,
        scheme: &str,
        opener: O,
    ) -> Result<(), OpenError> {
        if !is_valid_scheme(scheme) {
            return Err(OpenError::InvalidScheme {
                scheme: scheme.to_string(),
            });
        }
        let scheme = scheme.to_ascii_lowercase();

        let mut openers = self.openers.write();
        if openers.contains_key(&scheme) {
            return Err(OpenError::DuplicateScheme { scheme });
        }
        info!(%scheme, "registered bucket opener");
        openers.insert(scheme, Arc::new(opener));
        Ok(())
    }

    /// Register `opener` for `scheme`.
    ///
    /// # Panics
    ///
    /// If `scheme` is already registered or is not a valid URL scheme.
    pub fn register<O: BucketOpener + 'static>(&self, scheme: &str, opener: O) {
        if let Err(err) = self.try_register(scheme, opener) {
            panic!("register bucket opener: {err}");
        }
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.openers.read().contains_key(&scheme.to_ascii_lowercase())
    }

    /// Registered schemes, sorted
    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.openers.read().keys().cloned().collect();
        schemes.sort();
        schemes
    }

    /// Open the bucket `url` points at, using the default [`BucketConfig`]
    pub async fn open(&self, ctx: &BlobCtx, url: &str) -> Result<Bucket, OpenError> {
        self.open_with_config(ctx, url, BucketConfig::default()).await
    }

    pub async fn open_with_config(
        &self,
        ctx: &BlobCtx,
        url: &str,
        config: BucketConfig,
    ) -> Result<Bucket, OpenError> {
        let parsed = parse_url(url)?;

        let opener = self.openers.read().get(parsed.scheme()).cloned();
        let Some(opener) = opener else {
            return Err(OpenError::UnknownScheme {
                scheme: parsed.scheme().to_string(),
            });
        };

        debug!(request_id = %ctx.request_id, scheme = parsed.scheme(), "opening bucket");
        let driver = opener
            .open_bucket(ctx, &parsed)
            .await
            .map_err(OpenError::Opener)?;
        Ok(Bucket::from_boxed(driver, config))
    }
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SchemeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemeRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

fn parse_url(url: &str) -> Result<Url, OpenError> {
    if url.is_empty() {
        return Err(OpenError::EmptyUrl);
    }
    match Url::parse(url) {
        Ok(parsed) => Ok(parsed),
        Err(url::ParseError::RelativeUrlWithoutBase) if !url.contains(':') => {
            Err(OpenError::MissingScheme {
                url: url.to_string(),
            })
        }
        Err(source) => Err(OpenError::InvalidUrl {
            url: url.to_string(),
            source,
        }),
    }
}

// RFC 3986: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

/// Query parameters of `url`; repeated keys keep every value in order.
pub fn query_params(url: &Url) -> BTreeMap<String, Vec<String>> {
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url.query_pairs() {
        params
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    params
}

static DEFAULT_REGISTRY: Lazy<SchemeRegistry> = Lazy::new(|| {
    let registry = SchemeRegistry::new();
    #[cfg(feature = "memory")]
    crate::memory::register(&registry);
    registry
});

/// The process-wide registry behind [`register`] and [`open`]
pub fn default_registry() -> &'static SchemeRegistry {
    &DEFAULT_REGISTRY
}

/// Register `opener` for `scheme` in the process-wide registry.
///
/// # Panics
///
/// If `scheme` is already registered or is not a valid URL scheme.
pub fn register<O: BucketOpener + 'static>(scheme: &str, opener: O) {
    default_registry().register(scheme, opener);
}

/// Open a bucket through the process-wide registry
pub async fn open(ctx: &BlobCtx, url: &str) -> Result<Bucket, OpenError> {
    default_registry().open(ctx, url).await
}
