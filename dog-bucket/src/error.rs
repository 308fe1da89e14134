use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::driver::Driver;

/// Result type for bucket operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Raw error produced by a driver, before the bucket classifies it
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

/// Every tagged error's message starts with this tag
pub const ERROR_PREFIX: &str = "blob";

/// Portable, backend-independent error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    PermissionDenied,
    InvalidArgument,
    ResourceExhausted,
    Canceled,
    DeadlineExceeded,
    Unimplemented,
    Internal,
    Unknown,
}

impl ErrorKind {
    /// Stable snake_case name, used in error messages and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::PermissionDenied => "permission_denied",
            Self::InvalidArgument => "invalid_argument",
            Self::ResourceExhausted => "resource_exhausted",
            Self::Canceled => "canceled",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Unimplemented => "unimplemented",
            Self::Internal => "internal",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by [`Bucket`](crate::Bucket) and the objects it hands out.
///
/// Two populations exist. [`BlobError::Driver`] is a *tagged* error: a driver
/// call failed, and the driver's own classifier picked the portable
/// [`ErrorKind`]. The remaining variants are raised by this crate without
/// consulting any driver.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("{} ({op}) {kind}: {source}", ERROR_PREFIX)]
    Driver {
        kind: ErrorKind,
        op: &'static str,
        #[source]
        source: DriverError,
    },

    #[error("{what} is already closed")]
    Closed { what: &'static str },

    #[error("invalid argument: {message}")]
    Invalid { message: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl BlobError {
    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub(crate) fn closed(what: &'static str) -> Self {
        Self::Closed { what }
    }

    /// Portable kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Driver { kind, .. } => *kind,
            Self::Closed { .. } | Self::Invalid { .. } => ErrorKind::InvalidArgument,
            Self::Io { .. } => ErrorKind::Unknown,
        }
    }

    /// Name of the operation that failed, for tagged errors
    pub fn op(&self) -> Option<&'static str> {
        match self {
            Self::Driver { op, .. } => Some(*op),
            _ => None,
        }
    }

    /// True when the error came from a driver and was classified by it
    pub fn is_tagged(&self) -> bool {
        matches!(self, Self::Driver { .. })
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// The context ended before a driver call finished.
///
/// Appears as the source of a tagged error with kind
/// [`ErrorKind::Canceled`] or [`ErrorKind::DeadlineExceeded`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Classify a raw driver error and tag it with the failing operation.
///
/// The only place a [`BlobError::Driver`] is constructed. Context
/// interruptions are classified here; everything else is handed to the
/// driver's own classifier.
pub(crate) fn wrap(driver: &dyn Driver, op: &'static str, source: DriverError) -> BlobError {
    debug_assert!(
        !matches!(source.downcast_ref::<BlobError>(), Some(BlobError::Driver { .. })),
        "driver returned an already tagged error from {op}"
    );

    let kind = match source.downcast_ref::<ContextError>() {
        Some(ContextError::Canceled) => ErrorKind::Canceled,
        Some(ContextError::DeadlineExceeded) => ErrorKind::DeadlineExceeded,
        None => driver.error_kind(source.as_ref()),
    };

    debug!(op, %kind, error = %source, "driver call failed");
    BlobError::Driver { kind, op, source }
}

/// [`wrap`] lifted over a driver result; `Ok` passes through untouched.
pub(crate) fn wrap_result<T>(
    driver: &dyn Driver,
    op: &'static str,
    result: Result<T, DriverError>,
) -> BlobResult<T> {
    result.map_err(|source| wrap(driver, op, source))
}
