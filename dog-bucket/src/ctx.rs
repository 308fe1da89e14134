use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ContextError, DriverError};

/// Context for bucket operations: request identity, cancellation and deadline.
///
/// Every driver call made on behalf of a context is raced against its
/// cancellation token and deadline. Clones share the same token, so
/// cancelling any clone cancels them all.
#[derive(Debug, Clone)]
pub struct BlobCtx {
    pub request_id: String,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl BlobCtx {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_request_id(mut self, request_id: String) -> Self {
        self.request_id = request_id;
        self
    }

    /// Share an existing cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Fail driver calls still running at `deadline`
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A context that is cancelled with this one but can also be cancelled on its own
    pub fn child(&self) -> Self {
        Self {
            request_id: self.request_id.clone(),
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drive `call` to completion unless the context ends first.
    ///
    /// An already-cancelled context fails without polling `call`.
    pub(crate) async fn run<T, F>(&self, call: F) -> Result<T, DriverError>
    where
        F: Future<Output = Result<T, DriverError>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Box::new(ContextError::Canceled) as DriverError),
            _ = deadline => Err(Box::new(ContextError::DeadlineExceeded) as DriverError),
            result = call => result,
        }
    }
}

impl Default for BlobCtx {
    fn default() -> Self {
        Self::new()
    }
}
