use std::collections::VecDeque;
use std::sync::Arc;

use futures_core::Stream;
use tracing::debug;

use crate::driver::Driver;
use crate::error::wrap;
use crate::{BlobCtx, BlobError, BlobResult, ListObject, ListOptions};

/// Lazily walks a bucket listing one driver page at a time.
///
/// Created by [`Bucket::list`](crate::Bucket::list); no page is fetched until
/// the first call to [`next`](Self::next). Empty pages that still carry a
/// continuation token are skipped, so only the driver's final page ends the
/// sequence. An empty page returning the very token it was fetched with is
/// reported as an error, since the listing could never advance. After an
/// error the iterator should not be advanced again.
pub struct ListIterator {
    driver: Arc<dyn Driver>,
    opts: ListOptions,
    page: VecDeque<ListObject>,
    done: bool,
}

impl ListIterator {
    pub(crate) fn new(driver: Arc<dyn Driver>, opts: ListOptions) -> Self {
        Self {
            driver,
            opts,
            page: VecDeque::new(),
            done: false,
        }
    }

    /// Next object in the listing, or `Ok(None)` once the listing is exhausted.
    pub async fn next(&mut self, ctx: &BlobCtx) -> BlobResult<Option<ListObject>> {
        loop {
            if let Some(obj) = self.page.pop_front() {
                return Ok(Some(obj));
            }
            if self.done {
                return Ok(None);
            }

            let page = ctx
                .run(self.driver.list_paged(&self.opts))
                .await
                .map_err(|source| wrap(self.driver.as_ref(), "list", source))?;

            debug!(
                request_id = %ctx.request_id,
                prefix = %self.opts.prefix,
                objects = page.objects.len(),
                last = page.is_last(),
                "fetched list page"
            );

            // An empty page handing back the token it was fetched with can never advance.
            if page.objects.is_empty()
                && !page.is_last()
                && page.next_page_token == self.opts.page_token
            {
                self.done = true;
                return Err(BlobError::invalid(
                    "driver returned an empty list page without advancing its continuation token",
                ));
            }

            self.done = page.is_last();
            self.opts.page_token = page.next_page_token;
            self.page = page.objects.into();
        }
    }

    /// Drain the remaining listing into a vector
    pub async fn collect(mut self, ctx: &BlobCtx) -> BlobResult<Vec<ListObject>> {
        let mut objects = Vec::new();
        while let Some(obj) = self.next(ctx).await? {
            objects.push(obj);
        }
        Ok(objects)
    }

    /// Turn the iterator into a stream; the stream ends after the first error.
    pub fn into_stream(mut self, ctx: BlobCtx) -> impl Stream<Item = BlobResult<ListObject>> + Send {
        async_stream::stream! {
            loop {
                match self.next(&ctx).await {
                    Ok(Some(obj)) => yield Ok(obj),
                    Ok(None) => break,
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for ListIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListIterator")
            .field("opts", &self.opts)
            .field("buffered", &self.page.len())
            .field("done", &self.done)
            .finish()
    }
}
