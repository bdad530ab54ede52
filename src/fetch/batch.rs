//! Batch builder and the sequential fetch loop

use super::{DocumentFetcher, Load};
use crate::context::CancellationContext;
use crate::document::Document;
use crate::error::{FetchError, ProcessorError};
use crate::types::{BatchOutcome, BatchStats, UrlList};
use tracing::{error, info, warn};

type ErrorHandler<'a> = Box<dyn FnMut(FetchError) + Send + 'a>;
type DoneHandler<'a> = Box<dyn FnOnce() + Send + 'a>;

/// One pass over an ordered list of URLs
///
/// Built with [`DocumentFetcher::batch`] and consumed by [`run`](Batch::run).
#[must_use = "a batch does nothing until it is run"]
pub struct Batch<'a> {
    fetcher: &'a DocumentFetcher,
    urls: UrlList,
    context: Option<CancellationContext>,
    on_error: Option<ErrorHandler<'a>>,
    on_done: Option<DoneHandler<'a>>,
}

impl<'a> Batch<'a> {
    pub(super) fn new(fetcher: &'a DocumentFetcher, urls: UrlList) -> Self {
        Self {
            fetcher,
            urls,
            context: None,
            on_error: None,
            on_done: None,
        }
    }

    /// Attach every request to `context` and send its credential
    pub fn context(mut self, context: CancellationContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Report per-URL failures here instead of stopping the batch
    pub fn on_error<E>(mut self, handler: E) -> Self
    where
        E: FnMut(FetchError) + Send + 'a,
    {
        self.on_error = Some(Box::new(handler));
        self
    }

    /// Run `handler` once the last URL has been accounted for
    pub fn on_done<D>(mut self, handler: D) -> Self
    where
        D: FnOnce() + Send + 'a,
    {
        self.on_done = Some(Box::new(handler));
        self
    }

    /// Fetch every URL in order, one request at a time
    ///
    /// `on_document` is called once per parsed document. The next URL is not
    /// taken until the previous one's callback has returned.
    pub async fn run<P>(self, mut on_document: P) -> BatchOutcome
    where
        P: FnMut(Document) -> Result<(), ProcessorError> + Send,
    {
        let Batch {
            fetcher,
            urls,
            context,
            mut on_error,
            on_done,
        } = self;

        let total = urls.len();
        info!(
            urls = total,
            with_context = context.is_some(),
            "Starting document batch"
        );

        let mut stats = BatchStats::default();
        for (position, raw) in urls.into_iter().enumerate() {
            let result = match fetcher.load(&raw, context.as_ref()).await {
                Load::Expired => {
                    warn!(
                        remaining = total - position,
                        "Context expired, stopping document batch"
                    );
                    return BatchOutcome::Expired;
                }
                Load::Failed(e) => Err(e),
                Load::Response { url, response } => {
                    fetcher.deliver(url, response, &mut on_document)
                }
            };

            match (result, on_error.as_mut()) {
                (Ok(()), _) => stats.documents += 1,
                (Err(e), Some(handler)) => {
                    warn!(url = %raw, error = %e, "Document failed");
                    stats.errors += 1;
                    handler(e);
                }
                (Err(e), None) => {
                    error!(
                        url = %raw,
                        error = %e,
                        "Document failed with no error handler, stopping batch"
                    );
                    return BatchOutcome::Failed(e);
                }
            }
        }

        info!(
            documents = stats.documents,
            errors = stats.errors,
            "Document batch complete"
        );
        if let Some(done) = on_done {
            done();
        }
        BatchOutcome::Completed(stats)
    }
}

impl std::fmt::Debug for Batch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("urls", &self.urls)
            .field("context", &self.context)
            .field("on_error", &self.on_error.is_some())
            .field("on_done", &self.on_done.is_some())
            .finish()
    }
}
