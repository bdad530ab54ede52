//! Sequential document fetching
//!
//! A [`DocumentFetcher`] runs batches of URLs. Each batch issues one GET at a
//! time, hands every parsed [`Document`] to the caller's processor in input
//! order, and reports failures per URL:
//!
//! - With an error handler every failure is reported and the batch moves on;
//!   the completion callback always runs at the end.
//! - Without one, the first failure stops the batch and the completion
//!   callback never runs.
//!
//! When a [`CancellationContext`] is supplied, every request is attached to it
//! and carries its credential. If the context expires, the in-flight request
//! is aborted (reported as a transport failure) and the batch stops at the
//! next attach without further callbacks.
//!
//! # Example
//!
//! ```no_run
//! use docfetch::{CancellationContext, Credential, DocumentFetcher, FetchConfig};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> docfetch::Result<()> {
//! let fetcher = DocumentFetcher::new(FetchConfig::default())?;
//! let context = CancellationContext::new(Credential::new().cookie("session", "abc"));
//! context.arm(Duration::from_secs(30), || eprintln!("timed out"))?;
//!
//! let outcome = fetcher
//!     .batch(["https://example.com/a", "https://example.com/b"])
//!     .context(context.clone())
//!     .on_error(|e| eprintln!("failed: {e}"))
//!     .on_done(|| println!("all done"))
//!     .run(|doc| {
//!         println!("{}: {:?}", doc.url(), doc.title());
//!         Ok(())
//!     })
//!     .await;
//! context.cancel_arm();
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

mod batch;

pub use batch::Batch;

use crate::config::FetchConfig;
use crate::context::CancellationContext;
use crate::document::{Document, DocumentParser, HtmlDocumentParser};
use crate::error::{AttachError, FetchError, ParseError, ProcessorError, Result, TransportError};
use crate::transport::{DocumentRequest, RawResponse, ReqwestTransport, ResponseType, Transport};
use crate::types::{BatchOutcome, UrlList};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Runs document batches over a shared transport and parser
#[derive(Clone)]
pub struct DocumentFetcher {
    transport: Arc<dyn Transport>,
    parser: Arc<dyn DocumentParser>,
    config: FetchConfig,
}

/// Result of loading one URL, before parsing
enum Load {
    /// The context expired; nothing was sent
    Expired,
    /// The URL was rejected or the transport failed
    Failed(FetchError),
    /// The transport produced a response
    Response { url: Url, response: RawResponse },
}

impl DocumentFetcher {
    /// Create a fetcher backed by [`ReqwestTransport`] and [`HtmlDocumentParser`]
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the HTTP client cannot
    /// be created.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a fetcher over a custom transport
    pub fn with_transport(config: FetchConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            parser: Arc::new(HtmlDocumentParser),
            config,
        }
    }

    /// Replace the document parser
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn DocumentParser>) -> Self {
        self.parser = parser;
        self
    }

    /// The fetcher's configuration
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Start building a batch over `urls`
    pub fn batch(&self, urls: impl Into<UrlList>) -> Batch<'_> {
        Batch::new(self, urls.into())
    }

    /// Fetch every URL in order, calling `on_document` for each parsed document
    ///
    /// `on_done`, if given, runs exactly once after the last URL has been
    /// accounted for. With `on_error`, every per-URL failure is reported there
    /// and the batch continues; without it the first failure is fatal and
    /// `on_done` never runs. Every request is attached to `context`, if given.
    ///
    /// This is shorthand for [`batch`](Self::batch) with the matching builder
    /// calls.
    pub async fn fetch_all<'a, P, D, E>(
        &'a self,
        urls: impl Into<UrlList>,
        on_document: P,
        on_done: Option<D>,
        on_error: Option<E>,
        context: Option<&CancellationContext>,
    ) -> BatchOutcome
    where
        P: FnMut(Document) -> std::result::Result<(), ProcessorError> + Send,
        D: FnOnce() + Send + 'a,
        E: FnMut(FetchError) + Send + 'a,
    {
        let mut batch = self.batch(urls);
        if let Some(on_done) = on_done {
            batch = batch.on_done(on_done);
        }
        if let Some(on_error) = on_error {
            batch = batch.on_error(on_error);
        }
        if let Some(context) = context {
            batch = batch.context(context.clone());
        }
        batch.run(on_document).await
    }

    fn request_for(&self, url: Url) -> DocumentRequest {
        DocumentRequest {
            url,
            credential: None,
            bypass_cache: self.config.bypass_cache,
            force_credentials: self.config.force_credentials,
            response_type: ResponseType::Document,
        }
    }

    /// Validate `raw`, attach to the context, and perform the request
    async fn load(&self, raw: &str, context: Option<&CancellationContext>) -> Load {
        let url = match parse_url(raw) {
            Ok(url) => url,
            Err(e) => return Load::Failed(e),
        };
        let mut request = self.request_for(url.clone());

        let attached = match context {
            Some(context) => match context.attach() {
                Ok(attached) => {
                    request.credential = Some(context.credential().clone());
                    Some(attached)
                }
                Err(AttachError::AlreadyExpired) => return Load::Expired,
            },
            None => None,
        };

        debug!(url = %url, transport = self.transport.name(), "Loading document");

        let result = match attached {
            Some(attached) => {
                let result = tokio::select! {
                    biased;
                    _ = attached.aborted() => Err(TransportError::Aborted),
                    result = self.transport.get(&request) => result,
                };
                // An expiry sweep may have claimed the request before its
                // token was cancelled; a late result is still an abort
                if attached.complete() {
                    Err(TransportError::Aborted)
                } else {
                    result
                }
            }
            None => self.transport.get(&request).await,
        };

        match result {
            Ok(response) => Load::Response { url, response },
            Err(source) => Load::Failed(FetchError::Transport { url, source }),
        }
    }

    /// Parse a response and hand the document to the processor
    fn deliver<P>(
        &self,
        url: Url,
        response: RawResponse,
        on_document: &mut P,
    ) -> std::result::Result<(), FetchError>
    where
        P: FnMut(Document) -> std::result::Result<(), ProcessorError>,
    {
        if response.body.is_empty() {
            return Err(FetchError::EmptyResponse { url });
        }

        let html = self.parser.parse(&response).map_err(|source| match source {
            ParseError::EmptyBody => FetchError::EmptyResponse { url: url.clone() },
            source => FetchError::Parse {
                url: url.clone(),
                source,
            },
        })?;

        let document = Document::wrap(html, response.url);
        on_document(document).map_err(|source| FetchError::Processor { url, source })
    }
}

impl std::fmt::Debug for DocumentFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentFetcher")
            .field("transport", &self.transport.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Parse a batch entry, accepting only absolute http(s) URLs
fn parse_url(raw: &str) -> std::result::Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        raw: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(invalid(format!("unsupported scheme {scheme}"))),
    }
}
