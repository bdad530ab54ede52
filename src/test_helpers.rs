//! Shared test helpers: a scripted in-memory transport.

use crate::config::FetchConfig;
use crate::error::TransportError;
use crate::fetch::DocumentFetcher;
use crate::transport::{DocumentRequest, RawResponse, Transport};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
enum Reply {
    Body {
        content_type: Option<String>,
        body: Vec<u8>,
    },
    Fail(TransportError),
}

/// In-memory transport answering from a fixed route table
///
/// Every request sleeps for the configured delay first, so tests can run it
/// under a paused clock. Tracks how many requests are outstanding at once.
pub(crate) struct ScriptedTransport {
    routes: HashMap<String, Reply>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    requests: Mutex<Vec<DocumentRequest>>,
}

/// Decrements the active counter however the request future ends
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self {
            routes: HashMap::new(),
            delay: Duration::from_millis(10),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Serve an HTML page with the given title
    pub(crate) fn page(self, url: &str, title: &str) -> Self {
        self.body(
            url,
            Some("text/html; charset=utf-8"),
            &format!("<html><head><title>{title}</title></head><body><p>{title}</p></body></html>"),
        )
    }

    pub(crate) fn body(mut self, url: &str, content_type: Option<&str>, body: &str) -> Self {
        self.routes.insert(
            url.to_string(),
            Reply::Body {
                content_type: content_type.map(str::to_string),
                body: body.as_bytes().to_vec(),
            },
        );
        self
    }

    pub(crate) fn fail(mut self, url: &str, error: TransportError) -> Self {
        self.routes.insert(url.to_string(), Reply::Fail(error));
        self
    }

    /// Highest number of requests observed in flight at the same time
    pub(crate) fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Every request received, in order
    pub(crate) fn requests(&self) -> Vec<DocumentRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// URLs of every request received, in order
    pub(crate) fn requested_urls(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|r| r.url.to_string())
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, request: &DocumentRequest) -> Result<RawResponse, TransportError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = ActiveGuard(&self.active);
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        tokio::time::sleep(self.delay).await;

        match self.routes.get(request.url.as_str()) {
            Some(Reply::Body { content_type, body }) => Ok(RawResponse {
                url: request.url.clone(),
                status: 200,
                content_type: content_type.clone(),
                body: body.clone(),
            }),
            Some(Reply::Fail(error)) => Err(error.clone()),
            None => Err(TransportError::Connect(format!(
                "no route for {}",
                request.url
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Fetcher over a scripted transport with default configuration
pub(crate) fn scripted_fetcher(transport: ScriptedTransport) -> (DocumentFetcher, Arc<ScriptedTransport>) {
    let transport = Arc::new(transport);
    let fetcher = DocumentFetcher::with_transport(FetchConfig::default(), transport.clone());
    (fetcher, transport)
}
