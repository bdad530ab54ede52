//! HTTP transport abstraction
//!
//! The fetch pipeline talks to the network through the [`Transport`] trait so
//! that batches can run against the real client or a test double.
//!
//! - [`ReqwestTransport`]: production implementation on top of `reqwest`
//!
//! A transport resolves each request exactly once with either a
//! [`RawResponse`] or a [`TransportError`]. Aborting is the caller's job: the
//! fetcher drops the pending `get` future when the request's context aborts it.

mod http;

pub use http::ReqwestTransport;

use crate::error::TransportError;
use crate::types::Credential;
use async_trait::async_trait;
use url::Url;

/// What the caller wants the response turned into
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResponseType {
    /// A parsed document (HTML or XML)
    #[default]
    Document,
    /// The raw body bytes
    Bytes,
}

/// A single GET request as issued by the fetch pipeline
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentRequest {
    /// The absolute URL to fetch
    pub url: Url,
    /// Credential to send, if the request runs under a context
    pub credential: Option<Credential>,
    /// Ask caches to revalidate instead of serving a stored response
    pub bypass_cache: bool,
    /// Send the credential even outside its domain scope
    pub force_credentials: bool,
    /// Expected response form
    pub response_type: ResponseType,
}

impl DocumentRequest {
    /// A document GET for `url` with cache bypass and forced credentials
    pub fn get(url: Url) -> Self {
        Self {
            url,
            credential: None,
            bypass_cache: true,
            force_credentials: true,
            response_type: ResponseType::Document,
        }
    }

    /// Attach a credential
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// The credential that should actually be sent for this request
    ///
    /// Forced credentials are always sent; otherwise the credential's domain
    /// scope must cover the request URL.
    pub fn effective_credential(&self) -> Option<&Credential> {
        self.credential
            .as_ref()
            .filter(|c| !c.is_empty())
            .filter(|c| self.force_credentials || c.applies_to(&self.url))
    }
}

/// A completed response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    /// The final URL after redirects
    pub url: Url,
    /// HTTP status code
    pub status: u16,
    /// The declared `Content-Type`, if any
    pub content_type: Option<String>,
    /// The response body
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The media type without parameters, lowercased (e.g. `text/html`)
    pub fn mime_type(&self) -> Option<String> {
        self.content_type.as_deref().map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }
}

/// Network access used by the fetch pipeline
///
/// Implementations must not retry on their own and must report their own
/// timeouts as [`TransportError::Timeout`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a GET request
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] on connection failure, timeout, or any
    /// other network-level problem.
    async fn get(&self, request: &DocumentRequest) -> Result<RawResponse, TransportError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn forced_credentials_ignore_domain_scope() {
        let credential = Credential::new().cookie("a", "b").scoped_to("example.com");
        let request = DocumentRequest::get(url("https://other.test/")).with_credential(credential);
        assert!(request.effective_credential().is_some());
    }

    #[test]
    fn unforced_credentials_respect_domain_scope() {
        let credential = Credential::new().cookie("a", "b").scoped_to("example.com");
        let mut request =
            DocumentRequest::get(url("https://other.test/")).with_credential(credential.clone());
        request.force_credentials = false;
        assert!(request.effective_credential().is_none());

        let mut request =
            DocumentRequest::get(url("https://www.example.com/")).with_credential(credential);
        request.force_credentials = false;
        assert!(request.effective_credential().is_some());
    }

    #[test]
    fn empty_credential_is_never_sent() {
        let request =
            DocumentRequest::get(url("https://example.com/")).with_credential(Credential::new());
        assert!(request.effective_credential().is_none());
    }

    #[test]
    fn mime_type_strips_parameters() {
        let response = RawResponse {
            url: url("https://example.com/"),
            status: 200,
            content_type: Some("Text/HTML; charset=utf-8".to_string()),
            body: Vec::new(),
        };
        assert_eq!(response.mime_type().as_deref(), Some("text/html"));
        assert!(response.is_success());
    }
}
