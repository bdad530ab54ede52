//! Core types for docfetch

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use url::Url;

/// Identifier of a request attached to a [`CancellationContext`](crate::context::CancellationContext)
///
/// Unique within one context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Credential payload attached to every request made under a context
///
/// The pipeline does not store or refresh credentials; it only sends what it
/// was given.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Cookies sent in a single `Cookie` header, in order
    #[serde(default)]
    pub cookies: Vec<(String, String)>,

    /// Additional request headers (e.g. `Authorization`)
    #[serde(default)]
    pub headers: Vec<(String, String)>,

    /// Host the credential belongs to; subdomains match too
    ///
    /// Only consulted when credentials are not forced. None means every host.
    #[serde(default)]
    pub domain: Option<String>,
}

impl Credential {
    /// Create an empty credential
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cookie
    #[must_use]
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Add a request header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Scope the credential to a host and its subdomains
    #[must_use]
    pub fn scoped_to(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Whether there is nothing to send
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.headers.is_empty()
    }

    /// The `Cookie` header value, if any cookies are set
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        Some(pairs.join("; "))
    }

    /// Whether the credential's domain scope covers `url`
    pub fn applies_to(&self, url: &Url) -> bool {
        let Some(domain) = self.domain.as_deref() else {
            return true;
        };
        let domain = domain.trim_start_matches('.').to_ascii_lowercase();
        match url.host_str() {
            Some(host) => {
                let host = host.to_ascii_lowercase();
                host == domain || host.ends_with(&format!(".{domain}"))
            }
            None => false,
        }
    }
}

/// Ordered list of raw URL strings making up one batch
///
/// Accepts a single URL or a sequence. Entries are kept as given; they are
/// parsed one at a time as the batch reaches them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UrlList(Vec<String>);

impl UrlList {
    /// Number of URLs in the list
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw URL strings
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl IntoIterator for UrlList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<&str> for UrlList {
    fn from(url: &str) -> Self {
        Self(vec![url.to_string()])
    }
}

impl From<String> for UrlList {
    fn from(url: String) -> Self {
        Self(vec![url])
    }
}

impl From<&String> for UrlList {
    fn from(url: &String) -> Self {
        Self(vec![url.clone()])
    }
}

impl From<Url> for UrlList {
    fn from(url: Url) -> Self {
        Self(vec![url.into()])
    }
}

impl From<Vec<String>> for UrlList {
    fn from(urls: Vec<String>) -> Self {
        Self(urls)
    }
}

impl From<Vec<&str>> for UrlList {
    fn from(urls: Vec<&str>) -> Self {
        urls.into_iter().collect()
    }
}

impl From<&[&str]> for UrlList {
    fn from(urls: &[&str]) -> Self {
        urls.iter().copied().collect()
    }
}

impl<const N: usize> From<[&str; N]> for UrlList {
    fn from(urls: [&str; N]) -> Self {
        urls.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for UrlList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Counters for a batch that ran to completion
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Documents handed to the processor without error
    pub documents: usize,
    /// URLs reported through the error handler
    pub errors: usize,
}

/// How a batch ended
#[must_use]
#[derive(Debug)]
pub enum BatchOutcome {
    /// Every URL was accounted for and the completion callback ran
    Completed(BatchStats),

    /// A failure with no error handler stopped the batch; the completion
    /// callback did not run
    Failed(FetchError),

    /// The context expired before the next request could be attached; the
    /// completion callback did not run
    Expired,
}

impl BatchOutcome {
    /// Whether the completion callback ran
    pub fn is_completed(&self) -> bool {
        matches!(self, BatchOutcome::Completed(_))
    }

    /// Counters, if the batch completed
    pub fn stats(&self) -> Option<BatchStats> {
        match self {
            BatchOutcome::Completed(stats) => Some(*stats),
            _ => None,
        }
    }
}
